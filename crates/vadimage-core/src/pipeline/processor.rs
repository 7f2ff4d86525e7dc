//! Produces one variant artifact on disk.

use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};
use std::borrow::Cow;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use crate::error::PipelineError;
use crate::types::ArtifactInfo;

use super::decode::ImageDecoder;
use super::encode::VariantCodec;
use super::plan::VariantSpec;

/// Resizes, encodes and writes variants.
#[derive(Clone)]
pub struct VariantProcessor {
    decoder: ImageDecoder,
    codec: Arc<dyn VariantCodec>,
}

impl VariantProcessor {
    pub fn new(decoder: ImageDecoder, codec: Arc<dyn VariantCodec>) -> Self {
        Self { decoder, codec }
    }

    pub fn decoder(&self) -> &ImageDecoder {
        &self.decoder
    }

    /// Decode `source_bytes` and produce a single variant at `output_path`.
    pub async fn process(
        &self,
        source_bytes: Vec<u8>,
        source_path: &Path,
        spec: VariantSpec,
        output_path: &Path,
    ) -> Result<ArtifactInfo, PipelineError> {
        let decoded = self
            .decoder
            .decode_from_bytes(source_bytes, source_path)
            .await?;
        self.process_decoded(Arc::new(decoded.image), spec, output_path)
            .await
    }

    /// Produce a variant from an upright, already-decoded source.
    ///
    /// Resize, encode and write run on the blocking pool. The output
    /// directory is created if missing (concurrent creation by another worker
    /// is fine) and the bytes go to a uniquely named temporary file in that
    /// directory, which is then renamed into place.
    pub async fn process_decoded(
        &self,
        source: Arc<DynamicImage>,
        spec: VariantSpec,
        output_path: &Path,
    ) -> Result<ArtifactInfo, PipelineError> {
        let codec = self.codec.clone();
        let output = output_path.to_path_buf();
        tokio::task::spawn_blocking(move || {
            let resized = resize_to_width(&source, spec.target_width);
            let (width, height) = resized.dimensions();
            let bytes = codec.encode(&resized, &spec, &output)?;
            write_artifact(&output, &bytes)?;
            Ok::<_, PipelineError>(ArtifactInfo {
                path: output,
                width,
                height,
                bytes: bytes.len() as u64,
            })
        })
        .await
        .map_err(|e| PipelineError::Encode {
            path: output_path.to_path_buf(),
            message: format!("Task join error: {e}"),
        })?
    }
}

/// Resize to exactly `target_width`, keeping the aspect ratio.
///
/// Smaller sources are upscaled so every variant has its advertised width.
pub fn resize_to_width(image: &DynamicImage, target_width: u32) -> Cow<'_, DynamicImage> {
    let (width, height) = image.dimensions();
    if width == target_width || width == 0 {
        return Cow::Borrowed(image);
    }
    let target_height =
        ((height as f64 * target_width as f64 / width as f64).round() as u32).max(1);
    Cow::Owned(image.resize_exact(target_width, target_height, FilterType::Lanczos3))
}

fn write_artifact(path: &Path, bytes: &[u8]) -> Result<(), PipelineError> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent).map_err(|e| PipelineError::io(parent, e))?;

    let mut tmp =
        tempfile::NamedTempFile::new_in(parent).map_err(|e| PipelineError::io(parent, e))?;
    tmp.write_all(bytes)
        .map_err(|e| PipelineError::io(tmp.path(), e))?;
    // The temp file is removed on drop if persisting fails.
    tmp.persist(path)
        .map_err(|e| PipelineError::io(path, e.error))?;
    Ok(())
}
