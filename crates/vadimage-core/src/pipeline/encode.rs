//! Variant encoders.
//!
//! The processor talks to the codec through [`VariantCodec`] so the encode
//! step can be swapped (and counted in tests) without touching scheduling.

use image::codecs::avif::AvifEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType as PngFilterType, PngEncoder};
use image::codecs::webp::WebPEncoder;
use image::DynamicImage;
use std::path::Path;

use super::plan::VariantSpec;
use crate::config::VariantFormat;
use crate::error::PipelineError;

/// Encodes an already-resized image into the bytes of one variant.
pub trait VariantCodec: Send + Sync {
    /// Encode `image` as `spec.format` at `spec.quality`.
    ///
    /// `output` is only used for error context.
    fn encode(
        &self,
        image: &DynamicImage,
        spec: &VariantSpec,
        output: &Path,
    ) -> Result<Vec<u8>, PipelineError>;
}

/// Default codec backed by the `image` crate encoders.
#[derive(Debug, Clone)]
pub struct ImageCodec {
    avif_speed: u8,
}

impl Default for ImageCodec {
    fn default() -> Self {
        Self::new(6)
    }
}

impl ImageCodec {
    pub fn new(avif_speed: u8) -> Self {
        Self {
            avif_speed: avif_speed.clamp(1, 10),
        }
    }
}

impl VariantCodec for ImageCodec {
    fn encode(
        &self,
        image: &DynamicImage,
        spec: &VariantSpec,
        output: &Path,
    ) -> Result<Vec<u8>, PipelineError> {
        let mut buffer = Vec::new();
        let result = match spec.format {
            VariantFormat::Jpg => DynamicImage::ImageRgb8(image.to_rgb8()).write_with_encoder(
                JpegEncoder::new_with_quality(&mut buffer, spec.quality.clamp(1, 100)),
            ),
            // PNG is lossless; quality only participates in the variant key.
            VariantFormat::Png => to_8bit(image).write_with_encoder(PngEncoder::new_with_quality(
                &mut buffer,
                CompressionType::Best,
                PngFilterType::Adaptive,
            )),
            // The image crate only ships a lossless WebP encoder.
            VariantFormat::Webp => {
                to_8bit(image).write_with_encoder(WebPEncoder::new_lossless(&mut buffer))
            }
            // Effective quality can reach 0; the encoder's floor is 1.
            VariantFormat::Avif => to_8bit(image).write_with_encoder(
                AvifEncoder::new_with_speed_quality(
                    &mut buffer,
                    self.avif_speed,
                    spec.quality.clamp(1, 100),
                ),
            ),
        };

        result.map_err(|e| PipelineError::Encode {
            path: output.to_path_buf(),
            message: format!("{} encode failed: {e}", spec.format),
        })?;
        Ok(buffer)
    }
}

/// Normalize to 8-bit RGB or RGBA, which every encoder above accepts.
fn to_8bit(image: &DynamicImage) -> DynamicImage {
    if image.color().has_alpha() {
        DynamicImage::ImageRgba8(image.to_rgba8())
    } else {
        DynamicImage::ImageRgb8(image.to_rgb8())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(format: VariantFormat, image: &DynamicImage) -> Vec<u8> {
        let spec = VariantSpec::new(16, 1, format, 80);
        ImageCodec::default()
            .encode(image, &spec, Path::new("out"))
            .unwrap()
    }

    #[test]
    fn test_jpeg_magic_bytes() {
        let bytes = encode(VariantFormat::Jpg, &DynamicImage::new_rgba8(16, 8));
        assert_eq!(&bytes[0..3], &[0xFF, 0xD8, 0xFF]);
    }

    #[test]
    fn test_png_magic_bytes() {
        let bytes = encode(VariantFormat::Png, &DynamicImage::new_rgb16(16, 8));
        assert_eq!(&bytes[1..4], b"PNG");
    }

    #[test]
    fn test_webp_magic_bytes() {
        let bytes = encode(VariantFormat::Webp, &DynamicImage::new_rgb8(16, 8));
        // WebP files start with "RIFF"
        assert_eq!(&bytes[0..4], b"RIFF");
        assert_eq!(&bytes[8..12], b"WEBP");
    }

    #[test]
    fn test_to_8bit_keeps_alpha() {
        let rgba = to_8bit(&DynamicImage::new_rgba16(2, 2));
        assert!(matches!(rgba, DynamicImage::ImageRgba8(_)));
        let rgb = to_8bit(&DynamicImage::new_luma8(2, 2));
        assert!(matches!(rgb, DynamicImage::ImageRgb8(_)));
    }
}
