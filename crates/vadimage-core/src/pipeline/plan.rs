//! Expansion of the variant matrix into concrete variant specs.

use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::config::{VariantFormat, VariantsConfig};

/// One concrete rendering owed for every source image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct VariantSpec {
    /// Logical width in CSS pixels
    pub size: u32,
    /// Device pixel ratio
    pub pixel_ratio: u32,
    /// Pixel width of the output (`size * pixel_ratio`)
    pub target_width: u32,
    pub format: VariantFormat,
    /// Effective encoder quality for `format`
    pub quality: u8,
}

impl VariantSpec {
    pub fn new(size: u32, pixel_ratio: u32, format: VariantFormat, base_quality: u8) -> Self {
        Self {
            size,
            pixel_ratio,
            target_width: size.saturating_mul(pixel_ratio),
            format,
            quality: format.effective_quality(base_quality),
        }
    }

    /// Artifact file name: `{stem}-{size}w-{ratio}x.{ext}`.
    pub fn file_name(&self, source_stem: &str) -> String {
        format!(
            "{source_stem}-{}w-{}x.{}",
            self.size,
            self.pixel_ratio,
            self.format.extension()
        )
    }

    /// Artifact path: `{sourceDir}/{optimization_dir}/{stem}-{size}w-{ratio}x.{ext}`.
    ///
    /// Pure function of its inputs, so reprocessing always lands on the same file.
    pub fn output_path(&self, source: &Path, optimization_dir: &str) -> PathBuf {
        let dir = source.parent().unwrap_or_else(|| Path::new("."));
        let stem = source
            .file_stem()
            .map(|s| s.to_string_lossy())
            .unwrap_or_default();
        dir.join(optimization_dir).join(self.file_name(&stem))
    }
}

impl fmt::Display for VariantSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}w@{}x {} q{}",
            self.size, self.pixel_ratio, self.format, self.quality
        )
    }
}

/// Expand the configured matrix into the variants owed per source file.
///
/// Order is format outer, size middle, ratio inner. An empty list on any axis
/// yields no variants.
pub fn plan(config: &VariantsConfig) -> Vec<VariantSpec> {
    let mut specs =
        Vec::with_capacity(config.formats.len() * config.sizes.len() * config.pixel_ratios.len());
    for &format in &config.formats {
        for &size in &config.sizes {
            for &ratio in &config.pixel_ratios {
                specs.push(VariantSpec::new(size, ratio, format, config.quality));
            }
        }
    }
    specs
}

#[cfg(test)]
mod tests {
    use super::*;

    fn variants(sizes: &[u32], ratios: &[u32], formats: &[VariantFormat]) -> VariantsConfig {
        VariantsConfig {
            sizes: sizes.to_vec(),
            pixel_ratios: ratios.to_vec(),
            formats: formats.to_vec(),
            quality: 80,
            avif_speed: 6,
        }
    }

    #[test]
    fn test_plan_cross_product_order() {
        let specs = plan(&variants(
            &[320, 640],
            &[1, 2],
            &[VariantFormat::Webp, VariantFormat::Avif],
        ));
        assert_eq!(specs.len(), 8);

        let tuples: Vec<_> = specs
            .iter()
            .map(|s| (s.format, s.size, s.pixel_ratio))
            .collect();
        assert_eq!(tuples[0], (VariantFormat::Webp, 320, 1));
        assert_eq!(tuples[1], (VariantFormat::Webp, 320, 2));
        assert_eq!(tuples[2], (VariantFormat::Webp, 640, 1));
        assert_eq!(tuples[4], (VariantFormat::Avif, 320, 1));
    }

    #[test]
    fn test_plan_target_width_and_quality() {
        let specs = plan(&variants(
            &[640],
            &[2],
            &[VariantFormat::Webp, VariantFormat::Avif],
        ));
        assert_eq!(specs[0].target_width, 1280);
        assert_eq!(specs[0].quality, 80);
        assert_eq!(specs[1].quality, 65);
    }

    #[test]
    fn test_plan_empty_axes_yield_nothing() {
        assert!(plan(&variants(&[], &[1], &[VariantFormat::Webp])).is_empty());
        assert!(plan(&variants(&[320], &[1], &[])).is_empty());
        assert!(plan(&variants(&[320], &[], &[VariantFormat::Webp])).is_empty());
    }

    #[test]
    fn test_output_path_layout() {
        let spec = VariantSpec::new(320, 2, VariantFormat::Webp, 80);
        let out = spec.output_path(Path::new("/site/public/images/photo.jpg"), "opt");
        assert_eq!(
            out,
            PathBuf::from("/site/public/images/opt/photo-320w-2x.webp")
        );
    }

    #[test]
    fn test_output_path_keeps_inner_dots() {
        let spec = VariantSpec::new(640, 1, VariantFormat::Avif, 80);
        let out = spec.output_path(Path::new("/img/team.photo.v2.png"), "opt");
        assert_eq!(out, PathBuf::from("/img/opt/team.photo.v2-640w-1x.avif"));
    }
}
