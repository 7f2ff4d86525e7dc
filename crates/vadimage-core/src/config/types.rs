//! Sub-configuration structs and their defaults.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Output encoding of a variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariantFormat {
    #[serde(alias = "jpeg")]
    Jpg,
    Png,
    Webp,
    Avif,
}

impl VariantFormat {
    /// File extension written to disk (also the format token in variant keys).
    pub fn extension(self) -> &'static str {
        match self {
            Self::Jpg => "jpg",
            Self::Png => "png",
            Self::Webp => "webp",
            Self::Avif => "avif",
        }
    }

    /// Encoder quality for this format given the configured base quality.
    ///
    /// AVIF reaches comparable visual quality at a lower setting, so it is
    /// offset by 15 and floored at 0. Every other format uses the base value.
    pub fn effective_quality(self, base: u8) -> u8 {
        match self {
            Self::Avif => base.saturating_sub(15),
            Self::Jpg | Self::Png | Self::Webp => base,
        }
    }
}

impl fmt::Display for VariantFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for VariantFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "jpg" | "jpeg" => Ok(Self::Jpg),
            "png" => Ok(Self::Png),
            "webp" => Ok(Self::Webp),
            "avif" => Ok(Self::Avif),
            other => Err(format!(
                "unknown format '{other}' (expected jpg, png, webp or avif)"
            )),
        }
    }
}

/// Which variants are owed for every source image.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VariantsConfig {
    /// Logical widths in CSS pixels
    pub sizes: Vec<u32>,

    /// Device pixel ratios applied to every size
    pub pixel_ratios: Vec<u32>,

    /// Output formats
    pub formats: Vec<VariantFormat>,

    /// Base encoder quality (0-100)
    pub quality: u8,

    /// AVIF encoder speed (1 = slowest/best, 10 = fastest)
    pub avif_speed: u8,
}

impl Default for VariantsConfig {
    fn default() -> Self {
        Self {
            sizes: vec![320, 512, 480, 640, 787, 1024, 1280, 1440, 1920],
            pixel_ratios: vec![1, 2, 3],
            formats: vec![VariantFormat::Webp, VariantFormat::Avif],
            quality: 75,
            avif_speed: 6,
        }
    }
}

/// Filesystem locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Root directory scanned for source images
    pub images_path: String,

    /// Name of the per-directory subfolder that receives generated variants
    pub optimization_dir_name: String,

    /// Static export folder; never scanned for sources
    pub build_folder_path: String,

    /// Cache document location
    pub cache_file: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            images_path: "public/images".to_string(),
            optimization_dir_name: "opt".to_string(),
            build_folder_path: "build".to_string(),
            cache_file: ".vadimage-cache.json".to_string(),
        }
    }
}

/// Scheduling settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Number of source files processed at the same time
    pub concurrency: usize,

    /// Save the cache after this many new entries (0 = only at the end)
    pub cache_flush_interval: usize,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            concurrency: 7,
            cache_flush_interval: 25,
        }
    }
}

/// Resource limits to protect against problematic inputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum source file size in megabytes
    pub max_file_size_mb: u64,

    /// Decode timeout in milliseconds
    pub decode_timeout_ms: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_file_size_mb: 100,
            decode_timeout_ms: 30_000,
        }
    }
}

/// S3-compatible object storage settings.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// Push variants to object storage and delete the local copies
    pub enabled: bool,

    pub access_key: String,

    pub secret_key: String,

    /// Service endpoint, e.g. `https://fra1.digitaloceanspaces.com`
    pub endpoint: String,

    pub bucket: String,

    /// Public domain the bucket is served from (used for logged URLs)
    pub domain: Option<String>,

    /// Signing region
    pub region: String,

    /// Local prefix stripped from artifact paths to form object keys
    pub local_base_path: String,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            access_key: String::new(),
            secret_key: String::new(),
            endpoint: String::new(),
            bucket: String::new(),
            domain: None,
            region: "us-east-1".to_string(),
            local_base_path: "public".to_string(),
        }
    }
}

// Keeps credentials out of `{:?}` output in logs.
impl fmt::Debug for UploadConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadConfig")
            .field("enabled", &self.enabled)
            .field("access_key", &redact(&self.access_key))
            .field("secret_key", &redact(&self.secret_key))
            .field("endpoint", &self.endpoint)
            .field("bucket", &self.bucket)
            .field("domain", &self.domain)
            .field("region", &self.region)
            .field("local_base_path", &self.local_base_path)
            .finish()
    }
}

fn redact(value: &str) -> &'static str {
    if value.is_empty() {
        ""
    } else {
        "***"
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    pub level: String,

    /// Log format (pretty, json)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

/// Resolve a configured path against a base directory, expanding `~`.
pub(crate) fn resolve_path(base: &std::path::Path, raw: &str) -> PathBuf {
    let expanded = PathBuf::from(shellexpand::tilde(raw).into_owned());
    if expanded.is_absolute() {
        expanded
    } else {
        base.join(expanded)
    }
}
