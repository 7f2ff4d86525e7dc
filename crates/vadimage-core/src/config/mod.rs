//! Configuration management for vadimage.
//!
//! Configuration is read from `vadimage.toml` in the working directory (or an
//! explicit `--config` path), then overridden by `VADIMAGE_*` environment
//! variables, then validated once. Every section implements `Default`, so a
//! missing file or a partial file is fine.

mod env;
mod types;
mod validate;

pub use types::*;

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default config file name, looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = "vadimage.toml";

/// Root configuration structure for vadimage.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Variant matrix and encoder settings
    pub variants: VariantsConfig,

    /// Filesystem locations
    pub paths: PathsConfig,

    /// Scheduling settings
    pub processing: ProcessingConfig,

    /// Resource limits
    pub limits: LimitsConfig,

    /// Object storage upload settings
    pub upload: UploadConfig,

    /// Logging settings
    pub logging: LoggingConfig,

    /// Directory relative paths are resolved against.
    #[serde(skip)]
    pub base_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            variants: VariantsConfig::default(),
            paths: PathsConfig::default(),
            processing: ProcessingConfig::default(),
            limits: LimitsConfig::default(),
            upload: UploadConfig::default(),
            logging: LoggingConfig::default(),
            base_dir: PathBuf::from("."),
        }
    }
}

impl Config {
    /// Load configuration for a run.
    ///
    /// With an explicit path the file must exist. Without one, `vadimage.toml`
    /// in the working directory is used when present and defaults otherwise.
    /// Environment overrides are applied before validation.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match explicit {
            Some(path) => Self::read_file(path)?,
            None => {
                let path = Self::default_path();
                if path.exists() {
                    Self::read_file(&path)?
                } else {
                    tracing::debug!("No config file at {:?}, using defaults", path);
                    Self::default()
                }
            }
        };
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path without environment overrides.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let config = Self::read_file(path)?;
        config.validate()?;
        Ok(config)
    }

    fn read_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&content)?;
        config.base_dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        Ok(config)
    }

    /// Get the default config file path (`./vadimage.toml`).
    pub fn default_path() -> PathBuf {
        PathBuf::from(CONFIG_FILE_NAME)
    }

    /// Root directory scanned for source images.
    pub fn images_dir(&self) -> PathBuf {
        resolve_path(&self.base_dir, &self.paths.images_path)
    }

    /// Static export folder excluded from discovery.
    pub fn build_dir(&self) -> PathBuf {
        resolve_path(&self.base_dir, &self.paths.build_folder_path)
    }

    /// Location of the cache document.
    pub fn cache_path(&self) -> PathBuf {
        resolve_path(&self.base_dir, &self.paths.cache_file)
    }

    /// Local prefix stripped from artifact paths to form object keys.
    pub fn upload_base_dir(&self) -> PathBuf {
        resolve_path(&self.base_dir, &self.upload.local_base_path)
    }

    /// Output subfolder name with any surrounding slashes removed.
    ///
    /// `/opt/` and `opt` both resolve to `opt`.
    pub fn optimization_dir_name(&self) -> &str {
        self.paths.optimization_dir_name.trim_matches(|c| c == '/' || c == '\\')
    }

    /// Serialize the config to a pretty TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::ValidationError(e.to_string()))
    }
}
