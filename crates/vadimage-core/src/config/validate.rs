//! Configuration validation with range checks.

use crate::error::ConfigError;

use super::Config;

impl Config {
    /// Validate configuration values are within acceptable ranges.
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.variants.quality > 100 {
            return Err(ConfigError::ValidationError(
                "variants.quality must be between 0 and 100".into(),
            ));
        }
        if self.variants.sizes.contains(&0) {
            return Err(ConfigError::ValidationError(
                "variants.sizes must not contain 0".into(),
            ));
        }
        if self.variants.pixel_ratios.contains(&0) {
            return Err(ConfigError::ValidationError(
                "variants.pixel_ratios must not contain 0".into(),
            ));
        }
        if !(1..=10).contains(&self.variants.avif_speed) {
            return Err(ConfigError::ValidationError(
                "variants.avif_speed must be between 1 and 10".into(),
            ));
        }
        if self.optimization_dir_name().is_empty() {
            return Err(ConfigError::ValidationError(
                "paths.optimization_dir_name must not be empty".into(),
            ));
        }
        if self.paths.images_path.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "paths.images_path must not be empty".into(),
            ));
        }
        if self.processing.concurrency == 0 {
            return Err(ConfigError::ValidationError(
                "processing.concurrency must be > 0".into(),
            ));
        }
        if self.limits.max_file_size_mb == 0 {
            return Err(ConfigError::ValidationError(
                "limits.max_file_size_mb must be > 0".into(),
            ));
        }
        if self.limits.decode_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "limits.decode_timeout_ms must be > 0".into(),
            ));
        }
        if self.upload.enabled {
            self.validate_upload()?;
        }
        Ok(())
    }

    fn validate_upload(&self) -> Result<(), ConfigError> {
        let required = [
            ("upload.access_key", &self.upload.access_key),
            ("upload.secret_key", &self.upload.secret_key),
            ("upload.endpoint", &self.upload.endpoint),
            ("upload.bucket", &self.upload.bucket),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(ConfigError::ValidationError(format!(
                    "{name} is required when upload is enabled"
                )));
            }
        }
        let endpoint = reqwest::Url::parse(&self.upload.endpoint).map_err(|e| {
            ConfigError::ValidationError(format!("upload.endpoint is not a valid URL: {e}"))
        })?;
        if endpoint.host_str().is_none() {
            return Err(ConfigError::ValidationError(
                "upload.endpoint must include a host".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upload_config() -> Config {
        let mut config = Config::default();
        config.upload.enabled = true;
        config.upload.access_key = "AKIA".into();
        config.upload.secret_key = "secret".into();
        config.upload.endpoint = "https://s3.example.com".into();
        config.upload.bucket = "assets".into();
        config
    }

    #[test]
    fn test_default_config_passes_validation() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_quality_above_100() {
        let mut config = Config::default();
        config.variants.quality = 101;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("quality"));
    }

    #[test]
    fn test_validate_rejects_zero_concurrency() {
        let mut config = Config::default();
        config.processing.concurrency = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("concurrency"));
    }

    #[test]
    fn test_validate_rejects_zero_size_and_ratio() {
        let mut config = Config::default();
        config.variants.sizes = vec![320, 0];
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.variants.pixel_ratios = vec![0];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_allows_empty_variant_lists() {
        let mut config = Config::default();
        config.variants.sizes.clear();
        config.variants.formats.clear();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_upload_requires_credentials() {
        let mut config = upload_config();
        assert!(config.validate().is_ok());

        config.upload.secret_key.clear();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("upload.secret_key"));
    }

    #[test]
    fn test_validate_upload_rejects_bad_endpoint() {
        let mut config = upload_config();
        config.upload.endpoint = "not a url".into();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("upload.endpoint"));
    }

    #[test]
    fn test_validate_ignores_upload_fields_when_disabled() {
        let mut config = upload_config();
        config.upload.enabled = false;
        config.upload.bucket.clear();
        assert!(config.validate().is_ok());
    }
}
