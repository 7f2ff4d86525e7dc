//! `VADIMAGE_*` environment overrides.
//!
//! Lists are comma separated (`VADIMAGE_IMAGES_SIZES=320,640`), booleans accept
//! `true/false/1/0`. A value that does not parse is a hard `ConfigError`.

use std::str::FromStr;

use crate::error::ConfigError;

use super::{Config, VariantFormat};

impl Config {
    /// Apply overrides from the process environment.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides_from(|var| std::env::var(var).ok())
    }

    /// Apply overrides from an arbitrary variable lookup.
    pub fn apply_overrides_from<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("VADIMAGE_IMAGES_SIZES") {
            self.variants.sizes = parse_list("VADIMAGE_IMAGES_SIZES", &v)?;
        }
        if let Some(v) = get("VADIMAGE_PIXEL_RATIO") {
            self.variants.pixel_ratios = parse_list("VADIMAGE_PIXEL_RATIO", &v)?;
        }
        if let Some(v) = get("VADIMAGE_FORMATS") {
            self.variants.formats = parse_list::<VariantFormat>("VADIMAGE_FORMATS", &v)?;
        }
        if let Some(v) = get("VADIMAGE_QUALITY") {
            self.variants.quality = parse_one("VADIMAGE_QUALITY", &v)?;
        }
        if let Some(v) = get("VADIMAGE_OPTIMIZATION_DIR_NAME") {
            self.paths.optimization_dir_name = v;
        }
        if let Some(v) = get("VADIMAGE_IMAGES_PATH") {
            self.paths.images_path = v;
        }
        if let Some(v) = get("VADIMAGE_BUILD_FOLDER_PATH") {
            self.paths.build_folder_path = v;
        }
        if let Some(v) = get("VADIMAGE_CONCURRENCY") {
            self.processing.concurrency = parse_one("VADIMAGE_CONCURRENCY", &v)?;
        }
        if let Some(v) = get("VADIMAGE_ENABLE_UPLOAD") {
            self.upload.enabled = parse_bool("VADIMAGE_ENABLE_UPLOAD", &v)?;
        }
        if let Some(v) = get("VADIMAGE_UPLOAD_ACCESS_KEY") {
            self.upload.access_key = v;
        }
        if let Some(v) = get("VADIMAGE_UPLOAD_SECRET_KEY") {
            self.upload.secret_key = v;
        }
        if let Some(v) = get("VADIMAGE_UPLOAD_ENDPOINT") {
            self.upload.endpoint = v;
        }
        if let Some(v) = get("VADIMAGE_UPLOAD_BUCKET") {
            self.upload.bucket = v;
        }
        if let Some(v) = get("VADIMAGE_UPLOAD_DOMAIN") {
            self.upload.domain = Some(v);
        }
        Ok(())
    }
}

fn parse_one<T>(var: &str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::EnvError {
        var: var.to_string(),
        message: format!("'{}': {e}", raw.trim()),
    })
}

fn parse_list<T>(var: &str, raw: &str) -> Result<Vec<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| parse_one(var, item))
        .collect()
}

fn parse_bool(var: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        other => Err(ConfigError::EnvError {
            var: var.to_string(),
            message: format!("'{other}' is not a boolean"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |var| map.get(var).cloned()
    }

    #[test]
    fn test_list_overrides() {
        let mut config = Config::default();
        config
            .apply_overrides_from(lookup(&[
                ("VADIMAGE_IMAGES_SIZES", "320, 640"),
                ("VADIMAGE_PIXEL_RATIO", "1,2"),
                ("VADIMAGE_FORMATS", "webp,avif,jpeg"),
                ("VADIMAGE_QUALITY", "80"),
            ]))
            .unwrap();

        assert_eq!(config.variants.sizes, vec![320, 640]);
        assert_eq!(config.variants.pixel_ratios, vec![1, 2]);
        assert_eq!(
            config.variants.formats,
            vec![VariantFormat::Webp, VariantFormat::Avif, VariantFormat::Jpg]
        );
        assert_eq!(config.variants.quality, 80);
    }

    #[test]
    fn test_unknown_format_override_fails_fast() {
        let mut config = Config::default();
        let err = config
            .apply_overrides_from(lookup(&[("VADIMAGE_FORMATS", "webp,tiff")]))
            .unwrap_err();
        assert!(err.to_string().contains("VADIMAGE_FORMATS"));
        assert!(err.to_string().contains("tiff"));
    }

    #[test]
    fn test_upload_overrides() {
        let mut config = Config::default();
        config
            .apply_overrides_from(lookup(&[
                ("VADIMAGE_ENABLE_UPLOAD", "true"),
                ("VADIMAGE_UPLOAD_BUCKET", "assets"),
                ("VADIMAGE_UPLOAD_DOMAIN", "https://cdn.example.com"),
            ]))
            .unwrap();
        assert!(config.upload.enabled);
        assert_eq!(config.upload.bucket, "assets");
        assert_eq!(
            config.upload.domain.as_deref(),
            Some("https://cdn.example.com")
        );
    }

    #[test]
    fn test_invalid_bool_and_number() {
        let mut config = Config::default();
        assert!(config
            .apply_overrides_from(lookup(&[("VADIMAGE_ENABLE_UPLOAD", "maybe")]))
            .is_err());
        assert!(config
            .apply_overrides_from(lookup(&[("VADIMAGE_QUALITY", "300")]))
            .is_err());
    }

    #[test]
    fn test_empty_values_are_ignored() {
        let mut config = Config::default();
        config
            .apply_overrides_from(lookup(&[("VADIMAGE_IMAGES_PATH", "  ")]))
            .unwrap();
        assert_eq!(config.paths.images_path, "public/images");
    }
}
