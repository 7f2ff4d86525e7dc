//! S3-compatible object store (AWS, DigitalOcean Spaces, MinIO, ...).
//!
//! Uses path-style addressing (`{endpoint}/{bucket}/{key}`), which every
//! S3-compatible service accepts.

use async_trait::async_trait;
use chrono::Utc;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use std::path::PathBuf;
use std::time::Duration;

use super::sigv4::{amz_date, sha256_hex, CanonicalRequest, Signer};
use super::ObjectStore;
use crate::config::UploadConfig;
use crate::error::{ConfigError, PipelineError};

/// Everything except RFC 3986 unreserved characters is encoded.
const SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// S3 PUT-object client signed with Signature V4.
pub struct S3Store {
    client: reqwest::Client,
    origin: String,
    host: String,
    base_path: String,
    bucket: String,
    signer: Signer,
}

impl S3Store {
    /// Build a store from validated upload settings.
    pub fn new(config: &UploadConfig) -> Result<Self, ConfigError> {
        let endpoint = reqwest::Url::parse(&config.endpoint).map_err(|e| {
            ConfigError::ValidationError(format!(
                "upload.endpoint {:?} is not a URL: {e}",
                config.endpoint
            ))
        })?;
        let host_name = endpoint.host_str().ok_or_else(|| {
            ConfigError::ValidationError(format!("upload.endpoint {:?} has no host", config.endpoint))
        })?;
        let host = match endpoint.port() {
            Some(port) => format!("{host_name}:{port}"),
            None => host_name.to_string(),
        };

        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ConfigError::ValidationError(format!("HTTP client: {e}")))?;

        Ok(Self {
            client,
            origin: format!("{}://{host}", endpoint.scheme()),
            base_path: endpoint.path().trim_end_matches('/').to_string(),
            host,
            bucket: config.bucket.clone(),
            signer: Signer::new(&config.access_key, &config.secret_key, &config.region, "s3"),
        })
    }

    /// Percent-encoded request path for `key`.
    fn object_path(&self, key: &str) -> String {
        let mut path = self.base_path.clone();
        for segment in std::iter::once(self.bucket.as_str()).chain(key.split('/')) {
            path.push('/');
            path.extend(utf8_percent_encode(segment, SEGMENT));
        }
        path
    }

    /// Full request URL for `key`.
    pub fn object_url(&self, key: &str) -> String {
        format!("{}{}", self.origin, self.object_path(key))
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    fn name(&self) -> &str {
        "s3"
    }

    async fn put_object(
        &self,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<(), PipelineError> {
        let now = Utc::now();
        let payload_hash = sha256_hex(&body);
        let path = self.object_path(key);
        let headers = vec![
            ("content-type".to_string(), content_type.to_string()),
            ("host".to_string(), self.host.clone()),
            ("x-amz-acl".to_string(), "public-read".to_string()),
            ("x-amz-content-sha256".to_string(), payload_hash.clone()),
            ("x-amz-date".to_string(), amz_date(now)),
        ];
        let authorization = self.signer.authorization(
            &CanonicalRequest {
                method: "PUT",
                uri: &path,
                query: "",
                headers: headers.clone(),
                payload_hash: &payload_hash,
            },
            now,
        );

        let mut request = self
            .client
            .put(format!("{}{}", self.origin, path))
            .header("authorization", authorization)
            .body(body);
        for (name, value) in &headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let resp = request.send().await.map_err(|e| PipelineError::Upload {
            path: PathBuf::from(key),
            message: format!("request failed: {e}"),
            status_code: None,
        })?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(PipelineError::Upload {
                path: PathBuf::from(key),
                message: format!("HTTP {status}: {}", text.trim()),
                status_code: Some(status.as_u16()),
            });
        }

        tracing::debug!("PUT {key} -> {status}");
        Ok(())
    }
}
