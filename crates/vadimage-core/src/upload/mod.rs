//! Publishing variants to object storage.
//!
//! Once an artifact is pushed, the remote copy is authoritative and the local
//! file is deleted. A failed push leaves the local file in place so the next
//! run can retry it (the pipeline also withholds the cache entry).

mod s3;
pub mod sigv4;

pub use s3::S3Store;

use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use crate::error::PipelineError;

/// Remote object store that accepts public-read PUTs.
///
/// Uses `async_trait` because native async fn in trait is not object-safe
/// (the pipeline holds an `Arc<dyn ObjectStore>`).
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store name for logging (e.g., "s3").
    fn name(&self) -> &str;

    /// Upload `body` under `key` with public-read access.
    async fn put_object(
        &self,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<(), PipelineError>;
}

/// Result of a successful upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedObject {
    /// Object key in the bucket
    pub key: String,
    /// Public URL, when a serving domain is configured
    pub url: Option<String>,
}

/// Pushes artifacts to an [`ObjectStore`] and removes the local copies.
#[derive(Clone)]
pub struct UploadSync {
    store: Arc<dyn ObjectStore>,
    local_base: PathBuf,
    public_domain: Option<String>,
}

impl UploadSync {
    /// `local_base` is stripped from artifact paths to form object keys.
    pub fn new(store: Arc<dyn ObjectStore>, local_base: &Path) -> Self {
        let local_base = std::fs::canonicalize(local_base).unwrap_or_else(|_| local_base.into());
        Self {
            store,
            local_base,
            public_domain: None,
        }
    }

    /// Set the domain objects are served from (e.g. `https://cdn.example.com`).
    pub fn with_public_domain(mut self, domain: Option<String>) -> Self {
        self.public_domain = domain.filter(|d| !d.trim().is_empty());
        self
    }

    /// Object key for a local artifact: the path below the local base, `/`-separated.
    pub fn object_key(&self, local: &Path) -> Result<String, PipelineError> {
        let relative = local
            .strip_prefix(&self.local_base)
            .map_err(|_| PipelineError::Upload {
                path: local.to_path_buf(),
                message: format!("path is outside upload base {:?}", self.local_base),
                status_code: None,
            })?;
        let segments: Vec<String> = relative
            .components()
            .filter_map(|c| match c {
                Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect();
        if segments.is_empty() {
            return Err(PipelineError::Upload {
                path: local.to_path_buf(),
                message: "empty object key".to_string(),
                status_code: None,
            });
        }
        Ok(segments.join("/"))
    }

    /// Public URL of an object key.
    pub fn public_url(&self, key: &str) -> Option<String> {
        self.public_domain
            .as_ref()
            .map(|domain| format!("{}/{}", domain.trim_end_matches('/'), key))
    }

    /// Push `local` to the store, then delete it.
    ///
    /// A failed delete after a successful push only logs a warning; the
    /// leftover file is harmless.
    pub async fn upload(&self, local: &Path) -> Result<UploadedObject, PipelineError> {
        let key = self.object_key(local)?;
        let body = tokio::fs::read(local)
            .await
            .map_err(|e| PipelineError::io(local, e))?;
        let content_type = content_type_for(local);

        self.store
            .put_object(&key, body, content_type)
            .await
            .map_err(|e| match e {
                PipelineError::Upload {
                    message,
                    status_code,
                    ..
                } => PipelineError::Upload {
                    path: local.to_path_buf(),
                    message: format!("{} put {key}: {message}", self.store.name()),
                    status_code,
                },
                other => other,
            })?;

        if let Err(e) = tokio::fs::remove_file(local).await {
            tracing::warn!("Uploaded {key} but could not delete {:?}: {e}", local);
        }

        Ok(UploadedObject {
            url: self.public_url(&key),
            key,
        })
    }
}

/// MIME type from the file extension.
pub fn content_type_for(path: &Path) -> &'static str {
    image::ImageFormat::from_path(path)
        .map(|format| format.to_mime_type())
        .unwrap_or("application/octet-stream")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Records every put and optionally fails them.
    #[derive(Default)]
    struct MockStore {
        puts: Mutex<Vec<(String, usize, String)>>,
        fail: bool,
    }

    #[async_trait]
    impl ObjectStore for MockStore {
        fn name(&self) -> &str {
            "mock"
        }

        async fn put_object(
            &self,
            key: &str,
            body: Vec<u8>,
            content_type: &str,
        ) -> Result<(), PipelineError> {
            if self.fail {
                return Err(PipelineError::Upload {
                    path: PathBuf::from(key),
                    message: "HTTP 503".to_string(),
                    status_code: Some(503),
                });
            }
            self.puts
                .lock()
                .unwrap()
                .push((key.to_string(), body.len(), content_type.to_string()));
            Ok(())
        }
    }

    fn artifact(dir: &Path) -> PathBuf {
        let path = dir.join("images/blog/opt/hero-320w-2x.webp");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, b"webp-bytes").unwrap();
        std::fs::canonicalize(path).unwrap()
    }

    #[tokio::test]
    async fn test_upload_pushes_and_deletes_local() {
        let dir = tempfile::tempdir().unwrap();
        let local = artifact(dir.path());
        let store = Arc::new(MockStore::default());
        let sync = UploadSync::new(store.clone(), dir.path())
            .with_public_domain(Some("https://cdn.example.com/".into()));

        let uploaded = sync.upload(&local).await.unwrap();

        assert_eq!(uploaded.key, "images/blog/opt/hero-320w-2x.webp");
        assert_eq!(
            uploaded.url.as_deref(),
            Some("https://cdn.example.com/images/blog/opt/hero-320w-2x.webp")
        );
        assert!(!local.exists());
        let puts = store.puts.lock().unwrap();
        assert_eq!(puts.len(), 1);
        assert_eq!(puts[0].1, 10);
        assert_eq!(puts[0].2, "image/webp");
    }

    #[tokio::test]
    async fn test_failed_upload_keeps_local_file() {
        let dir = tempfile::tempdir().unwrap();
        let local = artifact(dir.path());
        let store = Arc::new(MockStore {
            fail: true,
            ..Default::default()
        });
        let sync = UploadSync::new(store, dir.path());

        let err = sync.upload(&local).await.unwrap_err();
        assert_eq!(err.kind(), "upload");
        assert!(err.to_string().contains("hero-320w-2x.webp"));
        assert!(local.exists());
    }

    #[test]
    fn test_object_key_outside_base_is_error() {
        let sync = UploadSync::new(Arc::new(MockStore::default()), Path::new("/srv/public"));
        assert!(sync.object_key(Path::new("/elsewhere/a.webp")).is_err());
        assert_eq!(
            sync.object_key(Path::new("/srv/public/img/a.webp")).unwrap(),
            "img/a.webp"
        );
    }

    #[test]
    fn test_content_type_for_extensions() {
        assert_eq!(content_type_for(Path::new("a.webp")), "image/webp");
        assert_eq!(content_type_for(Path::new("a.jpg")), "image/jpeg");
        assert_eq!(content_type_for(Path::new("a.avif")), "image/avif");
        assert_eq!(content_type_for(Path::new("a.png")), "image/png");
        assert_eq!(
            content_type_for(Path::new("a.unknown")),
            "application/octet-stream"
        );
    }
}
