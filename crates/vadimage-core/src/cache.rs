//! Content-addressed memo of completed variants.
//!
//! The cache is a set of variant keys (see [`Hasher::variant_key`]). A key is
//! present when that exact output has been produced and is assumed to still
//! exist, locally or in object storage. There is no expiry and no per-entry
//! metadata.
//!
//! Losing the cache is always safe: every variant is rebuilt and the output
//! paths are deterministic, so the rebuild overwrites the same files. A wrong
//! positive entry is the dangerous case (a silently missing output), which is
//! why keys cover every encode input and are versioned.
//!
//! ## Storage
//!
//! A single JSON document holding a sorted array of key strings. Saves go to a
//! sibling temp file which is fsynced and renamed over the target, so a crash
//! mid-save leaves the previous document intact.
//!
//! [`Hasher::variant_key`]: crate::pipeline::Hasher::variant_key

use std::collections::HashSet;
use std::fs::File;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::CacheError;

/// Persistent set of produced variant keys.
#[derive(Debug)]
pub struct ContentCache {
    path: PathBuf,
    keys: Mutex<HashSet<String>>,
    /// Entries recorded since the last successful save.
    dirty: AtomicUsize,
    /// Serializes writers of the cache file.
    save_lock: Mutex<()>,
}

impl ContentCache {
    /// Create an empty cache that will be saved to `path`.
    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Self::with_keys(path.into(), HashSet::new())
    }

    fn with_keys(path: PathBuf, keys: HashSet<String>) -> Self {
        Self {
            path,
            keys: Mutex::new(keys),
            dirty: AtomicUsize::new(0),
            save_lock: Mutex::new(()),
        }
    }

    /// Load the cache document at `path`.
    ///
    /// A missing file yields an empty cache. A file that exists but is not a
    /// JSON array of strings is reported as [`CacheError::Corrupt`].
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let path = path.into();
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Self::empty(path)),
            Err(source) => return Err(CacheError::Io { path, source }),
        };
        let keys: Vec<String> = match serde_json::from_str(&content) {
            Ok(keys) => keys,
            Err(source) => return Err(CacheError::Corrupt { path, source }),
        };
        tracing::debug!("Loaded {} cache entries from {:?}", keys.len(), path);
        Ok(Self::with_keys(path, keys.into_iter().collect()))
    }

    /// Load the cache, treating a corrupt or unreadable file as empty.
    ///
    /// The next save replaces the bad document.
    pub fn load_or_empty(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        match Self::load(&path) {
            Ok(cache) => cache,
            Err(e) => {
                tracing::warn!("{e}; starting with an empty cache (full rebuild)");
                Self::empty(path)
            }
        }
    }

    /// Location the cache is saved to.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn contains(&self, key: &str) -> bool {
        self.lock_keys().contains(key)
    }

    /// Add a key. Returns `false` if it was already present.
    pub fn record(&self, key: impl Into<String>) -> bool {
        let inserted = self.lock_keys().insert(key.into());
        if inserted {
            self.dirty.fetch_add(1, Ordering::SeqCst);
        }
        inserted
    }

    pub fn len(&self) -> usize {
        self.lock_keys().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock_keys().is_empty()
    }

    /// Drop every entry. The next save writes an empty document.
    pub fn clear(&self) {
        let mut keys = self.lock_keys();
        if !keys.is_empty() {
            keys.clear();
            self.dirty.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Number of entries recorded since the last save.
    pub fn dirty_count(&self) -> usize {
        self.dirty.load(Ordering::SeqCst)
    }

    /// Persist the full key set to the cache path.
    pub fn save(&self) -> Result<(), CacheError> {
        self.save_to(&self.path)
    }

    /// Persist the full key set to `path` (write temp, fsync, rename).
    pub fn save_to(&self, path: &Path) -> Result<(), CacheError> {
        let _guard = self
            .save_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let (snapshot, dirty_at_snapshot) = {
            let keys = self.lock_keys();
            let mut sorted: Vec<&String> = keys.iter().collect();
            sorted.sort();
            let json = serde_json::to_string_pretty(&sorted).map_err(|e| CacheError::Io {
                path: path.to_path_buf(),
                source: std::io::Error::other(e),
            })?;
            (json, self.dirty.load(Ordering::SeqCst))
        };

        write_atomic(path, snapshot.as_bytes()).map_err(|source| CacheError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.dirty.fetch_sub(dirty_at_snapshot, Ordering::SeqCst);
        tracing::debug!("Saved cache to {:?}", path);
        Ok(())
    }

    fn lock_keys(&self) -> MutexGuard<'_, HashSet<String>> {
        // Entries are append-only and idempotent, so a poisoned set is still valid.
        self.keys.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent)?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "cache.json".to_string());
    let tmp = parent.join(format!(".{file_name}.tmp"));

    {
        let mut file = File::create(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }
    if let Err(e) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(e);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ContentCache::load(dir.path().join("nope.json")).unwrap();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_round_trip_preserves_membership() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");

        let cache = ContentCache::empty(&path);
        assert!(cache.record("aaa"));
        assert!(cache.record("bbb"));
        assert!(!cache.record("aaa"));
        cache.save().unwrap();

        let reloaded = ContentCache::load(&path).unwrap();
        assert_eq!(reloaded.len(), 2);
        assert!(reloaded.contains("aaa"));
        assert!(reloaded.contains("bbb"));
        assert!(!reloaded.contains("ccc"));
    }

    #[test]
    fn test_document_is_plain_string_array() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        let cache = ContentCache::empty(&path);
        cache.record("zzz");
        cache.record("aaa");
        cache.save().unwrap();

        let raw: Vec<String> =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw, vec!["aaa".to_string(), "zzz".to_string()]);
    }

    #[test]
    fn test_corrupt_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = ContentCache::load(&path).unwrap_err();
        assert!(matches!(err, CacheError::Corrupt { .. }));
    }

    #[test]
    fn test_corrupt_file_falls_back_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        std::fs::write(&path, "{\"version\": 3}").unwrap();

        let cache = ContentCache::load_or_empty(&path);
        assert!(cache.is_empty());
        cache.record("fresh");
        cache.save().unwrap();
        assert!(ContentCache::load(&path).unwrap().contains("fresh"));
    }

    #[test]
    fn test_save_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        let cache = ContentCache::empty(&path);
        cache.record("k");
        cache.save().unwrap();

        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names.len(), 1);
    }

    #[test]
    fn test_dirty_count_resets_after_save() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ContentCache::empty(dir.path().join("cache.json"));
        cache.record("a");
        cache.record("b");
        assert_eq!(cache.dirty_count(), 2);
        cache.save().unwrap();
        assert_eq!(cache.dirty_count(), 0);
    }

    #[test]
    fn test_concurrent_records() {
        let dir = tempfile::tempdir().unwrap();
        let cache = Arc::new(ContentCache::empty(dir.path().join("cache.json")));

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let cache = cache.clone();
                std::thread::spawn(move || {
                    for i in 0..100 {
                        cache.record(format!("{t}-{i}"));
                        cache.record(format!("shared-{i}"));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(cache.len(), 8 * 100 + 100);
    }

    #[test]
    fn test_clear_then_save_writes_empty_array() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        let cache = ContentCache::empty(&path);
        cache.record("a");
        cache.save().unwrap();

        cache.clear();
        cache.save().unwrap();
        assert!(ContentCache::load(&path).unwrap().is_empty());
    }
}
