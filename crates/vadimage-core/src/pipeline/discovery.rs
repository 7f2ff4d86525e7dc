//! Source image discovery.

use std::fs::File;
use std::io::Read;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

use crate::error::PipelineError;

/// Finds source images under a root, skipping generated output.
#[derive(Debug, Clone)]
pub struct FileDiscovery {
    /// Relative subpath (e.g. `opt`) whose contents are never sources
    exclude_subpath: PathBuf,
    /// Absolute directories skipped entirely (e.g. the build folder)
    excluded_roots: Vec<PathBuf>,
}

impl FileDiscovery {
    /// Create a discovery that ignores files under any `exclude_subpath` directory.
    pub fn new(exclude_subpath: impl Into<PathBuf>) -> Self {
        Self {
            exclude_subpath: exclude_subpath.into(),
            excluded_roots: Vec::new(),
        }
    }

    /// Also ignore everything below `dir`, if it exists.
    pub fn with_excluded_root(mut self, dir: &Path) -> Self {
        if let Ok(canonical) = std::fs::canonicalize(dir) {
            self.excluded_roots.push(canonical);
        }
        self
    }

    /// Walk `root` and yield absolute paths of source images, lazily.
    ///
    /// Fails only when `root` itself is missing or unreadable. Entries that
    /// cannot be read during the walk are logged and skipped.
    pub fn discover<'a>(
        &'a self,
        root: &Path,
    ) -> Result<impl Iterator<Item = PathBuf> + 'a, PipelineError> {
        let root = std::fs::canonicalize(root).map_err(|e| PipelineError::io(root, e))?;
        if !root.is_dir() {
            return Err(PipelineError::io(
                &root,
                std::io::Error::new(std::io::ErrorKind::InvalidInput, "not a directory"),
            ));
        }
        std::fs::read_dir(&root).map_err(|e| PipelineError::io(&root, e))?;

        let walker = WalkDir::new(&root)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter();

        Ok(walker.filter_map(move |entry| {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!("Skipping unreadable entry: {e}");
                    return None;
                }
            };
            if !entry.file_type().is_file() {
                return None;
            }
            let path = entry.into_path();
            if self.is_excluded(&root, &path) {
                return None;
            }
            match is_image(&path) {
                Ok(true) => Some(path),
                Ok(false) => None,
                Err(e) => {
                    tracing::warn!("Skipping unreadable file {:?}: {e}", path);
                    None
                }
            }
        }))
    }

    fn is_excluded(&self, root: &Path, path: &Path) -> bool {
        if self.excluded_roots.iter().any(|dir| path.starts_with(dir)) {
            return true;
        }
        let relative_dir = path
            .strip_prefix(root)
            .ok()
            .and_then(Path::parent)
            .unwrap_or_else(|| Path::new(""));
        contains_subpath(relative_dir, &self.exclude_subpath)
    }
}

/// Whether `path` contains the components of `sub` as a contiguous run.
pub fn contains_subpath(path: &Path, sub: &Path) -> bool {
    let needle: Vec<Component> = sub
        .components()
        .filter(|c| matches!(c, Component::Normal(_)))
        .collect();
    if needle.is_empty() {
        return false;
    }
    let haystack: Vec<Component> = path.components().collect();
    haystack
        .windows(needle.len())
        .any(|window| window == needle.as_slice())
}

/// Classify a file as an image by sniffing its header, falling back to the extension.
fn is_image(path: &Path) -> std::io::Result<bool> {
    let mut file = File::open(path)?;
    let mut header = [0u8; 16];
    let read = file.read(&mut header)?;
    if image::guess_format(&header[..read]).is_ok() {
        return Ok(true);
    }
    Ok(image::ImageFormat::from_path(path).is_ok())
}
