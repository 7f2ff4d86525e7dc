//! Core data types shared across the pipeline stages.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::pipeline::plan::VariantSpec;

/// A variant written to disk by the processor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactInfo {
    /// Where the artifact was written
    pub path: PathBuf,

    /// Output width in pixels
    pub width: u32,

    /// Output height in pixels
    pub height: u32,

    /// Encoded size in bytes
    pub bytes: u64,
}

/// Terminal state of one (source file, variant) work item.
#[derive(Debug)]
pub enum ItemOutcome {
    /// Artifact produced (and uploaded, when enabled) and recorded in the cache
    Done {
        artifact: ArtifactInfo,
        uploaded: bool,
    },

    /// Variant key was already present in the cache
    SkippedByCache,

    /// Processing or uploading failed; nothing was recorded
    Failed(crate::error::PipelineError),
}

/// A failed work item with enough context to reproduce it.
#[derive(Debug, Clone, Serialize)]
pub struct FailedItem {
    pub source: PathBuf,
    pub spec: VariantSpec,
    pub kind: &'static str,
    pub message: String,
}

/// Aggregate result of a pipeline run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    /// Source files discovered
    pub files: usize,

    /// Work items planned (files × variants)
    pub planned: usize,

    /// Items that produced a new artifact
    pub produced: usize,

    /// Produced items that were pushed to object storage
    pub uploaded: usize,

    /// Items skipped because their key was cached
    pub skipped: usize,

    /// Items that failed
    pub failed: usize,

    /// Items never scheduled because the run was cancelled
    pub cancelled: usize,

    /// Highest number of source files processed at the same time
    pub peak_active_files: usize,

    /// Wall-clock duration of the run
    #[serde(skip)]
    pub elapsed: Duration,

    /// Details of every failed item
    pub failures: Vec<FailedItem>,
}

impl RunSummary {
    /// Items that reached a terminal state.
    pub fn completed(&self) -> usize {
        self.produced + self.skipped + self.failed
    }

    /// Whether every planned item reached a non-failed terminal state.
    pub fn is_success(&self) -> bool {
        self.failed == 0 && self.cancelled == 0
    }
}
