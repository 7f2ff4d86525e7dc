//! End-to-end orchestration of a variant run.
//!
//! Discovery and planning happen up front so the total is known before the
//! first item completes. Source files are then processed by a bounded pool;
//! the variants of one file run one after another inside that file's task and
//! share a single decode.

use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::cache::ContentCache;
use crate::config::Config;
use crate::error::{ConfigError, PipelineError, Result};
use crate::types::{FailedItem, ItemOutcome, RunSummary};
use crate::upload::{ObjectStore, S3Store, UploadSync};

use super::cancel::CancellationToken;
use super::decode::ImageDecoder;
use super::discovery::FileDiscovery;
use super::encode::{ImageCodec, VariantCodec};
use super::hash::Hasher;
use super::plan::{self, VariantSpec};
use super::processor::VariantProcessor;
use super::progress::Progress;

/// What a run would do, without doing it.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DryRunReport {
    pub files: usize,
    pub planned: usize,
    /// Items whose key is already cached
    pub cached: usize,
    /// Items that would be generated
    pub pending: usize,
    /// Files that could not be read
    pub unreadable: usize,
}

/// A configured variant run.
pub struct Pipeline {
    config: Config,
    processor: VariantProcessor,
    uploader: Option<UploadSync>,
    cache: Arc<ContentCache>,
    progress: Progress,
    cancel: CancellationToken,
}

impl Pipeline {
    /// Build a pipeline with the default codec and, when upload is enabled,
    /// an S3 store from the upload settings.
    pub fn new(config: Config, cache: Arc<ContentCache>) -> std::result::Result<Self, ConfigError> {
        let processor = VariantProcessor::new(
            ImageDecoder::new(config.limits.clone()),
            Arc::new(ImageCodec::new(config.variants.avif_speed)),
        );
        let mut pipeline = Self {
            processor,
            uploader: None,
            cache,
            progress: Progress::new(),
            cancel: CancellationToken::new(),
            config,
        };
        if pipeline.config.upload.enabled {
            let store = S3Store::new(&pipeline.config.upload)?;
            pipeline = pipeline.with_store(Arc::new(store));
        }
        Ok(pipeline)
    }

    /// Replace the encoder.
    pub fn with_codec(mut self, codec: Arc<dyn VariantCodec>) -> Self {
        self.processor = VariantProcessor::new(self.processor.decoder().clone(), codec);
        self
    }

    /// Upload every produced artifact to `store`.
    ///
    /// Enables upload regardless of `upload.enabled`.
    pub fn with_store(mut self, store: Arc<dyn ObjectStore>) -> Self {
        let uploader = UploadSync::new(store, &self.config.upload_base_dir())
            .with_public_domain(self.config.upload.domain.clone());
        self.uploader = Some(uploader);
        self
    }

    pub fn with_progress(mut self, progress: Progress) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn cache(&self) -> &Arc<ContentCache> {
        &self.cache
    }

    /// The variant matrix owed per source file.
    pub fn variants(&self) -> Vec<VariantSpec> {
        plan::plan(&self.config.variants)
    }

    fn discovery(&self) -> FileDiscovery {
        FileDiscovery::new(self.config.optimization_dir_name())
            .with_excluded_root(&self.config.build_dir())
    }

    /// Collect every source so the planned total is known up front.
    fn discover_sources(&self) -> std::result::Result<Vec<PathBuf>, PipelineError> {
        let discovery = self.discovery();
        let files = discovery.discover(&self.config.images_dir())?.collect();
        Ok(files)
    }

    /// Run discovery, planning, processing and upload.
    ///
    /// Only setup failures (e.g. a missing images directory) are returned as
    /// errors. Per-item failures are logged and counted in the summary.
    pub async fn run(&self) -> Result<RunSummary> {
        let start = Instant::now();
        let files = self.discover_sources()?;
        let specs = Arc::new(self.variants());

        let mut summary = RunSummary {
            files: files.len(),
            planned: files.len() * specs.len(),
            ..Default::default()
        };
        self.progress.set_total(summary.planned);
        tracing::info!(
            "Found {} source images, {} variants each ({} items)",
            summary.files,
            specs.len(),
            summary.planned
        );

        let worker = Arc::new(FileWorker {
            processor: self.processor.clone(),
            uploader: self.uploader.clone(),
            cache: self.cache.clone(),
            progress: self.progress.clone(),
            cancel: self.cancel.clone(),
            specs,
            optimization_dir: self.config.optimization_dir_name().to_string(),
        });
        let flush_interval = self.config.processing.cache_flush_interval;
        let semaphore = Arc::new(Semaphore::new(self.config.processing.concurrency));
        let mut tasks = JoinSet::new();

        for path in files {
            if self.cancel.is_cancelled() {
                break;
            }
            let permit = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                permit = semaphore.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => {
                        tracing::warn!("Worker semaphore closed unexpectedly, stopping run");
                        break;
                    }
                },
            };

            let worker = worker.clone();
            tasks.spawn(async move {
                let report = worker.process_file(&path).await;
                drop(permit);
                report
            });

            while let Some(joined) = tasks.try_join_next() {
                absorb(&mut summary, joined);
            }
            self.flush_if_due(flush_interval).await;
        }

        while let Some(joined) = tasks.join_next().await {
            absorb(&mut summary, joined);
            self.flush_if_due(flush_interval).await;
        }

        summary.cancelled = summary.planned.saturating_sub(summary.completed());
        summary.peak_active_files = self.progress.peak_active_files();
        summary.elapsed = start.elapsed();

        if self.cancel.is_cancelled() {
            tracing::warn!(
                "Run cancelled, {} items not processed",
                summary.cancelled
            );
        }
        self.flush().await;

        tracing::info!(
            "Done: {} produced, {} uploaded, {} cached, {} failed in {:.1}s",
            summary.produced,
            summary.uploaded,
            summary.skipped,
            summary.failed,
            summary.elapsed.as_secs_f64()
        );
        Ok(summary)
    }

    /// Count cached and pending items without producing anything.
    pub async fn dry_run(&self) -> Result<DryRunReport> {
        let files = self.discover_sources()?;
        let specs = self.variants();
        let mut report = DryRunReport {
            files: files.len(),
            planned: files.len() * specs.len(),
            ..Default::default()
        };

        for path in &files {
            let bytes = match tokio::fs::read(path).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    tracing::warn!("Cannot read {:?}: {e}", path);
                    report.unreadable += 1;
                    report.pending += specs.len();
                    continue;
                }
            };
            let fingerprint = Hasher::content_hash_from_bytes(&bytes);
            for spec in &specs {
                if self.cache.contains(&Hasher::variant_key(&fingerprint, spec)) {
                    report.cached += 1;
                } else {
                    report.pending += 1;
                }
            }
        }
        Ok(report)
    }

    /// Save once `interval` new keys are pending. An interval of 0 leaves
    /// saving to the end of the run.
    async fn flush_if_due(&self, interval: usize) {
        if interval > 0 && self.cache.dirty_count() >= interval {
            self.flush().await;
        }
    }

    async fn flush(&self) {
        if self.cache.dirty_count() == 0 {
            return;
        }
        let cache = self.cache.clone();
        match tokio::task::spawn_blocking(move || cache.save()).await {
            Ok(Ok(())) => tracing::debug!("Saved cache ({} entries)", self.cache.len()),
            // Losing entries only costs a rebuild on the next run.
            Ok(Err(e)) => tracing::error!("Failed to save cache: {e}"),
            Err(e) => tracing::error!("Cache save task failed: {e}"),
        }
    }
}

/// Per-file tallies returned by a worker task.
#[derive(Debug, Default)]
struct FileReport {
    produced: usize,
    uploaded: usize,
    skipped: usize,
    failures: Vec<FailedItem>,
}

fn absorb(
    summary: &mut RunSummary,
    joined: std::result::Result<FileReport, tokio::task::JoinError>,
) {
    match joined {
        Ok(report) => {
            summary.produced += report.produced;
            summary.uploaded += report.uploaded;
            summary.skipped += report.skipped;
            summary.failed += report.failures.len();
            summary.failures.extend(report.failures);
        }
        // Its unfinished items end up counted as cancelled.
        Err(e) => tracing::error!("File task panicked: {e}"),
    }
}

/// Everything a file task needs, shared across tasks.
struct FileWorker {
    processor: VariantProcessor,
    uploader: Option<UploadSync>,
    cache: Arc<ContentCache>,
    progress: Progress,
    cancel: CancellationToken,
    specs: Arc<Vec<VariantSpec>>,
    optimization_dir: String,
}

impl FileWorker {
    async fn process_file(&self, path: &Path) -> FileReport {
        self.progress.file_started();
        let mut report = FileReport::default();
        self.process_file_inner(path, &mut report).await;
        self.progress.file_finished();
        report
    }

    async fn process_file_inner(&self, path: &Path, report: &mut FileReport) {
        let bytes = match self.read_source(path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                self.fail_all(path, self.specs.iter().copied(), &e, report);
                return;
            }
        };

        let fingerprint = Hasher::content_hash_from_bytes(&bytes);
        let mut misses = Vec::new();
        for spec in self.specs.iter() {
            let key = Hasher::variant_key(&fingerprint, spec);
            if self.cache.contains(&key) {
                self.tally(path, *spec, ItemOutcome::SkippedByCache, report);
            } else {
                misses.push((*spec, key));
            }
        }
        if misses.is_empty() || self.cancel.is_cancelled() {
            return;
        }

        let decoded = match self.processor.decoder().decode_from_bytes(bytes, path).await {
            Ok(decoded) => decoded,
            Err(e) => {
                self.fail_all(path, misses.iter().map(|(spec, _)| *spec), &e, report);
                return;
            }
        };
        tracing::debug!(
            "Decoded {:?} ({}x{} {:?})",
            path,
            decoded.width,
            decoded.height,
            decoded.format
        );
        let image = Arc::new(decoded.image);

        for (spec, key) in misses {
            if self.cancel.is_cancelled() {
                break;
            }
            let output = spec.output_path(path, &self.optimization_dir);
            let outcome = self.produce(image.clone(), spec, &output, key).await;
            self.tally(path, spec, outcome, report);
        }
    }

    /// Count one terminal item outcome and advance progress.
    fn tally(
        &self,
        path: &Path,
        spec: VariantSpec,
        outcome: ItemOutcome,
        report: &mut FileReport,
    ) {
        match outcome {
            ItemOutcome::Done { artifact, uploaded } => {
                tracing::debug!(
                    "Wrote {:?} ({}x{}, {} bytes)",
                    artifact.path,
                    artifact.width,
                    artifact.height,
                    artifact.bytes
                );
                report.produced += 1;
                if uploaded {
                    report.uploaded += 1;
                }
            }
            ItemOutcome::SkippedByCache => {
                tracing::debug!("Cached: {:?} {spec}", path);
                report.skipped += 1;
            }
            ItemOutcome::Failed(e) => report.failures.push(self.failure(path, spec, &e)),
        }
        self.progress.advance();
    }

    async fn read_source(&self, path: &Path) -> std::result::Result<Vec<u8>, PipelineError> {
        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|e| PipelineError::io(path, e))?;
        self.processor.decoder().check_size(path, metadata.len())?;
        tokio::fs::read(path)
            .await
            .map_err(|e| PipelineError::io(path, e))
    }

    /// Produce one artifact, upload it if enabled, then record its key.
    async fn produce(
        &self,
        image: Arc<image::DynamicImage>,
        spec: VariantSpec,
        output: &Path,
        key: String,
    ) -> ItemOutcome {
        let artifact = match self.processor.process_decoded(image, spec, output).await {
            Ok(artifact) => artifact,
            Err(e) => return ItemOutcome::Failed(e),
        };

        let uploaded = match &self.uploader {
            Some(uploader) => match uploader.upload(&artifact.path).await {
                Ok(object) => {
                    match &object.url {
                        Some(url) => tracing::debug!("Uploaded {url}"),
                        None => tracing::debug!("Uploaded {}", object.key),
                    }
                    true
                }
                Err(e) => return ItemOutcome::Failed(e),
            },
            None => false,
        };

        if !self.cache.record(key) {
            // Another file with identical content produced the same key first.
            tracing::debug!("Key for {:?} already recorded", output);
        }
        ItemOutcome::Done { artifact, uploaded }
    }

    fn fail_all(
        &self,
        path: &Path,
        specs: impl Iterator<Item = VariantSpec>,
        error: &PipelineError,
        report: &mut FileReport,
    ) {
        for spec in specs {
            report.failures.push(self.failure(path, spec, error));
            self.progress.advance();
        }
    }

    fn failure(&self, path: &Path, spec: VariantSpec, error: &PipelineError) -> FailedItem {
        tracing::error!("Failed {:?} [{spec}]: {error}", path);
        FailedItem {
            source: path.to_path_buf(),
            spec,
            kind: error.kind(),
            message: error.to_string(),
        }
    }
}
