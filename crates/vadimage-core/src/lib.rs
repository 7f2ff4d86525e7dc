//! vadimage core - responsive image variant generation.
//!
//! Every image under a source tree is rendered into a matrix of variants
//! (logical width × pixel ratio × format), written next to the source in an
//! output subfolder and optionally pushed to S3-compatible storage. A
//! content-addressed cache makes reruns skip everything already produced.
//!
//! ```text
//! Discover → Fingerprint → Plan → [cache hit? skip] → Decode → Resize → Encode → Write → [Upload] → Record
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use vadimage_core::{Config, ContentCache, Pipeline};
//!
//! #[tokio::main]
//! async fn main() -> vadimage_core::Result<()> {
//!     let config = Config::load(None)?;
//!     let cache = Arc::new(ContentCache::load_or_empty(config.cache_path()));
//!     let pipeline = Pipeline::new(config, cache)?;
//!
//!     let summary = pipeline.run().await?;
//!     println!("{} produced, {} cached", summary.produced, summary.skipped);
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod types;
pub mod upload;

// Re-exports for convenient access
pub use cache::ContentCache;
pub use config::Config;
pub use error::{CacheError, ConfigError, PipelineError, PipelineResult, Result, VadImageError};
pub use pipeline::{CancellationToken, DryRunReport, Pipeline, Progress, ProgressSnapshot};
pub use types::{ArtifactInfo, FailedItem, RunSummary};
pub use upload::{ObjectStore, S3Store, UploadSync};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
