//! Variant generation pipeline components.
//!
//! - **discovery**: Find source images, skipping generated output
//! - **plan**: Expand the variant matrix into concrete specs
//! - **hash**: Content fingerprints and variant keys
//! - **decode**: Load, orient and bound the decoding of sources
//! - **encode**: Per-format encoders behind [`VariantCodec`]
//! - **processor**: Resize, encode and write one artifact
//! - **runner**: Bounded, cancellable orchestration of a whole run

pub mod cancel;
pub mod decode;
pub mod discovery;
pub mod encode;
pub mod hash;
pub mod plan;
pub mod processor;
pub mod progress;
pub mod runner;

// Re-exports for convenient access
pub use cancel::CancellationToken;
pub use decode::{DecodedImage, ImageDecoder};
pub use discovery::FileDiscovery;
pub use encode::{ImageCodec, VariantCodec};
pub use hash::{Hasher, VARIANT_KEY_VERSION};
pub use plan::{plan, VariantSpec};
pub use processor::VariantProcessor;
pub use progress::{Progress, ProgressSnapshot};
pub use runner::{DryRunReport, Pipeline};
