//! # CheXray
//!
//! A Rust pipeline for multi-label chest X-ray finding classification using
//! the Burn framework. The model shares a convolutional trunk across fourteen
//! independent sigmoid output heads, one per radiological finding, so each
//! finding is learned as its own binary classification on shared features.
//!
//! ## Modules
//!
//! - `config`: run configuration loaded once from a JSON file
//! - `dataset`: manifest loading, augmentation, and Burn dataset/batcher glue
//! - `model`: the shared-trunk multi-head classifier
//! - `training`: epoch loop, LR scheduling, checkpointing, and history
//! - `inference`: batched test-set prediction
//! - `utils`: logging, metrics, and error types
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use chexray::backend::{default_device, TrainingBackend};
//! use chexray::config::RunConfig;
//!
//! let config = RunConfig::load("config.json".as_ref())?;
//! chexray::training::run::<TrainingBackend>(&config, &default_device())?;
//! ```

pub mod backend;
pub mod config;
pub mod dataset;
pub mod inference;
pub mod model;
pub mod training;
pub mod utils;

// Re-export commonly used items for convenience
pub use config::RunConfig;
pub use dataset::manifest::{Manifest, ManifestEntry};
pub use dataset::{XrayBatch, XrayBatcher, XrayDataset, XrayItem};
pub use inference::predictor::{Predictor, SamplePrediction};
pub use model::classifier::{XrayClassifier, XrayClassifierConfig};
pub use training::history::TrainingHistory;
pub use utils::error::{Error, Result};
pub use utils::metrics::EvalMetrics;

/// Number of finding categories in the manifests
pub const NUM_LABELS: usize = 14;

/// Version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
