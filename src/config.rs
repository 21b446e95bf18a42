//! Run Configuration
//!
//! The entire run is driven by a flat JSON configuration file read once at
//! startup and immutable afterwards. Key names are uppercase to match the
//! manifest-producing tooling upstream of this pipeline.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::utils::error::{Error, Result};
use crate::NUM_LABELS;

/// Flat run configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Directory containing `train.csv`, `valid.csv`, and `test.csv`
    #[serde(rename = "META_BASE_PATH")]
    pub meta_base_path: PathBuf,

    /// Base directory the manifests' relative image paths are rooted at
    #[serde(rename = "IMAGE_BASE_PATH")]
    pub image_base_path: PathBuf,

    /// Target image height in pixels
    #[serde(rename = "IMG_HEIGHT")]
    pub img_height: usize,

    /// Target image width in pixels
    #[serde(rename = "IMG_WIDTH")]
    pub img_width: usize,

    /// Batch size for training and validation
    #[serde(rename = "BATCH_SIZE")]
    pub batch_size: usize,

    /// Batch size for test-set inference
    #[serde(rename = "TEST_BATCH")]
    pub test_batch: usize,

    /// Number of output heads; must match the fixed label set
    #[serde(rename = "NUM_CLASSES")]
    pub num_classes: usize,

    /// Initial learning rate for the Adam optimizer
    #[serde(rename = "INITIAL_LR")]
    pub initial_lr: f64,

    /// Upper bound on training epochs (early stopping may end sooner)
    #[serde(rename = "MAX_EPOCHS")]
    pub max_epochs: usize,

    /// Directory for the best checkpoint and run artifacts
    #[serde(rename = "WEIGHTS_DIR")]
    pub weights_dir: PathBuf,

    /// Optional recorded trunk weights to start from
    #[serde(rename = "PRETRAINED_WEIGHTS", default)]
    pub pretrained_weights: Option<PathBuf>,

    /// Random seed for shuffling and augmentation
    #[serde(rename = "SEED", default = "default_seed")]
    pub seed: u64,
}

fn default_seed() -> u64 {
    1
}

impl RunConfig {
    /// Load and validate a configuration from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read config {}: {}", path.display(), e))
        })?;

        let config: RunConfig = serde_json::from_str(&json).map_err(|e| {
            Error::Config(format!("Failed to parse config {}: {}", path.display(), e))
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.num_classes != NUM_LABELS {
            return Err(Error::Config(format!(
                "NUM_CLASSES must be {} to match the label set, got {}",
                NUM_LABELS, self.num_classes
            )));
        }

        if self.img_height == 0 || self.img_width == 0 {
            return Err(Error::Config(
                "IMG_HEIGHT and IMG_WIDTH must be positive".to_string(),
            ));
        }

        if self.batch_size == 0 || self.test_batch == 0 {
            return Err(Error::Config(
                "BATCH_SIZE and TEST_BATCH must be positive".to_string(),
            ));
        }

        if self.initial_lr <= 0.0 {
            return Err(Error::Config(format!(
                "INITIAL_LR must be positive, got {}",
                self.initial_lr
            )));
        }

        if self.max_epochs == 0 {
            return Err(Error::Config("MAX_EPOCHS must be positive".to_string()));
        }

        Ok(())
    }

    /// Target image size as (height, width)
    pub fn image_size(&self) -> (usize, usize) {
        (self.img_height, self.img_width)
    }
}
