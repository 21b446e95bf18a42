//! Best-model checkpointing.
//!
//! Only the single best model (lowest validation loss) is kept on disk:
//! the weights as a Burn record plus a small JSON sidecar describing when
//! and why the checkpoint was taken. Saving again overwrites the previous
//! best, which is how early stopping can restore it later.

use std::path::{Path, PathBuf};

use burn::module::Module;
use burn::prelude::*;
use burn::record::CompactRecorder;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::model::XrayClassifier;
use crate::utils::error::{Error, Result};

/// File stem of the best-model weights inside the checkpoint directory
pub const BEST_MODEL_STEM: &str = "model";

/// Metadata sidecar stored next to the recorded weights
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Epoch the checkpoint was taken at (1-based)
    pub epoch: usize,
    /// Validation loss that made this the best model so far
    pub val_loss: f64,
    /// Learning rate in effect at save time
    pub learning_rate: f64,
    /// When the checkpoint was written
    pub timestamp: DateTime<Utc>,
}

/// Saves and restores the best model in a fixed directory
#[derive(Debug, Clone)]
pub struct Checkpointer {
    dir: PathBuf,
}

impl Checkpointer {
    /// Create a checkpointer rooted at `dir`, creating the directory first
    pub fn new(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir).map_err(|e| {
            Error::Training(format!(
                "Failed to create checkpoint directory {}: {}",
                dir.display(),
                e
            ))
        })?;

        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    /// Path of the recorded weights (Burn appends the `.mpk` extension)
    pub fn weights_path(&self) -> PathBuf {
        self.dir.join(BEST_MODEL_STEM)
    }

    fn sidecar_path(&self) -> PathBuf {
        self.dir.join("checkpoint.json")
    }

    /// Persist the model and its metadata, replacing any previous best
    pub fn save_best<B: Backend>(
        &self,
        model: &XrayClassifier<B>,
        checkpoint: &Checkpoint,
    ) -> Result<()> {
        model
            .clone()
            .save_file(self.weights_path(), &CompactRecorder::new())
            .map_err(|e| Error::Model(format!("Failed to save checkpoint: {}", e)))?;

        let json = serde_json::to_string_pretty(checkpoint)?;
        std::fs::write(self.sidecar_path(), json)?;

        info!(
            "Saved best model (epoch {}, val_loss {:.4}) to {}",
            checkpoint.epoch,
            checkpoint.val_loss,
            self.dir.display()
        );
        Ok(())
    }

    /// Restore the best weights into a freshly initialized model
    pub fn load_best<B: Backend>(
        &self,
        model: XrayClassifier<B>,
        device: &B::Device,
    ) -> Result<XrayClassifier<B>> {
        model
            .load_file(self.weights_path(), &CompactRecorder::new(), device)
            .map_err(|e| Error::Model(format!("Failed to load checkpoint: {}", e)))
    }

    /// Read the metadata sidecar, if a checkpoint has been saved
    pub fn load_metadata(&self) -> Result<Checkpoint> {
        let json = std::fs::read_to_string(self.sidecar_path())?;
        Ok(serde_json::from_str(&json)?)
    }
}
