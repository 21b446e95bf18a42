//! Per-epoch training history, persisted as JSON at the end of a run.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::utils::error::Result;

/// Metrics recorded for one completed epoch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpochRecord {
    /// Epoch number (1-based)
    pub epoch: usize,
    /// Mean training loss over the epoch
    pub train_loss: f64,
    /// Validation loss
    pub val_loss: f64,
    /// Element-wise validation accuracy
    pub val_accuracy: f64,
    /// Macro-averaged validation ROC AUC, when defined
    pub val_auc: Option<f64>,
    /// Learning rate used for the epoch
    pub learning_rate: f64,
}

/// Full history of a training run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrainingHistory {
    pub epochs: Vec<EpochRecord>,
}

impl TrainingHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one epoch's record
    pub fn push(&mut self, record: EpochRecord) {
        self.epochs.push(record);
    }

    /// Lowest validation loss seen so far
    pub fn best_val_loss(&self) -> Option<f64> {
        self.epochs
            .iter()
            .map(|e| e.val_loss)
            .fold(None, |best, loss| match best {
                Some(b) if b <= loss => Some(b),
                _ => Some(loss),
            })
    }

    /// Write the history as pretty-printed JSON
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Read a previously saved history
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(epoch: usize, val_loss: f64) -> EpochRecord {
        EpochRecord {
            epoch,
            train_loss: val_loss + 0.1,
            val_loss,
            val_accuracy: 0.8,
            val_auc: Some(0.7),
            learning_rate: 1e-4,
        }
    }

    #[test]
    fn test_best_val_loss() {
        let mut history = TrainingHistory::new();
        assert_eq!(history.best_val_loss(), None);

        history.push(record(1, 0.9));
        history.push(record(2, 0.4));
        history.push(record(3, 0.6));

        assert_eq!(history.best_val_loss(), Some(0.4));
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("train_hist.json");

        let mut history = TrainingHistory::new();
        history.push(record(1, 0.5));
        history.push(EpochRecord {
            val_auc: None,
            ..record(2, 0.45)
        });
        history.save(&path).unwrap();

        let loaded = TrainingHistory::load(&path).unwrap();
        assert_eq!(loaded.epochs.len(), 2);
        assert_eq!(loaded.epochs[0].epoch, 1);
        assert_eq!(loaded.epochs[1].val_auc, None);
    }
}
