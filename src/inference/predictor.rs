//! Test-set prediction.
//!
//! Runs a trained model over a manifest split in fixed-size batches and
//! collects one probability vector per study, in manifest order. Studies
//! whose image cannot be decoded are skipped with a warning rather than
//! failing the whole pass.

use std::path::Path;

use burn::data::dataloader::batcher::Batcher;
use burn::data::dataset::Dataset;
use burn::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::dataset::manifest::Manifest;
use crate::dataset::{XrayBatch, XrayBatcher, XrayDataset};
use crate::model::{XrayClassifier, XrayClassifierConfig};
use crate::training::checkpoint::Checkpointer;
use crate::utils::error::{Error, Result};

/// Per-study prediction: the source image and one probability per finding
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplePrediction {
    /// Absolute path of the predicted image
    pub path: String,
    /// Calibrated probabilities, one per finding in label order
    pub probabilities: Vec<f32>,
}

/// Runs a trained model over manifest entries
pub struct Predictor<B: Backend> {
    model: XrayClassifier<B>,
    device: B::Device,
    image_size: (usize, usize),
}

impl<B: Backend> Predictor<B> {
    pub fn new(model: XrayClassifier<B>, device: B::Device, image_size: (usize, usize)) -> Self {
        Self {
            model,
            device,
            image_size,
        }
    }

    /// Restore the best checkpoint from a weights directory
    pub fn from_checkpoint(
        weights_dir: &Path,
        num_classes: usize,
        device: B::Device,
        image_size: (usize, usize),
    ) -> Result<Self> {
        let checkpointer = Checkpointer::new(weights_dir)?;
        let model = checkpointer.load_best(
            XrayClassifierConfig::new()
                .with_num_classes(num_classes)
                .init(&device),
            &device,
        )?;

        Ok(Self::new(model, device, image_size))
    }

    /// Predict every entry of a manifest, in manifest order
    pub fn predict_manifest(
        &self,
        manifest: &Manifest,
        batch_size: usize,
    ) -> Result<Vec<SamplePrediction>> {
        if batch_size == 0 {
            return Err(Error::Config("batch size must be positive".to_string()));
        }

        let dataset = XrayDataset::evaluation(manifest.entries.clone(), self.image_size);
        let batcher = XrayBatcher::new();
        let indices: Vec<usize> = (0..dataset.len()).collect();

        let mut predictions = Vec::with_capacity(dataset.len());

        for chunk in indices.chunks(batch_size) {
            // Keep paths paired with the items that actually decoded
            let mut paths = Vec::new();
            let mut items = Vec::new();
            for &i in chunk {
                if let Some(item) = dataset.get(i) {
                    paths.push(manifest.entries[i].path.display().to_string());
                    items.push(item);
                }
            }
            if items.is_empty() {
                continue;
            }

            let batch: XrayBatch<B> = batcher.batch(items, &self.device);
            let probs = self.model.forward_probs(batch.images);

            let [_, num_classes] = probs.dims();
            let flat = probs
                .into_data()
                .to_vec::<f32>()
                .map_err(|e| Error::Model(format!("Failed to read predictions: {:?}", e)))?;

            for (row, path) in paths.into_iter().enumerate() {
                predictions.push(SamplePrediction {
                    path,
                    probabilities: flat[row * num_classes..(row + 1) * num_classes].to_vec(),
                });
            }
        }

        info!("Predicted {} of {} studies", predictions.len(), dataset.len());
        Ok(predictions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::manifest::ManifestEntry;

    type TestBackend = burn::backend::NdArray<f32>;

    fn write_image(dir: &Path, name: &str, value: u8) -> std::path::PathBuf {
        let path = dir.join(name);
        image::RgbImage::from_pixel(12, 12, image::Rgb([value, value, value]))
            .save(&path)
            .unwrap();
        path
    }

    fn manifest(paths: Vec<std::path::PathBuf>) -> Manifest {
        Manifest {
            entries: paths
                .into_iter()
                .map(|path| ManifestEntry {
                    path,
                    labels: vec![0.0; 14],
                })
                .collect(),
        }
    }

    #[test]
    fn test_predictions_follow_manifest_order() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_image(dir.path(), "a.png", 10);
        let b = write_image(dir.path(), "b.png", 200);
        let c = write_image(dir.path(), "c.png", 90);

        let device = Default::default();
        let model = XrayClassifierConfig::new().init::<TestBackend>(&device);
        let predictor = Predictor::new(model, device, (16, 16));

        let manifest = manifest(vec![a.clone(), b.clone(), c.clone()]);
        let predictions = predictor.predict_manifest(&manifest, 2).unwrap();

        assert_eq!(predictions.len(), 3);
        assert_eq!(predictions[0].path, a.display().to_string());
        assert_eq!(predictions[1].path, b.display().to_string());
        assert_eq!(predictions[2].path, c.display().to_string());

        for prediction in &predictions {
            assert_eq!(prediction.probabilities.len(), 14);
            assert!(prediction
                .probabilities
                .iter()
                .all(|&p| (0.0..=1.0).contains(&p)));
        }
    }

    #[test]
    fn test_unreadable_images_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_image(dir.path(), "a.png", 50);
        let missing = dir.path().join("missing.png");

        let device = Default::default();
        let model = XrayClassifierConfig::new().init::<TestBackend>(&device);
        let predictor = Predictor::new(model, device, (16, 16));

        let manifest = manifest(vec![missing, a.clone()]);
        let predictions = predictor.predict_manifest(&manifest, 4).unwrap();

        assert_eq!(predictions.len(), 1);
        assert_eq!(predictions[0].path, a.display().to_string());
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let device = Default::default();
        let model = XrayClassifierConfig::new().init::<TestBackend>(&device);
        let predictor = Predictor::new(model, device, (16, 16));

        let result = predictor.predict_manifest(&manifest(Vec::new()), 0);
        assert!(result.is_err());
    }
}
