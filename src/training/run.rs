//! The training run.
//!
//! One call to [`run`] performs the whole pipeline: load manifests, train
//! with reduce-on-plateau scheduling and early stopping, keep the single
//! best checkpoint, then restore it and score the held-out test split.
//! Artifacts (weights, `train_hist.json`, `predictions.json`) land in the
//! configured weights directory.

use std::collections::HashMap;

use burn::data::dataloader::batcher::Batcher;
use burn::data::dataset::Dataset;
use burn::module::AutodiffModule;
use burn::optim::{AdamConfig, GradientsParams, Optimizer};
use burn::prelude::*;
use burn::tensor::activation::sigmoid;
use burn::tensor::backend::AutodiffBackend;
use chrono::Utc;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::info;

use crate::config::RunConfig;
use crate::dataset::manifest::{load_manifests, Manifest};
use crate::dataset::{label_name, XrayBatch, XrayBatcher, XrayDataset, XrayItem, LABELS};
use crate::inference::Predictor;
use crate::model::{XrayClassifier, XrayClassifierConfig};
use crate::training::checkpoint::{Checkpoint, Checkpointer};
use crate::training::history::{EpochRecord, TrainingHistory};
use crate::training::scheduler::{LearningRateScheduler, SchedulerType};
use crate::utils::error::{Error, Result};
use crate::utils::logging::TrainingLogger;
use crate::utils::metrics::EvalMetrics;

/// Epochs without validation improvement before training stops
pub const EARLY_STOP_PATIENCE: usize = 4;

/// Summed per-head binary cross-entropy.
///
/// Each head contributes the mean BCE of its `[batch, 1]` column; the total
/// is the sum over heads. Probabilities are clamped away from 0 and 1 so the
/// logs stay finite.
pub fn multi_head_bce<B: Backend>(
    logits: &[Tensor<B, 2>],
    targets: &[Tensor<B, 2>],
) -> Tensor<B, 1> {
    debug_assert_eq!(logits.len(), targets.len());

    let head_losses: Vec<Tensor<B, 1>> = logits
        .iter()
        .zip(targets)
        .map(|(logit, target)| {
            let probs = sigmoid(logit.clone()).clamp(1e-7, 1.0 - 1e-7);
            let ones = probs.ones_like();

            (target.clone() * probs.clone().log()
                + (ones.clone() - target.clone()) * (ones - probs).log())
            .mean()
            .neg()
        })
        .collect();

    Tensor::cat(head_losses, 0).sum()
}

/// Tracks the best validation loss and drives early stopping
#[derive(Debug, Clone)]
struct TrainingState {
    patience: usize,
    best_val_loss: f64,
    best_epoch: usize,
    epochs_without_improvement: usize,
}

impl TrainingState {
    fn new(patience: usize) -> Self {
        Self {
            patience,
            best_val_loss: f64::INFINITY,
            best_epoch: 0,
            epochs_without_improvement: 0,
        }
    }

    /// Record an epoch's validation loss; true when it is a new best
    fn observe(&mut self, epoch: usize, val_loss: f64) -> bool {
        if val_loss < self.best_val_loss {
            self.best_val_loss = val_loss;
            self.best_epoch = epoch;
            self.epochs_without_improvement = 0;
            true
        } else {
            self.epochs_without_improvement += 1;
            false
        }
    }

    fn should_stop(&self) -> bool {
        self.epochs_without_improvement >= self.patience
    }
}

/// Score a model over a full dataset pass, collecting loss, accuracy, and AUC
fn evaluate<B: Backend>(
    model: &XrayClassifier<B>,
    dataset: &XrayDataset,
    batcher: &XrayBatcher,
    batch_size: usize,
    device: &B::Device,
) -> Result<EvalMetrics> {
    let indices: Vec<usize> = (0..dataset.len()).collect();

    let mut all_probs: Vec<f32> = Vec::new();
    let mut all_targets: Vec<f32> = Vec::new();
    let mut loss_sum = 0.0f64;
    let mut sample_count = 0usize;

    for chunk in indices.chunks(batch_size) {
        let items: Vec<XrayItem> = chunk.iter().filter_map(|&i| dataset.get(i)).collect();
        if items.is_empty() {
            continue;
        }

        let batch: XrayBatch<B> = batcher.batch(items, device);
        let batch_len = batch.images.dims()[0];

        let logits = model.forward(batch.images.clone());
        let loss = multi_head_bce(&logits, &batch.targets_per_head());
        loss_sum += loss.into_scalar().elem::<f64>() * batch_len as f64;
        sample_count += batch_len;

        let probs: Vec<Tensor<B, 2>> = logits.into_iter().map(sigmoid).collect();
        let probs = Tensor::cat(probs, 1);

        all_probs.extend(tensor_to_vec(probs)?);
        all_targets.extend(tensor_to_vec(batch.targets)?);
    }

    if sample_count == 0 {
        return Err(Error::Training(
            "Evaluation dataset produced no readable samples".to_string(),
        ));
    }

    Ok(EvalMetrics::from_predictions(
        &all_probs,
        &all_targets,
        LABELS.len(),
        loss_sum / sample_count as f64,
    ))
}

fn tensor_to_vec<B: Backend>(tensor: Tensor<B, 2>) -> Result<Vec<f32>> {
    tensor
        .into_data()
        .to_vec::<f32>()
        .map_err(|e| Error::Training(format!("Failed to read tensor data: {:?}", e)))
}

/// Advance the schedule with a finished epoch's validation loss. `lr` is
/// updated for the next epoch; the returned value is the rate the finished
/// epoch actually trained with, which is what gets recorded for it.
fn advance_schedule(scheduler: &mut LearningRateScheduler, lr: &mut f64, val_loss: f64) -> f64 {
    let used = *lr;
    *lr = scheduler.step_with_metric(val_loss);
    used
}

/// Mean binary cross-entropy computed from already-calibrated probabilities
fn bce_from_probs(probs: &[f32], targets: &[f32]) -> f64 {
    if probs.is_empty() {
        return 0.0;
    }

    let sum: f64 = probs
        .iter()
        .zip(targets)
        .map(|(&p, &t)| {
            let p = (p as f64).clamp(1e-7, 1.0 - 1e-7);
            let t = t as f64;
            -(t * p.ln() + (1.0 - t) * (1.0 - p).ln())
        })
        .sum();

    sum / probs.len() as f64
}

/// Execute the full training pipeline described by `config`
pub fn run<B: AutodiffBackend>(config: &RunConfig, device: &B::Device) -> Result<()> {
    // Checkpoint directory must exist before any training happens
    let checkpointer = Checkpointer::new(&config.weights_dir)?;

    let (train, valid, test) = load_manifests(config)?;
    if train.is_empty() || valid.is_empty() {
        return Err(Error::Training(
            "Train and validation manifests must not be empty".to_string(),
        ));
    }

    let image_size = config.image_size();
    let train_ds = XrayDataset::training(train.entries, image_size, config.seed);
    let valid_ds = XrayDataset::evaluation(valid.entries, image_size);

    let mut model: XrayClassifier<B> = XrayClassifierConfig::new()
        .with_num_classes(config.num_classes)
        .init(device);

    if let Some(path) = &config.pretrained_weights {
        info!("Loading pretrained backbone from {}", path.display());
        model = model.with_pretrained_backbone(path, device)?;
    }

    let mut optimizer = AdamConfig::new().init();
    let mut scheduler =
        LearningRateScheduler::new(SchedulerType::plateau_default(), config.initial_lr);
    let mut state = TrainingState::new(EARLY_STOP_PATIENCE);
    let mut history = TrainingHistory::new();
    let mut logger = TrainingLogger::new(config.max_epochs);

    let batcher = XrayBatcher::new();
    let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
    let mut lr = config.initial_lr;

    info!(
        "Training on {} samples, validating on {}, {} heads",
        train_ds.len(),
        valid_ds.len(),
        config.num_classes
    );

    for epoch in 0..config.max_epochs {
        logger.start_epoch(epoch);

        let mut indices: Vec<usize> = (0..train_ds.len()).collect();
        indices.shuffle(&mut rng);

        let mut epoch_loss = 0.0f64;
        let mut batch_count = 0usize;

        for chunk in indices.chunks(config.batch_size) {
            let items: Vec<XrayItem> = chunk.iter().filter_map(|&i| train_ds.get(i)).collect();
            if items.is_empty() {
                continue;
            }

            let batch: XrayBatch<B> = batcher.batch(items, device);

            let logits = model.forward(batch.images.clone());
            let loss = multi_head_bce(&logits, &batch.targets_per_head());

            epoch_loss += loss.clone().into_scalar().elem::<f64>();
            batch_count += 1;

            let grads = GradientsParams::from_grads(loss.backward(), &model);
            model = optimizer.step(lr, model, grads);
        }

        let train_loss = epoch_loss / batch_count.max(1) as f64;

        let metrics = evaluate(
            &model.valid(),
            &valid_ds,
            &batcher,
            config.batch_size,
            device,
        )?;

        let epoch_lr = advance_schedule(&mut scheduler, &mut lr, metrics.loss);
        logger.end_epoch(train_loss, metrics.loss, metrics.macro_auc, epoch_lr);

        history.push(EpochRecord {
            epoch: epoch + 1,
            train_loss,
            val_loss: metrics.loss,
            val_accuracy: metrics.accuracy,
            val_auc: metrics.macro_auc,
            learning_rate: epoch_lr,
        });

        if state.observe(epoch + 1, metrics.loss) {
            logger.log_new_best(metrics.loss);
            checkpointer.save_best(
                &model.valid(),
                &Checkpoint {
                    epoch: epoch + 1,
                    val_loss: metrics.loss,
                    learning_rate: epoch_lr,
                    timestamp: Utc::now(),
                },
            )?;
        } else if state.should_stop() {
            logger.log_early_stop(EARLY_STOP_PATIENCE);
            break;
        }
    }

    history.save(&config.weights_dir.join("train_hist.json"))?;
    logger.log_complete(state.best_val_loss);
    info!("Best epoch: {}", state.best_epoch);

    // Restore the best weights before touching the test split
    let best_model: XrayClassifier<B::InnerBackend> = checkpointer.load_best(
        XrayClassifierConfig::new()
            .with_num_classes(config.num_classes)
            .init(device),
        device,
    )?;

    let predictor = Predictor::new(best_model, device.clone(), image_size);
    let predictions = predictor.predict_manifest(&test, config.test_batch)?;

    let predictions_path = config.weights_dir.join("predictions.json");
    let json = serde_json::to_string_pretty(&predictions)?;
    std::fs::write(&predictions_path, json)?;
    info!(
        "Wrote {} test predictions to {}",
        predictions.len(),
        predictions_path.display()
    );

    report_test_metrics(&predictions, &test);

    Ok(())
}

/// Compute test-split metrics by pairing each prediction with its manifest
/// entry via the image path. Prediction passes may skip unreadable images,
/// so positional pairing would misalign targets after the first skip.
/// Returns `None` when there are no predictions or a path has no entry.
fn test_metrics(
    predictions: &[crate::inference::SamplePrediction],
    test: &Manifest,
) -> Option<EvalMetrics> {
    if predictions.is_empty() {
        return None;
    }

    let labels_by_path: HashMap<String, &Vec<f32>> = test
        .entries
        .iter()
        .map(|e| (e.path.display().to_string(), &e.labels))
        .collect();

    let mut probs: Vec<f32> = Vec::with_capacity(predictions.len() * LABELS.len());
    let mut targets: Vec<f32> = Vec::with_capacity(predictions.len() * LABELS.len());

    for prediction in predictions {
        let labels = labels_by_path.get(&prediction.path)?;
        probs.extend_from_slice(&prediction.probabilities);
        targets.extend_from_slice(labels);
    }

    let loss = bce_from_probs(&probs, &targets);
    Some(EvalMetrics::from_predictions(
        &probs,
        &targets,
        LABELS.len(),
        loss,
    ))
}

/// Log test-set loss, accuracy, and per-finding AUC from saved predictions
fn report_test_metrics(predictions: &[crate::inference::SamplePrediction], test: &Manifest) {
    let metrics = match test_metrics(predictions, test) {
        Some(metrics) => metrics,
        None => {
            info!("Skipping test metrics: no predictions matched the manifest");
            return;
        }
    };

    let auc = metrics
        .macro_auc
        .map(|a| format!("{:.4}", a))
        .unwrap_or_else(|| "n/a".to_string());
    info!(
        "Test: loss {:.4} | accuracy {:.4} | macro AUC {}",
        metrics.loss, metrics.accuracy, auc
    );

    for (i, class_auc) in metrics.per_class_auc.iter().enumerate() {
        if let (Some(name), Some(auc)) = (label_name(i), class_auc) {
            info!("  {:<28} AUC {:.4}", name, auc);
        }
    }
}
