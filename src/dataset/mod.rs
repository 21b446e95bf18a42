//! Dataset module for chest X-ray manifest handling
//!
//! This module provides functionality for:
//! - Loading the train/valid/test manifests and rewriting image paths
//! - Training-time data augmentation
//! - Burn `Dataset`/`Batcher` integration with per-head label splitting
//!
//! ## Label semantics
//!
//! Each manifest row carries one binary column per finding. Findings are not
//! mutually exclusive: a study can show both Edema and Cardiomegaly, so the
//! model treats every column as an independent binary classification.

pub mod augmentation;
pub mod manifest;
pub mod xray_dataset;

// Re-export main types for convenience
pub use augmentation::{AugmentationConfig, Augmenter};
pub use manifest::{load_manifests, Manifest, ManifestEntry};
pub use xray_dataset::{XrayBatch, XrayBatcher, XrayDataset, XrayItem};

/// Finding categories, in manifest column order (14 total)
pub const LABELS: [&str; 14] = [
    "Atelectasis",
    "Cardiomegaly",
    "Consolidation",
    "Edema",
    "Enlarged Cardiomediastinum",
    "Fracture",
    "Lung Lesion",
    "Lung Opacity",
    "No Finding",
    "Pleural Effusion",
    "Pleural Other",
    "Pneumonia",
    "Pneumothorax",
    "Support Devices",
];

/// Get the finding name for a given head index
pub fn label_name(index: usize) -> Option<&'static str> {
    LABELS.get(index).copied()
}

/// Get the head index for a given finding name
pub fn label_index(name: &str) -> Option<usize> {
    LABELS.iter().position(|&l| l == name)
}
