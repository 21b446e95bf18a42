//! Model architectures for multi-label chest X-ray classification

pub mod classifier;

pub use classifier::{XrayBackbone, XrayClassifier, XrayClassifierConfig};
