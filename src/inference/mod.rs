//! Batched inference over a manifest split

pub mod predictor;

pub use predictor::{Predictor, SamplePrediction};
