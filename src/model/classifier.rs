//! Multi-head CNN classifier.
//!
//! A shared convolutional backbone feeds a single dense trunk, which fans out
//! into one width-1 linear head per finding. Heads are independent sigmoid
//! binary classifiers rather than one softmax layer, because findings
//! co-occur freely on a chest X-ray.
//!
//! The backbone is an isolated `Module` so its weights can be recorded and
//! restored on their own, which is how a pretrained trunk is plugged in
//! before fine-tuning.

use std::path::Path;

use burn::nn::conv::{Conv2d, Conv2dConfig};
use burn::nn::pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig, MaxPool2d, MaxPool2dConfig};
use burn::nn::{
    BatchNorm, BatchNormConfig, Dropout, DropoutConfig, Linear, LinearConfig, PaddingConfig2d,
    Relu,
};
use burn::prelude::*;
use burn::record::CompactRecorder;
use burn::tensor::activation::sigmoid;

use crate::utils::error::Error;

/// Configuration for the multi-head classifier
#[derive(Config, Debug)]
pub struct XrayClassifierConfig {
    /// Number of output heads, one per finding
    #[config(default = 14)]
    pub num_classes: usize,
    /// Width of the shared dense trunk
    #[config(default = 512)]
    pub trunk_units: usize,
    /// Dropout rate applied after the trunk
    #[config(default = 0.3)]
    pub dropout: f64,
    /// Input channels (RGB)
    #[config(default = 3)]
    pub in_channels: usize,
    /// Filters in the first convolutional block; doubles per block
    #[config(default = 32)]
    pub base_filters: usize,
}

impl XrayClassifierConfig {
    /// Initialize the classifier on the given device
    pub fn init<B: Backend>(&self, device: &B::Device) -> XrayClassifier<B> {
        let backbone = XrayBackboneConfig {
            in_channels: self.in_channels,
            base_filters: self.base_filters,
        }
        .init(device);

        let trunk_fc = LinearConfig::new(backbone.feature_dim(), self.trunk_units).init(device);
        let heads = (0..self.num_classes)
            .map(|_| LinearConfig::new(self.trunk_units, 1).init(device))
            .collect();

        XrayClassifier {
            backbone,
            trunk_fc,
            dropout: DropoutConfig::new(self.dropout).init(),
            activation: Relu::new(),
            heads,
            num_classes: self.num_classes,
        }
    }
}

/// Configuration for the convolutional backbone
#[derive(Config, Debug)]
pub struct XrayBackboneConfig {
    /// Input channels
    #[config(default = 3)]
    pub in_channels: usize,
    /// Filters in the first block; doubles per block
    #[config(default = 32)]
    pub base_filters: usize,
}

impl XrayBackboneConfig {
    /// Initialize the backbone on the given device
    pub fn init<B: Backend>(&self, device: &B::Device) -> XrayBackbone<B> {
        let f = self.base_filters;

        XrayBackbone {
            block1: ConvBlock::new(self.in_channels, f, device),
            block2: ConvBlock::new(f, f * 2, device),
            block3: ConvBlock::new(f * 2, f * 4, device),
            block4: ConvBlock::new(f * 4, f * 8, device),
            global_pool: AdaptiveAvgPool2dConfig::new([1, 1]).init(),
            base_filters: f,
        }
    }
}

/// Conv -> BatchNorm -> ReLU -> MaxPool, halving spatial resolution
#[derive(Module, Debug)]
pub struct ConvBlock<B: Backend> {
    conv: Conv2d<B>,
    norm: BatchNorm<B, 2>,
    activation: Relu,
    pool: MaxPool2d,
}

impl<B: Backend> ConvBlock<B> {
    fn new(in_channels: usize, out_channels: usize, device: &B::Device) -> Self {
        Self {
            conv: Conv2dConfig::new([in_channels, out_channels], [3, 3])
                .with_padding(PaddingConfig2d::Explicit(1, 1))
                .init(device),
            norm: BatchNormConfig::new(out_channels).init(device),
            activation: Relu::new(),
            pool: MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init(),
        }
    }

    fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self.conv.forward(input);
        let x = self.norm.forward(x);
        let x = self.activation.forward(x);
        self.pool.forward(x)
    }
}

/// Shared convolutional feature extractor
#[derive(Module, Debug)]
pub struct XrayBackbone<B: Backend> {
    block1: ConvBlock<B>,
    block2: ConvBlock<B>,
    block3: ConvBlock<B>,
    block4: ConvBlock<B>,
    global_pool: AdaptiveAvgPool2d,
    base_filters: usize,
}

impl<B: Backend> XrayBackbone<B> {
    /// Dimension of the pooled feature vector
    pub fn feature_dim(&self) -> usize {
        self.base_filters * 8
    }

    /// Extract a `[batch, feature_dim]` feature vector from input images
    pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 2> {
        let x = self.block1.forward(input);
        let x = self.block2.forward(x);
        let x = self.block3.forward(x);
        let x = self.block4.forward(x);

        let x = self.global_pool.forward(x);
        let [batch, channels, _, _] = x.dims();
        x.reshape([batch, channels])
    }

    /// Replace the backbone weights with a previously recorded set
    pub fn load_weights(self, path: &Path, device: &B::Device) -> crate::utils::error::Result<Self> {
        self.load_file(path.to_path_buf(), &CompactRecorder::new(), device)
            .map_err(|e| {
                Error::Model(format!(
                    "Failed to load pretrained weights {}: {}",
                    path.display(),
                    e
                ))
            })
    }
}

/// Multi-head classifier: shared backbone and trunk, one head per finding
#[derive(Module, Debug)]
pub struct XrayClassifier<B: Backend> {
    backbone: XrayBackbone<B>,
    trunk_fc: Linear<B>,
    dropout: Dropout,
    activation: Relu,
    heads: Vec<Linear<B>>,
    num_classes: usize,
}

impl<B: Backend> XrayClassifier<B> {
    /// Number of output heads
    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    /// Forward pass producing one `[batch, 1]` logit tensor per head
    pub fn forward(&self, images: Tensor<B, 4>) -> Vec<Tensor<B, 2>> {
        let features = self.backbone.forward(images);
        let trunk = self.activation.forward(self.trunk_fc.forward(features));
        let trunk = self.dropout.forward(trunk);

        self.heads
            .iter()
            .map(|head| head.forward(trunk.clone()))
            .collect()
    }

    /// Forward pass producing calibrated probabilities, `[batch, num_classes]`
    pub fn forward_probs(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        let probs: Vec<Tensor<B, 2>> = self
            .forward(images)
            .into_iter()
            .map(sigmoid)
            .collect();

        Tensor::cat(probs, 1)
    }

    /// Swap in pretrained backbone weights, keeping trunk and heads fresh
    pub fn with_pretrained_backbone(
        mut self,
        path: &Path,
        device: &B::Device,
    ) -> crate::utils::error::Result<Self> {
        self.backbone = self.backbone.load_weights(path, device)?;
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type TestBackend = burn::backend::NdArray<f32>;

    #[test]
    fn test_one_width_one_output_per_finding() {
        let device = Default::default();
        let model: XrayClassifier<TestBackend> =
            XrayClassifierConfig::new().init(&device);

        let images = Tensor::zeros([2, 3, 32, 32], &device);
        let outputs = model.forward(images);

        assert_eq!(outputs.len(), 14);
        for output in &outputs {
            assert_eq!(output.dims(), [2, 1]);
        }
    }

    #[test]
    fn test_forward_probs_shape_and_range() {
        let device = Default::default();
        let model: XrayClassifier<TestBackend> =
            XrayClassifierConfig::new().init(&device);

        let images = Tensor::zeros([3, 3, 32, 32], &device);
        let probs = model.forward_probs(images);

        assert_eq!(probs.dims(), [3, 14]);

        let values = probs.into_data().to_vec::<f32>().unwrap();
        assert!(values.iter().all(|&p| (0.0..=1.0).contains(&p)));
    }

    #[test]
    fn test_configurable_head_count() {
        let device = Default::default();
        let model: XrayClassifier<TestBackend> = XrayClassifierConfig::new()
            .with_num_classes(5)
            .init(&device);

        let images = Tensor::zeros([1, 3, 32, 32], &device);
        assert_eq!(model.num_classes(), 5);
        assert_eq!(model.forward(images).len(), 5);
    }

    #[test]
    fn test_backbone_feature_dim() {
        let device = Default::default();
        let backbone: XrayBackbone<TestBackend> = XrayBackboneConfig::new().init(&device);

        assert_eq!(backbone.feature_dim(), 256);

        let images = Tensor::zeros([2, 3, 64, 64], &device);
        assert_eq!(backbone.forward(images).dims(), [2, 256]);
    }
}
