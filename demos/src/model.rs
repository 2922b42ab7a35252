//! Baseline classifier: global average pooling followed by a linear head.
//!
//! Its only purpose is to give the `evaluate` tool something to run when no
//! trained network is at hand; load real weights with `--weights`.

use std::path::Path;

use anyhow::{Context, Result};
use burn::{
    nn::{
        pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig},
        Linear, LinearConfig,
    },
    prelude::*,
    record::{FullPrecisionSettings, NamedMpkFileRecorder, Recorder},
};
use covid_ct::Classifier;

/// Configuration for [`BaselineClassifier`].
#[derive(Config, Debug)]
pub struct BaselineClassifierConfig {
    /// Input image channels.
    #[config(default = 3)]
    pub channels: usize,
    /// Output logits per image.
    #[config(default = 2)]
    pub num_classes: usize,
}

impl BaselineClassifierConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> BaselineClassifier<B> {
        BaselineClassifier {
            pool: AdaptiveAvgPool2dConfig::new([1, 1]).init(),
            head: LinearConfig::new(self.channels, self.num_classes).init(device),
        }
    }
}

#[derive(Module, Debug)]
pub struct BaselineClassifier<B: Backend> {
    pool: AdaptiveAvgPool2d,
    head: Linear<B>,
}

impl<B: Backend> BaselineClassifier<B> {
    /// `[N, C, H, W]` images to `[N, num_classes]` logits.
    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        let [batch, channels, _, _] = images.dims();
        let pooled = self.pool.forward(images).reshape([batch, channels]);
        self.head.forward(pooled)
    }

    /// Replace the parameters with a record saved by `NamedMpkFileRecorder`.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be read or does not match the module.
    pub fn load_weights(self, path: &Path, device: &B::Device) -> Result<Self> {
        let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
        let record = recorder
            .load(path.to_path_buf(), device)
            .with_context(|| format!("Failed to load model weights: {}", path.display()))?;
        Ok(self.load_record(record))
    }
}

impl<B: Backend> Classifier<B> for BaselineClassifier<B> {
    fn classify(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        self.forward(images)
    }
}
