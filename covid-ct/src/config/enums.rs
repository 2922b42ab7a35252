//! Enumeration types for dataset and evaluation configuration.

use burn::prelude::*;
use serde::{Deserialize, Serialize};

/// How the per-batch cross-entropy losses are folded into one number.
#[derive(Config, Debug, PartialEq, Eq)]
pub enum LossAveraging {
    /// Sum of batch means divided by the number of batches.
    ///
    /// An uneven final batch weighs as much as a full one.
    PerBatch,
    /// Every example weighs the same, whatever batch it came in.
    PerExample,
}

/// One stage of a transform pipeline.
///
/// Image-space stages (`Resize`, `CenterCrop`, `RandomHorizontalFlip`) run on
/// the decoded image; `Normalize` runs on the planar float data and must come
/// after every image-space stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TransformStage {
    /// Resize to exactly `width` x `height`.
    Resize {
        /// Output width in pixels.
        width: u32,
        /// Output height in pixels.
        height: u32,
    },
    /// Crop a `width` x `height` window from the image centre.
    CenterCrop {
        /// Crop width in pixels.
        width: u32,
        /// Crop height in pixels.
        height: u32,
    },
    /// Mirror the image left to right with the given probability.
    RandomHorizontalFlip {
        /// Flip probability in `[0, 1]`.
        probability: f64,
    },
    /// Per-channel `(x - mean) / std`.
    Normalize {
        /// Channel means.
        mean: [f32; 3],
        /// Channel standard deviations, all non-zero.
        std: [f32; 3],
    },
}

impl TransformStage {
    /// ImageNet statistics, the usual choice for pretrained backbones.
    pub const fn imagenet_normalize() -> Self {
        Self::Normalize {
            mean: [0.485, 0.456, 0.406],
            std: [0.229, 0.224, 0.225],
        }
    }

    /// Whether the stage operates on the decoded image rather than on floats.
    pub const fn is_image_space(&self) -> bool {
        !matches!(self, Self::Normalize { .. })
    }
}
