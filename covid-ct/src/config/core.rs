//! Core configuration structures.

use burn::prelude::*;

use super::enums::{LossAveraging, TransformStage};
use crate::error::{DatasetError, DatasetResult, MetricsError, MetricsResult};

/// Class names of the binary COVID CT task, in class-index order.
pub fn default_class_names() -> Vec<String> {
    vec!["CT_NonCOVID".to_string(), "CT_COVID".to_string()]
}

fn default_markers() -> Vec<String> {
    vec!["NCP".to_string(), "Normal".to_string()]
}

/// Configuration of the classification metrics evaluator.
#[derive(Config, Debug)]
pub struct EvaluatorConfig {
    /// Logit column treated as the positive (diseased) class.
    ///
    /// Its softmax probability is the ROC score, its recall the sensitivity;
    /// the recall of the other class is the specificity.
    #[config(default = 1)]
    pub positive_class_index: usize,
    /// Class names in class-index order. Exactly two are expected.
    #[config(default = "default_class_names()")]
    pub class_names: Vec<String>,
    /// How batch losses are averaged into the reported loss.
    #[config(default = "LossAveraging::PerBatch")]
    pub loss_averaging: LossAveraging,
}

impl EvaluatorConfig {
    /// Check that the positive class exists and the task is binary.
    ///
    /// # Errors
    ///
    /// Returns `Err(MetricsError::InvalidPositiveClass)` if the positive class index
    /// is out of range or if the number of classes is not two.
    pub fn validate(&self) -> MetricsResult<()> {
        let num_classes = self.class_names.len();
        if num_classes != 2 || self.positive_class_index >= num_classes {
            return Err(MetricsError::InvalidPositiveClass {
                index: self.positive_class_index,
                num_classes,
            });
        }
        Ok(())
    }

    /// Index of the class whose recall is the specificity.
    pub const fn negative_class_index(&self) -> usize {
        if self.positive_class_index == 0 {
            1
        } else {
            0
        }
    }
}

/// Ordered transform stages plus an optional seed for the random ones.
#[derive(Config, Debug)]
pub struct TransformConfig {
    /// Stages, applied in order.
    #[config(default = "Vec::new()")]
    pub stages: Vec<TransformStage>,
    /// Seed for random stages. Combined with the example index, so a given
    /// example is augmented the same way on every access.
    #[config(default = "None")]
    pub seed: Option<u64>,
}

impl TransformConfig {
    /// Resize, then normalize with ImageNet statistics.
    pub fn evaluation(size: u32) -> Self {
        Self::new().with_stages(vec![
            TransformStage::Resize {
                width: size,
                height: size,
            },
            TransformStage::imagenet_normalize(),
        ])
    }

    /// Check stage parameters and ordering.
    ///
    /// # Errors
    ///
    /// Returns `Err(DatasetError::InvalidTransform)` when a stage has an empty
    /// size, a probability outside `[0, 1]`, a zero standard deviation, or
    /// when an image-space stage follows a `Normalize` stage.
    pub fn validate(&self) -> DatasetResult<()> {
        let mut normalized = false;
        for (position, stage) in self.stages.iter().enumerate() {
            if normalized && stage.is_image_space() {
                return Err(DatasetError::InvalidTransform {
                    reason: format!(
                        "stage {position} ({stage:?}) operates on the image but follows a Normalize stage"
                    ),
                });
            }
            match stage {
                TransformStage::Resize { width, height }
                | TransformStage::CenterCrop { width, height } => {
                    if *width == 0 || *height == 0 {
                        return Err(DatasetError::InvalidTransform {
                            reason: format!("stage {position} has an empty size {width}x{height}"),
                        });
                    }
                }
                TransformStage::RandomHorizontalFlip { probability } => {
                    if !(0.0..=1.0).contains(probability) {
                        return Err(DatasetError::InvalidTransform {
                            reason: format!(
                                "stage {position} flip probability {probability} is outside [0, 1]"
                            ),
                        });
                    }
                }
                TransformStage::Normalize { std, .. } => {
                    if std.iter().any(|s| *s == 0.0) {
                        return Err(DatasetError::InvalidTransform {
                            reason: format!("stage {position} has a zero standard deviation"),
                        });
                    }
                    normalized = true;
                }
            }
        }
        Ok(())
    }
}

/// Configuration of the lesion segmentation dataset.
#[derive(Config, Debug)]
pub struct SegmentationConfig {
    /// Resize factor in `(0, 1]` applied to both image and mask.
    #[config(default = 1.0)]
    pub scale: f64,
    /// Suffix between the example id and the extension of mask files.
    #[config(default = "String::new()")]
    pub mask_suffix: String,
}

impl SegmentationConfig {
    /// # Errors
    ///
    /// Returns `Err(DatasetError::InvalidScale)` unless `0 < scale <= 1`.
    pub fn validate(&self) -> DatasetResult<()> {
        if self.scale > 0.0 && self.scale <= 1.0 {
            Ok(())
        } else {
            Err(DatasetError::InvalidScale { scale: self.scale })
        }
    }
}

/// Naming convention that infers a class from an image file name.
///
/// A name containing any marker (case-sensitive substring) gets
/// `marked_class`, every other name gets `unmarked_class`.
#[derive(Config, Debug)]
pub struct LabelRuleConfig {
    /// Substrings that select `marked_class`.
    #[config(default = "default_markers()")]
    pub markers: Vec<String>,
    /// Class index for names containing a marker.
    #[config(default = 0)]
    pub marked_class: usize,
    /// Class index for all other names.
    #[config(default = 1)]
    pub unmarked_class: usize,
}

impl LabelRuleConfig {
    /// Class index for an image name.
    pub fn class_for(&self, name: &str) -> usize {
        if self.markers.iter().any(|marker| name.contains(marker.as_str())) {
            self.marked_class
        } else {
            self.unmarked_class
        }
    }

    /// # Errors
    ///
    /// Returns `Err(DatasetError::InvalidLabelRule)` if either class index is
    /// not below `num_classes`.
    pub fn validate(&self, num_classes: usize) -> DatasetResult<()> {
        for index in [self.marked_class, self.unmarked_class] {
            if index >= num_classes {
                return Err(DatasetError::InvalidLabelRule { index, num_classes });
            }
        }
        Ok(())
    }
}
