//! Configuration for datasets, transforms and evaluation.
//!
//! - `core`: the configuration structures
//! - `enums`: enumeration types used inside them

pub mod core;
pub mod enums;

pub use core::{
    default_class_names, EvaluatorConfig, LabelRuleConfig, SegmentationConfig, TransformConfig,
};
pub use enums::{LossAveraging, TransformStage};
