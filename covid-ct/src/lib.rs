//! Datasets, preprocessing and diagnostic metrics for COVID-19 lung CT scans.

pub mod config;
pub mod dataset;
pub mod error;
pub mod manifest;
pub mod mask;
pub mod metrics;
pub mod preprocess;
pub mod transform;

// Re-export commonly used types
pub use config::{
    EvaluatorConfig, LabelRuleConfig, LossAveraging, SegmentationConfig, TransformConfig,
    TransformStage,
};
pub use dataset::{
    CovidCtDataset, CtBatch, CtBatcher, CtItem, SegBatch, SegBatcher, SegItem, SegmentationDataset,
};
pub use error::{DatasetError, DatasetResult, MetricsError, MetricsResult};
pub use manifest::{ClassManifest, ClassMapping};
pub use mask::{LesionClass, MaskRemapper, LESION_PALETTE};
pub use metrics::{Classifier, MetricsEvaluator, MetricsReport, RocCurve, RocCurveSink};
pub use preprocess::{preprocess, PlanarImage};
pub use transform::TransformPipeline;
