//! Diagnostic metrics of the binary COVID CT classifier.

pub mod confusion;
pub mod evaluator;
pub mod report;
pub mod roc;

pub use confusion::{ClassReport, ConfusionMatrix};
pub use evaluator::{Classifier, MetricsEvaluator, RocCurveSink};
pub use report::{BatchRecord, EvaluationAccumulator, MetricsReport};
pub use roc::{auc, roc_auc_score, roc_curve, RocCurve};
