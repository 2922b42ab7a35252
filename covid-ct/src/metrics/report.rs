//! Per-example accumulation and the final metrics report.

use serde::{Deserialize, Serialize};

use super::{
    confusion::{ClassReport, ConfusionMatrix},
    roc::{roc_auc_score, roc_curve, RocCurve},
};
use crate::{
    config::{EvaluatorConfig, LossAveraging},
    error::{MetricsError, MetricsResult},
};

/// Everything one batch contributes to an evaluation.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BatchRecord {
    /// Mean cross-entropy loss of the batch.
    pub loss: f64,
    /// Positive-class probability per example.
    pub scores: Vec<f64>,
    /// Arg-max class per example.
    pub predictions: Vec<i64>,
    /// True class per example.
    pub targets: Vec<i64>,
    /// Source path per example.
    pub paths: Vec<String>,
}

impl BatchRecord {
    /// Number of examples, once the columns agree.
    ///
    /// # Errors
    ///
    /// Returns `Err(MetricsError::BatchLength)` if the per-example columns
    /// have different lengths.
    pub fn len(&self) -> MetricsResult<usize> {
        let n = self.targets.len();
        if self.scores.len() != n || self.predictions.len() != n || self.paths.len() != n {
            return Err(MetricsError::BatchLength {
                scores: self.scores.len(),
                predictions: self.predictions.len(),
                targets: n,
                paths: self.paths.len(),
            });
        }
        Ok(n)
    }
}

/// Growing per-example columns of one evaluation pass.
///
/// All columns are appended together, so index `i` refers to the same
/// example in each of them.
#[derive(Debug, Clone, Default)]
pub struct EvaluationAccumulator {
    scores: Vec<f64>,
    predictions: Vec<i64>,
    targets: Vec<i64>,
    paths: Vec<String>,
    batch_loss_sum: f64,
    example_loss_sum: f64,
    batch_sizes: Vec<usize>,
}

impl EvaluationAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one batch.
    ///
    /// # Errors
    ///
    /// Returns `Err(MetricsError::BatchLength)` and leaves the accumulator
    /// unchanged if the batch columns disagree in length.
    pub fn push(&mut self, record: BatchRecord) -> MetricsResult<()> {
        let n = record.len()?;
        self.batch_loss_sum += record.loss;
        self.example_loss_sum += record.loss * n as f64;
        self.batch_sizes.push(n);
        self.scores.extend(record.scores);
        self.predictions.extend(record.predictions);
        self.targets.extend(record.targets);
        self.paths.extend(record.paths);
        Ok(())
    }

    /// Number of batches appended so far.
    pub fn num_batches(&self) -> usize {
        self.batch_sizes.len()
    }

    /// Number of examples appended so far.
    pub fn num_examples(&self) -> usize {
        self.targets.len()
    }

    /// Whether some batch differs in size from the first one.
    pub fn has_uneven_batches(&self) -> bool {
        self.batch_sizes
            .first()
            .is_some_and(|first| self.batch_sizes.iter().any(|size| size != first))
    }

    /// Aggregate the accumulated columns into a report.
    ///
    /// # Errors
    ///
    /// Returns `Err(MetricsError::InvalidPositiveClass)` for a bad
    /// configuration, `Err(MetricsError::EmptyEvaluation)` when nothing was
    /// accumulated, `Err(MetricsError::LabelOutOfRange)` for a non-binary
    /// label and `Err(MetricsError::MissingClass)` when the targets lack a
    /// class, which leaves recall and ROC AUC undefined.
    pub fn finalize(self, config: &EvaluatorConfig) -> MetricsResult<MetricsReport> {
        config.validate()?;
        if self.targets.is_empty() {
            return Err(MetricsError::EmptyEvaluation);
        }

        let confusion_matrix = ConfusionMatrix::from_labels(&self.targets, &self.predictions)?;
        for (class, name) in config.class_names.iter().enumerate() {
            if confusion_matrix.row_sum(class) == 0 {
                return Err(MetricsError::MissingClass {
                    class,
                    name: name.clone(),
                });
            }
        }

        let positive = config.positive_class_index;
        let negative = config.negative_class_index();
        let roc_auc = roc_auc_score(&self.targets, &self.scores, positive as i64);

        let mean_loss = match config.loss_averaging {
            LossAveraging::PerBatch => self.batch_loss_sum / self.batch_sizes.len() as f64,
            LossAveraging::PerExample => self.example_loss_sum / self.targets.len() as f64,
        };

        Ok(MetricsReport {
            accuracy: confusion_matrix.accuracy(),
            sensitivity: confusion_matrix.recall(positive),
            specificity: confusion_matrix.recall(negative),
            roc_auc,
            confusion_matrix,
            mean_loss,
            loss_averaging: config.loss_averaging.clone(),
            positive_class_index: positive,
            correct: confusion_matrix.correct(),
            num_batches: self.batch_sizes.len(),
            class_reports: ClassReport::from_matrix(&confusion_matrix, &config.class_names),
            scores: self.scores,
            predictions: self.predictions,
            targets: self.targets,
            paths: self.paths,
        })
    }
}

/// Aggregate diagnostic metrics of one evaluation pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsReport {
    /// Correct predictions over all examples.
    pub accuracy: f64,
    /// Recall of the positive class.
    pub sensitivity: f64,
    /// Recall of the negative class.
    pub specificity: f64,
    /// Area under the ROC curve of the positive-class scores.
    pub roc_auc: f64,
    /// Rows are true classes, columns predicted classes.
    pub confusion_matrix: ConfusionMatrix,
    /// Cross-entropy loss averaged as `loss_averaging` says.
    pub mean_loss: f64,
    /// How `mean_loss` was averaged.
    pub loss_averaging: LossAveraging,
    /// Logit column whose probability is in `scores`.
    pub positive_class_index: usize,
    /// Number of correct predictions.
    pub correct: usize,
    /// Number of evaluated batches.
    pub num_batches: usize,
    /// Precision, recall, F1 and support per class.
    pub class_reports: Vec<ClassReport>,
    /// Positive-class probability per example.
    pub scores: Vec<f64>,
    /// Predicted class per example.
    pub predictions: Vec<i64>,
    /// True class per example.
    pub targets: Vec<i64>,
    /// Source path per example.
    pub paths: Vec<String>,
}

impl MetricsReport {
    /// Number of evaluated examples.
    pub fn num_examples(&self) -> usize {
        self.targets.len()
    }

    /// ROC curve of the stored scores.
    pub fn roc_curve(&self) -> RocCurve {
        roc_curve(&self.targets, &self.scores, self.positive_class_index as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(loss: f64, targets: &[i64], predictions: &[i64], scores: &[f64]) -> BatchRecord {
        BatchRecord {
            loss,
            scores: scores.to_vec(),
            predictions: predictions.to_vec(),
            targets: targets.to_vec(),
            paths: targets.iter().map(|t| format!("{t}.png")).collect(),
        }
    }

    #[test]
    fn perfect_predictions_give_perfect_report() {
        let mut acc = EvaluationAccumulator::new();
        acc.push(record(0.1, &[0, 1], &[0, 1], &[0.1, 0.9])).unwrap();
        acc.push(record(0.3, &[1, 0], &[1, 0], &[0.8, 0.2])).unwrap();

        let report = acc.finalize(&EvaluatorConfig::new()).unwrap();

        assert_eq!(report.accuracy, 1.0);
        assert_eq!(report.sensitivity, 1.0);
        assert_eq!(report.specificity, 1.0);
        assert_eq!(report.roc_auc, 1.0);
        assert_eq!(report.confusion_matrix.counts, [[2, 0], [0, 2]]);
        assert_eq!(report.correct, 4);
        assert_eq!(report.num_batches, 2);
        assert!((report.mean_loss - 0.2).abs() < 1e-12);
        assert_eq!(report.paths, vec!["0.png", "1.png", "1.png", "0.png"]);
    }

    #[test]
    fn always_negative_predictions_miss_every_positive() {
        let mut acc = EvaluationAccumulator::new();
        acc.push(record(0.7, &[0, 1, 1, 0, 1], &[0; 5], &[0.2; 5])).unwrap();

        let report = acc.finalize(&EvaluatorConfig::new()).unwrap();

        assert_eq!(report.sensitivity, 0.0);
        assert_eq!(report.specificity, 1.0);
        assert_eq!(report.confusion_matrix.counts, [[2, 0], [3, 0]]);
        assert!((report.roc_auc - 0.5).abs() < 1e-12);
    }

    #[test]
    fn positive_class_zero_swaps_sensitivity_and_specificity() {
        let mut acc = EvaluationAccumulator::new();
        acc.push(record(0.5, &[0, 1, 1], &[0, 0, 1], &[0.9, 0.6, 0.2])).unwrap();

        let report = acc
            .finalize(&EvaluatorConfig::new().with_positive_class_index(0))
            .unwrap();

        assert_eq!(report.sensitivity, 1.0);
        assert_eq!(report.specificity, 0.5);
        assert_eq!(report.roc_auc, 1.0);
    }

    #[test]
    fn loss_averaging_modes_differ_on_uneven_batches() {
        let build = || {
            let mut acc = EvaluationAccumulator::new();
            acc.push(record(1.0, &[0, 1, 0], &[0, 1, 0], &[0.1, 0.9, 0.1]))
                .unwrap();
            acc.push(record(4.0, &[1], &[1], &[0.9])).unwrap();
            acc
        };
        assert!(build().has_uneven_batches());

        let per_batch = build().finalize(&EvaluatorConfig::new()).unwrap();
        assert!((per_batch.mean_loss - 2.5).abs() < 1e-12);

        let per_example = build()
            .finalize(&EvaluatorConfig::new().with_loss_averaging(LossAveraging::PerExample))
            .unwrap();
        assert!((per_example.mean_loss - 7.0 / 4.0).abs() < 1e-12);
    }

    #[test]
    fn single_class_targets_are_a_distinct_error() {
        let mut acc = EvaluationAccumulator::new();
        acc.push(record(0.2, &[1, 1], &[1, 0], &[0.9, 0.4])).unwrap();

        match acc.finalize(&EvaluatorConfig::new()) {
            Err(MetricsError::MissingClass { class, name }) => {
                assert_eq!(class, 0);
                assert_eq!(name, "CT_NonCOVID");
            }
            other => panic!("Expected MissingClass error, got {other:?}"),
        }
    }

    #[test]
    fn empty_accumulator_is_an_error() {
        assert_eq!(
            EvaluationAccumulator::new().finalize(&EvaluatorConfig::new()),
            Err(MetricsError::EmptyEvaluation)
        );
    }

    #[test]
    fn mismatched_columns_are_rejected() {
        let mut acc = EvaluationAccumulator::new();
        let mut bad = record(0.1, &[0, 1], &[0, 1], &[0.1, 0.9]);
        bad.paths.pop();
        assert!(matches!(
            acc.push(bad),
            Err(MetricsError::BatchLength { paths: 1, .. })
        ));
        assert_eq!(acc.num_examples(), 0);
        assert_eq!(acc.num_batches(), 0);
    }

    #[test]
    fn confusion_sums_match_class_counts() {
        let targets = [0, 0, 1, 1, 1, 0, 1];
        let predictions = [1, 0, 1, 0, 1, 0, 1];
        let mut acc = EvaluationAccumulator::new();
        acc.push(record(0.4, &targets, &predictions, &[0.5; 7])).unwrap();

        let report = acc.finalize(&EvaluatorConfig::new()).unwrap();
        assert_eq!(report.confusion_matrix.row_sum(0), 3);
        assert_eq!(report.confusion_matrix.row_sum(1), 4);
        assert_eq!(report.class_reports[0].support, 3);
        assert_eq!(report.class_reports[1].support, 4);
        assert_eq!(report.roc_curve().fpr.last(), Some(&1.0));
    }
}
