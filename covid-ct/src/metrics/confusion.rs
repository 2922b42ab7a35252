//! Binary confusion matrix and the per-class report derived from it.

use serde::{Deserialize, Serialize};

use crate::error::{MetricsError, MetricsResult};

/// 2x2 confusion matrix; rows are true classes, columns predicted classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    /// `counts[true][predicted]`.
    pub counts: [[usize; 2]; 2],
}

impl ConfusionMatrix {
    /// Count `(target, prediction)` pairs.
    ///
    /// # Errors
    ///
    /// Returns `Err(MetricsError::LabelOutOfRange)` for a label other than 0 or 1.
    pub fn from_labels(targets: &[i64], predictions: &[i64]) -> MetricsResult<Self> {
        let mut matrix = Self::default();
        for (&target, &prediction) in targets.iter().zip(predictions) {
            let row = class_slot(target)?;
            let column = class_slot(prediction)?;
            matrix.counts[row][column] += 1;
        }
        Ok(matrix)
    }

    /// Number of counted examples.
    pub fn total(&self) -> usize {
        self.counts.iter().flatten().sum()
    }

    /// Examples on the diagonal.
    pub const fn correct(&self) -> usize {
        self.counts[0][0] + self.counts[1][1]
    }

    /// Examples whose true class is `class`.
    pub const fn row_sum(&self, class: usize) -> usize {
        self.counts[class][0] + self.counts[class][1]
    }

    /// Examples predicted as `class`.
    pub const fn column_sum(&self, class: usize) -> usize {
        self.counts[0][class] + self.counts[1][class]
    }

    /// Fraction of correct predictions, 0 when empty.
    pub fn accuracy(&self) -> f64 {
        ratio(self.correct(), self.total())
    }

    /// Fraction of class `class` examples predicted as `class`, 0 when the class is absent.
    pub fn recall(&self, class: usize) -> f64 {
        ratio(self.counts[class][class], self.row_sum(class))
    }

    /// Fraction of `class` predictions that are right, 0 when never predicted.
    pub fn precision(&self, class: usize) -> f64 {
        ratio(self.counts[class][class], self.column_sum(class))
    }

    /// Harmonic mean of precision and recall, 0 when both are 0.
    pub fn f1(&self, class: usize) -> f64 {
        let precision = self.precision(class);
        let recall = self.recall(class);
        if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        }
    }
}

/// Precision, recall, F1 and support of one class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassReport {
    /// Class name.
    pub name: String,
    /// Share of predictions of this class that are right; 0 when never predicted.
    pub precision: f64,
    /// Share of this class's examples predicted as it.
    pub recall: f64,
    /// Harmonic mean of precision and recall.
    pub f1: f64,
    /// Number of examples whose true class is this one.
    pub support: usize,
}

impl ClassReport {
    /// Reports for both classes of `matrix`, named by `names`.
    pub fn from_matrix(matrix: &ConfusionMatrix, names: &[String]) -> Vec<Self> {
        names
            .iter()
            .take(2)
            .enumerate()
            .map(|(class, name)| Self {
                name: name.clone(),
                precision: matrix.precision(class),
                recall: matrix.recall(class),
                f1: matrix.f1(class),
                support: matrix.row_sum(class),
            })
            .collect()
    }
}

fn class_slot(label: i64) -> MetricsResult<usize> {
    match label {
        0 => Ok(0),
        1 => Ok(1),
        _ => Err(MetricsError::LabelOutOfRange {
            label,
            num_classes: 2,
        }),
    }
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_land_in_true_by_predicted_cells() {
        let targets = [0, 0, 0, 1, 1];
        let predictions = [0, 1, 0, 1, 0];
        let matrix = ConfusionMatrix::from_labels(&targets, &predictions).unwrap();

        assert_eq!(matrix.counts, [[2, 1], [1, 1]]);
        assert_eq!(matrix.total(), 5);
        assert_eq!(matrix.correct(), 3);
        assert_eq!(matrix.row_sum(0), 3);
        assert_eq!(matrix.column_sum(0), 3);
        assert!((matrix.accuracy() - 0.6).abs() < 1e-12);
        assert!((matrix.recall(0) - 2.0 / 3.0).abs() < 1e-12);
        assert!((matrix.recall(1) - 0.5).abs() < 1e-12);
        assert!((matrix.precision(1) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn empty_denominators_give_zero() {
        let matrix = ConfusionMatrix::from_labels(&[0, 0], &[0, 0]).unwrap();
        assert_eq!(matrix.recall(1), 0.0);
        assert_eq!(matrix.precision(1), 0.0);
        assert_eq!(matrix.f1(1), 0.0);
        assert_eq!(ConfusionMatrix::default().accuracy(), 0.0);
    }

    #[test]
    fn labels_outside_binary_range_are_rejected() {
        assert_eq!(
            ConfusionMatrix::from_labels(&[0, 2], &[0, 0]),
            Err(MetricsError::LabelOutOfRange {
                label: 2,
                num_classes: 2
            })
        );
    }

    #[test]
    fn class_reports_follow_names() {
        let matrix = ConfusionMatrix::from_labels(&[0, 1, 1, 1], &[0, 1, 1, 0]).unwrap();
        let names = vec!["neg".to_string(), "pos".to_string()];
        let reports = ClassReport::from_matrix(&matrix, &names);

        assert_eq!(reports.len(), 2);
        assert_eq!(reports[1].name, "pos");
        assert_eq!(reports[1].support, 3);
        assert!((reports[1].precision - 1.0).abs() < 1e-12);
        assert!((reports[1].recall - 2.0 / 3.0).abs() < 1e-12);
        assert!((reports[1].f1 - 0.8).abs() < 1e-12);
        assert!((reports[0].precision - 0.5).abs() < 1e-12);
    }
}
