//! ROC curve and area under it.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Receiver operating characteristic curve.
///
/// Points are ordered by decreasing threshold, starting at `(0, 0)` with an
/// infinite threshold and ending at `(1, 1)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RocCurve {
    /// False positive rate per threshold.
    pub fpr: Vec<f64>,
    /// True positive rate per threshold.
    pub tpr: Vec<f64>,
    /// Score thresholds; an example is positive when `score >= threshold`.
    ///
    /// JSON has no infinity, so the leading `+inf` is written as `null`.
    #[serde(
        serialize_with = "serialize_thresholds",
        deserialize_with = "deserialize_thresholds"
    )]
    pub thresholds: Vec<f64>,
}

fn serialize_thresholds<S: Serializer>(
    thresholds: &[f64],
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(
        thresholds
            .iter()
            .map(|threshold| threshold.is_finite().then_some(*threshold)),
    )
}

fn deserialize_thresholds<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Vec<f64>, D::Error> {
    let thresholds = Vec::<Option<f64>>::deserialize(deserializer)?;
    Ok(thresholds
        .into_iter()
        .map(|threshold| threshold.unwrap_or(f64::INFINITY))
        .collect())
}

impl RocCurve {
    pub fn len(&self) -> usize {
        self.fpr.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fpr.is_empty()
    }
}

/// ROC curve of `scores` against `targets`, where `positive_class` marks positives.
///
/// Equal scores are treated as a single threshold. Rates are 0 for a class
/// that never occurs, so callers should check both classes are present.
pub fn roc_curve(targets: &[i64], scores: &[f64], positive_class: i64) -> RocCurve {
    let mut order: Vec<usize> = (0..scores.len().min(targets.len())).collect();
    order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));

    let positives = order
        .iter()
        .filter(|&&i| targets[i] == positive_class)
        .count() as f64;
    let negatives = order.len() as f64 - positives;

    let mut fpr = vec![0.0];
    let mut tpr = vec![0.0];
    let mut thresholds = vec![f64::INFINITY];

    let (mut true_positives, mut false_positives) = (0.0, 0.0);
    for (rank, &i) in order.iter().enumerate() {
        if targets[i] == positive_class {
            true_positives += 1.0;
        } else {
            false_positives += 1.0;
        }

        let last_of_tie = order
            .get(rank + 1)
            .map_or(true, |&next| scores[next] != scores[i]);
        if last_of_tie {
            fpr.push(rate(false_positives, negatives));
            tpr.push(rate(true_positives, positives));
            thresholds.push(scores[i]);
        }
    }

    RocCurve {
        fpr,
        tpr,
        thresholds,
    }
}

/// Area under a curve by the trapezoidal rule.
pub fn auc(curve: &RocCurve) -> f64 {
    curve
        .fpr
        .windows(2)
        .zip(curve.tpr.windows(2))
        .map(|(x, y)| (x[1] - x[0]) * (y[1] + y[0]) / 2.0)
        .sum()
}

/// Area under the ROC curve of `scores` against `targets`.
pub fn roc_auc_score(targets: &[i64], scores: &[f64], positive_class: i64) -> f64 {
    auc(&roc_curve(targets, scores, positive_class))
}

fn rate(count: f64, total: f64) -> f64 {
    if total > 0.0 {
        count / total
    } else {
        0.0
    }
}
