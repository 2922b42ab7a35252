//! Model evaluation over batches of CT scans.

use burn::{
    nn::loss::{CrossEntropyLoss, CrossEntropyLossConfig},
    prelude::*,
    tensor::{activation::softmax, ElementConversion},
};

use super::{
    report::{BatchRecord, EvaluationAccumulator, MetricsReport},
    roc::RocCurve,
};
use crate::{
    config::{EvaluatorConfig, LossAveraging},
    dataset::CtBatch,
    error::{MetricsError, MetricsResult},
};

/// A model mapping a batch of images `[B, C, H, W]` to logits `[B, 2]`.
///
/// Evaluate on a non-autodiff backend (e.g. the `valid()` form of a module)
/// so no gradients are tracked.
pub trait Classifier<B: Backend> {
    fn classify(&self, images: Tensor<B, 4>) -> Tensor<B, 2>;
}

impl<B, F> Classifier<B> for F
where
    B: Backend,
    F: Fn(Tensor<B, 4>) -> Tensor<B, 2>,
{
    fn classify(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        self(images)
    }
}

/// Receives the ROC curve at the end of an evaluation, e.g. to plot or save it.
pub trait RocCurveSink {
    fn receive(&mut self, curve: &RocCurve, auc: f64);
}

/// Runs a [`Classifier`] over batches and aggregates diagnostic metrics.
pub struct MetricsEvaluator<B: Backend> {
    config: EvaluatorConfig,
    loss: CrossEntropyLoss<B>,
}

impl<B: Backend> MetricsEvaluator<B> {
    /// Create an evaluator whose loss lives on `device`.
    ///
    /// # Errors
    ///
    /// Returns `Err(MetricsError::InvalidPositiveClass)` if the configuration
    /// does not describe a binary task with a valid positive class.
    pub fn new(config: EvaluatorConfig, device: &B::Device) -> MetricsResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            loss: CrossEntropyLossConfig::new().init(device),
        })
    }

    pub const fn config(&self) -> &EvaluatorConfig {
        &self.config
    }

    /// Evaluate `model` on every batch, in iteration order.
    ///
    /// # Errors
    ///
    /// See [`MetricsEvaluator::evaluate_with_sink`].
    pub fn evaluate<M, I>(&self, model: &M, batches: I) -> MetricsResult<MetricsReport>
    where
        M: Classifier<B>,
        I: IntoIterator<Item = CtBatch<B>>,
    {
        self.evaluate_with_sink(model, batches, None)
    }

    /// Evaluate `model` on every batch and hand the ROC curve to `sink`.
    ///
    /// # Errors
    ///
    /// Returns `Err(MetricsError::LogitShape)` if the model output is not
    /// `[batch, 2]`, and the errors of [`EvaluationAccumulator::finalize`].
    pub fn evaluate_with_sink<M, I>(
        &self,
        model: &M,
        batches: I,
        sink: Option<&mut dyn RocCurveSink>,
    ) -> MetricsResult<MetricsReport>
    where
        M: Classifier<B>,
        I: IntoIterator<Item = CtBatch<B>>,
    {
        let mut accumulator = EvaluationAccumulator::new();

        for (batch_index, batch) in batches.into_iter().enumerate() {
            let record = self.evaluate_batch(model, batch)?;
            tracing::debug!(
                batch = batch_index,
                size = record.targets.len(),
                loss = record.loss,
                "evaluated batch"
            );
            accumulator.push(record)?;
        }

        if self.config.loss_averaging == LossAveraging::PerBatch
            && accumulator.has_uneven_batches()
        {
            tracing::warn!(
                num_batches = accumulator.num_batches(),
                num_examples = accumulator.num_examples(),
                "batches differ in size; per-batch loss averaging over-weights the smaller ones"
            );
        }

        let report = accumulator.finalize(&self.config)?;

        tracing::info!(
            num_examples = report.num_examples(),
            accuracy = report.accuracy,
            sensitivity = report.sensitivity,
            specificity = report.specificity,
            roc_auc = report.roc_auc,
            mean_loss = report.mean_loss,
            "evaluation finished"
        );

        if let Some(sink) = sink {
            sink.receive(&report.roc_curve(), report.roc_auc);
        }

        Ok(report)
    }

    /// Loss, scores and predictions of one batch.
    ///
    /// # Errors
    ///
    /// Returns `Err(MetricsError::LogitShape)` if the model output is not
    /// `[batch, 2]`.
    pub fn evaluate_batch<M: Classifier<B>>(
        &self,
        model: &M,
        batch: CtBatch<B>,
    ) -> MetricsResult<BatchRecord> {
        let CtBatch {
            images,
            targets,
            paths,
        } = batch;
        let [batch_size] = targets.dims();

        let logits = model.classify(images);
        let actual = logits.dims();
        if actual != [batch_size, 2] {
            return Err(MetricsError::LogitShape {
                batch: batch_size,
                classes: 2,
                actual,
            });
        }

        let loss = self
            .loss
            .forward(logits.clone(), targets.clone())
            .into_scalar()
            .elem::<f64>();

        let predictions = logits
            .clone()
            .argmax(1)
            .into_data()
            .iter::<i64>()
            .collect();

        let positive = self.config.positive_class_index;
        let scores = softmax(logits, 1)
            .slice(s![.., positive..positive + 1])
            .into_data()
            .iter::<f64>()
            .collect();

        let targets = targets.into_data().iter::<i64>().collect();

        Ok(BatchRecord {
            loss,
            scores,
            predictions,
            targets,
            paths,
        })
    }
}

#[cfg(test)]
mod tests {
    use burn::backend::ndarray::{NdArray, NdArrayDevice};

    use super::*;

    type TestBackend = NdArray<f32>;

    /// Batch whose first pixel is +1 for class 1 and -1 for class 0.
    fn batch(labels: &[i64], device: &NdArrayDevice) -> CtBatch<TestBackend> {
        let n = labels.len();
        let mut pixels = vec![0.0f32; n * 3 * 2 * 2];
        for (i, &label) in labels.iter().enumerate() {
            pixels[i * 12] = if label == 1 { 1.0 } else { -1.0 };
        }
        CtBatch {
            images: Tensor::from_data(TensorData::new(pixels, [n, 3, 2, 2]), device),
            targets: Tensor::from_data(TensorData::new(labels.to_vec(), [n]), device),
            paths: (0..n).map(|i| format!("scan_{i}.png")).collect(),
        }
    }

    /// Logits that rank the encoded label far above the other class.
    fn oracle(images: Tensor<TestBackend, 4>) -> Tensor<TestBackend, 2> {
        let [n, _, _, _] = images.dims();
        let marker = images.slice(s![.., 0..1, 0..1, 0..1]).reshape([n, 1]);
        Tensor::cat(vec![marker.clone().neg() * 5.0, marker * 5.0], 1)
    }

    /// Logits that always favour class 0 by the same margin.
    fn always_negative(images: Tensor<TestBackend, 4>) -> Tensor<TestBackend, 2> {
        let [n, _, _, _] = images.dims();
        let device = images.device();
        Tensor::cat(
            vec![
                Tensor::ones([n, 1], &device) * 2.0,
                Tensor::zeros([n, 1], &device),
            ],
            1,
        )
    }

    struct RecordingSink {
        calls: usize,
        auc: f64,
        points: usize,
    }

    impl RocCurveSink for RecordingSink {
        fn receive(&mut self, curve: &RocCurve, auc: f64) {
            self.calls += 1;
            self.auc = auc;
            self.points = curve.len();
        }
    }

    #[test]
    fn oracle_model_scores_perfectly() {
        let device = NdArrayDevice::default();
        let evaluator = MetricsEvaluator::<TestBackend>::new(EvaluatorConfig::new(), &device).unwrap();
        let batches = vec![batch(&[0, 1, 1], &device), batch(&[0, 0, 1], &device)];

        let report = evaluator.evaluate(&oracle, batches).unwrap();

        assert_eq!(report.accuracy, 1.0);
        assert_eq!(report.sensitivity, 1.0);
        assert_eq!(report.specificity, 1.0);
        assert!((report.roc_auc - 1.0).abs() < 1e-9);
        assert_eq!(report.confusion_matrix.counts, [[3, 0], [0, 3]]);
        assert_eq!(report.num_batches, 2);
        assert_eq!(report.targets, vec![0, 1, 1, 0, 0, 1]);
        assert_eq!(report.paths[3], "scan_0.png");
        assert!(report.mean_loss < 0.01);
        assert!(report
            .scores
            .iter()
            .zip(&report.targets)
            .all(|(score, target)| (*score > 0.5) == (*target == 1)));
    }

    #[test]
    fn constant_model_misses_every_positive() {
        let device = NdArrayDevice::default();
        let evaluator = MetricsEvaluator::<TestBackend>::new(EvaluatorConfig::new(), &device).unwrap();

        let report = evaluator
            .evaluate(&always_negative, vec![batch(&[0, 1, 1, 0, 1], &device)])
            .unwrap();

        assert_eq!(report.sensitivity, 0.0);
        assert_eq!(report.specificity, 1.0);
        assert_eq!(report.predictions, vec![0; 5]);
        assert!((report.roc_auc - 0.5).abs() < 1e-9);
        let right = (1.0f64 + (-2.0f64).exp()).ln();
        let wrong = (1.0f64 + 2.0f64.exp()).ln();
        let expected = (2.0 * right + 3.0 * wrong) / 5.0;
        assert!((report.mean_loss - expected).abs() < 1e-4);
    }

    #[test]
    fn single_class_evaluation_is_rejected() {
        let device = NdArrayDevice::default();
        let evaluator = MetricsEvaluator::<TestBackend>::new(EvaluatorConfig::new(), &device).unwrap();

        let result = evaluator.evaluate(&oracle, vec![batch(&[1, 1], &device)]);
        assert!(matches!(
            result,
            Err(MetricsError::MissingClass { class: 0, .. })
        ));
    }

    #[test]
    fn wrong_logit_width_is_rejected() {
        let device = NdArrayDevice::default();
        let evaluator = MetricsEvaluator::<TestBackend>::new(EvaluatorConfig::new(), &device).unwrap();
        let three_way = |images: Tensor<TestBackend, 4>| {
            let [n, _, _, _] = images.dims();
            Tensor::<TestBackend, 2>::zeros([n, 3], &images.device())
        };

        assert_eq!(
            evaluator.evaluate(&three_way, vec![batch(&[0, 1], &device)]),
            Err(MetricsError::LogitShape {
                batch: 2,
                classes: 2,
                actual: [2, 3]
            })
        );
    }

    #[test]
    fn invalid_positive_class_is_rejected_up_front() {
        let device = NdArrayDevice::default();
        let config = EvaluatorConfig::new().with_positive_class_index(2);
        assert!(matches!(
            MetricsEvaluator::<TestBackend>::new(config, &device),
            Err(MetricsError::InvalidPositiveClass { index: 2, .. })
        ));
    }

    #[test]
    fn positive_class_zero_reads_the_first_column() {
        let device = NdArrayDevice::default();
        let config = EvaluatorConfig::new().with_positive_class_index(0);
        let evaluator = MetricsEvaluator::<TestBackend>::new(config, &device).unwrap();

        let report = evaluator
            .evaluate(&oracle, vec![batch(&[0, 1, 0, 1], &device)])
            .unwrap();

        assert!(report
            .scores
            .iter()
            .zip(&report.targets)
            .all(|(score, target)| (*score > 0.5) == (*target == 0)));
        assert!((report.roc_auc - 1.0).abs() < 1e-9);
    }

    #[test]
    fn loss_averaging_follows_configuration() {
        let device = NdArrayDevice::default();
        let batches = || vec![batch(&[0, 1, 0], &device), batch(&[1], &device)];
        // class 0 is right for label 0 and wrong for label 1
        let per_batch = MetricsEvaluator::<TestBackend>::new(EvaluatorConfig::new(), &device)
            .unwrap()
            .evaluate(&always_negative, batches())
            .unwrap();
        let per_example = MetricsEvaluator::<TestBackend>::new(
            EvaluatorConfig::new().with_loss_averaging(LossAveraging::PerExample),
            &device,
        )
        .unwrap()
        .evaluate(&always_negative, batches())
        .unwrap();

        let right = (1.0f64 + (-2.0f64).exp()).ln();
        let wrong = (1.0f64 + 2.0f64.exp()).ln();
        let batch_means = [(2.0 * right + wrong) / 3.0, wrong];
        assert!((per_batch.mean_loss - (batch_means[0] + batch_means[1]) / 2.0).abs() < 1e-4);
        assert!((per_example.mean_loss - (2.0 * right + 2.0 * wrong) / 4.0).abs() < 1e-4);
    }

    #[test]
    fn sink_receives_the_final_curve() {
        let device = NdArrayDevice::default();
        let evaluator = MetricsEvaluator::<TestBackend>::new(EvaluatorConfig::new(), &device).unwrap();
        let mut sink = RecordingSink {
            calls: 0,
            auc: 0.0,
            points: 0,
        };

        let report = evaluator
            .evaluate_with_sink(&oracle, vec![batch(&[0, 1, 0, 1], &device)], Some(&mut sink))
            .unwrap();

        assert_eq!(sink.calls, 1);
        assert_eq!(sink.auc, report.roc_auc);
        assert_eq!(sink.points, report.roc_curve().len());
    }
}
