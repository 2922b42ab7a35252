//! Configuration files of the command-line tools.

use std::path::PathBuf;

use anyhow::{Context, Result};
use covid_ct::{
    ClassMapping, CovidCtDataset, EvaluatorConfig, LabelRuleConfig, SegmentationConfig,
    TransformConfig,
};
use serde::{Deserialize, Serialize};

/// Configuration for the `evaluate` tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluateConfig {
    /// Dataset root holding one subdirectory per class.
    pub dataset_root: PathBuf,
    /// Manifest of COVID image paths, relative to `<root>/CT_COVID`.
    pub covid_manifest: PathBuf,
    /// Manifest of non-COVID image paths, relative to `<root>/CT_NonCOVID`.
    pub non_covid_manifest: PathBuf,
    /// Single split file whose image names encode the class. Replaces the
    /// two manifests when set; paths are relative to `dataset_root`.
    pub split_file: Option<PathBuf>,
    /// Naming convention used with `split_file`.
    pub label_rule: LabelRuleConfig,
    /// Side length images are resized to before normalization.
    pub image_size: u32,
    /// Batch size for evaluation.
    pub batch_size: usize,
    /// Number of workers for data loading.
    pub num_workers: usize,
    /// Optional `.mpk` weights for the baseline classifier.
    pub weights: Option<PathBuf>,
    /// Metric settings.
    pub evaluator: EvaluatorConfig,
}

impl Default for EvaluateConfig {
    fn default() -> Self {
        Self {
            dataset_root: PathBuf::from("data/Images-processed"),
            covid_manifest: PathBuf::from("data/Data-split/COVID/testCT_COVID.txt"),
            non_covid_manifest: PathBuf::from("data/Data-split/NonCOVID/testCT_NonCOVID.txt"),
            split_file: None,
            label_rule: LabelRuleConfig::new(),
            image_size: 224,
            batch_size: 16,
            num_workers: 1,
            weights: None,
            evaluator: EvaluatorConfig::new(),
        }
    }
}

impl EvaluateConfig {
    /// Build the evaluation dataset, resized to `image_size` and normalized.
    ///
    /// A split file is labeled with the evaluator's class names; the two
    /// manifests use the fixed `CT_NonCOVID`/`CT_COVID` directories, so the
    /// evaluator must name its classes the same way.
    ///
    /// # Errors
    ///
    /// Fails on an invalid class list, unreadable manifests, or class names
    /// that disagree with the dataset.
    pub fn build_dataset(&self) -> Result<CovidCtDataset> {
        let transform = TransformConfig::evaluation(self.image_size);
        let dataset = match &self.split_file {
            Some(split_file) => {
                let classes = ClassMapping::new(self.evaluator.class_names.clone())
                    .context("Invalid evaluator class names")?;
                CovidCtDataset::from_split_file(
                    &self.dataset_root,
                    classes,
                    split_file,
                    &self.label_rule,
                    &transform,
                )
            }
            None => CovidCtDataset::covid_split(
                &self.dataset_root,
                &self.covid_manifest,
                &self.non_covid_manifest,
                &transform,
            ),
        }
        .context("Failed to create dataset")?;

        anyhow::ensure!(
            dataset.classes().names() == self.evaluator.class_names.as_slice(),
            "Evaluator classes {:?} do not match dataset classes {:?}",
            self.evaluator.class_names,
            dataset.classes().names()
        );
        Ok(dataset)
    }
}

/// Which dataset adapter `dataset_test` exercises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DatasetKind {
    Classification,
    Segmentation,
}

/// Configuration for the `dataset_test` tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetTestConfig {
    pub kind: DatasetKind,
    /// Classification dataset root.
    pub dataset_root: PathBuf,
    pub covid_manifest: PathBuf,
    pub non_covid_manifest: PathBuf,
    /// Segmentation image directory.
    pub images_dir: PathBuf,
    /// Segmentation mask directory.
    pub masks_dir: PathBuf,
    pub segmentation: SegmentationConfig,
    /// Side length images are resized to so that batches stack.
    pub image_size: u32,
    /// Number of samples to inspect.
    pub num_samples: usize,
}

impl Default for DatasetTestConfig {
    fn default() -> Self {
        Self {
            kind: DatasetKind::Classification,
            dataset_root: PathBuf::from("data/Images-processed"),
            covid_manifest: PathBuf::from("data/Data-split/COVID/trainCT_COVID.txt"),
            non_covid_manifest: PathBuf::from("data/Data-split/NonCOVID/trainCT_NonCOVID.txt"),
            images_dir: PathBuf::from("data/seg/imgs"),
            masks_dir: PathBuf::from("data/seg/masks"),
            segmentation: SegmentationConfig::new(),
            image_size: 224,
            num_samples: 10,
        }
    }
}
