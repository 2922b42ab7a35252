//! COVID CT classification dataset.
//!
//! Examples come either from one manifest per class (paths relative to the
//! class subdirectory) or from a single split file whose image names encode
//! the class (paths relative to the dataset root).

use std::{
    marker::PhantomData,
    path::{Path, PathBuf},
};

use burn::{
    data::{dataloader::batcher::Batcher, dataset::Dataset},
    tensor::{backend::Backend, Int, Tensor, TensorData},
};

use crate::{
    config::{LabelRuleConfig, TransformConfig},
    error::{DatasetError, DatasetResult},
    manifest::{read_manifest, ClassManifest, ClassMapping, ManifestEntry},
    transform::TransformPipeline,
};

/// A decoded classification example, kept as raw host data.
///
/// Tensors are created by [`CtBatcher`] on the batch device.
#[derive(Debug, Clone)]
pub struct CtItem {
    /// Planar `[3, H, W]` image data after the transform pipeline.
    pub image: Vec<f32>,
    /// Image height in pixels.
    pub height: usize,
    /// Image width in pixels.
    pub width: usize,
    /// Class index.
    pub label: usize,
    /// Source image path.
    pub path: String,
}

/// A batch of classification examples.
#[derive(Debug, Clone)]
pub struct CtBatch<B: Backend> {
    /// Images `[N, 3, H, W]`.
    pub images: Tensor<B, 4>,
    /// Class indices `[N]`.
    pub targets: Tensor<B, 1, Int>,
    /// Source paths, in batch order.
    pub paths: Vec<String>,
}

/// Stacks [`CtItem`]s into a [`CtBatch`].
#[derive(Clone, Default)]
pub struct CtBatcher<B: Backend> {
    _phantom: PhantomData<B>,
}

impl<B: Backend> CtBatcher<B> {
    pub const fn new() -> Self {
        Self {
            _phantom: PhantomData,
        }
    }
}

impl<B: Backend> Batcher<B, CtItem, CtBatch<B>> for CtBatcher<B> {
    fn batch(&self, items: Vec<CtItem>, device: &B::Device) -> CtBatch<B> {
        let batch_size = items.len();

        let mut images = Vec::with_capacity(batch_size);
        let mut labels = Vec::with_capacity(batch_size);
        let mut paths = Vec::with_capacity(batch_size);

        for item in items {
            images.push(Tensor::<B, 3>::from_data(
                TensorData::new(item.image, [3, item.height, item.width]),
                device,
            ));
            labels.push(item.label as i64);
            paths.push(item.path);
        }

        let images = Tensor::stack(images, 0);
        let targets =
            Tensor::<B, 1, Int>::from_data(TensorData::new(labels, [batch_size]), device);

        CtBatch {
            images,
            targets,
            paths,
        }
    }
}

/// Random-access COVID CT classification dataset.
///
/// The example list is read once at construction and never changes.
#[derive(Debug, Clone)]
pub struct CovidCtDataset {
    entries: Vec<ManifestEntry>,
    classes: ClassMapping,
    pipeline: TransformPipeline,
}

impl CovidCtDataset {
    /// Build a dataset from one manifest per class.
    ///
    /// Each manifest line is a path relative to `root/<class name>/`. Entries
    /// are ordered by class index first, then by manifest order, independent
    /// of the order in which `manifests` is given.
    ///
    /// # Errors
    ///
    /// Returns `Err(DatasetError::UnknownClass)` for a manifest whose class is
    /// not mapped, `Err(DatasetError::ManifestRead)` for an unreadable
    /// manifest, and `Err(DatasetError::InvalidTransform)` for a bad pipeline.
    pub fn from_class_manifests(
        root: impl AsRef<Path>,
        classes: ClassMapping,
        manifests: &[ClassManifest],
        transform: &TransformConfig,
    ) -> DatasetResult<Self> {
        let root = root.as_ref();
        let pipeline = TransformPipeline::new(transform)?;

        let mut indexed = Vec::with_capacity(manifests.len());
        for manifest in manifests {
            indexed.push((classes.index_of(&manifest.class_name)?, manifest));
        }
        indexed.sort_by_key(|(label, _)| *label);

        let mut entries = Vec::new();
        for (label, manifest) in indexed {
            let class_dir = root.join(&manifest.class_name);
            entries.extend(
                read_manifest(&manifest.path)?
                    .into_iter()
                    .map(|line| ManifestEntry {
                        path: class_dir.join(line),
                        label,
                    }),
            );
        }

        tracing::info!(
            examples = entries.len(),
            manifests = manifests.len(),
            root = %root.display(),
            "created classification dataset from class manifests"
        );

        Ok(Self {
            entries,
            classes,
            pipeline,
        })
    }

    /// The usual two-manifest COVID / non-COVID split.
    ///
    /// # Errors
    ///
    /// See [`CovidCtDataset::from_class_manifests`].
    pub fn covid_split(
        root: impl AsRef<Path>,
        covid_manifest: impl Into<PathBuf>,
        non_covid_manifest: impl Into<PathBuf>,
        transform: &TransformConfig,
    ) -> DatasetResult<Self> {
        let classes = ClassMapping::default();
        let manifests = [
            ClassManifest::new("CT_NonCOVID", non_covid_manifest),
            ClassManifest::new("CT_COVID", covid_manifest),
        ];
        Self::from_class_manifests(root, classes, &manifests, transform)
    }

    /// Build a dataset from one split file whose image names encode the class.
    ///
    /// Only the first space-separated token of each line is used; it is a
    /// path relative to `root` and its class comes from `rule`.
    ///
    /// # Errors
    ///
    /// Returns `Err(DatasetError::InvalidLabelRule)` if the rule's classes are
    /// not mapped, `Err(DatasetError::ManifestRead)` for an unreadable split
    /// file, and `Err(DatasetError::InvalidTransform)` for a bad pipeline.
    pub fn from_split_file(
        root: impl AsRef<Path>,
        classes: ClassMapping,
        split_file: impl AsRef<Path>,
        rule: &LabelRuleConfig,
        transform: &TransformConfig,
    ) -> DatasetResult<Self> {
        let root = root.as_ref();
        rule.validate(classes.len())?;
        let pipeline = TransformPipeline::new(transform)?;

        let entries: Vec<ManifestEntry> = read_manifest(split_file.as_ref())?
            .iter()
            .filter_map(|line| line.split(' ').next())
            .map(|name| ManifestEntry {
                path: root.join(name),
                label: rule.class_for(name),
            })
            .collect();

        tracing::info!(
            examples = entries.len(),
            split = %split_file.as_ref().display(),
            "created classification dataset from split file"
        );

        Ok(Self {
            entries,
            classes,
            pipeline,
        })
    }

    /// The loaded `(path, label)` entries, in access order.
    pub fn entries(&self) -> &[ManifestEntry] {
        &self.entries
    }

    /// The class mapping labels refer to.
    pub const fn classes(&self) -> &ClassMapping {
        &self.classes
    }

    /// Number of examples per class index.
    pub fn class_counts(&self) -> Vec<usize> {
        let mut counts = vec![0; self.classes.len()];
        for entry in &self.entries {
            counts[entry.label] += 1;
        }
        counts
    }

    /// Decode example `index`.
    ///
    /// The image is forced to three channels, run through the transform
    /// pipeline and returned with its label and path.
    ///
    /// # Errors
    ///
    /// Returns `Err(DatasetError::IndexOutOfRange)` past the end,
    /// `Err(DatasetError::ImageOpenFailed)` for a missing or undecodable file,
    /// and `Err(DatasetError::InvalidTransform)` if a stage cannot be applied.
    pub fn try_get(&self, index: usize) -> DatasetResult<CtItem> {
        let entry = self
            .entries
            .get(index)
            .ok_or(DatasetError::IndexOutOfRange {
                index,
                len: self.entries.len(),
            })?;

        let image = image::open(&entry.path).map_err(|source| DatasetError::ImageOpenFailed {
            path: entry.path.clone(),
            source,
        })?;
        let image = image::DynamicImage::ImageRgb8(image.to_rgb8());

        let planar = self.pipeline.apply(image, index)?;

        Ok(CtItem {
            image: planar.data,
            height: planar.height,
            width: planar.width,
            label: entry.label,
            path: entry.path.to_string_lossy().into_owned(),
        })
    }
}

impl Dataset<CtItem> for CovidCtDataset {
    /// # Panics
    ///
    /// Panics when an in-range example cannot be decoded, so a broken file
    /// aborts the pass instead of silently shrinking it.
    fn get(&self, index: usize) -> Option<CtItem> {
        if index >= self.entries.len() {
            return None;
        }
        match self.try_get(index) {
            Ok(item) => Some(item),
            Err(err) => panic!("{err}"),
        }
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}
