//! Lung lesion segmentation dataset.
//!
//! Images and masks live in two directories and are paired by file stem:
//! image `<id>.<ext>` goes with mask `<id><suffix>.<ext>`.

use std::{
    fs,
    marker::PhantomData,
    path::{Path, PathBuf},
};

use burn::{
    data::{dataloader::batcher::Batcher, dataset::Dataset},
    tensor::{backend::Backend, Int, Tensor, TensorData},
};
use image::{imageops::FilterType, DynamicImage, GenericImageView};
use walkdir::WalkDir;

use crate::{
    config::{SegmentationConfig, TransformConfig},
    error::{DatasetError, DatasetResult},
    mask::{ClassMask, MaskRemapper},
    preprocess::{preprocess, scaled_dimensions},
    transform::TransformPipeline,
};

/// A decoded image/mask pair.
#[derive(Debug, Clone)]
pub struct SegItem {
    /// Planar image data `[C, H, W]` in `[0, 1]` (or normalized).
    pub image: Vec<f32>,
    /// Number of image channels.
    pub channels: usize,
    /// Class index of every mask pixel, row-major `[H, W]`.
    pub mask: Vec<i64>,
    /// Height in pixels.
    pub height: usize,
    /// Width in pixels.
    pub width: usize,
    /// Example id.
    pub id: String,
}

/// A batch of segmentation examples.
#[derive(Debug, Clone)]
pub struct SegBatch<B: Backend> {
    /// Images `[N, C, H, W]`.
    pub images: Tensor<B, 4>,
    /// Class-index masks `[N, H, W]`.
    pub masks: Tensor<B, 3, Int>,
}

/// Stacks [`SegItem`]s into a [`SegBatch`].
#[derive(Clone, Default)]
pub struct SegBatcher<B: Backend> {
    _phantom: PhantomData<B>,
}

impl<B: Backend> SegBatcher<B> {
    pub const fn new() -> Self {
        Self {
            _phantom: PhantomData,
        }
    }
}

impl<B: Backend> Batcher<B, SegItem, SegBatch<B>> for SegBatcher<B> {
    fn batch(&self, items: Vec<SegItem>, device: &B::Device) -> SegBatch<B> {
        let mut images = Vec::with_capacity(items.len());
        let mut masks = Vec::with_capacity(items.len());

        for item in items {
            images.push(Tensor::<B, 3>::from_data(
                TensorData::new(item.image, [item.channels, item.height, item.width]),
                device,
            ));
            masks.push(Tensor::<B, 2, Int>::from_data(
                TensorData::new(item.mask, [item.height, item.width]),
                device,
            ));
        }

        SegBatch {
            images: Tensor::stack(images, 0),
            masks: Tensor::stack(masks, 0),
        }
    }
}

/// Image/mask dataset for 4-class lesion segmentation.
#[derive(Debug, Clone)]
pub struct SegmentationDataset {
    images_dir: PathBuf,
    masks_dir: PathBuf,
    ids: Vec<String>,
    config: SegmentationConfig,
    pipeline: Option<TransformPipeline>,
    remapper: MaskRemapper,
}

impl SegmentationDataset {
    /// Index every non-hidden file in `images_dir` by its stem.
    ///
    /// `transform`, when given, resizes, crops and flips image and mask
    /// together; its `Normalize` stages touch the image only.
    ///
    /// # Errors
    ///
    /// Returns `Err(DatasetError::InvalidScale)` for a scale outside `(0, 1]`,
    /// `Err(DatasetError::DirectoryReadFailed)` if the image directory cannot
    /// be listed and `Err(DatasetError::InvalidTransform)` for a bad pipeline.
    pub fn new(
        images_dir: impl Into<PathBuf>,
        masks_dir: impl Into<PathBuf>,
        config: SegmentationConfig,
        transform: Option<&TransformConfig>,
    ) -> DatasetResult<Self> {
        config.validate()?;
        let images_dir = images_dir.into();
        let masks_dir = masks_dir.into();
        let pipeline = transform.map(TransformPipeline::new).transpose()?;

        let mut ids = Vec::new();
        for entry in WalkDir::new(&images_dir).min_depth(1).max_depth(1) {
            let entry = entry.map_err(|e| DatasetError::DirectoryReadFailed {
                path: images_dir.clone(),
                source: e.into(),
            })?;
            let name = entry.file_name().to_string_lossy();
            if name.starts_with('.') || !entry.file_type().is_file() {
                continue;
            }
            if let Some(stem) = entry.path().file_stem() {
                ids.push(stem.to_string_lossy().into_owned());
            }
        }
        ids.sort();

        tracing::info!(
            examples = ids.len(),
            images = %images_dir.display(),
            "created segmentation dataset"
        );

        Ok(Self {
            images_dir,
            masks_dir,
            ids,
            config,
            pipeline,
            remapper: MaskRemapper::default(),
        })
    }

    /// Example ids, sorted.
    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    /// Decode example `index`.
    ///
    /// # Errors
    ///
    /// Returns `Err(DatasetError::IndexOutOfRange)` past the end,
    /// `MissingFile`/`AmbiguousFile` unless exactly one image and one mask
    /// match, `ImageOpenFailed` for undecodable files, `ShapeMismatch` when
    /// image and mask sizes differ, `DegenerateScale` when scaling empties
    /// the image and `UnmappedMaskValue` for mask pixels outside the palette.
    pub fn try_get(&self, index: usize) -> DatasetResult<SegItem> {
        let id = self.ids.get(index).ok_or(DatasetError::IndexOutOfRange {
            index,
            len: self.ids.len(),
        })?;

        let mask_id = format!("{id}{}", self.config.mask_suffix);
        let mask_path = find_unique(&self.masks_dir, &mask_id)?;
        let image_path = find_unique(&self.images_dir, id)?;

        let mask = open(&mask_path)?;
        let image = open(&image_path)?;

        if image.dimensions() != mask.dimensions() {
            return Err(DatasetError::ShapeMismatch {
                id: id.clone(),
                image: image.dimensions(),
                mask: mask.dimensions(),
            });
        }

        let (image, mask) = match &self.pipeline {
            Some(pipeline) => pipeline.apply_image_stages_pair(image, mask, index)?,
            None => (image, mask),
        };
        let mut planar = preprocess(&image, self.config.scale, FilterType::Triangle)?;
        if let Some(pipeline) = &self.pipeline {
            pipeline.apply_float_stages(&mut planar);
        }

        let classes = self.remap_mask(&mask)?;

        Ok(SegItem {
            image: planar.data,
            channels: planar.channels,
            mask: classes.classes,
            height: planar.height,
            width: planar.width,
            id: id.clone(),
        })
    }

    /// Scale the mask like its image and convert it to class indices.
    ///
    /// Nearest-neighbour resizing keeps every pixel on a palette value.
    fn remap_mask(&self, mask: &DynamicImage) -> DatasetResult<ClassMask> {
        let (width, height) = scaled_dimensions(mask.width(), mask.height(), self.config.scale)?;
        if (width, height) == mask.dimensions() {
            self.remapper.remap(mask)
        } else {
            self.remapper
                .remap(&mask.resize_exact(width, height, FilterType::Nearest))
        }
    }
}

impl Dataset<SegItem> for SegmentationDataset {
    /// # Panics
    ///
    /// Panics when an in-range example cannot be loaded.
    fn get(&self, index: usize) -> Option<SegItem> {
        if index >= self.ids.len() {
            return None;
        }
        match self.try_get(index) {
            Ok(item) => Some(item),
            Err(err) => panic!("{err}"),
        }
    }

    fn len(&self) -> usize {
        self.ids.len()
    }
}

fn open(path: &Path) -> DatasetResult<DynamicImage> {
    image::open(path).map_err(|source| DatasetError::ImageOpenFailed {
        path: path.to_path_buf(),
        source,
    })
}

/// The single file in `dir` named `<id>.<anything>`.
fn find_unique(dir: &Path, id: &str) -> DatasetResult<PathBuf> {
    let prefix = format!("{id}.");
    let listing = fs::read_dir(dir).map_err(|source| DatasetError::DirectoryReadFailed {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut candidates = Vec::new();
    for entry in listing {
        let entry = entry.map_err(|source| DatasetError::DirectoryReadFailed {
            path: dir.to_path_buf(),
            source,
        })?;
        if entry.file_name().to_string_lossy().starts_with(&prefix) {
            candidates.push(entry.path());
        }
    }

    match candidates.len() {
        0 => Err(DatasetError::MissingFile {
            dir: dir.to_path_buf(),
            id: id.to_string(),
        }),
        1 => Ok(candidates.remove(0)),
        _ => {
            candidates.sort();
            Err(DatasetError::AmbiguousFile {
                id: id.to_string(),
                candidates,
            })
        }
    }
}
