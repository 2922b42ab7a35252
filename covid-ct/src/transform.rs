//! Transform pipeline applied to every decoded example.

use image::{imageops::FilterType, DynamicImage, GenericImageView};
use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::{
    config::{TransformConfig, TransformStage},
    error::{DatasetError, DatasetResult},
    preprocess::PlanarImage,
};

/// A validated sequence of [`TransformStage`]s.
///
/// Holds no mutable state; random stages draw from an RNG created per call,
/// so one pipeline can serve several loader workers at once.
#[derive(Debug, Clone, Default)]
pub struct TransformPipeline {
    stages: Vec<TransformStage>,
    seed: Option<u64>,
}

impl TransformPipeline {
    /// Build a pipeline from its configuration.
    ///
    /// # Errors
    ///
    /// Returns `Err(DatasetError::InvalidTransform)` if the configuration does not validate.
    pub fn new(config: &TransformConfig) -> DatasetResult<Self> {
        config.validate()?;
        Ok(Self {
            stages: config.stages.clone(),
            seed: config.seed,
        })
    }

    /// A pipeline that only converts the image to floats in `[0, 1]`.
    pub const fn identity() -> Self {
        Self {
            stages: Vec::new(),
            seed: None,
        }
    }

    /// The configured stages.
    pub fn stages(&self) -> &[TransformStage] {
        &self.stages
    }

    /// Run all stages on an RGB image and return a `[3, H, W]` float image.
    ///
    /// `index` identifies the example; with a seed it makes random stages
    /// reproducible per example.
    ///
    /// # Errors
    ///
    /// Returns `Err(DatasetError::InvalidTransform)` if a crop does not fit the image.
    pub fn apply(&self, image: DynamicImage, index: usize) -> DatasetResult<PlanarImage> {
        let image = self.apply_image_stages(image, index)?;
        let rgb = image.to_rgb32f();
        let (width, height) = rgb.dimensions();
        let mut planar =
            PlanarImage::from_interleaved(rgb.as_raw(), 3, height as usize, width as usize);
        self.apply_float_stages(&mut planar);
        Ok(planar)
    }

    /// Run the image-space stages only.
    ///
    /// # Errors
    ///
    /// Returns `Err(DatasetError::InvalidTransform)` if a crop does not fit the image.
    pub fn apply_image_stages(
        &self,
        mut image: DynamicImage,
        index: usize,
    ) -> DatasetResult<DynamicImage> {
        let mut rng = self.rng(index);
        for stage in self.stages.iter().filter(|stage| stage.is_image_space()) {
            let flip = draw_flip(stage, &mut rng);
            image = apply_stage(stage, image, FilterType::Triangle, flip)?;
        }
        Ok(image)
    }

    /// Run the image-space stages on an image and its mask together.
    ///
    /// Both see the same resize, crop and flip decisions, drawn from the same
    /// RNG as [`apply_image_stages`](Self::apply_image_stages). The mask is
    /// resized with nearest-neighbour sampling so no new mask values appear.
    ///
    /// # Errors
    ///
    /// Returns `Err(DatasetError::InvalidTransform)` if a crop does not fit the
    /// image, or if image and mask sizes differ.
    pub fn apply_image_stages_pair(
        &self,
        mut image: DynamicImage,
        mut mask: DynamicImage,
        index: usize,
    ) -> DatasetResult<(DynamicImage, DynamicImage)> {
        if image.dimensions() != mask.dimensions() {
            return Err(DatasetError::InvalidTransform {
                reason: format!(
                    "image {:?} and mask {:?} differ in size",
                    image.dimensions(),
                    mask.dimensions()
                ),
            });
        }
        let mut rng = self.rng(index);
        for stage in self.stages.iter().filter(|stage| stage.is_image_space()) {
            let flip = draw_flip(stage, &mut rng);
            image = apply_stage(stage, image, FilterType::Triangle, flip)?;
            mask = apply_stage(stage, mask, FilterType::Nearest, flip)?;
        }
        Ok((image, mask))
    }

    /// Run the `Normalize` stages on planar data.
    pub fn apply_float_stages(&self, planar: &mut PlanarImage) {
        for stage in &self.stages {
            if let TransformStage::Normalize { mean, std } = stage {
                planar.normalize(mean, std);
            }
        }
    }

    fn rng(&self, index: usize) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(index as u64)),
            None => StdRng::from_os_rng(),
        }
    }
}

fn draw_flip(stage: &TransformStage, rng: &mut StdRng) -> bool {
    match *stage {
        TransformStage::RandomHorizontalFlip { probability } => rng.random_bool(probability),
        _ => false,
    }
}

fn apply_stage(
    stage: &TransformStage,
    image: DynamicImage,
    filter: FilterType,
    flip: bool,
) -> DatasetResult<DynamicImage> {
    Ok(match *stage {
        TransformStage::Resize { width, height } => image.resize_exact(width, height, filter),
        TransformStage::CenterCrop { width, height } => center_crop(&image, width, height)?,
        TransformStage::RandomHorizontalFlip { .. } if flip => image.fliph(),
        TransformStage::RandomHorizontalFlip { .. } | TransformStage::Normalize { .. } => image,
    })
}

fn center_crop(image: &DynamicImage, width: u32, height: u32) -> DatasetResult<DynamicImage> {
    if width > image.width() || height > image.height() {
        return Err(DatasetError::InvalidTransform {
            reason: format!(
                "crop {width}x{height} does not fit a {}x{} image",
                image.width(),
                image.height()
            ),
        });
    }
    let x = (image.width() - width) / 2;
    let y = (image.height() - height) / 2;
    Ok(image.crop_imm(x, y, width, height))
}
