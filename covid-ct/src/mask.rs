//! Lesion mask to class-index remapping.
//!
//! Masks store one gray level per lesion class. The remapper is a direct
//! lookup table from those gray levels to class indices; any other value is
//! reported as an error instead of being left unassigned.

use image::{DynamicImage, GrayImage, RgbImage};
use serde::{Deserialize, Serialize};

use crate::error::{DatasetError, DatasetResult};

/// Lung lesion classes of the segmentation task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LesionClass {
    Background,
    GroundGlass,
    Consolidation,
    PleuralEffusion,
}

impl LesionClass {
    /// All classes, in index order.
    pub const ALL: [Self; 4] = [
        Self::Background,
        Self::GroundGlass,
        Self::Consolidation,
        Self::PleuralEffusion,
    ];

    /// Class index used in target tensors.
    pub const fn index(self) -> usize {
        match self {
            Self::Background => 0,
            Self::GroundGlass => 1,
            Self::Consolidation => 2,
            Self::PleuralEffusion => 3,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Background => "background",
            Self::GroundGlass => "ground-glass opacity",
            Self::Consolidation => "consolidation",
            Self::PleuralEffusion => "pleural effusion",
        }
    }
}

/// Gray level of each lesion class in the mask files.
pub const LESION_PALETTE: [(u8, LesionClass); 4] = [
    (0, LesionClass::Background),
    (150, LesionClass::GroundGlass),
    (255, LesionClass::Consolidation),
    (104, LesionClass::PleuralEffusion),
];

/// Row-major per-pixel class indices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassMask {
    /// Class index of every pixel.
    pub classes: Vec<i64>,
    /// Height in pixels.
    pub height: usize,
    /// Width in pixels.
    pub width: usize,
}

impl ClassMask {
    /// Pixel count per class index.
    pub fn histogram(&self) -> [usize; 4] {
        let mut counts = [0; 4];
        for class in &self.classes {
            counts[*class as usize] += 1;
        }
        counts
    }
}

/// Lookup table from mask gray level to class index.
#[derive(Debug, Clone)]
pub struct MaskRemapper {
    table: [Option<LesionClass>; 256],
}

impl MaskRemapper {
    /// A remapper for an arbitrary palette.
    pub fn new(palette: &[(u8, LesionClass)]) -> Self {
        let mut table = [None; 256];
        for (value, class) in palette {
            table[usize::from(*value)] = Some(*class);
        }
        Self { table }
    }

    /// Class of a gray level, if it belongs to the palette.
    pub fn lookup(&self, value: u8) -> Option<LesionClass> {
        self.table[usize::from(value)]
    }

    /// Remap a single-channel mask.
    ///
    /// # Errors
    ///
    /// Returns `Err(DatasetError::UnmappedMaskValue)` for the first pixel
    /// whose value is not in the palette.
    pub fn remap_gray(&self, mask: &GrayImage) -> DatasetResult<ClassMask> {
        let mut classes = Vec::with_capacity(mask.as_raw().len());
        for (x, y, pixel) in mask.enumerate_pixels() {
            let value = pixel.0[0];
            let class = self
                .lookup(value)
                .ok_or(DatasetError::UnmappedMaskValue {
                    value: [value; 3],
                    x,
                    y,
                })?;
            classes.push(class.index() as i64);
        }
        Ok(ClassMask {
            classes,
            height: mask.height() as usize,
            width: mask.width() as usize,
        })
    }

    /// Remap a three-channel mask whose channels carry the same gray level.
    ///
    /// # Errors
    ///
    /// Returns `Err(DatasetError::UnmappedMaskValue)` for the first pixel
    /// with unequal channels or a value outside the palette.
    pub fn remap_rgb(&self, mask: &RgbImage) -> DatasetResult<ClassMask> {
        let mut classes = Vec::with_capacity(mask.as_raw().len() / 3);
        for (x, y, pixel) in mask.enumerate_pixels() {
            let [r, g, b] = pixel.0;
            let class = if r == g && g == b {
                self.lookup(r)
            } else {
                None
            };
            let class = class.ok_or(DatasetError::UnmappedMaskValue {
                value: pixel.0,
                x,
                y,
            })?;
            classes.push(class.index() as i64);
        }
        Ok(ClassMask {
            classes,
            height: mask.height() as usize,
            width: mask.width() as usize,
        })
    }

    /// Remap a decoded mask of any color type.
    ///
    /// Gray masks (with or without alpha) are read by luminance, everything
    /// else as 8-bit RGB.
    ///
    /// # Errors
    ///
    /// See [`MaskRemapper::remap_gray`] and [`MaskRemapper::remap_rgb`].
    pub fn remap(&self, mask: &DynamicImage) -> DatasetResult<ClassMask> {
        match mask {
            DynamicImage::ImageLuma8(gray) => self.remap_gray(gray),
            DynamicImage::ImageLumaA8(_) | DynamicImage::ImageLuma16(_) | DynamicImage::ImageLumaA16(_) => {
                self.remap_gray(&mask.to_luma8())
            }
            other => self.remap_rgb(&other.to_rgb8()),
        }
    }
}

impl Default for MaskRemapper {
    /// The remapper for [`LESION_PALETTE`].
    fn default() -> Self {
        Self::new(&LESION_PALETTE)
    }
}

#[cfg(test)]
mod tests {
    use image::{Luma, Rgb};

    use super::*;

    fn palette_gray(width: u32, height: u32) -> GrayImage {
        let values = [0u8, 150, 255, 104];
        GrayImage::from_fn(width, height, |x, y| Luma([values[((x + y) % 4) as usize]]))
    }

    #[test]
    fn canonical_values_map_to_class_indices() {
        let remapper = MaskRemapper::default();
        assert_eq!(remapper.lookup(0), Some(LesionClass::Background));
        assert_eq!(remapper.lookup(150), Some(LesionClass::GroundGlass));
        assert_eq!(remapper.lookup(255), Some(LesionClass::Consolidation));
        assert_eq!(remapper.lookup(104), Some(LesionClass::PleuralEffusion));
        assert_eq!(remapper.lookup(1), None);
    }

    #[test]
    fn gray_mask_maps_every_pixel_at_any_resolution() {
        let remapper = MaskRemapper::default();
        for (width, height) in [(1, 1), (4, 4), (7, 3), (64, 33)] {
            let mask = palette_gray(width, height);
            let classes = remapper.remap_gray(&mask).unwrap();

            assert_eq!((classes.width, classes.height), (width as usize, height as usize));
            for (pixel, class) in mask.pixels().zip(&classes.classes) {
                let expected = match pixel.0[0] {
                    0 => 0,
                    150 => 1,
                    255 => 2,
                    104 => 3,
                    _ => unreachable!(),
                };
                assert_eq!(*class, expected);
            }
        }
    }

    #[test]
    fn rgb_mask_with_equal_channels_is_accepted() {
        let mask = RgbImage::from_fn(2, 2, |x, _| {
            if x == 0 {
                Rgb([104, 104, 104])
            } else {
                Rgb([255, 255, 255])
            }
        });
        let classes = MaskRemapper::default().remap_rgb(&mask).unwrap();
        assert_eq!(classes.classes, vec![3, 2, 3, 2]);
        assert_eq!(classes.histogram(), [0, 0, 2, 2]);
    }

    #[test]
    fn colored_pixel_is_rejected() {
        let mut mask = RgbImage::new(3, 3);
        mask.put_pixel(2, 1, Rgb([150, 0, 0]));
        match MaskRemapper::default().remap_rgb(&mask) {
            Err(DatasetError::UnmappedMaskValue { value, x, y }) => {
                assert_eq!(value, [150, 0, 0]);
                assert_eq!((x, y), (2, 1));
            }
            other => panic!("Expected UnmappedMaskValue error, got {other:?}"),
        }
    }

    #[test]
    fn interpolated_value_is_rejected() {
        let mut mask = palette_gray(4, 4);
        mask.put_pixel(1, 2, Luma([149]));
        assert!(matches!(
            MaskRemapper::default().remap(&DynamicImage::ImageLuma8(mask)),
            Err(DatasetError::UnmappedMaskValue { x: 1, y: 2, .. })
        ));
    }

    #[test]
    fn class_indices_are_distinct() {
        let indices: Vec<usize> = LesionClass::ALL.iter().map(|c| c.index()).collect();
        assert_eq!(indices, vec![0, 1, 2, 3]);
    }
}
