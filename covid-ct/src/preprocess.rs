//! Planar float images and the scaled-resize preprocessing shared by images and masks.

use image::{imageops::FilterType, DynamicImage};

use crate::error::{DatasetError, DatasetResult};

/// Channel-first `[C, H, W]` float image.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanarImage {
    /// Pixel values, channel planes one after another.
    pub data: Vec<f32>,
    /// Number of channels.
    pub channels: usize,
    /// Height in pixels.
    pub height: usize,
    /// Width in pixels.
    pub width: usize,
}

impl PlanarImage {
    /// Reorder interleaved `[H, W, C]` values into `[C, H, W]`.
    ///
    /// # Panics
    ///
    /// Panics if `interleaved.len() != height * width * channels`.
    pub fn from_interleaved(
        interleaved: &[f32],
        channels: usize,
        height: usize,
        width: usize,
    ) -> Self {
        assert_eq!(
            interleaved.len(),
            height * width * channels,
            "interleaved buffer does not match {channels}x{height}x{width}"
        );

        let plane = height * width;
        let mut data = vec![0.0; interleaved.len()];
        for (pixel, values) in interleaved.chunks_exact(channels).enumerate() {
            for (channel, value) in values.iter().enumerate() {
                data[channel * plane + pixel] = *value;
            }
        }

        Self {
            data,
            channels,
            height,
            width,
        }
    }

    /// `[C, H, W]`.
    pub const fn shape(&self) -> [usize; 3] {
        [self.channels, self.height, self.width]
    }

    /// Largest value, or `f32::NEG_INFINITY` for an empty image.
    pub fn max(&self) -> f32 {
        self.data.iter().copied().fold(f32::NEG_INFINITY, f32::max)
    }

    /// Divide every value by 255 when the largest one exceeds 1.
    ///
    /// Data already in `[0, 1]` is left untouched.
    pub fn rescale_if_needed(&mut self) {
        if self.max() > 1.0 {
            for value in &mut self.data {
                *value /= 255.0;
            }
        }
    }

    /// Apply `(x - mean[c]) / std[c]` to every channel plane.
    pub fn normalize(&mut self, mean: &[f32], std: &[f32]) {
        let plane = self.height * self.width;
        for (channel, values) in self.data.chunks_exact_mut(plane.max(1)).enumerate() {
            let (m, s) = (mean[channel % mean.len()], std[channel % std.len()]);
            for value in values {
                *value = (*value - m) / s;
            }
        }
    }
}

/// Dimensions after scaling `width` x `height` by `scale`, truncating toward zero.
///
/// # Errors
///
/// Returns `Err(DatasetError::DegenerateScale)` when either dimension would be zero.
pub fn scaled_dimensions(width: u32, height: u32, scale: f64) -> DatasetResult<(u32, u32)> {
    let new_width = (scale * f64::from(width)).floor();
    let new_height = (scale * f64::from(height)).floor();
    if new_width < 1.0 || new_height < 1.0 {
        return Err(DatasetError::DegenerateScale {
            scale,
            width,
            height,
        });
    }
    Ok((new_width as u32, new_height as u32))
}

/// Scale an image, lay it out channel-first and bring 8-bit values into `[0, 1]`.
///
/// Gray images keep a single channel. Values are divided by 255 only when the
/// resized data has a maximum above 1.
///
/// # Errors
///
/// Returns `Err(DatasetError::DegenerateScale)` when the scaled size would be empty.
pub fn preprocess(
    image: &DynamicImage,
    scale: f64,
    filter: FilterType,
) -> DatasetResult<PlanarImage> {
    let (width, height) = scaled_dimensions(image.width(), image.height(), scale)?;
    let resized = if (width, height) == (image.width(), image.height()) {
        image.clone()
    } else {
        image.resize_exact(width, height, filter)
    };

    let (channels, interleaved): (usize, Vec<f32>) = match &resized {
        DynamicImage::ImageLuma8(buffer) => (1, to_f32(buffer.as_raw())),
        DynamicImage::ImageLumaA8(buffer) => (2, to_f32(buffer.as_raw())),
        DynamicImage::ImageRgba8(buffer) => (4, to_f32(buffer.as_raw())),
        DynamicImage::ImageRgb32F(buffer) => (3, buffer.as_raw().clone()),
        other => (3, to_f32(other.to_rgb8().as_raw())),
    };

    let mut planar =
        PlanarImage::from_interleaved(&interleaved, channels, height as usize, width as usize);
    planar.rescale_if_needed();
    Ok(planar)
}

fn to_f32(values: &[u8]) -> Vec<f32> {
    values.iter().map(|&v| f32::from(v)).collect()
}

#[cfg(test)]
mod tests {
    use image::{GrayImage, Luma, Rgb, RgbImage};

    use super::*;

    #[test]
    fn half_scale_halves_dimensions() {
        assert_eq!(scaled_dimensions(10, 10, 0.5).unwrap(), (5, 5));
        assert_eq!(scaled_dimensions(11, 7, 0.5).unwrap(), (5, 3));
    }

    #[test]
    fn tiny_scale_is_degenerate() {
        match scaled_dimensions(10, 10, 0.001) {
            Err(DatasetError::DegenerateScale {
                width: 10,
                height: 10,
                ..
            }) => {}
            other => panic!("Expected DegenerateScale error, got {other:?}"),
        }
    }

    #[test]
    fn interleaved_becomes_channel_first() {
        // 1x2 image, RGB: pixel0 = (1, 2, 3), pixel1 = (4, 5, 6)
        let planar = PlanarImage::from_interleaved(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0], 3, 1, 2);
        assert_eq!(planar.shape(), [3, 1, 2]);
        assert_eq!(planar.data, vec![1.0, 4.0, 2.0, 5.0, 3.0, 6.0]);
    }

    #[test]
    fn preprocess_rgb_scales_and_rescales() {
        let image = RgbImage::from_pixel(10, 10, Rgb([255, 0, 51]));
        let planar = preprocess(&DynamicImage::ImageRgb8(image), 0.5, FilterType::Nearest).unwrap();

        assert_eq!(planar.shape(), [3, 5, 5]);
        assert!(planar.data[..25].iter().all(|v| (*v - 1.0).abs() < 1e-6));
        assert!(planar.data[25..50].iter().all(|v| *v == 0.0));
        assert!(planar.data[50..].iter().all(|v| (*v - 0.2).abs() < 1e-6));
    }

    #[test]
    fn preprocess_keeps_single_gray_channel() {
        let image = GrayImage::from_pixel(4, 6, Luma([150]));
        let planar = preprocess(&DynamicImage::ImageLuma8(image), 1.0, FilterType::Nearest).unwrap();

        assert_eq!(planar.shape(), [1, 6, 4]);
        assert!(planar.data.iter().all(|v| (*v - 150.0 / 255.0).abs() < 1e-6));
    }

    #[test]
    fn preprocess_leaves_unit_range_data_alone() {
        // A 0/1 mask is already normalized and must not be divided again.
        let mut image = GrayImage::new(2, 2);
        image.put_pixel(0, 0, Luma([1]));
        let planar = preprocess(&DynamicImage::ImageLuma8(image), 1.0, FilterType::Nearest).unwrap();

        assert_eq!(planar.data, vec![1.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn normalize_applies_per_channel_statistics() {
        let mut planar = PlanarImage::from_interleaved(&[0.5, 0.5, 0.5], 3, 1, 1);
        planar.normalize(&[0.5, 0.0, 1.0], &[1.0, 0.5, 0.25]);
        assert_eq!(planar.data, vec![0.0, 1.0, -2.0]);
    }
}
