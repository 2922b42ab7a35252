//! Command-line tools for the COVID CT crate.
//!
//! ## Available tools
//!
//! - `evaluate`: run a classifier over a manifest split and print its metrics
//! - `dataset_test`: inspect a classification or segmentation dataset
//!
//! ## Usage
//!
//! ```bash
//! # Evaluate the baseline classifier with trained weights
//! cargo run --bin evaluate -- --dataset-root data/Images-processed \
//!     --covid-manifest COVID/testCT_COVID.txt \
//!     --non-covid-manifest NonCOVID/testCT_NonCOVID.txt \
//!     --weights baseline.mpk --roc-output roc.json
//!
//! # Inspect a segmentation dataset at half resolution
//! cargo run --bin dataset_test -- --kind segmentation \
//!     --images-dir data/imgs --masks-dir data/masks --scale 0.5
//! ```

pub mod config;
pub mod logging;
pub mod model;
pub mod sink;

// Re-export commonly used items
pub use config::{DatasetKind, DatasetTestConfig, EvaluateConfig};
pub use logging::init_tracing;
pub use model::{BaselineClassifier, BaselineClassifierConfig};
pub use sink::RecordedRocCurve;

cfg_if::cfg_if! {
    if #[cfg(feature = "cuda")] {
        /// Backend the tools run on, chosen by cargo feature.
        pub type SelectedBackend = burn::backend::cuda::Cuda;
        const BACKEND_NAME: &str = "CUDA (NVIDIA GPU)";
    } else if #[cfg(feature = "wgpu")] {
        /// Backend the tools run on, chosen by cargo feature.
        pub type SelectedBackend = burn::backend::wgpu::Wgpu;
        const BACKEND_NAME: &str = "WGPU (GPU)";
    } else {
        /// Backend the tools run on, chosen by cargo feature.
        pub type SelectedBackend = burn::backend::ndarray::NdArray;
        const BACKEND_NAME: &str = "NdArray (CPU)";
    }
}

/// Device of [`SelectedBackend`].
pub type SelectedDevice = <SelectedBackend as burn::tensor::backend::Backend>::Device;

/// Default device of the selected backend.
pub fn create_device() -> SelectedDevice {
    SelectedDevice::default()
}

/// Backend name for logging.
pub const fn get_backend_name() -> &'static str {
    BACKEND_NAME
}

#[cfg(test)]
mod tests {
    use burn::tensor::Tensor;

    use super::*;

    #[test]
    fn selected_backend_allocates_on_default_device() {
        let device = create_device();
        let zeros = Tensor::<SelectedBackend, 2>::zeros([2, 3], &device);
        assert_eq!(zeros.dims(), [2, 3]);
        assert!(!get_backend_name().is_empty());
    }
}
