//! Dataset adapters for the classification and lesion segmentation tasks.

pub mod classification;
pub mod segmentation;

pub use classification::{CovidCtDataset, CtBatch, CtBatcher, CtItem};
pub use segmentation::{SegBatch, SegBatcher, SegItem, SegmentationDataset};
