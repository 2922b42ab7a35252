//! Error types for dataset access and metric computation.
//!
//! Dataset errors are raised while reading manifests, decoding images and
//! preprocessing examples. Metric errors are raised while turning model
//! outputs into a [`MetricsReport`](crate::metrics::MetricsReport).

use std::path::PathBuf;

use thiserror::Error;

/// Error type for dataset construction and example access.
#[derive(Error, Debug)]
pub enum DatasetError {
    /// A manifest (split file) could not be read.
    #[error("Failed to read manifest: {path}")]
    ManifestRead {
        /// The manifest path.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Reading a directory listing failed.
    #[error("Failed to read directory: {path}")]
    DirectoryReadFailed {
        /// The directory path that failed to read.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Opening or decoding an image file failed.
    #[error("Failed to open image: {path}")]
    ImageOpenFailed {
        /// The image file path that failed to open.
        path: PathBuf,
        /// The underlying image decoding error.
        #[source]
        source: image::ImageError,
    },

    /// No file matched an example id.
    #[error("No file found for id {id} in {dir}")]
    MissingFile {
        /// The directory that was searched.
        dir: PathBuf,
        /// The example id (file stem, including any suffix).
        id: String,
    },

    /// More than one file matched an example id.
    #[error("Multiple files found for id {id}: {candidates:?}")]
    AmbiguousFile {
        /// The example id (file stem, including any suffix).
        id: String,
        /// Every matching path.
        candidates: Vec<PathBuf>,
    },

    /// An image and its mask differ in pixel dimensions.
    #[error("Image and mask {id} should be the same size, but are {image:?} and {mask:?}")]
    ShapeMismatch {
        /// The example id.
        id: String,
        /// Image `(width, height)`.
        image: (u32, u32),
        /// Mask `(width, height)`.
        mask: (u32, u32),
    },

    /// The resize scale is outside `(0, 1]`.
    #[error("Scale must be between 0 and 1, got {scale}")]
    InvalidScale {
        /// The rejected scale.
        scale: f64,
    },

    /// Scaling would produce an empty image.
    #[error("Scale {scale} is too small for a {width}x{height} image")]
    DegenerateScale {
        /// The requested scale.
        scale: f64,
        /// Original width.
        width: u32,
        /// Original height.
        height: u32,
    },

    /// A class name is not part of the class mapping.
    #[error("Unknown class: {name}")]
    UnknownClass {
        /// The unknown class name.
        name: String,
    },

    /// The class mapping itself is malformed.
    #[error("Invalid class mapping: {reason}")]
    InvalidClassMapping {
        /// Why the mapping was rejected.
        reason: String,
    },

    /// A label rule refers to a class index outside the mapping.
    #[error("Label rule class index {index} is out of range for {num_classes} classes")]
    InvalidLabelRule {
        /// The offending class index.
        index: usize,
        /// Number of classes in the mapping.
        num_classes: usize,
    },

    /// A transform pipeline is malformed or cannot be applied to an image.
    #[error("Invalid transform: {reason}")]
    InvalidTransform {
        /// Why the transform was rejected.
        reason: String,
    },

    /// A mask pixel does not correspond to any lesion class.
    #[error("Unmapped mask value {value:?} at ({x}, {y})")]
    UnmappedMaskValue {
        /// The pixel value as RGB.
        value: [u8; 3],
        /// Pixel column.
        x: u32,
        /// Pixel row.
        y: u32,
    },

    /// An example index is past the end of the dataset.
    #[error("Index {index} is out of range for a dataset of {len} examples")]
    IndexOutOfRange {
        /// The requested index.
        index: usize,
        /// The dataset length.
        len: usize,
    },
}

/// A specialized `Result` type for dataset operations.
pub type DatasetResult<T> = Result<T, DatasetError>;

/// Error type for metric computation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MetricsError {
    /// The evaluation targets never contain a class, so its recall and the ROC AUC are undefined.
    #[error("Targets contain no example of class {class} ({name}); recall and ROC AUC are undefined")]
    MissingClass {
        /// Index of the missing class.
        class: usize,
        /// Name of the missing class.
        name: String,
    },

    /// No example was evaluated.
    #[error("Evaluation produced no examples")]
    EmptyEvaluation,

    /// The positive class index does not fit the configured classes.
    #[error("Positive class index {index} is out of range for {num_classes} classes")]
    InvalidPositiveClass {
        /// The configured positive class index.
        index: usize,
        /// Number of configured classes.
        num_classes: usize,
    },

    /// The model produced logits of an unexpected shape.
    #[error("Invalid logits shape: expected [{batch}, {classes}], got {actual:?}")]
    LogitShape {
        /// Expected batch size.
        batch: usize,
        /// Expected number of classes.
        classes: usize,
        /// Actual logits dimensions.
        actual: [usize; 2],
    },

    /// Per-example columns of one batch disagree in length.
    #[error("Batch columns disagree in length: {scores} scores, {predictions} predictions, {targets} targets, {paths} paths")]
    BatchLength {
        /// Number of scores.
        scores: usize,
        /// Number of predictions.
        predictions: usize,
        /// Number of targets.
        targets: usize,
        /// Number of paths.
        paths: usize,
    },

    /// A label or prediction is outside the configured classes.
    #[error("Label {label} is out of range for {num_classes} classes")]
    LabelOutOfRange {
        /// The offending label.
        label: i64,
        /// Number of configured classes.
        num_classes: usize,
    },
}

/// A specialized `Result` type for metric computation.
pub type MetricsResult<T> = Result<T, MetricsError>;
