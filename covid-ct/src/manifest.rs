//! Split manifests and the explicit class-name to class-index mapping.

use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::{
    config::default_class_names,
    error::{DatasetError, DatasetResult},
};

/// Read a newline-delimited manifest.
///
/// Lines are stripped of surrounding whitespace; blank lines are skipped.
///
/// # Errors
///
/// Returns `Err(DatasetError::ManifestRead)` if the file cannot be read as UTF-8 text.
pub fn read_manifest(path: impl AsRef<Path>) -> DatasetResult<Vec<String>> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|source| DatasetError::ManifestRead {
        path: path.to_path_buf(),
        source,
    })?;

    Ok(text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

/// One labeled example as listed by a manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    /// Path of the image file.
    pub path: PathBuf,
    /// Class index.
    pub label: usize,
}

/// Ordered, duplicate-free class names; a class's index is its position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassMapping {
    names: Vec<String>,
}

impl ClassMapping {
    /// # Errors
    ///
    /// Returns `Err(DatasetError::InvalidClassMapping)` for an empty list or a
    /// repeated name.
    pub fn new<S: Into<String>>(names: impl IntoIterator<Item = S>) -> DatasetResult<Self> {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        if names.is_empty() {
            return Err(DatasetError::InvalidClassMapping {
                reason: "no class names given".to_string(),
            });
        }
        for (position, name) in names.iter().enumerate() {
            if names[..position].contains(name) {
                return Err(DatasetError::InvalidClassMapping {
                    reason: format!("class {name} is listed twice"),
                });
            }
        }
        Ok(Self { names })
    }

    /// Index of a class name.
    ///
    /// # Errors
    ///
    /// Returns `Err(DatasetError::UnknownClass)` if the name is not mapped.
    pub fn index_of(&self, name: &str) -> DatasetResult<usize> {
        self.names
            .iter()
            .position(|candidate| candidate == name)
            .ok_or_else(|| DatasetError::UnknownClass {
                name: name.to_string(),
            })
    }

    /// Name of a class index.
    pub fn name(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(String::as_str)
    }

    /// All names in index order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Number of classes.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Always false for a constructed mapping.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl Default for ClassMapping {
    /// `CT_NonCOVID` = 0, `CT_COVID` = 1.
    fn default() -> Self {
        Self {
            names: default_class_names(),
        }
    }
}

/// A manifest listing the images of a single class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassManifest {
    /// Class name, also the image subdirectory under the dataset root.
    pub class_name: String,
    /// Path of the manifest file.
    pub path: PathBuf,
}

impl ClassManifest {
    pub fn new(class_name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            class_name: class_name.into(),
            path: path.into(),
        }
    }
}
