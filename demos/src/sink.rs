//! ROC curve capture for the command-line tools.

use std::{fs, path::Path};

use anyhow::{Context, Result};
use covid_ct::{RocCurve, RocCurveSink};
use serde::Serialize;

/// Keeps the last received curve so it can be written out after evaluation.
#[derive(Debug, Default)]
pub struct RecordedRocCurve {
    curve: Option<(RocCurve, f64)>,
}

#[derive(Serialize)]
struct RocCurveFile<'a> {
    auc: f64,
    #[serde(flatten)]
    curve: &'a RocCurve,
}

impl RecordedRocCurve {
    pub fn curve(&self) -> Option<&RocCurve> {
        self.curve.as_ref().map(|(curve, _)| curve)
    }

    /// Write the curve and its area as JSON.
    ///
    /// # Errors
    ///
    /// Fails if nothing was recorded or the file cannot be written.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let (curve, auc) = self
            .curve
            .as_ref()
            .context("No ROC curve was recorded")?;
        let json = serde_json::to_string_pretty(&RocCurveFile { auc: *auc, curve })?;
        fs::write(path, json)
            .with_context(|| format!("Failed to write ROC curve: {}", path.display()))?;
        tracing::info!(path = %path.display(), points = curve.len(), "saved ROC curve");
        Ok(())
    }
}

impl RocCurveSink for RecordedRocCurve {
    fn receive(&mut self, curve: &RocCurve, auc: f64) {
        self.curve = Some((curve.clone(), auc));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn saved_file_holds_area_and_points() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("roc.json");
        let mut sink = RecordedRocCurve::default();
        assert!(sink.save_json(&path).is_err());

        let curve = covid_ct::metrics::roc_curve(&[0, 1, 1], &[0.2, 0.7, 0.9], 1);
        sink.receive(&curve, 1.0);
        sink.save_json(&path).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["auc"], 1.0);
        assert_eq!(value["fpr"].as_array().unwrap().len(), curve.len());
        let reloaded: RocCurve = serde_json::from_value(value).unwrap();
        assert_eq!(reloaded, curve);
        assert_eq!(sink.curve(), Some(&curve));
    }
}
