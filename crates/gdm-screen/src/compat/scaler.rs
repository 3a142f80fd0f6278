//! Fitted standard scaler parameters exported as JSON.
//!
//! The expected document is `{"mean": [..], "scale": [..]}`, i.e. the
//! `mean_` and `scale_` attributes of a fitted scikit-learn `StandardScaler`.

use std::path::Path;

use serde::Deserialize;

use crate::model::{ScalerError, StandardScaler};

#[derive(Debug, thiserror::Error)]
pub enum ScalerImportError {
    #[error("failed to read scaler parameters: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid scaler JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Invalid(#[from] ScalerError),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ScalerJson {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

impl ScalerJson {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ScalerImportError> {
        let file = std::fs::File::open(path)?;
        Ok(serde_json::from_reader(std::io::BufReader::new(file))?)
    }

    pub fn parse(json: &str) -> Result<Self, ScalerImportError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Build the runtime scaler.
    ///
    /// scikit-learn stores a scale of exactly 0 for constant columns and
    /// divides by 1 instead; the same substitution is applied here.
    pub fn to_scaler(&self) -> Result<StandardScaler, ScalerImportError> {
        let scale = self
            .scale
            .iter()
            .map(|&s| if s == 0.0 { 1.0 } else { s })
            .collect();
        Ok(StandardScaler::new(self.mean.clone(), scale)?)
    }
}
