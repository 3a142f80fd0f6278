//! Standardizing preprocessor applied by pipeline models.

use ndarray::{Array1, ArrayView1};

/// Errors raised when a scaler's parameters are inconsistent.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ScalerError {
    #[error("scaler mean has {mean} entries but scale has {scale}")]
    LengthMismatch { mean: usize, scale: usize },

    #[error("scaler parameter {field}[{index}] is not finite")]
    NonFinite { field: &'static str, index: usize },

    #[error("scaler scale[{index}] is zero")]
    ZeroScale { index: usize },
}

/// Fitted standard scaler: `z = (x - mean) / scale`.
#[derive(Debug, Clone, PartialEq)]
pub struct StandardScaler {
    mean: Array1<f64>,
    scale: Array1<f64>,
}

impl StandardScaler {
    /// Build a scaler, rejecting mismatched, non-finite or zero parameters.
    pub fn new(mean: Vec<f64>, scale: Vec<f64>) -> Result<Self, ScalerError> {
        if mean.len() != scale.len() {
            return Err(ScalerError::LengthMismatch {
                mean: mean.len(),
                scale: scale.len(),
            });
        }
        for (field, values) in [("mean", &mean), ("scale", &scale)] {
            if let Some(index) = values.iter().position(|v| !v.is_finite()) {
                return Err(ScalerError::NonFinite { field, index });
            }
        }
        if let Some(index) = scale.iter().position(|&s| s == 0.0) {
            return Err(ScalerError::ZeroScale { index });
        }
        Ok(Self {
            mean: Array1::from(mean),
            scale: Array1::from(scale),
        })
    }

    /// Identity scaler over `n_features` inputs.
    pub fn identity(n_features: usize) -> Self {
        Self {
            mean: Array1::zeros(n_features),
            scale: Array1::ones(n_features),
        }
    }

    #[inline]
    pub fn n_features(&self) -> usize {
        self.mean.len()
    }

    pub fn mean(&self) -> &[f64] {
        self.mean.as_slice().unwrap_or(&[])
    }

    pub fn scale(&self) -> &[f64] {
        self.scale.as_slice().unwrap_or(&[])
    }

    /// Standardize one row. `features` must have [`n_features`](Self::n_features) entries.
    pub fn transform(&self, features: &[f64]) -> Vec<f64> {
        debug_assert_eq!(features.len(), self.n_features());
        let x = ArrayView1::from(features);
        ((&x - &self.mean) / &self.scale).to_vec()
    }
}
