//! Import of models trained outside this crate.
//!
//! [`xgboost`] converts a booster saved with `save_model("*.json")`;
//! [`scaler`] reads the fitted standardization parameters that sit in front of
//! it in a pipeline.

pub mod scaler;
pub mod xgboost;

pub use scaler::{ScalerImportError, ScalerJson};
