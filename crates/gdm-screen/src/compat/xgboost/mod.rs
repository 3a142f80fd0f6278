//! XGBoost JSON model format support.
//!
//! This module provides parsing of XGBoost's JSON model format and conversion
//! to native screening classifiers.

mod convert;
mod json;

pub use convert::{prob_to_margin, ConversionError};
pub use json::*;
