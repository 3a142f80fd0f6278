//! Output transformation from raw margins to predictions.
//!
//! A classifier persists its [`OutputTransform`] instead of the training
//! objective. Only [`Sigmoid`](OutputTransform::Sigmoid) yields a class-1
//! probability; an [`Identity`](OutputTransform::Identity) model (regression
//! or raw-margin objectives) has no probability operation.

use serde::{Deserialize, Serialize};

/// Inference-time output transformation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputTransform {
    /// No transformation; output = margin.
    #[default]
    Identity,

    /// Logistic sigmoid: output = 1 / (1 + exp(-margin)).
    Sigmoid,
}

impl OutputTransform {
    /// Map an objective name to its output transform.
    ///
    /// Logistic objectives produce probabilities; everything else, including
    /// `binary:logitraw`, leaves the margin untouched.
    pub fn from_objective(objective: &str) -> Self {
        match objective {
            "binary:logistic" | "reg:logistic" => OutputTransform::Sigmoid,
            _ => OutputTransform::Identity,
        }
    }

    /// Whether this transform yields a probability.
    #[inline]
    pub fn is_probabilistic(&self) -> bool {
        matches!(self, OutputTransform::Sigmoid)
    }

    #[inline]
    pub fn apply(&self, margin: f64) -> f64 {
        match self {
            OutputTransform::Identity => margin,
            OutputTransform::Sigmoid => sigmoid(margin),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            OutputTransform::Identity => "identity",
            OutputTransform::Sigmoid => "sigmoid",
        }
    }
}

/// Numerically stable sigmoid.
/// Clamps input to [-500, 500] to prevent overflow.
#[inline]
pub fn sigmoid(x: f64) -> f64 {
    let clamped = x.clamp(-500.0, 500.0);
    if clamped >= 0.0 {
        1.0 / (1.0 + (-clamped).exp())
    } else {
        let e = clamped.exp();
        e / (1.0 + e)
    }
}

/// Inverse sigmoid: probability to log-odds.
///
/// Probabilities are clamped away from 0 and 1 so the result stays finite.
#[inline]
pub fn logit(p: f64) -> f64 {
    let p = p.clamp(1e-16, 1.0 - 1e-16);
    (p / (1.0 - p)).ln()
}
