//! Inference and explanation for one screening request.
//!
//! [`infer`] resolves the scoring classifier, computes the class-1
//! probability, applies the decision threshold and attributes the margin to
//! the nine features. Prediction failures are returned as [`EngineError`];
//! an attribution failure travels next to a successful prediction so the
//! probability and label can still be shown.

use std::time::Instant;

use serde::Serialize;

use crate::explain::{self, Attribution, Background, ExplanationError};
use crate::features::{feature_names, FeatureVector};
use crate::model::{Classifier, FeatureCountMismatch, Model, UnsupportedModelError};

/// Default decision threshold on the class-1 probability.
///
/// Lower than 0.5 so that screening favours sensitivity.
pub const DEFAULT_THRESHOLD: f64 = 0.3;

/// Screening verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Label {
    Positive,
    Negative,
}

/// `Positive` iff `probability >= threshold`.
#[inline]
pub fn classify(probability: f64, threshold: f64) -> Label {
    if probability >= threshold {
        Label::Positive
    } else {
        Label::Negative
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PredictionResult {
    /// Class-1 probability in `[0, 1]`.
    pub probability: f64,
    /// Raw model output (log-odds).
    pub margin: f64,
    pub label: Label,
    pub threshold: f64,
}

impl PredictionResult {
    /// Probability as a percentage with two decimals, e.g. `"35.00%"`.
    pub fn percentage(&self) -> String {
        format!("{:.2}%", self.probability * 100.0)
    }
}

/// Per-request operating choices.
#[derive(Debug, Clone, PartialEq)]
pub struct InferOptions {
    pub threshold: f64,
    pub background: Background,
}

impl Default for InferOptions {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            background: Background::ModelDefault,
        }
    }
}

/// A prediction and its (possibly failed) explanation.
#[derive(Debug, Clone, PartialEq)]
pub struct Inference {
    pub prediction: PredictionResult,
    pub attribution: Result<Attribution, ExplanationError>,
}

/// Errors that prevent a prediction.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Unsupported(#[from] UnsupportedModelError),

    #[error(transparent)]
    FeatureCount(#[from] FeatureCountMismatch),

    #[error("model produced a non-finite score (margin {margin})")]
    NonFiniteScore { margin: f64 },
}

/// Score and explain `input` with `model`.
pub fn infer(
    model: &Model,
    input: &FeatureVector,
    options: &InferOptions,
) -> Result<Inference, EngineError> {
    let start = Instant::now();
    let resolved = model.resolve(input.as_slice())?;
    let scorer = resolved.scorer;
    log::debug!(
        "scoring {} model with {} classifier",
        model.kind(),
        scorer.booster().kind()
    );

    let [_, probability] = scorer.predict_proba(&resolved.transformed)?;
    let margin = scorer.margin(&resolved.transformed);
    if !margin.is_finite() {
        return Err(EngineError::NonFiniteScore { margin });
    }
    let prediction = PredictionResult {
        probability,
        margin,
        label: classify(probability, options.threshold),
        threshold: options.threshold,
    };

    let attribution = attribute(model, scorer, &resolved.transformed, &options.background);
    if let Err(e) = &attribution {
        log::warn!("explanation unavailable: {e}");
    }

    log::debug!(
        "inference finished in {:?}: p={:.4} margin={:.4} label={:?}",
        start.elapsed(),
        prediction.probability,
        prediction.margin,
        prediction.label
    );
    Ok(Inference {
        prediction,
        attribution,
    })
}

fn attribute(
    model: &Model,
    scorer: &Classifier,
    transformed: &[f64],
    background: &Background,
) -> Result<Attribution, ExplanationError> {
    let reference = match background {
        Background::ModelDefault => None,
        Background::SelfReference => Some(transformed.to_vec()),
        Background::Reference(raw) => Some(model.preprocess(raw).map_err(|e| {
            ExplanationError::BackgroundShape {
                expected: e.expected,
                actual: e.actual,
            }
        })?),
    };
    let shap = explain::explain(scorer, transformed, reference.as_deref())?;
    Ok(Attribution::from_shap(&shap, &feature_names(), transformed))
}
