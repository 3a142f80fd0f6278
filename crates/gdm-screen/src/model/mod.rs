//! Screening models: bare classifiers and scaler + classifier pipelines.
//!
//! A [`Model`] is immutable once loaded. Scoring always goes through
//! [`Model::resolve`], which applies a pipeline's scaler and exposes the
//! classifier that actually produces the margin.

mod cache;
mod scaler;
mod transform;

pub use cache::{shared_cache, ModelCache, ModelLoadError};
pub use scaler::{ScalerError, StandardScaler};
pub use transform::{logit, sigmoid, OutputTransform};

use crate::repr::{Forest, ForestValidationError, LinearModel};

/// The scoring engine inside a classifier.
#[derive(Debug, Clone, PartialEq)]
pub enum Booster {
    /// Additive tree ensemble.
    Forest(Forest),
    /// Linear (logistic) model.
    Linear(LinearModel),
}

impl Booster {
    pub fn n_features(&self) -> usize {
        match self {
            Booster::Forest(forest) => forest.n_features(),
            Booster::Linear(linear) => linear.n_features(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Booster::Forest(_) => "tree ensemble",
            Booster::Linear(_) => "linear",
        }
    }

    #[inline]
    pub fn margin(&self, features: &[f64]) -> f64 {
        match self {
            Booster::Forest(forest) => forest.predict_margin(features),
            Booster::Linear(linear) => linear.margin(features),
        }
    }
}

/// The classifier lacks a probability-producing operation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind} model with {transform} output has no probability operation")]
pub struct UnsupportedModelError {
    pub kind: &'static str,
    pub transform: &'static str,
    pub objective: Option<String>,
}

/// A booster plus the output transform that turns its margin into a prediction.
#[derive(Debug, Clone, PartialEq)]
pub struct Classifier {
    booster: Booster,
    transform: OutputTransform,
    objective: Option<String>,
}

impl Classifier {
    pub fn new(booster: Booster, transform: OutputTransform) -> Self {
        Self {
            booster,
            transform,
            objective: None,
        }
    }

    /// Record the training objective name (informational).
    pub fn with_objective(mut self, objective: impl Into<String>) -> Self {
        self.objective = Some(objective.into());
        self
    }

    #[inline]
    pub fn booster(&self) -> &Booster {
        &self.booster
    }

    #[inline]
    pub fn transform(&self) -> OutputTransform {
        self.transform
    }

    pub fn objective(&self) -> Option<&str> {
        self.objective.as_deref()
    }

    #[inline]
    pub fn n_features(&self) -> usize {
        self.booster.n_features()
    }

    /// Raw model output (log-odds for logistic classifiers).
    #[inline]
    pub fn margin(&self, features: &[f64]) -> f64 {
        self.booster.margin(features)
    }

    /// Class probabilities `[P(class 0), P(class 1)]`.
    pub fn predict_proba(&self, features: &[f64]) -> Result<[f64; 2], UnsupportedModelError> {
        self.ensure_probabilistic()?;
        let p = self.transform.apply(self.margin(features));
        Ok([1.0 - p, p])
    }

    /// Fail unless this classifier produces probabilities.
    pub fn ensure_probabilistic(&self) -> Result<(), UnsupportedModelError> {
        if self.transform.is_probabilistic() {
            Ok(())
        } else {
            Err(UnsupportedModelError {
                kind: self.booster.kind(),
                transform: self.transform.name(),
                objective: self.objective.clone(),
            })
        }
    }
}

/// Standard scaler followed by a classifier.
#[derive(Debug, Clone, PartialEq)]
pub struct Pipeline {
    pub scaler: StandardScaler,
    pub classifier: Classifier,
}

/// A loaded screening model.
#[derive(Debug, Clone, PartialEq)]
pub enum Model {
    /// Classifier fed directly with the collected features.
    Bare(Classifier),
    /// Scaler applied to the collected features before the classifier.
    Pipeline(Pipeline),
}

/// Consistency errors between a model's components.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ModelValidationError {
    #[error(transparent)]
    Forest(#[from] ForestValidationError),

    #[error("linear model has non-finite coefficients")]
    NonFiniteLinear,

    #[error("scaler expects {scaler} features but the classifier expects {classifier}")]
    ScalerMismatch { scaler: usize, classifier: usize },
}

/// Input length does not match the model's feature count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("model expects {expected} features, got {actual}")]
pub struct FeatureCountMismatch {
    pub expected: usize,
    pub actual: usize,
}

/// The classifier that scores a request, with the input it scores.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved<'a> {
    pub scorer: &'a Classifier,
    pub transformed: Vec<f64>,
}

impl Model {
    /// The classifier that produces the margin.
    pub fn classifier(&self) -> &Classifier {
        match self {
            Model::Bare(classifier) => classifier,
            Model::Pipeline(pipeline) => &pipeline.classifier,
        }
    }

    pub fn scaler(&self) -> Option<&StandardScaler> {
        match self {
            Model::Bare(_) => None,
            Model::Pipeline(pipeline) => Some(&pipeline.scaler),
        }
    }

    #[inline]
    pub fn n_features(&self) -> usize {
        self.classifier().n_features()
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Model::Bare(_) => "bare",
            Model::Pipeline(_) => "pipeline",
        }
    }

    /// Apply preprocessing (if any) without scoring.
    pub fn preprocess(&self, input: &[f64]) -> Result<Vec<f64>, FeatureCountMismatch> {
        let expected = self.n_features();
        if input.len() != expected {
            return Err(FeatureCountMismatch {
                expected,
                actual: input.len(),
            });
        }
        Ok(match self {
            Model::Bare(_) => input.to_vec(),
            Model::Pipeline(pipeline) => pipeline.scaler.transform(input),
        })
    }

    /// Resolve the scoring classifier and the input it sees.
    pub fn resolve(&self, input: &[f64]) -> Result<Resolved<'_>, FeatureCountMismatch> {
        Ok(Resolved {
            scorer: self.classifier(),
            transformed: self.preprocess(input)?,
        })
    }

    /// Check that components agree and parameters are usable.
    pub fn validate(&self) -> Result<(), ModelValidationError> {
        let classifier = self.classifier();
        match classifier.booster() {
            Booster::Forest(forest) => forest.validate()?,
            Booster::Linear(linear) if !linear.is_finite() => {
                return Err(ModelValidationError::NonFiniteLinear)
            }
            Booster::Linear(_) => {}
        }
        if let Model::Pipeline(pipeline) = self {
            if pipeline.scaler.n_features() != classifier.n_features() {
                return Err(ModelValidationError::ScalerMismatch {
                    scaler: pipeline.scaler.n_features(),
                    classifier: classifier.n_features(),
                });
            }
        }
        Ok(())
    }
}
