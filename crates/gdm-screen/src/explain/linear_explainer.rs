//! Linear SHAP explainer for linear models.
//!
//! SHAP values for linear models have a closed-form solution:
//! shap[i] = weight[i] * (x[i] - mean[i])

use crate::explain::{ExplanationError, ShapValues};
use crate::repr::LinearModel;

/// Linear SHAP explainer for linear models.
#[derive(Debug)]
pub struct LinearExplainer<'a> {
    model: &'a LinearModel,
    /// Background value for each feature.
    feature_means: Vec<f64>,
}

impl<'a> LinearExplainer<'a> {
    /// Create a new LinearExplainer with the given background means.
    ///
    /// # Errors
    /// [`ExplanationError::BackgroundShape`] if `feature_means` doesn't match
    /// the model's feature count.
    pub fn new(model: &'a LinearModel, feature_means: Vec<f64>) -> Result<Self, ExplanationError> {
        if feature_means.len() != model.n_features() {
            return Err(ExplanationError::BackgroundShape {
                expected: model.n_features(),
                actual: feature_means.len(),
            });
        }
        Ok(Self {
            model,
            feature_means,
        })
    }

    /// Zero means, for inputs that are already centered.
    pub fn with_zero_means(model: &'a LinearModel) -> Self {
        Self {
            model,
            feature_means: vec![0.0; model.n_features()],
        }
    }

    pub fn feature_means(&self) -> &[f64] {
        &self.feature_means
    }

    /// `E[f(x)] = bias + sum(w[i] * mean[i])`
    pub fn base_value(&self) -> f64 {
        self.model.margin(&self.feature_means)
    }

    /// SHAP values for one row of features.
    pub fn shap_values(&self, features: &[f64]) -> ShapValues {
        let mut shap = ShapValues::zeros(self.model.n_features());
        for (feature, ((&x, &mean), &weight)) in features
            .iter()
            .zip(&self.feature_means)
            .zip(self.model.weights())
            .enumerate()
        {
            shap.set(feature, weight * (x - mean));
        }
        shap.set_base_value(self.base_value());
        shap
    }
}
