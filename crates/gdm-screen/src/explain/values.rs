//! SHAP values container.
//!
//! Stores the attribution of one prediction: one contribution per feature plus
//! the base value, with a check of the sum property.

/// SHAP values for a single row and a single output.
///
/// Layout is `[features..., base]`: the base value sits after the last feature.
#[derive(Clone, Debug, PartialEq)]
pub struct ShapValues {
    values: Vec<f64>,
}

impl ShapValues {
    /// All-zero contributions and base value for `n_features` inputs.
    pub fn zeros(n_features: usize) -> Self {
        Self {
            values: vec![0.0; n_features + 1],
        }
    }

    /// Number of features (not including the base value).
    #[inline]
    pub fn n_features(&self) -> usize {
        self.values.len() - 1
    }

    #[inline]
    pub fn get(&self, feature: usize) -> f64 {
        self.values[feature]
    }

    #[inline]
    pub fn set(&mut self, feature: usize, value: f64) {
        self.values[feature] = value;
    }

    #[inline]
    pub fn add(&mut self, feature: usize, delta: f64) {
        self.values[feature] += delta;
    }

    /// The expected model output the contributions are measured against.
    #[inline]
    pub fn base_value(&self) -> f64 {
        self.values[self.n_features()]
    }

    #[inline]
    pub fn set_base_value(&mut self, value: f64) {
        let idx = self.n_features();
        self.values[idx] = value;
    }

    /// Feature contributions only (excluding the base value).
    pub fn feature_shap(&self) -> &[f64] {
        &self.values[..self.n_features()]
    }

    /// `base_value + sum(contributions)`, the output these values reconstruct.
    pub fn reconstructed(&self) -> f64 {
        self.values.iter().sum()
    }

    /// Whether the values add up to `prediction` within `tolerance`.
    pub fn verify(&self, prediction: f64, tolerance: f64) -> bool {
        (self.reconstructed() - prediction).abs() <= tolerance
    }
}
