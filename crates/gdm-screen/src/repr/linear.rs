//! Linear model data structure.

use ndarray::Array1;

/// Single-output linear model (weights + bias).
///
/// The raw output is `bias + Σ weights[i] · x[i]`.
///
/// ```
/// use gdm_screen::repr::LinearModel;
///
/// let model = LinearModel::new(vec![0.5, -1.0], 0.25);
/// assert_eq!(model.margin(&[2.0, 1.0]), 0.25);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct LinearModel {
    weights: Array1<f64>,
    bias: f64,
}

impl LinearModel {
    pub fn new(weights: Vec<f64>, bias: f64) -> Self {
        Self {
            weights: Array1::from(weights),
            bias,
        }
    }

    /// A model with all-zero weights.
    pub fn zeros(n_features: usize) -> Self {
        Self {
            weights: Array1::zeros(n_features),
            bias: 0.0,
        }
    }

    #[inline]
    pub fn n_features(&self) -> usize {
        self.weights.len()
    }

    #[inline]
    pub fn weight(&self, feature: usize) -> f64 {
        self.weights[feature]
    }

    #[inline]
    pub fn weights(&self) -> &Array1<f64> {
        &self.weights
    }

    #[inline]
    pub fn bias(&self) -> f64 {
        self.bias
    }

    /// Raw margin for one row. Missing trailing features contribute nothing.
    pub fn margin(&self, features: &[f64]) -> f64 {
        self.weights
            .iter()
            .zip(features)
            .fold(self.bias, |acc, (w, x)| acc + w * x)
    }

    /// True when every weight and the bias are finite.
    pub fn is_finite(&self) -> bool {
        self.bias.is_finite() && self.weights.iter().all(|w| w.is_finite())
    }
}
