//! Exact Shapley values against a single reference sample.
//!
//! The value of a coalition `S` is the model margin on the hybrid row that
//! takes features in `S` from the explained input and the rest from the
//! reference. All `2^n` coalitions are evaluated once, so this is only viable
//! for small feature counts.

use crate::explain::{ExplanationError, ShapValues};
use crate::model::Booster;

/// Largest feature count explained by enumeration.
pub const MAX_EXACT_FEATURES: usize = 16;

#[derive(Debug)]
pub struct ReferenceExplainer<'a> {
    booster: &'a Booster,
    reference: Vec<f64>,
}

impl<'a> ReferenceExplainer<'a> {
    /// # Errors
    /// [`ExplanationError::BackgroundShape`] if the reference has the wrong
    /// length and [`ExplanationError::TooManyFeatures`] if enumeration would
    /// be too large.
    pub fn new(booster: &'a Booster, reference: Vec<f64>) -> Result<Self, ExplanationError> {
        let n_features = booster.n_features();
        if reference.len() != n_features {
            return Err(ExplanationError::BackgroundShape {
                expected: n_features,
                actual: reference.len(),
            });
        }
        if n_features > MAX_EXACT_FEATURES {
            return Err(ExplanationError::TooManyFeatures {
                n_features,
                max: MAX_EXACT_FEATURES,
            });
        }
        Ok(Self { booster, reference })
    }

    /// Margin of the reference sample.
    pub fn base_value(&self) -> f64 {
        self.booster.margin(&self.reference)
    }

    /// SHAP values for one row of features.
    pub fn shap_values(&self, features: &[f64]) -> ShapValues {
        let n = self.reference.len();
        let mut shap = ShapValues::zeros(n);

        let mut row = vec![0.0; n];
        let coalition_values: Vec<f64> = (0..1usize << n)
            .map(|mask| {
                for (i, slot) in row.iter_mut().enumerate() {
                    *slot = if mask & (1 << i) != 0 {
                        features[i]
                    } else {
                        self.reference[i]
                    };
                }
                self.booster.margin(&row)
            })
            .collect();

        let weights = coalition_weights(n);
        for (mask, &value) in coalition_values.iter().enumerate() {
            let size = mask.count_ones() as usize;
            for (feature, bit) in (0..n).map(|f| (f, 1usize << f)) {
                if mask & bit == 0 {
                    let gain = coalition_values[mask | bit] - value;
                    shap.add(feature, weights[size] * gain);
                }
            }
        }

        shap.set_base_value(coalition_values[0]);
        shap
    }
}

/// `w[s] = s! (n - s - 1)! / n!` for coalitions of size `s` not containing the feature.
fn coalition_weights(n: usize) -> Vec<f64> {
    let mut factorial = vec![1.0f64; n + 1];
    for i in 1..=n {
        factorial[i] = factorial[i - 1] * i as f64;
    }
    (0..n)
        .map(|s| factorial[s] * factorial[n - s - 1] / factorial[n])
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repr::{Forest, LinearModel};
    use crate::tree;
    use approx::assert_abs_diff_eq;

    #[test]
    fn weights_sum_to_one_over_coalitions() {
        let n = 9;
        let weights = coalition_weights(n);
        // Each size s has C(n-1, s) coalitions without the feature.
        let mut binom = 1.0;
        let mut total = 0.0;
        for (s, w) in weights.iter().enumerate() {
            total += binom * w;
            binom = binom * (n - 1 - s) as f64 / (s + 1) as f64;
        }
        assert_abs_diff_eq!(total, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn linear_model_matches_closed_form() {
        let booster = Booster::Linear(LinearModel::new(vec![2.0, -1.0, 0.5], 0.1));
        let explainer = ReferenceExplainer::new(&booster, vec![1.0, 1.0, 1.0]).unwrap();
        let shap = explainer.shap_values(&[3.0, 0.0, 5.0]);

        assert_abs_diff_eq!(shap.get(0), 4.0, epsilon = 1e-12);
        assert_abs_diff_eq!(shap.get(1), 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(shap.get(2), 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(shap.base_value(), 1.6, epsilon = 1e-12);
    }

    #[test]
    fn interaction_is_split_evenly() {
        // 4 only when both features are on the far side of the reference.
        let mut forest = Forest::new(2);
        forest.push_tree(tree! {
            0 => split(0, 0.0) -> 1, 2,
            1 => leaf(0.0),
            2 => split(1, 0.0) -> 3, 4,
            3 => leaf(0.0),
            4 => leaf(4.0),
        });
        let booster = Booster::Forest(forest);
        let explainer = ReferenceExplainer::new(&booster, vec![-1.0, -1.0]).unwrap();
        let shap = explainer.shap_values(&[1.0, 1.0]);

        assert_abs_diff_eq!(shap.get(0), 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(shap.get(1), 2.0, epsilon = 1e-12);
        assert_eq!(shap.base_value(), 0.0);
    }

    #[test]
    fn input_equal_to_reference_has_no_contributions() {
        let booster = Booster::Linear(LinearModel::new(vec![2.0, -1.0], 0.3));
        let explainer = ReferenceExplainer::new(&booster, vec![0.4, 0.9]).unwrap();
        let shap = explainer.shap_values(&[0.4, 0.9]);
        assert_eq!(shap.feature_shap(), &[0.0, 0.0]);
        assert_abs_diff_eq!(shap.base_value(), booster.margin(&[0.4, 0.9]), epsilon = 1e-12);
    }

    #[test]
    fn rejects_bad_reference_and_large_models() {
        let booster = Booster::Linear(LinearModel::zeros(3));
        assert!(matches!(
            ReferenceExplainer::new(&booster, vec![0.0; 2]),
            Err(ExplanationError::BackgroundShape { expected: 3, actual: 2 })
        ));

        let wide = Booster::Linear(LinearModel::zeros(MAX_EXACT_FEATURES + 1));
        assert!(matches!(
            ReferenceExplainer::new(&wide, vec![0.0; MAX_EXACT_FEATURES + 1]),
            Err(ExplanationError::TooManyFeatures { .. })
        ));
    }
}
