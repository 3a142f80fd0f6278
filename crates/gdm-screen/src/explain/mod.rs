//! Per-feature attribution of a screening prediction.
//!
//! Attributions are SHAP values of the classifier's margin (log-odds), so
//! `baseline + sum(contributions)` reproduces the margin before the sigmoid.
//!
//! Three explainers are available:
//!
//! - [`TreeExplainer`]: path-dependent TreeSHAP for tree ensembles, using the
//!   node covers as background distribution.
//! - [`LinearExplainer`]: closed form `w[i] * (x[i] - mean[i])` for linear models.
//! - [`ReferenceExplainer`]: exact Shapley values against one reference sample,
//!   for any classifier.
//!
//! [`explain`] picks one from the classifier kind and the [`Background`].

mod linear_explainer;
mod path;
mod reference_explainer;
mod tree_explainer;
mod values;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::model::{Booster, Classifier};
use crate::repr::NodeId;

pub use linear_explainer::LinearExplainer;
pub use path::{PathElement, PathState};
pub use reference_explainer::{ReferenceExplainer, MAX_EXACT_FEATURES};
pub use tree_explainer::TreeExplainer;
pub use values::ShapValues;

/// Attribution failed although the prediction itself succeeded.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExplanationError {
    #[error("tree {tree} has no cover statistics; TreeSHAP needs them")]
    MissingNodeStats { tree: usize },

    #[error("tree {tree}: internal node {node} has zero cover")]
    ZeroCover { tree: usize, node: NodeId },

    #[error("input has {actual} values, model expects {expected}")]
    InputShape { expected: usize, actual: usize },

    #[error("background has {actual} values, model expects {expected}")]
    BackgroundShape { expected: usize, actual: usize },

    #[error("exact attribution over {n_features} features exceeds the limit of {max}")]
    TooManyFeatures { n_features: usize, max: usize },

    #[error("attribution sums to {actual} but the model margin is {expected}")]
    Additivity { expected: f64, actual: f64 },
}

/// Reference distribution the attribution is measured against.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Background {
    /// Cover statistics for trees, zero means for linear models.
    #[default]
    ModelDefault,
    /// The explained input itself as a one-sample reference.
    SelfReference,
    /// A fixed sample, in collected (unscaled) feature space.
    Reference(Vec<f64>),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid background {0:?}; expected model-default, self or reference:v1,v2,...")]
pub struct BackgroundParseError(String);

impl FromStr for Background {
    type Err = BackgroundParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        match trimmed {
            "model-default" | "model_default" | "default" => Ok(Background::ModelDefault),
            "self" | "self-reference" | "self_reference" => Ok(Background::SelfReference),
            _ => {
                let values = trimmed
                    .strip_prefix("reference:")
                    .ok_or_else(|| BackgroundParseError(s.to_string()))?;
                values
                    .split(',')
                    .map(|v| v.trim().parse::<f64>())
                    .collect::<Result<Vec<_>, _>>()
                    .map(Background::Reference)
                    .map_err(|_| BackgroundParseError(s.to_string()))
            }
        }
    }
}

impl fmt::Display for Background {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Background::ModelDefault => f.write_str("model-default"),
            Background::SelfReference => f.write_str("self"),
            Background::Reference(values) => {
                f.write_str("reference:")?;
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{v}")?;
                }
                Ok(())
            }
        }
    }
}

/// Signed contribution of one feature.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureContribution {
    pub feature: &'static str,
    /// The value the explainer saw (after preprocessing).
    pub value: f64,
    /// Positive values push toward the positive class.
    pub contribution: f64,
}

/// Baseline plus one contribution per feature.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Attribution {
    pub baseline: f64,
    pub contributions: Vec<FeatureContribution>,
}

impl Attribution {
    /// Name the entries of `shap`. `names` and `values` follow feature order.
    pub fn from_shap(shap: &ShapValues, names: &[&'static str], values: &[f64]) -> Self {
        let contributions = names
            .iter()
            .zip(values)
            .zip(shap.feature_shap())
            .map(|((&feature, &value), &contribution)| FeatureContribution {
                feature,
                value,
                contribution,
            })
            .collect();
        Self {
            baseline: shap.base_value(),
            contributions,
        }
    }

    /// `baseline + sum(contributions)`.
    pub fn total(&self) -> f64 {
        self.baseline + self.contributions.iter().map(|c| c.contribution).sum::<f64>()
    }

    pub fn contribution(&self, feature: &str) -> Option<f64> {
        self.contributions
            .iter()
            .find(|c| c.feature == feature)
            .map(|c| c.contribution)
    }

    /// Contributions ordered by decreasing magnitude; ties keep feature order.
    pub fn by_magnitude(&self) -> Vec<&FeatureContribution> {
        let mut sorted: Vec<_> = self.contributions.iter().collect();
        sorted.sort_by(|a, b| b.contribution.abs().total_cmp(&a.contribution.abs()));
        sorted
    }
}

/// Largest allowed gap between the attribution sum and the margin.
pub const ADDITIVITY_TOLERANCE: f64 = 1e-6;

/// Explain `scorer`'s margin at `features`.
///
/// `reference` must already be in the scorer's input space. The result is
/// checked to add up to the margin within [`ADDITIVITY_TOLERANCE`].
pub fn explain(
    scorer: &Classifier,
    features: &[f64],
    reference: Option<&[f64]>,
) -> Result<ShapValues, ExplanationError> {
    let expected = scorer.n_features();
    if features.len() != expected {
        return Err(ExplanationError::InputShape {
            expected,
            actual: features.len(),
        });
    }

    let booster = scorer.booster();
    let shap = match (booster, reference) {
        (Booster::Forest(forest), None) => TreeExplainer::new(forest)?.shap_values(features),
        (Booster::Linear(linear), None) => {
            LinearExplainer::with_zero_means(linear).shap_values(features)
        }
        (Booster::Linear(linear), Some(reference)) => {
            LinearExplainer::new(linear, reference.to_vec())?.shap_values(features)
        }
        (Booster::Forest(_), Some(reference)) => {
            ReferenceExplainer::new(booster, reference.to_vec())?.shap_values(features)
        }
    };

    let margin = scorer.margin(features);
    let actual = shap.reconstructed();
    if !shap.verify(margin, ADDITIVITY_TOLERANCE) {
        return Err(ExplanationError::Additivity {
            expected: margin,
            actual,
        });
    }
    Ok(shap)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::OutputTransform;
    use crate::repr::{Forest, LinearModel};
    use crate::tree;
    use approx::assert_abs_diff_eq;
    use rstest::rstest;

    #[rstest]
    #[case("model-default", Background::ModelDefault)]
    #[case("default", Background::ModelDefault)]
    #[case("self", Background::SelfReference)]
    #[case("reference:1,2.5,-3", Background::Reference(vec![1.0, 2.5, -3.0]))]
    fn background_parses(#[case] input: &str, #[case] expected: Background) {
        assert_eq!(input.parse::<Background>().unwrap(), expected);
    }

    #[rstest]
    #[case("")]
    #[case("mean")]
    #[case("reference:")]
    #[case("reference:1,x")]
    fn background_rejects(#[case] input: &str) {
        assert!(input.parse::<Background>().is_err());
    }

    #[test]
    fn background_display_round_trips() {
        let bg = Background::Reference(vec![0.5, -1.0]);
        assert_eq!(bg.to_string(), "reference:0.5,-1");
        assert_eq!(bg.to_string().parse::<Background>().unwrap(), bg);
    }

    #[test]
    fn background_json_uses_snake_case() {
        let bg: Background = serde_json::from_str(r#""self_reference""#).unwrap();
        assert_eq!(bg, Background::SelfReference);
        let bg: Background = serde_json::from_str(r#"{"reference": [1.0]}"#).unwrap();
        assert_eq!(bg, Background::Reference(vec![1.0]));
    }

    fn linear(weights: Vec<f64>, bias: f64) -> Classifier {
        Classifier::new(
            Booster::Linear(LinearModel::new(weights, bias)),
            OutputTransform::Sigmoid,
        )
    }

    #[test]
    fn explain_dispatches_by_booster_and_reference() {
        let clf = linear(vec![1.0, -2.0], 0.5);
        let shap = explain(&clf, &[1.0, 1.0], None).unwrap();
        assert_eq!(shap.feature_shap(), &[1.0, -2.0]);
        assert_eq!(shap.base_value(), 0.5);

        let shap = explain(&clf, &[1.0, 1.0], Some(&[1.0, 0.0])).unwrap();
        assert_eq!(shap.feature_shap(), &[0.0, -2.0]);

        let mut forest = Forest::new(2);
        forest.push_tree(tree! {
            0 => split(1, 0.0) -> 1, 2,
            1 => leaf(-1.0),
            2 => leaf(1.0),
        });
        let clf = Classifier::new(Booster::Forest(forest), OutputTransform::Sigmoid);
        assert!(matches!(
            explain(&clf, &[0.0, 1.0], None),
            Err(ExplanationError::MissingNodeStats { tree: 0 })
        ));
        let shap = explain(&clf, &[0.0, 1.0], Some(&[0.0, -1.0])).unwrap();
        assert_eq!(shap.feature_shap(), &[0.0, 2.0]);
        assert_eq!(shap.base_value(), -1.0);
    }

    #[test]
    fn explain_self_reference_yields_zero_contributions() {
        let clf = linear(vec![0.3, 0.7], -0.2);
        let x = [2.0, -4.0];
        let shap = explain(&clf, &x, Some(&x)).unwrap();
        assert_eq!(shap.feature_shap(), &[0.0, 0.0]);
        assert_abs_diff_eq!(shap.base_value(), clf.margin(&x), epsilon = 1e-12);
    }

    #[test]
    fn attribution_orders_by_magnitude() {
        let mut shap = ShapValues::zeros(3);
        shap.set(0, 0.1);
        shap.set(1, -0.9);
        shap.set(2, 0.4);
        shap.set_base_value(-1.0);
        let attribution = Attribution::from_shap(&shap, &["a", "b", "c"], &[1.0, 2.0, 3.0]);

        let order: Vec<_> = attribution.by_magnitude().iter().map(|c| c.feature).collect();
        assert_eq!(order, vec!["b", "c", "a"]);
        assert_eq!(attribution.contribution("c"), Some(0.4));
        assert_eq!(attribution.contributions[1].value, 2.0);
        assert_abs_diff_eq!(attribution.total(), -1.4, epsilon = 1e-12);
    }

    #[rstest]
    #[case(&[0.0], None)]
    #[case(&[0.0], Some(&[0.0, -1.0][..]))]
    #[case(&[1.0, 2.0, 3.0], None)]
    #[case(&[1.0, 2.0, 3.0], Some(&[0.0, 0.0][..]))]
    fn explain_rejects_wrong_input_length(
        #[case] features: &[f64],
        #[case] reference: Option<&[f64]>,
    ) {
        let clf = linear(vec![1.0, -2.0], 0.5);
        assert_eq!(
            explain(&clf, features, reference),
            Err(ExplanationError::InputShape {
                expected: 2,
                actual: features.len()
            })
        );

        let mut forest = Forest::new(2);
        forest.push_tree(tree! {
            0 => split(1, 0.0) -> 1, 2 @ 10.0,
            1 => leaf(-1.0) @ 4.0,
            2 => leaf(1.0) @ 6.0,
        });
        let clf = Classifier::new(Booster::Forest(forest), OutputTransform::Sigmoid);
        assert!(matches!(
            explain(&clf, features, reference),
            Err(ExplanationError::InputShape { expected: 2, .. })
        ));
    }

    #[test]
    fn additivity_is_absolute_for_large_margins() {
        let clf = linear(vec![250.0, -125.0], 40.0);
        let x = [3.0, -2.0];
        let shap = explain(&clf, &x, None).unwrap();
        assert!((shap.reconstructed() - clf.margin(&x)).abs() <= ADDITIVITY_TOLERANCE);
        assert_eq!(clf.margin(&x), 1040.0);
    }
}
