//! Conversion from XGBoost JSON types to native screening classifiers.

use crate::model::{logit, Booster, Classifier, OutputTransform};
use crate::repr::{Forest, ForestValidationError, LinearModel, MutableTree, Tree};

use super::json::{GradientBooster, ModelTrees, Tree as XgbTree, XgbModel};

/// Error type for XGBoost model conversion.
#[derive(Debug, thiserror::Error)]
pub enum ConversionError {
    #[error("tree {0} has no nodes")]
    EmptyTree(usize),

    #[error(
        "invalid node index in tree {tree}: node {node} references child {child} but tree has {num_nodes} nodes"
    )]
    InvalidNodeIndex {
        tree: usize,
        node: usize,
        child: i32,
        num_nodes: usize,
    },

    #[error("tree {tree}: field {field} has {len} entries, expected {num_nodes}")]
    FieldLength {
        tree: usize,
        field: &'static str,
        len: usize,
        num_nodes: usize,
    },

    #[error("tree {tree}: node {node} is a categorical split, which is not supported")]
    CategoricalSplit { tree: usize, node: usize },

    #[error("tree {tree}: node {node} has a negative split feature {feature}")]
    NegativeFeature { tree: usize, node: usize, feature: i32 },

    #[error("gblinear weights length {actual} doesn't match num_features + 1 = {expected}")]
    InvalidLinearWeights { actual: usize, expected: usize },

    #[error("model has {0} output groups; only binary classifiers are supported")]
    UnsupportedClasses(i64),

    #[error("DART model has {weights} tree weights for {trees} trees")]
    DartWeights { weights: usize, trees: usize },

    #[error("converted forest is invalid: {0}")]
    InvalidForest(#[from] ForestValidationError),
}

/// Convert base_score from probability space to margin space based on objective.
///
/// XGBoost stores base_score in probability space in JSON, but the predictor
/// works in margin space.
pub fn prob_to_margin(base_score: f64, objective: &str) -> f64 {
    match objective {
        "binary:logistic" | "reg:logistic" => logit(base_score),
        _ => base_score,
    }
}

impl XgbModel {
    /// Number of input features declared by the learner.
    pub fn n_features(&self) -> usize {
        self.learner.learner_model_param.n_features.max(0) as usize
    }

    /// Convert to a native [`Classifier`].
    ///
    /// The output transform is derived from the objective, so a
    /// `binary:logitraw` or regression model converts fine but has no
    /// probability operation.
    pub fn to_classifier(&self) -> Result<Classifier, ConversionError> {
        let param = &self.learner.learner_model_param;
        if param.n_class > 1 || param.num_target > 1 {
            return Err(ConversionError::UnsupportedClasses(
                param.n_class.max(param.num_target),
            ));
        }

        let objective = self.objective();
        let margin_base_score = prob_to_margin(param.base_score, objective);

        let booster = match &self.learner.gradient_booster {
            GradientBooster::Gbtree { model } => {
                Booster::Forest(self.convert_forest(model, None, margin_base_score)?)
            }
            GradientBooster::Dart {
                gbtree,
                weight_drop,
            } => Booster::Forest(self.convert_forest(
                &gbtree.model,
                Some(weight_drop),
                margin_base_score,
            )?),
            GradientBooster::Gblinear { model } => {
                Booster::Linear(self.convert_linear_model(&model.weights, margin_base_score)?)
            }
        };

        Ok(Classifier::new(booster, OutputTransform::from_objective(objective))
            .with_objective(objective))
    }

    /// Convert gblinear weights to a [`LinearModel`].
    ///
    /// XGBoost stores `[n_features + 1]` weights for a single group with the
    /// bias last. The base score is baked into the bias.
    fn convert_linear_model(
        &self,
        weights: &[f32],
        margin_base_score: f64,
    ) -> Result<LinearModel, ConversionError> {
        let num_features = self.n_features();
        let expected = num_features + 1;
        if weights.len() != expected {
            return Err(ConversionError::InvalidLinearWeights {
                actual: weights.len(),
                expected,
            });
        }
        let coefficients = weights[..num_features].iter().map(|&w| f64::from(w)).collect();
        let bias = f64::from(weights[num_features]) + margin_base_score;
        Ok(LinearModel::new(coefficients, bias))
    }

    fn convert_forest(
        &self,
        model_trees: &ModelTrees,
        weight_drop: Option<&[f32]>,
        margin_base_score: f64,
    ) -> Result<Forest, ConversionError> {
        if let Some(weights) = weight_drop {
            if weights.len() != model_trees.trees.len() {
                return Err(ConversionError::DartWeights {
                    weights: weights.len(),
                    trees: model_trees.trees.len(),
                });
            }
        }

        let mut forest = Forest::new(self.n_features()).with_base_score(margin_base_score);
        for (tree_idx, xgb_tree) in model_trees.trees.iter().enumerate() {
            let weight = weight_drop.map(|w| w[tree_idx]);
            forest.push_tree(convert_tree(xgb_tree, tree_idx, weight)?);
        }
        forest.validate()?;
        Ok(forest)
    }
}

/// Convert a single XGBoost tree to a native [`Tree`] with covers.
fn convert_tree(
    xgb_tree: &XgbTree,
    tree_idx: usize,
    weight: Option<f32>,
) -> Result<Tree, ConversionError> {
    let num_nodes = xgb_tree.tree_param.num_nodes.max(0) as usize;
    if num_nodes == 0 {
        return Err(ConversionError::EmptyTree(tree_idx));
    }

    let lengths = [
        ("left_children", xgb_tree.left_children.len()),
        ("right_children", xgb_tree.right_children.len()),
        ("split_indices", xgb_tree.split_indices.len()),
        ("split_conditions", xgb_tree.split_conditions.len()),
        ("default_left", xgb_tree.default_left.len()),
        ("sum_hessian", xgb_tree.sum_hessian.len()),
    ];
    for (field, len) in lengths {
        // Covers are optional; a model saved without statistics loads without them.
        if field == "sum_hessian" && len == 0 {
            continue;
        }
        if len < num_nodes {
            return Err(ConversionError::FieldLength {
                tree: tree_idx,
                field,
                len,
                num_nodes,
            });
        }
    }

    let mut tree = MutableTree::new();
    tree.init_root_with_num_nodes(num_nodes);

    for node_idx in 0..num_nodes {
        let left_child = xgb_tree.left_children[node_idx];
        let right_child = xgb_tree.right_children[node_idx];

        // XGBoost marks leaves with left_child == -1 and stores the leaf
        // value in split_conditions. base_weights is a training statistic that
        // pruning does not rescale.
        if left_child == -1 {
            tree.make_leaf(node_idx as u32, xgb_tree.split_conditions[node_idx]);
        } else {
            for child in [left_child, right_child] {
                if child < 0 || child as usize >= num_nodes {
                    return Err(ConversionError::InvalidNodeIndex {
                        tree: tree_idx,
                        node: node_idx,
                        child,
                        num_nodes,
                    });
                }
            }
            if xgb_tree.split_type.get(node_idx).copied().unwrap_or(0) == 1 {
                return Err(ConversionError::CategoricalSplit {
                    tree: tree_idx,
                    node: node_idx,
                });
            }
            let feature = xgb_tree.split_indices[node_idx];
            if feature < 0 {
                return Err(ConversionError::NegativeFeature {
                    tree: tree_idx,
                    node: node_idx,
                    feature,
                });
            }
            tree.set_numeric_split(
                node_idx as u32,
                feature as u32,
                xgb_tree.split_conditions[node_idx],
                xgb_tree.default_left[node_idx],
                left_child as u32,
                right_child as u32,
            );
        }

        if let Some(&cover) = xgb_tree.sum_hessian.get(node_idx) {
            tree.set_cover(node_idx as u32, cover as f32);
        }
    }

    if let Some(weight) = weight {
        tree.scale_leaves(weight);
    }

    Ok(tree.freeze())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use serde_json::{json, Value};

    fn stump_json(sum_hessian: Value) -> Value {
        json!({
            "tree_param": {"num_nodes": "3", "num_feature": "9", "size_leaf_vector": "1", "num_deleted": "0"},
            "id": 0,
            "loss_changes": [1.0, 0.0, 0.0],
            "sum_hessian": sum_hessian,
            "base_weights": [0.0, -0.4, 0.6],
            "left_children": [1, -1, -1],
            "right_children": [2, -1, -1],
            "parents": [2147483647, 0, 0],
            "split_indices": [7, 0, 0],
            "split_conditions": [5.5, -0.4, 0.6],
            "split_type": [0, 0, 0],
            "default_left": [1, 0, 0],
            "categories": [],
            "categories_nodes": [],
            "categories_segments": [],
            "categories_sizes": []
        })
    }

    fn model_json(objective: &str, booster: Value) -> Value {
        json!({
            "version": [2, 0, 3],
            "learner": {
                "attributes": {},
                "feature_names": [],
                "feature_types": [],
                "gradient_booster": booster,
                "learner_model_param": {
                    "base_score": "5E-1",
                    "boost_from_average": "1",
                    "num_class": "0",
                    "num_feature": "9",
                    "num_target": "1"
                },
                "objective": {"name": objective, "reg_loss_param": {"scale_pos_weight": "1"}}
            }
        })
    }

    fn gbtree(trees: Vec<Value>) -> Value {
        let n = trees.len();
        json!({
            "name": "gbtree",
            "model": {
                "gbtree_model_param": {"num_parallel_tree": "1", "num_trees": n.to_string()},
                "iteration_indptr": [0, n],
                "tree_info": vec![0; n],
                "trees": trees
            }
        })
    }

    #[test]
    fn gbtree_converts_with_covers_and_margin_base_score() {
        let value = model_json("binary:logistic", gbtree(vec![stump_json(json!([10.0, 4.0, 6.0]))]));
        let clf = XgbModel::from_value(&value).unwrap().to_classifier().unwrap();

        assert_eq!(clf.transform(), OutputTransform::Sigmoid);
        assert_eq!(clf.objective(), Some("binary:logistic"));
        let Booster::Forest(forest) = clf.booster() else {
            panic!("expected forest");
        };
        assert_eq!(forest.n_features(), 9);
        assert_abs_diff_eq!(forest.base_score(), 0.0, epsilon = 1e-12);
        assert_eq!(forest.tree(0).covers(), Some(&[10.0, 4.0, 6.0][..]));

        let mut x = [0.0; 9];
        x[7] = 5.0;
        assert_abs_diff_eq!(clf.margin(&x), -0.4, epsilon = 1e-6);
        x[7] = 6.0;
        assert_abs_diff_eq!(clf.margin(&x), 0.6, epsilon = 1e-6);
        x[7] = f64::NAN;
        assert_abs_diff_eq!(clf.margin(&x), -0.4, epsilon = 1e-6);
    }

    #[test]
    fn missing_hessians_produce_tree_without_covers() {
        let value = model_json("binary:logistic", gbtree(vec![stump_json(json!([]))]));
        let clf = XgbModel::from_value(&value).unwrap().to_classifier().unwrap();
        let Booster::Forest(forest) = clf.booster() else {
            panic!("expected forest");
        };
        assert!(!forest.has_covers());
    }

    #[test]
    fn logitraw_keeps_identity_transform() {
        let value = model_json("binary:logitraw", gbtree(vec![stump_json(json!([10.0, 4.0, 6.0]))]));
        let clf = XgbModel::from_value(&value).unwrap().to_classifier().unwrap();
        assert_eq!(clf.transform(), OutputTransform::Identity);
        let Booster::Forest(forest) = clf.booster() else {
            panic!("expected forest");
        };
        // base_score is already a margin for non-logistic objectives.
        assert_abs_diff_eq!(forest.base_score(), 0.5, epsilon = 1e-12);
    }

    #[test]
    fn gblinear_bakes_base_score_into_bias() {
        let mut weights: Vec<f64> = (1..=9).map(|i| i as f64 * 0.1).collect();
        weights.push(-0.2);
        let booster = json!({"name": "gblinear", "model": {"weights": weights}});
        let mut value = model_json("binary:logistic", booster);
        value["learner"]["learner_model_param"]["base_score"] = json!("7.3105858E-1");

        let clf = XgbModel::from_value(&value).unwrap().to_classifier().unwrap();
        let Booster::Linear(linear) = clf.booster() else {
            panic!("expected linear");
        };
        assert_eq!(linear.n_features(), 9);
        assert_abs_diff_eq!(linear.bias(), -0.2 + 1.0, epsilon = 1e-5);
        assert_abs_diff_eq!(linear.weight(8), 0.9, epsilon = 1e-6);
    }

    #[test]
    fn gblinear_rejects_wrong_weight_count() {
        let booster = json!({"name": "gblinear", "model": {"weights": [0.1, 0.2]}});
        let value = model_json("binary:logistic", booster);
        assert!(matches!(
            XgbModel::from_value(&value).unwrap().to_classifier(),
            Err(ConversionError::InvalidLinearWeights {
                actual: 2,
                expected: 10
            })
        ));
    }

    #[test]
    fn dart_scales_leaves_by_tree_weight() {
        let booster = json!({
            "name": "dart",
            "gbtree": gbtree(vec![stump_json(json!([10.0, 4.0, 6.0]))]),
            "weight_drop": [0.5]
        });
        let value = model_json("binary:logistic", booster);
        let clf = XgbModel::from_value(&value).unwrap().to_classifier().unwrap();
        let mut x = [0.0; 9];
        x[7] = 6.0;
        assert_abs_diff_eq!(clf.margin(&x), 0.3, epsilon = 1e-6);
    }

    #[test]
    fn rejects_multiclass() {
        let mut value = model_json("multi:softprob", gbtree(vec![stump_json(json!([]))]));
        value["learner"]["learner_model_param"]["num_class"] = json!("3");
        assert!(matches!(
            XgbModel::from_value(&value).unwrap().to_classifier(),
            Err(ConversionError::UnsupportedClasses(3))
        ));
    }

    #[test]
    fn rejects_bad_child_index() {
        let mut tree = stump_json(json!([10.0, 4.0, 6.0]));
        tree["right_children"] = json!([9, -1, -1]);
        let value = model_json("binary:logistic", gbtree(vec![tree]));
        assert!(matches!(
            XgbModel::from_value(&value).unwrap().to_classifier(),
            Err(ConversionError::InvalidNodeIndex { child: 9, .. })
        ));
    }

    #[test]
    fn rejects_categorical_split() {
        let mut tree = stump_json(json!([10.0, 4.0, 6.0]));
        tree["split_type"] = json!([1, 0, 0]);
        let value = model_json("binary:logistic", gbtree(vec![tree]));
        assert!(matches!(
            XgbModel::from_value(&value).unwrap().to_classifier(),
            Err(ConversionError::CategoricalSplit { tree: 0, node: 0 })
        ));
    }

    #[test]
    fn rejects_split_on_undeclared_feature() {
        let mut tree = stump_json(json!([10.0, 4.0, 6.0]));
        tree["split_indices"] = json!([12, 0, 0]);
        let value = model_json("binary:logistic", gbtree(vec![tree]));
        assert!(matches!(
            XgbModel::from_value(&value).unwrap().to_classifier(),
            Err(ConversionError::InvalidForest(
                ForestValidationError::FeatureOutOfBounds { feature: 12, .. }
            ))
        ));
    }

    #[test]
    fn leaf_values_come_from_split_conditions() {
        // A pruned leaf keeps its unscaled base weight.
        let mut tree = stump_json(json!([10.0, 4.0, 6.0]));
        tree["base_weights"] = json!([0.0, -1.33, 2.0]);
        let value = model_json("binary:logistic", gbtree(vec![tree]));
        let clf = XgbModel::from_value(&value).unwrap().to_classifier().unwrap();

        let mut x = [0.0; 9];
        x[7] = 5.0;
        assert_abs_diff_eq!(clf.margin(&x), -0.4, epsilon = 1e-6);
        x[7] = 6.0;
        assert_abs_diff_eq!(clf.margin(&x), 0.6, epsilon = 1e-6);
    }
}
