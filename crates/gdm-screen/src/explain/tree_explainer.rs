//! TreeSHAP explainer for tree ensembles.
//!
//! Implements path-dependent TreeSHAP from Lundberg et al. (2020):
//! "From local explanations to global understanding with explainable AI for trees".
//! The background distribution is the one recorded in the node covers, so no
//! reference data is needed.

use crate::explain::path::PathState;
use crate::explain::{ExplanationError, ShapValues};
use crate::repr::{Forest, NodeId, Tree};

/// TreeSHAP explainer for tree-based models.
///
/// Computes exact SHAP values for tree ensembles in polynomial time.
#[derive(Debug)]
pub struct TreeExplainer<'a> {
    forest: &'a Forest,
    /// Expected margin under the cover distribution.
    base_value: f64,
    max_depth: usize,
}

impl<'a> TreeExplainer<'a> {
    /// Create a new TreeExplainer for the given forest.
    ///
    /// # Errors
    /// [`ExplanationError::MissingNodeStats`] if any tree lacks covers and
    /// [`ExplanationError::ZeroCover`] if an internal node has no cover.
    pub fn new(forest: &'a Forest) -> Result<Self, ExplanationError> {
        let mut base_value = forest.base_score();
        let mut max_depth = 0;
        for (tree_idx, tree) in forest.trees().enumerate() {
            let covers = tree
                .covers()
                .ok_or(ExplanationError::MissingNodeStats { tree: tree_idx })?;
            base_value += expected_value(tree, covers, 0, tree_idx)?;
            max_depth = max_depth.max(tree_depth(tree, 0));
        }
        Ok(Self {
            forest,
            base_value,
            max_depth,
        })
    }

    /// The expected prediction (base value).
    pub fn base_value(&self) -> f64 {
        self.base_value
    }

    /// SHAP values for one row of features.
    pub fn shap_values(&self, features: &[f64]) -> ShapValues {
        let mut shap = ShapValues::zeros(self.forest.n_features());
        for tree in self.forest.trees() {
            // Covers are checked in `new`.
            if let Some(covers) = tree.covers() {
                let path = PathState::with_capacity(self.max_depth);
                tree_shap(tree, covers, features, &mut shap, path, 0, 1.0, 1.0, -1);
            }
        }
        shap.set_base_value(self.base_value);
        shap
    }
}

/// Cover-weighted mean leaf value below `node`.
fn expected_value(
    tree: &Tree,
    covers: &[f32],
    node: NodeId,
    tree_idx: usize,
) -> Result<f64, ExplanationError> {
    if tree.is_leaf(node) {
        return Ok(f64::from(tree.leaf_value(node)));
    }
    let cover = f64::from(covers[node as usize]);
    if cover <= 0.0 {
        return Err(ExplanationError::ZeroCover {
            tree: tree_idx,
            node,
        });
    }
    let left = tree.left_child(node);
    let right = tree.right_child(node);
    let left_value = expected_value(tree, covers, left, tree_idx)?;
    let right_value = expected_value(tree, covers, right, tree_idx)?;
    Ok((f64::from(covers[left as usize]) * left_value
        + f64::from(covers[right as usize]) * right_value)
        / cover)
}

/// Recursive TreeSHAP for a single tree.
///
/// The path is passed by value: each branch extends its own copy.
#[allow(clippy::too_many_arguments)]
fn tree_shap(
    tree: &Tree,
    covers: &[f32],
    features: &[f64],
    shap: &mut ShapValues,
    mut path: PathState,
    node: NodeId,
    zero_fraction: f64,
    one_fraction: f64,
    feature: i32,
) {
    path.extend(zero_fraction, one_fraction, feature);

    if tree.is_leaf(node) {
        let leaf_value = f64::from(tree.leaf_value(node));
        for i in 1..path.len() {
            let e = *path.element(i);
            let weight = path.unwound_sum(i);
            shap.add(
                e.feature as usize,
                weight * (e.one_fraction - e.zero_fraction) * leaf_value,
            );
        }
        return;
    }

    let split = tree.split_index(node);
    let fvalue = features.get(split as usize).copied().unwrap_or(f64::NAN);
    let hot = tree.next_node(node, fvalue);
    let cold = if hot == tree.left_child(node) {
        tree.right_child(node)
    } else {
        tree.left_child(node)
    };

    let node_cover = f64::from(covers[node as usize]);
    let hot_zero_fraction = f64::from(covers[hot as usize]) / node_cover;
    let cold_zero_fraction = f64::from(covers[cold as usize]) / node_cover;

    // A feature split on twice only counts once on the path.
    let mut incoming_zero = 1.0;
    let mut incoming_one = 1.0;
    if let Some(idx) = path.find(split as i32) {
        let e = *path.element(idx);
        incoming_zero = e.zero_fraction;
        incoming_one = e.one_fraction;
        path.unwind(idx);
    }

    let branches = [
        (hot, hot_zero_fraction * incoming_zero, incoming_one),
        (cold, cold_zero_fraction * incoming_zero, 0.0),
    ];
    for (child, zero, one) in branches {
        // No coalition reaches this child; its contribution is exactly zero.
        if zero == 0.0 && one == 0.0 {
            continue;
        }
        tree_shap(tree, covers, features, shap, path.clone(), child, zero, one, split as i32);
    }
}

/// Number of nodes on the longest root-to-leaf path.
fn tree_depth(tree: &Tree, node: NodeId) -> usize {
    if tree.is_leaf(node) {
        1
    } else {
        1 + tree_depth(tree, tree.left_child(node)).max(tree_depth(tree, tree.right_child(node)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree;
    use approx::assert_abs_diff_eq;

    fn stump_forest() -> Forest {
        // feature 0 < 0.5 -> leaf(-1), else leaf(1)
        let mut forest = Forest::new(3);
        forest.push_tree(tree! {
            0 => split(0, 0.5) -> 1, 2 @ 100.0,
            1 => leaf(-1.0) @ 50.0,
            2 => leaf(1.0) @ 50.0,
        });
        forest
    }

    #[test]
    fn missing_covers_error() {
        let mut forest = Forest::new(1);
        forest.push_tree(tree! {
            0 => split(0, 0.5) -> 1, 2,
            1 => leaf(-1.0),
            2 => leaf(1.0),
        });
        assert!(matches!(
            TreeExplainer::new(&forest),
            Err(ExplanationError::MissingNodeStats { tree: 0 })
        ));
    }

    #[test]
    fn zero_cover_internal_node_error() {
        let mut forest = Forest::new(1);
        forest.push_tree(tree! {
            0 => split(0, 0.5) -> 1, 2 @ 0.0,
            1 => leaf(-1.0) @ 0.0,
            2 => leaf(1.0) @ 0.0,
        });
        assert!(matches!(
            TreeExplainer::new(&forest),
            Err(ExplanationError::ZeroCover { tree: 0, node: 0 })
        ));
    }

    #[test]
    fn stump_attributes_everything_to_split_feature() {
        let forest = stump_forest();
        let explainer = TreeExplainer::new(&forest).unwrap();
        assert_abs_diff_eq!(explainer.base_value(), 0.0, epsilon = 1e-12);

        let shap = explainer.shap_values(&[0.3, 0.5, 0.7]);
        assert_abs_diff_eq!(shap.get(0), -1.0, epsilon = 1e-12);
        assert_eq!(shap.get(1), 0.0);
        assert_eq!(shap.get(2), 0.0);
        assert!(shap.verify(forest.predict_margin(&[0.3, 0.5, 0.7]), 1e-12));
    }

    #[test]
    fn base_value_is_cover_weighted_and_includes_base_score() {
        let mut forest = Forest::new(1).with_base_score(0.25);
        forest.push_tree(tree! {
            0 => split(0, 0.5) -> 1, 2 @ 10.0,
            1 => leaf(2.0) @ 8.0,
            2 => leaf(-3.0) @ 2.0,
        });
        let explainer = TreeExplainer::new(&forest).unwrap();
        // 0.25 + (8 * 2 - 2 * 3) / 10
        assert_abs_diff_eq!(explainer.base_value(), 1.25, epsilon = 1e-12);
    }

    #[test]
    fn interaction_tree_matches_brute_force_shapley() {
        // f(x) = 4 if x0 >= 0 and x1 >= 0, else 0, with uneven covers.
        let mut forest = Forest::new(2);
        forest.push_tree(tree! {
            0 => split(0, 0.0) -> 1, 2 @ 10.0,
            1 => leaf(0.0) @ 6.0,
            2 => split(1, 0.0) -> 3, 4 @ 4.0,
            3 => leaf(0.0) @ 1.0,
            4 => leaf(4.0) @ 3.0,
        });
        let explainer = TreeExplainer::new(&forest).unwrap();
        let shap = explainer.shap_values(&[1.0, 1.0]);

        // Cover-conditional expectations: E[f] = 1.2, E[f | x0] = 3.0,
        // E[f | x1] = 4 * 0.4 = 1.6 (cold branch of x0 keeps its 0.6 share at 0),
        // f(x) = 4.
        let phi0 = 0.5 * ((3.0 - 1.2) + (4.0 - 1.6));
        let phi1 = 0.5 * ((1.6 - 1.2) + (4.0 - 3.0));
        assert_abs_diff_eq!(explainer.base_value(), 1.2, epsilon = 1e-12);
        assert_abs_diff_eq!(shap.get(0), phi0, epsilon = 1e-12);
        assert_abs_diff_eq!(shap.get(1), phi1, epsilon = 1e-12);
        assert!(shap.verify(4.0, 1e-12));
    }

    #[test]
    fn repeated_feature_on_path_stays_additive() {
        let mut forest = Forest::new(2).with_base_score(-0.5);
        forest.push_tree(tree! {
            0 => split(0, 0.0) -> 1, 2 @ 20.0,
            1 => split(0, -1.0) -> 3, 4 @ 12.0,
            2 => split(1, 2.0) -> 5, 6 @ 8.0,
            3 => leaf(-0.8) @ 5.0,
            4 => leaf(-0.2) @ 7.0,
            5 => leaf(0.3) @ 6.0,
            6 => leaf(0.9) @ 2.0,
        });
        forest.push_tree(tree! {
            0 => split_left(1, 1.0) -> 1, 2 @ 20.0,
            1 => leaf(0.1) @ 11.0,
            2 => split(0, -0.5) -> 3, 4 @ 9.0,
            3 => leaf(-0.4) @ 4.0,
            4 => leaf(0.6) @ 5.0,
        });
        let explainer = TreeExplainer::new(&forest).unwrap();
        for x in [[-2.0, 0.0], [-0.7, 3.0], [0.5, 1.5], [f64::NAN, f64::NAN]] {
            let shap = explainer.shap_values(&x);
            assert_abs_diff_eq!(
                shap.reconstructed(),
                forest.predict_margin(&x),
                epsilon = 1e-9
            );
        }
    }
}
