//! Canonical forest representation (additive ensemble of regression trees).

use super::{Tree, TreeValidationError};

/// Validation errors for [`Forest`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ForestValidationError {
    #[error("tree {tree}: {source}")]
    InvalidTree {
        tree: usize,
        #[source]
        source: TreeValidationError,
    },

    #[error("tree {tree} splits on feature {feature}, but the forest has {n_features} features")]
    FeatureOutOfBounds {
        tree: usize,
        feature: u32,
        n_features: usize,
    },

    #[error("base score is not finite: {0}")]
    NonFiniteBaseScore(f64),
}

/// Forest of regression trees with a single output.
///
/// The raw output (margin) is `base_score + Σ tree leaf values`. The base score
/// is stored in margin space.
#[derive(Debug, Clone, PartialEq)]
pub struct Forest {
    trees: Vec<Tree>,
    n_features: usize,
    base_score: f64,
}

impl Forest {
    /// Create an empty forest over `n_features` inputs.
    pub fn new(n_features: usize) -> Self {
        Self {
            trees: Vec::new(),
            n_features,
            base_score: 0.0,
        }
    }

    /// Set the base score (margin space).
    pub fn with_base_score(mut self, base_score: f64) -> Self {
        self.base_score = base_score;
        self
    }

    pub fn push_tree(&mut self, tree: Tree) {
        self.trees.push(tree);
    }

    #[inline]
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    #[inline]
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    #[inline]
    pub fn base_score(&self) -> f64 {
        self.base_score
    }

    #[inline]
    pub fn tree(&self, idx: usize) -> &Tree {
        &self.trees[idx]
    }

    pub fn trees(&self) -> impl Iterator<Item = &Tree> {
        self.trees.iter()
    }

    /// Whether every tree carries node covers.
    pub fn has_covers(&self) -> bool {
        self.trees.iter().all(Tree::has_covers)
    }

    /// Raw margin for a single row of features.
    pub fn predict_margin(&self, features: &[f64]) -> f64 {
        self.trees
            .iter()
            .fold(self.base_score, |acc, tree| acc + f64::from(tree.predict_row(features)))
    }

    /// Validate every tree and check split features are within bounds.
    pub fn validate(&self) -> Result<(), ForestValidationError> {
        if !self.base_score.is_finite() {
            return Err(ForestValidationError::NonFiniteBaseScore(self.base_score));
        }
        for (idx, tree) in self.trees.iter().enumerate() {
            tree.validate()
                .map_err(|source| ForestValidationError::InvalidTree { tree: idx, source })?;
            if let Some(feature) = tree.max_split_index() {
                if feature as usize >= self.n_features {
                    return Err(ForestValidationError::FeatureOutOfBounds {
                        tree: idx,
                        feature,
                        n_features: self.n_features,
                    });
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn build_simple_tree(left_val: f32, right_val: f32, threshold: f32) -> Tree {
        crate::tree! {
            0 => split(0, threshold) -> 1, 2,
            1 => leaf(left_val),
            2 => leaf(right_val),
        }
    }

    #[test]
    fn forest_single_tree() {
        let mut forest = Forest::new(1);
        forest.push_tree(build_simple_tree(1.0, 2.0, 0.5));

        assert_eq!(forest.predict_margin(&[0.3]), 1.0);
        assert_eq!(forest.predict_margin(&[0.7]), 2.0);
    }

    #[test]
    fn forest_sums_trees_and_base_score() {
        let mut forest = Forest::new(1).with_base_score(0.5);
        forest.push_tree(build_simple_tree(1.0, 2.0, 0.5));
        forest.push_tree(build_simple_tree(0.5, 1.5, 0.5));

        assert_abs_diff_eq!(forest.predict_margin(&[0.3]), 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(forest.predict_margin(&[0.7]), 4.0, epsilon = 1e-12);
    }

    #[test]
    fn empty_forest_returns_base_score() {
        let forest = Forest::new(9).with_base_score(-0.25);
        assert_eq!(forest.n_trees(), 0);
        assert_eq!(forest.predict_margin(&[0.0; 9]), -0.25);
        assert!(forest.has_covers());
    }

    #[test]
    fn validate_reports_feature_out_of_bounds() {
        let mut forest = Forest::new(2);
        forest.push_tree(crate::tree! {
            0 => split(4, 0.0) -> 1, 2,
            1 => leaf(0.0),
            2 => leaf(0.0),
        });
        assert_eq!(
            forest.validate(),
            Err(ForestValidationError::FeatureOutOfBounds {
                tree: 0,
                feature: 4,
                n_features: 2
            })
        );
    }

    #[test]
    fn validate_wraps_tree_errors() {
        let mut forest = Forest::new(1);
        forest.push_tree(build_simple_tree(1.0, 2.0, 0.5));
        forest.push_tree(Tree::new(vec![], vec![], vec![], vec![], vec![], vec![], vec![]));
        assert!(matches!(
            forest.validate(),
            Err(ForestValidationError::InvalidTree {
                tree: 1,
                source: TreeValidationError::EmptyTree
            })
        ));
    }
}
