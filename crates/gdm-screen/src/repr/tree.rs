//! Canonical regression-tree representation (SoA) and mutable construction API.
//!
//! This module provides:
//! - [`Tree`]: immutable SoA storage used for scoring and attribution
//! - [`MutableTree`]: builder used by model loaders and test fixtures
//!
//! Trees carry optional per-node covers (the training hessian sum reaching each
//! node). Scoring never needs them; path-dependent attribution does.

// Tree constructors take one array per node field.
#![allow(clippy::too_many_arguments)]

use super::NodeId;

/// Structural validation errors for [`Tree`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TreeValidationError {
    #[error("tree has no nodes")]
    EmptyTree,

    #[error("node {node}: {side} child {child} is out of bounds ({n_nodes} nodes)")]
    ChildOutOfBounds {
        node: NodeId,
        side: &'static str,
        child: NodeId,
        n_nodes: usize,
    },

    #[error("node {node} references itself as a child")]
    SelfLoop { node: NodeId },

    #[error("node {node} is reachable by more than one path")]
    DuplicateVisit { node: NodeId },

    #[error("cycle detected at node {node}")]
    CycleDetected { node: NodeId },

    #[error("node {node} is unreachable from the root")]
    UnreachableNode { node: NodeId },

    #[error("covers length {covers_len} does not match node count {n_nodes}")]
    CoversLenMismatch { covers_len: usize, n_nodes: usize },
}

/// Structure-of-Arrays tree storage.
///
/// Child indices are local to this tree (0 = root). All splits are numeric:
/// a value goes left when `value < threshold`, and missing values (NaN)
/// follow the node's default direction.
#[derive(Debug, Clone, PartialEq)]
pub struct Tree {
    split_indices: Box<[u32]>,
    split_thresholds: Box<[f32]>,
    left_children: Box<[u32]>,
    right_children: Box<[u32]>,
    default_left: Box<[bool]>,
    is_leaf: Box<[bool]>,
    leaf_values: Box<[f32]>,
    covers: Option<Box<[f32]>>,
}

impl Tree {
    /// Create a new tree from parallel arrays.
    ///
    /// All arrays must have the same length (number of nodes).
    pub fn new(
        split_indices: Vec<u32>,
        split_thresholds: Vec<f32>,
        left_children: Vec<u32>,
        right_children: Vec<u32>,
        default_left: Vec<bool>,
        is_leaf: Vec<bool>,
        leaf_values: Vec<f32>,
    ) -> Self {
        let n_nodes = split_indices.len();
        debug_assert_eq!(n_nodes, split_thresholds.len());
        debug_assert_eq!(n_nodes, left_children.len());
        debug_assert_eq!(n_nodes, right_children.len());
        debug_assert_eq!(n_nodes, default_left.len());
        debug_assert_eq!(n_nodes, is_leaf.len());
        debug_assert_eq!(n_nodes, leaf_values.len());

        Self {
            split_indices: split_indices.into_boxed_slice(),
            split_thresholds: split_thresholds.into_boxed_slice(),
            left_children: left_children.into_boxed_slice(),
            right_children: right_children.into_boxed_slice(),
            default_left: default_left.into_boxed_slice(),
            is_leaf: is_leaf.into_boxed_slice(),
            leaf_values: leaf_values.into_boxed_slice(),
            covers: None,
        }
    }

    /// Attach per-node covers.
    pub fn with_covers(mut self, covers: Vec<f32>) -> Self {
        self.covers = Some(covers.into_boxed_slice());
        self
    }

    #[inline]
    pub fn n_nodes(&self) -> usize {
        self.is_leaf.len()
    }

    #[inline]
    pub fn n_leaves(&self) -> usize {
        self.is_leaf.iter().filter(|&&leaf| leaf).count()
    }

    #[inline]
    pub fn is_leaf(&self, node: NodeId) -> bool {
        self.is_leaf[node as usize]
    }

    #[inline]
    pub fn split_index(&self, node: NodeId) -> u32 {
        self.split_indices[node as usize]
    }

    #[inline]
    pub fn split_threshold(&self, node: NodeId) -> f32 {
        self.split_thresholds[node as usize]
    }

    #[inline]
    pub fn left_child(&self, node: NodeId) -> NodeId {
        self.left_children[node as usize]
    }

    #[inline]
    pub fn right_child(&self, node: NodeId) -> NodeId {
        self.right_children[node as usize]
    }

    #[inline]
    pub fn default_left(&self, node: NodeId) -> bool {
        self.default_left[node as usize]
    }

    #[inline]
    pub fn leaf_value(&self, node: NodeId) -> f32 {
        self.leaf_values[node as usize]
    }

    #[inline]
    pub fn has_covers(&self) -> bool {
        self.covers.is_some()
    }

    /// Per-node covers, if the tree was built with them.
    #[inline]
    pub fn covers(&self) -> Option<&[f32]> {
        self.covers.as_deref()
    }

    /// Child taken at split `node` for a feature value.
    #[inline]
    pub fn next_node(&self, node: NodeId, fvalue: f64) -> NodeId {
        let goes_left = if fvalue.is_nan() {
            self.default_left(node)
        } else {
            // Thresholds are stored in single precision, so compare there.
            (fvalue as f32) < self.split_threshold(node)
        };
        if goes_left {
            self.left_child(node)
        } else {
            self.right_child(node)
        }
    }

    /// Leaf reached by `features`. Features beyond the slice are treated as missing.
    pub fn leaf_for(&self, features: &[f64]) -> NodeId {
        let mut idx: NodeId = 0;
        while !self.is_leaf(idx) {
            let feat_idx = self.split_index(idx) as usize;
            let fvalue = features.get(feat_idx).copied().unwrap_or(f64::NAN);
            idx = self.next_node(idx, fvalue);
        }
        idx
    }

    /// Leaf value reached by `features`.
    #[inline]
    pub fn predict_row(&self, features: &[f64]) -> f32 {
        self.leaf_value(self.leaf_for(features))
    }

    /// Largest feature index used by any split, if the tree has splits.
    pub fn max_split_index(&self) -> Option<u32> {
        self.split_indices
            .iter()
            .zip(self.is_leaf.iter())
            .filter(|(_, &leaf)| !leaf)
            .map(|(&feature, _)| feature)
            .max()
    }

    /// Validate basic structural invariants for this tree.
    pub fn validate(&self) -> Result<(), TreeValidationError> {
        let n_nodes = self.n_nodes();
        if n_nodes == 0 {
            return Err(TreeValidationError::EmptyTree);
        }
        if let Some(covers) = &self.covers {
            if covers.len() != n_nodes {
                return Err(TreeValidationError::CoversLenMismatch {
                    covers_len: covers.len(),
                    n_nodes,
                });
            }
        }

        // Iterative DFS with color marking.
        // 0 = unvisited, 1 = visiting, 2 = done
        let mut color = vec![0u8; n_nodes];
        let mut stack: Vec<(NodeId, bool)> = vec![(0, false)];

        while let Some((node, finished)) = stack.pop() {
            let node_usize = node as usize;
            if finished {
                color[node_usize] = 2;
                continue;
            }
            match color[node_usize] {
                0 => {}
                1 => return Err(TreeValidationError::CycleDetected { node }),
                _ => return Err(TreeValidationError::DuplicateVisit { node }),
            }

            color[node_usize] = 1;
            stack.push((node, true));

            if self.is_leaf(node) {
                continue;
            }

            let left = self.left_child(node);
            let right = self.right_child(node);
            if left == node || right == node {
                return Err(TreeValidationError::SelfLoop { node });
            }
            for (side, child) in [("left", left), ("right", right)] {
                if child as usize >= n_nodes {
                    return Err(TreeValidationError::ChildOutOfBounds {
                        node,
                        side,
                        child,
                        n_nodes,
                    });
                }
            }

            stack.push((right, false));
            stack.push((left, false));
        }

        if let Some(i) = color.iter().position(|&c| c == 0) {
            return Err(TreeValidationError::UnreachableNode { node: i as u32 });
        }

        Ok(())
    }
}

/// Mutable tree used while building from a loaded model or in tests.
///
/// Node slots are allocated up front with [`init_root_with_num_nodes`], then
/// filled in any order with [`set_numeric_split`] and [`make_leaf`].
///
/// [`init_root_with_num_nodes`]: MutableTree::init_root_with_num_nodes
/// [`set_numeric_split`]: MutableTree::set_numeric_split
/// [`make_leaf`]: MutableTree::make_leaf
#[derive(Debug, Clone, Default)]
pub struct MutableTree {
    split_indices: Vec<u32>,
    split_thresholds: Vec<f32>,
    left_children: Vec<u32>,
    right_children: Vec<u32>,
    default_left: Vec<bool>,
    is_leaf: Vec<bool>,
    leaf_values: Vec<f32>,
    covers: Vec<f32>,
    has_covers: bool,
}

impl MutableTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate `num_nodes` placeholder leaves. Returns the root node ID (0).
    pub fn init_root_with_num_nodes(&mut self, num_nodes: usize) -> NodeId {
        self.reset();
        for _ in 0..num_nodes {
            self.allocate_node();
        }
        0
    }

    fn allocate_node(&mut self) -> NodeId {
        let id = self.split_indices.len() as NodeId;
        self.split_indices.push(0);
        self.split_thresholds.push(0.0);
        self.left_children.push(0);
        self.right_children.push(0);
        self.default_left.push(false);
        self.is_leaf.push(true);
        self.leaf_values.push(0.0);
        self.covers.push(0.0);
        id
    }

    /// Turn `node` into a numeric split with known children.
    pub fn set_numeric_split(
        &mut self,
        node: NodeId,
        feature: u32,
        threshold: f32,
        default_left: bool,
        left_child: NodeId,
        right_child: NodeId,
    ) {
        let idx = node as usize;
        self.split_indices[idx] = feature;
        self.split_thresholds[idx] = threshold;
        self.left_children[idx] = left_child;
        self.right_children[idx] = right_child;
        self.default_left[idx] = default_left;
        self.is_leaf[idx] = false;
    }

    pub fn make_leaf(&mut self, node: NodeId, value: f32) {
        let idx = node as usize;
        self.is_leaf[idx] = true;
        self.leaf_values[idx] = value;
    }

    /// Record the cover of `node`. Once any cover is set the frozen tree carries covers.
    pub fn set_cover(&mut self, node: NodeId, cover: f32) {
        self.covers[node as usize] = cover;
        self.has_covers = true;
    }

    /// Multiply every leaf value by `factor`.
    pub fn scale_leaves(&mut self, factor: f32) {
        for (leaf, value) in self.is_leaf.iter().zip(self.leaf_values.iter_mut()) {
            if *leaf {
                *value *= factor;
            }
        }
    }

    #[inline]
    pub fn n_nodes(&self) -> usize {
        self.split_indices.len()
    }

    pub fn reset(&mut self) {
        self.split_indices.clear();
        self.split_thresholds.clear();
        self.left_children.clear();
        self.right_children.clear();
        self.default_left.clear();
        self.is_leaf.clear();
        self.leaf_values.clear();
        self.covers.clear();
        self.has_covers = false;
    }

    /// Freeze into an immutable [`Tree`].
    pub fn freeze(self) -> Tree {
        let tree = Tree::new(
            self.split_indices,
            self.split_thresholds,
            self.left_children,
            self.right_children,
            self.default_left,
            self.is_leaf,
            self.leaf_values,
        );
        if self.has_covers {
            tree.with_covers(self.covers)
        } else {
            tree
        }
    }
}

/// Build a [`Tree`] from a node listing.
///
/// ```
/// let tree = gdm_screen::tree! {
///     0 => split(0, 0.5) -> 1, 2 @ 100.0,
///     1 => leaf(-1.0) @ 60.0,
///     2 => leaf(1.0) @ 40.0,
/// };
/// assert_eq!(tree.predict_row(&[0.2]), -1.0);
/// ```
///
/// `split_left(feature, threshold)` sends missing values left; `split` sends
/// them right. The `@ cover` suffix is optional.
#[macro_export]
macro_rules! tree {
    ($($node:literal => $kind:ident($($arg:expr),*) $(-> $left:literal, $right:literal)? $(@ $cover:expr)?),+ $(,)?) => {{
        let mut tree = $crate::repr::MutableTree::new();
        let n_nodes = [$($node),+].len();
        tree.init_root_with_num_nodes(n_nodes);
        $(
            $crate::__tree_node!(tree, $node, $kind($($arg),*) $(-> $left, $right)?);
            $( tree.set_cover($node, $cover); )?
        )+
        tree.freeze()
    }};
}

#[doc(hidden)]
#[macro_export]
macro_rules! __tree_node {
    ($tree:ident, $node:literal, split($feature:expr, $threshold:expr) -> $left:literal, $right:literal) => {
        $tree.set_numeric_split($node, $feature, $threshold, false, $left, $right)
    };
    ($tree:ident, $node:literal, split_left($feature:expr, $threshold:expr) -> $left:literal, $right:literal) => {
        $tree.set_numeric_split($node, $feature, $threshold, true, $left, $right)
    };
    ($tree:ident, $node:literal, leaf($value:expr)) => {
        $tree.make_leaf($node, $value)
    };
}
