//! Model data structures: regression trees, forests and linear models.
//!
//! These are pure representations. Output transforms, preprocessing and the
//! classifier wrapper live in [`crate::model`].

mod forest;
mod linear;
mod tree;

pub use forest::{Forest, ForestValidationError};
pub use linear::LinearModel;
pub use tree::{MutableTree, Tree, TreeValidationError};

/// Node index local to a tree (0 = root).
pub type NodeId = u32;
