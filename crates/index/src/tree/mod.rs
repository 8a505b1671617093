//! Persistent order-statistic tree used as the index backbone.
//!
//! An AVL tree with subtree sizes: lookups, inserts and deletes are
//! O(log n), clones are O(1), and the position of any key can be computed
//! in O(log n) for selectivity estimates.

mod iter;
mod node;
#[allow(clippy::module_inception)]
mod tree;

pub use iter::Range;
pub use node::{Link, Node};
pub use tree::OrderTree;
