//! Tessera Index - Ordered secondary indexes for Tessera tables.
//!
//! This crate provides:
//!
//! - `OrderTree`: a persistent AVL map with subtree sizes, so clones are O(1)
//!   and key positions are available for cost estimates
//! - `KeyComparator`: per-part ordering with `ASC`/`DESC` and null placement
//! - `OrderedIndex`: a unique, not-null or partial index whose contents live
//!   in a `Transaction`
//!
//! # Example
//!
//! ```rust
//! use std::collections::BTreeMap;
//! use tessera_core::schema::IndexDef;
//! use tessera_core::{Row, RowId, Transaction, Value};
//! use tessera_index::OrderedIndex;
//!
//! let index = OrderedIndex::new(IndexDef::on_columns("idx_a", &["a"]), "t");
//! let mut txn = Transaction::root();
//! for (seq, a) in [(1, 10), (2, 20), (3, 30)] {
//!     let mut values = BTreeMap::new();
//!     values.insert("a".to_string(), Value::Int32(a));
//!     index.add(&mut txn, &Row::new(RowId::new("t", seq), values)).unwrap();
//! }
//!
//! let hits: Vec<u64> = index.ge(&txn, Value::Int32(20)).map(|r| r.id().seq()).collect();
//! assert_eq!(hits, vec![2, 3]);
//! ```

pub mod comparator;
pub mod key;
pub mod ops;
pub mod ordered;
pub mod stats;
pub mod tree;

pub use comparator::{Comparator, KeyComparator, NaturalOrder, PartOrder};
pub use key::IndexKey;
pub use ops::IndexOp;
pub use ordered::{OrderedIndex, RowIter, RowSet};
pub use stats::IndexStats;
pub use tree::OrderTree;
