//! Index lookup operations.
//!
//! The planner describes a lookup as an [`IndexOp`], which can be both run
//! ([`crate::OrderedIndex::query`]) and costed
//! ([`crate::OrderedIndex::entropy`]).
//!
//! Ranges follow the index order: on a descending key part, `lt` returns the
//! keys that sort before the bound, which are the larger values. Keys with a
//! null component never match a range, and a range bound containing null
//! matches nothing.

use crate::key::IndexKey;

/// A lookup against an ordered index.
#[derive(Clone, Debug, PartialEq)]
pub enum IndexOp {
    /// Rows whose key equals `key`. With `match_null` false, a key holding a
    /// null matches nothing (SQL `=`); with it true, nulls compare equal.
    Eq { key: IndexKey, match_null: bool },
    /// Rows whose key differs from `key`. With `match_null` false, rows with
    /// null keys are excluded and a null `key` matches nothing.
    Neq { key: IndexKey, match_null: bool },
    /// Keys before `key`.
    Lt(IndexKey),
    /// Keys before or equal to `key`.
    Le(IndexKey),
    /// Keys after `key`.
    Gt(IndexKey),
    /// Keys after or equal to `key`.
    Ge(IndexKey),
    /// Keys between `lo` and `hi`, both inclusive.
    Inside { lo: IndexKey, hi: IndexKey },
    /// Keys before `lo` or after `hi`.
    Outside { lo: IndexKey, hi: IndexKey },
    /// Non-null keys not in the list. A null in the list matches nothing.
    Nin(Vec<IndexKey>),
}

impl IndexOp {
    /// Equality lookup with SQL null semantics.
    pub fn eq(key: impl Into<IndexKey>) -> Self {
        IndexOp::Eq {
            key: key.into(),
            match_null: false,
        }
    }

    /// Inequality lookup with SQL null semantics.
    pub fn neq(key: impl Into<IndexKey>) -> Self {
        IndexOp::Neq {
            key: key.into(),
            match_null: false,
        }
    }

    /// Returns a short name of the operation, used in traces.
    pub fn name(&self) -> &'static str {
        match self {
            IndexOp::Eq { .. } => "eq",
            IndexOp::Neq { .. } => "neq",
            IndexOp::Lt(_) => "lt",
            IndexOp::Le(_) => "le",
            IndexOp::Gt(_) => "gt",
            IndexOp::Ge(_) => "ge",
            IndexOp::Inside { .. } => "inside",
            IndexOp::Outside { .. } => "outside",
            IndexOp::Nin(_) => "nin",
        }
    }
}
