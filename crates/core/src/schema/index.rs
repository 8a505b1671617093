//! Index definition for Tessera schemas.

use crate::expr::{col, ExprRef};

/// Sort order for an index key part.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum Order {
    /// Ascending order.
    #[default]
    Asc,
    /// Descending order.
    Desc,
}

/// Placement of nulls within an index key part.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum NullsOrder {
    /// First on ascending parts, last on descending parts.
    #[default]
    Default,
    First,
    Last,
}

/// One part of an index key: an expression with its ordering.
#[derive(Clone, Debug)]
pub struct IndexPart {
    pub expr: ExprRef,
    pub order: Order,
    pub nulls: NullsOrder,
}

impl IndexPart {
    /// Creates an ascending key part.
    pub fn new(expr: ExprRef) -> Self {
        Self {
            expr,
            order: Order::Asc,
            nulls: NullsOrder::Default,
        }
    }

    /// Creates an ascending key part over a column.
    pub fn column(name: &str) -> Self {
        Self::new(col(name))
    }

    /// Sets the sort order.
    pub fn order(mut self, order: Order) -> Self {
        self.order = order;
        self
    }

    /// Sets the null placement.
    pub fn nulls(mut self, nulls: NullsOrder) -> Self {
        self.nulls = nulls;
        self
    }

    /// Returns true if this part sorts descending.
    #[inline]
    pub fn is_desc(&self) -> bool {
        self.order == Order::Desc
    }

    /// Resolves the effective null placement.
    pub fn nulls_first(&self) -> bool {
        match self.nulls {
            NullsOrder::First => true,
            NullsOrder::Last => false,
            NullsOrder::Default => self.order == Order::Asc,
        }
    }
}

/// An index definition.
#[derive(Clone, Debug)]
pub struct IndexDef {
    /// Index name, unique within the namespace.
    name: String,
    /// Key parts in declaration order.
    parts: Vec<IndexPart>,
    /// Whether this index enforces uniqueness.
    unique: bool,
    /// Whether null key components are rejected.
    not_null: bool,
    /// Partial index predicate.
    predicate: Option<ExprRef>,
}

impl IndexDef {
    /// Creates a new index definition.
    pub fn new(name: impl Into<String>, parts: Vec<IndexPart>) -> Self {
        Self {
            name: name.into(),
            parts,
            unique: false,
            not_null: false,
            predicate: None,
        }
    }

    /// Creates an ascending index over plain columns.
    pub fn on_columns(name: impl Into<String>, columns: &[&str]) -> Self {
        Self::new(name, columns.iter().map(|c| IndexPart::column(c)).collect())
    }

    /// Sets whether this index is unique.
    pub fn unique(mut self, unique: bool) -> Self {
        self.unique = unique;
        self
    }

    /// Sets whether null key components are rejected.
    pub fn not_null(mut self, not_null: bool) -> Self {
        self.not_null = not_null;
        self
    }

    /// Makes this a partial index.
    pub fn predicate(mut self, predicate: ExprRef) -> Self {
        self.predicate = Some(predicate);
        self
    }

    /// Returns the index name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Returns the key parts.
    #[inline]
    pub fn parts(&self) -> &[IndexPart] {
        &self.parts
    }

    /// Returns whether this index is unique.
    #[inline]
    pub fn is_unique(&self) -> bool {
        self.unique
    }

    #[inline]
    pub fn is_not_null(&self) -> bool {
        self.not_null
    }

    #[inline]
    pub fn partial_predicate(&self) -> Option<&ExprRef> {
        self.predicate.as_ref()
    }

    /// Returns the textual keys of the key expressions, in order.
    pub fn key_hashes(&self) -> Vec<String> {
        self.parts.iter().map(|p| p.expr.hash_key()).collect()
    }

    /// Returns every column read by the key parts or the predicate.
    pub fn columns(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        let exprs = self
            .parts
            .iter()
            .map(|p| &p.expr)
            .chain(self.predicate.iter());
        for expr in exprs {
            for c in expr.columns() {
                if !out.contains(&c) {
                    out.push(c);
                }
            }
        }
        out
    }

    /// Returns true if the key or predicate reads the column.
    pub fn references(&self, column: &str) -> bool {
        self.columns().iter().any(|c| c == column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::func;

    #[test]
    fn test_index_part_nulls() {
        assert!(IndexPart::column("a").nulls_first());
        assert!(!IndexPart::column("a").order(Order::Desc).nulls_first());
        assert!(IndexPart::column("a")
            .order(Order::Desc)
            .nulls(NullsOrder::First)
            .nulls_first());
        assert!(!IndexPart::column("a").nulls(NullsOrder::Last).nulls_first());
    }

    #[test]
    fn test_index_def() {
        let idx = IndexDef::on_columns("idx_user_email", &["email"])
            .unique(true)
            .not_null(true);
        assert_eq!(idx.name(), "idx_user_email");
        assert!(idx.is_unique());
        assert!(idx.is_not_null());
        assert_eq!(idx.key_hashes(), vec!["email".to_string()]);
    }

    #[test]
    fn test_columns_include_predicate() {
        let pred = func("active", &["active"], |r, _| Ok(r.value("active").clone()));
        let idx = IndexDef::on_columns("idx", &["a", "b"]).predicate(pred);
        assert_eq!(idx.columns(), vec!["a", "b", "active"]);
        assert!(idx.references("active"));
        assert!(!idx.references("c"));
    }
}
