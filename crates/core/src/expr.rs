//! Expression boundary.
//!
//! The storage engine does not parse or plan SQL. Whatever builds index keys,
//! defaults, check predicates and computed columns hands the engine an
//! [`Expression`], which it evaluates against a row under a transaction.

use crate::error::Result;
use crate::row::Row;
use crate::value::Value;
use crate::version::Transaction;
use std::fmt;
use std::rc::Rc;

/// An expression evaluated against a single row.
pub trait Expression: fmt::Debug {
    /// Evaluates the expression.
    fn evaluate(&self, row: &Row, txn: &Transaction) -> Result<Value>;

    /// A stable textual form; two expressions with the same key are
    /// considered identical (used to match index key sets).
    fn hash_key(&self) -> String;

    /// The columns the expression reads.
    fn columns(&self) -> Vec<String>;

    /// The column name, if this is a bare column reference.
    fn as_column(&self) -> Option<&str> {
        None
    }
}

/// Shared expression handle.
pub type ExprRef = Rc<dyn Expression>;

/// A reference to a column of the row being evaluated.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColumnRef {
    name: String,
}

impl ColumnRef {
    /// Creates a column reference.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Returns the referenced column name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Expression for ColumnRef {
    fn evaluate(&self, row: &Row, _txn: &Transaction) -> Result<Value> {
        Ok(row.value(&self.name).clone())
    }

    fn hash_key(&self) -> String {
        self.name.clone()
    }

    fn columns(&self) -> Vec<String> {
        vec![self.name.clone()]
    }

    fn as_column(&self) -> Option<&str> {
        Some(&self.name)
    }
}

/// A constant.
#[derive(Clone, Debug, PartialEq)]
pub struct Literal(pub Value);

impl Expression for Literal {
    fn evaluate(&self, _row: &Row, _txn: &Transaction) -> Result<Value> {
        Ok(self.0.clone())
    }

    fn hash_key(&self) -> String {
        format!("{:?}", self.0)
    }

    fn columns(&self) -> Vec<String> {
        Vec::new()
    }
}

type EvalFn = dyn Fn(&Row, &Transaction) -> Result<Value>;

/// An expression backed by a closure, for callers that compile their own
/// expression trees.
pub struct FnExpression {
    key: String,
    columns: Vec<String>,
    eval: Box<EvalFn>,
}

impl FnExpression {
    /// Creates a closure expression. `key` identifies it and `columns` lists
    /// what it reads.
    pub fn new<F>(key: impl Into<String>, columns: &[&str], eval: F) -> Self
    where
        F: Fn(&Row, &Transaction) -> Result<Value> + 'static,
    {
        Self {
            key: key.into(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            eval: Box::new(eval),
        }
    }
}

impl fmt::Debug for FnExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnExpression").field("key", &self.key).finish()
    }
}

impl Expression for FnExpression {
    fn evaluate(&self, row: &Row, txn: &Transaction) -> Result<Value> {
        (self.eval)(row, txn)
    }

    fn hash_key(&self) -> String {
        self.key.clone()
    }

    fn columns(&self) -> Vec<String> {
        self.columns.clone()
    }
}

/// Shorthand for a shared column reference.
pub fn col(name: &str) -> ExprRef {
    Rc::new(ColumnRef::new(name))
}

/// Shorthand for a shared literal.
pub fn lit(value: impl Into<Value>) -> ExprRef {
    Rc::new(Literal(value.into()))
}

/// Shorthand for a shared closure expression.
pub fn func<F>(key: &str, columns: &[&str], eval: F) -> ExprRef
where
    F: Fn(&Row, &Transaction) -> Result<Value> + 'static,
{
    Rc::new(FnExpression::new(key, columns, eval))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::row::RowId;
    use std::collections::BTreeMap;

    fn row() -> Row {
        let mut values = BTreeMap::new();
        values.insert("a".to_string(), Value::Int32(3));
        Row::new(RowId::new("t", 1), values)
    }

    #[test]
    fn test_column_ref() {
        let txn = Transaction::root();
        let e = col("a");
        assert_eq!(e.evaluate(&row(), &txn).unwrap(), Value::Int32(3));
        assert!(col("b").evaluate(&row(), &txn).unwrap().is_null());
        assert_eq!(e.columns(), vec!["a".to_string()]);
        assert_eq!(e.hash_key(), "a");
        assert_eq!(e.as_column(), Some("a"));
        assert_eq!(lit(1i32).as_column(), None);
    }

    #[test]
    fn test_fn_expression() {
        let txn = Transaction::root();
        let doubled = func("a * 2", &["a"], |r, _| {
            Ok(r.value("a").as_i32().map(|v| Value::Int32(v * 2)).unwrap_or(Value::Null))
        });
        assert_eq!(doubled.evaluate(&row(), &txn).unwrap(), Value::Int32(6));
        assert_eq!(doubled.hash_key(), "a * 2");
        assert_eq!(lit(1i32).evaluate(&row(), &txn).unwrap(), Value::Int32(1));
    }
}
