//! Row structure for Tessera.
//!
//! This module defines the `Row` struct which represents a single stored row,
//! its stable identifier, and `RowValues`, the partial value map supplied to
//! inserts and conflict handlers.

use crate::value::Value;
use std::collections::btree_map;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

static NULL: Value = Value::Null;

/// Unique identifier for a row, rendered as `<table>_<counter>`.
///
/// Identifiers are assigned once at insert time and never reused. They order
/// by counter, so iterating a row map yields insertion order.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RowId {
    seq: u64,
    table: Rc<str>,
}

impl RowId {
    /// Creates a row id for the given table and counter value.
    pub fn new(table: &str, seq: u64) -> Self {
        Self {
            seq,
            table: Rc::from(table),
        }
    }

    /// Returns the counter part of the identifier.
    #[inline]
    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// Returns the table name the row was created under.
    #[inline]
    pub fn table(&self) -> &str {
        &self.table
    }
}

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.table, self.seq)
    }
}

/// A row in a table: an identifier plus one value per declared column.
#[derive(Clone, Debug, PartialEq)]
pub struct Row {
    id: RowId,
    values: BTreeMap<String, Value>,
}

impl Row {
    /// Creates a new row with the given ID and values.
    pub fn new(id: RowId, values: BTreeMap<String, Value>) -> Self {
        Self { id, values }
    }

    /// Returns the row ID.
    #[inline]
    pub fn id(&self) -> &RowId {
        &self.id
    }

    /// Returns the value of a column, `None` if the column is unknown.
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.values.get(column)
    }

    /// Returns the value of a column, treating unknown columns as null.
    pub fn value(&self, column: &str) -> &Value {
        self.values.get(column).unwrap_or(&NULL)
    }

    /// Sets a column value.
    pub fn set(&mut self, column: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(column.into(), value.into());
    }

    /// Removes a column and returns its value.
    pub fn remove(&mut self, column: &str) -> Option<Value> {
        self.values.remove(column)
    }

    /// Renames a column in place.
    pub fn rename(&mut self, from: &str, to: &str) {
        if let Some(v) = self.values.remove(from) {
            self.values.insert(to.to_string(), v);
        }
    }

    /// Returns true if the row has a value (possibly null) for the column.
    #[inline]
    pub fn contains(&self, column: &str) -> bool {
        self.values.contains_key(column)
    }

    /// Returns the column values keyed by name.
    #[inline]
    pub fn values(&self) -> &BTreeMap<String, Value> {
        &self.values
    }

    /// Builder-style setter, handy for constructing updated rows.
    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(column, value);
        self
    }

    /// Returns the columns whose values differ between two versions of a row.
    pub fn changed_columns(&self, other: &Row) -> Vec<String> {
        let mut changed: Vec<String> = self
            .values
            .iter()
            .filter(|(k, v)| other.values.get(k.as_str()) != Some(v))
            .map(|(k, _)| k.clone())
            .collect();
        for k in other.values.keys() {
            if !self.values.contains_key(k) {
                changed.push(k.clone());
            }
        }
        changed
    }
}

/// A partial set of column values supplied by a caller.
///
/// A column that is absent takes its default; a column explicitly set to
/// `Value::Null` is stored as null.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RowValues {
    values: BTreeMap<String, Value>,
}

impl RowValues {
    /// Creates an empty value set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style setter.
    pub fn set(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(column.into(), value.into());
        self
    }

    /// Sets a column value in place.
    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(column.into(), value.into());
    }

    /// Returns the value of a column, if supplied.
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.values.get(column)
    }

    /// Removes a column.
    pub fn remove(&mut self, column: &str) -> Option<Value> {
        self.values.remove(column)
    }

    /// Returns true if the column was supplied.
    pub fn contains(&self, column: &str) -> bool {
        self.values.contains_key(column)
    }

    /// Iterates the supplied columns.
    pub fn iter(&self) -> btree_map::Iter<'_, String, Value> {
        self.values.iter()
    }

    /// Returns the number of supplied columns.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if no column was supplied.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Consumes the set and returns the underlying map.
    pub fn into_map(self) -> BTreeMap<String, Value> {
        self.values
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for RowValues {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl From<&Row> for RowValues {
    fn from(row: &Row) -> Self {
        Self {
            values: row.values.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Row {
        let mut values = BTreeMap::new();
        values.insert("id".to_string(), Value::Int64(1));
        values.insert("name".to_string(), Value::String("Alice".into()));
        Row::new(RowId::new("users", 1), values)
    }

    #[test]
    fn test_row_id_display_and_order() {
        let a = RowId::new("t", 2);
        let b = RowId::new("t", 10);
        assert_eq!(a.to_string(), "t_2");
        assert!(a < b);
        assert_eq!(b.seq(), 10);
        assert_eq!(b.table(), "t");
    }

    #[test]
    fn test_row_get_value() {
        let row = sample();
        assert_eq!(row.get("id"), Some(&Value::Int64(1)));
        assert_eq!(row.get("missing"), None);
        assert!(row.value("missing").is_null());
    }

    #[test]
    fn test_row_set_and_rename() {
        let mut row = sample();
        row.set("id", 100i64);
        assert_eq!(row.value("id"), &Value::Int64(100));
        row.rename("name", "full_name");
        assert!(!row.contains("name"));
        assert_eq!(row.value("full_name").as_str(), Some("Alice"));
    }

    #[test]
    fn test_changed_columns() {
        let row = sample();
        let updated = row.clone().with("name", "Bob");
        assert_eq!(row.changed_columns(&updated), vec!["name".to_string()]);
        assert!(row.changed_columns(&row.clone()).is_empty());
    }

    #[test]
    fn test_row_values_builder() {
        let values = RowValues::new().set("a", 1i32).set("b", Value::Null);
        assert_eq!(values.len(), 2);
        assert!(values.contains("b"));
        assert!(values.get("b").unwrap().is_null());
        assert!(!values.contains("c"));

        let collected: RowValues = vec![("x", 1i64)].into_iter().collect();
        assert_eq!(collected.get("x"), Some(&Value::Int64(1)));
    }
}
