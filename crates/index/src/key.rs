//! Composite index keys.

use std::fmt;
use tessera_core::Value;

/// A tuple of key component values in key-part order.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct IndexKey(Vec<Value>);

impl IndexKey {
    /// Creates a key from component values.
    pub fn new(values: Vec<Value>) -> Self {
        Self(values)
    }

    /// Returns the component values.
    #[inline]
    pub fn values(&self) -> &[Value] {
        &self.0
    }

    /// Returns the number of components.
    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns true if any component is null.
    pub fn has_null(&self) -> bool {
        self.0.iter().any(Value::is_null)
    }

    /// Consumes the key and returns its values.
    pub fn into_values(self) -> Vec<Value> {
        self.0
    }
}

impl From<Value> for IndexKey {
    fn from(value: Value) -> Self {
        Self(vec![value])
    }
}

impl From<Vec<Value>> for IndexKey {
    fn from(values: Vec<Value>) -> Self {
        Self(values)
    }
}

impl fmt::Display for IndexKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, v) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", v)?;
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_has_null() {
        assert!(!IndexKey::from(Value::Int32(1)).has_null());
        assert!(IndexKey::new(vec![Value::Int32(1), Value::Null]).has_null());
    }

    #[test]
    fn test_display() {
        let key = IndexKey::new(vec![Value::Int32(1), Value::String("a".into())]);
        assert_eq!(key.to_string(), "(1, a)");
        assert_eq!(key.len(), 2);
    }
}
