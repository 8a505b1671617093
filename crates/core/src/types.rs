//! Data type definitions for Tessera.
//!
//! This module defines the column types the storage engine understands. The
//! full SQL type system lives in the front end; the engine only needs enough
//! to store, order and cast values.

/// Supported column data types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DataType {
    /// Boolean type (true/false)
    Boolean,
    /// 32-bit signed integer
    Int32,
    /// 64-bit signed integer
    Int64,
    /// 64-bit floating point number
    Float64,
    /// UTF-8 string
    String,
    /// Date and time stored as Unix timestamp (milliseconds)
    DateTime,
    /// Binary data
    Bytes,
}

impl DataType {
    /// Returns the SQL name of this type.
    pub fn sql_name(&self) -> &'static str {
        match self {
            DataType::Boolean => "boolean",
            DataType::Int32 => "integer",
            DataType::Int64 => "bigint",
            DataType::Float64 => "double precision",
            DataType::String => "text",
            DataType::DateTime => "timestamp",
            DataType::Bytes => "bytea",
        }
    }

    /// Returns whether this type can be used as an index key.
    pub fn is_indexable(&self) -> bool {
        !matches!(self, DataType::Bytes)
    }

    /// Returns whether values of this type can feed an identity or serial column.
    pub fn is_integer(&self) -> bool {
        matches!(self, DataType::Int32 | DataType::Int64)
    }

    /// Returns whether this type is numeric.
    pub fn is_numeric(&self) -> bool {
        matches!(self, DataType::Int32 | DataType::Int64 | DataType::Float64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_type_equality() {
        assert_eq!(DataType::Int32, DataType::Int32);
        assert_ne!(DataType::Int32, DataType::Int64);
    }

    #[test]
    fn test_indexable() {
        assert!(DataType::Boolean.is_indexable());
        assert!(DataType::Int64.is_indexable());
        assert!(DataType::String.is_indexable());
        assert!(DataType::DateTime.is_indexable());
        assert!(!DataType::Bytes.is_indexable());
    }

    #[test]
    fn test_integer_types() {
        assert!(DataType::Int32.is_integer());
        assert!(DataType::Int64.is_integer());
        assert!(!DataType::Float64.is_integer());
        assert!(DataType::Float64.is_numeric());
        assert_eq!(DataType::String.sql_name(), "text");
    }
}
