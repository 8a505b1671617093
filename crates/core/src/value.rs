//! Value type definitions for Tessera.
//!
//! This module defines the `Value` enum which represents any value that can be stored
//! in a table cell, together with its total ordering and cast rules.

use crate::error::{Error, Result};
use crate::types::DataType;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// A value that can be stored in a table cell.
#[derive(Clone, Debug)]
pub enum Value {
    /// Null value
    Null,
    /// Boolean value
    Boolean(bool),
    /// 32-bit signed integer
    Int32(i32),
    /// 64-bit signed integer
    Int64(i64),
    /// 64-bit floating point
    Float64(f64),
    /// UTF-8 string
    String(String),
    /// DateTime stored as Unix timestamp in milliseconds
    DateTime(i64),
    /// Binary data
    Bytes(Vec<u8>),
}

impl Value {
    /// Returns the data type of this value, or None if it's Null.
    pub fn data_type(&self) -> Option<DataType> {
        match self {
            Value::Null => None,
            Value::Boolean(_) => Some(DataType::Boolean),
            Value::Int32(_) => Some(DataType::Int32),
            Value::Int64(_) => Some(DataType::Int64),
            Value::Float64(_) => Some(DataType::Float64),
            Value::String(_) => Some(DataType::String),
            Value::DateTime(_) => Some(DataType::DateTime),
            Value::Bytes(_) => Some(DataType::Bytes),
        }
    }

    /// Returns true if this value is Null.
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns the boolean value if this is a Boolean, None otherwise.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the i32 value if this is an Int32, None otherwise.
    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::Int32(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the i64 value if this is an Int64, None otherwise.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int64(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the value widened to i64 if it is any integer type.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Int32(v) => Some(*v as i64),
            Value::Int64(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the f64 value if this is a Float64, None otherwise.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float64(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns a reference to the string if this is a String, None otherwise.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(v) => Some(v.as_str()),
            _ => None,
        }
    }

    /// Returns the datetime timestamp if this is a DateTime, None otherwise.
    pub fn as_datetime(&self) -> Option<i64> {
        match self {
            Value::DateTime(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns a reference to the bytes if this is Bytes, None otherwise.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(v) => Some(v.as_slice()),
            _ => None,
        }
    }

    /// Builds an integer value of the given integer type.
    pub fn integer(dt: DataType, v: i64) -> Result<Self> {
        Value::Int64(v).cast(dt)
    }

    /// Casts this value to the given type.
    ///
    /// Nulls cast to null. Integer narrowing checks range, float to integer
    /// rounds, and strings are parsed.
    pub fn cast(&self, to: DataType) -> Result<Value> {
        if self.data_type() == Some(to) || self.is_null() {
            return Ok(self.clone());
        }
        let fail = || Error::InvalidCast {
            value: self.to_string(),
            to,
        };
        let out = match (self, to) {
            (Value::Int32(v), DataType::Int64) => Value::Int64(*v as i64),
            (Value::Int64(v), DataType::Int32) => {
                Value::Int32(i32::try_from(*v).map_err(|_| fail())?)
            }
            (Value::Int32(v), DataType::Float64) => Value::Float64(*v as f64),
            (Value::Int64(v), DataType::Float64) => Value::Float64(*v as f64),
            (Value::Float64(v), DataType::Int32) => {
                let r = v.round();
                if !r.is_finite() || r < i32::MIN as f64 || r > i32::MAX as f64 {
                    return Err(fail());
                }
                Value::Int32(r as i32)
            }
            (Value::Float64(v), DataType::Int64) => {
                let r = v.round();
                if !r.is_finite() || r < i64::MIN as f64 || r > i64::MAX as f64 {
                    return Err(fail());
                }
                Value::Int64(r as i64)
            }
            (Value::Int32(v), DataType::Boolean) => Value::Boolean(*v != 0),
            (Value::Int64(v), DataType::Boolean) => Value::Boolean(*v != 0),
            (Value::Boolean(b), DataType::Int32) => Value::Int32(*b as i32),
            (Value::Boolean(b), DataType::Int64) => Value::Int64(*b as i64),
            (Value::DateTime(v), DataType::Int64) => Value::Int64(*v),
            (Value::Int64(v), DataType::DateTime) => Value::DateTime(*v),
            (Value::Int32(v), DataType::DateTime) => Value::DateTime(*v as i64),
            (Value::String(s), DataType::Bytes) => Value::Bytes(s.as_bytes().to_vec()),
            (Value::Bytes(b), DataType::String) => {
                Value::String(String::from_utf8(b.clone()).map_err(|_| fail())?)
            }
            (v, DataType::String) => Value::String(v.to_string()),
            (Value::String(s), dt) => parse_str(s.trim(), dt).ok_or_else(fail)?,
            _ => return Err(fail()),
        };
        Ok(out)
    }

    /// Returns a type ordering value for comparing different types.
    fn type_order(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Boolean(_) => 1,
            Value::Int32(_) => 2,
            Value::Int64(_) => 3,
            Value::Float64(_) => 4,
            Value::String(_) => 5,
            Value::DateTime(_) => 6,
            Value::Bytes(_) => 7,
        }
    }
}

fn parse_str(s: &str, dt: DataType) -> Option<Value> {
    match dt {
        DataType::Boolean => match s.to_ascii_lowercase().as_str() {
            "t" | "true" | "yes" | "on" | "1" => Some(Value::Boolean(true)),
            "f" | "false" | "no" | "off" | "0" => Some(Value::Boolean(false)),
            _ => None,
        },
        DataType::Int32 => s.parse().ok().map(Value::Int32),
        DataType::Int64 => s.parse().ok().map(Value::Int64),
        DataType::Float64 => s.parse().ok().map(Value::Float64),
        DataType::DateTime => s.parse().ok().map(Value::DateTime),
        DataType::String | DataType::Bytes => None,
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Int32(v) => write!(f, "{}", v),
            Value::Int64(v) => write!(f, "{}", v),
            Value::Float64(v) => write!(f, "{}", v),
            Value::String(s) => write!(f, "{}", s),
            Value::DateTime(v) => write!(f, "{}", v),
            Value::Bytes(b) => {
                write!(f, "\\x")?;
                for byte in b {
                    write!(f, "{:02x}", byte)?;
                }
                Ok(())
            }
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Int32(a), Value::Int32(b)) => a == b,
            (Value::Int64(a), Value::Int64(b)) => a == b,
            (Value::Float64(a), Value::Float64(b)) => {
                if a.is_nan() && b.is_nan() {
                    true
                } else {
                    a == b
                }
            }
            (Value::String(a), Value::String(b)) => a == b,
            (Value::DateTime(a), Value::DateTime(b)) => a == b,
            (Value::Bytes(a), Value::Bytes(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Null => {}
            Value::Boolean(b) => b.hash(state),
            Value::Int32(i) => i.hash(state),
            Value::Int64(i) => i.hash(state),
            Value::Float64(f) => f.to_bits().hash(state),
            Value::String(s) => s.hash(state),
            Value::DateTime(d) => d.hash(state),
            Value::Bytes(b) => b.hash(state),
        }
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Null, _) => Ordering::Less,
            (_, Value::Null) => Ordering::Greater,
            (Value::Boolean(a), Value::Boolean(b)) => a.cmp(b),
            (Value::Int32(a), Value::Int32(b)) => a.cmp(b),
            (Value::Int64(a), Value::Int64(b)) => a.cmp(b),
            // Cross-type numeric comparisons
            (Value::Int32(a), Value::Int64(b)) => (*a as i64).cmp(b),
            (Value::Int64(a), Value::Int32(b)) => a.cmp(&(*b as i64)),
            (Value::Int32(a), Value::Float64(b)) => cmp_f64(*a as f64, *b),
            (Value::Float64(a), Value::Int32(b)) => cmp_f64(*a, *b as f64),
            (Value::Int64(a), Value::Float64(b)) => cmp_f64(*a as f64, *b),
            (Value::Float64(a), Value::Int64(b)) => cmp_f64(*a, *b as f64),
            (Value::Float64(a), Value::Float64(b)) => cmp_f64(*a, *b),
            (Value::String(a), Value::String(b)) => a.cmp(b),
            (Value::DateTime(a), Value::DateTime(b)) => a.cmp(b),
            (Value::Bytes(a), Value::Bytes(b)) => a.cmp(b),
            // Different types: order by type discriminant
            _ => self.type_order().cmp(&other.type_order()),
        }
    }
}

/// NaN sorts above every other float.
fn cmp_f64(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int64(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float64(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl<T> From<Option<T>> for Value
where
    T: Into<Value>,
{
    fn from(v: Option<T>) -> Self {
        match v {
            Some(val) => val.into(),
            None => Value::Null,
        }
    }
}
