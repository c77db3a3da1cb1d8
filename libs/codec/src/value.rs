//! Dynamic value model
//!
//! `Value` is the decoded, in-memory form of anything that can travel inside an
//! envelope: primitives, plain sequences and mappings, and nested records whose
//! concrete type was recovered through the registry.
//!
//! `FieldValue` bridges statically typed record fields and `Value`, and reports
//! the declared kind of the field so schemas can be generated without
//! reflection.

use crate::error::{CodecError, Result};
use crate::record::Record;
use crate::schema::FieldKind;
use std::collections::{BTreeMap, HashMap};

/// Named fields of a record, keyed by field name
pub type Fields = BTreeMap<String, Value>;

/// A decoded value of any supported shape
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
    /// A nested record, reconstructed with its concrete runtime type
    Record(Box<dyn Record>),
}

impl Value {
    /// Short shape name used in type mismatch diagnostics
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Record(_) => "record",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&dyn Record> {
        match self {
            Value::Record(record) => Some(record.as_ref()),
            _ => None,
        }
    }

    /// Wrap any record as a value
    pub fn record(record: impl Record) -> Self {
        Value::Record(Box::new(record))
    }

    fn mismatch(&self, expected: &'static str) -> CodecError {
        CodecError::TypeMismatch {
            expected,
            found: self.kind_name(),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Str(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

/// Conversion between a statically typed field and the dynamic `Value`
pub trait FieldValue: Sized {
    /// Encode the field into a dynamic value
    fn to_value(&self) -> Value;

    /// Rebuild the field from a decoded value
    fn from_value(value: Value) -> Result<Self>;

    /// Declared kind of the field, used by declared-type reconstruction
    fn kind() -> FieldKind;
}

impl FieldValue for Value {
    fn to_value(&self) -> Value {
        self.clone()
    }

    fn from_value(value: Value) -> Result<Self> {
        Ok(value)
    }

    fn kind() -> FieldKind {
        FieldKind::Any
    }
}

impl FieldValue for bool {
    fn to_value(&self) -> Value {
        Value::Bool(*self)
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Bool(b) => Ok(b),
            other => Err(other.mismatch("bool")),
        }
    }

    fn kind() -> FieldKind {
        FieldKind::Bool
    }
}

impl FieldValue for i64 {
    fn to_value(&self) -> Value {
        Value::Int(*self)
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Int(i) => Ok(i),
            other => Err(other.mismatch("int")),
        }
    }

    fn kind() -> FieldKind {
        FieldKind::Int
    }
}

impl FieldValue for u16 {
    fn to_value(&self) -> Value {
        Value::Int(i64::from(*self))
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Int(i) => u16::try_from(i).map_err(|_| CodecError::TypeMismatch {
                expected: "u16",
                found: "int out of range",
            }),
            other => Err(other.mismatch("u16")),
        }
    }

    fn kind() -> FieldKind {
        FieldKind::Int
    }
}

impl FieldValue for f64 {
    fn to_value(&self) -> Value {
        Value::Float(*self)
    }

    // Integers are accepted: JSON does not distinguish `12` from `12.0` for senders
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Float(f) => Ok(f),
            Value::Int(i) => Ok(i as f64),
            other => Err(other.mismatch("float")),
        }
    }

    fn kind() -> FieldKind {
        FieldKind::Float
    }
}

impl FieldValue for String {
    fn to_value(&self) -> Value {
        Value::Str(self.clone())
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Str(s) => Ok(s),
            other => Err(other.mismatch("string")),
        }
    }

    fn kind() -> FieldKind {
        FieldKind::Str
    }
}

impl<T: FieldValue> FieldValue for Option<T> {
    fn to_value(&self) -> Value {
        match self {
            Some(inner) => inner.to_value(),
            None => Value::Null,
        }
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }

    fn kind() -> FieldKind {
        FieldKind::Optional(Box::new(T::kind()))
    }
}

impl<T: FieldValue> FieldValue for Vec<T> {
    fn to_value(&self) -> Value {
        Value::List(self.iter().map(FieldValue::to_value).collect())
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::List(items) => items.into_iter().map(T::from_value).collect(),
            other => Err(other.mismatch("list")),
        }
    }

    fn kind() -> FieldKind {
        FieldKind::List(Box::new(T::kind()))
    }
}

impl<T: FieldValue> FieldValue for BTreeMap<String, T> {
    fn to_value(&self) -> Value {
        Value::Map(
            self.iter()
                .map(|(k, v)| (k.clone(), v.to_value()))
                .collect(),
        )
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Map(entries) => entries
                .into_iter()
                .map(|(k, v)| T::from_value(v).map(|v| (k, v)))
                .collect(),
            other => Err(other.mismatch("map")),
        }
    }

    fn kind() -> FieldKind {
        FieldKind::Map(Box::new(T::kind()))
    }
}

impl<T: FieldValue> FieldValue for HashMap<String, T> {
    fn to_value(&self) -> Value {
        Value::Map(
            self.iter()
                .map(|(k, v)| (k.clone(), v.to_value()))
                .collect(),
        )
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Map(entries) => entries
                .into_iter()
                .map(|(k, v)| T::from_value(v).map(|v| (k, v)))
                .collect(),
            other => Err(other.mismatch("map")),
        }
    }

    fn kind() -> FieldKind {
        FieldKind::Map(Box::new(T::kind()))
    }
}

/// Any record, with the concrete type decided at runtime
impl FieldValue for Box<dyn Record> {
    fn to_value(&self) -> Value {
        Value::Record(self.clone())
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Record(record) => Ok(record),
            other => Err(other.mismatch("record")),
        }
    }

    fn kind() -> FieldKind {
        FieldKind::Any
    }
}
