//! Declared field schemas
//!
//! A schema describes a record the way its definition declares it: field
//! names, their kinds, and optional defaults. The envelope decoder never needs
//! it (every nested record carries its own type name), but loaders that read
//! untagged JSON rely on it to know which objects are records and of which type.

use crate::error::Result;
use crate::record::Record;
use crate::value::{Fields, Value};
use std::fmt;

/// Declared kind of a field or parameter
#[derive(Clone)]
pub enum FieldKind {
    /// Anything; decoded structurally
    Any,
    Bool,
    Int,
    Float,
    Str,
    Optional(Box<FieldKind>),
    List(Box<FieldKind>),
    /// String-keyed mapping with values of the inner kind
    Map(Box<FieldKind>),
    /// A concrete record type, described lazily to allow recursive layouts
    Record(fn() -> RecordSchema),
}

impl FieldKind {
    /// Whether a record type appears anywhere inside this kind
    pub fn involves_record(&self) -> bool {
        match self {
            FieldKind::Record(_) => true,
            FieldKind::Optional(inner) | FieldKind::List(inner) | FieldKind::Map(inner) => {
                inner.involves_record()
            }
            _ => false,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            FieldKind::Any => "any".to_string(),
            FieldKind::Bool => "bool".to_string(),
            FieldKind::Int => "int".to_string(),
            FieldKind::Float => "float".to_string(),
            FieldKind::Str => "str".to_string(),
            FieldKind::Optional(inner) => format!("optional<{}>", inner.describe()),
            FieldKind::List(inner) => format!("list<{}>", inner.describe()),
            FieldKind::Map(inner) => format!("map<str, {}>", inner.describe()),
            FieldKind::Record(schema) => schema().type_name.to_string(),
        }
    }
}

impl fmt::Debug for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

/// One declared field of a record, or one declared parameter of an operation
#[derive(Clone, Debug)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    /// Default value or default factory
    pub default: Option<fn() -> Value>,
}

impl FieldSpec {
    pub fn required(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            default: None,
        }
    }

    pub fn with_default(name: &'static str, kind: FieldKind, default: fn() -> Value) -> Self {
        Self {
            name,
            kind,
            default: Some(default),
        }
    }

    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }
}

/// Declared layout of a record type
#[derive(Clone)]
pub struct RecordSchema {
    pub type_name: &'static str,
    pub fields: Vec<FieldSpec>,
    pub construct: fn(Fields) -> Result<Box<dyn Record>>,
}

impl RecordSchema {
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }
}

impl fmt::Debug for RecordSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordSchema")
            .field("type_name", &self.type_name)
            .field("fields", &self.fields)
            .finish()
    }
}
