//! Record traits
//!
//! A record is a plain structured value with named, typed fields that can be
//! carried inside an envelope. `Packable` is implemented per concrete type
//! (normally through `define_record!`); `Record` is its object-safe face, used
//! wherever the concrete type is only known at runtime.

use crate::error::{CodecError, Result};
use crate::schema::RecordSchema;
use crate::value::{FieldValue, Fields, Value};
use std::any::Any;
use std::fmt;

/// Statically typed record that can be packed into and rebuilt from a field map
pub trait Packable: Clone + PartialEq + fmt::Debug + Send + Sync + 'static {
    /// Stable, process-wide unique name carried in the envelope `type` key
    const TYPE_NAME: &'static str;

    /// Every declared field, encoded
    fn to_fields(&self) -> Fields;

    /// Rebuild the record from a decoded field map
    fn from_fields(fields: Fields) -> Result<Self>;

    /// Declared field layout, including defaults
    fn schema() -> RecordSchema;
}

/// Object-safe view of any packable record
pub trait Record: Any + Send + Sync + fmt::Debug {
    fn type_name(&self) -> &'static str;
    fn fields(&self) -> Fields;
    fn clone_record(&self) -> Box<dyn Record>;
    fn eq_record(&self, other: &dyn Record) -> bool;
    fn as_any(&self) -> &dyn Any;
}

impl<T: Packable> Record for T {
    fn type_name(&self) -> &'static str {
        T::TYPE_NAME
    }

    fn fields(&self) -> Fields {
        self.to_fields()
    }

    fn clone_record(&self) -> Box<dyn Record> {
        Box::new(self.clone())
    }

    fn eq_record(&self, other: &dyn Record) -> bool {
        other
            .as_any()
            .downcast_ref::<T>()
            .map_or(false, |other| self == other)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl dyn Record {
    /// Check whether the runtime type is `T`
    pub fn is<T: Packable>(&self) -> bool {
        self.as_any().is::<T>()
    }

    pub fn downcast_ref<T: Packable>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    /// Take ownership of the concrete record, handing the box back on mismatch
    pub fn downcast<T: Packable>(self: Box<Self>) -> std::result::Result<T, Box<dyn Record>> {
        if let Some(concrete) = self.as_any().downcast_ref::<T>() {
            return Ok(concrete.clone());
        }
        Err(self)
    }
}

impl Clone for Box<dyn Record> {
    fn clone(&self) -> Self {
        self.clone_record()
    }
}

impl PartialEq for Box<dyn Record> {
    fn eq(&self, other: &Self) -> bool {
        self.eq_record(other.as_ref())
    }
}

/// Convert a decoded value into the concrete record type `T`
pub fn record_from_value<T: Packable>(value: Value) -> Result<T> {
    match value {
        Value::Record(record) => {
            let found = record.type_name();
            record.downcast::<T>().map_err(|_| CodecError::TypeMismatch {
                expected: T::TYPE_NAME,
                found,
            })
        }
        other => Err(CodecError::TypeMismatch {
            expected: T::TYPE_NAME,
            found: other.kind_name(),
        }),
    }
}

/// Remove and convert one declared field from a field map
///
/// A missing field falls back to the declared default, if any.
pub fn take_field<T: FieldValue>(
    fields: &mut Fields,
    record: &'static str,
    field: &'static str,
    default: Option<fn() -> Value>,
) -> Result<T> {
    let value = match (fields.remove(field), default) {
        (Some(value), _) => value,
        (None, Some(default)) => default(),
        (None, None) => return Err(CodecError::missing_field(record, field)),
    };
    T::from_value(value).map_err(|err| err.in_field(record, field))
}

/// Fail if a field map still holds keys after every declared field was taken
pub fn reject_leftovers(fields: Fields, record: &'static str) -> Result<()> {
    match fields.into_keys().next() {
        Some(field) => Err(CodecError::UnexpectedField {
            record: record.to_string(),
            field,
        }),
        None => Ok(()),
    }
}

/// Type-erased constructor used by the registry and by schemas
pub fn construct<T: Packable>(fields: Fields) -> Result<Box<dyn Record>> {
    T::from_fields(fields).map(|record| Box::new(record) as Box<dyn Record>)
}
