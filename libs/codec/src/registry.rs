//! Record type registry and envelope decoding
//!
//! The registry maps every known type name to a constructor. Each record type
//! opts in with an explicit `register::<T>()` call at process start; the
//! registry is immutable afterwards and can be shared freely.
//!
//! Decoding walks the JSON tree: objects carrying both `type` and `data` are
//! envelopes and are rebuilt through the registry, other objects and arrays
//! are decoded structurally, and everything else passes through as a
//! primitive.

use crate::envelope::Envelope;
use crate::error::{CodecError, Result};
use crate::record::{construct, Packable, Record};
use crate::value::{Fields, Value};
use serde_json::Value as Json;
use std::collections::HashMap;
use tracing::debug;

type Constructor = fn(Fields) -> Result<Box<dyn Record>>;

/// Process-wide table of known record types
#[derive(Default)]
pub struct Registry {
    constructors: HashMap<&'static str, Constructor>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a record type under its `TYPE_NAME`
    ///
    /// A second registration under the same name is a startup bug and is
    /// reported as `DuplicateType`.
    pub fn register<T: Packable>(&mut self) -> Result<&mut Self> {
        if self.constructors.contains_key(T::TYPE_NAME) {
            return Err(CodecError::DuplicateType {
                type_name: T::TYPE_NAME.to_string(),
            });
        }
        self.constructors.insert(T::TYPE_NAME, construct::<T>);
        debug!(type_name = T::TYPE_NAME, "Registered record type");
        Ok(self)
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.constructors.contains_key(type_name)
    }

    pub fn len(&self) -> usize {
        self.constructors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constructors.is_empty()
    }

    /// Registered type names, sorted
    pub fn type_names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.constructors.keys().copied().collect();
        names.sort_unstable();
        names
    }

    /// Decode a top-level envelope into its record
    pub fn decode(&self, json: &Json) -> Result<Box<dyn Record>> {
        let envelope = Envelope::parse(json)?;
        self.decode_envelope(envelope)
    }

    /// Decode wire text into its record
    pub fn decode_text(&self, text: &str) -> Result<Box<dyn Record>> {
        let json: Json = serde_json::from_str(text)?;
        self.decode(&json)
    }

    /// Decode a top-level envelope and require a specific record type
    pub fn decode_as<T: Packable>(&self, json: &Json) -> Result<T> {
        let record = self.decode(json)?;
        let found = record.type_name();
        record.downcast::<T>().map_err(|_| CodecError::TypeMismatch {
            expected: T::TYPE_NAME,
            found,
        })
    }

    /// Decode any JSON value, rebuilding nested envelopes through the registry
    pub fn decode_value(&self, json: &Json) -> Result<Value> {
        match json {
            Json::Object(_) if Envelope::looks_like(json) => {
                let envelope = Envelope::parse(json)?;
                self.decode_envelope(envelope).map(Value::Record)
            }
            Json::Object(object) => object
                .iter()
                .map(|(k, v)| self.decode_value(v).map(|v| (k.clone(), v)))
                .collect::<Result<_>>()
                .map(Value::Map),
            Json::Array(items) => items
                .iter()
                .map(|v| self.decode_value(v))
                .collect::<Result<_>>()
                .map(Value::List),
            other => Ok(primitive(other)),
        }
    }

    fn decode_envelope(&self, envelope: Envelope<'_>) -> Result<Box<dyn Record>> {
        let constructor = self
            .constructors
            .get(envelope.type_name)
            .ok_or_else(|| CodecError::unknown_type(envelope.type_name))?;

        let data = envelope.data.as_object().ok_or_else(|| {
            CodecError::malformed(
                format!("`data` of {} is not a field map", envelope.type_name),
                envelope.data,
            )
        })?;

        let mut fields = Fields::new();
        for (name, value) in data {
            fields.insert(name.clone(), self.decode_value(value)?);
        }
        constructor(fields)
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("types", &self.type_names())
            .finish()
    }
}

/// Decode a JSON scalar without consulting any registry
pub fn primitive(json: &Json) -> Value {
    match json {
        Json::Null => Value::Null,
        Json::Bool(b) => Value::Bool(*b),
        Json::Number(n) => match n.as_i64() {
            Some(i) => Value::Int(i),
            None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
        },
        Json::String(s) => Value::Str(s.clone()),
        Json::Array(items) => Value::List(items.iter().map(primitive).collect()),
        Json::Object(object) => Value::Map(
            object
                .iter()
                .map(|(k, v)| (k.clone(), primitive(v)))
                .collect(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::define_record;
    use serde_json::json;

    define_record! {
        struct Leaf as "Leaf" {
            value: i64,
        }
    }

    fn registry() -> Registry {
        let mut registry = Registry::new();
        registry.register::<Leaf>().unwrap();
        registry
    }

    #[test]
    fn test_duplicate_registration_is_rejected() {
        let mut registry = registry();
        assert_eq!(
            registry.register::<Leaf>().unwrap_err(),
            CodecError::DuplicateType {
                type_name: "Leaf".to_string()
            }
        );
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        let err = registry()
            .decode(&json!({ "type": "NotRegistered", "data": {} }))
            .unwrap_err();
        assert_eq!(err, CodecError::unknown_type("NotRegistered"));
    }

    #[test]
    fn test_malformed_envelopes_are_rejected() {
        let registry = registry();
        for bad in [json!({ "data": {} }), json!({ "type": "Leaf" })] {
            assert!(matches!(
                registry.decode(&bad),
                Err(CodecError::MalformedEnvelope { .. })
            ));
        }
    }

    #[test]
    fn test_sequence_data_is_malformed() {
        let err = registry()
            .decode(&json!({ "type": "Leaf", "data": [1] }))
            .unwrap_err();
        assert!(matches!(err, CodecError::MalformedEnvelope { .. }));
    }

    #[test]
    fn test_plain_containers_decode_structurally() {
        let value = registry()
            .decode_value(&json!({ "a": [1, 2.5, "s", null], "type": "not-an-envelope" }))
            .unwrap();
        let Value::Map(map) = value else {
            panic!("expected map");
        };
        assert_eq!(
            map["a"],
            Value::List(vec![
                Value::Int(1),
                Value::Float(2.5),
                Value::Str("s".to_string()),
                Value::Null
            ])
        );
        assert_eq!(map["type"], Value::Str("not-an-envelope".to_string()));
    }

    #[test]
    fn test_decode_as_checks_type() {
        let registry = registry();
        let leaf: Leaf = registry
            .decode_as(&json!({ "type": "Leaf", "data": { "value": 3 } }))
            .unwrap();
        assert_eq!(leaf, Leaf { value: 3 });
    }

    #[test]
    fn test_missing_and_unexpected_fields() {
        let registry = registry();
        let missing = registry
            .decode(&json!({ "type": "Leaf", "data": {} }))
            .unwrap_err();
        assert_eq!(missing, CodecError::missing_field("Leaf", "value"));

        let extra = registry
            .decode(&json!({ "type": "Leaf", "data": { "value": 1, "ghost": 2 } }))
            .unwrap_err();
        assert!(matches!(extra, CodecError::UnexpectedField { .. }));
    }
}
