//! Envelope encoding
//!
//! Wire form of a record: `{"type": "<TypeName>", "data": {<field>: <value>}}`.
//! Nested records become nested envelopes, sequences and string-keyed mappings
//! are encoded element by element using each element's runtime type, and
//! primitives are copied verbatim.

use crate::error::{CodecError, Result};
use crate::record::Record;
use crate::value::Value;
use serde_json::{Map, Number, Value as Json};

/// Envelope key holding the registered type name
pub const TYPE_KEY: &str = "type";

/// Envelope key holding the record's fields
pub const DATA_KEY: &str = "data";

/// Borrowed view of a validated envelope
#[derive(Debug, Clone, Copy)]
pub struct Envelope<'a> {
    pub type_name: &'a str,
    pub data: &'a Json,
}

impl<'a> Envelope<'a> {
    /// Validate the outer shape of an envelope without touching the registry
    pub fn parse(json: &'a Json) -> Result<Self> {
        let object = json
            .as_object()
            .ok_or_else(|| CodecError::malformed("envelope is not an object", json))?;
        let type_value = object
            .get(TYPE_KEY)
            .ok_or_else(|| CodecError::malformed("missing `type` key", json))?;
        let data = object
            .get(DATA_KEY)
            .ok_or_else(|| CodecError::malformed("missing `data` key", json))?;
        let type_name = type_value
            .as_str()
            .ok_or_else(|| CodecError::malformed("`type` is not a string", json))?;
        Ok(Self { type_name, data })
    }

    /// Whether a JSON object carries both envelope keys
    pub fn looks_like(json: &Json) -> bool {
        json.as_object()
            .map_or(false, |o| o.contains_key(TYPE_KEY) && o.contains_key(DATA_KEY))
    }
}

/// Encode a record as a top-level envelope
pub fn encode(record: &dyn Record) -> Json {
    let data: Map<String, Json> = record
        .fields()
        .iter()
        .map(|(name, value)| (name.clone(), encode_value(value)))
        .collect();

    let mut envelope = Map::with_capacity(2);
    envelope.insert(TYPE_KEY.to_string(), Json::String(record.type_name().to_string()));
    envelope.insert(DATA_KEY.to_string(), Json::Object(data));
    Json::Object(envelope)
}

/// Encode any dynamic value
///
/// Non-finite floats have no JSON representation and are encoded as `null`.
pub fn encode_value(value: &Value) -> Json {
    match value {
        Value::Null => Json::Null,
        Value::Bool(b) => Json::Bool(*b),
        Value::Int(i) => Json::Number(Number::from(*i)),
        Value::Float(f) => Number::from_f64(*f).map_or(Json::Null, Json::Number),
        Value::Str(s) => Json::String(s.clone()),
        Value::List(items) => Json::Array(items.iter().map(encode_value).collect()),
        Value::Map(entries) => Json::Object(
            entries
                .iter()
                .map(|(k, v)| (k.clone(), encode_value(v)))
                .collect(),
        ),
        Value::Record(record) => encode(record.as_ref()),
    }
}

/// Encode a record straight to wire text
pub fn to_text(record: &dyn Record) -> String {
    encode(record).to_string()
}
