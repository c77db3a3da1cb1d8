//! Codec-level errors for envelope encoding and decoding
//!
//! Every failure the codec can report while turning a wire envelope back into
//! a typed record graph. Decode failures are terminal for the message (and, at
//! the transport layer, for the connection that produced it) but never for the
//! owning process.

use thiserror::Error;

/// Envelope and record reconstruction errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CodecError {
    /// Envelope is missing its `type` or `data` key, or they have the wrong shape
    #[error("Malformed envelope: {reason} (got: {snippet})")]
    MalformedEnvelope { reason: String, snippet: String },

    /// Type name is not present in the registry of the receiving process
    #[error(
        "Message type {type_name} is not known to the recipient: \
         both ends must register the same record types"
    )]
    UnknownType { type_name: String },

    /// Two record types tried to register under the same name
    #[error("Record type {type_name} registered twice")]
    DuplicateType { type_name: String },

    /// A declared field is absent from the field map and has no default
    #[error("Missing field {field} for record {record}")]
    MissingField { record: String, field: String },

    /// The field map carries a key the record does not declare
    #[error("Unexpected field {field} for record {record}")]
    UnexpectedField { record: String, field: String },

    /// A value has a different shape than the declared field type
    #[error("Type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    /// A field failed to convert; wraps the underlying reason with its location
    #[error("Invalid field {record}.{field}: {reason}")]
    InvalidField {
        record: String,
        field: String,
        reason: Box<CodecError>,
    },

    /// String value does not name a member of the declared enumeration
    #[error("Unknown variant {value} for {enumeration}")]
    UnknownVariant {
        enumeration: &'static str,
        value: String,
    },

    /// Text was not valid JSON
    #[error("JSON error: {0}")]
    Json(String),
}

/// Result type alias for codec operations
pub type Result<T> = std::result::Result<T, CodecError>;

impl CodecError {
    /// Build a MalformedEnvelope error, keeping a bounded preview of the input
    pub fn malformed(reason: impl Into<String>, source: &serde_json::Value) -> Self {
        let mut snippet = source.to_string();
        if snippet.len() > 120 {
            let mut cut = 120;
            while !snippet.is_char_boundary(cut) {
                cut -= 1;
            }
            snippet.truncate(cut);
            snippet.push_str("...");
        }
        Self::MalformedEnvelope {
            reason: reason.into(),
            snippet,
        }
    }

    pub fn unknown_type(type_name: impl Into<String>) -> Self {
        Self::UnknownType {
            type_name: type_name.into(),
        }
    }

    pub fn missing_field(record: impl Into<String>, field: impl Into<String>) -> Self {
        Self::MissingField {
            record: record.into(),
            field: field.into(),
        }
    }

    /// Attach record/field location to a conversion failure
    pub fn in_field(self, record: impl Into<String>, field: impl Into<String>) -> Self {
        Self::InvalidField {
            record: record.into(),
            field: field.into(),
            reason: Box::new(self),
        }
    }

    /// Innermost error, skipping any InvalidField location wrappers
    pub fn root_cause(&self) -> &CodecError {
        match self {
            Self::InvalidField { reason, .. } => reason.root_cause(),
            other => other,
        }
    }

    /// Check whether this failure is caused by an unregistered type name
    pub fn is_unknown_type(&self) -> bool {
        matches!(self.root_cause(), Self::UnknownType { .. })
    }
}

impl From<serde_json::Error> for CodecError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}
