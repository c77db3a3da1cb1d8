//! Batch loading errors

use codec::CodecError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BatchError {
    /// An invocation string or include file is not valid JSON
    #[error("Invalid JSON in {origin}: {source}")]
    Json {
        origin: String,
        #[source]
        source: serde_json::Error,
    },

    /// Valid JSON, but not shaped like `{opcode: args}`
    #[error("Malformed invocation in {origin}: {reason}")]
    MalformedInvocation { origin: String, reason: String },

    #[error("Unknown opcode {opcode}")]
    UnknownOpcode { opcode: String },

    #[error("{opcode}: missing required argument '{parameter}'")]
    MissingArgument {
        opcode: String,
        parameter: &'static str,
    },

    /// A declared record field was absent from the JSON object
    #[error("{opcode}: argument '{parameter}' is missing field {field}")]
    MissingField {
        opcode: String,
        parameter: &'static str,
        field: String,
    },

    /// A container declared to hold records held something else
    #[error("{opcode}: argument '{parameter}' mixes records and non-record values")]
    MixedContainer {
        opcode: String,
        parameter: &'static str,
    },

    /// Declared record parameter could not be rebuilt
    #[error("{opcode}: argument '{parameter}' is invalid: {source}")]
    Record {
        opcode: String,
        parameter: &'static str,
        #[source]
        source: CodecError,
    },

    #[error("Failed to read include file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An include chain re-entered a file that is still being expanded
    #[error("Include cycle through {path}")]
    IncludeCycle { path: PathBuf },
}

pub type Result<T> = std::result::Result<T, BatchError>;

impl BatchError {
    pub fn malformed(origin: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedInvocation {
            origin: origin.into(),
            reason: reason.into(),
        }
    }
}
