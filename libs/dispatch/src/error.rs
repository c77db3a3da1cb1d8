//! Dispatch errors
//!
//! None of these escape `Dispatcher::dispatch`: every variant is turned into
//! an `error` result carrying `{"exception": "<kind>: <description>"}`.

use codec::CodecError;
use thiserror::Error;
use types::Opcode;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum DispatchError {
    /// Opcode has no entry in the routing table
    #[error("Opcode {opcode} is not routed to any handler operation")]
    UnknownOpcode { opcode: String },

    #[error("{opcode}() got {found} positional arguments but takes {expected}")]
    TooManyArguments {
        opcode: Opcode,
        expected: usize,
        found: usize,
    },

    #[error("{opcode}() got an unexpected keyword argument '{parameter}'")]
    UnexpectedArgument { opcode: Opcode, parameter: String },

    #[error("{opcode}() got multiple values for argument '{parameter}'")]
    DuplicateArgument { opcode: Opcode, parameter: String },

    #[error("{opcode}() missing required argument '{parameter}'")]
    MissingArgument {
        opcode: Opcode,
        parameter: &'static str,
    },

    /// Argument present but not convertible to the declared parameter type
    #[error("{opcode}() argument '{parameter}' is invalid: {reason}")]
    InvalidArgument {
        opcode: Opcode,
        parameter: &'static str,
        reason: CodecError,
    },

    /// The handler operation itself failed
    #[error("{opcode} failed: {reason}")]
    HandlerFailure { opcode: Opcode, reason: String },
}

pub type Result<T> = std::result::Result<T, DispatchError>;

impl DispatchError {
    pub fn unknown_opcode(opcode: impl std::fmt::Display) -> Self {
        Self::UnknownOpcode {
            opcode: opcode.to_string(),
        }
    }

    /// Wrap a handler failure, keeping its whole context chain
    pub fn handler(opcode: Opcode, error: &anyhow::Error) -> Self {
        Self::HandlerFailure {
            opcode,
            reason: format!("{error:#}"),
        }
    }

    /// Failure kind reported in the `exception` message of an error result
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UnknownOpcode { .. } => "UnknownOpcode",
            Self::HandlerFailure { .. } => "HandlerFailure",
            Self::InvalidArgument { .. } => "InvalidArgument",
            Self::TooManyArguments { .. }
            | Self::UnexpectedArgument { .. }
            | Self::DuplicateArgument { .. }
            | Self::MissingArgument { .. } => "BindingError",
        }
    }
}
