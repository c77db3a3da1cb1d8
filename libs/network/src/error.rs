//! Transport Error Types
//!
//! Failures of the runner's WebSocket links: connecting, the greeting
//! handshake, TLS material, frame decoding and worker addressing.

use codec::CodecError;
use std::net::SocketAddr;
use thiserror::Error;

/// Main transport error type
#[derive(Error, Debug)]
pub enum TransportError {
    /// Could not establish or keep a connection
    #[error("Connection error: {message} (remote: {remote_addr:?})")]
    Connection {
        message: String,
        remote_addr: Option<SocketAddr>,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// First frame on a new connection was not a usable greeting
    #[error("Handshake failed with {peer}: {reason}")]
    HandshakeFailure { peer: SocketAddr, reason: String },

    /// A frame could not be decoded into a registered record
    #[error("Protocol error: {message}")]
    Protocol {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Certificate or key material could not be loaded
    #[error("TLS error: {message}")]
    Tls {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration {
        message: String,
        field: Option<String>,
    },

    /// No live worker is registered under this name
    #[error("Unknown worker: {name}")]
    UnknownWorker { name: String },

    /// Operation needs a link that was never established
    #[error("Not connected: {message}")]
    NotConnected { message: String },

    /// The peer closed the link
    #[error("Connection closed")]
    Closed,

    /// Generic I/O errors
    #[error("I/O error: {message}")]
    Io {
        message: String,
        source: std::io::Error,
    },
}

/// Result type alias for transport operations
pub type Result<T> = std::result::Result<T, TransportError>;

impl TransportError {
    /// Create a connection error
    pub fn connection(message: impl Into<String>, remote_addr: Option<SocketAddr>) -> Self {
        Self::Connection {
            message: message.into(),
            remote_addr,
            source: None,
        }
    }

    /// Create a connection error with source
    pub fn connection_with_source(
        message: impl Into<String>,
        remote_addr: Option<SocketAddr>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Connection {
            message: message.into(),
            remote_addr,
            source: Some(Box::new(source)),
        }
    }

    pub fn handshake(peer: SocketAddr, reason: impl Into<String>) -> Self {
        Self::HandshakeFailure {
            peer,
            reason: reason.into(),
        }
    }

    /// Create a protocol error with source
    pub fn protocol_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Protocol {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn tls_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Tls {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a configuration error
    pub fn configuration(message: impl Into<String>, field: Option<&str>) -> Self {
        Self::Configuration {
            message: message.into(),
            field: field.map(|s| s.to_string()),
        }
    }

    pub fn not_connected(message: impl Into<String>) -> Self {
        Self::NotConnected {
            message: message.into(),
        }
    }

    pub fn io(message: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source,
        }
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            TransportError::Connection { .. } => "connection",
            TransportError::HandshakeFailure { .. } => "handshake",
            TransportError::Protocol { .. } => "protocol",
            TransportError::Tls { .. } => "tls",
            TransportError::Configuration { .. } => "configuration",
            TransportError::UnknownWorker { .. } => "unknown_worker",
            TransportError::NotConnected { .. } => "not_connected",
            TransportError::Closed => "closed",
            TransportError::Io { .. } => "io",
        }
    }
}

impl From<CodecError> for TransportError {
    fn from(err: CodecError) -> Self {
        Self::protocol_with_source("undecodable frame", err)
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for TransportError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        use tokio_tungstenite::tungstenite::Error as WsError;
        match err {
            WsError::ConnectionClosed | WsError::AlreadyClosed => Self::Closed,
            other => Self::connection_with_source("websocket failure", None, other),
        }
    }
}
