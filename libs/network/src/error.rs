//! Transport Error Types
//!
//! Errors raised while connecting, framing and sending over a transport.
//! The same type is handed to observers as the reason for a disconnect.

use courier_codec::CodecError;
use std::net::SocketAddr;
use thiserror::Error;

/// Main transport error type
#[derive(Error, Debug)]
pub enum TransportError {
    /// Network connectivity errors
    #[error("Network error: {message}")]
    Network {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Connection management errors
    #[error("Connection error: {message} (remote: {remote_addr:?})")]
    Connection {
        message: String,
        remote_addr: Option<SocketAddr>,
    },

    /// Framing violations
    #[error("Protocol error: {message}")]
    Protocol { message: String },

    /// Payload could not be encoded
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration {
        message: String,
        field: Option<String>,
    },

    /// Transport timeout errors
    #[error("Timeout error: {operation} exceeded {timeout_ms}ms")]
    Timeout { operation: String, timeout_ms: u64 },

    /// Send attempted with no live connection
    #[error("Not connected")]
    NotConnected,

    /// Connection was closed locally
    #[error("Connection closed")]
    Closed,
}

/// Result type alias for transport operations
pub type Result<T> = std::result::Result<T, TransportError>;

impl TransportError {
    /// Create a network error with source
    pub fn network_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Network {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn connection(message: impl Into<String>, remote_addr: Option<SocketAddr>) -> Self {
        Self::Connection {
            message: message.into(),
            remote_addr,
        }
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>, field: Option<&str>) -> Self {
        Self::Configuration {
            message: message.into(),
            field: field.map(|s| s.to_string()),
        }
    }

    pub fn timeout(operation: impl Into<String>, timeout_ms: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            timeout_ms,
        }
    }

    /// Whether the failure may clear up on a fresh connection
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            TransportError::Network { .. }
                | TransportError::Connection { .. }
                | TransportError::Timeout { .. }
        )
    }

    /// Get error category for metrics
    pub fn category(&self) -> &'static str {
        match self {
            TransportError::Network { .. } => "network",
            TransportError::Connection { .. } => "connection",
            TransportError::Protocol { .. } => "protocol",
            TransportError::Codec(_) => "codec",
            TransportError::Configuration { .. } => "configuration",
            TransportError::Timeout { .. } => "timeout",
            TransportError::NotConnected => "not_connected",
            TransportError::Closed => "closed",
        }
    }
}

// Source errors are not cloneable, so clones keep only the message
impl Clone for TransportError {
    fn clone(&self) -> Self {
        match self {
            TransportError::Network { message, .. } => TransportError::Network {
                message: message.clone(),
                source: None,
            },
            TransportError::Connection {
                message,
                remote_addr,
            } => TransportError::Connection {
                message: message.clone(),
                remote_addr: *remote_addr,
            },
            TransportError::Protocol { message } => TransportError::Protocol {
                message: message.clone(),
            },
            TransportError::Codec(err) => TransportError::Codec(err.clone()),
            TransportError::Configuration { message, field } => TransportError::Configuration {
                message: message.clone(),
                field: field.clone(),
            },
            TransportError::Timeout {
                operation,
                timeout_ms,
            } => TransportError::Timeout {
                operation: operation.clone(),
                timeout_ms: *timeout_ms,
            },
            TransportError::NotConnected => TransportError::NotConnected,
            TransportError::Closed => TransportError::Closed,
        }
    }
}
