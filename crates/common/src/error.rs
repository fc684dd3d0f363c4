//! Error types for apiverify

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using apiverify Error
pub type Result<T> = std::result::Result<T, Error>;

/// Why an HTTP exchange failed before any response arrived
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportErrorKind {
    ConnectionRefused,
    Timeout,
    Other,
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportErrorKind::ConnectionRefused => write!(f, "connection refused"),
            TransportErrorKind::Timeout => write!(f, "timeout"),
            TransportErrorKind::Other => write!(f, "transport failure"),
        }
    }
}

/// apiverify error types
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration already installed; it cannot be replaced once scenarios may have read it")]
    ConfigurationReuse,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Missing path parameter `{name}` for path {path}")]
    MissingPathParameter { name: String, path: String },

    #[error("Transport error ({kind}): {message}")]
    Transport {
        kind: TransportErrorKind,
        message: String,
    },

    #[error("Malformed expectation: {0}")]
    MalformedExpectation(String),

    #[error("No branch handles status {status}")]
    UnhandledStatus { status: u16 },

    #[error("Invalid state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    #[error("Suite parse error: {0}")]
    SuiteParse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl Error {
    /// Build a transport error from its kind and the underlying cause
    pub fn transport(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Error::Transport {
            kind,
            message: message.into(),
        }
    }

    /// True when the service could not be reached at all
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Transport { .. })
    }

    /// Transport failure kind, if this is a transport error
    pub fn transport_kind(&self) -> Option<TransportErrorKind> {
        match self {
            Error::Transport { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}
