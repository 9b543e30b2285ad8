use std::{fmt, time::Duration};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Stable failure categories surfaced to the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// No server address configured; the user should be asked for one.
    ConfigMissing,
    /// The server answered but the RPC path does not exist.
    WrongEndpoint,
    /// Host unknown, connection refused or timed out.
    Unreachable,
    Generic,
    Cancelled,
}

impl ErrorKind {
    pub const fn user_message(self) -> &'static str {
        match self {
            ErrorKind::ConfigMissing => "Enter the server host and port to connect.",
            ErrorKind::WrongEndpoint => {
                "The server was reached, but it does not look like a clicker server. Check the server settings."
            }
            ErrorKind::Unreachable => {
                "Unable to connect to the server. Check the host, port and network connection."
            }
            ErrorKind::Generic => "Error talking to the server.",
            ErrorKind::Cancelled => "The operation was cancelled.",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ErrorKind::ConfigMissing => "config_missing",
            ErrorKind::WrongEndpoint => "wrong_endpoint",
            ErrorKind::Unreachable => "unreachable",
            ErrorKind::Generic => "generic",
            ErrorKind::Cancelled => "cancelled",
        };
        f.write_str(label)
    }
}

/// Failure reported by a `RemoteCall` implementation.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("no server address configured")]
    NotConfigured,
    #[error("HTTP status code: {status}")]
    HttpStatus { status: u16 },
    #[error("connection refused by {endpoint}")]
    ConnectionRefused { endpoint: String },
    #[error("unknown host: {host}")]
    UnknownHost { host: String },
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("remote fault {code}: {message}")]
    Fault { code: i64, message: String },
    #[error("malformed response: {0}")]
    Protocol(String),
    #[error("{0}")]
    Other(String),
}

impl TransportError {
    pub fn kind(&self) -> ErrorKind {
        classify_transport_error(self)
    }
}

pub fn classify_transport_error(err: &TransportError) -> ErrorKind {
    match err {
        TransportError::NotConfigured => ErrorKind::ConfigMissing,
        TransportError::HttpStatus { status: 404 } => ErrorKind::WrongEndpoint,
        TransportError::ConnectionRefused { .. }
        | TransportError::UnknownHost { .. }
        | TransportError::Timeout(_) => ErrorKind::Unreachable,
        TransportError::Other(raw) => classify_raw_error(raw),
        TransportError::HttpStatus { .. }
        | TransportError::Fault { .. }
        | TransportError::Protocol(_) => ErrorKind::Generic,
    }
}

const UNREACHABLE_MARKERS: &[&str] = &[
    "connection refused",
    "hostconnectexception",
    "unknownhostexception",
    "unknown host",
    "failed to lookup address",
    "dns error",
    "timed out",
];

/// Classifies a free-form transport error message.
pub fn classify_raw_error(raw: &str) -> ErrorKind {
    let trimmed = raw.trim_start();
    let lower = trimmed.to_ascii_lowercase();
    if trimmed.starts_with("HTTP status code: 404") || lower.contains("404 not found") {
        return ErrorKind::WrongEndpoint;
    }
    if UNREACHABLE_MARKERS
        .iter()
        .any(|marker| lower.contains(marker))
    {
        return ErrorKind::Unreachable;
    }
    ErrorKind::Generic
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{kind}: {message}")]
pub struct ClickerError {
    pub kind: ErrorKind,
    pub message: String,
}

impl ClickerError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn config_missing() -> Self {
        Self::new(ErrorKind::ConfigMissing, "no server address configured")
    }

    pub fn cancelled(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Cancelled, message)
    }

    pub fn generic(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Generic, message)
    }

    pub fn user_message(&self) -> &'static str {
        self.kind.user_message()
    }
}

impl From<TransportError> for ClickerError {
    fn from(value: TransportError) -> Self {
        Self {
            kind: classify_transport_error(&value),
            message: value.to_string(),
        }
    }
}

#[cfg(test)]
#[path = "tests/error_tests.rs"]
mod tests;
