//! Error types for the device capability client

use thiserror::Error;

use crate::protocol::ERROR_TAG_EXCEPTION;

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, Error>;

/// Tag used for non-2xx statuses without a dedicated message
pub const ERROR_TAG_UNEXPECTED: &str = "The remote service returned an unexpected response";

/// Errors that can occur in the capability client
///
/// Only [`Error::Config`] escapes the public lookup surface. Every other
/// variant is folded into the `errors` map of a degraded
/// [`DeviceRecord`](crate::DeviceRecord) via [`Error::to_error_entry`].
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error (bad API key, empty server pool, unreadable config)
    #[error("configuration error: {0}")]
    Config(String),

    /// Remote payload could not be decoded
    #[error("malformed response: {0}")]
    Protocol(String),

    /// No response at all: connect failure, read timeout, broken body
    #[error("transport error: {0}")]
    Transport(String),

    /// Remote service answered with a non-2xx status
    #[error("remote rejected request: {status} {reason}")]
    RemoteRejection {
        /// HTTP status code
        status: u16,
        /// Canonical reason phrase for the status
        reason: String,
    },

    /// HTTP client error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Map a runtime failure to the `(tag, message)` pair stored on a degraded record
    #[must_use]
    pub fn to_error_entry(&self) -> (String, String) {
        match self {
            Self::RemoteRejection { status, reason } => match status {
                401 => (ERROR_TAG_EXCEPTION.to_string(), "Invalid API key".to_string()),
                402 => (
                    ERROR_TAG_EXCEPTION.to_string(),
                    "No API key was provided".to_string(),
                ),
                403 => (
                    ERROR_TAG_EXCEPTION.to_string(),
                    "API key is expired or revoked".to_string(),
                ),
                _ => (ERROR_TAG_UNEXPECTED.to_string(), format!("{status}: {reason}")),
            },
            Self::Protocol(_) | Self::Serialization(_) => {
                (ERROR_TAG_EXCEPTION.to_string(), "malformed response".to_string())
            }
            _ if self.is_transport() => (ERROR_TAG_EXCEPTION.to_string(), "Timeout".to_string()),
            other => (ERROR_TAG_EXCEPTION.to_string(), other.to_string()),
        }
    }

    /// Whether the failure happened before any HTTP response was received
    #[must_use]
    pub fn is_transport(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Http(e) => e.is_timeout() || e.is_connect() || e.is_request() || e.is_body(),
            _ => false,
        }
    }
}
