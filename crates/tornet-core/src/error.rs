//! Error types for tornet
//!
//! This module defines all error types used throughout the workspace.

use thiserror::Error;

/// Result type alias for tornet operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for tornet
#[derive(Error, Debug)]
pub enum Error {
    /// IP probe errors (HTTP lookup through Tor or directly)
    #[error("IP probe error: {0}")]
    Probe(String),

    /// Control-port errors (connect, protocol, unexpected reply)
    #[error("Control channel error: {0}")]
    Control(String),

    /// Service manager errors (failed systemctl/brew invocation)
    #[error("Service error: {0}")]
    Service(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors (sockets, processes, cookie files)
    #[error("Network error: {0}")]
    Network(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP client errors
    #[error("HTTP error: {0}")]
    Http(String),

    /// Control-port authentication errors
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Operation with no automatable path on this platform
    #[error("Unsupported on {platform}: {message}")]
    Unsupported {
        /// Platform name
        platform: String,
        /// Manual-action guidance
        message: String,
    },

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an IP probe error
    pub fn probe(msg: impl Into<String>) -> Self {
        Self::Probe(msg.into())
    }

    /// Create a control channel error
    pub fn control(msg: impl Into<String>) -> Self {
        Self::Control(msg.into())
    }

    /// Create a service error
    pub fn service(msg: impl Into<String>) -> Self {
        Self::Service(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an HTTP error
    pub fn http(msg: impl Into<String>) -> Self {
        Self::Http(msg.into())
    }

    /// Create an authentication error
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Authentication(msg.into())
    }

    /// Create an unsupported-platform error
    pub fn unsupported(platform: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Unsupported {
            platform: platform.into(),
            message: message.into(),
        }
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
