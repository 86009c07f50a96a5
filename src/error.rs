//! Error types for the chatbot client
//!
//! This module defines all error types used throughout the client,
//! using `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Close code the server uses to reject a proxy token on the stream.
pub const AUTH_REJECTED_CLOSE_CODE: u16 = 4001;

/// Main error type for chatbot client operations
///
/// Every variant is recoverable: callers render it as a system message and
/// leave the session in a state the user can retry from.
#[derive(Error, Debug)]
pub enum ChatbotError {
    /// A stream connection was requested without a session id
    #[error("Session ID is required to connect")]
    MissingSession,

    /// The user tried to send a blank message
    #[error("Message cannot be empty")]
    EmptyMessage,

    /// A message was sent while the stream is not connected
    #[error("WebSocket is not connected")]
    NotConnected,

    /// Network or protocol failure reported by the transport
    #[error("Transport error: {0}")]
    Transport(String),

    /// An inbound frame or response body could not be decoded
    #[error("Decode error: {0}")]
    Decode(String),

    /// A REST call returned a non-2xx status
    #[error("HTTP {status}: {body}")]
    Http {
        /// Response status code
        status: u16,
        /// Response body, or the status reason when the body was empty
        body: String,
    },

    /// The server closed the stream with the proxy-auth rejection code
    #[error("WebSocket authentication failed: {0}")]
    AuthRejected(String),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP request errors
    #[error("Request error: {0}")]
    Request(#[from] reqwest::Error),

    /// URL parsing errors
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

/// Result type alias for chatbot client operations
///
/// Uses `anyhow::Error` so call sites can attach context; match on a
/// specific kind with `err.downcast_ref::<ChatbotError>()`.
pub type Result<T> = anyhow::Result<T>;
