//! Display commands emitted by the session stream
//!
//! The stream never renders anything itself. It returns these commands and
//! leaves it to a renderer (see [`crate::render`]) to put them on screen.

use serde_json::Value;
use std::fmt;

/// Connection lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No connection; initial and terminal state
    #[default]
    Disconnected,
    /// Handshake in progress
    Connecting,
    /// Frames may be sent and received
    Connected,
    /// The transport reported an error; a close follows
    Errored,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "Disconnected"),
            ConnectionState::Connecting => write!(f, "Connecting..."),
            ConnectionState::Connected => write!(f, "Connected"),
            ConnectionState::Errored => write!(f, "Error"),
        }
    }
}

/// Author of a displayed message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    /// Map a server role string; anything that is not `user` is the assistant
    pub fn from_wire(role: &str) -> Self {
        if role.eq_ignore_ascii_case("user") {
            Role::User
        } else {
            Role::Assistant
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// One UI-facing instruction
#[derive(Debug, Clone, PartialEq)]
pub enum DisplayCommand {
    /// Connection status changed
    Status(ConnectionState),
    /// Connection is open; enable input
    Ready,
    /// Disable input
    DisableInput,
    /// Informational line from the client itself
    System(String),
    /// A complete message
    Message {
        role: Role,
        text: String,
        timestamp: Option<String>,
    },
    /// Start a new, empty assistant message
    NewAssistantMessage,
    /// Replace the current assistant message's text with the full draft
    UpdateAssistantMessage(String),
    /// The current assistant message is final
    AssistantMessageComplete(String),
    /// Recommended items for this turn
    Recommendations(Vec<Value>),
    /// Link to the query execution behind the recommendations
    QueryLink(Value),
    /// Suggested follow-up question
    Suggestion(String),
    /// Clear the input line
    ClearInput,
    /// Error reported by the server
    Error(String),
    /// Error reported by the transport
    ConnectionError(String),
    /// Stream authentication was rejected
    AuthFailed(String),
    /// Stream is gone
    Disconnected,
}
