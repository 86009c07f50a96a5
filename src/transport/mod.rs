//! Stream transport abstraction and implementations
//!
//! This module defines the [`Transport`] and [`Connector`] traits the
//! session stream is written against. Concrete implementations live in
//! submodules:
//!
//! - [`websocket::WebSocketConnector`] -- connects with `tokio-tungstenite`
//!   and runs one background task per connection.
//! - [`fake::FakeConnector`] -- in-process fake used in tests (cfg(test)
//!   only).
//!
//! # Design
//!
//! Connecting never blocks: [`Connector::connect`] returns a transport handle
//! and a channel of [`TransportEvent`]s immediately, and the handshake result
//! arrives later as either [`TransportEvent::Opened`] or
//! [`TransportEvent::Error`] followed by [`TransportEvent::Closed`]. Events
//! are delivered in arrival order and `Closed` is always the last event of a
//! connection.

use std::sync::Arc;

use tokio::sync::mpsc;
use url::Url;

use crate::error::Result;
use crate::session::AuthDescriptor;

/// Close code reported when the connection dropped without a close frame.
pub const ABNORMAL_CLOSE_CODE: u16 = 1006;

/// Lifecycle callback of a stream connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Handshake completed; frames may now be sent
    Opened,
    /// One inbound text frame
    Frame(String),
    /// Network or protocol failure; a `Closed` event follows
    Error(String),
    /// Connection is gone
    Closed {
        /// Close code from the peer, or [`ABNORMAL_CLOSE_CODE`]
        code: u16,
        /// Close reason from the peer (may be empty)
        reason: String,
    },
}

/// Receiving half handed to the owner of a connection.
pub type EventReceiver = mpsc::UnboundedReceiver<TransportEvent>;

/// Write half of an open stream connection
pub trait Transport: Send + Sync + std::fmt::Debug {
    /// Queue one complete text frame for delivery.
    ///
    /// # Errors
    ///
    /// Returns `ChatbotError::Transport` if the connection task is gone.
    fn send(&self, frame: String) -> Result<()>;

    /// Start a graceful close. The `Closed` event arrives on the event
    /// channel once the peer acknowledges. Calling it twice is harmless.
    fn close(&self);
}

/// Factory for stream connections
pub trait Connector: Send + Sync {
    /// Begin connecting to `url` without waiting for the handshake.
    fn connect(&self, url: &Url) -> (Arc<dyn Transport>, EventReceiver);
}

/// Build the stream URL for a session
///
/// The scheme mirrors the base URL's security (`https` becomes `wss`,
/// anything else `ws`), the path is `/api/v1/chatbot/sessions/{id}/`, and a
/// `token` query parameter is added only for proxy auth with a token.
///
/// # Examples
///
/// ```
/// use chatbot_client::session::AuthDescriptor;
/// use chatbot_client::transport::stream_url;
/// use url::Url;
///
/// let base = Url::parse("https://chat.example.com").unwrap();
/// let url = stream_url(&base, "abc", &AuthDescriptor::proxy("t0k")).unwrap();
/// assert_eq!(url.as_str(), "wss://chat.example.com/api/v1/chatbot/sessions/abc/?token=t0k");
/// ```
pub fn stream_url(base: &Url, session_id: &str, auth: &AuthDescriptor) -> Result<Url> {
    let mut url = api_url(base, &["sessions", session_id, ""])?;

    let scheme = if base.scheme() == "https" { "wss" } else { "ws" };
    if url.set_scheme(scheme).is_err() {
        return Err(crate::error::ChatbotError::Config(format!(
            "Cannot derive a stream URL from {}",
            base
        ))
        .into());
    }

    if let Some(token) = auth.stream_token() {
        url.query_pairs_mut().append_pair("token", token);
    }

    Ok(url)
}

/// Join `segments` onto `{base}/api/v1/chatbot/`
///
/// Segments are percent-encoded; a trailing `""` segment yields a trailing
/// slash, which the chat server requires.
pub fn api_url(base: &Url, segments: &[&str]) -> Result<Url> {
    let mut url = base.clone();
    url.set_query(None);
    url.set_fragment(None);
    {
        let mut path = url.path_segments_mut().map_err(|_| {
            crate::error::ChatbotError::Config(format!("{} cannot be used as a base URL", base))
        })?;
        path.pop_if_empty().extend(["api", "v1", "chatbot"]);
        path.extend(segments);
    }
    Ok(url)
}

pub mod websocket;

#[cfg(test)]
pub mod fake;
