//! chatbot-client - terminal client for chatbot sessions
//!
//! This library provides the pieces of a chat client that talks to a
//! chatbot server: a REST client for sessions and themes, a WebSocket
//! transport, and a session stream that turns server events into display
//! commands.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - `api`: REST client for session creation, history and theme lookups
//! - `transport`: stream transport traits, URL building and the WebSocket
//!   implementation
//! - `stream`: frame decoding and the session stream state machine
//! - `render`: terminal rendering of display commands
//! - `session`: session identity and auth descriptors
//! - `config`: configuration management and validation
//! - `error`: error types and result aliases
//! - `cli`: command-line interface definition
//! - `commands`: handlers behind each CLI subcommand
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use chatbot_client::stream::SessionStream;
//! use chatbot_client::transport::websocket::WebSocketConnector;
//! use chatbot_client::AuthDescriptor;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let base = url::Url::parse("http://localhost:8000")?;
//!     let mut stream = SessionStream::new(base, Arc::new(WebSocketConnector::new()));
//!     let mut handle = stream.open("session-id", AuthDescriptor::none())?;
//!
//!     while let Some(event) = handle.events.recv().await {
//!         for command in stream.handle(event)? {
//!             println!("{:?}", command);
//!         }
//!     }
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod render;
pub mod session;
pub mod stream;
pub mod transport;

// Re-export commonly used types
pub use api::{ChatbotApi, SessionRecord, ThemeConfig};
pub use config::Config;
pub use error::{ChatbotError, Result};
pub use session::{AuthDescriptor, AuthKind, Session};
pub use stream::{ConnectionState, DisplayCommand, SessionStream};
