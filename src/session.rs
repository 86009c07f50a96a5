//! Session identity and authentication descriptors
//!
//! A [`Session`] names one server-tracked conversation and the resource
//! (branch service) it is bound to. The [`AuthDescriptor`] travels with it and
//! decides which headers the REST client sends and whether the stream URL
//! carries a token.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{ChatbotError, Result};

/// Authentication scheme used against the chat server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthKind {
    /// No credentials are sent
    #[default]
    None,
    /// `Authorization: Bearer <token>` on REST calls
    Bearer,
    /// `X-Proxy-Token` on REST calls, `?token=` on the stream
    Proxy,
}

impl AuthKind {
    /// Parse an auth kind from a string (case-insensitive)
    ///
    /// # Errors
    ///
    /// Returns `ChatbotError::Config` for anything other than `none`,
    /// `bearer` or `proxy`.
    ///
    /// # Examples
    ///
    /// ```
    /// use chatbot_client::session::AuthKind;
    ///
    /// assert_eq!(AuthKind::parse_str("Bearer").unwrap(), AuthKind::Bearer);
    /// assert!(AuthKind::parse_str("basic").is_err());
    /// ```
    pub fn parse_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "none" | "" => Ok(AuthKind::None),
            "bearer" => Ok(AuthKind::Bearer),
            "proxy" => Ok(AuthKind::Proxy),
            other => Err(ChatbotError::Config(format!(
                "Invalid auth type: {}. Must be one of: none, bearer, proxy",
                other
            ))
            .into()),
        }
    }
}

impl fmt::Display for AuthKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthKind::None => write!(f, "none"),
            AuthKind::Bearer => write!(f, "bearer"),
            AuthKind::Proxy => write!(f, "proxy"),
        }
    }
}

/// The credential attached to every request for a session
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AuthDescriptor {
    /// Which scheme the token belongs to
    pub kind: AuthKind,
    /// Token value; empty means "no token set"
    pub token: String,
}

impl AuthDescriptor {
    /// Descriptor that sends no credentials
    pub fn none() -> Self {
        Self::default()
    }

    /// Bearer token descriptor
    pub fn bearer(token: impl Into<String>) -> Self {
        Self {
            kind: AuthKind::Bearer,
            token: token.into(),
        }
    }

    /// Proxy token descriptor
    pub fn proxy(token: impl Into<String>) -> Self {
        Self {
            kind: AuthKind::Proxy,
            token: token.into(),
        }
    }

    /// Token to put in the stream URL, if any
    ///
    /// Only proxy auth with a non-empty token authenticates the stream.
    pub fn stream_token(&self) -> Option<&str> {
        match self.kind {
            AuthKind::Proxy if !self.token.is_empty() => Some(&self.token),
            _ => None,
        }
    }

    /// Extra REST headers for this descriptor as `(name, value)` pairs
    pub fn headers(&self) -> Vec<(&'static str, String)> {
        if self.token.is_empty() {
            return Vec::new();
        }
        match self.kind {
            AuthKind::None => Vec::new(),
            AuthKind::Bearer => vec![("Authorization", format!("Bearer {}", self.token))],
            AuthKind::Proxy => vec![("X-Proxy-Token", self.token.clone())],
        }
    }
}

/// A server-tracked chat conversation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Opaque server-assigned identifier
    pub id: String,
    /// Branch service the session is bound to
    pub resource_id: String,
    /// Credential used for this session
    pub auth: AuthDescriptor,
}

impl Session {
    /// Create a session record
    pub fn new(id: impl Into<String>, resource_id: impl Into<String>, auth: AuthDescriptor) -> Self {
        Self {
            id: id.into(),
            resource_id: resource_id.into(),
            auth,
        }
    }

    /// Rebind the session to the resource reported by a session load
    pub fn replace_resource(&mut self, resource_id: impl Into<String>) {
        self.resource_id = resource_id.into();
    }
}
