//! REST client for the chatbot session API
//!
//! [`ChatbotApi`] wraps the three REST endpoints the client needs:
//!
//! - `POST /api/v1/chatbot/sessions/` -- create a session
//! - `GET /api/v1/chatbot/sessions/{id}/` -- load a session and its history
//! - `GET /api/v1/chatbot/chatbot-config/?branch_service_id={id}` -- theme
//!
//! Every request carries `Content-Type: application/json` plus the auth
//! header chosen by the session's [`AuthDescriptor`].

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use crate::error::{ChatbotError, Result};
use crate::session::AuthDescriptor;
use crate::transport::api_url;

/// Request body for session creation
#[derive(Debug, Clone, Serialize)]
pub struct CreateSessionRequest<'a> {
    /// Always `branch_service`
    pub medium: &'a str,
    /// Branch service the session belongs to
    pub resource_id: &'a str,
    /// Human-readable title
    pub title: &'a str,
}

/// A message from a session's history
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HistoryMessage {
    /// `user` or `assistant`
    pub role: String,
    /// Message text
    #[serde(default)]
    pub content: String,
    /// Creation timestamp as sent by the server
    #[serde(default)]
    pub created_at: Option<String>,
}

/// Session returned by a session load
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SessionRecord {
    /// Branch service the session is bound to
    #[serde(default, deserialize_with = "string_or_number")]
    pub resource_id: String,
    /// Prior messages, oldest first
    #[serde(default)]
    pub messages: Option<Vec<HistoryMessage>>,
}

impl SessionRecord {
    /// History messages, empty when the server sent none
    pub fn history(&self) -> &[HistoryMessage] {
        self.messages.as_deref().unwrap_or_default()
    }
}

/// Chatbot presentation settings for a branch service
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ThemeConfig {
    /// Name shown in the header
    #[serde(default = "default_display_name", deserialize_with = "or_default_name")]
    pub display_name: String,
    /// Greeting shown under the name
    #[serde(default = "default_greeting", deserialize_with = "or_default_greeting")]
    pub greeting_message: String,
    /// Accent color as `#rrggbb`
    #[serde(default = "default_primary_color", deserialize_with = "or_default_color")]
    pub primary_color: String,
    /// Avatar image URL
    #[serde(default)]
    pub avatar: Option<String>,
}

fn default_display_name() -> String {
    "Chatbot".to_string()
}

fn default_greeting() -> String {
    "Hello!".to_string()
}

fn default_primary_color() -> String {
    "#3498db".to_string()
}

impl Default for ThemeConfig {
    fn default() -> Self {
        Self {
            display_name: default_display_name(),
            greeting_message: default_greeting(),
            primary_color: default_primary_color(),
            avatar: None,
        }
    }
}

/// Null or empty strings fall back to the default, like a missing field.
fn non_empty_or<'de, D>(deserializer: D, default: fn() -> String) -> std::result::Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value: Option<String> = Option::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.is_empty()).unwrap_or_else(default))
}

fn or_default_name<'de, D: serde::Deserializer<'de>>(d: D) -> std::result::Result<String, D::Error> {
    non_empty_or(d, default_display_name)
}

fn or_default_greeting<'de, D: serde::Deserializer<'de>>(
    d: D,
) -> std::result::Result<String, D::Error> {
    non_empty_or(d, default_greeting)
}

fn or_default_color<'de, D: serde::Deserializer<'de>>(d: D) -> std::result::Result<String, D::Error> {
    non_empty_or(d, default_primary_color)
}

fn string_or_number<'de, D: serde::Deserializer<'de>>(d: D) -> std::result::Result<String, D::Error> {
    let value = Value::deserialize(d)?;
    Ok(id_to_string(&value).unwrap_or_default())
}

fn id_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Pick the session id out of a creation response
///
/// Servers have used `id`, `sessionId` and `session_id`; they are checked in
/// that order and null or empty values are skipped.
///
/// # Examples
///
/// ```
/// use chatbot_client::api::extract_session_id;
/// use serde_json::json;
///
/// assert_eq!(extract_session_id(&json!({"session_id": "abc"})), Some("abc".to_string()));
/// assert_eq!(extract_session_id(&json!({"id": 7, "session_id": "abc"})), Some("7".to_string()));
/// ```
pub fn extract_session_id(response: &Value) -> Option<String> {
    ["id", "sessionId", "session_id"]
        .iter()
        .find_map(|key| response.get(key).and_then(id_to_string))
}

/// Default title for a new session: `Chat <local date>`
pub fn default_session_title() -> String {
    format!("Chat {}", chrono::Local::now().format("%Y-%m-%d"))
}

/// Client for the chatbot REST API
#[derive(Debug, Clone)]
pub struct ChatbotApi {
    http_client: reqwest::Client,
    base_url: Url,
    auth: AuthDescriptor,
}

impl ChatbotApi {
    /// Construct a client for `base_url`
    ///
    /// No network I/O happens here.
    ///
    /// # Errors
    ///
    /// Returns an error if the auth token is not a valid header value or
    /// the HTTP client cannot be built.
    pub fn new(base_url: Url, auth: AuthDescriptor, timeout: Duration) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        for (name, value) in auth.headers() {
            let value = HeaderValue::from_str(&value).map_err(|_| {
                ChatbotError::Config(format!("{} token contains invalid characters", auth.kind))
            })?;
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| ChatbotError::Config(format!("invalid header {}: {}", name, e)))?;
            headers.insert(name, value);
        }

        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()?;

        Ok(Self {
            http_client,
            base_url,
            auth,
        })
    }

    /// Base URL requests are sent to
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Credential attached to every request
    pub fn auth(&self) -> &AuthDescriptor {
        &self.auth
    }

    /// Create a session for `resource_id` and return its id
    ///
    /// # Errors
    ///
    /// Returns `ChatbotError::Config` without a request when `resource_id`
    /// is blank, `ChatbotError::Http` on a non-2xx response, and
    /// `ChatbotError::Decode` if the response carries no session id.
    pub async fn create_session(&self, resource_id: &str, title: &str) -> Result<String> {
        let resource_id = resource_id.trim();
        if resource_id.is_empty() {
            return Err(
                ChatbotError::Config("Branch Service ID is required.".to_string()).into(),
            );
        }

        let url = api_url(&self.base_url, &["sessions", ""])?;
        tracing::info!("Creating session for branch service {}", resource_id);

        let body = CreateSessionRequest {
            medium: "branch_service",
            resource_id,
            title,
        };
        let response = self.http_client.post(url).json(&body).send().await?;
        let data: Value = read_json(response).await?;
        tracing::debug!("Session creation response: {}", data);

        extract_session_id(&data).ok_or_else(|| {
            ChatbotError::Decode("session creation response has no id".to_string()).into()
        })
    }

    /// Load a session and its message history
    ///
    /// # Errors
    ///
    /// Returns `ChatbotError::Http` on a non-2xx response or a decode error
    /// if the body is not a session.
    pub async fn load_session(&self, session_id: &str) -> Result<SessionRecord> {
        if session_id.trim().is_empty() {
            return Err(ChatbotError::MissingSession.into());
        }

        let url = api_url(&self.base_url, &["sessions", session_id, ""])?;
        tracing::info!("Loading session {}", session_id);

        let response = self.http_client.get(url).send().await?;
        read_json(response).await
    }

    /// Fetch the theme configured for a branch service
    ///
    /// # Errors
    ///
    /// Returns `ChatbotError::Http` on a non-2xx response or a decode error
    /// if the body is not a theme.
    pub async fn fetch_theme(&self, branch_service_id: &str) -> Result<ThemeConfig> {
        let mut url = api_url(&self.base_url, &["chatbot-config", ""])?;
        url.query_pairs_mut()
            .append_pair("branch_service_id", branch_service_id);
        tracing::debug!("Fetching theme for branch service {}", branch_service_id);

        let response = self.http_client.get(url).send().await?;
        read_json(response).await
    }
}

/// Decode a 2xx JSON body, or turn the response into `ChatbotError::Http`.
async fn read_json<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let status = response.status();
    if !status.is_success() {
        let text = response.text().await.unwrap_or_default();
        let body = if text.is_empty() {
            status.canonical_reason().unwrap_or("").to_string()
        } else {
            text
        };
        tracing::warn!("Request failed with HTTP {}", status.as_u16());
        return Err(ChatbotError::Http {
            status: status.as_u16(),
            body,
        }
        .into());
    }

    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes)
        .map_err(|e| ChatbotError::Decode(format!("unexpected response body: {}", e)).into())
}
