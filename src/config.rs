//! Configuration management for the chatbot client
//!
//! This module handles loading, parsing, validating, and persisting
//! configuration from files, environment variables, and CLI overrides.
//! The persisted file plays the role of the browser client's local storage:
//! it is read at startup and rewritten after a session is created or loaded.

use crate::error::{ChatbotError, Result};
use crate::session::{AuthDescriptor, AuthKind};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

/// Main configuration structure for the chatbot client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the chat server (`http://host:port`)
    #[serde(default = "default_server_url")]
    pub server_url: String,

    /// Authentication settings
    #[serde(default)]
    pub auth: AuthConfig,

    /// Branch service that new sessions are created for
    #[serde(default)]
    pub branch_service_id: String,

    /// HTTP client behavior
    #[serde(default)]
    pub client: ClientConfig,
}

fn default_server_url() -> String {
    "http://localhost:8000".to_string()
}

/// Authentication configuration
///
/// Both tokens are kept so switching `auth_type` does not lose the other one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Which scheme to use
    #[serde(default)]
    pub auth_type: AuthKind,

    /// Token sent as `Authorization: Bearer` when `auth_type` is bearer
    #[serde(default)]
    pub auth_token: String,

    /// Token sent as `X-Proxy-Token` / `?token=` when `auth_type` is proxy
    #[serde(default)]
    pub proxy_token: String,
}

/// HTTP client configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Timeout for each REST request (seconds)
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
}

fn default_request_timeout() -> u64 {
    30
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            request_timeout_seconds: default_request_timeout(),
        }
    }
}

/// Normalize a user-supplied server URL
///
/// Trims whitespace, defaults the scheme to `http://`, and strips a single
/// trailing slash. An empty input yields the default server URL.
///
/// # Examples
///
/// ```
/// use chatbot_client::config::normalize_server_url;
///
/// assert_eq!(normalize_server_url("example.com:8000/"), "http://example.com:8000");
/// assert_eq!(normalize_server_url("https://chat.example.com"), "https://chat.example.com");
/// ```
pub fn normalize_server_url(url: &str) -> String {
    let trimmed = url.trim();
    if trimmed.is_empty() {
        return default_server_url();
    }

    let with_scheme = if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("http://{}", trimmed)
    };

    match with_scheme.strip_suffix('/') {
        Some(stripped) => stripped.to_string(),
        None => with_scheme,
    }
}

/// Default location of the persisted configuration file
///
/// Uses the platform config directory (e.g. `~/.config/chatbot-client/`)
/// and falls back to `config.yaml` in the working directory.
pub fn default_config_path() -> PathBuf {
    directories::ProjectDirs::from("", "", "chatbot-client")
        .map(|dirs| dirs.config_dir().join("config.yaml"))
        .unwrap_or_else(|| PathBuf::from("config.yaml"))
}

impl Config {
    /// Load configuration from file, environment, and CLI
    ///
    /// Precedence is CLI over environment over file over defaults. A missing
    /// file is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path, cli: &crate::cli::Cli) -> Result<Self> {
        let mut config = if path.exists() {
            Self::from_file(path)?
        } else {
            tracing::debug!("Config file not found at {}, using defaults", path.display());
            Self::default()
        };

        config.apply_env_vars();
        config.apply_cli_overrides(cli);

        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents)?;
        Ok(config)
    }

    fn apply_env_vars(&mut self) {
        if let Ok(server_url) = std::env::var("CHATBOT_SERVER_URL") {
            self.server_url = server_url;
        }

        if let Ok(auth_type) = std::env::var("CHATBOT_AUTH_TYPE") {
            match AuthKind::parse_str(&auth_type) {
                Ok(kind) => self.auth.auth_type = kind,
                Err(_) => tracing::warn!("Invalid CHATBOT_AUTH_TYPE: {}", auth_type),
            }
        }

        if let Ok(token) = std::env::var("CHATBOT_AUTH_TOKEN") {
            self.auth.auth_token = token;
        }

        if let Ok(token) = std::env::var("CHATBOT_PROXY_TOKEN") {
            self.auth.proxy_token = token;
        }

        if let Ok(branch) = std::env::var("CHATBOT_BRANCH_SERVICE_ID") {
            self.branch_service_id = branch;
        }

        if let Ok(timeout) = std::env::var("CHATBOT_REQUEST_TIMEOUT_SECONDS") {
            if let Ok(value) = timeout.parse() {
                self.client.request_timeout_seconds = value;
            } else {
                tracing::warn!("Invalid CHATBOT_REQUEST_TIMEOUT_SECONDS: {}", timeout);
            }
        }
    }

    fn apply_cli_overrides(&mut self, cli: &crate::cli::Cli) {
        if let Some(server) = &cli.server {
            self.server_url = server.clone();
        }

        if let Some(auth_type) = &cli.auth_type {
            match AuthKind::parse_str(auth_type) {
                Ok(kind) => self.auth.auth_type = kind,
                Err(_) => tracing::warn!("Invalid --auth-type: {}", auth_type),
            }
        }

        if let Some(token) = &cli.auth_token {
            self.auth.auth_token = token.clone();
        }

        if let Some(token) = &cli.proxy_token {
            self.auth.proxy_token = token.clone();
        }

        self.server_url = normalize_server_url(&self.server_url);
    }

    /// Validate configuration
    ///
    /// # Errors
    ///
    /// Returns `ChatbotError::Config` if the server URL is not a valid
    /// http(s) URL or the request timeout is zero.
    pub fn validate(&self) -> Result<()> {
        let url = self.base_url()?;
        if url.host_str().is_none() {
            return Err(ChatbotError::Config("server_url must include a host".to_string()).into());
        }

        if self.client.request_timeout_seconds == 0 {
            return Err(ChatbotError::Config(
                "client.request_timeout_seconds must be greater than 0".to_string(),
            )
            .into());
        }

        if self.auth.auth_type == AuthKind::Bearer && self.auth.auth_token.is_empty() {
            tracing::warn!("auth_type is bearer but no auth_token is set");
        }

        Ok(())
    }

    /// Parsed, normalized server base URL
    ///
    /// # Errors
    ///
    /// Returns `ChatbotError::Config` if the URL cannot be parsed.
    pub fn base_url(&self) -> Result<Url> {
        let normalized = normalize_server_url(&self.server_url);
        Url::parse(&normalized).map_err(|e| {
            ChatbotError::Config(format!("Invalid server_url '{}': {}", normalized, e)).into()
        })
    }

    /// Credential for the configured auth type
    pub fn auth_descriptor(&self) -> AuthDescriptor {
        match self.auth.auth_type {
            AuthKind::None => AuthDescriptor::none(),
            AuthKind::Bearer => AuthDescriptor::bearer(self.auth.auth_token.clone()),
            AuthKind::Proxy => AuthDescriptor::proxy(self.auth.proxy_token.clone()),
        }
    }

    /// Persist configuration as YAML, creating parent directories
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or file cannot be written.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        tracing::debug!("Saved configuration to {}", path.display());
        Ok(())
    }

    /// Copy of this config with tokens masked, for display
    pub fn redacted(&self) -> Self {
        let mask = |token: &str| {
            if token.is_empty() {
                String::new()
            } else {
                "********".to_string()
            }
        };
        let mut config = self.clone();
        config.auth.auth_token = mask(&self.auth.auth_token);
        config.auth.proxy_token = mask(&self.auth.proxy_token);
        config
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            auth: AuthConfig::default(),
            branch_service_id: String::new(),
            client: ClientConfig::default(),
        }
    }
}
