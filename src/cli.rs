//! Command-line interface definition for the chatbot client
//!
//! This module defines the CLI structure using clap's derive API. Global
//! flags override the persisted configuration; subcommands cover the
//! interactive chat and the one-shot session/theme lookups.

use clap::{Parser, Subcommand};

/// Chatbot client - stream chat sessions from the terminal
///
/// Creates or loads a session on a chatbot server and streams the
/// assistant's responses over a WebSocket.
#[derive(Parser, Debug, Clone)]
#[command(name = "chatbot-client")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file (defaults to the platform config dir)
    #[arg(short, long)]
    pub config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Override the server URL (e.g. http://localhost:8000)
    #[arg(long)]
    pub server: Option<String>,

    /// Override the auth type
    #[arg(long, value_parser = ["none", "bearer", "proxy"])]
    pub auth_type: Option<String>,

    /// Override the bearer token
    #[arg(long)]
    pub auth_token: Option<String>,

    /// Override the proxy token
    #[arg(long)]
    pub proxy_token: Option<String>,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Start an interactive chat, loading or creating a session
    Chat {
        /// Existing session to load; a new one is created when omitted
        #[arg(short, long)]
        session: Option<String>,

        /// Branch service for a new session (overrides config)
        #[arg(short, long)]
        branch_service: Option<String>,

        /// Title for a new session
        #[arg(short, long)]
        title: Option<String>,
    },

    /// Create a session and print its id
    Create {
        /// Branch service for the session (overrides config)
        #[arg(short, long)]
        branch_service: Option<String>,

        /// Session title
        #[arg(short, long)]
        title: Option<String>,
    },

    /// Print the message history of a session
    Show {
        /// Session id
        #[arg(short, long)]
        session: String,
    },

    /// Print the chatbot theme for a branch service
    Theme {
        /// Branch service id (overrides config)
        #[arg(short, long)]
        branch_service: Option<String>,
    },

    /// Print the effective configuration with tokens masked
    Config,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
