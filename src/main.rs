//! chatbot-client - terminal client for chatbot sessions
//!
#![doc = "chatbot-client - terminal client for chatbot sessions"]
#![doc = "Main entry point for the chatbot client application."]

use std::path::PathBuf;

use anyhow::Result;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use chatbot_client::cli::{Cli, Commands};
use chatbot_client::commands;
use chatbot_client::config::{default_config_path, Config};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse_args();

    init_tracing(cli.verbose);

    // Load configuration
    let config_path = cli
        .config
        .as_deref()
        .map(PathBuf::from)
        .unwrap_or_else(default_config_path);
    let config = Config::load(&config_path, &cli)?;

    // Validate configuration
    config.validate()?;

    match cli.command {
        Commands::Chat {
            session,
            branch_service,
            title,
        } => {
            tracing::info!("Starting interactive chat");
            if let Some(s) = &session {
                tracing::debug!("Loading session: {}", s);
            }
            commands::chat::run_chat(config, &config_path, session, branch_service, title).await
        }
        Commands::Create {
            branch_service,
            title,
        } => {
            tracing::info!("Creating session");
            commands::session::run_create(config, &config_path, branch_service, title).await
        }
        Commands::Show { session } => commands::session::run_show(config, &session).await,
        Commands::Theme { branch_service } => {
            commands::theme::run_theme(config, branch_service).await
        }
        Commands::Config => commands::config::show_config(&config, &config_path),
    }
}

/// Initialize tracing subscriber with environment filter
///
/// Logs go to stderr so they do not interleave with chat output.
fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "chatbot_client=debug"
    } else {
        "chatbot_client=warn"
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
