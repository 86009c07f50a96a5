/*!
Command handlers for the CLI

This module provides the handlers invoked by the CLI entrypoint:

- `chat`    -- interactive chat over the session stream
- `session` -- one-shot session creation and history lookup
- `theme`   -- print a branch service's chatbot theme
- `config`  -- print the effective configuration

Handlers build an [`ChatbotApi`] from the loaded [`Config`] and write to
stdout through a [`TerminalRenderer`].
*/

use std::path::Path;
use std::time::Duration;

use crate::api::ChatbotApi;
use crate::config::Config;
use crate::error::{ChatbotError, Result};
use crate::render::TerminalRenderer;

// Special commands parser for interactive chat
pub mod special_commands;

/// REST client configured from `config`
fn build_api(config: &Config) -> Result<ChatbotApi> {
    ChatbotApi::new(
        config.base_url()?,
        config.auth_descriptor(),
        Duration::from_secs(config.client.request_timeout_seconds),
    )
}

/// Branch service from the command line, else from the config file
fn resolve_branch_service(arg: Option<String>, config: &Config) -> Result<String> {
    arg.map(|b| b.trim().to_string())
        .filter(|b| !b.is_empty())
        .or_else(|| {
            let configured = config.branch_service_id.trim();
            (!configured.is_empty()).then(|| configured.to_string())
        })
        .ok_or_else(|| ChatbotError::Config("Branch Service ID is required.".to_string()).into())
}

/// Write the config back; a failure here never aborts the command
fn persist(config: &Config, path: &Path) {
    if let Err(e) = config.save(path) {
        tracing::warn!("Failed to save configuration to {}: {}", path.display(), e);
    }
}

// Chat command handler
pub mod chat {
    //! Interactive chat handler.
    //!
    //! Loads or creates a session, opens the stream, and runs a loop that
    //! multiplexes stream events with lines read by rustyline on a blocking
    //! thread.

    use super::*;
    use std::io::Write;
    use std::sync::Arc;

    use rustyline::error::ReadlineError;
    use rustyline::DefaultEditor;
    use tokio::sync::mpsc;

    use crate::api::{default_session_title, ThemeConfig};
    use crate::commands::special_commands::{parse_special_command, print_help, SpecialCommand};
    use crate::error::AUTH_REJECTED_CLOSE_CODE;
    use crate::stream::{ConnectionState, SessionStream};
    use crate::transport::websocket::WebSocketConnector;
    use crate::transport::{EventReceiver, TransportEvent};

    /// How long to wait for the server to acknowledge a close on exit
    const CLOSE_TIMEOUT: Duration = Duration::from_secs(3);

    const PROMPT: &str = "> ";

    /// What the loop does after one input line
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum LoopControl {
        Continue,
        Exit,
    }

    /// Start interactive chat
    ///
    /// # Arguments
    ///
    /// * `config` - Loaded configuration; updated and saved once the session
    ///   is known
    /// * `config_path` - Where the configuration is persisted
    /// * `session` - Session to load; a new one is created when `None`
    /// * `branch_service` - Branch service override for a new session
    /// * `title` - Title for a new session
    ///
    /// # Errors
    ///
    /// Returns an error if the session cannot be loaded or created, and
    /// `ChatbotError::AuthRejected` if the server closed the stream because
    /// the credentials were rejected.
    pub async fn run_chat(
        mut config: Config,
        config_path: &Path,
        session: Option<String>,
        branch_service: Option<String>,
        title: Option<String>,
    ) -> Result<()> {
        let api = build_api(&config)?;
        let mut renderer = TerminalRenderer::stdout();

        let session = session.filter(|s| !s.trim().is_empty());
        let (session_id, resource_id, history) = match session {
            Some(session_id) => {
                let record = api.load_session(&session_id).await?;
                if !record.resource_id.is_empty() {
                    config.branch_service_id = record.resource_id.clone();
                }
                let history = record.history().to_vec();
                (session_id, record.resource_id, history)
            }
            None => {
                let branch = resolve_branch_service(branch_service, &config)?;
                let title = title.unwrap_or_else(default_session_title);
                let session_id = api.create_session(&branch, &title).await?;
                config.branch_service_id = branch.clone();
                (session_id, branch, Vec::new())
            }
        };
        persist(&config, config_path);

        let theme = if resource_id.is_empty() {
            ThemeConfig::default()
        } else {
            match api.fetch_theme(&resource_id).await {
                Ok(theme) => theme,
                Err(e) => {
                    tracing::warn!("Failed to load chatbot config: {}", e);
                    ThemeConfig::default()
                }
            }
        };
        renderer.render_theme(&theme)?;
        renderer.render_history(&history)?;

        let mut stream = SessionStream::new(
            api.base_url().clone(),
            Arc::new(WebSocketConnector::new()),
        );
        let handle = stream.open(&session_id, api.auth().clone())?;
        stream.set_resource(&resource_id);
        renderer.system(&format!("Connecting to session {}...", session_id))?;

        let mut events = handle.events;
        let mut input = spawn_input_reader();

        loop {
            tokio::select! {
                event = events.recv() => {
                    let Some(event) = event else { break };
                    let closed = matches!(event, TransportEvent::Closed { .. });
                    render_event(&mut stream, &mut renderer, event)?;
                    if closed {
                        break;
                    }
                }
                line = input.recv() => {
                    let control = match line {
                        Some(line) => handle_input(&line, &mut stream, &mut renderer)?,
                        None => LoopControl::Exit,
                    };
                    if control == LoopControl::Exit {
                        stream.close();
                        wait_for_close(&mut stream, &mut events, &mut renderer).await?;
                        break;
                    }
                }
            }
        }

        if let Some((code, reason)) = stream.last_close() {
            if code == AUTH_REJECTED_CLOSE_CODE {
                let reason = if reason.is_empty() {
                    "Invalid proxy token"
                } else {
                    reason
                };
                return Err(ChatbotError::AuthRejected(reason.to_string()).into());
            }
        }

        println!("Goodbye!");
        Ok(())
    }

    /// Handle one line typed by the user
    ///
    /// # Errors
    ///
    /// Returns only renderer write errors; send failures are shown as
    /// system messages.
    pub fn handle_input<W: Write>(
        line: &str,
        stream: &mut SessionStream,
        renderer: &mut TerminalRenderer<W>,
    ) -> Result<LoopControl> {
        match parse_special_command(line) {
            Err(e) => renderer.system(&e.to_string())?,
            Ok(SpecialCommand::Help) => print_help(),
            Ok(SpecialCommand::ShowStatus) => render_status(stream, renderer)?,
            Ok(SpecialCommand::Recommendations) => renderer.show_recommendations()?,
            Ok(SpecialCommand::Query) => renderer.show_query()?,
            Ok(SpecialCommand::Exit) => return Ok(LoopControl::Exit),
            Ok(SpecialCommand::None) => {
                // Input stays closed until the renderer has seen `Ready`
                let sent = if renderer.input_enabled() || line.trim().is_empty() {
                    stream.send(line)
                } else {
                    Err(ChatbotError::NotConnected.into())
                };
                if let Err(e) = sent {
                    renderer.system(&send_error_message(&e, stream.state()))?;
                }
            }
        }
        Ok(LoopControl::Continue)
    }

    /// Text shown when a message could not be sent
    fn send_error_message(err: &anyhow::Error, state: ConnectionState) -> String {
        match err.downcast_ref::<ChatbotError>() {
            Some(ChatbotError::EmptyMessage) => "Message cannot be empty.".to_string(),
            Some(ChatbotError::NotConnected) if state == ConnectionState::Connecting => {
                "WebSocket is not ready. Please wait.".to_string()
            }
            Some(ChatbotError::NotConnected) => "WebSocket is not connected.".to_string(),
            _ => format!("Failed to send message: {}", err),
        }
    }

    fn render_status<W: Write>(
        stream: &SessionStream,
        renderer: &mut TerminalRenderer<W>,
    ) -> Result<()> {
        renderer.system(&format!("Status:         {}", stream.state()))?;
        if let Some(session) = stream.session() {
            renderer.system(&format!("Session:        {}", session.id))?;
            renderer.system(&format!("Branch service: {}", session.resource_id))?;
            renderer.system(&format!("Auth:           {}", session.auth.kind))?;
        }
        Ok(())
    }

    /// Feed one transport event to the stream and render the result
    fn render_event<W: Write>(
        stream: &mut SessionStream,
        renderer: &mut TerminalRenderer<W>,
        event: TransportEvent,
    ) -> Result<()> {
        match stream.handle(event) {
            Ok(commands) => renderer.render_all(&commands)?,
            Err(e) => {
                tracing::warn!("Ignoring malformed frame: {}", e);
                renderer.system(&format!("Error: {}", e))?;
            }
        }
        Ok(())
    }

    /// Drain events until the close is acknowledged or the timeout expires
    async fn wait_for_close<W: Write>(
        stream: &mut SessionStream,
        events: &mut EventReceiver,
        renderer: &mut TerminalRenderer<W>,
    ) -> Result<()> {
        if stream.state() == ConnectionState::Disconnected {
            return Ok(());
        }

        let drain = async {
            while let Some(event) = events.recv().await {
                let closed = matches!(event, TransportEvent::Closed { .. });
                render_event(stream, renderer, event)?;
                if closed {
                    break;
                }
            }
            Ok::<(), anyhow::Error>(())
        };

        match tokio::time::timeout(CLOSE_TIMEOUT, drain).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!("Server did not acknowledge close within {:?}", CLOSE_TIMEOUT);
                Ok(())
            }
        }
    }

    /// Read lines on a dedicated thread; the channel closes on Ctrl-C/Ctrl-D
    fn spawn_input_reader() -> mpsc::UnboundedReceiver<String> {
        let (tx, rx) = mpsc::unbounded_channel();
        std::thread::spawn(move || {
            let mut editor = match DefaultEditor::new() {
                Ok(editor) => editor,
                Err(e) => {
                    tracing::warn!("Cannot read from terminal: {}", e);
                    return;
                }
            };
            loop {
                match editor.readline(PROMPT) {
                    Ok(line) => {
                        let _ = editor.add_history_entry(line.as_str());
                        if tx.send(line).is_err() {
                            break;
                        }
                    }
                    Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
                    Err(e) => {
                        tracing::warn!("Input error: {}", e);
                        break;
                    }
                }
            }
        });
        rx
    }

}

// Session command handlers
pub mod session {
    //! One-shot session commands: `create` and `show`.

    use super::*;
    use crate::api::default_session_title;

    /// Create a session, print its id, and remember the branch service
    ///
    /// # Errors
    ///
    /// Returns an error if no branch service is known or the request fails.
    pub async fn run_create(
        mut config: Config,
        config_path: &Path,
        branch_service: Option<String>,
        title: Option<String>,
    ) -> Result<()> {
        let branch = resolve_branch_service(branch_service, &config)?;
        let title = title.unwrap_or_else(default_session_title);

        let api = build_api(&config)?;
        let session_id = api.create_session(&branch, &title).await?;
        println!("{}", session_id);

        config.branch_service_id = branch;
        persist(&config, config_path);
        Ok(())
    }

    /// Print the message history of a session
    ///
    /// # Errors
    ///
    /// Returns an error if the session cannot be loaded.
    pub async fn run_show(config: Config, session_id: &str) -> Result<()> {
        let api = build_api(&config)?;
        let record = api.load_session(session_id).await?;

        let mut renderer = TerminalRenderer::stdout();
        if !record.resource_id.is_empty() {
            renderer.system(&format!("Branch service: {}", record.resource_id))?;
        }
        if record.history().is_empty() {
            renderer.system("No messages yet.")?;
        } else {
            renderer.render_history(record.history())?;
        }
        Ok(())
    }
}

// Theme command handler
pub mod theme {
    //! Print the chatbot theme of a branch service.

    use super::*;

    /// Fetch and print the theme
    ///
    /// # Errors
    ///
    /// Returns an error if no branch service is known or the request fails.
    pub async fn run_theme(config: Config, branch_service: Option<String>) -> Result<()> {
        let branch = resolve_branch_service(branch_service, &config)?;
        let api = build_api(&config)?;
        let theme = api.fetch_theme(&branch).await?;

        let mut renderer = TerminalRenderer::stdout();
        renderer.render_theme(&theme)?;
        println!("primary_color: {}", theme.primary_color);
        Ok(())
    }
}

// Config command handler
pub mod config {
    //! Print the effective configuration.

    use super::*;

    /// Print `config` as YAML with tokens masked
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be serialized.
    pub fn show_config(config: &Config, config_path: &Path) -> Result<()> {
        println!("# {}", config_path.display());
        print!("{}", serde_yaml::to_string(&config.redacted())?);
        Ok(())
    }
}
