//! Terminal rendering of display commands
//!
//! [`TerminalRenderer`] is the only consumer of [`DisplayCommand`]s in the
//! binary. It writes to any `io::Write` so tests can capture output in a
//! `Vec<u8>`.
//!
//! A terminal cannot rewrite a line that has scrolled away, so streamed
//! assistant text is printed incrementally: each `UpdateAssistantMessage`
//! carries the full draft and only the part not yet printed is written.

use std::io::{self, Write};

use chrono::{DateTime, Local, NaiveDateTime, TimeZone};
use colored::Colorize;
use serde_json::Value;

use crate::api::{HistoryMessage, ThemeConfig};
use crate::stream::{ConnectionState, DisplayCommand, Role};

/// Renders display commands as colored terminal text
#[derive(Debug)]
pub struct TerminalRenderer<W: Write> {
    out: W,
    status: ConnectionState,
    input_enabled: bool,
    assistant_open: bool,
    printed: String,
    recommendations: Option<Vec<Value>>,
    query_execution: Option<Value>,
    accent: (u8, u8, u8),
}

impl TerminalRenderer<io::Stdout> {
    /// Renderer writing to standard output
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> TerminalRenderer<W> {
    /// Renderer writing to `out`
    pub fn new(out: W) -> Self {
        Self {
            out,
            status: ConnectionState::Disconnected,
            input_enabled: false,
            assistant_open: false,
            printed: String::new(),
            recommendations: None,
            query_execution: None,
            accent: parse_hex_color("#3498db").unwrap_or((52, 152, 219)),
        }
    }

    /// Last connection status shown
    pub fn status(&self) -> ConnectionState {
        self.status
    }

    /// Whether the stream has enabled input
    pub fn input_enabled(&self) -> bool {
        self.input_enabled
    }

    /// Consume the renderer and return the writer
    pub fn into_inner(self) -> W {
        self.out
    }

    /// Render a batch of commands in order
    ///
    /// # Errors
    ///
    /// Returns any error from the underlying writer.
    pub fn render_all(&mut self, commands: &[DisplayCommand]) -> io::Result<()> {
        for command in commands {
            self.render(command)?;
        }
        self.out.flush()
    }

    /// Render one command
    ///
    /// # Errors
    ///
    /// Returns any error from the underlying writer.
    pub fn render(&mut self, command: &DisplayCommand) -> io::Result<()> {
        match command {
            DisplayCommand::Status(state) => {
                self.status = *state;
                tracing::debug!("Status: {}", state);
                Ok(())
            }
            DisplayCommand::Ready => {
                self.input_enabled = true;
                Ok(())
            }
            DisplayCommand::DisableInput => {
                self.input_enabled = false;
                Ok(())
            }
            DisplayCommand::System(text) => self.system(text),
            DisplayCommand::Message {
                role,
                text,
                timestamp,
            } => self.message(*role, text, timestamp.as_deref()),
            DisplayCommand::NewAssistantMessage => {
                self.end_assistant()?;
                let label = self.assistant_label();
                write!(self.out, "{} ", label)?;
                self.assistant_open = true;
                self.printed.clear();
                Ok(())
            }
            DisplayCommand::UpdateAssistantMessage(text) => self.update_assistant(text),
            DisplayCommand::AssistantMessageComplete(text) => {
                self.update_assistant(text)?;
                self.end_assistant()
            }
            DisplayCommand::Recommendations(items) => {
                self.end_assistant()?;
                self.recommendations = Some(items.clone());
                writeln!(
                    self.out,
                    "  {}",
                    format!("View Recommendations ({})  /recommendations", items.len()).cyan()
                )
            }
            DisplayCommand::QueryLink(query) => {
                self.end_assistant()?;
                self.query_execution = Some(query.clone());
                writeln!(self.out, "  {}", "View Query Data  /query".cyan())
            }
            DisplayCommand::Suggestion(text) => {
                self.end_assistant()?;
                writeln!(self.out, "  {}", format!("Suggested: {}", text).yellow())
            }
            DisplayCommand::ClearInput => self.out.flush(),
            DisplayCommand::Error(message) => self.system(&format!("Error: {}", message)),
            DisplayCommand::ConnectionError(message) => {
                self.end_assistant()?;
                writeln!(self.out, "{}", message.red())
            }
            DisplayCommand::AuthFailed(reason) => {
                self.end_assistant()?;
                writeln!(
                    self.out,
                    "{}",
                    format!("WebSocket authentication failed: {}", reason).red().bold()
                )
            }
            DisplayCommand::Disconnected => self.system("WebSocket disconnected."),
        }
    }

    /// Print an informational line
    ///
    /// # Errors
    ///
    /// Returns any error from the underlying writer.
    pub fn system(&mut self, text: &str) -> io::Result<()> {
        self.end_assistant()?;
        writeln!(self.out, "{}", text.dimmed())
    }

    /// Print the chatbot header for a theme
    ///
    /// # Errors
    ///
    /// Returns any error from the underlying writer.
    pub fn render_theme(&mut self, theme: &ThemeConfig) -> io::Result<()> {
        if let Some(accent) = parse_hex_color(&theme.primary_color) {
            self.accent = accent;
        }
        let (r, g, b) = self.accent;
        writeln!(self.out, "{}", theme.display_name.truecolor(r, g, b).bold())?;
        writeln!(self.out, "{}", theme.greeting_message)?;
        if let Some(avatar) = &theme.avatar {
            writeln!(self.out, "{}", format!("avatar: {}", avatar).dimmed())?;
        }
        writeln!(self.out)
    }

    /// Print the messages of a loaded session
    ///
    /// # Errors
    ///
    /// Returns any error from the underlying writer.
    pub fn render_history(&mut self, messages: &[HistoryMessage]) -> io::Result<()> {
        for message in messages {
            self.message(
                Role::from_wire(&message.role),
                &message.content,
                message.created_at.as_deref(),
            )?;
        }
        self.out.flush()
    }

    /// Print the details of the last recommendations
    ///
    /// # Errors
    ///
    /// Returns any error from the underlying writer.
    pub fn show_recommendations(&mut self) -> io::Result<()> {
        let Some(items) = self.recommendations.clone() else {
            return self.system("No recommendations yet.");
        };

        writeln!(self.out, "{}", "Recommendations".bold())?;
        for item in &items {
            let title = item
                .get("name")
                .or_else(|| item.get("type"))
                .map(value_text)
                .unwrap_or_default();
            let reason = item
                .get("reason")
                .map(value_text)
                .filter(|r| !r.is_empty())
                .unwrap_or_else(|| "Recommended for you".to_string());
            let details = item.get("metadata").unwrap_or(item);

            writeln!(self.out, "- {}", title.bold())?;
            writeln!(self.out, "  {}", reason)?;
            writeln!(self.out, "{}", indent(&pretty(details), 4))?;
        }
        self.out.flush()
    }

    /// Print the details of the last query execution
    ///
    /// # Errors
    ///
    /// Returns any error from the underlying writer.
    pub fn show_query(&mut self) -> io::Result<()> {
        let Some(query) = self.query_execution.clone() else {
            return self.system("No query data for this turn.");
        };

        let field = |key: &str| query.get(key).map(value_text).unwrap_or_default();
        writeln!(self.out, "{} {}", "Query Type:".bold(), field("query_type"))?;
        writeln!(self.out, "{} {}", "Results Count:".bold(), field("result_count"))?;
        writeln!(self.out, "{}", indent(&pretty(&query), 2))?;
        self.out.flush()
    }

    fn message(&mut self, role: Role, text: &str, timestamp: Option<&str>) -> io::Result<()> {
        self.end_assistant()?;
        let label = match role {
            Role::User => "you>".green().bold().to_string(),
            Role::Assistant => self.assistant_label(),
        };
        writeln!(
            self.out,
            "{} {} {}",
            format_timestamp(timestamp).dimmed(),
            label,
            text
        )
    }

    fn update_assistant(&mut self, text: &str) -> io::Result<()> {
        let label = self.assistant_label();
        if !self.assistant_open {
            write!(self.out, "{} ", label)?;
            self.assistant_open = true;
            self.printed.clear();
        }

        match text.strip_prefix(self.printed.as_str()) {
            Some(delta) => write!(self.out, "{}", delta)?,
            None => {
                // Draft diverged from what is on screen; reprint it whole.
                writeln!(self.out)?;
                write!(self.out, "{} {}", label, text)?;
            }
        }
        self.printed.clear();
        self.printed.push_str(text);
        self.out.flush()
    }

    fn end_assistant(&mut self) -> io::Result<()> {
        if self.assistant_open {
            writeln!(self.out)?;
            self.assistant_open = false;
            self.printed.clear();
        }
        Ok(())
    }

    fn assistant_label(&self) -> String {
        let (r, g, b) = self.accent;
        "bot>".truecolor(r, g, b).bold().to_string()
    }
}

/// Format a server timestamp as local `HH:MM:SS`
///
/// Accepts RFC 3339 and naive ISO 8601 (read as local time); anything else
/// shows the current time.
pub fn format_timestamp(timestamp: Option<&str>) -> String {
    let parsed: Option<DateTime<Local>> = timestamp.and_then(|ts| {
        DateTime::parse_from_rfc3339(ts)
            .map(|dt| dt.with_timezone(&Local))
            .ok()
            .or_else(|| {
                NaiveDateTime::parse_from_str(ts, "%Y-%m-%dT%H:%M:%S%.f")
                    .ok()
                    .and_then(|naive| Local.from_local_datetime(&naive).single())
            })
    });
    parsed
        .unwrap_or_else(Local::now)
        .format("%H:%M:%S")
        .to_string()
}

/// Parse `#rrggbb` (or `rrggbb`) into an RGB triple
pub fn parse_hex_color(color: &str) -> Option<(u8, u8, u8)> {
    let hex = color.trim().trim_start_matches('#');
    if hex.len() != 6 || !hex.is_ascii() {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    Some((channel(0)?, channel(2)?, channel(4)?))
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

fn indent(text: &str, width: usize) -> String {
    let pad = " ".repeat(width);
    text.lines()
        .map(|line| format!("{}{}", pad, line))
        .collect::<Vec<_>>()
        .join("\n")
}
