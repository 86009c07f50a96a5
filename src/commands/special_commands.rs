//! Special commands parser for interactive chat
//!
//! Lines typed during a chat are either messages for the assistant or
//! special commands handled by the client itself. Special commands are
//! prefixed with `/` and are case-insensitive; `exit` and `quit` also work
//! without the slash.

use thiserror::Error;

/// Errors that can occur when parsing special commands
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// Unknown command was entered
    #[error("Unknown command: {0}\n\nType '/help' to see available commands")]
    UnknownCommand(String),

    /// Command takes no argument but one was given
    #[error("Unsupported argument for {command}: {arg}\n\nType '/help' to see valid usage")]
    UnsupportedArgument { command: String, arg: String },
}

/// Special commands that can be executed during interactive chat
///
/// These never reach the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpecialCommand {
    /// Display help information
    Help,

    /// Display connection status and session details
    ShowStatus,

    /// Show the details of the last recommendations
    Recommendations,

    /// Show the details of the last query execution
    Query,

    /// Close the stream and leave the chat
    Exit,

    /// Not a special command
    ///
    /// The input should be sent as a chat message.
    None,
}

/// Parse a user input line into a special command
///
/// # Errors
///
/// Returns `CommandError::UnknownCommand` if input starts with `/` but is
/// not a known command, and `CommandError::UnsupportedArgument` if a known
/// command is given an argument.
///
/// # Examples
///
/// ```
/// use chatbot_client::commands::special_commands::{parse_special_command, SpecialCommand};
///
/// assert_eq!(parse_special_command("/query").unwrap(), SpecialCommand::Query);
/// assert_eq!(parse_special_command("quit").unwrap(), SpecialCommand::Exit);
/// assert_eq!(parse_special_command("hello there").unwrap(), SpecialCommand::None);
/// assert!(parse_special_command("/foo").is_err());
/// ```
pub fn parse_special_command(input: &str) -> Result<SpecialCommand, CommandError> {
    let trimmed = input.trim();
    let lower = trimmed.to_lowercase();

    if !trimmed.starts_with('/') && lower != "exit" && lower != "quit" {
        return Ok(SpecialCommand::None);
    }

    let mut parts = lower.splitn(2, char::is_whitespace);
    let name = parts.next().unwrap_or_default();
    let arg = parts.next().map(str::trim).unwrap_or_default();

    let command = match name {
        "/help" | "/?" => SpecialCommand::Help,
        "/status" => SpecialCommand::ShowStatus,
        "/recommendations" | "/recs" => SpecialCommand::Recommendations,
        "/query" => SpecialCommand::Query,
        "exit" | "quit" | "/exit" | "/quit" => SpecialCommand::Exit,
        other if other.starts_with('/') => {
            return Err(CommandError::UnknownCommand(other.to_string()));
        }
        _ => return Ok(SpecialCommand::None),
    };

    if !arg.is_empty() {
        return Err(CommandError::UnsupportedArgument {
            command: name.to_string(),
            arg: arg.to_string(),
        });
    }

    Ok(command)
}

/// Display help text for special commands
pub fn print_help() {
    println!(
        r#"
Special Commands for Interactive Chat
=====================================

  /help             - Show this help
  /status           - Show connection status and session details
  /recommendations  - Show the recommendations from the last reply
  /recs             - Shorthand for /recommendations
  /query            - Show the query data behind the last reply
  /exit, /quit      - Close the connection and leave

Anything else is sent to the assistant. Press Ctrl-D to leave as well.
"#
    );
}
