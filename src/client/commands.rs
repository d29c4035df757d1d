//! Special commands parser for the terminal client
//!
//! Commands are prefixed with `/` and are case-insensitive; their arguments
//! keep the case they were typed in.

use thiserror::Error;

/// Errors that can occur when parsing special commands
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// Unknown command was entered
    #[error("Unknown command: {0}\n\nType '/help' to see available commands")]
    UnknownCommand(String),

    /// Command requires an argument but none was provided
    #[error("Command {command} requires an argument\n\nUsage: {usage}")]
    MissingArgument { command: String, usage: String },
}

/// Special commands of the terminal client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientCommand {
    /// Start a new conversation
    New,
    /// Show the session list
    Sessions,
    /// Switch to a session by list position or id
    Switch(String),
    /// Rename the current session
    Title(String),
    /// Delete the current session
    Delete,
    /// Print the current thread again
    History,
    Help,
    Exit,
    /// Not a command; send as a chat message
    None,
}

/// Parse a line of user input
///
/// # Errors
///
/// Returns [`CommandError::UnknownCommand`] for an unrecognized `/` command
/// and [`CommandError::MissingArgument`] when `/switch` or `/title` has no
/// argument.
///
/// # Examples
///
/// ```
/// use relaychat::client::commands::{parse_client_command, ClientCommand};
///
/// assert_eq!(parse_client_command("/new").unwrap(), ClientCommand::New);
/// assert_eq!(
///     parse_client_command("/title Trip Plans").unwrap(),
///     ClientCommand::Title("Trip Plans".to_string())
/// );
/// assert_eq!(parse_client_command("hello").unwrap(), ClientCommand::None);
/// assert!(parse_client_command("/foo").is_err());
/// ```
pub fn parse_client_command(input: &str) -> Result<ClientCommand, CommandError> {
    let trimmed = input.trim();
    if !trimmed.starts_with('/') {
        return Ok(ClientCommand::None);
    }

    let (name, arg) = match trimmed.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (trimmed, ""),
    };

    match name.to_lowercase().as_str() {
        "/new" => Ok(ClientCommand::New),
        "/sessions" | "/ls" => Ok(ClientCommand::Sessions),
        "/switch" => required(arg, "/switch", "/switch <number|session id>")
            .map(ClientCommand::Switch),
        "/title" => required(arg, "/title", "/title <new title>").map(ClientCommand::Title),
        "/delete" => Ok(ClientCommand::Delete),
        "/history" => Ok(ClientCommand::History),
        "/help" | "/?" => Ok(ClientCommand::Help),
        "/exit" | "/quit" => Ok(ClientCommand::Exit),
        _ => Err(CommandError::UnknownCommand(trimmed.to_string())),
    }
}

fn required(arg: &str, command: &str, usage: &str) -> Result<String, CommandError> {
    if arg.is_empty() {
        Err(CommandError::MissingArgument {
            command: command.to_string(),
            usage: usage.to_string(),
        })
    } else {
        Ok(arg.to_string())
    }
}

/// Print the command reference
pub fn print_help() {
    println!(
        r#"
Commands
========

  /new               - Start a new conversation
  /sessions, /ls     - List sessions
  /switch <n|id>     - Switch to session number n of the list, or by id
  /title <text>      - Rename the current session
  /delete            - Delete the current session and start a new one
  /history           - Show the current conversation again
  /help, /?          - Show this help
  /exit, /quit       - Leave (Ctrl-D works too)

Anything else is sent to the model.
"#
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_is_not_a_command() {
        assert_eq!(
            parse_client_command("What is Rust?").unwrap(),
            ClientCommand::None
        );
        assert_eq!(parse_client_command("exit").unwrap(), ClientCommand::None);
    }

    #[test]
    fn test_commands_are_case_insensitive() {
        assert_eq!(parse_client_command("/NEW").unwrap(), ClientCommand::New);
        assert_eq!(parse_client_command(" /Quit ").unwrap(), ClientCommand::Exit);
    }

    #[test]
    fn test_switch_keeps_argument() {
        assert_eq!(
            parse_client_command("/switch 2").unwrap(),
            ClientCommand::Switch("2".to_string())
        );
        assert_eq!(
            parse_client_command("/switch AbC-123").unwrap(),
            ClientCommand::Switch("AbC-123".to_string())
        );
    }

    #[test]
    fn test_title_keeps_case_and_inner_spaces() {
        assert_eq!(
            parse_client_command("/title  My  Trip ").unwrap(),
            ClientCommand::Title("My  Trip".to_string())
        );
    }

    #[test]
    fn test_missing_arguments_rejected() {
        assert!(matches!(
            parse_client_command("/switch"),
            Err(CommandError::MissingArgument { .. })
        ));
        assert!(matches!(
            parse_client_command("/title   "),
            Err(CommandError::MissingArgument { .. })
        ));
    }

    #[test]
    fn test_unknown_command_rejected() {
        assert_eq!(
            parse_client_command("/frobnicate"),
            Err(CommandError::UnknownCommand("/frobnicate".to_string()))
        );
    }
}
