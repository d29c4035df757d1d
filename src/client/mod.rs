//! Terminal client
//!
//! A line-editor front end for the relaychat API: lists sessions, shows the
//! current thread and renders streamed replies as they arrive. HTTP failures
//! are printed and the loop carries on.

pub mod api;
pub mod commands;
pub mod state;

pub use api::{ApiClient, ChatOutcome};
pub use state::{ChatMessage, ClientState, NEW_CHAT_TITLE};

use crate::error::Result;
use crate::storage::{Role, SessionSummary};
use colored::Colorize;
use commands::{parse_client_command, print_help, ClientCommand};
use prettytable::{format, row, Table};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::io::Write;

/// Run the interactive chat loop
///
/// # Arguments
///
/// * `server_url` - Base URL of the relaychat API
/// * `session_id` - Session to resume; a new one is generated when `None`
/// * `prompt` - Message to send before the first read
///
/// # Errors
///
/// Returns error if the server URL is invalid or the line editor cannot be
/// initialized. HTTP failures are reported inline and never end the loop.
pub async fn run_chat(
    server_url: &str,
    session_id: Option<String>,
    prompt: Option<String>,
) -> Result<()> {
    let api = ApiClient::new(server_url)?;
    let mut state = ClientState::new(session_id, prompt);
    let mut rl = DefaultEditor::new()?;

    print_welcome_banner(api.base_url());
    show_sessions(&api, &state).await;
    reload_history(&api, &mut state).await;
    print_thread(&state);

    loop {
        let input = match state.take_pending_prompt() {
            Some(queued) => {
                println!("{} {}", "You:".bold().green(), queued);
                queued
            }
            None => match rl.readline(&format!("{} ", ">>".cyan())) {
                Ok(line) => line,
                Err(ReadlineError::Interrupted) => {
                    println!("CTRL-C");
                    break;
                }
                Err(ReadlineError::Eof) => {
                    println!("CTRL-D");
                    break;
                }
                Err(err) => {
                    tracing::error!("Readline error: {:?}", err);
                    break;
                }
            },
        };

        let trimmed = input.trim();
        if trimmed.is_empty() {
            continue;
        }
        remember_input(&mut rl, trimmed);

        match parse_client_command(trimmed) {
            Ok(ClientCommand::New) => {
                state.new_conversation();
                println!("{}\n", "Started a new conversation.".green());
            }
            Ok(ClientCommand::Sessions) => show_sessions(&api, &state).await,
            Ok(ClientCommand::Switch(target)) => switch_session(&api, &mut state, &target).await,
            Ok(ClientCommand::Title(title)) => rename_session(&api, &state, &title).await,
            Ok(ClientCommand::Delete) => delete_session(&api, &mut state).await,
            Ok(ClientCommand::History) => {
                reload_history(&api, &mut state).await;
                print_thread(&state);
            }
            Ok(ClientCommand::Help) => print_help(),
            Ok(ClientCommand::Exit) => break,
            Ok(ClientCommand::None) => send_message(&api, &mut state, trimmed).await,
            Err(e) => eprintln!("{}\n", e.to_string().red()),
        }
    }

    println!("Goodbye!");
    Ok(())
}

/// Add a line to the editor history; failures only cost recall
fn remember_input(rl: &mut DefaultEditor, line: &str) {
    if let Err(e) = rl.add_history_entry(line) {
        tracing::debug!("Failed to add line to input history: {}", e);
    }
}

fn print_welcome_banner(server_url: &str) {
    println!(
        "\n{} {}",
        "relaychat".bold().cyan(),
        format!("connected to {}", server_url).dimmed()
    );
    println!("Type {} for commands.\n", "/help".cyan());
}

/// Server sessions, or `None` after printing the backend warning
async fn fetch_sessions(api: &ApiClient) -> Option<Vec<SessionSummary>> {
    match api.sessions().await {
        Ok(sessions) => Some(sessions),
        Err(e) => {
            tracing::debug!("Session list unavailable: {:#}", e);
            println!("{}", "Backend Disconnected".yellow());
            None
        }
    }
}

async fn show_sessions(api: &ApiClient, state: &ClientState) {
    let listing = state.session_listing(fetch_sessions(api).await.unwrap_or_default());

    println!("{}", "Sessions:".bold());
    for (index, session) in listing.iter().enumerate() {
        let marker = if session.id == state.session_id { "*" } else { " " };
        let line = format!("{} {:>2}. {}", marker, index + 1, session.title);
        if session.id == state.session_id {
            println!("{}", line.green());
        } else {
            println!("{}", line);
        }
    }
    println!();
}

/// Refill the local thread from the server when it is empty
async fn reload_history(api: &ApiClient, state: &mut ClientState) {
    if !state.messages.is_empty() {
        return;
    }
    match api.history(&state.session_id).await {
        Ok(history) => state.load_history(history),
        Err(e) => tracing::debug!("History unavailable for {}: {:#}", state.session_id, e),
    }
}

fn print_thread(state: &ClientState) {
    if state.messages.is_empty() {
        println!("{}\n", "Hello! How can I help you today?".bold());
        return;
    }
    for message in &state.messages {
        print_role_label(message.role);
        println!("{}\n", message.content);
    }
}

fn print_role_label(role: Role) {
    match role {
        Role::User => print!("{} ", "You:".bold().green()),
        Role::Model => print!("{} ", "Model:".bold().cyan()),
    }
}

async fn send_message(api: &ApiClient, state: &mut ClientState, message: &str) {
    state.push(Role::User, message);
    print_role_label(Role::Model);
    let _ = std::io::stdout().flush();

    let outcome = api
        .chat(&state.session_id, message, |fragment| {
            print!("{}", fragment);
            let _ = std::io::stdout().flush();
        })
        .await;
    println!("\n");

    match outcome {
        Ok(ChatOutcome::Completed(reply)) => state.push(Role::Model, reply),
        Ok(ChatOutcome::Rejected(status)) => {
            eprintln!("{}\n", format!("Error: {}", status).red())
        }
        Err(e) => eprintln!("{}\n", format!("Error: {}", e).red()),
    }
}

async fn switch_session(api: &ApiClient, state: &mut ClientState, target: &str) {
    let listing = state.session_listing(fetch_sessions(api).await.unwrap_or_default());
    let Some(session_id) = state::resolve_session(&listing, target).map(str::to_string) else {
        eprintln!("{}\n", format!("No session matches '{}'", target).red());
        return;
    };

    state.switch_session(session_id);
    reload_history(api, state).await;
    print_thread(state);
}

/// Whether the server already has the current session
async fn is_known_session(api: &ApiClient, state: &ClientState) -> bool {
    match fetch_sessions(api).await {
        Some(sessions) => sessions.iter().any(|s| s.id == state.session_id),
        None => false,
    }
}

async fn rename_session(api: &ApiClient, state: &ClientState, title: &str) {
    if !is_known_session(api, state).await {
        println!("{}\n", "Send a message first; this chat is not saved yet.".yellow());
        return;
    }
    match api.update_title(&state.session_id, title).await {
        Ok(()) => println!("{}\n", "Title updated!".green()),
        Err(e) => eprintln!("{}\n", format!("Failed to update: {}", e).red()),
    }
}

async fn delete_session(api: &ApiClient, state: &mut ClientState) {
    if !is_known_session(api, state).await {
        println!("{}\n", "Nothing to delete; this chat is not saved yet.".yellow());
        return;
    }
    match api.delete_session(&state.session_id).await {
        Ok(()) => {
            println!("{}\n", "Chat deleted.".green());
            state.new_conversation();
        }
        Err(e) => eprintln!("{}\n", format!("Failed to delete: {}", e).red()),
    }
}

/// Print the session list of the server at `server_url`
///
/// # Errors
///
/// Returns error if the server cannot be reached
pub async fn run_sessions(server_url: &str, json: bool) -> Result<()> {
    let api = ApiClient::new(server_url)?;
    let sessions = api.sessions().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&sessions)?);
        return Ok(());
    }

    if sessions.is_empty() {
        println!("{}", "No sessions found.".yellow());
        return Ok(());
    }

    print_sessions_table(&sessions);
    println!(
        "Use {} to resume a session.\n",
        "relaychat chat --session <ID>".cyan()
    );
    Ok(())
}

fn print_sessions_table(sessions: &[SessionSummary]) {
    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_BORDERS_ONLY);
    table.add_row(row!["#".bold(), "ID".bold(), "Title".bold()]);
    for (index, session) in sessions.iter().enumerate() {
        let position = index + 1;
        table.add_row(row![position, session.id.cyan(), session.title]);
    }

    println!("\nSessions:");
    table.printstd();
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use rustyline::history::History;

    #[test]
    fn test_remember_input_records_line_once() {
        let mut rl = DefaultEditor::new().unwrap();
        remember_input(&mut rl, "hello");
        remember_input(&mut rl, "hello");
        assert_eq!(rl.history().len(), 1);
    }
}
