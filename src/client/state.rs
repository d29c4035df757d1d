//! Client-held conversation state

use crate::storage::{HistoryEntry, Role, SessionSummary};
use uuid::Uuid;

/// Label shown for a session the server does not know yet
pub const NEW_CHAT_TITLE: &str = "New Chat...";

/// One rendered message of the current thread
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl From<HistoryEntry> for ChatMessage {
    fn from(entry: HistoryEntry) -> Self {
        Self {
            role: entry.role,
            content: entry.parts.into_iter().next().unwrap_or_default(),
        }
    }
}

/// State of the terminal client
///
/// Mirrors the server history of the current session; the server stays the
/// source of truth and the local list is rebuilt from it whenever it is empty.
#[derive(Debug, Clone)]
pub struct ClientState {
    pub session_id: String,
    pub messages: Vec<ChatMessage>,
    pending_prompt: Option<String>,
}

impl ClientState {
    /// Start on `session_id`, or on a fresh session when `None`
    pub fn new(session_id: Option<String>, pending_prompt: Option<String>) -> Self {
        Self {
            session_id: session_id.unwrap_or_else(new_session_id),
            messages: Vec::new(),
            pending_prompt: pending_prompt.filter(|p| !p.trim().is_empty()),
        }
    }

    /// Begin a fresh conversation without contacting the server
    pub fn new_conversation(&mut self) {
        self.session_id = new_session_id();
        self.messages.clear();
        self.pending_prompt = None;
    }

    /// Move to another session; its history must be reloaded
    pub fn switch_session(&mut self, session_id: impl Into<String>) {
        self.session_id = session_id.into();
        self.messages.clear();
    }

    /// Take the queued prompt, if any
    pub fn take_pending_prompt(&mut self) -> Option<String> {
        self.pending_prompt.take()
    }

    /// Replace the local thread with server history
    pub fn load_history(&mut self, history: Vec<HistoryEntry>) {
        self.messages = history.into_iter().map(ChatMessage::from).collect();
    }

    pub fn push(&mut self, role: Role, content: impl Into<String>) {
        self.messages.push(ChatMessage {
            role,
            content: content.into(),
        });
    }

    /// Server session list with the current session added as
    /// [`NEW_CHAT_TITLE`] when the server does not know it
    pub fn session_listing(&self, server_sessions: Vec<SessionSummary>) -> Vec<SessionSummary> {
        let mut listing = server_sessions;
        if !listing.iter().any(|s| s.id == self.session_id) {
            listing.insert(
                0,
                SessionSummary {
                    id: self.session_id.clone(),
                    title: NEW_CHAT_TITLE.to_string(),
                },
            );
        }
        listing
    }
}

/// Fresh opaque session identifier
pub fn new_session_id() -> String {
    Uuid::new_v4().to_string()
}

/// Resolve a `/switch` target: a 1-based position in `listing`, or an id
pub fn resolve_session<'a>(listing: &'a [SessionSummary], target: &str) -> Option<&'a str> {
    if let Ok(position) = target.parse::<usize>() {
        if position >= 1 {
            if let Some(session) = listing.get(position - 1) {
                return Some(&session.id);
            }
        }
    }
    listing
        .iter()
        .find(|s| s.id == target)
        .map(|s| s.id.as_str())
}
