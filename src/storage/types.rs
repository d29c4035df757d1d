use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::RelayError;

/// Number of characters of the first message kept in a derived title
pub const TITLE_MAX_CHARS: usize = 30;

/// Author of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Message typed by the user
    User,
    /// Message produced by the language model
    Model,
}

impl Role {
    /// Wire/database representation of the role
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Model => "model",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = RelayError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "model" => Ok(Role::Model),
            other => Err(RelayError::Storage(format!("Unknown message role: {}", other))),
        }
    }
}

/// A stored conversation session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Opaque session identifier
    pub session_id: String,
    /// Display title
    pub title: String,
    /// When the session row was created
    pub created_at: DateTime<Utc>,
}

/// A stored message row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredMessage {
    /// Session the message belongs to
    pub session_id: String,
    /// Author of the message
    pub role: Role,
    /// Message text
    pub content: String,
    /// When the message was written
    pub created_at: DateTime<Utc>,
}

/// A session as listed to clients: `{"id": .., "title": ..}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: String,
    pub title: String,
}

impl From<Session> for SessionSummary {
    fn from(session: Session) -> Self {
        Self {
            id: session.session_id,
            title: session.title,
        }
    }
}

/// One history turn in the shape the model client expects:
/// `{"role": "user", "parts": ["Hello"]}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub role: Role,
    pub parts: Vec<String>,
}

impl HistoryEntry {
    /// Build a single-part entry
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            parts: vec![content.into()],
        }
    }
}

impl From<StoredMessage> for HistoryEntry {
    fn from(message: StoredMessage) -> Self {
        Self::new(message.role, message.content)
    }
}

/// Derive a session title from the first message of a session
///
/// Keeps the first 30 characters and appends `..` when the message is longer.
///
/// # Examples
///
/// ```
/// use relaychat::storage::derive_title;
///
/// assert_eq!(derive_title("Hello"), "Hello");
/// assert_eq!(derive_title(&"x".repeat(40)), format!("{}..", "x".repeat(30)));
/// ```
pub fn derive_title(content: &str) -> String {
    if content.chars().count() > TITLE_MAX_CHARS {
        let head: String = content.chars().take(TITLE_MAX_CHARS).collect();
        format!("{}..", head)
    } else {
        content.to_string()
    }
}
