//! Session store
//!
//! Persists sessions and their message history. Two backends implement
//! [`StorageBackend`]: a local SQLite file and a hosted Supabase project.
//! [`SessionStore`] sits on top of a backend and applies the degrade-on-failure
//! contract the API surface relies on: reads return empty lists and writes
//! return `false` when the backend fails, after logging the cause.

use crate::config::StoreConfig;
use crate::error::{Result, RelayError};
use async_trait::async_trait;
use std::sync::Arc;

pub mod sqlite;
pub mod supabase;
pub mod types;

pub use sqlite::SqliteStorage;
pub use supabase::SupabaseStorage;
pub use types::{
    derive_title, HistoryEntry, Role, Session, SessionSummary, StoredMessage, TITLE_MAX_CHARS,
};

/// Table-level operations a session store backend provides
///
/// Every method reports failures through `Result`; the decision to degrade
/// is made by [`SessionStore`].
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Insert the session row unless one already exists, in one statement
    ///
    /// An existing row (and its title) is left untouched.
    async fn ensure_session(&self, session_id: &str, title: &str) -> Result<()>;

    /// Append a message to a session
    async fn insert_message(&self, session_id: &str, role: Role, content: &str) -> Result<()>;

    /// All sessions, newest first
    async fn list_sessions(&self) -> Result<Vec<Session>>;

    /// All messages of a session, oldest first
    async fn load_messages(&self, session_id: &str) -> Result<Vec<StoredMessage>>;

    /// Remove the messages of a session, then the session row
    async fn delete_session(&self, session_id: &str) -> Result<()>;

    /// Replace the title of a session
    async fn update_title(&self, session_id: &str, title: &str) -> Result<()>;

    /// Short backend name for logs
    fn name(&self) -> &'static str;
}

/// Session store shared by the relay and the API handlers
///
/// Constructed once at startup and passed around as `Arc<SessionStore>`.
pub struct SessionStore {
    backend: Arc<dyn StorageBackend>,
}

impl SessionStore {
    /// Wrap a backend
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self { backend }
    }

    /// Build the backend selected by `store.backend`
    ///
    /// # Errors
    ///
    /// Returns error for an unknown backend, missing Supabase credentials, or
    /// a SQLite file that cannot be initialised
    pub fn from_config(config: &StoreConfig) -> Result<Self> {
        let backend: Arc<dyn StorageBackend> = match config.backend.as_str() {
            "sqlite" => match &config.sqlite.path {
                Some(path) => Arc::new(SqliteStorage::new_with_path(path)?),
                None => Arc::new(SqliteStorage::new()?),
            },
            "supabase" => Arc::new(SupabaseStorage::new(config.supabase.clone())?),
            other => {
                return Err(
                    RelayError::Config(format!("Unknown store backend: {}", other)).into(),
                )
            }
        };

        tracing::info!("Initialized session store: backend={}", backend.name());
        Ok(Self::new(backend))
    }

    /// Name of the underlying backend
    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Save a message, creating its session on first use
    ///
    /// The session title is derived from `content` when the session is new.
    /// A failed session check is logged and the message insert still runs;
    /// a failed message insert is returned to the caller.
    pub async fn add_message(&self, session_id: &str, role: Role, content: &str) -> Result<()> {
        let title = derive_title(content);
        if let Err(e) = self.backend.ensure_session(session_id, &title).await {
            tracing::error!("Session creation check failed for {}: {:#}", session_id, e);
        }

        self.backend
            .insert_message(session_id, role, content)
            .await
            .map_err(|e| {
                tracing::error!("Failed to insert {} message for {}: {:#}", role, session_id, e);
                e
            })
    }

    /// All sessions as `{id, title}`, newest first; empty on failure
    pub async fn get_all_sessions(&self) -> Vec<SessionSummary> {
        match self.backend.list_sessions().await {
            Ok(sessions) => sessions.into_iter().map(SessionSummary::from).collect(),
            Err(e) => {
                tracing::error!("Error fetching sessions: {:#}", e);
                Vec::new()
            }
        }
    }

    /// History of a session as `{role, parts}`, oldest first; empty on failure
    pub async fn get_chat_history(&self, session_id: &str) -> Vec<HistoryEntry> {
        match self.backend.load_messages(session_id).await {
            Ok(messages) => messages.into_iter().map(HistoryEntry::from).collect(),
            Err(e) => {
                tracing::error!("Error fetching history for {}: {:#}", session_id, e);
                Vec::new()
            }
        }
    }

    /// Delete a session and its messages; `false` on failure
    pub async fn delete_session(&self, session_id: &str) -> bool {
        match self.backend.delete_session(session_id).await {
            Ok(()) => {
                tracing::info!("Deleted session {}", session_id);
                true
            }
            Err(e) => {
                tracing::error!("Error deleting session {}: {:#}", session_id, e);
                false
            }
        }
    }

    /// Update the title of a session; `false` on failure
    pub async fn update_title(&self, session_id: &str, title: &str) -> bool {
        match self.backend.update_title(session_id, title).await {
            Ok(()) => true,
            Err(e) => {
                tracing::error!("Error updating title for {}: {:#}", session_id, e);
                false
            }
        }
    }
}
