use crate::error::{Result, RelayError};
use crate::storage::{Role, Session, StorageBackend, StoredMessage};
use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use directories::ProjectDirs;
use rusqlite::{params, Connection};
use std::path::PathBuf;

/// Local SQLite session store
///
/// Each call opens its own connection; calls made from async code run on
/// the blocking thread pool.
#[derive(Debug, Clone)]
pub struct SqliteStorage {
    db_path: PathBuf,
}

impl SqliteStorage {
    /// Create a new storage instance
    ///
    /// Initializes the database file in the user's data directory.
    pub fn new() -> Result<Self> {
        let proj_dirs = ProjectDirs::from("dev", "relaychat", "relaychat")
            .ok_or_else(|| RelayError::Storage("Could not determine data directory".into()))?;

        let data_dir = proj_dirs.data_dir();
        std::fs::create_dir_all(data_dir)
            .context("Failed to create data directory")
            .map_err(|e| RelayError::Storage(e.to_string()))?;

        Self::new_with_path(data_dir.join("chat.db"))
    }

    /// Create a new storage instance that uses the specified database path.
    ///
    /// # Examples
    ///
    /// ```
    /// use relaychat::storage::SqliteStorage;
    ///
    /// let dir = tempfile::tempdir().unwrap();
    /// let storage = SqliteStorage::new_with_path(dir.path().join("chat.db")).unwrap();
    /// ```
    pub fn new_with_path<P: Into<PathBuf>>(db_path: P) -> Result<Self> {
        let db_path = db_path.into();

        // Ensure parent directory exists so opening the DB file succeeds.
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .context("Failed to create parent directory for database")
                .map_err(|e| RelayError::Storage(e.to_string()))?;
        }

        let storage = Self { db_path };
        storage.init()?;
        tracing::debug!("Opened SQLite session store at {}", storage.db_path.display());
        Ok(storage)
    }

    /// Path of the database file
    pub fn db_path(&self) -> &std::path::Path {
        &self.db_path
    }

    fn open(&self) -> Result<Connection> {
        let conn = Connection::open(&self.db_path)
            .context("Failed to open database")
            .map_err(|e| RelayError::Storage(e.to_string()))?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .context("Failed to enable foreign keys")
            .map_err(|e| RelayError::Storage(e.to_string()))?;
        Ok(conn)
    }

    /// Initialize the database schema
    fn init(&self) -> Result<()> {
        let conn = self.open()?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS sessions (
                session_id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                created_at TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS chat_history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id TEXT NOT NULL REFERENCES sessions(session_id),
                role TEXT NOT NULL CHECK (role IN ('user', 'model')),
                content TEXT NOT NULL,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_chat_history_session
                ON chat_history (session_id, created_at);",
        )
        .context("Failed to create tables")
        .map_err(|e| RelayError::Storage(e.to_string()))?;

        Ok(())
    }

    /// Insert the session row if absent (`ON CONFLICT DO NOTHING`)
    pub fn ensure_session_blocking(&self, session_id: &str, title: &str) -> Result<()> {
        let conn = self.open()?;
        conn.execute(
            "INSERT INTO sessions (session_id, title, created_at)
            VALUES (?, ?, ?)
            ON CONFLICT(session_id) DO NOTHING",
            params![session_id, title, now_timestamp()],
        )
        .context("Failed to insert session")
        .map_err(|e| RelayError::Storage(e.to_string()))?;
        Ok(())
    }

    /// Append a message row
    pub fn insert_message_blocking(&self, session_id: &str, role: Role, content: &str) -> Result<()> {
        let conn = self.open()?;
        conn.execute(
            "INSERT INTO chat_history (session_id, role, content, created_at)
            VALUES (?, ?, ?, ?)",
            params![session_id, role.as_str(), content, now_timestamp()],
        )
        .context("Failed to insert message")
        .map_err(|e| RelayError::Storage(e.to_string()))?;
        Ok(())
    }

    /// List all sessions, newest first
    pub fn list_sessions_blocking(&self) -> Result<Vec<Session>> {
        let conn = self.open()?;

        let mut stmt = conn
            .prepare(
                "SELECT session_id, title, created_at
                FROM sessions
                ORDER BY created_at DESC, rowid DESC",
            )
            .context("Failed to prepare statement")
            .map_err(|e| RelayError::Storage(e.to_string()))?;

        let sessions = stmt
            .query_map([], |row| {
                let session_id: String = row.get(0)?;
                let title: String = row.get(1)?;
                let created_at: String = row.get(2)?;
                Ok(Session {
                    session_id,
                    title,
                    created_at: parse_timestamp(&created_at),
                })
            })
            .context("Failed to query sessions")
            .map_err(|e| RelayError::Storage(e.to_string()))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to read session row")
            .map_err(|e| RelayError::Storage(e.to_string()))?;

        Ok(sessions)
    }

    /// Load the messages of a session, oldest first
    pub fn load_messages_blocking(&self, session_id: &str) -> Result<Vec<StoredMessage>> {
        let conn = self.open()?;

        let mut stmt = conn
            .prepare(
                "SELECT role, content, created_at
                FROM chat_history
                WHERE session_id = ?
                ORDER BY created_at ASC, id ASC",
            )
            .context("Failed to prepare statement")
            .map_err(|e| RelayError::Storage(e.to_string()))?;

        let rows = stmt
            .query_map(params![session_id], |row| {
                let role: String = row.get(0)?;
                let content: String = row.get(1)?;
                let created_at: String = row.get(2)?;
                Ok((role, content, created_at))
            })
            .context("Failed to query messages")
            .map_err(|e| RelayError::Storage(e.to_string()))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to read message row")
            .map_err(|e| RelayError::Storage(e.to_string()))?;

        rows.into_iter()
            .map(|(role, content, created_at)| -> Result<StoredMessage> {
                Ok(StoredMessage {
                    session_id: session_id.to_string(),
                    role: role.parse::<Role>()?,
                    content,
                    created_at: parse_timestamp(&created_at),
                })
            })
            .collect()
    }

    /// Delete the messages and then the row of a session, in one transaction
    pub fn delete_session_blocking(&self, session_id: &str) -> Result<()> {
        let mut conn = self.open()?;

        let tx = conn
            .transaction()
            .context("Failed to start transaction")
            .map_err(|e| RelayError::Storage(e.to_string()))?;

        tx.execute(
            "DELETE FROM chat_history WHERE session_id = ?",
            params![session_id],
        )
        .context("Failed to delete messages")
        .map_err(|e| RelayError::Storage(e.to_string()))?;

        tx.execute(
            "DELETE FROM sessions WHERE session_id = ?",
            params![session_id],
        )
        .context("Failed to delete session")
        .map_err(|e| RelayError::Storage(e.to_string()))?;

        tx.commit()
            .context("Failed to commit transaction")
            .map_err(|e| RelayError::Storage(e.to_string()))?;

        Ok(())
    }

    /// Replace the title of a session
    pub fn update_title_blocking(&self, session_id: &str, title: &str) -> Result<()> {
        let conn = self.open()?;
        conn.execute(
            "UPDATE sessions SET title = ? WHERE session_id = ?",
            params![title, session_id],
        )
        .context("Failed to update title")
        .map_err(|e| RelayError::Storage(e.to_string()))?;
        Ok(())
    }

    /// Run a blocking storage call on the blocking thread pool
    async fn run_blocking<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&SqliteStorage) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let storage = self.clone();
        tokio::task::spawn_blocking(move || f(&storage))
            .await
            .map_err(|e| RelayError::Storage(format!("Storage task failed: {}", e)))?
    }
}

/// Fixed-width RFC 3339 timestamp so that text ordering matches time ordering
fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now()) // Fallback if parsing fails
}

#[async_trait]
impl StorageBackend for SqliteStorage {
    async fn ensure_session(&self, session_id: &str, title: &str) -> Result<()> {
        let (session_id, title) = (session_id.to_string(), title.to_string());
        self.run_blocking(move |s| s.ensure_session_blocking(&session_id, &title))
            .await
    }

    async fn insert_message(&self, session_id: &str, role: Role, content: &str) -> Result<()> {
        let (session_id, content) = (session_id.to_string(), content.to_string());
        self.run_blocking(move |s| s.insert_message_blocking(&session_id, role, &content))
            .await
    }

    async fn list_sessions(&self) -> Result<Vec<Session>> {
        self.run_blocking(|s| s.list_sessions_blocking()).await
    }

    async fn load_messages(&self, session_id: &str) -> Result<Vec<StoredMessage>> {
        let session_id = session_id.to_string();
        self.run_blocking(move |s| s.load_messages_blocking(&session_id))
            .await
    }

    async fn delete_session(&self, session_id: &str) -> Result<()> {
        let session_id = session_id.to_string();
        self.run_blocking(move |s| s.delete_session_blocking(&session_id))
            .await
    }

    async fn update_title(&self, session_id: &str, title: &str) -> Result<()> {
        let (session_id, title) = (session_id.to_string(), title.to_string());
        self.run_blocking(move |s| s.update_title_blocking(&session_id, &title))
            .await
    }

    fn name(&self) -> &'static str {
        "sqlite"
    }
}
