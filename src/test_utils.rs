//! Test utilities for relaychat
//!
//! Temporary session stores and a scripted model provider that replays
//! canned fragments, so relay and API tests run without a network.

use crate::error::RelayError;
use crate::providers::{ChatProvider, TextStream};
use crate::storage::{HistoryEntry, SessionStore, SqliteStorage};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Create a temporary directory for testing
pub fn temp_dir() -> TempDir {
    TempDir::new().expect("Failed to create temporary directory")
}

/// Create a SQLite-backed session store in a fresh temporary directory
///
/// The directory is returned so it outlives the store.
pub fn temp_store() -> (Arc<SessionStore>, TempDir) {
    let dir = temp_dir();
    let backend = SqliteStorage::new_with_path(dir.path().join("chat.db"))
        .expect("Failed to create SQLite storage");
    (Arc::new(SessionStore::new(Arc::new(backend))), dir)
}

/// One item the scripted provider yields
#[derive(Debug, Clone)]
pub enum ScriptStep {
    /// A text fragment
    Text(String),
    /// A mid-stream failure
    Fail(String),
}

/// How opening the stream fails, if it does
#[derive(Debug, Clone, Copy)]
pub enum OpenFailure {
    Unavailable,
    Timeout,
}

/// Provider that replays a fixed script and records what it was asked
pub struct ScriptedProvider {
    steps: Vec<ScriptStep>,
    open_failure: Option<OpenFailure>,
    calls: Mutex<Vec<(Vec<HistoryEntry>, String)>>,
}

impl ScriptedProvider {
    /// Reply with the given fragments, then end
    pub fn replying(fragments: &[&str]) -> Self {
        Self {
            steps: fragments
                .iter()
                .map(|f| ScriptStep::Text(f.to_string()))
                .collect(),
            open_failure: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Reply with the given fragments, then fail
    pub fn failing_after(fragments: &[&str], reason: &str) -> Self {
        let mut provider = Self::replying(fragments);
        provider.steps.push(ScriptStep::Fail(reason.to_string()));
        provider
    }

    /// Fail before the stream opens
    pub fn failing_to_open(failure: OpenFailure) -> Self {
        let mut provider = Self::replying(&[]);
        provider.open_failure = Some(failure);
        provider
    }

    /// `(history, message)` of every call so far
    pub fn calls(&self) -> Vec<(Vec<HistoryEntry>, String)> {
        self.calls.lock().expect("calls lock poisoned").clone()
    }
}

#[async_trait]
impl ChatProvider for ScriptedProvider {
    async fn stream_chat(
        &self,
        history: &[HistoryEntry],
        message: &str,
    ) -> Result<TextStream, RelayError> {
        self.calls
            .lock()
            .expect("calls lock poisoned")
            .push((history.to_vec(), message.to_string()));

        match self.open_failure {
            Some(OpenFailure::Unavailable) => {
                return Err(RelayError::UpstreamUnavailable("scripted".to_string()))
            }
            Some(OpenFailure::Timeout) => {
                return Err(RelayError::UpstreamTimeout("scripted".to_string()))
            }
            None => {}
        }

        let items: Vec<Result<String, RelayError>> = self
            .steps
            .iter()
            .map(|step| match step {
                ScriptStep::Text(text) => Ok(text.clone()),
                ScriptStep::Fail(reason) => Err(RelayError::StreamInterrupted(reason.clone())),
            })
            .collect();
        Ok(Box::pin(futures::stream::iter(items)))
    }

    fn model_name(&self) -> String {
        "scripted".to_string()
    }
}
