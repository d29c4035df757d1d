//! Supabase session store
//!
//! Talks to the PostgREST table API of a hosted Supabase project
//! (`{url}/rest/v1/{table}`). Session creation is a single insert with
//! `resolution=ignore-duplicates`, so concurrent first messages on the same
//! session cannot produce a duplicate row or overwrite the first title.

use crate::config::SupabaseConfig;
use crate::error::{Result, RelayError};
use crate::storage::{Role, Session, StorageBackend, StoredMessage};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const SESSIONS_TABLE: &str = "sessions";
const HISTORY_TABLE: &str = "chat_history";

/// Session store backed by a Supabase project
pub struct SupabaseStorage {
    client: Client,
    rest_url: String,
    key: String,
}

#[derive(Debug, Serialize)]
struct NewSessionRow<'a> {
    session_id: &'a str,
    title: &'a str,
}

#[derive(Debug, Serialize)]
struct NewMessageRow<'a> {
    session_id: &'a str,
    role: Role,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct TitlePatch<'a> {
    title: &'a str,
}

#[derive(Debug, Deserialize)]
struct SessionRow {
    session_id: String,
    title: String,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct MessageRow {
    role: Role,
    content: String,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
}

impl SupabaseStorage {
    /// Create a client for the configured project
    ///
    /// # Errors
    ///
    /// Returns error if the URL or key is missing or the HTTP client cannot
    /// be built
    ///
    /// # Examples
    ///
    /// ```
    /// use relaychat::config::SupabaseConfig;
    /// use relaychat::storage::SupabaseStorage;
    ///
    /// let storage = SupabaseStorage::new(SupabaseConfig {
    ///     url: Some("https://example.supabase.co".to_string()),
    ///     key: Some("anon-key".to_string()),
    /// });
    /// assert!(storage.is_ok());
    /// ```
    pub fn new(config: SupabaseConfig) -> Result<Self> {
        let url = config
            .url
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| RelayError::MissingCredentials("supabase url".to_string()))?;
        let key = config
            .key
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| RelayError::MissingCredentials("supabase key".to_string()))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("relaychat/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| RelayError::Storage(format!("Failed to create HTTP client: {}", e)))?;

        let rest_url = format!("{}/rest/v1", url.trim_end_matches('/'));
        tracing::info!("Initialized Supabase session store: {}", rest_url);

        Ok(Self {
            client,
            rest_url,
            key,
        })
    }

    /// Base URL of the PostgREST API
    pub fn rest_url(&self) -> &str {
        &self.rest_url
    }

    fn table(&self, table: &str) -> String {
        format!("{}/{}", self.rest_url, table)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.key)
            .bearer_auth(&self.key)
    }

    /// Send a request and turn transport failures and non-2xx statuses into
    /// storage errors
    async fn send(&self, request: RequestBuilder, action: &str) -> Result<Response> {
        let response = self.authorize(request).send().await.map_err(|e| {
            RelayError::Storage(format!("Supabase {} request failed: {}", action, e))
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RelayError::Storage(format!(
                "Supabase {} returned {}: {}",
                action, status, body
            ))
            .into());
        }

        Ok(response)
    }
}

#[async_trait]
impl StorageBackend for SupabaseStorage {
    async fn ensure_session(&self, session_id: &str, title: &str) -> Result<()> {
        let request = self
            .client
            .post(self.table(SESSIONS_TABLE))
            .query(&[("on_conflict", "session_id")])
            .header("Prefer", "resolution=ignore-duplicates,return=minimal")
            .json(&NewSessionRow { session_id, title });
        self.send(request, "session upsert").await?;
        Ok(())
    }

    async fn insert_message(&self, session_id: &str, role: Role, content: &str) -> Result<()> {
        let request = self
            .client
            .post(self.table(HISTORY_TABLE))
            .header("Prefer", "return=minimal")
            .json(&NewMessageRow {
                session_id,
                role,
                content,
            });
        self.send(request, "message insert").await?;
        Ok(())
    }

    async fn list_sessions(&self) -> Result<Vec<Session>> {
        let request = self.client.get(self.table(SESSIONS_TABLE)).query(&[
            ("select", "session_id,title,created_at"),
            ("order", "created_at.desc"),
        ]);
        let rows: Vec<SessionRow> = self
            .send(request, "session list")
            .await?
            .json()
            .await
            .map_err(|e| RelayError::Storage(format!("Invalid session rows: {}", e)))?;

        Ok(rows
            .into_iter()
            .map(|row| Session {
                session_id: row.session_id,
                title: row.title,
                created_at: row.created_at.unwrap_or_else(Utc::now),
            })
            .collect())
    }

    async fn load_messages(&self, session_id: &str) -> Result<Vec<StoredMessage>> {
        let filter = format!("eq.{}", session_id);
        let request = self.client.get(self.table(HISTORY_TABLE)).query(&[
            ("select", "role,content,created_at"),
            ("session_id", filter.as_str()),
            ("order", "created_at.asc"),
        ]);
        let rows: Vec<MessageRow> = self
            .send(request, "history select")
            .await?
            .json()
            .await
            .map_err(|e| RelayError::Storage(format!("Invalid message rows: {}", e)))?;

        Ok(rows
            .into_iter()
            .map(|row| StoredMessage {
                session_id: session_id.to_string(),
                role: row.role,
                content: row.content,
                created_at: row.created_at.unwrap_or_else(Utc::now),
            })
            .collect())
    }

    async fn delete_session(&self, session_id: &str) -> Result<()> {
        let filter = format!("eq.{}", session_id);

        let request = self
            .client
            .delete(self.table(HISTORY_TABLE))
            .query(&[("session_id", filter.as_str())]);
        self.send(request, "history delete").await?;

        let request = self
            .client
            .delete(self.table(SESSIONS_TABLE))
            .query(&[("session_id", filter.as_str())]);
        self.send(request, "session delete").await?;

        Ok(())
    }

    async fn update_title(&self, session_id: &str, title: &str) -> Result<()> {
        let filter = format!("eq.{}", session_id);
        let request = self
            .client
            .patch(self.table(SESSIONS_TABLE))
            .query(&[("session_id", filter.as_str())])
            .header("Prefer", "return=minimal")
            .json(&TitlePatch { title });
        self.send(request, "title update").await?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "supabase"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_requires_url_and_key() {
        assert!(SupabaseStorage::new(SupabaseConfig::default()).is_err());
        assert!(SupabaseStorage::new(SupabaseConfig {
            url: Some("https://example.supabase.co".to_string()),
            key: None,
        })
        .is_err());
        assert!(SupabaseStorage::new(SupabaseConfig {
            url: Some("  ".to_string()),
            key: Some("k".to_string()),
        })
        .is_err());
    }

    #[test]
    fn test_rest_url_strips_trailing_slash() {
        let storage = SupabaseStorage::new(SupabaseConfig {
            url: Some("https://example.supabase.co/".to_string()),
            key: Some("anon-key".to_string()),
        })
        .unwrap();
        assert_eq!(storage.rest_url(), "https://example.supabase.co/rest/v1");
        assert_eq!(
            storage.table(SESSIONS_TABLE),
            "https://example.supabase.co/rest/v1/sessions"
        );
    }

    #[test]
    fn test_message_row_serializes_role_lowercase() {
        let row = NewMessageRow {
            session_id: "s1",
            role: Role::Model,
            content: "Hi",
        };
        let json = serde_json::to_value(&row).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"session_id": "s1", "role": "model", "content": "Hi"})
        );
    }

    #[test]
    fn test_session_row_accepts_postgres_timestamp() {
        let row: SessionRow = serde_json::from_str(
            r#"{"session_id":"s1","title":"Hello","created_at":"2024-05-01T10:00:00.123456+00:00"}"#,
        )
        .unwrap();
        assert_eq!(row.session_id, "s1");
        assert!(row.created_at.is_some());
    }
}
