//! HTTP client for the relaychat API

use crate::error::{RelayError, Result};
use crate::providers::sse::take_utf8_prefix;
use crate::storage::{HistoryEntry, SessionSummary};
use futures::StreamExt;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde_json::json;
use std::time::Duration;
use url::Url;

/// How a chat request ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatOutcome {
    /// The reply streamed to completion; holds the full text
    Completed(String),
    /// The server refused the request with this status code
    Rejected(u16),
}

/// Client for the relaychat HTTP API
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: Url,
}

impl ApiClient {
    /// Create a client for the server at `server_url`
    ///
    /// # Errors
    ///
    /// Returns error if the URL does not parse or the HTTP client cannot be
    /// built
    ///
    /// # Examples
    ///
    /// ```
    /// use relaychat::client::ApiClient;
    ///
    /// let api = ApiClient::new("http://localhost:8000").unwrap();
    /// assert_eq!(api.base_url(), "http://localhost:8000/");
    /// ```
    pub fn new(server_url: &str) -> Result<Self> {
        let base_url = Url::parse(server_url)
            .map_err(|e| RelayError::Config(format!("Invalid server URL {}: {}", server_url, e)))?;

        // Chat replies stream for as long as the model talks, so only the
        // connection is bounded.
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .user_agent(concat!("relaychat/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| RelayError::Client(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, base_url })
    }

    /// Base URL of the server
    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| RelayError::Config(format!("Server URL cannot be a base: {}", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn expect_success(response: Response, action: &str) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(RelayError::Client(format!("{} failed with {}: {}", action, status, body)).into())
    }

    async fn get_json<T: DeserializeOwned>(&self, segments: &[&str], action: &str) -> Result<T> {
        let response = self
            .client
            .get(self.endpoint(segments)?)
            .send()
            .await
            .map_err(|e| RelayError::Client(format!("{} failed: {}", action, e)))?;
        let response = Self::expect_success(response, action).await?;
        Ok(response
            .json()
            .await
            .map_err(|e| RelayError::Client(format!("{} returned invalid JSON: {}", action, e)))?)
    }

    /// All sessions, newest first
    pub async fn sessions(&self) -> Result<Vec<SessionSummary>> {
        self.get_json(&["sessions"], "Listing sessions").await
    }

    /// History of one session, oldest first
    pub async fn history(&self, session_id: &str) -> Result<Vec<HistoryEntry>> {
        self.get_json(&["history", session_id], "Loading history")
            .await
    }

    /// Send a message and stream the reply
    ///
    /// `on_fragment` is called with each piece of text as it arrives.
    ///
    /// # Errors
    ///
    /// Returns error if the server cannot be reached or the reply stream
    /// breaks before it completes
    pub async fn chat<F>(
        &self,
        session_id: &str,
        message: &str,
        mut on_fragment: F,
    ) -> Result<ChatOutcome>
    where
        F: FnMut(&str),
    {
        let response = self
            .client
            .post(self.endpoint(&["chat"])?)
            .json(&json!({ "session_id": session_id, "message": message }))
            .send()
            .await
            .map_err(|e| RelayError::Client(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            tracing::debug!("Chat request rejected with {}", status);
            return Ok(ChatOutcome::Rejected(status.as_u16()));
        }

        let mut reply = String::new();
        let mut pending: Vec<u8> = Vec::new();
        let mut body = response.bytes_stream();
        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|e| RelayError::Client(format!("Reply interrupted: {}", e)))?;
            pending.extend_from_slice(&chunk);
            let text = take_utf8_prefix(&mut pending);
            if !text.is_empty() {
                on_fragment(&text);
                reply.push_str(&text);
            }
        }

        if !pending.is_empty() {
            let text = String::from_utf8_lossy(&pending).into_owned();
            on_fragment(&text);
            reply.push_str(&text);
        }

        Ok(ChatOutcome::Completed(reply))
    }

    /// Delete a session and its history
    pub async fn delete_session(&self, session_id: &str) -> Result<()> {
        let response = self
            .client
            .delete(self.endpoint(&["sessions", session_id])?)
            .send()
            .await
            .map_err(|e| RelayError::Client(format!("Deleting session failed: {}", e)))?;
        Self::expect_success(response, "Deleting session").await?;
        Ok(())
    }

    /// Rename a session
    pub async fn update_title(&self, session_id: &str, title: &str) -> Result<()> {
        let response = self
            .client
            .patch(self.endpoint(&["sessions", session_id, "title"])?)
            .json(&json!({ "title": title }))
            .send()
            .await
            .map_err(|e| RelayError::Client(format!("Updating title failed: {}", e)))?;
        Self::expect_success(response, "Updating title").await?;
        Ok(())
    }
}
