//! Gemini provider implementation for relaychat
//!
//! Streams replies from the Generative Language API using
//! `models/{model}:streamGenerateContent?alt=sse`. Prior turns are sent as
//! `contents` with roles `user` and `model`, followed by the new user turn.

use crate::config::GeminiConfig;
use crate::error::{Result, RelayError};
use crate::providers::sse::parse_sse_stream;
use crate::providers::{ChatProvider, TextStream};
use crate::storage::{HistoryEntry, Role};

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

/// Default endpoint of the Generative Language API
pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com";

/// Gemini API provider
///
/// # Examples
///
/// ```no_run
/// use relaychat::config::GeminiConfig;
/// use relaychat::providers::{ChatProvider, GeminiProvider};
/// use futures::StreamExt;
///
/// # async fn example() -> relaychat::error::Result<()> {
/// let config = GeminiConfig {
///     api_key: Some("key".to_string()),
///     ..Default::default()
/// };
/// let provider = GeminiProvider::new(config)?;
/// let mut stream = provider.stream_chat(&[], "Hello!").await?;
/// while let Some(fragment) = stream.next().await {
///     print!("{}", fragment?);
/// }
/// # Ok(())
/// # }
/// ```
pub struct GeminiProvider {
    client: Client,
    config: GeminiConfig,
    api_key: String,
}

/// Request body for streamGenerateContent
#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(default)]
    role: String,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiPart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

/// One streamed chunk of a GenerateContentResponse
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiChunk {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(default)]
    prompt_feedback: Option<GeminiPromptFeedback>,
    #[serde(default)]
    error: Option<GeminiErrorBody>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    #[serde(default)]
    content: Option<GeminiContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorBody {
    #[serde(default)]
    code: Option<u16>,
    #[serde(default)]
    message: String,
}

impl GeminiProvider {
    /// Create a new Gemini provider
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::MissingCredentials`] when no API key is
    /// configured, or an error if the HTTP client cannot be built
    ///
    /// # Examples
    ///
    /// ```
    /// use relaychat::config::GeminiConfig;
    /// use relaychat::providers::GeminiProvider;
    ///
    /// let provider = GeminiProvider::new(GeminiConfig {
    ///     api_key: Some("key".to_string()),
    ///     ..Default::default()
    /// });
    /// assert!(provider.is_ok());
    /// ```
    pub fn new(config: GeminiConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| RelayError::MissingCredentials("gemini api key".to_string()))?;

        // No overall timeout: it would also cut long-running streams.
        // Response headers are bounded in `stream_chat`, body gaps by the idle timeout.
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.request_timeout_seconds))
            .user_agent(concat!("relaychat/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| {
                RelayError::UpstreamUnavailable(format!("Failed to create HTTP client: {}", e))
            })?;

        tracing::info!(
            "Initialized Gemini provider: api_base={}, model={}",
            config.api_base.as_deref().unwrap_or(DEFAULT_API_BASE),
            config.model
        );

        Ok(Self {
            client,
            config,
            api_key,
        })
    }

    /// Full URL of the streaming endpoint, without query string
    pub fn endpoint(&self) -> String {
        let base = self
            .config
            .api_base
            .as_deref()
            .unwrap_or(DEFAULT_API_BASE)
            .trim_end_matches('/');
        format!(
            "{}/v1beta/models/{}:streamGenerateContent",
            base, self.config.model
        )
    }

    fn build_request(history: &[HistoryEntry], message: &str) -> GeminiRequest {
        // Gemini rejects empty text parts; a stored empty reply contributes nothing
        let mut contents: Vec<GeminiContent> = history
            .iter()
            .filter_map(|entry| {
                let parts: Vec<GeminiPart> = entry
                    .parts
                    .iter()
                    .filter(|text| !text.is_empty())
                    .map(|text| GeminiPart {
                        text: Some(text.clone()),
                    })
                    .collect();
                (!parts.is_empty()).then(|| GeminiContent {
                    role: entry.role.as_str().to_string(),
                    parts,
                })
            })
            .collect();

        contents.push(GeminiContent {
            role: Role::User.as_str().to_string(),
            parts: vec![GeminiPart {
                text: Some(message.to_string()),
            }],
        });

        GeminiRequest { contents }
    }

    fn status_error(status: StatusCode, body: &str) -> RelayError {
        let detail = format!("Gemini returned error {}: {}", status, body);
        match status {
            StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => {
                RelayError::UpstreamTimeout(detail)
            }
            _ => RelayError::UpstreamUnavailable(detail),
        }
    }
}

/// Extract the text carried by one SSE data payload
///
/// Returns `Ok(None)` for chunks without text, such as the final chunk that
/// only carries a finish reason.
fn chunk_text(data: &str) -> std::result::Result<Option<String>, RelayError> {
    let chunk: GeminiChunk = serde_json::from_str(data).map_err(|e| {
        RelayError::StreamInterrupted(format!("Invalid Gemini stream chunk: {}", e))
    })?;

    if let Some(error) = chunk.error {
        return Err(RelayError::StreamInterrupted(format!(
            "Gemini stream error {}: {}",
            error.code.unwrap_or_default(),
            error.message
        )));
    }

    if let Some(reason) = chunk.prompt_feedback.and_then(|f| f.block_reason) {
        return Err(RelayError::StreamInterrupted(format!(
            "Prompt blocked by Gemini: {}",
            reason
        )));
    }

    let mut text = String::new();
    for candidate in chunk.candidates.into_iter().take(1) {
        if let Some(reason) = candidate.finish_reason.as_deref() {
            tracing::debug!("Gemini finish reason: {}", reason);
        }
        if let Some(content) = candidate.content {
            for part in content.parts {
                if let Some(part_text) = part.text {
                    text.push_str(&part_text);
                }
            }
        }
    }

    Ok((!text.is_empty()).then_some(text))
}

#[async_trait]
impl ChatProvider for GeminiProvider {
    async fn stream_chat(
        &self,
        history: &[HistoryEntry],
        message: &str,
    ) -> std::result::Result<TextStream, RelayError> {
        let request = Self::build_request(history, message);
        tracing::debug!(
            "Sending Gemini request: model={}, {} contents",
            self.config.model,
            request.contents.len()
        );

        let send = self
            .client
            .post(self.endpoint())
            .query(&[("alt", "sse")])
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send();

        let request_timeout = Duration::from_secs(self.config.request_timeout_seconds);
        let deadline = tokio::time::Instant::now() + request_timeout;
        let response = match tokio::time::timeout_at(deadline, send).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                tracing::error!("Gemini request failed: {}", e);
                return Err(RelayError::from_upstream_request(e));
            }
            Err(_) => {
                tracing::error!("Gemini did not respond within {:?}", request_timeout);
                return Err(RelayError::UpstreamTimeout(format!(
                    "no response from Gemini within {}s",
                    request_timeout.as_secs()
                )));
            }
        };

        let status = response.status();
        if !status.is_success() {
            let error_text = match tokio::time::timeout_at(deadline, response.text()).await {
                Ok(body) => body.unwrap_or_default(),
                Err(_) => {
                    tracing::warn!("Gemini error body not received within {:?}", request_timeout);
                    String::new()
                }
            };
            tracing::error!("Gemini returned error {}: {}", status, error_text);
            return Err(Self::status_error(status, &error_text));
        }

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let idle_timeout = Duration::from_secs(self.config.stream_idle_timeout_seconds);
        tokio::spawn(parse_sse_stream(
            response.bytes_stream(),
            event_tx,
            idle_timeout,
        ));

        let fragments = UnboundedReceiverStream::new(event_rx).filter_map(|event| {
            futures::future::ready(match event {
                Ok(data) => chunk_text(&data).transpose(),
                Err(e) => Some(Err(e)),
            })
        });

        Ok(Box::pin(fragments))
    }

    fn model_name(&self) -> String {
        self.config.model.clone()
    }
}
