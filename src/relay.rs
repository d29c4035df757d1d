//! Chat relay
//!
//! Connects a session to the model: the user turn is stored before the model
//! is called, fragments are forwarded as they arrive, and the assembled reply
//! is stored once the model stream ends.

use crate::error::RelayError;
use crate::providers::{ChatProvider, TextStream};
use crate::storage::{Role, SessionStore};
use futures::StreamExt;
use std::sync::Arc;

/// Relays one user message at a time to the model and back
#[derive(Clone)]
pub struct ChatRelay {
    store: Arc<SessionStore>,
    provider: Arc<dyn ChatProvider>,
}

/// Per-stream state threaded through `unfold`
struct ReplyState {
    upstream: TextStream,
    store: Arc<SessionStore>,
    session_id: String,
    reply: String,
    finished: bool,
}

impl ChatRelay {
    /// Create a relay over a shared store and provider
    pub fn new(store: Arc<SessionStore>, provider: Arc<dyn ChatProvider>) -> Self {
        Self { store, provider }
    }

    /// The session store used by this relay
    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    /// The model provider used by this relay
    pub fn provider(&self) -> &Arc<dyn ChatProvider> {
        &self.provider
    }

    /// Store `message`, ask the model to continue the session, and return
    /// the reply as a stream of fragments
    ///
    /// The returned stream is lazy: nothing is read from the model until it
    /// is polled. When it ends normally the concatenated fragments are stored
    /// as a model message. When it yields an `Err` it stops and the partial
    /// reply is discarded. Dropping it early also discards the reply.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Storage`] when the user message cannot be
    /// stored, or the provider's error when the model stream cannot be
    /// opened. No fragment has been produced in either case.
    pub async fn stream_reply(
        &self,
        session_id: &str,
        message: &str,
    ) -> Result<TextStream, RelayError> {
        self.store
            .add_message(session_id, Role::User, message)
            .await
            .map_err(|e| RelayError::Storage(format!("{:#}", e)))?;

        let mut history = self.store.get_chat_history(session_id).await;
        // The stored user turn goes out as `message`, not as history
        history.pop();

        tracing::debug!(
            "Relaying message for {} with {} prior turns to {}",
            session_id,
            history.len(),
            self.provider.model_name()
        );

        let upstream = self.provider.stream_chat(&history, message).await?;

        let state = ReplyState {
            upstream,
            store: Arc::clone(&self.store),
            session_id: session_id.to_string(),
            reply: String::new(),
            finished: false,
        };

        Ok(Box::pin(futures::stream::unfold(state, next_fragment)))
    }
}

async fn next_fragment(
    mut state: ReplyState,
) -> Option<(Result<String, RelayError>, ReplyState)> {
    if state.finished {
        return None;
    }

    loop {
        match state.upstream.next().await {
            Some(Ok(fragment)) if fragment.is_empty() => continue,
            Some(Ok(fragment)) => {
                state.reply.push_str(&fragment);
                return Some((Ok(fragment), state));
            }
            Some(Err(e)) => {
                tracing::warn!(
                    "Model stream for {} failed after {} bytes: {}",
                    state.session_id,
                    state.reply.len(),
                    e
                );
                state.finished = true;
                return Some((Err(e), state));
            }
            None => {
                if let Err(e) = state
                    .store
                    .add_message(&state.session_id, Role::Model, &state.reply)
                    .await
                {
                    tracing::error!(
                        "Failed to store model reply for {}: {:#}",
                        state.session_id,
                        e
                    );
                }
                return None;
            }
        }
    }
}
