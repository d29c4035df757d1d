//! Base provider trait for relaychat
//!
//! This module defines the [`ChatProvider`] trait that language-model
//! backends implement, along with the fragment stream type they return.

use crate::error::RelayError;
use crate::storage::HistoryEntry;
use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;

/// Ordered, finite stream of text fragments produced by a model
///
/// An `Err` item ends the useful part of the stream; consumers stop at the
/// first error.
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String, RelayError>> + Send>>;

/// Language-model backend able to continue a conversation in streaming mode
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Continue a conversation
    ///
    /// # Arguments
    ///
    /// * `history` - Prior turns, oldest first, excluding `message`
    /// * `message` - The new user turn
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::UpstreamUnavailable`] or
    /// [`RelayError::UpstreamTimeout`] when the stream cannot be opened.
    /// Failures after the stream opened arrive as `Err` items.
    async fn stream_chat(
        &self,
        history: &[HistoryEntry],
        message: &str,
    ) -> Result<TextStream, RelayError>;

    /// Name of the model in use
    fn model_name(&self) -> String;
}
