//! Provider module for relaychat
//!
//! This module contains the language-model abstraction and the Gemini
//! implementation used by the chat relay.

pub mod base;
pub mod gemini;
pub mod sse;

pub use base::{ChatProvider, TextStream};
pub use gemini::GeminiProvider;

use crate::config::ModelConfig;
use crate::error::Result;
use std::sync::Arc;

/// Create a provider instance from configuration
///
/// # Arguments
///
/// * `config` - Model configuration; `type` selects the implementation
///
/// # Errors
///
/// Returns error if the provider type is unknown or the provider cannot be
/// initialized (for example a missing API key)
///
/// # Examples
///
/// ```
/// use relaychat::config::ModelConfig;
/// use relaychat::providers::create_provider;
///
/// let mut config = ModelConfig::default();
/// config.gemini.api_key = Some("key".to_string());
/// let provider = create_provider(&config).unwrap();
/// assert_eq!(provider.model_name(), config.gemini.model);
/// ```
pub fn create_provider(config: &ModelConfig) -> Result<Arc<dyn ChatProvider>> {
    match config.provider_type.as_str() {
        "gemini" => Ok(Arc::new(GeminiProvider::new(config.gemini.clone())?)),
        other => Err(crate::error::RelayError::Config(format!(
            "Unknown provider type: {}",
            other
        ))
        .into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_provider_invalid_type() {
        let config = ModelConfig {
            provider_type: "invalid".to_string(),
            ..Default::default()
        };
        assert!(create_provider(&config).is_err());
    }

    #[test]
    fn test_create_provider_gemini_without_key_fails() {
        let config = ModelConfig::default();
        assert!(create_provider(&config).is_err());
    }

    #[test]
    fn test_create_provider_gemini() {
        let mut config = ModelConfig::default();
        config.gemini.api_key = Some("key".to_string());
        config.gemini.model = "gemini-test".to_string();
        let provider = create_provider(&config).unwrap();
        assert_eq!(provider.model_name(), "gemini-test");
    }
}
