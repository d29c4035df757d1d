//! Configuration management for relaychat
//!
//! This module handles loading, parsing, validating, and managing
//! configuration from files, environment variables, and CLI overrides.
//!
//! Precedence, lowest first: built-in defaults, the YAML file, environment
//! variables (including a `.env` file loaded by the binary), CLI flags.

use crate::cli::{Cli, Commands};
use crate::error::{Result, RelayError};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration structure for relaychat
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// HTTP API server settings
    #[serde(default)]
    pub server: ServerConfig,
    /// Session store settings
    #[serde(default)]
    pub store: StoreConfig,
    /// Language model settings
    #[serde(default)]
    pub model: ModelConfig,
    /// Terminal client settings
    #[serde(default)]
    pub client: ClientConfig,
}

/// HTTP API server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to bind
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Session store configuration
///
/// Selects the backend and carries the settings of each backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Backend to use: "sqlite" or "supabase"
    #[serde(default = "default_store_backend")]
    pub backend: String,

    /// Local SQLite settings
    #[serde(default)]
    pub sqlite: SqliteConfig,

    /// Hosted Supabase settings
    #[serde(default)]
    pub supabase: SupabaseConfig,
}

fn default_store_backend() -> String {
    "sqlite".to_string()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_store_backend(),
            sqlite: SqliteConfig::default(),
            supabase: SupabaseConfig::default(),
        }
    }
}

/// SQLite backend configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SqliteConfig {
    /// Database file; the user data directory is used when unset
    #[serde(default)]
    pub path: Option<String>,
}

/// Supabase (PostgREST) backend configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SupabaseConfig {
    /// Project URL, e.g. `https://xyz.supabase.co`
    #[serde(default)]
    pub url: Option<String>,

    /// API key sent as `apikey` and bearer token
    #[serde(default)]
    pub key: Option<String>,
}

/// Language model configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Type of provider to use
    #[serde(rename = "type", default = "default_model_provider")]
    pub provider_type: String,

    /// Gemini configuration
    #[serde(default)]
    pub gemini: GeminiConfig,
}

fn default_model_provider() -> String {
    "gemini".to_string()
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider_type: default_model_provider(),
            gemini: GeminiConfig::default(),
        }
    }
}

/// Gemini provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    /// API key (usually supplied through `GOOGLE_API_KEY`)
    #[serde(default)]
    pub api_key: Option<String>,

    /// Model to use
    #[serde(default = "default_gemini_model")]
    pub model: String,

    /// Optional API base URL (useful for tests and local mocks)
    #[serde(default)]
    pub api_base: Option<String>,

    /// Time allowed to connect and receive response headers (seconds)
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,

    /// Longest allowed gap between two stream fragments (seconds)
    #[serde(default = "default_stream_idle_timeout")]
    pub stream_idle_timeout_seconds: u64,
}

fn default_gemini_model() -> String {
    "gemini-3-flash-preview".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

fn default_stream_idle_timeout() -> u64 {
    60
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: default_gemini_model(),
            api_base: None,
            request_timeout_seconds: default_request_timeout(),
            stream_idle_timeout_seconds: default_stream_idle_timeout(),
        }
    }
}

/// Terminal client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL of the relaychat API server
    #[serde(default = "default_server_url")]
    pub server_url: String,
}

fn default_server_url() -> String {
    "http://localhost:8000".to_string()
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
        }
    }
}

impl Config {
    /// Load configuration from file with environment and CLI overrides
    ///
    /// # Arguments
    ///
    /// * `path` - Path to configuration file
    /// * `cli` - CLI arguments for overrides
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but cannot be read or parsed
    pub fn load(path: &str, cli: &Cli) -> Result<Self> {
        let mut config = if Path::new(path).exists() {
            Self::from_file(path)?
        } else {
            tracing::warn!("Config file not found at {}, using defaults", path);
            Self::default()
        };

        config.apply_env_vars();
        config.apply_cli_overrides(cli);

        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| RelayError::Config(format!("Failed to read config file: {}", e)))?;
        serde_yaml::from_str(&contents)
            .map_err(|e| RelayError::Config(format!("Failed to parse config: {}", e)).into())
    }

    fn apply_env_vars(&mut self) {
        // Credentials use the names the hosted services document
        if let Ok(url) = std::env::var("SUPABASE_URL") {
            self.store.supabase.url = Some(url);
        }

        if let Ok(key) = std::env::var("SUPABASE_KEY") {
            self.store.supabase.key = Some(key);
        }

        if let Ok(api_key) = std::env::var("GOOGLE_API_KEY") {
            self.model.gemini.api_key = Some(api_key);
        }

        if let Ok(host) = std::env::var("RELAYCHAT_HOST") {
            self.server.host = host;
        }

        if let Ok(port) = std::env::var("RELAYCHAT_PORT") {
            if let Ok(value) = port.parse() {
                self.server.port = value;
            } else {
                tracing::warn!("Invalid RELAYCHAT_PORT: {}", port);
            }
        }

        if let Ok(backend) = std::env::var("RELAYCHAT_STORE") {
            self.store.backend = backend;
        }

        if let Ok(path) = std::env::var("RELAYCHAT_SQLITE_PATH") {
            self.store.sqlite.path = Some(path);
        }

        if let Ok(model) = std::env::var("RELAYCHAT_GEMINI_MODEL") {
            self.model.gemini.model = model;
        }

        if let Ok(api_base) = std::env::var("RELAYCHAT_GEMINI_API_BASE") {
            self.model.gemini.api_base = Some(api_base);
        }

        if let Ok(timeout) = std::env::var("RELAYCHAT_STREAM_IDLE_TIMEOUT_SECONDS") {
            if let Ok(value) = timeout.parse() {
                self.model.gemini.stream_idle_timeout_seconds = value;
            } else {
                tracing::warn!("Invalid RELAYCHAT_STREAM_IDLE_TIMEOUT_SECONDS: {}", timeout);
            }
        }

        if let Ok(server_url) = std::env::var("RELAYCHAT_SERVER_URL") {
            self.client.server_url = server_url;
        }
    }

    fn apply_cli_overrides(&mut self, cli: &Cli) {
        if cli.verbose {
            tracing::debug!("Verbose mode enabled");
        }

        match &cli.command {
            Commands::Serve { host, port, store } => {
                if let Some(host) = host {
                    self.server.host = host.clone();
                }
                if let Some(port) = port {
                    self.server.port = *port;
                }
                if let Some(store) = store {
                    self.store.backend = store.clone();
                }
            }
            Commands::Chat { server, .. } | Commands::Sessions { server, .. } => {
                if let Some(server) = server {
                    self.client.server_url = server.clone();
                }
            }
        }
    }

    /// Validate the configuration
    ///
    /// Ensures all configuration values are within acceptable ranges.
    /// Credentials are checked separately by [`Config::validate_server`]
    /// because the client commands never need them.
    ///
    /// # Errors
    ///
    /// Returns error if any validation check fails
    pub fn validate(&self) -> Result<()> {
        let valid_backends = ["sqlite", "supabase"];
        if !valid_backends.contains(&self.store.backend.as_str()) {
            return Err(RelayError::Config(format!(
                "Invalid store backend: {}. Must be one of: {}",
                self.store.backend,
                valid_backends.join(", ")
            ))
            .into());
        }

        let valid_providers = ["gemini"];
        if !valid_providers.contains(&self.model.provider_type.as_str()) {
            return Err(RelayError::Config(format!(
                "Invalid model provider: {}. Must be one of: {}",
                self.model.provider_type,
                valid_providers.join(", ")
            ))
            .into());
        }

        if self.server.port == 0 {
            return Err(RelayError::Config("server.port must be greater than 0".to_string()).into());
        }

        if self.model.gemini.model.trim().is_empty() {
            return Err(
                RelayError::Config("model.gemini.model cannot be empty".to_string()).into(),
            );
        }

        if self.model.gemini.request_timeout_seconds == 0 {
            return Err(RelayError::Config(
                "model.gemini.request_timeout_seconds must be greater than 0".to_string(),
            )
            .into());
        }

        if self.model.gemini.stream_idle_timeout_seconds == 0 {
            return Err(RelayError::Config(
                "model.gemini.stream_idle_timeout_seconds must be greater than 0".to_string(),
            )
            .into());
        }

        url::Url::parse(&self.client.server_url).map_err(|e| {
            RelayError::Config(format!(
                "Invalid client.server_url {}: {}",
                self.client.server_url, e
            ))
        })?;

        Ok(())
    }

    /// Validate the settings the API server needs on top of [`Config::validate`]
    ///
    /// # Errors
    ///
    /// Returns error if the Gemini key or the Supabase credentials are missing
    pub fn validate_server(&self) -> Result<()> {
        self.validate()?;

        if self.model.gemini.api_key.as_deref().unwrap_or("").is_empty() {
            return Err(RelayError::MissingCredentials(
                "gemini (set GOOGLE_API_KEY or model.gemini.api_key)".to_string(),
            )
            .into());
        }

        if self.store.backend == "supabase" {
            let supabase = &self.store.supabase;
            if supabase.url.as_deref().unwrap_or("").is_empty()
                || supabase.key.as_deref().unwrap_or("").is_empty()
            {
                return Err(RelayError::MissingCredentials(
                    "supabase (set SUPABASE_URL and SUPABASE_KEY)".to_string(),
                )
                .into());
            }
        }

        Ok(())
    }
}
