//! relaychat - streaming chat relay library
//!
//! This library provides a small chat service: an HTTP API that relays user
//! messages to a language model, streams the reply back as it is generated,
//! and keeps every session's history in a session store.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - `storage`: Session store with SQLite and Supabase backends
//! - `providers`: Language-model abstraction and the Gemini implementation
//! - `relay`: Stores the user turn, streams the model reply, stores the reply
//! - `server`: HTTP API surface (axum)
//! - `client`: Terminal client for the HTTP API
//! - `config`: Configuration management and validation
//! - `error`: Error types and result aliases
//! - `cli`: Command-line interface definition
//!
//! # Example
//!
//! ```no_run
//! use relaychat::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config/config.yaml", &Default::default())?;
//!     config.validate_server()?;
//!     relaychat::server::run_server(&config).await
//! }
//! ```

pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod providers;
pub mod relay;
pub mod server;
pub mod storage;

pub use config::Config;
pub use error::{RelayError, Result};
pub use relay::ChatRelay;
pub use storage::SessionStore;

#[cfg(test)]
pub mod test_utils;
