//! Command-line interface definition for relaychat
//!
//! This module defines the CLI structure using clap's derive API,
//! providing commands for running the API server, the interactive
//! terminal client, and a one-shot session listing.

use clap::{Parser, Subcommand};

/// relaychat - streaming chat relay
///
/// Relays chat prompts to a Gemini model and keeps per-session history
/// in a relational store.
#[derive(Parser, Debug, Clone)]
#[command(name = "relaychat")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/config.yaml")]
    pub config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands for relaychat
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Run the HTTP API server
    Serve {
        /// Address to bind (overrides server.host)
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on (overrides server.port)
        #[arg(short, long)]
        port: Option<u16>,

        /// Session store backend (sqlite, supabase)
        #[arg(short, long)]
        store: Option<String>,
    },

    /// Start the interactive terminal chat client
    Chat {
        /// Base URL of a running relaychat server
        #[arg(long)]
        server: Option<String>,

        /// Resume an existing session instead of starting a new one
        #[arg(long)]
        session: Option<String>,

        /// Prompt to send before reading interactive input
        #[arg(long)]
        prompt: Option<String>,
    },

    /// List stored sessions from a running server
    Sessions {
        /// Base URL of a running relaychat server
        #[arg(long)]
        server: Option<String>,

        /// Print the raw JSON list instead of a table
        #[arg(long)]
        json: bool,
    },
}

impl Cli {
    /// Parse command line arguments
    ///
    /// # Returns
    ///
    /// Returns the parsed CLI structure
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

impl Default for Cli {
    fn default() -> Self {
        Self {
            config: Some("config/config.yaml".to_string()),
            verbose: false,
            command: Commands::Serve {
                host: None,
                port: None,
                store: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_default() {
        let cli = Cli::default();
        assert_eq!(cli.config, Some("config/config.yaml".to_string()));
        assert!(!cli.verbose);
        assert!(matches!(cli.command, Commands::Serve { .. }));
    }

    #[test]
    fn test_cli_parse_serve_command() {
        let cli = Cli::try_parse_from([
            "relaychat", "serve", "--port", "9000", "--store", "supabase",
        ])
        .unwrap();
        match cli.command {
            Commands::Serve { port, store, .. } => {
                assert_eq!(port, Some(9000));
                assert_eq!(store.as_deref(), Some("supabase"));
            }
            other => panic!("Expected Serve, got {:?}", other),
        }
    }

    #[test]
    fn test_cli_parse_chat_command() {
        let cli = Cli::try_parse_from([
            "relaychat",
            "-v",
            "chat",
            "--server",
            "http://localhost:9000",
            "--prompt",
            "Hello",
        ])
        .unwrap();
        assert!(cli.verbose);
        match cli.command {
            Commands::Chat {
                server,
                session,
                prompt,
            } => {
                assert_eq!(server.as_deref(), Some("http://localhost:9000"));
                assert!(session.is_none());
                assert_eq!(prompt.as_deref(), Some("Hello"));
            }
            other => panic!("Expected Chat, got {:?}", other),
        }
    }

    #[test]
    fn test_cli_parse_sessions_json() {
        let cli = Cli::try_parse_from(["relaychat", "sessions", "--json"]).unwrap();
        assert!(matches!(cli.command, Commands::Sessions { json: true, .. }));
    }

    #[test]
    fn test_cli_rejects_unknown_command() {
        assert!(Cli::try_parse_from(["relaychat", "bogus"]).is_err());
    }
}
