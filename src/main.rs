//! relaychat - streaming chat relay
//!
#![doc = "relaychat - streaming chat relay"]
#![doc = "Main entry point for the relaychat server and terminal client."]

use anyhow::Result;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use relaychat::cli::{Cli, Commands};
use relaychat::config::Config;
use relaychat::{client, server};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse_args();

    // Pick up credentials from a local .env file before reading the environment
    dotenv::dotenv().ok();

    // Initialize tracing
    init_tracing(cli.verbose);

    // Load configuration
    let config_path = cli.config.as_deref().unwrap_or("config/config.yaml");
    let config = Config::load(config_path, &cli)?;

    // Validate configuration
    config.validate()?;

    // Execute command
    match cli.command {
        Commands::Serve { .. } => {
            config.validate_server()?;
            tracing::info!("Starting API server");
            server::run_server(&config).await?;
            Ok(())
        }
        Commands::Chat {
            session, prompt, ..
        } => {
            tracing::info!("Starting interactive chat");
            if let Some(id) = &session {
                tracing::debug!("Resuming session: {}", id);
            }
            client::run_chat(&config.client.server_url, session, prompt).await?;
            Ok(())
        }
        Commands::Sessions { json, .. } => {
            client::run_sessions(&config.client.server_url, json).await?;
            Ok(())
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose {
        "relaychat=debug,tower_http=debug"
    } else {
        "relaychat=info,tower_http=info"
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
