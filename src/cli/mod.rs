mod doctor;

use crate::config::Config;
use crate::context::RelayContext;
use crate::dispatch::Dispatcher;
use crate::drive::DriveStore;
use crate::drive::auth::DriveCredentials;
use crate::gateway::{self, GatewayState};
use crate::line::LineClient;
use crate::persist::{LocalLog, PgMessageStore};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "linedrop")]
#[command(about = "LINE chat archiver: text to Postgres, media to Google Drive")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the webhook server (default)
    Serve,
    /// Check configuration and connectivity to Postgres and Google Drive
    Doctor,
    /// Print a credentials JSON file as a single line for an env var
    EncodeCredentials {
        /// Path to the JSON file to flatten
        path: PathBuf,
    },
}

pub async fn run() -> Result<()> {
    // Local runs keep secrets in a .env file; absence is fine
    dotenv::dotenv().ok();

    let cli = Cli::parse();
    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve().await,
        Commands::Doctor => doctor::run().await,
        Commands::EncodeCredentials { path } => encode_credentials(&path),
    }
}

async fn serve() -> Result<()> {
    let config = Config::from_env()?;
    info!("linedrop {} starting", crate::VERSION);

    let line = Arc::new(LineClient::new(&config.line.access_token));

    let credentials = DriveCredentials::from_json(&config.drive.credentials_json)?;
    let drive = Arc::new(DriveStore::new(credentials, &config.drive.root_folder_id));

    let store = Arc::new(PgMessageStore::new(&config.database));
    // Schema init is best-effort like every other persistence call; a
    // down database at boot must not keep the webhook from coming up.
    if let Err(e) = store.init_schema().await {
        error!("failed to initialize messages table: {}", e);
    }

    let dispatcher = Dispatcher::new(
        RelayContext::new(),
        line,
        drive,
        store,
        LocalLog::new(&config.output_dir),
        config.user_mapping.clone(),
        config.persist_albums,
    );

    let state = GatewayState::new(&config.line.channel_secret, Arc::new(dispatcher));
    gateway::start(&config.server.host, config.server.port, state).await
}

/// Flatten a credentials JSON file to one compact line, ready to paste
/// into `GOOGLE_CREDENTIALS_JSON`.
fn encode_credentials(path: &PathBuf) -> Result<()> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let data: serde_json::Value = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse JSON from {}", path.display()))?;
    println!("{}", serde_json::to_string(&data)?);
    Ok(())
}
