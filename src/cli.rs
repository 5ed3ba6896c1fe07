use anyhow::Result;
use clap::Parser;
use tracing::info;

use crate::{
    config::SyncConfig,
    sync::{DefaultSyncDriver, SyncOutcome},
    utils::logging::enable_logging,
};

/// Configuration comes from the environment or a `.env` file in the working directory
/// (COLD_TURKEY_DB_PATH, GOOGLE_SHEET_ID, GOOGLE_SERVICE_ACCOUNT_JSON, optionally
/// GOOGLE_SHEET_WORKSHEET, SYNC_CURSOR_PATH, SYNC_LOG_DIR), or from the toml file named by
/// COLDSHEET_CONFIG.
#[derive(Parser, Debug)]
#[command(name = "coldsheet", version, long_about = None)]
#[command(about = "Syncs completed days of Cold Turkey browsing time into a Google Sheet")]
struct Args {}

pub async fn run_cli() -> Result<SyncOutcome> {
    let Args {} = Args::parse();

    let config = SyncConfig::load()?;
    enable_logging(config.log_dir.as_deref(), None)?;

    let outcome = DefaultSyncDriver::from_config(&config)?.run().await?;
    info!("Finished: {outcome}");
    println!("{outcome}");
    Ok(outcome)
}
