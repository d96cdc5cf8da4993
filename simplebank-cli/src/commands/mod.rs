//! CLI command implementations

pub mod account;
pub mod doctor;
pub mod entry;
pub mod status;
pub mod transfer;

use std::path::PathBuf;

use anyhow::{Context, Result};
use simplebank_core::config::Config;
use simplebank_core::{logging, LedgerContext};

/// Get the data directory from environment or default
pub fn get_data_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("SIMPLEBANK_DIR") {
        return Ok(PathBuf::from(dir));
    }
    let home = dirs::home_dir().context("Could not find home directory")?;
    Ok(home.join(".simplebank"))
}

/// Load configuration, start logging and open the ledger
pub fn get_context() -> Result<LedgerContext> {
    let data_dir = get_data_dir()?;

    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("Failed to create data directory: {}", data_dir.display()))?;

    let config = Config::load(&data_dir).context("Failed to load settings")?;
    logging::init(&config.logging);

    LedgerContext::open(&data_dir, config).context("Failed to open ledger")
}
