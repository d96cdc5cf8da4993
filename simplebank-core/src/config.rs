//! Configuration management
//!
//! Settings live in `settings.json` inside the data directory:
//! ```json
//! {
//!   "database": { "file": "simplebank.duckdb", "inMemory": false },
//!   "ledger": { "pageSize": 20, "lockTimeoutMs": 5000 },
//!   "logging": { "filter": "warn", "json": false }
//! }
//! ```
//! Every field is optional. A few can be overridden from the environment
//! (`SIMPLEBANK_DB_FILE`, `SIMPLEBANK_IN_MEMORY`, `SIMPLEBANK_LOG`,
//! `SIMPLEBANK_LOG_JSON`), mostly for CI and tests.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::page::DEFAULT_PAGE_SIZE;
use crate::domain::result::{Error, Result};

const SETTINGS_FILE: &str = "settings.json";

/// Default database file name inside the data directory
pub const DEFAULT_DB_FILE: &str = "simplebank.duckdb";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DatabaseConfig {
    /// Relative paths resolve against the data directory
    pub file: String,
    /// Use the in-process store instead of a database file. Nothing is
    /// persisted and `ledger.lockTimeoutMs` applies.
    pub in_memory: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            file: DEFAULT_DB_FILE.to_string(),
            in_memory: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LedgerConfig {
    pub page_size: i64,
    /// Bound on row-lock waits of the in-process store (`database.inMemory`);
    /// waits are unbounded when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lock_timeout_ms: Option<u64>,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            lock_timeout_ms: None,
        }
    }
}

impl LedgerConfig {
    pub fn lock_timeout(&self) -> Option<Duration> {
        self.lock_timeout_ms.map(Duration::from_millis)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive, e.g. `info` or `simplebank_core=debug`
    pub filter: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "warn".to_string(),
            json: false,
        }
    }
}

/// SimpleBank configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub ledger: LedgerConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Load config from the data directory, then apply environment overrides
    ///
    /// A missing file yields the defaults. A malformed file is an error.
    pub fn load(dir: &Path) -> Result<Self> {
        let settings_path = dir.join(SETTINGS_FILE);

        let mut config: Config = if settings_path.exists() {
            let content = std::fs::read_to_string(&settings_path)?;
            serde_json::from_str(&content).map_err(|e| {
                Error::Config(format!("{}: {e}", settings_path.display()))
            })?
        } else {
            Config::default()
        };

        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Save config to the data directory, creating it if needed
    pub fn save(&self, dir: &Path) -> Result<()> {
        std::fs::create_dir_all(dir)?;
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(dir.join(SETTINGS_FILE), content)?;
        Ok(())
    }

    /// Path of the database file, `None` for an in-memory ledger
    pub fn db_path(&self, dir: &Path) -> Option<PathBuf> {
        if self.database.in_memory {
            return None;
        }
        let file = Path::new(&self.database.file);
        Some(if file.is_absolute() {
            file.to_path_buf()
        } else {
            dir.join(file)
        })
    }

    fn apply_env_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(file) = var("SIMPLEBANK_DB_FILE").filter(|f| !f.is_empty()) {
            self.database.file = file;
        }
        if let Some(flag) = var("SIMPLEBANK_IN_MEMORY").and_then(|v| parse_flag(&v)) {
            self.database.in_memory = flag;
        }
        if let Some(filter) = var("SIMPLEBANK_LOG").filter(|f| !f.is_empty()) {
            self.logging.filter = filter;
        }
        if let Some(flag) = var("SIMPLEBANK_LOG_JSON").and_then(|v| parse_flag(&v)) {
            self.logging.json = flag;
        }
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value {
        "true" | "1" | "yes" | "TRUE" | "YES" => Some(true),
        "false" | "0" | "no" | "FALSE" | "NO" => Some(false),
        _ => None,
    }
}
