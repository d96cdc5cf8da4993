//! SimpleBank Core - ledger and transactional transfer engine
//!
//! This crate implements the ledger following hexagonal architecture:
//!
//! - **domain**: Accounts, entries, transfers and the error type
//! - **ports**: The ledger store and unit-of-work traits
//! - **services**: Transfer engine and the other use cases
//! - **adapters**: DuckDB and in-process implementations of the ports

pub mod adapters;
pub mod config;
pub mod domain;
pub mod logging;
pub mod migrations;
pub mod ports;
pub mod services;

use std::path::Path;
use std::sync::Arc;

use tracing::info;

use adapters::duckdb::DuckDbLedger;
use adapters::memory::MemoryLedger;
use config::Config;
use ports::{LedgerStore, SharedStore, SharedUnitOfWork, UnitOfWork};
use services::*;

// Re-export commonly used types at crate root
pub use domain::result::{Error, Result, TransferStep};
pub use domain::{
    Account, Entry, LedgerSummary, ListEntriesParams, ListParams, ListTransfersParams, Transfer,
    TransferTxParams, TransferTxResult,
};

/// Main context for SimpleBank operations
///
/// Holds the configuration, the backing store and every service, all wired to
/// the same store.
pub struct LedgerContext {
    pub config: Config,
    pub store: SharedStore,
    /// Runs caller-composed units against `store`
    pub units: SharedUnitOfWork,
    pub account_service: AccountService,
    pub transfer_service: TransferService,
    pub status_service: StatusService,
    pub doctor_service: DoctorService,
}

impl LedgerContext {
    /// Open the ledger configured for `dir`, migrating it if needed
    pub fn new(dir: &Path) -> Result<Self> {
        Self::open(dir, Config::load(dir)?)
    }

    /// Same as [`new`](LedgerContext::new) with an already loaded config.
    ///
    /// `database.inMemory` selects the in-process store; nothing is written
    /// to `dir` then.
    pub fn open(dir: &Path, config: Config) -> Result<Self> {
        let Some(db_path) = config.db_path(dir) else {
            info!(
                lock_timeout = ?config.ledger.lock_timeout(),
                "using in-process ledger"
            );
            return Ok(Self::in_process(config));
        };

        std::fs::create_dir_all(dir)?;
        let ledger = DuckDbLedger::open(&db_path)?;
        let migrations = ledger.ensure_schema()?;
        info!(
            path = ?ledger.db_path(),
            applied = migrations.applied.len(),
            "ledger opened"
        );

        Ok(Self::with_ledger(config, Arc::new(ledger)))
    }

    /// A throwaway in-process ledger, honoring the configured lock timeout
    pub fn in_process(config: Config) -> Self {
        let ledger = match config.ledger.lock_timeout() {
            Some(timeout) => MemoryLedger::with_lock_timeout(timeout),
            None => MemoryLedger::new(),
        };
        Self::with_ledger(config, Arc::new(ledger))
    }

    /// Wire every service to one ledger that is both store and unit executor
    pub fn with_ledger<L>(config: Config, ledger: Arc<L>) -> Self
    where
        L: LedgerStore + UnitOfWork + Send + Sync + 'static,
    {
        let store: SharedStore = ledger.clone();
        let units: SharedUnitOfWork = ledger;

        Self {
            config,
            account_service: AccountService::new(Arc::clone(&store)),
            transfer_service: TransferService::new(Arc::clone(&units), Arc::clone(&store)),
            status_service: StatusService::new(Arc::clone(&store)),
            doctor_service: DoctorService::new(Arc::clone(&store)),
            store,
            units,
        }
    }

    /// Page parameters using the configured page size
    pub fn page(&self, offset: i64) -> ListParams {
        ListParams::new(self.config.ledger.page_size, offset)
    }
}
