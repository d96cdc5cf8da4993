//! Shared helpers for the integration tests

#![allow(dead_code)]

use std::sync::Arc;

use rand::seq::SliceRandom;
use rand::Rng;
use tempfile::TempDir;

use simplebank_core::adapters::duckdb::DuckDbLedger;
use simplebank_core::adapters::memory::MemoryLedger;
use simplebank_core::domain::{Account, CreateAccountParams};
use simplebank_core::ports::LedgerStore;

// ============================================================================
// Random data
// ============================================================================

const CURRENCIES: &[&str] = &["USD", "EUR", "CAD"];

pub fn random_owner() -> String {
    let mut rng = rand::thread_rng();
    (0..6).map(|_| rng.gen_range(b'a'..=b'z') as char).collect()
}

pub fn random_money() -> i64 {
    rand::thread_rng().gen_range(0..=1000)
}

pub fn random_currency() -> &'static str {
    CURRENCIES
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or("USD")
}

pub fn random_account_params() -> CreateAccountParams {
    CreateAccountParams::new(random_owner(), random_money(), random_currency())
}

// ============================================================================
// Ledgers
// ============================================================================

/// DuckDB ledger in a fresh database file with the schema applied
pub fn duckdb_ledger(temp_dir: &TempDir) -> Arc<DuckDbLedger> {
    let ledger = DuckDbLedger::open(&temp_dir.path().join("test.duckdb"))
        .expect("Failed to open ledger");
    ledger.ensure_schema().expect("Failed to initialize schema");
    Arc::new(ledger)
}

pub fn memory_ledger() -> Arc<MemoryLedger> {
    Arc::new(MemoryLedger::new())
}

pub fn create_account(store: &dyn LedgerStore, balance: i64, currency: &str) -> Account {
    store
        .create_account(&CreateAccountParams::new(random_owner(), balance, currency))
        .expect("Failed to create account")
}

pub fn create_random_account(store: &dyn LedgerStore) -> Account {
    let params = random_account_params();
    let account = store
        .create_account(&params)
        .expect("Failed to create account");
    assert_eq!(account.owner, params.owner);
    assert_eq!(account.balance, params.balance);
    assert_eq!(account.currency, params.currency);
    account
}
