//! Ledger store port - row access for accounts, entries and transfers

use std::sync::Arc;

use crate::domain::result::Result;
use crate::domain::{
    Account, AddAccountBalanceParams, CreateAccountParams, CreateEntryParams,
    CreateTransferParams, Entry, LedgerSummary, ListEntriesParams, ListParams,
    ListTransfersParams, Transfer, UpdateAccountParams, UpdateEntryParams,
};

/// Plain CRUD over the three ledger tables
///
/// No business rules live here. Implementations return `Error::NotFound` for
/// missing ids and `Error::ConstraintViolation` when the store refuses a write
/// (unknown account on insert, referenced account on delete, overflow).
///
/// The same trait is implemented by an adapter's autocommit handle and by the
/// unit-scoped handle passed into [`UnitOfWork::run_in_transaction`].
///
/// [`UnitOfWork::run_in_transaction`]: super::UnitOfWork::run_in_transaction
pub trait LedgerStore {
    // === Accounts ===

    fn create_account(&self, params: &CreateAccountParams) -> Result<Account>;

    fn get_account(&self, id: i64) -> Result<Account>;

    /// Accounts ordered by id
    fn list_accounts(&self, params: &ListParams) -> Result<Vec<Account>>;

    /// Overwrite an account balance
    fn update_account(&self, params: &UpdateAccountParams) -> Result<Account>;

    /// Atomically add `params.amount` to the stored balance and return the new row.
    ///
    /// Must be a single read-modify-write inside the store so concurrent
    /// callers cannot lose each other's updates.
    fn add_account_balance(&self, params: &AddAccountBalanceParams) -> Result<Account>;

    fn delete_account(&self, id: i64) -> Result<()>;

    // === Entries ===

    fn create_entry(&self, params: &CreateEntryParams) -> Result<Entry>;

    fn get_entry(&self, id: i64) -> Result<Entry>;

    /// Entries ordered by id, optionally restricted to one account
    fn list_entries(&self, params: &ListEntriesParams) -> Result<Vec<Entry>>;

    fn update_entry(&self, params: &UpdateEntryParams) -> Result<Entry>;

    fn delete_entry(&self, id: i64) -> Result<()>;

    // === Transfers ===

    fn create_transfer(&self, params: &CreateTransferParams) -> Result<Transfer>;

    fn get_transfer(&self, id: i64) -> Result<Transfer>;

    /// Transfers ordered by id, optionally filtered by either side
    fn list_transfers(&self, params: &ListTransfersParams) -> Result<Vec<Transfer>>;

    fn delete_transfer(&self, id: i64) -> Result<()>;

    // === Aggregates ===

    fn summarize(&self) -> Result<LedgerSummary>;
}

/// A store handle that can be shared between threads
pub type SharedStore = Arc<dyn LedgerStore + Send + Sync>;
