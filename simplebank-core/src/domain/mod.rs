//! Core domain entities
//!
//! All ledger entities are defined here. These are pure data structures
//! with validation logic - no I/O or external dependencies.

mod account;
mod entry;
pub mod page;
pub mod result;
mod summary;
mod transfer;

pub use account::{Account, AddAccountBalanceParams, CreateAccountParams, UpdateAccountParams};
pub use entry::{CreateEntryParams, Entry, UpdateEntryParams};
pub use page::{ListEntriesParams, ListParams, ListTransfersParams};
pub use summary::LedgerSummary;
pub use transfer::{CreateTransferParams, Transfer, TransferTxParams, TransferTxResult};
