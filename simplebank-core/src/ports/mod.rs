//! Port definitions (hexagonal architecture)
//!
//! Ports define the interfaces for the backing store. Services depend only on
//! these traits, not on concrete implementations.

mod ledger_store;
mod unit_of_work;

pub use ledger_store::{LedgerStore, SharedStore};
pub use unit_of_work::{settle, SharedUnitOfWork, UnitHandle, UnitOfWork};
