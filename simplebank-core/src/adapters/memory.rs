//! In-process ledger store with row-level locking
//!
//! Behaves like a relational store running at read-committed isolation:
//! writes are buffered in the unit and become visible all at once on commit,
//! rows are locked exclusively on first write and stay locked until the unit
//! commits or discards, and readers never block.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::Utc;
use tracing::debug;

use super::row_locks::{LockMode, RowKey, RowLocks, UnitId};
use crate::domain::result::{Error, Result};
use crate::domain::{
    Account, AddAccountBalanceParams, CreateAccountParams, CreateEntryParams,
    CreateTransferParams, Entry, LedgerSummary, ListEntriesParams, ListParams,
    ListTransfersParams, Transfer, UpdateAccountParams, UpdateEntryParams,
};
use crate::ports::{settle, LedgerStore, UnitHandle, UnitOfWork};

#[derive(Default)]
struct Tables {
    accounts: BTreeMap<i64, Account>,
    entries: BTreeMap<i64, Entry>,
    transfers: BTreeMap<i64, Transfer>,
}

/// Pending writes of one unit; `None` marks a deleted row
#[derive(Default)]
struct Writes {
    accounts: BTreeMap<i64, Option<Account>>,
    entries: BTreeMap<i64, Option<Entry>>,
    transfers: BTreeMap<i64, Option<Transfer>>,
}

/// In-process ledger store
pub struct MemoryLedger {
    tables: Mutex<Tables>,
    locks: RowLocks,
    next_account_id: AtomicI64,
    next_entry_id: AtomicI64,
    next_transfer_id: AtomicI64,
    next_unit_id: AtomicU64,
}

impl Default for MemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryLedger {
    /// A ledger whose lock waits never time out
    pub fn new() -> Self {
        Self::build(None)
    }

    /// A ledger whose lock waits fail with `Error::LockTimeout` after `timeout`
    pub fn with_lock_timeout(timeout: Duration) -> Self {
        Self::build(Some(timeout))
    }

    fn build(lock_timeout: Option<Duration>) -> Self {
        Self {
            tables: Mutex::new(Tables::default()),
            locks: RowLocks::new(lock_timeout),
            next_account_id: AtomicI64::new(1),
            next_entry_id: AtomicI64::new(1),
            next_transfer_id: AtomicI64::new(1),
            next_unit_id: AtomicU64::new(1),
        }
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start a unit. It is discarded when dropped unfinished.
    pub fn begin(&self) -> MemoryUnit<'_> {
        MemoryUnit {
            ledger: self,
            id: self.next_unit_id.fetch_add(1, Ordering::Relaxed),
            writes: RefCell::new(Writes::default()),
            held: RefCell::new(Vec::new()),
            finished: Cell::new(false),
        }
    }

    /// Which unit currently holds the lock on an account row
    pub fn account_lock_holder(&self, account_id: i64) -> Option<UnitId> {
        self.locks.holder(RowKey::Account(account_id))
    }

    /// Rows currently locked by any unit, in any mode
    pub fn locked_rows(&self) -> usize {
        self.locks.locked_rows()
    }

    fn autocommit<T>(&self, op: impl FnOnce(&MemoryUnit<'_>) -> Result<T>) -> Result<T> {
        let unit = self.begin();
        match op(&unit) {
            Ok(value) => unit.commit().map(|()| value),
            Err(e) => {
                unit.discard()?;
                Err(e)
            }
        }
    }
}

impl UnitOfWork for MemoryLedger {
    fn run_in_transaction(
        &self,
        unit: &mut dyn FnMut(&dyn LedgerStore) -> Result<()>,
    ) -> Result<()> {
        let handle = self.begin();
        debug!(unit = handle.id, "unit begun");
        let outcome = unit(&handle);
        settle(handle, outcome)
    }
}

/// One open unit against a [`MemoryLedger`]
pub struct MemoryUnit<'a> {
    ledger: &'a MemoryLedger,
    id: UnitId,
    writes: RefCell<Writes>,
    held: RefCell<Vec<RowKey>>,
    finished: Cell<bool>,
}

impl MemoryUnit<'_> {
    pub fn id(&self) -> UnitId {
        self.id
    }

    fn lock(&self, key: RowKey, mode: LockMode) -> Result<()> {
        self.ledger.locks.acquire(key, self.id, mode)?;
        let mut held = self.held.borrow_mut();
        if !held.contains(&key) {
            held.push(key);
        }
        Ok(())
    }

    fn account(&self, id: i64) -> Option<Account> {
        match self.writes.borrow().accounts.get(&id) {
            Some(pending) => pending.clone(),
            None => self.ledger.tables().accounts.get(&id).cloned(),
        }
    }

    fn entry(&self, id: i64) -> Option<Entry> {
        match self.writes.borrow().entries.get(&id) {
            Some(pending) => pending.clone(),
            None => self.ledger.tables().entries.get(&id).cloned(),
        }
    }

    fn transfer(&self, id: i64) -> Option<Transfer> {
        match self.writes.borrow().transfers.get(&id) {
            Some(pending) => pending.clone(),
            None => self.ledger.tables().transfers.get(&id).cloned(),
        }
    }

    fn visible_accounts(&self) -> Vec<Account> {
        let committed = self.ledger.tables().accounts.clone();
        overlay(committed, &self.writes.borrow().accounts)
    }

    fn visible_entries(&self) -> Vec<Entry> {
        let committed = self.ledger.tables().entries.clone();
        overlay(committed, &self.writes.borrow().entries)
    }

    fn visible_transfers(&self) -> Vec<Transfer> {
        let committed = self.ledger.tables().transfers.clone();
        overlay(committed, &self.writes.borrow().transfers)
    }

    /// All three tables as of one instant, with this unit's writes on top
    fn visible(&self) -> (Vec<Account>, Vec<Entry>, Vec<Transfer>) {
        let (accounts, entries, transfers) = {
            let tables = self.ledger.tables();
            (
                tables.accounts.clone(),
                tables.entries.clone(),
                tables.transfers.clone(),
            )
        };
        let writes = self.writes.borrow();
        (
            overlay(accounts, &writes.accounts),
            overlay(entries, &writes.entries),
            overlay(transfers, &writes.transfers),
        )
    }

    fn write_account(&self, account: &Account) {
        self.writes
            .borrow_mut()
            .accounts
            .insert(account.id, Some(account.clone()));
    }

    /// Lock an account row and read it
    fn locked_account(&self, id: i64, mode: LockMode) -> Result<Account> {
        self.lock(RowKey::Account(id), mode)?;
        self.account(id)
            .ok_or_else(|| Error::not_found(format!("account {id}")))
    }

    /// Check a referenced account exists and keep it from being deleted
    /// until this unit finishes
    fn require_account(&self, id: i64, role: &str) -> Result<()> {
        self.lock(RowKey::Account(id), LockMode::KeyShare)?;
        match self.account(id) {
            Some(_) => Ok(()),
            None => Err(Error::constraint(format!("{role} account {id} does not exist"))),
        }
    }

    fn finish(&self) {
        if self.finished.replace(true) {
            return;
        }
        let held = self.held.take();
        self.ledger.locks.release_all(self.id, &held);
    }
}

fn overlay<T: Clone>(
    mut committed: BTreeMap<i64, T>,
    pending: &BTreeMap<i64, Option<T>>,
) -> Vec<T> {
    for (id, row) in pending {
        match row {
            Some(row) => {
                committed.insert(*id, row.clone());
            }
            None => {
                committed.remove(id);
            }
        }
    }
    committed.into_values().collect()
}

fn apply<T>(table: &mut BTreeMap<i64, T>, pending: BTreeMap<i64, Option<T>>) {
    for (id, row) in pending {
        match row {
            Some(row) => {
                table.insert(id, row);
            }
            None => {
                table.remove(&id);
            }
        }
    }
}

impl UnitHandle for MemoryUnit<'_> {
    fn commit(self) -> Result<()> {
        let writes = self.writes.take();
        {
            let mut tables = self.ledger.tables();
            apply(&mut tables.accounts, writes.accounts);
            apply(&mut tables.entries, writes.entries);
            apply(&mut tables.transfers, writes.transfers);
        }
        self.finish();
        debug!(unit = self.id, "unit committed");
        Ok(())
    }

    fn discard(self) -> Result<()> {
        self.writes.take();
        self.finish();
        Ok(())
    }
}

impl Drop for MemoryUnit<'_> {
    fn drop(&mut self) {
        if !self.finished.get() {
            debug!(unit = self.id, "unit dropped unfinished, discarding");
        }
        self.finish();
    }
}

impl LedgerStore for MemoryUnit<'_> {
    // === Accounts ===

    fn create_account(&self, params: &CreateAccountParams) -> Result<Account> {
        let account = Account {
            id: self.ledger.next_account_id.fetch_add(1, Ordering::SeqCst),
            owner: params.owner.clone(),
            balance: params.balance,
            currency: params.currency.clone(),
            created_at: Utc::now(),
        };
        self.write_account(&account);
        Ok(account)
    }

    fn get_account(&self, id: i64) -> Result<Account> {
        self.account(id)
            .ok_or_else(|| Error::not_found(format!("account {id}")))
    }

    fn list_accounts(&self, params: &ListParams) -> Result<Vec<Account>> {
        Ok(params.apply(self.visible_accounts()))
    }

    fn update_account(&self, params: &UpdateAccountParams) -> Result<Account> {
        let mut account = self.locked_account(params.id, LockMode::Update)?;
        account.balance = params.balance;
        self.write_account(&account);
        Ok(account)
    }

    fn add_account_balance(&self, params: &AddAccountBalanceParams) -> Result<Account> {
        let mut account = self.locked_account(params.id, LockMode::Update)?;
        account.balance = account.balance.checked_add(params.amount).ok_or_else(|| {
            Error::constraint(format!(
                "balance of account {} overflows adding {}",
                params.id, params.amount
            ))
        })?;
        self.write_account(&account);
        Ok(account)
    }

    fn delete_account(&self, id: i64) -> Result<()> {
        self.locked_account(id, LockMode::Delete)?;
        let (_, entries, transfers) = self.visible();
        let references = entries.iter().filter(|e| e.account_id == id).count()
            + transfers
                .iter()
                .filter(|t| t.from_account_id == id || t.to_account_id == id)
                .count();
        if references > 0 {
            return Err(Error::constraint(format!(
                "account {id} is still referenced by {references} entries or transfers"
            )));
        }
        self.writes.borrow_mut().accounts.insert(id, None);
        Ok(())
    }

    // === Entries ===

    fn create_entry(&self, params: &CreateEntryParams) -> Result<Entry> {
        self.require_account(params.account_id, "entry")?;
        let entry = Entry {
            id: self.ledger.next_entry_id.fetch_add(1, Ordering::SeqCst),
            account_id: params.account_id,
            amount: params.amount,
            created_at: Utc::now(),
        };
        self.writes
            .borrow_mut()
            .entries
            .insert(entry.id, Some(entry.clone()));
        Ok(entry)
    }

    fn get_entry(&self, id: i64) -> Result<Entry> {
        self.entry(id)
            .ok_or_else(|| Error::not_found(format!("entry {id}")))
    }

    fn list_entries(&self, params: &ListEntriesParams) -> Result<Vec<Entry>> {
        let entries = self
            .visible_entries()
            .into_iter()
            .filter(|e| params.account_id.map_or(true, |id| e.account_id == id));
        Ok(params.page.apply(entries))
    }

    fn update_entry(&self, params: &UpdateEntryParams) -> Result<Entry> {
        self.lock(RowKey::Entry(params.id), LockMode::Update)?;
        let mut entry = self
            .entry(params.id)
            .ok_or_else(|| Error::not_found(format!("entry {}", params.id)))?;
        entry.amount = params.amount;
        self.writes
            .borrow_mut()
            .entries
            .insert(entry.id, Some(entry.clone()));
        Ok(entry)
    }

    fn delete_entry(&self, id: i64) -> Result<()> {
        self.lock(RowKey::Entry(id), LockMode::Delete)?;
        if self.entry(id).is_none() {
            return Err(Error::not_found(format!("entry {id}")));
        }
        self.writes.borrow_mut().entries.insert(id, None);
        Ok(())
    }

    // === Transfers ===

    fn create_transfer(&self, params: &CreateTransferParams) -> Result<Transfer> {
        if params.amount <= 0 {
            return Err(Error::constraint(format!(
                "transfer amount must be positive, got {}",
                params.amount
            )));
        }
        self.require_account(params.from_account_id, "from")?;
        self.require_account(params.to_account_id, "to")?;
        let transfer = Transfer {
            id: self.ledger.next_transfer_id.fetch_add(1, Ordering::SeqCst),
            from_account_id: params.from_account_id,
            to_account_id: params.to_account_id,
            amount: params.amount,
            created_at: Utc::now(),
        };
        self.writes
            .borrow_mut()
            .transfers
            .insert(transfer.id, Some(transfer.clone()));
        Ok(transfer)
    }

    fn get_transfer(&self, id: i64) -> Result<Transfer> {
        self.transfer(id)
            .ok_or_else(|| Error::not_found(format!("transfer {id}")))
    }

    fn list_transfers(&self, params: &ListTransfersParams) -> Result<Vec<Transfer>> {
        let transfers = self
            .visible_transfers()
            .into_iter()
            .filter(|t| params.matches(t.from_account_id, t.to_account_id));
        Ok(params.page.apply(transfers))
    }

    fn delete_transfer(&self, id: i64) -> Result<()> {
        self.lock(RowKey::Transfer(id), LockMode::Delete)?;
        if self.transfer(id).is_none() {
            return Err(Error::not_found(format!("transfer {id}")));
        }
        self.writes.borrow_mut().transfers.insert(id, None);
        Ok(())
    }

    // === Aggregates ===

    fn summarize(&self) -> Result<LedgerSummary> {
        let (accounts, entries, transfers) = self.visible();

        let mut balances_by_currency = BTreeMap::new();
        for account in &accounts {
            *balances_by_currency
                .entry(account.currency.clone())
                .or_insert(0i64) += account.balance;
        }

        Ok(LedgerSummary {
            account_count: accounts.len() as i64,
            entry_count: entries.len() as i64,
            transfer_count: transfers.len() as i64,
            entry_net: entries.iter().map(|e| e.amount).sum(),
            transfer_volume: transfers.iter().map(|t| t.amount).sum(),
            balances_by_currency,
        })
    }
}

impl LedgerStore for MemoryLedger {
    fn create_account(&self, params: &CreateAccountParams) -> Result<Account> {
        self.autocommit(|u| u.create_account(params))
    }

    fn get_account(&self, id: i64) -> Result<Account> {
        self.autocommit(|u| u.get_account(id))
    }

    fn list_accounts(&self, params: &ListParams) -> Result<Vec<Account>> {
        self.autocommit(|u| u.list_accounts(params))
    }

    fn update_account(&self, params: &UpdateAccountParams) -> Result<Account> {
        self.autocommit(|u| u.update_account(params))
    }

    fn add_account_balance(&self, params: &AddAccountBalanceParams) -> Result<Account> {
        self.autocommit(|u| u.add_account_balance(params))
    }

    fn delete_account(&self, id: i64) -> Result<()> {
        self.autocommit(|u| u.delete_account(id))
    }

    fn create_entry(&self, params: &CreateEntryParams) -> Result<Entry> {
        self.autocommit(|u| u.create_entry(params))
    }

    fn get_entry(&self, id: i64) -> Result<Entry> {
        self.autocommit(|u| u.get_entry(id))
    }

    fn list_entries(&self, params: &ListEntriesParams) -> Result<Vec<Entry>> {
        self.autocommit(|u| u.list_entries(params))
    }

    fn update_entry(&self, params: &UpdateEntryParams) -> Result<Entry> {
        self.autocommit(|u| u.update_entry(params))
    }

    fn delete_entry(&self, id: i64) -> Result<()> {
        self.autocommit(|u| u.delete_entry(id))
    }

    fn create_transfer(&self, params: &CreateTransferParams) -> Result<Transfer> {
        self.autocommit(|u| u.create_transfer(params))
    }

    fn get_transfer(&self, id: i64) -> Result<Transfer> {
        self.autocommit(|u| u.get_transfer(id))
    }

    fn list_transfers(&self, params: &ListTransfersParams) -> Result<Vec<Transfer>> {
        self.autocommit(|u| u.list_transfers(params))
    }

    fn delete_transfer(&self, id: i64) -> Result<()> {
        self.autocommit(|u| u.delete_transfer(id))
    }

    fn summarize(&self) -> Result<LedgerSummary> {
        self.autocommit(|u| u.summarize())
    }
}
