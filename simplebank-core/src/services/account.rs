//! Account service - opening and maintaining accounts

use tracing::info;

use crate::domain::result::Result;
use crate::domain::{Account, CreateAccountParams, ListParams, UpdateAccountParams};
use crate::ports::SharedStore;

/// Account operations with input validation in front of the store
pub struct AccountService {
    store: SharedStore,
}

impl AccountService {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// Open a new account. The currency code is normalized to uppercase.
    pub fn open_account(&self, owner: &str, balance: i64, currency: &str) -> Result<Account> {
        let params = CreateAccountParams::new(owner.trim(), balance, currency);
        params.validate()?;

        let account = self.store.create_account(&params)?;
        info!(account_id = account.id, currency = %account.currency, "opened account");
        Ok(account)
    }

    pub fn get_account(&self, id: i64) -> Result<Account> {
        self.store.get_account(id)
    }

    pub fn list_accounts(&self, page: &ListParams) -> Result<Vec<Account>> {
        self.store.list_accounts(page)
    }

    /// Overwrite the stored balance, bypassing the entry trail
    pub fn set_balance(&self, id: i64, balance: i64) -> Result<Account> {
        let account = self
            .store
            .update_account(&UpdateAccountParams { id, balance })?;
        info!(account_id = id, balance, "balance overwritten");
        Ok(account)
    }

    /// Delete an account that has no entries or transfers
    pub fn close_account(&self, id: i64) -> Result<()> {
        self.store.delete_account(id)?;
        info!(account_id = id, "closed account");
        Ok(())
    }
}
