//! Transfer domain model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::account::Account;
use super::entry::Entry;
use super::result::{Error, Result};

/// The logical record of a money movement between two accounts.
/// Its accounting effect is the pair of entries created alongside it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    pub id: i64,
    pub from_account_id: i64,
    pub to_account_id: i64,
    pub amount: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateTransferParams {
    pub from_account_id: i64,
    pub to_account_id: i64,
    pub amount: i64,
}

/// Input of one transfer transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferTxParams {
    pub from_account_id: i64,
    pub to_account_id: i64,
    pub amount: i64,
}

/// Everything one successful transfer transaction produced
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferTxResult {
    pub transfer: Transfer,
    pub from_account: Account,
    pub to_account: Account,
    pub from_entry: Entry,
    pub to_entry: Entry,
}

impl From<TransferTxParams> for CreateTransferParams {
    fn from(params: TransferTxParams) -> Self {
        Self {
            from_account_id: params.from_account_id,
            to_account_id: params.to_account_id,
            amount: params.amount,
        }
    }
}

impl TransferTxParams {
    pub fn new(from_account_id: i64, to_account_id: i64, amount: i64) -> Self {
        Self {
            from_account_id,
            to_account_id,
            amount,
        }
    }

    /// Caller-side checks the transfer engine itself does not make.
    ///
    /// Resulting balances are not checked: overdrafts are allowed.
    pub fn validate(&self) -> Result<()> {
        if self.amount <= 0 {
            return Err(Error::validation(format!(
                "transfer amount must be positive, got {}",
                self.amount
            )));
        }
        if self.from_account_id == self.to_account_id {
            return Err(Error::validation(format!(
                "cannot transfer from account {} to itself",
                self.from_account_id
            )));
        }
        Ok(())
    }

    /// Balance deltas in the order they must be applied.
    ///
    /// The lower account id always comes first, whichever side it is on, so
    /// every unit touching the same pair of accounts locks them in the same
    /// order. Account ids must come from a single monotonically assigned
    /// identity space for this to hold.
    pub fn ordered_deltas(&self) -> [(i64, i64); 2] {
        let debit = (self.from_account_id, -self.amount);
        let credit = (self.to_account_id, self.amount);
        if self.from_account_id < self.to_account_id {
            [debit, credit]
        } else {
            [credit, debit]
        }
    }
}
