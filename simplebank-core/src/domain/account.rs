//! Account domain model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::result::{Error, Result};

/// A bank account holding a balance in minor currency units
///
/// The balance is whatever the ledger computed; it is allowed to go negative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: i64,
    pub owner: String,
    pub balance: i64,
    /// ISO 4217 currency code, normalized to uppercase
    pub currency: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateAccountParams {
    pub owner: String,
    pub balance: i64,
    pub currency: String,
}

/// Overwrite the stored balance of an account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateAccountParams {
    pub id: i64,
    pub balance: i64,
}

/// Add a signed delta to the stored balance, server side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddAccountBalanceParams {
    pub id: i64,
    pub amount: i64,
}

impl Account {
    /// Normalize currency code to uppercase
    pub fn normalize_currency(currency: &str) -> String {
        currency.trim().to_uppercase()
    }
}

impl CreateAccountParams {
    pub fn new(owner: impl Into<String>, balance: i64, currency: &str) -> Self {
        Self {
            owner: owner.into(),
            balance,
            currency: Account::normalize_currency(currency),
        }
    }

    /// Validate account data before it reaches the store
    pub fn validate(&self) -> Result<()> {
        if self.owner.trim().is_empty() {
            return Err(Error::validation("account owner cannot be empty"));
        }
        let currency = self.currency.trim();
        if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(Error::validation(format!(
                "currency must be a 3-letter code, got '{}'",
                self.currency
            )));
        }
        Ok(())
    }
}
