//! Aggregate view of the whole ledger

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSummary {
    pub account_count: i64,
    pub entry_count: i64,
    pub transfer_count: i64,
    /// Sum of every entry amount; zero when entries only come from transfers
    pub entry_net: i64,
    pub transfer_volume: i64,
    /// Sum of account balances keyed by currency code
    pub balances_by_currency: BTreeMap<String, i64>,
}
