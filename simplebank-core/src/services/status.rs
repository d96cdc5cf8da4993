//! Status service - ledger totals at a glance

use crate::domain::result::Result;
use crate::domain::LedgerSummary;
use crate::ports::SharedStore;

pub struct StatusService {
    store: SharedStore,
}

impl StatusService {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// Row counts, entry net, transfer volume and balance totals per currency
    pub fn status(&self) -> Result<LedgerSummary> {
        self.store.summarize()
    }
}
