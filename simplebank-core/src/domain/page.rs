//! Pagination and filter parameters for list operations

use serde::{Deserialize, Serialize};

/// Default page size when none is configured
pub const DEFAULT_PAGE_SIZE: i64 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListParams {
    pub limit: i64,
    pub offset: i64,
}

impl ListParams {
    pub fn new(limit: i64, offset: i64) -> Self {
        Self {
            limit: limit.max(0),
            offset: offset.max(0),
        }
    }

    /// Apply this page to an already ordered sequence
    pub fn apply<T>(&self, rows: impl IntoIterator<Item = T>) -> Vec<T> {
        rows.into_iter()
            .skip(self.offset as usize)
            .take(self.limit as usize)
            .collect()
    }
}

impl Default for ListParams {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE, 0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ListEntriesParams {
    /// Only entries of this account, when set
    pub account_id: Option<i64>,
    pub page: ListParams,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ListTransfersParams {
    pub from_account_id: Option<i64>,
    pub to_account_id: Option<i64>,
    pub page: ListParams,
}

impl ListEntriesParams {
    pub fn all(page: ListParams) -> Self {
        Self {
            account_id: None,
            page,
        }
    }

    pub fn for_account(account_id: i64, page: ListParams) -> Self {
        Self {
            account_id: Some(account_id),
            page,
        }
    }
}

impl ListTransfersParams {
    pub fn all(page: ListParams) -> Self {
        Self {
            from_account_id: None,
            to_account_id: None,
            page,
        }
    }

    pub fn matches(&self, from_account_id: i64, to_account_id: i64) -> bool {
        self.from_account_id.map_or(true, |id| id == from_account_id)
            && self.to_account_id.map_or(true, |id| id == to_account_id)
    }
}
