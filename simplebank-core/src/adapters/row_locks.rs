//! Per-row locks held by units until they finish

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tracing::debug;

use crate::domain::result::{Error, Result};

pub type UnitId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RowKey {
    Account(i64),
    Entry(i64),
    Transfer(i64),
}

impl fmt::Display for RowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowKey::Account(id) => write!(f, "account {id}"),
            RowKey::Entry(id) => write!(f, "entry {id}"),
            RowKey::Transfer(id) => write!(f, "transfer {id}"),
        }
    }
}

/// How a unit holds a row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    /// Taken on a referenced row when a new row points at it. Only conflicts
    /// with a delete.
    KeyShare,
    /// Exclusive among writers; key-share holders are not affected
    Update,
    /// Exclusive against every other holder
    Delete,
}

#[derive(Debug, Default)]
struct RowState {
    writer: Option<UnitId>,
    deleting: bool,
    sharers: HashSet<UnitId>,
}

impl RowState {
    /// Another unit whose hold conflicts with `unit` taking `mode`
    fn blocker(&self, unit: UnitId, mode: LockMode) -> Option<UnitId> {
        let other_writer = self.writer.filter(|&w| w != unit);
        match mode {
            LockMode::KeyShare => other_writer.filter(|_| self.deleting),
            LockMode::Update => other_writer,
            LockMode::Delete => {
                other_writer.or_else(|| self.sharers.iter().copied().find(|&s| s != unit))
            }
        }
    }

    fn grant(&mut self, unit: UnitId, mode: LockMode) {
        match mode {
            LockMode::KeyShare => {
                self.sharers.insert(unit);
            }
            LockMode::Update => self.writer = Some(unit),
            LockMode::Delete => {
                self.writer = Some(unit);
                self.deleting = true;
            }
        }
    }

    fn release(&mut self, unit: UnitId) {
        if self.writer == Some(unit) {
            self.writer = None;
            self.deleting = false;
        }
        self.sharers.remove(&unit);
    }

    fn is_free(&self) -> bool {
        self.writer.is_none() && self.sharers.is_empty()
    }
}

/// Lock table: which units hold which rows, and how
///
/// A lock is taken on first touch and kept until the owning unit releases
/// everything at commit or discard. Waiters block on a condition variable.
/// With no wait timeout a lock-order inversion between two units blocks both
/// forever.
pub struct RowLocks {
    rows: Mutex<HashMap<RowKey, RowState>>,
    released: Condvar,
    wait_timeout: Option<Duration>,
}

impl RowLocks {
    pub fn new(wait_timeout: Option<Duration>) -> Self {
        Self {
            rows: Mutex::new(HashMap::new()),
            released: Condvar::new(),
            wait_timeout,
        }
    }

    fn rows(&self) -> MutexGuard<'_, HashMap<RowKey, RowState>> {
        self.rows.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Block until `unit` holds `key` in `mode`. Holding it already is a no-op.
    pub fn acquire(&self, key: RowKey, unit: UnitId, mode: LockMode) -> Result<()> {
        let deadline = self.wait_timeout.map(|timeout| Instant::now() + timeout);
        let mut rows = self.rows();
        let mut waited = false;

        loop {
            let state = rows.entry(key).or_default();
            match state.blocker(unit, mode) {
                None => {
                    state.grant(unit, mode);
                    return Ok(());
                }
                Some(owner) if !waited => {
                    debug!(%key, unit, owner, ?mode, "waiting for row lock");
                    waited = true;
                }
                Some(_) => {}
            }

            rows = match deadline {
                None => self
                    .released
                    .wait(rows)
                    .unwrap_or_else(PoisonError::into_inner),
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(Error::LockTimeout(format!(
                            "unit {unit} gave up waiting for {key}"
                        )));
                    }
                    let (guard, _) = self
                        .released
                        .wait_timeout(rows, deadline - now)
                        .unwrap_or_else(PoisonError::into_inner);
                    guard
                }
            };
        }
    }

    /// Release every listed lock held by `unit` and wake all waiters
    pub fn release_all(&self, unit: UnitId, keys: &[RowKey]) {
        if keys.is_empty() {
            return;
        }
        let mut rows = self.rows();
        for key in keys {
            if let Some(state) = rows.get_mut(key) {
                state.release(unit);
                if state.is_free() {
                    rows.remove(key);
                }
            }
        }
        drop(rows);
        self.released.notify_all();
    }

    /// The unit holding `key` for update or delete
    pub fn holder(&self, key: RowKey) -> Option<UnitId> {
        self.rows().get(&key).and_then(|state| state.writer)
    }

    /// Number of rows some unit holds in any mode
    pub fn locked_rows(&self) -> usize {
        self.rows().len()
    }
}
