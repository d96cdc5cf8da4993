//! DuckDB ledger store implementation

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use duckdb::{params, params_from_iter, Connection};
use tracing::{debug, warn};

use crate::domain::result::{Error, Result};
use crate::domain::{
    Account, AddAccountBalanceParams, CreateAccountParams, CreateEntryParams,
    CreateTransferParams, Entry, LedgerSummary, ListEntriesParams, ListParams,
    ListTransfersParams, Transfer, UpdateAccountParams, UpdateEntryParams,
};
use crate::ports::{settle, LedgerStore, UnitHandle, UnitOfWork};
use crate::services::{MigrationResult, MigrationService};

/// Maximum number of retries when database file is locked
const MAX_RETRIES: u32 = 5;

/// Initial retry delay in milliseconds (doubles each retry: 50, 100, 200, 400, 800ms)
const INITIAL_RETRY_DELAY_MS: u64 = 50;

/// Check if an error message indicates a file locking issue that should be retried
fn is_retryable_error(err_msg: &str) -> bool {
    let lower = err_msg.to_lowercase();
    // Windows error messages
    lower.contains("being used by another process")
        || lower.contains("cannot access the file")
        // Unix/macOS error messages
        || lower.contains("resource temporarily unavailable")
        || lower.contains("database is locked")
        || lower.contains("could not set lock on file")
}

impl From<duckdb::Error> for Error {
    fn from(err: duckdb::Error) -> Self {
        let msg = err.to_string();
        if msg.contains("Constraint Error") || msg.contains("Out of Range Error") {
            Error::ConstraintViolation(msg)
        } else {
            Error::Database(msg)
        }
    }
}

/// Turn "no rows" into `None`, keeping every other error
fn optional<T>(result: duckdb::Result<T>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(duckdb::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// DuckDB ledger store
///
/// A single connection sits behind a mutex. Autocommit operations hold it for
/// one call; a unit holds it from BEGIN to COMMIT/ROLLBACK, so units issued
/// through one handle never interleave. Open one handle per database file and
/// share it with `Arc`.
pub struct DuckDbLedger {
    conn: Mutex<Connection>,
    db_path: Option<PathBuf>,
}

impl DuckDbLedger {
    /// Open (or create) a ledger database file
    ///
    /// Retries with exponential backoff while another process holds the file.
    pub fn open(db_path: &Path) -> Result<Self> {
        let mut attempt = 0;
        loop {
            match Self::try_open_connection(db_path) {
                Ok(conn) => {
                    return Ok(Self {
                        conn: Mutex::new(conn),
                        db_path: Some(db_path.to_path_buf()),
                    });
                }
                Err(e) => {
                    let err_msg = e.to_string();
                    if !is_retryable_error(&err_msg) || attempt + 1 >= MAX_RETRIES {
                        return Err(e.into());
                    }
                    let delay = Duration::from_millis(INITIAL_RETRY_DELAY_MS * 2u64.pow(attempt));
                    warn!(
                        path = %db_path.display(),
                        delay_ms = delay.as_millis() as u64,
                        attempt = attempt + 1,
                        max_retries = MAX_RETRIES,
                        error = %err_msg,
                        "database busy, retrying"
                    );
                    thread::sleep(delay);
                    attempt += 1;
                }
            }
        }
    }

    /// Open a throwaway in-memory ledger
    pub fn open_in_memory() -> Result<Self> {
        let config = duckdb::Config::default().enable_autoload_extension(false)?;
        let conn = Connection::open_in_memory_with_flags(config)?;
        Ok(Self {
            conn: Mutex::new(conn),
            db_path: None,
        })
    }

    fn try_open_connection(db_path: &Path) -> duckdb::Result<Connection> {
        // Extension autoloading stays off; the ledger only needs core SQL
        let config = duckdb::Config::default().enable_autoload_extension(false)?;
        Connection::open_with_flags(db_path, config)
    }

    /// Run pending schema migrations
    pub fn ensure_schema(&self) -> Result<MigrationResult> {
        let conn = self.connection();
        MigrationService::new(&conn)
            .run_pending()
            .map_err(|e| Error::database(format!("{e:#}")))
    }

    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    /// Lock the connection.
    ///
    /// A panic inside a unit poisons the mutex, but the open transaction was
    /// rolled back while unwinding, so the connection itself is still sound.
    fn connection(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn with_queries<T>(&self, f: impl FnOnce(&Queries<'_>) -> Result<T>) -> Result<T> {
        let conn = self.connection();
        f(&Queries::new(&conn))
    }
}

impl UnitOfWork for DuckDbLedger {
    fn run_in_transaction(
        &self,
        unit: &mut dyn FnMut(&dyn LedgerStore) -> Result<()>,
    ) -> Result<()> {
        let mut conn = self.connection();
        let tx = conn.transaction()?;
        debug!("unit begun");

        let outcome = {
            let queries = Queries::new(&tx);
            unit(&queries)
        };

        settle(DuckDbUnit(tx), outcome)
    }
}

struct DuckDbUnit<'c>(duckdb::Transaction<'c>);

impl UnitHandle for DuckDbUnit<'_> {
    fn commit(self) -> Result<()> {
        self.0.commit()?;
        debug!("unit committed");
        Ok(())
    }

    fn discard(self) -> Result<()> {
        self.0.rollback()?;
        Ok(())
    }
}

impl LedgerStore for DuckDbLedger {
    fn create_account(&self, params: &CreateAccountParams) -> Result<Account> {
        self.with_queries(|q| q.create_account(params))
    }

    fn get_account(&self, id: i64) -> Result<Account> {
        self.with_queries(|q| q.get_account(id))
    }

    fn list_accounts(&self, params: &ListParams) -> Result<Vec<Account>> {
        self.with_queries(|q| q.list_accounts(params))
    }

    fn update_account(&self, params: &UpdateAccountParams) -> Result<Account> {
        self.with_queries(|q| q.update_account(params))
    }

    fn add_account_balance(&self, params: &AddAccountBalanceParams) -> Result<Account> {
        self.with_queries(|q| q.add_account_balance(params))
    }

    fn delete_account(&self, id: i64) -> Result<()> {
        self.with_queries(|q| q.delete_account(id))
    }

    fn create_entry(&self, params: &CreateEntryParams) -> Result<Entry> {
        self.with_queries(|q| q.create_entry(params))
    }

    fn get_entry(&self, id: i64) -> Result<Entry> {
        self.with_queries(|q| q.get_entry(id))
    }

    fn list_entries(&self, params: &ListEntriesParams) -> Result<Vec<Entry>> {
        self.with_queries(|q| q.list_entries(params))
    }

    fn update_entry(&self, params: &UpdateEntryParams) -> Result<Entry> {
        self.with_queries(|q| q.update_entry(params))
    }

    fn delete_entry(&self, id: i64) -> Result<()> {
        self.with_queries(|q| q.delete_entry(id))
    }

    fn create_transfer(&self, params: &CreateTransferParams) -> Result<Transfer> {
        self.with_queries(|q| q.create_transfer(params))
    }

    fn get_transfer(&self, id: i64) -> Result<Transfer> {
        self.with_queries(|q| q.get_transfer(id))
    }

    fn list_transfers(&self, params: &ListTransfersParams) -> Result<Vec<Transfer>> {
        self.with_queries(|q| q.list_transfers(params))
    }

    fn delete_transfer(&self, id: i64) -> Result<()> {
        self.with_queries(|q| q.delete_transfer(id))
    }

    fn summarize(&self) -> Result<LedgerSummary> {
        self.with_queries(|q| q.summarize())
    }
}

/// SQL for every ledger operation, bound to either a plain connection or an
/// open transaction (which derefs to one).
pub struct Queries<'c> {
    conn: &'c Connection,
}

impl<'c> Queries<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    fn account_exists(&self, id: i64) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM accounts WHERE id = ?",
            params![id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn require_account(&self, id: i64, role: &str) -> Result<()> {
        if self.account_exists(id)? {
            Ok(())
        } else {
            Err(Error::constraint(format!("{role} account {id} does not exist")))
        }
    }
}

impl LedgerStore for Queries<'_> {
    // === Accounts ===

    fn create_account(&self, params: &CreateAccountParams) -> Result<Account> {
        let account = self.conn.query_row(
            "INSERT INTO accounts (owner, balance, currency, created_at)
             VALUES (?, ?, ?, ?)
             RETURNING id, owner, balance, currency, created_at",
            params![params.owner, params.balance, params.currency, now_timestamp()],
            row_to_account,
        )?;
        Ok(account)
    }

    fn get_account(&self, id: i64) -> Result<Account> {
        optional(self.conn.query_row(
            "SELECT id, owner, balance, currency, created_at FROM accounts WHERE id = ?",
            params![id],
            row_to_account,
        ))?
        .ok_or_else(|| Error::not_found(format!("account {id}")))
    }

    fn list_accounts(&self, params: &ListParams) -> Result<Vec<Account>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, owner, balance, currency, created_at FROM accounts
             ORDER BY id LIMIT ? OFFSET ?",
        )?;
        let accounts = stmt
            .query_map(params![params.limit, params.offset], row_to_account)?
            .collect::<duckdb::Result<Vec<_>>>()?;
        Ok(accounts)
    }

    fn update_account(&self, params: &UpdateAccountParams) -> Result<Account> {
        optional(self.conn.query_row(
            "UPDATE accounts SET balance = ? WHERE id = ?
             RETURNING id, owner, balance, currency, created_at",
            params![params.balance, params.id],
            row_to_account,
        ))?
        .ok_or_else(|| Error::not_found(format!("account {}", params.id)))
    }

    fn add_account_balance(&self, params: &AddAccountBalanceParams) -> Result<Account> {
        optional(self.conn.query_row(
            "UPDATE accounts SET balance = balance + ? WHERE id = ?
             RETURNING id, owner, balance, currency, created_at",
            params![params.amount, params.id],
            row_to_account,
        ))?
        .ok_or_else(|| Error::not_found(format!("account {}", params.id)))
    }

    fn delete_account(&self, id: i64) -> Result<()> {
        if !self.account_exists(id)? {
            return Err(Error::not_found(format!("account {id}")));
        }
        let references: i64 = self.conn.query_row(
            "SELECT (SELECT COUNT(*) FROM entries WHERE account_id = ?)
                  + (SELECT COUNT(*) FROM transfers
                     WHERE from_account_id = ? OR to_account_id = ?)",
            params![id, id, id],
            |row| row.get(0),
        )?;
        if references > 0 {
            return Err(Error::constraint(format!(
                "account {id} is still referenced by {references} entries or transfers"
            )));
        }
        self.conn
            .execute("DELETE FROM accounts WHERE id = ?", params![id])?;
        Ok(())
    }

    // === Entries ===

    fn create_entry(&self, params: &CreateEntryParams) -> Result<Entry> {
        self.require_account(params.account_id, "entry")?;
        let entry = self.conn.query_row(
            "INSERT INTO entries (account_id, amount, created_at)
             VALUES (?, ?, ?)
             RETURNING id, account_id, amount, created_at",
            params![params.account_id, params.amount, now_timestamp()],
            row_to_entry,
        )?;
        Ok(entry)
    }

    fn get_entry(&self, id: i64) -> Result<Entry> {
        optional(self.conn.query_row(
            "SELECT id, account_id, amount, created_at FROM entries WHERE id = ?",
            params![id],
            row_to_entry,
        ))?
        .ok_or_else(|| Error::not_found(format!("entry {id}")))
    }

    fn list_entries(&self, params: &ListEntriesParams) -> Result<Vec<Entry>> {
        let (sql, values) = match params.account_id {
            Some(account_id) => (
                "SELECT id, account_id, amount, created_at FROM entries
                 WHERE account_id = ? ORDER BY id LIMIT ? OFFSET ?",
                vec![account_id, params.page.limit, params.page.offset],
            ),
            None => (
                "SELECT id, account_id, amount, created_at FROM entries
                 ORDER BY id LIMIT ? OFFSET ?",
                vec![params.page.limit, params.page.offset],
            ),
        };
        let mut stmt = self.conn.prepare(sql)?;
        let entries = stmt
            .query_map(params_from_iter(values), row_to_entry)?
            .collect::<duckdb::Result<Vec<_>>>()?;
        Ok(entries)
    }

    fn update_entry(&self, params: &UpdateEntryParams) -> Result<Entry> {
        optional(self.conn.query_row(
            "UPDATE entries SET amount = ? WHERE id = ?
             RETURNING id, account_id, amount, created_at",
            params![params.amount, params.id],
            row_to_entry,
        ))?
        .ok_or_else(|| Error::not_found(format!("entry {}", params.id)))
    }

    fn delete_entry(&self, id: i64) -> Result<()> {
        let deleted = self
            .conn
            .execute("DELETE FROM entries WHERE id = ?", params![id])?;
        if deleted == 0 {
            return Err(Error::not_found(format!("entry {id}")));
        }
        Ok(())
    }

    // === Transfers ===

    fn create_transfer(&self, params: &CreateTransferParams) -> Result<Transfer> {
        self.require_account(params.from_account_id, "from")?;
        self.require_account(params.to_account_id, "to")?;
        let transfer = self.conn.query_row(
            "INSERT INTO transfers (from_account_id, to_account_id, amount, created_at)
             VALUES (?, ?, ?, ?)
             RETURNING id, from_account_id, to_account_id, amount, created_at",
            params![
                params.from_account_id,
                params.to_account_id,
                params.amount,
                now_timestamp()
            ],
            row_to_transfer,
        )?;
        Ok(transfer)
    }

    fn get_transfer(&self, id: i64) -> Result<Transfer> {
        optional(self.conn.query_row(
            "SELECT id, from_account_id, to_account_id, amount, created_at
             FROM transfers WHERE id = ?",
            params![id],
            row_to_transfer,
        ))?
        .ok_or_else(|| Error::not_found(format!("transfer {id}")))
    }

    fn list_transfers(&self, params: &ListTransfersParams) -> Result<Vec<Transfer>> {
        let mut conditions = Vec::new();
        let mut values = Vec::new();
        if let Some(from) = params.from_account_id {
            conditions.push("from_account_id = ?");
            values.push(from);
        }
        if let Some(to) = params.to_account_id {
            conditions.push("to_account_id = ?");
            values.push(to);
        }
        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };
        values.push(params.page.limit);
        values.push(params.page.offset);

        let sql = format!(
            "SELECT id, from_account_id, to_account_id, amount, created_at
             FROM transfers {where_clause} ORDER BY id LIMIT ? OFFSET ?"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let transfers = stmt
            .query_map(params_from_iter(values), row_to_transfer)?
            .collect::<duckdb::Result<Vec<_>>>()?;
        Ok(transfers)
    }

    fn delete_transfer(&self, id: i64) -> Result<()> {
        let deleted = self
            .conn
            .execute("DELETE FROM transfers WHERE id = ?", params![id])?;
        if deleted == 0 {
            return Err(Error::not_found(format!("transfer {id}")));
        }
        Ok(())
    }

    // === Aggregates ===

    fn summarize(&self) -> Result<LedgerSummary> {
        // SUM over BIGINT widens to HUGEINT, so cast back down
        let mut summary = self.conn.query_row(
            "SELECT
                (SELECT COUNT(*) FROM accounts),
                (SELECT COUNT(*) FROM entries),
                (SELECT COUNT(*) FROM transfers),
                (SELECT CAST(COALESCE(SUM(amount), 0) AS BIGINT) FROM entries),
                (SELECT CAST(COALESCE(SUM(amount), 0) AS BIGINT) FROM transfers)",
            [],
            |row| {
                Ok(LedgerSummary {
                    account_count: row.get(0)?,
                    entry_count: row.get(1)?,
                    transfer_count: row.get(2)?,
                    entry_net: row.get(3)?,
                    transfer_volume: row.get(4)?,
                    ..LedgerSummary::default()
                })
            },
        )?;

        let mut stmt = self.conn.prepare(
            "SELECT currency, CAST(SUM(balance) AS BIGINT) FROM accounts
             GROUP BY currency ORDER BY currency",
        )?;
        let totals = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?
            .collect::<duckdb::Result<Vec<_>>>()?;
        summary.balances_by_currency = totals.into_iter().collect();

        Ok(summary)
    }
}

// Row mapping

fn row_to_account(row: &duckdb::Row<'_>) -> duckdb::Result<Account> {
    let created_str: String = row.get(4)?;
    Ok(Account {
        id: row.get(0)?,
        owner: row.get(1)?,
        balance: row.get(2)?,
        currency: row.get(3)?,
        created_at: parse_timestamp(&created_str),
    })
}

fn row_to_entry(row: &duckdb::Row<'_>) -> duckdb::Result<Entry> {
    let created_str: String = row.get(3)?;
    Ok(Entry {
        id: row.get(0)?,
        account_id: row.get(1)?,
        amount: row.get(2)?,
        created_at: parse_timestamp(&created_str),
    })
}

fn row_to_transfer(row: &duckdb::Row<'_>) -> duckdb::Result<Transfer> {
    let created_str: String = row.get(4)?;
    Ok(Transfer {
        id: row.get(0)?,
        from_account_id: row.get(1)?,
        to_account_id: row.get(2)?,
        amount: row.get(3)?,
        created_at: parse_timestamp(&created_str),
    })
}

// Helper functions

/// Insert-time timestamp, stored as RFC 3339 text with microseconds.
/// Kept as text so no timezone extension is needed to read it back.
fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ledger() -> DuckDbLedger {
        let ledger = DuckDbLedger::open_in_memory().unwrap();
        ledger.ensure_schema().unwrap();
        ledger
    }

    #[test]
    fn test_retryable_errors() {
        assert!(is_retryable_error("IO Error: Could not set lock on file \"x.duckdb\""));
        assert!(is_retryable_error(
            "The process cannot access the file because it is being used by another process"
        ));
        assert!(!is_retryable_error("Catalog Error: Table with name foo does not exist"));
    }

    #[test]
    fn test_timestamp_round_trip() {
        let stamp = now_timestamp();
        let parsed = parse_timestamp(&stamp);
        assert_eq!(parsed.to_rfc3339_opts(SecondsFormat::Micros, true), stamp);
    }

    #[test]
    fn test_missing_rows_are_not_found() {
        let ledger = ledger();
        assert!(ledger.get_account(42).unwrap_err().is_not_found());
        assert!(ledger.get_entry(42).unwrap_err().is_not_found());
        assert!(ledger.get_transfer(42).unwrap_err().is_not_found());
        assert!(ledger
            .add_account_balance(&AddAccountBalanceParams { id: 42, amount: 1 })
            .unwrap_err()
            .is_not_found());
    }

    #[test]
    fn test_entry_for_unknown_account_is_rejected() {
        let ledger = ledger();
        let err = ledger
            .create_entry(&CreateEntryParams {
                account_id: 9,
                amount: 10,
            })
            .unwrap_err();
        assert!(err.is_constraint_violation(), "{err}");
    }

    #[test]
    fn test_balance_overflow_is_constraint_violation() {
        let ledger = ledger();
        let account = ledger
            .create_account(&CreateAccountParams::new("max", i64::MAX, "USD"))
            .unwrap();
        let err = ledger
            .add_account_balance(&AddAccountBalanceParams {
                id: account.id,
                amount: 1,
            })
            .unwrap_err();
        assert!(err.is_constraint_violation(), "{err}");
        assert_eq!(ledger.get_account(account.id).unwrap().balance, i64::MAX);
    }

    #[test]
    fn test_unit_rollback_discards_writes() {
        let ledger = ledger();
        let account = ledger
            .create_account(&CreateAccountParams::new("alice", 100, "USD"))
            .unwrap();

        let err = ledger
            .run_in_transaction(&mut |q| {
                q.add_account_balance(&AddAccountBalanceParams {
                    id: account.id,
                    amount: 50,
                })?;
                Err(Error::Other("stop".to_string()))
            })
            .unwrap_err();

        assert!(matches!(err, Error::Other(_)));
        assert_eq!(ledger.get_account(account.id).unwrap().balance, 100);
    }

    #[test]
    fn test_summary_counts_rows() {
        let ledger = ledger();
        let a = ledger
            .create_account(&CreateAccountParams::new("a", 100, "USD"))
            .unwrap();
        ledger
            .create_account(&CreateAccountParams::new("b", 30, "EUR"))
            .unwrap();
        ledger
            .create_entry(&CreateEntryParams {
                account_id: a.id,
                amount: -5,
            })
            .unwrap();

        let summary = ledger.summarize().unwrap();
        assert_eq!(summary.account_count, 2);
        assert_eq!(summary.entry_count, 1);
        assert_eq!(summary.transfer_count, 0);
        assert_eq!(summary.entry_net, -5);
        assert_eq!(summary.balances_by_currency.get("USD"), Some(&100));
        assert_eq!(summary.balances_by_currency.get("EUR"), Some(&30));
    }
}
