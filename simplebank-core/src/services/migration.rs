//! Schema migrations for the ledger database
//!
//! Every applied file is recorded in `schema_migrations` with the time it ran,
//! so opening an up-to-date database applies nothing.

use anyhow::{Context, Result};
use chrono::Utc;
use duckdb::{params, Connection};
use tracing::info;

use crate::migrations::{BOOTSTRAP_MIGRATION, MIGRATIONS};

#[derive(Debug)]
pub struct MigrationResult {
    pub applied: Vec<String>,
    /// Migrations found recorded before this run
    pub already_applied: usize,
}

/// Applies embedded migrations to one connection
pub struct MigrationService<'a> {
    conn: &'a Connection,
}

impl<'a> MigrationService<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Bring the schema up to date.
    ///
    /// The bookkeeping table is created first when missing; the bootstrap
    /// counts as newly applied in that case. Everything else not recorded yet
    /// runs in name order.
    pub fn run_pending(&self) -> Result<MigrationResult> {
        let mut applied = Vec::new();

        if !self.migrations_table_exists()? {
            let (name, sql) = MIGRATIONS
                .iter()
                .find(|(n, _)| *n == BOOTSTRAP_MIGRATION)
                .context("bootstrap migration is not embedded")?;
            self.apply(name, sql)?;
            applied.push(name.to_string());
        }

        let recorded = self.get_applied()?;
        let already_applied = recorded.len() - applied.len();

        for (name, sql) in MIGRATIONS {
            if recorded.iter().any(|r| r == name) {
                continue;
            }
            self.apply(name, sql)?;
            info!(migration = %name, "applied schema migration");
            applied.push(name.to_string());
        }

        Ok(MigrationResult {
            applied,
            already_applied,
        })
    }

    fn migrations_table_exists(&self) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM information_schema.tables WHERE table_name = 'schema_migrations'",
            [],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Names recorded in schema_migrations, sorted
    pub fn get_applied(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT migration_name FROM schema_migrations ORDER BY migration_name")?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<duckdb::Result<Vec<_>>>()?;
        Ok(names)
    }

    pub fn get_pending(&self) -> Result<Vec<String>> {
        let applied = self.get_applied()?;
        Ok(MIGRATIONS
            .iter()
            .filter(|(name, _)| !applied.iter().any(|a| a == name))
            .map(|(name, _)| name.to_string())
            .collect())
    }

    fn apply(&self, name: &str, sql: &str) -> Result<()> {
        self.conn
            .execute_batch(sql)
            .with_context(|| format!("migration {name} failed"))?;
        self.conn.execute(
            "INSERT INTO schema_migrations (migration_name, applied_at) VALUES (?, ?)",
            params![name, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }
}
