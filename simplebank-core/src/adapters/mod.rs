//! Adapter implementations
//!
//! Adapters implement the port traits with concrete storage:
//! - DuckDB for durable ledgers
//! - An in-process store with row-level locks, used by tests and tooling
//!   that need to observe lock ordering

pub mod duckdb;
pub mod memory;
pub mod row_locks;
