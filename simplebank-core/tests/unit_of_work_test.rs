//! Unit-of-work behavior under contention, failure and panics
//!
//! Run with: cargo test --test unit_of_work_test -- --nocapture

mod common;

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};

use tempfile::TempDir;

use simplebank_core::adapters::memory::MemoryLedger;
use simplebank_core::domain::{AddAccountBalanceParams, CreateEntryParams};
use simplebank_core::ports::{LedgerStore, UnitOfWork};
use simplebank_core::services::TransferService;
use simplebank_core::{Error, TransferTxParams};

use common::{create_account, duckdb_ledger};

fn add(store: &dyn LedgerStore, id: i64, amount: i64) -> simplebank_core::Result<()> {
    store.add_account_balance(&AddAccountBalanceParams { id, amount })?;
    Ok(())
}

// ============================================================================
// Lock ordering
// ============================================================================

/// Two units locking the same pair of accounts in opposite orders
/// deadlock; the wait timeout turns that into an error.
#[test]
fn test_lock_order_inversion_times_out() {
    let ledger = Arc::new(MemoryLedger::with_lock_timeout(Duration::from_millis(200)));
    let a = create_account(&*ledger, 100, "USD");
    let b = create_account(&*ledger, 100, "USD");

    let barrier = Arc::new(Barrier::new(2));
    let timeouts = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = [(a.id, b.id), (b.id, a.id)]
        .into_iter()
        .map(|(first, second)| {
            let ledger = Arc::clone(&ledger);
            let barrier = Arc::clone(&barrier);
            let timeouts = Arc::clone(&timeouts);
            thread::spawn(move || {
                let outcome = ledger.run_in_transaction(&mut |store| {
                    add(store, first, -1)?;
                    barrier.wait();
                    add(store, second, 1)
                });
                if let Err(e) = outcome {
                    assert!(e.is_lock_timeout(), "unexpected error: {e}");
                    timeouts.fetch_add(1, Ordering::SeqCst);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert!(timeouts.load(Ordering::SeqCst) >= 1);
    // Whatever committed moved money without creating any
    let total = ledger.get_account(a.id).unwrap().balance
        + ledger.get_account(b.id).unwrap().balance;
    assert_eq!(total, 200);
    assert_eq!(ledger.account_lock_holder(a.id), None);
    assert_eq!(ledger.account_lock_holder(b.id), None);
}

/// The same opposing workload through the transfer engine never times out
#[test]
fn test_engine_ordering_avoids_lock_timeouts() {
    let ledger = Arc::new(MemoryLedger::with_lock_timeout(Duration::from_secs(5)));
    let a = create_account(&*ledger, 100, "USD");
    let b = create_account(&*ledger, 100, "USD");
    let service = Arc::new(TransferService::new(ledger.clone(), ledger.clone()));

    let barrier = Arc::new(Barrier::new(20));
    let handles: Vec<_> = (0..20)
        .map(|i| {
            let service = Arc::clone(&service);
            let barrier = Arc::clone(&barrier);
            let params = if i % 2 == 0 {
                TransferTxParams::new(a.id, b.id, 3)
            } else {
                TransferTxParams::new(b.id, a.id, 3)
            };
            thread::spawn(move || {
                barrier.wait();
                service.transfer_tx(&params)
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap().expect("transfer failed");
    }
    assert_eq!(ledger.get_account(a.id).unwrap().balance, 100);
    assert_eq!(ledger.get_account(b.id).unwrap().balance, 100);
}

/// A second unit writing a locked row waits for the first to commit
#[test]
fn test_writer_blocks_until_holder_commits() {
    let ledger = Arc::new(MemoryLedger::new());
    let account_id = create_account(&*ledger, 0, "USD").id;
    let locked = Arc::new(Barrier::new(2));

    let holder = {
        let ledger = Arc::clone(&ledger);
        let locked = Arc::clone(&locked);
        thread::spawn(move || {
            ledger
                .run_in_transaction(&mut |store| {
                    add(store, account_id, 10)?;
                    locked.wait();
                    thread::sleep(Duration::from_millis(100));
                    Ok(())
                })
                .unwrap();
        })
    };

    locked.wait();
    let started = Instant::now();
    let updated = ledger
        .add_account_balance(&AddAccountBalanceParams {
            id: account_id,
            amount: 5,
        })
        .unwrap();
    assert!(started.elapsed() >= Duration::from_millis(50));
    // The waiter saw the holder's committed write
    assert_eq!(updated.balance, 15);

    holder.join().unwrap();
}

// ============================================================================
// Failure and panics
// ============================================================================

#[test]
fn test_failed_unit_on_duckdb_leaves_no_rows() {
    let temp_dir = TempDir::new().unwrap();
    let ledger = duckdb_ledger(&temp_dir);
    let account = create_account(&*ledger, 100, "USD");

    let err = ledger
        .run_in_transaction(&mut |store| {
            store.create_entry(&CreateEntryParams {
                account_id: account.id,
                amount: 5,
            })?;
            add(store, account.id, 5)?;
            // Unknown account, rejected by the store
            add(store, 404, 5)
        })
        .unwrap_err();

    assert!(err.is_not_found());
    assert_eq!(ledger.get_account(account.id).unwrap().balance, 100);
    assert_eq!(ledger.summarize().unwrap().entry_count, 0);
}

#[test]
fn test_panicking_unit_is_discarded_on_memory() {
    let ledger = MemoryLedger::with_lock_timeout(Duration::from_millis(200));
    let account = create_account(&ledger, 100, "USD");

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        let _ = ledger.run_in_transaction(&mut |store| {
            add(store, account.id, 50)?;
            panic!("caller gave up");
        });
    }));
    assert!(outcome.is_err());

    assert_eq!(ledger.account_lock_holder(account.id), None);
    assert_eq!(ledger.get_account(account.id).unwrap().balance, 100);
    // The row is writable again without waiting
    add(&ledger, account.id, 1).unwrap();
}

#[test]
fn test_panicking_unit_is_discarded_on_duckdb() {
    let temp_dir = TempDir::new().unwrap();
    let ledger = duckdb_ledger(&temp_dir);
    let account = create_account(&*ledger, 100, "USD");

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        let _ = ledger.run_in_transaction(&mut |store| {
            add(store, account.id, 50)?;
            panic!("caller gave up");
        });
    }));
    assert!(outcome.is_err());

    assert_eq!(ledger.get_account(account.id).unwrap().balance, 100);
    add(&*ledger, account.id, 1).unwrap();
    assert_eq!(ledger.get_account(account.id).unwrap().balance, 101);
}

#[test]
fn test_error_from_unit_is_returned_unchanged() {
    let ledger = MemoryLedger::new();
    let err = ledger
        .run_in_transaction(&mut |_| Err(Error::validation("nope")))
        .unwrap_err();
    assert!(matches!(err, Error::Validation(ref m) if m == "nope"));
}
