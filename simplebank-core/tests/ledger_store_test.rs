//! Ledger store CRUD tests
//!
//! Every check runs against both adapters: a real DuckDB file and the
//! in-process store.
//!
//! Run with: cargo test --test ledger_store_test

mod common;

use simplebank_core::domain::{
    CreateEntryParams, CreateTransferParams, ListEntriesParams, ListParams, ListTransfersParams,
    UpdateAccountParams, UpdateEntryParams,
};
use simplebank_core::ports::LedgerStore;

use common::{create_account, create_random_account, random_money};

macro_rules! on_both_adapters {
    ($($name:ident),* $(,)?) => {
        mod on_duckdb {
            use tempfile::TempDir;
            $(
                #[test]
                fn $name() {
                    let temp_dir = TempDir::new().unwrap();
                    let ledger = crate::common::duckdb_ledger(&temp_dir);
                    super::$name(&*ledger);
                }
            )*
        }

        mod on_memory {
            $(
                #[test]
                fn $name() {
                    let ledger = crate::common::memory_ledger();
                    super::$name(&*ledger);
                }
            )*
        }
    };
}

on_both_adapters!(
    create_and_get_account,
    update_account,
    add_account_balance,
    delete_account,
    list_accounts,
    create_and_get_entry,
    update_and_delete_entry,
    list_entries,
    create_and_get_transfer,
    list_transfers,
    delete_transfer,
    referenced_account_cannot_be_deleted,
    missing_rows,
);

// ============================================================================
// Accounts
// ============================================================================

fn create_and_get_account(store: &dyn LedgerStore) {
    let account = create_random_account(store);
    let fetched = store.get_account(account.id).unwrap();
    assert_eq!(fetched, account);
}

fn update_account(store: &dyn LedgerStore) {
    let account = create_random_account(store);
    let balance = random_money();

    let updated = store
        .update_account(&UpdateAccountParams {
            id: account.id,
            balance,
        })
        .unwrap();

    assert_eq!(updated.id, account.id);
    assert_eq!(updated.owner, account.owner);
    assert_eq!(updated.currency, account.currency);
    assert_eq!(updated.created_at, account.created_at);
    assert_eq!(updated.balance, balance);
    assert_eq!(store.get_account(account.id).unwrap(), updated);
}

fn add_account_balance(store: &dyn LedgerStore) {
    let account = create_account(store, 100, "USD");
    let updated = store
        .add_account_balance(&simplebank_core::domain::AddAccountBalanceParams {
            id: account.id,
            amount: -130,
        })
        .unwrap();
    assert_eq!(updated.balance, -30);
}

fn delete_account(store: &dyn LedgerStore) {
    let account = create_random_account(store);
    store.delete_account(account.id).unwrap();

    assert!(store.get_account(account.id).unwrap_err().is_not_found());
    assert!(store.delete_account(account.id).unwrap_err().is_not_found());
    let listed = store.list_accounts(&ListParams::new(100, 0)).unwrap();
    assert!(listed.iter().all(|a| a.id != account.id));
}

fn list_accounts(store: &dyn LedgerStore) {
    let created: Vec<_> = (0..10).map(|_| create_random_account(store)).collect();

    let page = store.list_accounts(&ListParams::new(5, 5)).unwrap();
    assert_eq!(page.len(), 5);
    assert_eq!(page, created[5..].to_vec());
    assert!(page.windows(2).all(|w| w[0].id < w[1].id));

    let past_end = store.list_accounts(&ListParams::new(5, 10)).unwrap();
    assert!(past_end.is_empty());
}

// ============================================================================
// Entries
// ============================================================================

fn create_and_get_entry(store: &dyn LedgerStore) {
    let account = create_random_account(store);
    let entry = store
        .create_entry(&CreateEntryParams {
            account_id: account.id,
            amount: -random_money() - 1,
        })
        .unwrap();

    assert_eq!(entry.account_id, account.id);
    assert!(entry.is_debit());
    assert_eq!(store.get_entry(entry.id).unwrap(), entry);
}

fn update_and_delete_entry(store: &dyn LedgerStore) {
    let account = create_random_account(store);
    let entry = store
        .create_entry(&CreateEntryParams {
            account_id: account.id,
            amount: 10,
        })
        .unwrap();

    let updated = store
        .update_entry(&UpdateEntryParams {
            id: entry.id,
            amount: 25,
        })
        .unwrap();
    assert_eq!(updated.amount, 25);
    assert_eq!(updated.created_at, entry.created_at);

    store.delete_entry(entry.id).unwrap();
    assert!(store.get_entry(entry.id).unwrap_err().is_not_found());
    let remaining = store
        .list_entries(&ListEntriesParams::for_account(account.id, ListParams::default()))
        .unwrap();
    assert!(remaining.is_empty());
}

fn list_entries(store: &dyn LedgerStore) {
    let account = create_random_account(store);
    let other = create_random_account(store);
    for i in 0..10 {
        store
            .create_entry(&CreateEntryParams {
                account_id: account.id,
                amount: i + 1,
            })
            .unwrap();
        store
            .create_entry(&CreateEntryParams {
                account_id: other.id,
                amount: -(i + 1),
            })
            .unwrap();
    }

    let page = store
        .list_entries(&ListEntriesParams::for_account(account.id, ListParams::new(5, 5)))
        .unwrap();
    assert_eq!(page.len(), 5);
    assert!(page.iter().all(|e| e.account_id == account.id));
    assert_eq!(
        page.iter().map(|e| e.amount).collect::<Vec<_>>(),
        vec![6, 7, 8, 9, 10]
    );

    let all = store
        .list_entries(&ListEntriesParams::all(ListParams::new(100, 0)))
        .unwrap();
    assert_eq!(all.len(), 20);
}

// ============================================================================
// Transfers
// ============================================================================

fn create_and_get_transfer(store: &dyn LedgerStore) {
    let from = create_random_account(store);
    let to = create_random_account(store);
    let transfer = store
        .create_transfer(&CreateTransferParams {
            from_account_id: from.id,
            to_account_id: to.id,
            amount: 10,
        })
        .unwrap();

    assert_eq!(transfer.from_account_id, from.id);
    assert_eq!(transfer.to_account_id, to.id);
    assert_eq!(store.get_transfer(transfer.id).unwrap(), transfer);

    let err = store
        .create_transfer(&CreateTransferParams {
            from_account_id: from.id,
            to_account_id: to.id,
            amount: -10,
        })
        .unwrap_err();
    assert!(err.is_constraint_violation(), "{err}");
}

fn list_transfers(store: &dyn LedgerStore) {
    let a = create_random_account(store);
    let b = create_random_account(store);
    for amount in 1..=4 {
        store
            .create_transfer(&CreateTransferParams {
                from_account_id: a.id,
                to_account_id: b.id,
                amount,
            })
            .unwrap();
        store
            .create_transfer(&CreateTransferParams {
                from_account_id: b.id,
                to_account_id: a.id,
                amount,
            })
            .unwrap();
    }

    let mut params = ListTransfersParams::all(ListParams::new(3, 0));
    params.from_account_id = Some(a.id);
    let page = store.list_transfers(&params).unwrap();
    assert_eq!(page.len(), 3);
    assert!(page.iter().all(|t| t.from_account_id == a.id));

    params.to_account_id = Some(a.id);
    assert!(store.list_transfers(&params).unwrap().is_empty());

    let all = store
        .list_transfers(&ListTransfersParams::all(ListParams::new(100, 0)))
        .unwrap();
    assert_eq!(all.len(), 8);
}

fn delete_transfer(store: &dyn LedgerStore) {
    let a = create_random_account(store);
    let b = create_random_account(store);
    let transfer = store
        .create_transfer(&CreateTransferParams {
            from_account_id: a.id,
            to_account_id: b.id,
            amount: 5,
        })
        .unwrap();

    store.delete_transfer(transfer.id).unwrap();
    assert!(store.get_transfer(transfer.id).unwrap_err().is_not_found());
    assert!(store.delete_transfer(transfer.id).unwrap_err().is_not_found());
}

fn referenced_account_cannot_be_deleted(store: &dyn LedgerStore) {
    let a = create_random_account(store);
    let b = create_random_account(store);
    let transfer = store
        .create_transfer(&CreateTransferParams {
            from_account_id: a.id,
            to_account_id: b.id,
            amount: 5,
        })
        .unwrap();

    assert!(store.delete_account(b.id).unwrap_err().is_constraint_violation());

    store.delete_transfer(transfer.id).unwrap();
    store.delete_account(b.id).unwrap();
}

fn missing_rows(store: &dyn LedgerStore) {
    assert!(store.get_account(404).unwrap_err().is_not_found());
    assert!(store.get_entry(404).unwrap_err().is_not_found());
    assert!(store.get_transfer(404).unwrap_err().is_not_found());
    assert!(store
        .update_account(&UpdateAccountParams { id: 404, balance: 1 })
        .unwrap_err()
        .is_not_found());
    assert!(store
        .update_entry(&UpdateEntryParams { id: 404, amount: 1 })
        .unwrap_err()
        .is_not_found());
    assert!(store.delete_entry(404).unwrap_err().is_not_found());

    let err = store
        .create_entry(&CreateEntryParams {
            account_id: 404,
            amount: 1,
        })
        .unwrap_err();
    assert!(err.is_constraint_violation());
}
