//! Transfer service - moves money between two accounts in one unit
//!
//! A transfer writes five rows as a single atomic unit: the transfer record,
//! a debit entry, a credit entry and the two updated account balances.
//! Balances are always updated lower account id first, so two transfers
//! between the same accounts in opposite directions lock the rows in the
//! same order and cannot deadlock.

use tracing::{debug, info, info_span};

use crate::domain::result::{Error, Result, TransferStep};
use crate::domain::{
    AddAccountBalanceParams, CreateEntryParams, CreateTransferParams, TransferTxParams,
    TransferTxResult,
};
use crate::ports::{LedgerStore, SharedStore, SharedUnitOfWork};

/// Transfer engine
pub struct TransferService {
    units: SharedUnitOfWork,
    store: SharedStore,
}

impl TransferService {
    pub fn new(units: SharedUnitOfWork, store: SharedStore) -> Self {
        Self { units, store }
    }

    /// Perform one transfer as a single unit.
    ///
    /// Arguments are taken as given: amount sign, self-transfers and currency
    /// mismatches are not checked here (see [`checked_transfer`]). A failing
    /// step discards the whole unit and comes back as `Error::TransferStep`
    /// naming the step. Nothing is retried.
    ///
    /// [`checked_transfer`]: TransferService::checked_transfer
    pub fn transfer_tx(&self, params: &TransferTxParams) -> Result<TransferTxResult> {
        let mut result = None;
        self.units.run_in_transaction(&mut |store| {
            result = Some(execute(store, params)?);
            Ok(())
        })?;

        let result =
            result.ok_or_else(|| Error::Other("transfer unit committed without a result".into()))?;
        info!(
            transfer_id = result.transfer.id,
            from_account_id = params.from_account_id,
            to_account_id = params.to_account_id,
            amount = params.amount,
            "transfer committed"
        );
        Ok(result)
    }

    /// Same as [`transfer_tx`], with `tx_name` recorded on the tracing span
    /// so concurrent transfers can be told apart in the logs.
    ///
    /// [`transfer_tx`]: TransferService::transfer_tx
    pub fn transfer_tx_named(
        &self,
        tx_name: &str,
        params: &TransferTxParams,
    ) -> Result<TransferTxResult> {
        let span = info_span!("transfer_tx", tx_name);
        let _entered = span.enter();
        self.transfer_tx(params)
    }

    /// Validate a transfer request, then run it.
    ///
    /// Rejects non-positive amounts, self-transfers, unknown accounts and
    /// accounts in different currencies. Overdrafts are allowed.
    pub fn checked_transfer(&self, params: &TransferTxParams) -> Result<TransferTxResult> {
        params.validate()?;

        let from = self.store.get_account(params.from_account_id)?;
        let to = self.store.get_account(params.to_account_id)?;
        if from.currency != to.currency {
            return Err(Error::validation(format!(
                "currency mismatch: account {} holds {}, account {} holds {}",
                from.id, from.currency, to.id, to.currency
            )));
        }

        self.transfer_tx(params)
    }

    /// [`checked_transfer`] under a named tracing span
    ///
    /// [`checked_transfer`]: TransferService::checked_transfer
    pub fn checked_transfer_named(
        &self,
        tx_name: &str,
        params: &TransferTxParams,
    ) -> Result<TransferTxResult> {
        let span = info_span!("transfer_tx", tx_name);
        let _entered = span.enter();
        self.checked_transfer(params)
    }
}

/// The body of one transfer unit
fn execute(store: &dyn LedgerStore, params: &TransferTxParams) -> Result<TransferTxResult> {
    let transfer = store
        .create_transfer(&CreateTransferParams::from(*params))
        .map_err(|e| e.at_step(TransferStep::CreateTransfer))?;
    debug!(transfer_id = transfer.id, "created transfer");

    let from_entry = store
        .create_entry(&CreateEntryParams {
            account_id: params.from_account_id,
            amount: -params.amount,
        })
        .map_err(|e| e.at_step(TransferStep::CreateFromEntry))?;
    debug!(entry_id = from_entry.id, "created from entry");

    let to_entry = store
        .create_entry(&CreateEntryParams {
            account_id: params.to_account_id,
            amount: params.amount,
        })
        .map_err(|e| e.at_step(TransferStep::CreateToEntry))?;
    debug!(entry_id = to_entry.id, "created to entry");

    let [first, second] = params
        .ordered_deltas()
        .map(|(id, amount)| AddAccountBalanceParams { id, amount });
    let first = store
        .add_account_balance(&first)
        .map_err(|e| e.at_step(TransferStep::UpdateBalances))?;
    let second = store
        .add_account_balance(&second)
        .map_err(|e| e.at_step(TransferStep::UpdateBalances))?;
    debug!(first = first.id, second = second.id, "updated balances");

    let (from_account, to_account) = if params.from_account_id < params.to_account_id {
        (first, second)
    } else {
        (second, first)
    };

    Ok(TransferTxResult {
        transfer,
        from_account,
        to_account,
        from_entry,
        to_entry,
    })
}
