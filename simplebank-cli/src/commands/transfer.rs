//! Transfer commands - move money between accounts

use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;

use super::get_context;
use crate::output::{format_money, info, parse_money, print_json, success, transfers_table};
use simplebank_core::ports::LedgerStore;
use simplebank_core::{ListParams, ListTransfersParams, TransferTxParams};

#[derive(Subcommand)]
pub enum TransferCommands {
    /// Send money from one account to another
    Send {
        /// Source account ID
        from: i64,
        /// Destination account ID
        to: i64,
        /// Amount, e.g. 12.50
        amount: String,
        /// Name recorded in the logs for this transfer
        #[arg(long)]
        name: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show one transfer
    Get {
        id: i64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List transfers
    List {
        /// Only transfers out of this account
        #[arg(long)]
        from: Option<i64>,
        /// Only transfers into this account
        #[arg(long)]
        to: Option<i64>,
        #[arg(long)]
        limit: Option<i64>,
        #[arg(long, default_value_t = 0)]
        offset: i64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

pub fn run(command: TransferCommands) -> Result<()> {
    let ctx = get_context()?;

    match command {
        TransferCommands::Send {
            from,
            to,
            amount,
            name,
            json,
        } => {
            let params = TransferTxParams::new(from, to, parse_money(&amount)?);
            let result = match name {
                Some(name) => ctx.transfer_service.checked_transfer_named(&name, &params)?,
                None => ctx.transfer_service.checked_transfer(&params)?,
            };

            if json {
                print_json(&result)?;
            } else {
                success(&format!(
                    "Transferred {} from account {} to account {} (transfer {})",
                    format_money(result.transfer.amount),
                    result.from_account.id,
                    result.to_account.id,
                    result.transfer.id
                ));
                info(&format!(
                    "  {}: {} {}",
                    result.from_account.owner,
                    format_money(result.from_account.balance),
                    result.from_account.currency
                ));
                info(&format!(
                    "  {}: {} {}",
                    result.to_account.owner,
                    format_money(result.to_account.balance),
                    result.to_account.currency
                ));
            }
        }
        TransferCommands::Get { id, json } => {
            let transfer = ctx.store.get_transfer(id)?;
            if json {
                print_json(&transfer)?;
            } else {
                println!("{}", transfers_table(std::slice::from_ref(&transfer)));
            }
        }
        TransferCommands::List {
            from,
            to,
            limit,
            offset,
            json,
        } => {
            let page = match limit {
                Some(limit) => ListParams::new(limit, offset),
                None => ctx.page(offset),
            };
            let transfers = ctx.store.list_transfers(&ListTransfersParams {
                from_account_id: from,
                to_account_id: to,
                page,
            })?;
            if json {
                print_json(&transfers)?;
            } else if transfers.is_empty() {
                println!("{}", "No transfers".dimmed());
            } else {
                println!("{}", transfers_table(&transfers));
            }
        }
    }

    Ok(())
}
