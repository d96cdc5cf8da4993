//! Account commands - open, inspect, adjust and close accounts

use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;
use dialoguer::Confirm;
use simplebank_core::ListParams;

use super::get_context;
use crate::output::{accounts_table, format_money, parse_money, print_json, success, warning};

#[derive(Subcommand)]
pub enum AccountCommands {
    /// Open a new account
    Create {
        /// Account owner
        owner: String,
        /// Three-letter currency code
        #[arg(long, short, default_value = "USD")]
        currency: String,
        /// Opening balance, e.g. 100.00
        #[arg(long, short, default_value = "0", allow_hyphen_values = true)]
        balance: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show one account
    Get {
        id: i64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List accounts
    List {
        /// Maximum number of accounts (defaults to the configured page size)
        #[arg(long)]
        limit: Option<i64>,
        #[arg(long, default_value_t = 0)]
        offset: i64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Overwrite an account balance without recording entries
    Update {
        id: i64,
        /// New balance, e.g. 250.00
        #[arg(long, allow_hyphen_values = true)]
        balance: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete an account that has no entries or transfers
    Delete {
        id: i64,
        /// Skip confirmation prompt
        #[arg(long, short)]
        force: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

pub fn run(command: AccountCommands) -> Result<()> {
    let ctx = get_context()?;

    match command {
        AccountCommands::Create {
            owner,
            currency,
            balance,
            json,
        } => {
            let balance = parse_money(&balance)?;
            let account = ctx.account_service.open_account(&owner, balance, &currency)?;
            if json {
                print_json(&account)?;
            } else {
                success(&format!(
                    "Opened account {} for {} ({} {})",
                    account.id,
                    account.owner,
                    format_money(account.balance),
                    account.currency
                ));
            }
        }
        AccountCommands::Get { id, json } => {
            let account = ctx.account_service.get_account(id)?;
            if json {
                print_json(&account)?;
            } else {
                println!("{}", accounts_table(std::slice::from_ref(&account)));
            }
        }
        AccountCommands::List {
            limit,
            offset,
            json,
        } => {
            let page = match limit {
                Some(limit) => ListParams::new(limit, offset),
                None => ctx.page(offset),
            };
            let accounts = ctx.account_service.list_accounts(&page)?;
            if json {
                print_json(&accounts)?;
            } else if accounts.is_empty() {
                println!("{}", "No accounts".dimmed());
            } else {
                println!("{}", accounts_table(&accounts));
            }
        }
        AccountCommands::Update { id, balance, json } => {
            let account = ctx.account_service.set_balance(id, parse_money(&balance)?)?;
            if json {
                print_json(&account)?;
            } else {
                success(&format!(
                    "Account {} balance set to {} {}",
                    account.id,
                    format_money(account.balance),
                    account.currency
                ));
            }
        }
        AccountCommands::Delete { id, force, json } => {
            let account = ctx.account_service.get_account(id)?;

            if !force {
                warning(&format!(
                    "\nThis will delete account {} owned by {}.",
                    account.id, account.owner
                ));
                if !Confirm::new()
                    .with_prompt("Are you sure?")
                    .default(false)
                    .interact()?
                {
                    println!("{}\n", "Cancelled".dimmed());
                    return Ok(());
                }
            }

            ctx.account_service.close_account(id)?;
            if json {
                print_json(&serde_json::json!({"deleted": id}))?;
            } else {
                println!("\n{} Account {} deleted\n", "✓".green(), id);
            }
        }
    }

    Ok(())
}
