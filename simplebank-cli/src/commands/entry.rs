//! Entry commands - inspect the balance-change trail

use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;

use super::get_context;
use crate::output::{entries_table, print_json};
use simplebank_core::ports::LedgerStore;
use simplebank_core::{ListEntriesParams, ListParams};

#[derive(Subcommand)]
pub enum EntryCommands {
    /// Show one entry
    Get {
        id: i64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List entries, optionally for one account
    List {
        /// Only entries of this account
        #[arg(long)]
        account: Option<i64>,
        #[arg(long)]
        limit: Option<i64>,
        #[arg(long, default_value_t = 0)]
        offset: i64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

pub fn run(command: EntryCommands) -> Result<()> {
    let ctx = get_context()?;

    match command {
        EntryCommands::Get { id, json } => {
            let entry = ctx.store.get_entry(id)?;
            if json {
                print_json(&entry)?;
            } else {
                println!("{}", entries_table(std::slice::from_ref(&entry)));
            }
        }
        EntryCommands::List {
            account,
            limit,
            offset,
            json,
        } => {
            let page = match limit {
                Some(limit) => ListParams::new(limit, offset),
                None => ctx.page(offset),
            };
            let entries = ctx.store.list_entries(&ListEntriesParams {
                account_id: account,
                page,
            })?;
            if json {
                print_json(&entries)?;
            } else if entries.is_empty() {
                println!("{}", "No entries".dimmed());
            } else {
                println!("{}", entries_table(&entries));
            }
        }
    }

    Ok(())
}
