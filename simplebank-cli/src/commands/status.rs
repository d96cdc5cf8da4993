//! Status command - show ledger totals

use anyhow::Result;
use colored::Colorize;
use comfy_table::{ContentArrangement, Table};

use super::get_context;
use crate::output::{format_money, print_json};

pub fn run(json: bool) -> Result<()> {
    let ctx = get_context()?;
    let status = ctx.status_service.status()?;

    if json {
        return print_json(&status);
    }

    println!("{}", "Ledger Status".bold());
    println!();

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);

    table.add_row(vec!["Accounts", &status.account_count.to_string()]);
    table.add_row(vec!["Entries", &status.entry_count.to_string()]);
    table.add_row(vec!["Transfers", &status.transfer_count.to_string()]);
    table.add_row(vec!["Transfer volume", &format_money(status.transfer_volume)]);

    println!("{}", table);
    println!();

    if !status.balances_by_currency.is_empty() {
        println!("{}", "Balances".bold());
        for (currency, total) in &status.balances_by_currency {
            println!("  {} {}", currency, format_money(*total));
        }
    }

    Ok(())
}
