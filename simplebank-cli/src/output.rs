//! Output formatting utilities

use std::str::FromStr;

use anyhow::{bail, Context, Result};
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL_CONDENSED, ContentArrangement, Table};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use simplebank_core::{Account, Entry, Transfer};

/// Minor units per major unit for every supported currency
const MINOR_SCALE: u32 = 2;

/// Print a success message
pub fn success(msg: &str) {
    println!("{}", msg.green());
}

/// Print a warning message
pub fn warning(msg: &str) {
    println!("{}", msg.yellow());
}

/// Print an info message
pub fn info(msg: &str) {
    println!("{}", msg.cyan());
}

/// Create a styled table
pub fn create_table() -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table
}

/// Format minor units as a decimal amount, e.g. 12345 -> "123.45"
pub fn format_money(amount: i64) -> String {
    Decimal::new(amount, MINOR_SCALE).to_string()
}

/// Parse a decimal amount into minor units, e.g. "123.45" -> 12345
pub fn parse_money(input: &str) -> Result<i64> {
    let value = Decimal::from_str(input.trim())
        .with_context(|| format!("'{input}' is not a valid amount"))?;
    if value.scale() > MINOR_SCALE {
        bail!("'{input}' has more than {MINOR_SCALE} decimal places");
    }
    let minor = value * Decimal::from(10i64.pow(MINOR_SCALE));
    minor
        .to_i64()
        .with_context(|| format!("'{input}' is out of range"))
}

pub fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn accounts_table(accounts: &[Account]) -> Table {
    let mut table = create_table();
    table.set_header(vec!["ID", "Owner", "Balance", "Currency", "Created"]);
    for account in accounts {
        table.add_row(vec![
            account.id.to_string(),
            account.owner.clone(),
            format_money(account.balance),
            account.currency.clone(),
            account.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        ]);
    }
    table
}

pub fn entries_table(entries: &[Entry]) -> Table {
    let mut table = create_table();
    table.set_header(vec!["ID", "Account", "Amount", "Created"]);
    for entry in entries {
        let amount = format_money(entry.amount);
        let amount = if entry.is_debit() {
            amount.red().to_string()
        } else if entry.is_credit() {
            amount.green().to_string()
        } else {
            amount
        };
        table.add_row(vec![
            entry.id.to_string(),
            entry.account_id.to_string(),
            amount,
            entry.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        ]);
    }
    table
}

pub fn transfers_table(transfers: &[Transfer]) -> Table {
    let mut table = create_table();
    table.set_header(vec!["ID", "From", "To", "Amount", "Created"]);
    for transfer in transfers {
        table.add_row(vec![
            transfer.id.to_string(),
            transfer.from_account_id.to_string(),
            transfer.to_account_id.to_string(),
            format_money(transfer.amount),
            transfer.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        ]);
    }
    table
}
