//! Doctor command - ledger integrity checks

use anyhow::{bail, Result};
use colored::Colorize;
use comfy_table::{Cell, Color};
use serde_json::Value;

use super::get_context;
use crate::output::{create_table, format_money, print_json};

/// Detail keys holding amounts in minor units
const MONEY_KEYS: &[&str] = &["entry_net", "total"];

fn status_cell(status: &str) -> Cell {
    match status {
        "pass" => Cell::new("PASS").fg(Color::Green),
        "warning" => Cell::new("WARN").fg(Color::Yellow),
        "error" => Cell::new("ERROR").fg(Color::Red),
        other => Cell::new(other),
    }
}

/// One detail object as `key: value` pairs, amounts shown as money
fn describe(detail: &Value) -> String {
    let Value::Object(fields) = detail else {
        return detail.to_string();
    };
    fields
        .iter()
        .map(|(key, value)| match (value.as_i64(), value.as_str()) {
            (Some(n), _) if MONEY_KEYS.contains(&key.as_str()) => {
                format!("{key}: {}", format_money(n))
            }
            (_, Some(s)) => format!("{key}: {s}"),
            _ => format!("{key}: {value}"),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn run(verbose: bool, json: bool) -> Result<()> {
    let ctx = get_context()?;
    let result = ctx.doctor_service.run_checks()?;

    if json {
        print_json(&result)?;
    } else {
        println!("{}\n", "Ledger Health Check".bold());

        let mut table = create_table();
        table.set_header(vec!["Check", "Status", "Message"]);
        for (name, check) in &result.checks {
            table.add_row(vec![
                Cell::new(name.replace('_', " ")),
                status_cell(&check.status),
                Cell::new(&check.message),
            ]);
            if !verbose {
                continue;
            }
            for detail in check.details.iter().flatten() {
                table.add_row(vec![
                    Cell::new(""),
                    Cell::new(""),
                    Cell::new(format!("  - {}", describe(detail))),
                ]);
            }
        }
        println!("{table}\n");

        let summary = &result.summary;
        println!(
            "Summary: {} passed, {} warnings, {} errors",
            summary.passed.to_string().green(),
            summary.warnings.to_string().yellow(),
            summary.errors.to_string().red(),
        );
    }

    if result.summary.errors > 0 {
        bail!("{} check(s) failed", result.summary.errors);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_describe_formats_money_keys() {
        let detail = json!({"currency": "USD", "total": 12345});
        assert_eq!(describe(&detail), "currency: USD, total: 123.45");
    }

    #[test]
    fn test_describe_leaves_counts_alone() {
        let detail = json!({"entry_count": 3, "transfer_count": 1});
        assert_eq!(describe(&detail), "entry_count: 3, transfer_count: 1");
    }
}
