//! Doctor service - ledger integrity checks

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::json;

use crate::domain::result::Result;
use crate::ports::SharedStore;

pub struct DoctorService {
    store: SharedStore,
}

impl DoctorService {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// Run all integrity checks against one consistent summary
    pub fn run_checks(&self) -> Result<DoctorResult> {
        let summary = self.store.summarize()?;
        let mut checks = BTreeMap::new();

        // Every transfer posts a debit and a matching credit
        checks.insert(
            "entries_net_zero".to_string(),
            if summary.entry_net == 0 {
                CheckResult::pass("Entries sum to zero")
            } else {
                CheckResult::error(
                    format!("Entries sum to {} instead of zero", summary.entry_net),
                    vec![json!({"entry_net": summary.entry_net})],
                )
            },
        );

        let expected_entries = summary.transfer_count * 2;
        checks.insert(
            "entries_pair_transfers".to_string(),
            if summary.entry_count == expected_entries {
                CheckResult::pass(format!(
                    "{} entries for {} transfer(s)",
                    summary.entry_count, summary.transfer_count
                ))
            } else {
                CheckResult::warning(
                    format!(
                        "{} entries found, {} expected for {} transfer(s)",
                        summary.entry_count, expected_entries, summary.transfer_count
                    ),
                    vec![json!({
                        "entry_count": summary.entry_count,
                        "transfer_count": summary.transfer_count
                    })],
                )
            },
        );

        let totals: Vec<serde_json::Value> = summary
            .balances_by_currency
            .iter()
            .map(|(currency, total)| json!({"currency": currency, "total": total}))
            .collect();
        checks.insert(
            "currency_totals".to_string(),
            CheckResult {
                status: "pass".to_string(),
                message: format!(
                    "{} account(s) in {} currenc{}",
                    summary.account_count,
                    totals.len(),
                    if totals.len() == 1 { "y" } else { "ies" }
                ),
                details: if totals.is_empty() { None } else { Some(totals) },
            },
        );

        let passed = checks.values().filter(|c| c.status == "pass").count() as i64;
        let warnings = checks.values().filter(|c| c.status == "warning").count() as i64;
        let errors = checks.values().filter(|c| c.status == "error").count() as i64;

        Ok(DoctorResult {
            checks,
            summary: DoctorSummary {
                passed,
                warnings,
                errors,
            },
        })
    }
}

#[derive(Debug, Serialize)]
pub struct DoctorResult {
    pub checks: BTreeMap<String, CheckResult>,
    pub summary: DoctorSummary,
}

#[derive(Debug, Serialize)]
pub struct CheckResult {
    pub status: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<serde_json::Value>>,
}

impl CheckResult {
    fn pass(message: impl Into<String>) -> Self {
        Self {
            status: "pass".to_string(),
            message: message.into(),
            details: None,
        }
    }

    fn warning(message: impl Into<String>, details: Vec<serde_json::Value>) -> Self {
        Self {
            status: "warning".to_string(),
            message: message.into(),
            details: Some(details),
        }
    }

    fn error(message: impl Into<String>, details: Vec<serde_json::Value>) -> Self {
        Self {
            status: "error".to_string(),
            message: message.into(),
            details: Some(details),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DoctorSummary {
    pub passed: i64,
    pub warnings: i64,
    pub errors: i64,
}
