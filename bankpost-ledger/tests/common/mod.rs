#![allow(dead_code)]

use bankpost_core::{RowIndex, SourceType, Transaction};
use bankpost_ledger::{ArtifactSink, PaymentClient, PaymentReceipt, PaymentRequest, SubmissionFailure};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Payment client that records every call and fails the rows it is told to.
#[derive(Default)]
pub struct ScriptedClient {
    pub calls: Vec<RowIndex>,
    pub failures: BTreeMap<RowIndex, SubmissionFailure>,
    pub counterparties: Vec<String>,
}

impl ScriptedClient {
    pub fn failing_at(row: RowIndex, retryable: bool) -> Self {
        let failure = if retryable {
            SubmissionFailure::retryable("503 service unavailable")
        } else {
            SubmissionFailure::rejected("400 customer not found")
        };
        Self {
            failures: BTreeMap::from([(row, failure)]),
            ..Default::default()
        }
    }
}

impl PaymentClient for ScriptedClient {
    fn create_payment(&mut self, req: &PaymentRequest) -> Result<PaymentReceipt, SubmissionFailure> {
        self.calls.push(req.source_row_index);
        if let Some(f) = self.failures.remove(&req.source_row_index) {
            return Err(f);
        }
        self.counterparties.push(req.counterparty.clone());
        Ok(PaymentReceipt {
            payment_id: Some(format!("PAY-{}", req.source_row_index)),
        })
    }
}

#[derive(Default)]
pub struct RecordingSink {
    pub published: Vec<PathBuf>,
    pub cleaned: Vec<PathBuf>,
}

impl ArtifactSink for RecordingSink {
    fn publish(&mut self, artifacts: &[PathBuf]) -> anyhow::Result<()> {
        self.published.extend_from_slice(artifacts);
        Ok(())
    }

    fn cleanup(&mut self, files: &[PathBuf]) -> anyhow::Result<()> {
        self.cleaned.extend_from_slice(files);
        Ok(())
    }
}

pub fn txns(source: SourceType, rows: impl IntoIterator<Item = RowIndex>) -> Vec<Transaction> {
    let date = NaiveDate::from_ymd_opt(2025, 8, 15).unwrap();
    rows.into_iter()
        .map(|row| Transaction::new(source, row, date, Decimal::new(row as i64 * 100, 2), format!("PAYER {row}")))
        .collect()
}
