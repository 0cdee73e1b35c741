//! Resumable, strictly ordered payment submission.
//!
//! The cursor in the progress store is the only duplicate guard: a row at or
//! below it is never sent again, and the cursor moves after each individual
//! success so an interrupted run loses at most the row in flight.

use bankpost_core::{ParseError, RowIndex, SourceType, Transaction};
use std::collections::BTreeMap;

use crate::error::LedgerError;
use crate::payments::{PaymentClient, PaymentRequest};
use crate::progress::{ProgressRecord, ProgressStore};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EngineState {
    #[default]
    Idle,
    Running,
    Completed,
    /// Stopped on a retryable failure; rerun to continue.
    Failed,
    /// Stopped on a rejected row; fix the data or move the cursor to continue.
    Paused,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submitted {
    pub source_row_index: RowIndex,
    pub payment_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedRow {
    pub source_row_index: RowIndex,
    pub message: String,
    pub retryable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionReport {
    pub source_type: SourceType,
    pub effective_start: RowIndex,
    pub submitted: Vec<Submitted>,
    pub skipped_below_cursor: usize,
    pub failure: Option<FailedRow>,
    pub final_cursor: RowIndex,
}

impl SubmissionReport {
    pub fn is_complete(&self) -> bool {
        self.failure.is_none()
    }

    pub fn submitted_rows(&self) -> Vec<RowIndex> {
        self.submitted.iter().map(|s| s.source_row_index).collect()
    }
}

pub struct SubmissionEngine<S, C> {
    store: S,
    client: C,
    states: BTreeMap<SourceType, EngineState>,
}

impl<S: ProgressStore, C: PaymentClient> SubmissionEngine<S, C> {
    pub fn new(store: S, client: C) -> Self {
        Self {
            store,
            client,
            states: BTreeMap::new(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn into_parts(self) -> (S, C) {
        (self.store, self.client)
    }

    pub fn state(&self, source: SourceType) -> EngineState {
        self.states.get(&source).copied().unwrap_or_default()
    }

    /// Read-only view of the persisted cursor.
    pub fn show_progress(&self, source: SourceType) -> Result<ProgressRecord, LedgerError> {
        self.store.load(source)
    }

    /// Move the cursor to `to_row`, forwards or backwards. Rows above it will
    /// be submitted again on the next run. Returns the record it replaced.
    pub fn reset_progress(&mut self, source: SourceType, to_row: RowIndex) -> Result<ProgressRecord, LedgerError> {
        let previous = self.store.load(source)?;
        self.store.save(source, &ProgressRecord::at(to_row))?;
        self.states.insert(source, EngineState::Idle);
        tracing::warn!(
            source = %source,
            from = previous.last_submitted_row_index,
            to = to_row,
            "progress reset"
        );
        Ok(previous)
    }

    /// Submit every transaction at or after
    /// `max(cursor + 1, start_row_override.unwrap_or(1))`, in row order, and
    /// stop at the first failure.
    pub fn submit_all(
        &mut self,
        transactions: &[Transaction],
        source: SourceType,
        start_row_override: Option<RowIndex>,
    ) -> Result<SubmissionReport, LedgerError> {
        let ordered = ordered_batch(transactions, source)?;

        let cursor = self.store.load(source)?.last_submitted_row_index;
        let effective_start = (cursor + 1).max(start_row_override.unwrap_or(1));
        self.states.insert(source, EngineState::Running);
        tracing::info!(
            source = %source,
            cursor,
            effective_start,
            rows = ordered.len(),
            "submission started"
        );

        let mut report = SubmissionReport {
            source_type: source,
            effective_start,
            submitted: Vec::new(),
            skipped_below_cursor: 0,
            failure: None,
            final_cursor: cursor,
        };

        for txn in ordered {
            let row = txn.source_row_index;
            if row < effective_start {
                report.skipped_below_cursor += 1;
                continue;
            }

            let request = PaymentRequest::from(txn);
            match self.client.create_payment(&request) {
                Ok(receipt) => {
                    if let Err(e) = self.store.save(source, &ProgressRecord::at(row)) {
                        // The payment exists but the cursor did not move.
                        tracing::error!(source = %source, row, error = %e, "cursor write failed after submission");
                        self.states.insert(source, EngineState::Failed);
                        return Err(e);
                    }
                    report.final_cursor = row;
                    tracing::info!(
                        source = %source,
                        row,
                        amount = %request.amount,
                        counterparty = %request.counterparty,
                        payment_id = receipt.payment_id.as_deref().unwrap_or("-"),
                        "payment created"
                    );
                    report.submitted.push(Submitted {
                        source_row_index: row,
                        payment_id: receipt.payment_id,
                    });
                }
                Err(failure) => {
                    tracing::error!(
                        source = %source,
                        row,
                        retryable = failure.retryable,
                        error = %failure,
                        "submission halted"
                    );
                    report.failure = Some(FailedRow {
                        source_row_index: row,
                        message: failure.message,
                        retryable: failure.retryable,
                    });
                    break;
                }
            }
        }

        let state = match &report.failure {
            None => EngineState::Completed,
            Some(f) if f.retryable => EngineState::Failed,
            Some(_) => EngineState::Paused,
        };
        self.states.insert(source, state);
        tracing::info!(
            source = %source,
            submitted = report.submitted.len(),
            final_cursor = report.final_cursor,
            state = ?state,
            "submission finished"
        );
        Ok(report)
    }
}

/// The batch sorted by row index. Mixed sources or repeated indices refuse the
/// whole run.
fn ordered_batch(transactions: &[Transaction], source: SourceType) -> Result<Vec<&Transaction>, LedgerError> {
    if let Some(stray) = transactions.iter().find(|t| t.source_type != source) {
        return Err(LedgerError::SourceMismatch {
            row: stray.source_row_index,
            expected: source,
            found: stray.source_type,
        });
    }
    let mut ordered: Vec<&Transaction> = transactions.iter().collect();
    ordered.sort_by_key(|t| t.source_row_index);
    if let Some(pair) = ordered.windows(2).find(|w| w[0].source_row_index == w[1].source_row_index) {
        return Err(ParseError::DuplicateRow(pair[0].source_row_index).into());
    }
    Ok(ordered)
}
