//! Parse every pending row of an export with one source's parser.

use bankpost_core::{ExpectedMonth, ParseError, RowIndex, SourceType, Transaction};

use crate::export::Export;
use crate::parsers::{layout_for, parse_row};
use crate::types::{RowOutcome, SkipReason};

/// What to do with a row that fails to parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParsePolicy {
    /// Stop at the first bad row so it cannot be silently lost.
    #[default]
    Halt,
    /// Log the bad row and continue.
    SkipInvalid,
}

#[derive(Debug, Default)]
pub struct ParsedBatch {
    pub transactions: Vec<Transaction>,
    pub skipped: Vec<(RowIndex, SkipReason)>,
    pub rejected: Vec<ParseError>,
}

impl ParsedBatch {
    pub fn review_count(&self) -> usize {
        self.transactions.iter().filter(|t| t.date_needs_review).count()
    }
}

/// Parse the rows of `export` above `cursor` into transactions, in row order.
pub fn parse_export(
    source: SourceType,
    export: &Export,
    cursor: RowIndex,
    month: ExpectedMonth,
    policy: ParsePolicy,
) -> Result<ParsedBatch, ParseError> {
    layout_for(source).check_columns(export.columns())?;

    let mut batch = ParsedBatch::default();
    for (index, row) in export.rows().filter(|(i, _)| *i > cursor) {
        if row.is_blank() {
            batch.skipped.push((index, SkipReason::NoTransaction));
            continue;
        }
        match parse_row(source, row, index, month.month()) {
            Ok(RowOutcome::Parsed(txn)) => batch.transactions.push(txn),
            Ok(RowOutcome::Skip(reason)) => {
                tracing::debug!(source = %source, row = index, ?reason, "row skipped");
                batch.skipped.push((index, reason));
            }
            Err(err) => match policy {
                ParsePolicy::Halt => return Err(err),
                ParsePolicy::SkipInvalid => {
                    tracing::warn!(source = %source, row = index, error = %err, "invalid row dropped");
                    batch.rejected.push(err);
                }
            },
        }
    }

    tracing::info!(
        source = %source,
        parsed = batch.transactions.len(),
        skipped = batch.skipped.len(),
        rejected = batch.rejected.len(),
        review = batch.review_count(),
        "parsed export"
    );
    Ok(batch)
}
