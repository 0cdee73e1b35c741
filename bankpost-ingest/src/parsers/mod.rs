//! Row parsers, one per source type, all producing the canonical `Transaction`.
//!
//! Each variant describes its fixed column layout and how the counterparty is
//! carved out of the bank narration. Dates always go through
//! `bankpost_core::resolve`; no variant decides day/month order itself.

pub mod my_mbb;
pub mod my_pbb;
pub mod sg_mbb;
pub mod smarthome_mbb;

use bankpost_core::{ParseError, RowIndex, SourceType, Transaction, resolve};
use rust_decimal::Decimal;
use std::str::FromStr;

use crate::export::NAME_COLUMN;
use crate::types::{Columns, RawRow, RowOutcome, SkipReason};

/// Fixed column names of one export layout.
#[derive(Debug, Clone, Copy)]
pub struct Layout {
    pub date: &'static str,
    /// Narration columns, most specific first.
    pub narration: &'static [&'static str],
    pub credit: &'static str,
    pub debit: Option<&'static str>,
    pub reference: Option<&'static str>,
}

impl Layout {
    /// Columns that must exist in the header for the layout to apply.
    pub fn required_columns(&self) -> Vec<&'static str> {
        let mut cols = vec![self.date, self.credit];
        cols.extend(self.narration.iter().take(1));
        cols
    }

    /// Check an export header before any row is parsed.
    pub fn check_columns(&self, columns: &Columns) -> Result<(), ParseError> {
        match self
            .required_columns()
            .into_iter()
            .find(|c| !columns.contains(c))
        {
            Some(missing) => Err(ParseError::MissingColumn(missing)),
            None => Ok(()),
        }
    }
}

/// Counterparty text and any leftover narration.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Narration {
    pub counterparty: String,
    pub description: Option<String>,
}

pub fn layout_for(source: SourceType) -> &'static Layout {
    match source {
        SourceType::MyMbb => &my_mbb::LAYOUT,
        SourceType::MyPbb => &my_pbb::LAYOUT,
        SourceType::SgMbb => &sg_mbb::LAYOUT,
        SourceType::SmarthomeMbb => &smarthome_mbb::LAYOUT,
    }
}

/// Parse one raw row of a `source` export.
pub fn parse_row(
    source: SourceType,
    row: &RawRow,
    index: RowIndex,
    expected_month: u32,
) -> Result<RowOutcome, ParseError> {
    match source {
        SourceType::MyMbb => my_mbb::parse(row, index, expected_month),
        SourceType::MyPbb => my_pbb::parse(row, index, expected_month),
        SourceType::SgMbb => sg_mbb::parse(row, index, expected_month),
        SourceType::SmarthomeMbb => smarthome_mbb::parse(row, index, expected_month),
    }
}

/// Shared mapping from a layout to the canonical shape. `narrate` extracts the
/// counterparty from the row's narration cells.
pub(crate) fn parse_with_layout(
    source: SourceType,
    layout: &Layout,
    row: &RawRow,
    index: RowIndex,
    expected_month: u32,
    narrate: impl Fn(&RawRow) -> Option<Narration>,
) -> Result<RowOutcome, ParseError> {
    if row.get(NAME_COLUMN).is_some() {
        return Ok(RowOutcome::Skip(SkipReason::AlreadyNamed));
    }

    let date_raw = row.get(layout.date);
    let credit_raw = row.get(layout.credit);
    let debit_raw = layout.debit.and_then(|c| row.get(c));

    // Section headers and balance lines carry text but neither date nor amount.
    if date_raw.is_none() && credit_raw.is_none() && debit_raw.is_none() {
        return Ok(RowOutcome::Skip(SkipReason::NoTransaction));
    }
    let narration = narrate(row);

    let date_raw = date_raw.ok_or(ParseError::MissingField {
        row: index,
        field: "date",
    })?;
    let resolution = resolve(date_raw, expected_month).map_err(|source| ParseError::Date {
        row: index,
        value: date_raw.to_string(),
        source,
    })?;

    let amount = signed_amount(credit_raw, debit_raw, index)?;

    let narration = narration
        .filter(|n| !n.counterparty.is_empty())
        .ok_or(ParseError::MissingField {
            row: index,
            field: "counterparty",
        })?;

    let reference = layout
        .reference
        .and_then(|c| row.get(c))
        .map(str::to_string);

    let txn = Transaction::new(source, index, resolution.date, amount, narration.counterparty)
        .with_reference(reference)
        .with_description(narration.description)
        .with_review_flag(resolution.needs_review);

    if txn.date_needs_review {
        tracing::warn!(
            source = %source,
            row = index,
            raw = date_raw,
            resolved = %txn.posted_date,
            "ambiguous date resolved by closest month; review"
        );
    }

    Ok(RowOutcome::Parsed(txn))
}

/// Credit wins when present; a debit-only row becomes a negative amount.
fn signed_amount(
    credit: Option<&str>,
    debit: Option<&str>,
    index: RowIndex,
) -> Result<Decimal, ParseError> {
    let parse = |raw: &str, field: &'static str| {
        parse_amount(raw).ok_or_else(|| ParseError::Malformed {
            row: index,
            field,
            value: raw.to_string(),
        })
    };

    match (credit, debit) {
        (Some(c), _) => {
            let value = parse(c, "credit")?;
            if value.is_zero() {
                if let Some(d) = debit {
                    return Ok(-parse(d, "debit")?.abs());
                }
            }
            Ok(value)
        }
        (None, Some(d)) => Ok(-parse(d, "debit")?.abs()),
        (None, None) => Err(ParseError::MissingField {
            row: index,
            field: "amount",
        }),
    }
}

/// Parse a bank amount cell: `1,234.50`, `"RM 1,234.50"`, `(12.00)`, `-5`.
pub fn parse_amount(raw: &str) -> Option<Decimal> {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | '(' | ')'))
        .collect();
    if let Some(inner) = cleaned.strip_prefix('(').and_then(|v| v.strip_suffix(')')) {
        return Decimal::from_str(inner).ok().map(|d| -d);
    }
    if cleaned.is_empty() {
        return None;
    }
    Decimal::from_str(&cleaned).ok()
}

/// Collapse whitespace and drop trailing separators.
pub(crate) fn tidy(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .trim_end_matches(['/', '-', '.', ','])
        .trim()
        .to_string()
}
