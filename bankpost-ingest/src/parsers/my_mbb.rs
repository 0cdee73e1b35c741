//! Maybank Malaysia export parser.
//!
//! Expected header (the narration header is repeated in the download):
//!   Posting date,Transaction Description,Transaction Description,Transaction Ref,Debit,Credit,CUSTOMER_NAME
//!   2025-15-08,IBG PAYMENT INTO A/C,ABC TRADING SDN BHD*INV 1021,MBB0815001,,1500.00,
//!
//! The second narration column carries the payer; it falls back to the first
//! when it is empty or a lone `-`.

use bankpost_core::{ParseError, RowIndex, SourceType};
use regex::Regex;
use std::sync::LazyLock;

use super::{Layout, Narration, parse_with_layout, tidy};
use crate::types::{RawRow, RowOutcome};

pub const LAYOUT: Layout = Layout {
    date: "Posting date",
    narration: &["Transaction Description", "Transaction Description.1"],
    credit: "Credit",
    debit: Some("Debit"),
    reference: Some("Transaction Ref"),
};

static BANK_NOISE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(?:\d+\s+)?(?:IBG PAYMENT INTO A/C|MBB CT|DUITNOW TRSF CR)\s*").expect("valid regex")
});

pub fn parse(row: &RawRow, index: RowIndex, expected_month: u32) -> Result<RowOutcome, ParseError> {
    parse_with_layout(SourceType::MyMbb, &LAYOUT, row, index, expected_month, narration)
}

/// Payer text from the two Maybank narration columns.
pub(super) fn narration(row: &RawRow) -> Option<Narration> {
    let payer = row
        .get("Transaction Description.1")
        .filter(|s| *s != "-")
        .or_else(|| row.get("Transaction Description"))?;

    let payer = BANK_NOISE.replace(payer, "");
    // `*` separates the payer from the invoice or memo the sender typed.
    let (name, memo) = match payer.split_once('*') {
        Some((name, memo)) => (name, Some(tidy(memo))),
        None => (&*payer, None),
    };

    Some(Narration {
        counterparty: tidy(name),
        description: memo,
    })
}
