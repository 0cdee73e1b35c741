//! Maybank Singapore export parser.
//!
//! Expected header:
//!   Transaction Date,Description,Transaction Ref,Debit,Credit,CUSTOMER_NAME
//!   15/08/2025,INWARD GIRO MOOD COLLECTIVES PTE. LTD. 20250815001234,SG88120,,4200.00,

use bankpost_core::{ParseError, RowIndex, SourceType};
use regex::Regex;
use std::sync::LazyLock;

use super::{Layout, Narration, parse_with_layout, tidy};
use crate::types::{RawRow, RowOutcome};

pub const LAYOUT: Layout = Layout {
    date: "Transaction Date",
    narration: &["Description"],
    credit: "Credit",
    debit: Some("Debit"),
    reference: Some("Transaction Ref"),
};

static CHANNEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:INWARD (?:GIRO|TT|FAST)|FAST PAYMENT|PAYNOW (?:TRANSFER|TRF))\s*[-:/]?\s*")
        .expect("valid regex")
});
/// Trailing transfer ids and dates the bank appends after the payer.
static TRAILER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\s+(?:\d{8,}|[A-Z]{2,3}[-\d]+\d|(?:Jan|Feb|Mar|Apr|May|Jun|Jul|Aug|Sep|Oct|Nov|Dec)\s+\d{2}).*$")
        .expect("valid regex")
});

pub fn parse(row: &RawRow, index: RowIndex, expected_month: u32) -> Result<RowOutcome, ParseError> {
    parse_with_layout(SourceType::SgMbb, &LAYOUT, row, index, expected_month, |r| {
        r.get("Description").map(split_narration)
    })
}

pub fn split_narration(text: &str) -> Narration {
    let text = CHANNEL.replace(text.trim(), "");
    let (name, extra) = match TRAILER.find(&text) {
        Some(m) => (&text[..m.start()], Some(tidy(&text[m.start()..]))),
        None => (&text[..], None),
    };
    Narration {
        counterparty: tidy(&name.replace("PTE.", "PTE").replace("LTD.", "LTD")),
        description: extra,
    }
}
