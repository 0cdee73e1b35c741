//! Public Bank Malaysia export parser.
//!
//! Expected header:
//!   Transaction Date,Transaction Description,Debit Amount,Credit Amount,Reference,CUSTOMER_NAME
//!   08/15/2025,DUITNOW TRSF CR - NO: 558812 ABC TRADING SDN BHD INV 1021,,1500.00,,
//!
//! The payer sits inside one long narration after a channel prefix; whatever
//! follows the first memo marker is kept as the description.

use bankpost_core::{ParseError, RowIndex, SourceType};
use regex::Regex;
use std::sync::LazyLock;

use super::{Layout, Narration, parse_with_layout, tidy};
use crate::types::{RawRow, RowOutcome};

pub const LAYOUT: Layout = Layout {
    date: "Transaction Date",
    narration: &["Transaction Description"],
    credit: "Credit Amount",
    debit: Some("Debit Amount"),
    reference: Some("Reference"),
};

/// Channel prefixes, each followed by the transfer number (and for ATM/EFT a
/// masked account) before the payer name.
static CHANNEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"(?i)^(?:DUITNOW TRSF CR|TSFR FUND CR-ATM/EFT|DEP-ECP|IBG CR)\s*-\s*NO:\s*",
        r"\d+\s+(?:X{3,}\d+\s+)?"
    ))
    .expect("valid regex")
});

/// Words that start the sender's memo rather than the payer's name. A marker
/// must end where the word ends (digits may follow, as in `INV1021`).
const MEMO_MARKERS: &[&str] = &[
    "Fund transfer",
    "INV",
    "INVOICE",
    "BINVOICE",
    "Statement",
    "Payment for",
    "TOP UP",
    "Sent",
    "Bill",
    "PO",
    "Doc",
];

/// Memo markers that may run on into a longer word (`payment`, `invoices`).
const MEMO_PREFIXES: &[&str] = &["PV-", "paym", "invoice"];

static LONG_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+\d{4,}").expect("valid regex"));

pub fn parse(row: &RawRow, index: RowIndex, expected_month: u32) -> Result<RowOutcome, ParseError> {
    parse_with_layout(SourceType::MyPbb, &LAYOUT, row, index, expected_month, |r| {
        r.get("Transaction Description").map(split_narration)
    })
}

/// Split a PBB narration into payer and memo.
pub fn split_narration(text: &str) -> Narration {
    let Some(prefix) = CHANNEL.find(text) else {
        return Narration {
            counterparty: tidy(text),
            description: None,
        };
    };
    let rest = &text[prefix.end()..];

    let mut cut = rest.len();
    let markers = MEMO_MARKERS.iter().map(|m| (m, false));
    let prefixes = MEMO_PREFIXES.iter().map(|m| (m, true));
    for (marker, open_ended) in markers.chain(prefixes) {
        if let Some(pos) = find_word(rest, marker, open_ended) {
            cut = cut.min(pos);
        }
    }
    if let Some(m) = LONG_NUMBER.find(rest) {
        if m.start() > 0 && m.start() < cut {
            cut = m.start();
        }
    }

    let (name, memo) = rest.split_at(cut);
    let memo = tidy(memo);
    Narration {
        counterparty: tidy(name),
        description: (!memo.is_empty()).then_some(memo),
    }
}

/// First occurrence of `needle` starting a word other than the first one.
/// Unless `open_ended`, the next character must not be a letter.
fn find_word(haystack: &str, needle: &str, open_ended: bool) -> Option<usize> {
    haystack
        .match_indices(needle)
        .map(|(pos, _)| pos)
        .find(|&pos| {
            let starts_word = pos > 0 && haystack[..pos].ends_with(char::is_whitespace);
            let ends_word = open_ended
                || needle.ends_with('-')
                || !haystack[pos + needle.len()..].starts_with(char::is_alphabetic);
            starts_word && ends_word
        })
}
