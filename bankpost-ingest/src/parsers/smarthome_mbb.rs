//! Smarthome Maybank export parser.
//!
//! Same column layout as the Maybank Malaysia download, but the account has its
//! own customer table. Older downloads name the columns positionally
//! (`Transaction Description`, `Transaction Description.1`, `Transaction Ref`)
//! which the header de-duplication already yields.

use bankpost_core::{ParseError, RowIndex, SourceType};

use super::{Layout, my_mbb, parse_with_layout};
use crate::types::{RawRow, RowOutcome};

pub const LAYOUT: Layout = my_mbb::LAYOUT;

pub fn parse(row: &RawRow, index: RowIndex, expected_month: u32) -> Result<RowOutcome, ParseError> {
    parse_with_layout(
        SourceType::SmarthomeMbb,
        &LAYOUT,
        row,
        index,
        expected_month,
        my_mbb::narration,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tags_rows_with_own_source_type() {
        let r = RawRow::from_pairs(&[
            ("Posting date", "03/08/2025"),
            ("Transaction Description", "SMART LIVING ENTERPRISE"),
            ("Transaction Description.1", ""),
            ("Transaction Ref", "SH-0098"),
            ("Credit", "88.00"),
        ]);
        let RowOutcome::Parsed(txn) = parse(&r, 12, 8).unwrap() else {
            panic!("expected a transaction");
        };
        assert_eq!(txn.source_type, SourceType::SmarthomeMbb);
        assert_eq!(txn.raw_counterparty_text, "SMART LIVING ENTERPRISE");
        assert_eq!(txn.bank_reference.as_deref(), Some("SH-0098"));
        assert_eq!(txn.posted_date.to_string(), "2025-08-03");
    }
}
