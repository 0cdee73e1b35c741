//! Canonical transaction shape produced by every row parser.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ConfigurationError;

/// 1-based position of a data row inside its export file.
pub type RowIndex = u64;

/// Bank/region export format. Selects the parser variant and customer table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    MyMbb,
    MyPbb,
    SgMbb,
    SmarthomeMbb,
}

impl SourceType {
    pub const ALL: [SourceType; 4] = [
        SourceType::MyMbb,
        SourceType::MyPbb,
        SourceType::SgMbb,
        SourceType::SmarthomeMbb,
    ];

    /// Stable tag used in config, progress files and artifact names.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::MyMbb => "my_mbb",
            Self::MyPbb => "my_pbb",
            Self::SgMbb => "sg_mbb",
            Self::SmarthomeMbb => "smarthome_mbb",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::MyMbb => "Maybank Malaysia",
            Self::MyPbb => "Public Bank Malaysia",
            Self::SgMbb => "Maybank Singapore",
            Self::SmarthomeMbb => "Smarthome Maybank",
        }
    }

    /// Export file name the download step drops into the inbox.
    pub fn file_name(&self) -> &'static str {
        match self {
            Self::MyMbb => "MBB.csv",
            Self::MyPbb => "PBB.csv",
            Self::SgMbb => "MAYBANK SG.csv",
            Self::SmarthomeMbb => "Smarthome MBB.csv",
        }
    }

    /// Customer reference table group; several source types may share one.
    pub fn customer_group(&self) -> &'static str {
        match self {
            Self::MyMbb | Self::MyPbb => "my",
            Self::SgMbb => "sg",
            Self::SmarthomeMbb => "smarthome",
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for SourceType {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('-', "_");
        SourceType::ALL
            .into_iter()
            .find(|st| st.tag() == wanted)
            .ok_or_else(|| ConfigurationError::UnknownSource(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Credit,
    Debit,
}

/// One bank statement row in canonical form.
///
/// The signed `amount` is the only stored money value; [`Transaction::direction`]
/// is derived from it so the two can never disagree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub source_row_index: RowIndex,
    pub posted_date: NaiveDate,
    amount: Decimal,
    pub raw_counterparty_text: String,
    pub standardized_counterparty_name: Option<String>,
    pub bank_reference: Option<String>,
    /// Narration left over after the counterparty was split out.
    pub description: Option<String>,
    pub source_type: SourceType,
    /// Set when the date was picked by closest-month fallback.
    #[serde(default)]
    pub date_needs_review: bool,
}

impl Transaction {
    pub fn new(
        source_type: SourceType,
        source_row_index: RowIndex,
        posted_date: NaiveDate,
        amount: Decimal,
        raw_counterparty_text: impl Into<String>,
    ) -> Self {
        Self {
            source_row_index,
            posted_date,
            amount,
            raw_counterparty_text: raw_counterparty_text.into(),
            standardized_counterparty_name: None,
            bank_reference: None,
            description: None,
            source_type,
            date_needs_review: false,
        }
    }

    pub fn with_reference(mut self, reference: Option<String>) -> Self {
        self.bank_reference = reference.filter(|r| !r.trim().is_empty());
        self
    }

    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = description.filter(|d| !d.trim().is_empty());
        self
    }

    pub fn with_review_flag(mut self, needs_review: bool) -> Self {
        self.date_needs_review = needs_review;
        self
    }

    pub fn amount(&self) -> Decimal {
        self.amount
    }

    pub fn direction(&self) -> Direction {
        if self.amount.is_sign_negative() {
            Direction::Debit
        } else {
            Direction::Credit
        }
    }

    /// Name used when creating the payment: standardized if resolved, else raw.
    pub fn counterparty(&self) -> &str {
        self.standardized_counterparty_name
            .as_deref()
            .filter(|n| !n.is_empty())
            .unwrap_or(&self.raw_counterparty_text)
    }

    pub fn is_resolved(&self) -> bool {
        self.standardized_counterparty_name
            .as_deref()
            .is_some_and(|n| !n.is_empty())
    }
}
