//! Error taxonomy shared by every pipeline stage.

use thiserror::Error;

use crate::transaction::RowIndex;

/// A date string with no self-consistent calendar interpretation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DateFormatError {
    #[error("empty date value")]
    Empty,

    #[error("unrecognised date '{0}'")]
    Unrecognised(String),
}

/// A row that carries a transaction but cannot be turned into one.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("row {row}: missing required field '{field}'")]
    MissingField { row: RowIndex, field: &'static str },

    #[error("row {row}: malformed {field} value '{value}'")]
    Malformed {
        row: RowIndex,
        field: &'static str,
        value: String,
    },

    #[error("row {row}: bad date '{value}': {source}")]
    Date {
        row: RowIndex,
        value: String,
        #[source]
        source: DateFormatError,
    },

    #[error("export is missing required column '{0}'")]
    MissingColumn(&'static str),

    #[error("row {0} appears more than once in the batch")]
    DuplicateRow(RowIndex),
}

impl ParseError {
    /// Row index the error refers to, when it is row-scoped.
    pub fn row(&self) -> Option<RowIndex> {
        match self {
            Self::MissingField { row, .. }
            | Self::Malformed { row, .. }
            | Self::Date { row, .. }
            | Self::DuplicateRow(row) => Some(*row),
            Self::MissingColumn(_) => None,
        }
    }
}

/// Missing or malformed configuration, raised before any row is touched.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigurationError {
    #[error("invalid expected month '{0}' (expected MMM'YY, e.g. Aug'25)")]
    ExpectedMonth(String),

    #[error("similarity threshold {0} must be within (0, 1]")]
    Threshold(f64),

    #[error("unknown source type '{0}'")]
    UnknownSource(String),

    #[error("{0}")]
    Invalid(String),
}
