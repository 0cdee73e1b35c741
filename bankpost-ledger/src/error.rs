use bankpost_core::{ConfigurationError, ParseError, RowIndex, SourceType};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("customer table {}: {message}", path.display())]
    Reference { path: PathBuf, message: String },

    #[error("customer table {}: {source}", path.display())]
    ReferenceCsv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("progress file {}: {source}", path.display())]
    ProgressIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("progress file {} is not valid JSON: {source}", path.display())]
    ProgressCorrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("row {row} belongs to {found}, not {expected}")]
    SourceMismatch {
        row: RowIndex,
        expected: SourceType,
        found: SourceType,
    },

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
}
