//! bankpost-ingest: bank export reading and per-bank row parsers.

pub mod batch;
pub mod export;
pub mod parsers;
pub mod types;

pub use batch::{ParsePolicy, ParsedBatch, parse_export};
pub use export::{Export, NAME_COLUMN, read_export};
pub use parsers::{Layout, parse_row};
pub use types::{RawRow, RowOutcome, SkipReason};
