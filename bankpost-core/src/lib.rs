//! bankpost-core: canonical transaction model, processing month, date
//! normalization and the error taxonomy shared by the pipeline.

pub mod dates;
pub mod error;
pub mod month;
pub mod transaction;

pub use dates::{Resolution, resolve};
pub use error::{ConfigurationError, DateFormatError, ParseError};
pub use month::ExpectedMonth;
pub use transaction::{Direction, RowIndex, SourceType, Transaction};
