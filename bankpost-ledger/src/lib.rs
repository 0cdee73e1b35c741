//! bankpost-ledger: customer name resolution, resumable payment submission and
//! the per-source pipeline that ties ingest to the ledger API.

pub mod customers;
pub mod engine;
pub mod error;
pub mod payments;
pub mod pipeline;
pub mod progress;
pub mod similarity;

pub use customers::{CustomerEntry, DEFAULT_THRESHOLD, NameMatch, NameResolver, ReferenceTable, ResolveStats};
pub use engine::{EngineState, FailedRow, SubmissionEngine, SubmissionReport, Submitted};
pub use error::LedgerError;
pub use payments::{PaymentClient, PaymentReceipt, PaymentRequest, SubmissionFailure};
pub use pipeline::{
    ArtifactSink, Inbox, Pipeline, PipelineOptions, RunOutcome, RunReport, SourceOutcome, SourceSummary,
};
pub use progress::{JsonProgressStore, MemoryProgressStore, ProgressRecord, ProgressStore};
