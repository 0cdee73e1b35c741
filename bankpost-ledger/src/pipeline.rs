//! Per-source run: read export, parse, resolve names, submit, publish.

use anyhow::{Context, Result};
use bankpost_core::{ExpectedMonth, ParseError, RowIndex, SourceType, Transaction};
use bankpost_ingest::{ParsePolicy, parse_export, read_export};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::customers::{NameResolver, ReferenceTable, ResolveStats};
use crate::engine::{SubmissionEngine, SubmissionReport};
use crate::payments::PaymentClient;
use crate::progress::ProgressStore;

/// Upload and cleanup collaborator for processed files.
pub trait ArtifactSink {
    /// Hand finished artifacts downstream.
    fn publish(&mut self, artifacts: &[PathBuf]) -> Result<()>;

    /// Remove inputs that are fully processed.
    fn cleanup(&mut self, files: &[PathBuf]) -> Result<()>;
}

/// Directory the download step drops filtered exports into.
#[derive(Debug, Clone)]
pub struct Inbox {
    dir: PathBuf,
}

impl Inbox {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, source: SourceType) -> PathBuf {
        self.dir.join(source.file_name())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PipelineOptions {
    /// Process an export even when no row is pending.
    pub force: bool,
    pub policy: ParsePolicy,
    pub start_row: Option<RowIndex>,
}

#[derive(Debug, Clone)]
pub struct SourceSummary {
    pub parsed: usize,
    pub rejected_rows: usize,
    pub review_dates: usize,
    pub names: ResolveStats,
    pub report: SubmissionReport,
    pub artifact: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub enum SourceOutcome {
    /// No export in the inbox.
    Missing,
    /// Export present but nothing above the cursor is waiting.
    NoNewRows,
    Completed(SourceSummary),
    /// Submission stopped at a failing row.
    Halted(SourceSummary),
    /// A row failed to parse under `ParsePolicy::Halt`; nothing was submitted.
    Rejected(ParseError),
}

impl SourceOutcome {
    pub fn was_processed(&self) -> bool {
        !matches!(self, Self::Missing | Self::NoNewRows)
    }

    pub fn is_halted(&self) -> bool {
        matches!(self, Self::Halted(_) | Self::Rejected(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// No source had anything to submit.
    NothingToDo,
    /// Every source was processed.
    Processed,
    /// Some sources processed, others empty or missing.
    Partial,
}

#[derive(Debug, Clone)]
pub struct RunReport {
    pub outcome: RunOutcome,
    pub sources: BTreeMap<SourceType, SourceOutcome>,
}

impl RunReport {
    fn from_sources(sources: BTreeMap<SourceType, SourceOutcome>) -> Self {
        let processed = sources.values().filter(|o| o.was_processed()).count();
        let outcome = match processed {
            0 => RunOutcome::NothingToDo,
            n if n == sources.len() => RunOutcome::Processed,
            _ => RunOutcome::Partial,
        };
        Self { outcome, sources }
    }

    pub fn has_halts(&self) -> bool {
        self.sources.values().any(SourceOutcome::is_halted)
    }
}

pub struct Pipeline<S, C, A> {
    inbox: Inbox,
    customer_db_dir: PathBuf,
    output_dir: PathBuf,
    month: ExpectedMonth,
    resolver: NameResolver,
    engine: SubmissionEngine<S, C>,
    sink: A,
}

impl<S: ProgressStore, C: PaymentClient, A: ArtifactSink> Pipeline<S, C, A> {
    pub fn new(
        inbox: Inbox,
        customer_db_dir: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
        month: ExpectedMonth,
        resolver: NameResolver,
        engine: SubmissionEngine<S, C>,
        sink: A,
    ) -> Self {
        Self {
            inbox,
            customer_db_dir: customer_db_dir.into(),
            output_dir: output_dir.into(),
            month,
            resolver,
            engine,
            sink,
        }
    }

    pub fn engine(&self) -> &SubmissionEngine<S, C> {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut SubmissionEngine<S, C> {
        &mut self.engine
    }

    pub fn sink(&self) -> &A {
        &self.sink
    }

    /// Process each source in turn. Sources are independent: a halt in one
    /// does not stop the next.
    pub fn run(&mut self, sources: &[SourceType], options: PipelineOptions) -> Result<RunReport> {
        let mut outcomes = BTreeMap::new();
        for &source in sources {
            let outcome = self
                .run_source(source, options)
                .with_context(|| format!("processing {}", source.label()))?;
            outcomes.insert(source, outcome);
        }

        let report = RunReport::from_sources(outcomes);
        tracing::info!(outcome = ?report.outcome, halted = report.has_halts(), "run finished");
        Ok(report)
    }

    pub fn run_source(&mut self, source: SourceType, options: PipelineOptions) -> Result<SourceOutcome> {
        let input = self.inbox.path_for(source);
        if !input.exists() {
            tracing::info!(source = %source, path = %input.display(), "no export, skipping");
            return Ok(SourceOutcome::Missing);
        }

        let export = read_export(&input)?;
        let cursor = self.engine.show_progress(source)?.last_submitted_row_index;
        let parse_from = cursor.max(options.start_row.map_or(0, |r| r.saturating_sub(1)));

        if export.pending_rows(parse_from).next().is_none() {
            if !options.force {
                tracing::info!(source = %source, cursor, "no new rows");
                return Ok(SourceOutcome::NoNewRows);
            }
            tracing::info!(source = %source, cursor, "no new rows, processing anyway");
        }

        let mut batch = match parse_export(source, &export, parse_from, self.month, options.policy) {
            Ok(batch) => batch,
            Err(err) => {
                tracing::error!(source = %source, error = %err, "export rejected; fix the row and rerun");
                return Ok(SourceOutcome::Rejected(err));
            }
        };

        if batch.transactions.is_empty() && batch.rejected.is_empty() {
            tracing::info!(source = %source, skipped = batch.skipped.len(), "export holds no transactions");
            return Ok(SourceOutcome::NoNewRows);
        }

        let table = ReferenceTable::load_for(&self.customer_db_dir, source)?;
        let names = self.resolver.resolve_batch(&mut batch.transactions, &table);
        tracing::info!(
            source = %source,
            resolved = names.resolved,
            unresolved = names.unresolved,
            near_misses = names.near_misses,
            "names resolved"
        );

        let report = self.engine.submit_all(&batch.transactions, source, options.start_row)?;

        let artifact = if report.submitted.is_empty() {
            None
        } else {
            let path = self.output_dir.join(format!("{}_processed.csv", source.tag()));
            write_processed(&path, &batch.transactions, &report)?;
            self.sink.publish(std::slice::from_ref(&path))?;
            Some(path)
        };

        let summary = SourceSummary {
            parsed: batch.transactions.len(),
            rejected_rows: batch.rejected.len(),
            review_dates: batch.review_count(),
            names,
            report,
            artifact,
        };

        if summary.report.is_complete() {
            self.sink.cleanup(&[input])?;
            Ok(SourceOutcome::Completed(summary))
        } else {
            Ok(SourceOutcome::Halted(summary))
        }
    }
}

/// One CSV line per submitted row, in submission order.
pub fn write_processed(path: &Path, transactions: &[Transaction], report: &SubmissionReport) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
    }
    let by_row: BTreeMap<RowIndex, &Transaction> =
        transactions.iter().map(|t| (t.source_row_index, t)).collect();

    let mut wtr = csv::Writer::from_path(path).with_context(|| format!("creating {}", path.display()))?;
    wtr.write_record([
        "source_row_index",
        "posted_date",
        "amount",
        "counterparty",
        "standardized_name",
        "bank_reference",
        "payment_id",
    ])?;
    for sub in &report.submitted {
        let Some(txn) = by_row.get(&sub.source_row_index) else {
            continue;
        };
        wtr.write_record([
            txn.source_row_index.to_string(),
            txn.posted_date.format("%Y-%m-%d").to_string(),
            txn.amount().to_string(),
            txn.raw_counterparty_text.clone(),
            txn.standardized_counterparty_name.clone().unwrap_or_default(),
            txn.bank_reference.clone().unwrap_or_default(),
            sub.payment_id.clone().unwrap_or_default(),
        ])?;
    }
    wtr.flush().with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}
