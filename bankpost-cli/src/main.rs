use anyhow::{Context, Result, bail};
use bankpost_core::{ExpectedMonth, RowIndex, SourceType};
use bankpost_ingest::ParsePolicy;
use bankpost_ledger::{
    Inbox, JsonProgressStore, MemoryProgressStore, PaymentClient, Pipeline, PipelineOptions, ProgressStore,
    RunOutcome, RunReport, SourceOutcome, SubmissionEngine,
};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

mod artifacts;
mod config;
mod http_client;
mod logging;
mod state;

use artifacts::LocalOutbox;
use config::{Config, Settings};
use http_client::{DryRunClient, HttpPaymentClient};

#[derive(Parser, Debug)]
#[command(
    name = "bankpost",
    version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("BANKPOST_BUILD_SHA"), ")"),
    about = "Bank statement ingestion and resumable payment posting"
)]
struct Cli {
    /// Debug-level logging
    #[arg(long, global = true)]
    debug: bool,

    /// Trace-level logging
    #[arg(long, global = true)]
    verbose: bool,

    /// Config file (default: ~/.bankpost/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Process every configured source
    Run {
        #[command(flatten)]
        run: RunFlags,
    },

    /// Process one source, or inspect and move its cursor
    Submit {
        /// Source tag, e.g. my_mbb
        source: SourceType,

        /// First row to submit (1-based)
        #[arg(long)]
        start_row: Option<RowIndex>,

        /// Zero the cursor; with --start-row N, set it to N-1 and continue
        #[arg(long)]
        reset_progress: bool,

        /// Print the cursor and exit
        #[arg(long, conflicts_with_all = ["reset_progress", "start_row"])]
        show_progress: bool,

        #[command(flatten)]
        run: RunFlags,
    },

    /// Show or set the processing month
    Month {
        /// New month, e.g. Sep'25
        #[arg(long)]
        set: Option<ExpectedMonth>,
    },

    /// List known source types
    Sources,
}

#[derive(Args, Debug, Clone, Copy)]
struct RunFlags {
    /// Process exports even when no row is pending
    #[arg(long)]
    force: bool,

    /// Log payments instead of sending them
    #[arg(long)]
    dry_run: bool,

    /// Drop rows that fail to parse instead of stopping the source
    #[arg(long)]
    skip_invalid: bool,
}

impl RunFlags {
    fn options(self, start_row: Option<RowIndex>) -> PipelineOptions {
        PipelineOptions {
            force: self.force,
            policy: if self.skip_invalid {
                ParsePolicy::SkipInvalid
            } else {
                ParsePolicy::Halt
            },
            start_row,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(e) = logging::init_logging(cli.debug, cli.verbose) {
        eprintln!("{e:#}");
    }

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{e:#}");
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let home = state::bankpost_home()?;
    let config_path = match cli.config {
        Some(p) => p,
        None => config::default_config_path()?,
    };
    let cfg = config::load_config(&config_path)?;

    match cli.command {
        Command::Sources => {
            println!("{:<15} {:<18} {}", "SOURCE", "FILE", "CUSTOMERS");
            for s in SourceType::ALL {
                println!("{:<15} {:<18} customers_{}.csv", s.tag(), s.file_name(), s.customer_group());
            }
            Ok(ExitCode::SUCCESS)
        }

        Command::Month { set } => {
            let Some(month) = set else {
                let current: ExpectedMonth = cfg.pipeline.expected_month.parse()?;
                println!("{current}");
                return Ok(ExitCode::SUCCESS);
            };
            let mut cfg = cfg;
            cfg.pipeline.expected_month = month.to_string();
            config::save_config(&config_path, &cfg)?;
            println!("Expected month set to {month} in {}", config_path.display());
            Ok(ExitCode::SUCCESS)
        }

        Command::Run { run } => {
            let settings = cfg.validate(&home)?;
            let sources = settings.sources.clone();
            let client = payment_client(&cfg, &settings, &sources, run.dry_run)?;
            let session = Session::open(&settings, &sources, run.dry_run)?;
            let report = run_pipeline(&settings, &sources, run.options(None), session, client)?;
            Ok(print_report(&report))
        }

        Command::Submit {
            source,
            start_row,
            reset_progress,
            show_progress,
            run,
        } => {
            let settings = cfg.validate(&home)?;
            if start_row == Some(0) {
                bail!("--start-row is 1-based");
            }

            if show_progress {
                let engine = SubmissionEngine::new(JsonProgressStore::in_dir(&settings.state_dir), DryRunClient);
                let rec = engine.show_progress(source)?;
                let updated = rec
                    .updated_at
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_else(|| "never".to_string());
                println!("{source}: last submitted row {} (updated {updated})", rec.last_submitted_row_index);
                return Ok(ExitCode::SUCCESS);
            }

            let mut session = Session::open(&settings, &[source], run.dry_run)?;
            if reset_progress && start_row.is_none() {
                let (from, to) = session.reset_cursor(source, None)?;
                println!("{source}: cursor moved from {from} to {to}{}", session.scope_note());
                return Ok(ExitCode::SUCCESS);
            }

            let client = payment_client(&cfg, &settings, &[source], run.dry_run)?;
            if reset_progress {
                let (from, to) = session.reset_cursor(source, start_row)?;
                println!("{source}: cursor moved from {from} to {to}{}", session.scope_note());
            }

            let report = run_pipeline(&settings, &[source], run.options(start_row), session, client)?;
            Ok(print_report(&report))
        }
    }
}

/// Cursor store and output location for one invocation.
struct Session {
    store: Box<dyn ProgressStore>,
    output_dir: PathBuf,
    dry_run: bool,
}

impl Session {
    /// Dry runs start from the real cursors but keep every change in memory.
    fn open(settings: &Settings, sources: &[SourceType], dry_run: bool) -> Result<Self> {
        let cursors = JsonProgressStore::in_dir(&state::ensure_dir(&settings.state_dir)?);
        if !dry_run {
            return Ok(Self {
                store: Box::new(cursors),
                output_dir: settings.output_dir.clone(),
                dry_run,
            });
        }

        let mut scratch = MemoryProgressStore::new();
        for &source in sources {
            scratch.save(source, &cursors.load(source)?)?;
        }
        Ok(Self {
            store: Box::new(scratch),
            output_dir: settings.output_dir.join("dry-run"),
            dry_run,
        })
    }

    /// `--reset-progress`: cursor 0, or N-1 with `--start-row N` so the run
    /// picks up at row N. Returns the old and new cursor.
    fn reset_cursor(&mut self, source: SourceType, start_row: Option<RowIndex>) -> Result<(RowIndex, RowIndex)> {
        let to_row = start_row.map_or(0, |n| n.saturating_sub(1));
        let mut engine = SubmissionEngine::new(&mut self.store, DryRunClient);
        let prev = engine.reset_progress(source, to_row)?;
        Ok((prev.last_submitted_row_index, to_row))
    }

    fn scope_note(&self) -> &'static str {
        if self.dry_run { " (dry run, not saved)" } else { "" }
    }
}

fn payment_client(
    cfg: &Config,
    settings: &Settings,
    sources: &[SourceType],
    dry_run: bool,
) -> Result<Box<dyn PaymentClient>> {
    if dry_run {
        return Ok(Box::new(DryRunClient));
    }
    Ok(Box::new(HttpPaymentClient::new(&cfg.ledger, &settings.journals, sources)?))
}

fn run_pipeline(
    settings: &Settings,
    sources: &[SourceType],
    options: PipelineOptions,
    session: Session,
    client: Box<dyn PaymentClient>,
) -> Result<RunReport> {
    let outbox = LocalOutbox::new(&session.output_dir).keep_inputs(session.dry_run);

    tracing::info!(
        month = %settings.month,
        threshold = settings.resolver.threshold(),
        sources = ?sources,
        dry_run = session.dry_run,
        "starting run"
    );

    let mut pipeline = Pipeline::new(
        Inbox::new(&settings.inbox_dir),
        &settings.customer_db_dir,
        session.output_dir,
        settings.month,
        settings.resolver,
        SubmissionEngine::new(session.store, client),
        outbox,
    );
    pipeline
        .run(sources, options)
        .with_context(|| format!("inbox {}", settings.inbox_dir.display()))
}

fn print_report(report: &RunReport) -> ExitCode {
    for (source, outcome) in &report.sources {
        match outcome {
            SourceOutcome::Missing => println!("{source}: no export"),
            SourceOutcome::NoNewRows => println!("{source}: no new rows"),
            SourceOutcome::Rejected(err) => println!("{source}: REJECTED {err}"),
            SourceOutcome::Completed(s) | SourceOutcome::Halted(s) => {
                println!(
                    "{source}: submitted {} (rows {}..), cursor {}, names resolved {}/{}, dates to review {}",
                    s.report.submitted.len(),
                    s.report.effective_start,
                    s.report.final_cursor,
                    s.names.resolved,
                    s.names.resolved + s.names.unresolved,
                    s.review_dates,
                );
                if let Some(f) = &s.report.failure {
                    let hint = if f.retryable { "rerun to retry" } else { "fix the row or move the cursor" };
                    println!("{source}: HALTED at row {}: {} ({hint})", f.source_row_index, f.message);
                }
                if s.rejected_rows > 0 {
                    println!("{source}: {} invalid rows dropped", s.rejected_rows);
                }
            }
        }
    }

    match report.outcome {
        RunOutcome::NothingToDo => println!("Nothing to do."),
        RunOutcome::Processed => println!("All sources processed."),
        RunOutcome::Partial => println!("Some sources processed; others had nothing new."),
    }

    if report.has_halts() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bankpost_ledger::ProgressRecord;
    use std::path::Path;

    fn settings(home: &Path) -> Settings {
        let mut cfg = Config::default();
        cfg.pipeline.expected_month = "Aug'25".to_string();
        cfg.validate(home).unwrap()
    }

    fn write_mbb(settings: &Settings, rows: usize) {
        let mut body =
            String::from("Posting date,Transaction Description,Transaction Description,Transaction Ref,Debit,Credit,CUSTOMER_NAME\n");
        for i in 1..=rows {
            body.push_str(&format!("2025-08-15,IBG PAYMENT INTO A/C,PAYER {i},R{i},,1.00,\n"));
        }
        std::fs::create_dir_all(&settings.inbox_dir).unwrap();
        std::fs::write(settings.inbox_dir.join(SourceType::MyMbb.file_name()), body).unwrap();
    }

    fn saved_cursor(settings: &Settings) -> RowIndex {
        JsonProgressStore::in_dir(&settings.state_dir)
            .load(SourceType::MyMbb)
            .unwrap()
            .last_submitted_row_index
    }

    #[test]
    fn test_reset_with_start_row_resubmits_from_that_row() {
        let home = tempfile::tempdir().unwrap();
        let settings = settings(home.path());
        write_mbb(&settings, 630);
        let mut session = Session::open(&settings, &[SourceType::MyMbb], false).unwrap();
        session.store.save(SourceType::MyMbb, &ProgressRecord::at(700)).unwrap();

        assert_eq!(session.reset_cursor(SourceType::MyMbb, Some(628)).unwrap(), (700, 627));
        assert_eq!(saved_cursor(&settings), 627);

        let options = PipelineOptions {
            start_row: Some(628),
            ..Default::default()
        };
        let report = run_pipeline(&settings, &[SourceType::MyMbb], options, session, Box::new(DryRunClient)).unwrap();
        let SourceOutcome::Completed(summary) = &report.sources[&SourceType::MyMbb] else {
            panic!("expected completion, got {:?}", report.sources[&SourceType::MyMbb]);
        };
        assert_eq!(summary.report.submitted_rows(), vec![628, 629, 630]);
        assert_eq!(saved_cursor(&settings), 630);
    }

    #[test]
    fn test_dry_run_reset_never_touches_saved_cursor() {
        let home = tempfile::tempdir().unwrap();
        let settings = settings(home.path());
        let mut real = Session::open(&settings, &[SourceType::MyMbb], false).unwrap();
        real.store.save(SourceType::MyMbb, &ProgressRecord::at(700)).unwrap();

        let mut dry = Session::open(&settings, &[SourceType::MyMbb], true).unwrap();
        assert_eq!(dry.reset_cursor(SourceType::MyMbb, Some(5)).unwrap(), (700, 4));
        assert_eq!(dry.store.load(SourceType::MyMbb).unwrap().last_submitted_row_index, 4);
        assert_eq!(saved_cursor(&settings), 700);
        assert_eq!(dry.output_dir, settings.output_dir.join("dry-run"));
    }

    #[test]
    fn test_reset_without_start_row_zeroes_cursor() {
        let home = tempfile::tempdir().unwrap();
        let settings = settings(home.path());
        let mut session = Session::open(&settings, &[SourceType::MyMbb], false).unwrap();
        session.store.save(SourceType::MyMbb, &ProgressRecord::at(12)).unwrap();
        assert_eq!(session.reset_cursor(SourceType::MyMbb, None).unwrap(), (12, 0));
        assert_eq!(saved_cursor(&settings), 0);
    }
}
