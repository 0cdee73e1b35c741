mod common;

use bankpost_core::{ParseError, SourceType};
use bankpost_ingest::ParsePolicy;
use bankpost_ledger::{
    Inbox, MemoryProgressStore, NameResolver, Pipeline, PipelineOptions, RunOutcome, SourceOutcome,
    SubmissionEngine,
};
use common::{RecordingSink, ScriptedClient};
use std::fs;
use std::path::Path;

const MBB_HEADER: &str =
    "Posting date,Transaction Description,Transaction Description,Transaction Ref,Debit,Credit,CUSTOMER_NAME\n";

const CUSTOMERS_MY: &str = "COMPANY NAME,SPECIAL NAME BANK IN\n\
    ABC Trading Sdn Bhd,ABC TRADING SDN BHD\n\
    Lim Hardware,LIM HARDWARE\n";

struct Workspace {
    _dir: tempfile::TempDir,
    inbox: std::path::PathBuf,
    customers: std::path::PathBuf,
    out: std::path::PathBuf,
}

impl Workspace {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let inbox = dir.path().join("inbox");
        let customers = dir.path().join("customers");
        let out = dir.path().join("out");
        fs::create_dir_all(&inbox).unwrap();
        fs::create_dir_all(&customers).unwrap();
        fs::write(customers.join("customers_my.csv"), CUSTOMERS_MY).unwrap();
        Self {
            _dir: dir,
            inbox,
            customers,
            out,
        }
    }

    fn drop_export(&self, source: SourceType, body: &str) {
        fs::write(self.inbox.join(source.file_name()), body).unwrap();
    }

    fn pipeline(
        &self,
        store: MemoryProgressStore,
        client: ScriptedClient,
    ) -> Pipeline<MemoryProgressStore, ScriptedClient, RecordingSink> {
        Pipeline::new(
            Inbox::new(&self.inbox),
            &self.customers,
            &self.out,
            "Aug'25".parse().unwrap(),
            NameResolver::default(),
            SubmissionEngine::new(store, client),
            RecordingSink::default(),
        )
    }
}

fn mbb_rows() -> String {
    format!(
        "{MBB_HEADER}\
         2025-15-08,IBG PAYMENT INTO A/C,ABC TRADING SDN BHD*INV 1021,R1,,1500.00,\n\
         2025-16-08,IBG PAYMENT INTO A/C,LIM HARDWARE,R2,,250.00,\n\
         2025-17-08,IBG PAYMENT INTO A/C,UNKNOWN PAYER,R3,,75.50,\n"
    )
}

fn read(path: &Path) -> String {
    fs::read_to_string(path).unwrap()
}

#[test]
fn test_nothing_to_do_when_inbox_is_empty() {
    let ws = Workspace::new();
    let mut p = ws.pipeline(MemoryProgressStore::new(), ScriptedClient::default());
    let report = p.run(&SourceType::ALL, PipelineOptions::default()).unwrap();
    assert_eq!(report.outcome, RunOutcome::NothingToDo);
    assert!(report.sources.values().all(|o| matches!(o, SourceOutcome::Missing)));
    assert!(!report.has_halts());
}

#[test]
fn test_end_to_end_mbb_export() {
    let ws = Workspace::new();
    ws.drop_export(SourceType::MyMbb, &mbb_rows());
    let mut p = ws.pipeline(MemoryProgressStore::new(), ScriptedClient::default());

    let report = p.run(&[SourceType::MyMbb], PipelineOptions::default()).unwrap();
    assert_eq!(report.outcome, RunOutcome::Processed);

    let SourceOutcome::Completed(summary) = &report.sources[&SourceType::MyMbb] else {
        panic!("expected completion, got {:?}", report.sources[&SourceType::MyMbb]);
    };
    assert_eq!(summary.parsed, 3);
    assert_eq!(summary.names.resolved, 2);
    assert_eq!(summary.names.unresolved, 1);
    assert_eq!(summary.report.submitted_rows(), vec![1, 2, 3]);

    assert_eq!(
        p.engine().client().counterparties,
        vec!["ABC Trading Sdn Bhd", "Lim Hardware", "UNKNOWN PAYER"]
    );
    assert_eq!(p.engine().show_progress(SourceType::MyMbb).unwrap().last_submitted_row_index, 3);

    let artifact = summary.artifact.clone().unwrap();
    assert!(artifact.ends_with("my_mbb_processed.csv"));
    let csv = read(&artifact);
    assert!(csv.starts_with("source_row_index,posted_date,amount"));
    assert!(csv.contains("1,2025-08-15,1500.00,ABC TRADING SDN BHD,ABC Trading Sdn Bhd,R1,PAY-1"));
    assert!(csv.contains("3,2025-08-17,75.50,UNKNOWN PAYER,,R3,PAY-3"));

    assert_eq!(p.sink().published, vec![artifact]);
    assert_eq!(p.sink().cleaned, vec![ws.inbox.join("MBB.csv")]);
}

#[test]
fn test_partial_when_some_sources_missing() {
    let ws = Workspace::new();
    ws.drop_export(SourceType::MyMbb, &mbb_rows());
    let mut p = ws.pipeline(MemoryProgressStore::new(), ScriptedClient::default());
    let report = p
        .run(&[SourceType::MyMbb, SourceType::MyPbb], PipelineOptions::default())
        .unwrap();
    assert_eq!(report.outcome, RunOutcome::Partial);
    assert!(matches!(report.sources[&SourceType::MyPbb], SourceOutcome::Missing));
}

#[test]
fn test_rows_at_or_below_cursor_mean_no_new_rows() {
    let ws = Workspace::new();
    ws.drop_export(SourceType::MyMbb, &mbb_rows());
    let store = MemoryProgressStore::new().with_cursor(SourceType::MyMbb, 3);
    let mut p = ws.pipeline(store, ScriptedClient::default());

    let report = p.run(&[SourceType::MyMbb], PipelineOptions::default()).unwrap();
    assert_eq!(report.outcome, RunOutcome::NothingToDo);
    assert!(matches!(report.sources[&SourceType::MyMbb], SourceOutcome::NoNewRows));
    assert!(p.engine().client().calls.is_empty());
}

#[test]
fn test_named_rows_are_not_pending_unless_forced() {
    let ws = Workspace::new();
    let body = format!("{MBB_HEADER}2025-15-08,IBG PAYMENT INTO A/C,ABC TRADING SDN BHD,R1,,10.00,ABC Trading Sdn Bhd\n");
    ws.drop_export(SourceType::MyMbb, &body);

    let mut p = ws.pipeline(MemoryProgressStore::new(), ScriptedClient::default());
    let report = p.run(&[SourceType::MyMbb], PipelineOptions::default()).unwrap();
    assert!(matches!(report.sources[&SourceType::MyMbb], SourceOutcome::NoNewRows));

    let forced = PipelineOptions {
        force: true,
        ..Default::default()
    };
    let report = p.run(&[SourceType::MyMbb], forced).unwrap();
    assert_eq!(report.outcome, RunOutcome::NothingToDo);
    assert!(matches!(report.sources[&SourceType::MyMbb], SourceOutcome::NoNewRows));
    assert!(p.engine().client().calls.is_empty());
    assert!(p.sink().cleaned.is_empty());
    assert!(ws.inbox.join("MBB.csv").exists());
}

#[test]
fn test_balance_lines_alone_are_nothing_to_do() {
    let ws = Workspace::new();
    let body = format!(
        "{MBB_HEADER}\
         ,OPENING BALANCE,,,,,\n\
         ,CLOSING BALANCE,,,,,\n"
    );
    ws.drop_export(SourceType::MyMbb, &body);

    let mut p = ws.pipeline(MemoryProgressStore::new(), ScriptedClient::default());
    let report = p.run(&[SourceType::MyMbb], PipelineOptions::default()).unwrap();
    assert_eq!(report.outcome, RunOutcome::NothingToDo);
    assert!(matches!(report.sources[&SourceType::MyMbb], SourceOutcome::NoNewRows));
    assert!(p.sink().cleaned.is_empty());
}

#[test]
fn test_submission_failure_halts_and_keeps_inbox_file() {
    let ws = Workspace::new();
    ws.drop_export(SourceType::MyMbb, &mbb_rows());
    let mut p = ws.pipeline(MemoryProgressStore::new(), ScriptedClient::failing_at(2, false));

    let report = p.run(&[SourceType::MyMbb], PipelineOptions::default()).unwrap();
    assert!(report.has_halts());
    let SourceOutcome::Halted(summary) = &report.sources[&SourceType::MyMbb] else {
        panic!("expected a halt");
    };
    assert_eq!(summary.report.submitted_rows(), vec![1]);
    assert_eq!(summary.report.failure.as_ref().unwrap().source_row_index, 2);
    assert!(p.sink().cleaned.is_empty());
    assert_eq!(p.sink().published.len(), 1);
}

#[test]
fn test_bad_row_rejects_source_by_default() {
    let ws = Workspace::new();
    let body = format!(
        "{MBB_HEADER}\
         2025-15-08,IBG PAYMENT INTO A/C,ABC TRADING SDN BHD,R1,,10.00,\n\
         garbage,IBG PAYMENT INTO A/C,LIM HARDWARE,R2,,20.00,\n"
    );
    ws.drop_export(SourceType::MyMbb, &body);

    let mut p = ws.pipeline(MemoryProgressStore::new(), ScriptedClient::default());
    let report = p.run(&[SourceType::MyMbb], PipelineOptions::default()).unwrap();
    let SourceOutcome::Rejected(err) = &report.sources[&SourceType::MyMbb] else {
        panic!("expected a parse rejection");
    };
    assert_eq!(err.row(), Some(2));
    assert!(matches!(err, ParseError::Date { .. }));
    assert!(p.engine().client().calls.is_empty());

    let skip = PipelineOptions {
        policy: ParsePolicy::SkipInvalid,
        ..Default::default()
    };
    let report = p.run(&[SourceType::MyMbb], skip).unwrap();
    let SourceOutcome::Completed(summary) = &report.sources[&SourceType::MyMbb] else {
        panic!("skip policy should complete");
    };
    assert_eq!(summary.rejected_rows, 1);
    assert_eq!(p.engine().client().calls, vec![1]);
}

#[test]
fn test_start_row_skips_earlier_rows() {
    let ws = Workspace::new();
    ws.drop_export(SourceType::MyMbb, &mbb_rows());
    let mut p = ws.pipeline(MemoryProgressStore::new(), ScriptedClient::default());
    let opts = PipelineOptions {
        start_row: Some(3),
        ..Default::default()
    };
    p.run(&[SourceType::MyMbb], opts).unwrap();
    assert_eq!(p.engine().client().calls, vec![3]);
}
