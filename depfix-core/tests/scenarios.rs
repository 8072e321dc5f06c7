//! End-to-end runs over an in-memory repository.

mod common;

use camino::{Utf8Path, Utf8PathBuf};
use common::*;
use depfix_core::adapters::InMemoryWritePort;
use depfix_core::{RunOptions, WorkflowState};
use depfix_types::error::ErrorKind;
use depfix_types::stage::StageId;
use pretty_assertions::assert_eq;
use tokio_util::sync::CancellationToken;

const PIPELINE: &str = "import pandas as pd\n\
\n\
\n\
def load(path):\n\
    return pd.read_csv(path)\n\
\n\
\n\
def clean(df):\n\
    df = df.dropna(how='all')\n\
    df = df.fillna(method='ffill')\n\
    return df\n\
print(clean(load('data.csv')))\n";

fn deprecated_fillna() -> ScriptedReasoner {
    ScriptedReasoner::new()
        .analysis(
            "pipeline.py",
            Reply::Text(array(&[issue_json(
                10,
                "deprecated",
                "fillna(method=) is deprecated",
            )])),
        )
        .fixes(
            "pipeline.py",
            Reply::Text(array(&[replace_json(
                0,
                "df.fillna(method='ffill')",
                "df.ffill()",
            )])),
        )
}

#[tokio::test]
async fn single_replace_fix_is_applied_and_tested() {
    let h = harness(repo().with_file("pipeline.py", PIPELINE), deprecated_fillna());

    let outcome = h.workflow.run(CancellationToken::new()).await;

    assert_eq!(outcome.reached, WorkflowState::Done);
    assert!(outcome.result.success, "errors: {:?}", outcome.result.errors);
    assert_eq!(outcome.state.issues_found.len(), 1);
    assert_eq!(outcome.state.issues_found[0].line_number, Some(10));
    assert_eq!(outcome.state.applied_changes.len(), 1);
    assert!(outcome.state.applied_changes[0].starts_with("Applied replace"));
    assert_eq!(outcome.result.changes_made, outcome.state.applied_changes);

    let written = h
        .writer
        .written_text(Utf8Path::new("/repo/pipeline_fixed.py"))
        .expect("derived file written");
    assert_eq!(written, PIPELINE.replace("df.fillna(method='ffill')", "df.ffill()"));
    assert_eq!(outcome.state.file_contents[Utf8Path::new("pipeline.py")], PIPELINE);

    let test = &outcome.state.test_results[Utf8Path::new("pipeline.py")];
    assert!(test.passed);
    assert_eq!(test.target, "pipeline_fixed.py");
    assert_eq!(h.runner.ran(), vec![Utf8PathBuf::from("pipeline_fixed.py")]);

    let fixed = &outcome.state.fixed_files[Utf8Path::new("pipeline.py")];
    assert!(fixed.written);
    assert_eq!(fixed.fixes_applied, 1);
    assert!(fixed.diff.contains("+    df = df.ffill()"));
    assert_eq!(outcome.result.summary, "Issues found: 1, Changes applied: 1, Errors: 0");
}

#[tokio::test]
async fn missing_anchor_fails_that_fix_only() {
    let reasoner = ScriptedReasoner::new()
        .analysis("a.py", Reply::Text(array(&[issue_json(1, "security", "insecure")])))
        .fixes(
            "a.py",
            Reply::Text(array(&[replace_json(0, "verify=False", "verify=True")])),
        )
        .analysis("b.py", Reply::Text(array(&[issue_json(1, "security", "insecure")])))
        .fixes(
            "b.py",
            Reply::Text(array(&[replace_json(0, "verify=False", "verify=True")])),
        );
    let h = harness(
        repo()
            .with_file("a.py", "r = get(url)\n")
            .with_file("b.py", "r = get(url, verify=False)\n"),
        reasoner,
    );

    let outcome = h.workflow.run(CancellationToken::new()).await;

    assert_eq!(outcome.reached, WorkflowState::Done);
    assert!(!outcome.result.success);
    assert!(outcome.result.is_partial());
    assert_eq!(outcome.state.errors.len(), 1);
    let err = &outcome.state.errors[0];
    assert_eq!(err.kind, ErrorKind::AnchorNotFound);
    assert_eq!(err.stage, StageId::ApplyFixes);
    assert_eq!(err.file_path.as_deref(), Some(Utf8Path::new("a.py")));

    assert_eq!(outcome.state.applied_changes.len(), 1);
    assert!(outcome.state.applied_changes[0].contains("in b.py"));
    assert!(!outcome.state.fixed_files.contains_key(Utf8Path::new("a.py")));
    assert_eq!(
        h.writer.written_text(Utf8Path::new("/repo/b_fixed.py")).as_deref(),
        Some("r = get(url, verify=True)\n")
    );
}

#[tokio::test]
async fn overlapping_fixes_keep_the_earlier_offset() {
    let issues = array(&[
        issue_json(1, "deprecated", "old call"),
        issue_json(1, "runtime_risk", "bad argument"),
    ]);
    // Listed in reverse offset order on purpose.
    let fixes = array(&[
        replace_json(1, "compute(1)", "compute(2)"),
        replace_json(0, "x = compute(1)", "x = compute_v2(1)"),
    ]);
    let reasoner = ScriptedReasoner::new()
        .analysis("calc.py", Reply::Text(issues))
        .fixes("calc.py", Reply::Text(fixes));
    let h = harness(repo().with_file("calc.py", "x = compute(1)\n"), reasoner);

    let outcome = h.workflow.run(CancellationToken::new()).await;

    assert_eq!(outcome.state.suggested_fixes.len(), 2);
    assert_eq!(outcome.state.applied_changes.len(), 1);
    assert!(outcome.state.applied_changes[0].contains("`x = compute(1)`"));
    assert_eq!(outcome.state.errors.len(), 1);
    assert_eq!(outcome.state.errors[0].kind, ErrorKind::ConflictingEdits);
    assert!(outcome.state.errors[0].message.contains("`compute(1)`"));
    assert_eq!(
        h.writer.written_text(Utf8Path::new("/repo/calc_fixed.py")).as_deref(),
        Some("x = compute_v2(1)\n")
    );
}

#[tokio::test]
async fn dry_run_records_fixes_but_writes_nothing() {
    let h = harness_with(
        settings(RunOptions {
            dry_run: true,
            ..RunOptions::default()
        }),
        repo().with_file("pipeline.py", PIPELINE),
        deprecated_fillna(),
        InMemoryWritePort::new(),
        FakeRunner::default(),
    );

    let outcome = h.workflow.run(CancellationToken::new()).await;

    assert!(outcome.result.success);
    assert!(h.writer.written().is_empty());
    assert_eq!(outcome.state.suggested_fixes.len(), 1);
    assert_eq!(outcome.state.applied_changes.len(), 1);
    assert!(outcome.state.applied_changes[0].starts_with("[dry-run] would apply"));

    let fixed = &outcome.state.fixed_files[Utf8Path::new("pipeline.py")];
    assert!(!fixed.written);
    assert!(fixed.diff.contains("-    df = df.fillna(method='ffill')"));
    // Nothing was written, so the original is what gets executed.
    assert_eq!(h.runner.ran(), vec![Utf8PathBuf::from("pipeline.py")]);
}

#[tokio::test]
async fn tests_can_be_switched_off() {
    let h = harness_with(
        settings(RunOptions {
            run_tests: false,
            ..RunOptions::default()
        }),
        repo().with_file("pipeline.py", PIPELINE),
        deprecated_fillna(),
        InMemoryWritePort::new(),
        FakeRunner::default(),
    );

    let outcome = h.workflow.run(CancellationToken::new()).await;

    assert!(outcome.result.success);
    assert!(outcome.state.test_results.is_empty());
    assert!(h.runner.ran().is_empty());
    assert!(
        outcome
            .state
            .messages
            .contains(&"test: disabled by run options".to_string())
    );
}

#[tokio::test]
async fn clean_repository_succeeds_with_no_output() {
    let h = harness(
        repo().with_file("main.py", "print('hello')\n"),
        ScriptedReasoner::new(),
    );

    let outcome = h.workflow.run(CancellationToken::new()).await;

    assert!(outcome.result.success);
    assert!(outcome.state.issues_found.is_empty());
    assert!(outcome.state.suggested_fixes.is_empty());
    assert!(h.writer.written().is_empty());
    assert!(outcome.state.test_results[Utf8Path::new("main.py")].passed);
    assert_eq!(outcome.records.len(), 5);
    // Each stage brackets its work with start and finish notifications.
    assert_eq!(outcome.state.messages.first().map(String::as_str), Some("sync: started"));
    assert!(
        outcome
            .state
            .messages
            .last()
            .is_some_and(|m| m.starts_with("test: finished"))
    );
}

#[tokio::test]
async fn derived_outputs_are_not_reanalyzed() {
    let h = harness(
        repo()
            .with_file("pipeline.py", PIPELINE)
            .with_file("pipeline_fixed.py", "print('old output')\n"),
        deprecated_fillna(),
    );

    let outcome = h.workflow.run(CancellationToken::new()).await;

    let analyzed: Vec<_> = outcome.state.file_contents.keys().cloned().collect();
    assert_eq!(analyzed, vec![Utf8PathBuf::from("pipeline.py")]);
}
