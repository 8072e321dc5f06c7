use depfix_render::{render_changelog_md, render_summary_text};
use depfix_types::error::{ErrorEntry, ErrorKind};
use depfix_types::issue::{Issue, IssueCategory, Severity};
use depfix_types::result::PipelineResult;
use depfix_types::stage::{StageId, StageRecord};
use depfix_types::state::{FixedFile, SharedState, TestOutcome};
use pretty_assertions::assert_eq;

fn finished_state() -> SharedState {
    let mut state = SharedState::new("/repo");
    state
        .file_contents
        .insert("pipeline.py".into(), "df = df.fillna(method='ffill')\n".to_string());
    state.issues_found.push(Issue {
        file_path: "pipeline.py".into(),
        line_number: Some(1),
        category: IssueCategory::Deprecated,
        severity: Severity::Medium,
        description: "fillna(method=) is deprecated".to_string(),
    });
    state
        .applied_changes
        .push("Applied replace `df.fillna(method='ffill')` in pipeline.py".to_string());
    state.fixed_files.insert(
        "pipeline.py".into(),
        FixedFile {
            derived_path: "pipeline_fixed.py".into(),
            sha256_before: "a".repeat(64),
            sha256_after: "b".repeat(64),
            diff: "-df = df.fillna(method='ffill')\n+df = df.ffill()\n".to_string(),
            fixes_applied: 1,
            written: true,
        },
    );
    state.test_results.insert(
        "pipeline.py".into(),
        TestOutcome::pass("pipeline_fixed.py", Some(0)),
    );
    state
}

fn result_for(state: &SharedState) -> PipelineResult {
    PipelineResult {
        success: state.errors.is_empty(),
        summary: format!(
            "Issues found: {}, Changes applied: {}, Errors: {}",
            state.issues_found.len(),
            state.applied_changes.len(),
            state.errors.len()
        ),
        changes_made: state.applied_changes.clone(),
        errors: state.errors.iter().map(ToString::to_string).collect(),
        issues_found: state.issues_found.iter().map(|i| i.label()).collect(),
    }
}

#[test]
fn changelog_lists_issues_changes_and_diffs() {
    let state = finished_state();
    let result = result_for(&state);
    let records = vec![StageRecord {
        stage: StageId::ApplyFixes,
        duration_ms: 12,
        messages_added: 2,
        errors_added: 0,
        interrupted: false,
    }];

    let md = render_changelog_md(&state, &result, &records);

    assert!(md.starts_with("# depfix change log\n"));
    assert!(md.contains("- Status: `success`"));
    assert!(md.contains("- Tests: 1 passed, 0 failed"));
    assert!(md.contains("- `pipeline.py:1` **deprecated** (medium): fillna(method=) is deprecated"));
    assert!(md.contains("### `pipeline.py` → `pipeline_fixed.py`\n"));
    assert!(md.contains("- sha256: aaaaaaaaaaaa → bbbbbbbbbbbb"));
    assert!(md.contains("```diff\n-df = df.fillna(method='ffill')\n+df = df.ffill()\n```"));
    assert!(md.contains("| `pipeline.py` | `pipeline_fixed.py` | pass |"));
    assert!(md.contains("## Errors\n\n_None._"));
    assert!(md.contains("| apply_fixes | 12 | 0 |  |"));
}

#[test]
fn empty_run_uses_placeholders() {
    let state = SharedState::new("/repo");
    let result = result_for(&state);

    let md = render_changelog_md(&state, &result, &[]);

    assert!(md.contains("_No issues found._"));
    assert!(md.contains("_No changes applied._"));
    assert!(!md.contains("## Derived files"));
    assert!(!md.contains("## Tests"));
    assert!(!md.contains("## Stages"));
}

#[test]
fn dry_run_files_are_marked_not_written() {
    let mut state = finished_state();
    if let Some(fixed) = state.fixed_files.values_mut().next() {
        fixed.written = false;
    }
    let md = render_changelog_md(&state, &result_for(&state), &[]);
    assert!(md.contains("`pipeline_fixed.py` (not written)"));
}

#[test]
fn summary_text_reports_partial_runs() {
    let mut state = finished_state();
    state.errors.push(ErrorEntry::for_file(
        StageId::ApplyFixes,
        ErrorKind::AnchorNotFound,
        "other.py",
        "anchor `verify=False` not found",
    ));
    let result = result_for(&state);

    let text = render_summary_text(&result);

    assert_eq!(
        text.lines().next(),
        Some("depfix: partial (Issues found: 1, Changes applied: 1, Errors: 1)")
    );
    assert!(text.contains(
        "Errors:\n  - [apply_fixes] AnchorNotFound: other.py: anchor `verify=False` not found\n"
    ));
}
