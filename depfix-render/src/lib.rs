//! Rendering helpers (markdown and console) for human-readable artifacts.

use depfix_types::result::PipelineResult;
use depfix_types::stage::StageRecord;
use depfix_types::state::SharedState;

/// The change log written next to the run artifacts.
pub fn render_changelog_md(
    state: &SharedState,
    result: &PipelineResult,
    records: &[StageRecord],
) -> String {
    let mut out = String::new();
    out.push_str("# depfix change log\n\n");
    out.push_str(&format!("- Repository: `{}`\n", state.repository_path));
    out.push_str(&format!("- Status: `{}`\n", status_label(result)));
    out.push_str(&format!(
        "- Issues: {}\n- Fixes suggested: {}\n- Changes applied: {}\n- Errors: {}\n",
        state.issues_found.len(),
        state.suggested_fixes.len(),
        state.applied_changes.len(),
        result.errors.len()
    ));
    if !state.test_results.is_empty() {
        let failed = state.tests_failed();
        out.push_str(&format!(
            "- Tests: {} passed, {} failed\n",
            state.test_results.len() - failed,
            failed
        ));
    }
    out.push('\n');

    out.push_str("## Issues\n\n");
    if state.issues_found.is_empty() {
        out.push_str("_No issues found._\n\n");
    } else {
        for issue in &state.issues_found {
            let loc = match issue.line_number {
                Some(line) => format!("{}:{}", issue.file_path, line),
                None => issue.file_path.to_string(),
            };
            out.push_str(&format!(
                "- `{}` **{}** ({}): {}\n",
                loc, issue.category, issue.severity, issue.description
            ));
        }
        out.push('\n');
    }

    out.push_str("## Changes\n\n");
    if state.applied_changes.is_empty() {
        out.push_str("_No changes applied._\n\n");
    } else {
        for change in &state.applied_changes {
            out.push_str(&format!("- {}\n", change));
        }
        out.push('\n');
    }

    if !state.fixed_files.is_empty() {
        out.push_str("## Derived files\n\n");
        for (path, fixed) in &state.fixed_files {
            let note = if fixed.written { "" } else { " (not written)" };
            out.push_str(&format!(
                "### `{}` → `{}`{}\n\n",
                path, fixed.derived_path, note
            ));
            out.push_str(&format!(
                "- Fixes applied: {}\n- sha256: {} → {}\n\n",
                fixed.fixes_applied,
                short_sha(&fixed.sha256_before),
                short_sha(&fixed.sha256_after)
            ));
            if !fixed.diff.is_empty() {
                out.push_str("```diff\n");
                out.push_str(&fixed.diff);
                if !fixed.diff.ends_with('\n') {
                    out.push('\n');
                }
                out.push_str("```\n\n");
            }
        }
    }

    if !state.test_results.is_empty() {
        out.push_str("## Tests\n\n");
        out.push_str("| File | Ran | Result |\n|---|---|---|\n");
        for (path, outcome) in &state.test_results {
            let verdict = if outcome.passed { "pass" } else { "fail" };
            out.push_str(&format!(
                "| `{}` | `{}` | {} |\n",
                path, outcome.target, verdict
            ));
        }
        out.push('\n');
    }

    out.push_str("## Errors\n\n");
    if result.errors.is_empty() {
        out.push_str("_None._\n\n");
    } else {
        for error in &result.errors {
            out.push_str(&format!("- {}\n", error));
        }
        out.push('\n');
    }

    if !records.is_empty() {
        out.push_str("## Stages\n\n");
        out.push_str("| Stage | Duration (ms) | Errors added | Note |\n|---|---:|---:|---|\n");
        for record in records {
            let note = if record.interrupted { "cancelled" } else { "" };
            out.push_str(&format!(
                "| {} | {} | {} | {} |\n",
                record.stage, record.duration_ms, record.errors_added, note
            ));
        }
    }

    out
}

/// Console summary printed at the end of a run.
pub fn render_summary_text(result: &PipelineResult) -> String {
    let mut out = String::new();
    out.push_str(&format!("depfix: {} ({})\n", status_label(result), result.summary));
    if !result.issues_found.is_empty() {
        out.push_str("\nIssues:\n");
        for issue in &result.issues_found {
            out.push_str(&format!("  - {}\n", issue));
        }
    }
    if !result.changes_made.is_empty() {
        out.push_str("\nChanges:\n");
        for change in &result.changes_made {
            out.push_str(&format!("  - {}\n", change));
        }
    }
    if !result.errors.is_empty() {
        out.push_str("\nErrors:\n");
        for error in &result.errors {
            out.push_str(&format!("  - {}\n", error));
        }
    }
    out
}

fn status_label(result: &PipelineResult) -> &'static str {
    if result.success {
        "success"
    } else if result.is_partial() {
        "partial"
    } else {
        "failed"
    }
}

fn short_sha(sha: &str) -> &str {
    sha.get(..12).unwrap_or(sha)
}
