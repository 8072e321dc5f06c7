//! The uniform stage contract.
//!
//! A stage reads a [`SharedState`] snapshot and returns a [`StageOutput`]
//! holding only what it wants to add. The orchestrator folds the output back
//! with [`merge`], which rejects writes to fields the stage does not own and
//! de-duplicates re-runs.

use crate::error::StageInternalError;
use crate::settings::WorkflowSettings;
use async_trait::async_trait;
use camino::Utf8PathBuf;
use depfix_types::error::{ErrorEntry, ErrorKind};
use depfix_types::fix::{Fix, FixKey};
use depfix_types::issue::{Issue, IssueKey};
use depfix_types::stage::{StageId, StateField};
use depfix_types::state::{FixedFile, SharedState, TestOutcome};
use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Per-run context handed to every stage.
#[derive(Debug, Clone)]
pub struct StageContext {
    pub settings: Arc<WorkflowSettings>,
    pub cancel: CancellationToken,
}

impl StageContext {
    pub fn new(settings: Arc<WorkflowSettings>, cancel: CancellationToken) -> Self {
        Self { settings, cancel }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

#[async_trait]
pub trait Stage: Send + Sync {
    fn id(&self) -> StageId;

    /// Collaborator and per-item failures go into the output's `errors`;
    /// an `Err` here aborts the remaining pipeline.
    async fn run(
        &self,
        state: &SharedState,
        ctx: &StageContext,
    ) -> Result<StageOutput, StageInternalError>;
}

/// Write-only builder for one stage's contribution to the shared state.
#[derive(Debug, Clone)]
pub struct StageOutput {
    stage: StageId,
    file_contents: BTreeMap<Utf8PathBuf, String>,
    issues: Vec<Issue>,
    fixes: Vec<Fix>,
    changes: Vec<String>,
    fixed_files: BTreeMap<Utf8PathBuf, FixedFile>,
    test_results: BTreeMap<Utf8PathBuf, TestOutcome>,
    errors: Vec<ErrorEntry>,
    messages: Vec<String>,
    interrupted: bool,
}

impl StageOutput {
    /// Start an output and record the start notification.
    pub fn begin(stage: StageId) -> Self {
        Self {
            stage,
            file_contents: BTreeMap::new(),
            issues: vec![],
            fixes: vec![],
            changes: vec![],
            fixed_files: BTreeMap::new(),
            test_results: BTreeMap::new(),
            errors: vec![],
            messages: vec![format!("{}: started", stage)],
            interrupted: false,
        }
    }

    /// Record the end notification.
    pub fn finish(mut self, summary: impl AsRef<str>) -> Self {
        let suffix = if self.interrupted { " (cancelled)" } else { "" };
        self.messages.push(format!(
            "{}: finished{}: {}",
            self.stage,
            suffix,
            summary.as_ref()
        ));
        self
    }

    pub fn stage(&self) -> StageId {
        self.stage
    }

    pub fn set_content(&mut self, path: Utf8PathBuf, content: String) {
        self.file_contents.insert(path, content);
    }

    pub fn push_issue(&mut self, issue: Issue) {
        self.issues.push(issue);
    }

    pub fn push_fix(&mut self, fix: Fix) {
        self.fixes.push(fix);
    }

    pub fn push_change(&mut self, change: impl Into<String>) {
        self.changes.push(change.into());
    }

    pub fn set_fixed_file(&mut self, path: Utf8PathBuf, fixed: FixedFile) {
        self.fixed_files.insert(path, fixed);
    }

    pub fn set_test_result(&mut self, path: Utf8PathBuf, outcome: TestOutcome) {
        self.test_results.insert(path, outcome);
    }

    pub fn push_error(&mut self, entry: ErrorEntry) {
        self.errors.push(entry);
    }

    pub fn message(&mut self, message: impl Into<String>) {
        self.messages.push(message.into());
    }

    /// Mark that cancellation cut this stage short.
    pub fn mark_interrupted(&mut self) {
        self.interrupted = true;
    }

    pub fn interrupted(&self) -> bool {
        self.interrupted
    }

    pub fn issues(&self) -> &[Issue] {
        &self.issues
    }

    pub fn fixes(&self) -> &[Fix] {
        &self.fixes
    }

    pub fn errors(&self) -> &[ErrorEntry] {
        &self.errors
    }

    /// Owned fields this output would write; `errors` and `messages` are shared.
    pub fn touched_fields(&self) -> BTreeSet<StateField> {
        let mut fields = BTreeSet::new();
        if !self.file_contents.is_empty() {
            fields.insert(StateField::FileContents);
        }
        if !self.issues.is_empty() {
            fields.insert(StateField::IssuesFound);
        }
        if !self.fixes.is_empty() {
            fields.insert(StateField::SuggestedFixes);
        }
        if !self.changes.is_empty() {
            fields.insert(StateField::AppliedChanges);
        }
        if !self.fixed_files.is_empty() {
            fields.insert(StateField::FixedFiles);
        }
        if !self.test_results.is_empty() {
            fields.insert(StateField::TestResults);
        }
        fields
    }
}

/// What a merge added to the shared state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    pub messages_added: usize,
    pub errors_added: usize,
}

/// Fold a stage's output into `state`.
///
/// Ownership is checked before anything is written, so a violating output
/// leaves `state` untouched.
pub fn merge(state: &mut SharedState, output: StageOutput) -> Result<MergeStats, StageInternalError> {
    let stage = output.stage;
    if let Some(field) = output
        .touched_fields()
        .into_iter()
        .find(|f| !stage.owns(*f))
    {
        return Err(StageInternalError::OwnershipViolation { stage, field });
    }

    state.file_contents.extend(output.file_contents);

    // A resumed stage appends only what the interrupted batch missed.
    let mut seen_issues: BTreeSet<IssueKey> = state.issues_found.iter().map(Issue::key).collect();
    for issue in output.issues {
        if seen_issues.insert(issue.key()) {
            state.issues_found.push(issue);
        }
    }
    state.issues_found.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));

    let mut seen_fixes: BTreeSet<FixKey> = state.suggested_fixes.iter().map(Fix::key).collect();
    for fix in output.fixes {
        if seen_fixes.insert(fix.key()) {
            state.suggested_fixes.push(fix);
        }
    }
    state.suggested_fixes.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));

    for change in output.changes {
        if !state.applied_changes.contains(&change) {
            state.applied_changes.push(change);
        }
    }

    state.fixed_files.extend(output.fixed_files);
    state.test_results.extend(output.test_results);

    let mut stats = MergeStats::default();
    for entry in output.errors {
        if !state.errors.contains(&entry) {
            state.errors.push(entry);
            stats.errors_added += 1;
        }
    }

    stats.messages_added = output.messages.len();
    state.messages.extend(output.messages);

    Ok(stats)
}

/// Why a bounded collaborator call produced no value.
#[derive(Debug)]
pub enum CallFailure {
    Cancelled,
    Timeout(Duration),
    Failed(anyhow::Error),
}

impl CallFailure {
    /// Convert into an error entry for `path`; cancellation records nothing.
    pub fn into_entry(
        self,
        stage: StageId,
        path: impl Into<Utf8PathBuf>,
        what: &str,
    ) -> Option<ErrorEntry> {
        match self {
            CallFailure::Cancelled => None,
            CallFailure::Timeout(limit) => Some(ErrorEntry::for_file(
                stage,
                ErrorKind::Timeout,
                path,
                format!("{} timed out after {}s", what, limit.as_secs()),
            )),
            CallFailure::Failed(err) => Some(ErrorEntry::for_file(
                stage,
                ErrorKind::CollaboratorError,
                path,
                format!("{} failed: {:#}", what, err),
            )),
        }
    }
}

/// Await a collaborator call under the run's timeout and cancellation token.
pub async fn call_collaborator<T, F>(ctx: &StageContext, call: F) -> Result<T, CallFailure>
where
    F: Future<Output = anyhow::Result<T>>,
{
    let limit = ctx.settings.call_timeout;
    tokio::select! {
        biased;
        _ = ctx.cancel.cancelled() => Err(CallFailure::Cancelled),
        res = tokio::time::timeout(limit, call) => match res {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => Err(CallFailure::Failed(err)),
            Err(_) => Err(CallFailure::Timeout(limit)),
        },
    }
}
