use crate::error::ErrorEntry;
use crate::fix::Fix;
use crate::issue::{Issue, IssueKey};
use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The single record threaded through the five stages of one workflow run.
///
/// Each collection is written by exactly one stage (see
/// [`StageId::owned_fields`](crate::stage::StageId::owned_fields)); `errors` and
/// `messages` are append-only logs owned by the orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SharedState {
    pub schema: String,

    pub repository_path: Utf8PathBuf,

    /// Original text of every analyzed file, keyed by repo-relative path.
    #[serde(default)]
    pub file_contents: BTreeMap<Utf8PathBuf, String>,

    #[serde(default)]
    pub issues_found: Vec<Issue>,

    #[serde(default)]
    pub suggested_fixes: Vec<Fix>,

    #[serde(default)]
    pub applied_changes: Vec<String>,

    /// Derived outputs produced by ApplyFixes, keyed by the original path.
    #[serde(default)]
    pub fixed_files: BTreeMap<Utf8PathBuf, FixedFile>,

    #[serde(default)]
    pub test_results: BTreeMap<Utf8PathBuf, TestOutcome>,

    #[serde(default)]
    pub errors: Vec<ErrorEntry>,

    #[serde(default)]
    pub messages: Vec<String>,
}

impl SharedState {
    /// Fresh state with every collection empty.
    pub fn new(repository_path: impl Into<Utf8PathBuf>) -> Self {
        Self {
            schema: crate::schema::DEPFIX_STATE_V1.to_string(),
            repository_path: repository_path.into(),
            file_contents: BTreeMap::new(),
            issues_found: vec![],
            suggested_fixes: vec![],
            applied_changes: vec![],
            fixed_files: BTreeMap::new(),
            test_results: BTreeMap::new(),
            errors: vec![],
            messages: vec![],
        }
    }

    pub fn issue(&self, key: &IssueKey) -> Option<&Issue> {
        self.issues_found.iter().find(|i| &i.key() == key)
    }

    pub fn issues_for(&self, file_path: &Utf8Path) -> impl Iterator<Item = &Issue> {
        self.issues_found
            .iter()
            .filter(move |i| i.file_path == file_path)
    }

    pub fn fixes_for(&self, file_path: &Utf8Path) -> impl Iterator<Item = &Fix> {
        self.suggested_fixes
            .iter()
            .filter(move |f| f.file_path == file_path)
    }

    pub fn tests_failed(&self) -> usize {
        self.test_results.values().filter(|t| !t.passed).count()
    }
}

/// A derived `<stem>_fixed<ext>` output for one original file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixedFile {
    pub derived_path: Utf8PathBuf,
    pub sha256_before: String,
    pub sha256_after: String,

    /// Unified diff from the original to the derived content.
    pub diff: String,

    pub fixes_applied: u64,

    /// False in dry-run mode: the content was computed but never written.
    pub written: bool,
}

/// Outcome of executing one file in the Test stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestOutcome {
    pub passed: bool,

    /// The path that was actually executed (derived file when one was written).
    pub target: Utf8PathBuf,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,

    /// Captured stderr / failure text; `None` on pass.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TestOutcome {
    pub fn pass(target: impl Into<Utf8PathBuf>, exit_code: Option<i32>) -> Self {
        Self {
            passed: true,
            target: target.into(),
            exit_code,
            error: None,
        }
    }

    pub fn fail(
        target: impl Into<Utf8PathBuf>,
        exit_code: Option<i32>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            passed: false,
            target: target.into(),
            exit_code,
            error: Some(error.into()),
        }
    }
}
