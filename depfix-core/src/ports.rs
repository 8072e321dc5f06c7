//! Port traits abstracting all collaborator I/O away from the stages.

use async_trait::async_trait;
use camino::{Utf8Path, Utf8PathBuf};
use depfix_types::request::ReasoningRequest;

/// External reasoning service (LLM or rule engine).
///
/// Returns the raw response text; JSON extraction and validation happen in
/// [`boundary`](crate::boundary).
#[async_trait]
pub trait ReasoningService: Send + Sync {
    async fn complete(&self, request: &ReasoningRequest) -> anyhow::Result<String>;
}

/// Result of one VCS operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VcsOutcome {
    pub success: bool,
    pub message: String,
}

impl VcsOutcome {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

/// Remote VCS synchronization.
#[async_trait]
pub trait VcsPort: Send + Sync {
    async fn commit_local_changes(&self, repo_root: &Utf8Path) -> anyhow::Result<VcsOutcome>;
    async fn push(&self, repo_root: &Utf8Path) -> anyhow::Result<VcsOutcome>;
    async fn pull(&self, repo_root: &Utf8Path) -> anyhow::Result<VcsOutcome>;
}

/// Captured result of executing one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    /// Non-zero (or missing) exit code, or a Python traceback on stderr.
    pub fn is_failure(&self) -> bool {
        self.exit_code != Some(0) || self.stderr.contains("Traceback (most recent call last)")
    }
}

/// Process execution for the Test stage.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    async fn run(
        &self,
        repo_root: &Utf8Path,
        file_path: &Utf8Path,
    ) -> anyhow::Result<ProcessOutput>;
}

/// Read-only repository access.
pub trait RepoView: Send + Sync {
    /// Repo-relative paths matching `include` and not `exclude`, sorted.
    fn list_sources(
        &self,
        include: &[String],
        exclude: &[String],
    ) -> anyhow::Result<Vec<Utf8PathBuf>>;

    fn read_bytes(&self, rel: &Utf8Path) -> anyhow::Result<Vec<u8>>;
}

/// File-system write operations.
pub trait WritePort: Send + Sync {
    /// Write `contents` to `path`, creating missing parent directories.
    fn write_file(&self, path: &Utf8Path, contents: &[u8]) -> anyhow::Result<()>;
}
