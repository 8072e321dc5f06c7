//! Errors that escape a stage or the orchestrator.
//!
//! Collaborator and patch failures never show up here; stages turn them into
//! [`ErrorEntry`](depfix_types::error::ErrorEntry) records. Only a broken
//! shared-state contract surfaces as [`StageInternalError`].

use camino::Utf8PathBuf;
use depfix_types::stage::{StageId, StateField};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StageInternalError {
    #[error("stage `{stage}` attempted to write `{field}`, which it does not own")]
    OwnershipViolation { stage: StageId, field: StateField },

    #[error("stage `{stage}` has no cached content for `{path}`")]
    MissingContent { stage: StageId, path: Utf8PathBuf },

    #[error("stage `{stage}`: fix references unknown issue in `{path}`")]
    DanglingIssueRef { stage: StageId, path: Utf8PathBuf },

    #[error("stage `{stage}`: {message}")]
    Invariant { stage: StageId, message: String },
}

impl StageInternalError {
    pub fn stage(&self) -> StageId {
        match self {
            StageInternalError::OwnershipViolation { stage, .. }
            | StageInternalError::MissingContent { stage, .. }
            | StageInternalError::DanglingIssueRef { stage, .. }
            | StageInternalError::Invariant { stage, .. } => *stage,
        }
    }
}

/// Failure to start or resume a run at all.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("invalid workflow graph: {0}")]
    InvalidGraph(String),

    #[error("invalid checkpoint: {0}")]
    InvalidCheckpoint(String),

    #[error("{0:#}")]
    Setup(#[from] anyhow::Error),
}
