use crate::stage::StageId;
use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Classification of a contained (non-fatal) failure.
///
/// `Timeout` and `Cancelled` are collaborator failures with a more precise cause.
/// `StageInternalError` is recorded only when the orchestrator stops the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    CollaboratorError,
    Timeout,
    Cancelled,
    AnchorNotFound,
    ConflictingEdits,
    EncodingError,
    TestFailure,
    StageInternalError,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::CollaboratorError => "CollaboratorError",
            ErrorKind::Timeout => "Timeout",
            ErrorKind::Cancelled => "Cancelled",
            ErrorKind::AnchorNotFound => "AnchorNotFound",
            ErrorKind::ConflictingEdits => "ConflictingEdits",
            ErrorKind::EncodingError => "EncodingError",
            ErrorKind::TestFailure => "TestFailure",
            ErrorKind::StageInternalError => "StageInternalError",
        }
    }

    /// True for the only class that aborts the remaining pipeline.
    pub fn is_fatal(self) -> bool {
        matches!(self, ErrorKind::StageInternalError)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One recorded failure, attributed to the stage that contained it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEntry {
    pub stage: StageId,
    pub kind: ErrorKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<Utf8PathBuf>,

    pub message: String,
}

impl ErrorEntry {
    pub fn new(stage: StageId, kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            stage,
            kind,
            file_path: None,
            message: message.into(),
        }
    }

    pub fn for_file(
        stage: StageId,
        kind: ErrorKind,
        file_path: impl Into<Utf8PathBuf>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            stage,
            kind,
            file_path: Some(file_path.into()),
            message: message.into(),
        }
    }
}

impl fmt::Display for ErrorEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.file_path {
            Some(path) => write!(
                f,
                "[{}] {}: {}: {}",
                self.stage, self.kind, path, self.message
            ),
            None => write!(f, "[{}] {}: {}", self.stage, self.kind, self.message),
        }
    }
}
