use serde::{Deserialize, Serialize};

/// Terminal output of one workflow run.
///
/// Built once by the orchestrator from the final [`SharedState`](crate::state::SharedState).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineResult {
    pub success: bool,
    pub summary: String,

    #[serde(default)]
    pub changes_made: Vec<String>,

    #[serde(default)]
    pub errors: Vec<String>,

    #[serde(default)]
    pub issues_found: Vec<String>,
}

impl PipelineResult {
    pub fn failed(summary: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            summary: summary.into(),
            changes_made: vec![],
            errors: vec![error.into()],
            issues_found: vec![],
        }
    }

    /// Completed, but with at least one recorded error.
    pub fn is_partial(&self) -> bool {
        !self.success && !self.errors.is_empty() && !self.changes_made.is_empty()
    }
}
