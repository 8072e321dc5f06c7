use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasoningTask {
    Analyze,
    GenerateFix,
}

impl ReasoningTask {
    pub fn as_str(self) -> &'static str {
        match self {
            ReasoningTask::Analyze => "analyze",
            ReasoningTask::GenerateFix => "generate_fix",
        }
    }
}

/// Request sent to the reasoning service for one file.
///
/// For `generate_fix`, `context` carries the issues to fix as a JSON array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReasoningRequest {
    pub file_path: Utf8PathBuf,
    pub content: String,
    pub task: ReasoningTask,

    #[serde(default)]
    pub context: serde_json::Value,
}
