use serde::{Deserialize, Serialize};
use std::fmt;

/// The five pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageId {
    Sync,
    Analyze,
    GenerateFixes,
    ApplyFixes,
    Test,
}

impl StageId {
    pub const ALL: [StageId; 5] = [
        StageId::Sync,
        StageId::Analyze,
        StageId::GenerateFixes,
        StageId::ApplyFixes,
        StageId::Test,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            StageId::Sync => "sync",
            StageId::Analyze => "analyze",
            StageId::GenerateFixes => "generate_fixes",
            StageId::ApplyFixes => "apply_fixes",
            StageId::Test => "test",
        }
    }

    /// The following stage, or `None` after Test.
    pub fn next(self) -> Option<StageId> {
        let idx = Self::ALL.iter().position(|s| *s == self)?;
        Self::ALL.get(idx + 1).copied()
    }

    /// Shared-state fields this stage is the single writer of.
    ///
    /// `messages` and `errors` are append-only logs every stage contributes to;
    /// they are not listed here.
    pub fn owned_fields(self) -> &'static [StateField] {
        match self {
            StageId::Sync => &[],
            StageId::Analyze => &[StateField::FileContents, StateField::IssuesFound],
            StageId::GenerateFixes => &[StateField::SuggestedFixes],
            StageId::ApplyFixes => &[StateField::AppliedChanges, StateField::FixedFiles],
            StageId::Test => &[StateField::TestResults],
        }
    }

    pub fn owns(self, field: StateField) -> bool {
        self.owned_fields().contains(&field)
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Timing and effect of one executed stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageRecord {
    pub stage: StageId,
    pub duration_ms: u64,
    pub messages_added: usize,
    pub errors_added: usize,
    pub interrupted: bool,
}

/// Single-writer fields of [`SharedState`](crate::state::SharedState).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateField {
    FileContents,
    IssuesFound,
    SuggestedFixes,
    AppliedChanges,
    FixedFiles,
    TestResults,
}

impl StateField {
    pub fn as_str(self) -> &'static str {
        match self {
            StateField::FileContents => "file_contents",
            StateField::IssuesFound => "issues_found",
            StateField::SuggestedFixes => "suggested_fixes",
            StateField::AppliedChanges => "applied_changes",
            StateField::FixedFiles => "fixed_files",
            StateField::TestResults => "test_results",
        }
    }
}

impl fmt::Display for StateField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn next_walks_the_linear_sequence() {
        assert_eq!(StageId::Sync.next(), Some(StageId::Analyze));
        assert_eq!(StageId::ApplyFixes.next(), Some(StageId::Test));
        assert_eq!(StageId::Test.next(), None);
    }

    #[test]
    fn every_field_has_exactly_one_owner() {
        let mut seen = BTreeSet::new();
        for stage in StageId::ALL {
            for field in stage.owned_fields() {
                assert!(seen.insert(*field), "{} owned twice", field);
            }
        }
        assert_eq!(seen.len(), 6);
    }
}
