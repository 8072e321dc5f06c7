use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use std::fmt;

/// What kind of problem an issue describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueCategory {
    Deprecated,
    Security,
    Compatibility,
    BadPractice,
    RuntimeRisk,
}

impl IssueCategory {
    pub const ALL: [IssueCategory; 5] = [
        IssueCategory::Deprecated,
        IssueCategory::Security,
        IssueCategory::Compatibility,
        IssueCategory::BadPractice,
        IssueCategory::RuntimeRisk,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            IssueCategory::Deprecated => "deprecated",
            IssueCategory::Security => "security",
            IssueCategory::Compatibility => "compatibility",
            IssueCategory::BadPractice => "bad_practice",
            IssueCategory::RuntimeRisk => "runtime_risk",
        }
    }

    /// Parse a category label. Case, `-` and spaces are normalized; anything else is rejected.
    pub fn parse(label: &str) -> Option<Self> {
        let norm = normalize_label(label);
        Self::ALL.into_iter().find(|c| c.as_str() == norm)
    }
}

impl fmt::Display for IssueCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    High,
    Medium,
    Low,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
        }
    }

    pub fn parse(label: &str) -> Option<Self> {
        match normalize_label(label).as_str() {
            "high" => Some(Severity::High),
            "medium" => Some(Severity::Medium),
            "low" => Some(Severity::Low),
            _ => None,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn normalize_label(label: &str) -> String {
    label
        .trim()
        .to_ascii_lowercase()
        .replace(['-', ' '], "_")
}

/// A detected problem in one source file.
///
/// Produced by the Analyze stage only. Paths are relative to the repository root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub file_path: Utf8PathBuf,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_number: Option<u32>,

    pub category: IssueCategory,
    pub severity: Severity,
    pub description: String,
}

impl Issue {
    /// Identity used for de-duplication and for fixes to point back at their issue.
    pub fn key(&self) -> IssueKey {
        IssueKey {
            file_path: self.file_path.clone(),
            category: self.category,
            line_number: self.line_number,
        }
    }

    /// Deterministic merge order: file path, then line number.
    pub fn sort_key(&self) -> (&Utf8Path, Option<u32>, IssueCategory, &str) {
        (
            &self.file_path,
            self.line_number,
            self.category,
            &self.description,
        )
    }

    /// One-line human-readable description, e.g. `a.py:10 [deprecated/high] ...`.
    pub fn label(&self) -> String {
        let loc = match self.line_number {
            Some(line) => format!("{}:{}", self.file_path, line),
            None => self.file_path.to_string(),
        };
        format!(
            "{} [{}/{}] {}",
            loc, self.category, self.severity, self.description
        )
    }
}

/// `(file_path, category, line_number)`: the de-duplication key for issues.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct IssueKey {
    pub file_path: Utf8PathBuf,
    pub category: IssueCategory,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_number: Option<u32>,
}
