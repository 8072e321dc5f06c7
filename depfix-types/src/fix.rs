use crate::issue::IssueKey;
use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of textual edit a fix performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FixOperation {
    Replace,
    Insert,
    Delete,
}

impl FixOperation {
    pub fn as_str(self) -> &'static str {
        match self {
            FixOperation::Replace => "replace",
            FixOperation::Insert => "insert",
            FixOperation::Delete => "delete",
        }
    }

    pub fn parse(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "replace" => Some(FixOperation::Replace),
            "insert" => Some(FixOperation::Insert),
            "delete" => Some(FixOperation::Delete),
            _ => None,
        }
    }
}

impl fmt::Display for FixOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where an `insert` lands relative to its anchor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsertPosition {
    Before,
    #[default]
    After,
}

/// Locator for the original text a fix targets.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Anchor {
    /// Exact substring of the original content (first occurrence).
    Text { text: String },
    /// 1-based inclusive line range of the original content.
    Lines { start: u32, end: u32 },
}

impl Anchor {
    pub fn text(text: impl Into<String>) -> Self {
        Anchor::Text { text: text.into() }
    }

    pub fn lines(start: u32, end: u32) -> Self {
        Anchor::Lines { start, end }
    }

    /// Short description for logs and change entries.
    pub fn describe(&self) -> String {
        match self {
            Anchor::Text { text } => {
                let first = text.lines().next().unwrap_or_default();
                if text.lines().count() > 1 || first.chars().count() > 60 {
                    let short: String = first.chars().take(60).collect();
                    format!("`{}...`", short)
                } else {
                    format!("`{}`", first)
                }
            }
            Anchor::Lines { start, end } if start == end => format!("line {}", start),
            Anchor::Lines { start, end } => format!("lines {}-{}", start, end),
        }
    }
}

/// One proposed textual change to one file.
///
/// Produced by the GenerateFixes stage only; immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fix {
    pub file_path: Utf8PathBuf,
    pub issue_ref: IssueKey,
    pub operation: FixOperation,
    pub anchor: Anchor,

    #[serde(default)]
    pub position: InsertPosition,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_text: Option<String>,

    pub explanation: String,
}

impl Fix {
    /// `(file_path, anchor)`: the de-duplication key for fixes.
    pub fn key(&self) -> FixKey {
        FixKey {
            file_path: self.file_path.clone(),
            anchor: self.anchor.clone(),
        }
    }

    /// Deterministic merge order: file path, issue line, then anchor.
    pub fn sort_key(&self) -> (&Utf8Path, Option<u32>, &Anchor) {
        (&self.file_path, self.issue_ref.line_number, &self.anchor)
    }

    /// Human-readable change description used in `applied_changes`.
    pub fn describe(&self) -> String {
        format!(
            "{} {} in {}: {}",
            self.operation,
            self.anchor.describe(),
            self.file_path,
            self.explanation
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FixKey {
    pub file_path: Utf8PathBuf,
    pub anchor: Anchor,
}
