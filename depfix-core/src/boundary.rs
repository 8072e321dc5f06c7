//! Strict validation of reasoning-service responses.
//!
//! The service answers in free text that should contain a JSON array. The
//! array is cut out of the response, every item is checked against the Issue
//! or Fix shape, and the first invalid item rejects the whole response.
//! Unknown fields are ignored; the file path always comes from the request.

use camino::Utf8Path;
use depfix_types::fix::{Anchor, Fix, FixOperation, InsertPosition};
use depfix_types::issue::{Issue, IssueCategory, Severity};
use serde::Deserialize;
use serde_json::{Value, json};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BoundaryError {
    #[error("response contains no JSON array")]
    NoJsonArray,

    #[error("response is not valid JSON: {0}")]
    Malformed(String),

    #[error("item {index}: {message}")]
    InvalidItem { index: usize, message: String },
}

impl BoundaryError {
    fn item(index: usize, message: impl Into<String>) -> Self {
        BoundaryError::InvalidItem {
            index,
            message: message.into(),
        }
    }
}

/// Cut the outermost `[...]` out of `response` and parse it.
pub fn extract_json_array(response: &str) -> Result<Vec<Value>, BoundaryError> {
    let start = response.find('[').ok_or(BoundaryError::NoJsonArray)?;
    let end = response.rfind(']').ok_or(BoundaryError::NoJsonArray)?;
    if end < start {
        return Err(BoundaryError::NoJsonArray);
    }
    serde_json::from_str(&response[start..=end]).map_err(|e| BoundaryError::Malformed(e.to_string()))
}

#[derive(Debug, Deserialize)]
struct IssuePayload {
    #[serde(alias = "issue_type", alias = "type")]
    category: String,
    severity: String,
    description: String,
    #[serde(default)]
    line_number: Option<LineNumber>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum LineNumber {
    Int(i64),
    Text(String),
}

impl LineNumber {
    /// `None` for text that is not a number ("unknown"); an error for numbers below 1.
    fn resolve(&self) -> Result<Option<u32>, String> {
        let n = match self {
            LineNumber::Int(n) => *n,
            LineNumber::Text(s) => match s.trim().parse::<i64>() {
                Ok(n) => n,
                Err(_) => return Ok(None),
            },
        };
        u32::try_from(n)
            .ok()
            .filter(|n| *n >= 1)
            .map(Some)
            .ok_or_else(|| format!("line_number {} is out of range", n))
    }
}

/// Validate an analysis response into issues for `file_path`.
pub fn parse_issues(file_path: &Utf8Path, response: &str) -> Result<Vec<Issue>, BoundaryError> {
    let items = extract_json_array(response)?;
    let mut issues = Vec::with_capacity(items.len());
    for (index, item) in items.into_iter().enumerate() {
        let payload: IssuePayload =
            serde_json::from_value(item).map_err(|e| BoundaryError::item(index, e.to_string()))?;

        let category = IssueCategory::parse(&payload.category).ok_or_else(|| {
            BoundaryError::item(index, format!("unknown category `{}`", payload.category))
        })?;
        let severity = Severity::parse(&payload.severity).ok_or_else(|| {
            BoundaryError::item(index, format!("unknown severity `{}`", payload.severity))
        })?;
        let line_number = match &payload.line_number {
            Some(line) => line.resolve().map_err(|m| BoundaryError::item(index, m))?,
            None => None,
        };
        let description = payload.description.trim();
        if description.is_empty() {
            return Err(BoundaryError::item(index, "empty description"));
        }

        issues.push(Issue {
            file_path: file_path.to_owned(),
            line_number,
            category,
            severity,
            description: description.to_string(),
        });
    }
    Ok(issues)
}

/// The `context` sent with a fix request: the file's issues, indexed.
pub fn issue_context(issues: &[Issue]) -> Value {
    Value::Array(
        issues
            .iter()
            .enumerate()
            .map(|(index, issue)| {
                json!({
                    "index": index,
                    "line_number": issue.line_number,
                    "category": issue.category,
                    "severity": issue.severity,
                    "description": issue.description,
                })
            })
            .collect(),
    )
}

#[derive(Debug, Deserialize)]
struct FixPayload {
    #[serde(alias = "fix_type")]
    operation: String,
    #[serde(default, alias = "original_code")]
    anchor: Option<String>,
    #[serde(default)]
    start_line: Option<u32>,
    #[serde(default)]
    end_line: Option<u32>,
    #[serde(default, alias = "fixed_code")]
    new_text: Option<String>,
    #[serde(default)]
    position: Option<String>,
    explanation: String,
    #[serde(default, alias = "issue_id")]
    issue_index: Option<Value>,
}

/// Validate a fix response for `file_path`.
///
/// `issues` must be the same slice passed to [`issue_context`]; each fix is
/// linked to one of them.
pub fn parse_fixes(
    file_path: &Utf8Path,
    content: &str,
    issues: &[Issue],
    response: &str,
) -> Result<Vec<Fix>, BoundaryError> {
    let items = extract_json_array(response)?;
    let mut fixes = Vec::with_capacity(items.len());
    for (index, item) in items.into_iter().enumerate() {
        let payload: FixPayload =
            serde_json::from_value(item).map_err(|e| BoundaryError::item(index, e.to_string()))?;

        let operation = FixOperation::parse(&payload.operation).ok_or_else(|| {
            BoundaryError::item(index, format!("unknown operation `{}`", payload.operation))
        })?;

        let mut trim = Trim::default();
        let text_anchor = payload
            .anchor
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .map(|raw| {
                let (text, applied) = Trim::to_match(raw, content);
                trim = applied;
                text
            });
        let anchor = match (text_anchor, payload.start_line) {
            (Some(text), _) => Anchor::text(text),
            (_, Some(start)) => {
                let end = payload.end_line.unwrap_or(start);
                if start == 0 || end < start {
                    return Err(BoundaryError::item(
                        index,
                        format!("invalid line range {}-{}", start, end),
                    ));
                }
                Anchor::lines(start, end)
            }
            _ => return Err(BoundaryError::item(index, "missing anchor")),
        };

        let new_text = match operation {
            FixOperation::Delete => None,
            FixOperation::Replace => match payload.new_text {
                Some(text) => Some(trim.apply(&text).to_string()),
                None => return Err(BoundaryError::item(index, "replace without new_text")),
            },
            FixOperation::Insert => match payload.new_text {
                Some(text) if !text.is_empty() => Some(text),
                _ => return Err(BoundaryError::item(index, "insert without new_text")),
            },
        };

        let position = match payload.position.as_deref().map(|p| p.trim().to_ascii_lowercase()) {
            None => InsertPosition::default(),
            Some(p) if p == "before" => InsertPosition::Before,
            Some(p) if p == "after" => InsertPosition::After,
            Some(p) => {
                return Err(BoundaryError::item(index, format!("unknown position `{}`", p)));
            }
        };

        let explanation = payload.explanation.trim();
        if explanation.is_empty() {
            return Err(BoundaryError::item(index, "empty explanation"));
        }

        let issue = link_issue(issues, payload.issue_index.as_ref(), &anchor, content)
            .ok_or_else(|| BoundaryError::item(index, "cannot link fix to an issue"))?;

        fixes.push(Fix {
            file_path: file_path.to_owned(),
            issue_ref: issue.key(),
            operation,
            anchor,
            position,
            new_text,
            explanation: explanation.to_string(),
        });
    }
    Ok(fixes)
}

/// Which ends of a text anchor were stripped to make it match the content.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Trim {
    start: bool,
    end: bool,
}

impl Trim {
    /// The raw anchor when it occurs verbatim, else its trimmed form.
    fn to_match<'a>(raw: &'a str, content: &str) -> (&'a str, Trim) {
        if content.contains(raw) {
            return (raw, Trim::default());
        }
        let trim = Trim {
            start: raw.trim_start().len() != raw.len(),
            end: raw.trim_end().len() != raw.len(),
        };
        (raw.trim(), trim)
    }

    /// Strip the same ends from a replacement text.
    fn apply(self, text: &str) -> &str {
        let text = if self.start { text.trim_start() } else { text };
        if self.end { text.trim_end() } else { text }
    }
}

/// Explicit index first, then the only issue, then a unique line match.
fn link_issue<'a>(
    issues: &'a [Issue],
    index: Option<&Value>,
    anchor: &Anchor,
    content: &str,
) -> Option<&'a Issue> {
    let explicit = index.and_then(|v| match v {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    });
    if let Some(i) = explicit {
        return issues.get(usize::try_from(i).ok()?);
    }
    if let [only] = issues {
        return Some(only);
    }

    let (start, end) = match anchor {
        Anchor::Lines { start, end } => (*start, *end),
        Anchor::Text { text } => {
            let offset = content.find(text.as_str())?;
            let first = line_of(content, offset);
            let last = first + text.trim_end().matches('\n').count() as u32;
            (first, last)
        }
    };
    let mut candidates = issues
        .iter()
        .filter(|i| i.line_number.is_some_and(|l| l >= start && l <= end));
    match (candidates.next(), candidates.next()) {
        (Some(issue), None) => Some(issue),
        _ => None,
    }
}

fn line_of(content: &str, offset: usize) -> u32 {
    content[..offset].matches('\n').count() as u32 + 1
}
