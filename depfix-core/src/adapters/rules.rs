use crate::ports::ReasoningService;
use anyhow::Context;
use async_trait::async_trait;
use depfix_types::issue::{IssueCategory, Severity};
use depfix_types::request::{ReasoningRequest, ReasoningTask};
use serde_json::{Value, json};
use std::collections::BTreeSet;

struct Rule {
    needle: &'static str,
    replacement: Option<&'static str>,
    category: IssueCategory,
    severity: Severity,
    description: &'static str,
}

const RULES: &[Rule] = &[
    Rule {
        needle: ".fillna(method='ffill')",
        replacement: Some(".ffill()"),
        category: IssueCategory::Deprecated,
        severity: Severity::Medium,
        description: "fillna(method='ffill') is deprecated; use .ffill()",
    },
    Rule {
        needle: ".fillna(method='bfill')",
        replacement: Some(".bfill()"),
        category: IssueCategory::Deprecated,
        severity: Severity::Medium,
        description: "fillna(method='bfill') is deprecated; use .bfill()",
    },
    Rule {
        needle: "verify=False",
        replacement: Some("verify=True"),
        category: IssueCategory::Security,
        severity: Severity::High,
        description: "TLS certificate verification is disabled",
    },
    Rule {
        needle: "pd.DataFrame.append",
        replacement: None,
        category: IssueCategory::Deprecated,
        severity: Severity::High,
        description: "DataFrame.append was removed in pandas 2.0; use pd.concat",
    },
    Rule {
        needle: "'python_hello/results.csv'",
        replacement: Some("'results.csv'"),
        category: IssueCategory::RuntimeRisk,
        severity: Severity::Low,
        description: "output path assumes the parent directory as working directory",
    },
    Rule {
        needle: "'python_hello/summary.txt'",
        replacement: Some("'summary.txt'"),
        category: IssueCategory::RuntimeRisk,
        severity: Severity::Low,
        description: "summary path assumes the parent directory as working directory",
    },
];

/// Offline reasoning backend built from fixed substring rules.
///
/// Answers in the same JSON shapes a remote model is asked for, so responses
/// go through the same validation.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleBasedReasoner;

impl RuleBasedReasoner {
    fn analyze(content: &str) -> Value {
        let mut issues = Vec::new();
        for (idx, line) in content.lines().enumerate() {
            for rule in RULES.iter().filter(|r| line.contains(r.needle)) {
                issues.push(json!({
                    "category": rule.category,
                    "severity": rule.severity,
                    "description": rule.description,
                    "line_number": idx + 1,
                }));
            }
        }
        Value::Array(issues)
    }

    fn generate(content: &str, context: &Value) -> anyhow::Result<Value> {
        let issues = context
            .as_array()
            .context("fix request context is not an issue list")?;
        // Line endings stay attached so a whole-line replace keeps them.
        let lines: Vec<&str> = content.split_inclusive('\n').collect();

        let mut done = BTreeSet::new();
        let mut fixes = Vec::new();
        for issue in issues {
            let index = issue.get("index").and_then(Value::as_u64);
            let Some(line_number) = issue.get("line_number").and_then(Value::as_u64) else {
                continue;
            };
            if !done.insert(line_number) {
                continue;
            }
            let Some(line) = usize::try_from(line_number)
                .ok()
                .and_then(|n| n.checked_sub(1))
                .and_then(|i| lines.get(i))
            else {
                continue;
            };

            let mut fixed = line.to_string();
            let mut applied = Vec::new();
            for rule in RULES {
                if let Some(replacement) = rule.replacement
                    && fixed.contains(rule.needle)
                {
                    fixed = fixed.replace(rule.needle, replacement);
                    applied.push(rule.description);
                }
            }
            if applied.is_empty() {
                continue;
            }
            fixes.push(json!({
                "issue_index": index,
                "operation": "replace",
                "start_line": line_number,
                "end_line": line_number,
                "new_text": fixed,
                "explanation": applied.join("; "),
            }));
        }
        Ok(Value::Array(fixes))
    }
}

#[async_trait]
impl ReasoningService for RuleBasedReasoner {
    async fn complete(&self, request: &ReasoningRequest) -> anyhow::Result<String> {
        let value = match request.task {
            ReasoningTask::Analyze => Self::analyze(&request.content),
            ReasoningTask::GenerateFix => Self::generate(&request.content, &request.context)?,
        };
        Ok(value.to_string())
    }
}
