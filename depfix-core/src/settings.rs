//! Clap-free settings for the workflow.

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Options recognised by `run_upgrade`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunOptions {
    /// Propagated to the publish step outside the core; no effect on the stages.
    pub create_pr: bool,

    /// Compute fixes and patches, but never write derived files.
    pub dry_run: bool,

    pub run_tests: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            create_pr: false,
            dry_run: false,
            run_tests: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasoningBackend {
    /// Offline pattern rules, no network.
    #[default]
    Rules,
    /// OpenAI-compatible chat-completions endpoint.
    Http,
}

#[derive(Debug, Clone)]
pub struct ReasoningSettings {
    pub backend: ReasoningBackend,
    pub endpoint: String,
    pub model: String,

    /// Name of the environment variable holding the API key.
    pub api_key_env: String,

    pub temperature: f32,
    pub max_tokens: Option<u32>,
}

impl Default for ReasoningSettings {
    fn default() -> Self {
        Self {
            backend: ReasoningBackend::default(),
            endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key_env: "DEPFIX_API_KEY".to_string(),
            temperature: 0.1,
            max_tokens: None,
        }
    }
}

/// Which files the Test stage executes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestScope {
    /// Every analyzed file.
    #[default]
    All,
    /// Only files with a derived output.
    Changed,
}

#[derive(Debug, Clone)]
pub struct TestSettings {
    /// Program and leading arguments; the file path is appended.
    pub command: Vec<String>,
    pub scope: TestScope,
}

impl Default for TestSettings {
    fn default() -> Self {
        Self {
            command: vec!["python".to_string()],
            scope: TestScope::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct VcsSettings {
    /// Pull from the remote during the Sync stage.
    pub pull: bool,
    pub remote: String,
    pub branch: String,
    pub commit_message: String,
}

impl Default for VcsSettings {
    fn default() -> Self {
        Self {
            pull: true,
            remote: "origin".to_string(),
            branch: "main".to_string(),
            commit_message: "depfix: apply automated fixes".to_string(),
        }
    }
}

/// Settings for one workflow run.
#[derive(Debug, Clone)]
pub struct WorkflowSettings {
    pub repository_path: Utf8PathBuf,
    pub options: RunOptions,

    /// Upper bound for every collaborator call; exceeding it is a per-item failure.
    pub call_timeout: Duration,

    /// Maximum in-flight reasoning calls within Analyze and GenerateFixes.
    pub concurrency: usize,

    // Source discovery
    pub include: Vec<String>,
    pub exclude: Vec<String>,

    pub reasoning: ReasoningSettings,
    pub tests: TestSettings,
    pub vcs: VcsSettings,
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self {
            repository_path: Utf8PathBuf::from("."),
            options: RunOptions::default(),
            call_timeout: Duration::from_secs(60),
            concurrency: 4,
            include: vec!["**/*.py".to_string()],
            exclude: vec![
                "**/__pycache__/**".to_string(),
                "**/venv/**".to_string(),
                "**/site-packages/**".to_string(),
            ],
            reasoning: ReasoningSettings::default(),
            tests: TestSettings::default(),
            vcs: VcsSettings::default(),
        }
    }
}

impl WorkflowSettings {
    pub fn new(repository_path: impl Into<Utf8PathBuf>, options: RunOptions) -> Self {
        Self {
            repository_path: repository_path.into(),
            options,
            ..Self::default()
        }
    }
}
