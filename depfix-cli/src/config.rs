//! Configuration file loading for depfix.
//!
//! Discovers and loads `depfix.toml` from the repository root and merges it
//! with CLI arguments (CLI takes precedence).

use anyhow::Context;
use camino::{Utf8Path, Utf8PathBuf};
use depfix_core::settings::{ReasoningBackend, TestScope};
use depfix_core::{RunOptions, WorkflowSettings};
use fs_err as fs;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// The config file name to search for.
pub const CONFIG_FILE_NAME: &str = "depfix.toml";

/// Top-level configuration from depfix.toml.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DepfixConfig {
    pub run: RunConfig,
    pub workflow: WorkflowConfig,
    pub reasoning: ReasoningConfig,
    pub tests: TestsConfig,
    pub vcs: VcsConfig,
}

/// `[run]`: defaults for the run options.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub dry_run: Option<bool>,
    pub run_tests: Option<bool>,
    pub create_pr: Option<bool>,
}

/// `[workflow]`: timeouts, fan-out and source discovery.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    pub call_timeout_secs: Option<u64>,
    pub concurrency: Option<usize>,
    pub include: Option<Vec<String>>,
    pub exclude: Option<Vec<String>>,
}

/// `[reasoning]`: which backend answers analyze and fix requests.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ReasoningConfig {
    pub backend: Option<ReasoningBackend>,
    pub endpoint: Option<String>,
    pub model: Option<String>,
    pub api_key_env: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

/// `[tests]`: how each file is executed.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TestsConfig {
    pub command: Option<Vec<String>>,
    pub scope: Option<TestScope>,
}

/// `[vcs]`: remote synchronization and the publish step.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct VcsConfig {
    pub pull: Option<bool>,
    pub remote: Option<String>,
    pub branch: Option<String>,
    pub commit_message: Option<String>,
}

/// Discover `depfix.toml` in the repository root.
pub fn discover_config(repo_root: &Utf8Path) -> Option<Utf8PathBuf> {
    let config_path = repo_root.join(CONFIG_FILE_NAME);
    if config_path.exists() {
        debug!("found config file at {}", config_path);
        Some(config_path)
    } else {
        debug!("no config file found at {}", config_path);
        None
    }
}

pub fn load_config(path: &Utf8Path) -> anyhow::Result<DepfixConfig> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("read config file {}", path))?;
    parse_config(&contents).with_context(|| format!("parse config file {}", path))
}

pub fn parse_config(contents: &str) -> anyhow::Result<DepfixConfig> {
    let config: DepfixConfig = toml::from_str(contents).context("invalid TOML")?;
    Ok(config)
}

/// Load an explicit config file, else the discovered one, else defaults.
pub fn load_or_default(
    repo_root: &Utf8Path,
    explicit: Option<&Utf8Path>,
) -> anyhow::Result<DepfixConfig> {
    if let Some(path) = explicit {
        return load_config(path);
    }
    match discover_config(repo_root) {
        Some(path) => load_config(&path),
        None => Ok(DepfixConfig::default()),
    }
}

/// CLI flags that can override the config file.
///
/// Boolean flags only ever switch a behavior on (or off, for the `no_*`
/// flags); leaving them unset defers to the config file.
#[derive(Debug, Clone, Default)]
pub struct RunFlags {
    pub dry_run: bool,
    pub no_tests: bool,
    pub create_pr: bool,
    pub no_pull: bool,
    pub backend: Option<ReasoningBackend>,
    pub concurrency: Option<usize>,
    pub call_timeout_secs: Option<u64>,
}

/// Builder for merging the config file with CLI arguments.
pub struct ConfigMerger {
    config: DepfixConfig,
}

impl ConfigMerger {
    pub fn new(config: DepfixConfig) -> Self {
        Self { config }
    }

    /// Resolve the final workflow settings: CLI flag, then config, then default.
    pub fn merge_run_args(self, repo_root: &Utf8Path, flags: &RunFlags) -> WorkflowSettings {
        let cfg = self.config;
        let defaults = RunOptions::default();
        let options = RunOptions {
            dry_run: flags.dry_run || cfg.run.dry_run.unwrap_or(defaults.dry_run),
            run_tests: !flags.no_tests && cfg.run.run_tests.unwrap_or(defaults.run_tests),
            create_pr: flags.create_pr || cfg.run.create_pr.unwrap_or(defaults.create_pr),
        };

        let mut settings = WorkflowSettings::new(repo_root, options);

        if let Some(secs) = flags.call_timeout_secs.or(cfg.workflow.call_timeout_secs) {
            settings.call_timeout = Duration::from_secs(secs);
        }
        if let Some(n) = flags.concurrency.or(cfg.workflow.concurrency) {
            settings.concurrency = n.max(1);
        }
        if let Some(include) = cfg.workflow.include {
            settings.include = include;
        }
        if let Some(exclude) = cfg.workflow.exclude {
            settings.exclude = exclude;
        }

        let reasoning = &mut settings.reasoning;
        if let Some(backend) = flags.backend.or(cfg.reasoning.backend) {
            reasoning.backend = backend;
        }
        if let Some(endpoint) = cfg.reasoning.endpoint {
            reasoning.endpoint = endpoint;
        }
        if let Some(model) = cfg.reasoning.model {
            reasoning.model = model;
        }
        if let Some(api_key_env) = cfg.reasoning.api_key_env {
            reasoning.api_key_env = api_key_env;
        }
        if let Some(temperature) = cfg.reasoning.temperature {
            reasoning.temperature = temperature;
        }
        if cfg.reasoning.max_tokens.is_some() {
            reasoning.max_tokens = cfg.reasoning.max_tokens;
        }

        if let Some(command) = cfg.tests.command {
            settings.tests.command = command;
        }
        if let Some(scope) = cfg.tests.scope {
            settings.tests.scope = scope;
        }

        let vcs = &mut settings.vcs;
        vcs.pull = !flags.no_pull && cfg.vcs.pull.unwrap_or(vcs.pull);
        if let Some(remote) = cfg.vcs.remote {
            vcs.remote = remote;
        }
        if let Some(branch) = cfg.vcs.branch {
            vcs.branch = branch;
        }
        if let Some(message) = cfg.vcs.commit_message {
            vcs.commit_message = message;
        }

        settings
    }
}
