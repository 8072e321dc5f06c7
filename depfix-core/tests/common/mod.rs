//! Scripted collaborators shared by the workflow tests.

#![allow(dead_code)]

use async_trait::async_trait;
use camino::{Utf8Path, Utf8PathBuf};
use depfix_core::adapters::{InMemoryRepoView, InMemoryWritePort};
use depfix_core::ports::{ProcessOutput, ProcessRunner, ReasoningService, VcsOutcome, VcsPort};
use depfix_core::{Ports, RunOptions, Workflow, WorkflowSettings};
use depfix_edit::TextPatchApplier;
use depfix_types::request::{ReasoningRequest, ReasoningTask};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub const ROOT: &str = "/repo";

#[derive(Debug, Clone)]
pub enum Reply {
    Text(String),
    Fail(String),
    Delayed(Duration, String),
}

/// Answers by `(file, task)`; anything unscripted gets `[]`.
#[derive(Debug, Default)]
pub struct ScriptedReasoner {
    replies: BTreeMap<(Utf8PathBuf, &'static str), Reply>,
    completed: Mutex<Vec<Utf8PathBuf>>,
    /// Cancelled as soon as a fix request arrives.
    cancel_on_fix: Option<CancellationToken>,
}

impl ScriptedReasoner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn analysis(mut self, path: &str, reply: Reply) -> Self {
        self.replies.insert((path.into(), "analyze"), reply);
        self
    }

    pub fn fixes(mut self, path: &str, reply: Reply) -> Self {
        self.replies.insert((path.into(), "generate_fix"), reply);
        self
    }

    pub fn cancelling_on_fix(mut self, token: CancellationToken) -> Self {
        self.cancel_on_fix = Some(token);
        self
    }

    pub fn completion_order(&self) -> Vec<Utf8PathBuf> {
        self.completed.lock().unwrap().clone()
    }
}

#[async_trait]
impl ReasoningService for ScriptedReasoner {
    async fn complete(&self, request: &ReasoningRequest) -> anyhow::Result<String> {
        if request.task == ReasoningTask::GenerateFix {
            if let Some(token) = &self.cancel_on_fix {
                token.cancel();
                tokio::time::sleep(Duration::from_secs(30)).await;
            }
        }
        let key = (request.file_path.clone(), request.task.as_str());
        let reply = self
            .replies
            .get(&key)
            .cloned()
            .unwrap_or_else(|| Reply::Text("[]".to_string()));
        let result = match reply {
            Reply::Text(text) => Ok(text),
            Reply::Fail(message) => Err(anyhow::anyhow!(message)),
            Reply::Delayed(delay, text) => {
                tokio::time::sleep(delay).await;
                Ok(text)
            }
        };
        self.completed
            .lock()
            .unwrap()
            .push(request.file_path.clone());
        result
    }
}

#[derive(Debug, Default)]
pub struct FakeVcs {
    pub pull_fails: bool,
}

#[async_trait]
impl VcsPort for FakeVcs {
    async fn commit_local_changes(&self, _repo_root: &Utf8Path) -> anyhow::Result<VcsOutcome> {
        Ok(VcsOutcome::ok("committed"))
    }

    async fn push(&self, _repo_root: &Utf8Path) -> anyhow::Result<VcsOutcome> {
        Ok(VcsOutcome::ok("pushed"))
    }

    async fn pull(&self, _repo_root: &Utf8Path) -> anyhow::Result<VcsOutcome> {
        if self.pull_fails {
            Ok(VcsOutcome::failed("CONFLICT (content): merge conflict in a.py"))
        } else {
            Ok(VcsOutcome::ok("Already up to date."))
        }
    }
}

/// Passes every target unless told otherwise; records what it ran.
#[derive(Debug, Default)]
pub struct FakeRunner {
    failing: BTreeMap<Utf8PathBuf, String>,
    ran: Mutex<Vec<Utf8PathBuf>>,
}

impl FakeRunner {
    pub fn failing(mut self, target: &str, stderr: &str) -> Self {
        self.failing.insert(target.into(), stderr.to_string());
        self
    }

    pub fn ran(&self) -> Vec<Utf8PathBuf> {
        self.ran.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProcessRunner for FakeRunner {
    async fn run(
        &self,
        _repo_root: &Utf8Path,
        file_path: &Utf8Path,
    ) -> anyhow::Result<ProcessOutput> {
        self.ran.lock().unwrap().push(file_path.to_owned());
        Ok(match self.failing.get(file_path) {
            Some(stderr) => ProcessOutput {
                exit_code: Some(1),
                stdout: String::new(),
                stderr: stderr.clone(),
            },
            None => ProcessOutput {
                exit_code: Some(0),
                stdout: "ok\n".to_string(),
                stderr: String::new(),
            },
        })
    }
}

pub struct Harness {
    pub workflow: Workflow,
    pub ports: Ports,
    pub reasoner: Arc<ScriptedReasoner>,
    pub writer: Arc<InMemoryWritePort>,
    pub runner: Arc<FakeRunner>,
}

pub fn settings(options: RunOptions) -> WorkflowSettings {
    WorkflowSettings::new(ROOT, options)
}

pub fn harness(repo: InMemoryRepoView, reasoner: ScriptedReasoner) -> Harness {
    harness_with(
        settings(RunOptions::default()),
        repo,
        reasoner,
        InMemoryWritePort::new(),
        FakeRunner::default(),
    )
}

pub fn harness_with(
    settings: WorkflowSettings,
    repo: InMemoryRepoView,
    reasoner: ScriptedReasoner,
    writer: InMemoryWritePort,
    runner: FakeRunner,
) -> Harness {
    let reasoner = Arc::new(reasoner);
    let writer = Arc::new(writer);
    let runner = Arc::new(runner);
    let ports = Ports {
        repo: Arc::new(repo),
        reasoner: reasoner.clone(),
        vcs: Arc::new(FakeVcs::default()),
        runner: runner.clone(),
        writer: writer.clone(),
        applier: Arc::new(TextPatchApplier),
    };
    Harness {
        workflow: Workflow::new(settings, ports.clone()),
        ports,
        reasoner,
        writer,
        runner,
    }
}

pub fn repo() -> InMemoryRepoView {
    InMemoryRepoView::new()
}

pub fn issue_json(line: u32, category: &str, description: &str) -> String {
    format!(
        r#"{{"category": "{}", "severity": "medium", "description": "{}", "line_number": {}}}"#,
        category, description, line
    )
}

pub fn replace_json(issue_index: usize, anchor: &str, new_text: &str) -> String {
    serde_json::json!({
        "issue_index": issue_index,
        "operation": "replace",
        "anchor": anchor,
        "new_text": new_text,
        "explanation": format!("replace {}", anchor),
    })
    .to_string()
}

pub fn array(items: &[String]) -> String {
    format!("[{}]", items.join(", "))
}
