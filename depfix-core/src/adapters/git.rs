use crate::ports::{VcsOutcome, VcsPort};
use crate::settings::VcsSettings;
use anyhow::Context;
use async_trait::async_trait;
use camino::Utf8Path;
use tokio::process::Command;
use tracing::debug;

/// VCS operations by shelling out to `git`.
#[derive(Debug, Clone)]
pub struct ShellVcsPort {
    remote: String,
    branch: String,
    commit_message: String,
}

impl ShellVcsPort {
    pub fn new(settings: &VcsSettings) -> Self {
        Self {
            remote: settings.remote.clone(),
            branch: settings.branch.clone(),
            commit_message: settings.commit_message.clone(),
        }
    }

    async fn git(&self, repo_root: &Utf8Path, args: &[&str]) -> anyhow::Result<VcsOutcome> {
        debug!(repo = %repo_root, "git {}", args.join(" "));
        let output = Command::new("git")
            .arg("-C")
            .arg(repo_root.as_str())
            .args(args)
            .kill_on_drop(true)
            .output()
            .await
            .with_context(|| format!("spawn git {}", args.join(" ")))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        let message = if stderr.trim().is_empty() {
            stdout.trim().to_string()
        } else {
            stderr.trim().to_string()
        };
        if output.status.success() {
            Ok(VcsOutcome::ok(message))
        } else {
            Ok(VcsOutcome::failed(message))
        }
    }
}

#[async_trait]
impl VcsPort for ShellVcsPort {
    async fn commit_local_changes(&self, repo_root: &Utf8Path) -> anyhow::Result<VcsOutcome> {
        let staged = self.git(repo_root, &["add", "--all"]).await?;
        if !staged.success {
            return Ok(staged);
        }
        let status = self.git(repo_root, &["status", "--porcelain"]).await?;
        if status.success && status.message.is_empty() {
            return Ok(VcsOutcome::ok("nothing to commit"));
        }
        self.git(repo_root, &["commit", "-m", &self.commit_message])
            .await
    }

    async fn push(&self, repo_root: &Utf8Path) -> anyhow::Result<VcsOutcome> {
        let refspec = format!("HEAD:{}", self.branch);
        self.git(repo_root, &["push", &self.remote, &refspec]).await
    }

    async fn pull(&self, repo_root: &Utf8Path) -> anyhow::Result<VcsOutcome> {
        self.git(repo_root, &["pull", &self.remote, &self.branch])
            .await
    }
}
