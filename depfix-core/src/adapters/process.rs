use crate::ports::{ProcessOutput, ProcessRunner};
use crate::settings::TestSettings;
use anyhow::{Context, bail};
use async_trait::async_trait;
use camino::Utf8Path;
use tokio::process::Command;

/// Runs `<command...> <file>` with the repository root as working directory.
#[derive(Debug, Clone)]
pub struct ShellProcessRunner {
    command: Vec<String>,
}

impl ShellProcessRunner {
    pub fn new(settings: &TestSettings) -> Self {
        Self {
            command: settings.command.clone(),
        }
    }
}

#[async_trait]
impl ProcessRunner for ShellProcessRunner {
    async fn run(
        &self,
        repo_root: &Utf8Path,
        file_path: &Utf8Path,
    ) -> anyhow::Result<ProcessOutput> {
        let Some((program, args)) = self.command.split_first() else {
            bail!("test command is empty");
        };
        let output = Command::new(program)
            .args(args)
            .arg(file_path.as_str())
            .current_dir(repo_root)
            .kill_on_drop(true)
            .output()
            .await
            .with_context(|| format!("spawn {} {}", program, file_path))?;

        Ok(ProcessOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}
