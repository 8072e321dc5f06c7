use crate::error::StageInternalError;
use crate::ports::{ProcessOutput, ProcessRunner};
use crate::settings::TestScope;
use crate::stage::{CallFailure, Stage, StageContext, StageOutput, call_collaborator};
use async_trait::async_trait;
use camino::Utf8PathBuf;
use depfix_types::error::{ErrorEntry, ErrorKind};
use depfix_types::stage::StageId;
use depfix_types::state::{SharedState, TestOutcome};
use std::sync::Arc;
use tracing::{debug, warn};

/// Executes each analyzed file, preferring its written derived output.
pub struct TestStage {
    runner: Arc<dyn ProcessRunner>,
}

impl TestStage {
    pub fn new(runner: Arc<dyn ProcessRunner>) -> Self {
        Self { runner }
    }
}

#[async_trait]
impl Stage for TestStage {
    fn id(&self) -> StageId {
        StageId::Test
    }

    async fn run(
        &self,
        state: &SharedState,
        ctx: &StageContext,
    ) -> Result<StageOutput, StageInternalError> {
        let stage = self.id();
        let mut out = StageOutput::begin(stage);

        if !ctx.settings.options.run_tests {
            out.message("test: disabled by run options");
            return Ok(out.finish("skipped"));
        }

        let scope = ctx.settings.tests.scope;
        let targets: Vec<(Utf8PathBuf, Utf8PathBuf)> = state
            .file_contents
            .keys()
            .filter(|path| scope == TestScope::All || state.fixed_files.contains_key(*path))
            .map(|path| {
                let target = match state.fixed_files.get(path) {
                    Some(fixed) if fixed.written => fixed.derived_path.clone(),
                    _ => path.clone(),
                };
                (path.clone(), target)
            })
            .collect();

        let root = state.repository_path.as_path();
        let mut passed = 0usize;
        let mut failed = 0usize;
        for (path, target) in targets {
            if ctx.is_cancelled() {
                out.mark_interrupted();
                break;
            }
            match call_collaborator(ctx, self.runner.run(root, &target)).await {
                Ok(output) if !output.is_failure() => {
                    debug!(target = %target, "passed");
                    passed += 1;
                    out.set_test_result(path, TestOutcome::pass(target, output.exit_code));
                }
                Ok(output) => {
                    let reason = failure_reason(&output);
                    warn!(target = %target, "failed: {}", reason);
                    failed += 1;
                    out.push_error(ErrorEntry::for_file(
                        stage,
                        ErrorKind::TestFailure,
                        &path,
                        format!("{} failed: {}", target, reason),
                    ));
                    let outcome = TestOutcome::fail(target, output.exit_code, captured_text(&output));
                    out.set_test_result(path, outcome);
                }
                Err(CallFailure::Cancelled) => {
                    out.mark_interrupted();
                    break;
                }
                Err(failure) => {
                    failed += 1;
                    if let Some(entry) = failure.into_entry(stage, &path, "test run") {
                        let message = entry.message.clone();
                        out.push_error(entry);
                        out.set_test_result(path, TestOutcome::fail(target, None, message));
                    }
                }
            }
        }

        Ok(out.finish(format!("{} passed, {} failed", passed, failed)))
    }
}

/// Last non-empty stderr line (the exception for a traceback), else the exit code.
fn failure_reason(output: &ProcessOutput) -> String {
    output
        .stderr
        .lines()
        .rev()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| match output.exit_code {
            Some(code) => format!("exit code {}", code),
            None => "terminated by signal".to_string(),
        })
}

fn captured_text(output: &ProcessOutput) -> String {
    let stderr = output.stderr.trim();
    if stderr.is_empty() {
        failure_reason(output)
    } else {
        stderr.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn output(exit_code: Option<i32>, stderr: &str) -> ProcessOutput {
        ProcessOutput {
            exit_code,
            stdout: String::new(),
            stderr: stderr.to_string(),
        }
    }

    #[test]
    fn reason_is_the_exception_line() {
        let out = output(
            Some(1),
            "Traceback (most recent call last):\n  File \"a.py\", line 1\nNameError: name 'x' is not defined\n",
        );
        assert_eq!(failure_reason(&out), "NameError: name 'x' is not defined");
    }

    #[test]
    fn reason_falls_back_to_exit_code() {
        assert_eq!(failure_reason(&output(Some(3), "")), "exit code 3");
        assert_eq!(failure_reason(&output(None, "  ")), "terminated by signal");
        assert_eq!(captured_text(&output(Some(3), "")), "exit code 3");
    }
}
