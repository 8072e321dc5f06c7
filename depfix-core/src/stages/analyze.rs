use crate::boundary::parse_issues;
use crate::error::StageInternalError;
use crate::ports::{ReasoningService, RepoView};
use crate::stage::{Stage, StageContext, StageOutput, call_collaborator};
use async_trait::async_trait;
use camino::Utf8PathBuf;
use depfix_edit::{decode_text, is_derived};
use depfix_types::error::{ErrorEntry, ErrorKind};
use depfix_types::issue::Issue;
use depfix_types::request::{ReasoningRequest, ReasoningTask};
use depfix_types::stage::StageId;
use depfix_types::state::SharedState;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tracing::{debug, warn};

/// Reads every source file and asks the reasoning service for its issues.
///
/// Calls run concurrently; issues are sorted by file, then line, before they
/// are handed back, so completion order never leaks into the state.
pub struct AnalyzeStage {
    repo: Arc<dyn RepoView>,
    reasoner: Arc<dyn ReasoningService>,
}

impl AnalyzeStage {
    pub fn new(repo: Arc<dyn RepoView>, reasoner: Arc<dyn ReasoningService>) -> Self {
        Self { repo, reasoner }
    }
}

#[async_trait]
impl Stage for AnalyzeStage {
    fn id(&self) -> StageId {
        StageId::Analyze
    }

    async fn run(
        &self,
        state: &SharedState,
        ctx: &StageContext,
    ) -> Result<StageOutput, StageInternalError> {
        let stage = self.id();
        let mut out = StageOutput::begin(stage);
        let settings = &ctx.settings;

        let sources = match self.repo.list_sources(&settings.include, &settings.exclude) {
            Ok(sources) => sources,
            Err(err) => {
                out.push_error(ErrorEntry::new(
                    stage,
                    ErrorKind::CollaboratorError,
                    format!("listing sources failed: {:#}", err),
                ));
                return Ok(out.finish("0 files analyzed"));
            }
        };

        let mut files: Vec<(Utf8PathBuf, String)> = Vec::new();
        for rel in sources {
            if is_derived(&rel) {
                debug!(path = %rel, "skipping derived output");
                continue;
            }
            if let Some(cached) = state.file_contents.get(&rel) {
                files.push((rel, cached.clone()));
                continue;
            }
            let bytes = match self.repo.read_bytes(&rel) {
                Ok(bytes) => bytes,
                Err(err) => {
                    out.push_error(ErrorEntry::for_file(
                        stage,
                        ErrorKind::CollaboratorError,
                        &rel,
                        format!("read failed: {:#}", err),
                    ));
                    continue;
                }
            };
            match decode_text(bytes) {
                Ok(text) => {
                    out.set_content(rel.clone(), text.clone());
                    files.push((rel, text));
                }
                Err(err) => {
                    warn!(path = %rel, "skipping undecodable file");
                    out.push_error(ErrorEntry::for_file(stage, err.kind(), &rel, err.to_string()));
                }
            }
        }

        let concurrency = settings.concurrency.max(1);
        let reasoner = &self.reasoner;
        let calls: Vec<_> = files
            .iter()
            .map(|(path, content)| {
                let request = ReasoningRequest {
                    file_path: path.clone(),
                    content: content.clone(),
                    task: ReasoningTask::Analyze,
                    context: serde_json::Value::Null,
                };
                async move {
                    let response = call_collaborator(ctx, reasoner.complete(&request)).await;
                    (path, response)
                }
            })
            .collect();
        let mut results: Vec<_> = stream::iter(calls)
            .buffer_unordered(concurrency)
            .collect()
            .await;
        results.sort_by(|a, b| a.0.cmp(b.0));

        let mut issues: Vec<Issue> = Vec::new();
        let mut analyzed = 0usize;
        for (path, response) in results {
            match response {
                Ok(text) => match parse_issues(path, &text) {
                    Ok(found) => {
                        debug!(path = %path, issues = found.len(), "analyzed");
                        analyzed += 1;
                        issues.extend(found);
                    }
                    Err(err) => out.push_error(ErrorEntry::for_file(
                        stage,
                        ErrorKind::CollaboratorError,
                        path,
                        format!("invalid analysis response: {}", err),
                    )),
                },
                Err(failure) => match failure.into_entry(stage, path, "analysis") {
                    Some(entry) => out.push_error(entry),
                    None => out.mark_interrupted(),
                },
            }
        }

        issues.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
        let found = issues.len();
        for issue in issues {
            out.push_issue(issue);
        }

        Ok(out.finish(format!(
            "{} issue(s) in {} of {} file(s)",
            found,
            analyzed,
            files.len()
        )))
    }
}
