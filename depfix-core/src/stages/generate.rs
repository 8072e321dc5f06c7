use crate::boundary::{issue_context, parse_fixes};
use crate::error::StageInternalError;
use crate::ports::ReasoningService;
use crate::stage::{Stage, StageContext, StageOutput, call_collaborator};
use async_trait::async_trait;
use camino::Utf8Path;
use depfix_types::error::{ErrorEntry, ErrorKind};
use depfix_types::fix::Fix;
use depfix_types::issue::Issue;
use depfix_types::request::{ReasoningRequest, ReasoningTask};
use depfix_types::stage::StageId;
use depfix_types::state::SharedState;
use futures::stream::{self, StreamExt};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Asks the reasoning service for fixes, one request per file with issues.
pub struct GenerateFixesStage {
    reasoner: Arc<dyn ReasoningService>,
}

impl GenerateFixesStage {
    pub fn new(reasoner: Arc<dyn ReasoningService>) -> Self {
        Self { reasoner }
    }
}

#[async_trait]
impl Stage for GenerateFixesStage {
    fn id(&self) -> StageId {
        StageId::GenerateFixes
    }

    async fn run(
        &self,
        state: &SharedState,
        ctx: &StageContext,
    ) -> Result<StageOutput, StageInternalError> {
        let stage = self.id();
        let mut out = StageOutput::begin(stage);

        let mut by_file: BTreeMap<&Utf8Path, Vec<Issue>> = BTreeMap::new();
        for issue in &state.issues_found {
            by_file
                .entry(issue.file_path.as_path())
                .or_default()
                .push(issue.clone());
        }

        let mut groups = Vec::with_capacity(by_file.len());
        for (path, issues) in by_file {
            let content = state.file_contents.get(path).ok_or_else(|| {
                StageInternalError::MissingContent {
                    stage,
                    path: path.to_owned(),
                }
            })?;
            groups.push((path, content.as_str(), issues));
        }

        let concurrency = ctx.settings.concurrency.max(1);
        let reasoner = &self.reasoner;
        let calls: Vec<_> = groups
            .iter()
            .map(|(path, content, issues)| {
                let request = ReasoningRequest {
                    file_path: path.to_path_buf(),
                    content: content.to_string(),
                    task: ReasoningTask::GenerateFix,
                    context: issue_context(issues),
                };
                let (path, content) = (*path, *content);
                async move {
                    let response = call_collaborator(ctx, reasoner.complete(&request)).await;
                    (path, content, issues, response)
                }
            })
            .collect();
        let mut results: Vec<_> = stream::iter(calls)
            .buffer_unordered(concurrency)
            .collect()
            .await;
        results.sort_by(|a, b| a.0.cmp(b.0));

        let mut fixes: Vec<Fix> = Vec::new();
        for (path, content, issues, response) in results {
            match response {
                Ok(text) => match parse_fixes(path, content, issues, &text) {
                    Ok(found) => {
                        debug!(path = %path, fixes = found.len(), "fixes generated");
                        fixes.extend(found);
                    }
                    Err(err) => out.push_error(ErrorEntry::for_file(
                        stage,
                        ErrorKind::CollaboratorError,
                        path,
                        format!("invalid fix response: {}", err),
                    )),
                },
                Err(failure) => match failure.into_entry(stage, path, "fix generation") {
                    Some(entry) => out.push_error(entry),
                    None => out.mark_interrupted(),
                },
            }
        }

        fixes.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
        let generated = fixes.len();
        for fix in fixes {
            out.push_fix(fix);
        }

        Ok(out.finish(format!(
            "{} fix(es) for {} file(s)",
            generated,
            groups.len()
        )))
    }
}
