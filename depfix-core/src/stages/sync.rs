use crate::error::StageInternalError;
use crate::ports::VcsPort;
use crate::stage::{CallFailure, Stage, StageContext, StageOutput, call_collaborator};
use async_trait::async_trait;
use depfix_types::stage::StageId;
use depfix_types::state::SharedState;
use std::sync::Arc;
use tracing::{debug, warn};

/// Pulls the remote before analysis. Conflicts and network errors are
/// logged as messages and the run continues on local state.
pub struct SyncStage {
    vcs: Arc<dyn VcsPort>,
}

impl SyncStage {
    pub fn new(vcs: Arc<dyn VcsPort>) -> Self {
        Self { vcs }
    }
}

#[async_trait]
impl Stage for SyncStage {
    fn id(&self) -> StageId {
        StageId::Sync
    }

    async fn run(
        &self,
        state: &SharedState,
        ctx: &StageContext,
    ) -> Result<StageOutput, StageInternalError> {
        let mut out = StageOutput::begin(self.id());

        if !ctx.settings.vcs.pull {
            out.message("sync: pull disabled, using local state");
            return Ok(out.finish("skipped"));
        }

        let root = state.repository_path.as_path();
        let summary = match call_collaborator(ctx, self.vcs.pull(root)).await {
            Ok(outcome) if outcome.success => {
                debug!(repo = %root, "pull succeeded");
                out.message(format!("sync: pull ok: {}", outcome.message.trim()));
                "pulled"
            }
            Ok(outcome) => {
                warn!(repo = %root, "pull failed: {}", outcome.message.trim());
                out.message(format!(
                    "sync: pull failed, continuing with local state: {}",
                    outcome.message.trim()
                ));
                "local state"
            }
            Err(CallFailure::Cancelled) => {
                out.mark_interrupted();
                "cancelled"
            }
            Err(CallFailure::Timeout(limit)) => {
                warn!(repo = %root, "pull timed out");
                out.message(format!(
                    "sync: pull timed out after {}s, continuing with local state",
                    limit.as_secs()
                ));
                "local state"
            }
            Err(CallFailure::Failed(err)) => {
                warn!(repo = %root, "pull errored: {:#}", err);
                out.message(format!(
                    "sync: pull unavailable, continuing with local state: {:#}",
                    err
                ));
                "local state"
            }
        };

        Ok(out.finish(summary))
    }
}
