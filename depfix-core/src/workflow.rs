//! The orchestrator: a fixed linear graph of five stages.

use crate::adapters::{
    FsRepoView, FsWritePort, HttpReasoningService, RuleBasedReasoner, ShellProcessRunner,
    ShellVcsPort,
};
use crate::error::WorkflowError;
use crate::ports::{ProcessRunner, ReasoningService, RepoView, VcsPort, WritePort};
use crate::settings::{ReasoningBackend, RunOptions, WorkflowSettings};
use crate::stage::{Stage, StageContext, merge};
use crate::stages::{AnalyzeStage, ApplyFixesStage, GenerateFixesStage, SyncStage, TestStage};
use anyhow::anyhow;
use camino::Utf8PathBuf;
use depfix_edit::{PatchApplier, TextPatchApplier};
use depfix_types::error::{ErrorEntry, ErrorKind};
use depfix_types::issue::Issue;
use depfix_types::result::PipelineResult;
use depfix_types::schema;
use depfix_types::stage::{StageId, StageRecord};
use depfix_types::state::SharedState;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Position in the linear state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowState {
    Stage(StageId),
    Done,
}

impl WorkflowState {
    fn after(stage: StageId) -> Self {
        stage.next().map_or(WorkflowState::Done, WorkflowState::Stage)
    }

    pub fn pending_stage(self) -> Option<StageId> {
        match self {
            WorkflowState::Stage(stage) => Some(stage),
            WorkflowState::Done => None,
        }
    }
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkflowState::Stage(stage) => write!(f, "{}", stage),
            WorkflowState::Done => f.write_str("done"),
        }
    }
}

/// Collaborators shared by the stages.
#[derive(Clone)]
pub struct Ports {
    pub repo: Arc<dyn RepoView>,
    pub reasoner: Arc<dyn ReasoningService>,
    pub vcs: Arc<dyn VcsPort>,
    pub runner: Arc<dyn ProcessRunner>,
    pub writer: Arc<dyn WritePort>,
    pub applier: Arc<dyn PatchApplier>,
}

impl Ports {
    /// Filesystem, git and process adapters plus the configured reasoning backend.
    pub fn from_settings(settings: &WorkflowSettings) -> anyhow::Result<Self> {
        let reasoner: Arc<dyn ReasoningService> = match settings.reasoning.backend {
            ReasoningBackend::Rules => Arc::new(RuleBasedReasoner),
            ReasoningBackend::Http => Arc::new(HttpReasoningService::new(&settings.reasoning)?),
        };
        Ok(Self {
            repo: Arc::new(FsRepoView::new(settings.repository_path.clone())),
            reasoner,
            vcs: Arc::new(ShellVcsPort::new(&settings.vcs)),
            runner: Arc::new(ShellProcessRunner::new(&settings.tests)),
            writer: Arc::new(FsWritePort),
            applier: Arc::new(TextPatchApplier),
        })
    }
}

/// Everything needed to continue a run from a stage boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub schema: String,
    pub run_id: Uuid,

    /// `None` once the run reached Done.
    pub next_stage: Option<StageId>,

    pub options: RunOptions,
    pub state: SharedState,
}

#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub run_id: Uuid,
    pub options: RunOptions,
    pub state: SharedState,
    pub reached: WorkflowState,
    pub records: Vec<StageRecord>,
    pub result: PipelineResult,
}

impl RunOutcome {
    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            schema: schema::DEPFIX_CHECKPOINT_V1.to_string(),
            run_id: self.run_id,
            next_stage: self.reached.pending_stage(),
            options: self.options,
            state: self.state.clone(),
        }
    }

    pub fn completed(&self) -> bool {
        self.reached == WorkflowState::Done
    }
}

pub struct Workflow {
    settings: Arc<WorkflowSettings>,
    stages: Vec<Box<dyn Stage>>,
}

impl Workflow {
    /// Build the fixed Sync → Analyze → GenerateFixes → ApplyFixes → Test graph.
    pub fn new(settings: WorkflowSettings, ports: Ports) -> Self {
        let stages: Vec<Box<dyn Stage>> = vec![
            Box::new(SyncStage::new(ports.vcs)),
            Box::new(AnalyzeStage::new(ports.repo, ports.reasoner.clone())),
            Box::new(GenerateFixesStage::new(ports.reasoner)),
            Box::new(ApplyFixesStage::new(ports.applier, ports.writer)),
            Box::new(TestStage::new(ports.runner)),
        ];
        Self {
            settings: Arc::new(settings),
            stages,
        }
    }

    /// Default adapters for a repository on disk.
    pub fn from_settings(settings: WorkflowSettings) -> Result<Self, WorkflowError> {
        if !settings.repository_path.is_dir() {
            return Err(WorkflowError::Setup(anyhow!(
                "repository path {} is not a directory",
                settings.repository_path
            )));
        }
        let ports = Ports::from_settings(&settings)?;
        Ok(Self::new(settings, ports))
    }

    /// Use custom stage implementations; they must cover the five stages in order.
    pub fn with_stages(
        settings: WorkflowSettings,
        stages: Vec<Box<dyn Stage>>,
    ) -> Result<Self, WorkflowError> {
        let ids: Vec<StageId> = stages.iter().map(|s| s.id()).collect();
        if ids != StageId::ALL {
            let got: Vec<&str> = ids.iter().map(|s| s.as_str()).collect();
            return Err(WorkflowError::InvalidGraph(format!(
                "expected sync, analyze, generate_fixes, apply_fixes, test; got {}",
                got.join(", ")
            )));
        }
        Ok(Self {
            settings: Arc::new(settings),
            stages,
        })
    }

    pub fn settings(&self) -> &WorkflowSettings {
        &self.settings
    }

    /// Run every stage on a fresh state.
    pub async fn run(&self, cancel: CancellationToken) -> RunOutcome {
        let state = SharedState::new(self.settings.repository_path.clone());
        self.drive(Uuid::new_v4(), state, WorkflowState::Stage(StageId::Sync), cancel)
            .await
    }

    /// Continue from a checkpoint taken by an earlier run.
    pub async fn resume(
        &self,
        checkpoint: Checkpoint,
        cancel: CancellationToken,
    ) -> Result<RunOutcome, WorkflowError> {
        if checkpoint.schema != schema::DEPFIX_CHECKPOINT_V1 {
            return Err(WorkflowError::InvalidCheckpoint(format!(
                "unsupported schema `{}`",
                checkpoint.schema
            )));
        }
        if checkpoint.state.repository_path != self.settings.repository_path {
            return Err(WorkflowError::InvalidCheckpoint(format!(
                "checkpoint is for {}, not {}",
                checkpoint.state.repository_path, self.settings.repository_path
            )));
        }
        let start = checkpoint
            .next_stage
            .map_or(WorkflowState::Done, WorkflowState::Stage);
        info!(run_id = %checkpoint.run_id, from = %start, "resuming");
        Ok(self
            .drive(checkpoint.run_id, checkpoint.state, start, cancel)
            .await)
    }

    async fn drive(
        &self,
        run_id: Uuid,
        mut state: SharedState,
        start: WorkflowState,
        cancel: CancellationToken,
    ) -> RunOutcome {
        let ctx = StageContext::new(self.settings.clone(), cancel);
        let mut records = Vec::new();
        let mut position = start;
        let mut cancelled_at = None;

        while let WorkflowState::Stage(id) = position {
            if ctx.is_cancelled() {
                cancelled_at = Some(id);
                break;
            }
            let Some(stage) = self.stages.iter().find(|s| s.id() == id) else {
                state.errors.push(ErrorEntry::new(
                    id,
                    ErrorKind::StageInternalError,
                    "stage missing from workflow graph",
                ));
                break;
            };

            info!(%run_id, stage = %id, "stage started");
            let started = Instant::now();
            let merged = match stage.run(&state, &ctx).await {
                Ok(output) => {
                    let interrupted = output.interrupted();
                    merge(&mut state, output).map(|stats| (stats, interrupted))
                }
                Err(err) => Err(err),
            };
            let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

            match merged {
                Ok((stats, interrupted)) => {
                    info!(
                        %run_id,
                        stage = %id,
                        duration_ms,
                        errors = stats.errors_added,
                        "stage finished"
                    );
                    records.push(StageRecord {
                        stage: id,
                        duration_ms,
                        messages_added: stats.messages_added,
                        errors_added: stats.errors_added,
                        interrupted,
                    });
                    if interrupted {
                        cancelled_at = Some(id);
                        break;
                    }
                    position = WorkflowState::after(id);
                }
                Err(err) => {
                    error!(%run_id, stage = %id, "aborting run: {}", err);
                    state.errors.push(ErrorEntry::new(
                        id,
                        ErrorKind::StageInternalError,
                        err.to_string(),
                    ));
                    records.push(StageRecord {
                        stage: id,
                        duration_ms,
                        messages_added: 0,
                        errors_added: 1,
                        interrupted: false,
                    });
                    break;
                }
            }
        }

        let cancelled = cancelled_at.map(|id| {
            warn!(%run_id, stage = %id, "run cancelled");
            ErrorEntry::new(
                id,
                ErrorKind::Cancelled,
                format!("run cancelled at {}; resume from the checkpoint", id),
            )
        });
        let result = reduce(&state, position, cancelled.as_ref());
        RunOutcome {
            run_id,
            options: self.settings.options,
            state,
            reached: position,
            records,
            result,
        }
    }
}

/// Fold the final state into the caller-facing result.
///
/// `success` requires an empty error list and a run that got past Test.
pub fn reduce(
    state: &SharedState,
    reached: WorkflowState,
    cancelled: Option<&ErrorEntry>,
) -> PipelineResult {
    let mut errors: Vec<String> = state.errors.iter().map(ToString::to_string).collect();
    errors.extend(cancelled.map(ToString::to_string));

    let success = errors.is_empty() && reached == WorkflowState::Done;
    let summary = format!(
        "Issues found: {}, Changes applied: {}, Errors: {}",
        state.issues_found.len(),
        state.applied_changes.len(),
        errors.len()
    );
    PipelineResult {
        success,
        summary,
        changes_made: state.applied_changes.clone(),
        errors,
        issues_found: state.issues_found.iter().map(Issue::label).collect(),
    }
}

/// One-shot run with the default adapters.
pub async fn run_upgrade(
    repository_path: impl Into<Utf8PathBuf>,
    options: RunOptions,
) -> Result<PipelineResult, WorkflowError> {
    let settings = WorkflowSettings::new(repository_path, options);
    let workflow = Workflow::from_settings(settings)?;
    Ok(workflow.run(CancellationToken::new()).await.result)
}
