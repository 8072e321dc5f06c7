//! Embeddable workflow engine for depfix.
//!
//! Runs the fixed five-stage pipeline (Sync, Analyze, GenerateFixes,
//! ApplyFixes, Test) over a [`SharedState`](depfix_types::state::SharedState)
//! and reduces the final state into a
//! [`PipelineResult`](depfix_types::result::PipelineResult).
//!
//! # Port traits
//!
//! All collaborator I/O is abstracted behind traits in [`ports`]:
//! - [`ReasoningService`](ports::ReasoningService): issue detection and fix generation
//! - [`VcsPort`](ports::VcsPort): commit / push / pull
//! - [`ProcessRunner`](ports::ProcessRunner): execute a file for the Test stage
//! - [`RepoView`](ports::RepoView): list and read source files
//! - [`WritePort`](ports::WritePort): write derived outputs
//!
//! The [`adapters`] module provides default implementations.
//!
//! # Entry points
//!
//! - [`run_upgrade`](workflow::run_upgrade): one-shot run with default adapters
//! - [`Workflow::run`](workflow::Workflow::run) / [`Workflow::resume`](workflow::Workflow::resume)

pub mod adapters;
pub mod boundary;
pub mod error;
pub mod ports;
pub mod settings;
pub mod stage;
pub mod stages;
pub mod workflow;

pub use error::{StageInternalError, WorkflowError};
pub use settings::{RunOptions, WorkflowSettings};
pub use depfix_types::stage::StageRecord;
pub use workflow::{Checkpoint, Ports, RunOutcome, Workflow, WorkflowState, run_upgrade};
