//! Shared DTOs (schemas-as-code) for the depfix workspace.
//!
//! # Design constraints
//! - These types are serialized to disk (`state.json`, `result.json`, checkpoints).
//! - Issue and Fix records are immutable once created; nothing in the workspace mutates them.
//! - Prefer adding optional fields over changing semantics.

pub mod error;
pub mod fix;
pub mod issue;
pub mod request;
pub mod result;
pub mod stage;
pub mod state;

/// Schema identifiers.
pub mod schema {
    pub const DEPFIX_STATE_V1: &str = "depfix.state.v1";
    pub const DEPFIX_RESULT_V1: &str = "depfix.result.v1";
    pub const DEPFIX_CHECKPOINT_V1: &str = "depfix.checkpoint.v1";
}
