//! Default port implementations.

mod fs;
mod git;
mod http;
mod memory;
mod process;
mod rules;

pub use fs::{FsRepoView, FsWritePort};
pub use git::ShellVcsPort;
pub use http::HttpReasoningService;
pub use memory::{InMemoryRepoView, InMemoryWritePort};
pub use process::ShellProcessRunner;
pub use rules::RuleBasedReasoner;
