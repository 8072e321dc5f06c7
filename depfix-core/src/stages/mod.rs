//! The five pipeline stages, in execution order.

mod analyze;
mod apply;
mod generate;
mod sync;
mod test_run;

pub use analyze::AnalyzeStage;
pub use apply::ApplyFixesStage;
pub use generate::GenerateFixesStage;
pub use sync::SyncStage;
pub use test_run::TestStage;
