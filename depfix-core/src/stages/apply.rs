use crate::error::StageInternalError;
use crate::ports::WritePort;
use crate::stage::{Stage, StageContext, StageOutput};
use async_trait::async_trait;
use camino::Utf8Path;
use depfix_edit::PatchApplier;
use depfix_types::error::{ErrorEntry, ErrorKind};
use depfix_types::fix::Fix;
use depfix_types::stage::StageId;
use depfix_types::state::SharedState;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Applies suggested fixes per file and writes `<stem>_fixed<ext>` outputs.
///
/// The cached original text is never modified. In dry-run mode the patch is
/// still computed and described, but nothing is written.
pub struct ApplyFixesStage {
    applier: Arc<dyn PatchApplier>,
    writer: Arc<dyn WritePort>,
}

impl ApplyFixesStage {
    pub fn new(applier: Arc<dyn PatchApplier>, writer: Arc<dyn WritePort>) -> Self {
        Self { applier, writer }
    }
}

#[async_trait]
impl Stage for ApplyFixesStage {
    fn id(&self) -> StageId {
        StageId::ApplyFixes
    }

    async fn run(
        &self,
        state: &SharedState,
        ctx: &StageContext,
    ) -> Result<StageOutput, StageInternalError> {
        let stage = self.id();
        let dry_run = ctx.settings.options.dry_run;
        let mut out = StageOutput::begin(stage);

        let mut by_file: BTreeMap<&Utf8Path, Vec<Fix>> = BTreeMap::new();
        for fix in &state.suggested_fixes {
            by_file
                .entry(fix.file_path.as_path())
                .or_default()
                .push(fix.clone());
        }

        let mut files_changed = 0usize;
        let mut fixes_applied = 0usize;
        for (path, fixes) in by_file {
            if ctx.is_cancelled() {
                out.mark_interrupted();
                break;
            }
            let original = state.file_contents.get(path).ok_or_else(|| {
                StageInternalError::MissingContent {
                    stage,
                    path: path.to_owned(),
                }
            })?;

            let patch = self.applier.apply(original, &fixes);
            for rejected in &patch.rejected {
                let fix = fixes.get(rejected.index).ok_or_else(|| StageInternalError::Invariant {
                    stage,
                    message: format!(
                        "applier rejected fix #{} but {} has {} fix(es)",
                        rejected.index,
                        path,
                        fixes.len()
                    ),
                })?;
                out.push_error(ErrorEntry::for_file(
                    stage,
                    rejected.error.kind(),
                    path,
                    format!("{}: {}", fix.describe(), rejected.error),
                ));
            }

            let Some(mut fixed) = patch.to_fixed_file(path, original) else {
                out.message(format!("apply_fixes: {} unchanged", path));
                continue;
            };

            if !dry_run {
                let target = state.repository_path.join(&fixed.derived_path);
                if let Err(err) = self.writer.write_file(&target, patch.content.as_bytes()) {
                    out.push_error(ErrorEntry::for_file(
                        stage,
                        ErrorKind::CollaboratorError,
                        path,
                        format!("writing {} failed: {:#}", fixed.derived_path, err),
                    ));
                    continue;
                }
                fixed.written = true;
                info!("wrote {}", target);
            }

            for &index in &patch.applied {
                let Some(fix) = fixes.get(index) else {
                    continue;
                };
                let change = if dry_run {
                    format!("[dry-run] would apply {}", fix.describe())
                } else {
                    format!("Applied {}", fix.describe())
                };
                out.push_change(change);
            }
            debug!(
                path = %path,
                applied = patch.applied.len(),
                rejected = patch.rejected.len(),
                "patched"
            );
            files_changed += 1;
            fixes_applied += patch.applied.len();
            out.set_fixed_file(path.to_owned(), fixed);
        }

        Ok(out.finish(format!(
            "{} fix(es) applied to {} file(s){}",
            fixes_applied,
            files_changed,
            if dry_run { " (dry run)" } else { "" }
        )))
    }
}
