//! Edit engine for depfix fixes.
//!
//! Responsibilities:
//! - Resolve each fix's anchor against the *original* text.
//! - Order edits by their original offset and reject anchor misses and overlaps per fix.
//! - Apply the accepted edits in one pass, last offset first.
//! - Describe the result as a derived `<stem>_fixed<ext>` file with hashes and a unified diff.
//!
//! Nothing here touches the filesystem; callers decide whether and where the
//! derived content is written.

mod error;

pub use error::{PatchError, PatchResult};

use camino::{Utf8Path, Utf8PathBuf};
use depfix_types::fix::{Anchor, Fix, FixOperation, InsertPosition};
use depfix_types::state::FixedFile;
use diffy::PatchFormatter;
use sha2::{Digest, Sha256};
use tracing::debug;

/// Suffix appended to the file stem of derived outputs.
pub const DERIVED_SUFFIX: &str = "_fixed";

/// Turns an original text plus the fixes for that file into new text.
///
/// The default [`TextPatchApplier`] works on exact substrings and line ranges; an
/// AST-aware implementation can be swapped in without touching the stages.
pub trait PatchApplier: Send + Sync {
    fn apply(&self, original: &str, fixes: &[Fix]) -> FilePatch;
}

/// Outcome of patching one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePatch {
    pub content: String,

    /// Indices into the input fixes that were applied, in original-offset order.
    pub applied: Vec<usize>,

    /// Fixes that were not applied, with the reason.
    pub rejected: Vec<RejectedFix>,
}

impl FilePatch {
    pub fn is_noop(&self, original: &str) -> bool {
        self.content == original
    }

    /// Describe the derived output for `path`, or `None` when nothing changed.
    pub fn to_fixed_file(&self, path: &Utf8Path, original: &str) -> Option<FixedFile> {
        if self.is_noop(original) {
            return None;
        }
        Some(FixedFile {
            derived_path: derived_path(path),
            sha256_before: sha256_hex(original.as_bytes()),
            sha256_after: sha256_hex(self.content.as_bytes()),
            diff: render_diff(path, original, &self.content),
            fixes_applied: self.applied.len() as u64,
            written: false,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedFix {
    pub index: usize,
    pub error: PatchError,
}

/// Exact-substring / line-range patch applier.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextPatchApplier;

impl PatchApplier for TextPatchApplier {
    fn apply(&self, original: &str, fixes: &[Fix]) -> FilePatch {
        apply_fixes(original, fixes)
    }
}

/// A fix resolved to a byte range of the original text.
#[derive(Debug, Clone)]
struct Edit<'a> {
    index: usize,
    start: usize,
    end: usize,
    operation: FixOperation,
    replacement: &'a str,
}

impl Edit<'_> {
    fn is_point(&self) -> bool {
        self.start == self.end
    }

    fn overlaps(&self, other: &Edit<'_>) -> bool {
        match (self.is_point(), other.is_point()) {
            // Two inserts at the same offset have no defined relative order.
            (true, true) => self.start == other.start,
            (true, false) => other.start < self.start && self.start < other.end,
            (false, true) => self.start < other.start && other.start < self.end,
            (false, false) => self.start < other.end && other.start < self.end,
        }
    }
}

/// Apply `fixes` to `original`.
///
/// Pure and deterministic: the same inputs always produce byte-identical output.
pub fn apply_fixes(original: &str, fixes: &[Fix]) -> FilePatch {
    let mut rejected = Vec::new();
    let mut edits = Vec::new();

    for (index, fix) in fixes.iter().enumerate() {
        match resolve_edit(original, index, fix) {
            Ok(edit) => edits.push(edit),
            Err(error) => {
                debug!(index, file = %fix.file_path, %error, "fix rejected");
                rejected.push(RejectedFix { index, error });
            }
        }
    }

    // Order by position in the original text, never by arrival order.
    edits.sort_by(|a, b| {
        (a.start, a.end, a.operation, a.replacement, a.index).cmp(&(
            b.start,
            b.end,
            b.operation,
            b.replacement,
            b.index,
        ))
    });

    let mut accepted: Vec<Edit<'_>> = Vec::with_capacity(edits.len());
    for edit in edits {
        if let Some(prior) = accepted.iter().find(|a| a.overlaps(&edit)) {
            let error = PatchError::ConflictingEdits {
                anchor: fixes[edit.index].anchor.describe(),
                start: edit.start,
                end: edit.end,
                other_start: prior.start,
                other_end: prior.end,
            };
            debug!(index = edit.index, %error, "fix rejected");
            rejected.push(RejectedFix {
                index: edit.index,
                error,
            });
            continue;
        }
        accepted.push(edit);
    }

    // Last offset first, so earlier offsets stay valid.
    let mut content = original.to_string();
    for edit in accepted.iter().rev() {
        content.replace_range(edit.start..edit.end, edit.replacement);
    }

    rejected.sort_by_key(|r| r.index);

    FilePatch {
        content,
        applied: accepted.iter().map(|e| e.index).collect(),
        rejected,
    }
}

fn resolve_edit<'a>(original: &str, index: usize, fix: &'a Fix) -> PatchResult<Edit<'a>> {
    let (start, end) = resolve_anchor(original, &fix.anchor)?;

    let (start, end, replacement) = match fix.operation {
        FixOperation::Replace => (start, end, required_text(fix)?),
        FixOperation::Delete => (start, end, ""),
        FixOperation::Insert => {
            let at = match fix.position {
                InsertPosition::Before => start,
                InsertPosition::After => end,
            };
            (at, at, required_text(fix)?)
        }
    };

    Ok(Edit {
        index,
        start,
        end,
        operation: fix.operation,
        replacement,
    })
}

fn required_text(fix: &Fix) -> PatchResult<&str> {
    fix.new_text
        .as_deref()
        .ok_or_else(|| PatchError::InvalidFix {
            message: format!("{} without new_text", fix.operation),
        })
}

/// Resolve an anchor to a `start..end` byte range of `original`.
pub fn resolve_anchor(original: &str, anchor: &Anchor) -> PatchResult<(usize, usize)> {
    let not_found = || PatchError::AnchorNotFound {
        anchor: anchor.describe(),
    };

    match anchor {
        Anchor::Text { text } => {
            if text.is_empty() {
                return Err(not_found());
            }
            let start = original.find(text.as_str()).ok_or_else(not_found)?;
            Ok((start, start + text.len()))
        }
        Anchor::Lines { start, end } => {
            if *start == 0 || start > end {
                return Err(not_found());
            }
            let bounds = line_bounds(original);
            let first = bounds.get(*start as usize - 1).ok_or_else(not_found)?;
            let last = bounds.get(*end as usize - 1).ok_or_else(not_found)?;
            Ok((first.0, last.1))
        }
    }
}

/// Byte ranges of each line, including its trailing newline.
fn line_bounds(text: &str) -> Vec<(usize, usize)> {
    let mut bounds = Vec::new();
    let mut start = 0;
    for (idx, _) in text.match_indices('\n') {
        bounds.push((start, idx + 1));
        start = idx + 1;
    }
    if start < text.len() {
        bounds.push((start, text.len()));
    }
    bounds
}

/// `dir/name.py` -> `dir/name_fixed.py`; files without an extension get the bare suffix.
pub fn derived_path(path: &Utf8Path) -> Utf8PathBuf {
    let stem = path.file_stem().unwrap_or_default();
    let name = match path.extension() {
        Some(ext) => format!("{stem}{DERIVED_SUFFIX}.{ext}"),
        None => format!("{stem}{DERIVED_SUFFIX}"),
    };
    path.with_file_name(name)
}

/// True for paths that are themselves derived outputs.
pub fn is_derived(path: &Utf8Path) -> bool {
    path.file_stem()
        .is_some_and(|stem| stem.ends_with(DERIVED_SUFFIX))
}

/// Decode file bytes as text, mapping failures to [`PatchError::EncodingError`].
pub fn decode_text(bytes: Vec<u8>) -> PatchResult<String> {
    String::from_utf8(bytes).map_err(|e| PatchError::EncodingError {
        message: e.utf8_error().to_string(),
    })
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Unified diff from `before` to `after`, with git-style headers pointing at the derived path.
pub fn render_diff(path: &Utf8Path, before: &str, after: &str) -> String {
    if before == after {
        return String::new();
    }

    let mut out = String::new();
    let formatter = PatchFormatter::new();
    let derived = derived_path(path);

    out.push_str(&format!("diff --git a/{} b/{}\n", path, derived));
    out.push_str(&format!("--- a/{}\n+++ b/{}\n", path, derived));

    let patch = diffy::create_patch(before, after);
    let body = formatter.fmt_patch(&patch).to_string();
    // diffy emits its own ---/+++ header; keep only the hunks.
    let hunks = body
        .split_once("\n@@")
        .map(|(_, rest)| format!("@@{rest}"))
        .unwrap_or_default();
    out.push_str(&hunks);
    if !out.ends_with('\n') {
        out.push('\n');
    }
    out
}
