//! Error types for depfix-edit.
//!
//! Every variant is scoped to a single fix or a single file; none of them
//! abort sibling fixes in the same batch.

use depfix_types::error::ErrorKind;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatchError {
    /// The anchor text (or line range) does not exist in the original content.
    #[error("anchor {anchor} not found in original content")]
    AnchorNotFound { anchor: String },

    /// The fix's range overlaps an edit that was ordered before it.
    #[error("{anchor} (bytes {start}..{end}) overlaps an earlier edit at bytes {other_start}..{other_end}")]
    ConflictingEdits {
        anchor: String,
        start: usize,
        end: usize,
        other_start: usize,
        other_end: usize,
    },

    /// The file's bytes could not be decoded as text. Fatal for that file only.
    #[error("content is not valid UTF-8: {message}")]
    EncodingError { message: String },

    /// The fix itself is malformed (e.g. `replace` without replacement text).
    #[error("invalid fix: {message}")]
    InvalidFix { message: String },
}

impl PatchError {
    /// Map to the workflow error taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            PatchError::AnchorNotFound { .. } => ErrorKind::AnchorNotFound,
            PatchError::ConflictingEdits { .. } => ErrorKind::ConflictingEdits,
            PatchError::EncodingError { .. } => ErrorKind::EncodingError,
            PatchError::InvalidFix { .. } => ErrorKind::CollaboratorError,
        }
    }

    /// True when the whole file must be skipped rather than one fix.
    pub fn is_file_fatal(&self) -> bool {
        matches!(self, PatchError::EncodingError { .. })
    }
}

pub type PatchResult<T> = Result<T, PatchError>;

#[cfg(test)]
mod tests {
    use super::PatchError;
    use depfix_types::error::ErrorKind;

    #[test]
    fn anchor_not_found_maps_to_kind() {
        let err = PatchError::AnchorNotFound {
            anchor: "`x`".to_string(),
        };
        assert_eq!(err.kind(), ErrorKind::AnchorNotFound);
        assert!(!err.is_file_fatal());
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn encoding_error_is_file_fatal() {
        let err = PatchError::EncodingError {
            message: "invalid byte".to_string(),
        };
        assert!(err.is_file_fatal());
        assert_eq!(err.kind(), ErrorKind::EncodingError);
    }

    #[test]
    fn conflict_display_names_both_ranges() {
        let err = PatchError::ConflictingEdits {
            anchor: "`b`".to_string(),
            start: 3,
            end: 7,
            other_start: 0,
            other_end: 5,
        };
        let msg = err.to_string();
        assert!(msg.contains("3..7"));
        assert!(msg.contains("0..5"));
    }
}
