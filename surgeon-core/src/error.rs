//! Error kinds and their policies.

use bstr::BString;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SurgeonError>;

/// Errors raised by the engine. The caller (CLI or embedding application)
/// decides whether a [`Command`](SurgeonError::Command) or
/// [`Semantic`](SurgeonError::Semantic) error should abort a batch of edits
/// or just be logged and skipped.
#[derive(Debug, Error)]
pub enum SurgeonError {
    /// A stream or dumpfile failed to parse. The partially built repository
    /// must be discarded; there is nothing salvageable.
    #[error("parse error: {0}")]
    Parse(String),

    /// A surgical command was given invalid input (bad regex, missing
    /// selection, type mismatch). Reported to the user; does not corrupt the
    /// repository.
    #[error("command error: {0}")]
    Command(String),

    /// A non-fatal condition noticed during processing (dangling ancestor,
    /// mergeinfo pointing at a nonexistent revision, an illegal name that was
    /// remapped). Logged and processing continues.
    #[error("warning: {0}")]
    Semantic(String),

    /// An internal invariant failed. The repository in memory may be
    /// corrupted and must not be exposed to the caller.
    #[error("invariant violation: {0}")]
    Invariant(String),

    /// A reference (mark, legacy id, or branch name) did not resolve to an
    /// event present in the repository.
    #[error("unresolved reference: {0:?}")]
    UnresolvedReference(BString),

    #[error(transparent)]
    StreamParse(#[from] fast_export::ParseError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl SurgeonError {
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, SurgeonError::Invariant(_) | SurgeonError::Parse(_))
    }
}
