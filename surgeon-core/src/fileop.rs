//! Semantic fileops attached to a [`Commit`](crate::event::Commit), resolved
//! against the blob table rather than referring to marks by wire position.

use bstr::BString;

use crate::event::BlobId;
use fast_export::FileMode;

/// A change to a single path within a commit, after resolving fast-import
/// mark references to stable [`BlobId`]s.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FileOp {
    Modify { path: BString, mode: FileMode, blob: BlobId },
    Delete { path: BString },
    Rename { source: BString, target: BString },
    Copy { source: BString, target: BString },
    /// An annotation attaching `blob` to the commit addressed by `path`,
    /// the object-note equivalent of `N <ref> <path>` (the object to
    /// annotate, not a filesystem path).
    Note { path: BString, blob: BlobId },
    DeleteAll,
}

impl FileOp {
    /// The path this op's identity hinges on, for selection and filtering.
    /// `Rename`/`Copy` report the target; `DeleteAll` has none.
    #[must_use]
    pub fn primary_path(&self) -> Option<&BString> {
        match self {
            FileOp::Modify { path, .. } | FileOp::Delete { path } | FileOp::Note { path, .. } => {
                Some(path)
            }
            FileOp::Rename { target, .. } | FileOp::Copy { target, .. } => Some(target),
            FileOp::DeleteAll => None,
        }
    }

    /// Rewrites every path mentioned in this op with `f`, dropping the op
    /// entirely if `f` returns `None` for its primary path(s). Used by the
    /// path-rename and filter primitives.
    #[must_use]
    pub fn map_paths(self, mut f: impl FnMut(&BString) -> Option<BString>) -> Option<FileOp> {
        match self {
            FileOp::Modify { path, mode, blob } => {
                Some(FileOp::Modify { path: f(&path)?, mode, blob })
            }
            FileOp::Delete { path } => Some(FileOp::Delete { path: f(&path)? }),
            FileOp::Rename { source, target } => {
                let target = f(&target)?;
                let source = f(&source).unwrap_or(source);
                Some(FileOp::Rename { source, target })
            }
            FileOp::Copy { source, target } => {
                let target = f(&target)?;
                let source = f(&source).unwrap_or(source);
                Some(FileOp::Copy { source, target })
            }
            FileOp::Note { path, blob } => Some(FileOp::Note { path: f(&path)?, blob }),
            FileOp::DeleteAll => Some(FileOp::DeleteAll),
        }
    }
}
