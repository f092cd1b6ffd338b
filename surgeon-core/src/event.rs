//! The in-memory event model: the ordered sequence of blobs, commits,
//! tags, and resets that makes up a repository history under edit.

use bstr::BString;

use crate::fileop::FileOp;
use crate::ident::{ActionStamp, LegacyId};

/// An index into [`Repository::blobs`](crate::repo::Repository::blobs).
/// Stable across surgical edits; never reused after a blob is gc'd, so a
/// dangling `BlobId` is always detectable rather than silently aliasing a
/// different blob.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlobId(pub u64);

/// An index into [`Repository::events`](crate::repo::Repository::events).
/// 0-origin, matching the selection-set language's event numbering.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventId(pub usize);

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PersonIdent {
    pub name: BString,
    pub email: BString,
}

#[derive(Clone, Debug)]
pub struct Blob {
    pub id: BlobId,
    pub content: BString,
    /// Populated lazily and cached; see [`crate::ident::hash_blob`].
    pub hash: Option<String>,
}

#[derive(Clone, Debug)]
pub struct Commit {
    pub branch: BString,
    pub author: PersonIdent,
    pub author_stamp: ActionStamp,
    pub committer: PersonIdent,
    pub committer_stamp: ActionStamp,
    pub message: BString,
    /// Preceding event on this commit's own lineage, or `None` for a root
    /// commit.
    pub parent: Option<EventId>,
    /// Additional parents beyond `parent`, in declaration order.
    pub merge_parents: Vec<EventId>,
    pub fileops: Vec<FileOp>,
    pub legacy_id: Option<LegacyId>,
    /// Carried across `%inline` and structural transforms so the original
    /// wire-level mark can be reconstructed on export.
    pub original_mark: Option<u64>,
    /// Foreign parents introduced by [`crate::surgery::graft`]: an action
    /// stamp in another repository that was never imported as a local
    /// event.
    pub callouts: Vec<ActionStamp>,
}

#[derive(Clone, Debug)]
pub struct Tag {
    pub name: BString,
    pub target: EventId,
    pub tagger: Option<PersonIdent>,
    pub tagger_stamp: Option<ActionStamp>,
    pub message: BString,
    pub legacy_id: Option<LegacyId>,
}

#[derive(Clone, Debug)]
pub struct Reset {
    pub branch: BString,
    pub target: Option<EventId>,
}

#[derive(Clone, Debug)]
pub struct Passthrough {
    pub text: BString,
}

/// One entry in the event stream. `Blob`s are stored out-of-line in
/// [`Repository::blobs`](crate::repo::Repository::blobs); `Event::Commit`
/// and friends hold [`EventId`]/[`BlobId`] references rather than inline
/// content, so the surgical primitives can rewrite topology without
/// recopying file content.
#[derive(Clone, Debug)]
pub enum Event {
    Commit(Commit),
    Tag(Tag),
    Reset(Reset),
    Passthrough(Passthrough),
}

impl Event {
    #[must_use]
    pub fn as_commit(&self) -> Option<&Commit> {
        match self {
            Event::Commit(c) => Some(c),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_commit_mut(&mut self) -> Option<&mut Commit> {
        match self {
            Event::Commit(c) => Some(c),
            _ => None,
        }
    }

    #[must_use]
    pub fn branch(&self) -> Option<&BString> {
        match self {
            Event::Commit(c) => Some(&c.branch),
            Event::Tag(_) => None,
            Event::Reset(r) => Some(&r.branch),
            Event::Passthrough(_) => None,
        }
    }
}
