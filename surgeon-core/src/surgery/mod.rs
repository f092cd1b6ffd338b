//! Surgical primitives: the mutations a selection-set expression drives.
//!
//! Each primitive takes a `&mut Repository` plus whatever selection/options
//! it needs and mutates the event list in place. None of them renumber;
//! callers that need a compacted mark space should call
//! [`Repository::gc`](crate::repo::Repository::gc) after a batch of edits.

mod canonicalize;
mod coalesce;
mod expunge;
mod filter;
mod graft;
mod path_rename;
mod reparent;
mod split;
mod squash;
mod tagify;

pub use canonicalize::canonicalize;
pub use coalesce::{coalesce, CoalesceOptions};
pub use expunge::expunge;
pub use filter::{filter, transcode, AttributeScope, Transform};
pub use graft::graft;
pub use path_rename::rename_paths;
pub use reparent::reparent;
pub use split::{split_at, split_by_path};
pub use squash::{squash, Direction, SquashPolicy};
pub use tagify::tagify_empty_commits;

use crate::event::{Event, EventId};
use crate::repo::Repository;

/// All commits whose `parent` or `merge_parents` names `parent` directly.
pub(crate) fn children_of(repo: &Repository, parent: EventId) -> Vec<EventId> {
    (0..repo.len())
        .map(EventId)
        .filter(|id| match repo.event(*id).as_commit() {
            Some(c) => c.parent == Some(parent) || c.merge_parents.contains(&parent),
            None => false,
        })
        .collect()
}

/// Rewires every child of `from` to descend from `to` instead, folding
/// `from`'s own extra (merge) parents into each child's parent set too so a
/// removed merge commit's ancestry isn't silently dropped. Used whenever a
/// primitive removes or retargets a commit in place: squash, tagify, and
/// expunge's zero-op cleanup all share this.
pub(crate) fn retarget_children(repo: &mut Repository, from: EventId, to: Option<EventId>, extra_parents: &[EventId]) {
    for child_id in children_of(repo, from) {
        let Event::Commit(child) = repo.event_mut(child_id) else { continue };
        if child.parent == Some(from) {
            child.parent = to;
        } else {
            child.merge_parents.retain(|p| *p != from);
            if let Some(p) = to {
                if child.parent != Some(p) && !child.merge_parents.contains(&p) {
                    child.merge_parents.push(p);
                }
            }
        }
        for extra in extra_parents {
            if child.parent != Some(*extra) && !child.merge_parents.contains(extra) {
                child.merge_parents.push(*extra);
            }
        }
    }
}
