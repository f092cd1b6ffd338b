//! Split: duplicates a commit into two, dividing its fileops between the
//! original and a new child, and reattaches the original's children to the
//! new tail commit.

use bstr::BString;

use crate::error::{Result, SurgeonError};
use crate::event::{Commit, Event, EventId};
use crate::fileop::FileOp;
use crate::repo::Repository;

fn children_of(repo: &Repository, parent: EventId) -> Vec<EventId> {
    (0..repo.len())
        .map(EventId)
        .filter(|id| match repo.event(*id).as_commit() {
            Some(c) => c.parent == Some(parent) || c.merge_parents.contains(&parent),
            None => false,
        })
        .collect()
}

fn finish_split(repo: &mut Repository, target: EventId, keep: Vec<FileOp>, moved: Vec<FileOp>) -> Result<EventId> {
    let heirs = children_of(repo, target);

    let Event::Commit(original) = repo.event(target) else {
        return Err(SurgeonError::Command("split target must be a commit".into()));
    };
    let tail = Commit {
        branch: original.branch.clone(),
        author: original.author.clone(),
        author_stamp: original.author_stamp.clone(),
        committer: original.committer.clone(),
        committer_stamp: original.committer_stamp.clone(),
        message: original.message.clone(),
        parent: Some(target),
        merge_parents: vec![],
        fileops: moved,
        legacy_id: None,
        original_mark: None,
        callouts: vec![],
    };
    let Event::Commit(original) = repo.event_mut(target) else { unreachable!() };
    original.fileops = keep;

    let new_id = repo.push_event(Event::Commit(tail));

    for heir in heirs {
        let Event::Commit(child) = repo.event_mut(heir) else { continue };
        if child.parent == Some(target) {
            child.parent = Some(new_id);
        }
        for p in &mut child.merge_parents {
            if *p == target {
                *p = new_id;
            }
        }
    }

    repo.reindex();
    Ok(new_id)
}

/// Splits `target`'s fileops at index `k`: `target` keeps `fileops[..k]`,
/// and a new commit, inserted as `target`'s sole child, gets `fileops[k..]`.
/// `target`'s former children become children of the new commit instead.
pub fn split_at(repo: &mut Repository, target: EventId, k: usize) -> Result<EventId> {
    let Event::Commit(c) = repo.event(target) else {
        return Err(SurgeonError::Command("split target must be a commit".into()));
    };
    if k > c.fileops.len() {
        return Err(SurgeonError::Command("split index beyond this commit's fileop count".into()));
    }
    let keep = c.fileops[..k].to_vec();
    let moved = c.fileops[k..].to_vec();
    finish_split(repo, target, keep, moved)
}

/// Splits `target`'s fileops by path: every op whose primary path satisfies
/// `moves` is relocated to the new tail commit, the rest stay on `target`.
/// Relative order within each half is preserved.
pub fn split_by_path(repo: &mut Repository, target: EventId, moves: impl Fn(&BString) -> bool) -> Result<EventId> {
    let Event::Commit(c) = repo.event(target) else {
        return Err(SurgeonError::Command("split target must be a commit".into()));
    };
    let mut keep = Vec::new();
    let mut moved = Vec::new();
    for op in c.fileops.clone() {
        let goes = op.primary_path().is_some_and(&moves);
        if goes {
            moved.push(op);
        } else {
            keep.push(op);
        }
    }
    finish_split(repo, target, keep, moved)
}
