//! Squash and delete: folds a set of commits out of history, transporting
//! their fileops onto a surviving neighbor and re-parenting their children.

use std::collections::HashSet;

use bstr::BString;

use crate::error::Result;
use crate::event::{Event, EventId, Tag};
use crate::repo::Repository;
use crate::selection::Selection;

use super::canonicalize::canonicalize_ops;
use super::{children_of, retarget_children};

/// Which neighbor absorbs a squashed commit's fileops.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    /// Compose onto each child (the commit's changes become part of
    /// whatever the child already did). Used by plain `squash`.
    PushForward,
    /// Compose onto the parent instead (the commit's changes become part of
    /// what came before it). Used by `squash --back` and by `delete`, which
    /// typically wants the removed commit's content absorbed upstream.
    PushBack,
}

#[derive(Clone, Debug)]
pub struct SquashPolicy {
    pub direction: Direction,
    /// If the squashed commit's message is non-trivial, replace it with a
    /// lightweight annotated tag on its surviving parent rather than
    /// dropping the message outright.
    pub tagify: bool,
}

impl Default for SquashPolicy {
    fn default() -> Self {
        SquashPolicy { direction: Direction::PushForward, tagify: true }
    }
}

fn is_trivial_message(message: &[u8]) -> bool {
    let trimmed = message.trim_ascii_end();
    trimmed.is_empty() || trimmed == b"empty log message"
}

/// Squashes or deletes every commit in `selection`. Commits are processed in
/// index order, which is always a valid topological order since a commit's
/// index is guaranteed to exceed every one of its parents'.
pub fn squash(repo: &mut Repository, selection: &Selection, policy: &SquashPolicy) -> Result<()> {
    let mut order = selection.0.clone();
    order.sort_unstable();
    order.dedup();

    let mut to_remove: HashSet<EventId> = HashSet::new();

    for id in order {
        let Some(c) = repo.event(id).as_commit() else { continue };
        let parent = c.parent;
        let octopus_parents = c.merge_parents.clone();
        let ops = c.fileops.clone();
        let message = c.message.clone();
        let legacy_name = c.legacy_id.clone().map(|l| BString::from(l.0));
        let tagger = c.committer.clone();
        let tagger_stamp = c.committer_stamp.clone();

        let heirs = children_of(repo, id);

        if policy.direction == Direction::PushForward {
            for &child_id in &heirs {
                if let Event::Commit(child) = repo.event_mut(child_id) {
                    let mut combined = ops.clone();
                    combined.append(&mut child.fileops);
                    canonicalize_ops(&mut combined);
                    child.fileops = combined;
                }
            }
        }

        retarget_children(repo, id, parent, &octopus_parents);

        if policy.direction == Direction::PushBack {
            if let Some(parent_id) = parent {
                if let Event::Commit(target) = repo.event_mut(parent_id) {
                    let mut combined = std::mem::take(&mut target.fileops);
                    combined.extend(ops);
                    canonicalize_ops(&mut combined);
                    target.fileops = combined;
                }
            }
        }

        let keep_as_tag = policy.tagify && !is_trivial_message(&message);
        if keep_as_tag && parent.is_some() {
            let target = parent.unwrap();
            let name = legacy_name.unwrap_or_else(|| BString::from(format!("squashed-{}", id.0)));
            *repo.event_mut(id) = Event::Tag(Tag {
                name,
                target,
                tagger: Some(tagger),
                tagger_stamp: Some(tagger_stamp),
                message,
                legacy_id: None,
            });
        } else {
            to_remove.insert(id);
        }
    }

    if to_remove.is_empty() {
        repo.reindex();
    } else {
        repo.remove_events(&to_remove);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{Commit, PersonIdent};
    use crate::fileop::FileOp;
    use crate::ident::ActionStamp;
    use chrono::Utc;
    use fast_export::FileMode;

    fn stamp() -> ActionStamp {
        ActionStamp::new(Utc::now(), "a@example.com")
    }

    fn person() -> PersonIdent {
        PersonIdent { name: "A".into(), email: "a@example.com".into() }
    }

    fn mk(
        repo: &mut Repository,
        parent: Option<EventId>,
        path: &str,
        blob: crate::event::BlobId,
        message: &str,
    ) -> EventId {
        repo.push_event(Event::Commit(Commit {
            branch: "refs/heads/main".into(),
            author: person(),
            author_stamp: stamp(),
            committer: person(),
            committer_stamp: stamp(),
            message: message.into(),
            parent,
            merge_parents: vec![],
            fileops: vec![FileOp::Modify { path: path.into(), mode: FileMode::File, blob }],
            legacy_id: None,
            original_mark: None,
            callouts: vec![],
        }))
    }

    #[test]
    fn push_forward_transports_ops_and_removes_trivial_message() {
        let mut repo = Repository::new();
        let blob = repo.add_blob("x".into());
        let a = mk(&mut repo, None, "a", blob, "");
        let b = mk(&mut repo, Some(a), "b", blob, "keep me");

        let policy = SquashPolicy { direction: Direction::PushForward, tagify: true };
        squash(&mut repo, &Selection::single(a), &policy).unwrap();

        assert_eq!(repo.len(), 1);
        let Event::Commit(surv) = repo.event(EventId(0)) else { panic!("expected commit") };
        assert!(surv.parent.is_none());
        assert!(surv.fileops.iter().any(|op| op.primary_path().is_some_and(|p| p == "a")));
        assert!(surv.fileops.iter().any(|op| op.primary_path().is_some_and(|p| p == "b")));
        let _ = b;
    }

    #[test]
    fn nontrivial_message_becomes_tag_when_tagify_enabled() {
        let mut repo = Repository::new();
        let blob = repo.add_blob("x".into());
        let a = mk(&mut repo, None, "a", blob, "");
        let b = mk(&mut repo, Some(a), "b", blob, "a real change");

        let policy = SquashPolicy { direction: Direction::PushBack, tagify: true };
        squash(&mut repo, &Selection::single(b), &policy).unwrap();

        assert_eq!(repo.len(), 2);
        assert!(matches!(repo.event(EventId(1)), Event::Tag(_)));
        let Event::Commit(surv) = repo.event(EventId(0)) else { panic!("expected commit") };
        assert!(surv.fileops.iter().any(|op| op.primary_path().is_some_and(|p| p == "b")));
    }
}
