//! Tagify: converts commits that carry no fileops into lightweight
//! annotated tags (or drops them outright, if their message is empty too),
//! rewiring their children onto the nearest surviving ancestor.

use std::collections::HashSet;

use bstr::BString;

use crate::error::Result;
use crate::event::{Event, EventId, Tag};
use crate::repo::Repository;
use crate::selection::Selection;

use super::retarget_children;

fn is_trivial_message(message: &[u8]) -> bool {
    message.trim_ascii_end().is_empty()
}

/// For every selected commit with an empty fileop list: if its message is
/// non-trivial, replaces it in place with an annotated tag pointing at its
/// (former) parent; otherwise drops it entirely. Either way its children
/// are reattached to that parent first, so history downstream of the
/// emptied commit is unaffected.
pub fn tagify_empty_commits(repo: &mut Repository, selection: &Selection) -> Result<()> {
    let mut ids = selection.0.clone();
    ids.sort_unstable();
    ids.dedup();

    let mut to_remove: HashSet<EventId> = HashSet::new();

    for id in ids {
        let Some(c) = repo.event(id).as_commit() else { continue };
        if !c.fileops.is_empty() {
            continue;
        }
        let parent = c.parent;
        let merge_parents = c.merge_parents.clone();
        let message = c.message.clone();
        let legacy_name = c.legacy_id.clone().map(|l| BString::from(l.0));
        let tagger = c.committer.clone();
        let tagger_stamp = c.committer_stamp.clone();

        retarget_children(repo, id, parent, &merge_parents);

        if !is_trivial_message(&message) {
            if let Some(target) = parent {
                let name = legacy_name.unwrap_or_else(|| BString::from(format!("tag-{}", id.0)));
                *repo.event_mut(id) = Event::Tag(Tag {
                    name,
                    target,
                    tagger: Some(tagger),
                    tagger_stamp: Some(tagger_stamp),
                    message,
                    legacy_id: None,
                });
                continue;
            }
        }
        to_remove.insert(id);
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

    fn mk(repo: &mut Repository, parent: Option<EventId>, message: &str, ops: Vec<FileOp>) -> EventId {
        repo.push_event(Event::Commit(Commit {
            branch: "refs/heads/main".into(),
            author: person(),
            author_stamp: stamp(),
            committer: person(),
            committer_stamp: stamp(),
            message: message.into(),
            parent,
            merge_parents: vec![],
            fileops: ops,
            legacy_id: None,
            original_mark: None,
            callouts: vec![],
        }))
    }

    #[test]
    fn empty_trivial_commit_is_dropped() {
        let mut repo = Repository::new();
        let blob = repo.add_blob("x".into());
        let root = mk(&mut repo, None, "init", vec![FileOp::Modify { path: "a".into(), mode: FileMode::File, blob }]);
        let empty = mk(&mut repo, Some(root), "", vec![]);
        let child = mk(&mut repo, Some(empty), "child", vec![]);

        let sel = Selection::single(empty);
        tagify_empty_commits(&mut repo, &sel).unwrap();

        assert_eq!(repo.len(), 2);
        let child = repo.event(EventId(1)).as_commit().unwrap();
        assert_eq!(child.parent, Some(EventId(0)));
        let _ = child;
    }

    #[test]
    fn empty_commit_with_message_becomes_tag() {
        let mut repo = Repository::new();
        let root = mk(&mut repo, None, "init", vec![]);
        let milestone = mk(&mut repo, Some(root), "v1.0", vec![]);

        let sel = Selection::single(milestone);
        tagify_empty_commits(&mut repo, &sel).unwrap();

        assert_eq!(repo.len(), 2);
        let Event::Tag(tag) = repo.event(milestone) else { panic!("expected tag") };
        assert_eq!(tag.target, root);
        assert_eq!(tag.message, "v1.0");
    }
}
