//! Reparent: rewires the last selected commit onto the others as its new
//! parents, rebuilding its tree content unless told not to.

use bstr::BString;
use fast_export::FileMode;

use crate::error::{Result, SurgeonError};
use crate::event::Event;
use crate::fileop::FileOp;
use crate::repo::Repository;
use crate::selection::Selection;

/// Given a selection `p1, p2, ..., pn, c` (in selection order), makes `c`'s
/// parent `p1` and its remaining merge parents `p2..pn`. Unless `rebase` is
/// set, prepends a `deleteall` plus a full reconstruction of `c`'s original
/// tree so its content is unchanged even though its ancestry now is.
pub fn reparent(repo: &mut Repository, selection: &Selection, rebase: bool) -> Result<()> {
    let ids = &selection.0;
    if ids.len() < 2 {
        return Err(SurgeonError::Command(
            "reparent needs at least two selected commits: new parents, then the child".into(),
        ));
    }
    let (parents, child_slice) = ids.split_at(ids.len() - 1);
    let child = child_slice[0];

    if repo.event(child).as_commit().is_none() {
        return Err(SurgeonError::Command("reparent's last selected event must be a commit".into()));
    }
    for p in parents {
        if repo.event(*p).as_commit().is_none() {
            return Err(SurgeonError::Command("reparent's parent events must be commits".into()));
        }
    }

    let original_tree = if rebase { None } else { Some(repo.manifest(child)) };

    let Event::Commit(c) = repo.event_mut(child) else { unreachable!() };
    c.parent = Some(parents[0]);
    c.merge_parents = parents[1..].to_vec();

    if let Some(tree) = original_tree {
        let mut rebuilt = vec![FileOp::DeleteAll];
        rebuilt.extend(tree.iter().map(|(path, blob)| FileOp::Modify {
            path: BString::from(path),
            mode: FileMode::File,
            blob: *blob,
        }));
        let Event::Commit(c) = repo.event_mut(child) else { unreachable!() };
        c.fileops = rebuilt;
    }

    repo.reindex();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{Commit, EventId, PersonIdent};
    use crate::ident::ActionStamp;
    use chrono::Utc;

    fn stamp() -> ActionStamp {
        ActionStamp::new(Utc::now(), "a@example.com")
    }

    fn person() -> PersonIdent {
        PersonIdent { name: "A".into(), email: "a@example.com".into() }
    }

    fn mk(repo: &mut Repository, parent: Option<EventId>, path: &str, blob: crate::event::BlobId) -> EventId {
        repo.push_event(Event::Commit(Commit {
            branch: "refs/heads/main".into(),
            author: person(),
            author_stamp: stamp(),
            committer: person(),
            committer_stamp: stamp(),
            message: "m".into(),
            parent,
            merge_parents: vec![],
            fileops: vec![FileOp::Modify { path: path.into(), mode: FileMode::File, blob }],
            legacy_id: None,
            original_mark: None,
            callouts: vec![],
        }))
    }

    #[test]
    fn rewires_parent_and_rebuilds_tree() {
        let mut repo = Repository::new();
        let b1 = repo.add_blob("one".into());
        let b2 = repo.add_blob("two".into());
        let old_parent = mk(&mut repo, None, "old", b1);
        let new_parent = mk(&mut repo, None, "new", b2);
        let child = mk(&mut repo, Some(old_parent), "child", b1);

        let sel = Selection(vec![new_parent, child]);
        reparent(&mut repo, &sel, false).unwrap();

        let c = repo.event(child).as_commit().unwrap();
        assert_eq!(c.parent, Some(new_parent));
        assert!(c.merge_parents.is_empty());
        assert!(matches!(c.fileops[0], FileOp::DeleteAll));
        assert!(c.fileops.iter().any(|op| op.primary_path().is_some_and(|p| p == "child")));
    }

    #[test]
    fn rebase_skips_tree_rebuild() {
        let mut repo = Repository::new();
        let b1 = repo.add_blob("one".into());
        let old_parent = mk(&mut repo, None, "old", b1);
        let new_parent = mk(&mut repo, None, "new", b1);
        let child = mk(&mut repo, Some(old_parent), "child", b1);

        let sel = Selection(vec![new_parent, child]);
        reparent(&mut repo, &sel, true).unwrap();

        let c = repo.event(child).as_commit().unwrap();
        assert_eq!(c.fileops.len(), 1);
        assert!(!matches!(c.fileops[0], FileOp::DeleteAll));
    }
}
