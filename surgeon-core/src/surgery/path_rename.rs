//! Path rename: regex-substitutes every path touched by the selected
//! commits' fileops, refusing to create a same-commit path collision unless
//! told to force it.

use std::collections::HashSet;

use bstr::BString;
use regex::bytes::Regex;

use crate::error::{Result, SurgeonError};
use crate::event::Event;
use crate::repo::Repository;
use crate::selection::Selection;

/// Applies `pattern.replace(path, replacement)` to every path mentioned by
/// each selected commit's fileops. If two ops in the same commit end up
/// naming the same path, the rename is rejected unless `force` is set, in
/// which case the later op (in original order) wins, consistent with
/// fileop canonicalization's last-write rule.
pub fn rename_paths(
    repo: &mut Repository,
    selection: &Selection,
    pattern: &Regex,
    replacement: &[u8],
    force: bool,
) -> Result<()> {
    for id in selection.iter() {
        let Event::Commit(c) = repo.event_mut(id) else { continue };
        let mut seen_targets: HashSet<BString> = HashSet::new();
        let mut renamed = Vec::with_capacity(c.fileops.len());

        for op in c.fileops.clone() {
            let op = op
                .map_paths(|path| {
                    Some(BString::from(pattern.replace(path.as_slice(), replacement).into_owned()))
                })
                .expect("a total replacement closure never drops an op");

            if let Some(target) = op.primary_path() {
                if !force && !seen_targets.insert(target.clone()) {
                    return Err(SurgeonError::Command(format!(
                        "rename collision on {target:?}; pass --force to override"
                    )));
                }
            }
            renamed.push(op);
        }

        c.fileops = renamed;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{Commit, EventId, PersonIdent};
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

    fn mk(repo: &mut Repository, ops: Vec<FileOp>) -> EventId {
        repo.push_event(Event::Commit(Commit {
            branch: "refs/heads/main".into(),
            author: person(),
            author_stamp: stamp(),
            committer: person(),
            committer_stamp: stamp(),
            message: "m".into(),
            parent: None,
            merge_parents: vec![],
            fileops: ops,
            legacy_id: None,
            original_mark: None,
            callouts: vec![],
        }))
    }

    #[test]
    fn rewrites_matching_paths() {
        let mut repo = Repository::new();
        let blob = repo.add_blob("x".into());
        let id = mk(
            &mut repo,
            vec![FileOp::Modify { path: "old/a.txt".into(), mode: FileMode::File, blob }],
        );

        let pattern = Regex::new(r"^old/").unwrap();
        rename_paths(&mut repo, &Selection::single(id), &pattern, b"new/", false).unwrap();

        let c = repo.event(id).as_commit().unwrap();
        assert_eq!(c.fileops[0].primary_path().unwrap(), "new/a.txt");
    }

    #[test]
    fn collision_without_force_errors() {
        let mut repo = Repository::new();
        let blob = repo.add_blob("x".into());
        let id = mk(
            &mut repo,
            vec![
                FileOp::Modify { path: "a.txt".into(), mode: FileMode::File, blob },
                FileOp::Modify { path: "b.txt".into(), mode: FileMode::File, blob },
            ],
        );

        let pattern = Regex::new(r"^[ab]\.txt$").unwrap();
        let err = rename_paths(&mut repo, &Selection::single(id), &pattern, b"merged.txt", false);
        assert!(err.is_err());
    }
}
