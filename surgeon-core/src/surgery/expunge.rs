//! Expunge: drops fileops whose path matches (or, inverted, doesn't match)
//! a pattern from every selected commit, then tagifies whatever commits
//! that left empty.

use regex::bytes::Regex;

use crate::error::Result;
use crate::event::Event;
use crate::fileop::FileOp;
use crate::repo::Repository;
use crate::selection::Selection;

use super::tagify::tagify_empty_commits;

/// Removes fileops whose path matches `pattern` from each commit in
/// `selection`. With `invert`, keeps only matching ops and drops the rest
/// (the `~pattern` form of the command). Commits left with no fileops are
/// handed to [`tagify_empty_commits`] so a gutted commit with a real
/// message still leaves a marker rather than vanishing silently.
pub fn expunge(repo: &mut Repository, selection: &Selection, pattern: &Regex, invert: bool) -> Result<()> {
    for id in selection.iter() {
        let Event::Commit(c) = repo.event_mut(id) else { continue };
        let ops = std::mem::take(&mut c.fileops);
        c.fileops = ops
            .into_iter()
            .filter_map(|op| {
                op.map_paths(|path| {
                    let matches = pattern.is_match(path.as_slice());
                    let drop = matches != invert;
                    if drop {
                        None
                    } else {
                        Some(path.clone())
                    }
                })
            })
            .collect::<Vec<FileOp>>();
    }

    tagify_empty_commits(repo, selection)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{Commit, EventId, PersonIdent};
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
    fn drops_matching_ops() {
        let mut repo = Repository::new();
        let blob = repo.add_blob("x".into());
        let id = mk(
            &mut repo,
            vec![
                FileOp::Modify { path: "secret.key".into(), mode: FileMode::File, blob },
                FileOp::Modify { path: "readme".into(), mode: FileMode::File, blob },
            ],
        );

        let pattern = Regex::new(r"\.key$").unwrap();
        expunge(&mut repo, &Selection::single(id), &pattern, false).unwrap();

        let c = repo.event(id).as_commit().unwrap();
        assert_eq!(c.fileops.len(), 1);
        assert_eq!(c.fileops[0].primary_path().unwrap(), "readme");
    }

    #[test]
    fn inverted_keeps_only_matching_ops() {
        let mut repo = Repository::new();
        let blob = repo.add_blob("x".into());
        let id = mk(
            &mut repo,
            vec![
                FileOp::Modify { path: "vendor/lib.c".into(), mode: FileMode::File, blob },
                FileOp::Modify { path: "readme".into(), mode: FileMode::File, blob },
            ],
        );

        let pattern = Regex::new(r"^vendor/").unwrap();
        expunge(&mut repo, &Selection::single(id), &pattern, true).unwrap();

        let c = repo.event(id).as_commit().unwrap();
        assert_eq!(c.fileops.len(), 1);
        assert_eq!(c.fileops[0].primary_path().unwrap(), "vendor/lib.c");
    }
}
