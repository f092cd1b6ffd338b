//! Coalesce: merges runs of adjacent single-parent, single-child commits on
//! the same branch whose author and message agree and whose timestamps sit
//! within the configured window, collapsing each run into its first commit.

use std::time::Duration;

use bstr::ByteSlice;

use crate::error::Result;
use crate::event::{Event, EventId};
use crate::repo::Repository;
use crate::selection::Selection;

use super::canonicalize::canonicalize_ops;

#[derive(Clone, Debug)]
pub struct CoalesceOptions {
    pub window: Duration,
    /// Collapse a run even when messages differ, as long as every commit
    /// but the first carries the empty "changelog" message and touches only
    /// a `ChangeLog`-style path. Mirrors the cvs2svn/reposurgeon convention
    /// of folding changelog-only commits into the substantive commit that
    /// preceded them.
    pub changelog: bool,
}

impl Default for CoalesceOptions {
    fn default() -> Self {
        CoalesceOptions { window: Duration::from_secs(90), changelog: false }
    }
}

fn children_of(repo: &Repository, parent: EventId) -> Vec<EventId> {
    (0..repo.len())
        .map(EventId)
        .filter(|id| match repo.event(*id).as_commit() {
            Some(c) => c.parent == Some(parent) && c.merge_parents.is_empty(),
            None => false,
        })
        .collect()
}

fn is_changelog_only(repo: &Repository, id: EventId) -> bool {
    let Some(c) = repo.event(id).as_commit() else { return false };
    let trivial_message = c.message.trim_ascii_end().is_empty();
    let single_changelog_op = c.fileops.len() == 1
        && c.fileops[0].primary_path().is_some_and(|p| p.ends_with_str("ChangeLog"));
    trivial_message && single_changelog_op
}

fn eligible(repo: &Repository, head: EventId, next: EventId, opts: &CoalesceOptions) -> bool {
    let Some(h) = repo.event(head).as_commit() else { return false };
    let Some(n) = repo.event(next).as_commit() else { return false };

    if n.parent != Some(head) || !n.merge_parents.is_empty() {
        return false;
    }
    if children_of(repo, head).len() != 1 {
        return false;
    }
    if h.branch != n.branch {
        return false;
    }

    let gap = (n.committer_stamp.timestamp - h.committer_stamp.timestamp)
        .abs()
        .to_std()
        .unwrap_or(Duration::MAX);
    if gap > opts.window {
        return false;
    }

    if opts.changelog && is_changelog_only(repo, next) {
        return true;
    }

    h.committer.email == n.committer.email && h.message == n.message
}

/// Walks `selection` in index order, folding each commit into its
/// predecessor while `eligible` holds. Only commits actually named in
/// `selection` are considered as run members; a gap in the selection breaks
/// the run even if the underlying commits would otherwise qualify.
pub fn coalesce(repo: &mut Repository, selection: &Selection, opts: &CoalesceOptions) -> Result<()> {
    let mut ids = selection.0.clone();
    ids.sort_unstable();
    ids.dedup();

    let mut to_remove = std::collections::HashSet::new();
    let mut head: Option<EventId> = None;

    for id in ids {
        match head {
            None => head = Some(id),
            Some(h) if !to_remove.contains(&h) && eligible(repo, h, id, opts) => {
                let folded = repo.event(id).as_commit().unwrap().clone();
                let folded_message = if opts.changelog && is_changelog_only(repo, id) {
                    None
                } else {
                    Some(folded.message.clone())
                };

                let heirs = children_of(repo, id);

                if let Event::Commit(head_commit) = repo.event_mut(h) {
                    let mut combined = std::mem::take(&mut head_commit.fileops);
                    combined.extend(folded.fileops);
                    canonicalize_ops(&mut combined);
                    head_commit.fileops = combined;
                    if let Some(message) = folded_message {
                        head_commit.message = message;
                    }
                    head_commit.committer_stamp = folded.committer_stamp;
                }

                for heir in heirs {
                    if let Event::Commit(child) = repo.event_mut(heir) {
                        if child.parent == Some(id) {
                            child.parent = Some(h);
                        }
                        for p in &mut child.merge_parents {
                            if *p == id {
                                *p = h;
                            }
                        }
                    }
                }

                to_remove.insert(id);
                // `head` stays `h`: the run continues from the same survivor.
            }
            Some(_) => head = Some(id),
        }
    }

    if !to_remove.is_empty() {
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

    fn person(email: &str) -> PersonIdent {
        PersonIdent { name: "A".into(), email: email.into() }
    }

    fn mk(
        repo: &mut Repository,
        parent: Option<EventId>,
        email: &str,
        message: &str,
        path: &str,
        at: chrono::DateTime<Utc>,
    ) -> EventId {
        let blob = repo.add_blob(path.into());
        let stamp = ActionStamp::new(at, email);
        repo.push_event(Event::Commit(Commit {
            branch: "refs/heads/main".into(),
            author: person(email),
            author_stamp: stamp.clone(),
            committer: person(email),
            committer_stamp: stamp,
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
    fn folds_matching_adjacent_commits_within_window() {
        let mut repo = Repository::new();
        let t0 = Utc::now();
        let a = mk(&mut repo, None, "a@example.com", "same message", "a", t0);
        let b = mk(
            &mut repo,
            Some(a),
            "a@example.com",
            "same message",
            "b",
            t0 + chrono::Duration::seconds(10),
        );

        let sel = Selection(vec![a, b]);
        coalesce(&mut repo, &sel, &CoalesceOptions::default()).unwrap();

        assert_eq!(repo.len(), 1);
        let survivor = repo.event(EventId(0)).as_commit().unwrap();
        assert_eq!(survivor.fileops.len(), 2);
    }

    #[test]
    fn leaves_commits_outside_window_untouched() {
        let mut repo = Repository::new();
        let t0 = Utc::now();
        let a = mk(&mut repo, None, "a@example.com", "same message", "a", t0);
        let b = mk(
            &mut repo,
            Some(a),
            "a@example.com",
            "same message",
            "b",
            t0 + chrono::Duration::seconds(200),
        );

        let sel = Selection(vec![a, b]);
        coalesce(&mut repo, &sel, &CoalesceOptions::default()).unwrap();

        assert_eq!(repo.len(), 2);
    }
}
