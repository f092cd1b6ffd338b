//! Evaluates a parsed selection expression against a [`Repository`].

use std::collections::VecDeque;

use regex::bytes::Regex;

use crate::event::{Event, EventId};
use crate::repo::Repository;

use super::parser::Expr;
use super::Selection;

#[derive(Debug, Clone, thiserror::Error)]
pub enum EvalError {
    #[error("event index {0} out of range")]
    OutOfRange(u64),
    #[error("no event with mark :{0}")]
    NoSuchMark(u64),
    #[error("no event named {0:?}")]
    NoSuchName(String),
    #[error("invalid regex {0:?}: {1}")]
    BadRegex(String, String),
    #[error("unknown function @{0}")]
    UnknownFunc(String),
    #[error("@{0} requires exactly one element in its argument")]
    NotSingleton(String),
}

pub fn eval(expr: &Expr, repo: &Repository) -> Result<Selection, EvalError> {
    match expr {
        Expr::Int(n) => {
            let id = EventId(*n as usize);
            if id.0 >= repo.len() {
                return Err(EvalError::OutOfRange(*n));
            }
            Ok(Selection::single(id))
        }
        Expr::Mark(m) => {
            repo.resolve_mark(*m).map(Selection::single).ok_or(EvalError::NoSuchMark(*m))
        }
        Expr::Name(n) => {
            if let Some(id) = repo.tip(n) {
                return Ok(Selection::single(id));
            }
            if let Some(id) = repo.resolve_legacy_id(n) {
                return Ok(Selection::single(id));
            }
            Err(EvalError::NoSuchName(String::from_utf8_lossy(n).into_owned()))
        }
        Expr::Regex(pattern) => {
            let text = String::from_utf8_lossy(pattern);
            let re = Regex::new(&text)
                .map_err(|e| EvalError::BadRegex(text.into_owned(), e.to_string()))?;
            let ids = (0..repo.len())
                .map(EventId)
                .filter(|id| match repo.event(*id).as_commit() {
                    Some(c) => re.is_match(&c.message),
                    None => false,
                })
                .collect();
            Ok(Selection(ids))
        }
        Expr::Path(path) => {
            let ids = (0..repo.len())
                .map(EventId)
                .filter(|id| match repo.event(*id).as_commit() {
                    Some(c) => c.fileops.iter().any(|op| op.primary_path() == Some(path)),
                    None => false,
                })
                .collect();
            Ok(Selection(ids))
        }
        Expr::Cap(c) => {
            let ids = (0..repo.len())
                .map(EventId)
                .filter(|id| matches_cap(repo, *id, *c))
                .collect();
            Ok(Selection(ids))
        }
        Expr::Range(lo, hi) => {
            let lo = singleton(eval(lo, repo)?, "..")?;
            let hi = singleton(eval(hi, repo)?, "..")?;
            let (lo, hi) = if lo.0 <= hi.0 { (lo, hi) } else { (hi, lo) };
            Ok(Selection((lo.0..=hi.0).map(EventId).collect()))
        }
        Expr::Union(a, b) => Ok(Selection::union(&eval(a, repo)?, &eval(b, repo)?)),
        Expr::Intersect(a, b) => Ok(Selection::intersect(&eval(a, repo)?, &eval(b, repo)?)),
        Expr::Complement(inner) => {
            let sel = eval(inner, repo)?;
            let all = Selection((0..repo.len()).map(EventId).collect());
            Ok(Selection::difference(&all, &sel))
        }
        Expr::Neighbors(inner) => {
            let sel = eval(inner, repo)?;
            let mut ids = sel.0.clone();
            for id in sel.iter() {
                if let Some(c) = repo.event(id).as_commit() {
                    ids.extend(c.parent);
                    ids.extend(c.merge_parents.iter().copied());
                }
                ids.extend(children_of(repo, id));
            }
            Ok(Selection(dedup_sorted(ids)))
        }
        Expr::FuncAll(name) => {
            let all = Selection((0..repo.len()).map(EventId).collect());
            apply_func(name, &all, repo)
        }
        Expr::Func(name, inner) => {
            let sel = eval(inner, repo)?;
            apply_func(name, &sel, repo)
        }
    }
}

fn singleton(sel: Selection, context: &str) -> Result<EventId, EvalError> {
    if sel.len() == 1 {
        Ok(sel.0[0])
    } else {
        Err(EvalError::NotSingleton(context.to_string()))
    }
}

fn matches_cap(repo: &Repository, id: EventId, cap: char) -> bool {
    let event = repo.event(id);
    match cap {
        'C' => matches!(event, Event::Commit(_)),
        'T' => matches!(event, Event::Tag(_)),
        'R' => matches!(event, Event::Reset(_)),
        'P' => matches!(event, Event::Passthrough(_)),
        // Blobs aren't indexed as events in this model (they're addressed
        // out-of-line by `BlobId`, not by event position), so `=B` never
        // matches here; the union law in the selection-set tests accounts
        // for this by omitting blobs from the event universe.
        'B' => false,
        'H' => event.branch().is_some_and(|b| repo.tip(b) == Some(id)),
        'O' => event.as_commit().is_some_and(|c| c.parent.is_none() && c.merge_parents.is_empty()),
        'U' => event.as_commit().is_some_and(|c| !c.callouts.is_empty()),
        'Z' => event.as_commit().is_some_and(|c| c.fileops.is_empty()),
        'M' => event.as_commit().is_some_and(|c| !c.merge_parents.is_empty()),
        'F' => children_of(repo, id).len() > 1,
        'L' => event.as_commit().is_some_and(|c| !c.message.ends_with(b"\n")),
        'I' => event
            .as_commit()
            .is_some_and(|c| std::str::from_utf8(&c.message).is_err()),
        'D' => event.as_commit().is_some_and(|c| {
            !c.fileops.is_empty()
                && c.fileops.iter().all(|op| {
                    matches!(op, crate::fileop::FileOp::Delete { .. } | crate::fileop::FileOp::DeleteAll)
                })
        }),
        'N' => event.as_commit().is_some_and(|c| c.legacy_id.is_some()),
        _ => false,
    }
}

fn children_of(repo: &Repository, parent: EventId) -> Vec<EventId> {
    (0..repo.len())
        .map(EventId)
        .filter(|id| match repo.event(*id).as_commit() {
            Some(c) => c.parent == Some(parent) || c.merge_parents.contains(&parent),
            None => false,
        })
        .collect()
}

fn dedup_sorted(mut ids: Vec<EventId>) -> Vec<EventId> {
    ids.sort_unstable();
    ids.dedup();
    ids
}

fn transitive(repo: &Repository, seeds: &Selection, step: impl Fn(&Repository, EventId) -> Vec<EventId>) -> Selection {
    let mut seen: Vec<EventId> = seeds.0.clone();
    let mut queue: VecDeque<EventId> = seeds.0.iter().copied().collect();
    while let Some(id) = queue.pop_front() {
        for next in step(repo, id) {
            if !seen.contains(&next) {
                seen.push(next);
                queue.push_back(next);
            }
        }
    }
    Selection(dedup_sorted(seen))
}

fn apply_func(name: &str, sel: &Selection, repo: &Repository) -> Result<Selection, EvalError> {
    match name {
        "min" => sel.0.iter().min().copied().map(Selection::single).ok_or(EvalError::NotSingleton("min".into())),
        "max" => sel.0.iter().max().copied().map(Selection::single).ok_or(EvalError::NotSingleton("max".into())),
        "par" => Ok(Selection(dedup_sorted(
            sel.iter()
                .flat_map(|id| match repo.event(id).as_commit() {
                    Some(c) => {
                        let mut v = c.merge_parents.clone();
                        v.extend(c.parent);
                        v
                    }
                    None => vec![],
                })
                .collect(),
        ))),
        "chn" => Ok(Selection(dedup_sorted(sel.iter().flat_map(|id| children_of(repo, id)).collect()))),
        "pre" => Ok(Selection(dedup_sorted(
            sel.iter()
                .filter_map(|id| repo.event(id).as_commit().and_then(|c| c.parent))
                .collect(),
        ))),
        "suc" => Ok(Selection(dedup_sorted(
            sel.iter()
                .flat_map(|id| {
                    children_of(repo, id).into_iter().filter(move |child| {
                        repo.event(*child).as_commit().is_some_and(|c| c.parent == Some(id))
                    })
                })
                .collect(),
        ))),
        "anc" => Ok(transitive(repo, sel, |repo, id| {
            repo.event(id)
                .as_commit()
                .map(|c| {
                    let mut v = c.merge_parents.clone();
                    v.extend(c.parent);
                    v
                })
                .unwrap_or_default()
        })),
        "dsc" => Ok(transitive(repo, sel, |repo, id| children_of(repo, id))),
        // "nonempty -> universe": any nonempty selection expands to
        // the full event universe; an empty selection stays empty.
        "amp" => {
            if sel.is_empty() {
                Ok(sel.clone())
            } else {
                Ok(Selection((0..repo.len()).map(EventId).collect()))
            }
        }
        // `@srt(A)` produces A sorted by index.
        "srt" => {
            let mut ids = sel.0.clone();
            ids.sort_unstable();
            Ok(Selection(ids))
        }
        _ => Err(EvalError::UnknownFunc(name.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{Commit, PersonIdent};
    use crate::fileop::FileOp;
    use crate::ident::ActionStamp;
    use chrono::Utc;

    fn mk_commit(repo: &mut Repository, branch: &str, parent: Option<EventId>, mark: u64) -> EventId {
        let stamp = ActionStamp::new(Utc::now(), "a@example.com");
        let person = PersonIdent { name: "A".into(), email: "a@example.com".into() };
        repo.push_event(Event::Commit(Commit {
            branch: branch.into(),
            author: person.clone(),
            author_stamp: stamp.clone(),
            committer: person,
            committer_stamp: stamp,
            message: "m".into(),
            parent,
            merge_parents: vec![],
            fileops: vec![],
            legacy_id: None,
            original_mark: Some(mark),
            callouts: vec![],
        }))
    }

    #[test]
    fn int_and_range() {
        let mut repo = Repository::new();
        let a = mk_commit(&mut repo, "refs/heads/main", None, 1);
        let b = mk_commit(&mut repo, "refs/heads/main", Some(a), 2);
        let sel = eval(&super::Expr::Range(Box::new(super::Expr::Int(0)), Box::new(super::Expr::Int(1))), &repo).unwrap();
        assert_eq!(sel.0, vec![a, b]);
    }

    #[test]
    fn ancestors_transitive() {
        let mut repo = Repository::new();
        let a = mk_commit(&mut repo, "refs/heads/main", None, 1);
        let b = mk_commit(&mut repo, "refs/heads/main", Some(a), 2);
        let c = mk_commit(&mut repo, "refs/heads/main", Some(b), 3);
        let sel = eval(&super::Expr::Func("anc".into(), Box::new(super::Expr::Int(2))), &repo).unwrap();
        assert_eq!(sel.0, vec![a, b]);
        let _ = c;
    }

    #[test]
    fn cap_letters_select_orphan_and_head() {
        let mut repo = Repository::new();
        let a = mk_commit(&mut repo, "refs/heads/main", None, 1);
        let b = mk_commit(&mut repo, "refs/heads/main", Some(a), 2);
        let orphans = eval(&super::Expr::Cap('O'), &repo).unwrap();
        assert_eq!(orphans.0, vec![a]);
        let heads = eval(&super::Expr::Cap('H'), &repo).unwrap();
        assert_eq!(heads.0, vec![b]);
    }

    #[test]
    fn amp_expands_nonempty_to_universe() {
        let mut repo = Repository::new();
        let a = mk_commit(&mut repo, "refs/heads/main", None, 1);
        let _b = mk_commit(&mut repo, "refs/heads/main", Some(a), 2);
        let sel = eval(&super::Expr::Func("amp".into(), Box::new(super::Expr::Int(0))), &repo).unwrap();
        assert_eq!(sel.len(), 2);
    }
}
