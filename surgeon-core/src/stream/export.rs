use bstr::BString;

use crate::event::{BlobId, Event, EventId};
use crate::repo::Repository;

use fast_export::{self as fe, Command, Commented};

/// Serializes a [`Repository`] back into a fast-import command sequence,
/// assigning fresh marks to every blob and commit in event order. Blobs are
/// only emitted the first time they're referenced, so a deduped repository
/// (see [`Repository::dedup`]) produces a stream with one `blob` per
/// distinct content.
#[must_use]
pub fn export(repo: &Repository) -> Vec<Command> {
    let mut out = Vec::new();
    let mut next_mark = 1u64;
    let mut blob_marks: std::collections::HashMap<BlobId, u64> = std::collections::HashMap::new();
    let mut event_marks: std::collections::HashMap<EventId, u64> = std::collections::HashMap::new();

    for (idx, event) in repo.events.iter().enumerate() {
        let id = EventId(idx);
        match event {
            Event::Commit(c) => {
                for op in &c.fileops {
                    let blob = match op {
                        crate::fileop::FileOp::Modify { blob, .. }
                        | crate::fileop::FileOp::Note { blob, .. } => Some(*blob),
                        _ => None,
                    };
                    if let Some(blob) = blob {
                        if !blob_marks.contains_key(&blob) {
                            let mark = next_mark;
                            next_mark += 1;
                            blob_marks.insert(blob, mark);
                            out.push(blob_command(repo, blob, mark));
                        }
                    }
                }

                let mark = next_mark;
                next_mark += 1;
                event_marks.insert(id, mark);

                let from = c.parent.map(|p| mark_commitish(event_marks[&p]));
                let merge =
                    c.merge_parents.iter().map(|p| mark_commitish(event_marks[p])).collect();
                let fileops = c
                    .fileops
                    .iter()
                    .map(|op| raise_fileop(op, &blob_marks))
                    .collect();

                out.push(Command::Commit(Commented::wrap(fe::Commit {
                    branch: c.branch.clone(),
                    mark: Some(fe::Mark { mark }),
                    original_oid: None,
                    author: Some(person_ident(&c.author, &c.author_stamp)),
                    committer: person_ident(&c.committer, &c.committer_stamp),
                    encoding: None,
                    message: c.message.clone(),
                    from,
                    merge,
                    fileops,
                })));
            }
            Event::Tag(t) => {
                let from = mark_commitish(event_marks[&t.target]);
                let tagger = t
                    .tagger
                    .as_ref()
                    .zip(t.tagger_stamp.as_ref())
                    .map(|(p, s)| person_ident(p, s));
                out.push(Command::Tag(Commented::wrap(fe::Tag {
                    name: t.name.clone(),
                    from,
                    tagger,
                    message: t.message.clone(),
                })));
            }
            Event::Reset(r) => {
                let from = r.target.map(|t| mark_commitish(event_marks[&t]));
                out.push(Command::Reset(Commented::wrap(fe::Reset {
                    refname: r.branch.clone(),
                    from,
                })));
            }
            Event::Passthrough(p) => {
                out.push(Command::Passthrough(p.text.clone()));
            }
        }
    }

    out.push(Command::Done(Commented::wrap(fe::Done::Explicit)));
    out
}

fn blob_command(repo: &Repository, id: BlobId, mark: u64) -> Command {
    let content = repo.blob(id).content.clone();
    Command::Blob(Commented::wrap(fe::Blob {
        mark: Some(fe::Mark { mark }),
        original_oid: None,
        data: fe::CountedData::new(content.into_vec()).into(),
    }))
}

fn mark_commitish(mark: u64) -> fe::Commitish {
    fe::Commitish::Mark(fe::Mark { mark })
}

fn person_ident(person: &crate::event::PersonIdent, stamp: &crate::ident::ActionStamp) -> fe::PersonIdent {
    let date: BString = format!("{} +0000", stamp.timestamp.timestamp()).into();
    fe::PersonIdent { name: person.name.clone(), email: person.email.clone(), date }
}

fn raise_fileop(
    op: &crate::fileop::FileOp,
    blob_marks: &std::collections::HashMap<BlobId, u64>,
) -> fe::FileOp {
    use crate::fileop::FileOp as Op;
    match op {
        Op::Modify { path, mode, blob } => fe::FileOp::Modify {
            mode: *mode,
            dataref: fe::DataRef::Mark(fe::Mark { mark: blob_marks[blob] }),
            path: path.clone(),
        },
        Op::Delete { path } => fe::FileOp::Delete { path: path.clone() },
        Op::Rename { source, target } => {
            fe::FileOp::Rename { source: source.clone(), target: target.clone() }
        }
        Op::Copy { source, target } => {
            fe::FileOp::Copy { source: source.clone(), target: target.clone() }
        }
        Op::Note { path, blob } => fe::FileOp::Note {
            dataref: fe::DataRef::Mark(fe::Mark { mark: blob_marks[blob] }),
            commit: path.clone(),
        },
        Op::DeleteAll => fe::FileOp::DeleteAll,
    }
}
