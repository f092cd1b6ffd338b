use std::collections::HashMap;

use bstr::{BString, ByteSlice};
use chrono::{DateTime, Utc};

use crate::error::{Result, SurgeonError};
use crate::event::{BlobId, Commit, Event, EventId, PersonIdent, Reset, Tag};
use crate::ident::ActionStamp;
use crate::repo::Repository;

use fast_export::{self as fe, Command};

/// Builds a [`Repository`] from a parsed fast-import stream. Marks are
/// resolved as they're encountered; a `from`/`merge`/fileop referencing a
/// mark not yet defined is an error, matching fast-import's own
/// single-pass contract.
pub fn import(commands: Vec<Command>) -> Result<Repository> {
    let mut repo = Repository::new();
    let mut mark_to_blob: HashMap<u64, BlobId> = HashMap::new();
    let mut mark_to_event: HashMap<u64, EventId> = HashMap::new();

    for command in commands {
        match command {
            Command::Blob(c) => {
                let blob = c.value;
                let content = match blob.data {
                    fe::Data::Counted(d) => BString::from(d.data),
                    fe::Data::Delimited(d) => BString::from(d.into_data()),
                };
                let id = repo.add_blob(content);
                if let Some(mark) = blob.mark {
                    mark_to_blob.insert(mark.mark, id);
                }
            }
            Command::Commit(c) => {
                let wire = c.value;
                let committer = person_from_wire(&wire.committer)?;
                let committer_stamp = ActionStamp::new(committer.0, wire.committer.email.clone());
                let author = match &wire.author {
                    Some(a) => person_from_wire(a)?,
                    None => (committer_stamp.timestamp, PersonIdent {
                        name: wire.committer.name.clone(),
                        email: wire.committer.email.clone(),
                    }),
                };
                let author_stamp = ActionStamp::new(author.0, author.1.email.clone());

                let parent = match &wire.from {
                    Some(from) => Some(resolve_commitish(from, &mark_to_event, &repo)?),
                    None => None,
                };
                let merge_parents = wire
                    .merge
                    .iter()
                    .map(|m| resolve_commitish(m, &mark_to_event, &repo))
                    .collect::<Result<Vec<_>>>()?;

                let fileops = wire
                    .fileops
                    .into_iter()
                    .filter_map(|op| lower_fileop(op, &mark_to_blob))
                    .collect::<Result<Vec<_>>>()?;

                let commit = Commit {
                    branch: wire.branch,
                    author: author.1,
                    author_stamp,
                    committer: committer.1,
                    committer_stamp,
                    message: wire.message,
                    parent,
                    merge_parents,
                    fileops,
                    legacy_id: None,
                    original_mark: wire.mark.map(|m| m.mark),
                    callouts: vec![],
                };
                let id = repo.push_event(Event::Commit(commit));
                if let Some(mark) = wire.mark {
                    mark_to_event.insert(mark.mark, id);
                }
            }
            Command::Tag(c) => {
                let wire = c.value;
                let target = resolve_commitish(&wire.from, &mark_to_event, &repo)?;
                let (tagger_stamp, tagger) = match wire.tagger {
                    Some(t) => {
                        let (ts, person) = person_from_wire(&t)?;
                        (Some(ActionStamp::new(ts, person.email.clone())), Some(person))
                    }
                    None => (None, None),
                };
                repo.push_event(Event::Tag(Tag {
                    name: wire.name,
                    target,
                    tagger,
                    tagger_stamp,
                    message: wire.message,
                    legacy_id: None,
                }));
            }
            Command::Reset(c) => {
                let wire = c.value;
                let target = match &wire.from {
                    Some(from) => Some(resolve_commitish(from, &mark_to_event, &repo)?),
                    None => None,
                };
                repo.push_event(Event::Reset(Reset { branch: wire.refname, target }));
            }
            // Checkpoint/Done/Progress/Feature/Option/Passthrough carry no
            // history-graph content; they're re-synthesized (or dropped,
            // for Done) on export rather than stored as events.
            Command::Checkpoint(_)
            | Command::Done(_)
            | Command::Progress(_)
            | Command::Feature(_)
            | Command::Option(_)
            | Command::Passthrough(_) => {}
        }
    }

    Ok(repo)
}

fn person_from_wire(p: &fe::PersonIdent) -> Result<(DateTime<Utc>, PersonIdent)> {
    let ts = parse_raw_date(&p.date)?;
    Ok((ts, PersonIdent { name: p.name.clone(), email: p.email.clone() }))
}

/// Parses fast-import's `<unix-seconds> <tz-offset>` raw date format.
/// `--date-format=raw` is the only format this workspace writes or
/// expects to read; `rfc2822`/`now` are normalized away by the exporting
/// VCS before the stream reaches here.
fn parse_raw_date(raw: &[u8]) -> Result<DateTime<Utc>> {
    let text = raw.to_str().map_err(|_| SurgeonError::Parse("non-UTF-8 date".into()))?;
    let seconds = text
        .split_whitespace()
        .next()
        .ok_or_else(|| SurgeonError::Parse(format!("empty date: {text:?}")))?;
    let secs: i64 = seconds
        .parse()
        .map_err(|_| SurgeonError::Parse(format!("invalid date seconds: {seconds:?}")))?;
    DateTime::from_timestamp(secs, 0)
        .ok_or_else(|| SurgeonError::Parse(format!("date out of range: {secs}")))
}

fn resolve_commitish(
    commitish: &fe::Commitish,
    mark_to_event: &HashMap<u64, EventId>,
    repo: &Repository,
) -> Result<EventId> {
    match commitish {
        fe::Commitish::Mark(m) => mark_to_event
            .get(&m.mark)
            .copied()
            .ok_or_else(|| SurgeonError::UnresolvedReference(format!(":{}", m.mark).into())),
        fe::Commitish::BranchOrOid(b) => repo
            .tip(b)
            .ok_or_else(|| SurgeonError::UnresolvedReference(b.clone())),
    }
}

fn lower_fileop(
    op: fe::FileOp,
    mark_to_blob: &HashMap<u64, BlobId>,
) -> Option<Result<crate::fileop::FileOp>> {
    use crate::fileop::FileOp as Op;
    match op {
        fe::FileOp::Modify { mode, dataref, path } => {
            let blob = match dataref {
                fe::DataRef::Mark(m) => match mark_to_blob.get(&m.mark) {
                    Some(b) => *b,
                    None => {
                        return Some(Err(SurgeonError::UnresolvedReference(
                            format!(":{}", m.mark).into(),
                        )))
                    }
                },
                fe::DataRef::Inline(_) | fe::DataRef::Oid(_) => {
                    return Some(Err(SurgeonError::Command(
                        "inline and oid filemodify dataref not supported on import".into(),
                    )))
                }
            };
            Some(Ok(Op::Modify { path, mode, blob }))
        }
        fe::FileOp::Delete { path } => Some(Ok(Op::Delete { path })),
        fe::FileOp::Rename { source, target } => Some(Ok(Op::Rename { source, target })),
        fe::FileOp::Copy { source, target } => Some(Ok(Op::Copy { source, target })),
        fe::FileOp::DeleteAll => Some(Ok(Op::DeleteAll)),
        fe::FileOp::Note { dataref, commit } => {
            let blob = match dataref {
                fe::DataRef::Mark(m) => match mark_to_blob.get(&m.mark) {
                    Some(b) => *b,
                    None => {
                        return Some(Err(SurgeonError::UnresolvedReference(
                            format!(":{}", m.mark).into(),
                        )))
                    }
                },
                fe::DataRef::Inline(_) | fe::DataRef::Oid(_) => {
                    return Some(Err(SurgeonError::Command(
                        "inline and oid note dataref not supported on import".into(),
                    )))
                }
            };
            Some(Ok(Op::Note { path: commit, blob }))
        }
    }
}

#[cfg(test)]
mod tests {
    use fast_export::{Dump, FileMode};

    use crate::event::{Commit, Event, PersonIdent};
    use crate::fileop::FileOp;
    use crate::ident::ActionStamp;
    use crate::repo::Repository;
    use crate::stream::export;

    use super::import;

    #[test]
    fn note_fileop_survives_export_then_import() {
        let mut repo = Repository::new();
        let content_blob = repo.add_blob("hello".into());
        let note_blob = repo.add_blob("this commit needs review".into());

        let person = PersonIdent { name: "Dev".into(), email: "dev@example.com".into() };
        let stamp = ActionStamp::new(chrono::Utc::now(), "dev@example.com");
        let id = repo.push_event(Event::Commit(Commit {
            branch: "refs/heads/master".into(),
            author: person.clone(),
            author_stamp: stamp.clone(),
            committer: person,
            committer_stamp: stamp,
            message: "add a".into(),
            parent: None,
            merge_parents: vec![],
            fileops: vec![
                FileOp::Modify { path: "a.txt".into(), mode: FileMode::File, blob: content_blob },
                FileOp::Note { path: "refs/heads/master".into(), blob: note_blob },
            ],
            legacy_id: None,
            original_mark: None,
            callouts: vec![],
        }));

        let commands = export::export(&repo);
        let mut wire = Vec::new();
        for command in &commands {
            command.dump(&mut wire).unwrap();
        }

        let parsed = fast_export::Parser::new(wire.as_slice()).parse_all().unwrap();
        let reimported = import(parsed).unwrap();

        let commit = reimported.event(id).as_commit().unwrap();
        assert_eq!(commit.fileops.len(), 2, "the note fileop must not be silently dropped");
        let note = commit
            .fileops
            .iter()
            .find(|op| matches!(op, FileOp::Note { .. }))
            .expect("note fileop survives the round trip");
        if let FileOp::Note { path, blob } = note {
            assert_eq!(path, "refs/heads/master");
            assert_eq!(reimported.blob(*blob).content, "this commit needs review");
        }
    }
}
