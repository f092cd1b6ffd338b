//! Parser for the `git fast-import` stream format.
//!
//! The grammar is line-oriented except for `data` payloads, so this reads one
//! logical line at a time with [`BufRead::read_until`] and only switches to
//! raw byte reads while consuming a `data N` block. Lines the parser does not
//! recognize become [`Command::Passthrough`], so no input line is ever
//! silently dropped.

use std::io::{self, BufRead, Read};

use bstr::{BString, ByteSlice};
use thiserror::Error;

use crate::ast::*;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("unterminated `data` block: expected {0} more bytes")]
    UnterminatedCountedData(u64),
    #[error("unterminated delimited `data` block: missing closing delimiter")]
    UnterminatedDelimitedData,
    #[error("invalid `data` header: {0:?}")]
    InvalidDataHeader(BString),
    #[error("invalid mark: {0:?}")]
    InvalidMark(BString),
    #[error("invalid person identity line: {0:?}")]
    InvalidPersonIdent(BString),
    #[error("invalid file mode: {0:?}")]
    InvalidFileMode(BString),
    #[error("`commit` command missing a branch name")]
    MissingBranch,
}

type PResult<T> = Result<T, ParseError>;

pub struct Parser<R> {
    reader: R,
    /// Scratch buffer for the current line, reused between calls.
    line: Vec<u8>,
    eof: bool,
}

impl<R: BufRead> Parser<R> {
    pub fn new(reader: R) -> Self {
        Parser {
            reader,
            line: Vec::new(),
            eof: false,
        }
    }

    /// Parses the entire stream into a list of commands, in stream order.
    pub fn parse_all(mut self) -> PResult<Vec<Command>> {
        let mut commands = Vec::new();
        while let Some(command) = self.parse_next()? {
            commands.push(command);
        }
        commands.push(Command::Done(Commented::wrap(Done::Eof)));
        Ok(commands)
    }

    /// Parses the next top-level command, or `None` at end of stream.
    pub fn parse_next(&mut self) -> PResult<Option<Command>> {
        let mut comment_text = Vec::new();
        loop {
            let Some(line) = self.read_line()? else {
                return Ok(None);
            };
            if line.is_empty() {
                continue;
            }
            if let Some(rest) = line.strip_prefix(b"#") {
                comment_text.extend_from_slice(rest);
                comment_text.push(b'\n');
                continue;
            }
            let comments = Comments::new(comment_text);
            return self.parse_command(line, comments).map(Some);
        }
    }

    fn parse_command(&mut self, line: Vec<u8>, comments: Comments) -> PResult<Command> {
        if let Some(rest) = line.strip_prefix(b"blob") {
            debug_assert!(rest.is_empty());
            return self.parse_blob(comments);
        }
        if let Some(rest) = line.strip_prefix(b"commit ") {
            return self.parse_commit(rest.to_vec(), comments);
        }
        if let Some(rest) = line.strip_prefix(b"tag ") {
            return self.parse_tag(rest.to_vec(), comments);
        }
        if let Some(rest) = line.strip_prefix(b"reset ") {
            return self.parse_reset(rest.to_vec(), comments);
        }
        if line.as_slice() == b"checkpoint" {
            return Ok(Command::Checkpoint(Commented::new(comments, Checkpoint)));
        }
        if line.as_slice() == b"done" {
            return Ok(Command::Done(Commented::new(comments, Done::Explicit)));
        }
        if let Some(rest) = line.strip_prefix(b"progress ") {
            return Ok(Command::Progress(Commented::new(
                comments,
                Progress {
                    message: rest.into(),
                },
            )));
        }
        if let Some(rest) = line.strip_prefix(b"feature ") {
            return Ok(Command::Feature(Commented::new(
                comments,
                Feature {
                    feature: rest.into(),
                },
            )));
        }
        if let Some(rest) = line.strip_prefix(b"option ") {
            return Ok(Command::Option(Commented::new(
                comments,
                parse_option(rest),
            )));
        }
        // Unknown or out-of-place line (e.g. a stray fileop): preserve as-is.
        // Comments that preceded it are folded back in as passthrough text,
        // since Command::Passthrough carries no separate comment slot.
        let mut full = Vec::new();
        for c in comments.text().split_inclusive(|&b| b == b'\n') {
            full.push(b'#');
            full.extend_from_slice(c);
        }
        full.extend_from_slice(&line);
        Ok(Command::Passthrough(full.into()))
    }

    fn parse_blob(&mut self, comments: Comments) -> PResult<Command> {
        let mark = self.try_parse_mark()?;
        let original_oid = self.try_parse_original_oid()?;
        let data = self.parse_data()?;
        Ok(Command::Blob(Commented::new(
            comments,
            Blob {
                mark,
                original_oid,
                data,
            },
        )))
    }

    fn parse_commit(&mut self, branch: Vec<u8>, comments: Comments) -> PResult<Command> {
        if branch.is_empty() {
            return Err(ParseError::MissingBranch);
        }
        let mark = self.try_parse_mark()?;
        let original_oid = self.try_parse_original_oid()?;
        let mut author = None;
        if let Some(line) = self.peek_prefix(b"author ")? {
            author = Some(self.parse_person_ident(&line)?);
        }
        let committer_line = self
            .expect_prefix(b"committer ")?
            .ok_or(ParseError::MissingBranch)?;
        let committer = self.parse_person_ident(&committer_line)?;
        let mut encoding = None;
        if let Some(line) = self.peek_prefix(b"encoding ")? {
            encoding = Some(line.into());
        }
        let message = self.parse_data()?;
        let message = match message {
            Data::Counted(c) => BString::from(c.into_data()),
            Data::Delimited(d) => BString::from(d.into_data()),
        };
        let mut from = None;
        if let Some(line) = self.peek_prefix(b"from ")? {
            from = Some(parse_commitish(&line));
        }
        let mut merge = Vec::new();
        while let Some(line) = self.peek_prefix(b"merge ")? {
            merge.push(parse_commitish(&line));
        }
        let mut fileops = Vec::new();
        while let Some(op) = self.try_parse_fileop()? {
            fileops.push(op);
        }
        Ok(Command::Commit(Commented::new(
            comments,
            Commit {
                branch: branch.into(),
                mark,
                original_oid,
                author,
                committer,
                encoding,
                message,
                from,
                merge,
                fileops,
            },
        )))
    }

    fn parse_tag(&mut self, name: Vec<u8>, comments: Comments) -> PResult<Command> {
        let from_line = self
            .expect_prefix(b"from ")?
            .ok_or(ParseError::MissingBranch)?;
        let from = parse_commitish(&from_line);
        let mut tagger = None;
        if let Some(line) = self.peek_prefix(b"tagger ")? {
            tagger = Some(self.parse_person_ident(&line)?);
        }
        let message = self.parse_data()?;
        let message = match message {
            Data::Counted(c) => BString::from(c.into_data()),
            Data::Delimited(d) => BString::from(d.into_data()),
        };
        Ok(Command::Tag(Commented::new(
            comments,
            Tag {
                name: name.into(),
                from,
                tagger,
                message,
            },
        )))
    }

    fn parse_reset(&mut self, refname: Vec<u8>, comments: Comments) -> PResult<Command> {
        let mut from = None;
        if let Some(line) = self.peek_prefix(b"from ")? {
            from = Some(parse_commitish(&line));
        }
        Ok(Command::Reset(Commented::new(
            comments,
            Reset {
                refname: refname.into(),
                from,
            },
        )))
    }

    fn try_parse_fileop(&mut self) -> PResult<Option<FileOp>> {
        let Some(line) = self.peek_line()? else {
            return Ok(None);
        };
        if line.as_slice() == b"deleteall" {
            self.consume_peeked();
            return Ok(Some(FileOp::DeleteAll));
        }
        if let Some(rest) = line.strip_prefix(b"M ") {
            let rest = rest.to_vec();
            self.consume_peeked();
            let mut parts = rest.splitn(3, |&b| b == b' ');
            let mode = parts.next().ok_or(ParseError::MissingBranch)?;
            let mode = FileMode::from_octal(mode)
                .ok_or_else(|| ParseError::InvalidFileMode(mode.into()))?;
            let dataref_str = parts.next().ok_or(ParseError::MissingBranch)?;
            let path = parts.next().unwrap_or(b"");
            let dataref = if dataref_str == b"inline" {
                DataRef::Inline(self.parse_data()?)
            } else if let Some(mark) = dataref_str.strip_prefix(b":") {
                DataRef::Mark(parse_mark_digits(mark)?)
            } else {
                DataRef::Oid(dataref_str.into())
            };
            return Ok(Some(FileOp::Modify {
                mode,
                dataref,
                path: unquote_path(path),
            }));
        }
        if let Some(rest) = line.strip_prefix(b"D ") {
            self.consume_peeked();
            return Ok(Some(FileOp::Delete {
                path: unquote_path(rest),
            }));
        }
        if let Some(rest) = line.strip_prefix(b"R ") {
            self.consume_peeked();
            let (source, target) = split_two_paths(rest);
            return Ok(Some(FileOp::Rename { source, target }));
        }
        if let Some(rest) = line.strip_prefix(b"C ") {
            self.consume_peeked();
            let (source, target) = split_two_paths(rest);
            return Ok(Some(FileOp::Copy { source, target }));
        }
        if let Some(rest) = line.strip_prefix(b"N ") {
            let rest = rest.to_vec();
            self.consume_peeked();
            let mut parts = rest.splitn(2, |&b| b == b' ');
            let dataref_str = parts.next().ok_or(ParseError::MissingBranch)?;
            let commit = parts.next().unwrap_or(b"");
            let dataref = if dataref_str == b"inline" {
                DataRef::Inline(self.parse_data()?)
            } else if let Some(mark) = dataref_str.strip_prefix(b":") {
                DataRef::Mark(parse_mark_digits(mark)?)
            } else {
                DataRef::Oid(dataref_str.into())
            };
            return Ok(Some(FileOp::Note {
                dataref,
                commit: commit.into(),
            }));
        }
        Ok(None)
    }

    fn parse_person_ident(&mut self, line: &[u8]) -> PResult<PersonIdent> {
        // `[name ]<email> date`
        let lt = line
            .find_byte(b'<')
            .ok_or_else(|| ParseError::InvalidPersonIdent(line.into()))?;
        let gt = line
            .find_byte(b'>')
            .ok_or_else(|| ParseError::InvalidPersonIdent(line.into()))?;
        let name = line[..lt].trim_end().to_vec();
        let email = line[lt + 1..gt].to_vec();
        let date = line[gt + 1..].trim_start().to_vec();
        Ok(PersonIdent {
            name: name.into(),
            email: email.into(),
            date: date.into(),
        })
    }

    fn try_parse_mark(&mut self) -> PResult<Option<Mark>> {
        match self.peek_prefix(b"mark ")? {
            Some(line) => Ok(Some(parse_mark(&line)?)),
            None => Ok(None),
        }
    }

    fn try_parse_original_oid(&mut self) -> PResult<Option<OriginalOid>> {
        match self.peek_prefix(b"original-oid ")? {
            Some(line) => Ok(Some(OriginalOid { oid: line.into() })),
            None => Ok(None),
        }
    }

    fn parse_data(&mut self) -> PResult<Data> {
        let header = self
            .read_line()?
            .ok_or_else(|| ParseError::InvalidDataHeader(BString::from("")))?;
        let rest = header
            .strip_prefix(b"data ")
            .ok_or_else(|| ParseError::InvalidDataHeader(header.as_slice().into()))?;
        if let Some(delim) = rest.strip_prefix(b"<<") {
            let delim = delim.to_vec();
            let mut data = Vec::new();
            loop {
                let Some(line) = self.read_raw_line()? else {
                    return Err(ParseError::UnterminatedDelimitedData);
                };
                if line == delim {
                    break;
                }
                data.extend_from_slice(&line);
                data.push(b'\n');
            }
            Ok(Data::Delimited(
                DelimitedData::new(data, delim.into_boxed_slice())
                    .unwrap_or_else(|_| unreachable_delim()),
            ))
        } else {
            let len: u64 = std::str::from_utf8(rest)
                .ok()
                .and_then(|s| s.parse().ok())
                .ok_or_else(|| ParseError::InvalidDataHeader(header.as_slice().into()))?;
            let mut buf = vec![0u8; len as usize];
            self.reader
                .read_exact(&mut buf)
                .map_err(|_| ParseError::UnterminatedCountedData(len))?;
            // Consume the optional trailing LF.
            self.consume_optional_lf()?;
            Ok(Data::Counted(CountedData::new(buf)))
        }
    }

    fn consume_optional_lf(&mut self) -> PResult<()> {
        let mut one = [0u8; 1];
        match self.reader.read(&mut one)? {
            0 => Ok(()),
            _ if one[0] == b'\n' => Ok(()),
            _ => {
                // Not an LF: this byte belongs to the next line. Since
                // `BufRead` gives no general push-back, stash it by treating
                // it as the start of the next read. In practice fast-import
                // producers always emit the optional LF, so this path is
                // defensive only.
                self.line.clear();
                self.line.push(one[0]);
                Ok(())
            }
        }
    }

    /// Reads one line with the trailing LF stripped, or `None` at EOF.
    fn read_line(&mut self) -> PResult<Option<Vec<u8>>> {
        if !self.line.is_empty() {
            let line = std::mem::take(&mut self.line);
            return Ok(Some(line));
        }
        self.read_raw_line()
    }

    fn read_raw_line(&mut self) -> PResult<Option<Vec<u8>>> {
        if self.eof {
            return Ok(None);
        }
        let mut buf = Vec::new();
        let n = self.reader.read_until(b'\n', &mut buf)?;
        if n == 0 {
            self.eof = true;
            return Ok(None);
        }
        if buf.last() == Some(&b'\n') {
            buf.pop();
        } else {
            self.eof = true;
        }
        Ok(Some(buf))
    }

    /// Reads the next line if it has `prefix`, consuming it; otherwise leaves
    /// it buffered for the next read.
    fn peek_prefix(&mut self, prefix: &[u8]) -> PResult<Option<Vec<u8>>> {
        let Some(line) = self.peek_line()? else {
            return Ok(None);
        };
        if let Some(rest) = line.strip_prefix(prefix) {
            let rest = rest.to_vec();
            self.consume_peeked();
            Ok(Some(rest))
        } else {
            Ok(None)
        }
    }

    fn expect_prefix(&mut self, prefix: &[u8]) -> PResult<Option<Vec<u8>>> {
        self.peek_prefix(prefix)
    }

    fn peek_line(&mut self) -> PResult<Option<&Vec<u8>>> {
        if self.line.is_empty() {
            if let Some(line) = self.read_raw_line()? {
                self.line = line;
            } else {
                return Ok(None);
            }
        }
        Ok(Some(&self.line))
    }

    fn consume_peeked(&mut self) {
        self.line.clear();
    }
}

fn unreachable_delim() -> DelimitedData {
    // The body was validated to end with LF and to not contain the delimiter
    // while scanning lines above, so construction cannot fail.
    unreachable!("delimited data validated during line scan")
}

fn parse_mark(line: &[u8]) -> PResult<Mark> {
    let digits = line
        .strip_prefix(b":")
        .ok_or_else(|| ParseError::InvalidMark(line.into()))?;
    parse_mark_digits(digits)
}

fn parse_mark_digits(digits: &[u8]) -> PResult<Mark> {
    std::str::from_utf8(digits)
        .ok()
        .and_then(|s| s.parse().ok())
        .map(|mark| Mark { mark })
        .ok_or_else(|| ParseError::InvalidMark(digits.into()))
}

fn parse_commitish(line: &[u8]) -> Commitish {
    if let Some(digits) = line.strip_prefix(b":") {
        if let Ok(mark) = parse_mark_digits(digits) {
            return Commitish::Mark(mark);
        }
    }
    Commitish::BranchOrOid(line.into())
}

fn parse_option(rest: &[u8]) -> OptionCommand {
    if let Some(value) = rest.strip_prefix(b"git ") {
        if let Some(g) = parse_option_git(value) {
            return OptionCommand::Git(g);
        }
    }
    OptionCommand::Other(rest.into())
}

fn parse_option_git(value: &[u8]) -> Option<OptionGit> {
    let s = std::str::from_utf8(value).ok()?;
    if let Some(n) = s.strip_prefix("--depth=") {
        return Some(OptionGit::Depth(n.parse().ok()?));
    }
    if let Some(n) = s.strip_prefix("--active-branches=") {
        return Some(OptionGit::ActiveBranches(n.parse().ok()?));
    }
    if let Some(file) = s.strip_prefix("--export-pack-edges=") {
        return Some(OptionGit::ExportPackEdges(file.into()));
    }
    match s {
        "--quiet" => Some(OptionGit::Quiet),
        "--stats" => Some(OptionGit::Stats),
        "--allow-unsafe-features" => Some(OptionGit::AllowUnsafeFeatures),
        _ => None,
    }
}

/// Strips surrounding `"..."` quoting and C-style escapes from a path, if
/// present; otherwise returns the bytes unchanged.
fn unquote_path(path: &[u8]) -> BString {
    let Some(inner) = path
        .strip_prefix(b"\"")
        .and_then(|s| s.strip_suffix(b"\""))
    else {
        return path.into();
    };
    let mut out = Vec::with_capacity(inner.len());
    let mut bytes = inner.iter().copied();
    while let Some(b) = bytes.next() {
        if b == b'\\' {
            match bytes.next() {
                Some(b'n') => out.push(b'\n'),
                Some(b't') => out.push(b'\t'),
                Some(b'"') => out.push(b'"'),
                Some(b'\\') => out.push(b'\\'),
                Some(other) => out.push(other),
                None => out.push(b'\\'),
            }
        } else {
            out.push(b);
        }
    }
    out.into()
}

fn split_two_paths(rest: &[u8]) -> (BString, BString) {
    if rest.starts_with(b"\"") {
        // A quoted source path may contain escaped spaces; find the closing
        // quote rather than the first space.
        if let Some(end) = rest[1..].iter().position(|&b| b == b'"') {
            let source = &rest[..end + 2];
            let target = rest[end + 3..].trim_start();
            return (unquote_path(source), unquote_path(target));
        }
    }
    match rest.find_byte(b' ') {
        Some(i) => (unquote_path(&rest[..i]), unquote_path(rest[i + 1..].trim_start())),
        None => (unquote_path(rest), BString::from("")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(input: &[u8]) -> Vec<Command> {
        Parser::new(input).parse_all().unwrap()
    }

    #[test]
    fn blob_and_reset() {
        let commands = parse(b"blob\nmark :1\ndata 5\nhello\nreset refs/heads/master\nfrom :1\n");
        assert!(matches!(commands[0], Command::Blob(_)));
        assert!(matches!(commands[1], Command::Reset(_)));
        if let Command::Blob(b) = &commands[0] {
            assert_eq!(b.value.mark, Some(Mark { mark: 1 }));
            match &b.value.data {
                Data::Counted(d) => assert_eq!(d.data, b"hello"),
                _ => panic!("expected counted data"),
            }
        }
    }

    #[test]
    fn commit_with_fileops() {
        let input = b"commit refs/heads/master\n\
mark :2\n\
author A U Thor <a@example.com> 1000000000 +0000\n\
committer A U Thor <a@example.com> 1000000000 +0000\n\
data 2\n\
hi\n\
M 100644 :1 path/to/file.txt\n\
D old/file.txt\n\
deleteall\n";
        let commands = parse(input);
        let Command::Commit(c) = &commands[0] else {
            panic!("expected commit");
        };
        assert_eq!(c.value.branch.as_slice(), b"refs/heads/master");
        assert_eq!(c.value.fileops.len(), 3);
        assert!(matches!(c.value.fileops[0], FileOp::Modify { .. }));
        assert!(matches!(c.value.fileops[1], FileOp::Delete { .. }));
        assert!(matches!(c.value.fileops[2], FileOp::DeleteAll));
    }

    #[test]
    fn passthrough_preserves_unknown_lines() {
        let commands = parse(b"ls 5\n");
        assert!(matches!(commands[0], Command::Passthrough(_)));
    }

    #[test]
    fn quoted_path_roundtrip() {
        assert_eq!(unquote_path(b"\"has space\""), BString::from("has space"));
        assert_eq!(unquote_path(b"plain"), BString::from("plain"));
    }
}
