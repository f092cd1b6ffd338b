//! Reader for the Subversion dumpfile format: versions 1-3 of the
//! documented dump-load format.

use std::collections::BTreeMap;
use std::io::{BufRead, Read};

use bstr::BString;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DumpError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("malformed header line: {0:?}")]
    MalformedHeader(BString),
    #[error("missing required header {0:?} in {1}")]
    MissingHeader(&'static str, &'static str),
    #[error("revision numbers are not monotonically increasing: {0} after {1}")]
    NonMonotonicRevision(u64, u64),
    #[error("invalid content-length {0:?}")]
    InvalidLength(BString),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    File,
    Dir,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeActionKind {
    Add,
    Change,
    Delete,
    Replace,
}

#[derive(Debug, Clone)]
pub struct CopySource {
    pub rev: u64,
    pub path: BString,
}

#[derive(Debug, Clone, Default)]
pub struct Properties(pub BTreeMap<BString, BString>);

#[derive(Debug, Clone)]
pub struct NodeAction {
    pub path: BString,
    pub kind: NodeKind,
    pub action: NodeActionKind,
    pub copy_source: Option<CopySource>,
    pub props: Option<Properties>,
    pub content: Option<Vec<u8>>,
    pub content_hash: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct Revision {
    pub number: u64,
    pub properties: Properties,
    pub nodes: Vec<NodeAction>,
}

const DROPPED_PROPS: &[&str] =
    &["svn:mime-type", "svn:keywords", "svn:needs-lock", "svn:eol-style"];

impl Properties {
    /// Drops the fixed set of low-value properties (phase 2) and
    /// normalizes ignore-pattern properties by removing blank lines.
    #[must_use]
    pub fn filtered(mut self) -> Self {
        for key in DROPPED_PROPS {
            self.0.remove(key.as_bytes());
        }
        for key in [&b"svn:ignore"[..], b"svn:global-ignores"] {
            if let Some(value) = self.0.get_mut(key) {
                let cleaned: Vec<u8> = value
                    .split(|&b| b == b'\n')
                    .filter(|line| !line.is_empty())
                    .collect::<Vec<_>>()
                    .join(&b'\n');
                *value = cleaned.into();
            }
        }
        self
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&BString> {
        self.0.get(key.as_bytes() as &[u8])
    }
}

/// Parses an entire dumpfile into revisions, in order. Revision numbers
/// must be non-decreasing; gaps are allowed.
pub fn parse_dump<R: BufRead>(mut reader: R) -> Result<Vec<Revision>, DumpError> {
    let mut revisions = Vec::new();
    let mut last_rev: Option<u64> = None;

    // Format-version / UUID headers precede the first revision.
    skip_preamble(&mut reader)?;

    loop {
        let headers = read_headers(&mut reader)?;
        if headers.is_empty() {
            break;
        }
        let rev_number: u64 = headers
            .get("Revision-number")
            .ok_or(DumpError::MissingHeader("Revision-number", "revision"))?
            .parse()
            .map_err(|_| DumpError::MalformedHeader("Revision-number".into()))?;
        if let Some(last) = last_rev {
            if rev_number < last {
                return Err(DumpError::NonMonotonicRevision(rev_number, last));
            }
        }
        last_rev = Some(rev_number);

        let props = read_props_block(&mut reader, &headers)?;
        let mut revision = Revision { number: rev_number, properties: props, nodes: Vec::new() };

        loop {
            let mut peeked = String::new();
            let bytes_read = peek_line(&mut reader, &mut peeked)?;
            if bytes_read == 0 {
                break;
            }
            if peeked.starts_with("Revision-number") {
                break;
            }
            if !peeked.starts_with("Node-path") {
                // Blank separator line between records.
                consume_line(&mut reader)?;
                continue;
            }
            let node_headers = read_headers(&mut reader)?;
            let node = read_node(&mut reader, node_headers)?;
            revision.nodes.push(node);
        }

        revisions.push(revision);
    }

    Ok(revisions)
}

fn skip_preamble<R: BufRead>(reader: &mut R) -> Result<(), DumpError> {
    // `SVN-fs-dump-format-version` and optional `UUID` headers, each its
    // own header block.
    loop {
        let mut line = String::new();
        let n = peek_line(reader, &mut line)?;
        if n == 0 || line.starts_with("Revision-number") {
            return Ok(());
        }
        if line.trim().is_empty() {
            consume_line(reader)?;
            continue;
        }
        let _ = read_headers(reader)?;
    }
}

struct Headers(BTreeMap<String, String>);

impl Headers {
    fn get(&self, key: &str) -> Option<&String> {
        self.0.get(key)
    }

    fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

fn read_headers<R: BufRead>(reader: &mut R) -> Result<Headers, DumpError> {
    let mut map = BTreeMap::new();
    loop {
        let mut line = String::new();
        let n = reader.read_line(&mut line)?;
        if n == 0 {
            break;
        }
        let trimmed = line.trim_end_matches(['\n', '\r']);
        if trimmed.is_empty() {
            break;
        }
        let (key, value) = trimmed
            .split_once(": ")
            .ok_or_else(|| DumpError::MalformedHeader(trimmed.into()))?;
        map.insert(key.to_string(), value.to_string());
    }
    Ok(Headers(map))
}

fn read_props_block<R: BufRead>(
    reader: &mut R,
    headers: &Headers,
) -> Result<Properties, DumpError> {
    let Some(len) = headers.get("Prop-content-length") else { return Ok(Properties::default()) };
    let len: usize =
        len.parse().map_err(|_| DumpError::InvalidLength(len.as_str().into()))?;
    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf)?;
    Ok(parse_props(&buf).filtered())
}

fn parse_props(buf: &[u8]) -> Properties {
    let mut props = BTreeMap::new();
    let mut pos = 0;
    while pos < buf.len() {
        if buf[pos..].starts_with(b"PROPS-END") {
            break;
        }
        let Some((key, next)) = read_prop_field(buf, pos) else { break };
        pos = next;
        let Some((value, next)) = read_prop_field(buf, pos) else { break };
        pos = next;
        props.insert(key, value);
    }
    Properties(props)
}

/// Reads one `K <len>\n<bytes>\n` or `V <len>\n<bytes>\n` field starting at
/// `pos`, returning the bytes and the offset just past the trailing LF.
fn read_prop_field(buf: &[u8], pos: usize) -> Option<(BString, usize)> {
    let line_end = memchr::memchr(b'\n', &buf[pos..])? + pos;
    let header = std::str::from_utf8(&buf[pos..line_end]).ok()?;
    let len: usize = header.split_whitespace().nth(1)?.parse().ok()?;
    let data_start = line_end + 1;
    let data_end = data_start + len;
    if data_end + 1 > buf.len() {
        return None;
    }
    Some((BString::from(&buf[data_start..data_end]), data_end + 1))
}

fn read_node<R: BufRead>(reader: &mut R, headers: Headers) -> Result<NodeAction, DumpError> {
    let path: BString = headers
        .get("Node-path")
        .ok_or(DumpError::MissingHeader("Node-path", "node"))?
        .as_str()
        .into();
    let kind = match headers.get("Node-kind").map(String::as_str) {
        Some("file") => NodeKind::File,
        Some("dir") => NodeKind::Dir,
        _ => NodeKind::None,
    };
    let action = match headers.get("Node-action").map(String::as_str) {
        Some("add") => NodeActionKind::Add,
        Some("change") => NodeActionKind::Change,
        Some("delete") => NodeActionKind::Delete,
        Some("replace") => NodeActionKind::Replace,
        _ => return Err(DumpError::MissingHeader("Node-action", "node")),
    };
    let copy_source = match (
        headers.get("Node-copyfrom-rev"),
        headers.get("Node-copyfrom-path"),
    ) {
        (Some(rev), Some(path)) => Some(CopySource {
            rev: rev
                .parse()
                .map_err(|_| DumpError::InvalidLength(rev.as_str().into()))?,
            path: path.as_str().into(),
        }),
        _ => None,
    };
    let content_hash = headers.get("Text-content-md5").cloned();

    let props = read_props_block_node(reader, &headers)?;
    let content = read_text_block(reader, &headers)?;

    Ok(NodeAction { path, kind, action, copy_source, props, content, content_hash })
}

fn read_props_block_node<R: BufRead>(
    reader: &mut R,
    headers: &Headers,
) -> Result<Option<Properties>, DumpError> {
    let Some(len) = headers.get("Prop-content-length") else { return Ok(None) };
    let len: usize =
        len.parse().map_err(|_| DumpError::InvalidLength(len.as_str().into()))?;
    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf)?;
    Ok(Some(parse_props(&buf).filtered()))
}

fn read_text_block<R: BufRead>(
    reader: &mut R,
    headers: &Headers,
) -> Result<Option<Vec<u8>>, DumpError> {
    let total = headers.get("Content-length");
    let text = headers.get("Text-content-length");
    let prop_len: usize = headers
        .get("Prop-content-length")
        .map(|s| s.parse().unwrap_or(0))
        .unwrap_or(0);

    let text_len: usize = match (text, total) {
        (Some(t), _) => t.parse().map_err(|_| DumpError::InvalidLength(t.as_str().into()))?,
        (None, Some(t)) => {
            let total: usize =
                t.parse().map_err(|_| DumpError::InvalidLength(t.as_str().into()))?;
            total.saturating_sub(prop_len)
        }
        (None, None) => return Ok(None),
    };

    let mut buf = vec![0u8; text_len];
    reader.read_exact(&mut buf)?;
    // A trailing blank line separates records.
    let mut blank = String::new();
    reader.read_line(&mut blank)?;
    Ok(Some(buf))
}

fn peek_line<R: BufRead>(reader: &mut R, out: &mut String) -> Result<usize, DumpError> {
    let buf = reader.fill_buf()?;
    if buf.is_empty() {
        return Ok(0);
    }
    let end = memchr::memchr(b'\n', buf).map_or(buf.len(), |i| i + 1);
    *out = String::from_utf8_lossy(&buf[..end]).into_owned();
    Ok(end)
}

fn consume_line<R: BufRead>(reader: &mut R) -> Result<(), DumpError> {
    let mut line = String::new();
    reader.read_line(&mut line)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn parses_minimal_dump() {
        let dump = b"SVN-fs-dump-format-version: 2\n\n\
Revision-number: 0\n\
Prop-content-length: 10\n\
Content-length: 10\n\
\n\
PROPS-END\n\
\n\
Revision-number: 1\n\
Prop-content-length: 10\n\
Content-length: 10\n\
\n\
PROPS-END\n\
\n\
Node-path: trunk\n\
Node-kind: dir\n\
Node-action: add\n\
Prop-content-length: 10\n\
Content-length: 10\n\
\n\
PROPS-END\n\
\n";
        let revisions = parse_dump(Cursor::new(&dump[..])).unwrap();
        assert_eq!(revisions.len(), 2);
        assert_eq!(revisions[1].number, 1);
        assert_eq!(revisions[1].nodes.len(), 1);
        assert_eq!(revisions[1].nodes[0].path, BString::from("trunk"));
        assert_eq!(revisions[1].nodes[0].kind, NodeKind::Dir);
    }

    #[test]
    fn filters_low_value_properties() {
        let mut props = BTreeMap::new();
        props.insert(BString::from("svn:mime-type"), BString::from("text/plain"));
        props.insert(BString::from("svn:executable"), BString::from("*"));
        let filtered = Properties(props).filtered();
        assert!(filtered.get("svn:mime-type").is_none());
        assert!(filtered.get("svn:executable").is_some());
    }
}
