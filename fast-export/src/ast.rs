//! The abstract syntax of a `git fast-import` stream: one [`Command`] per
//! top-level record, holding owned byte strings so a parsed stream can be
//! mutated and re-dumped without borrowing the input buffer.

use bstr::BString;
use thiserror::Error;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    Blob(Commented<Blob>),
    Commit(Commented<Commit>),
    Tag(Commented<Tag>),
    Reset(Commented<Reset>),
    Checkpoint(Commented<Checkpoint>),
    Done(Commented<Done>),
    Progress(Commented<Progress>),
    Feature(Commented<Feature>),
    Option(Commented<OptionCommand>),
    /// A line the parser did not interpret as any of the above. Preserved
    /// verbatim so round-tripping a stream never drops input.
    Passthrough(BString),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Blob {
    pub mark: Option<Mark>,
    pub original_oid: Option<OriginalOid>,
    pub data: Data,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Commit {
    pub branch: BString,
    pub mark: Option<Mark>,
    pub original_oid: Option<OriginalOid>,
    pub author: Option<PersonIdent>,
    pub committer: PersonIdent,
    pub encoding: Option<BString>,
    pub message: BString,
    pub from: Option<Commitish>,
    pub merge: Vec<Commitish>,
    pub fileops: Vec<FileOp>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Tag {
    pub name: BString,
    pub from: Commitish,
    pub tagger: Option<PersonIdent>,
    pub message: BString,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reset {
    pub refname: BString,
    pub from: Option<Commitish>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Checkpoint;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Done {
    /// The stream was explicitly terminated with a `done` command.
    Explicit,
    /// The stream was terminated with EOF.
    Eof,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Progress {
    pub message: BString,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Feature {
    pub feature: BString,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OptionCommand {
    Git(OptionGit),
    Other(BString),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OptionGit {
    MaxPackSize(FileSize),
    BigFileThreshold(FileSize),
    Depth(u32),
    ActiveBranches(u32),
    ExportPackEdges(BString),
    Quiet,
    Stats,
    AllowUnsafeFeatures,
}

/// The atomic tree-modification unit attached to a commit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FileOp {
    /// Modify or create a file.
    Modify {
        mode: FileMode,
        dataref: DataRef,
        path: BString,
    },
    /// Delete a path.
    Delete { path: BString },
    /// Rename `source` to `target`.
    Rename { source: BString, target: BString },
    /// Copy `source` to `target`, leaving `source` in place.
    Copy { source: BString, target: BString },
    /// Attach a note blob to a commit.
    Note { dataref: DataRef, commit: BString },
    /// Wipe the tree before applying the remaining fileops.
    DeleteAll,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileMode {
    /// 100644, an ordinary non-executable file.
    File,
    /// 100755, an executable file.
    Executable,
    /// 120000, a symbolic link, whose content is the link target.
    Symlink,
    /// 160000, a gitlink to a commit in a submodule.
    Gitlink,
}

impl FileMode {
    #[must_use]
    pub fn as_octal(self) -> &'static str {
        match self {
            FileMode::File => "100644",
            FileMode::Executable => "100755",
            FileMode::Symlink => "120000",
            FileMode::Gitlink => "160000",
        }
    }

    #[must_use]
    pub fn from_octal(mode: &[u8]) -> Option<FileMode> {
        match mode {
            b"100644" | b"644" => Some(FileMode::File),
            b"100755" | b"755" => Some(FileMode::Executable),
            b"120000" => Some(FileMode::Symlink),
            b"160000" => Some(FileMode::Gitlink),
            _ => None,
        }
    }
}

/// A reference to a blob's content, either by mark, by an inline `data`
/// block, or (on read from a live repository) by a literal object id.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DataRef {
    Mark(Mark),
    Inline(Data),
    Oid(BString),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Mark {
    pub mark: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OriginalOid {
    pub oid: BString,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Commitish {
    Mark(Mark),
    BranchOrOid(BString),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PersonIdent {
    pub name: BString,
    pub email: BString,
    /// `<unix-seconds> <tz-offset>`, kept unparsed at this layer; higher
    /// layers interpret it into an action stamp.
    pub date: BString,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Data {
    Counted(CountedData),
    Delimited(DelimitedData),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CountedData {
    pub data: Vec<u8>,
    pub optional_lf: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DelimitedData {
    data: Box<[u8]>,
    delim: Box<[u8]>,
    pub optional_lf: bool,
}

#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum DelimitedError {
    #[error("data contains delimiter")]
    ContainsDelim,
    #[error("data contains NUL ('\\0')")]
    ContainsNul,
    #[error("data does not end with LF ('\\n')")]
    NoFinalLf,
}

impl CountedData {
    #[inline]
    #[must_use]
    pub fn new<T: Into<Vec<u8>>>(data: T) -> Self {
        CountedData {
            data: data.into(),
            optional_lf: true,
        }
    }
}

impl DelimitedData {
    #[inline]
    pub fn new<T: Into<Vec<u8>>, D: Into<Box<[u8]>>>(
        data: T,
        delim: D,
    ) -> Result<Self, DelimitedError> {
        DelimitedData::new_(data.into().into_boxed_slice(), delim.into())
    }

    fn new_(data: Box<[u8]>, delim: Box<[u8]>) -> Result<Self, DelimitedError> {
        if data.last().is_some_and(|&b| b != b'\n') {
            Err(DelimitedError::NoFinalLf)
        } else if data.contains(&b'\0') {
            Err(DelimitedError::ContainsNul)
        } else if data.split(|&b| b == b'\n').any(|line| line == &*delim) {
            Err(DelimitedError::ContainsDelim)
        } else {
            Ok(DelimitedData {
                data,
                delim,
                optional_lf: true,
            })
        }
    }

    #[inline]
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    #[inline]
    #[must_use]
    pub fn into_data(self) -> Vec<u8> {
        self.data.into_vec()
    }

    #[inline]
    #[must_use]
    pub fn delim(&self) -> &[u8] {
        &self.delim
    }
}

impl From<CountedData> for Data {
    #[inline]
    fn from(data: CountedData) -> Self {
        Data::Counted(data)
    }
}

impl From<DelimitedData> for Data {
    #[inline]
    fn from(data: DelimitedData) -> Self {
        Data::Delimited(data)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FileSize {
    pub value: u32,
    pub unit: UnitFactor,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnitFactor {
    B,
    K,
    M,
    G,
}

/// Comment lines (`#...`) attached to the command that follows them, so they
/// round-trip even though the stream format gives them no other home.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Comments {
    text: Box<[u8]>,
}

impl Comments {
    #[inline]
    #[must_use]
    pub fn new<T: Into<Vec<u8>>>(text: T) -> Self {
        Comments {
            text: text.into().into_boxed_slice(),
        }
    }

    #[inline]
    #[must_use]
    pub fn text(&self) -> &[u8] {
        &self.text
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Commented<T> {
    pub comments: Comments,
    pub value: T,
}

impl<T> Commented<T> {
    #[inline]
    #[must_use]
    pub fn new(comments: Comments, value: T) -> Self {
        Commented { comments, value }
    }

    #[inline]
    #[must_use]
    pub fn wrap(value: T) -> Self {
        Commented::new(Comments::default(), value)
    }
}

impl<T> From<T> for Commented<T> {
    #[inline]
    fn from(value: T) -> Self {
        Commented::wrap(value)
    }
}
