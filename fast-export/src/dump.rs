//! Serialize the [`ast`](crate::ast) back into `git fast-import` text.

use std::io::{self, Write};

use crate::ast::*;

pub trait Dump {
    fn dump<W: Write>(&self, w: &mut W) -> io::Result<()>;
}

impl Dump for Command {
    fn dump<W: Write>(&self, w: &mut W) -> io::Result<()> {
        match self {
            Command::Blob(c) => c.dump(w),
            Command::Commit(c) => c.dump(w),
            Command::Tag(c) => c.dump(w),
            Command::Reset(c) => c.dump(w),
            Command::Checkpoint(c) => c.dump(w),
            Command::Done(c) => c.dump(w),
            Command::Progress(c) => c.dump(w),
            Command::Feature(c) => c.dump(w),
            Command::Option(c) => c.dump(w),
            Command::Passthrough(line) => {
                w.write_all(line)?;
                w.write_all(b"\n")
            }
        }
    }
}

impl Dump for Blob {
    fn dump<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_all(b"blob\n")?;
        self.mark.dump(w)?;
        self.original_oid.dump(w)?;
        self.data.dump(w)
    }
}

impl Dump for Commit {
    fn dump<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_all(b"commit ")?;
        w.write_all(&self.branch)?;
        w.write_all(b"\n")?;
        self.mark.dump(w)?;
        self.original_oid.dump(w)?;
        if let Some(author) = &self.author {
            w.write_all(b"author ")?;
            author.dump(w)?;
        }
        w.write_all(b"committer ")?;
        self.committer.dump(w)?;
        if let Some(encoding) = &self.encoding {
            w.write_all(b"encoding ")?;
            w.write_all(encoding)?;
            w.write_all(b"\n")?;
        }
        Data::Counted(CountedData::new(self.message.to_vec())).dump(w)?;
        if let Some(from) = &self.from {
            w.write_all(b"from ")?;
            from.dump(w)?;
            w.write_all(b"\n")?;
        }
        for merge in &self.merge {
            w.write_all(b"merge ")?;
            merge.dump(w)?;
            w.write_all(b"\n")?;
        }
        for op in &self.fileops {
            op.dump(w)?;
        }
        Ok(())
    }
}

impl Dump for FileOp {
    fn dump<W: Write>(&self, w: &mut W) -> io::Result<()> {
        match self {
            FileOp::Modify { mode, dataref, path } => {
                write!(w, "M {} ", mode.as_octal())?;
                match dataref {
                    DataRef::Mark(m) => write!(w, ":{}", m.mark)?,
                    DataRef::Oid(oid) => w.write_all(oid)?,
                    DataRef::Inline(_) => w.write_all(b"inline")?,
                }
                w.write_all(b" ")?;
                write_path(w, path)?;
                w.write_all(b"\n")?;
                if let DataRef::Inline(data) = dataref {
                    data.dump(w)?;
                }
                Ok(())
            }
            FileOp::Delete { path } => {
                w.write_all(b"D ")?;
                write_path(w, path)?;
                w.write_all(b"\n")
            }
            FileOp::Rename { source, target } => {
                w.write_all(b"R ")?;
                write_path(w, source)?;
                w.write_all(b" ")?;
                write_path(w, target)?;
                w.write_all(b"\n")
            }
            FileOp::Copy { source, target } => {
                w.write_all(b"C ")?;
                write_path(w, source)?;
                w.write_all(b" ")?;
                write_path(w, target)?;
                w.write_all(b"\n")
            }
            FileOp::Note { dataref, commit } => {
                w.write_all(b"N ")?;
                match dataref {
                    DataRef::Mark(m) => write!(w, ":{}", m.mark)?,
                    DataRef::Oid(oid) => w.write_all(oid)?,
                    DataRef::Inline(_) => w.write_all(b"inline")?,
                }
                w.write_all(b" ")?;
                w.write_all(commit)?;
                w.write_all(b"\n")?;
                if let DataRef::Inline(data) = dataref {
                    data.dump(w)?;
                }
                Ok(())
            }
            FileOp::DeleteAll => w.write_all(b"deleteall\n"),
        }
    }
}

/// Quotes a path in `"..."` form if it contains a byte that would otherwise
/// be ambiguous in the stream (LF, double quote, or a leading/interior
/// control byte), matching what `git fast-export` emits.
fn write_path<W: Write>(w: &mut W, path: &[u8]) -> io::Result<()> {
    let needs_quote = path
        .iter()
        .any(|&b| b == b'"' || b == b'\\' || b == b'\n' || b < 0x20);
    if !needs_quote {
        return w.write_all(path);
    }
    w.write_all(b"\"")?;
    for &b in path {
        match b {
            b'"' => w.write_all(b"\\\"")?,
            b'\\' => w.write_all(b"\\\\")?,
            b'\n' => w.write_all(b"\\n")?,
            _ => w.write_all(&[b])?,
        }
    }
    w.write_all(b"\"")
}

impl Dump for Tag {
    fn dump<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_all(b"tag ")?;
        w.write_all(&self.name)?;
        w.write_all(b"\n")?;
        w.write_all(b"from ")?;
        self.from.dump(w)?;
        w.write_all(b"\n")?;
        if let Some(tagger) = &self.tagger {
            w.write_all(b"tagger ")?;
            tagger.dump(w)?;
        }
        Data::Counted(CountedData::new(self.message.to_vec())).dump(w)
    }
}

impl Dump for Reset {
    fn dump<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_all(b"reset ")?;
        w.write_all(&self.refname)?;
        w.write_all(b"\n")?;
        if let Some(from) = &self.from {
            w.write_all(b"from ")?;
            from.dump(w)?;
            w.write_all(b"\n")?;
        }
        Ok(())
    }
}

impl Dump for Checkpoint {
    fn dump<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_all(b"checkpoint\n")
    }
}

impl Dump for Done {
    fn dump<W: Write>(&self, w: &mut W) -> io::Result<()> {
        match self {
            Done::Explicit => w.write_all(b"done\n"),
            Done::Eof => Ok(()),
        }
    }
}

impl Dump for Progress {
    fn dump<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_all(b"progress ")?;
        w.write_all(&self.message)?;
        w.write_all(b"\n")
    }
}

impl Dump for Feature {
    fn dump<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_all(b"feature ")?;
        w.write_all(&self.feature)?;
        w.write_all(b"\n")
    }
}

impl Dump for OptionCommand {
    fn dump<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_all(b"option ")?;
        match self {
            OptionCommand::Git(g) => g.dump(w),
            OptionCommand::Other(s) => {
                w.write_all(s)?;
                w.write_all(b"\n")
            }
        }
    }
}

impl Dump for OptionGit {
    fn dump<W: Write>(&self, w: &mut W) -> io::Result<()> {
        // Positive sign and leading zeros are not preserved from the source.
        match self {
            OptionGit::MaxPackSize(n) => {
                w.write_all(b"--max-pack-size=")?;
                n.dump(w)?;
                w.write_all(b"\n")
            }
            OptionGit::BigFileThreshold(n) => {
                w.write_all(b"--big-file-threshold=")?;
                n.dump(w)?;
                w.write_all(b"\n")
            }
            OptionGit::Depth(n) => writeln!(w, "--depth={n}"),
            OptionGit::ActiveBranches(n) => writeln!(w, "--active-branches={n}"),
            OptionGit::ExportPackEdges(file) => {
                write!(w, "--export-pack-edges=")?;
                w.write_all(file)?;
                w.write_all(b"\n")
            }
            OptionGit::Quiet => w.write_all(b"--quiet\n"),
            OptionGit::Stats => w.write_all(b"--stats\n"),
            OptionGit::AllowUnsafeFeatures => w.write_all(b"--allow-unsafe-features\n"),
        }
    }
}

impl Dump for Mark {
    fn dump<W: Write>(&self, w: &mut W) -> io::Result<()> {
        writeln!(w, "mark :{}", self.mark)
    }
}

impl Dump for OriginalOid {
    fn dump<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_all(b"original-oid ")?;
        w.write_all(&self.oid)?;
        w.write_all(b"\n")
    }
}

impl Dump for Commitish {
    fn dump<W: Write>(&self, w: &mut W) -> io::Result<()> {
        match self {
            Commitish::Mark(m) => write!(w, ":{}", m.mark),
            Commitish::BranchOrOid(s) => w.write_all(s),
        }
    }
}

impl Dump for PersonIdent {
    fn dump<W: Write>(&self, w: &mut W) -> io::Result<()> {
        if !self.name.is_empty() {
            w.write_all(&self.name)?;
            w.write_all(b" ")?;
        }
        w.write_all(b"<")?;
        w.write_all(&self.email)?;
        w.write_all(b"> ")?;
        w.write_all(&self.date)?;
        w.write_all(b"\n")
    }
}

impl Dump for Data {
    fn dump<W: Write>(&self, w: &mut W) -> io::Result<()> {
        match self {
            Data::Counted(data) => data.dump(w),
            Data::Delimited(data) => data.dump(w),
        }
    }
}

impl Dump for CountedData {
    fn dump<W: Write>(&self, w: &mut W) -> io::Result<()> {
        writeln!(w, "data {}", self.data.len())?;
        w.write_all(&self.data)?;
        if self.optional_lf {
            w.write_all(b"\n")?;
        }
        Ok(())
    }
}

impl Dump for DelimitedData {
    fn dump<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_all(b"data <<")?;
        w.write_all(self.delim())?;
        w.write_all(b"\n")?;
        w.write_all(self.data())?;
        w.write_all(self.delim())?;
        w.write_all(b"\n")?;
        if self.optional_lf {
            w.write_all(b"\n")?;
        }
        Ok(())
    }
}

impl Dump for FileSize {
    fn dump<W: Write>(&self, w: &mut W) -> io::Result<()> {
        // Case is not preserved from the source.
        write!(w, "{}", self.value)?;
        match self.unit {
            UnitFactor::B => Ok(()),
            UnitFactor::K => w.write_all(b"k"),
            UnitFactor::M => w.write_all(b"m"),
            UnitFactor::G => w.write_all(b"g"),
        }
    }
}

impl<T: Dump> Dump for Option<T> {
    fn dump<W: Write>(&self, w: &mut W) -> io::Result<()> {
        if let Some(value) = self {
            value.dump(w)?;
        }
        Ok(())
    }
}

impl Dump for Comments {
    fn dump<W: Write>(&self, w: &mut W) -> io::Result<()> {
        for line in self.text().split_inclusive(|&b| b == b'\n') {
            w.write_all(b"#")?;
            w.write_all(line)?;
        }
        if self.text().last().is_some_and(|&b| b != b'\n') {
            w.write_all(b"\n")?;
        }
        Ok(())
    }
}

impl<T: Dump> Dump for Commented<T> {
    fn dump<W: Write>(&self, w: &mut W) -> io::Result<()> {
        self.comments.dump(w)?;
        self.value.dump(w)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dump<T: Dump>(value: T) -> Vec<u8> {
        let mut buf = Vec::new();
        value.dump(&mut buf).unwrap();
        buf
    }

    #[test]
    fn counted_data() {
        assert_eq!(
            dump(Data::Counted(CountedData::new(*b"Hello, world!"))),
            b"data 13\nHello, world!\n",
        );
    }

    #[test]
    fn delimited_data() {
        assert_eq!(
            dump(Data::Delimited(
                DelimitedData::new(*b"Hello, world!\n", *b"EOF").unwrap()
            )),
            b"data <<EOF\nHello, world!\nEOF\n\n",
        );
    }

    #[test]
    fn comments() {
        assert_eq!(dump(Comments::new(*b"")), b"");
        assert_eq!(dump(Comments::new(*b"a\nb")), b"#a\n#b\n");
    }

    #[test]
    fn quoted_path() {
        let mut buf = Vec::new();
        write_path(&mut buf, b"plain/path.txt").unwrap();
        assert_eq!(buf, b"plain/path.txt");

        let mut buf = Vec::new();
        write_path(&mut buf, b"has \"quote\"").unwrap();
        assert_eq!(buf, b"\"has \\\"quote\\\"\"");
    }
}
