//! The centralized-dumpfile (Subversion-style) reader and its thirteen-phase
//! translation into a commit DAG.

mod branchify;
mod pipeline;
mod reader;

pub use branchify::{is_declared_branch, Branchify};
pub use pipeline::translate;
pub use reader::{
    parse_dump, CopySource, DumpError, NodeAction, NodeActionKind, NodeKind, Properties, Revision,
};
