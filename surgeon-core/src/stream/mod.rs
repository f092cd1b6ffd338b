//! Conversion between the wire-level `fast_export` AST and the in-memory
//! [`Repository`] model: importing a fast-import stream builds a
//! `Repository`; exporting walks it back into a `Command` sequence.

mod import;
mod export;

pub use export::export;
pub use import::import;
