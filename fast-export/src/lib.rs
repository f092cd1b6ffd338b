// Copyright (C) Thalia Archibald. All rights reserved.
//
// This file is part of fast-export-rust, distributed under the GPL 2.0 with a
// linking exception. For the full terms, see the included COPYING file.

//! Reader and writer for the `git fast-import` stream format: the
//! canonical interchange format this workspace edits and re-serializes
//! repository histories through.

pub mod ast;
pub mod dump;
pub mod parse;
pub mod refs;

pub use ast::*;
pub use dump::Dump;
pub use parse::{ParseError, Parser};
