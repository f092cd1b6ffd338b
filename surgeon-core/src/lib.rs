//! Object model, centralized-dumpfile translator, and selection-set
//! surgical engine for editing and converting version-control histories.

pub mod config;
pub mod dumpfile;
pub mod error;
pub mod event;
pub mod fileop;
pub mod ident;
pub mod pathmap;
pub mod repo;
pub mod selection;
pub mod stream;
pub mod surgery;

pub use config::Config;
pub use error::{Result, SurgeonError};
pub use event::{Blob, BlobId, Commit, Event, EventId, PersonIdent, Reset, Tag};
pub use repo::Repository;
