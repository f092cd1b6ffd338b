//! The selection-set language: a small expression syntax over 0-origin
//! event indices, used to name the operands of every surgical primitive.

mod lexer;
mod parser;
mod eval;

pub use eval::{eval, EvalError};
pub use parser::{parse, ParseError};

use crate::event::EventId;

/// An ordered, deduplicated set of event indices: the result of evaluating
/// a selection expression. Order matters for primitives like `split` and
/// `coalesce` that are sensitive to the sequence the user named events in.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Selection(pub Vec<EventId>);

impl Selection {
    #[must_use]
    pub fn single(id: EventId) -> Self {
        Selection(vec![id])
    }

    #[must_use]
    pub fn contains(&self, id: EventId) -> bool {
        self.0.contains(&id)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = EventId> + '_ {
        self.0.iter().copied()
    }

    fn dedup_sorted(mut ids: Vec<EventId>) -> Self {
        ids.sort_unstable();
        ids.dedup();
        Selection(ids)
    }

    fn union(a: &Selection, b: &Selection) -> Selection {
        let mut ids = a.0.clone();
        ids.extend(b.0.iter().copied());
        Selection::dedup_sorted(ids)
    }

    fn intersect(a: &Selection, b: &Selection) -> Selection {
        let ids = a.0.iter().copied().filter(|id| b.contains(*id)).collect();
        Selection(ids)
    }

    fn difference(a: &Selection, b: &Selection) -> Selection {
        let ids = a.0.iter().copied().filter(|id| !b.contains(*id)).collect();
        Selection(ids)
    }
}
