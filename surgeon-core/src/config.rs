//! Global configuration threaded explicitly through the dumpfile pipeline
//! and surgical primitives, rather than read back from ambient state, so a
//! pipeline stage's behavior is fully determined by its arguments.

use std::time::Duration;

use bstr::BString;

/// Declared branch-inference patterns for the centralized-dumpfile
/// translator's branchify phase, in priority order.
#[derive(Clone, Debug)]
pub struct BranchifyRule {
    /// A glob-like pattern ending in `/*` (one wildcard path component
    /// names a branch) or naming a path exactly.
    pub pattern: BString,
    pub is_tag: bool,
}

#[derive(Clone, Debug)]
pub struct Config {
    /// Branch/tag inference rules, most specific first. Defaults to the
    /// conventional `trunk/`, `branches/*`, `tags/*` layout.
    pub branchify: Vec<BranchifyRule>,
    /// How many seconds apart two revisions' commit times may drift before
    /// they're no longer considered eligible for coalescing.
    pub coalesce_window: Duration,
    /// Abort the run instead of demoting to a [`Semantic`](crate::error::SurgeonError::Semantic)
    /// warning when a non-fatal condition is detected.
    pub strict: bool,
    /// Suppress progress logging below this verbosity.
    pub quiet: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            branchify: vec![
                BranchifyRule { pattern: "trunk".into(), is_tag: false },
                BranchifyRule { pattern: "tags/*".into(), is_tag: true },
                BranchifyRule { pattern: "branches/*".into(), is_tag: false },
                // Catch-all: any other top-level directory is its own branch.
                BranchifyRule { pattern: "*".into(), is_tag: false },
            ],
            coalesce_window: Duration::from_secs(90),
            strict: false,
            quiet: false,
        }
    }
}
