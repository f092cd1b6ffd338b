//! Branchify pattern matching: recognizing a dumpfile path as a declared
//! branch or tag.

use bstr::{BString, ByteSlice};

use crate::config::BranchifyRule;

#[derive(Debug, Clone)]
pub struct Branchify {
    rules: Vec<BranchifyRule>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchMatch {
    /// The branch path itself (the prefix the commit's fileop paths get
    /// stripped of), e.g. `branches/stable`.
    pub branch: BString,
    pub is_tag: bool,
}

impl Branchify {
    #[must_use]
    pub fn new(rules: Vec<BranchifyRule>) -> Self {
        Branchify { rules }
    }

    /// Returns `Some` if `path` names a declared branch, i.e. its
    /// components match some template component-by-component, where a
    /// trailing `*` in a template matches exactly one more path component.
    #[must_use]
    pub fn match_branch(&self, path: &[u8]) -> Option<BranchMatch> {
        let components: Vec<&[u8]> = path.split(|&b| b == b'/').filter(|c| !c.is_empty()).collect();
        for rule in &self.rules {
            let template: Vec<&[u8]> =
                rule.pattern.split(|&b| b == b'/').filter(|c| !c.is_empty()).collect();
            if components.len() != template.len() {
                continue;
            }
            if components
                .iter()
                .zip(template.iter())
                .all(|(c, t)| *t == b"*" || c == t)
            {
                // A bare `*` catch-all only names a branch when the path
                // isn't itself a namespace directory for some other rule
                // (e.g. `branches`, which sits under `branches/*`).
                if template == [&b"*"[..]] && self.is_namespace(path) {
                    continue;
                }
                return Some(BranchMatch { branch: BString::from(path), is_tag: rule.is_tag });
            }
        }
        None
    }

    /// `true` if `path` is a namespace prefix of a `*`-terminated template
    /// (e.g. `branches` under `branches/*`) — a namespace is not itself a
    /// branch, only a directory that branches live under.
    #[must_use]
    pub fn is_namespace(&self, path: &[u8]) -> bool {
        let components: Vec<&[u8]> = path.split(|&b| b == b'/').filter(|c| !c.is_empty()).collect();
        self.rules.iter().any(|rule| {
            let template: Vec<&[u8]> =
                rule.pattern.split(|&b| b == b'/').filter(|c| !c.is_empty()).collect();
            template.last() == Some(&&b"*"[..])
                && template.len() == components.len() + 1
                && components.iter().zip(template.iter()).all(|(c, t)| *t == b"*" || c == t)
        })
    }

    /// Returns the declared-branch prefix of `path` if `path` lies under
    /// one, i.e. the longest branch match against any ancestor directory
    /// of `path` (used to assign a fileop's branch and strip its prefix).
    #[must_use]
    pub fn containing_branch(&self, path: &[u8]) -> Option<BranchMatch> {
        let mut best: Option<BranchMatch> = None;
        let components: Vec<&[u8]> = path.split(|&b| b == b'/').filter(|c| !c.is_empty()).collect();
        for take in 1..=components.len() {
            let prefix = components[..take].join(&b'/');
            if let Some(m) = self.match_branch(&prefix) {
                if best.as_ref().map_or(true, |b| m.branch.len() > b.branch.len()) {
                    best = Some(m);
                }
            }
        }
        best
    }
}

#[must_use]
pub fn is_declared_branch(rules: &[BranchifyRule], path: &[u8]) -> bool {
    Branchify::new(rules.to_vec()).match_branch(path).is_some()
}
