//! Commit identity: action stamps, legacy ids, and content-addressed hashes.

use std::fmt::{self, Display, Formatter};

use bstr::BString;
use chrono::{DateTime, Utc};
use sha1::{Digest, Sha1};

/// `YYYY-MM-DDThh:mm:ssZ!committer-email[#n]`, the canonical human-readable
/// cross-repo commit identity. The `#n` disambiguator is only present when
/// two commits would otherwise share the same timestamp and email.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ActionStamp {
    pub timestamp: DateTime<Utc>,
    pub email: BString,
    pub disambiguator: Option<u32>,
}

impl ActionStamp {
    #[must_use]
    pub fn new(timestamp: DateTime<Utc>, email: impl Into<BString>) -> Self {
        ActionStamp {
            timestamp,
            email: email.into(),
            disambiguator: None,
        }
    }

    /// Bumps the timestamp by one second, used when two action stamps would
    /// otherwise collide (tag synthesis, revision timestamp floor-collision
    /// in dumpfile phase 5).
    #[must_use]
    pub fn bump(mut self) -> Self {
        self.timestamp += chrono::Duration::milliseconds(500);
        self
    }
}

impl Display for ActionStamp {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}!{}",
            self.timestamp.format("%Y-%m-%dT%H:%M:%SZ"),
            self.email,
        )?;
        if let Some(n) = self.disambiguator {
            write!(f, "#{n}")?;
        }
        Ok(())
    }
}

/// Disambiguates a batch of action stamps that share the same
/// timestamp+email by assigning `#n` suffixes in the order given.
pub fn disambiguate(stamps: &mut [ActionStamp]) {
    use std::collections::HashMap;
    let mut seen: HashMap<(DateTime<Utc>, BString), u32> = HashMap::new();
    // First pass: anything appearing more than once needs a suffix,
    // including its first occurrence.
    let mut counts: HashMap<(DateTime<Utc>, BString), u32> = HashMap::new();
    for s in stamps.iter() {
        *counts.entry((s.timestamp, s.email.clone())).or_default() += 1;
    }
    for s in stamps.iter_mut() {
        let key = (s.timestamp, s.email.clone());
        if counts[&key] > 1 {
            let n = seen.entry(key).or_insert(0);
            s.disambiguator = Some(*n);
            *n += 1;
        }
    }
}

/// A string preserved from the source VCS (e.g. Subversion `r1234`),
/// possibly suffixed `-split-<k>` after mixed-commit splitting divides one
/// revision's changes across several per-branch commits.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LegacyId(pub BString);

impl LegacyId {
    #[must_use]
    pub fn from_revision(rev: u64) -> Self {
        LegacyId(format!("r{rev}").into())
    }

    #[must_use]
    pub fn split(&self, k: u32) -> Self {
        LegacyId(format!("{}-split-{k}", self.0).into())
    }
}

impl Display for LegacyId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A content-addressed digest equivalent to the hash a DVCS would assign:
/// `sha1("<kind> <len>\0<content>")`. Used for blob [`dedup`](crate::repo)
/// and `hash` reporting; not guaranteed to match a real Git repository's
/// object ids unless the content and framing are bit-identical.
#[must_use]
pub fn hash_object(kind: &str, content: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(kind.as_bytes());
    hasher.update(b" ");
    hasher.update(content.len().to_string().as_bytes());
    hasher.update(b"\0");
    hasher.update(content);
    hex::encode(hasher.finalize())
}

#[must_use]
pub fn hash_blob(content: &[u8]) -> String {
    hash_object("blob", content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn action_stamp_display() {
        let ts = Utc.with_ymd_and_hms(2020, 1, 2, 3, 4, 5).unwrap();
        let stamp = ActionStamp::new(ts, "a@example.com");
        assert_eq!(stamp.to_string(), "2020-01-02T03:04:05Z!a@example.com");
    }

    #[test]
    fn disambiguates_collisions_only() {
        let ts = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        let mut stamps = vec![
            ActionStamp::new(ts, "a@example.com"),
            ActionStamp::new(ts, "a@example.com"),
            ActionStamp::new(ts, "b@example.com"),
        ];
        disambiguate(&mut stamps);
        assert_eq!(stamps[0].disambiguator, Some(0));
        assert_eq!(stamps[1].disambiguator, Some(1));
        assert_eq!(stamps[2].disambiguator, None);
    }

    #[test]
    fn blob_hash_matches_git_framing() {
        // `git hash-object` of the empty blob.
        assert_eq!(hash_blob(b""), "e69de29bb2d1d6434b8b29ae775ad8c2e48c5391");
    }
}
