//! The in-memory repository: the full event list plus the indices the
//! selection-set language and surgical primitives resolve references
//! against.

use std::collections::HashMap;

use bstr::BString;
use dashmap::DashMap;
use rayon::prelude::*;

use crate::event::{Blob, BlobId, Commit, Event, EventId};
use crate::ident::hash_blob;
use crate::pathmap::PathMap;

/// The full history under edit: an ordered event list plus the side tables
/// that let a selection expression or surgical primitive resolve a mark,
/// legacy id, or branch name to an [`EventId`] in O(1).
pub struct Repository {
    pub events: Vec<Event>,
    pub blobs: Vec<Blob>,
    mark_to_event: HashMap<u64, EventId>,
    legacy_to_event: HashMap<BString, EventId>,
    /// The event most recently seen on each branch, used while appending
    /// and by [`Repository::tip`].
    branch_tips: HashMap<BString, EventId>,
    next_blob_id: u64,
}

impl Repository {
    #[must_use]
    pub fn new() -> Self {
        Repository {
            events: Vec::new(),
            blobs: Vec::new(),
            mark_to_event: HashMap::new(),
            legacy_to_event: HashMap::new(),
            branch_tips: HashMap::new(),
            next_blob_id: 0,
        }
    }

    #[must_use]
    pub fn event(&self, id: EventId) -> &Event {
        &self.events[id.0]
    }

    pub fn event_mut(&mut self, id: EventId) -> &mut Event {
        &mut self.events[id.0]
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn add_blob(&mut self, content: BString) -> BlobId {
        let id = BlobId(self.next_blob_id);
        self.next_blob_id += 1;
        self.blobs.push(Blob { id, content, hash: None });
        id
    }

    #[must_use]
    pub fn blob(&self, id: BlobId) -> &Blob {
        &self.blobs[id.0 as usize]
    }

    pub fn push_event(&mut self, event: Event) -> EventId {
        let id = EventId(self.events.len());
        if let Some(branch) = event.branch() {
            self.branch_tips.insert(branch.clone(), id);
        }
        if let Event::Commit(c) = &event {
            if let Some(mark) = c.original_mark {
                self.mark_to_event.insert(mark, id);
            }
            if let Some(legacy) = &c.legacy_id {
                self.legacy_to_event.insert(legacy.0.clone(), id);
            }
        }
        self.events.push(event);
        id
    }

    #[must_use]
    pub fn resolve_mark(&self, mark: u64) -> Option<EventId> {
        self.mark_to_event.get(&mark).copied()
    }

    #[must_use]
    pub fn resolve_legacy_id(&self, id: &[u8]) -> Option<EventId> {
        self.legacy_to_event.get(id.as_ref() as &[u8]).copied()
    }

    #[must_use]
    pub fn tip(&self, branch: &[u8]) -> Option<EventId> {
        self.branch_tips.get(branch.as_ref() as &[u8]).copied()
    }

    /// Rebuilds the mark/legacy-id/branch-tip indices from scratch. Needed
    /// after a bulk structural edit (e.g. `surgery::reparent`) that
    /// splices events without going through [`push_event`].
    pub fn reindex(&mut self) {
        self.mark_to_event.clear();
        self.legacy_to_event.clear();
        self.branch_tips.clear();
        for (i, event) in self.events.iter().enumerate() {
            let id = EventId(i);
            if let Some(branch) = event.branch() {
                self.branch_tips.insert(branch.clone(), id);
            }
            if let Event::Commit(c) = event {
                if let Some(mark) = c.original_mark {
                    self.mark_to_event.insert(mark, id);
                }
                if let Some(legacy) = &c.legacy_id {
                    self.legacy_to_event.insert(legacy.0.clone(), id);
                }
            }
        }
    }

    /// Walks a commit's lineage (its `parent` chain) to compute the full
    /// set of live paths at that point, folding each ancestor's fileops
    /// into a [`PathMap`]. Results are not cached here; callers that need
    /// repeated manifests for nearby commits should memoize along the
    /// lineage themselves, since each step is a cheap persistent-map
    /// mutation once the parent's manifest is in hand.
    #[must_use]
    pub fn manifest(&self, at: EventId) -> PathMap<BlobId> {
        let chain = self.lineage(at);
        let mut map = PathMap::new();
        for id in chain {
            let Some(commit) = self.event(id).as_commit() else { continue };
            apply_fileops(&mut map, &commit.fileops);
        }
        map
    }

    /// The commit's own ancestry via `parent` only (not merge parents),
    /// root-first.
    #[must_use]
    pub fn lineage(&self, at: EventId) -> Vec<EventId> {
        let mut chain = Vec::new();
        let mut cur = Some(at);
        while let Some(id) = cur {
            chain.push(id);
            cur = self.event(id).as_commit().and_then(|c| c.parent);
        }
        chain.reverse();
        chain
    }

    /// Computes content hashes for every blob not yet hashed, in parallel.
    /// Used for `hash` reporting and [`dedup`](Repository::dedup).
    pub fn hash_blobs(&mut self) {
        let hashes: Vec<(usize, String)> = self
            .blobs
            .par_iter()
            .enumerate()
            .filter(|(_, b)| b.hash.is_none())
            .map(|(i, b)| (i, hash_blob(&b.content)))
            .collect();
        for (i, hash) in hashes {
            self.blobs[i].hash = Some(hash);
        }
    }

    /// Merges blobs with identical content hashes, rewriting every fileop
    /// that referenced a duplicate to point at its canonical [`BlobId`].
    /// The duplicate blob entries themselves are left in place (sparse) to
    /// avoid renumbering [`BlobId`]s; a subsequent [`gc`](Repository::gc)
    /// reclaims them.
    pub fn dedup(&mut self) {
        self.hash_blobs();
        let canonical: DashMap<&str, BlobId> = DashMap::new();
        let mut remap: HashMap<BlobId, BlobId> = HashMap::new();
        for blob in &self.blobs {
            let hash = blob.hash.as_deref().expect("hashed above");
            let canon = *canonical.entry(hash).or_insert(blob.id);
            if canon != blob.id {
                remap.insert(blob.id, canon);
            }
        }
        if remap.is_empty() {
            return;
        }
        for event in &mut self.events {
            if let Event::Commit(c) = event {
                for op in &mut c.fileops {
                    if let crate::fileop::FileOp::Modify { blob, .. } = op {
                        if let Some(canon) = remap.get(blob) {
                            *blob = *canon;
                        }
                    }
                }
            }
        }
    }

    /// Drops blob entries no fileop references any more, and compacts the
    /// event list, removing passthrough-only gaps left by deletions.
    /// Renumbers [`EventId`]s and [`BlobId`]s and reindexes.
    pub fn gc(&mut self) {
        let mut used_blobs = vec![false; self.blobs.len()];
        for event in &self.events {
            if let Event::Commit(c) = event {
                for op in &c.fileops {
                    if let crate::fileop::FileOp::Modify { blob, .. } = op {
                        used_blobs[blob.0 as usize] = true;
                    }
                }
            }
        }
        let mut blob_remap: HashMap<BlobId, BlobId> = HashMap::new();
        let mut new_blobs = Vec::new();
        for (old_idx, keep) in used_blobs.iter().enumerate() {
            if *keep {
                let old_id = BlobId(old_idx as u64);
                let new_id = BlobId(new_blobs.len() as u64);
                blob_remap.insert(old_id, new_id);
                let mut b = self.blobs[old_idx].clone_shallow();
                b.id = new_id;
                new_blobs.push(b);
            }
        }

        let mut event_remap: HashMap<EventId, EventId> = HashMap::new();
        for (old_idx, _) in self.events.iter().enumerate() {
            let old_id = EventId(old_idx);
            let new_id = EventId(event_remap.len());
            event_remap.insert(old_id, new_id);
        }

        for event in &mut self.events {
            if let Event::Commit(c) = event {
                c.parent = c.parent.and_then(|p| event_remap.get(&p).copied());
                c.merge_parents =
                    c.merge_parents.iter().filter_map(|p| event_remap.get(p).copied()).collect();
                for op in &mut c.fileops {
                    if let crate::fileop::FileOp::Modify { blob, .. } = op {
                        if let Some(new_id) = blob_remap.get(blob) {
                            *blob = *new_id;
                        }
                    }
                }
            }
            if let Event::Tag(t) = event {
                if let Some(new_id) = event_remap.get(&t.target) {
                    t.target = *new_id;
                }
            }
            if let Event::Reset(r) = event {
                r.target = r.target.and_then(|t| event_remap.get(&t).copied());
            }
        }

        self.blobs = new_blobs;
        self.reindex();
    }

    /// Drops the events at `remove` and renumbers every surviving
    /// [`EventId`]. Callers must have already rewired any commit/tag/reset
    /// that referenced a dropped event onto a surviving one (e.g. squash's
    /// reparent-before-remove step) — a reference left dangling into
    /// `remove` is silently dropped here rather than treated as an error,
    /// since the caller is responsible for topology, not this helper.
    pub fn remove_events(&mut self, remove: &std::collections::HashSet<EventId>) {
        let mut event_remap: HashMap<EventId, EventId> = HashMap::new();
        let mut new_events = Vec::with_capacity(self.events.len());
        for (old_idx, event) in self.events.drain(..).enumerate() {
            let old_id = EventId(old_idx);
            if remove.contains(&old_id) {
                continue;
            }
            event_remap.insert(old_id, EventId(new_events.len()));
            new_events.push(event);
        }

        for event in &mut new_events {
            match event {
                Event::Commit(c) => {
                    c.parent = c.parent.and_then(|p| event_remap.get(&p).copied());
                    c.merge_parents =
                        c.merge_parents.iter().filter_map(|p| event_remap.get(p).copied()).collect();
                }
                Event::Tag(t) => {
                    if let Some(new_target) = event_remap.get(&t.target) {
                        t.target = *new_target;
                    }
                }
                Event::Reset(r) => {
                    r.target = r.target.and_then(|t| event_remap.get(&t).copied());
                }
                Event::Passthrough(_) => {}
            }
        }

        self.events = new_events;
        self.reindex();
    }
}

impl Default for Repository {
    fn default() -> Self {
        Self::new()
    }
}

impl Blob {
    fn clone_shallow(&self) -> Blob {
        Blob { id: self.id, content: self.content.clone(), hash: self.hash.clone() }
    }
}

fn apply_fileops(map: &mut PathMap<BlobId>, ops: &[crate::fileop::FileOp]) {
    use crate::fileop::FileOp;
    for op in ops {
        match op {
            FileOp::Modify { path, blob, .. } => map.set(path, *blob),
            FileOp::Delete { path } => map.remove_subtree(path),
            FileOp::Rename { source, target } => map.rename(source, target),
            FileOp::Copy { source, target } => map.copy_from(source, target),
            FileOp::DeleteAll => *map = PathMap::new(),
            // A note annotates an object; it has no effect on tree content.
            FileOp::Note { .. } => {}
        }
    }
}

#[must_use]
pub fn apply_fileops_for_test(ops: &[crate::fileop::FileOp]) -> PathMap<BlobId> {
    let mut map = PathMap::new();
    apply_fileops(&mut map, ops);
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{Commit, PersonIdent};
    use crate::ident::ActionStamp;
    use chrono::Utc;

    fn stamp() -> ActionStamp {
        ActionStamp::new(Utc::now(), "a@example.com")
    }

    fn person() -> PersonIdent {
        PersonIdent { name: "A".into(), email: "a@example.com".into() }
    }

    #[test]
    fn manifest_folds_lineage() {
        let mut repo = Repository::new();
        let blob = repo.add_blob("hello".into());
        let commit = Commit {
            branch: "refs/heads/main".into(),
            author: person(),
            author_stamp: stamp(),
            committer: person(),
            committer_stamp: stamp(),
            message: "init".into(),
            parent: None,
            merge_parents: vec![],
            fileops: vec![crate::fileop::FileOp::Modify {
                path: "README".into(),
                mode: fast_export::FileMode::File,
                blob,
            }],
            legacy_id: None,
            original_mark: Some(1),
            callouts: vec![],
        };
        let id = repo.push_event(Event::Commit(commit));
        let manifest = repo.manifest(id);
        assert_eq!(manifest.get(b"README"), Some(&blob));
    }

    #[test]
    fn resolve_mark_after_push() {
        let mut repo = Repository::new();
        let blob = repo.add_blob("x".into());
        let commit = Commit {
            branch: "refs/heads/main".into(),
            author: person(),
            author_stamp: stamp(),
            committer: person(),
            committer_stamp: stamp(),
            message: "m".into(),
            parent: None,
            merge_parents: vec![],
            fileops: vec![crate::fileop::FileOp::Modify {
                path: "a".into(),
                mode: fast_export::FileMode::File,
                blob,
            }],
            legacy_id: None,
            original_mark: Some(42),
            callouts: vec![],
        };
        let id = repo.push_event(Event::Commit(commit));
        assert_eq!(repo.resolve_mark(42), Some(id));
    }

    #[test]
    fn gc_drops_unreferenced_blobs() {
        let mut repo = Repository::new();
        let _unused = repo.add_blob("orphan".into());
        let used = repo.add_blob("kept".into());
        let commit = Commit {
            branch: "refs/heads/main".into(),
            author: person(),
            author_stamp: stamp(),
            committer: person(),
            committer_stamp: stamp(),
            message: "m".into(),
            parent: None,
            merge_parents: vec![],
            fileops: vec![crate::fileop::FileOp::Modify {
                path: "a".into(),
                mode: fast_export::FileMode::File,
                blob: used,
            }],
            legacy_id: None,
            original_mark: None,
            callouts: vec![],
        };
        repo.push_event(Event::Commit(commit));
        repo.gc();
        assert_eq!(repo.blobs.len(), 1);
    }
}
