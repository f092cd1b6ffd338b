//! Graft: splices a donor repository's history into this one below an
//! attachment commit, remapping the donor's branches into a prefixed
//! namespace so they don't collide with the host's own.

use std::collections::HashMap;

use bstr::BString;

use crate::event::{BlobId, Event, EventId};
use crate::fileop::FileOp;
use crate::repo::Repository;

fn prefix_branch(branch: &BString, prefix: &str) -> BString {
    let mut out = BString::from(prefix);
    out.push(b'/');
    out.extend_from_slice(branch);
    out
}

fn remap_blob(op: &mut FileOp, blob_remap: &HashMap<BlobId, BlobId>) {
    if let FileOp::Modify { blob, .. } = op {
        if let Some(new_id) = blob_remap.get(blob) {
            *blob = *new_id;
        }
    }
}

/// Copies every event and blob in `donor` into `repo`, prefixing donor
/// branch names with `branch_prefix`. Any donor commit that was itself
/// rootless (no parent, and no [`Commit::callouts`](crate::event::Commit::callouts)
/// of its own — i.e. a genuine root rather than a graft point from some
/// earlier splice) is attached as a child of `attach_at`. Donor commits
/// that already carried callouts keep them untouched: they name history
/// this splice still doesn't have, and resolving them is a separate
/// graft against whatever repository holds it.
pub fn graft(repo: &mut Repository, attach_at: EventId, donor: &Repository, branch_prefix: &str) {
    let mut blob_remap: HashMap<BlobId, BlobId> = HashMap::new();
    for blob in &donor.blobs {
        let new_id = repo.add_blob(blob.content.clone());
        blob_remap.insert(blob.id, new_id);
    }

    let mut event_remap: HashMap<EventId, EventId> = HashMap::new();
    for (old_idx, event) in donor.events.iter().enumerate() {
        let old_id = EventId(old_idx);
        let mut new_event = event.clone();
        match &mut new_event {
            Event::Commit(c) => {
                let was_root = c.parent.is_none() && c.callouts.is_empty();
                c.parent = c.parent.and_then(|p| event_remap.get(&p).copied());
                if was_root {
                    c.parent = Some(attach_at);
                }
                c.merge_parents =
                    c.merge_parents.iter().filter_map(|p| event_remap.get(p).copied()).collect();
                c.branch = prefix_branch(&c.branch, branch_prefix);
                for op in &mut c.fileops {
                    remap_blob(op, &blob_remap);
                }
                c.original_mark = None;
                c.legacy_id = None;
            }
            Event::Tag(t) => {
                if let Some(new_target) = event_remap.get(&t.target) {
                    t.target = *new_target;
                }
            }
            Event::Reset(r) => {
                r.target = r.target.and_then(|t| event_remap.get(&t).copied());
                r.branch = prefix_branch(&r.branch, branch_prefix);
            }
            Event::Passthrough(_) => {}
        }
        let new_id = repo.push_event(new_event);
        event_remap.insert(old_id, new_id);
    }
}
