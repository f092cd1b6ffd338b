//! Fileop canonicalization: ordering and dominated-op elimination shared by
//! the dumpfile pipeline's phase 11 and the standalone `canonicalize`
//! command.

use std::collections::HashMap;

use bstr::BString;

use crate::event::Event;
use crate::fileop::FileOp;
use crate::repo::Repository;
use crate::selection::Selection;

/// Sorts a commit's fileops `M` before `R`/`C` before `D`, then drops any
/// op whose path is overwritten by a later op in the list. Idempotent:
/// applying this to an already-canonical list is a no-op.
pub fn canonicalize_ops(ops: &mut Vec<FileOp>) {
    // A `deleteall` wipes the whole tree as of where it occurs; anything
    // composed before it (e.g. by squash's push-forward transport) is moot.
    // Keep only the last `deleteall` and whatever was recorded after it.
    if let Some(last_da) = ops.iter().rposition(|op| matches!(op, FileOp::DeleteAll)) {
        ops.drain(..last_da);
    }

    ops.sort_by_key(rank);

    let mut last_write: HashMap<BString, usize> = HashMap::new();
    let mut keep = vec![true; ops.len()];
    for (i, op) in ops.iter().enumerate() {
        if let Some(path) = op.primary_path() {
            if let Some(&prev) = last_write.get(path) {
                keep[prev] = false;
            }
            last_write.insert(path.clone(), i);
        }
    }

    let mut i = 0;
    ops.retain(|_| {
        let k = keep[i];
        i += 1;
        k
    });
}

fn rank(op: &FileOp) -> u8 {
    match op {
        FileOp::DeleteAll => 0,
        FileOp::Modify { .. } | FileOp::Note { .. } => 1,
        FileOp::Rename { .. } | FileOp::Copy { .. } => 2,
        FileOp::Delete { .. } => 3,
    }
}

/// Canonicalizes every selected commit's fileop list in place.
pub fn canonicalize(repo: &mut Repository, selection: &Selection) {
    for id in selection.iter() {
        if let Event::Commit(c) = repo.event_mut(id) {
            canonicalize_ops(&mut c.fileops);
        }
    }
}
