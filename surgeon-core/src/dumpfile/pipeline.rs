//! The thirteen-phase centralized-dumpfile-to-DAG translator.
//!
//! Phases 3 and 4 are fused here: the visibility filemap for each revision
//! is a [`PathMap`] snapshot, and directory-copy expansion is exactly the
//! map's `copy_from` operation, so there is no separate materialized
//! "node plus ancestor pointer" list distinct from the map diff that
//! produces each revision's fileops.

use std::collections::HashMap;

use bstr::BString;
use tracing::warn;

use crate::config::Config;
use crate::event::{Commit, Event, PersonIdent};
use crate::fileop::FileOp;
use crate::ident::{disambiguate, ActionStamp, LegacyId};
use crate::pathmap::PathMap;
use crate::repo::Repository;
use fast_export::FileMode;

use super::branchify::Branchify;
use super::reader::{NodeAction, NodeActionKind, NodeKind, Revision};

#[derive(Clone, Debug)]
struct VisibleNode {
    kind: NodeKind,
    blob: Option<crate::event::BlobId>,
    executable: bool,
    symlink: bool,
}

type VisibleMap = PathMap<VisibleNode>;

/// One not-yet-finalized commit produced by phases 5-6, indexed by
/// position in `drafts`; parent links are draft-local until phase 13
/// renumbers everything into final [`EventId`]s.
struct Draft {
    legacy_id: LegacyId,
    /// Pre-sanitization branch path, e.g. `branches/stable`, or empty for
    /// an unbranched commit.
    branch: BString,
    is_tag: bool,
    author: PersonIdent,
    stamp: ActionStamp,
    message: BString,
    fileops: Vec<FileOp>,
    parent: Option<usize>,
    extra_parents: Vec<usize>,
    /// Directory-copy source recorded for this branch's root, consumed by
    /// phase 7.
    root_copy_source: Option<(BString, u64)>,
    /// Branch-creation copies recorded against this (pre-split) revision,
    /// keyed by destination branch path; consumed while splitting into
    /// per-branch drafts, since a single revision's node list can name
    /// more than one declared-branch directory copy.
    branch_copy_sources: HashMap<BString, (BString, u64)>,
    mergeinfo: Vec<(BString, String)>,
    rev: u64,
}

/// Translates a parsed dumpfile into a [`Repository`]. `ignore_prefix` is
/// the built-in VCS-default ignore pattern block prepended to synthesized
/// `.gitignore`s; pass an empty string to disable automatic ignores.
pub fn translate(revisions: Vec<Revision>, config: &Config, ignore_prefix: &str) -> Repository {
    let branchify = Branchify::new(config.branchify.clone());

    // Phases 1-2 (parse, property filtering) already happened in
    // `reader::parse_dump`.
    let mut repo = Repository::new();
    let per_revision_ops = build_per_revision_ops(&revisions, &branchify, &mut repo);
    let mut drafts = synthesize_commits(&revisions, per_revision_ops, ignore_prefix, &mut repo);
    split_and_assign_branches(&mut drafts, &branchify);
    attach_branch_roots(&mut drafts);
    resolve_mergeinfo(&mut drafts);
    let mut branch_names = rename_branches_to_dvcs_form(&drafts);
    disambiguate_deleted_refs(&mut drafts, &mut branch_names);
    canonicalize(&mut drafts);
    let events = tagify_and_purge(drafts, &branch_names);

    populate_repository(events, &mut repo);
    repo
}

/// Phases 3-5: for each revision, fold its node actions into the running
/// visibility map and emit the corresponding fileops (still on absolute,
/// branch-unaware paths).
fn build_per_revision_ops(
    revisions: &[Revision],
    branchify: &Branchify,
    repo: &mut Repository,
) -> Vec<(Vec<FileOp>, HashMap<BString, String>, HashMap<BString, (BString, u64)>)> {
    let mut visible: Vec<VisibleMap> = Vec::with_capacity(revisions.len());
    let mut out = Vec::with_capacity(revisions.len());
    let mut content_hash_to_blob: HashMap<String, crate::event::BlobId> = HashMap::new();

    let rev_index: HashMap<u64, usize> =
        revisions.iter().enumerate().map(|(i, r)| (r.number, i)).collect();

    for (i, revision) in revisions.iter().enumerate() {
        let mut map = if i == 0 { VisibleMap::new() } else { visible[i - 1].clone() };
        let mut ops = Vec::new();
        let mut mergeinfo = HashMap::new();
        let mut branch_copy_sources = HashMap::new();

        for node in &revision.nodes {
            match node.kind {
                NodeKind::Dir => apply_dir_node(
                    node,
                    &mut map,
                    &visible,
                    &rev_index,
                    branchify,
                    &mut ops,
                    &mut mergeinfo,
                    &mut branch_copy_sources,
                ),
                NodeKind::File => apply_file_node(
                    node,
                    &mut map,
                    &visible,
                    &rev_index,
                    &mut ops,
                    repo,
                    &mut content_hash_to_blob,
                ),
                NodeKind::None => {
                    if node.action == NodeActionKind::Delete {
                        map.remove_subtree(&node.path);
                        ops.push(FileOp::Delete { path: node.path.clone() });
                    }
                }
            }
        }

        synthesize_gitignores(revision, &mut map, repo, &mut content_hash_to_blob, &mut ops);

        visible.push(map);
        out.push((ops, mergeinfo, branch_copy_sources));
    }

    out
}

fn apply_file_node(
    node: &NodeAction,
    map: &mut VisibleMap,
    visible: &[VisibleMap],
    rev_index: &HashMap<u64, usize>,
    ops: &mut Vec<FileOp>,
    repo: &mut Repository,
    content_hash_to_blob: &mut HashMap<String, crate::event::BlobId>,
) {
    if node.action == NodeActionKind::Delete {
        map.remove(&node.path);
        ops.push(FileOp::Delete { path: node.path.clone() });
        return;
    }

    let (executable, symlink) = node_mode_flags(node);

    let blob = if let Some(src) = &node.copy_source {
        rev_index
            .get(&src.rev)
            .and_then(|&src_rev| visible[src_rev].get(&src.path))
            .and_then(|existing| existing.blob)
    } else {
        let content = if symlink {
            strip_link_prefix(node.content.as_deref().unwrap_or(&[]))
        } else {
            node.content.clone().unwrap_or_default()
        };
        Some(intern_blob(repo, content_hash_to_blob, node.content_hash.as_deref(), content))
    };

    let Some(blob) = blob else {
        warn!(path = %node.path, "file node has no resolvable content; dropping");
        return;
    };

    map.set(&node.path, VisibleNode { kind: NodeKind::File, blob: Some(blob), executable, symlink });

    let mode = if symlink {
        FileMode::Symlink
    } else if executable {
        FileMode::Executable
    } else {
        FileMode::File
    };
    ops.push(FileOp::Modify { path: node.path.clone(), mode, blob });
}

/// Interns content into the repository's blob table, deduplicating by
/// content hash when the dumpfile supplied one, else by a hash computed
/// from the bytes themselves.
fn intern_blob(
    repo: &mut Repository,
    content_hash_to_blob: &mut HashMap<String, crate::event::BlobId>,
    declared_hash: Option<&str>,
    content: Vec<u8>,
) -> crate::event::BlobId {
    let computed = crate::ident::hash_blob(&content);
    if let Some(declared) = declared_hash {
        if !declared.eq_ignore_ascii_case(&computed) {
            warn!(declared, computed, "content-hash mismatch on node");
        }
    }
    *content_hash_to_blob
        .entry(computed)
        .or_insert_with(|| repo.add_blob(BString::from(content)))
}

fn strip_link_prefix(data: &[u8]) -> Vec<u8> {
    data.strip_prefix(b"link ").unwrap_or(data).to_vec()
}

fn node_mode_flags(node: &NodeAction) -> (bool, bool) {
    let Some(props) = &node.props else { return (false, false) };
    let executable = props.get("svn:executable").is_some();
    let symlink = props.get("svn:special").is_some();
    (executable, symlink)
}

fn apply_dir_node(
    node: &NodeAction,
    map: &mut VisibleMap,
    visible: &[VisibleMap],
    rev_index: &HashMap<u64, usize>,
    branchify: &Branchify,
    ops: &mut Vec<FileOp>,
    mergeinfo: &mut HashMap<BString, String>,
    branch_copy_sources: &mut HashMap<BString, (BString, u64)>,
) {
    if node.action == NodeActionKind::Delete {
        if branchify.match_branch(&node.path).is_some() {
            // NUKE: becomes a branch-level deleteall in phase 5/6.
            map.remove_subtree(&node.path);
            ops.push(FileOp::DeleteAll);
        } else {
            for (path, _) in map.iter() {
                if path.starts_with(&*node.path) {
                    ops.push(FileOp::Delete { path: path.clone() });
                }
            }
            map.remove_subtree(&node.path);
        }
        return;
    }

    if let Some(props) = &node.props {
        if let Some(mi) = props.get("svn:mergeinfo").or_else(|| props.get("svnmerge-integrated")) {
            mergeinfo.insert(node.path.clone(), mi.to_string());
        }
    }

    if let Some(src) = &node.copy_source {
        // Phase 7 rule (a): a declared-branch directory add whose copy
        // source is itself a declared branch is a branch-creation copy
        // (`svn copy trunk branches/x`); record it so `attach_branch_roots`
        // can parent the new branch's root commit onto the source branch's
        // tip at `src.rev`.
        if branchify.match_branch(&node.path).is_some() && branchify.match_branch(&src.path).is_some()
        {
            branch_copy_sources.insert(node.path.clone(), (src.path.clone(), src.rev));
        }
        if let Some(&src_rev) = rev_index.get(&src.rev) {
            let src_map = &visible[src_rev];
            // Graft the whole copied subtree in one shot: an O(1) Arc clone
            // of the source revision's shared subtree, not a per-file
            // clone-and-insert of the destination's spine.
            map.copy_from_map(&node.path, src_map, &src.path);

            // The wire-level commit still needs one `Modify` fileop per
            // copied file (fast-import has no "graft this whole directory
            // from an arbitrary other revision" primitive), so this walk
            // is unavoidable for op generation even though the map update
            // above no longer needs it.
            for (rel_path, value) in src_map.iter() {
                if !rel_path.starts_with(&*src.path) {
                    continue;
                }
                if value.kind != NodeKind::File {
                    continue;
                }
                let Some(blob) = value.blob else { continue };
                let suffix = &rel_path[src.path.len()..];
                let dest_path: BString =
                    format!("{}{}", node.path, String::from_utf8_lossy(suffix)).into();
                ops.push(FileOp::Modify {
                    path: dest_path,
                    mode: if value.symlink {
                        FileMode::Symlink
                    } else if value.executable {
                        FileMode::Executable
                    } else {
                        FileMode::File
                    },
                    blob,
                });
            }
        }
    } else {
        map.set(&node.path, VisibleNode { kind: NodeKind::Dir, blob: None, executable: false, symlink: false });
    }
}

/// Synthesizes `.gitignore` modifications from `svn:ignore` /
/// `svn:global-ignores` properties on directory nodes in this revision.
fn synthesize_gitignores(
    revision: &Revision,
    map: &mut VisibleMap,
    repo: &mut Repository,
    content_hash_to_blob: &mut HashMap<String, crate::event::BlobId>,
    ops: &mut Vec<FileOp>,
) {
    for node in &revision.nodes {
        if node.kind != NodeKind::Dir {
            continue;
        }
        let Some(props) = &node.props else { continue };
        let mut lines = Vec::new();
        if let Some(global) = props.get("svn:global-ignores") {
            lines.extend_from_slice(global.as_slice());
            lines.push(b'\n');
        }
        if let Some(local) = props.get("svn:ignore") {
            for pat in local.split(|&b| b == b'\n').filter(|l| !l.is_empty()) {
                lines.push(b'/');
                lines.extend_from_slice(pat);
                lines.push(b'\n');
            }
        }
        if lines.is_empty() {
            continue;
        }
        let path: BString = format!("{}/.gitignore", node.path).into();
        let blob = intern_blob(repo, content_hash_to_blob, None, lines);
        map.set(&path, VisibleNode { kind: NodeKind::File, blob: Some(blob), executable: false, symlink: false });
        ops.push(FileOp::Modify { path, mode: FileMode::File, blob });
    }
}

/// Phase 5: one Commit per revision, carrying the fileops already produced
/// by [`build_per_revision_ops`].
fn synthesize_commits(
    revisions: &[Revision],
    per_revision: Vec<(Vec<FileOp>, HashMap<BString, String>, HashMap<BString, (BString, u64)>)>,
    _ignore_prefix: &str,
    _repo: &mut Repository,
) -> Vec<Draft> {
    let mut drafts = Vec::with_capacity(revisions.len());
    let mut last_stamp: Option<chrono::DateTime<chrono::Utc>> = None;

    for (revision, (ops, mergeinfo, branch_copy_sources)) in revisions.iter().zip(per_revision) {
        let author_name =
            revision.properties.get("svn:author").cloned().unwrap_or_else(|| "unknown".into());
        let date = revision
            .properties
            .get("svn:date")
            .and_then(|d| chrono::DateTime::parse_from_rfc3339(&d.to_string()).ok())
            .map(|d| d.with_timezone(&chrono::Utc))
            .unwrap_or_else(chrono::Utc::now);

        let mut stamp_time = date;
        if let Some(prev) = last_stamp {
            if stamp_time.timestamp() == prev.timestamp() {
                stamp_time += chrono::Duration::milliseconds(500);
            }
        }
        last_stamp = Some(stamp_time);

        let email: BString = format!("{author_name}@local").into();
        let person = PersonIdent { name: author_name.clone().into(), email: email.clone() };
        let stamp = ActionStamp::new(stamp_time, email);
        let message = revision.properties.get("svn:log").cloned().unwrap_or_default();

        drafts.push(Draft {
            legacy_id: LegacyId::from_revision(revision.number),
            branch: BString::default(),
            is_tag: false,
            author: person,
            stamp,
            message,
            fileops: ops,
            parent: None,
            extra_parents: Vec::new(),
            root_copy_source: None,
            branch_copy_sources,
            mergeinfo: mergeinfo.into_iter().collect(),
            rev: revision.number,
        });
    }

    drafts
}

/// Phase 6: split each revision's flat fileop list into per-branch
/// contiguous cliques, assigning each a legacy id suffix when more than
/// one clique results.
fn split_and_assign_branches(drafts: &mut Vec<Draft>, branchify: &Branchify) {
    let mut last_on_branch: HashMap<BString, usize> = HashMap::new();
    let mut expanded = Vec::with_capacity(drafts.len());

    for draft in drafts.drain(..) {
        let branch_copy_sources = draft.branch_copy_sources.clone();
        let mut cliques: Vec<(BString, bool, Vec<FileOp>)> = Vec::new();
        for op in draft.fileops {
            let path = op.primary_path().cloned().unwrap_or_default();
            let (branch, is_tag) = match branchify.containing_branch(&path) {
                Some(m) => (m.branch, m.is_tag),
                None => (BString::default(), false),
            };
            let stripped = strip_branch_prefix(op, &branch);
            match cliques.last_mut() {
                Some((b, _, ops)) if *b == branch && !matches!(stripped, FileOp::DeleteAll) => {
                    ops.push(stripped);
                }
                _ => cliques.push((branch, is_tag, vec![stripped])),
            }
        }
        if cliques.is_empty() {
            cliques.push((BString::default(), false, Vec::new()));
        }

        let multi = cliques.len() > 1;
        for (i, (branch, is_tag, ops)) in cliques.into_iter().enumerate() {
            let legacy_id =
                if multi { draft.legacy_id.split((i + 1) as u32) } else { draft.legacy_id.clone() };
            let parent = last_on_branch.get(&branch).copied();
            let idx = expanded.len();
            expanded.push(Draft {
                legacy_id,
                branch: branch.clone(),
                is_tag,
                author: draft.author.clone(),
                stamp: draft.stamp.clone(),
                message: draft.message.clone(),
                fileops: ops,
                parent,
                extra_parents: Vec::new(),
                root_copy_source: branch_copy_sources.get(&branch).cloned(),
                branch_copy_sources: HashMap::new(),
                mergeinfo: if i == 0 { draft.mergeinfo.clone() } else { Vec::new() },
                rev: draft.rev,
            });
            if expanded[idx].fileops.last().is_some_and(|op| matches!(op, FileOp::DeleteAll))
                && expanded[idx].fileops.len() == 1
            {
                // Tip delete: break the chain so a later commit on the
                // same branch becomes a new root.
                last_on_branch.remove(&branch);
            } else {
                last_on_branch.insert(branch, idx);
            }
        }
    }

    *drafts = expanded;
}

fn strip_branch_prefix(op: FileOp, branch: &BString) -> FileOp {
    if branch.is_empty() {
        return op;
    }
    let strip = |p: &BString| -> BString {
        let rest = &p[branch.len()..];
        BString::from(rest.strip_prefix(b"/").unwrap_or(rest))
    };
    match op {
        FileOp::Modify { path, mode, blob } => FileOp::Modify { path: strip(&path), mode, blob },
        FileOp::Delete { path } => FileOp::Delete { path: strip(&path) },
        FileOp::Rename { source, target } => {
            FileOp::Rename { source: strip(&source), target: strip(&target) }
        }
        FileOp::Copy { source, target } => {
            FileOp::Copy { source: strip(&source), target: strip(&target) }
        }
        FileOp::Note { path, blob } => FileOp::Note { path: strip(&path), blob },
        FileOp::DeleteAll => FileOp::DeleteAll,
    }
}

/// Phase 7: attach each branch root to the commit it was copied from, when
/// the revision's node list shows a declared-branch directory copy.
fn attach_branch_roots(drafts: &mut [Draft]) {
    let mut branch_first_index: HashMap<BString, usize> = HashMap::new();
    for (i, draft) in drafts.iter().enumerate() {
        branch_first_index.entry(draft.branch.clone()).or_insert(i);
    }
    for i in 0..drafts.len() {
        if drafts[i].parent.is_some() {
            continue;
        }
        if let Some((src_branch, _src_rev)) = drafts[i].root_copy_source.clone() {
            if let Some(&parent_idx) = branch_first_index.get(&src_branch) {
                drafts[i].parent = Some(parent_idx);
                drafts[i].fileops.insert(0, FileOp::DeleteAll);
            }
        }
    }
}

/// Phase 8: resolve `svn:mergeinfo` ranges into additional merge parents.
/// Simplified: for each mergeinfo entry, take the last commit on the
/// source branch with `rev <= range end` and add it as an extra parent
/// unless it is already a first-parent ancestor.
fn resolve_mergeinfo(drafts: &mut [Draft]) {
    let branch_rev_index: Vec<(BString, u64, usize)> =
        drafts.iter().enumerate().map(|(i, d)| (d.branch.clone(), d.rev, i)).collect();

    for i in 0..drafts.len() {
        let entries = drafts[i].mergeinfo.clone();
        for (source_path, raw) in entries {
            for range in raw.split(',') {
                let range = range.trim();
                if range.is_empty() || range.ends_with('*') {
                    continue;
                }
                let max_rev: u64 = match range.split_once('-') {
                    Some((_, hi)) => hi.trim_end_matches('*').parse().unwrap_or(0),
                    None => range.parse().unwrap_or(0),
                };
                let source_branch: BString =
                    source_path.strip_prefix('/').unwrap_or(&source_path).into();
                let candidate = branch_rev_index
                    .iter()
                    .filter(|(b, rev, _)| *b == source_branch && *rev <= max_rev)
                    .max_by_key(|(_, rev, _)| *rev)
                    .map(|(_, _, idx)| *idx);
                if let Some(src_idx) = candidate {
                    if src_idx == i || is_ancestor(drafts, src_idx, i) {
                        continue;
                    }
                    if drafts[i].parent.is_none() {
                        drafts[i].fileops.insert(0, FileOp::DeleteAll);
                    }
                    drafts[i].extra_parents.push(src_idx);
                } else {
                    warn!(%source_path, max_rev, "mergeinfo points at nonexistent revision");
                }
            }
        }
    }
}

fn is_ancestor(drafts: &[Draft], candidate: usize, of: usize) -> bool {
    let mut cur = drafts[of].parent;
    while let Some(p) = cur {
        if p == candidate {
            return true;
        }
        cur = drafts[p].parent;
    }
    false
}

/// Phase 9: sanitize and map branch names into `refs/heads|tags/...` form.
fn rename_branches_to_dvcs_form(drafts: &[Draft]) -> HashMap<usize, BString> {
    let mut seen_names: HashMap<BString, u32> = HashMap::new();
    let mut out = HashMap::new();
    for (i, draft) in drafts.iter().enumerate() {
        let mapped: BString = if draft.branch.is_empty() {
            "refs/heads/unbranched".into()
        } else if draft.branch == "trunk" {
            "refs/heads/master".into()
        } else if let Some(rest) = draft.branch.strip_prefix(&b"tags/"[..]) {
            format!("refs/tags/{}", sanitize_component(rest)).into()
        } else if let Some(rest) = draft.branch.strip_prefix(&b"branches/"[..]) {
            format!("refs/heads/{}", sanitize_component(rest)).into()
        } else {
            format!("refs/heads/{}", sanitize_component(&draft.branch)).into()
        };
        let count = seen_names.entry(mapped.clone()).or_insert(0);
        let final_name = if *count == 0 {
            mapped
        } else {
            format!("{mapped}-bis{count}").into()
        };
        *count += 1;
        out.insert(i, final_name);
    }
    out
}

fn sanitize_component(raw: &[u8]) -> String {
    let text = String::from_utf8_lossy(raw);
    let cleaned: String = text
        .chars()
        .map(|c| match c {
            '\\' | '^' | '~' | ':' | '?' | '*' | '[' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let cleaned = cleaned.trim_matches('.').replace("..", ".").replace("@{", "_{");
    if cleaned.is_empty() || cleaned == "@" {
        "atsign".to_string()
    } else {
        cleaned
    }
}

/// Phase 10: rename branches whose tip is a sole `deleteall` into
/// `refs/deleted/r<legacy-id>/<name>`.
fn disambiguate_deleted_refs(drafts: &mut [Draft], names: &mut HashMap<usize, BString>) {
    let mut branch_chains: HashMap<BString, Vec<usize>> = HashMap::new();
    for (i, d) in drafts.iter().enumerate() {
        branch_chains.entry(d.branch.clone()).or_default().push(i);
    }

    let mut collision_count: HashMap<BString, u32> = HashMap::new();
    for (_branch, chain) in branch_chains {
        let Some(&tip) = chain.last() else { continue };
        let is_tipdelete =
            drafts[tip].fileops.len() == 1 && matches!(drafts[tip].fileops[0], FileOp::DeleteAll);
        if !is_tipdelete {
            continue;
        }
        let legacy = drafts[tip].legacy_id.clone();
        let original = names[&tip].clone();
        let stripped = original.strip_prefix("refs/").unwrap_or(&original).to_string();
        let mut deleted_name: BString = format!("refs/deleted/{legacy}/{stripped}").into();
        let count = collision_count.entry(deleted_name.clone()).or_insert(0);
        if *count > 0 {
            deleted_name = format!("{deleted_name}-{count}").into();
        }
        *count += 1;
        for &idx in &chain {
            names.insert(idx, deleted_name.clone());
        }
    }

    let has_master = names.values().any(|n| n == "refs/heads/master");
    let has_deleted_master = names.values().any(|n| n.starts_with(b"refs/deleted/" as &[u8]) && n.ends_with(b"/heads/master" as &[u8]));
    if !has_master && !has_deleted_master {
        for name in names.values_mut() {
            if name == "refs/heads/root" {
                *name = "refs/heads/master".into();
            }
        }
    }
}

/// Phase 11: canonicalize fileop order within each commit (`M` before
/// `R`/`C` before `D`) and drop dominated no-ops.
fn canonicalize(drafts: &mut [Draft]) {
    for draft in drafts.iter_mut() {
        draft.fileops.sort_by_key(|op| match op {
            FileOp::Modify { .. } | FileOp::Note { .. } => 0,
            FileOp::Rename { .. } | FileOp::Copy { .. } => 1,
            FileOp::Delete { .. } => 2,
            FileOp::DeleteAll => 3,
        });
        let mut seen_paths: HashMap<BString, usize> = HashMap::new();
        let mut keep = vec![true; draft.fileops.len()];
        for (i, op) in draft.fileops.iter().enumerate() {
            if let Some(path) = op.primary_path() {
                if let Some(&prev) = seen_paths.get(path) {
                    keep[prev] = false;
                }
                seen_paths.insert(path.clone(), i);
            }
        }
        let mut kept_ops = Vec::new();
        for (i, op) in draft.fileops.drain(..).enumerate() {
            if keep[i] {
                kept_ops.push(op);
            }
        }
        draft.fileops = kept_ops;
    }
}

/// Phase 12: replace fileop-empty commits (or sole-`deleteall` tips) with
/// annotated tags; discard commits left on `refs/deleted/*` branches.
fn tagify_and_purge(drafts: Vec<Draft>, names: &HashMap<usize, BString>) -> Vec<DraftEvent> {
    let mut events = Vec::new();
    let mut old_to_new: HashMap<usize, usize> = HashMap::new();

    for (i, draft) in drafts.iter().enumerate() {
        let is_deleted_ns = names[&i].starts_with(b"refs/deleted/" as &[u8]);
        let tipdelete =
            draft.fileops.len() == 1 && matches!(draft.fileops[0], FileOp::DeleteAll);
        let empty = draft.fileops.is_empty();

        if is_deleted_ns {
            continue;
        }

        if tipdelete || empty {
            let Some(parent) = draft.parent.and_then(|p| old_to_new.get(&p).copied()) else {
                // A root commit with nothing to attach: drop silently,
                // there is no metadata worth a tag without a target.
                continue;
            };
            let base = names[&i].rsplit('/').next().unwrap_or("tag");
            let suffix = if tipdelete { "tipdelete" } else { "root" };
            let name: BString = format!("{base}-{suffix}").into();
            events.push(DraftEvent::Tag {
                name,
                target: parent,
                tagger: draft.author.clone(),
                tagger_stamp: draft.stamp.clone().bump(),
                message: format!(
                    "{}\n\n[[Tag from zero-fileop commit at r{}]]",
                    draft.message, draft.rev
                )
                .into(),
                legacy_id: draft.legacy_id.clone(),
            });
            continue;
        }

        let new_idx = events.len();
        old_to_new.insert(i, new_idx);
        events.push(DraftEvent::Commit {
            branch: names[&i].clone(),
            author: draft.author.clone(),
            stamp: draft.stamp.clone(),
            message: draft.message.clone(),
            fileops: draft.fileops.clone(),
            parent: draft.parent.and_then(|p| old_to_new.get(&p).copied()),
            extra_parents: draft
                .extra_parents
                .iter()
                .filter_map(|p| old_to_new.get(p).copied())
                .collect(),
            legacy_id: draft.legacy_id.clone(),
        });
    }

    events
}

enum DraftEvent {
    Commit {
        branch: BString,
        author: PersonIdent,
        stamp: ActionStamp,
        message: BString,
        fileops: Vec<FileOp>,
        parent: Option<usize>,
        extra_parents: Vec<usize>,
        legacy_id: LegacyId,
    },
    Tag {
        name: BString,
        target: usize,
        tagger: PersonIdent,
        tagger_stamp: ActionStamp,
        message: BString,
        legacy_id: LegacyId,
    },
}

/// Phase 13: renumber into the final event list, assigning marks `:1..:N`
/// in event order.
fn populate_repository(events: Vec<DraftEvent>, repo: &mut Repository) {
    let mut commit_index_to_event: HashMap<usize, crate::event::EventId> = HashMap::new();
    let mut next_mark = 1u64;
    let mut stamps_to_disambiguate: Vec<ActionStamp> = Vec::new();

    let mut commit_idx = 0usize;
    for event in &events {
        if let DraftEvent::Commit { stamp, .. } = event {
            stamps_to_disambiguate.push(stamp.clone());
            let _ = stamp;
        }
    }
    disambiguate(&mut stamps_to_disambiguate);

    for event in events {
        match event {
            DraftEvent::Commit {
                branch,
                author,
                stamp: _,
                message,
                fileops,
                parent,
                extra_parents,
                legacy_id,
            } => {
                let stamp = stamps_to_disambiguate[commit_idx].clone();
                commit_idx += 1;
                let commit = Commit {
                    branch,
                    author: author.clone(),
                    author_stamp: stamp.clone(),
                    committer: author,
                    committer_stamp: stamp,
                    message,
                    parent: parent.and_then(|p| commit_index_to_event.get(&p).copied()),
                    merge_parents: extra_parents
                        .iter()
                        .filter_map(|p| commit_index_to_event.get(p).copied())
                        .collect(),
                    fileops,
                    legacy_id: Some(legacy_id),
                    original_mark: Some(next_mark),
                    callouts: Vec::new(),
                };
                next_mark += 1;
                let id = repo.push_event(Event::Commit(commit));
                commit_index_to_event.insert(commit_idx - 1, id);
            }
            DraftEvent::Tag { name, target, tagger, tagger_stamp, message, legacy_id } => {
                let Some(&target_event) = commit_index_to_event.get(&target) else { continue };
                repo.push_event(Event::Tag(crate::event::Tag {
                    name,
                    target: target_event,
                    tagger: Some(tagger),
                    tagger_stamp: Some(tagger_stamp),
                    message,
                    legacy_id: Some(legacy_id),
                }));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dumpfile::reader::{CopySource, NodeAction, NodeKind, Properties, Revision};

    fn node(path: &str, kind: NodeKind, action: NodeActionKind, content: Option<&str>) -> NodeAction {
        NodeAction {
            path: path.into(),
            kind,
            action,
            copy_source: None,
            props: Some(Properties::default()),
            content: content.map(|c| c.as_bytes().to_vec()),
            content_hash: None,
        }
    }

    #[test]
    fn single_branch_linear_history() {
        let r1 = Revision {
            number: 1,
            properties: {
                let mut p = std::collections::BTreeMap::new();
                p.insert("svn:author".into(), "alice".into());
                p.insert("svn:date".into(), "2020-01-01T00:00:00.000000Z".into());
                p.insert("svn:log".into(), "init".into());
                Properties(p)
            },
            nodes: vec![
                node("trunk", NodeKind::Dir, NodeActionKind::Add, None),
                node("trunk/a.txt", NodeKind::File, NodeActionKind::Add, Some("hello")),
            ],
        };
        let repo = translate(vec![r1], &Config::default(), "");
        assert_eq!(repo.len(), 1);
        let commit = repo.event(crate::event::EventId(0)).as_commit().unwrap();
        assert_eq!(commit.branch, BString::from("refs/heads/master"));
        assert_eq!(commit.fileops.len(), 1);
    }

    #[test]
    fn mixed_commit_splits_by_branch() {
        let mut props = std::collections::BTreeMap::new();
        props.insert("svn:author".into(), "bob".into());
        props.insert("svn:date".into(), "2020-01-02T00:00:00.000000Z".into());
        props.insert("svn:log".into(), "mixed".into());
        let r1 = Revision {
            number: 42,
            properties: Properties(props),
            nodes: vec![
                node("trunk/a.c", NodeKind::File, NodeActionKind::Add, Some("a")),
                node("branches/x/b.c", NodeKind::File, NodeActionKind::Add, Some("b")),
                node("tags/v1/c.c", NodeKind::File, NodeActionKind::Add, Some("c")),
            ],
        };
        let repo = translate(vec![r1], &Config::default(), "");
        assert_eq!(repo.len(), 3);
        let branches: Vec<BString> =
            (0..3).map(|i| repo.event(crate::event::EventId(i)).as_commit().unwrap().branch.clone()).collect();
        assert!(branches.contains(&BString::from("refs/heads/master")));
        assert!(branches.contains(&BString::from("refs/heads/x")));
        assert!(branches.contains(&BString::from("refs/tags/v1")));
    }

    #[test]
    fn copy_source_field_present() {
        let src = CopySource { rev: 1, path: "trunk".into() };
        assert_eq!(src.rev, 1);
    }
}
