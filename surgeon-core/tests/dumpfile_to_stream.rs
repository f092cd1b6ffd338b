//! End-to-end: a Subversion dumpfile translated to a [`Repository`], then
//! re-exported as a fast-import stream and parsed back, checking the round
//! trip lands on the same branch/content shape the translator produced.

use std::collections::BTreeMap;

use bstr::BString;
use fast_export::{Command, Dump};
use surgeon_core::dumpfile::{
    translate, CopySource, NodeAction, NodeActionKind, NodeKind, Properties, Revision,
};
use surgeon_core::event::EventId;
use surgeon_core::fileop::FileOp;
use surgeon_core::Config;

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

fn copy_node(path: &str, from_path: &str, from_rev: u64) -> NodeAction {
    NodeAction {
        path: path.into(),
        kind: NodeKind::Dir,
        action: NodeActionKind::Add,
        copy_source: Some(CopySource { rev: from_rev, path: from_path.into() }),
        props: Some(Properties::default()),
        content: None,
        content_hash: None,
    }
}

fn revision(number: u64, author: &str, log: &str, nodes: Vec<NodeAction>) -> Revision {
    let mut props = BTreeMap::new();
    props.insert(BString::from("svn:author"), BString::from(author));
    props.insert(BString::from("svn:date"), BString::from("2020-01-01T00:00:00.000000Z"));
    props.insert(BString::from("svn:log"), BString::from(log));
    Revision { number, properties: Properties(props), nodes }
}

#[test]
fn trunk_and_tag_round_trip_through_fast_import() {
    let revisions = vec![
        revision(
            1,
            "alice",
            "init",
            vec![
                node("trunk", NodeKind::Dir, NodeActionKind::Add, None),
                node("trunk/a.txt", NodeKind::File, NodeActionKind::Add, Some("hello")),
            ],
        ),
        revision(
            2,
            "alice",
            "tag v1",
            vec![node("tags/v1", NodeKind::Dir, NodeActionKind::Add, None)],
        ),
    ];

    let repo = translate(revisions, &Config::default(), "");
    assert_eq!(repo.len(), 1, "the tag copy with no new content synthesizes a Tag event, not a commit");

    let commit = repo.event(EventId(0)).as_commit().expect("trunk commit");
    assert_eq!(commit.branch, BString::from("refs/heads/master"));

    let commands = surgeon_core::stream::export(&repo);
    let mut wire = Vec::new();
    for command in &commands {
        command.dump(&mut wire).unwrap();
    }

    let parsed = fast_export::Parser::new(wire.as_slice()).parse_all().unwrap();
    assert_eq!(parsed.len(), commands.len());

    let commit_count = parsed.iter().filter(|c| matches!(c, Command::Commit(_))).count();
    assert_eq!(commit_count, 1);

    let reimported = surgeon_core::stream::import(parsed).unwrap();
    assert_eq!(reimported.len(), repo.len());
    let reimported_commit = reimported.event(EventId(0)).as_commit().unwrap();
    assert_eq!(reimported_commit.branch, commit.branch);
    assert_eq!(reimported_commit.message, commit.message);
    let manifest = reimported.manifest(EventId(0));
    assert!(manifest.get(b"a.txt").is_some());
}

#[test]
fn mixed_revision_splits_across_branches_and_tags() {
    let revisions = vec![revision(
        1,
        "bob",
        "mixed",
        vec![
            node("trunk/a.c", NodeKind::File, NodeActionKind::Add, Some("a")),
            node("branches/x/b.c", NodeKind::File, NodeActionKind::Add, Some("b")),
            node("tags/v1/c.c", NodeKind::File, NodeActionKind::Add, Some("c")),
        ],
    )];

    let repo = translate(revisions, &Config::default(), "");
    assert_eq!(repo.len(), 3);

    let branches: Vec<BString> = (0..3)
        .map(|i| repo.event(EventId(i)).as_commit().unwrap().branch.clone())
        .collect();
    assert!(branches.contains(&BString::from("refs/heads/master")));
    assert!(branches.contains(&BString::from("refs/heads/x")));
    assert!(branches.contains(&BString::from("refs/tags/v1")));

    // Every fileop's blob must resolve in the exported stream, even though
    // the three commits were split out of a single revision.
    let commands = surgeon_core::stream::export(&repo);
    let blob_count = commands.iter().filter(|c| matches!(c, Command::Blob(_))).count();
    assert_eq!(blob_count, 3);
}

#[test]
fn branch_created_by_directory_copy_attaches_to_source_tip() {
    let revisions = vec![
        revision(
            1,
            "alice",
            "init",
            vec![
                node("trunk", NodeKind::Dir, NodeActionKind::Add, None),
                node("trunk/a.txt", NodeKind::File, NodeActionKind::Add, Some("hello")),
            ],
        ),
        revision(2, "alice", "branch x", vec![copy_node("branches/x", "trunk", 1)]),
    ];

    let repo = translate(revisions, &Config::default(), "");
    assert_eq!(repo.len(), 2, "both the trunk root and the branch root survive as commits");

    let trunk = repo.event(EventId(0)).as_commit().expect("trunk commit");
    assert_eq!(trunk.branch, BString::from("refs/heads/master"));

    let branch_root = repo.event(EventId(1)).as_commit().expect("branch root commit");
    assert_eq!(branch_root.branch, BString::from("refs/heads/x"));
    assert_eq!(
        branch_root.parent,
        Some(EventId(0)),
        "phase 7 must parent the new branch's root onto trunk's tip at the copy-from revision"
    );
    assert!(
        matches!(branch_root.fileops.first(), Some(FileOp::DeleteAll)),
        "phase 7 prepends a deleteall when attaching a branch root, to prevent inherited content bleed"
    );

    let manifest = repo.manifest(EventId(1));
    assert!(manifest.get(b"a.txt").is_some(), "the copied file content carries over from trunk");
}
