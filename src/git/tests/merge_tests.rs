use chrono::TimeZone;

use super::*;
use crate::git::Signature;
use crate::providers::ObjectsProvider;
use crate::git::merge::{
    apply_commit_onto, is_ancestor, merge_base, three_way_tree_merge, write_commit, ApplyOutcome,
    TreeMergeOutcome,
};

#[test]
fn test_is_ancestor_chain() {
    let store = create_test_store();
    let t1 = store_tree(&store, &[("a", "1\n")]);
    let t2 = store_tree(&store, &[("a", "2\n")]);
    let c1 = store_commit(&store, t1, vec![], "one");
    let c2 = store_commit(&store, t2, vec![c1.clone()], "two");

    assert!(is_ancestor(&store.objects, &c1, &c2).unwrap());
    assert!(is_ancestor(&store.objects, &c2, &c2).unwrap());
    assert!(!is_ancestor(&store.objects, &c2, &c1).unwrap());
}

#[test]
fn test_is_ancestor_unrelated() {
    let store = create_test_store();
    let a = store_commit(&store, store_tree(&store, &[("a", "1\n")]), vec![], "a");
    let b = store_commit(&store, store_tree(&store, &[("b", "1\n")]), vec![], "b");

    assert!(!is_ancestor(&store.objects, &a, &b).unwrap());
}

#[test]
fn test_merge_base_diverged() {
    let store = create_test_store();
    let base = store_commit(&store, store_tree(&store, &[("a", "1\n")]), vec![], "base");
    let left = store_commit(
        &store,
        store_tree(&store, &[("a", "1\n"), ("l", "x\n")]),
        vec![base.clone()],
        "left",
    );
    let right = store_commit(
        &store,
        store_tree(&store, &[("a", "1\n"), ("r", "y\n")]),
        vec![base.clone()],
        "right",
    );

    assert_eq!(merge_base(&store.objects, &left, &right).unwrap(), Some(base));
}

#[test]
fn test_merge_base_unrelated_is_none() {
    let store = create_test_store();
    let a = store_commit(&store, store_tree(&store, &[("a", "1\n")]), vec![], "a");
    let b = store_commit(&store, store_tree(&store, &[("b", "1\n")]), vec![], "b");

    assert_eq!(merge_base(&store.objects, &a, &b).unwrap(), None);
}

#[test]
fn test_three_way_merge_takes_both_sides() {
    let store = create_test_store();
    let base = store.objects.tree(&store_tree(&store, &[("a", "1\n")])).unwrap();
    let ours = store
        .objects
        .tree(&store_tree(&store, &[("a", "1\n"), ("ours", "o\n")]))
        .unwrap();
    let theirs = store
        .objects
        .tree(&store_tree(&store, &[("a", "1\n"), ("theirs", "t\n")]))
        .unwrap();

    match three_way_tree_merge(&store.objects, &base, &ours, &theirs, false).unwrap() {
        TreeMergeOutcome::Clean(tree) => {
            assert!(tree.get("ours").is_some());
            assert!(tree.get("theirs").is_some());
            assert!(tree.get("a").is_some());
        }
        TreeMergeOutcome::Conflicted(paths) => panic!("unexpected conflict on {paths:?}"),
    }
}

#[test]
fn test_three_way_merge_deletion_wins_over_untouched() {
    let store = create_test_store();
    let base = store
        .objects
        .tree(&store_tree(&store, &[("a", "1\n"), ("gone", "x\n")]))
        .unwrap();
    let ours = base.clone();
    let theirs = store.objects.tree(&store_tree(&store, &[("a", "1\n")])).unwrap();

    match three_way_tree_merge(&store.objects, &base, &ours, &theirs, false).unwrap() {
        TreeMergeOutcome::Clean(tree) => assert!(tree.get("gone").is_none()),
        TreeMergeOutcome::Conflicted(paths) => panic!("unexpected conflict on {paths:?}"),
    }
}

#[test]
fn test_three_way_merge_conflict_without_content_merge() {
    let store = create_test_store();
    let base = store.objects.tree(&store_tree(&store, &[("a", "1\n")])).unwrap();
    let ours = store.objects.tree(&store_tree(&store, &[("a", "ours\n")])).unwrap();
    let theirs = store
        .objects
        .tree(&store_tree(&store, &[("a", "theirs\n")]))
        .unwrap();

    match three_way_tree_merge(&store.objects, &base, &ours, &theirs, false).unwrap() {
        TreeMergeOutcome::Conflicted(paths) => assert_eq!(paths, vec!["a".to_string()]),
        TreeMergeOutcome::Clean(_) => panic!("expected a conflict"),
    }
}

#[test]
fn test_content_merge_disjoint_line_edits() {
    let store = create_test_store();
    let base = store
        .objects
        .tree(&store_tree(&store, &[("a", "one\ntwo\nthree\n")]))
        .unwrap();
    let ours = store
        .objects
        .tree(&store_tree(&store, &[("a", "ONE\ntwo\nthree\n")]))
        .unwrap();
    let theirs = store
        .objects
        .tree(&store_tree(&store, &[("a", "one\ntwo\nTHREE\n")]))
        .unwrap();

    match three_way_tree_merge(&store.objects, &base, &ours, &theirs, true).unwrap() {
        TreeMergeOutcome::Clean(tree) => {
            let merged = store.objects.blob(tree.get("a").unwrap()).unwrap();
            assert_eq!(merged, "ONE\ntwo\nTHREE\n");
        }
        TreeMergeOutcome::Conflicted(paths) => panic!("unexpected conflict on {paths:?}"),
    }
}

#[test]
fn test_content_merge_same_line_conflicts() {
    let store = create_test_store();
    let base = store
        .objects
        .tree(&store_tree(&store, &[("a", "one\ntwo\n")]))
        .unwrap();
    let ours = store
        .objects
        .tree(&store_tree(&store, &[("a", "ours\ntwo\n")]))
        .unwrap();
    let theirs = store
        .objects
        .tree(&store_tree(&store, &[("a", "theirs\ntwo\n")]))
        .unwrap();

    assert!(matches!(
        three_way_tree_merge(&store.objects, &base, &ours, &theirs, true).unwrap(),
        TreeMergeOutcome::Conflicted(_)
    ));
}

#[test]
fn test_apply_commit_onto_clean() {
    let store = create_test_store();
    let base_tree = store_tree(&store, &[("a", "1\n")]);
    let base = store_commit(&store, base_tree, vec![], "base");

    // Source adds a file on top of base
    let source_tree = store_tree(&store, &[("a", "1\n"), ("new", "n\n")]);
    let source_id = store_commit(&store, source_tree, vec![base.clone()], "add new");
    let source = store.objects.commit(&source_id).unwrap();

    // Tip has moved on with an unrelated file
    let tip_tree = store
        .objects
        .tree(&store_tree(&store, &[("a", "1\n"), ("other", "o\n")]))
        .unwrap();

    match apply_commit_onto(&store.objects, &source, &source_id, &tip_tree, false).unwrap() {
        ApplyOutcome::Clean(tree) => {
            assert!(tree.get("new").is_some());
            assert!(tree.get("other").is_some());
        }
        other => panic!("expected clean apply, got {other:?}"),
    }
}

#[test]
fn test_apply_commit_onto_identical_tree() {
    let store = create_test_store();
    let base_tree = store_tree(&store, &[("a", "1\n")]);
    let base = store_commit(&store, base_tree, vec![], "base");

    let source_tree = store_tree(&store, &[("a", "2\n")]);
    let source_id = store_commit(&store, source_tree.clone(), vec![base], "bump a");
    let source = store.objects.commit(&source_id).unwrap();

    // The tip already carries exactly the source's resulting content
    let tip_tree = store.objects.tree(&source_tree).unwrap();

    assert!(matches!(
        apply_commit_onto(&store.objects, &source, &source_id, &tip_tree, false).unwrap(),
        ApplyOutcome::IdenticalTree
    ));
}

#[test]
fn test_apply_commit_onto_conflict() {
    let store = create_test_store();
    let base_tree = store_tree(&store, &[("a", "1\n")]);
    let base = store_commit(&store, base_tree, vec![], "base");

    let source_tree = store_tree(&store, &[("a", "source\n")]);
    let source_id = store_commit(&store, source_tree, vec![base], "source edit");
    let source = store.objects.commit(&source_id).unwrap();

    let tip_tree = store.objects.tree(&store_tree(&store, &[("a", "tip\n")])).unwrap();

    assert!(matches!(
        apply_commit_onto(&store.objects, &source, &source_id, &tip_tree, false).unwrap(),
        ApplyOutcome::Conflicted(_)
    ));
}

#[test]
fn test_write_commit_match_author_date() {
    let store = create_test_store();
    let tree = store_tree(&store, &[("a", "1\n")]);

    let author = Signature::new(
        "alice",
        "alice@example.com",
        chrono::Utc.timestamp_opt(1_600_000_000, 0).unwrap(),
    );
    let committer = test_signature();

    let id = write_commit(
        &store.objects,
        tree,
        vec![],
        author.clone(),
        committer.clone(),
        "msg".to_string(),
        true,
    )
    .unwrap();

    let commit = store.objects.commit(&id).unwrap();
    assert_eq!(commit.author.name, "alice");
    assert_eq!(commit.author.when, committer.when);
}
