use super::*;
use crate::git::commit::{footer_lines, merge_commit_message, with_trailer};
use crate::providers::{GitObject, ObjectsProvider};
use crate::types::{Change, ChangeId, ChangeStatus};

fn test_change() -> Change {
    Change {
        id: ChangeId::new("deadbeef".repeat(8)),
        project: "infra".to_string(),
        branch: "main".to_string(),
        subject: "Add retry budget to dialer".to_string(),
        topic: None,
        owner: "alice".to_string(),
        status: ChangeStatus::New,
        current_sequence: 1,
        work_in_progress: false,
        is_private: false,
        approvals: vec!["Code-Review".to_string()],
        attention_set: Vec::new(),
        messages: Vec::new(),
        submission_id: None,
        submitter: None,
        created_at: 1_700_000_000,
    }
}

#[test]
fn test_objects_are_content_addressed() {
    let store = create_test_store();

    let a = store.objects.put_blob("hello\n".to_string()).unwrap();
    let b = store.objects.put_blob("hello\n".to_string()).unwrap();
    let c = store.objects.put_blob("other\n".to_string()).unwrap();

    assert_eq!(a, b);
    assert_ne!(a, c);
    // Storing the same contents twice keeps a single object
    assert_eq!(store.objects.count(), 2);
}

#[test]
fn test_commit_round_trip() {
    let store = create_test_store();
    let tree = store_tree(&store, &[("README.md", "hello\n")]);
    let commit_id = store_commit(&store, tree.clone(), vec![], "Initial commit");

    let commit = store.objects.commit(&commit_id).unwrap();
    assert_eq!(commit.tree, tree);
    assert!(commit.parents.is_empty());
    assert_eq!(commit.subject(), "Initial commit");
    assert!(!commit.is_merge());
}

#[test]
fn test_wrong_kind_lookup_fails() {
    let store = create_test_store();
    let blob = store.objects.put_blob("data\n".to_string()).unwrap();

    assert!(store.objects.commit(&blob).is_err());
    assert!(store.objects.tree(&blob).is_err());
    assert!(matches!(
        store.objects.get(&blob).unwrap(),
        Some(GitObject::Blob(_))
    ));
}

#[test]
fn test_footer_lines() {
    let message = "Add dialer\n\nLonger description here.\n\nReviewed-on: infra~abc\nTested-by: bot\n";
    let footers = footer_lines(message);
    assert_eq!(
        footers,
        vec![
            ("Reviewed-on".to_string(), "infra~abc".to_string()),
            ("Tested-by".to_string(), "bot".to_string()),
        ]
    );
}

#[test]
fn test_footer_lines_absent() {
    assert!(footer_lines("Just a subject").is_empty());
    assert!(footer_lines("Subject\n\nPlain body without trailers").is_empty());
}

#[test]
fn test_with_trailer_starts_block() {
    let message = with_trailer("Add dialer", "Reviewed-on", "infra~abc");
    assert_eq!(message, "Add dialer\n\nReviewed-on: infra~abc\n");
}

#[test]
fn test_with_trailer_extends_block() {
    let message = with_trailer("Add dialer\n\nReviewed-on: infra~abc\n", "Tested-by", "bot");
    assert_eq!(message, "Add dialer\n\nReviewed-on: infra~abc\nTested-by: bot\n");
    assert_eq!(footer_lines(&message).len(), 2);
}

#[test]
fn test_merge_commit_message() {
    let change = test_change();
    let message = merge_commit_message(&change);

    assert!(message.starts_with("Merge \"Add retry budget to dialer\""));
    let footers = footer_lines(&message);
    assert_eq!(footers.len(), 1);
    assert_eq!(footers[0].0, "Reviewed-on");
    assert!(footers[0].1.starts_with("infra~"));
}
