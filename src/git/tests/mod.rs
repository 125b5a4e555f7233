pub mod commit_tests;
pub mod merge_tests;

use chrono::{TimeZone, Utc};
use tempfile::TempDir;
use tokio::sync::mpsc;

use crate::git::{Commit, Signature, Tree};
use crate::providers::{ObjectsProvider, ObjectsProviderImpl};
use crate::types::ObjectId;

/// An objects provider over a throwaway fjall keyspace
pub struct TestStore {
    _temp_dir: TempDir,
    _keyspace: fjall::Keyspace,
    _flush_receiver: mpsc::UnboundedReceiver<()>,
    pub objects: ObjectsProviderImpl,
}

/// Helper function to create a test object store
pub fn create_test_store() -> TestStore {
    let temp_dir = tempfile::tempdir().unwrap();
    let keyspace = fjall::Config::new(temp_dir.path()).open().unwrap();
    let partition = keyspace
        .open_partition("objects", fjall::PartitionCreateOptions::default())
        .unwrap();
    let (flush_sender, flush_receiver) = mpsc::unbounded_channel();

    TestStore {
        _temp_dir: temp_dir,
        _keyspace: keyspace,
        _flush_receiver: flush_receiver,
        objects: ObjectsProviderImpl::new(partition, flush_sender),
    }
}

/// Helper function to create a deterministic test signature
pub fn test_signature() -> Signature {
    Signature::new(
        "test-user",
        "test@example.com",
        Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
    )
}

/// Store a tree built from literal file contents
pub fn store_tree(store: &TestStore, files: &[(&str, &str)]) -> ObjectId {
    let mut tree = Tree::new();
    for (path, content) in files {
        let blob = store.objects.put_blob(content.to_string()).unwrap();
        tree.insert(*path, blob);
    }
    store.objects.put_tree(tree).unwrap()
}

/// Store a commit over an already-stored tree
pub fn store_commit(
    store: &TestStore,
    tree: ObjectId,
    parents: Vec<ObjectId>,
    message: &str,
) -> ObjectId {
    store
        .objects
        .put_commit(Commit {
            tree,
            parents,
            author: test_signature(),
            committer: test_signature(),
            message: message.to_string(),
        })
        .unwrap()
}
