pub mod strategy_tests;

use chrono::{TimeZone, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

use crate::config::Config;
use crate::database::{Database, DatabaseRef};
use crate::git::{Commit, Signature, Tree};
use crate::providers::{ChangesProvider, ObjectsProvider, RefsProvider};
use crate::submit::Submitter;
use crate::types::{
    Account, BranchKey, Change, ChangeId, ChangeStatus, ObjectId, PatchSet,
};
use crate::util;

/// Engine fixture over a throwaway database
pub struct Harness {
    _temp_dir: TempDir,
    pub db: DatabaseRef,
    pub config: Config,
    counter: AtomicU64,
}

/// Helper function to create a test harness
pub fn create_harness() -> Harness {
    let temp_dir = tempfile::tempdir().unwrap();
    let config = Config::with_db_path(temp_dir.path().join("db"));
    let db = Arc::new(Database::new(&config).unwrap());
    Harness {
        _temp_dir: temp_dir,
        db,
        config,
        counter: AtomicU64::new(1),
    }
}

/// The default acting identity for tests
pub fn admin() -> Account {
    Account::new("admin", "Admin", "admin@example.com")
}

impl Harness {
    pub fn submitter(&self) -> Submitter {
        Submitter::new(Arc::clone(&self.db), self.config.clone())
    }

    fn next_nonce(&self) -> u64 {
        self.counter.fetch_add(1, Ordering::SeqCst)
    }

    fn signature(&self) -> Signature {
        Signature::new(
            "uploader",
            "uploader@example.com",
            Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
        )
    }

    /// Write a commit whose tree is `base_tree` overlaid with `files`
    pub fn write_commit(
        &self,
        base_tree: Tree,
        files: &[(&str, &str)],
        parents: Vec<ObjectId>,
        message: &str,
    ) -> ObjectId {
        let mut tree = base_tree;
        for (path, content) in files {
            let blob = self.db.objects().put_blob(content.to_string()).unwrap();
            tree.insert(*path, blob);
        }
        let tree_id = self.db.objects().put_tree(tree).unwrap();
        self.db
            .objects()
            .put_commit(Commit {
                tree: tree_id,
                parents,
                author: self.signature(),
                committer: self.signature(),
                message: message.to_string(),
            })
            .unwrap()
    }

    /// Create a project branch with an initial commit
    pub fn init_project(&self, project: &str, branch: &str, files: &[(&str, &str)]) -> ObjectId {
        let commit = self.write_commit(Tree::new(), files, vec![], "Initial commit");
        let key = BranchKey::new(project, branch);
        self.db
            .refs()
            .force_set(project, &key.ref_name(), &commit)
            .unwrap();
        commit
    }

    /// Land a commit directly on a branch, as a concurrent submission would
    pub fn land_commit(
        &self,
        project: &str,
        branch: &str,
        files: &[(&str, &str)],
        message: &str,
    ) -> ObjectId {
        let key = BranchKey::new(project, branch);
        let tip = self.db.refs().branch_tip(&key).unwrap().unwrap();
        let base_tree = self.db.objects().commit_tree(&tip).unwrap();
        let commit = self.write_commit(base_tree, files, vec![tip], message);
        self.db
            .refs()
            .force_set(project, &key.ref_name(), &commit)
            .unwrap();
        commit
    }

    /// Create an approved, submittable change with one patch set. The patch
    /// set's parent defaults to the current branch tip.
    pub fn create_change(
        &self,
        project: &str,
        branch: &str,
        subject: &str,
        files: &[(&str, &str)],
        parent: Option<ObjectId>,
    ) -> ChangeId {
        let key = BranchKey::new(project, branch);
        let parent = parent.or_else(|| self.db.refs().branch_tip(&key).unwrap());
        let base_tree = match &parent {
            Some(parent) => self.db.objects().commit_tree(parent).unwrap(),
            None => Tree::new(),
        };
        let parents: Vec<ObjectId> = parent.into_iter().collect();
        let commit = self.write_commit(base_tree, files, parents.clone(), subject);

        let nonce = self.next_nonce();
        let change_id = ChangeId::new(util::generate_change_id(
            project, branch, subject, "uploader", nonce,
        ));
        let change = Change {
            id: change_id.clone(),
            project: project.to_string(),
            branch: branch.to_string(),
            subject: subject.to_string(),
            topic: None,
            owner: "uploader".to_string(),
            status: ChangeStatus::New,
            current_sequence: 0,
            work_in_progress: false,
            is_private: false,
            approvals: vec!["Code-Review".to_string()],
            attention_set: vec!["uploader".to_string()],
            messages: Vec::new(),
            submission_id: None,
            submitter: None,
            created_at: nonce,
        };
        self.db.changes().create_change(&change).unwrap();
        self.db
            .changes()
            .add_patch_set(&PatchSet {
                change_id: change_id.clone(),
                sequence: 1,
                commit,
                parents,
                uploader: "uploader".to_string(),
                created_at: nonce,
            })
            .unwrap();
        change_id
    }

    /// Upload a new patch set for an existing change
    pub fn push_patch_set(
        &self,
        change_id: &ChangeId,
        files: &[(&str, &str)],
        parent: ObjectId,
    ) -> ObjectId {
        let change = self.change(change_id);
        let base_tree = self.db.objects().commit_tree(&parent).unwrap();
        let commit = self.write_commit(
            base_tree,
            files,
            vec![parent.clone()],
            &format!("{} (ps{})", change.subject, change.current_sequence + 1),
        );
        self.db
            .changes()
            .add_patch_set(&PatchSet {
                change_id: change_id.clone(),
                sequence: change.current_sequence + 1,
                commit: commit.clone(),
                parents: vec![parent],
                uploader: "uploader".to_string(),
                created_at: self.next_nonce(),
            })
            .unwrap();
        commit
    }

    /// Mutate a stored change in place
    pub fn with_change(&self, change_id: &ChangeId, mutate: impl FnOnce(&mut Change)) {
        let mut change = self.change(change_id);
        mutate(&mut change);
        self.db.changes().update_change(&change).unwrap();
    }

    pub fn change(&self, change_id: &ChangeId) -> Change {
        self.db.changes().require_change(change_id).unwrap()
    }

    pub fn current_commit(&self, change_id: &ChangeId) -> ObjectId {
        self.db
            .changes()
            .current_patch_set(change_id)
            .unwrap()
            .unwrap()
            .commit
    }

    pub fn patch_set_count(&self, change_id: &ChangeId) -> u32 {
        self.db.changes().patch_set_count(change_id).unwrap()
    }

    pub fn tip(&self, project: &str, branch: &str) -> Option<ObjectId> {
        self.db
            .refs()
            .branch_tip(&BranchKey::new(project, branch))
            .unwrap()
    }

    pub fn tree_of(&self, commit: &ObjectId) -> Tree {
        self.db.objects().commit_tree(commit).unwrap()
    }
}
