use fjall::Partition;
use std::sync::Mutex;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{info, warn};

use super::{ProviderError, ProviderResult};
use crate::types::{BranchKey, ObjectId};

/// A single planned ref mutation: the expected-old id is the optimistic
/// concurrency token, a mismatch at apply time is a lock failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefUpdateCommand {
    pub project: String,
    pub ref_name: String,
    /// None means the ref is expected to not exist yet
    pub expected_old: Option<ObjectId>,
    pub new: ObjectId,
}

/// Failure applying a ref transaction
#[derive(Debug, Error)]
pub enum RefTransactionError {
    #[error("lock failure on {project}:{ref_name}: expected {expected:?}, found {actual:?}")]
    LockFailure {
        project: String,
        ref_name: String,
        expected: Option<ObjectId>,
        actual: Option<ObjectId>,
    },
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

/// Provider trait for per-project ref storage
pub trait RefsProvider: Send + Sync {
    /// Current value of a ref, if it exists
    fn head(&self, project: &str, ref_name: &str) -> ProviderResult<Option<ObjectId>>;

    /// Current tip of a branch
    fn branch_tip(&self, key: &BranchKey) -> ProviderResult<Option<ObjectId>> {
        self.head(&key.project, &key.ref_name())
    }

    /// Unconditionally point a ref at a commit (repository setup, tests)
    fn force_set(&self, project: &str, ref_name: &str, id: &ObjectId) -> ProviderResult<()>;

    /// Apply a batch of commands for one project as a single
    /// compare-and-swap transaction: every expected-old is checked against
    /// the live ref under one lock, and either all commands are written or
    /// none are.
    fn apply(&self, commands: &[RefUpdateCommand]) -> Result<(), RefTransactionError>;

    /// All refs of a project, name-ordered
    fn refs_of(&self, project: &str) -> ProviderResult<Vec<(String, ObjectId)>>;
}

/// Implementation of RefsProvider using Fjall
pub struct RefsProviderImpl {
    refs_tree: Partition,
    txn_lock: Mutex<()>,
    flush_sender: mpsc::UnboundedSender<()>,
}

impl RefsProviderImpl {
    /// Create a new refs provider
    pub fn new(refs_tree: Partition, flush_sender: mpsc::UnboundedSender<()>) -> Self {
        Self {
            refs_tree,
            txn_lock: Mutex::new(()),
            flush_sender,
        }
    }

    fn key(project: &str, ref_name: &str) -> Vec<u8> {
        let mut key = Vec::with_capacity(project.len() + ref_name.len() + 1);
        key.extend_from_slice(project.as_bytes());
        key.push(0);
        key.extend_from_slice(ref_name.as_bytes());
        key
    }

    fn read(&self, project: &str, ref_name: &str) -> ProviderResult<Option<ObjectId>> {
        match self.refs_tree.get(Self::key(project, ref_name))? {
            Some(data) => {
                let id = String::from_utf8(data.to_vec())?;
                Ok(Some(ObjectId::new(id)))
            }
            None => Ok(None),
        }
    }

    fn request_flush(&self) {
        if self.flush_sender.send(()).is_err() {
            warn!("Failed to request background flush - channel closed");
        }
    }
}

impl RefsProvider for RefsProviderImpl {
    fn head(&self, project: &str, ref_name: &str) -> ProviderResult<Option<ObjectId>> {
        self.read(project, ref_name)
    }

    fn force_set(&self, project: &str, ref_name: &str, id: &ObjectId) -> ProviderResult<()> {
        self.refs_tree
            .insert(Self::key(project, ref_name), id.as_str().as_bytes())?;
        self.request_flush();
        info!("Set ref {}:{} to {}", project, ref_name, id.short());
        Ok(())
    }

    fn apply(&self, commands: &[RefUpdateCommand]) -> Result<(), RefTransactionError> {
        let _guard = self
            .txn_lock
            .lock()
            .expect("refs transaction lock poisoned");

        for command in commands {
            let actual = self.read(&command.project, &command.ref_name)?;
            if actual != command.expected_old {
                return Err(RefTransactionError::LockFailure {
                    project: command.project.clone(),
                    ref_name: command.ref_name.clone(),
                    expected: command.expected_old.clone(),
                    actual,
                });
            }
        }

        for command in commands {
            self.refs_tree
                .insert(
                    Self::key(&command.project, &command.ref_name),
                    command.new.as_str().as_bytes(),
                )
                .map_err(ProviderError::from)?;
            info!(
                "Updated ref {}:{} -> {}",
                command.project,
                command.ref_name,
                command.new.short()
            );
        }
        self.request_flush();
        Ok(())
    }

    fn refs_of(&self, project: &str) -> ProviderResult<Vec<(String, ObjectId)>> {
        let mut prefix = project.as_bytes().to_vec();
        prefix.push(0);

        let mut refs = Vec::new();
        for result in self.refs_tree.prefix(prefix.clone()) {
            let (key, value) = result?;
            let name = String::from_utf8(key[prefix.len()..].to_vec())?;
            let id = String::from_utf8(value.to_vec())?;
            refs.push((name, ObjectId::new(id)));
        }
        Ok(refs)
    }
}
