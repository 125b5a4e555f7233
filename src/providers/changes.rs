use fjall::Partition;
use tokio::sync::mpsc;
use tracing::{info, warn};

use super::{ProviderError, ProviderResult};
use crate::types::{BranchKey, Change, ChangeId, ChangeStatus, ObjectId, PatchSet};

/// Provider trait for change and patch-set metadata
pub trait ChangesProvider: Send + Sync {
    /// Store a newly created change
    fn create_change(&self, change: &Change) -> ProviderResult<()>;

    /// Get a change by ID
    fn get_change(&self, change_id: &ChangeId) -> ProviderResult<Option<Change>>;

    /// Get a change by ID, failing if it does not exist
    fn require_change(&self, change_id: &ChangeId) -> ProviderResult<Change> {
        self.get_change(change_id)?
            .ok_or_else(|| ProviderError::ChangeNotFound(change_id.to_string()))
    }

    /// Update an existing change
    fn update_change(&self, change: &Change) -> ProviderResult<()>;

    /// List all changes
    fn list_changes(&self) -> ProviderResult<Vec<Change>>;

    /// All open changes sharing a topic, across projects and branches
    fn open_changes_by_topic(&self, topic: &str) -> ProviderResult<Vec<Change>>;

    /// All open changes targeting a branch
    fn open_changes_on(&self, key: &BranchKey) -> ProviderResult<Vec<Change>>;

    /// Append a patch set to its change. Bumps the change's current sequence
    /// and records the commit in the ownership index.
    fn add_patch_set(&self, patch_set: &PatchSet) -> ProviderResult<()>;

    /// Get one patch set of a change
    fn patch_set(&self, change_id: &ChangeId, sequence: u32) -> ProviderResult<Option<PatchSet>>;

    /// The change's current (highest-sequence) patch set
    fn current_patch_set(&self, change_id: &ChangeId) -> ProviderResult<Option<PatchSet>>;

    /// Number of patch sets a change owns
    fn patch_set_count(&self, change_id: &ChangeId) -> ProviderResult<u32>;

    /// Which change (and patch-set sequence) owns a commit within a project
    fn change_owning_commit(
        &self,
        project: &str,
        commit: &ObjectId,
    ) -> ProviderResult<Option<(ChangeId, u32)>>;
}

/// Implementation of ChangesProvider using Fjall
pub struct ChangesProviderImpl {
    changes_tree: Partition,
    patchsets_tree: Partition,
    commit_index_tree: Partition,
    flush_sender: mpsc::UnboundedSender<()>,
}

impl ChangesProviderImpl {
    /// Create a new changes provider
    pub fn new(
        changes_tree: Partition,
        patchsets_tree: Partition,
        commit_index_tree: Partition,
        flush_sender: mpsc::UnboundedSender<()>,
    ) -> Self {
        Self {
            changes_tree,
            patchsets_tree,
            commit_index_tree,
            flush_sender,
        }
    }

    fn patch_set_key(change_id: &ChangeId, sequence: u32) -> String {
        format!("{}\0{:010}", change_id, sequence)
    }

    fn commit_key(project: &str, commit: &ObjectId) -> String {
        format!("{project}\0{commit}")
    }

    fn store_change(&self, change: &Change) -> ProviderResult<()> {
        let json = serde_json::to_string(change)
            .map_err(|e| ProviderError::SerializationError(format!("JSON serialization error: {e}")))?;
        self.changes_tree
            .insert(change.id.as_str().as_bytes(), json.as_bytes())?;
        self.request_flush();
        Ok(())
    }

    fn request_flush(&self) {
        if self.flush_sender.send(()).is_err() {
            warn!("Failed to request background flush - channel closed");
        }
    }

    fn decode_change(data: &[u8]) -> ProviderResult<Change> {
        let json = String::from_utf8(data.to_vec())?;
        serde_json::from_str(&json)
            .map_err(|e| ProviderError::SerializationError(format!("JSON parse error: {e}")))
    }
}

impl ChangesProvider for ChangesProviderImpl {
    fn create_change(&self, change: &Change) -> ProviderResult<()> {
        if self.changes_tree.get(change.id.as_str().as_bytes())?.is_some() {
            return Err(ProviderError::InvalidOperation(format!(
                "change {} already exists",
                change.id
            )));
        }
        self.store_change(change)?;
        info!(
            "Created change '{}' ({}) on {}:{}",
            change.subject,
            change.id.short(),
            change.project,
            change.branch
        );
        Ok(())
    }

    fn get_change(&self, change_id: &ChangeId) -> ProviderResult<Option<Change>> {
        match self.changes_tree.get(change_id.as_str().as_bytes())? {
            Some(data) => Ok(Some(Self::decode_change(&data)?)),
            None => Ok(None),
        }
    }

    fn update_change(&self, change: &Change) -> ProviderResult<()> {
        self.store_change(change)
    }

    fn list_changes(&self) -> ProviderResult<Vec<Change>> {
        let mut changes = Vec::new();
        for result in self.changes_tree.iter() {
            let (_, value) = result?;
            changes.push(Self::decode_change(&value)?);
        }
        Ok(changes)
    }

    fn open_changes_by_topic(&self, topic: &str) -> ProviderResult<Vec<Change>> {
        let mut changes: Vec<Change> = self
            .list_changes()?
            .into_iter()
            .filter(|c| c.status == ChangeStatus::New && c.topic.as_deref() == Some(topic))
            .collect();
        changes.sort_by_key(|c| c.created_at);
        Ok(changes)
    }

    fn open_changes_on(&self, key: &BranchKey) -> ProviderResult<Vec<Change>> {
        let mut changes: Vec<Change> = self
            .list_changes()?
            .into_iter()
            .filter(|c| c.status == ChangeStatus::New && &c.branch_key() == key)
            .collect();
        changes.sort_by_key(|c| c.created_at);
        Ok(changes)
    }

    fn add_patch_set(&self, patch_set: &PatchSet) -> ProviderResult<()> {
        let mut change = self.require_change(&patch_set.change_id)?;
        if patch_set.sequence != change.current_sequence + 1 {
            return Err(ProviderError::InvalidOperation(format!(
                "patch set {} of change {} is out of sequence; expected {}",
                patch_set.sequence,
                patch_set.change_id,
                change.current_sequence + 1
            )));
        }

        let json = serde_json::to_string(patch_set)
            .map_err(|e| ProviderError::SerializationError(format!("JSON serialization error: {e}")))?;
        self.patchsets_tree.insert(
            Self::patch_set_key(&patch_set.change_id, patch_set.sequence).as_bytes(),
            json.as_bytes(),
        )?;

        let owner = serde_json::to_string(&(patch_set.change_id.clone(), patch_set.sequence))
            .map_err(|e| ProviderError::SerializationError(format!("JSON serialization error: {e}")))?;
        self.commit_index_tree.insert(
            Self::commit_key(&change.project, &patch_set.commit).as_bytes(),
            owner.as_bytes(),
        )?;

        change.current_sequence = patch_set.sequence;
        self.store_change(&change)?;

        info!(
            "Added patch set {} to change {} (commit {})",
            patch_set.sequence,
            patch_set.change_id.short(),
            patch_set.commit.short()
        );
        Ok(())
    }

    fn patch_set(&self, change_id: &ChangeId, sequence: u32) -> ProviderResult<Option<PatchSet>> {
        match self
            .patchsets_tree
            .get(Self::patch_set_key(change_id, sequence).as_bytes())?
        {
            Some(data) => {
                let json = String::from_utf8(data.to_vec())?;
                let patch_set = serde_json::from_str(&json)
                    .map_err(|e| ProviderError::SerializationError(format!("JSON parse error: {e}")))?;
                Ok(Some(patch_set))
            }
            None => Ok(None),
        }
    }

    fn current_patch_set(&self, change_id: &ChangeId) -> ProviderResult<Option<PatchSet>> {
        let change = self.require_change(change_id)?;
        if change.current_sequence == 0 {
            return Ok(None);
        }
        self.patch_set(change_id, change.current_sequence)
    }

    fn patch_set_count(&self, change_id: &ChangeId) -> ProviderResult<u32> {
        let mut prefix = change_id.as_str().as_bytes().to_vec();
        prefix.push(0);

        let mut count = 0;
        for result in self.patchsets_tree.prefix(prefix) {
            result?;
            count += 1;
        }
        Ok(count)
    }

    fn change_owning_commit(
        &self,
        project: &str,
        commit: &ObjectId,
    ) -> ProviderResult<Option<(ChangeId, u32)>> {
        match self
            .commit_index_tree
            .get(Self::commit_key(project, commit).as_bytes())?
        {
            Some(data) => {
                let json = String::from_utf8(data.to_vec())?;
                let owner = serde_json::from_str(&json)
                    .map_err(|e| ProviderError::SerializationError(format!("JSON parse error: {e}")))?;
                Ok(Some(owner))
            }
            None => Ok(None),
        }
    }
}
