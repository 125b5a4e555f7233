use fjall::Partition;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::sync::mpsc;
use tracing::warn;

use super::{ProviderError, ProviderResult};
use crate::git::{Commit, Tree};
use crate::types::ObjectId;

/// A content-addressed git object
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum GitObject {
    Blob(String),
    Tree(Tree),
    Commit(Commit),
}

impl GitObject {
    fn kind(&self) -> &'static str {
        match self {
            GitObject::Blob(_) => "blob",
            GitObject::Tree(_) => "tree",
            GitObject::Commit(_) => "commit",
        }
    }
}

/// Compute the SHA256 id of an object's serialized form
pub fn object_id(bytes: &[u8]) -> ObjectId {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    ObjectId::new(format!("{:x}", hasher.finalize()))
}

/// Provider trait for the content-addressed object store
pub trait ObjectsProvider: Send + Sync {
    /// Store an object, returning its content-derived id. Storing the same
    /// object twice is a no-op yielding the same id.
    fn put(&self, object: &GitObject) -> ProviderResult<ObjectId>;

    /// Retrieve an object by id
    fn get(&self, id: &ObjectId) -> ProviderResult<Option<GitObject>>;

    /// Whether an object with this id is stored
    fn contains(&self, id: &ObjectId) -> ProviderResult<bool>;

    /// Get count of stored objects
    fn count(&self) -> usize;

    /// Retrieve a commit, failing if the id is absent or names another kind
    fn commit(&self, id: &ObjectId) -> ProviderResult<Commit> {
        match self.get(id)? {
            Some(GitObject::Commit(commit)) => Ok(commit),
            Some(other) => Err(ProviderError::InvalidOperation(format!(
                "object {id} is a {}, not a commit",
                other.kind()
            ))),
            None => Err(ProviderError::ObjectNotFound(id.to_string())),
        }
    }

    /// Retrieve a tree, failing if the id is absent or names another kind
    fn tree(&self, id: &ObjectId) -> ProviderResult<Tree> {
        match self.get(id)? {
            Some(GitObject::Tree(tree)) => Ok(tree),
            Some(other) => Err(ProviderError::InvalidOperation(format!(
                "object {id} is a {}, not a tree",
                other.kind()
            ))),
            None => Err(ProviderError::ObjectNotFound(id.to_string())),
        }
    }

    /// Retrieve a blob's contents
    fn blob(&self, id: &ObjectId) -> ProviderResult<String> {
        match self.get(id)? {
            Some(GitObject::Blob(contents)) => Ok(contents),
            Some(other) => Err(ProviderError::InvalidOperation(format!(
                "object {id} is a {}, not a blob",
                other.kind()
            ))),
            None => Err(ProviderError::ObjectNotFound(id.to_string())),
        }
    }

    fn put_blob(&self, contents: String) -> ProviderResult<ObjectId> {
        self.put(&GitObject::Blob(contents))
    }

    fn put_tree(&self, tree: Tree) -> ProviderResult<ObjectId> {
        self.put(&GitObject::Tree(tree))
    }

    fn put_commit(&self, commit: Commit) -> ProviderResult<ObjectId> {
        self.put(&GitObject::Commit(commit))
    }

    /// Tree of the commit named by `id`
    fn commit_tree(&self, id: &ObjectId) -> ProviderResult<Tree> {
        let commit = self.commit(id)?;
        self.tree(&commit.tree)
    }
}

/// Implementation of ObjectsProvider using Fjall
pub struct ObjectsProviderImpl {
    objects_tree: Partition,
    flush_sender: mpsc::UnboundedSender<()>,
}

impl ObjectsProviderImpl {
    /// Create a new objects provider
    pub fn new(objects_tree: Partition, flush_sender: mpsc::UnboundedSender<()>) -> Self {
        Self {
            objects_tree,
            flush_sender,
        }
    }
}

impl ObjectsProvider for ObjectsProviderImpl {
    fn put(&self, object: &GitObject) -> ProviderResult<ObjectId> {
        let bytes = bincode::serialize(object)
            .map_err(|e| ProviderError::SerializationError(format!("bincode encode error: {e}")))?;
        let id = object_id(&bytes);
        self.objects_tree.insert(id.as_str().as_bytes(), bytes)?;

        // Request background flush
        if self.flush_sender.send(()).is_err() {
            warn!("Failed to request background flush - channel closed");
        }

        Ok(id)
    }

    fn get(&self, id: &ObjectId) -> ProviderResult<Option<GitObject>> {
        match self.objects_tree.get(id.as_str().as_bytes())? {
            Some(data) => {
                let object: GitObject = bincode::deserialize(&data).map_err(|e| {
                    ProviderError::SerializationError(format!("bincode decode error: {e}"))
                })?;
                Ok(Some(object))
            }
            None => Ok(None),
        }
    }

    fn contains(&self, id: &ObjectId) -> ProviderResult<bool> {
        Ok(self.objects_tree.get(id.as_str().as_bytes())?.is_some())
    }

    fn count(&self) -> usize {
        self.objects_tree.len().unwrap_or(0) as usize
    }
}
