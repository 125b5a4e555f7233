//! Provider pattern implementations for the engine's storage concerns
//!
//! Each provider focuses on a specific concern:
//! - ObjectsProvider: content-addressed storage of commits, trees, and blobs
//! - RefsProvider: per-project ref heads with compare-and-swap transactions
//! - ChangesProvider: change and patch-set metadata, commit ownership index

pub mod changes;
pub mod objects;
pub mod refs;

pub mod error;

pub use changes::{ChangesProvider, ChangesProviderImpl};
pub use error::{ProviderError, ProviderResult};
pub use objects::{object_id, GitObject, ObjectsProvider, ObjectsProviderImpl};
pub use refs::{RefTransactionError, RefUpdateCommand, RefsProvider, RefsProviderImpl};
