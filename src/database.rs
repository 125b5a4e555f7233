use fjall::{Config as FjallConfig, Keyspace, PersistMode};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::config::Config;
use crate::providers::{
    ChangesProviderImpl, ObjectsProvider, ObjectsProviderImpl, RefsProviderImpl,
};

/// Database coordinator that aggregates providers for different subsystems
pub struct Database {
    #[allow(dead_code)]
    keyspace: Keyspace,

    // Provider instances
    objects_provider: Arc<ObjectsProviderImpl>,
    refs_provider: Arc<RefsProviderImpl>,
    changes_provider: Arc<ChangesProviderImpl>,

    #[allow(dead_code)]
    flush_sender: mpsc::UnboundedSender<()>,
}

impl Database {
    /// Create a new database with the given config
    pub fn new(config: &Config) -> crate::providers::ProviderResult<Self> {
        info!("Opening fjall database at: {:?}", config.db_path);

        if let Some(parent) = config.db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let keyspace = FjallConfig::new(&config.db_path).open()?;
        let objects_tree =
            keyspace.open_partition("objects", fjall::PartitionCreateOptions::default())?;
        let refs_tree = keyspace.open_partition("refs", fjall::PartitionCreateOptions::default())?;
        let changes_tree =
            keyspace.open_partition("changes", fjall::PartitionCreateOptions::default())?;
        let patchsets_tree =
            keyspace.open_partition("patchsets", fjall::PartitionCreateOptions::default())?;
        let commit_index_tree =
            keyspace.open_partition("commit_index", fjall::PartitionCreateOptions::default())?;

        // Channel for background flushing
        let (flush_sender, mut flush_receiver) = mpsc::unbounded_channel();

        let objects_provider = Arc::new(ObjectsProviderImpl::new(
            objects_tree,
            flush_sender.clone(),
        ));
        let refs_provider = Arc::new(RefsProviderImpl::new(refs_tree, flush_sender.clone()));
        let changes_provider = Arc::new(ChangesProviderImpl::new(
            changes_tree.clone(),
            patchsets_tree,
            commit_index_tree,
            flush_sender.clone(),
        ));

        info!(
            "Database initialized with {} objects, {} changes",
            objects_provider.count(),
            changes_tree.len().unwrap_or(0)
        );

        // Spawn background flush task when a runtime is available; tests that
        // never flush run without one.
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let keyspace_clone = keyspace.clone();
            handle.spawn(async move {
                let mut last_flush = std::time::Instant::now();
                let flush_interval = Duration::from_secs(5);

                loop {
                    tokio::select! {
                        received = flush_receiver.recv() => {
                            if received.is_none() {
                                break;
                            }
                            if let Err(e) = keyspace_clone.persist(PersistMode::SyncAll) {
                                warn!("Background flush failed: {}", e);
                            }
                            last_flush = std::time::Instant::now();
                        }
                        _ = sleep(flush_interval) => {
                            if last_flush.elapsed() >= flush_interval {
                                if let Err(e) = keyspace_clone.persist(PersistMode::SyncAll) {
                                    warn!("Periodic background flush failed: {}", e);
                                }
                                last_flush = std::time::Instant::now();
                            }
                        }
                    }
                }
            });
        }

        Ok(Self {
            keyspace,
            objects_provider,
            refs_provider,
            changes_provider,
            flush_sender,
        })
    }

    /// Get direct access to the objects provider
    pub fn objects(&self) -> &Arc<ObjectsProviderImpl> {
        &self.objects_provider
    }

    /// Get direct access to the refs provider
    pub fn refs(&self) -> &Arc<RefsProviderImpl> {
        &self.refs_provider
    }

    /// Get direct access to the changes provider
    pub fn changes(&self) -> &Arc<ChangesProviderImpl> {
        &self.changes_provider
    }
}

/// Shared reference to the database for use across the application
pub type DatabaseRef = Arc<Database>;
