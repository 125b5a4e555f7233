use std::collections::VecDeque;
use std::sync::Mutex;
use tracing::{info, warn};

use crate::providers::{RefTransactionError, RefUpdateCommand, RefsProvider};

/// Scripted synthetic lock failures, consumed one entry per project ref
/// transaction. An exhausted script never fails. Exists so the retry path
/// can be exercised deterministically.
#[derive(Debug, Default)]
pub struct LockFailureScript {
    script: Mutex<VecDeque<bool>>,
}

impl LockFailureScript {
    pub fn new(script: Vec<bool>) -> Self {
        Self {
            script: Mutex::new(script.into()),
        }
    }

    /// Consume the next scripted entry; true forces a lock failure
    fn next_is_failure(&self) -> bool {
        self.script
            .lock()
            .expect("lock failure script mutex poisoned")
            .pop_front()
            .unwrap_or(false)
    }

    pub fn is_exhausted(&self) -> bool {
        self.script
            .lock()
            .expect("lock failure script mutex poisoned")
            .is_empty()
    }
}

/// Applies one project's ref commands as a single compare-and-swap
/// transaction against the refs provider.
pub struct AtomicRefUpdater<'a> {
    refs: &'a dyn RefsProvider,
}

impl<'a> AtomicRefUpdater<'a> {
    pub fn new(refs: &'a dyn RefsProvider) -> Self {
        Self { refs }
    }

    /// Apply all commands for one project, or fail with a lock failure if
    /// any live ref no longer matches its expected-old id.
    pub fn apply_project(
        &self,
        project: &str,
        commands: &[RefUpdateCommand],
        script: &LockFailureScript,
    ) -> Result<(), RefTransactionError> {
        if script.next_is_failure() {
            let ref_name = commands
                .first()
                .map(|c| c.ref_name.clone())
                .unwrap_or_else(|| "refs/heads".to_string());
            warn!(
                "Injecting scripted lock failure for project {} ({})",
                project, ref_name
            );
            return Err(RefTransactionError::LockFailure {
                project: project.to_string(),
                ref_name,
                expected: None,
                actual: None,
            });
        }

        self.refs.apply(commands)?;
        info!(
            "Applied {} ref command(s) for project {}",
            commands.len(),
            project
        );
        Ok(())
    }
}
