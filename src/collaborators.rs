//! Injected collaborator seams: permission/visibility answers, submit-rule
//! verdicts, and the notification/indexing observer. The engine only ever
//! talks to these traits; the impls here are the defaults used by the worker
//! binary and the test suite.

use async_trait::async_trait;
use tracing::info;

use crate::providers::RefUpdateCommand;
use crate::types::{Account, Change, ChangeId, ObjectId};

/// Permission and visibility answers for the acting identity
pub trait PermissionChecker: Send + Sync {
    fn can_submit(&self, change: &Change, actor: &Account) -> bool;
    fn is_visible(&self, change: &Change, actor: &Account) -> bool;
}

/// Default policy: private changes are visible only to their owner,
/// everything else is open.
pub struct StandardPermissions;

impl PermissionChecker for StandardPermissions {
    fn can_submit(&self, _change: &Change, _actor: &Account) -> bool {
        true
    }

    fn is_visible(&self, change: &Change, actor: &Account) -> bool {
        !change.is_private || change.owner == actor.id
    }
}

/// Verdict of the submit-requirement evaluation for one change
#[derive(Debug, Clone)]
pub struct SubmitVerdict {
    pub ok: bool,
    /// Names of unsatisfied requirements, e.g. "needs Code-Review"
    pub unsatisfied: Vec<String>,
}

impl SubmitVerdict {
    pub fn ok() -> Self {
        Self {
            ok: true,
            unsatisfied: Vec::new(),
        }
    }

    pub fn blocked(unsatisfied: Vec<String>) -> Self {
        Self {
            ok: false,
            unsatisfied,
        }
    }
}

/// Submit-requirement evaluator capability
pub trait SubmitRuleEvaluator: Send + Sync {
    fn evaluate(&self, change: &Change) -> SubmitVerdict;
}

/// Label-based submit rule: every required label must be approved on the
/// change's current patch set.
pub struct RequiredLabels {
    required: Vec<String>,
}

impl RequiredLabels {
    pub fn new(required: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            required: required.into_iter().map(Into::into).collect(),
        }
    }
}

impl Default for RequiredLabels {
    fn default() -> Self {
        Self::new(["Code-Review"])
    }
}

impl SubmitRuleEvaluator for RequiredLabels {
    fn evaluate(&self, change: &Change) -> SubmitVerdict {
        let unsatisfied: Vec<String> = self
            .required
            .iter()
            .filter(|label| !change.approvals.iter().any(|a| &a == label))
            .map(|label| format!("needs {label}"))
            .collect();

        if unsatisfied.is_empty() {
            SubmitVerdict::ok()
        } else {
            SubmitVerdict::blocked(unsatisfied)
        }
    }
}

/// Observer of submission outcomes: ref updates, merged changes, and
/// reindex scheduling. Notification delivery and index maintenance live
/// behind this seam.
#[async_trait]
pub trait SubmissionObserver: Send + Sync {
    async fn ref_updated(&self, command: &RefUpdateCommand);
    async fn change_merged(&self, change: &Change, commit: &ObjectId);
    async fn reindex(&self, change_id: &ChangeId);
}

/// Observer that only traces what it sees
pub struct LoggingObserver;

#[async_trait]
impl SubmissionObserver for LoggingObserver {
    async fn ref_updated(&self, command: &RefUpdateCommand) {
        info!(
            "Ref updated: {}:{} -> {}",
            command.project,
            command.ref_name,
            command.new.short()
        );
    }

    async fn change_merged(&self, change: &Change, commit: &ObjectId) {
        info!(
            "Change {} merged as {}",
            change.id.short(),
            commit.short()
        );
    }

    async fn reindex(&self, change_id: &ChangeId) {
        info!("Scheduling reindex of change {}", change_id.short());
    }
}
