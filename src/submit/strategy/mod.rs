//! One SubmitStrategy implementation per submit type. Each consumes the
//! integration plan for one branch and produces, per change, a result commit
//! plus a classification, advancing a mutable tip cursor as it goes.
//! Strategies write objects but never refs; the commands they return are
//! applied later, per project, by the atomic ref updater.

pub mod cherry_pick;
pub mod fast_forward;
pub mod merge;
pub mod rebase;

use chrono::{DateTime, Utc};

use super::planner::{IntegrationPlan, PlanEntry};
use super::resolver::SubmissionSet;
use super::SubmitError;
use crate::config::ProjectSettings;
use crate::git::Signature;
use crate::hooks::SubmitHooks;
use crate::providers::{ObjectsProvider, RefUpdateCommand};
use crate::types::{
    patch_set_ref, Account, BranchKey, ChangeId, IntegrationStatus, ObjectId, PatchSet,
    SubmitType,
};
use crate::util;

/// Everything a strategy needs to synthesize commits for one branch
pub struct StrategyContext<'a> {
    pub objects: &'a dyn ObjectsProvider,
    pub settings: ProjectSettings,
    pub hooks: &'a SubmitHooks,
    pub caller: &'a Account,
    /// Identity for server-synthesized merge commits
    pub server_identity: Signature,
    pub when: DateTime<Utc>,
}

impl StrategyContext<'_> {
    /// Committer signature of the submitting actor
    pub fn caller_signature(&self) -> Signature {
        Signature::of(self.caller, self.when)
    }
}

/// Per-change product of a strategy run
#[derive(Debug, Clone)]
pub struct IntegrationResult {
    pub change_id: ChangeId,
    pub status: IntegrationStatus,
    pub commit: Option<ObjectId>,
    /// Present when the strategy created a new revision (cherry-pick,
    /// rebase); persisted only after the ref transaction commits.
    pub new_patch_set: Option<PatchSet>,
}

impl IntegrationResult {
    fn clean(change_id: ChangeId, status: IntegrationStatus, commit: ObjectId) -> Self {
        Self {
            change_id,
            status,
            commit: Some(commit),
            new_patch_set: None,
        }
    }

    fn conflict(change_id: ChangeId, status: IntegrationStatus) -> Self {
        Self {
            change_id,
            status,
            commit: None,
            new_patch_set: None,
        }
    }

    fn already_merged(entry: &PlanEntry) -> Self {
        Self::clean(
            entry.change_id.clone(),
            IntegrationStatus::AlreadyMerged,
            entry.patch_set.commit.clone(),
        )
    }
}

/// The integration a strategy computed for one branch
#[derive(Debug, Clone)]
pub struct BranchIntegration {
    pub key: BranchKey,
    pub old_tip: Option<ObjectId>,
    pub new_tip: Option<ObjectId>,
    pub results: Vec<IntegrationResult>,
}

impl BranchIntegration {
    /// Whether any change failed to integrate
    pub fn has_conflicts(&self) -> bool {
        self.results.iter().any(|r| !r.status.is_clean())
    }

    /// The ref commands this integration requires: the branch tip move plus
    /// one create per new patch-set ref.
    pub fn commands(&self) -> Vec<RefUpdateCommand> {
        let mut commands = Vec::new();
        if let Some(new_tip) = &self.new_tip {
            if self.old_tip.as_ref() != Some(new_tip) {
                commands.push(RefUpdateCommand {
                    project: self.key.project.clone(),
                    ref_name: self.key.ref_name(),
                    expected_old: self.old_tip.clone(),
                    new: new_tip.clone(),
                });
            }
        }
        for result in &self.results {
            if let Some(patch_set) = &result.new_patch_set {
                commands.push(RefUpdateCommand {
                    project: self.key.project.clone(),
                    ref_name: patch_set_ref(&patch_set.change_id, patch_set.sequence),
                    expected_old: None,
                    new: patch_set.commit.clone(),
                });
            }
        }
        commands
    }
}

/// A submit strategy: consumes the plan for one branch, produces the branch
/// integration. Implementations must not touch refs or change metadata.
pub trait SubmitStrategy: Send + Sync {
    fn submit_type(&self) -> SubmitType;

    fn apply(
        &self,
        ctx: &StrategyContext<'_>,
        plan: &IntegrationPlan,
        set: &SubmissionSet,
    ) -> Result<BranchIntegration, SubmitError>;
}

/// Strategy selection, done once per branch at planning time
pub fn for_submit_type(submit_type: SubmitType) -> Box<dyn SubmitStrategy> {
    match submit_type {
        SubmitType::FastForwardOnly => Box::new(fast_forward::FastForwardOnly),
        SubmitType::MergeIfNecessary => Box::new(merge::Merge::if_necessary()),
        SubmitType::MergeAlways => Box::new(merge::Merge::always()),
        SubmitType::CherryPick => Box::new(cherry_pick::CherryPick),
        SubmitType::RebaseIfNecessary => Box::new(rebase::Rebase::if_necessary()),
        SubmitType::RebaseAlways => Box::new(rebase::Rebase::always()),
    }
}

/// Build the patch set record for a commit a strategy just synthesized
fn next_patch_set(
    entry: &PlanEntry,
    commit: ObjectId,
    parents: Vec<ObjectId>,
    uploader: &Account,
) -> PatchSet {
    PatchSet {
        change_id: entry.change_id.clone(),
        sequence: entry.patch_set.sequence + 1,
        commit,
        parents,
        uploader: uploader.id.clone(),
        created_at: util::current_unix_timestamp(),
    }
}
