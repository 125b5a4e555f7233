use tracing::{debug, info};

use super::resolver::SubmissionSet;
use super::SubmitError;
use crate::database::DatabaseRef;
use crate::git;
use crate::providers::{ChangesProvider, ProviderError, RefsProvider};
use crate::types::{BranchKey, ChangeId, ObjectId, PatchSet};

/// One change slot within an integration plan
#[derive(Debug, Clone)]
pub struct PlanEntry {
    pub change_id: ChangeId,
    pub patch_set: PatchSet,
    /// The patch-set commit is already an ancestor of the branch tip; a
    /// prior attempt updated the ref without finishing the change state.
    pub already_in_history: bool,
}

/// Dependency-ordered integration plan for one branch, pinned to the tip
/// observed at plan time. Invalidated and rebuilt on every retry.
#[derive(Debug, Clone)]
pub struct IntegrationPlan {
    pub key: BranchKey,
    pub tip: Option<ObjectId>,
    pub entries: Vec<PlanEntry>,
    pub fast_forward_eligible: bool,
}

impl IntegrationPlan {
    /// Entries that still need a ref update
    pub fn pending(&self) -> impl Iterator<Item = &PlanEntry> {
        self.entries.iter().filter(|e| !e.already_in_history)
    }
}

/// Builds one IntegrationPlan per (project, branch) touched by a set
pub struct IntegrationPlanner {
    db: DatabaseRef,
}

impl IntegrationPlanner {
    pub fn new(db: DatabaseRef) -> Self {
        Self { db }
    }

    pub fn plan(&self, set: &SubmissionSet) -> Result<Vec<IntegrationPlan>, SubmitError> {
        let mut plans = Vec::new();
        for (key, members) in set.branches() {
            plans.push(self.plan_branch(set, key, members)?);
        }
        Ok(plans)
    }

    fn plan_branch(
        &self,
        set: &SubmissionSet,
        key: &BranchKey,
        members: &[ChangeId],
    ) -> Result<IntegrationPlan, SubmitError> {
        let tip = self.db.refs().branch_tip(key)?;

        // Already-merged changes are planned around, not rejected
        let open: Vec<ChangeId> = members
            .iter()
            .filter(|id| set.change(id).is_some_and(|c| !c.is_merged()))
            .cloned()
            .collect();
        let ordered = set.graph().topological_order(&open);

        let mut entries = Vec::with_capacity(ordered.len());
        for change_id in ordered {
            let patch_set = self
                .db
                .changes()
                .current_patch_set(&change_id)?
                .ok_or_else(|| {
                    ProviderError::PatchSetNotFound(format!("on change {change_id}"))
                })?;
            let already_in_history = match &tip {
                Some(tip) => {
                    git::is_ancestor(self.db.objects().as_ref(), &patch_set.commit, tip)?
                }
                None => false,
            };
            if already_in_history {
                debug!(
                    "Change {} commit {} already in history of {}",
                    change_id.short(),
                    patch_set.commit.short(),
                    key
                );
            }
            entries.push(PlanEntry {
                change_id,
                patch_set,
                already_in_history,
            });
        }

        let fast_forward_eligible = self.is_fast_forward(&tip, &entries);
        info!(
            "Planned {} change(s) for {} (tip {:?}, fast-forward: {})",
            entries.len(),
            key,
            tip.as_ref().map(|t| t.short()),
            fast_forward_eligible
        );

        Ok(IntegrationPlan {
            key: key.clone(),
            tip,
            entries,
            fast_forward_eligible,
        })
    }

    /// True iff the ordered pending patch sets chain directly off the
    /// current tip, first-parent-wise, with no foreign commits interleaved.
    fn is_fast_forward(&self, tip: &Option<ObjectId>, entries: &[PlanEntry]) -> bool {
        let mut cursor = tip.clone();
        for entry in entries.iter().filter(|e| !e.already_in_history) {
            let linked = match &cursor {
                Some(cursor) => entry.patch_set.parents.first() == Some(cursor),
                None => entry.patch_set.parents.is_empty(),
            };
            if !linked {
                return false;
            }
            cursor = Some(entry.patch_set.commit.clone());
        }
        true
    }
}
