use tracing::{debug, info};

use super::{
    next_patch_set, BranchIntegration, IntegrationResult, StrategyContext, SubmitStrategy,
};
use crate::git::{apply_commit_onto, write_commit, ApplyOutcome};
use crate::submit::planner::IntegrationPlan;
use crate::submit::resolver::SubmissionSet;
use crate::submit::SubmitError;
use crate::types::{IntegrationStatus, SubmitType};

/// Sequential single-parent rebase of each change onto the running tip,
/// creating a new patch set per rebased change. `if_necessary` keeps the
/// original commits on a pure fast-forward; `always` rewrites every commit
/// even when ancestry would allow a fast-forward.
pub struct Rebase {
    always: bool,
}

impl Rebase {
    pub fn if_necessary() -> Self {
        Self { always: false }
    }

    pub fn always() -> Self {
        Self { always: true }
    }
}

impl SubmitStrategy for Rebase {
    fn submit_type(&self) -> SubmitType {
        if self.always {
            SubmitType::RebaseAlways
        } else {
            SubmitType::RebaseIfNecessary
        }
    }

    fn apply(
        &self,
        ctx: &StrategyContext<'_>,
        plan: &IntegrationPlan,
        set: &SubmissionSet,
    ) -> Result<BranchIntegration, SubmitError> {
        if !self.always && plan.fast_forward_eligible {
            return super::fast_forward::FastForwardOnly.apply(ctx, plan, set);
        }

        let mut tip = plan.tip.clone();
        let mut results = Vec::with_capacity(plan.entries.len());

        for entry in &plan.entries {
            if entry.already_in_history {
                results.push(IntegrationResult::already_merged(entry));
                continue;
            }

            let Some(current_tip) = tip.clone() else {
                tip = Some(entry.patch_set.commit.clone());
                results.push(IntegrationResult::clean(
                    entry.change_id.clone(),
                    IntegrationStatus::FastForwarded,
                    entry.patch_set.commit.clone(),
                ));
                continue;
            };

            let source = ctx.objects.commit(&entry.patch_set.commit)?;

            // A commit already parented on the tip needs no rewrite unless
            // the policy is REBASE_ALWAYS
            if !self.always && source.first_parent() == Some(&current_tip) {
                tip = Some(entry.patch_set.commit.clone());
                results.push(IntegrationResult::clean(
                    entry.change_id.clone(),
                    IntegrationStatus::FastForwarded,
                    entry.patch_set.commit.clone(),
                ));
                continue;
            }

            let tip_tree = ctx.objects.commit_tree(&current_tip)?;
            let rebased_tree = match apply_commit_onto(
                ctx.objects,
                &source,
                &entry.patch_set.commit,
                &tip_tree,
                ctx.settings.content_merge,
            )? {
                ApplyOutcome::Clean(tree) => tree,
                // A rebase that contributes nothing still produces a patch
                // set carrying the tip's tree
                ApplyOutcome::IdenticalTree => tip_tree,
                ApplyOutcome::Conflicted(paths) => {
                    debug!(
                        "Rebase of change {} conflicts on {:?}",
                        entry.change_id.short(),
                        paths
                    );
                    results.push(IntegrationResult::conflict(
                        entry.change_id.clone(),
                        IntegrationStatus::RebaseConflict,
                    ));
                    continue;
                }
            };

            let message = ctx.hooks.amend_commit_message(
                source.message.clone(),
                &entry.patch_set.commit,
                Some(&current_tip),
                &plan.key,
            )?;
            let tree_id = ctx.objects.put_tree(rebased_tree)?;
            let rebased = write_commit(
                ctx.objects,
                tree_id,
                vec![current_tip.clone()],
                source.author.clone(),
                ctx.caller_signature(),
                message,
                ctx.settings.match_author_to_committer_date,
            )?;
            info!(
                "Rebased change {} as {}",
                entry.change_id.short(),
                rebased.short()
            );

            let patch_set =
                next_patch_set(entry, rebased.clone(), vec![current_tip.clone()], ctx.caller);
            tip = Some(rebased.clone());
            results.push(IntegrationResult {
                change_id: entry.change_id.clone(),
                status: IntegrationStatus::Rebased,
                commit: Some(rebased),
                new_patch_set: Some(patch_set),
            });
        }

        Ok(BranchIntegration {
            key: plan.key.clone(),
            old_tip: plan.tip.clone(),
            new_tip: tip,
            results,
        })
    }
}
