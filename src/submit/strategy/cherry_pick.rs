use tracing::{debug, info};

use super::{
    next_patch_set, BranchIntegration, IntegrationResult, StrategyContext, SubmitStrategy,
};
use crate::git::{apply_commit_onto, write_commit, ApplyOutcome};
use crate::submit::planner::IntegrationPlan;
use crate::submit::resolver::SubmissionSet;
use crate::submit::SubmitError;
use crate::types::{IntegrationStatus, SubmitType};

/// Replays each change's current patch-set diff onto the running tip in
/// submission order, ignoring inter-change ancestry. Every pick creates a
/// new patch set on the change, so a cherry-pick submission always touches
/// at least two refs: the target branch and the new patch-set ref.
pub struct CherryPick;

impl SubmitStrategy for CherryPick {
    fn submit_type(&self) -> SubmitType {
        SubmitType::CherryPick
    }

    fn apply(
        &self,
        ctx: &StrategyContext<'_>,
        plan: &IntegrationPlan,
        _set: &SubmissionSet,
    ) -> Result<BranchIntegration, SubmitError> {
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
            let tip_tree = ctx.objects.commit_tree(&current_tip)?;

            match apply_commit_onto(
                ctx.objects,
                &source,
                &entry.patch_set.commit,
                &tip_tree,
                ctx.settings.content_merge,
            )? {
                ApplyOutcome::IdenticalTree => {
                    // The change's content already matches the tip; mark it
                    // merged rather than creating an empty commit.
                    debug!(
                        "Cherry-pick of change {} onto {} is an identical tree",
                        entry.change_id.short(),
                        current_tip.short()
                    );
                    results.push(IntegrationResult::clean(
                        entry.change_id.clone(),
                        IntegrationStatus::SkippedIdenticalTree,
                        current_tip.clone(),
                    ));
                }
                ApplyOutcome::Conflicted(paths) => {
                    debug!(
                        "Cherry-pick of change {} conflicts on {:?}",
                        entry.change_id.short(),
                        paths
                    );
                    results.push(IntegrationResult::conflict(
                        entry.change_id.clone(),
                        IntegrationStatus::PathConflict,
                    ));
                }
                ApplyOutcome::Clean(tree) => {
                    let message = ctx.hooks.amend_commit_message(
                        source.message.clone(),
                        &entry.patch_set.commit,
                        Some(&current_tip),
                        &plan.key,
                    )?;
                    let tree_id = ctx.objects.put_tree(tree)?;
                    let pick = write_commit(
                        ctx.objects,
                        tree_id,
                        vec![current_tip.clone()],
                        source.author.clone(),
                        ctx.caller_signature(),
                        message,
                        ctx.settings.match_author_to_committer_date,
                    )?;
                    info!(
                        "Cherry-picked change {} as {}",
                        entry.change_id.short(),
                        pick.short()
                    );

                    let patch_set =
                        next_patch_set(entry, pick.clone(), vec![current_tip.clone()], ctx.caller);
                    tip = Some(pick.clone());
                    results.push(IntegrationResult {
                        change_id: entry.change_id.clone(),
                        status: IntegrationStatus::CherryPicked,
                        commit: Some(pick),
                        new_patch_set: Some(patch_set),
                    });
                }
            }
        }

        Ok(BranchIntegration {
            key: plan.key.clone(),
            old_tip: plan.tip.clone(),
            new_tip: tip,
            results,
        })
    }
}
