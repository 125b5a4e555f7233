use tracing::{debug, info};

use super::{
    BranchIntegration, IntegrationResult, StrategyContext, SubmitStrategy,
};
use crate::git::{
    self, merge_commit_message, three_way_tree_merge, write_commit, Tree, TreeMergeOutcome,
};
use crate::submit::planner::{IntegrationPlan, PlanEntry};
use crate::submit::resolver::SubmissionSet;
use crate::submit::SubmitError;
use crate::types::{IntegrationStatus, ObjectId, SubmitType};

/// Synthesizes one merge commit per change whose first parent is the running
/// tip. `if_necessary` fast-forwards instead when ancestry allows it;
/// `always` never does.
pub struct Merge {
    always: bool,
}

impl Merge {
    pub fn if_necessary() -> Self {
        Self { always: false }
    }

    pub fn always() -> Self {
        Self { always: true }
    }
}

impl SubmitStrategy for Merge {
    fn submit_type(&self) -> SubmitType {
        if self.always {
            SubmitType::MergeAlways
        } else {
            SubmitType::MergeIfNecessary
        }
    }

    fn apply(
        &self,
        ctx: &StrategyContext<'_>,
        plan: &IntegrationPlan,
        set: &SubmissionSet,
    ) -> Result<BranchIntegration, SubmitError> {
        // Pure fast-forward satisfies MERGE_IF_NECESSARY without synthesis
        if !self.always && plan.fast_forward_eligible {
            return super::fast_forward::FastForwardOnly.apply(ctx, plan, set);
        }

        if ctx.settings.batch_topic_merges {
            if let Some(integration) = self.try_batch_merge(ctx, plan, set)? {
                return Ok(integration);
            }
        }

        let mut tip = plan.tip.clone();
        let mut results = Vec::with_capacity(plan.entries.len());

        for entry in &plan.entries {
            if entry.already_in_history {
                results.push(IntegrationResult::already_merged(entry));
                continue;
            }

            let Some(current_tip) = tip.clone() else {
                // Unborn branch: the first commit becomes the tip verbatim
                tip = Some(entry.patch_set.commit.clone());
                results.push(IntegrationResult::clean(
                    entry.change_id.clone(),
                    IntegrationStatus::FastForwarded,
                    entry.patch_set.commit.clone(),
                ));
                continue;
            };

            match self.merge_one(ctx, plan, set, entry, &current_tip)? {
                Ok(merge_commit) => {
                    tip = Some(merge_commit.clone());
                    results.push(IntegrationResult::clean(
                        entry.change_id.clone(),
                        IntegrationStatus::Merged,
                        merge_commit,
                    ));
                }
                Err(conflict_paths) => {
                    debug!(
                        "Path conflict merging change {} into {}: {:?}",
                        entry.change_id.short(),
                        plan.key,
                        conflict_paths
                    );
                    results.push(IntegrationResult::conflict(
                        entry.change_id.clone(),
                        IntegrationStatus::PathConflict,
                    ));
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

impl Merge {
    /// Merge one change's patch-set commit into the running tip. Returns the
    /// merge commit id, or the conflicting paths.
    fn merge_one(
        &self,
        ctx: &StrategyContext<'_>,
        plan: &IntegrationPlan,
        set: &SubmissionSet,
        entry: &PlanEntry,
        tip: &ObjectId,
    ) -> Result<Result<ObjectId, Vec<String>>, SubmitError> {
        let source = &entry.patch_set.commit;
        let base_tree = match git::merge_base(ctx.objects, tip, source)? {
            Some(base) => ctx.objects.commit_tree(&base)?,
            None => Tree::new(),
        };
        let tip_tree = ctx.objects.commit_tree(tip)?;
        let source_tree = ctx.objects.commit_tree(source)?;

        let merged = match three_way_tree_merge(
            ctx.objects,
            &base_tree,
            &tip_tree,
            &source_tree,
            ctx.settings.content_merge,
        )? {
            TreeMergeOutcome::Clean(tree) => tree,
            TreeMergeOutcome::Conflicted(paths) => return Ok(Err(paths)),
        };

        let change = set
            .change(&entry.change_id)
            .ok_or_else(|| SubmitError::NotFound(entry.change_id.clone()))?;
        let message = ctx.hooks.amend_commit_message(
            merge_commit_message(change),
            source,
            Some(tip),
            &plan.key,
        )?;

        let tree_id = ctx.objects.put_tree(merged)?;
        let merge_commit = write_commit(
            ctx.objects,
            tree_id,
            vec![tip.clone(), source.clone()],
            ctx.server_identity.clone(),
            ctx.server_identity.clone(),
            message,
            ctx.settings.match_author_to_committer_date,
        )?;
        Ok(Ok(merge_commit))
    }

    /// When every pending change shares one topic and all of them merge
    /// cleanly, collapse the batch into a single multi-parent merge commit.
    /// Falls back to per-change merging on any conflict.
    fn try_batch_merge(
        &self,
        ctx: &StrategyContext<'_>,
        plan: &IntegrationPlan,
        set: &SubmissionSet,
    ) -> Result<Option<BranchIntegration>, SubmitError> {
        let pending: Vec<&PlanEntry> = plan.pending().collect();
        if pending.len() < 2 {
            return Ok(None);
        }
        let Some(tip) = plan.tip.clone() else {
            return Ok(None);
        };

        let mut topics = pending
            .iter()
            .filter_map(|e| set.change(&e.change_id).and_then(|c| c.topic.clone()));
        let Some(topic) = topics.next() else {
            return Ok(None);
        };
        let all_same_topic = pending.iter().all(|e| {
            set.change(&e.change_id)
                .and_then(|c| c.topic.as_deref())
                == Some(topic.as_str())
        });
        if !all_same_topic {
            return Ok(None);
        }

        // Fold every source tree into the running result; any conflict
        // abandons the batch.
        let mut folded = ctx.objects.commit_tree(&tip)?;
        for entry in &pending {
            let source = &entry.patch_set.commit;
            let base_tree = match git::merge_base(ctx.objects, &tip, source)? {
                Some(base) => ctx.objects.commit_tree(&base)?,
                None => Tree::new(),
            };
            let source_tree = ctx.objects.commit_tree(source)?;
            match three_way_tree_merge(
                ctx.objects,
                &base_tree,
                &folded,
                &source_tree,
                ctx.settings.content_merge,
            )? {
                TreeMergeOutcome::Clean(tree) => folded = tree,
                TreeMergeOutcome::Conflicted(_) => return Ok(None),
            }
        }

        let first_source = &pending[0].patch_set.commit;
        let message = ctx.hooks.amend_commit_message(
            format!("Merge changes from topic \"{topic}\""),
            first_source,
            Some(&tip),
            &plan.key,
        )?;

        let mut parents = vec![tip.clone()];
        parents.extend(pending.iter().map(|e| e.patch_set.commit.clone()));
        let tree_id = ctx.objects.put_tree(folded)?;
        let merge_commit = write_commit(
            ctx.objects,
            tree_id,
            parents,
            ctx.server_identity.clone(),
            ctx.server_identity.clone(),
            message,
            ctx.settings.match_author_to_committer_date,
        )?;
        info!(
            "Merged {} change(s) from topic \"{}\" as one commit {}",
            pending.len(),
            topic,
            merge_commit.short()
        );

        let mut results = Vec::with_capacity(plan.entries.len());
        for entry in &plan.entries {
            if entry.already_in_history {
                results.push(IntegrationResult::already_merged(entry));
            } else {
                results.push(IntegrationResult::clean(
                    entry.change_id.clone(),
                    IntegrationStatus::Merged,
                    merge_commit.clone(),
                ));
            }
        }

        Ok(Some(BranchIntegration {
            key: plan.key.clone(),
            old_tip: plan.tip.clone(),
            new_tip: Some(merge_commit),
            results,
        }))
    }
}
