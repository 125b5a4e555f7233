use tracing::info;

use super::{
    BranchIntegration, IntegrationResult, StrategyContext, SubmitStrategy,
};
use crate::submit::planner::IntegrationPlan;
use crate::submit::resolver::SubmissionSet;
use crate::submit::SubmitError;
use crate::types::{IntegrationStatus, SubmitType};

/// Advances the branch tip through the patch-set commits verbatim. If the
/// plan is not a pure fast-forward, every change on the branch is reported
/// as a policy conflict.
pub struct FastForwardOnly;

impl SubmitStrategy for FastForwardOnly {
    fn submit_type(&self) -> SubmitType {
        SubmitType::FastForwardOnly
    }

    fn apply(
        &self,
        _ctx: &StrategyContext<'_>,
        plan: &IntegrationPlan,
        _set: &SubmissionSet,
    ) -> Result<BranchIntegration, SubmitError> {
        let mut results = Vec::with_capacity(plan.entries.len());

        if !plan.fast_forward_eligible {
            info!(
                "Plan for {} is not a fast-forward; rejecting all {} change(s)",
                plan.key,
                plan.entries.len()
            );
            for entry in &plan.entries {
                if entry.already_in_history {
                    results.push(IntegrationResult::already_merged(entry));
                } else {
                    results.push(IntegrationResult::conflict(
                        entry.change_id.clone(),
                        IntegrationStatus::NotFastForward,
                    ));
                }
            }
            return Ok(BranchIntegration {
                key: plan.key.clone(),
                old_tip: plan.tip.clone(),
                new_tip: plan.tip.clone(),
                results,
            });
        }

        let mut tip = plan.tip.clone();
        for entry in &plan.entries {
            if entry.already_in_history {
                results.push(IntegrationResult::already_merged(entry));
                continue;
            }
            tip = Some(entry.patch_set.commit.clone());
            results.push(IntegrationResult::clean(
                entry.change_id.clone(),
                IntegrationStatus::FastForwarded,
                entry.patch_set.commit.clone(),
            ));
        }

        Ok(BranchIntegration {
            key: plan.key.clone(),
            old_tip: plan.tip.clone(),
            new_tip: tip,
            results,
        })
    }
}
