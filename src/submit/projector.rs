use std::sync::Arc;
use tracing::{debug, info};

use super::strategy::IntegrationResult;
use super::SubmitError;
use crate::collaborators::SubmissionObserver;
use crate::database::DatabaseRef;
use crate::providers::ChangesProvider;
use crate::types::{
    Account, BranchKey, ChangeMessage, ChangeResult, ChangeStatus, IntegrationStatus, SubmitType,
};
use crate::util;

/// Applies a change's persisted state transition after its ref update
/// succeeded (or was reconciled): status MERGED, submitter record, generated
/// message, attention-set clearing, and reindex scheduling.
pub struct ChangeStateProjector {
    db: DatabaseRef,
    observer: Arc<dyn SubmissionObserver>,
}

impl ChangeStateProjector {
    pub fn new(db: DatabaseRef, observer: Arc<dyn SubmissionObserver>) -> Self {
        Self { db, observer }
    }

    /// Project one integrated change. Safe to re-run: a change already
    /// MERGED only has its report entry recomputed.
    pub async fn project(
        &self,
        result: &IntegrationResult,
        key: &BranchKey,
        submit_type: SubmitType,
        caller: &Account,
        submission_id: &str,
    ) -> Result<ChangeResult, SubmitError> {
        let mut change = self.db.changes().require_change(&result.change_id)?;

        if let Some(patch_set) = &result.new_patch_set {
            self.db.changes().add_patch_set(patch_set)?;
            change = self.db.changes().require_change(&result.change_id)?;
        }

        // An ALREADY_MERGED repair records the message the original attempt
        // would have written
        let status = match result.status {
            IntegrationStatus::AlreadyMerged => match submit_type {
                SubmitType::FastForwardOnly
                | SubmitType::MergeIfNecessary
                | SubmitType::MergeAlways => IntegrationStatus::Merged,
                SubmitType::CherryPick => IntegrationStatus::CherryPicked,
                SubmitType::RebaseIfNecessary | SubmitType::RebaseAlways => {
                    IntegrationStatus::Rebased
                }
            },
            other => other,
        };
        let message = status.describe(result.commit.as_ref());

        if change.is_merged() {
            debug!(
                "Change {} already marked merged; repairing report only",
                change.id.short()
            );
        } else {
            change.status = ChangeStatus::Merged;
            change.submitter = Some(caller.clone());
            change.submission_id = Some(submission_id.to_string());
            change.work_in_progress = false;
            change.attention_set.clear();
            change.messages.push(ChangeMessage {
                author: caller.id.clone(),
                text: message.clone(),
                timestamp: util::current_unix_timestamp(),
            });
            self.db.changes().update_change(&change)?;
            info!(
                "Change {} marked merged by {} ({})",
                change.id.short(),
                caller.id,
                submission_id
            );

            if let Some(commit) = &result.commit {
                self.observer.change_merged(&change, commit).await;
            }
        }

        // The submitted change is reindexed before returning; open siblings
        // on the branch may have changed mergeability and reindex in the
        // background.
        self.observer.reindex(&change.id).await;
        self.schedule_sibling_reindex(key, &change.id)?;

        Ok(ChangeResult {
            change_id: result.change_id.clone(),
            branch: key.clone(),
            status: result.status,
            commit: result.commit.clone(),
            message,
        })
    }

    fn schedule_sibling_reindex(
        &self,
        key: &BranchKey,
        submitted: &crate::types::ChangeId,
    ) -> Result<(), SubmitError> {
        for sibling in self.db.changes().open_changes_on(key)? {
            if &sibling.id == submitted {
                continue;
            }
            let observer = Arc::clone(&self.observer);
            let id = sibling.id.clone();
            tokio::spawn(async move {
                observer.reindex(&id).await;
            });
        }
        Ok(())
    }
}
