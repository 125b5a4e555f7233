use std::collections::BTreeMap;
use tracing::{debug, error};

use super::resolver::SubmissionSet;
use super::SubmitError;
use crate::collaborators::{PermissionChecker, SubmitRuleEvaluator};
use crate::types::{Account, ChangeId};

/// Per-change problem collector. All violations across the whole set are
/// gathered before the submission fails once, aggregated; the report format
/// is part of the contract.
#[derive(Debug, Default)]
pub struct ProblemSet {
    problems: BTreeMap<ChangeId, Vec<String>>,
}

impl ProblemSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn problem(&mut self, change_id: &ChangeId, message: impl Into<String>) {
        let message = message.into();
        error!("Problem with change {}: {}", change_id.short(), message);
        self.problems
            .entry(change_id.clone())
            .or_default()
            .push(message);
    }

    pub fn is_ok(&self) -> bool {
        self.problems.is_empty()
    }

    /// Render the aggregated failure for a submission set of `set_size`
    /// changes, or pass if no problems were recorded.
    pub fn maybe_fail(&self, set_size: usize) -> Result<(), SubmitError> {
        if self.is_ok() {
            return Ok(());
        }
        let mut message = format!(
            "Failed to submit {} change{} due to the following problems:\n",
            set_size,
            if set_size > 1 { "s" } else { "" }
        );
        let lines: Vec<String> = self
            .problems
            .iter()
            .map(|(id, reasons)| format!("Change {}: {}", id, reasons.join("; ")))
            .collect();
        message.push_str(&lines.join("\n"));
        Err(SubmitError::Conflict(message))
    }
}

/// Evaluates local submittability for every change in a resolved set
pub struct PreconditionChecker<'a> {
    permissions: &'a dyn PermissionChecker,
    rules: &'a dyn SubmitRuleEvaluator,
}

impl<'a> PreconditionChecker<'a> {
    pub fn new(
        permissions: &'a dyn PermissionChecker,
        rules: &'a dyn SubmitRuleEvaluator,
    ) -> Self {
        Self { permissions, rules }
    }

    /// Check the whole set, aggregating every violation. Changes already
    /// merged are excluded from planning rather than rejected, so they are
    /// skipped here.
    pub fn check(
        &self,
        set: &SubmissionSet,
        actor: &Account,
    ) -> Result<(), SubmitError> {
        let mut problems = ProblemSet::new();

        for change in set.changes() {
            if change.is_merged() {
                debug!(
                    "Change {} is already merged; leaving it to reconciliation",
                    change.id.short()
                );
                continue;
            }

            if !self.permissions.is_visible(change, actor) {
                problems.problem(
                    &change.id,
                    format!("change is not visible to {}", actor.id),
                );
                continue;
            }

            if change.is_abandoned() {
                problems.problem(&change.id, format!("Change {} is abandoned", change.id));
                continue;
            }

            if change.work_in_progress {
                problems.problem(
                    &change.id,
                    format!("Change {} is work in progress", change.id),
                );
                continue;
            }

            if !self.permissions.can_submit(change, actor) {
                problems.problem(
                    &change.id,
                    format!("submit not permitted for {}", actor.id),
                );
            }

            let verdict = self.rules.evaluate(change);
            if !verdict.ok {
                problems.problem(&change.id, verdict.unsatisfied.join("; "));
            }

            self.check_dependencies(set, change.id.clone(), actor, &mut problems);
        }

        problems.maybe_fail(set.len())
    }

    /// Every dependency edge must point at the depended-on change's current
    /// patch set, and the dependency must itself be submittable as part of
    /// this set (or already merged).
    fn check_dependencies(
        &self,
        set: &SubmissionSet,
        change_id: ChangeId,
        actor: &Account,
        problems: &mut ProblemSet,
    ) {
        for edge in set.graph().dependencies_of(&change_id) {
            let Some(dep) = set.change(&edge.depends_on) else {
                problems.problem(
                    &change_id,
                    format!(
                        "depends on change {} that was not submitted",
                        edge.depends_on
                    ),
                );
                continue;
            };

            if dep.is_merged() {
                continue;
            }

            if !self.permissions.is_visible(dep, actor) {
                problems.problem(
                    &change_id,
                    format!("depends on a change that is not visible to {}", actor.id),
                );
                continue;
            }

            if dep.is_abandoned() {
                problems.problem(
                    &change_id,
                    format!("depends on change {} which is abandoned", dep.id),
                );
                continue;
            }

            if dep.current_sequence != edge.required_sequence {
                problems.problem(
                    &change_id,
                    format!(
                        "depends on outdated patch set {} of change {}; the current patch set is {}",
                        edge.required_sequence, dep.id, dep.current_sequence
                    ),
                );
            }
        }
    }
}
