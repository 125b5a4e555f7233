//! The submission pipeline: resolve the set of changes that must land
//! together, check preconditions, plan per-branch integration, run the
//! configured submit strategy, validate and apply ref updates per project,
//! and project the resulting change state.

pub mod coordinator;
pub mod graph;
pub mod planner;
pub mod preconditions;
pub mod projector;
pub mod resolver;
pub mod strategy;
pub mod updater;
pub mod validation;

#[cfg(test)]
mod tests;

use thiserror::Error;

use crate::git::GitError;
use crate::hooks::HookError;
use crate::providers::ProviderError;
use crate::types::{ChangeId, ObjectId};

/// Error surface of the submission engine
#[derive(Debug, Error)]
pub enum SubmitError {
    /// Aggregated precondition or integration problems; the report text is
    /// part of the contract.
    #[error("{0}")]
    Conflict(String),
    #[error("change {0} not found")]
    NotFound(ChangeId),
    #[error("change {dependent} depends on commit {commit} which is not associated with any change")]
    MissingDependency {
        dependent: ChangeId,
        commit: ObjectId,
    },
    #[error("ref updates for project {project} kept failing after {attempts} attempts due to concurrent updates")]
    RetryExhausted { project: String, attempts: u32 },
    #[error(transparent)]
    Hook(#[from] HookError),
    #[error(transparent)]
    Git(#[from] GitError),
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

pub use coordinator::Submitter;
pub use graph::{DependencyEdge, DependencyGraph};
pub use planner::{IntegrationPlan, IntegrationPlanner, PlanEntry};
pub use preconditions::{PreconditionChecker, ProblemSet};
pub use projector::ChangeStateProjector;
pub use resolver::{SubmissionSet, SubmissionSetResolver};
pub use strategy::{BranchIntegration, IntegrationResult, StrategyContext, SubmitStrategy};
pub use updater::{AtomicRefUpdater, LockFailureScript};
