use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use super::planner::IntegrationPlanner;
use super::preconditions::{PreconditionChecker, ProblemSet};
use super::projector::ChangeStateProjector;
use super::resolver::{SubmissionSet, SubmissionSetResolver};
use super::strategy::{self, BranchIntegration, StrategyContext};
use super::updater::{AtomicRefUpdater, LockFailureScript};
use super::{validation, SubmitError};
use crate::collaborators::{
    LoggingObserver, PermissionChecker, RequiredLabels, StandardPermissions, SubmissionObserver,
    SubmitRuleEvaluator,
};
use crate::config::{Config, ProjectsConfig};
use crate::database::DatabaseRef;
use crate::git::Signature;
use crate::hooks::SubmitHooks;
use crate::providers::RefTransactionError;
use crate::types::{
    Account, BranchKey, ChangeId, ChangeResult, IntegrationStatus, ObjectId, SubmissionReport,
    SubmitOptions,
};

/// The engine's public surface: orchestrates resolve -> check -> plan ->
/// integrate -> validate -> apply -> project, with bounded retry on
/// optimistic-lock failure. Every retry recomputes the full pipeline from
/// scratch; nothing from a failed attempt is reused.
pub struct Submitter {
    db: DatabaseRef,
    config: Config,
    projects: ProjectsConfig,
    permissions: Arc<dyn PermissionChecker>,
    rules: Arc<dyn SubmitRuleEvaluator>,
    observer: Arc<dyn SubmissionObserver>,
    hooks: Arc<SubmitHooks>,
}

/// One attempt's transient computation; discarded wholesale on retry
struct ComputedSubmission {
    set: SubmissionSet,
    integrations: Vec<BranchIntegration>,
}

impl Submitter {
    pub fn new(db: DatabaseRef, config: Config) -> Self {
        Self {
            db,
            config,
            projects: ProjectsConfig::new(),
            permissions: Arc::new(StandardPermissions),
            rules: Arc::new(RequiredLabels::default()),
            observer: Arc::new(LoggingObserver),
            hooks: Arc::new(SubmitHooks::new()),
        }
    }

    pub fn with_projects(mut self, projects: ProjectsConfig) -> Self {
        self.projects = projects;
        self
    }

    pub fn with_permissions(mut self, permissions: Arc<dyn PermissionChecker>) -> Self {
        self.permissions = permissions;
        self
    }

    pub fn with_rules(mut self, rules: Arc<dyn SubmitRuleEvaluator>) -> Self {
        self.rules = rules;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn SubmissionObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_hooks(mut self, hooks: Arc<SubmitHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    /// The set of changes that would be submitted together with `change_id`,
    /// without submitting anything.
    pub fn submitted_together(&self, change_id: &ChangeId) -> Result<Vec<ChangeId>, SubmitError> {
        let resolver = SubmissionSetResolver::new(Arc::clone(&self.db));
        let set = resolver.resolve(change_id, self.config.topic_submission_enabled)?;
        Ok(set.ids())
    }

    /// Predict each touched branch's resulting tree without mutating any
    /// ref. Shares the exact planning and strategy code paths with
    /// [`Submitter::submit`], so preview and submission agree.
    pub fn preview(
        &self,
        change_id: &ChangeId,
        actor: &Account,
        options: &SubmitOptions,
    ) -> Result<BTreeMap<BranchKey, ObjectId>, SubmitError> {
        let whole_topic = options
            .whole_topic
            .unwrap_or(self.config.topic_submission_enabled);
        let computed = self.compute(change_id, actor, whole_topic)?;

        let mut trees = BTreeMap::new();
        for integration in &computed.integrations {
            if let Some(tip) = &integration.new_tip {
                use crate::providers::ObjectsProvider;
                let commit = self.db.objects().commit(tip)?;
                trees.insert(integration.key.clone(), commit.tree);
            }
        }
        Ok(trees)
    }

    /// Submit a change (and everything that must land with it)
    pub async fn submit(
        &self,
        change_id: &ChangeId,
        actor: &Account,
        options: SubmitOptions,
    ) -> Result<SubmissionReport, SubmitError> {
        let submission_id = Uuid::now_v7().to_string();
        let whole_topic = options
            .whole_topic
            .unwrap_or(self.config.topic_submission_enabled);
        let script = LockFailureScript::new(options.lock_failure_script.clone());

        info!(
            "Submission {} of change {} by {} (whole-topic: {})",
            submission_id,
            change_id.short(),
            actor.id,
            whole_topic
        );

        // Outcomes survive across attempts: a project committed on attempt N
        // reconciles as already-merged on attempt N+1 instead of recomputing
        let mut collected: BTreeMap<ChangeId, ChangeResult> = BTreeMap::new();

        for attempt in 1..=self.config.max_submission_attempts {
            let computed = self.compute(change_id, actor, whole_topic)?;

            let mut by_project: BTreeMap<String, Vec<&BranchIntegration>> = BTreeMap::new();
            for integration in &computed.integrations {
                by_project
                    .entry(integration.key.project.clone())
                    .or_default()
                    .push(integration);
            }

            let mut contended_project = None;
            for (project, integrations) in &by_project {
                match self
                    .apply_and_project(project, integrations, actor, &submission_id, &script)
                    .await?
                {
                    ProjectOutcome::Committed(results) | ProjectOutcome::Vetoed(results) => {
                        for result in results {
                            collected.insert(result.change_id.clone(), result);
                        }
                    }
                    ProjectOutcome::LockFailure => {
                        contended_project = Some(project.clone());
                    }
                }
            }

            if let Some(project) = contended_project {
                if attempt == self.config.max_submission_attempts {
                    return Err(SubmitError::RetryExhausted {
                        project,
                        attempts: attempt,
                    });
                }
                warn!(
                    "Attempt {} lost the ref lock on project {}; replanning",
                    attempt, project
                );
                continue;
            }

            return self.assemble_report(submission_id, &computed.set, collected);
        }

        Err(SubmitError::RetryExhausted {
            project: String::new(),
            attempts: self.config.max_submission_attempts,
        })
    }

    /// Resolve, check, plan, and run strategies - the read-only front half
    /// of the pipeline, shared between preview and submission. Fails with
    /// the aggregated report if any change cannot integrate.
    fn compute(
        &self,
        change_id: &ChangeId,
        actor: &Account,
        whole_topic: bool,
    ) -> Result<ComputedSubmission, SubmitError> {
        let resolver = SubmissionSetResolver::new(Arc::clone(&self.db));
        let set = resolver.resolve(change_id, whole_topic)?;

        PreconditionChecker::new(self.permissions.as_ref(), self.rules.as_ref())
            .check(&set, actor)?;

        let plans = IntegrationPlanner::new(Arc::clone(&self.db)).plan(&set)?;

        let when = Utc::now();
        let server_identity = Signature::new(
            self.config.server_name.clone(),
            self.config.server_email.clone(),
            when,
        );

        let mut integrations = Vec::with_capacity(plans.len());
        for plan in &plans {
            let settings = self.projects.for_project(&plan.key.project);
            let submit_strategy = strategy::for_submit_type(settings.submit_type);
            let ctx = StrategyContext {
                objects: self.db.objects().as_ref(),
                settings,
                hooks: self.hooks.as_ref(),
                caller: actor,
                server_identity: server_identity.clone(),
                when,
            };
            integrations.push(submit_strategy.apply(&ctx, plan, &set)?);
        }

        self.fail_on_conflicts(&set, &integrations)?;
        Ok(ComputedSubmission { set, integrations })
    }

    /// A conflict anywhere aborts the whole submission before any ref
    /// mutation, leaving every branch and change untouched.
    fn fail_on_conflicts(
        &self,
        set: &SubmissionSet,
        integrations: &[BranchIntegration],
    ) -> Result<(), SubmitError> {
        let mut problems = ProblemSet::new();
        for integration in integrations {
            for result in &integration.results {
                if !result.status.is_clean() {
                    problems.problem(&result.change_id, result.status.describe(None));
                }
            }
        }
        problems.maybe_fail(set.len())
    }

    /// Validate, apply, and project one project's transaction
    async fn apply_and_project(
        &self,
        project: &str,
        integrations: &[&BranchIntegration],
        actor: &Account,
        submission_id: &str,
        script: &LockFailureScript,
    ) -> Result<ProjectOutcome, SubmitError> {
        let commands: Vec<_> = integrations
            .iter()
            .flat_map(|i| i.commands())
            .collect();

        if !commands.is_empty() {
            if let Err(veto) = validation::validate_project(
                self.hooks.as_ref(),
                project,
                &commands,
                self.db.objects().as_ref(),
            ) {
                let mut results = Vec::new();
                for integration in integrations {
                    for result in &integration.results {
                        results.push(ChangeResult {
                            change_id: result.change_id.clone(),
                            branch: integration.key.clone(),
                            status: IntegrationStatus::RejectedByValidator,
                            commit: None,
                            message: veto.to_string(),
                        });
                    }
                }
                return Ok(ProjectOutcome::Vetoed(results));
            }

            let updater = AtomicRefUpdater::new(self.db.refs().as_ref());
            match updater.apply_project(project, &commands, script) {
                Ok(()) => {}
                Err(RefTransactionError::LockFailure { .. }) => {
                    return Ok(ProjectOutcome::LockFailure);
                }
                Err(RefTransactionError::Provider(e)) => return Err(e.into()),
            }
            for command in &commands {
                self.observer.ref_updated(command).await;
            }
        }

        let projector = ChangeStateProjector::new(Arc::clone(&self.db), Arc::clone(&self.observer));
        let mut results = Vec::new();
        for integration in integrations {
            let settings = self.projects.for_project(&integration.key.project);
            for result in &integration.results {
                results.push(
                    projector
                        .project(
                            result,
                            &integration.key,
                            settings.submit_type,
                            actor,
                            submission_id,
                        )
                        .await?,
                );
            }
        }
        Ok(ProjectOutcome::Committed(results))
    }

    /// Order the report by discovery order; members that were merged before
    /// this submission began get an already-merged entry.
    fn assemble_report(
        &self,
        submission_id: String,
        set: &SubmissionSet,
        mut collected: BTreeMap<ChangeId, ChangeResult>,
    ) -> Result<SubmissionReport, SubmitError> {
        let mut results = Vec::with_capacity(set.len());
        for change in set.changes() {
            if let Some(result) = collected.remove(&change.id) {
                results.push(result);
            } else if change.is_merged() {
                results.push(ChangeResult {
                    change_id: change.id.clone(),
                    branch: change.branch_key(),
                    status: IntegrationStatus::AlreadyMerged,
                    commit: None,
                    message: IntegrationStatus::AlreadyMerged.describe(None),
                });
            }
        }

        let any_merged = results.iter().any(|r| r.status.is_clean());
        if !any_merged {
            let vetoed: Vec<&ChangeResult> = results
                .iter()
                .filter(|r| r.status == IntegrationStatus::RejectedByValidator)
                .collect();
            if !vetoed.is_empty() {
                let mut problems = ProblemSet::new();
                for result in vetoed {
                    problems.problem(&result.change_id, result.message.clone());
                }
                problems.maybe_fail(set.len())?;
            }
        }

        info!(
            "Submission {} finished with {} result(s)",
            submission_id,
            results.len()
        );
        Ok(SubmissionReport {
            submission_id,
            results,
        })
    }
}

enum ProjectOutcome {
    Committed(Vec<ChangeResult>),
    Vetoed(Vec<ChangeResult>),
    LockFailure,
}
