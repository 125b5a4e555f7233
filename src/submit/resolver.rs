use std::collections::{BTreeMap, BTreeSet, VecDeque};
use tracing::{debug, info};

use super::graph::{DependencyEdge, DependencyGraph};
use super::SubmitError;
use crate::database::DatabaseRef;
use crate::git;
use crate::providers::ChangesProvider;
use crate::providers::RefsProvider;
use crate::types::{BranchKey, Change, ChangeId};

/// The resolved, deduplicated set of changes that must be submitted
/// together. Transient: recomputed on every submission attempt.
#[derive(Debug)]
pub struct SubmissionSet {
    /// All member changes, in discovery order
    changes: Vec<Change>,
    graph: DependencyGraph,
    /// Member ids per target branch, in discovery order
    branches: BTreeMap<BranchKey, Vec<ChangeId>>,
}

impl SubmissionSet {
    pub fn changes(&self) -> &[Change] {
        &self.changes
    }

    pub fn change(&self, id: &ChangeId) -> Option<&Change> {
        self.changes.iter().find(|c| &c.id == id)
    }

    pub fn contains(&self, id: &ChangeId) -> bool {
        self.change(id).is_some()
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    pub fn branches(&self) -> &BTreeMap<BranchKey, Vec<ChangeId>> {
        &self.branches
    }

    pub fn ids(&self) -> Vec<ChangeId> {
        self.changes.iter().map(|c| c.id.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

/// Computes the full set of changes that must land together: transitive
/// patch-set dependencies plus, in whole-topic mode, every change sharing a
/// member's topic - and their dependencies, across any number of projects.
pub struct SubmissionSetResolver {
    db: DatabaseRef,
}

impl SubmissionSetResolver {
    pub fn new(db: DatabaseRef) -> Self {
        Self { db }
    }

    /// Resolve the submission set seeded by one change
    pub fn resolve(
        &self,
        seed_id: &ChangeId,
        whole_topic: bool,
    ) -> Result<SubmissionSet, SubmitError> {
        let seed = self
            .db
            .changes()
            .get_change(seed_id)?
            .ok_or_else(|| SubmitError::NotFound(seed_id.clone()))?;

        let mut queue = VecDeque::from([seed.clone()]);
        let mut members: BTreeSet<ChangeId> = BTreeSet::new();
        let mut changes: Vec<Change> = Vec::new();
        let mut graph = DependencyGraph::new();

        while let Some(change) = queue.pop_front() {
            if !members.insert(change.id.clone()) {
                continue;
            }
            debug!(
                "Submission set member: {} ({}) on {}",
                change.subject,
                change.id.short(),
                change.branch_key()
            );

            if change.is_new() {
                self.collect_dependencies(&change, &mut graph, &mut queue)?;
            }

            // Topic closure also walks merged members, so a retry that finds
            // the seed already landed still reaches the rest of its topic
            if whole_topic && !change.is_abandoned() {
                if let Some(topic) = &change.topic {
                    for member in self.db.changes().open_changes_by_topic(topic)? {
                        if !members.contains(&member.id) {
                            queue.push_back(member);
                        }
                    }
                }
            }

            changes.push(change);
        }

        let mut branches: BTreeMap<BranchKey, Vec<ChangeId>> = BTreeMap::new();
        for change in &changes {
            branches
                .entry(change.branch_key())
                .or_default()
                .push(change.id.clone());
        }

        info!(
            "Resolved submission set of {} change(s) across {} branch(es) from seed {}",
            changes.len(),
            branches.len(),
            seed_id.short()
        );

        Ok(SubmissionSet {
            changes,
            graph,
            branches,
        })
    }

    /// Walk the current patch set's parents and turn each one into either a
    /// satisfied dependency (merged change, or commit already in the branch
    /// history) or an edge to another open change. A parent owned by no
    /// change and absent from the branch history is unresolvable.
    fn collect_dependencies(
        &self,
        change: &Change,
        graph: &mut DependencyGraph,
        queue: &mut VecDeque<Change>,
    ) -> Result<(), SubmitError> {
        let Some(patch_set) = self.db.changes().current_patch_set(&change.id)? else {
            return Ok(());
        };

        for parent in &patch_set.parents {
            match self
                .db
                .changes()
                .change_owning_commit(&change.project, parent)?
            {
                Some((dep_id, sequence)) => {
                    if dep_id == change.id {
                        continue;
                    }
                    let dep = self.db.changes().require_change(&dep_id)?;
                    if dep.is_merged() {
                        continue;
                    }
                    graph.add_edge(DependencyEdge {
                        dependent: change.id.clone(),
                        depends_on: dep_id.clone(),
                        required_sequence: sequence,
                    });
                    queue.push_back(dep);
                }
                None => {
                    let tip = self.db.refs().branch_tip(&change.branch_key())?;
                    let in_history = match &tip {
                        Some(tip) => git::is_ancestor(self.db.objects().as_ref(), parent, tip)?,
                        None => false,
                    };
                    if !in_history {
                        return Err(SubmitError::MissingDependency {
                            dependent: change.id.clone(),
                            commit: parent.clone(),
                        });
                    }
                }
            }
        }
        Ok(())
    }
}
