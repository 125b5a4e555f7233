use std::collections::{BTreeMap, HashSet};
use tracing::warn;

use crate::types::ChangeId;

/// One depends-on edge: the dependent change's current patch set has a
/// parent commit owned by `depends_on` at patch set `required_sequence`.
/// The edge is stale once `depends_on` has a newer current patch set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyEdge {
    pub dependent: ChangeId,
    pub depends_on: ChangeId,
    pub required_sequence: u32,
}

/// Directed depends-on graph over a submission set
#[derive(Debug, Default)]
pub struct DependencyGraph {
    edges: BTreeMap<ChangeId, Vec<DependencyEdge>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_edge(&mut self, edge: DependencyEdge) {
        let edges = self.edges.entry(edge.dependent.clone()).or_default();
        if !edges.contains(&edge) {
            edges.push(edge);
        }
    }

    /// Edges leaving a change (what it depends on)
    pub fn dependencies_of(&self, change_id: &ChangeId) -> &[DependencyEdge] {
        self.edges.get(change_id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Topological ordering of `members`: a dependency always precedes its
    /// dependents, ties broken by the original member order. Edges to
    /// changes outside `members` are ignored.
    pub fn topological_order(&self, members: &[ChangeId]) -> Vec<ChangeId> {
        let member_set: HashSet<&ChangeId> = members.iter().collect();
        let mut remaining: Vec<&ChangeId> = members.iter().collect();
        let mut placed: HashSet<&ChangeId> = HashSet::new();
        let mut order = Vec::with_capacity(members.len());

        while !remaining.is_empty() {
            let next = remaining.iter().position(|id| {
                self.dependencies_of(id)
                    .iter()
                    .all(|edge| {
                        !member_set.contains(&edge.depends_on) || placed.contains(&edge.depends_on)
                    })
            });

            match next {
                Some(index) => {
                    let id = remaining.remove(index);
                    placed.insert(id);
                    order.push(id.clone());
                }
                None => {
                    // A dependency cycle cannot arise from an acyclic commit
                    // graph; if the edge data is inconsistent, fall back to
                    // the original order for what is left.
                    warn!(
                        "Dependency ordering stuck with {} unplaced changes; keeping original order",
                        remaining.len()
                    );
                    order.extend(remaining.drain(..).cloned());
                }
            }
        }
        order
    }
}
