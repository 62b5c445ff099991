//! Index-based dependency graph over `blocked_by` edges.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};

use crate::task::{Task, TaskId};

/// A group of tasks that block each other in a loop.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CycleReport {
    /// Members of the cycle, sorted
    pub task_ids: Vec<TaskId>,
}

/// Dependency graph with tasks stored by index.
///
/// Edges run predecessor -> dependent. Node indices follow sorted task id
/// order so every traversal is deterministic.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    ids: Vec<TaskId>,
    index: HashMap<TaskId, usize>,
    predecessors: Vec<BTreeSet<usize>>,
    successors: Vec<BTreeSet<usize>>,
    missing: BTreeMap<TaskId, BTreeSet<TaskId>>,
}

impl DependencyGraph {
    /// Build the graph from task snapshots. Ids are expected to be unique;
    /// for duplicates the first occurrence wins.
    pub fn build(tasks: &[Task]) -> Self {
        let mut ids: Vec<TaskId> = tasks.iter().map(|t| t.id.clone()).collect();
        ids.sort();
        ids.dedup();
        let index: HashMap<TaskId, usize> = ids.iter().enumerate().map(|(i, id)| (id.clone(), i)).collect();

        let mut predecessors = vec![BTreeSet::new(); ids.len()];
        let mut successors = vec![BTreeSet::new(); ids.len()];
        let mut missing: BTreeMap<TaskId, BTreeSet<TaskId>> = BTreeMap::new();
        let mut seen = vec![false; ids.len()];

        for task in tasks {
            let Some(&node) = index.get(&task.id) else {
                continue;
            };
            if std::mem::replace(&mut seen[node], true) {
                continue;
            }
            for pred_id in &task.blocked_by {
                match index.get(pred_id) {
                    Some(&pred) => {
                        predecessors[node].insert(pred);
                        successors[pred].insert(node);
                    }
                    None => {
                        tracing::warn!(
                            task = %task.id,
                            predecessor = %pred_id,
                            "predecessor not in snapshot; treating as satisfied"
                        );
                        missing.entry(task.id.clone()).or_default().insert(pred_id.clone());
                    }
                }
            }
        }

        Self {
            ids,
            index,
            predecessors,
            successors,
            missing,
        }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn id(&self, node: usize) -> &str {
        &self.ids[node]
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub fn predecessors(&self, node: usize) -> &BTreeSet<usize> {
        &self.predecessors[node]
    }

    pub fn successors(&self, node: usize) -> &BTreeSet<usize> {
        &self.successors[node]
    }

    /// Ids of the tasks `id` waits on that are present in the graph.
    pub fn predecessor_ids(&self, id: &str) -> Vec<&str> {
        self.index_of(id)
            .map(|node| self.predecessors[node].iter().map(|p| self.id(*p)).collect())
            .unwrap_or_default()
    }

    /// Whether any task waits on `id`.
    pub fn has_dependents(&self, id: &str) -> bool {
        self.index_of(id)
            .map(|node| !self.successors[node].is_empty())
            .unwrap_or(false)
    }

    /// Predecessor ids that were referenced but absent from the snapshot.
    pub fn missing_predecessors(&self) -> &BTreeMap<TaskId, BTreeSet<TaskId>> {
        &self.missing
    }

    /// Kahn's algorithm. Returns the processed order and the in-degree left
    /// on every node; nodes with nonzero remainder sit on or behind a cycle.
    fn kahn(&self) -> (Vec<usize>, Vec<usize>) {
        let mut in_degree: Vec<usize> = self.predecessors.iter().map(BTreeSet::len).collect();

        let mut queue: VecDeque<usize> = (0..self.len()).filter(|n| in_degree[*n] == 0).collect();
        let mut order = Vec::with_capacity(self.len());

        while let Some(node) = queue.pop_front() {
            order.push(node);
            for &succ in &self.successors[node] {
                in_degree[succ] -= 1;
                if in_degree[succ] == 0 {
                    queue.push_back(succ);
                }
            }
        }

        (order, in_degree)
    }

    /// Topological order of every node not on or behind a cycle.
    pub fn topological_order(&self) -> Vec<usize> {
        self.kahn().0
    }

    /// Find every cyclic group.
    ///
    /// Nodes Kahn's algorithm cannot release are split into groups of
    /// mutually reachable nodes. Groups of two or more, and self-loops, are
    /// cycles; nodes merely downstream of a cycle are not reported.
    pub fn detect_cycles(&self) -> Vec<CycleReport> {
        let (_, in_degree) = self.kahn();
        let stuck: BTreeSet<usize> = (0..self.len()).filter(|n| in_degree[*n] > 0).collect();
        if stuck.is_empty() {
            return Vec::new();
        }

        let reach: BTreeMap<usize, BTreeSet<usize>> = stuck
            .iter()
            .map(|&node| (node, self.reachable_within(node, &stuck)))
            .collect();

        let mut assigned = BTreeSet::new();
        let mut reports = Vec::new();
        for &node in &stuck {
            if assigned.contains(&node) {
                continue;
            }
            let group: BTreeSet<usize> = stuck
                .iter()
                .copied()
                .filter(|other| {
                    *other == node || (reach[&node].contains(other) && reach[other].contains(&node))
                })
                .collect();
            assigned.extend(group.iter().copied());

            let self_loop = self.successors[node].contains(&node);
            if group.len() > 1 || self_loop {
                let task_ids: Vec<TaskId> = group.iter().map(|n| self.ids[*n].clone()).collect();
                tracing::warn!(tasks = ?task_ids, "dependency cycle detected");
                reports.push(CycleReport { task_ids });
            }
        }
        reports
    }

    /// Nodes reachable from `start` along successor edges, staying in `allowed`.
    fn reachable_within(&self, start: usize, allowed: &BTreeSet<usize>) -> BTreeSet<usize> {
        let mut seen = BTreeSet::new();
        let mut stack = vec![start];
        while let Some(node) = stack.pop() {
            for &succ in &self.successors[node] {
                if allowed.contains(&succ) && seen.insert(succ) {
                    stack.push(succ);
                }
            }
        }
        seen
    }
}
