//! Forward/backward pass over the dependency graph.
//!
//! The forward pass gives each task its earliest start given its
//! predecessors. The backward pass propagates due dates upstream: a
//! predecessor must finish before its dependent's latest start. Slack is the
//! gap between the two; tasks with no slack are on the critical path.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use super::DependencyGraph;
use crate::scoring::TaskSignals;
use crate::task::{Task, TaskId};

/// Timing of one task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskTiming {
    pub earliest_start: DateTime<Utc>,
    pub earliest_finish: DateTime<Utc>,
    /// Latest finish that keeps every downstream due date; `None` if no
    /// due date constrains the task
    pub latest_finish: Option<DateTime<Utc>>,
    pub slack_minutes: Option<i64>,
    pub critical: bool,
    /// Number of tasks waiting directly on this one
    pub dependents: usize,
}

/// Per-task timings for the acyclic part of the graph.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CriticalPathReport {
    timings: BTreeMap<TaskId, TaskTiming>,
}

impl CriticalPathReport {
    pub fn get(&self, id: &str) -> Option<&TaskTiming> {
        self.timings.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&TaskId, &TaskTiming)> {
        self.timings.iter()
    }

    pub fn critical_ids(&self) -> Vec<&str> {
        self.timings
            .iter()
            .filter(|(_, t)| t.critical)
            .map(|(id, _)| id.as_str())
            .collect()
    }

    /// Scoring inputs for a task; the goal signal is left neutral.
    pub fn signals_for(&self, id: &str) -> TaskSignals {
        match self.timings.get(id) {
            Some(timing) => TaskSignals {
                critical: timing.critical,
                slack_minutes: timing.slack_minutes,
                blocks_others: timing.dependents > 0,
                ..TaskSignals::default()
            },
            None => TaskSignals::default(),
        }
    }
}

/// Computes earliest starts, latest finishes and slack.
#[derive(Debug, Clone, Copy, Default)]
pub struct CriticalPathAnalyzer;

impl CriticalPathAnalyzer {
    pub fn new() -> Self {
        Self
    }

    /// Analyze every task reachable by a topological order of `graph`.
    ///
    /// `tasks` must be the snapshot `graph` was built from. Tasks on or
    /// behind a cycle get no timing.
    pub fn analyze(&self, graph: &DependencyGraph, tasks: &[Task], now: DateTime<Utc>) -> CriticalPathReport {
        let by_id: HashMap<&str, &Task> = tasks.iter().map(|t| (t.id.as_str(), t)).collect();
        let order = graph.topological_order();

        let mut earliest: HashMap<usize, (DateTime<Utc>, DateTime<Utc>)> = HashMap::new();
        for &node in &order {
            let Some(task) = by_id.get(graph.id(node)) else {
                continue;
            };
            let window = if task.status.is_terminal() {
                let done = task.completed_at.unwrap_or(now);
                (done, done)
            } else if let Some((start, end)) = task.placement.interval() {
                (start, end)
            } else {
                let after_preds = graph
                    .predecessors(node)
                    .iter()
                    .filter_map(|p| earliest.get(p).map(|(_, finish)| *finish))
                    .max();
                let start = match after_preds {
                    Some(pred_end) => task.ready_at(now).max(pred_end),
                    None => task.ready_at(now),
                };
                (start, start + task.duration())
            };
            earliest.insert(node, window);
        }

        let mut latest: HashMap<usize, DateTime<Utc>> = HashMap::new();
        for &node in order.iter().rev() {
            let Some(task) = by_id.get(graph.id(node)) else {
                continue;
            };
            if task.status.is_terminal() {
                continue;
            }
            let from_successors = graph
                .successors(node)
                .iter()
                .filter_map(|s| {
                    let succ = by_id.get(graph.id(*s))?;
                    latest.get(s).map(|lf| *lf - succ.duration())
                })
                .min();
            let bound = match (task.due_date, from_successors) {
                (Some(due), Some(succ)) => Some(due.min(succ)),
                (due, succ) => due.or(succ),
            };
            if let Some(lf) = bound {
                latest.insert(node, lf);
            }
        }

        let mut timings = BTreeMap::new();
        for &node in &order {
            let (Some(task), Some(&(earliest_start, earliest_finish))) = (by_id.get(graph.id(node)), earliest.get(&node))
            else {
                continue;
            };
            let latest_finish = latest.get(&node).copied();
            let slack_minutes = latest_finish.map(|lf| (lf - earliest_start - task.duration()).num_minutes());
            let critical = slack_minutes.map_or(false, |s| s <= 0);
            let dependents = graph.successors(node).len();

            if critical {
                tracing::debug!(task = %task.id, slack = ?slack_minutes, "task on critical path");
            }

            timings.insert(
                task.id.clone(),
                TaskTiming {
                    earliest_start,
                    earliest_finish,
                    latest_finish,
                    slack_minutes,
                    critical,
                    dependents,
                },
            );
        }

        CriticalPathReport { timings }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskStatus;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap()
    }

    fn task(id: &str) -> Task {
        Task::with_id(id, id, now())
    }

    #[test]
    fn forward_pass_chains_earliest_starts() {
        let tasks = vec![
            task("a").with_minutes(60),
            task("b").with_minutes(30).blocked_by("a"),
        ];
        let graph = DependencyGraph::build(&tasks);
        let report = CriticalPathAnalyzer::new().analyze(&graph, &tasks, now());

        let b = report.get("b").unwrap();
        assert_eq!(b.earliest_start, now() + Duration::minutes(60));
        assert_eq!(b.earliest_finish, now() + Duration::minutes(90));
        assert_eq!(report.get("a").unwrap().dependents, 1);
    }

    #[test]
    fn due_dates_propagate_backwards() {
        let due = now() + Duration::minutes(90);
        let tasks = vec![
            task("a").with_minutes(60),
            task("b").with_minutes(30).blocked_by("a").with_due(due),
            task("loose").with_minutes(30).with_due(now() + Duration::days(2)),
        ];
        let graph = DependencyGraph::build(&tasks);
        let report = CriticalPathAnalyzer::new().analyze(&graph, &tasks, now());

        let a = report.get("a").unwrap();
        assert_eq!(a.latest_finish, Some(now() + Duration::minutes(60)));
        assert_eq!(a.slack_minutes, Some(0));
        assert!(a.critical);
        assert!(report.get("b").unwrap().critical);

        let loose = report.get("loose").unwrap();
        assert!(!loose.critical);
        assert_eq!(loose.slack_minutes, Some(2 * 24 * 60 - 30));
        assert_eq!(report.critical_ids(), vec!["a", "b"]);
    }

    #[test]
    fn completed_predecessor_ends_at_completion() {
        let done_at = now() - Duration::hours(1);
        let mut done = task("a").with_status(TaskStatus::Completed);
        done.completed_at = Some(done_at);
        let tasks = vec![done, task("b").blocked_by("a")];
        let graph = DependencyGraph::build(&tasks);
        let report = CriticalPathAnalyzer::new().analyze(&graph, &tasks, now());

        assert_eq!(report.get("a").unwrap().earliest_finish, done_at);
        assert_eq!(report.get("b").unwrap().earliest_start, now());
    }

    #[test]
    fn tasks_without_deadlines_have_no_slack() {
        let tasks = vec![task("a")];
        let graph = DependencyGraph::build(&tasks);
        let report = CriticalPathAnalyzer::new().analyze(&graph, &tasks, now());
        let signals = report.signals_for("a");
        assert_eq!(signals.slack_minutes, None);
        assert!(!signals.critical);
        assert!(!signals.blocks_others);
    }
}
