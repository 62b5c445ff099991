//! Output of a planning run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::dependency::CycleReport;
use crate::goal::GoalReport;
use crate::task::{Task, TaskId};

/// Why a task received no placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasonCode {
    /// A predecessor is unplaceable or cyclic, or only ignoring the
    /// dependency-ready time would leave room before the due date
    DependencyNotReady,
    /// Room exists only outside deep-work energy hours
    EnergyMismatch,
    /// Room exists only when required contexts are unavailable
    ContextUnavailable,
    /// No room before the due date or the horizon end
    NoCapacity,
}

impl fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ReasonCode::DependencyNotReady => "dependency_not_ready",
            ReasonCode::EnergyMismatch => "energy_mismatch",
            ReasonCode::ContextUnavailable => "context_unavailable",
            ReasonCode::NoCapacity => "no_capacity",
        };
        f.write_str(s)
    }
}

/// How existing placements are treated on a re-run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PlanMode {
    /// Manual placements and still-valid auto placements stay put
    #[default]
    Incremental,
    /// Auto placements are re-optimized; manual placements stay put
    ReplanAuto,
    /// Everything is re-optimized, manual placements included
    ReplanAll,
}

impl PlanMode {
    pub fn keeps_auto_placements(&self) -> bool {
        matches!(self, PlanMode::Incremental)
    }

    pub fn keeps_manual_placements(&self) -> bool {
        !matches!(self, PlanMode::ReplanAll)
    }
}

impl fmt::Display for PlanMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PlanMode::Incremental => "incremental",
            PlanMode::ReplanAuto => "replan-auto",
            PlanMode::ReplanAll => "replan-all",
        };
        f.write_str(s)
    }
}

impl FromStr for PlanMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "incremental" => Ok(PlanMode::Incremental),
            "replan-auto" | "replan_auto" => Ok(PlanMode::ReplanAuto),
            "replan-all" | "replan_all" => Ok(PlanMode::ReplanAll),
            other => Err(format!(
                "unknown plan mode '{other}' (expected incremental, replan-auto or replan-all)"
            )),
        }
    }
}

/// A task placed on the calendar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub task_id: TaskId,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// A task the run could not place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unschedulable {
    pub task_id: TaskId,
    pub reason: ReasonCode,
}

/// A task dropped before planning because its snapshot was malformed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectedTask {
    pub task_id: TaskId,
    pub error: String,
}

/// Result of one planning run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulePlan {
    pub generated_at: DateTime<Utc>,
    /// Engine placements, new and kept, sorted by start then task id
    pub assignments: Vec<Assignment>,
    /// Manual placements honoured as fixed commitments
    pub commitments: Vec<Assignment>,
    /// Sorted by task id
    pub unschedulable: Vec<Unschedulable>,
    /// Sorted by goal id
    pub goal_reports: Vec<GoalReport>,
    pub cycles: Vec<CycleReport>,
    /// Sorted by task id
    pub rejected: Vec<RejectedTask>,
}

impl SchedulePlan {
    pub fn empty(generated_at: DateTime<Utc>) -> Self {
        Self {
            generated_at,
            assignments: Vec::new(),
            commitments: Vec::new(),
            unschedulable: Vec::new(),
            goal_reports: Vec::new(),
            cycles: Vec::new(),
            rejected: Vec::new(),
        }
    }

    pub fn assignment_for(&self, task_id: &str) -> Option<&Assignment> {
        self.assignments.iter().find(|a| a.task_id == task_id)
    }

    pub fn reason_for(&self, task_id: &str) -> Option<ReasonCode> {
        self.unschedulable
            .iter()
            .find(|u| u.task_id == task_id)
            .map(|u| u.reason)
    }

    /// SHA-256 over the canonical JSON form, hex encoded.
    pub fn fingerprint(&self) -> String {
        let bytes = serde_json::to_vec(self).unwrap_or_default();
        hex::encode(Sha256::digest(&bytes))
    }

    /// Apply the plan's side effects to task snapshots.
    ///
    /// Assigned tasks become `AutoPlaced` (and `Scheduled` when they were
    /// inbox, next-action or active). Unschedulable tasks lose any stale auto
    /// placement. Manual placements are never touched unless the plan
    /// re-assigned the task.
    pub fn apply_to(&self, tasks: &mut [Task]) {
        let assigned: HashMap<&str, &Assignment> =
            self.assignments.iter().map(|a| (a.task_id.as_str(), a)).collect();
        for task in tasks.iter_mut() {
            if let Some(a) = assigned.get(task.id.as_str()) {
                task.mark_auto_placed(a.start, a.end);
            } else if self.reason_for(&task.id).is_some() {
                task.clear_auto_placement();
            }
        }
    }

    pub(crate) fn finish(mut self) -> Self {
        self.assignments
            .sort_by(|a, b| a.start.cmp(&b.start).then_with(|| a.task_id.cmp(&b.task_id)));
        self.commitments
            .sort_by(|a, b| a.start.cmp(&b.start).then_with(|| a.task_id.cmp(&b.task_id)));
        self.unschedulable.sort_by(|a, b| a.task_id.cmp(&b.task_id));
        self.rejected.sort_by(|a, b| a.task_id.cmp(&b.task_id));
        self.goal_reports.sort_by(|a, b| a.goal_id.cmp(&b.goal_id));
        self.cycles.sort();
        self
    }
}
