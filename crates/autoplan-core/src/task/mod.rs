//! Task entity as seen by the scheduling engine.
//!
//! Tasks arrive as snapshots from the task repository. The engine never
//! creates tasks; it only reads them and, through [`Task::mark_auto_placed`],
//! describes the placement side effect a caller should persist.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::error::ValidationError;

/// Opaque task identifier.
pub type TaskId = String;

/// Longest single task the engine will try to place, in minutes.
pub const MAX_TASK_MINUTES: i32 = 12 * 60;

/// Workflow status of a task.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Captured, not yet clarified
    Inbox,
    /// Clarified and actionable
    NextAction,
    /// Being worked on
    Active,
    /// Delegated or waiting on someone else
    WaitingFor,
    /// Has a calendar slot
    Scheduled,
    /// Parked for later consideration
    SomedayMaybe,
    /// Done (terminal)
    Completed,
    /// Removed (terminal)
    Deleted,
}

impl TaskStatus {
    /// Whether the engine may place a task in this status.
    pub fn is_schedulable(&self) -> bool {
        matches!(
            self,
            TaskStatus::Inbox | TaskStatus::NextAction | TaskStatus::Active | TaskStatus::Scheduled
        )
    }

    /// Completed and deleted tasks never change again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Deleted)
    }
}

impl Default for TaskStatus {
    fn default() -> Self {
        TaskStatus::Inbox
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskStatus::Inbox => "inbox",
            TaskStatus::NextAction => "next_action",
            TaskStatus::Active => "active",
            TaskStatus::WaitingFor => "waiting_for",
            TaskStatus::Scheduled => "scheduled",
            TaskStatus::SomedayMaybe => "someday_maybe",
            TaskStatus::Completed => "completed",
            TaskStatus::Deleted => "deleted",
        };
        f.write_str(s)
    }
}

/// Where a task sits on the calendar.
///
/// Engine placements and user drag-and-drop placements are kept apart so a
/// re-run can tell which ones it is allowed to move.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Placement {
    None,
    AutoPlaced {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
    ManuallyPlaced {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
}

impl Placement {
    /// The placed interval, if any.
    pub fn interval(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        match *self {
            Placement::None => None,
            Placement::AutoPlaced { start, end } | Placement::ManuallyPlaced { start, end } => {
                Some((start, end))
            }
        }
    }

    pub fn is_manual(&self) -> bool {
        matches!(self, Placement::ManuallyPlaced { .. })
    }

    pub fn is_auto(&self) -> bool {
        matches!(self, Placement::AutoPlaced { .. })
    }
}

impl Default for Placement {
    fn default() -> Self {
        Placement::None
    }
}

fn default_priority() -> u8 {
    2
}

fn default_energy_level() -> u8 {
    3
}

/// A task snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task {
    /// Unique identifier
    pub id: TaskId,
    /// Task title
    pub title: String,
    #[serde(default)]
    pub status: TaskStatus,
    /// 1 = high, 2 = normal, 3 = low
    #[serde(default = "default_priority")]
    pub priority: u8,
    /// Instant by which the task must be finished
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
    /// Estimated duration in minutes
    pub estimated_minutes: i32,
    /// Energy the task demands, 1 (trivial) to 5 (draining)
    #[serde(default = "default_energy_level")]
    pub energy_level: u8,
    /// Contexts that must be available (e.g. "@office", "@phone")
    #[serde(default)]
    pub contexts: BTreeSet<String>,
    #[serde(default)]
    pub requires_deep_work: bool,
    /// Tasks that must finish before this one may start
    #[serde(default, rename = "blocked_by_task_ids")]
    pub blocked_by: BTreeSet<TaskId>,
    #[serde(default)]
    pub goal_ids: BTreeSet<String>,
    #[serde(default)]
    pub placement: Placement,
    /// Deferred start: the task is not actionable before this instant
    #[serde(default)]
    pub not_before: Option<DateTime<Utc>>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last time the user touched the task (defaults to `created_at`)
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    /// Completion timestamp (null if not completed)
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Task {
    /// Create a new inbox task with a generated id.
    pub fn new(title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self::with_id(
            format!("task-{}-{}", now.timestamp(), uuid::Uuid::new_v4()),
            title,
            now,
        )
    }

    /// Create a task with an explicit id and creation time.
    pub fn with_id(id: impl Into<String>, title: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Task {
            id: id.into(),
            title: title.into(),
            status: TaskStatus::NextAction,
            priority: default_priority(),
            due_date: None,
            estimated_minutes: 30,
            energy_level: default_energy_level(),
            contexts: BTreeSet::new(),
            requires_deep_work: false,
            blocked_by: BTreeSet::new(),
            goal_ids: BTreeSet::new(),
            placement: Placement::None,
            not_before: None,
            created_at,
            updated_at: None,
            completed_at: None,
        }
    }

    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_due(mut self, due: DateTime<Utc>) -> Self {
        self.due_date = Some(due);
        self
    }

    pub fn with_minutes(mut self, minutes: i32) -> Self {
        self.estimated_minutes = minutes;
        self
    }

    pub fn with_energy(mut self, level: u8) -> Self {
        self.energy_level = level;
        self
    }

    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.contexts.insert(context.into());
        self
    }

    pub fn with_deep_work(mut self) -> Self {
        self.requires_deep_work = true;
        self
    }

    pub fn blocked_by(mut self, id: impl Into<String>) -> Self {
        self.blocked_by.insert(id.into());
        self
    }

    pub fn with_goal(mut self, goal_id: impl Into<String>) -> Self {
        self.goal_ids.insert(goal_id.into());
        self
    }

    pub fn with_placement(mut self, placement: Placement) -> Self {
        self.placement = placement;
        self
    }

    pub fn touched_at(mut self, at: DateTime<Utc>) -> Self {
        self.updated_at = Some(at);
        self
    }

    /// Estimated duration as a chrono duration.
    pub fn duration(&self) -> Duration {
        Duration::minutes(self.estimated_minutes.max(0) as i64)
    }

    /// Last time the task was touched, for staleness.
    pub fn last_touched(&self) -> DateTime<Utc> {
        self.updated_at.unwrap_or(self.created_at)
    }

    /// Earliest instant the task is actionable, ignoring dependencies.
    pub fn ready_at(&self, anchor: DateTime<Utc>) -> DateTime<Utc> {
        match self.not_before {
            Some(not_before) if not_before > anchor => not_before,
            _ => anchor,
        }
    }

    /// Reject malformed input before any computation.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id.trim().is_empty() {
            return Err(invalid("id", "must not be empty"));
        }
        if !(1..=3).contains(&self.priority) {
            return Err(invalid(
                "priority",
                format!("must be 1 (high) to 3 (low), got {}", self.priority),
            ));
        }
        if self.estimated_minutes <= 0 {
            return Err(invalid(
                "estimated_minutes",
                format!("must be positive, got {}", self.estimated_minutes),
            ));
        }
        if self.estimated_minutes > MAX_TASK_MINUTES {
            return Err(invalid(
                "estimated_minutes",
                format!(
                    "{} exceeds the {} minute limit for a single block",
                    self.estimated_minutes, MAX_TASK_MINUTES
                ),
            ));
        }
        if !(1..=5).contains(&self.energy_level) {
            return Err(invalid(
                "energy_level",
                format!("must be 1 to 5, got {}", self.energy_level),
            ));
        }
        if self.blocked_by.contains(&self.id) {
            return Err(ValidationError::SelfDependency(self.id.clone()));
        }
        if let Some((start, end)) = self.placement.interval() {
            if end <= start {
                return Err(ValidationError::InvalidTimeRange { start, end });
            }
        }
        Ok(())
    }

    /// Record an engine placement.
    ///
    /// Inbox and next-action tasks move to `Scheduled`; other statuses,
    /// `Active` included, are left alone.
    pub fn mark_auto_placed(&mut self, start: DateTime<Utc>, end: DateTime<Utc>) {
        self.placement = Placement::AutoPlaced { start, end };
        if matches!(self.status, TaskStatus::Inbox | TaskStatus::NextAction) {
            self.status = TaskStatus::Scheduled;
        }
    }

    /// Drop an engine placement that could not be kept.
    ///
    /// Manual placements are never cleared here.
    pub fn clear_auto_placement(&mut self) {
        if self.placement.is_auto() {
            self.placement = Placement::None;
            if self.status == TaskStatus::Scheduled {
                self.status = TaskStatus::NextAction;
            }
        }
    }
}

fn invalid(field: &str, message: impl Into<String>) -> ValidationError {
    ValidationError::InvalidValue {
        field: field.to_string(),
        message: message.into(),
    }
}
