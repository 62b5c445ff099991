//! Goals and pace tracking.
//!
//! A goal carries a progress percentage and an optional target date. The
//! [`GoalProgressTracker`] turns that into a required daily pace, compares it
//! with recent velocity, and hands the scorer an urgency signal per task.

mod tracker;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::task::TaskId;

pub use tracker::{GoalProgressTracker, GoalRecommendation, GoalReport, GoalSignals};

/// Opaque goal identifier.
pub type GoalId = String;

/// Lifecycle of a goal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GoalStatus {
    Active,
    Paused,
    Completed,
    Abandoned,
}

impl GoalStatus {
    /// Paused and finished goals produce no pressure.
    pub fn is_tracked(&self) -> bool {
        matches!(self, GoalStatus::Active)
    }
}

impl Default for GoalStatus {
    fn default() -> Self {
        GoalStatus::Active
    }
}

/// A progress reading taken at some instant.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ProgressSample {
    pub at: DateTime<Utc>,
    pub percent: f64,
}

fn default_goal_priority() -> u8 {
    2
}

/// A goal snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Goal {
    pub id: GoalId,
    #[serde(default)]
    pub title: String,
    /// Day by which the goal should be at 100%
    #[serde(default)]
    pub target_date: Option<NaiveDate>,
    /// Current progress, 0 to 100
    #[serde(default)]
    pub progress_percent: f64,
    /// 1 = high, 2 = normal, 3 = low
    #[serde(default = "default_goal_priority")]
    pub priority: u8,
    #[serde(default)]
    pub linked_task_ids: BTreeSet<TaskId>,
    #[serde(default)]
    pub status: GoalStatus,
    /// Past readings, used to derive recent velocity
    #[serde(default)]
    pub progress_history: Vec<ProgressSample>,
}

impl Goal {
    pub fn new(id: impl Into<String>, progress_percent: f64) -> Self {
        Goal {
            id: id.into(),
            title: String::new(),
            target_date: None,
            progress_percent,
            priority: default_goal_priority(),
            linked_task_ids: BTreeSet::new(),
            status: GoalStatus::Active,
            progress_history: Vec::new(),
        }
    }

    pub fn with_target(mut self, target: NaiveDate) -> Self {
        self.target_date = Some(target);
        self
    }

    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }

    pub fn link_task(mut self, task_id: impl Into<String>) -> Self {
        self.linked_task_ids.insert(task_id.into());
        self
    }

    pub fn with_sample(mut self, at: DateTime<Utc>, percent: f64) -> Self {
        self.progress_history.push(ProgressSample { at, percent });
        self
    }

    /// Progress clamped to the 0–100 range.
    pub fn clamped_progress(&self) -> f64 {
        self.progress_percent.clamp(0.0, 100.0)
    }
}
