//! Collaborators that supply snapshots and receive plans.
//!
//! The engine owns no persistence. A task repository, a goal store and a
//! calendar feed implement [`ScheduleSource`]; whoever stores placements
//! implements [`PlanSink`]. [`InMemorySource`] and [`SnapshotFile`] cover
//! tests and the CLI.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Mutex;

use crate::error::{CoreError, SourceError};
use crate::goal::Goal;
use crate::schedule::CalendarEvent;
use crate::scheduler::SchedulePlan;
use crate::task::Task;

/// Read side of a planning run.
#[async_trait]
pub trait ScheduleSource: Send + Sync {
    /// Tasks to consider, including finished tasks others depend on.
    async fn get_schedulable_tasks(&self) -> Result<Vec<Task>, SourceError>;

    /// Goals relevant to the window.
    async fn get_goals_in_window(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<Goal>, SourceError>;

    /// Calendar events overlapping the window.
    async fn get_fixed_events(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<CalendarEvent>, SourceError>;
}

/// Write side of a planning run.
#[async_trait]
pub trait PlanSink: Send + Sync {
    async fn persist_plan(&self, plan: &SchedulePlan) -> Result<(), SourceError>;
}

/// Source and sink backed by plain vectors.
#[derive(Debug, Default)]
pub struct InMemorySource {
    tasks: Vec<Task>,
    goals: Vec<Goal>,
    events: Vec<CalendarEvent>,
    persisted: Mutex<Vec<SchedulePlan>>,
}

impl InMemorySource {
    pub fn new(tasks: Vec<Task>, goals: Vec<Goal>, events: Vec<CalendarEvent>) -> Self {
        Self {
            tasks,
            goals,
            events,
            persisted: Mutex::new(Vec::new()),
        }
    }

    /// Plans handed to [`PlanSink::persist_plan`] so far.
    pub fn persisted_plans(&self) -> Vec<SchedulePlan> {
        self.persisted
            .lock()
            .map(|plans| plans.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ScheduleSource for InMemorySource {
    async fn get_schedulable_tasks(&self) -> Result<Vec<Task>, SourceError> {
        Ok(self.tasks.clone())
    }

    /// Active goals, plus inactive ones whose target falls in the window.
    async fn get_goals_in_window(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<Goal>, SourceError> {
        let (from, to) = (start.date_naive(), end.date_naive());
        Ok(self
            .goals
            .iter()
            .filter(|g| g.status.is_tracked() || g.target_date.is_some_and(|t| t >= from && t <= to))
            .cloned()
            .collect())
    }

    async fn get_fixed_events(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<CalendarEvent>, SourceError> {
        Ok(self
            .events
            .iter()
            .filter(|e| e.overlaps(start, end))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl PlanSink for InMemorySource {
    async fn persist_plan(&self, plan: &SchedulePlan) -> Result<(), SourceError> {
        let mut plans = self.persisted.lock().map_err(|_| SourceError::Unavailable {
            collaborator: "plan sink".into(),
            message: "lock poisoned".into(),
        })?;
        plans.push(plan.clone());
        Ok(())
    }
}

/// JSON snapshot of tasks, goals and events.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SnapshotFile {
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub goals: Vec<Goal>,
    #[serde(default)]
    pub events: Vec<CalendarEvent>,
}

impl SnapshotFile {
    pub async fn load(path: &Path) -> Result<Self, CoreError> {
        let content = tokio::fs::read_to_string(path).await?;
        let snapshot: Self = serde_json::from_str(&content)
            .map_err(|e| SourceError::Malformed(format!("{}: {e}", path.display())))?;
        Ok(snapshot)
    }

    pub async fn save(&self, path: &Path) -> Result<(), CoreError> {
        let content = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }

    pub fn into_source(self) -> InMemorySource {
        InMemorySource::new(self.tasks, self.goals, self.events)
    }
}
