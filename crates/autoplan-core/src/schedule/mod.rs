//! Calendar events and the immutable input snapshot of a planning run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::goal::Goal;
use crate::storage::SchedulingPreferences;
use crate::task::Task;

/// A block on the user's calendar.
///
/// Externally sourced events are fixed; blocks the user created in the app
/// may be flagged movable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub id: String,
    #[serde(default)]
    pub title: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[serde(default)]
    pub movable: bool,
}

impl CalendarEvent {
    /// Create a fixed event
    pub fn new(id: impl Into<String>, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        let id = id.into();
        Self {
            title: id.clone(),
            id,
            start,
            end,
            movable: false,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn movable(mut self) -> Self {
        self.movable = true;
        self
    }

    /// Check if this event overlaps with a time range
    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.start < end && self.end > start
    }
}

/// Everything a run reads, captured once before computation starts.
#[derive(Debug, Clone, PartialEq)]
pub struct SchedulingSnapshot {
    pub now: DateTime<Utc>,
    pub tasks: Vec<Task>,
    pub goals: Vec<Goal>,
    pub events: Vec<CalendarEvent>,
    pub preferences: SchedulingPreferences,
}

impl SchedulingSnapshot {
    pub fn new(now: DateTime<Utc>, preferences: SchedulingPreferences) -> Self {
        Self {
            now,
            tasks: Vec::new(),
            goals: Vec::new(),
            events: Vec::new(),
            preferences,
        }
    }

    pub fn with_tasks(mut self, tasks: impl IntoIterator<Item = Task>) -> Self {
        self.tasks.extend(tasks);
        self
    }

    pub fn with_goals(mut self, goals: impl IntoIterator<Item = Goal>) -> Self {
        self.goals.extend(goals);
        self
    }

    pub fn with_events(mut self, events: impl IntoIterator<Item = CalendarEvent>) -> Self {
        self.events.extend(events);
        self
    }

    pub fn task(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn overlap_is_half_open() {
        let start = Utc.with_ymd_and_hms(2026, 3, 2, 10, 0, 0).unwrap();
        let event = CalendarEvent::new("sync", start, start + Duration::hours(1));
        assert!(event.overlaps(start + Duration::minutes(30), start + Duration::hours(2)));
        assert!(!event.overlaps(start + Duration::hours(1), start + Duration::hours(2)));
        assert!(!event.overlaps(start - Duration::hours(1), start));
    }

    #[test]
    fn events_deserialize_with_defaults() {
        let json = r#"{"id":"e1","start":"2026-03-02T10:00:00Z","end":"2026-03-02T11:00:00Z"}"#;
        let event: CalendarEvent = serde_json::from_str(json).unwrap();
        assert!(!event.movable);
        assert!(event.title.is_empty());
    }
}
