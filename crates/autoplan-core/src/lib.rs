//! # autoplan core library
//!
//! Decides when each open task should be worked on. A run takes a snapshot of
//! tasks, goals, calendar events and scheduling preferences, and produces a
//! [`SchedulePlan`]: concrete time slots for the tasks that fit, plus a reason
//! code for every task that does not.
//!
//! ## Architecture
//!
//! - **Dependency**: DAG over `blocked_by`, cycle detection and critical-path
//!   slack
//! - **Goal**: pace tracking that turns lagging goals into scoring pressure
//! - **Calendar**: free intervals within working hours, minus events,
//!   buffers, lunch and commitments
//! - **Scoring**: weighted multi-factor score with an explainable breakdown
//! - **Scheduler**: greedy rank-ordered placement with dependency-aware
//!   deferral
//!
//! The engine owns no persistence. Snapshots come in through
//! [`ScheduleSource`] and plans leave through [`PlanSink`].

pub mod calendar;
pub mod dependency;
pub mod energy;
pub mod error;
pub mod goal;
pub mod schedule;
pub mod scheduler;
pub mod scoring;
pub mod source;
pub mod storage;
pub mod task;

pub use calendar::{CalendarAvailabilityModel, LocalClock, SlotFinder, SlotRequest, TimeSlot};
pub use dependency::{CriticalPathAnalyzer, CriticalPathReport, CycleReport, DependencyGraph, TaskTiming};
pub use energy::EnergyCurve;
pub use error::{ConfigError, CoreError, SourceError, ValidationError};
pub use goal::{Goal, GoalProgressTracker, GoalRecommendation, GoalReport, GoalStatus};
pub use schedule::{CalendarEvent, SchedulingSnapshot};
pub use scheduler::{
    Assignment, PlanMode, ReasonCode, RejectedTask, SchedulePlan, SchedulingOrchestrator, Unschedulable,
};
pub use scoring::{ObjectiveTerm, RankedTask, ScoreBreakdown, ScoringWeights, TaskScoringEngine, TaskSignals};
pub use source::{InMemorySource, PlanSink, ScheduleSource, SnapshotFile};
pub use storage::{ResolvedPreferences, SchedulingPreferences};
pub use task::{Placement, Task, TaskId, TaskStatus};
