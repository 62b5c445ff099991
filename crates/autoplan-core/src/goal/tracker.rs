//! Goal pace tracking.
//!
//! ```text
//! required_daily_progress = (100 - progress) / max(1, days_remaining)
//! on_track                = recent_velocity >= required_daily_progress * tolerance
//! urgency                 = clamp(1 - pace / 2, 0, 1)     pace = velocity / required
//! ```
//!
//! Urgency 0.5 is neutral. The deviation from neutral is spread over the
//! goal's unscheduled linked tasks in proportion to their estimated minutes.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use super::{Goal, GoalId};
use crate::calendar::LocalClock;
use crate::storage::ResolvedPreferences;
use crate::task::{Task, TaskId};

/// Neutral goal signal for tasks that belong to no pressing goal.
pub const NEUTRAL_SIGNAL: f64 = 0.5;

/// What the user should do about a goal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GoalRecommendation {
    /// Behind pace; linked tasks are being boosted
    PrioritizeLinkedTasks,
    /// Behind pace but nothing linked is left to schedule
    AddLinkedTasks,
    /// On pace
    MaintainPace,
    /// Well ahead of pace; linked tasks are being lowered
    CanDeprioritize,
    /// Target date has passed before reaching 100%
    TargetMissed,
    /// Already at 100%
    Complete,
}

/// Per-goal pace report emitted with the plan.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GoalReport {
    pub goal_id: GoalId,
    /// Percent per day needed to hit the target
    pub required_daily_progress: f64,
    /// Percent per day over the velocity window
    pub recent_velocity: f64,
    pub on_track: bool,
    /// 0.0 (relax) to 1.0 (urgent), 0.5 neutral
    pub urgency: f64,
    /// Whole days until the target date, negative once passed
    pub days_remaining: Option<i64>,
    pub recommendation: GoalRecommendation,
}

/// Goal-derived score input per task.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GoalSignals {
    by_task: BTreeMap<TaskId, f64>,
}

impl GoalSignals {
    /// Goal signal for a task; neutral when it belongs to no pressing goal.
    pub fn signal_for(&self, task_id: &str) -> f64 {
        self.by_task.get(task_id).copied().unwrap_or(NEUTRAL_SIGNAL)
    }

    pub fn is_empty(&self) -> bool {
        self.by_task.is_empty()
    }
}

/// Computes goal pace and the urgency each goal exerts on its tasks.
#[derive(Debug, Clone)]
pub struct GoalProgressTracker {
    tolerance: f64,
    velocity_window_days: i64,
    clock: LocalClock,
}

impl GoalProgressTracker {
    /// Create a tracker with the default tolerance (0.8) and a 7 day window.
    pub fn new() -> Self {
        Self {
            tolerance: 0.8,
            velocity_window_days: 7,
            clock: LocalClock::utc(),
        }
    }

    pub fn from_preferences(prefs: &ResolvedPreferences) -> Self {
        Self {
            tolerance: prefs.goal_tolerance,
            velocity_window_days: prefs.velocity_window_days,
            clock: prefs.clock,
        }
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// `(100 - progress) / max(1, days_remaining)`.
    pub fn required_daily_progress(progress_percent: f64, days_remaining: i64) -> f64 {
        let remaining = (100.0 - progress_percent.clamp(0.0, 100.0)).max(0.0);
        remaining / days_remaining.max(1) as f64
    }

    /// Percent gained per day across the velocity window.
    ///
    /// The baseline is the last reading at or before the window start, or
    /// the oldest reading inside the window. No readings means no velocity.
    pub fn recent_velocity(&self, goal: &Goal, now: DateTime<Utc>) -> f64 {
        let window_start = now - Duration::days(self.velocity_window_days);
        let mut samples: Vec<_> = goal
            .progress_history
            .iter()
            .filter(|s| s.at <= now)
            .collect();
        samples.sort_by_key(|s| s.at);

        let baseline = samples
            .iter()
            .rev()
            .find(|s| s.at <= window_start)
            .or_else(|| samples.iter().find(|s| s.at > window_start));

        let Some(baseline) = baseline else {
            return 0.0;
        };

        let days = ((now - baseline.at).num_minutes() as f64 / 1440.0).max(1.0);
        ((goal.clamped_progress() - baseline.percent) / days).max(0.0)
    }

    /// Evaluate a single goal.
    pub fn evaluate(&self, goal: &Goal, now: DateTime<Utc>, unscheduled_linked: usize) -> GoalReport {
        let progress = goal.clamped_progress();
        let today = self.clock.date_of(now);
        let days_remaining = goal.target_date.map(|target| (target - today).num_days());
        let velocity = self.recent_velocity(goal, now);

        if progress >= 100.0 {
            return GoalReport {
                goal_id: goal.id.clone(),
                required_daily_progress: 0.0,
                recent_velocity: velocity,
                on_track: true,
                urgency: 0.0,
                days_remaining,
                recommendation: GoalRecommendation::Complete,
            };
        }

        let Some(days) = days_remaining else {
            return GoalReport {
                goal_id: goal.id.clone(),
                required_daily_progress: 0.0,
                recent_velocity: velocity,
                on_track: true,
                urgency: NEUTRAL_SIGNAL,
                days_remaining,
                recommendation: GoalRecommendation::MaintainPace,
            };
        };

        let required = Self::required_daily_progress(progress, days);
        let on_track = velocity >= required * self.tolerance;
        let pace = if required > 0.0 { velocity / required } else { 2.0 };
        let urgency = (1.0 - pace / 2.0).clamp(0.0, 1.0);

        let recommendation = if days < 0 {
            GoalRecommendation::TargetMissed
        } else if !on_track {
            if unscheduled_linked > 0 {
                GoalRecommendation::PrioritizeLinkedTasks
            } else {
                GoalRecommendation::AddLinkedTasks
            }
        } else if pace >= 2.0 {
            GoalRecommendation::CanDeprioritize
        } else {
            GoalRecommendation::MaintainPace
        };

        GoalReport {
            goal_id: goal.id.clone(),
            required_daily_progress: required,
            recent_velocity: velocity,
            on_track,
            urgency,
            days_remaining,
            recommendation,
        }
    }

    /// Evaluate every tracked goal and derive per-task signals.
    ///
    /// `unscheduled` holds the ids of tasks the run still has to place.
    /// Reports are sorted by goal id.
    pub fn track(
        &self,
        goals: &[Goal],
        tasks: &[Task],
        unscheduled: &BTreeSet<TaskId>,
        now: DateTime<Utc>,
    ) -> (Vec<GoalReport>, GoalSignals) {
        let mut reports = Vec::new();
        let mut deviations: BTreeMap<TaskId, f64> = BTreeMap::new();

        let mut tracked: Vec<&Goal> = goals.iter().filter(|g| g.status.is_tracked()).collect();
        tracked.sort_by(|a, b| a.id.cmp(&b.id));

        for goal in tracked {
            let pending: Vec<&Task> = tasks
                .iter()
                .filter(|t| unscheduled.contains(&t.id))
                .filter(|t| goal.linked_task_ids.contains(&t.id) || t.goal_ids.contains(&goal.id))
                .collect();

            let report = self.evaluate(goal, now, pending.len());
            let deviation = (report.urgency - NEUTRAL_SIGNAL) * priority_factor(goal.priority);
            let total_minutes: i64 = pending.iter().map(|t| t.estimated_minutes.max(1) as i64).sum();

            if deviation != 0.0 && total_minutes > 0 {
                for task in &pending {
                    let share = task.estimated_minutes.max(1) as f64 / total_minutes as f64;
                    *deviations.entry(task.id.clone()).or_insert(0.0) += deviation * share;
                }
            }

            tracing::debug!(
                goal = %goal.id,
                required = report.required_daily_progress,
                velocity = report.recent_velocity,
                on_track = report.on_track,
                linked_pending = pending.len(),
                "goal evaluated"
            );
            reports.push(report);
        }

        let by_task = deviations
            .into_iter()
            .map(|(id, dev)| (id, (NEUTRAL_SIGNAL + dev).clamp(0.0, 1.0)))
            .collect();

        (reports, GoalSignals { by_task })
    }
}

impl Default for GoalProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}

fn priority_factor(priority: u8) -> f64 {
    match priority {
        1 => 1.0,
        2 => 0.75,
        _ => 0.5,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::goal::GoalStatus;
    use chrono::{NaiveDate, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap()
    }

    fn in_days(days: i64) -> NaiveDate {
        now().date_naive() + Duration::days(days)
    }

    fn task(id: &str, minutes: i32) -> Task {
        Task::with_id(id, id, now()).with_minutes(minutes)
    }

    #[test]
    fn required_daily_progress_uses_at_least_one_day() {
        assert_eq!(GoalProgressTracker::required_daily_progress(40.0, 10), 6.0);
        assert_eq!(GoalProgressTracker::required_daily_progress(40.0, 0), 60.0);
        assert_eq!(GoalProgressTracker::required_daily_progress(40.0, -3), 60.0);
        assert_eq!(GoalProgressTracker::required_daily_progress(100.0, 5), 0.0);
    }

    #[test]
    fn behind_goal_without_history_is_off_track() {
        let tracker = GoalProgressTracker::new();
        let goal = Goal::new("g", 40.0).with_target(in_days(10));
        let report = tracker.evaluate(&goal, now(), 2);

        assert_eq!(report.required_daily_progress, 6.0);
        assert_eq!(report.recent_velocity, 0.0);
        assert!(!report.on_track);
        assert_eq!(report.urgency, 1.0);
        assert_eq!(report.recommendation, GoalRecommendation::PrioritizeLinkedTasks);
    }

    #[test]
    fn behind_goal_without_linked_work_asks_for_tasks() {
        let tracker = GoalProgressTracker::new();
        let goal = Goal::new("g", 40.0).with_target(in_days(10));
        let report = tracker.evaluate(&goal, now(), 0);
        assert_eq!(report.recommendation, GoalRecommendation::AddLinkedTasks);
    }

    #[test]
    fn velocity_is_measured_from_window_baseline() {
        let tracker = GoalProgressTracker::new();
        // 30% -> 40% over the last 5 days = 2%/day
        let goal = Goal::new("g", 40.0)
            .with_target(in_days(20))
            .with_sample(now() - Duration::days(5), 30.0);
        let velocity = tracker.recent_velocity(&goal, now());
        assert!((velocity - 2.0).abs() < 1e-9);
    }

    #[test]
    fn tolerance_allows_slightly_slow_goals() {
        // required 3%/day, velocity 2.5%/day, tolerance 0.8 -> 2.4 threshold
        let goal = Goal::new("g", 40.0)
            .with_target(in_days(20))
            .with_sample(now() - Duration::days(4), 30.0);
        let report = GoalProgressTracker::new().evaluate(&goal, now(), 1);
        assert!(report.on_track);
        assert_eq!(report.recommendation, GoalRecommendation::MaintainPace);

        let strict = GoalProgressTracker::new().with_tolerance(1.0);
        assert!(!strict.evaluate(&goal, now(), 1).on_track);
    }

    #[test]
    fn far_ahead_goal_can_be_deprioritized() {
        let goal = Goal::new("g", 80.0)
            .with_target(in_days(20))
            .with_sample(now() - Duration::days(7), 10.0);
        let report = GoalProgressTracker::new().evaluate(&goal, now(), 1);
        assert_eq!(report.recommendation, GoalRecommendation::CanDeprioritize);
        assert!(report.urgency < NEUTRAL_SIGNAL);
    }

    #[test]
    fn passed_target_is_reported_missed() {
        let goal = Goal::new("g", 70.0).with_target(in_days(-2));
        let report = GoalProgressTracker::new().evaluate(&goal, now(), 1);
        assert_eq!(report.days_remaining, Some(-2));
        assert_eq!(report.recommendation, GoalRecommendation::TargetMissed);
    }

    #[test]
    fn pressure_is_split_by_estimated_minutes() {
        let tracker = GoalProgressTracker::new();
        let goal = Goal::new("g", 40.0)
            .with_priority(1)
            .with_target(in_days(10))
            .link_task("a");
        let tasks = vec![task("a", 30), task("b", 90).with_goal("g"), task("c", 60)];
        let unscheduled: BTreeSet<TaskId> = ["a", "b", "c"].iter().map(|s| s.to_string()).collect();

        let (reports, signals) = tracker.track(&[goal], &tasks, &unscheduled, now());
        assert_eq!(reports.len(), 1);

        // urgency 1.0 -> deviation 0.5 split 25% / 75%
        assert!((signals.signal_for("a") - 0.625).abs() < 1e-9);
        assert!((signals.signal_for("b") - 0.875).abs() < 1e-9);
        assert_eq!(signals.signal_for("c"), NEUTRAL_SIGNAL);
    }

    #[test]
    fn inactive_goals_are_not_reported() {
        let mut goal = Goal::new("g", 10.0).with_target(in_days(3));
        goal.status = GoalStatus::Paused;
        let (reports, signals) = GoalProgressTracker::new().track(&[goal], &[], &BTreeSet::new(), now());
        assert!(reports.is_empty());
        assert!(signals.is_empty());
    }
}
