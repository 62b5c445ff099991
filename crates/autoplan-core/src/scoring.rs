//! Multi-objective task scoring engine.
//!
//! Every eligible task is scored as a weighted sum of dimension scores:
//!
//! | Dimension       | Score                                                    |
//! |-----------------|----------------------------------------------------------|
//! | `priority`      | 1 → 1.0, 2 → 0.5, 3 → 0.0                                |
//! | `due_date`      | `1/(1+h/24)` before due, `1 + overdue_h/24` after        |
//! | `energy_match`  | `1 − |task − slot|/4`                                    |
//! | `critical_path` | 1.0 critical, `1/(1+slack_days)`, 0.2 if blocking, else 0 |
//! | `goal`          | goal pressure signal, 0.5 neutral                        |
//! | `staleness`     | 0 until stale, then `0.5 + 0.5·min(1, over/stale)`       |
//!
//! Deep-work tasks and required contexts act as hard filters on the slot
//! rather than as weighted terms.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::error::ConfigError;
use crate::storage::ResolvedPreferences;
use crate::task::{Task, TaskId};

/// Dimension names accepted in the `weights` table.
pub const DIMENSIONS: [&str; 6] = [
    "priority",
    "due_date",
    "energy_match",
    "critical_path",
    "goal",
    "staleness",
];

/// Individual objective term with weight and score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectiveTerm {
    /// Term name
    pub name: String,
    /// Weight for this term
    pub weight: f64,
    /// Raw score, higher is better. `due_date` exceeds 1.0 once overdue.
    pub score: f64,
    /// Weighted contribution
    pub contribution: f64,
}

impl ObjectiveTerm {
    /// Create a new objective term
    pub fn new(name: impl Into<String>, weight: f64, score: f64) -> Self {
        Self {
            name: name.into(),
            weight,
            score,
            contribution: weight * score,
        }
    }
}

/// Complete scoring breakdown for explainability
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    /// Individual objective terms
    pub terms: Vec<ObjectiveTerm>,
    /// Total weighted score
    pub total_score: f64,
}

impl ScoreBreakdown {
    /// Create a new empty breakdown
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a term to the breakdown
    pub fn add_term(&mut self, term: ObjectiveTerm) {
        self.total_score += term.contribution;
        self.terms.push(term);
    }

    /// Get the top contributing term
    pub fn top_term(&self) -> Option<&ObjectiveTerm> {
        self.terms
            .iter()
            .max_by(|a, b| a.contribution.total_cmp(&b.contribution))
    }

    pub fn term(&self, name: &str) -> Option<&ObjectiveTerm> {
        self.terms.iter().find(|t| t.name == name)
    }
}

/// Weights for each objective term
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoringWeights {
    /// Weight for task priority
    pub priority: f64,
    /// Weight for due-date proximity (higher = deadlines dominate)
    pub due_date: f64,
    /// Weight for matching task energy to the slot's ambient energy
    pub energy_match: f64,
    /// Weight for critical-path urgency
    pub critical_path: f64,
    /// Weight for goal pressure
    pub goal: f64,
    /// Weight for staleness (prevents starvation of old tasks)
    pub staleness: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            priority: 0.30,
            due_date: 0.25,
            energy_match: 0.10,
            critical_path: 0.15,
            goal: 0.10,
            staleness: 0.10,
        }
    }
}

impl ScoringWeights {
    /// Defaults overridden by a `dimension -> weight` table.
    ///
    /// # Errors
    ///
    /// Unknown dimension names and negative or non-finite weights.
    pub fn from_overrides(overrides: &BTreeMap<String, f64>) -> Result<Self, ConfigError> {
        let mut weights = Self::default();
        for (name, value) in overrides {
            let slot = weights
                .slot_mut(name)
                .ok_or_else(|| ConfigError::UnknownKey(format!("weights.{name}")))?;
            *slot = *value;
        }
        weights.validate()?;
        Ok(weights)
    }

    fn slot_mut(&mut self, name: &str) -> Option<&mut f64> {
        match name {
            "priority" => Some(&mut self.priority),
            "due_date" => Some(&mut self.due_date),
            "energy_match" => Some(&mut self.energy_match),
            "critical_path" => Some(&mut self.critical_path),
            "goal" => Some(&mut self.goal),
            "staleness" => Some(&mut self.staleness),
            _ => None,
        }
    }

    fn pairs(&self) -> [(&'static str, f64); 6] {
        [
            ("priority", self.priority),
            ("due_date", self.due_date),
            ("energy_match", self.energy_match),
            ("critical_path", self.critical_path),
            ("goal", self.goal),
            ("staleness", self.staleness),
        ]
    }

    /// Validate that all weights are finite and non-negative
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, weight) in self.pairs() {
            if !weight.is_finite() || weight < 0.0 {
                return Err(ConfigError::invalid(
                    format!("weights.{name}"),
                    format!("weight must be finite and non-negative, got {weight}"),
                ));
            }
        }
        Ok(())
    }

    pub fn to_map(&self) -> BTreeMap<String, f64> {
        self.pairs()
            .into_iter()
            .map(|(name, weight)| (name.to_string(), weight))
            .collect()
    }
}

/// Per-task inputs computed upstream of scoring.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TaskSignals {
    pub critical: bool,
    /// Slack in minutes, when the task has a deadline chain
    pub slack_minutes: Option<i64>,
    /// Other tasks wait on this one
    pub blocks_others: bool,
    /// Goal pressure, 0.5 neutral
    pub goal_signal: f64,
}

impl Default for TaskSignals {
    fn default() -> Self {
        Self {
            critical: false,
            slack_minutes: None,
            blocks_others: false,
            goal_signal: 0.5,
        }
    }
}

/// The candidate interval a task is scored against.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SlotContext {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Energy level of the slot from the energy curve
    pub ambient_energy: u8,
    /// Every required context is available in the slot
    pub contexts_available: bool,
}

/// Multi-objective scoring engine
#[derive(Debug, Clone)]
pub struct TaskScoringEngine {
    weights: ScoringWeights,
    stale_after_days: i64,
    deep_work_threshold: u8,
}

impl Default for TaskScoringEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskScoringEngine {
    /// Create a new engine with default weights
    pub fn new() -> Self {
        Self {
            weights: ScoringWeights::default(),
            stale_after_days: 14,
            deep_work_threshold: 4,
        }
    }

    pub fn from_preferences(prefs: &ResolvedPreferences) -> Self {
        Self {
            weights: prefs.weights,
            stale_after_days: prefs.stale_after_days.max(1),
            deep_work_threshold: prefs.deep_work_energy_threshold,
        }
    }

    /// Create with custom weights
    pub fn with_weights(mut self, weights: ScoringWeights) -> Self {
        self.weights = weights;
        self
    }

    /// Get current weights
    pub fn weights(&self) -> &ScoringWeights {
        &self.weights
    }

    /// Score a task, optionally at a candidate slot.
    ///
    /// Returns `None` when the slot fails a hard filter (deep work below the
    /// energy threshold, or a required context unavailable). Without a slot
    /// the energy term is neutral and the due-date term is measured from
    /// `now + estimate`.
    pub fn score(
        &self,
        task: &Task,
        signals: &TaskSignals,
        slot: Option<&SlotContext>,
        now: DateTime<Utc>,
    ) -> Option<ScoreBreakdown> {
        if let Some(slot) = slot {
            if !slot.contexts_available {
                return None;
            }
            if task.requires_deep_work && slot.ambient_energy < self.deep_work_threshold {
                return None;
            }
        }

        let finish = slot
            .map(|s| s.end)
            .unwrap_or_else(|| now + Duration::minutes(task.estimated_minutes as i64));
        let energy = slot
            .map(|s| Self::energy_match_score(task.energy_level, s.ambient_energy))
            .unwrap_or(0.5);

        let w = &self.weights;
        let mut breakdown = ScoreBreakdown::new();
        breakdown.add_term(ObjectiveTerm::new("priority", w.priority, Self::priority_score(task.priority)));
        breakdown.add_term(ObjectiveTerm::new(
            "due_date",
            w.due_date,
            Self::due_date_score(task.due_date, finish),
        ));
        breakdown.add_term(ObjectiveTerm::new("energy_match", w.energy_match, energy));
        breakdown.add_term(ObjectiveTerm::new(
            "critical_path",
            w.critical_path,
            Self::critical_path_score(signals),
        ));
        breakdown.add_term(ObjectiveTerm::new("goal", w.goal, signals.goal_signal.clamp(0.0, 1.0)));
        breakdown.add_term(ObjectiveTerm::new(
            "staleness",
            w.staleness,
            self.staleness_score(task, now),
        ));
        Some(breakdown)
    }

    pub fn priority_score(priority: u8) -> f64 {
        match priority {
            1 => 1.0,
            2 => 0.5,
            _ => 0.0,
        }
    }

    /// Monotone in lateness: closer deadlines score higher, overdue keeps growing.
    pub fn due_date_score(due: Option<DateTime<Utc>>, finish: DateTime<Utc>) -> f64 {
        let Some(due) = due else {
            return 0.0;
        };
        let hours = (due - finish).num_minutes() as f64 / 60.0;
        if hours >= 0.0 {
            1.0 / (1.0 + hours / 24.0)
        } else {
            1.0 + (-hours) / 24.0
        }
    }

    pub fn energy_match_score(task_energy: u8, slot_energy: u8) -> f64 {
        let diff = (task_energy as f64 - slot_energy as f64).abs();
        (1.0 - diff / 4.0).max(0.0)
    }

    pub fn critical_path_score(signals: &TaskSignals) -> f64 {
        if signals.critical {
            return 1.0;
        }
        match signals.slack_minutes {
            Some(slack) => 1.0 / (1.0 + slack.max(0) as f64 / (24.0 * 60.0)),
            None if signals.blocks_others => 0.2,
            None => 0.0,
        }
    }

    pub fn staleness_score(&self, task: &Task, now: DateTime<Utc>) -> f64 {
        let age_days = (now - task.last_touched()).num_minutes() as f64 / (24.0 * 60.0);
        let stale = self.stale_after_days as f64;
        if age_days < stale {
            return 0.0;
        }
        0.5 + 0.5 * ((age_days - stale) / stale).min(1.0)
    }
}

/// A scored task ready for ordering.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedTask {
    pub task_id: TaskId,
    pub priority: u8,
    pub due_date: Option<DateTime<Utc>>,
    /// `critical_path` score, used as a tie-breaker
    pub critical_urgency: f64,
    pub breakdown: ScoreBreakdown,
}

impl RankedTask {
    pub fn new(task: &Task, signals: &TaskSignals, breakdown: ScoreBreakdown) -> Self {
        Self {
            task_id: task.id.clone(),
            priority: task.priority,
            due_date: task.due_date,
            critical_urgency: TaskScoringEngine::critical_path_score(signals),
            breakdown,
        }
    }

    /// Best first. Ties break by priority, due date (none last),
    /// critical-path urgency, then id.
    pub fn rank_cmp(&self, other: &Self) -> Ordering {
        other
            .breakdown
            .total_score
            .total_cmp(&self.breakdown.total_score)
            .then_with(|| self.priority.cmp(&other.priority))
            .then_with(|| match (self.due_date, other.due_date) {
                (Some(a), Some(b)) => a.cmp(&b),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            })
            .then_with(|| other.critical_urgency.total_cmp(&self.critical_urgency))
            .then_with(|| self.task_id.cmp(&other.task_id))
    }
}

/// Sort best first.
pub fn rank(tasks: &mut [RankedTask]) {
    tasks.sort_by(|a, b| a.rank_cmp(b));
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap()
    }

    fn task(id: &str) -> Task {
        Task::with_id(id, id, now())
    }

    fn slot(ambient_energy: u8) -> SlotContext {
        SlotContext {
            start: now(),
            end: now() + Duration::minutes(30),
            ambient_energy,
            contexts_available: true,
        }
    }

    #[test]
    fn default_weights_sum_to_one() {
        let sum: f64 = ScoringWeights::default().to_map().values().sum();
        assert!((sum - 1.0).abs() < 1e-9);
    }

    #[test]
    fn overrides_reject_unknown_and_negative() {
        let mut table = BTreeMap::new();
        table.insert("goal".to_string(), 0.4);
        assert_eq!(ScoringWeights::from_overrides(&table).unwrap().goal, 0.4);

        table.insert("mood".to_string(), 0.1);
        assert!(matches!(
            ScoringWeights::from_overrides(&table),
            Err(ConfigError::UnknownKey(_))
        ));

        let mut table = BTreeMap::new();
        table.insert("priority".to_string(), f64::NAN);
        assert!(ScoringWeights::from_overrides(&table).is_err());
    }

    #[test]
    fn priority_maps_to_fixed_scores() {
        assert_eq!(TaskScoringEngine::priority_score(1), 1.0);
        assert_eq!(TaskScoringEngine::priority_score(2), 0.5);
        assert_eq!(TaskScoringEngine::priority_score(3), 0.0);
    }

    #[test]
    fn due_date_score_grows_as_deadline_nears_and_passes() {
        let finish = now();
        let far = TaskScoringEngine::due_date_score(Some(finish + Duration::days(7)), finish);
        let near = TaskScoringEngine::due_date_score(Some(finish + Duration::hours(2)), finish);
        let overdue = TaskScoringEngine::due_date_score(Some(finish - Duration::hours(48)), finish);
        assert!(far < near);
        assert!(near < 1.0);
        assert!((overdue - 3.0).abs() < 1e-9);
        assert_eq!(TaskScoringEngine::due_date_score(None, finish), 0.0);
    }

    #[test]
    fn deep_work_is_filtered_from_low_energy_slots() {
        let engine = TaskScoringEngine::new();
        let t = task("a").with_deep_work();
        assert!(engine.score(&t, &TaskSignals::default(), Some(&slot(2)), now()).is_none());
        assert!(engine.score(&t, &TaskSignals::default(), Some(&slot(4)), now()).is_some());
    }

    #[test]
    fn unavailable_context_is_a_hard_filter() {
        let engine = TaskScoringEngine::new();
        let mut ctx = slot(3);
        ctx.contexts_available = false;
        assert!(engine.score(&task("a"), &TaskSignals::default(), Some(&ctx), now()).is_none());
    }

    #[test]
    fn energy_match_prefers_equal_levels() {
        assert_eq!(TaskScoringEngine::energy_match_score(4, 4), 1.0);
        assert_eq!(TaskScoringEngine::energy_match_score(5, 1), 0.0);
        assert_eq!(TaskScoringEngine::energy_match_score(3, 4), 0.75);
    }

    #[test]
    fn critical_path_score_orders_signals() {
        let critical = TaskSignals {
            critical: true,
            ..TaskSignals::default()
        };
        let slack_day = TaskSignals {
            slack_minutes: Some(24 * 60),
            ..TaskSignals::default()
        };
        let blocking = TaskSignals {
            blocks_others: true,
            ..TaskSignals::default()
        };
        assert_eq!(TaskScoringEngine::critical_path_score(&critical), 1.0);
        assert_eq!(TaskScoringEngine::critical_path_score(&slack_day), 0.5);
        assert_eq!(TaskScoringEngine::critical_path_score(&blocking), 0.2);
        assert_eq!(TaskScoringEngine::critical_path_score(&TaskSignals::default()), 0.0);
    }

    #[test]
    fn staleness_kicks_in_after_threshold() {
        let engine = TaskScoringEngine::new();
        let fresh = task("fresh");
        let stale = Task::with_id("stale", "stale", now() - Duration::days(21));
        let ancient = Task::with_id("ancient", "ancient", now() - Duration::days(60));
        assert_eq!(engine.staleness_score(&fresh, now()), 0.0);
        assert!((engine.staleness_score(&stale, now()) - 0.75).abs() < 1e-9);
        assert_eq!(engine.staleness_score(&ancient, now()), 1.0);
    }

    #[test]
    fn ties_break_by_priority_then_due_then_id() {
        let engine = TaskScoringEngine::new().with_weights(ScoringWeights {
            priority: 0.0,
            due_date: 0.0,
            energy_match: 0.0,
            critical_path: 0.0,
            goal: 0.0,
            staleness: 0.0,
        });
        let signals = TaskSignals::default();
        let make = |t: &Task| RankedTask::new(t, &signals, engine.score(t, &signals, None, now()).unwrap());

        let low = task("a").with_priority(3);
        let high_no_due = task("b").with_priority(1);
        let high_due = task("c").with_priority(1).with_due(now() + Duration::days(1));
        let high_due_b = task("d").with_priority(1).with_due(now() + Duration::days(1));

        let mut ranked = vec![make(&low), make(&high_no_due), make(&high_due_b), make(&high_due)];
        rank(&mut ranked);
        let order: Vec<_> = ranked.iter().map(|r| r.task_id.as_str()).collect();
        assert_eq!(order, vec!["c", "d", "b", "a"]);
    }

    #[test]
    fn breakdown_explains_top_term() {
        let engine = TaskScoringEngine::new();
        let t = task("a").with_priority(1);
        let breakdown = engine.score(&t, &TaskSignals::default(), Some(&slot(3)), now()).unwrap();
        assert_eq!(breakdown.terms.len(), 6);
        assert_eq!(breakdown.top_term().map(|t| t.name.as_str()), Some("priority"));
        let total: f64 = breakdown.terms.iter().map(|t| t.contribution).sum();
        assert!((total - breakdown.total_score).abs() < 1e-12);
    }
}
