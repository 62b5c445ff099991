//! Automatic scheduler for tasks.
//!
//! This module turns a snapshot into a [`SchedulePlan`]:
//! - Validates preferences (fatal) and tasks (per-task rejection)
//! - Honours manual placements and still-valid auto placements
//! - Runs dependency, critical-path and goal analysis
//! - Scores every eligible task at its best slot
//! - Places tasks greedily in rank order, deferring a task until the
//!   predecessors placed in the same run are done

mod plan;

use chrono::{DateTime, Duration, Utc};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tokio_util::sync::CancellationToken;

use crate::calendar::{CalendarAvailabilityModel, SlotFinder, SlotRequest, TimeSlot};
use crate::dependency::{CriticalPathAnalyzer, DependencyGraph};
use crate::error::{CoreError, ValidationError};
use crate::goal::GoalProgressTracker;
use crate::schedule::SchedulingSnapshot;
use crate::scoring::{rank, RankedTask, SlotContext, TaskScoringEngine};
use crate::source::{PlanSink, ScheduleSource};
use crate::storage::{ResolvedPreferences, SchedulingPreferences};
use crate::task::{Placement, Task, TaskId};

pub use plan::{Assignment, PlanMode, ReasonCode, RejectedTask, SchedulePlan, Unschedulable};

/// How a predecessor constrains its dependent during placement.
enum PredecessorState {
    /// Finished or placed; the dependent may start at this instant
    DoneBy(DateTime<Utc>),
    /// Still waiting for its turn in this run
    Pending,
    /// Will not be placed in this run
    Blocked,
}

/// Runs the planning pipeline.
#[derive(Debug, Clone, Default)]
pub struct SchedulingOrchestrator {
    mode: PlanMode,
}

impl SchedulingOrchestrator {
    pub fn new(mode: PlanMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> PlanMode {
        self.mode
    }

    /// Load a snapshot through `source` and plan it.
    ///
    /// # Errors
    ///
    /// Invalid preferences, a failing collaborator, or cancellation.
    pub async fn run<S>(
        &self,
        source: &S,
        preferences: SchedulingPreferences,
        now: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<SchedulePlan, CoreError>
    where
        S: ScheduleSource + ?Sized,
    {
        let prefs = preferences.resolve()?;
        let window_end = now + Duration::days(prefs.horizon_days + 1);

        let (tasks, goals, events) = tokio::try_join!(
            source.get_schedulable_tasks(),
            source.get_goals_in_window(now, window_end),
            source.get_fixed_events(now, window_end),
        )?;
        if cancel.is_cancelled() {
            return Err(CoreError::Cancelled);
        }

        let snapshot = SchedulingSnapshot {
            now,
            tasks,
            goals,
            events,
            preferences,
        };
        self.plan(&snapshot, cancel)
    }

    /// [`Self::run`], then hand the plan to `sink`.
    pub async fn run_and_persist<S, K>(
        &self,
        source: &S,
        sink: &K,
        preferences: SchedulingPreferences,
        now: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<SchedulePlan, CoreError>
    where
        S: ScheduleSource + ?Sized,
        K: PlanSink + ?Sized,
    {
        let plan = self.run(source, preferences, now, cancel).await?;
        sink.persist_plan(&plan).await?;
        Ok(plan)
    }

    /// Plan a snapshot.
    ///
    /// # Errors
    ///
    /// Invalid preferences abort before any placement. Cancellation is
    /// checked once per task and yields no partial plan. Everything else is
    /// reported inside the plan.
    pub fn plan(&self, snapshot: &SchedulingSnapshot, cancel: &CancellationToken) -> Result<SchedulePlan, CoreError> {
        let prefs = snapshot.preferences.resolve()?;
        let now = snapshot.now;
        let mut plan = SchedulePlan::empty(now);

        // 1. Per-task validation
        let (valid, rejected) = validate_tasks(&snapshot.tasks);
        plan.rejected = rejected;

        // 2. Dependency graph and cycles
        let graph = DependencyGraph::build(&valid);
        plan.cycles = graph.detect_cycles();
        let cyclic: BTreeSet<&str> = plan
            .cycles
            .iter()
            .flat_map(|c| c.task_ids.iter().map(String::as_str))
            .collect();

        let by_id: HashMap<&str, &Task> = valid.iter().map(|t| (t.id.as_str(), t)).collect();

        // 3. Commitments carried over from earlier runs
        let base = CalendarAvailabilityModel::new(&prefs, now, &snapshot.events);
        let mut committed: BTreeMap<TaskId, TimeSlot> = BTreeMap::new();

        if self.mode.keeps_manual_placements() {
            for task in valid.iter().filter(|t| !t.status.is_terminal()) {
                let Placement::ManuallyPlaced { start, end } = task.placement else {
                    continue;
                };
                committed.insert(task.id.clone(), TimeSlot { start, end });
                plan.commitments.push(Assignment {
                    task_id: task.id.clone(),
                    start,
                    end,
                });
            }
        }

        if self.mode.keeps_auto_placements() {
            for node in graph.topological_order() {
                let Some(task) = by_id.get(graph.id(node)).copied() else {
                    continue;
                };
                let Placement::AutoPlaced { start, end } = task.placement else {
                    continue;
                };
                let slot = TimeSlot { start, end };
                if self.auto_placement_still_valid(task, slot, &prefs, &base, &graph, &by_id, &committed, now) {
                    committed.insert(task.id.clone(), slot);
                    plan.assignments.push(Assignment {
                        task_id: task.id.clone(),
                        start,
                        end,
                    });
                } else {
                    tracing::debug!(task = %task.id, "auto placement no longer valid; replanning");
                }
            }
        }

        let model = base.with_commitments(committed.values().copied());
        let anchor = model.anchor();
        let mut finder = SlotFinder::new(&prefs, model.intervals());

        // 4. Critical path and goal pressure
        let as_planned: Vec<Task> = valid
            .iter()
            .map(|t| {
                let mut t = t.clone();
                if !committed.contains_key(&t.id) {
                    t.placement = Placement::None;
                }
                t
            })
            .collect();
        let report = CriticalPathAnalyzer::new().analyze(&graph, &as_planned, anchor);

        let engine_managed = self.engine_managed(&valid);
        let tracker = GoalProgressTracker::from_preferences(&prefs);
        let (goal_reports, goal_signals) = tracker.track(&snapshot.goals, &valid, &engine_managed, now);
        plan.goal_reports = goal_reports;

        // 5. Score every task still to place at its best slot
        let scorer = TaskScoringEngine::from_preferences(&prefs);
        let mut ranked = Vec::new();
        for task in &valid {
            if cancel.is_cancelled() {
                return Err(CoreError::Cancelled);
            }
            if !task.status.is_schedulable() || committed.contains_key(&task.id) {
                continue;
            }
            if cyclic.contains(task.id.as_str()) {
                plan.unschedulable.push(Unschedulable {
                    task_id: task.id.clone(),
                    reason: ReasonCode::DependencyNotReady,
                });
                continue;
            }

            let mut signals = report.signals_for(&task.id);
            signals.goal_signal = goal_signals.signal_for(&task.id);

            let earliest = report
                .get(&task.id)
                .map(|t| t.earliest_start.max(task.ready_at(anchor)))
                .unwrap_or_else(|| task.ready_at(anchor));
            let best = finder
                .find_first(&SlotRequest::for_task(task, earliest))
                .map(|slot| slot_context(&prefs, slot));
            let breakdown = scorer
                .score(task, &signals, best.as_ref(), now)
                .or_else(|| scorer.score(task, &signals, None, now))
                .unwrap_or_default();
            ranked.push(RankedTask::new(task, &signals, breakdown));
        }
        rank(&mut ranked);

        // 6. Greedy placement in rank order
        let mut placed: HashMap<TaskId, DateTime<Utc>> = HashMap::new();
        let mut failed: BTreeSet<TaskId> = BTreeSet::new();
        let mut misses: Vec<(&Task, SlotRequest<'_>)> = Vec::new();
        let mut queue: Vec<RankedTask> = ranked;

        while !queue.is_empty() {
            if cancel.is_cancelled() {
                return Err(CoreError::Cancelled);
            }

            let mut next = None;
            for (position, entry) in queue.iter().enumerate() {
                let Some(task) = by_id.get(entry.task_id.as_str()).copied() else {
                    continue;
                };
                let mut ready = task.ready_at(anchor);
                let mut blocked = false;
                let mut waiting = false;
                for pred_id in graph.predecessor_ids(&task.id) {
                    match predecessor_state(pred_id, &by_id, &committed, &placed, &failed, &queue, now) {
                        PredecessorState::DoneBy(end) => ready = ready.max(end),
                        PredecessorState::Pending => waiting = true,
                        PredecessorState::Blocked => blocked = true,
                    }
                }
                if blocked {
                    next = Some((position, None));
                    break;
                }
                if !waiting {
                    next = Some((position, Some(ready)));
                    break;
                }
            }

            let Some((position, ready)) = next else {
                // Only reachable if predecessors wait on each other
                for entry in queue.drain(..) {
                    failed.insert(entry.task_id.clone());
                    plan.unschedulable.push(Unschedulable {
                        task_id: entry.task_id,
                        reason: ReasonCode::DependencyNotReady,
                    });
                }
                break;
            };

            let entry = queue.remove(position);
            let Some(task) = by_id.get(entry.task_id.as_str()).copied() else {
                continue;
            };

            let Some(ready) = ready else {
                tracing::debug!(task = %task.id, "predecessor cannot be placed");
                failed.insert(task.id.clone());
                plan.unschedulable.push(Unschedulable {
                    task_id: task.id.clone(),
                    reason: ReasonCode::DependencyNotReady,
                });
                continue;
            };

            let request = SlotRequest::for_task(task, ready).with_deadline(task.due_date);
            match finder.find_first(&request) {
                Some(slot) => {
                    finder.reserve(slot);
                    tracing::debug!(
                        task = %task.id,
                        start = %slot.start,
                        end = %slot.end,
                        score = entry.breakdown.total_score,
                        "task placed"
                    );
                    placed.insert(task.id.clone(), slot.end);
                    plan.assignments.push(Assignment {
                        task_id: task.id.clone(),
                        start: slot.start,
                        end: slot.end,
                    });
                }
                None => {
                    failed.insert(task.id.clone());
                    misses.push((task, request));
                }
            }
        }

        // Diagnose against the final free list
        for (task, request) in misses {
            let reason = diagnose(&finder, task, &request, anchor, &graph);
            tracing::debug!(task = %task.id, %reason, "task unschedulable");
            plan.unschedulable.push(Unschedulable {
                task_id: task.id.clone(),
                reason,
            });
        }

        let plan = plan.finish();
        tracing::info!(
            mode = %self.mode,
            assigned = plan.assignments.len(),
            commitments = plan.commitments.len(),
            unschedulable = plan.unschedulable.len(),
            rejected = plan.rejected.len(),
            cycles = plan.cycles.len(),
            "planning run complete"
        );
        Ok(plan)
    }

    /// Tasks whose slot is up to the engine in this mode, placed or not.
    ///
    /// Goal pressure is spread over these; a manual commitment the mode
    /// keeps is already in hand.
    pub fn engine_managed(&self, tasks: &[Task]) -> BTreeSet<TaskId> {
        tasks
            .iter()
            .filter(|t| t.status.is_schedulable())
            .filter(|t| !(t.placement.is_manual() && self.mode.keeps_manual_placements()))
            .map(|t| t.id.clone())
            .collect()
    }

    /// An auto placement is kept when it ends in the future, still fits the
    /// task (length, `not_before`, due date, energy and context windows),
    /// sits inside working time net of buffers, overlaps no earlier
    /// commitment, and starts after every predecessor is done.
    #[allow(clippy::too_many_arguments)]
    fn auto_placement_still_valid(
        &self,
        task: &Task,
        slot: TimeSlot,
        prefs: &ResolvedPreferences,
        base: &CalendarAvailabilityModel<'_>,
        graph: &DependencyGraph,
        by_id: &HashMap<&str, &Task>,
        committed: &BTreeMap<TaskId, TimeSlot>,
        now: DateTime<Utc>,
    ) -> bool {
        if !task.status.is_schedulable() || slot.end <= now || slot.end <= slot.start {
            return false;
        }
        let request = SlotRequest::for_task(task, task.ready_at(slot.start)).with_deadline(task.due_date);
        if !request.admits(slot, prefs) {
            return false;
        }
        if !base.fits_working_time(&slot) {
            return false;
        }
        if committed.values().any(|c| c.overlaps(&slot)) {
            return false;
        }
        graph.predecessor_ids(&task.id).into_iter().all(|pred_id| {
            match by_id.get(pred_id) {
                Some(pred) if pred.status.is_terminal() => pred.completed_at.unwrap_or(now) <= slot.start,
                Some(_) => committed.get(pred_id).map_or(false, |c| c.end <= slot.start),
                None => true,
            }
        })
    }
}

/// Split tasks into valid ones and rejections. Every copy of a duplicated
/// id is rejected.
fn validate_tasks(tasks: &[Task]) -> (Vec<Task>, Vec<RejectedTask>) {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for task in tasks {
        *counts.entry(task.id.as_str()).or_insert(0) += 1;
    }

    let mut valid = Vec::with_capacity(tasks.len());
    let mut rejected = Vec::new();
    for task in tasks {
        let result = if counts.get(task.id.as_str()).copied().unwrap_or(0) > 1 {
            Err(ValidationError::DuplicateId(task.id.clone()))
        } else {
            task.validate()
        };
        match result {
            Ok(()) => valid.push(task.clone()),
            Err(e) => {
                tracing::warn!(task = %task.id, error = %e, "task rejected");
                rejected.push(RejectedTask {
                    task_id: task.id.clone(),
                    error: e.to_string(),
                });
            }
        }
    }
    valid.sort_by(|a, b| a.id.cmp(&b.id));
    (valid, rejected)
}

fn predecessor_state(
    pred_id: &str,
    by_id: &HashMap<&str, &Task>,
    committed: &BTreeMap<TaskId, TimeSlot>,
    placed: &HashMap<TaskId, DateTime<Utc>>,
    failed: &BTreeSet<TaskId>,
    queue: &[RankedTask],
    now: DateTime<Utc>,
) -> PredecessorState {
    let Some(pred) = by_id.get(pred_id) else {
        return PredecessorState::DoneBy(now);
    };
    if pred.status.is_terminal() {
        return PredecessorState::DoneBy(pred.completed_at.unwrap_or(now));
    }
    if let Some(slot) = committed.get(pred_id) {
        return PredecessorState::DoneBy(slot.end);
    }
    if let Some(end) = placed.get(pred_id) {
        return PredecessorState::DoneBy(*end);
    }
    if failed.contains(pred_id) {
        return PredecessorState::Blocked;
    }
    if queue.iter().any(|e| e.task_id == pred_id) {
        return PredecessorState::Pending;
    }
    // Not eligible, cyclic, or rejected
    PredecessorState::Blocked
}

/// Pick the reason code by relaxing one constraint at a time.
fn diagnose(
    finder: &SlotFinder<'_>,
    task: &Task,
    request: &SlotRequest<'_>,
    anchor: DateTime<Utc>,
    graph: &DependencyGraph,
) -> ReasonCode {
    let own_ready = task.ready_at(anchor);
    if request.earliest > own_ready
        && !graph.predecessor_ids(&task.id).is_empty()
        && finder.find_first(&request.starting_from(own_ready)).is_some()
    {
        return ReasonCode::DependencyNotReady;
    }
    if request.deep_work && finder.find_first(&request.ignoring_energy()).is_some() {
        return ReasonCode::EnergyMismatch;
    }
    let no_contexts = BTreeSet::new();
    if !request.contexts.is_empty() && finder.find_first(&request.ignoring_contexts(&no_contexts)).is_some() {
        return ReasonCode::ContextUnavailable;
    }
    ReasonCode::NoCapacity
}

fn slot_context(prefs: &ResolvedPreferences, slot: TimeSlot) -> SlotContext {
    SlotContext {
        start: slot.start,
        end: slot.end,
        ambient_energy: prefs.energy_at(slot.start),
        contexts_available: true,
    }
}
