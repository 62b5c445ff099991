//! End-to-end planning scenarios.

use autoplan_core::{
    CalendarEvent, EnergyCurve, Goal, GoalRecommendation, PlanMode, ReasonCode, SchedulePlan,
    SchedulingOrchestrator, SchedulingPreferences, SchedulingSnapshot, Task,
};
use chrono::{DateTime, Duration, TimeZone, Utc};
use tokio_util::sync::CancellationToken;

// 2026-03-02 is a Monday
fn at(h: u32, m: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, h, m, 0).unwrap()
}

/// Plain 9-17 day with no padding, one day of horizon.
fn bare_day() -> SchedulingPreferences {
    let mut p = SchedulingPreferences::default();
    p.prep_minutes = 0;
    p.wind_down_minutes = 0;
    p.buffer_minutes = 0;
    p.lunch_protection = false;
    p.horizon_days = 1;
    p.energy_curve = EnergyCurve::flat(3).with_level(9, 4);
    p
}

fn task(id: &str) -> Task {
    Task::with_id(id, id, at(8, 0))
}

fn run(snapshot: &SchedulingSnapshot) -> SchedulePlan {
    SchedulingOrchestrator::default()
        .plan(snapshot, &CancellationToken::new())
        .unwrap()
}

#[test]
fn urgent_task_takes_the_morning_slot() {
    let snapshot = SchedulingSnapshot::new(at(8, 0), bare_day())
        .with_tasks([
            task("A").with_priority(1).with_due(at(8, 0) + Duration::days(2)).with_minutes(60).with_energy(3),
            task("B").with_priority(2).with_due(at(8, 0) + Duration::days(10)).with_minutes(30).with_energy(3),
        ])
        .with_events([CalendarEvent::new("offsite", at(10, 30), at(17, 0))]);

    let plan = run(&snapshot);

    let a = plan.assignment_for("A").unwrap();
    let b = plan.assignment_for("B").unwrap();
    assert_eq!((a.start, a.end), (at(9, 0), at(10, 0)));
    assert_eq!((b.start, b.end), (at(10, 0), at(10, 30)));
    assert!(plan.unschedulable.is_empty());
}

#[test]
fn dependent_without_room_after_predecessor_is_dependency_not_ready() {
    let snapshot = SchedulingSnapshot::new(at(8, 0), bare_day())
        .with_tasks([
            task("C").with_priority(1).with_minutes(30).with_due(at(9, 30)).blocked_by("D"),
            task("D").with_priority(2).with_minutes(45),
        ])
        .with_events([CalendarEvent::new("workshop", at(9, 30), at(17, 0))]);

    let plan = run(&snapshot);

    assert_eq!(plan.reason_for("C"), Some(ReasonCode::DependencyNotReady));
    assert_eq!(plan.reason_for("D"), Some(ReasonCode::NoCapacity));
    assert!(plan.assignments.is_empty());
}

#[test]
fn lagging_goal_recommends_its_linked_tasks() {
    let target = at(8, 0).date_naive() + Duration::days(10);
    let snapshot = SchedulingSnapshot::new(at(8, 0), bare_day())
        .with_tasks([
            task("a-plain").with_minutes(30),
            task("z-goal").with_minutes(30).with_goal("G"),
        ])
        .with_goals([Goal::new("G", 40.0).with_target(target).with_priority(1)])
        .with_events([CalendarEvent::new("busy", at(9, 30), at(17, 0))]);

    let plan = run(&snapshot);

    let report = &plan.goal_reports[0];
    assert_eq!(report.goal_id, "G");
    assert!((report.required_daily_progress - 6.0).abs() < 1e-9);
    assert!(!report.on_track);
    assert_eq!(report.recommendation, GoalRecommendation::PrioritizeLinkedTasks);

    // The only slot goes to the goal's task.
    assert_eq!(plan.assignment_for("z-goal").unwrap().start, at(9, 0));
    assert_eq!(plan.reason_for("a-plain"), Some(ReasonCode::NoCapacity));
}

#[test]
fn cycles_are_reported_and_the_rest_is_placed() {
    let snapshot = SchedulingSnapshot::new(at(8, 0), bare_day()).with_tasks([
        task("X").blocked_by("Y"),
        task("Y").blocked_by("X"),
        task("downstream").blocked_by("X"),
        task("solo"),
    ]);

    let plan = run(&snapshot);

    assert_eq!(plan.cycles.len(), 1);
    assert_eq!(plan.cycles[0].task_ids, vec!["X".to_string(), "Y".to_string()]);
    assert_eq!(plan.reason_for("X"), Some(ReasonCode::DependencyNotReady));
    assert_eq!(plan.reason_for("Y"), Some(ReasonCode::DependencyNotReady));
    assert_eq!(plan.reason_for("downstream"), Some(ReasonCode::DependencyNotReady));
    assert_eq!(plan.assignment_for("solo").unwrap().start, at(9, 0));
}

#[test]
fn afternoon_run_anchors_at_now_not_start_of_day() {
    let snapshot = SchedulingSnapshot::new(at(14, 2), bare_day()).with_tasks([task("late").with_minutes(30)]);

    let plan = run(&snapshot);

    let placed = plan.assignment_for("late").unwrap();
    assert_eq!(placed.start, at(14, 5));
    assert_eq!(placed.end, at(14, 35));
}

#[test]
fn stale_task_outranks_an_equal_fresh_one() {
    let stale = Task::with_id("stale", "stale", at(8, 0) - Duration::days(20)).with_minutes(30);
    let fresh = task("fresh").with_minutes(30);
    let snapshot = SchedulingSnapshot::new(at(8, 0), bare_day())
        .with_tasks([fresh, stale])
        .with_events([CalendarEvent::new("busy", at(9, 30), at(17, 0))]);

    let plan = run(&snapshot);

    assert_eq!(plan.assignment_for("stale").unwrap().start, at(9, 0));
    assert_eq!(plan.reason_for("fresh"), Some(ReasonCode::NoCapacity));
}

fn busy_week() -> SchedulingSnapshot {
    let mut prefs = SchedulingPreferences::default();
    prefs.horizon_days = 5;
    SchedulingSnapshot::new(at(8, 0), prefs)
        .with_tasks([
            task("design").with_priority(1).with_minutes(90),
            task("build").with_minutes(120).blocked_by("design"),
            task("review").with_minutes(30).blocked_by("build").with_due(at(8, 0) + Duration::days(3)),
            task("email").with_priority(3).with_minutes(20),
            task("report").with_minutes(60).with_goal("Q1"),
        ])
        .with_goals([Goal::new("Q1", 20.0).with_target(at(8, 0).date_naive() + Duration::days(20))])
        .with_events([
            CalendarEvent::new("standup", at(9, 30), at(9, 45)),
            CalendarEvent::new("1:1", at(14, 0), at(15, 0)),
        ])
}

#[test]
fn applying_a_plan_and_rerunning_changes_nothing() {
    let snapshot = busy_week();
    let first = run(&snapshot);
    assert!(first.unschedulable.is_empty());
    assert_eq!(first.assignments.len(), 5);

    let mut applied = snapshot.clone();
    first.apply_to(&mut applied.tasks);

    let second = run(&applied);
    assert_eq!(second.assignments, first.assignments);
    assert_eq!(second.fingerprint(), first.fingerprint());

    let replanned = SchedulingOrchestrator::new(PlanMode::ReplanAuto)
        .plan(&applied, &CancellationToken::new())
        .unwrap();
    assert_eq!(replanned.assignments, first.assignments);

    // A failed task keeps its reason once the hour it lost is a commitment.
    let mut prefs = bare_day();
    prefs.energy_curve = EnergyCurve::flat(3);
    let snapshot = SchedulingSnapshot::new(at(8, 0), prefs)
        .with_tasks([
            task("deep").with_priority(1).with_minutes(60).with_deep_work(),
            task("filler").with_priority(3).with_minutes(60),
        ])
        .with_events([CalendarEvent::new("offsite", at(10, 0), at(17, 0))]);
    let first = run(&snapshot);
    assert_eq!(first.assignment_for("filler").unwrap().start, at(9, 0));
    assert_eq!(first.reason_for("deep"), Some(ReasonCode::NoCapacity));

    let mut applied = snapshot.clone();
    first.apply_to(&mut applied.tasks);
    let second = run(&applied);
    assert_eq!(second.unschedulable, first.unschedulable);
    assert_eq!(second.fingerprint(), first.fingerprint());
}

#[test]
fn input_order_does_not_change_the_plan() {
    let snapshot = busy_week();
    let mut reversed = snapshot.clone();
    reversed.tasks.reverse();
    reversed.events.reverse();

    assert_eq!(run(&snapshot).fingerprint(), run(&reversed).fingerprint());
}

#[test]
fn dependency_chain_is_placed_in_order() {
    let plan = run(&busy_week());
    let design = plan.assignment_for("design").unwrap();
    let build = plan.assignment_for("build").unwrap();
    let review = plan.assignment_for("review").unwrap();
    assert!(design.end <= build.start);
    assert!(build.end <= review.start);
}
