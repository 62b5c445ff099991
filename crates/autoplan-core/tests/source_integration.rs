//! Async runs through a snapshot source, with preferences read from TOML.

use async_trait::async_trait;
use autoplan_core::{
    CalendarEvent, ConfigError, CoreError, Goal, InMemorySource, PlanMode, ReasonCode, ScheduleSource,
    SchedulePlan, SchedulingOrchestrator, SchedulingPreferences, SnapshotFile, SourceError, Task,
};
use chrono::{DateTime, Duration, TimeZone, Utc};
use indoc::indoc;
use tokio_util::sync::CancellationToken;

fn at(h: u32, m: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, h, m, 0).unwrap()
}

const PREFERENCES: &str = indoc! {r#"
    work_start = "08:00"
    work_end = "12:00"
    prep_minutes = 0
    wind_down_minutes = 0
    buffer_minutes = 0
    lunch_protection = false
    horizon_days = 2
    utc_offset_minutes = 60

    [weights]
    priority = 0.5
    due_date = 0.5

    [energy_curve]
    fallback = 3

    [energy_curve.levels]
    "8" = 5
    "10" = 2
"#};

#[test]
fn toml_preferences_fill_in_defaults() {
    let prefs = SchedulingPreferences::from_toml_str(PREFERENCES).unwrap();
    assert_eq!(prefs.work_start, "08:00");
    assert_eq!(prefs.slot_granularity_minutes, 5);
    assert_eq!(prefs.get("weights.priority").as_deref(), Some("0.5"));
    assert_eq!(prefs.get("weights.goal"), None);

    let resolved = prefs.resolve().unwrap();
    assert_eq!(resolved.weights.goal, 0.1);
    // 07:00 UTC is 08:00 local
    assert_eq!(resolved.energy_at(at(7, 0)), 5);
    assert_eq!(resolved.energy_at(at(9, 30)), 2);
}

#[test]
fn unknown_weight_is_rejected() {
    let prefs = SchedulingPreferences::from_toml_str(indoc! {r#"
        [weights]
        luck = 1.0
    "#})
    .unwrap();
    assert!(matches!(prefs.validate(), Err(ConfigError::UnknownKey(_))));
}

#[test]
fn preferences_survive_a_save_and_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("preferences.toml");
    let mut prefs = SchedulingPreferences::from_toml_str(PREFERENCES).unwrap();
    prefs.set("horizon_days", "3").unwrap();
    prefs.save_to(&path).unwrap();

    assert_eq!(SchedulingPreferences::load_from(&path).unwrap(), prefs);
}

#[tokio::test]
async fn run_uses_the_local_clock_and_persists() {
    let prefs = SchedulingPreferences::from_toml_str(PREFERENCES).unwrap();
    let source = InMemorySource::new(
        vec![
            Task::with_id("deep", "Deep work", at(6, 0)).with_minutes(60).with_deep_work(),
            Task::with_id("quick", "Quick call", at(6, 0)).with_minutes(30).with_priority(3),
        ],
        vec![Goal::new("done", 100.0)],
        vec![CalendarEvent::new("sync", at(8, 0), at(8, 30))],
    );

    let plan = SchedulingOrchestrator::default()
        .run_and_persist(&source, &source, prefs, at(6, 30), &CancellationToken::new())
        .await
        .unwrap();

    // Local 08:00 to 09:00 has energy 5; the event starts at local 09:00.
    let deep = plan.assignment_for("deep").unwrap();
    assert_eq!((deep.start, deep.end), (at(7, 0), at(8, 0)));
    assert!(plan.assignment_for("quick").unwrap().start >= at(8, 30));
    assert_eq!(source.persisted_plans(), vec![plan]);
}

#[tokio::test]
async fn snapshot_file_feeds_a_run() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("snapshot.json");
    std::fs::write(
        &path,
        indoc! {r#"
            {
              "tasks": [
                { "id": "write", "title": "Write draft", "estimated_minutes": 45,
                  "created_at": "2026-03-01T09:00:00Z" },
                { "id": "edit", "title": "Edit draft", "estimated_minutes": 30,
                  "blocked_by_task_ids": ["write"], "created_at": "2026-03-01T09:00:00Z" }
              ]
            }
        "#},
    )
    .unwrap();

    let source = SnapshotFile::load(&path).await.unwrap().into_source();
    let mut prefs = SchedulingPreferences::default();
    prefs.horizon_days = 1;
    let plan = SchedulingOrchestrator::new(PlanMode::ReplanAuto)
        .run(&source, prefs, at(8, 0), &CancellationToken::new())
        .await
        .unwrap();

    let write = plan.assignment_for("write").unwrap();
    let edit = plan.assignment_for("edit").unwrap();
    assert_eq!(write.start, at(9, 15));
    assert!(edit.start >= write.end);
}

struct Offline;

#[async_trait]
impl ScheduleSource for Offline {
    async fn get_schedulable_tasks(&self) -> Result<Vec<Task>, SourceError> {
        Err(SourceError::Unavailable {
            collaborator: "task repository".into(),
            message: "connection refused".into(),
        })
    }

    async fn get_goals_in_window(&self, _: DateTime<Utc>, _: DateTime<Utc>) -> Result<Vec<Goal>, SourceError> {
        Ok(Vec::new())
    }

    async fn get_fixed_events(&self, _: DateTime<Utc>, _: DateTime<Utc>) -> Result<Vec<CalendarEvent>, SourceError> {
        Ok(Vec::new())
    }
}

#[tokio::test]
async fn failing_collaborator_aborts_the_run() {
    let err = SchedulingOrchestrator::default()
        .run(&Offline, SchedulingPreferences::default(), at(8, 0), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Source(SourceError::Unavailable { .. })));
}

#[tokio::test]
async fn overdue_task_from_source_is_reported() {
    let source = InMemorySource::new(
        vec![Task::with_id("late", "Late", at(6, 0)).with_due(at(7, 0))],
        Vec::new(),
        Vec::new(),
    );
    let plan: SchedulePlan = SchedulingOrchestrator::default()
        .run(&source, SchedulingPreferences::default(), at(8, 0) + Duration::minutes(1), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(plan.reason_for("late"), Some(ReasonCode::NoCapacity));
}
