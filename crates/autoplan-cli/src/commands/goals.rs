use autoplan_core::{GoalProgressTracker, SchedulingOrchestrator, SnapshotFile};
use clap::Args;
use std::path::PathBuf;

#[derive(Args)]
pub struct GoalsArgs {
    /// Snapshot JSON with tasks and goals
    #[arg(long)]
    snapshot: PathBuf,
    /// Preferences TOML (defaults to the user preferences file)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Evaluation instant, RFC 3339 (defaults to now)
    #[arg(long)]
    now: Option<String>,
    /// Print reports as JSON
    #[arg(long)]
    json: bool,
}

pub async fn run(args: GoalsArgs) -> Result<(), Box<dyn std::error::Error>> {
    let prefs = super::load_preferences(args.config.as_deref())?.resolve()?;
    let now = super::parse_now(args.now.as_deref())?;
    let snapshot = SnapshotFile::load(&args.snapshot).await?;

    let unscheduled = SchedulingOrchestrator::default().engine_managed(&snapshot.tasks);

    let tracker = GoalProgressTracker::from_preferences(&prefs);
    let (reports, _) = tracker.track(&snapshot.goals, &snapshot.tasks, &unscheduled, now);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
        return Ok(());
    }

    if reports.is_empty() {
        println!("No active goals.");
        return Ok(());
    }
    for r in &reports {
        let status = if r.on_track { "on track" } else { "behind" };
        let days = r
            .days_remaining
            .map(|d| format!("{d} days left"))
            .unwrap_or_else(|| "no target".to_string());
        println!(
            "{:<20} {:<8} need {:>5.1}%/day, recent {:>5.1}%/day, {}  [{}]",
            r.goal_id,
            status,
            r.required_daily_progress,
            r.recent_velocity,
            days,
            serde_json::to_value(r.recommendation)?.as_str().unwrap_or_default()
        );
    }
    Ok(())
}
