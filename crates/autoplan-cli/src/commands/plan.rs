use autoplan_core::{Assignment, LocalClock, PlanMode, SchedulePlan, SchedulingOrchestrator, SnapshotFile};
use clap::Args;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

#[derive(Args)]
pub struct PlanArgs {
    /// Snapshot JSON with tasks, goals and events
    #[arg(long)]
    snapshot: PathBuf,
    /// Preferences TOML (defaults to the user preferences file)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Planning instant, RFC 3339 (defaults to now)
    #[arg(long)]
    now: Option<String>,
    /// incremental, replan-auto or replan-all
    #[arg(long, default_value_t = PlanMode::Incremental)]
    mode: PlanMode,
    /// Write the snapshot with placements applied to this file
    #[arg(long)]
    apply: Option<PathBuf>,
    /// Print the plan as JSON
    #[arg(long)]
    json: bool,
}

pub async fn run(args: PlanArgs) -> Result<(), Box<dyn std::error::Error>> {
    let prefs = super::load_preferences(args.config.as_deref())?;
    let clock = prefs.resolve()?.clock;
    let now = super::parse_now(args.now.as_deref())?;
    let snapshot = SnapshotFile::load(&args.snapshot).await?;

    let source = snapshot.clone().into_source();
    let plan = SchedulingOrchestrator::new(args.mode)
        .run(&source, prefs, now, &CancellationToken::new())
        .await?;

    if let Some(out) = &args.apply {
        let mut applied = snapshot;
        plan.apply_to(&mut applied.tasks);
        applied.save(out).await?;
        tracing::info!(path = %out.display(), "applied snapshot written");
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&plan)?);
    } else {
        print_summary(&plan, &clock);
    }
    Ok(())
}

fn print_summary(plan: &SchedulePlan, clock: &LocalClock) {
    let slot = |a: &Assignment| {
        format!(
            "{} - {}  {}",
            clock.local(a.start).format("%a %H:%M"),
            clock.local(a.end).format("%H:%M"),
            a.task_id
        )
    };

    println!(
        "Plan generated at {} ({})",
        clock.local(plan.generated_at).format("%Y-%m-%d %H:%M"),
        clock
    );

    if !plan.commitments.is_empty() {
        println!("\nCommitments:");
        for c in &plan.commitments {
            println!("  {}", slot(c));
        }
    }

    println!("\nAssignments:");
    if plan.assignments.is_empty() {
        println!("  (none)");
    }
    for a in &plan.assignments {
        println!("  {}", slot(a));
    }

    if !plan.unschedulable.is_empty() {
        println!("\nUnschedulable:");
        for u in &plan.unschedulable {
            println!("  {}  ({})", u.task_id, u.reason);
        }
    }
    for cycle in &plan.cycles {
        println!("\nCycle: {}", cycle.task_ids.join(" -> "));
    }
    for r in &plan.rejected {
        println!("\nRejected {}: {}", r.task_id, r.error);
    }

    println!("\nFingerprint: {}", plan.fingerprint());
}
