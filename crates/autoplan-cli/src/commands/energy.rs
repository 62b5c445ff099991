//! Energy curve display.

use chrono::Timelike;
use clap::Subcommand;
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum EnergyAction {
    /// Show the configured energy curve
    Show {
        /// Preferences TOML (defaults to the user preferences file)
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

pub fn run(action: EnergyAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        EnergyAction::Show { config } => show(config),
    }
}

fn show(config: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let prefs = super::load_preferences(config.as_deref())?;
    let resolved = prefs.resolve()?;

    let start = resolved.work_start.hour() as u8;
    let end = (resolved.work_end.hour() + u32::from(resolved.work_end.minute() > 0)) as u8;
    println!("{}", prefs.energy_curve.render_ascii_chart(Some((start, end))));

    let threshold = resolved.deep_work_energy_threshold;
    let deep: Vec<String> = prefs
        .energy_curve
        .admissible_hours(threshold)
        .into_iter()
        .filter(|h| *h >= start && *h < end)
        .map(|h| format!("{h:02}:00"))
        .collect();

    if deep.is_empty() {
        println!("No working hour reaches the deep-work threshold ({threshold}).");
    } else {
        println!("Deep-work hours (level >= {threshold}): {}", deep.join(", "));
    }
    Ok(())
}
