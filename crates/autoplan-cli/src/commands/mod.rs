pub mod config;
pub mod energy;
pub mod goals;
pub mod plan;

use autoplan_core::SchedulingPreferences;
use chrono::{DateTime, Utc};
use std::path::Path;

/// Preferences from `path`, or from the default location.
pub fn load_preferences(path: Option<&Path>) -> Result<SchedulingPreferences, Box<dyn std::error::Error>> {
    let prefs = match path {
        Some(path) => SchedulingPreferences::load_from(path)?,
        None => SchedulingPreferences::load()?,
    };
    Ok(prefs)
}

/// `--now` as RFC 3339, or the current time.
pub fn parse_now(now: Option<&str>) -> Result<DateTime<Utc>, Box<dyn std::error::Error>> {
    match now {
        Some(s) => {
            let parsed = DateTime::parse_from_rfc3339(s).map_err(|e| format!("invalid --now '{s}': {e}"))?;
            Ok(parsed.with_timezone(&Utc))
        }
        None => Ok(Utc::now()),
    }
}
