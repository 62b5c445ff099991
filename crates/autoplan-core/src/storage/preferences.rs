//! TOML-based scheduling preferences.
//!
//! Stores the inputs the planner reads on every run:
//! - Work days and working hours, with prep and wind-down margins
//! - Buffers around calendar events and the protected lunch block
//! - The hourly energy curve and the deep-work threshold
//! - Scoring weights per dimension
//! - Context availability windows
//!
//! Preferences are stored at `~/.config/autoplan/preferences.toml`.
//! [`SchedulingPreferences`] is the serialized form; [`ResolvedPreferences`]
//! is the parsed and validated form the engine works with.

use chrono::{NaiveTime, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::data_dir;
use crate::calendar::LocalClock;
use crate::energy::EnergyCurve;
use crate::error::ConfigError;
use crate::scoring::ScoringWeights;

/// A window during which a context (e.g. "office", "phone") is available.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextWindow {
    /// Days the window applies to; empty means every day
    #[serde(default)]
    pub days: Vec<Weekday>,
    pub start: String, // HH:MM
    pub end: String,   // HH:MM
}

/// User scheduling preferences.
///
/// Serialized to/from TOML at `~/.config/autoplan/preferences.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulingPreferences {
    #[serde(default = "default_work_days")]
    pub work_days: Vec<Weekday>,
    #[serde(default = "default_work_start")]
    pub work_start: String, // HH:MM
    #[serde(default = "default_work_end")]
    pub work_end: String, // HH:MM
    #[serde(default = "default_15")]
    pub prep_minutes: u32,
    #[serde(default = "default_15")]
    pub wind_down_minutes: u32,
    /// Padding kept free on both sides of every calendar event
    #[serde(default = "default_buffer_minutes")]
    pub buffer_minutes: u32,
    #[serde(default = "default_true")]
    pub lunch_protection: bool,
    #[serde(default = "default_lunch_start")]
    pub lunch_start: String, // HH:MM
    #[serde(default = "default_lunch_minutes")]
    pub lunch_minutes: u32,
    #[serde(default = "default_stale_after_days")]
    pub stale_after_days: u32,
    /// Minutes east of UTC used to interpret local times
    #[serde(default)]
    pub utc_offset_minutes: i32,
    #[serde(default = "default_horizon_days")]
    pub horizon_days: u32,
    #[serde(default = "default_slot_granularity")]
    pub slot_granularity_minutes: u32,
    #[serde(default = "default_deep_work_threshold")]
    pub deep_work_energy_threshold: u8,
    #[serde(default = "default_goal_tolerance")]
    pub goal_tolerance: f64,
    #[serde(default = "default_velocity_window")]
    pub velocity_window_days: u32,
    /// Treat movable calendar blocks as busy
    #[serde(default = "default_true")]
    pub respect_movable_events: bool,
    #[serde(default = "default_weights")]
    pub weights: BTreeMap<String, f64>,
    #[serde(default)]
    pub context_windows: BTreeMap<String, Vec<ContextWindow>>,
    #[serde(default)]
    pub energy_curve: EnergyCurve,
}

// Default functions
fn default_work_days() -> Vec<Weekday> {
    vec![
        Weekday::Mon,
        Weekday::Tue,
        Weekday::Wed,
        Weekday::Thu,
        Weekday::Fri,
    ]
}
fn default_work_start() -> String {
    "09:00".into()
}
fn default_work_end() -> String {
    "17:00".into()
}
fn default_15() -> u32 {
    15
}
fn default_buffer_minutes() -> u32 {
    10
}
fn default_true() -> bool {
    true
}
fn default_lunch_start() -> String {
    "12:00".into()
}
fn default_lunch_minutes() -> u32 {
    60
}
fn default_stale_after_days() -> u32 {
    14
}
fn default_horizon_days() -> u32 {
    14
}
fn default_slot_granularity() -> u32 {
    5
}
fn default_deep_work_threshold() -> u8 {
    4
}
fn default_goal_tolerance() -> f64 {
    0.8
}
fn default_velocity_window() -> u32 {
    7
}
fn default_weights() -> BTreeMap<String, f64> {
    ScoringWeights::default().to_map()
}

impl Default for SchedulingPreferences {
    fn default() -> Self {
        Self {
            work_days: default_work_days(),
            work_start: default_work_start(),
            work_end: default_work_end(),
            prep_minutes: 15,
            wind_down_minutes: 15,
            buffer_minutes: default_buffer_minutes(),
            lunch_protection: true,
            lunch_start: default_lunch_start(),
            lunch_minutes: default_lunch_minutes(),
            stale_after_days: default_stale_after_days(),
            utc_offset_minutes: 0,
            horizon_days: default_horizon_days(),
            slot_granularity_minutes: default_slot_granularity(),
            deep_work_energy_threshold: default_deep_work_threshold(),
            goal_tolerance: default_goal_tolerance(),
            velocity_window_days: default_velocity_window(),
            respect_movable_events: true,
            weights: default_weights(),
            context_windows: BTreeMap::new(),
            energy_curve: EnergyCurve::default(),
        }
    }
}

/// A context window with parsed times.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedContextWindow {
    pub days: Vec<Weekday>,
    pub start: NaiveTime,
    pub end: NaiveTime,
}

/// Parsed, validated preferences.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedPreferences {
    pub clock: LocalClock,
    pub work_days: Vec<Weekday>,
    pub work_start: NaiveTime,
    pub work_end: NaiveTime,
    pub prep_minutes: i64,
    pub wind_down_minutes: i64,
    pub buffer_minutes: i64,
    /// Protected lunch block as (local start, minutes)
    pub lunch: Option<(NaiveTime, i64)>,
    pub energy_curve: EnergyCurve,
    pub deep_work_energy_threshold: u8,
    pub stale_after_days: i64,
    pub weights: ScoringWeights,
    pub horizon_days: i64,
    pub granularity_minutes: i64,
    pub goal_tolerance: f64,
    pub velocity_window_days: i64,
    pub respect_movable_events: bool,
    pub context_windows: BTreeMap<String, Vec<ResolvedContextWindow>>,
}

impl ResolvedPreferences {
    /// Ambient energy at an instant, read from the curve at the local hour.
    pub fn energy_at(&self, t: chrono::DateTime<chrono::Utc>) -> u8 {
        self.energy_curve.level_at(self.clock.hour_of(t))
    }
}

fn parse_hhmm(key: &str, value: &str) -> Result<NaiveTime, ConfigError> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M")
        .map_err(|_| ConfigError::invalid(key, format!("expected HH:MM, got '{value}'")))
}

impl SchedulingPreferences {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let unknown = || ConfigError::UnknownKey(key.to_string());
        let mut parts = key.split('.').peekable();
        if key.is_empty() {
            return Err(unknown());
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            let is_leaf = parts.peek().is_none();
            if is_leaf {
                let obj = current.as_object_mut().ok_or_else(unknown)?;
                let existing = obj.get(part).ok_or_else(unknown)?;

                let new_value = match existing {
                    serde_json::Value::Bool(_) => serde_json::Value::Bool(
                        value
                            .parse::<bool>()
                            .map_err(|e| ConfigError::invalid(key, e.to_string()))?,
                    ),
                    serde_json::Value::Number(_) => {
                        if let Ok(n) = value.parse::<i64>() {
                            serde_json::Value::Number(n.into())
                        } else if let Ok(n) = value.parse::<f64>() {
                            serde_json::Number::from_f64(n)
                                .map(serde_json::Value::Number)
                                .ok_or_else(|| ConfigError::invalid(key, format!("cannot parse '{value}' as number")))?
                        } else {
                            return Err(ConfigError::invalid(key, format!("cannot parse '{value}' as number")));
                        }
                    }
                    serde_json::Value::Object(_) | serde_json::Value::Array(_) => serde_json::from_str(value)
                        .map_err(|e| ConfigError::invalid(key, e.to_string()))?,
                    _ => serde_json::Value::String(value.into()),
                };

                obj.insert(part.to_string(), new_value);
                return Ok(());
            }

            current = current.get_mut(part).ok_or_else(unknown)?;
        }

        Err(unknown())
    }

    /// Default preferences location.
    pub fn path() -> Result<PathBuf, ConfigError> {
        data_dir()
            .map(|dir| dir.join("preferences.toml"))
            .map_err(|e| ConfigError::LoadFailed {
                path: PathBuf::from("~/.config/autoplan"),
                message: e.to_string(),
            })
    }

    /// Parse preferences from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Load from an explicit file. A missing file is an error.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::LoadFailed {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::from_toml_str(&content)
    }

    /// Load from the default location, or defaults if no file exists yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::path()?;
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    /// Persist to `path`.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))
    }

    /// Persist to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path()?)
    }

    /// Get a preference value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a preference value by key. The result must still validate.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown, the value cannot be parsed,
    /// or the updated preferences are invalid. `self` is left unchanged then.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut json = serde_json::to_value(&*self).map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let updated: SchedulingPreferences =
            serde_json::from_value(json).map_err(|e| ConfigError::invalid(key, e.to_string()))?;
        updated.resolve()?;
        *self = updated;
        Ok(())
    }

    /// Flattened `key = value` listing, used by `config list`.
    pub fn entries(&self) -> Vec<(String, String)> {
        fn walk(prefix: &str, value: &serde_json::Value, out: &mut Vec<(String, String)>) {
            match value {
                serde_json::Value::Object(map) if !map.is_empty() => {
                    for (k, v) in map {
                        let key = if prefix.is_empty() {
                            k.clone()
                        } else {
                            format!("{prefix}.{k}")
                        };
                        walk(&key, v, out);
                    }
                }
                serde_json::Value::String(s) => out.push((prefix.to_string(), s.clone())),
                other => out.push((prefix.to_string(), other.to_string())),
            }
        }

        let mut out = Vec::new();
        if let Ok(json) = serde_json::to_value(self) {
            walk("", &json, &mut out);
        }
        out
    }

    /// Check the preferences without keeping the parsed form.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.resolve().map(|_| ())
    }

    /// Parse times, check ranges and build the engine's view.
    pub fn resolve(&self) -> Result<ResolvedPreferences, ConfigError> {
        if self.work_days.is_empty() {
            return Err(ConfigError::invalid("work_days", "at least one work day is required"));
        }
        let mut work_days = self.work_days.clone();
        work_days.sort_by_key(|d| d.num_days_from_monday());
        work_days.dedup();

        let work_start = parse_hhmm("work_start", &self.work_start)?;
        let work_end = parse_hhmm("work_end", &self.work_end)?;
        let window_minutes = (work_end - work_start).num_minutes()
            - self.prep_minutes as i64
            - self.wind_down_minutes as i64;
        if window_minutes <= 0 {
            return Err(ConfigError::invalid(
                "work_end",
                format!(
                    "work_start + prep ({} + {}m) must be before work_end - wind_down ({} - {}m)",
                    self.work_start, self.prep_minutes, self.work_end, self.wind_down_minutes
                ),
            ));
        }

        let lunch = if self.lunch_protection {
            let start = parse_hhmm("lunch_start", &self.lunch_start)?;
            if self.lunch_minutes == 0 {
                return Err(ConfigError::invalid("lunch_minutes", "must be positive when lunch is protected"));
            }
            Some((start, self.lunch_minutes as i64))
        } else {
            None
        };

        self.energy_curve.validate()?;
        if !(crate::energy::MIN_ENERGY..=crate::energy::MAX_ENERGY).contains(&self.deep_work_energy_threshold) {
            return Err(ConfigError::invalid(
                "deep_work_energy_threshold",
                format!("must be 1-5, got {}", self.deep_work_energy_threshold),
            ));
        }

        let weights = ScoringWeights::from_overrides(&self.weights)?;

        if !(self.goal_tolerance > 0.0 && self.goal_tolerance <= 1.0) {
            return Err(ConfigError::invalid(
                "goal_tolerance",
                format!("must be in (0, 1], got {}", self.goal_tolerance),
            ));
        }
        if self.stale_after_days < 1 {
            return Err(ConfigError::invalid("stale_after_days", "must be at least 1"));
        }
        if !(1..=90).contains(&self.horizon_days) {
            return Err(ConfigError::invalid(
                "horizon_days",
                format!("must be 1-90, got {}", self.horizon_days),
            ));
        }
        if !(1..=60).contains(&self.slot_granularity_minutes) {
            return Err(ConfigError::invalid(
                "slot_granularity_minutes",
                format!("must be 1-60, got {}", self.slot_granularity_minutes),
            ));
        }
        if self.velocity_window_days < 1 {
            return Err(ConfigError::invalid("velocity_window_days", "must be at least 1"));
        }
        let clock = LocalClock::new(self.utc_offset_minutes).ok_or_else(|| {
                ConfigError::invalid(
                    "utc_offset_minutes",
                    format!("out of range: {}", self.utc_offset_minutes),
                )
            })?;

        let mut context_windows = BTreeMap::new();
        for (context, windows) in &self.context_windows {
            let key = format!("context_windows.{context}");
            let mut resolved = Vec::with_capacity(windows.len());
            for window in windows {
                let start = parse_hhmm(&key, &window.start)?;
                let end = parse_hhmm(&key, &window.end)?;
                if end <= start {
                    return Err(ConfigError::invalid(
                        key,
                        format!("window end {} must be after start {}", window.end, window.start),
                    ));
                }
                resolved.push(ResolvedContextWindow {
                    days: window.days.clone(),
                    start,
                    end,
                });
            }
            context_windows.insert(context.clone(), resolved);
        }

        Ok(ResolvedPreferences {
            clock,
            work_days,
            work_start,
            work_end,
            prep_minutes: self.prep_minutes as i64,
            wind_down_minutes: self.wind_down_minutes as i64,
            buffer_minutes: self.buffer_minutes as i64,
            lunch,
            energy_curve: self.energy_curve.clone(),
            deep_work_energy_threshold: self.deep_work_energy_threshold,
            stale_after_days: self.stale_after_days as i64,
            weights,
            horizon_days: self.horizon_days as i64,
            granularity_minutes: self.slot_granularity_minutes as i64,
            goal_tolerance: self.goal_tolerance,
            velocity_window_days: self.velocity_window_days as i64,
            respect_movable_events: self.respect_movable_events,
            context_windows,
        })
    }
}
