//! Energy curve: expected personal energy per hour of day.
//!
//! The curve is a step function. Each entry `hour -> level` holds until the
//! next configured hour; hours before the first entry use `fallback`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::ConfigError;

/// Lowest energy level.
pub const MIN_ENERGY: u8 = 1;
/// Highest energy level.
pub const MAX_ENERGY: u8 = 5;

/// Hour-of-day to energy-level mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnergyCurve {
    /// Level used before the first step point
    #[serde(default = "default_fallback")]
    pub fallback: u8,
    /// Step points, keyed by hour (0-23)
    #[serde(with = "hour_keys")]
    pub levels: BTreeMap<u8, u8>,
}

fn default_fallback() -> u8 {
    3
}

impl Default for EnergyCurve {
    fn default() -> Self {
        Self::new()
    }
}

impl EnergyCurve {
    /// A typical day: slow start, morning peak, post-lunch dip, early
    /// afternoon recovery, evening decline.
    pub fn new() -> Self {
        let levels = [(0, 1), (7, 3), (9, 4), (12, 3), (14, 4), (16, 3), (18, 2), (21, 1)]
            .into_iter()
            .collect();
        Self {
            fallback: default_fallback(),
            levels,
        }
    }

    /// A curve that reports the same level all day.
    pub fn flat(level: u8) -> Self {
        Self {
            fallback: level,
            levels: BTreeMap::new(),
        }
    }

    /// Builder-style step point.
    pub fn with_level(mut self, hour: u8, level: u8) -> Self {
        self.levels.insert(hour, level);
        self
    }

    /// Energy level at a local hour.
    pub fn level_at(&self, hour: u8) -> u8 {
        self.levels
            .range(..=hour)
            .next_back()
            .map(|(_, level)| *level)
            .unwrap_or(self.fallback)
    }

    /// Hours whose level is at least `min_level`.
    pub fn admissible_hours(&self, min_level: u8) -> Vec<u8> {
        (0..24).filter(|h| self.level_at(*h) >= min_level).collect()
    }

    /// Check hours and levels are in range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(MIN_ENERGY..=MAX_ENERGY).contains(&self.fallback) {
            return Err(ConfigError::invalid(
                "energy_curve.fallback",
                format!("level must be {}-{}, got {}", MIN_ENERGY, MAX_ENERGY, self.fallback),
            ));
        }
        for (hour, level) in &self.levels {
            if *hour > 23 {
                return Err(ConfigError::invalid(
                    "energy_curve.levels",
                    format!("hour must be 0-23, got {hour}"),
                ));
            }
            if !(MIN_ENERGY..=MAX_ENERGY).contains(level) {
                return Err(ConfigError::invalid(
                    format!("energy_curve.levels.{hour}"),
                    format!("level must be {}-{}, got {}", MIN_ENERGY, MAX_ENERGY, level),
                ));
            }
        }
        Ok(())
    }

    /// Render the curve as an ASCII chart.
    pub fn render_ascii_chart(&self, work_hours: Option<(u8, u8)>) -> String {
        let mut output = String::from("\nEnergy Curve:\n");
        output.push_str(&"─".repeat(40));
        output.push('\n');

        for hour in 0..24u8 {
            let level = self.level_at(hour);
            let bar = "█".repeat(level as usize * 5);
            let empty = " ".repeat((MAX_ENERGY - level.min(MAX_ENERGY)) as usize * 5);
            let marker = match work_hours {
                Some((start, end)) if hour >= start && hour < end => "●",
                _ => "·",
            };
            output.push_str(&format!("{hour:02}:00 {bar}{empty} {marker} {level}\n"));
        }

        output.push_str(&"─".repeat(40));
        output.push_str("\n● Working hours  · Off\n");
        output
    }
}

/// TOML and JSON tables only have string keys; hours are stored as "9", "14".
mod hour_keys {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::collections::BTreeMap;

    pub fn serialize<S: Serializer>(map: &BTreeMap<u8, u8>, serializer: S) -> Result<S::Ok, S::Error> {
        let as_strings: BTreeMap<String, u8> = map.iter().map(|(h, l)| (h.to_string(), *l)).collect();
        as_strings.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<BTreeMap<u8, u8>, D::Error> {
        let raw = BTreeMap::<String, u8>::deserialize(deserializer)?;
        raw.into_iter()
            .map(|(k, v)| {
                k.trim()
                    .parse::<u8>()
                    .map(|h| (h, v))
                    .map_err(|_| D::Error::custom(format!("invalid hour key '{k}'")))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_at_follows_step_points() {
        let curve = EnergyCurve::new();
        assert_eq!(curve.level_at(3), 1);
        assert_eq!(curve.level_at(8), 3);
        assert_eq!(curve.level_at(9), 4);
        assert_eq!(curve.level_at(11), 4);
        assert_eq!(curve.level_at(13), 3);
        assert_eq!(curve.level_at(23), 1);
    }

    #[test]
    fn hours_before_first_step_use_fallback() {
        let curve = EnergyCurve::flat(2).with_level(10, 5);
        assert_eq!(curve.level_at(9), 2);
        assert_eq!(curve.level_at(10), 5);
    }

    #[test]
    fn admissible_hours_respects_threshold() {
        let curve = EnergyCurve::new();
        assert_eq!(curve.admissible_hours(4), vec![9, 10, 11, 14, 15]);
    }

    #[test]
    fn validate_rejects_bad_entries() {
        assert!(EnergyCurve::new().validate().is_ok());
        assert!(EnergyCurve::flat(0).validate().is_err());
        assert!(EnergyCurve::new().with_level(24, 3).validate().is_err());
        assert!(EnergyCurve::new().with_level(10, 9).validate().is_err());
    }

    #[test]
    fn curve_round_trips_through_toml_with_string_hour_keys() {
        let toml_str = "fallback = 2\n[levels]\n\"9\" = 5\n\"13\" = 3\n";
        let curve: EnergyCurve = toml::from_str(toml_str).unwrap();
        assert_eq!(curve.level_at(10), 5);
        assert_eq!(curve.level_at(8), 2);

        let back = toml::to_string(&curve).unwrap();
        let again: EnergyCurve = toml::from_str(&back).unwrap();
        assert_eq!(again, curve);
    }

    #[test]
    fn ascii_chart_marks_working_hours() {
        let chart = EnergyCurve::new().render_ascii_chart(Some((9, 17)));
        assert!(chart.contains("09:00"));
        assert!(chart.contains("●"));
    }
}
