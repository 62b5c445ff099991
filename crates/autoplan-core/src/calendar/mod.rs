//! Calendar availability and slot finding.
//!
//! This module provides:
//! - Working-window construction per work day (prep / wind-down / lunch)
//! - Subtraction of calendar events (with buffers) and committed placements
//! - Energy and context admissibility filters for a candidate interval
//! - A mutable free list that hands out the first fitting slot

mod availability;
mod slot;

use chrono::{
    DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Offset, TimeZone, Timelike,
    Utc,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::storage::ResolvedPreferences;

pub use availability::CalendarAvailabilityModel;
pub use slot::{SlotFinder, SlotRequest};

/// Converts between UTC instants and the user's wall clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalClock {
    offset: FixedOffset,
}

impl LocalClock {
    /// Clock at a fixed offset east of UTC. `None` if out of range.
    pub fn new(offset_minutes: i32) -> Option<Self> {
        FixedOffset::east_opt(offset_minutes.checked_mul(60)?).map(|offset| Self { offset })
    }

    pub fn utc() -> Self {
        Self {
            offset: Utc.fix(),
        }
    }

    pub fn local(&self, t: DateTime<Utc>) -> NaiveDateTime {
        t.with_timezone(&self.offset).naive_local()
    }

    pub fn date_of(&self, t: DateTime<Utc>) -> NaiveDate {
        self.local(t).date()
    }

    pub fn hour_of(&self, t: DateTime<Utc>) -> u8 {
        self.local(t).hour() as u8
    }

    /// UTC instant of a local date and time.
    pub fn to_utc(&self, date: NaiveDate, time: NaiveTime) -> DateTime<Utc> {
        let local = date.and_time(time);
        let utc = local - Duration::seconds(self.offset.local_minus_utc() as i64);
        Utc.from_utc_datetime(&utc)
    }

    /// Round up to the next multiple of `granularity_minutes` on the local clock.
    pub fn round_up(&self, t: DateTime<Utc>, granularity_minutes: i64) -> DateTime<Utc> {
        let step = granularity_minutes.max(1) * 60;
        let local = self.local(t);
        let nanos = local.nanosecond() as i64;
        let whole = t - Duration::nanoseconds(nanos);
        let secs = local.num_seconds_from_midnight() as i64 + i64::from(nanos > 0);
        let remainder = secs % step;
        let bump = if remainder == 0 { 0 } else { step - remainder };
        whole + Duration::seconds(i64::from(nanos > 0) + bump)
    }
}

impl fmt::Display for LocalClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UTC{}", self.offset)
    }
}

/// A half-open interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TimeSlot {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeSlot {
    /// Create a slot; `None` if it would be empty.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Option<Self> {
        (end > start).then_some(Self { start, end })
    }

    /// Slot of `minutes` starting at `start`.
    pub fn starting_at(start: DateTime<Utc>, minutes: i64) -> Self {
        Self {
            start,
            end: start + Duration::minutes(minutes),
        }
    }

    /// Get duration in minutes
    pub fn duration_minutes(&self) -> i64 {
        (self.end - self.start).num_minutes()
    }

    pub fn overlaps(&self, other: &TimeSlot) -> bool {
        self.start < other.end && self.end > other.start
    }

    pub fn contains(&self, other: &TimeSlot) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// Grow the slot by `minutes` on both sides.
    pub fn padded(&self, minutes: i64) -> Self {
        Self {
            start: self.start - Duration::minutes(minutes),
            end: self.end + Duration::minutes(minutes),
        }
    }

    /// Remove every busy interval from `free`. Inputs need not be sorted.
    pub fn subtract(free: &[TimeSlot], busy: &[TimeSlot]) -> Vec<TimeSlot> {
        let mut busy: Vec<TimeSlot> = busy.to_vec();
        busy.sort();

        let mut out = Vec::new();
        for slot in free {
            let mut cursor = slot.start;
            for b in busy.iter().filter(|b| b.overlaps(slot)) {
                if b.start > cursor {
                    out.push(TimeSlot {
                        start: cursor,
                        end: b.start,
                    });
                }
                if b.end > cursor {
                    cursor = b.end;
                }
            }
            if cursor < slot.end {
                out.push(TimeSlot {
                    start: cursor,
                    end: slot.end,
                });
            }
        }
        out.sort();
        out
    }

    /// Pairwise intersection of two interval lists.
    pub fn intersect(a: &[TimeSlot], b: &[TimeSlot]) -> Vec<TimeSlot> {
        let mut out: Vec<TimeSlot> = a
            .iter()
            .flat_map(|x| {
                b.iter()
                    .filter_map(move |y| TimeSlot::new(x.start.max(y.start), x.end.min(y.end)))
            })
            .collect();
        out.sort();
        out.dedup();
        out
    }

    /// Merge touching or overlapping intervals.
    pub fn merge(mut slots: Vec<TimeSlot>) -> Vec<TimeSlot> {
        slots.sort();
        let mut out: Vec<TimeSlot> = Vec::with_capacity(slots.len());
        for slot in slots {
            match out.last_mut() {
                Some(last) if slot.start <= last.end => {
                    if slot.end > last.end {
                        last.end = slot.end;
                    }
                }
                _ => out.push(slot),
            }
        }
        out
    }
}

/// Parts of `slot` whose local hour has at least `min_level` energy.
pub fn energy_admissible(slot: TimeSlot, prefs: &ResolvedPreferences, min_level: u8) -> Vec<TimeSlot> {
    let mut parts = Vec::new();
    let mut cursor = slot.start;
    while cursor < slot.end {
        let local = prefs.clock.local(cursor);
        let into_hour = (local.minute() * 60 + local.second()) as i64;
        let next = (cursor + Duration::seconds(3600 - into_hour)).min(slot.end);
        if prefs.energy_curve.level_at(local.hour() as u8) >= min_level {
            parts.push(TimeSlot { start: cursor, end: next });
        }
        cursor = next;
    }
    TimeSlot::merge(parts)
}

/// Parts of `slot` during which every required context is available.
///
/// Contexts without configured windows are always available.
pub fn context_admissible(slot: TimeSlot, prefs: &ResolvedPreferences, contexts: &BTreeSet<String>) -> Vec<TimeSlot> {
    let mut parts = vec![slot];
    let first = prefs.clock.date_of(slot.start);
    let last = prefs.clock.date_of(slot.end - Duration::seconds(1));

    for context in contexts {
        let Some(windows) = prefs.context_windows.get(context) else {
            continue;
        };
        let mut allowed = Vec::new();
        let mut date = first;
        while date <= last {
            for window in windows {
                if window.days.is_empty() || window.days.contains(&date.weekday()) {
                    if let Some(w) = TimeSlot::new(
                        prefs.clock.to_utc(date, window.start),
                        prefs.clock.to_utc(date, window.end),
                    ) {
                        allowed.push(w);
                    }
                }
            }
            date = match date.succ_opt() {
                Some(next) => next,
                None => break,
            };
        }
        parts = TimeSlot::intersect(&parts, &TimeSlot::merge(allowed));
        if parts.is_empty() {
            break;
        }
    }
    parts
}
