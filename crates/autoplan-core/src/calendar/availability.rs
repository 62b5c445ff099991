//! Free working time over the planning horizon.

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};

use super::{energy_admissible, TimeSlot};
use crate::schedule::CalendarEvent;
use crate::storage::ResolvedPreferences;

/// Free intervals for each work day in the horizon.
///
/// A day's window is `[work_start + prep, work_end - wind_down]`. Lunch,
/// calendar events (padded by the buffer) and committed placements are
/// removed from it, and nothing is offered before the anchor.
#[derive(Debug, Clone)]
pub struct CalendarAvailabilityModel<'p> {
    prefs: &'p ResolvedPreferences,
    anchor: DateTime<Utc>,
    first_day: NaiveDate,
    events: Vec<TimeSlot>,
    commitments: Vec<TimeSlot>,
}

impl<'p> CalendarAvailabilityModel<'p> {
    pub fn new(prefs: &'p ResolvedPreferences, now: DateTime<Utc>, events: &[CalendarEvent]) -> Self {
        let anchor = prefs.clock.round_up(now, prefs.granularity_minutes);
        let first_day = prefs.clock.date_of(anchor);

        let busy = events
            .iter()
            .filter(|e| !e.movable || prefs.respect_movable_events)
            .filter_map(|e| TimeSlot::new(e.start, e.end))
            .map(|slot| slot.padded(prefs.buffer_minutes))
            .collect();

        Self {
            prefs,
            anchor,
            first_day,
            events: TimeSlot::merge(busy),
            commitments: Vec::new(),
        }
    }

    /// Block intervals already taken by kept or manual placements.
    pub fn with_commitments(mut self, commitments: impl IntoIterator<Item = TimeSlot>) -> Self {
        self.commitments.extend(commitments);
        self.commitments = TimeSlot::merge(std::mem::take(&mut self.commitments));
        self
    }

    /// Earliest instant a new placement may start.
    pub fn anchor(&self) -> DateTime<Utc> {
        self.anchor
    }

    /// Days covered by the horizon, in order.
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.first_day
            .iter_days()
            .take(self.prefs.horizon_days.max(0) as usize)
    }

    /// Working window of a day, or `None` on a day off.
    pub fn work_window(&self, date: NaiveDate) -> Option<TimeSlot> {
        if !self.prefs.work_days.contains(&date.weekday()) {
            return None;
        }
        let start = self.prefs.clock.to_utc(date, self.prefs.work_start)
            + Duration::minutes(self.prefs.prep_minutes);
        let end = self.prefs.clock.to_utc(date, self.prefs.work_end)
            - Duration::minutes(self.prefs.wind_down_minutes);
        TimeSlot::new(start, end)
    }

    fn lunch_on(&self, date: NaiveDate) -> Option<TimeSlot> {
        let (start, minutes) = self.prefs.lunch?;
        Some(TimeSlot::starting_at(self.prefs.clock.to_utc(date, start), minutes))
    }

    /// Free time on one day before commitments and the anchor are applied.
    fn base_free_on(&self, date: NaiveDate) -> Vec<TimeSlot> {
        let Some(window) = self.work_window(date) else {
            return Vec::new();
        };
        let mut busy: Vec<TimeSlot> = self.events.iter().copied().filter(|e| e.overlaps(&window)).collect();
        busy.extend(self.lunch_on(date));
        TimeSlot::subtract(&[window], &busy)
    }

    /// Free intervals on one day, clipped at the anchor.
    pub fn free_on(&self, date: NaiveDate) -> Vec<TimeSlot> {
        let base = self.base_free_on(date);
        TimeSlot::subtract(&base, &self.commitments)
            .into_iter()
            .filter_map(|slot| TimeSlot::new(slot.start.max(self.anchor), slot.end))
            .collect()
    }

    /// Lazy sequence of free intervals across the horizon, in time order.
    pub fn intervals(&self) -> impl Iterator<Item = TimeSlot> + '_ {
        self.days().flat_map(move |date| self.free_on(date))
    }

    /// Free intervals restricted to hours at or above the deep-work threshold.
    pub fn intervals_for_deep_work(&self) -> impl Iterator<Item = TimeSlot> + '_ {
        let threshold = self.prefs.deep_work_energy_threshold;
        self.intervals()
            .flat_map(move |slot| energy_admissible(slot, self.prefs, threshold))
    }

    /// Whether `slot` lies inside working time free of events and lunch.
    ///
    /// Commitments and the anchor are ignored, so an existing placement can
    /// be checked against the model it will be retained into.
    pub fn fits_working_time(&self, slot: &TimeSlot) -> bool {
        let date = self.prefs.clock.date_of(slot.start);
        self.base_free_on(date).iter().any(|free| free.contains(slot))
    }
}
