//! First-fit slot search over a mutable free list.

use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeSet;

use super::{context_admissible, energy_admissible, TimeSlot};
use crate::storage::ResolvedPreferences;
use crate::task::Task;

/// What a placement needs from the free list.
#[derive(Debug, Clone)]
pub struct SlotRequest<'t> {
    pub minutes: i64,
    /// No candidate may start before this instant
    pub earliest: DateTime<Utc>,
    /// Candidates must end at or before this instant
    pub deadline: Option<DateTime<Utc>>,
    pub deep_work: bool,
    pub contexts: &'t BTreeSet<String>,
}

impl<'t> SlotRequest<'t> {
    pub fn for_task(task: &'t Task, earliest: DateTime<Utc>) -> Self {
        Self {
            minutes: task.estimated_minutes as i64,
            earliest,
            deadline: None,
            deep_work: task.requires_deep_work,
            contexts: &task.contexts,
        }
    }

    pub fn with_deadline(mut self, deadline: Option<DateTime<Utc>>) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn starting_from(&self, earliest: DateTime<Utc>) -> Self {
        Self {
            earliest,
            ..self.clone()
        }
    }

    /// The same request without the deep-work energy filter.
    pub fn ignoring_energy(&self) -> Self {
        Self {
            deep_work: false,
            ..self.clone()
        }
    }

    /// The same request without context windows.
    pub fn ignoring_contexts(&self, empty: &'t BTreeSet<String>) -> Self {
        Self {
            contexts: empty,
            ..self.clone()
        }
    }

    /// Whether `slot` alone satisfies this request: exact length, no start
    /// before `earliest`, no end after the deadline, and inside the energy
    /// and context windows. Free time is not checked.
    pub fn admits(&self, slot: TimeSlot, prefs: &ResolvedPreferences) -> bool {
        if self.minutes <= 0 || slot != TimeSlot::starting_at(slot.start, self.minutes) {
            return false;
        }
        if slot.start < self.earliest || self.deadline.map_or(false, |d| slot.end > d) {
            return false;
        }
        admissible_parts(prefs, slot, self).iter().any(|part| part.contains(&slot))
    }
}

/// Admissible sub-intervals of a free interval for `request`.
fn admissible_parts(prefs: &ResolvedPreferences, slot: TimeSlot, request: &SlotRequest<'_>) -> Vec<TimeSlot> {
    let mut parts = match TimeSlot::new(slot.start.max(request.earliest), slot.end) {
        Some(clipped) => vec![clipped],
        None => return Vec::new(),
    };
    if request.deep_work {
        let threshold = prefs.deep_work_energy_threshold;
        parts = parts
            .into_iter()
            .flat_map(|p| energy_admissible(p, prefs, threshold))
            .collect();
    }
    if !request.contexts.is_empty() {
        parts = parts
            .into_iter()
            .flat_map(|p| context_admissible(p, prefs, request.contexts))
            .collect();
    }
    parts
}

/// Remaining free intervals, consumed as placements are made.
#[derive(Debug, Clone)]
pub struct SlotFinder<'p> {
    prefs: &'p ResolvedPreferences,
    free: Vec<TimeSlot>,
}

impl<'p> SlotFinder<'p> {
    pub fn new(prefs: &'p ResolvedPreferences, free: impl IntoIterator<Item = TimeSlot>) -> Self {
        Self {
            prefs,
            free: TimeSlot::merge(free.into_iter().collect()),
        }
    }

    pub fn free_slots(&self) -> &[TimeSlot] {
        &self.free
    }

    /// Earliest placement per admissible part, in time order.
    pub fn candidates<'a>(&'a self, request: &'a SlotRequest<'_>) -> impl Iterator<Item = TimeSlot> + 'a {
        let length = Duration::minutes(request.minutes);
        self.free
            .iter()
            .flat_map(move |slot| admissible_parts(self.prefs, *slot, request))
            .filter(move |part| part.end - part.start >= length)
            .map(move |part| TimeSlot::starting_at(part.start, request.minutes))
            .take_while(move |candidate| request.deadline.map_or(true, |d| candidate.end <= d))
    }

    /// The first slot that satisfies `request`.
    pub fn find_first(&self, request: &SlotRequest<'_>) -> Option<TimeSlot> {
        if request.minutes <= 0 {
            return None;
        }
        self.candidates(request).next()
    }

    /// Remove `slot` from the free list. Returns `false` if it was not free.
    pub fn reserve(&mut self, slot: TimeSlot) -> bool {
        let Some(index) = self.free.iter().position(|free| free.contains(&slot)) else {
            return false;
        };
        let host = self.free.remove(index);
        let mut insert_at = index;
        if let Some(left) = TimeSlot::new(host.start, slot.start) {
            self.free.insert(insert_at, left);
            insert_at += 1;
        }
        if let Some(right) = TimeSlot::new(slot.end, host.end) {
            self.free.insert(insert_at, right);
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::energy::EnergyCurve;
    use crate::storage::SchedulingPreferences;
    use chrono::TimeZone;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, h, m, 0).unwrap()
    }

    fn slot(h1: u32, m1: u32, h2: u32, m2: u32) -> TimeSlot {
        TimeSlot::new(at(h1, m1), at(h2, m2)).unwrap()
    }

    fn prefs() -> ResolvedPreferences {
        let mut p = SchedulingPreferences::default();
        p.energy_curve = EnergyCurve::flat(2).with_level(10, 5).with_level(12, 2);
        p.resolve().unwrap()
    }

    #[test]
    fn find_first_skips_short_gaps() {
        let prefs = prefs();
        let finder = SlotFinder::new(&prefs, [slot(9, 0, 9, 20), slot(9, 30, 11, 0)]);
        let contexts = BTreeSet::new();
        let request = SlotRequest {
            minutes: 30,
            earliest: at(9, 0),
            deadline: None,
            deep_work: false,
            contexts: &contexts,
        };
        assert_eq!(finder.find_first(&request), Some(slot(9, 30, 10, 0)));
    }

    #[test]
    fn deep_work_waits_for_high_energy_hours() {
        let prefs = prefs();
        let finder = SlotFinder::new(&prefs, [slot(9, 0, 17, 0)]);
        let contexts = BTreeSet::new();
        let request = SlotRequest {
            minutes: 60,
            earliest: at(9, 0),
            deadline: None,
            deep_work: true,
            contexts: &contexts,
        };
        assert_eq!(finder.find_first(&request), Some(slot(10, 0, 11, 0)));
        assert_eq!(finder.find_first(&request.ignoring_energy()), Some(slot(9, 0, 10, 0)));
    }

    #[test]
    fn deadline_limits_candidates() {
        let prefs = prefs();
        let finder = SlotFinder::new(&prefs, [slot(9, 0, 9, 20), slot(13, 0, 17, 0)]);
        let contexts = BTreeSet::new();
        let request = SlotRequest {
            minutes: 30,
            earliest: at(9, 0),
            deadline: Some(at(12, 0)),
            deep_work: false,
            contexts: &contexts,
        };
        assert_eq!(finder.find_first(&request), None);
    }

    #[test]
    fn reserve_splits_the_host_interval() {
        let prefs = prefs();
        let mut finder = SlotFinder::new(&prefs, [slot(9, 0, 12, 0)]);
        assert!(finder.reserve(slot(10, 0, 10, 30)));
        assert_eq!(finder.free_slots(), &[slot(9, 0, 10, 0), slot(10, 30, 12, 0)]);
        assert!(!finder.reserve(slot(9, 45, 10, 15)));
    }

    #[test]
    fn admits_checks_length_deadline_and_energy() {
        let prefs = prefs();
        let contexts = BTreeSet::new();
        let request = SlotRequest {
            minutes: 60,
            earliest: at(9, 0),
            deadline: Some(at(12, 0)),
            deep_work: true,
            contexts: &contexts,
        };
        assert!(request.admits(slot(10, 0, 11, 0), &prefs));
        // too short, low energy, past the deadline, before earliest
        assert!(!request.admits(slot(10, 0, 10, 30), &prefs));
        assert!(!request.admits(slot(9, 0, 10, 0), &prefs));
        assert!(!request.admits(slot(11, 30, 12, 30), &prefs));
        assert!(!request.starting_from(at(10, 30)).admits(slot(10, 0, 11, 0), &prefs));
    }
}
