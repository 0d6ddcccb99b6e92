//! Roster entries as supplied by the import collaborator.
//!
//! Entries are immutable once batched. A RosterBatch holds every entry for
//! exactly one Period and is replaced or cleared as a whole.

use crate::{
    normalize::NameNormalizer,
    period::Period,
    types::{ActionLabel, BranchName, FacilityId, PhysicianKey},
};
use chrono::{NaiveDate, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%d.%m.%Y", "%d/%m/%Y"];
const TIME_FORMATS: [&str; 2] = ["%H:%M", "%H:%M:%S"];

/// Minutes after midnight, or None for an unparseable clock string.
pub fn parse_clock_minutes(raw: &str) -> Option<u32> {
    let trimmed = raw.trim();
    TIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveTime::parse_from_str(trimmed, fmt).ok())
        .map(|t| t.hour() * 60 + t.minute())
}

pub fn parse_roster_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(trimmed, fmt).ok())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RosterEntry {
    pub physician_name:   String,
    /// Filled by RosterBatch through the injected normalizer.
    #[serde(default)]
    pub physician_key:    PhysicianKey,
    pub facility:         FacilityId,
    pub branch:           BranchName,
    pub action:           ActionLabel,
    pub date:             String,
    pub start_time:       String,
    pub duration_minutes: i32,
    #[serde(default)]
    pub capacity:         i64,
    pub year:             i32,
    pub month:            String,
}

impl RosterEntry {
    pub fn parsed_date(&self) -> Option<NaiveDate> {
        parse_roster_date(&self.date)
    }

    /// `[start, end)` in minutes after midnight. A malformed start time or
    /// a negative duration yields an empty span.
    pub fn span_minutes(&self) -> Option<(u32, u32)> {
        let start = parse_clock_minutes(&self.start_time)?;
        let duration = u32::try_from(self.duration_minutes).ok()?;
        Some((start, start + duration))
    }

    /// Overlap in minutes with the half-open window `[window_start, window_end)`.
    pub fn overlap_minutes(&self, window_start: u32, window_end: u32) -> u32 {
        match self.span_minutes() {
            Some((start, end)) => end.min(window_end).saturating_sub(start.max(window_start)),
            None => 0,
        }
    }
}

/// All roster entries for one facility and month.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RosterBatch {
    pub period:  Period,
    entries:     Vec<RosterEntry>,
}

impl RosterBatch {
    /// Keys every entry through `normalizer` so that roster and outcome
    /// data always join on the same function.
    pub fn new(period: Period, entries: Vec<RosterEntry>, normalizer: &dyn NameNormalizer) -> Self {
        let entries = entries
            .into_iter()
            .map(|mut e| {
                e.physician_key = normalizer.normalize(&e.physician_name);
                e
            })
            .collect();
        Self { period, entries }
    }

    pub fn empty(period: Period) -> Self {
        Self {
            period,
            entries: Vec::new(),
        }
    }

    pub fn entries(&self) -> &[RosterEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Bulk clear, keeping the period.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
