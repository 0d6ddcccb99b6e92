//! Session classifier: roster entries to half-day activity labels.
//!
//! For one physician on one calendar date, each session window (morning,
//! afternoon) gets at most one winning action:
//!   1. Holiday entries are dropped before anything else.
//!   2. Result/control exam entries are excluded from classification
//!      (their capacity still counts toward the physician's total).
//!   3. Per window, overlap minutes are summed per action.
//!   4. Actions below the minimum overlap are discarded.
//!   5. The largest total wins; ties go to the action whose contributing
//!      entry starts earliest, then to the lexically smaller label.
//!
//! Classification is pure and independent of entry order.

use crate::{
    config::{EngineConfig, SessionConfig, VocabularyConfig},
    error::{RosterError, RosterResult},
    period::Period,
    roster::{RosterBatch, RosterEntry},
    types::{ActionLabel, BranchName, DayCount, PhysicianKey},
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Day credit carried by one winning session window.
pub const HALF_DAY: DayCount = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Session {
    Morning,
    Afternoon,
}

/// How an entry participates in classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryDisposition {
    Holiday,
    ResultExam,
    Classified,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HalfDayClassification {
    pub physician_key:   PhysicianKey,
    pub date:            NaiveDate,
    pub session:         Session,
    pub action:          Option<ActionLabel>,
    pub overlap_minutes: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayClassification {
    pub physician_key: PhysicianKey,
    pub date:          NaiveDate,
    pub morning:       Option<ActionLabel>,
    pub afternoon:     Option<ActionLabel>,
}

impl DayClassification {
    /// (action, 0.5) for every window with a winner.
    pub fn contributions(&self) -> impl Iterator<Item = (&ActionLabel, DayCount)> {
        self.morning
            .iter()
            .chain(self.afternoon.iter())
            .map(|action| (action, HALF_DAY))
    }
}

/// Everything classified for one physician in one period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhysicianPeriod {
    pub physician_key:  PhysicianKey,
    pub display_name:   String,
    pub branch:         BranchName,
    /// Sorted by date.
    pub days:           Vec<DayClassification>,
    /// Capacity of every non-holiday entry, result/control exams included.
    pub capacity_total: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedPeriod {
    pub period:     Period,
    pub physicians: BTreeMap<PhysicianKey, PhysicianPeriod>,
}

#[derive(Debug, Clone, Copy)]
struct WindowCandidate {
    minutes:        u32,
    earliest_start: u32,
}

pub struct SessionClassifier<'a> {
    sessions:   &'a SessionConfig,
    vocabulary: &'a VocabularyConfig,
}

impl<'a> SessionClassifier<'a> {
    pub fn new(config: &'a EngineConfig) -> Self {
        Self {
            sessions:   &config.sessions,
            vocabulary: &config.vocabulary,
        }
    }

    pub fn disposition(&self, entry: &RosterEntry) -> EntryDisposition {
        if self.vocabulary.holiday.matches(&entry.action) {
            EntryDisposition::Holiday
        } else if self.vocabulary.result_exam.matches(&entry.action) {
            EntryDisposition::ResultExam
        } else {
            EntryDisposition::Classified
        }
    }

    /// Entries that survive both exclusion lists.
    pub fn surviving<'b>(&'b self, entries: &'b [RosterEntry]) -> impl Iterator<Item = &'b RosterEntry> + 'b {
        entries
            .iter()
            .filter(move |e| self.disposition(e) == EntryDisposition::Classified)
    }

    /// Winner for one window among entries already known to share a
    /// physician and date. Returns the action and its summed overlap.
    pub fn window_winner<'b, I>(&self, entries: I, window_start: u32, window_end: u32) -> Option<(ActionLabel, u32)>
    where
        I: IntoIterator<Item = &'b RosterEntry>,
    {
        let mut candidates: BTreeMap<&str, WindowCandidate> = BTreeMap::new();
        for entry in entries {
            if self.disposition(entry) != EntryDisposition::Classified {
                continue;
            }
            let minutes = entry.overlap_minutes(window_start, window_end);
            let Some((start, _)) = entry.span_minutes() else { continue };
            if minutes == 0 {
                continue;
            }
            let slot = candidates
                .entry(entry.action.trim())
                .or_insert(WindowCandidate { minutes: 0, earliest_start: start });
            slot.minutes += minutes;
            slot.earliest_start = slot.earliest_start.min(start);
        }

        // BTreeMap iteration is label-ordered, so a strict comparison keeps
        // the lexically smaller label on a full tie.
        let mut best: Option<(&str, WindowCandidate)> = None;
        for (action, cand) in candidates {
            if cand.minutes < self.sessions.min_overlap_minutes {
                continue;
            }
            let better = match best {
                None => true,
                Some((_, current)) => {
                    cand.minutes > current.minutes
                        || (cand.minutes == current.minutes && cand.earliest_start < current.earliest_start)
                }
            };
            if better {
                best = Some((action, cand));
            }
        }
        best.map(|(action, cand)| (action.to_string(), cand.minutes))
    }

    /// Both half-day classifications for a single physician and date.
    pub fn classify_half_days(&self, entries: &[RosterEntry]) -> RosterResult<[HalfDayClassification; 2]> {
        let (physician_key, date) = single_physician_day(entries)?;
        let s = self.sessions;
        let make = |session, window: Option<(ActionLabel, u32)>| {
            let (action, overlap_minutes) = match window {
                Some((a, m)) => (Some(a), m),
                None => (None, 0),
            };
            HalfDayClassification {
                physician_key: physician_key.clone(),
                date,
                session,
                action,
                overlap_minutes,
            }
        };
        Ok([
            make(Session::Morning, self.window_winner(entries, s.morning_start, s.morning_end)),
            make(Session::Afternoon, self.window_winner(entries, s.afternoon_start, s.afternoon_end)),
        ])
    }

    /// Day classification for a single physician and date.
    pub fn classify_day(&self, entries: &[RosterEntry]) -> RosterResult<DayClassification> {
        let [morning, afternoon] = self.classify_half_days(entries)?;
        Ok(DayClassification {
            physician_key: morning.physician_key,
            date:          morning.date,
            morning:       morning.action,
            afternoon:     afternoon.action,
        })
    }

    /// Classify a whole batch, grouping by physician and date.
    pub fn classify_period(&self, batch: &RosterBatch) -> RosterResult<ClassifiedPeriod> {
        reject_negative_durations(batch.entries())?;

        let mut grouped: BTreeMap<(PhysicianKey, NaiveDate), Vec<RosterEntry>> = BTreeMap::new();
        let mut profiles: BTreeMap<PhysicianKey, ProfileTally> = BTreeMap::new();
        let mut skipped_dates = 0usize;

        for entry in batch.entries() {
            if self.disposition(entry) == EntryDisposition::Holiday {
                continue;
            }
            let tally = profiles.entry(entry.physician_key.clone()).or_default();
            tally.capacity += entry.capacity;
            *tally.names.entry(entry.physician_name.trim().to_string()).or_default() += 1;
            *tally.branches.entry(entry.branch.trim().to_string()).or_default() += 1;

            match entry.parsed_date() {
                Some(date) => grouped
                    .entry((entry.physician_key.clone(), date))
                    .or_default()
                    .push(entry.clone()),
                None => skipped_dates += 1,
            }
        }
        if skipped_dates > 0 {
            log::debug!(
                "classifier: {} skipped {skipped_dates} entries with unparseable dates",
                batch.period
            );
        }

        let mut days_by_physician: HashMap<PhysicianKey, Vec<DayClassification>> = HashMap::new();
        for ((key, _), entries) in &grouped {
            let day = self.classify_day(entries)?;
            if day.morning.is_some() || day.afternoon.is_some() {
                days_by_physician.entry(key.clone()).or_default().push(day);
            }
        }

        let physicians = profiles
            .into_iter()
            .map(|(key, tally)| {
                let days = days_by_physician.remove(&key).unwrap_or_default();
                let profile = PhysicianPeriod {
                    physician_key:  key.clone(),
                    display_name:   most_frequent(&tally.names),
                    branch:         most_frequent(&tally.branches),
                    days,
                    capacity_total: tally.capacity,
                };
                (key, profile)
            })
            .collect();

        Ok(ClassifiedPeriod {
            period: batch.period.clone(),
            physicians,
        })
    }
}

#[derive(Debug, Default)]
struct ProfileTally {
    capacity: i64,
    names:    BTreeMap<String, u32>,
    branches: BTreeMap<String, u32>,
}

/// Highest count wins; ties go to the lexically smaller value.
fn most_frequent(counts: &BTreeMap<String, u32>) -> String {
    let mut best: Option<(&String, u32)> = None;
    for (value, &count) in counts {
        if best.map_or(true, |(_, c)| count > c) {
            best = Some((value, count));
        }
    }
    best.map(|(v, _)| v.clone()).unwrap_or_default()
}

pub(crate) fn reject_negative_durations(entries: &[RosterEntry]) -> RosterResult<()> {
    match entries.iter().find(|e| e.duration_minutes < 0) {
        Some(e) => Err(RosterError::NegativeDuration {
            physician: e.physician_name.clone(),
            date:      e.date.clone(),
            minutes:   e.duration_minutes,
        }),
        None => Ok(()),
    }
}

fn single_physician_day(entries: &[RosterEntry]) -> RosterResult<(PhysicianKey, NaiveDate)> {
    reject_negative_durations(entries)?;
    let physicians: BTreeSet<&str> = entries.iter().map(|e| e.physician_key.as_str()).collect();
    let dates: BTreeSet<Option<NaiveDate>> = entries.iter().map(|e| e.parsed_date()).collect();

    match (physicians.iter().next(), dates.iter().next()) {
        (Some(key), Some(Some(date))) if physicians.len() == 1 && dates.len() == 1 => {
            Ok((key.to_string(), *date))
        }
        _ => Err(RosterError::MixedClassificationBatch {
            physicians: physicians.len(),
            dates:      dates.len(),
        }),
    }
}
