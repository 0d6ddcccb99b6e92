//! Externally supplied outcome counts.
//!
//! An OutcomeSet covers one facility and month. A missing set means
//! "not yet loaded" and is never read as zero; a physician missing from a
//! loaded set simply has no recorded outcomes.

use crate::{
    normalize::NameNormalizer,
    period::Period,
    types::PhysicianKey,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExamCounts {
    #[serde(default)]
    pub total:       Option<u32>,
    #[serde(default)]
    pub appointment: u32,
    #[serde(default)]
    pub walk_in:     u32,
}

impl ExamCounts {
    /// Reported total, or appointment + walk-in when no total was supplied.
    pub fn effective_total(&self) -> u32 {
        self.total.unwrap_or(self.appointment + self.walk_in)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeRecord {
    pub physician_name:      String,
    /// A/B/C-graded surgeries only.
    #[serde(default)]
    pub performed_surgeries: Option<u32>,
    #[serde(default)]
    pub exams:               Option<ExamCounts>,
}

/// Which outcome figure is joined against which planned-day vocabulary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    /// Surgery-labeled days against performed surgeries.
    #[default]
    Surgery,
    /// Outpatient-labeled days against total exams.
    Examination,
}

impl OutcomeKind {
    pub fn count(&self, record: &OutcomeRecord) -> u32 {
        match self {
            OutcomeKind::Surgery => record.performed_surgeries.unwrap_or(0),
            OutcomeKind::Examination => record
                .exams
                .map(|e| e.effective_total())
                .unwrap_or(0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeSet {
    pub period: Period,
    records:    HashMap<PhysicianKey, OutcomeRecord>,
}

impl OutcomeSet {
    /// Records sharing a key are merged by summing their counts.
    pub fn new(period: Period, records: Vec<OutcomeRecord>, normalizer: &dyn NameNormalizer) -> Self {
        let mut keyed: HashMap<PhysicianKey, OutcomeRecord> = HashMap::new();
        for record in records {
            let key = normalizer.normalize(&record.physician_name);
            match keyed.get_mut(&key) {
                Some(existing) => merge(existing, &record),
                None => {
                    keyed.insert(key, record);
                }
            }
        }
        Self { period, records: keyed }
    }

    pub fn get(&self, key: &str) -> Option<&OutcomeRecord> {
        self.records.get(key)
    }

    /// Outcome count for `key`, zero when the physician is absent from this set.
    pub fn count(&self, key: &str, kind: OutcomeKind) -> u32 {
        self.get(key).map(|r| kind.count(r)).unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

fn merge(into: &mut OutcomeRecord, other: &OutcomeRecord) {
    into.performed_surgeries = match (into.performed_surgeries, other.performed_surgeries) {
        (None, None) => None,
        (a, b) => Some(a.unwrap_or(0) + b.unwrap_or(0)),
    };
    into.exams = match (into.exams, other.exams) {
        (None, None) => None,
        (a, b) => {
            let a = a.unwrap_or_default();
            let b = b.unwrap_or_default();
            Some(ExamCounts {
                total:       Some(a.effective_total() + b.effective_total()),
                appointment: a.appointment + b.appointment,
                walk_in:     a.walk_in + b.walk_in,
            })
        }
    };
}
