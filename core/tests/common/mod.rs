#![allow(dead_code)]

use roster_core::{
    efficiency_resolver::{DoctorEfficiencyRecord, EfficiencyStatus},
    normalize::DefaultNormalizer,
    outcome::{ExamCounts, OutcomeRecord, OutcomeSet},
    period::{Period, YearMonth},
    roster::{RosterBatch, RosterEntry},
};

pub const FACILITY: &str = "F1";

/// Route library logs to the test harness; RUST_LOG=debug shows them.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn march() -> YearMonth {
    YearMonth::new(2024, 3).unwrap()
}

pub fn period(facility: &str) -> Period {
    Period::new(facility, march())
}

/// A roster entry in facility F1, March 2024, with zero capacity.
pub fn entry(name: &str, branch: &str, action: &str, date: &str, start: &str, minutes: i32) -> RosterEntry {
    RosterEntry {
        physician_name:   name.to_string(),
        physician_key:    String::new(),
        facility:         FACILITY.to_string(),
        branch:           branch.to_string(),
        action:           action.to_string(),
        date:             date.to_string(),
        start_time:       start.to_string(),
        duration_minutes: minutes,
        capacity:         0,
        year:             2024,
        month:            "March".to_string(),
    }
}

pub fn with_capacity(mut e: RosterEntry, capacity: i64) -> RosterEntry {
    e.capacity = capacity;
    e
}

/// A full surgery day (both windows) for one physician.
pub fn surgery_day(name: &str, branch: &str, date: &str) -> RosterEntry {
    entry(name, branch, "Surgery", date, "08:00", 540)
}

pub fn batch(period: Period, entries: Vec<RosterEntry>) -> RosterBatch {
    RosterBatch::new(period, entries, &DefaultNormalizer)
}

pub fn surgeries(name: &str, count: u32) -> OutcomeRecord {
    OutcomeRecord {
        physician_name:      name.to_string(),
        performed_surgeries: Some(count),
        exams:               None,
    }
}

pub fn exams(name: &str, appointment: u32, walk_in: u32) -> OutcomeRecord {
    OutcomeRecord {
        physician_name:      name.to_string(),
        performed_surgeries: None,
        exams:               Some(ExamCounts {
            total: None,
            appointment,
            walk_in,
        }),
    }
}

pub fn outcomes(period: Period, records: Vec<OutcomeRecord>) -> OutcomeSet {
    OutcomeSet::new(period, records, &DefaultNormalizer)
}

/// `days` consecutive March dates starting on the 1st, as YYYY-MM-DD.
pub fn march_dates(days: u32) -> Vec<String> {
    (1..=days).map(|d| format!("2024-03-{d:02}")).collect()
}

/// An efficiency record with every optional figure unset. Callers fill
/// in what the case under test needs.
pub fn record(key: &str, branch: &str, planned_days: u32, performed: u32) -> DoctorEfficiencyRecord {
    DoctorEfficiencyRecord {
        physician_key:               key.to_string(),
        display_name:                key.to_string(),
        branch:                      branch.to_string(),
        period:                      period(FACILITY),
        planned_days,
        performed_count:             performed,
        efficiency:                  (planned_days > 0).then(|| f64::from(performed) / f64::from(planned_days)),
        branch_average:              None,
        peer_average:                None,
        reference_efficiency:        None,
        facility_average:            None,
        branch_physician_count:      1,
        capacity_total:              0,
        outpatient_capacity_per_day: None,
        status:                      EfficiencyStatus::Normal,
    }
}
