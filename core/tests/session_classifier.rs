mod common;

use common::{batch, entry, period, with_capacity, FACILITY};
use roster_core::{
    config::EngineConfig,
    error::RosterError,
    session_classifier::{EntryDisposition, Session, SessionClassifier},
};

// ── Helpers ──────────────────────────────────────────────────────────────────

const DATE: &str = "2024-03-04";

fn classify(entries: Vec<roster_core::roster::RosterEntry>) -> (Option<String>, Option<String>) {
    let config = EngineConfig::default();
    let classifier = SessionClassifier::new(&config);
    let b = batch(period(FACILITY), entries);
    let day = classifier.classify_day(b.entries()).unwrap();
    (day.morning, day.afternoon)
}

// ── Window thresholds ────────────────────────────────────────────────────────

/// An action with fewer than 30 overlapping minutes never wins, even alone.
#[test]
fn short_overlap_never_wins_a_window() {
    let (morning, afternoon) = classify(vec![entry("Ali Kaya", "Surgery", "Surgery", DATE, "08:00", 29)]);
    assert_eq!(morning, None, "29 minutes must stay below the threshold");
    assert_eq!(afternoon, None);
}

#[test]
fn exactly_minimum_overlap_wins() {
    let (morning, _) = classify(vec![entry("Ali Kaya", "Surgery", "Surgery", DATE, "11:30", 30)]);
    assert_eq!(morning.as_deref(), Some("Surgery"));
}

/// An entry that ends just inside the afternoon window only contributes the
/// part that overlaps; 11:45 + 60 min reaches 12:45, before the 13:00 start.
#[test]
fn overlap_is_clipped_to_each_window() {
    let (morning, afternoon) = classify(vec![entry("Ali Kaya", "Surgery", "Surgery", DATE, "11:45", 60)]);
    assert_eq!(morning, None, "only 15 minutes overlap the morning");
    assert_eq!(afternoon, None, "nothing overlaps the afternoon");
}

#[test]
fn long_entry_wins_both_windows() {
    let (morning, afternoon) = classify(vec![entry("Ali Kaya", "Surgery", "Surgery", DATE, "08:00", 540)]);
    assert_eq!(morning.as_deref(), Some("Surgery"));
    assert_eq!(afternoon.as_deref(), Some("Surgery"));
}

// ── Winner selection ─────────────────────────────────────────────────────────

/// Overlap minutes are summed per action before comparing.
#[test]
fn minutes_are_summed_per_action() {
    let (morning, _) = classify(vec![
        entry("Ali Kaya", "Surgery", "Clinic", DATE, "08:00", 30),
        entry("Ali Kaya", "Surgery", "Surgery", DATE, "09:00", 45),
        entry("Ali Kaya", "Surgery", "Clinic", DATE, "10:00", 30),
    ]);
    assert_eq!(morning.as_deref(), Some("Clinic"), "60 summed minutes beat 45");
}

/// Equal minutes resolve to the action whose entry starts earliest.
#[test]
fn tie_goes_to_earliest_start() {
    let (morning, _) = classify(vec![
        entry("Ali Kaya", "Surgery", "Surgery", DATE, "10:00", 60),
        entry("Ali Kaya", "Surgery", "Clinic", DATE, "08:00", 60),
    ]);
    assert_eq!(morning.as_deref(), Some("Clinic"));
}

#[test]
fn full_tie_goes_to_smaller_label() {
    let (morning, _) = classify(vec![
        entry("Ali Kaya", "Surgery", "Ward round", DATE, "08:00", 60),
        entry("Ali Kaya", "Surgery", "Clinic", DATE, "08:00", 60),
    ]);
    assert_eq!(morning.as_deref(), Some("Clinic"));
}

/// Labels differing only in surrounding whitespace count as one action.
#[test]
fn labels_are_trimmed_before_grouping() {
    let (morning, _) = classify(vec![
        entry("Ali Kaya", "Surgery", "Clinic ", DATE, "08:00", 20),
        entry("Ali Kaya", "Surgery", " Clinic", DATE, "09:00", 20),
    ]);
    assert_eq!(morning.as_deref(), Some("Clinic"), "20 + 20 minutes reach the threshold together");
}

// ── Exclusions ───────────────────────────────────────────────────────────────

#[test]
fn dispositions_follow_vocabularies() {
    let config = EngineConfig::default();
    let classifier = SessionClassifier::new(&config);
    let holiday = entry("Ali Kaya", "Surgery", "Bayram tatili", DATE, "08:00", 540);
    let result = entry("Ali Kaya", "Surgery", "Sonuç değerlendirme", DATE, "08:00", 60);
    let control = entry("Ali Kaya", "Surgery", "Control exam", DATE, "08:00", 60);
    let surgery = entry("Ali Kaya", "Surgery", "Ameliyat", DATE, "08:00", 60);

    assert_eq!(classifier.disposition(&holiday), EntryDisposition::Holiday);
    assert_eq!(classifier.disposition(&result), EntryDisposition::ResultExam);
    assert_eq!(classifier.disposition(&control), EntryDisposition::ResultExam);
    assert_eq!(classifier.disposition(&surgery), EntryDisposition::Classified);
}

/// Result/control exams never win a window but their capacity still counts.
#[test]
fn result_exam_counts_capacity_but_not_days() {
    let config = EngineConfig::default();
    let classifier = SessionClassifier::new(&config);
    let b = batch(
        period(FACILITY),
        vec![
            with_capacity(entry("Ali Kaya", "Surgery", "Result exam", DATE, "08:00", 240), 12),
            with_capacity(entry("Ali Kaya", "Surgery", "Clinic", DATE, "13:00", 240), 20),
        ],
    );
    let classified = classifier.classify_period(&b).unwrap();
    let profile = &classified.physicians["ALİ KAYA"];

    assert_eq!(profile.capacity_total, 32);
    assert_eq!(profile.days.len(), 1);
    assert_eq!(profile.days[0].morning, None);
    assert_eq!(profile.days[0].afternoon.as_deref(), Some("Clinic"));
}

#[test]
fn holidays_contribute_nothing() {
    let config = EngineConfig::default();
    let classifier = SessionClassifier::new(&config);
    let b = batch(
        period(FACILITY),
        vec![with_capacity(entry("Ali Kaya", "Surgery", "Holiday", DATE, "08:00", 540), 40)],
    );
    let classified = classifier.classify_period(&b).unwrap();
    assert!(classified.physicians.is_empty(), "holiday-only physicians have no profile");
}

// ── Data quality ─────────────────────────────────────────────────────────────

#[test]
fn malformed_start_time_contributes_nothing() {
    let (morning, afternoon) = classify(vec![
        entry("Ali Kaya", "Surgery", "Surgery", DATE, "8h", 240),
        entry("Ali Kaya", "Surgery", "Clinic", DATE, "13:00", 60),
    ]);
    assert_eq!(morning, None);
    assert_eq!(afternoon.as_deref(), Some("Clinic"));
}

#[test]
fn clock_formats_are_accepted() {
    let (morning, afternoon) = classify(vec![
        entry("Ali Kaya", "Surgery", "Surgery", DATE, "8:00", 60),
        entry("Ali Kaya", "Surgery", "Clinic", DATE, "13:00:00", 60),
    ]);
    assert_eq!(morning.as_deref(), Some("Surgery"));
    assert_eq!(afternoon.as_deref(), Some("Clinic"));
}

#[test]
fn negative_duration_is_rejected() {
    let config = EngineConfig::default();
    let classifier = SessionClassifier::new(&config);
    let b = batch(period(FACILITY), vec![entry("Ali Kaya", "Surgery", "Surgery", DATE, "08:00", -30)]);
    match classifier.classify_period(&b) {
        Err(RosterError::NegativeDuration { minutes, .. }) => assert_eq!(minutes, -30),
        other => panic!("expected NegativeDuration, got {other:?}"),
    }
}

#[test]
fn half_day_batch_must_share_physician_and_date() {
    let config = EngineConfig::default();
    let classifier = SessionClassifier::new(&config);
    let b = batch(
        period(FACILITY),
        vec![
            entry("Ali Kaya", "Surgery", "Surgery", DATE, "08:00", 60),
            entry("Ali Kaya", "Surgery", "Surgery", "2024-03-05", "08:00", 60),
        ],
    );
    let err = classifier.classify_half_days(b.entries()).unwrap_err();
    assert!(
        matches!(err, RosterError::MixedClassificationBatch { physicians: 1, dates: 2 }),
        "got {err:?}"
    );
}

#[test]
fn half_days_report_overlap_minutes() {
    let config = EngineConfig::default();
    let classifier = SessionClassifier::new(&config);
    let b = batch(period(FACILITY), vec![entry("Ali Kaya", "Surgery", "Surgery", DATE, "10:00", 240)]);
    let [morning, afternoon] = classifier.classify_half_days(b.entries()).unwrap();

    assert_eq!(morning.session, Session::Morning);
    assert_eq!(morning.overlap_minutes, 120);
    assert_eq!(afternoon.session, Session::Afternoon);
    assert_eq!(afternoon.overlap_minutes, 60);
    assert_eq!(afternoon.action.as_deref(), Some("Surgery"));
}

// ── Period classification ────────────────────────────────────────────────────

/// Name variants collapse onto one key; display name and branch take the
/// most frequent spelling.
#[test]
fn period_groups_by_normalized_name() {
    let config = EngineConfig::default();
    let classifier = SessionClassifier::new(&config);
    let b = batch(
        period(FACILITY),
        vec![
            entry("Ayşe Yılmaz", "General Surgery", "Surgery", "2024-03-04", "08:00", 540),
            entry("AYŞE  YILMAZ", "General Surgery", "Surgery", "05.03.2024", "08:00", 540),
            entry("Ayşe Yılmaz", "Gen. Surgery", "Clinic", "06/03/2024", "08:00", 240),
        ],
    );
    let classified = classifier.classify_period(&b).unwrap();

    assert_eq!(classified.physicians.len(), 1);
    let profile = classified.physicians.values().next().unwrap();
    assert_eq!(profile.physician_key, "AYŞE YILMAZ");
    assert_eq!(profile.display_name, "Ayşe Yılmaz");
    assert_eq!(profile.branch, "General Surgery");
    assert_eq!(profile.days.len(), 3, "all three date formats parse");
    assert!(profile.days.windows(2).all(|w| w[0].date < w[1].date), "days sorted by date");
}

#[test]
fn unparseable_dates_are_skipped() {
    let config = EngineConfig::default();
    let classifier = SessionClassifier::new(&config);
    let b = batch(
        period(FACILITY),
        vec![
            with_capacity(entry("Ali Kaya", "Surgery", "Surgery", "soon", "08:00", 540), 5),
            entry("Ali Kaya", "Surgery", "Surgery", DATE, "08:00", 540),
        ],
    );
    let classified = classifier.classify_period(&b).unwrap();
    let profile = &classified.physicians["ALİ KAYA"];
    assert_eq!(profile.days.len(), 1);
    assert_eq!(profile.capacity_total, 5, "capacity does not depend on the date parsing");
}
