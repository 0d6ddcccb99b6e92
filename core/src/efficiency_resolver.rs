//! Efficiency resolver: planned days joined with outcome counts.
//!
//! Per physician:
//!   planned days  = distinct dates with at least one surviving entry whose
//!                   action matches the planned-day vocabulary
//!   efficiency    = performed / planned days (undefined when planned = 0)
//!
//! Pooled figures:
//!   branch average = Σ performed / Σ planned over the branch's physicians
//!   peer average   = the same per branch, summed across every facility of
//!                    the canonical role group that has BOTH its roster and
//!                    its outcome set loaded for the exact period.
//!                    Partial facilities are skipped, never zero-filled.
//!
//! Reference efficiency = peer average (> 0) → local branch average → none.

use crate::{
    config::EngineConfig,
    ledger::DataLedger,
    normalize::{fold_label, ActionVocabulary},
    outcome::{OutcomeKind, OutcomeSet},
    period::{Period, YearMonth},
    roster::RosterBatch,
    session_classifier::{ClassifiedPeriod, SessionClassifier},
    types::{BranchName, FacilityId, PhysicianKey},
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

// ── Public types ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EfficiencyStatus {
    NoData,
    Low,
    High,
    Normal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DoctorEfficiencyRecord {
    pub physician_key:               PhysicianKey,
    pub display_name:                String,
    pub branch:                      BranchName,
    pub period:                      Period,
    pub planned_days:                u32,
    pub performed_count:             u32,
    /// None when planned_days = 0.
    pub efficiency:                  Option<f64>,
    pub branch_average:              Option<f64>,
    pub peer_average:                Option<f64>,
    pub reference_efficiency:        Option<f64>,
    pub facility_average:            Option<f64>,
    /// Physicians with planned days in the same branch, this one included.
    pub branch_physician_count:      u32,
    pub capacity_total:              i64,
    pub outpatient_capacity_per_day: Option<f64>,
    pub status:                      EfficiencyStatus,
}

impl DoctorEfficiencyRecord {
    /// Undefined efficiency reads as zero in numeric contexts.
    pub fn efficiency_or_zero(&self) -> f64 {
        self.efficiency.unwrap_or(0.0)
    }
}

/// Pooled performed/planned sums for one branch (or a whole facility).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PooledEfficiency {
    pub label:        String,
    pub physicians:   u32,
    pub performed:    u64,
    pub planned_days: u64,
}

impl PooledEfficiency {
    fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..Self::default()
        }
    }

    fn add(&mut self, planned_days: u32, performed: u32) {
        self.performed += u64::from(performed);
        self.planned_days += u64::from(planned_days);
        if planned_days > 0 {
            self.physicians += 1;
        }
    }

    /// None when nothing was planned.
    pub fn average(&self) -> Option<f64> {
        (self.planned_days > 0).then(|| self.performed as f64 / self.planned_days as f64)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeerGroupSummary {
    pub tier:               String,
    pub month:              YearMonth,
    /// Every facility in the canonical tier, the requesting one included.
    pub total_facilities:   usize,
    pub pooled_facilities:  Vec<FacilityId>,
    pub skipped_facilities: Vec<FacilityId>,
    /// Keyed by folded branch name.
    pub branches:           BTreeMap<String, PooledEfficiency>,
}

impl PeerGroupSummary {
    pub fn pooled_count(&self) -> usize {
        self.pooled_facilities.len()
    }

    pub fn branch_average(&self, branch: &str) -> Option<f64> {
        self.branches.get(&fold_label(branch)).and_then(PooledEfficiency::average)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BranchPeerRow {
    pub branch:        BranchName,
    pub local_average: Option<f64>,
    pub peer_average:  Option<f64>,
    /// local − peer, when both are defined.
    pub delta:         Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EfficiencyReport {
    pub period:   Period,
    pub kind:     OutcomeKind,
    pub records:  Vec<DoctorEfficiencyRecord>,
    /// Keyed by folded branch name.
    pub branches: BTreeMap<String, PooledEfficiency>,
    pub facility: PooledEfficiency,
    pub peer:     Option<PeerGroupSummary>,
}

impl EfficiencyReport {
    pub fn branch_vs_peer(&self) -> Vec<BranchPeerRow> {
        self.branches
            .iter()
            .map(|(folded, local)| {
                let local_average = local.average();
                let peer_average = self
                    .peer
                    .as_ref()
                    .and_then(|p| p.branches.get(folded))
                    .and_then(PooledEfficiency::average);
                BranchPeerRow {
                    branch: local.label.clone(),
                    local_average,
                    peer_average,
                    delta: local_average.zip(peer_average).map(|(l, p)| l - p),
                }
            })
            .collect()
    }

    pub fn by_status(&self, status: EfficiencyStatus) -> impl Iterator<Item = &DoctorEfficiencyRecord> {
        self.records.iter().filter(move |r| r.status == status)
    }
}

/// Per-physician inputs before pooling.
#[derive(Debug, Clone, PartialEq)]
pub struct PhysicianWorkload {
    pub physician_key:   PhysicianKey,
    pub display_name:    String,
    pub branch:          BranchName,
    pub planned_days:    u32,
    pub performed:       u32,
    pub capacity_total:  i64,
    pub clinic_days:     u32,
    pub clinic_capacity: i64,
}

impl PhysicianWorkload {
    pub fn capacity_per_clinic_day(&self) -> Option<f64> {
        (self.clinic_days > 0).then(|| self.clinic_capacity as f64 / f64::from(self.clinic_days))
    }
}

// ── Sorting ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EfficiencySortKey {
    PlannedDays,
    PerformedCount,
    Efficiency,
    BranchAverage,
    PeerAverage,
    ReferenceEfficiency,
    CapacityTotal,
}

impl EfficiencySortKey {
    pub fn value(&self, record: &DoctorEfficiencyRecord) -> Option<f64> {
        match self {
            Self::PlannedDays => Some(f64::from(record.planned_days)),
            Self::PerformedCount => Some(f64::from(record.performed_count)),
            Self::Efficiency => record.efficiency,
            Self::BranchAverage => record.branch_average,
            Self::PeerAverage => record.peer_average,
            Self::ReferenceEfficiency => record.reference_efficiency,
            Self::CapacityTotal => Some(record.capacity_total as f64),
        }
    }
}

/// Sort by a numeric field. Undefined values always go last; equal values
/// keep physician-key order so the result is stable across runs.
pub fn sort_records(records: &mut [DoctorEfficiencyRecord], key: EfficiencySortKey, descending: bool) {
    records.sort_by(|a, b| {
        let ord = match (key.value(a), key.value(b)) {
            (Some(x), Some(y)) => {
                let o = x.total_cmp(&y);
                if descending { o.reverse() } else { o }
            }
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        ord.then_with(|| a.physician_key.cmp(&b.physician_key))
    });
}

// ── Resolver ─────────────────────────────────────────────────────────────────

pub struct EfficiencyResolver<'a> {
    config: &'a EngineConfig,
    kind:   OutcomeKind,
}

impl<'a> EfficiencyResolver<'a> {
    pub fn new(config: &'a EngineConfig, kind: OutcomeKind) -> Self {
        Self { config, kind }
    }

    fn planned_vocabulary(&self) -> &ActionVocabulary {
        match self.kind {
            OutcomeKind::Surgery => &self.config.vocabulary.surgery,
            OutcomeKind::Examination => &self.config.vocabulary.outpatient,
        }
    }

    /// Distinct calendar dates per physician with a surviving entry whose
    /// action matches `vocabulary`, plus the capacity of those entries.
    fn dated_activity(
        &self,
        batch: &RosterBatch,
        vocabulary: &ActionVocabulary,
    ) -> BTreeMap<PhysicianKey, (BTreeSet<NaiveDate>, i64)> {
        let classifier = SessionClassifier::new(self.config);
        let mut out: BTreeMap<PhysicianKey, (BTreeSet<NaiveDate>, i64)> = BTreeMap::new();
        for entry in classifier.surviving(batch.entries()) {
            if !vocabulary.matches(&entry.action) {
                continue;
            }
            let Some(date) = entry.parsed_date() else { continue };
            let slot = out.entry(entry.physician_key.clone()).or_default();
            slot.0.insert(date);
            slot.1 += entry.capacity;
        }
        out
    }

    /// Planned days per physician: distinct dates, not duration or entry count.
    pub fn planned_days(&self, batch: &RosterBatch) -> BTreeMap<PhysicianKey, u32> {
        self.dated_activity(batch, self.planned_vocabulary())
            .into_iter()
            .map(|(key, (dates, _))| (key, dates.len() as u32))
            .collect()
    }

    pub fn workloads(
        &self,
        classified: &ClassifiedPeriod,
        batch: &RosterBatch,
        outcomes: &OutcomeSet,
    ) -> Vec<PhysicianWorkload> {
        let planned = self.planned_days(batch);
        let clinic = self.dated_activity(batch, &self.config.vocabulary.outpatient);

        classified
            .physicians
            .values()
            .map(|profile| {
                let key = &profile.physician_key;
                let (clinic_days, clinic_capacity) = clinic
                    .get(key)
                    .map(|(dates, cap)| (dates.len() as u32, *cap))
                    .unwrap_or((0, 0));
                PhysicianWorkload {
                    physician_key: key.clone(),
                    display_name: profile.display_name.clone(),
                    branch: profile.branch.clone(),
                    planned_days: planned.get(key).copied().unwrap_or(0),
                    performed: outcomes.count(key, self.kind),
                    capacity_total: profile.capacity_total,
                    clinic_days,
                    clinic_capacity,
                }
            })
            .collect()
    }

    fn pool_branches(workloads: &[PhysicianWorkload], into: &mut BTreeMap<String, PooledEfficiency>) {
        for w in workloads {
            into.entry(fold_label(&w.branch))
                .or_insert_with(|| PooledEfficiency::new(w.branch.clone()))
                .add(w.planned_days, w.performed);
        }
    }

    /// Pool every facility of `members` whose roster and outcomes are both
    /// loaded for `month`.
    pub fn pool_peers(
        &self,
        tier: &str,
        members: &[FacilityId],
        month: YearMonth,
        ledger: &DataLedger,
    ) -> PeerGroupSummary {
        let classifier = SessionClassifier::new(self.config);
        let mut summary = PeerGroupSummary {
            tier: tier.to_string(),
            month,
            total_facilities: members.len(),
            pooled_facilities: Vec::new(),
            skipped_facilities: Vec::new(),
            branches: BTreeMap::new(),
        };

        for facility in members {
            let period = Period::new(facility.clone(), month);
            let (Some(batch), Some(outcomes)) = (ledger.roster(&period), ledger.outcomes(&period)) else {
                summary.skipped_facilities.push(facility.clone());
                continue;
            };
            let classified = match classifier.classify_period(batch) {
                Ok(c) => c,
                Err(e) => {
                    log::warn!("resolver: peer {period} excluded from pooling: {e}");
                    summary.skipped_facilities.push(facility.clone());
                    continue;
                }
            };
            let workloads = self.workloads(&classified, batch, outcomes);
            Self::pool_branches(&workloads, &mut summary.branches);
            summary.pooled_facilities.push(facility.clone());
        }

        log::info!(
            "resolver: tier {tier} {month}: pooled {}/{} facilities",
            summary.pooled_count(),
            summary.total_facilities
        );
        summary
    }

    pub fn status(&self, efficiency: Option<f64>, reference: Option<f64>, planned: u32, performed: u32) -> EfficiencyStatus {
        if planned == 0 && performed == 0 {
            return EfficiencyStatus::NoData;
        }
        let thresholds = &self.config.status;
        match (efficiency, reference) {
            (Some(eff), Some(r)) if r > 0.0 && eff < thresholds.low_multiplier * r => EfficiencyStatus::Low,
            (Some(eff), Some(r)) if r > 0.0 && eff > thresholds.high_multiplier * r => EfficiencyStatus::High,
            _ => EfficiencyStatus::Normal,
        }
    }

    pub fn resolve(
        &self,
        classified: &ClassifiedPeriod,
        batch: &RosterBatch,
        outcomes: &OutcomeSet,
        peer: Option<PeerGroupSummary>,
    ) -> EfficiencyReport {
        let workloads = self.workloads(classified, batch, outcomes);

        let mut branches = BTreeMap::new();
        Self::pool_branches(&workloads, &mut branches);
        let mut facility = PooledEfficiency::new(batch.period.facility.clone());
        for w in &workloads {
            facility.add(w.planned_days, w.performed);
        }
        let facility_average = facility.average();

        let records = workloads
            .iter()
            .map(|w| {
                let folded = fold_label(&w.branch);
                let branch_pool = branches.get(&folded);
                let branch_average = branch_pool.and_then(PooledEfficiency::average);
                let peer_average = peer.as_ref().and_then(|p| p.branch_average(&w.branch));
                let reference_efficiency = peer_average.filter(|a| *a > 0.0).or(branch_average);
                let efficiency =
                    (w.planned_days > 0).then(|| f64::from(w.performed) / f64::from(w.planned_days));

                DoctorEfficiencyRecord {
                    physician_key: w.physician_key.clone(),
                    display_name: w.display_name.clone(),
                    branch: w.branch.clone(),
                    period: batch.period.clone(),
                    planned_days: w.planned_days,
                    performed_count: w.performed,
                    efficiency,
                    branch_average,
                    peer_average,
                    reference_efficiency,
                    facility_average,
                    branch_physician_count: branch_pool.map(|b| b.physicians).unwrap_or(0),
                    capacity_total: w.capacity_total,
                    outpatient_capacity_per_day: w.capacity_per_clinic_day(),
                    status: self.status(efficiency, reference_efficiency, w.planned_days, w.performed),
                }
            })
            .collect::<Vec<_>>();

        let unmatched = outcomes.len().saturating_sub(
            records.iter().filter(|r| outcomes.get(&r.physician_key).is_some()).count(),
        );
        if unmatched > 0 {
            log::debug!("resolver: {} has {unmatched} outcome records with no roster match", batch.period);
        }

        EfficiencyReport {
            period: batch.period.clone(),
            kind: self.kind,
            records,
            branches,
            facility,
            peer,
        }
    }
}
