//! The analytics engine: one period in, one report out.
//!
//! EXECUTION ORDER (fixed, documented, never reordered):
//!   1. Request validation     (facility selected, period parseable)
//!   2. Session classifier     (entries → half-day labels)
//!   3. Activity aggregator    (half-days → totals, optional month-over-month)
//!   4. Peer pooling           (optional, reads sibling data already in the ledger)
//!   5. Efficiency resolver    (planned days × outcomes → records)
//!   6. Reduction policy       (records → proposals)
//!
//! RULES:
//!   - Every stage reads immutable snapshots; nothing writes to the ledger.
//!   - Data gaps degrade the report, they never fail it.
//!   - Structurally invalid requests fail before any stage runs.

use crate::{
    activity_aggregator::{ActivityAggregator, ActivityTotals, PeriodComparison},
    config::EngineConfig,
    efficiency_resolver::{EfficiencyReport, EfficiencyResolver},
    error::{RosterError, RosterResult},
    ledger::DataLedger,
    normalize::{DefaultNormalizer, NameNormalizer},
    outcome::{OutcomeKind, OutcomeRecord, OutcomeSet},
    period::{Period, YearMonth},
    reduction_policy::{PolicyChoice, ReductionPlan, ReductionPolicy},
    role_group::RoleGroupDirectory,
    roster::{RosterBatch, RosterEntry},
    session_classifier::{ClassifiedPeriod, SessionClassifier},
    types::FacilityId,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub facility:         Option<FacilityId>,
    pub year:             i32,
    pub month:            String,
    #[serde(default)]
    pub compare_previous: bool,
    #[serde(default)]
    pub include_peers:    bool,
    #[serde(default)]
    pub kind:             OutcomeKind,
    #[serde(default)]
    pub policy:           PolicyChoice,
}

impl AnalysisRequest {
    pub fn new(facility: impl Into<FacilityId>, year: i32, month: impl Into<String>) -> Self {
        Self {
            facility:         Some(facility.into()),
            year,
            month:            month.into(),
            compare_previous: false,
            include_peers:    false,
            kind:             OutcomeKind::Surgery,
            policy:           PolicyChoice::Staged,
        }
    }

    pub fn with_previous(mut self) -> Self {
        self.compare_previous = true;
        self
    }

    pub fn with_peers(mut self) -> Self {
        self.include_peers = true;
        self
    }

    pub fn with_kind(mut self, kind: OutcomeKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_policy(mut self, policy: PolicyChoice) -> Self {
        self.policy = policy;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub period:          Period,
    pub roster_loaded:   bool,
    /// False means "not yet loaded": no efficiency or reduction output is
    /// produced, which must not be read as "no reduction needed".
    pub outcomes_loaded: bool,
    pub classified:      ClassifiedPeriod,
    pub activity:        ActivityTotals,
    pub comparison:      Option<PeriodComparison>,
    pub efficiency:      Option<EfficiencyReport>,
    pub reductions:      Option<ReductionPlan>,
}

pub struct AnalyticsEngine {
    config:     EngineConfig,
    normalizer: Arc<dyn NameNormalizer>,
    directory:  RoleGroupDirectory,
}

impl AnalyticsEngine {
    pub fn new(
        config: EngineConfig,
        normalizer: Arc<dyn NameNormalizer>,
        directory: RoleGroupDirectory,
    ) -> RosterResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            normalizer,
            directory,
        })
    }

    /// Default config, default normalizer, no role groups.
    pub fn with_defaults() -> Self {
        let config = EngineConfig::default();
        let directory = RoleGroupDirectory::new(&config.role_groups);
        Self {
            config,
            normalizer: Arc::new(DefaultNormalizer),
            directory,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn normalizer(&self) -> &dyn NameNormalizer {
        self.normalizer.as_ref()
    }

    pub fn directory(&self) -> &RoleGroupDirectory {
        &self.directory
    }

    /// Key a batch through this engine's normalizer.
    pub fn roster_batch(&self, period: Period, entries: Vec<RosterEntry>) -> RosterBatch {
        RosterBatch::new(period, entries, self.normalizer.as_ref())
    }

    pub fn outcome_set(&self, period: Period, records: Vec<OutcomeRecord>) -> OutcomeSet {
        OutcomeSet::new(period, records, self.normalizer.as_ref())
    }

    /// Validate a request and resolve its period.
    pub fn resolve_period(&self, request: &AnalysisRequest) -> RosterResult<Period> {
        let month = YearMonth::parse(request.year, &request.month)?;
        match request.facility.as_deref().map(str::trim) {
            Some(facility) if !facility.is_empty() => Ok(Period::new(facility, month)),
            _ => Err(RosterError::NoFacilitySelected {
                period: month.to_string(),
            }),
        }
    }

    pub fn analyze(&self, request: &AnalysisRequest, ledger: &DataLedger) -> RosterResult<AnalysisReport> {
        let policy = request.policy.build(&self.config);
        self.analyze_with(request, ledger, policy.as_ref())
    }

    pub fn analyze_with(
        &self,
        request: &AnalysisRequest,
        ledger: &DataLedger,
        policy: &dyn ReductionPolicy,
    ) -> RosterResult<AnalysisReport> {
        let period = self.resolve_period(request)?;
        let classifier = SessionClassifier::new(&self.config);
        let aggregator = ActivityAggregator::new(&self.config);

        let roster_loaded = ledger.has_roster(&period);
        let empty_batch;
        let batch = match ledger.roster(&period) {
            Some(b) => b,
            None => {
                log::warn!("engine: no roster loaded for {period}");
                empty_batch = RosterBatch::empty(period.clone());
                &empty_batch
            }
        };

        let classified = classifier.classify_period(batch)?;
        let activity = aggregator.aggregate(&classified);

        let comparison = if request.compare_previous {
            self.compare_with_previous(&period, &activity, ledger)?
        } else {
            None
        };

        let outcomes = ledger.outcomes(&period);
        let (efficiency, reductions) = match outcomes {
            Some(outcomes) => {
                let resolver = EfficiencyResolver::new(&self.config, request.kind);
                let peer = if request.include_peers {
                    self.directory.canonical_tier(&period.facility).map(|tier| {
                        let members = self.directory.peers_of(&period.facility);
                        resolver.pool_peers(tier, &members, period.month, ledger)
                    })
                } else {
                    None
                };
                let report = resolver.resolve(&classified, batch, outcomes, peer);
                let plan = ReductionPlan::build(policy, &report.records);
                (Some(report), Some(plan))
            }
            None => {
                log::warn!("engine: outcomes not loaded for {period}; efficiency and reductions withheld");
                (None, None)
            }
        };

        log::info!(
            "engine: {period} physicians={} proposals={}",
            classified.physicians.len(),
            reductions.as_ref().map_or(0, |p| p.proposals.len())
        );

        Ok(AnalysisReport {
            period,
            roster_loaded,
            outcomes_loaded: outcomes.is_some(),
            classified,
            activity,
            comparison,
            efficiency,
            reductions,
        })
    }

    fn compare_with_previous(
        &self,
        period: &Period,
        activity: &ActivityTotals,
        ledger: &DataLedger,
    ) -> RosterResult<Option<PeriodComparison>> {
        let previous = period.previous();
        let Some(prev_batch) = ledger.roster(&previous) else {
            log::debug!("engine: no roster for {previous}, comparison skipped");
            return Ok(None);
        };
        let classifier = SessionClassifier::new(&self.config);
        let aggregator = ActivityAggregator::new(&self.config);
        let prev_activity = aggregator.aggregate(&classifier.classify_period(prev_batch)?);
        Ok(Some(aggregator.compare(activity, &prev_activity)))
    }
}
