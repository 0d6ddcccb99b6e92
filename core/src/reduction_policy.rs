//! Reduction proposal engine: staged day reductions for low performers.
//!
//! RULE: Policies only ever propose reductions. A proposal whose final day
//! count is not strictly below the current allocation is dropped.
//!
//! Every policy implements ReductionPolicy so callers pick one explicitly:
//!   - StagedReductionPolicy  (default, ratio bands + volume preservation)
//!   - OutcomeRatioPolicy     (HAO/BAO fixed deltas and caps)
//!
//! Staged bands, evaluated on efficiency / target:
//!   ≥ 0.8        no proposal
//!   [0.6, 0.8)   −1 day (−2 at 5+ days)            floor 1
//!   [0.4, 0.6)   −2 days (−3 at 5+ days)           floor 1
//!   < 0.4        round(performed / target), or round(current × 0.5)
//!                when nothing was performed; at least −1 day      floor 1
//! High-continuity branches keep capped bands at floor 2 and are left
//! alone at 2 days or fewer.
//! Afterwards the proposal is raised to ceil(performed / target) days,
//! never above the current allocation.

use crate::{
    config::{EngineConfig, StagedReductionConfig},
    efficiency_resolver::{DoctorEfficiencyRecord, EfficiencyStatus},
    outcome_ratio_policy::OutcomeRatioPolicy,
    period::Period,
    types::{BranchName, PhysicianKey},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReductionRule {
    MildBand,
    MediumBand,
    Aggressive,
    ContinuityBranch,
    OutcomeSevereCap,
    OutcomeMedium,
    OutcomeMild,
    HardCap,
    LowOutputCap,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReductionProposal {
    pub physician_key:           PhysicianKey,
    pub display_name:            String,
    pub branch:                  BranchName,
    pub period:                  Period,
    pub policy:                  String,
    pub rule:                    ReductionRule,
    pub current_days:            u32,
    pub proposed_days:           u32,
    pub reduction:               u32,
    pub efficiency:              f64,
    pub target_efficiency:       f64,
    pub performance_ratio:       f64,
    pub volume_floor_days:       u32,
    pub volume_floor_applied:    bool,
    pub daily_capacity:          f64,
    pub estimated_capacity_gain: i64,
}

/// Shared contract: one efficiency record in, at most one proposal out.
pub trait ReductionPolicy: Send + Sync {
    /// Stable name recorded on every proposal.
    fn name(&self) -> &'static str;

    fn propose(&self, record: &DoctorEfficiencyRecord) -> Option<ReductionProposal>;
}

/// Which policy a caller wants.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyChoice {
    #[default]
    Staged,
    OutcomeRatio,
}

impl PolicyChoice {
    pub fn build(&self, config: &EngineConfig) -> Box<dyn ReductionPolicy> {
        match self {
            PolicyChoice::Staged => Box::new(StagedReductionPolicy::new(config)),
            PolicyChoice::OutcomeRatio => Box::new(OutcomeRatioPolicy::new(config)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReductionPlan {
    pub policy:               String,
    /// Largest reduction first, then by name.
    pub proposals:            Vec<ReductionProposal>,
    pub total_reduction_days: u32,
    pub total_capacity_gain:  i64,
}

impl ReductionPlan {
    pub fn build(policy: &dyn ReductionPolicy, records: &[DoctorEfficiencyRecord]) -> Self {
        let mut proposals: Vec<ReductionProposal> =
            records.iter().filter_map(|r| policy.propose(r)).collect();
        proposals.sort_by(|a, b| {
            b.reduction
                .cmp(&a.reduction)
                .then_with(|| a.display_name.cmp(&b.display_name))
                .then_with(|| a.physician_key.cmp(&b.physician_key))
        });

        let plan = Self {
            policy: policy.name().to_string(),
            total_reduction_days: proposals.iter().map(|p| p.reduction).sum(),
            total_capacity_gain: proposals.iter().map(|p| p.estimated_capacity_gain).sum(),
            proposals,
        };
        log::info!(
            "reduction: policy={} proposals={} days={} capacity_gain={}",
            plan.policy,
            plan.proposals.len(),
            plan.total_reduction_days,
            plan.total_capacity_gain
        );
        plan
    }

    pub fn is_empty(&self) -> bool {
        self.proposals.is_empty()
    }
}

/// Inputs shared by every policy when turning a day count into a proposal.
pub(crate) struct Draft {
    pub rule:                 ReductionRule,
    pub proposed_days:        u32,
    pub target_efficiency:    f64,
    pub performance_ratio:    f64,
    pub volume_floor_days:    u32,
    pub volume_floor_applied: bool,
}

/// Apply the drop rule and the capacity estimate.
pub(crate) fn finalize(
    policy: &'static str,
    record: &DoctorEfficiencyRecord,
    draft: Draft,
    capacity_fallback: f64,
) -> Option<ReductionProposal> {
    let current = record.planned_days;
    if draft.proposed_days >= current {
        log::debug!(
            "reduction: {policy} dropped {} ({} → {} days, no effective reduction)",
            record.physician_key,
            current,
            draft.proposed_days
        );
        return None;
    }
    let reduction = current - draft.proposed_days;
    let daily_capacity = record
        .outpatient_capacity_per_day
        .filter(|c| *c > 0.0)
        .unwrap_or(capacity_fallback);

    Some(ReductionProposal {
        physician_key: record.physician_key.clone(),
        display_name: record.display_name.clone(),
        branch: record.branch.clone(),
        period: record.period.clone(),
        policy: policy.to_string(),
        rule: draft.rule,
        current_days: current,
        proposed_days: draft.proposed_days,
        reduction,
        efficiency: record.efficiency_or_zero(),
        target_efficiency: draft.target_efficiency,
        performance_ratio: draft.performance_ratio,
        volume_floor_days: draft.volume_floor_days,
        volume_floor_applied: draft.volume_floor_applied,
        daily_capacity,
        estimated_capacity_gain: i64::from(reduction) * daily_capacity.round() as i64,
    })
}

// ── Staged policy ────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct StagedReductionPolicy {
    config:            StagedReductionConfig,
    capacity_fallback: f64,
}

impl StagedReductionPolicy {
    pub const NAME: &'static str = "staged";

    pub fn new(config: &EngineConfig) -> Self {
        Self {
            config:            config.staged.clone(),
            capacity_fallback: config.capacity_fallback,
        }
    }

    /// Reference efficiency if > 0, else branch average if > 0, else 1.
    pub fn target_efficiency(record: &DoctorEfficiencyRecord) -> f64 {
        record
            .reference_efficiency
            .filter(|r| *r > 0.0)
            .or(record.branch_average.filter(|b| *b > 0.0))
            .unwrap_or(1.0)
    }

    fn band_delta(&self, current: u32, ratio: f64) -> u32 {
        let large = current >= self.config.large_allocation_days;
        match (ratio >= self.config.medium_ratio, large) {
            (true, false) => 1,
            (true, true) => 2,
            (false, false) => 2,
            (false, true) => 3,
        }
    }

    fn continuity_days(&self, current: u32, ratio: f64) -> Option<u32> {
        let c = &self.config;
        if ratio >= c.mild_ratio {
            return None;
        }
        if ratio >= c.continuity_min_ratio && current <= c.continuity_skip_max_days {
            return None;
        }
        let delta = self.band_delta(current, ratio);
        Some(current.saturating_sub(delta).max(c.continuity_floor_days))
    }

    fn general_days(&self, current: u32, ratio: f64, performed: u32, target: f64) -> Option<(u32, ReductionRule)> {
        let c = &self.config;
        if ratio >= c.mild_ratio {
            return None;
        }
        if ratio >= c.medium_ratio {
            let days = current.saturating_sub(self.band_delta(current, ratio));
            return Some((days.max(c.floor_days), ReductionRule::MildBand));
        }
        if ratio >= c.severe_ratio {
            let days = current.saturating_sub(self.band_delta(current, ratio));
            return Some((days.max(c.floor_days), ReductionRule::MediumBand));
        }

        // Zero performed shrinks gently instead of collapsing to a zero volume floor.
        let recomputed = if performed > 0 {
            (f64::from(performed) / target).round()
        } else {
            (f64::from(current) * c.aggressive_halving).round()
        };
        let mut days = recomputed.max(0.0) as u32;
        if days >= current {
            days = current.saturating_sub(1);
        }
        Some((days.max(c.floor_days), ReductionRule::Aggressive))
    }
}

impl ReductionPolicy for StagedReductionPolicy {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn propose(&self, record: &DoctorEfficiencyRecord) -> Option<ReductionProposal> {
        if record.status != EfficiencyStatus::Low || record.planned_days == 0 {
            return None;
        }
        let current = record.planned_days;
        let performed = record.performed_count;
        let target = Self::target_efficiency(record);
        let ratio = record.efficiency_or_zero() / target;

        let (staged_days, rule) = if self.config.continuity_branches.matches(&record.branch) {
            (self.continuity_days(current, ratio)?, ReductionRule::ContinuityBranch)
        } else {
            self.general_days(current, ratio, performed, target)?
        };

        let volume_floor_days = (f64::from(performed) / target).ceil() as u32;
        let (proposed_days, volume_floor_applied) = if staged_days < volume_floor_days {
            (volume_floor_days.min(current), true)
        } else {
            (staged_days, false)
        };

        finalize(
            Self::NAME,
            record,
            Draft {
                rule,
                proposed_days,
                target_efficiency: target,
                performance_ratio: ratio,
                volume_floor_days,
                volume_floor_applied,
            },
            self.capacity_fallback,
        )
    }
}
