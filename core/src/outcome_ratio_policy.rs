//! Outcome-per-day policy (HAO against BAO).
//!
//! HAO is the physician's outcomes per planned day. BAO is the branch
//! average, or the facility-wide average when the physician is the only
//! one in the branch with planned days.
//!
//!   HAO < 40% BAO   cap at 1 day
//!   HAO < 60% BAO   −2 days
//!   HAO < 80% BAO   −1 day
//!   then: cap at 6 days unless HAO ≥ 2 × BAO
//!         cap at 3 days whenever HAO < 2.5
//!
//! Each step can only lower the allocation. Without a usable BAO only the
//! absolute caps run.

use crate::{
    config::{EngineConfig, OutcomeRatioConfig},
    efficiency_resolver::{DoctorEfficiencyRecord, EfficiencyStatus},
    reduction_policy::{finalize, Draft, ReductionPolicy, ReductionProposal, ReductionRule},
};

#[derive(Debug, Clone)]
pub struct OutcomeRatioPolicy {
    config:            OutcomeRatioConfig,
    capacity_fallback: f64,
}

impl OutcomeRatioPolicy {
    pub const NAME: &'static str = "outcome_ratio";

    pub fn new(config: &EngineConfig) -> Self {
        Self {
            config:            config.outcome_ratio.clone(),
            capacity_fallback: config.capacity_fallback,
        }
    }

    /// Branch average, falling back to the facility average for a branch
    /// of one. None when the chosen average is undefined or zero.
    pub fn baseline(record: &DoctorEfficiencyRecord) -> Option<f64> {
        let average = if record.branch_physician_count <= 1 {
            record.facility_average
        } else {
            record.branch_average
        };
        average.filter(|a| *a > 0.0)
    }
}

impl ReductionPolicy for OutcomeRatioPolicy {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn propose(&self, record: &DoctorEfficiencyRecord) -> Option<ReductionProposal> {
        if record.planned_days == 0 || record.status == EfficiencyStatus::NoData {
            return None;
        }
        let c = &self.config;
        let current = record.planned_days;
        let hao = record.efficiency_or_zero();
        let bao = Self::baseline(record);

        let mut proposed = current;
        let mut rule = None;
        let mut lower_to = |days: u32, why: ReductionRule, proposed: &mut u32| {
            if days < *proposed {
                *proposed = days;
                rule = Some(why);
            }
        };

        if let Some(b) = bao {
            let share = hao / b;
            if share < c.severe_share {
                lower_to(c.severe_cap_days, ReductionRule::OutcomeSevereCap, &mut proposed);
            } else if share < c.medium_share {
                lower_to(current.saturating_sub(2).max(c.floor_days), ReductionRule::OutcomeMedium, &mut proposed);
            } else if share < c.mild_share {
                lower_to(current.saturating_sub(1).max(c.floor_days), ReductionRule::OutcomeMild, &mut proposed);
            }
        }

        let exempt_from_hard_cap = bao.is_some_and(|b| hao >= c.hard_cap_exempt_multiple * b);
        if !exempt_from_hard_cap {
            lower_to(c.hard_cap_days, ReductionRule::HardCap, &mut proposed);
        }
        if hao < c.low_output_threshold {
            lower_to(c.low_output_cap_days, ReductionRule::LowOutputCap, &mut proposed);
        }

        let rule = rule?;
        let proposed_days = proposed.max(c.floor_days).min(current);

        finalize(
            Self::NAME,
            record,
            Draft {
                rule,
                proposed_days,
                target_efficiency: bao.unwrap_or(0.0),
                performance_ratio: bao.map(|b| hao / b).unwrap_or(0.0),
                volume_floor_days: 0,
                volume_floor_applied: false,
            },
            self.capacity_fallback,
        )
    }
}
