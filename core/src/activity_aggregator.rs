//! Activity aggregator: half-day labels to period totals.
//!
//! Sums classified half-days per physician, per branch and facility-wide,
//! and compares two periods action by action. A delta is significant only
//! when BOTH the percent and the absolute day thresholds are met, which
//! keeps low-volume actions from flagging on noise.

use crate::{
    config::{ComparisonConfig, EngineConfig},
    period::Period,
    session_classifier::ClassifiedPeriod,
    types::{ActionLabel, BranchName, DayCount, PhysicianKey},
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

pub type ActionDays = BTreeMap<ActionLabel, DayCount>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionDaySummary {
    pub physician_key: PhysicianKey,
    pub display_name:  String,
    pub branch:        BranchName,
    pub actions:       ActionDays,
    pub total_days:    DayCount,
}

impl ActionDaySummary {
    pub fn days_for(&self, action: &str) -> DayCount {
        self.actions.get(action).copied().unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityTotals {
    pub period:     Period,
    /// Ordered by physician key.
    pub physicians: Vec<ActionDaySummary>,
    pub branches:   BTreeMap<BranchName, ActionDays>,
    pub facility:   ActionDays,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionDelta {
    pub action:        ActionLabel,
    pub current:       DayCount,
    pub previous:      DayCount,
    pub delta:         DayCount,
    /// None when the previous period had no days for this action.
    pub delta_percent: Option<f64>,
    pub significant:   bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodComparison {
    pub current:    Period,
    pub previous:   Period,
    pub facility:   Vec<ActionDelta>,
    pub branches:   BTreeMap<BranchName, Vec<ActionDelta>>,
    pub physicians: BTreeMap<PhysicianKey, Vec<ActionDelta>>,
}

impl PeriodComparison {
    pub fn significant_facility_deltas(&self) -> impl Iterator<Item = &ActionDelta> {
        self.facility.iter().filter(|d| d.significant)
    }
}

pub struct ActivityAggregator<'a> {
    comparison: &'a ComparisonConfig,
}

impl<'a> ActivityAggregator<'a> {
    pub fn new(config: &'a EngineConfig) -> Self {
        Self {
            comparison: &config.comparison,
        }
    }

    pub fn aggregate(&self, classified: &ClassifiedPeriod) -> ActivityTotals {
        let mut physicians = Vec::with_capacity(classified.physicians.len());
        let mut branches: BTreeMap<BranchName, ActionDays> = BTreeMap::new();
        let mut facility = ActionDays::new();

        for profile in classified.physicians.values() {
            let mut actions = ActionDays::new();
            for day in &profile.days {
                for (action, credit) in day.contributions() {
                    *actions.entry(action.clone()).or_default() += credit;
                }
            }
            if actions.is_empty() {
                continue;
            }

            let branch_days = branches.entry(profile.branch.clone()).or_default();
            for (action, days) in &actions {
                *branch_days.entry(action.clone()).or_default() += days;
                *facility.entry(action.clone()).or_default() += days;
            }

            physicians.push(ActionDaySummary {
                physician_key: profile.physician_key.clone(),
                display_name:  profile.display_name.clone(),
                branch:        profile.branch.clone(),
                total_days:    actions.values().sum(),
                actions,
            });
        }

        ActivityTotals {
            period: classified.period.clone(),
            physicians,
            branches,
            facility,
        }
    }

    /// Per-action deltas for every action present in either period.
    pub fn compare_days(&self, current: &ActionDays, previous: &ActionDays) -> Vec<ActionDelta> {
        let actions: BTreeSet<&ActionLabel> = current.keys().chain(previous.keys()).collect();
        actions
            .into_iter()
            .map(|action| {
                let cur = current.get(action).copied().unwrap_or(0.0);
                let prev = previous.get(action).copied().unwrap_or(0.0);
                let delta = cur - prev;
                let delta_percent = (prev > 0.0).then(|| delta / prev * 100.0);
                ActionDelta {
                    action: action.clone(),
                    current: cur,
                    previous: prev,
                    delta,
                    delta_percent,
                    significant: self.is_significant(delta, delta_percent),
                }
            })
            .collect()
    }

    /// Both thresholds must hold. An action new this period has no
    /// percent and is judged on its absolute delta alone.
    pub fn is_significant(&self, delta: DayCount, delta_percent: Option<f64>) -> bool {
        let big_enough = delta.abs() >= self.comparison.significant_days;
        let fast_enough = delta_percent.map_or(true, |p| p.abs() >= self.comparison.significant_percent);
        big_enough && fast_enough
    }

    pub fn compare(&self, current: &ActivityTotals, previous: &ActivityTotals) -> PeriodComparison {
        let empty = ActionDays::new();

        let branch_names: BTreeSet<&BranchName> =
            current.branches.keys().chain(previous.branches.keys()).collect();
        let branches = branch_names
            .into_iter()
            .map(|b| {
                let cur = current.branches.get(b).unwrap_or(&empty);
                let prev = previous.branches.get(b).unwrap_or(&empty);
                (b.clone(), self.compare_days(cur, prev))
            })
            .collect();

        let cur_by_key: BTreeMap<&PhysicianKey, &ActionDays> =
            current.physicians.iter().map(|p| (&p.physician_key, &p.actions)).collect();
        let prev_by_key: BTreeMap<&PhysicianKey, &ActionDays> =
            previous.physicians.iter().map(|p| (&p.physician_key, &p.actions)).collect();
        let keys: BTreeSet<&PhysicianKey> = cur_by_key.keys().chain(prev_by_key.keys()).copied().collect();
        let physicians = keys
            .into_iter()
            .map(|k| {
                let cur = cur_by_key.get(k).copied().unwrap_or(&empty);
                let prev = prev_by_key.get(k).copied().unwrap_or(&empty);
                (k.clone(), self.compare_days(cur, prev))
            })
            .collect();

        let comparison = PeriodComparison {
            current: current.period.clone(),
            previous: previous.period.clone(),
            facility: self.compare_days(&current.facility, &previous.facility),
            branches,
            physicians,
        };
        log::debug!(
            "aggregator: {} vs {}: {} significant facility deltas",
            comparison.current,
            comparison.previous,
            comparison.significant_facility_deltas().count()
        );
        comparison
    }
}
