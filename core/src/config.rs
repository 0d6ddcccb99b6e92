use crate::{
    error::{RosterError, RosterResult},
    normalize::ActionVocabulary,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ── Session windows ────────────────────────────────────────────────

/// Clock windows in minutes after midnight, half-open `[start, end)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub morning_start:       u32,
    pub morning_end:         u32,
    pub afternoon_start:     u32,
    pub afternoon_end:       u32,
    /// An action needs at least this many overlapping minutes to win a window.
    pub min_overlap_minutes: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            morning_start:       8 * 60,
            morning_end:         12 * 60,
            afternoon_start:     13 * 60,
            afternoon_end:       17 * 60,
            min_overlap_minutes: 30,
        }
    }
}

// ── Action vocabularies ────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VocabularyConfig {
    /// Dropped before classification; contributes nothing.
    pub holiday:     ActionVocabulary,
    /// Excluded from day classification and planned days, capacity still counted.
    pub result_exam: ActionVocabulary,
    pub surgery:     ActionVocabulary,
    pub outpatient:  ActionVocabulary,
}

impl Default for VocabularyConfig {
    fn default() -> Self {
        Self {
            holiday:     ActionVocabulary::new(["HOLIDAY", "TATIL", "BAYRAM"]),
            result_exam: ActionVocabulary::new(["RESULT", "CONTROL EXAM", "SONUC", "KONTROL MUAYENE"]),
            surgery:     ActionVocabulary::new(["SURGERY", "OPERATION", "AMELIYAT"]),
            outpatient:  ActionVocabulary::new(["OUTPATIENT", "CLINIC", "POLIKLINIK"]),
        }
    }
}

// ── Month-over-month comparison ────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComparisonConfig {
    /// Absolute percent change a delta must reach to be significant.
    pub significant_percent: f64,
    /// Absolute day change a delta must reach to be significant.
    pub significant_days:    f64,
}

impl Default for ComparisonConfig {
    fn default() -> Self {
        Self {
            significant_percent: 25.0,
            significant_days:    3.0,
        }
    }
}

// ── Efficiency status ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusConfig {
    pub low_multiplier:  f64,
    pub high_multiplier: f64,
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            low_multiplier:  0.8,
            high_multiplier: 1.5,
        }
    }
}

// ── Staged reduction policy ────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StagedReductionConfig {
    /// Ratio at or above which no reduction is proposed.
    pub mild_ratio:               f64,
    /// Lower edge of the mild band.
    pub medium_ratio:             f64,
    /// Lower edge of the medium band; below it the aggressive rule runs.
    pub severe_ratio:             f64,
    /// Allocations of this many days or more take the larger band delta.
    pub large_allocation_days:    u32,
    pub floor_days:               u32,
    /// Applied to current days in the aggressive band when nothing was performed.
    pub aggressive_halving:       f64,
    /// High-continuity branches (obstetric surgery).
    pub continuity_branches:      ActionVocabulary,
    pub continuity_floor_days:    u32,
    pub continuity_min_ratio:     f64,
    /// Continuity physicians at or below this allocation are left alone.
    pub continuity_skip_max_days: u32,
}

impl Default for StagedReductionConfig {
    fn default() -> Self {
        Self {
            mild_ratio:               0.8,
            medium_ratio:             0.6,
            severe_ratio:             0.4,
            large_allocation_days:    5,
            floor_days:               1,
            aggressive_halving:       0.5,
            continuity_branches:      ActionVocabulary::new([
                "OBSTETRIC",
                "GYNECOLOGY",
                "KADIN HASTALIKLARI VE DOGUM",
            ]),
            continuity_floor_days:    2,
            continuity_min_ratio:     0.3,
            continuity_skip_max_days: 2,
        }
    }
}

// ── Outcome-per-day (HAO/BAO) policy ───────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutcomeRatioConfig {
    /// Below this share of BAO the allocation is capped at `severe_cap_days`.
    pub severe_share:             f64,
    pub severe_cap_days:          u32,
    /// Below this share of BAO: −2 days.
    pub medium_share:             f64,
    /// Below this share of BAO: −1 day.
    pub mild_share:               f64,
    pub hard_cap_days:            u32,
    /// Physicians at or above this multiple of BAO are exempt from the hard cap.
    pub hard_cap_exempt_multiple: f64,
    pub low_output_cap_days:      u32,
    /// Absolute outcome-per-day below which the low-output cap applies.
    pub low_output_threshold:     f64,
    pub floor_days:               u32,
}

impl Default for OutcomeRatioConfig {
    fn default() -> Self {
        Self {
            severe_share:             0.4,
            severe_cap_days:          1,
            medium_share:             0.6,
            mild_share:               0.8,
            hard_cap_days:            6,
            hard_cap_exempt_multiple: 2.0,
            low_output_cap_days:      3,
            low_output_threshold:     2.5,
            floor_days:               1,
        }
    }
}

// ── Role groups ────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoleGroupConfig {
    /// raw tier → canonical tier. Tiers not listed are used as-is.
    pub collapse: BTreeMap<String, String>,
}

impl Default for RoleGroupConfig {
    fn default() -> Self {
        Self {
            collapse: [
                ("A1".to_string(), "A".to_string()),
                ("A2".to_string(), "A".to_string()),
            ]
            .into(),
        }
    }
}

// ── Engine ─────────────────────────────────────────────────────────

/// Every threshold, vocabulary and constant the engine reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub sessions:          SessionConfig,
    pub vocabulary:        VocabularyConfig,
    pub comparison:        ComparisonConfig,
    pub status:            StatusConfig,
    pub staged:            StagedReductionConfig,
    pub outcome_ratio:     OutcomeRatioConfig,
    /// Patients per clinic day assumed when a physician's own figure is unknown.
    pub capacity_fallback: f64,
    pub role_groups:       RoleGroupConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sessions:          SessionConfig::default(),
            vocabulary:        VocabularyConfig::default(),
            comparison:        ComparisonConfig::default(),
            status:            StatusConfig::default(),
            staged:            StagedReductionConfig::default(),
            outcome_ratio:     OutcomeRatioConfig::default(),
            capacity_fallback: 42.0,
            role_groups:       RoleGroupConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Load from a JSON file. Missing sections keep their defaults.
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let config: EngineConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject structurally invalid values before any computation runs.
    pub fn validate(&self) -> RosterResult<()> {
        let s = &self.sessions;
        for (name, start, end) in [
            ("morning", s.morning_start, s.morning_end),
            ("afternoon", s.afternoon_start, s.afternoon_end),
        ] {
            if start >= end || end > 24 * 60 {
                return Err(invalid(format!("{name} window [{start}, {end}) is empty or past midnight")));
            }
        }
        if s.min_overlap_minutes == 0 {
            return Err(invalid("min_overlap_minutes must be > 0".into()));
        }

        let st = &self.staged;
        if !(0.0 < st.severe_ratio && st.severe_ratio < st.medium_ratio && st.medium_ratio < st.mild_ratio) {
            return Err(invalid(format!(
                "staged bands must satisfy 0 < severe ({}) < medium ({}) < mild ({})",
                st.severe_ratio, st.medium_ratio, st.mild_ratio
            )));
        }
        if st.floor_days == 0 || st.continuity_floor_days < st.floor_days {
            return Err(invalid("staged floors must be >= 1 and continuity floor >= general floor".into()));
        }
        if !(0.0..1.0).contains(&st.aggressive_halving) {
            return Err(invalid(format!("aggressive_halving {} outside [0, 1)", st.aggressive_halving)));
        }

        let o = &self.outcome_ratio;
        if !(0.0 < o.severe_share && o.severe_share < o.medium_share && o.medium_share < o.mild_share) {
            return Err(invalid("outcome ratio shares must be strictly increasing and positive".into()));
        }
        if o.floor_days == 0 || o.severe_cap_days < o.floor_days {
            return Err(invalid("outcome ratio floor must be >= 1 and <= severe cap".into()));
        }

        if self.status.low_multiplier <= 0.0 || self.status.high_multiplier <= self.status.low_multiplier {
            return Err(invalid("status multipliers must satisfy 0 < low < high".into()));
        }
        if self.capacity_fallback <= 0.0 {
            return Err(invalid("capacity_fallback must be > 0".into()));
        }
        Ok(())
    }
}

fn invalid(msg: String) -> RosterError {
    RosterError::InvalidConfig(msg)
}
