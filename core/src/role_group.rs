//! Facility role groups (regional tiers) used to decide which facilities
//! pool together for peer comparison.

use crate::{config::RoleGroupConfig, types::FacilityId};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default)]
pub struct RoleGroupDirectory {
    raw_tiers: BTreeMap<FacilityId, String>,
    collapse:  BTreeMap<String, String>,
}

impl RoleGroupDirectory {
    pub fn new(config: &RoleGroupConfig) -> Self {
        Self {
            raw_tiers: BTreeMap::new(),
            collapse:  config.collapse.clone(),
        }
    }

    pub fn with_assignments<I>(config: &RoleGroupConfig, assignments: I) -> Self
    where
        I: IntoIterator<Item = (FacilityId, String)>,
    {
        let mut directory = Self::new(config);
        for (facility, tier) in assignments {
            directory.assign(facility, tier);
        }
        directory
    }

    pub fn assign(&mut self, facility: impl Into<FacilityId>, raw_tier: impl Into<String>) {
        self.raw_tiers.insert(facility.into(), raw_tier.into().trim().to_string());
    }

    pub fn canonicalize<'a>(&'a self, raw_tier: &'a str) -> &'a str {
        self.collapse
            .get(raw_tier)
            .map(String::as_str)
            .unwrap_or(raw_tier)
    }

    pub fn canonical_tier(&self, facility: &str) -> Option<&str> {
        self.raw_tiers.get(facility).map(|raw| self.canonicalize(raw))
    }

    /// Every facility sharing `facility`'s canonical tier, the facility
    /// itself included, in id order. Empty when the facility is unassigned.
    pub fn peers_of(&self, facility: &str) -> Vec<FacilityId> {
        let Some(tier) = self.canonical_tier(facility) else {
            return Vec::new();
        };
        self.raw_tiers
            .iter()
            .filter(|(_, raw)| self.canonicalize(raw) == tier)
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.raw_tiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.raw_tiers.is_empty()
    }
}
