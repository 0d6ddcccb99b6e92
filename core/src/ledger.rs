//! In-memory holder for loaded roster batches and outcome sets.
//!
//! RULE: The ledger only stores snapshots. Nothing in the computation
//! stages writes to it; the import side and the peer coordinator do.

use crate::{outcome::OutcomeSet, period::Period, roster::RosterBatch};
use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct DataLedger {
    rosters:  HashMap<Period, RosterBatch>,
    outcomes: HashMap<Period, OutcomeSet>,
}

impl DataLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces any batch already held for the same period.
    pub fn insert_roster(&mut self, batch: RosterBatch) {
        self.rosters.insert(batch.period.clone(), batch);
    }

    pub fn insert_outcomes(&mut self, set: OutcomeSet) {
        self.outcomes.insert(set.period.clone(), set);
    }

    pub fn roster(&self, period: &Period) -> Option<&RosterBatch> {
        self.rosters.get(period)
    }

    pub fn outcomes(&self, period: &Period) -> Option<&OutcomeSet> {
        self.outcomes.get(period)
    }

    pub fn has_roster(&self, period: &Period) -> bool {
        self.rosters.contains_key(period)
    }

    pub fn has_outcomes(&self, period: &Period) -> bool {
        self.outcomes.contains_key(period)
    }

    /// Both datasets present for the exact period.
    pub fn is_complete(&self, period: &Period) -> bool {
        self.has_roster(period) && self.has_outcomes(period)
    }

    /// Drop everything held for one facility and month.
    pub fn clear_period(&mut self, period: &Period) {
        let had_roster = self.rosters.remove(period).is_some();
        let had_outcomes = self.outcomes.remove(period).is_some();
        if had_roster || had_outcomes {
            log::debug!("ledger: cleared {period}");
        }
    }
}
