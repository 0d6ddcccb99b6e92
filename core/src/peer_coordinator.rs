//! Peer-group data coordinator: fetch-once semantics for sibling facilities.
//!
//! RULES:
//!   - At most one fetch sequence runs per (canonical tier, month set).
//!     Concurrent callers for the same key wait on that key's lock.
//!   - A sequence covers every member of the tier, the requester included,
//!     so a fetched key means the whole tier is loaded for those months.
//!     Pairs already complete in the ledger are skipped.
//!   - Fetches run strictly one after another, never concurrently.
//!   - A failed fetch is logged and recorded; the sequence continues.
//!   - A key is marked fetched only when its sequence finished without
//!     failures. Otherwise the next request retries the missing pairs.
//!   - A pair counts as loaded only when both datasets are in the ledger
//!     after the insert.

use crate::{
    error::{RosterError, RosterResult},
    ledger::DataLedger,
    outcome::OutcomeSet,
    period::{Period, YearMonth},
    role_group::RoleGroupDirectory,
    roster::RosterBatch,
    types::FacilityId,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// What one fetch produced. Either half may be missing.
#[derive(Debug, Clone, Default)]
pub struct PeerFetch {
    pub roster:   Option<RosterBatch>,
    pub outcomes: Option<OutcomeSet>,
}

/// The external data-loading collaborator.
#[async_trait]
pub trait PeerDataLoader: Send + Sync {
    async fn fetch(&self, facility: &str, month: YearMonth) -> RosterResult<PeerFetch>;
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FetchKey {
    pub tier:   String,
    pub months: BTreeSet<YearMonth>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeerFetchFailure {
    pub facility: FacilityId,
    pub month:    YearMonth,
    pub reason:   String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeerFetchReport {
    pub key:        Option<FetchKey>,
    /// Peer facilities excluding the requester.
    pub peers:      Vec<FacilityId>,
    /// Pairs sent to the loader.
    pub attempted:  usize,
    /// Pairs complete in the ledger after their fetch.
    pub loaded:     usize,
    pub failures:   Vec<PeerFetchFailure>,
    /// The key was already fetched; nothing ran.
    pub from_cache: bool,
}

impl PeerFetchReport {
    fn empty(key: Option<FetchKey>, peers: Vec<FacilityId>) -> Self {
        Self {
            key,
            peers,
            attempted: 0,
            loaded: 0,
            failures: Vec::new(),
            from_cache: false,
        }
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

pub struct PeerDataCoordinator {
    loader:    Arc<dyn PeerDataLoader>,
    ledger:    Arc<RwLock<DataLedger>>,
    directory: RoleGroupDirectory,
    fetched:   Mutex<HashSet<FetchKey>>,
    key_locks: Mutex<HashMap<FetchKey, Arc<Mutex<()>>>>,
}

impl PeerDataCoordinator {
    pub fn new(
        loader: Arc<dyn PeerDataLoader>,
        ledger: Arc<RwLock<DataLedger>>,
        directory: RoleGroupDirectory,
    ) -> Self {
        Self {
            loader,
            ledger,
            directory,
            fetched: Mutex::new(HashSet::new()),
            key_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn ledger(&self) -> Arc<RwLock<DataLedger>> {
        Arc::clone(&self.ledger)
    }

    pub fn directory(&self) -> &RoleGroupDirectory {
        &self.directory
    }

    pub fn fetch_key(&self, facility: &str, months: &[YearMonth]) -> Option<FetchKey> {
        let tier = self.directory.canonical_tier(facility)?;
        Some(FetchKey {
            tier:   tier.to_string(),
            months: months.iter().copied().collect(),
        })
    }

    pub async fn is_fetched(&self, key: &FetchKey) -> bool {
        self.fetched.lock().await.contains(key)
    }

    /// Forget a completed key so the next request fetches again.
    pub async fn invalidate(&self, key: &FetchKey) {
        self.fetched.lock().await.remove(key);
    }

    /// Keys with a sequence running or waiting to run.
    pub async fn active_keys(&self) -> usize {
        self.key_locks.lock().await.len()
    }

    async fn lock_for(&self, key: &FetchKey) -> Arc<Mutex<()>> {
        let mut locks = self.key_locks.lock().await;
        Arc::clone(locks.entry(key.clone()).or_default())
    }

    /// Drop the key's lock once no other caller holds a handle to it.
    async fn release_lock(&self, key: &FetchKey, key_lock: Arc<Mutex<()>>) {
        let mut locks = self.key_locks.lock().await;
        // One handle in the map, one here.
        if Arc::strong_count(&key_lock) <= 2 {
            locks.remove(key);
        }
    }

    /// Make sure every member of `facility`'s tier has data for `months`
    /// in the ledger.
    pub async fn ensure_peer_data(&self, facility: &str, months: &[YearMonth]) -> RosterResult<PeerFetchReport> {
        if months.is_empty() {
            return Err(RosterError::InvalidConfig("peer fetch requested for no months".into()));
        }
        let Some(key) = self.fetch_key(facility, months) else {
            log::debug!("peer: {facility} has no role group, nothing to fetch");
            return Ok(PeerFetchReport::empty(None, Vec::new()));
        };
        let members = self.directory.peers_of(facility);
        let peers: Vec<FacilityId> = members.iter().filter(|p| *p != facility).cloned().collect();
        if peers.is_empty() {
            log::debug!("peer: {facility} is alone in tier {}, nothing to pool", key.tier);
            return Ok(PeerFetchReport::empty(Some(key), peers));
        }

        let key_lock = self.lock_for(&key).await;
        let guard = key_lock.lock().await;
        let report = self.run_sequence(&key, &members, peers).await;
        drop(guard);
        self.release_lock(&key, key_lock).await;
        Ok(report)
    }

    async fn run_sequence(&self, key: &FetchKey, members: &[FacilityId], peers: Vec<FacilityId>) -> PeerFetchReport {
        let mut report = PeerFetchReport::empty(Some(key.clone()), peers);
        if self.is_fetched(key).await {
            report.from_cache = true;
            return report;
        }

        for member in members {
            for month in &key.months {
                let period = Period::new(member.clone(), *month);
                if self.ledger.read().await.is_complete(&period) {
                    continue;
                }
                report.attempted += 1;
                match self.loader.fetch(member, *month).await {
                    Ok(fetch) => {
                        let mut ledger = self.ledger.write().await;
                        if let Some(batch) = fetch.roster {
                            ledger.insert_roster(batch);
                        }
                        if let Some(set) = fetch.outcomes {
                            ledger.insert_outcomes(set);
                        }
                        if ledger.is_complete(&period) {
                            report.loaded += 1;
                        } else {
                            log::debug!("peer: {period} is still missing a dataset after fetch");
                        }
                    }
                    Err(e) => {
                        log::warn!("peer: fetch failed for {period}: {e}");
                        report.failures.push(PeerFetchFailure {
                            facility: member.clone(),
                            month:    *month,
                            reason:   e.to_string(),
                        });
                    }
                }
            }
        }

        if report.is_clean() {
            self.fetched.lock().await.insert(key.clone());
        }
        log::info!(
            "peer: tier {} months={}: attempted={} loaded={} failed={}",
            key.tier,
            key.months.len(),
            report.attempted,
            report.loaded,
            report.failures.len()
        );
        report
    }
}
