//! roster-report: headless schedule analytics for one facility and month.
//!
//! Usage:
//!   roster-report --input bundle.json --facility F1 --year 2024 --month March
//!   roster-report --input bundle.json --facility F1 --year 2024 --month 3 \
//!                 --policy outcome_ratio --compare --peers --json
//!
//! The bundle is a JSON object with optional `role_groups`
//! (facility → tier), `rosters` (flat roster entries) and `outcomes`
//! (one upload per facility and month).

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use roster_core::{
    config::EngineConfig,
    engine::{AnalysisReport, AnalysisRequest, AnalyticsEngine},
    error::RosterResult,
    ledger::DataLedger,
    normalize::{DefaultNormalizer, NameNormalizer},
    outcome::{OutcomeKind, OutcomeRecord, OutcomeSet},
    peer_coordinator::{PeerDataCoordinator, PeerDataLoader, PeerFetch},
    period::{Period, YearMonth},
    reduction_policy::PolicyChoice,
    role_group::RoleGroupDirectory,
    roster::{RosterBatch, RosterEntry},
};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::env;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Deserialize)]
struct Bundle {
    #[serde(default)]
    role_groups: BTreeMap<String, String>,
    #[serde(default)]
    rosters:     Vec<RosterEntry>,
    #[serde(default)]
    outcomes:    Vec<OutcomeUpload>,
}

#[derive(Deserialize)]
struct OutcomeUpload {
    facility: String,
    year:     i32,
    month:    String,
    records:  Vec<OutcomeRecord>,
}

/// Serves peer data out of the bundle already read from disk.
struct BundleLoader {
    normalizer: Arc<dyn NameNormalizer>,
    rosters:    HashMap<Period, Vec<RosterEntry>>,
    outcomes:   HashMap<Period, Vec<OutcomeRecord>>,
}

impl BundleLoader {
    fn from_bundle(bundle: Bundle, normalizer: Arc<dyn NameNormalizer>) -> Result<Self> {
        let mut rosters: HashMap<Period, Vec<RosterEntry>> = HashMap::new();
        for entry in bundle.rosters {
            let month = YearMonth::parse(entry.year, &entry.month)?;
            rosters
                .entry(Period::new(entry.facility.trim(), month))
                .or_default()
                .push(entry);
        }
        let mut outcomes: HashMap<Period, Vec<OutcomeRecord>> = HashMap::new();
        for upload in bundle.outcomes {
            let month = YearMonth::parse(upload.year, &upload.month)?;
            outcomes
                .entry(Period::new(upload.facility.trim(), month))
                .or_default()
                .extend(upload.records);
        }
        log::info!(
            "bundle: {} roster periods, {} outcome periods",
            rosters.len(),
            outcomes.len()
        );
        Ok(Self {
            normalizer,
            rosters,
            outcomes,
        })
    }

    fn load(&self, period: &Period) -> PeerFetch {
        PeerFetch {
            roster: self
                .rosters
                .get(period)
                .map(|e| RosterBatch::new(period.clone(), e.clone(), self.normalizer.as_ref())),
            outcomes: self
                .outcomes
                .get(period)
                .map(|r| OutcomeSet::new(period.clone(), r.clone(), self.normalizer.as_ref())),
        }
    }
}

#[async_trait]
impl PeerDataLoader for BundleLoader {
    async fn fetch(&self, facility: &str, month: YearMonth) -> RosterResult<PeerFetch> {
        Ok(self.load(&Period::new(facility, month)))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let input = flag_value(&args, "--input").ok_or_else(|| anyhow!("--input <bundle.json> is required"))?;
    let facility = flag_value(&args, "--facility").map(str::to_string);
    let year = parse_arg(&args, "--year", 0i32);
    let month = flag_value(&args, "--month").unwrap_or_default().to_string();
    let policy = match flag_value(&args, "--policy").unwrap_or("staged") {
        "staged" => PolicyChoice::Staged,
        "outcome_ratio" => PolicyChoice::OutcomeRatio,
        other => bail!("unknown policy '{other}' (expected staged or outcome_ratio)"),
    };
    let kind = match flag_value(&args, "--kind").unwrap_or("surgery") {
        "surgery" => OutcomeKind::Surgery,
        "examination" => OutcomeKind::Examination,
        other => bail!("unknown outcome kind '{other}' (expected surgery or examination)"),
    };
    let compare = args.iter().any(|a| a == "--compare");
    let peers = args.iter().any(|a| a == "--peers");
    let json = args.iter().any(|a| a == "--json");

    let config = match flag_value(&args, "--config") {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };

    let content = std::fs::read_to_string(input).map_err(|e| anyhow!("Cannot read {input}: {e}"))?;
    let bundle: Bundle = serde_json::from_str(&content)?;
    let directory = RoleGroupDirectory::with_assignments(&config.role_groups, bundle.role_groups.clone());

    let normalizer: Arc<dyn NameNormalizer> = Arc::new(DefaultNormalizer);
    let loader = Arc::new(BundleLoader::from_bundle(bundle, Arc::clone(&normalizer))?);
    let engine = AnalyticsEngine::new(config, Arc::clone(&normalizer), directory.clone())?;

    let request = AnalysisRequest {
        facility,
        year,
        month,
        compare_previous: compare,
        include_peers: peers,
        kind,
        policy,
    };
    let period = engine.resolve_period(&request)?;

    let ledger = Arc::new(RwLock::new(DataLedger::new()));
    {
        let mut l = ledger.write().await;
        for p in [period.clone(), period.previous()] {
            let fetch = loader.load(&p);
            if let Some(batch) = fetch.roster {
                l.insert_roster(batch);
            }
            if let Some(set) = fetch.outcomes {
                l.insert_outcomes(set);
            }
        }
    }

    if peers {
        let coordinator = PeerDataCoordinator::new(loader, Arc::clone(&ledger), directory);
        let fetched = coordinator
            .ensure_peer_data(&period.facility, &[period.month])
            .await?;
        for failure in &fetched.failures {
            log::warn!("peer data missing for {}@{}: {}", failure.facility, failure.month, failure.reason);
        }
    }

    let report = engine.analyze(&request, &*ledger.read().await)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_summary(&report);
    }
    Ok(())
}

fn print_summary(report: &AnalysisReport) {
    println!("=== ROSTER SUMMARY ===");
    println!("  period:          {}", report.period);
    println!("  roster loaded:   {}", report.roster_loaded);
    println!("  outcomes loaded: {}", report.outcomes_loaded);
    println!("  physicians:      {}", report.classified.physicians.len());

    println!();
    println!("=== FACILITY ACTIVITY (days) ===");
    if report.activity.facility.is_empty() {
        println!("  (No classified half-days)");
    }
    for (action, days) in &report.activity.facility {
        println!("  {action:<32} {days:>6.1}");
    }

    if let Some(comparison) = &report.comparison {
        println!();
        println!("=== CHANGES vs {} ===", comparison.previous);
        let mut any = false;
        for d in comparison.significant_facility_deltas() {
            any = true;
            let pct = d
                .delta_percent
                .map(|p| format!("{p:+.0}%"))
                .unwrap_or_else(|| "new".to_string());
            println!("  {:<32} {:>6.1} → {:>6.1} ({pct})", d.action, d.previous, d.current);
        }
        if !any {
            println!("  (No significant changes)");
        }
    }

    let Some(efficiency) = &report.efficiency else {
        println!();
        println!("Outcomes not loaded: efficiency and reductions are pending, not zero.");
        return;
    };

    println!();
    println!("=== EFFICIENCY ===");
    if let Some(avg) = efficiency.facility.average() {
        println!("  facility average: {avg:.2}");
    }
    if let Some(peer) = &efficiency.peer {
        println!(
            "  peer group {}: pooled {}/{} facilities",
            peer.tier,
            peer.pooled_count(),
            peer.total_facilities
        );
    }
    for row in efficiency.branch_vs_peer() {
        println!(
            "  {:<32} local {:>6} | peer {:>6}",
            row.branch,
            fmt_opt(row.local_average),
            fmt_opt(row.peer_average)
        );
    }

    if let Some(plan) = &report.reductions {
        println!();
        println!("=== REDUCTIONS ({}) ===", plan.policy);
        if plan.is_empty() {
            println!("  (No reductions proposed)");
        }
        for p in &plan.proposals {
            println!(
                "  {:<28} {:<20} {:>2} → {:>2} days  ({:?}, +{} capacity)",
                p.display_name, p.branch, p.current_days, p.proposed_days, p.rule, p.estimated_capacity_gain
            );
        }
        println!(
            "  total: {} days, estimated capacity gain {}",
            plan.total_reduction_days, plan.total_capacity_gain
        );
    }
}

fn fmt_opt(value: Option<f64>) -> String {
    value.map(|v| format!("{v:.2}")).unwrap_or_else(|| "-".to_string())
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].as_str())
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], flag: &str, default: T) -> T {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}
