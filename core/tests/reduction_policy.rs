mod common;

use common::record;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64Mcg;
use roster_core::{
    config::EngineConfig,
    efficiency_resolver::{DoctorEfficiencyRecord, EfficiencyStatus},
    reduction_policy::{
        PolicyChoice, ReductionPlan, ReductionPolicy, ReductionRule, StagedReductionPolicy,
    },
};

// ── Helpers ──────────────────────────────────────────────────────────────────

fn staged() -> StagedReductionPolicy {
    StagedReductionPolicy::new(&EngineConfig::default())
}

/// A low-status record with an explicit efficiency and reference.
fn low(branch: &str, planned: u32, performed: u32, efficiency: f64, reference: f64) -> DoctorEfficiencyRecord {
    let mut r = record("DR X", branch, planned, performed);
    r.efficiency = Some(efficiency);
    r.reference_efficiency = Some(reference);
    r.branch_average = Some(reference);
    r.status = EfficiencyStatus::Low;
    r
}

// ── Worked cases ─────────────────────────────────────────────────────────────

/// 10 planned days, 9 performed, branch average 1.2 → ratio 0.75, mild band.
/// At 5+ days the mild band takes −2; the volume floor ceil(9/1.2) = 8 does
/// not raise it.
#[test]
fn mild_band_large_allocation() {
    let mut r = record("ALİ KAYA", "General Surgery", 10, 9);
    r.branch_average = Some(1.2);
    r.reference_efficiency = Some(1.2);
    r.status = EfficiencyStatus::Low;

    let p = staged().propose(&r).expect("ratio 0.75 must propose");
    assert_eq!(p.rule, ReductionRule::MildBand);
    assert!((p.performance_ratio - 0.75).abs() < 1e-9);
    assert_eq!(p.volume_floor_days, 8);
    assert!(!p.volume_floor_applied);
    assert_eq!(p.proposed_days, 8);
    assert_eq!(p.reduction, 2);
}

/// Same ratio with fewer than 5 days takes −1.
#[test]
fn mild_band_small_allocation() {
    let p = staged().propose(&low("General Surgery", 4, 3, 0.9, 1.2)).unwrap();
    assert_eq!(p.rule, ReductionRule::MildBand);
    assert_eq!(p.proposed_days, 3);
    assert_eq!(p.reduction, 1);
}

#[test]
fn medium_band_deltas() {
    let p = staged().propose(&low("General Surgery", 4, 2, 0.5, 1.0)).unwrap();
    assert_eq!(p.rule, ReductionRule::MediumBand);
    assert_eq!(p.proposed_days, 2);

    let p = staged().propose(&low("General Surgery", 8, 4, 0.5, 1.0)).unwrap();
    assert_eq!(p.proposed_days, 5, "−3 at 5+ days, volume floor 4");
}

/// Obstetric branch, 3 days, ratio 0.35: medium delta −2 lands on 1, the
/// branch floor lifts it to 2.
#[test]
fn continuity_branch_uses_floor_two() {
    let p = staged().propose(&low("Obstetrics", 3, 2, 0.7, 2.0)).unwrap();
    assert_eq!(p.rule, ReductionRule::ContinuityBranch);
    assert!((p.performance_ratio - 0.35).abs() < 1e-9);
    assert_eq!(p.proposed_days, 2);
    assert_eq!(p.reduction, 1);
}

#[test]
fn continuity_branch_skips_small_allocations() {
    assert!(staged().propose(&low("Kadın Hastalıkları ve Doğum", 2, 1, 0.5, 1.0)).is_none());
    assert!(staged().propose(&low("Gynecology", 6, 5, 0.85, 1.0)).is_none(), "ratio ≥ 0.8");
}

/// Below ratio 0.3 the continuity branch keeps its capped bands at floor 2
/// instead of the aggressive recompute.
#[test]
fn continuity_branch_below_min_ratio_stays_capped() {
    let p = staged().propose(&low("Obstetrics", 6, 1, 0.1, 1.0)).unwrap();
    assert_eq!(p.rule, ReductionRule::ContinuityBranch);
    assert_eq!(p.proposed_days, 3, "6 − 3, not round(1/1.0) = 1");

    assert!(
        staged().propose(&low("Obstetrics", 2, 0, 0.0, 1.0)).is_none(),
        "2 − 2 floored at 2 is no reduction"
    );
}

#[test]
fn aggressive_band_recomputes_from_volume() {
    let p = staged().propose(&low("General Surgery", 10, 3, 0.3, 1.0)).unwrap();
    assert_eq!(p.rule, ReductionRule::Aggressive);
    assert_eq!(p.proposed_days, 3);
    assert_eq!(p.reduction, 7);
}

/// Nothing performed: halve instead of dropping to a zero volume floor.
#[test]
fn aggressive_band_halves_when_nothing_performed() {
    let p = staged().propose(&low("General Surgery", 10, 0, 0.0, 1.0)).unwrap();
    assert_eq!(p.proposed_days, 5);

    let p = staged().propose(&low("General Surgery", 3, 0, 0.0, 1.0)).unwrap();
    assert_eq!(p.proposed_days, 2, "round(1.5) = 2");

    assert!(
        staged().propose(&low("General Surgery", 1, 0, 0.0, 1.0)).is_none(),
        "a single day cannot go below the floor"
    );
}

/// The volume floor overrides the staged count when the physician's
/// actual volume needs more days at the target rate.
#[test]
fn volume_floor_raises_staged_days() {
    // ratio 0.5 with target 4: −3 → 5, but 22 cases need ceil(22/4) = 6 days.
    let r = low("General Surgery", 8, 22, 2.0, 4.0);
    let p = staged().propose(&r).unwrap();
    assert!(p.volume_floor_applied);
    assert_eq!(p.volume_floor_days, 6);
    assert_eq!(p.proposed_days, 6);
}

#[test]
fn volume_floor_at_current_drops_proposal() {
    // ratio 0.7, −2 → 6, but 40 cases at target 5 need all 8 days.
    let r = low("General Surgery", 8, 40, 3.5, 5.0);
    assert!(staged().propose(&r).is_none());
}

// ── Eligibility ──────────────────────────────────────────────────────────────

#[test]
fn only_low_status_is_eligible() {
    let mut r = low("General Surgery", 10, 3, 0.3, 1.0);
    r.status = EfficiencyStatus::Normal;
    assert!(staged().propose(&r).is_none());

    let r = low("General Surgery", 0, 3, 0.0, 1.0);
    assert!(staged().propose(&r).is_none(), "no planned days, nothing to cut");
}

#[test]
fn target_falls_back_to_one() {
    let mut r = record("DR X", "General Surgery", 10, 3);
    r.status = EfficiencyStatus::Low;
    assert_eq!(StagedReductionPolicy::target_efficiency(&r), 1.0);

    r.branch_average = Some(1.5);
    assert_eq!(StagedReductionPolicy::target_efficiency(&r), 1.5);

    r.reference_efficiency = Some(2.0);
    assert_eq!(StagedReductionPolicy::target_efficiency(&r), 2.0);
}

// ── Capacity ─────────────────────────────────────────────────────────────────

#[test]
fn capacity_gain_uses_own_rate_or_fallback() {
    let r = low("General Surgery", 10, 3, 0.3, 1.0);
    let p = staged().propose(&r).unwrap();
    assert_eq!(p.daily_capacity, 42.0);
    assert_eq!(p.estimated_capacity_gain, 7 * 42);

    let mut r = low("General Surgery", 10, 3, 0.3, 1.0);
    r.outpatient_capacity_per_day = Some(30.4);
    let p = staged().propose(&r).unwrap();
    assert_eq!(p.estimated_capacity_gain, 7 * 30);
}

// ── Plans ────────────────────────────────────────────────────────────────────

#[test]
fn plan_orders_by_reduction_and_totals() {
    let mut a = low("General Surgery", 10, 3, 0.3, 1.0);
    a.physician_key = "A".into();
    a.display_name = "A".into();
    let mut b = low("General Surgery", 4, 3, 0.9, 1.2);
    b.physician_key = "B".into();
    b.display_name = "B".into();
    let mut c = low("General Surgery", 10, 9, 1.2, 1.2);
    c.physician_key = "C".into();
    c.display_name = "C".into();

    let policy = PolicyChoice::Staged.build(&EngineConfig::default());
    let plan = ReductionPlan::build(policy.as_ref(), &[b, c, a]);

    assert_eq!(plan.policy, "staged");
    let keys: Vec<&str> = plan.proposals.iter().map(|p| p.physician_key.as_str()).collect();
    assert_eq!(keys, vec!["A", "B"], "C sits at the reference and gets nothing");
    assert_eq!(plan.total_reduction_days, 8);
    assert_eq!(plan.total_capacity_gain, 8 * 42);
}

// ── Properties ───────────────────────────────────────────────────────────────

fn random_record(rng: &mut Pcg64Mcg) -> DoctorEfficiencyRecord {
    let branches = ["General Surgery", "Obstetrics", "Orthopedics"];
    let planned = rng.gen_range(0..=22);
    let performed = rng.gen_range(0..=60);
    let mut r = record("DR R", branches[rng.gen_range(0..branches.len())], planned, performed);
    let reference = rng.gen_range(0.2..6.0);
    r.reference_efficiency = rng.gen_bool(0.8).then_some(reference);
    r.branch_average = Some(reference);
    r.status = if rng.gen_bool(0.7) { EfficiencyStatus::Low } else { EfficiencyStatus::Normal };
    if rng.gen_bool(0.5) {
        r.outpatient_capacity_per_day = Some(rng.gen_range(5.0..60.0));
    }
    r
}

/// Every surviving proposal reduces strictly, and never goes below what
/// the physician's own volume needs at the target rate.
#[test]
fn proposals_are_strict_reductions_above_volume_floor() {
    let mut rng = Pcg64Mcg::seed_from_u64(20_240_301);
    let policies: Vec<Box<dyn ReductionPolicy>> = vec![
        PolicyChoice::Staged.build(&EngineConfig::default()),
        PolicyChoice::OutcomeRatio.build(&EngineConfig::default()),
    ];

    for _ in 0..2_000 {
        let r = random_record(&mut rng);
        for policy in &policies {
            let Some(p) = policy.propose(&r) else { continue };
            assert!(
                p.proposed_days < p.current_days,
                "{}: {} → {} is not a reduction",
                policy.name(),
                p.current_days,
                p.proposed_days
            );
            assert!(p.proposed_days >= 1, "{}: floor of one day", policy.name());
            assert_eq!(p.reduction, p.current_days - p.proposed_days);

            if policy.name() == StagedReductionPolicy::NAME && r.performed_count > 0 {
                let target = StagedReductionPolicy::target_efficiency(&r);
                let needed = (f64::from(r.performed_count) / target).ceil() as u32;
                assert!(
                    p.proposed_days >= needed,
                    "staged proposed {} below volume floor {needed}",
                    p.proposed_days
                );
            }
        }
    }
}
