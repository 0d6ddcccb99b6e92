//! Schedule analytics and staffing-reduction engine for hospital rosters.
//!
//! Data flows strictly upward:
//!   roster entries → half-day labels → period totals
//!   → efficiency records → reduction proposals
//!
//! The computation modules are pure and synchronous. Only the peer
//! coordinator is async, because it talks to an external loader.

pub mod activity_aggregator;
pub mod config;
pub mod efficiency_resolver;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod normalize;
pub mod outcome;
pub mod outcome_ratio_policy;
pub mod peer_coordinator;
pub mod period;
pub mod reduction_policy;
pub mod role_group;
pub mod roster;
pub mod session_classifier;
pub mod types;
