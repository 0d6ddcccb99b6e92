//! Shared primitive types used across the entire engine.

/// Matching key produced by the injected name normalizer.
pub type PhysicianKey = String;

/// Stable facility identifier as supplied by the import collaborator.
pub type FacilityId = String;

/// Free-text roster action label, kept exactly as imported.
pub type ActionLabel = String;

/// Branch / specialty name.
pub type BranchName = String;

/// Days accounted in half-day units (0.5 steps).
pub type DayCount = f64;
