//! Shared test fixtures and utilities for skelshift crates.
//!
//! Provides reusable skeleton builders (arms, bipeds, random hierarchies)
//! and deterministic RNG setup.

pub mod rng;
pub mod skeletons;

// ---------------------------------------------------------------------------
// Re-exports for convenience
// ---------------------------------------------------------------------------

pub use rng::seeded_rng;
pub use skeletons::{BipedProportions, bent_arm, biped, planar_arm, random_hierarchy};
