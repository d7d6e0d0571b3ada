//! Skeleton-to-skeleton animation retargeting.
//!
//! Transfers animation between rigs with different proportions and bone
//! counts by mapping named chains, transferring rotation deltas relative to
//! each rig's reference pose, and correcting IK-preserved effectors with an
//! analytic two-bone solve.
//!
//! # Pipeline
//!
//! ```text
//! AnimationSource ──► PoseSampler ──► retarget (FK) ──► apply_goals (IK) ──► RetargetFrame
//!                          │                                  ▲
//!                          └──────────► extract_goals ────────┘
//! ```
//!
//! [`RetargetConfig`] is built once from a [`RetargetConfigFile`](skelshift_core::config::RetargetConfigFile)
//! and both skeletons; [`RetargetSession`] then runs any number of
//! animations through it, lazily, in parallel or as a batch.

pub mod clip;
pub mod config;
pub mod diagnostics;
pub mod goals;
pub mod mapping;
pub mod sampler;
pub mod session;
pub mod solver;
pub mod suggest;

#[cfg(test)]
mod integration;

// ---------------------------------------------------------------------------
// Re-exports
// ---------------------------------------------------------------------------

pub use clip::{BoneTrack, KeyframeClip, RetargetedClip, TransformKey};
pub use config::{RetargetConfig, RolePolicy, translation_ratio, unscaled_size_mismatch};
pub use diagnostics::FrameDiagnostic;
pub use goals::{AdjustedPose, IkGoal, apply_goals, extract_goals};
pub use mapping::{ChainMapping, ChainMappingEntry};
pub use sampler::{AnimationSource, PoseSampler, SampledPose};
pub use session::{Frames, RetargetFrame, RetargetReport, RetargetSession};
pub use solver::{chain_segments, retarget};
pub use suggest::{BonePairSuggestion, normalize_bone_name, suggest_bone_pairs};

pub mod prelude {
    pub use crate::{
        AnimationSource, ChainMapping, FrameDiagnostic, KeyframeClip, RetargetConfig,
        RetargetFrame, RetargetSession, RetargetedClip,
    };
    pub use skelshift_core::prelude::*;
    pub use skelshift_skeleton::{Pose, Skeleton};
}
