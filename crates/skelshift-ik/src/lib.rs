//! Analytic inverse kinematics for skelshift limbs.
//!
//! Provides closed-form two-bone IK (law of cosines at the mid joint, one
//! aiming rotation at the root joint) over [`Pose`](skelshift_skeleton::Pose)
//! values.
//!
//! # Architecture
//!
//! ```text
//! Skeleton + effector ──► LimbChain ──► TwoBoneSolver ──► local rotations
//! ```
//!
//! The [`LimbChain`] is extracted from a [`Skeleton`](skelshift_skeleton::Skeleton)
//! once per chain. The solver then reads the current pose, takes a world-space
//! target, and produces local rotations for the root and mid joints that
//! callers blend into the pose.

pub mod chain;
pub mod solver;

pub use chain::LimbChain;
pub use solver::{IkResult, TwoBoneConfig, TwoBoneSolver};
