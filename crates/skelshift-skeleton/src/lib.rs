//! Skeleton model and poses for skelshift.
//!
//! Provides the immutable bone hierarchy ([`Skeleton`]), per-instant poses
//! ([`Pose`]), and adapters that build skeletons from TOML descriptions and
//! URDF kinematic trees.

pub mod desc;
pub mod pose;
pub mod types;
pub mod urdf;

// ---------------------------------------------------------------------------
// Re-exports
// ---------------------------------------------------------------------------

pub use desc::{BoneDesc, SkeletonDesc, load_skeleton};
pub use pose::Pose;
pub use types::{Bone, Skeleton};
pub use urdf::{parse_urdf_file, parse_urdf_string};
