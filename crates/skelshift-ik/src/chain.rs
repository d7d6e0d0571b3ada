//! Three-bone limbs extracted from a [`Skeleton`].
//!
//! A [`LimbChain`] names the effector (tip), its parent (mid joint) and its
//! grandparent (root joint). The two segments between them are what the
//! two-bone solver rotates.

use nalgebra::Vector3;
use skelshift_core::Transform;
use skelshift_skeleton::{Pose, Skeleton};

/// Effector plus its two ancestors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LimbChain {
    /// Grandparent of the effector (shoulder, hip).
    pub root: usize,
    /// Parent of the effector (elbow, knee).
    pub mid: usize,
    /// The effector itself (wrist, ankle).
    pub tip: usize,
    /// Reference-pose length root → mid.
    pub upper_length: f32,
    /// Reference-pose length mid → tip.
    pub lower_length: f32,
}

impl LimbChain {
    /// Build the limb ending at `tip`.
    ///
    /// Returns `None` if `tip` has fewer than two ancestors.
    pub fn from_skeleton(skeleton: &Skeleton, tip: usize) -> Option<Self> {
        let mid = skeleton.parent(tip)?;
        let root = skeleton.parent(mid)?;
        Some(Self {
            root,
            mid,
            tip,
            upper_length: skeleton.reference_distance(root, mid),
            lower_length: skeleton.reference_distance(mid, tip),
        })
    }

    /// Bone indices root → tip.
    pub const fn bones(&self) -> [usize; 3] {
        [self.root, self.mid, self.tip]
    }

    /// Bone names root → tip.
    pub fn bone_names<'a>(&self, skeleton: &'a Skeleton) -> [&'a str; 3] {
        self.bones().map(|i| skeleton.name(i))
    }

    /// Distance range the tip can reach from the root joint in the reference pose.
    pub fn reference_reach(&self) -> (f32, f32) {
        (
            (self.upper_length - self.lower_length).abs(),
            self.upper_length + self.lower_length,
        )
    }

    /// Current world positions of root, mid and tip.
    pub fn positions(&self, pose: &Pose) -> [Vector3<f32>; 3] {
        self.bones().map(|i| pose.global(i).translation)
    }

    /// Current world transforms of root, mid and tip.
    pub fn globals(&self, pose: &Pose) -> [Transform; 3] {
        self.bones().map(|i| *pose.global(i))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
