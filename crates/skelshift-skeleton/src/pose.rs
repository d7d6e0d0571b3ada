//! Per-instant bone transforms for one skeleton.

use nalgebra::UnitQuaternion;
use skelshift_core::Transform;

use crate::types::Skeleton;

/// Local transforms (authoritative) plus the globals derived from them.
///
/// Mutating a local marks the globals stale; call
/// [`Pose::recompute_globals`] before reading them again.
#[derive(Debug, Clone, PartialEq)]
pub struct Pose {
    local: Vec<Transform>,
    global: Vec<Transform>,
    stale: bool,
}

impl Pose {
    /// The skeleton's reference pose.
    pub fn reference(skeleton: &Skeleton) -> Self {
        let (local, global) = skeleton
            .bones()
            .iter()
            .map(|b| (b.reference_local, b.reference_global))
            .unzip();
        Self {
            local,
            global,
            stale: false,
        }
    }

    /// Build from local transforms and compose globals.
    ///
    /// # Panics
    ///
    /// Panics if `local.len() != skeleton.len()`.
    pub fn from_local(skeleton: &Skeleton, local: Vec<Transform>) -> Self {
        assert_eq!(
            local.len(),
            skeleton.len(),
            "pose has {} transforms for a skeleton of {} bones",
            local.len(),
            skeleton.len()
        );
        let mut pose = Self {
            global: local.clone(),
            local,
            stale: true,
        };
        pose.recompute_globals(skeleton);
        pose
    }

    pub fn len(&self) -> usize {
        self.local.len()
    }

    pub fn is_empty(&self) -> bool {
        self.local.is_empty()
    }

    pub fn local(&self, index: usize) -> &Transform {
        &self.local[index]
    }

    pub fn locals(&self) -> &[Transform] {
        &self.local
    }

    /// World-space transform of a bone.
    pub fn global(&self, index: usize) -> &Transform {
        debug_assert!(!self.stale, "pose globals read before recompute_globals");
        &self.global[index]
    }

    pub fn globals(&self) -> &[Transform] {
        debug_assert!(!self.stale, "pose globals read before recompute_globals");
        &self.global
    }

    /// Whether locals changed since the last recompute.
    pub const fn is_stale(&self) -> bool {
        self.stale
    }

    pub fn set_local(&mut self, index: usize, transform: Transform) {
        self.local[index] = transform;
        self.stale = true;
    }

    pub fn set_local_rotation(&mut self, index: usize, rotation: UnitQuaternion<f32>) {
        self.local[index].rotation = rotation;
        self.stale = true;
    }

    /// Compose globals top-down along the skeleton's evaluation order.
    pub fn recompute_globals(&mut self, skeleton: &Skeleton) {
        for &i in skeleton.evaluation_order() {
            self.global[i] = match skeleton.parent(i) {
                Some(p) => self.global[p].compose(&self.local[i]),
                None => self.local[i],
            };
        }
        self.stale = false;
    }

    /// Local rotation that gives bone `index` the world rotation `global`,
    /// given the current globals of its parent.
    pub fn local_rotation_for(
        &self,
        skeleton: &Skeleton,
        index: usize,
        global: &UnitQuaternion<f32>,
    ) -> UnitQuaternion<f32> {
        match skeleton.parent(index) {
            Some(p) => self.global(p).rotation.inverse() * global,
            None => *global,
        }
    }

    pub fn into_local(self) -> Vec<Transform> {
        self.local
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
