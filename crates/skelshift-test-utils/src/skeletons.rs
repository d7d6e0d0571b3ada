//! Skeleton fixtures.
//!
//! All fixtures are Y-up with the root bone at the world origin (ground
//! level). They panic on invalid input since they only serve tests.

use std::collections::HashMap;

use nalgebra::{UnitQuaternion, Vector3};
use rand::Rng;
use rand::seq::SliceRandom;
use skelshift_core::Transform;
use skelshift_skeleton::Skeleton;

use crate::rng::random_rotation;

/// Build a skeleton from `(name, parent name, reference local)` triples.
///
/// # Panics
///
/// Panics if a parent name is unknown or the hierarchy is invalid.
pub fn skeleton_from_bones(bones: &[(String, Option<String>, Transform)]) -> Skeleton {
    let index: HashMap<&str, usize> = bones
        .iter()
        .enumerate()
        .map(|(i, (name, _, _))| (name.as_str(), i))
        .collect();
    let parents = bones
        .iter()
        .map(|(name, parent, _)| {
            parent.as_ref().map(|p| {
                *index
                    .get(p.as_str())
                    .unwrap_or_else(|| panic!("bone {name} has unknown parent {p}"))
            })
        })
        .collect();
    Skeleton::build(
        bones.iter().map(|(n, _, _)| n.clone()).collect(),
        parents,
        bones.iter().map(|(_, _, t)| *t).collect(),
    )
    .expect("fixture hierarchy must be valid")
}

fn offset(x: f32, y: f32, z: f32) -> Transform {
    Transform::from_translation(Vector3::new(x, y, z))
}

// ---------------------------------------------------------------------------
// Arms
// ---------------------------------------------------------------------------

/// `root → shoulder → elbow → wrist`, shoulder at height 1.5, arm straight along +x.
pub fn planar_arm(upper: f32, lower: f32) -> Skeleton {
    bent_arm(upper, lower, 0.0)
}

/// Like [`planar_arm`], with the elbow's reference rotation bent by `bend`
/// radians about +z.
pub fn bent_arm(upper: f32, lower: f32, bend: f32) -> Skeleton {
    let bones = [
        ("root", None, Transform::identity()),
        ("shoulder", Some("root"), offset(0.0, 1.5, 0.0)),
        (
            "elbow",
            Some("shoulder"),
            Transform::from_parts(
                Vector3::new(upper, 0.0, 0.0),
                UnitQuaternion::from_axis_angle(&Vector3::z_axis(), bend),
            ),
        ),
        ("wrist", Some("elbow"), offset(lower, 0.0, 0.0)),
    ];
    skeleton_from_bones(
        &bones
            .into_iter()
            .map(|(n, p, t)| (n.to_owned(), p.map(str::to_owned), t))
            .collect::<Vec<_>>(),
    )
}

// ---------------------------------------------------------------------------
// Biped
// ---------------------------------------------------------------------------

/// Segment scales for [`biped`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BipedProportions {
    /// Leg length multiplier (hip height is `0.98 * leg`).
    pub leg: f32,
    /// Arm length multiplier.
    pub arm: f32,
    /// Torso length multiplier.
    pub torso: f32,
    /// Number of spine bones between pelvis and neck.
    pub spine_segments: usize,
    /// Adds a `weapon` bone under the right hand.
    pub accessory: bool,
}

impl Default for BipedProportions {
    fn default() -> Self {
        Self {
            leg: 1.0,
            arm: 1.0,
            torso: 1.0,
            spine_segments: 3,
            accessory: false,
        }
    }
}

impl BipedProportions {
    #[must_use]
    pub const fn with_leg(mut self, leg: f32) -> Self {
        self.leg = leg;
        self
    }

    #[must_use]
    pub const fn with_arm(mut self, arm: f32) -> Self {
        self.arm = arm;
        self
    }

    #[must_use]
    pub const fn with_torso(mut self, torso: f32) -> Self {
        self.torso = torso;
        self
    }

    #[must_use]
    pub const fn with_spine_segments(mut self, segments: usize) -> Self {
        self.spine_segments = segments;
        self
    }

    #[must_use]
    pub const fn with_accessory(mut self) -> Self {
        self.accessory = true;
        self
    }

    /// Scale every segment uniformly.
    #[must_use]
    pub const fn scaled(mut self, factor: f32) -> Self {
        self.leg *= factor;
        self.arm *= factor;
        self.torso *= factor;
        self
    }

    /// Pelvis height above the ground in the reference pose.
    pub fn hip_height(&self) -> f32 {
        0.98 * self.leg
    }
}

/// Humanoid with names `{prefix}pelvis`, `{prefix}spine_01..`, `{prefix}thigh_l`,
/// `{prefix}calf_l`, `{prefix}foot_l`, `{prefix}toe_l`, `{prefix}clavicle_l`,
/// `{prefix}upperarm_l`, `{prefix}lowerarm_l`, `{prefix}hand_l` (and `_r`),
/// `{prefix}neck`, `{prefix}head` under `{prefix}root`.
///
/// Toes touch the ground (height 0) in the reference pose.
#[allow(clippy::cast_precision_loss)]
pub fn biped(prefix: &str, props: BipedProportions) -> Skeleton {
    let n = |s: &str| format!("{prefix}{s}");
    let l = props.leg;
    let a = props.arm;
    let t = props.torso;
    let segments = props.spine_segments.max(1);
    let spine_step = 0.45 * t / segments as f32;

    let mut bones: Vec<(String, Option<String>, Transform)> = vec![
        (n("root"), None, Transform::identity()),
        (n("pelvis"), Some(n("root")), offset(0.0, props.hip_height(), 0.0)),
    ];

    let mut parent = n("pelvis");
    for i in 1..=segments {
        let name = n(&format!("spine_{i:02}"));
        bones.push((name.clone(), Some(parent), offset(0.0, spine_step, 0.0)));
        parent = name;
    }
    let chest = parent;
    bones.push((n("neck"), Some(chest.clone()), offset(0.0, spine_step, 0.0)));
    bones.push((n("head"), Some(n("neck")), offset(0.0, 0.1 * t, 0.0)));

    for (side, sign) in [("l", 1.0f32), ("r", -1.0)] {
        let s = |base: &str| n(&format!("{base}_{side}"));
        bones.push((s("thigh"), Some(n("pelvis")), offset(sign * 0.1 * l, -0.05 * l, 0.0)));
        bones.push((s("calf"), Some(s("thigh")), offset(0.0, -0.42 * l, 0.0)));
        bones.push((s("foot"), Some(s("calf")), offset(0.0, -0.43 * l, 0.0)));
        bones.push((s("toe"), Some(s("foot")), offset(0.0, -0.08 * l, 0.12 * l)));

        bones.push((s("clavicle"), Some(chest.clone()), offset(sign * 0.05 * t, 0.0, 0.0)));
        bones.push((s("upperarm"), Some(s("clavicle")), offset(sign * 0.12 * t, 0.0, 0.0)));
        bones.push((s("lowerarm"), Some(s("upperarm")), offset(sign * 0.3 * a, 0.0, 0.0)));
        bones.push((s("hand"), Some(s("lowerarm")), offset(sign * 0.25 * a, 0.0, 0.0)));
    }

    if props.accessory {
        bones.push((n("weapon"), Some(n("hand_r")), offset(-0.1 * a, 0.0, 0.05 * a)));
    }

    skeleton_from_bones(&bones)
}

// ---------------------------------------------------------------------------
// Random hierarchies
// ---------------------------------------------------------------------------

/// Random tree of `bones` bones named `bone_<k>`, where `bone_0` is the root
/// and `bone_k`'s parent is some `bone_j` with `j < k`. The arena order is
/// shuffled, so parents do not generally precede children in index order.
///
/// # Panics
///
/// Panics if `bones == 0`.
pub fn random_hierarchy(rng: &mut impl Rng, bones: usize) -> Skeleton {
    assert!(bones > 0, "random_hierarchy needs at least one bone");
    let logical_parent: Vec<Option<usize>> = (0..bones)
        .map(|k| (k > 0).then(|| rng.gen_range(0..k)))
        .collect();

    let mut slots: Vec<usize> = (0..bones).collect();
    slots.shuffle(rng);

    let mut entries = Vec::with_capacity(bones);
    for &k in &slots {
        let translation = Vector3::new(
            rng.gen_range(-0.5f32..0.5),
            rng.gen_range(0.1f32..0.6),
            rng.gen_range(-0.5f32..0.5),
        );
        entries.push((
            format!("bone_{k}"),
            logical_parent[k].map(|p| format!("bone_{p}")),
            Transform::from_parts(translation, random_rotation(rng, 1.0)),
        ));
    }
    skeleton_from_bones(&entries)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::seeded_rng;

    #[test]
    fn planar_arm_layout() {
        let skel = planar_arm(0.3, 0.25);
        let wrist = skel.find_by_name("wrist").unwrap();
        let pos = skel.global_reference_transform(wrist).translation;
        assert!((pos - Vector3::new(0.55, 1.5, 0.0)).norm() < 1e-6);
    }

    #[test]
    fn biped_toes_touch_ground() {
        for leg in [0.6, 1.0, 1.7] {
            let skel = biped("", BipedProportions::default().with_leg(leg));
            for toe in ["toe_l", "toe_r"] {
                let i = skel.find_by_name(toe).unwrap();
                assert!(skel.global_reference_transform(i).translation.y.abs() < 1e-5);
            }
        }
    }

    #[test]
    fn biped_prefix_and_accessory() {
        let skel = biped("tgt_", BipedProportions::default().with_accessory());
        assert_eq!(skel.name(skel.root()), "tgt_root");
        assert!(skel.find_by_name("tgt_weapon").is_some());
        assert!(skel.find_by_name("tgt_spine_03").is_some());
        assert!(skel.find_by_name("tgt_spine_04").is_none());
    }

    #[test]
    fn biped_spine_segments() {
        let skel = biped("", BipedProportions::default().with_spine_segments(5));
        let chest = skel.find_by_name("spine_05").unwrap();
        let pelvis = skel.find_by_name("pelvis").unwrap();
        assert_eq!(skel.path_between(pelvis, chest).map(|p| p.len()), Some(6));
    }

    #[test]
    fn random_hierarchy_is_valid_and_reproducible() {
        let a = random_hierarchy(&mut seeded_rng(5), 40);
        let b = random_hierarchy(&mut seeded_rng(5), 40);
        assert_eq!(a.len(), 40);
        assert_eq!(a.name(a.root()), "bone_0");
        for i in 0..a.len() {
            assert_eq!(a.name(i), b.name(i));
        }
    }
}
