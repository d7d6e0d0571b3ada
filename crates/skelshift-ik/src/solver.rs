//! Analytic two-bone IK.
//!
//! Solves a [`LimbChain`] in closed form: the law of cosines sets the mid
//! joint's interior angle for the requested root → target distance, then a
//! single rotation at the root joint aims the limb at the target. Distances
//! outside `[|l1 - l2|, l1 + l2]` are clamped and flagged.

use nalgebra::{Unit, UnitQuaternion, Vector3};
use skelshift_core::slerp_rotation;
use skelshift_skeleton::{Pose, Skeleton};

use crate::chain::LimbChain;

/// Configuration for the two-bone solver.
#[derive(Debug, Clone, Copy)]
pub struct TwoBoneConfig {
    /// Slack on the reach range before a target counts as clamped.
    pub reach_tolerance: f32,
    /// Segments shorter than this are treated as degenerate.
    pub min_segment_length: f32,
}

impl Default for TwoBoneConfig {
    fn default() -> Self {
        Self {
            reach_tolerance: 1e-5,
            min_segment_length: 1e-6,
        }
    }
}

/// Result of a two-bone solve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IkResult {
    /// Solved local rotation of the root joint.
    pub root_rotation: UnitQuaternion<f32>,
    /// Solved local rotation of the mid joint.
    pub mid_rotation: UnitQuaternion<f32>,
    /// World position the tip reaches with the solved rotations.
    pub reached: Vector3<f32>,
    /// Requested root → target distance.
    pub distance: f32,
    /// Shortest reachable distance.
    pub min_reach: f32,
    /// Longest reachable distance.
    pub max_reach: f32,
    /// Whether the target was outside the reachable range.
    pub clamped: bool,
}

impl IkResult {
    /// Write the solved rotations into `pose`, blended against the pose's
    /// current rotations by `weight` in `[0, 1]`, and recompute globals.
    pub fn apply(&self, skeleton: &Skeleton, pose: &mut Pose, limb: &LimbChain, weight: f32) {
        let w = weight.clamp(0.0, 1.0);
        let root = slerp_rotation(&pose.local(limb.root).rotation, &self.root_rotation, w);
        let mid = slerp_rotation(&pose.local(limb.mid).rotation, &self.mid_rotation, w);
        pose.set_local_rotation(limb.root, root);
        pose.set_local_rotation(limb.mid, mid);
        pose.recompute_globals(skeleton);
    }
}

/// Closed-form two-bone solver.
#[derive(Debug, Clone, Copy, Default)]
pub struct TwoBoneSolver {
    config: TwoBoneConfig,
}

impl TwoBoneSolver {
    /// Create a new solver with the given configuration.
    pub const fn new(config: TwoBoneConfig) -> Self {
        Self { config }
    }

    /// Create a solver with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(TwoBoneConfig::default())
    }

    /// Solve `limb` so its tip reaches `target` (world space).
    ///
    /// Segment lengths come from `pose`, so scaled bones are honored. The
    /// pose itself is not modified; see [`IkResult::apply`].
    #[allow(clippy::cast_possible_truncation)]
    pub fn solve(
        &self,
        skeleton: &Skeleton,
        pose: &Pose,
        limb: &LimbChain,
        target: &Vector3<f32>,
    ) -> IkResult {
        let [a, b, c] = limb.positions(pose);
        let upper = (b - a).norm();
        let lower = (c - b).norm();
        let min_reach = (upper - lower).abs();
        let max_reach = upper + lower;

        let to_target = target - a;
        let distance = to_target.norm();
        let clamped = distance > max_reach + self.config.reach_tolerance
            || distance < min_reach - self.config.reach_tolerance;

        let eps = self.config.min_segment_length;
        if upper < eps || lower < eps {
            return IkResult {
                root_rotation: pose.local(limb.root).rotation,
                mid_rotation: pose.local(limb.mid).rotation,
                reached: c,
                distance,
                min_reach,
                max_reach,
                clamped,
            };
        }
        let reach = distance.clamp(min_reach, max_reach);

        // Mid joint: bend until the root → tip distance equals `reach`.
        let ba = a - b;
        let bc = c - b;
        let tolerance = self.config.reach_tolerance;
        let desired_angle = if reach >= max_reach - tolerance {
            std::f64::consts::PI
        } else if reach <= min_reach + tolerance {
            0.0
        } else {
            interior_angle(upper, lower, reach)
        };
        let axis = bend_axis(&ba, &bc, eps);
        let mid_delta = UnitQuaternion::from_axis_angle(
            &axis,
            (desired_angle - vector_angle(&ba, &bc)) as f32,
        );
        let bent_tip = b + mid_delta * bc;

        // Root joint: swing the bent limb onto the target direction.
        let root_delta = if distance > eps {
            aim(&(bent_tip - a), &to_target, eps)
        } else {
            UnitQuaternion::identity()
        };

        let root_global = root_delta * pose.global(limb.root).rotation;
        let mid_global = root_delta * mid_delta * pose.global(limb.mid).rotation;

        IkResult {
            root_rotation: pose.local_rotation_for(skeleton, limb.root, &root_global),
            mid_rotation: root_global.inverse() * mid_global,
            reached: a + root_delta * (bent_tip - a),
            distance,
            min_reach,
            max_reach,
            clamped,
        }
    }
}

/// Mid-joint angle opposite `reach` by the law of cosines, in f64 so that
/// nearly straight limbs keep their precision.
fn interior_angle(upper: f32, lower: f32, reach: f32) -> f64 {
    let (u, l, r) = (f64::from(upper), f64::from(lower), f64::from(reach));
    ((u * u + l * l - r * r) / (2.0 * u * l)).clamp(-1.0, 1.0).acos()
}

/// Angle between two vectors via `atan2`, exact at 0 and π.
fn vector_angle(a: &Vector3<f32>, b: &Vector3<f32>) -> f64 {
    let a = a.cast::<f64>();
    let b = b.cast::<f64>();
    a.cross(&b).norm().atan2(a.dot(&b))
}

/// Normal of the plane the limb bends in. A straight or fully folded limb
/// has no plane, so any direction perpendicular to the upper segment works.
fn bend_axis(ba: &Vector3<f32>, bc: &Vector3<f32>, eps: f32) -> Unit<Vector3<f32>> {
    let normal = ba.cross(bc);
    if normal.norm() > eps * ba.norm().max(1.0) {
        Unit::new_normalize(normal)
    } else {
        Unit::new_normalize(any_orthogonal(ba))
    }
}

/// Shortest rotation taking direction `from` onto direction `to`.
fn aim(from: &Vector3<f32>, to: &Vector3<f32>, eps: f32) -> UnitQuaternion<f32> {
    if from.norm() < eps || to.norm() < eps {
        return UnitQuaternion::identity();
    }
    UnitQuaternion::rotation_between(from, to).unwrap_or_else(|| {
        // Opposite directions: half turn about any perpendicular axis.
        UnitQuaternion::from_axis_angle(
            &Unit::new_normalize(any_orthogonal(from)),
            std::f32::consts::PI,
        )
    })
}

/// A vector perpendicular to `v`, built against the world axis least aligned with it.
fn any_orthogonal(v: &Vector3<f32>) -> Vector3<f32> {
    let helper = if v.x.abs() <= v.y.abs() && v.x.abs() <= v.z.abs() {
        Vector3::x()
    } else if v.y.abs() <= v.z.abs() {
        Vector3::y()
    } else {
        Vector3::z()
    };
    v.cross(&helper)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::Rng;
    use skelshift_test_utils::rng::seeded_rng;
    use skelshift_test_utils::skeletons::{bent_arm, planar_arm};

    fn arm_setup(skel: &Skeleton) -> (Pose, LimbChain) {
        let wrist = skel.find_by_name("wrist").unwrap();
        (
            Pose::reference(skel),
            LimbChain::from_skeleton(skel, wrist).unwrap(),
        )
    }

    fn solve_and_apply(skel: &Skeleton, target: Vector3<f32>) -> (Pose, LimbChain, IkResult) {
        let (mut pose, limb) = arm_setup(skel);
        let result = TwoBoneSolver::with_defaults().solve(skel, &pose, &limb, &target);
        result.apply(skel, &mut pose, &limb, 1.0);
        (pose, limb, result)
    }

    // ---- Reachable targets ----

    #[test]
    fn reaches_target_from_straight_limb() {
        let skel = planar_arm(0.3, 0.25);
        let shoulder = skel.global_reference_transform(skel.find_by_name("shoulder").unwrap());
        let target = shoulder.translation + Vector3::new(0.3, 0.2, 0.0);
        let (pose, limb, result) = solve_and_apply(&skel, target);

        assert!(!result.clamped);
        assert_relative_eq!(pose.global(limb.tip).translation, target, epsilon = 1e-4);
        assert_relative_eq!(result.reached, target, epsilon = 1e-4);
    }

    #[test]
    fn reaches_target_from_bent_limb() {
        let skel = bent_arm(0.3, 0.25, 0.8);
        let shoulder = skel.global_reference_transform(skel.find_by_name("shoulder").unwrap());
        let target = shoulder.translation + Vector3::new(0.1, -0.25, 0.2);
        let (pose, limb, result) = solve_and_apply(&skel, target);

        assert!(!result.clamped);
        assert_relative_eq!(pose.global(limb.tip).translation, target, epsilon = 1e-4);
    }

    #[test]
    fn segment_lengths_preserved() {
        let skel = bent_arm(0.3, 0.25, 0.4);
        let shoulder = skel.global_reference_transform(skel.find_by_name("shoulder").unwrap());
        let target = shoulder.translation + Vector3::new(-0.2, 0.1, 0.3);
        let (pose, limb, _) = solve_and_apply(&skel, target);

        let [a, b, c] = limb.positions(&pose);
        assert_relative_eq!((b - a).norm(), 0.3, epsilon = 1e-5);
        assert_relative_eq!((c - b).norm(), 0.25, epsilon = 1e-5);
    }

    #[test]
    fn random_reachable_targets() {
        let skel = bent_arm(0.4, 0.3, 0.5);
        let mut rng = seeded_rng(7);
        let shoulder = skel
            .global_reference_transform(skel.find_by_name("shoulder").unwrap())
            .translation;

        for _ in 0..50 {
            let dir = Vector3::new(
                rng.gen_range(-1.0f32..1.0),
                rng.gen_range(-1.0f32..1.0),
                rng.gen_range(-1.0f32..1.0),
            );
            if dir.norm() < 0.1 {
                continue;
            }
            let dist = rng.gen_range(0.15f32..0.65);
            let target = shoulder + dir.normalize() * dist;
            let (pose, limb, result) = solve_and_apply(&skel, target);
            assert!(!result.clamped);
            assert_relative_eq!(pose.global(limb.tip).translation, target, epsilon = 1e-3);
        }
    }

    #[test]
    fn nearly_straight_limb_stays_straight() {
        let skel = planar_arm(0.45, 0.42);
        let (mut pose, limb) = arm_setup(&skel);
        let swing = UnitQuaternion::from_axis_angle(
            &Unit::new_normalize(Vector3::new(1.0, 2.0, 3.0)),
            0.9,
        );
        pose.set_local_rotation(limb.root, pose.local(limb.root).rotation * swing);
        pose.recompute_globals(&skel);
        let elbow_before = pose.local(limb.mid).rotation;

        // just inside full extension, well within the reach tolerance
        let [a, _, c] = limb.positions(&pose);
        let target = c - (c - a).normalize() * 5e-7;
        let result = TwoBoneSolver::with_defaults().solve(&skel, &pose, &limb, &target);
        result.apply(&skel, &mut pose, &limb, 1.0);

        assert!(!result.clamped);
        assert_relative_eq!(pose.global(limb.tip).translation, c, epsilon = 1e-5);
        assert_relative_eq!(pose.local(limb.mid).rotation.angle_to(&elbow_before), 0.0, epsilon = 1e-4);
    }

    #[test]
    fn interior_angle_matches_law_of_cosines() {
        assert_relative_eq!(interior_angle(0.3, 0.4, 0.5), std::f64::consts::FRAC_PI_2, epsilon = 1e-6);
        assert_relative_eq!(vector_angle(&Vector3::x(), &(-Vector3::x())), std::f64::consts::PI);
        assert_relative_eq!(vector_angle(&Vector3::x(), &Vector3::y()), std::f64::consts::FRAC_PI_2, epsilon = 1e-12);
    }

    // ---- Unreachable targets ----

    #[test]
    fn over_reach_clamps_to_full_extension() {
        let skel = bent_arm(0.3, 0.25, 0.6);
        let shoulder = skel
            .global_reference_transform(skel.find_by_name("shoulder").unwrap())
            .translation;
        let target = shoulder + Vector3::new(2.0, 0.0, 0.0);
        let (pose, limb, result) = solve_and_apply(&skel, target);

        assert!(result.clamped);
        assert_relative_eq!(result.max_reach, 0.55, epsilon = 1e-5);
        let tip = pose.global(limb.tip).translation;
        assert_relative_eq!((tip - shoulder).norm(), 0.55, epsilon = 1e-4);
        // still pointing at the target
        assert_relative_eq!((tip - shoulder).normalize(), Vector3::x(), epsilon = 1e-4);
    }

    #[test]
    fn under_reach_clamps_to_fold() {
        let skel = bent_arm(0.3, 0.25, 0.6);
        let shoulder = skel
            .global_reference_transform(skel.find_by_name("shoulder").unwrap())
            .translation;
        let target = shoulder + Vector3::new(0.0, 0.01, 0.0);
        let (pose, limb, result) = solve_and_apply(&skel, target);

        assert!(result.clamped);
        let tip = pose.global(limb.tip).translation;
        assert_relative_eq!((tip - shoulder).norm(), 0.05, epsilon = 1e-4);
    }

    // ---- Blending ----

    #[test]
    fn zero_weight_leaves_pose_unchanged() {
        let skel = bent_arm(0.3, 0.25, 0.6);
        let (mut pose, limb) = arm_setup(&skel);
        let before = pose.clone();
        let result = TwoBoneSolver::with_defaults().solve(
            &skel,
            &pose,
            &limb,
            &Vector3::new(0.1, 1.0, 0.2),
        );
        result.apply(&skel, &mut pose, &limb, 0.0);
        for i in 0..skel.len() {
            assert_relative_eq!(
                pose.global(i).translation,
                before.global(i).translation,
                epsilon = 1e-6
            );
        }
    }

    // ---- Helpers ----

    #[test]
    fn any_orthogonal_is_perpendicular() {
        for v in [
            Vector3::x(),
            Vector3::new(0.0, 3.0, 0.0),
            Vector3::new(1.0, 1.0, 1.0),
            Vector3::new(0.0, 0.0, -2.0),
        ] {
            let o = any_orthogonal(&v);
            assert!(o.norm() > 1e-3);
            assert_relative_eq!(o.dot(&v), 0.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn aim_handles_opposite_directions() {
        let q = aim(&Vector3::x(), &(-Vector3::x()), 1e-6);
        assert_relative_eq!(q * Vector3::x(), -Vector3::x(), epsilon = 1e-5);
    }
}
