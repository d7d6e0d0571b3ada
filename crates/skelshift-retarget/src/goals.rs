//! IK goal extraction and application.
//!
//! Roles flagged [`ChainMode::Ik`](skelshift_core::config::ChainMode) keep
//! their effector where the source effector is, scaled into the target's
//! proportions. Goals are read off the source pose, then the FK result on the
//! target is corrected by a two-bone solve per goal.

use nalgebra::{UnitQuaternion, Vector3};
use skelshift_core::{ChainRole, FrameError, slerp_rotation};
use skelshift_ik::{LimbChain, TwoBoneSolver};
use skelshift_skeleton::{Pose, Skeleton};

use crate::config::RetargetConfig;
use crate::diagnostics::FrameDiagnostic;

/// World-space goal for one IK-preserved chain, in source units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IkGoal {
    pub role: ChainRole,
    pub position: Vector3<f32>,
    pub orientation: UnitQuaternion<f32>,
    /// Blend weight in `[0, 1]` against the FK result.
    pub weight: f32,
}

/// A target pose after IK correction, with the soft conditions hit on the way.
#[derive(Debug, Clone)]
pub struct AdjustedPose {
    pub pose: Pose,
    pub diagnostics: Vec<FrameDiagnostic>,
}

/// Collect goals for every IK role, in mapping order.
pub fn extract_goals(
    source_pose: &Pose,
    source: &Skeleton,
    config: &RetargetConfig,
) -> Result<Vec<IkGoal>, FrameError> {
    debug_assert_eq!(source_pose.len(), source.len());
    let mut goals = Vec::new();
    for entry in config.mapping().entries() {
        let policy = config
            .policy(entry.role)
            .ok_or(FrameError::UnmappedRoleAtRuntime(entry.role))?;
        if !policy.is_ik() {
            continue;
        }
        let effector = source_pose.global(entry.source_effector);
        goals.push(IkGoal {
            role: entry.role,
            position: effector.translation,
            orientation: effector.rotation,
            weight: policy.ik_weight,
        });
    }
    Ok(goals)
}

/// Drive each goal's target effector onto the scaled goal position.
///
/// Goals the limb cannot reach are solved as far as the limb extends and
/// reported as [`FrameDiagnostic::GoalClamped`].
pub fn apply_goals(
    target_pose: Pose,
    target: &Skeleton,
    goals: &[IkGoal],
    config: &RetargetConfig,
) -> Result<AdjustedPose, FrameError> {
    let solver = TwoBoneSolver::with_defaults();
    let mut pose = target_pose;
    let mut diagnostics = Vec::new();

    for goal in goals {
        let entry = config
            .mapping()
            .get(goal.role)
            .ok_or(FrameError::UnmappedRoleAtRuntime(goal.role))?;
        let policy = config
            .policy(goal.role)
            .ok_or(FrameError::UnmappedRoleAtRuntime(goal.role))?;
        // Mapping validation guarantees two ancestors inside the chain.
        let Some(limb) = LimbChain::from_skeleton(target, entry.target_effector) else {
            continue;
        };

        let position = goal.position * config.translation_ratio();
        let result = solver.solve(target, &pose, &limb, &position);
        if result.clamped {
            tracing::debug!(
                role = %goal.role,
                distance = result.distance,
                max_reach = result.max_reach,
                "IK goal out of reach"
            );
            diagnostics.push(FrameDiagnostic::GoalClamped {
                role: goal.role,
                distance: result.distance,
                min_reach: result.min_reach,
                max_reach: result.max_reach,
            });
        }
        result.apply(target, &mut pose, &limb, goal.weight);

        if policy.pin_effector_rotation {
            let desired = goal.orientation * config.effector_offset(goal.role);
            let current = pose.global(limb.tip).rotation;
            let blended = slerp_rotation(&current, &desired, goal.weight.clamp(0.0, 1.0));
            let local = pose.local_rotation_for(target, limb.tip, &blended);
            pose.set_local_rotation(limb.tip, local);
            pose.recompute_globals(target);
        }
    }

    Ok(AdjustedPose { pose, diagnostics })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use skelshift_core::config::{BoneRange, ChainConfig, RetargetConfigFile, TranslationScale};
    use skelshift_test_utils::skeletons::{BipedProportions, biped};

    use crate::solver::retarget;

    fn arm_file() -> RetargetConfigFile {
        RetargetConfigFile::new()
            .with_chain(ChainConfig::fk(
                ChainRole::Root,
                BoneRange::single("pelvis"),
                BoneRange::single("pelvis"),
            ))
            .with_chain(
                ChainConfig::ik(
                    ChainRole::LeftArm,
                    BoneRange::span("upperarm_l", "hand_l"),
                    BoneRange::span("upperarm_l", "hand_l"),
                )
                .with_ik_weight(0.75),
            )
            .with_chain(ChainConfig::fk(
                ChainRole::Head,
                BoneRange::single("head"),
                BoneRange::single("head"),
            ))
    }

    #[test]
    fn goals_only_for_ik_roles() {
        let skel = biped("", BipedProportions::default());
        let config = RetargetConfig::build(&skel, &skel, &arm_file()).unwrap();
        let pose = Pose::reference(&skel);
        let goals = extract_goals(&pose, &skel, &config).unwrap();

        assert_eq!(goals.len(), 1);
        assert_eq!(goals[0].role, ChainRole::LeftArm);
        assert_relative_eq!(goals[0].weight, 0.75);
        let hand = skel.find_by_name("hand_l").unwrap();
        assert_relative_eq!(goals[0].position, pose.global(hand).translation, epsilon = 1e-6);
    }

    #[test]
    fn goal_position_scaled_by_ratio() {
        let src = biped("", BipedProportions::default());
        let tgt = biped("", BipedProportions::default().scaled(2.0));
        let file = arm_file().with_translation_scale(TranslationScale::Uniform { ratio: 2.0 });
        let config = RetargetConfig::build(&src, &tgt, &file)
            .unwrap()
            .with_policy(ChainRole::LeftArm, crate::config::RolePolicy::ik(ChainRole::LeftArm));

        let src_pose = Pose::reference(&src);
        let goals = extract_goals(&src_pose, &src, &config).unwrap();
        let fk = retarget(&src_pose, &src, &tgt, &config).unwrap();
        let adjusted = apply_goals(fk, &tgt, &goals, &config).unwrap();

        let hand = tgt.find_by_name("hand_l").unwrap();
        assert!(adjusted.diagnostics.is_empty());
        assert_relative_eq!(
            adjusted.pose.global(hand).translation,
            goals[0].position * 2.0,
            epsilon = 1e-4
        );
    }

    #[test]
    fn unreachable_goal_reports_clamp() {
        let skel = biped("", BipedProportions::default());
        let config = RetargetConfig::build(&skel, &skel, &arm_file()).unwrap();
        let pose = Pose::reference(&skel);
        let goal = IkGoal {
            role: ChainRole::LeftArm,
            position: Vector3::new(50.0, 0.0, 0.0),
            orientation: UnitQuaternion::identity(),
            weight: 1.0,
        };
        let adjusted = apply_goals(pose, &skel, &[goal], &config).unwrap();
        assert_eq!(adjusted.diagnostics.len(), 1);
        assert!(matches!(
            adjusted.diagnostics[0],
            FrameDiagnostic::GoalClamped {
                role: ChainRole::LeftArm,
                ..
            }
        ));
    }

    #[test]
    fn goal_for_unmapped_role_fails() {
        let skel = biped("", BipedProportions::default());
        let config = RetargetConfig::build(&skel, &skel, &arm_file()).unwrap();
        let goal = IkGoal {
            role: ChainRole::RightLeg,
            position: Vector3::zeros(),
            orientation: UnitQuaternion::identity(),
            weight: 1.0,
        };
        let err = apply_goals(Pose::reference(&skel), &skel, &[goal], &config).unwrap_err();
        assert_eq!(err, FrameError::UnmappedRoleAtRuntime(ChainRole::RightLeg));
    }

    #[test]
    fn pinned_effector_follows_goal_orientation() {
        let skel = biped("", BipedProportions::default());
        let file = RetargetConfigFile::new().with_chain(
            ChainConfig::ik(
                ChainRole::LeftArm,
                BoneRange::span("upperarm_l", "hand_l"),
                BoneRange::span("upperarm_l", "hand_l"),
            )
            .with_pinned_effector_rotation(),
        );
        let config = RetargetConfig::build(&skel, &skel, &file).unwrap();
        let pose = Pose::reference(&skel);
        let hand = skel.find_by_name("hand_l").unwrap();
        let orientation = UnitQuaternion::from_euler_angles(0.3, -0.2, 0.5);
        let goal = IkGoal {
            role: ChainRole::LeftArm,
            position: pose.global(hand).translation,
            orientation,
            weight: 1.0,
        };
        let adjusted = apply_goals(pose, &skel, &[goal], &config).unwrap();
        assert_relative_eq!(
            adjusted.pose.global(hand).rotation.angle_to(&orientation),
            0.0,
            epsilon = 1e-5
        );
    }
}
