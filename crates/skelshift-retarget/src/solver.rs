//! Rotation-delta retargeting (the FK pass).
//!
//! Motion transfers as each source bone's rotation relative to its own
//! reference pose:
//!
//! ```text
//! delta       = sourceRefLocal⁻¹ · sourceLocal
//! targetLocal = targetRefLocal · delta
//! ```
//!
//! Chains of different lengths are resampled along their length: target bone
//! `j` covers the source interval `[j·n_s/n_t, (j+1)·n_s/n_t)` and composes
//! the source deltas inside it, with fractional powers for partially covered
//! bones. The product over the target chain equals the product over the
//! source chain, so no bend is lost.

use nalgebra::UnitQuaternion;
use skelshift_core::config::UnmappedPolicy;
use skelshift_core::{FrameError, Transform};
use skelshift_skeleton::{Pose, Skeleton};

use crate::config::RetargetConfig;
use crate::mapping::ChainMappingEntry;

/// Overlaps shorter than this are treated as empty.
const SEGMENT_EPSILON: f32 = 1e-5;

/// Source bones covered by target bone `j`, parent first, with the covered
/// fraction of each.
///
/// Equal lengths pair by position: `[(j, 1.0)]`.
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn chain_segments(j: usize, target_len: usize, source_len: usize) -> Vec<(usize, f32)> {
    if target_len == source_len {
        return vec![(j, 1.0)];
    }
    if target_len == 0 || source_len == 0 {
        return Vec::new();
    }
    let step = source_len as f32 / target_len as f32;
    let start = j as f32 * step;
    let end = ((j + 1) as f32 * step).min(source_len as f32);

    let first = (start.floor() as usize).min(source_len - 1);
    let last = (end.ceil() as usize).min(source_len);
    (first..last)
        .filter_map(|i| {
            let covered = end.min((i + 1) as f32) - start.max(i as f32);
            (covered > SEGMENT_EPSILON).then_some((i, covered.min(1.0)))
        })
        .collect()
}

/// Ordered product of fractional source deltas.
fn compose_segments(
    deltas: &[UnitQuaternion<f32>],
    segments: &[(usize, f32)],
) -> UnitQuaternion<f32> {
    segments
        .iter()
        .fold(UnitQuaternion::identity(), |acc, &(i, fraction)| {
            if fraction >= 1.0 - SEGMENT_EPSILON {
                acc * deltas[i]
            } else {
                acc * deltas[i].powf(fraction)
            }
        })
}

/// Rotation of a source bone relative to its reference pose.
fn source_delta(source: &Skeleton, pose: &Pose, bone: usize) -> UnitQuaternion<f32> {
    source.reference_local_transform(bone).rotation.inverse() * pose.local(bone).rotation
}

/// Retarget one source pose onto the target skeleton (no IK).
///
/// Target bones outside every chain keep their reference local transform,
/// or copy the source's rotation delta under [`UnmappedPolicy::PassThrough`].
pub fn retarget(
    source_pose: &Pose,
    source: &Skeleton,
    target: &Skeleton,
    config: &RetargetConfig,
) -> Result<Pose, FrameError> {
    let mut local: Vec<Transform> = target.bones().iter().map(|b| b.reference_local).collect();

    for entry in config.mapping().entries() {
        let policy = config
            .policy(entry.role)
            .ok_or(FrameError::UnmappedRoleAtRuntime(entry.role))?;
        retarget_chain(
            entry,
            source_pose,
            source,
            target,
            policy.preserve_translation,
            config.translation_ratio(),
            &mut local,
        );
    }

    if config.unmapped() == UnmappedPolicy::PassThrough {
        for &(src, tgt) in config.pass_through_pairs() {
            local[tgt].rotation =
                target.reference_local_transform(tgt).rotation * source_delta(source, source_pose, src);
        }
    }

    Ok(Pose::from_local(target, local))
}

fn retarget_chain(
    entry: &ChainMappingEntry,
    source_pose: &Pose,
    source: &Skeleton,
    target: &Skeleton,
    preserve_translation: bool,
    translation_ratio: f32,
    local: &mut [Transform],
) {
    let deltas: Vec<UnitQuaternion<f32>> = entry
        .source
        .iter()
        .map(|&bone| source_delta(source, source_pose, bone))
        .collect();
    let source_len = entry.source.len();
    let target_len = entry.target.len();

    for (j, &bone) in entry.target.iter().enumerate() {
        let segments = chain_segments(j, target_len, source_len);
        let delta = compose_segments(&deltas, &segments);
        local[bone].rotation = target.reference_local_transform(bone).rotation * delta;

        if preserve_translation {
            if let Some(&(first, _)) = segments.first() {
                local[bone].translation =
                    source_pose.local(entry.source[first]).translation * translation_ratio;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Vector3;
    use skelshift_core::ChainRole;
    use skelshift_core::config::{BoneRange, ChainConfig, RetargetConfigFile, TranslationScale};
    use skelshift_test_utils::skeletons::{BipedProportions, biped};

    fn spine_config(src: &Skeleton, tgt: &Skeleton) -> RetargetConfig {
        let file = RetargetConfigFile::new()
            .with_chain(ChainConfig::fk(
                ChainRole::Root,
                BoneRange::single("pelvis"),
                BoneRange::single("pelvis"),
            ))
            .with_chain(ChainConfig::fk(
                ChainRole::Spine,
                BoneRange::span("spine_01", "spine_04"),
                BoneRange::span("spine_01", "spine_02"),
            ));
        RetargetConfig::build(src, tgt, &file).unwrap()
    }

    // ---- chain_segments ----

    #[test]
    fn chain_segments_equal_lengths_pair_by_position() {
        for j in 0..5 {
            assert_eq!(chain_segments(j, 5, 5), vec![(j, 1.0)]);
        }
    }

    #[test]
    fn chain_segments_compress_whole_bones() {
        assert_eq!(chain_segments(0, 2, 4), vec![(0, 1.0), (1, 1.0)]);
        assert_eq!(chain_segments(1, 2, 4), vec![(2, 1.0), (3, 1.0)]);
        assert_eq!(
            chain_segments(0, 1, 4),
            vec![(0, 1.0), (1, 1.0), (2, 1.0), (3, 1.0)]
        );
    }

    #[test]
    fn chain_segments_split_partial_bones() {
        let segments = chain_segments(0, 2, 3);
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0], (0, 1.0));
        assert_eq!(segments[1].0, 1);
        assert_relative_eq!(segments[1].1, 0.5);

        let segments = chain_segments(1, 2, 3);
        assert_eq!(segments[0].0, 1);
        assert_relative_eq!(segments[0].1, 0.5);
        assert_eq!(segments[1], (2, 1.0));
    }

    #[test]
    fn chain_segments_expand_into_fractions() {
        // 2 source bones over 4 target bones: each target bone takes half a source bone
        for j in 0..4 {
            let segments = chain_segments(j, 4, 2);
            assert_eq!(segments.len(), 1);
            assert_eq!(segments[0].0, j / 2);
            assert_relative_eq!(segments[0].1, 0.5);
        }
    }

    #[test]
    fn chain_segments_cover_every_source_bone_once() {
        for (target_len, source_len) in [(2, 5), (3, 7), (5, 3), (1, 6), (4, 4)] {
            let mut covered = vec![0.0f32; source_len];
            for j in 0..target_len {
                for (i, fraction) in chain_segments(j, target_len, source_len) {
                    covered[i] += fraction;
                }
            }
            for total in covered {
                assert_relative_eq!(total, 1.0, epsilon = 1e-4);
            }
        }
    }

    // ---- retarget ----

    #[test]
    fn reference_pose_maps_to_reference_pose() {
        let src = biped("", BipedProportions::default().with_spine_segments(4));
        let tgt = biped("", BipedProportions::default().with_spine_segments(2));
        let config = spine_config(&src, &tgt);
        let out = retarget(&Pose::reference(&src), &src, &tgt, &config).unwrap();
        for i in 0..tgt.len() {
            let expected = tgt.global_reference_transform(i);
            assert_relative_eq!(out.global(i).translation, expected.translation, epsilon = 1e-5);
            assert_relative_eq!(out.global(i).rotation.angle_to(&expected.rotation), 0.0, epsilon = 1e-5);
        }
    }

    #[test]
    fn unequal_chain_keeps_total_curvature() {
        let src = biped("", BipedProportions::default().with_spine_segments(4));
        let tgt = biped("", BipedProportions::default().with_spine_segments(2));
        let config = spine_config(&src, &tgt);

        // bend every source spine bone 10 degrees forward
        let bend = UnitQuaternion::from_axis_angle(&Vector3::x_axis(), 10f32.to_radians());
        let mut pose = Pose::reference(&src);
        for name in ["spine_01", "spine_02", "spine_03", "spine_04"] {
            let i = src.find_by_name(name).unwrap();
            pose.set_local_rotation(i, src.reference_local_transform(i).rotation * bend);
        }
        pose.recompute_globals(&src);

        let out = retarget(&pose, &src, &tgt, &config).unwrap();
        let chest_src = pose.global(src.find_by_name("spine_04").unwrap()).rotation;
        let chest_tgt = out.global(tgt.find_by_name("spine_02").unwrap()).rotation;
        assert_relative_eq!(chest_src.angle(), 40f32.to_radians(), epsilon = 1e-4);
        assert_relative_eq!(chest_tgt.angle_to(&chest_src), 0.0, epsilon = 1e-4);
    }

    fn bend_source(src: &Skeleton, bones: &[&str], degrees: f32) -> Pose {
        let bend = UnitQuaternion::from_axis_angle(&Vector3::x_axis(), degrees.to_radians());
        let mut pose = Pose::reference(src);
        for name in bones {
            let i = src.find_by_name(name).unwrap();
            pose.set_local_rotation(i, src.reference_local_transform(i).rotation * bend);
        }
        pose.recompute_globals(src);
        pose
    }

    #[test]
    fn compressed_chain_keeps_interior_bend() {
        let src = biped("", BipedProportions::default().with_spine_segments(4));
        let tgt = biped("", BipedProportions::default().with_spine_segments(2));
        let config = spine_config(&src, &tgt);
        let pose = bend_source(&src, &["spine_02", "spine_03"], 20.0);

        let out = retarget(&pose, &src, &tgt, &config).unwrap();
        let chest_src = pose.global(src.find_by_name("spine_04").unwrap()).rotation;
        let chest_tgt = out.global(tgt.find_by_name("spine_02").unwrap()).rotation;
        assert_relative_eq!(chest_src.angle(), 40f32.to_radians(), epsilon = 1e-4);
        assert_relative_eq!(chest_tgt.angle_to(&chest_src), 0.0, epsilon = 1e-4);
    }

    #[test]
    fn single_bone_target_collects_whole_chain() {
        let src = biped("", BipedProportions::default().with_spine_segments(4));
        let tgt = biped("", BipedProportions::default().with_spine_segments(1));
        let file = RetargetConfigFile::new().with_chain(ChainConfig::fk(
            ChainRole::Spine,
            BoneRange::span("spine_01", "spine_04"),
            BoneRange::single("spine_01"),
        ));
        let config = RetargetConfig::build(&src, &tgt, &file).unwrap();
        let pose = bend_source(&src, &["spine_04"], 20.0);

        let out = retarget(&pose, &src, &tgt, &config).unwrap();
        let chest_src = pose.global(src.find_by_name("spine_04").unwrap()).rotation;
        let chest_tgt = out.global(tgt.find_by_name("spine_01").unwrap()).rotation;
        assert_relative_eq!(chest_src.angle(), 20f32.to_radians(), epsilon = 1e-4);
        assert_relative_eq!(chest_tgt.angle_to(&chest_src), 0.0, epsilon = 1e-4);
    }

    #[test]
    fn expanded_chain_spreads_bend() {
        let src = biped("", BipedProportions::default().with_spine_segments(2));
        let tgt = biped("", BipedProportions::default().with_spine_segments(4));
        let file = RetargetConfigFile::new().with_chain(ChainConfig::fk(
            ChainRole::Spine,
            BoneRange::span("spine_01", "spine_02"),
            BoneRange::span("spine_01", "spine_04"),
        ));
        let config = RetargetConfig::build(&src, &tgt, &file).unwrap();
        let pose = bend_source(&src, &["spine_02"], 30.0);

        let out = retarget(&pose, &src, &tgt, &config).unwrap();
        for (name, degrees) in [("spine_01", 0.0f32), ("spine_02", 0.0), ("spine_03", 15.0), ("spine_04", 15.0)] {
            let i = tgt.find_by_name(name).unwrap();
            assert_relative_eq!(out.local(i).rotation.angle(), degrees.to_radians(), epsilon = 1e-4);
        }
        let chest_src = pose.global(src.find_by_name("spine_02").unwrap()).rotation;
        let chest_tgt = out.global(tgt.find_by_name("spine_04").unwrap()).rotation;
        assert_relative_eq!(chest_tgt.angle_to(&chest_src), 0.0, epsilon = 1e-4);
    }

    #[test]
    fn root_translation_scaled_by_ratio() {
        let src = biped("", BipedProportions::default());
        let tgt = biped("", BipedProportions::default().with_leg(2.0));
        let file = RetargetConfigFile::new()
            .with_chain(ChainConfig::fk(
                ChainRole::Root,
                BoneRange::single("pelvis"),
                BoneRange::single("pelvis"),
            ))
            .with_translation_scale(TranslationScale::Uniform { ratio: 2.0 });
        let config = RetargetConfig::build(&src, &tgt, &file).unwrap();

        let pelvis = src.find_by_name("pelvis").unwrap();
        let mut pose = Pose::reference(&src);
        let moved = Transform::from_translation(Vector3::new(0.5, 0.9, -0.25));
        pose.set_local(pelvis, moved);
        pose.recompute_globals(&src);

        let out = retarget(&pose, &src, &tgt, &config).unwrap();
        let tgt_pelvis = tgt.find_by_name("pelvis").unwrap();
        assert_relative_eq!(
            out.local(tgt_pelvis).translation,
            Vector3::new(1.0, 1.8, -0.5),
            epsilon = 1e-6
        );
    }

    #[test]
    fn non_translating_roles_keep_reference_translation() {
        let src = biped("", BipedProportions::default().with_spine_segments(4));
        let tgt = biped("", BipedProportions::default().with_spine_segments(2));
        let config = spine_config(&src, &tgt);
        let spine = src.find_by_name("spine_01").unwrap();
        let mut pose = Pose::reference(&src);
        pose.set_local(spine, Transform::from_translation(Vector3::new(5.0, 5.0, 5.0)));
        pose.recompute_globals(&src);

        let out = retarget(&pose, &src, &tgt, &config).unwrap();
        let tgt_spine = tgt.find_by_name("spine_01").unwrap();
        assert_eq!(
            out.local(tgt_spine).translation,
            tgt.reference_local_transform(tgt_spine).translation
        );
    }

    #[test]
    fn missing_policy_is_reported() {
        let src = biped("", BipedProportions::default().with_spine_segments(4));
        let tgt = biped("", BipedProportions::default().with_spine_segments(2));
        let config = spine_config(&src, &tgt).without_policy(ChainRole::Spine);
        assert_eq!(
            retarget(&Pose::reference(&src), &src, &tgt, &config).unwrap_err(),
            FrameError::UnmappedRoleAtRuntime(ChainRole::Spine)
        );
    }

    #[test]
    fn pass_through_copies_accessory_delta() {
        let src = biped("", BipedProportions::default().with_accessory());
        let tgt = biped("", BipedProportions::default().with_accessory().with_arm(1.3));
        let file = RetargetConfigFile::new().with_chain(ChainConfig::fk(
            ChainRole::Root,
            BoneRange::single("pelvis"),
            BoneRange::single("pelvis"),
        ));
        let weapon_src = src.find_by_name("weapon").unwrap();
        let weapon_tgt = tgt.find_by_name("weapon").unwrap();
        let twist = UnitQuaternion::from_axis_angle(&Vector3::y_axis(), 0.6);
        let mut pose = Pose::reference(&src);
        pose.set_local_rotation(weapon_src, twist);
        pose.recompute_globals(&src);

        let reference_only = RetargetConfig::build(&src, &tgt, &file).unwrap();
        let out = retarget(&pose, &src, &tgt, &reference_only).unwrap();
        assert_eq!(out.local(weapon_tgt), tgt.reference_local_transform(weapon_tgt));

        let pass_through = reference_only.with_unmapped(UnmappedPolicy::PassThrough);
        let out = retarget(&pose, &src, &tgt, &pass_through).unwrap();
        assert_relative_eq!(out.local(weapon_tgt).rotation.angle_to(&twist), 0.0, epsilon = 1e-6);
    }
}
