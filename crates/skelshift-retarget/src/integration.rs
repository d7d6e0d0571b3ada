//! End-to-end tests: TOML skeleton, configuration and clip documents through
//! a session and back.

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use nalgebra::{UnitQuaternion, Vector3};
    use skelshift_core::config::RetargetConfigFile;
    use skelshift_skeleton::{Skeleton, SkeletonDesc};
    use skelshift_test_utils::skeletons::{BipedProportions, biped};

    use crate::clip::KeyframeClip;
    use crate::config::RetargetConfig;
    use crate::sampler::AnimationSource;
    use crate::session::RetargetSession;
    use crate::suggest::suggest_bone_pairs;

    // -----------------------------------------------------------------------
    // Fixtures
    // -----------------------------------------------------------------------

    const MOCAP_RIG: &str = r#"
        name = "mocap"

        [[bones]]
        name = "Hips"
        translation = [0.0, 1.0, 0.0]

        [[bones]]
        name = "Spine"
        parent = "Hips"
        translation = [0.0, 0.15, 0.0]

        [[bones]]
        name = "Chest"
        parent = "Spine"
        translation = [0.0, 0.15, 0.0]

        [[bones]]
        name = "Neck"
        parent = "Chest"
        translation = [0.0, 0.2, 0.0]

        [[bones]]
        name = "Head"
        parent = "Neck"
        translation = [0.0, 0.1, 0.0]

        [[bones]]
        name = "LeftArm"
        parent = "Chest"
        translation = [0.18, 0.15, 0.0]

        [[bones]]
        name = "LeftForeArm"
        parent = "LeftArm"
        translation = [0.28, 0.0, 0.0]

        [[bones]]
        name = "LeftHand"
        parent = "LeftForeArm"
        translation = [0.25, 0.0, 0.0]

        [[bones]]
        name = "LeftUpLeg"
        parent = "Hips"
        translation = [0.1, -0.05, 0.0]

        [[bones]]
        name = "LeftLeg"
        parent = "LeftUpLeg"
        translation = [0.0, -0.45, 0.0]

        [[bones]]
        name = "LeftFoot"
        parent = "LeftLeg"
        translation = [0.0, -0.42, 0.0]

        [[bones]]
        name = "RightUpLeg"
        parent = "Hips"
        translation = [-0.1, -0.05, 0.0]

        [[bones]]
        name = "RightLeg"
        parent = "RightUpLeg"
        translation = [0.0, -0.45, 0.0]

        [[bones]]
        name = "RightFoot"
        parent = "RightLeg"
        translation = [0.0, -0.42, 0.0]
    "#;

    const MAPPING: &str = r#"
        [settings]
        sample_rate = 30.0

        [translation_scale]
        mode = "reference_bones"
        source_root = "LeftUpLeg"
        source_effector = "LeftFoot"
        target_root = "thigh_l"
        target_effector = "foot_l"

        [[chains]]
        role = "root"
        source = ["Hips"]
        target = ["pelvis"]

        [[chains]]
        role = "spine"
        source = { start = "Spine", end = "Chest" }
        target = { start = "spine_01", end = "spine_02" }

        [[chains]]
        role = "head"
        source = { start = "Neck", end = "Head" }
        target = { start = "neck", end = "head" }

        [[chains]]
        role = "left_arm"
        source = { start = "LeftArm", end = "LeftHand" }
        target = { start = "upperarm_l", end = "hand_l" }

        [[chains]]
        role = "left_leg"
        source = { start = "LeftUpLeg", end = "LeftFoot" }
        target = { start = "thigh_l", end = "foot_l" }
        mode = "ik"

        [[chains]]
        role = "right_leg"
        source = { start = "RightUpLeg", end = "RightFoot" }
        target = { start = "thigh_r", end = "foot_r" }
        mode = "ik"

        [output]
        prefix = "hero_"
        search = "mocap_"
    "#;

    const WAVE: &str = r#"
        name = "mocap_wave"
        duration = 1.0

        [[tracks.Hips]]
        time = 0.0
        translation = [0.0, 1.0, 0.0]

        [[tracks.Hips]]
        time = 1.0
        translation = [0.5, 0.9, 0.0]

        [[tracks.LeftForeArm]]
        time = 0.0
        translation = [0.28, 0.0, 0.0]

        [[tracks.LeftForeArm]]
        time = 0.5
        translation = [0.28, 0.0, 0.0]
        rotation = [0.0, 0.0, 0.5, 0.8660254]

        [[tracks.LeftForeArm]]
        time = 1.0
        translation = [0.28, 0.0, 0.0]
    "#;

    fn rigs() -> (Skeleton, Skeleton) {
        let source = SkeletonDesc::from_toml_str(MOCAP_RIG).unwrap().build().unwrap();
        let target = biped("", BipedProportions::default().with_spine_segments(2));
        (source, target)
    }

    fn config(source: &Skeleton, target: &Skeleton) -> RetargetConfig {
        let file = RetargetConfigFile::from_toml_str(MAPPING).unwrap();
        RetargetConfig::build(source, target, &file).unwrap()
    }

    // -----------------------------------------------------------------------
    // Tests
    // -----------------------------------------------------------------------

    #[test]
    fn toml_documents_drive_a_full_run() {
        let (source, target) = rigs();
        let config = config(&source, &target);
        assert_relative_eq!(config.translation_ratio(), 0.85 / 0.87, epsilon = 1e-5);

        let clip = KeyframeClip::from_toml_str(WAVE).unwrap();
        let session = RetargetSession::new(&source, &target, &config);
        let reports = session.run_batch(&[&clip], config.sample_rate()).unwrap();
        let report = &reports[0];

        assert_eq!(report.clip.name, "hero_wave");
        assert_eq!(report.clip.frame_count(), 31);
        assert!(report.diagnostics.is_empty(), "{:?}", report.diagnostics);

        let pelvis = report.clip.frame_transform("pelvis", 15).unwrap();
        assert_relative_eq!(
            pelvis.translation,
            Vector3::new(0.25, 0.95, 0.0) * config.translation_ratio(),
            epsilon = 1e-4
        );

        let elbow = report.clip.frame_transform("lowerarm_l", 15).unwrap();
        let expected = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), 60f32.to_radians());
        assert_relative_eq!(elbow.rotation.angle_to(&expected), 0.0, epsilon = 1e-4);

        let json = report.clip.to_json().unwrap();
        assert!(json.contains("\"hero_wave\""));
        assert!(json.contains("\"lowerarm_l\""));
    }

    #[test]
    fn retargeted_clip_feeds_back_through_inverse() {
        let (source, target) = rigs();
        let forward = config(&source, &target);
        let backward = forward.inverse(&source, &target);
        let clip = KeyframeClip::from_toml_str(WAVE).unwrap();

        let there = RetargetSession::new(&source, &target, &forward)
            .collect_clip("there", &clip, 30.0)
            .unwrap();
        let back = RetargetSession::new(&target, &source, &backward)
            .collect_clip("back", &there.clip, 30.0)
            .unwrap();

        assert_eq!(back.clip.frame_count(), there.clip.frame_count());
        for frame in [0, 7, 15, 30] {
            let time = back.clip.times[frame];
            let original = clip.sample_local_transform("LeftForeArm", time).unwrap();
            let restored = back.clip.frame_transform("LeftForeArm", frame).unwrap();
            assert_relative_eq!(restored.rotation.angle_to(&original.rotation), 0.0, epsilon = 1e-4);

            let hips = clip.sample_local_transform("Hips", time).unwrap();
            let restored_hips = back.clip.frame_transform("Hips", frame).unwrap();
            assert_relative_eq!(restored_hips.translation, hips.translation, epsilon = 1e-4);
        }
    }

    #[test]
    fn suggestions_pair_obvious_bones() {
        let (source, target) = rigs();
        let pairs = suggest_bone_pairs(&source, &target);
        let named: Vec<(&str, &str)> = pairs
            .iter()
            .map(|p| (target.name(p.target), source.name(p.source)))
            .collect();
        for expected in [
            ("hand_l", "LeftHand"),
            ("foot_l", "LeftFoot"),
            ("foot_r", "RightFoot"),
            ("head", "Head"),
            ("neck", "Neck"),
        ] {
            assert!(named.contains(&expected), "missing {expected:?} in {named:?}");
        }
    }
}
