//! URDF kinematic trees as skeletons, via `urdf-rs`.
//!
//! Every link becomes a bone. A joint's origin (xyz + rpy) is the child
//! link's reference local transform; the root link sits at the identity.
//! Joint types and limits are ignored: only the hierarchy and rest pose
//! matter for retargeting.

// All conversions from urdf-rs f64 → f32 are intentional truncations.
#![allow(clippy::cast_possible_truncation)]

use std::collections::HashMap;
use std::path::Path;

use nalgebra::{Matrix3, UnitQuaternion, Vector3};
use skelshift_core::{ConfigError, HierarchyError, SkelshiftError, Transform};

use crate::types::Skeleton;

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Parse a URDF file from disk into a [`Skeleton`].
pub fn parse_urdf_file(path: impl AsRef<Path>) -> Result<Skeleton, SkelshiftError> {
    let content = std::fs::read_to_string(path).map_err(ConfigError::from)?;
    parse_urdf_string(&content)
}

/// Parse a URDF XML string into a [`Skeleton`].
pub fn parse_urdf_string(xml: &str) -> Result<Skeleton, SkelshiftError> {
    let robot =
        urdf_rs::read_from_string(xml).map_err(|e| ConfigError::Parse(e.to_string()))?;
    Ok(convert_robot(&robot)?)
}

// ---------------------------------------------------------------------------
// Conversion helpers
// ---------------------------------------------------------------------------

fn convert_robot(robot: &urdf_rs::Robot) -> Result<Skeleton, HierarchyError> {
    let index: HashMap<&str, usize> = robot
        .links
        .iter()
        .enumerate()
        .map(|(i, l)| (l.name.as_str(), i))
        .collect();

    let mut parents = vec![None; robot.links.len()];
    let mut locals = vec![Transform::identity(); robot.links.len()];
    for joint in &robot.joints {
        let child = *index
            .get(joint.child.link.as_str())
            .ok_or_else(|| HierarchyError::UnknownParent {
                bone: joint.name.clone(),
                parent: joint.child.link.clone(),
            })?;
        let parent = *index
            .get(joint.parent.link.as_str())
            .ok_or_else(|| HierarchyError::UnknownParent {
                bone: joint.child.link.clone(),
                parent: joint.parent.link.clone(),
            })?;
        parents[child] = Some(parent);
        locals[child] = origin_transform(&joint.origin);
    }

    tracing::debug!(
        robot = %robot.name,
        links = robot.links.len(),
        joints = robot.joints.len(),
        "converted URDF"
    );

    Skeleton::build(
        robot.links.iter().map(|l| l.name.clone()).collect(),
        parents,
        locals,
    )
}

fn origin_transform(pose: &urdf_rs::Pose) -> Transform {
    let [x, y, z] = vec3_to_f32(&pose.xyz);
    let [roll, pitch, yaw] = vec3_to_f32(&pose.rpy);
    Transform::from_parts(
        Vector3::new(x, y, z),
        UnitQuaternion::from_matrix(&rotation_matrix_from_rpy(roll, pitch, yaw)),
    )
}

/// Build a rotation matrix from roll-pitch-yaw (intrinsic XYZ / extrinsic ZYX).
fn rotation_matrix_from_rpy(roll: f32, pitch: f32, yaw: f32) -> Matrix3<f32> {
    let (sr, cr) = roll.sin_cos();
    let (sp, cp) = pitch.sin_cos();
    let (sy, cy) = yaw.sin_cos();

    Matrix3::new(
        cy * cp,
        cy * sp * sr - sy * cr,
        cy * sp * cr + sy * sr,
        sy * cp,
        sy * sp * sr + cy * cr,
        sy * sp * cr - cy * sr,
        -sp,
        cp * sr,
        cp * cr,
    )
}

const fn vec3_to_f32(v: &[f64; 3]) -> [f32; 3] {
    [v[0] as f32, v[1] as f32, v[2] as f32]
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
