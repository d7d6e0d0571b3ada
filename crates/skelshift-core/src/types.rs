//! Shared value types: bone transforms, chain roles and mapping sides.

use std::fmt;
use std::ops::Mul;
use std::str::FromStr;

use nalgebra::{Quaternion, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Scale components smaller than this are treated as zero when inverting.
const MIN_SCALE: f32 = 1e-8;

// ---------------------------------------------------------------------------
// Transform
// ---------------------------------------------------------------------------

/// Translation, rotation and per-axis scale of a bone.
///
/// Used both for local transforms (relative to the parent bone) and global
/// transforms (world space). Composition follows `parent * local`:
///
/// ```text
/// t = p.t + p.r * (p.s ∘ l.t)
/// r = p.r * l.r
/// s = p.s ∘ l.s
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    /// Translation in parent (or world) units.
    pub translation: Vector3<f32>,
    /// Orientation.
    pub rotation: UnitQuaternion<f32>,
    /// Per-axis scale.
    pub scale: Vector3<f32>,
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}

impl Transform {
    /// The identity transform (no translation, no rotation, unit scale).
    pub fn identity() -> Self {
        Self {
            translation: Vector3::zeros(),
            rotation: UnitQuaternion::identity(),
            scale: Vector3::repeat(1.0),
        }
    }

    /// Create a transform from all three components.
    pub const fn new(
        translation: Vector3<f32>,
        rotation: UnitQuaternion<f32>,
        scale: Vector3<f32>,
    ) -> Self {
        Self {
            translation,
            rotation,
            scale,
        }
    }

    /// Translation with identity rotation and unit scale.
    pub fn from_translation(translation: Vector3<f32>) -> Self {
        Self {
            translation,
            ..Self::identity()
        }
    }

    /// Rotation with zero translation and unit scale.
    pub fn from_rotation(rotation: UnitQuaternion<f32>) -> Self {
        Self {
            rotation,
            ..Self::identity()
        }
    }

    /// Translation + rotation with unit scale.
    pub fn from_parts(translation: Vector3<f32>, rotation: UnitQuaternion<f32>) -> Self {
        Self {
            translation,
            rotation,
            scale: Vector3::repeat(1.0),
        }
    }

    /// Replace the scale component.
    #[must_use]
    pub const fn with_scale(mut self, scale: Vector3<f32>) -> Self {
        self.scale = scale;
        self
    }

    /// Build from plain arrays. Rotation is `[x, y, z, w]` and is normalized;
    /// a zero quaternion becomes the identity.
    pub fn from_arrays(translation: [f32; 3], rotation: [f32; 4], scale: [f32; 3]) -> Self {
        let [x, y, z, w] = rotation;
        let quat = Quaternion::new(w, x, y, z);
        let rotation = if quat.norm() > MIN_SCALE {
            UnitQuaternion::from_quaternion(quat)
        } else {
            UnitQuaternion::identity()
        };
        Self {
            translation: Vector3::from(translation),
            rotation,
            scale: Vector3::from(scale),
        }
    }

    /// Translation as `[x, y, z]`.
    pub fn translation_array(&self) -> [f32; 3] {
        self.translation.into()
    }

    /// Rotation as `[x, y, z, w]`.
    pub fn rotation_array(&self) -> [f32; 4] {
        let q = self.rotation.quaternion();
        [q.i, q.j, q.k, q.w]
    }

    /// Scale as `[x, y, z]`.
    pub fn scale_array(&self) -> [f32; 3] {
        self.scale.into()
    }

    /// Map a point from this transform's local space into its parent space.
    pub fn transform_point(&self, point: &Vector3<f32>) -> Vector3<f32> {
        self.translation + self.rotation * self.scale.component_mul(point)
    }

    /// Compose `self` (a parent global transform) with a child's local transform.
    #[must_use]
    pub fn compose(&self, local: &Self) -> Self {
        Self {
            translation: self.transform_point(&local.translation),
            rotation: self.rotation * local.rotation,
            scale: self.scale.component_mul(&local.scale),
        }
    }

    /// Express `self` (a global transform) relative to `parent` (also global).
    ///
    /// Inverse of [`Transform::compose`]: `parent.compose(&g.relative_to(&parent)) == g`.
    #[must_use]
    pub fn relative_to(&self, parent: &Self) -> Self {
        let inv_rotation = parent.rotation.inverse();
        let inv_scale = parent.scale.map(|s| {
            if s.abs() < MIN_SCALE {
                0.0
            } else {
                1.0 / s
            }
        });
        let offset = inv_rotation * (self.translation - parent.translation);
        Self {
            translation: offset.component_mul(&inv_scale),
            rotation: inv_rotation * self.rotation,
            scale: self.scale.component_mul(&inv_scale),
        }
    }

    /// Interpolate towards `other`: linear translation/scale, spherical rotation.
    #[must_use]
    pub fn interpolate(&self, other: &Self, t: f32) -> Self {
        Self {
            translation: self.translation.lerp(&other.translation, t),
            rotation: slerp_rotation(&self.rotation, &other.rotation, t),
            scale: self.scale.lerp(&other.scale, t),
        }
    }
}

impl Mul for Transform {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self {
        self.compose(&rhs)
    }
}

/// Shortest-path spherical interpolation that never panics.
///
/// nalgebra's `try_slerp` declines nearly identical inputs; those fall back to
/// whichever endpoint is closer in `t`.
pub fn slerp_rotation(
    a: &UnitQuaternion<f32>,
    b: &UnitQuaternion<f32>,
    t: f32,
) -> UnitQuaternion<f32> {
    a.try_slerp(b, t, 1e-7)
        .unwrap_or(if t < 0.5 { *a } else { *b })
}

// ---------------------------------------------------------------------------
// ChainRole
// ---------------------------------------------------------------------------

/// Semantic role of a bone chain.
///
/// A closed set: retarget behavior is selected through a per-role policy
/// table rather than per-role types. `Aux(n)` covers rig-specific chains
/// (props, extra limbs) that have no standard name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ChainRole {
    Root,
    Pelvis,
    Spine,
    Neck,
    Head,
    LeftClavicle,
    RightClavicle,
    LeftArm,
    RightArm,
    LeftHand,
    RightHand,
    LeftLeg,
    RightLeg,
    Tail,
    Aux(u8),
}

impl ChainRole {
    /// All named roles (excluding `Aux`).
    pub const NAMED: [Self; 14] = [
        Self::Root,
        Self::Pelvis,
        Self::Spine,
        Self::Neck,
        Self::Head,
        Self::LeftClavicle,
        Self::RightClavicle,
        Self::LeftArm,
        Self::RightArm,
        Self::LeftHand,
        Self::RightHand,
        Self::LeftLeg,
        Self::RightLeg,
        Self::Tail,
    ];

    /// Whether this role transfers translation when the config leaves
    /// `preserve_translation` unset.
    pub const fn preserves_translation_by_default(self) -> bool {
        matches!(self, Self::Root)
    }

    /// Snake-case name used in configuration files.
    pub fn as_str(self) -> std::borrow::Cow<'static, str> {
        let name = match self {
            Self::Root => "root",
            Self::Pelvis => "pelvis",
            Self::Spine => "spine",
            Self::Neck => "neck",
            Self::Head => "head",
            Self::LeftClavicle => "left_clavicle",
            Self::RightClavicle => "right_clavicle",
            Self::LeftArm => "left_arm",
            Self::RightArm => "right_arm",
            Self::LeftHand => "left_hand",
            Self::RightHand => "right_hand",
            Self::LeftLeg => "left_leg",
            Self::RightLeg => "right_leg",
            Self::Tail => "tail",
            Self::Aux(n) => return format!("aux_{n}").into(),
        };
        name.into()
    }
}

impl fmt::Display for ChainRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_str())
    }
}

impl FromStr for ChainRole {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(n) = s.strip_prefix("aux_") {
            return n
                .parse::<u8>()
                .map(Self::Aux)
                .map_err(|_| ConfigError::UnknownRole(s.into()));
        }
        Self::NAMED
            .into_iter()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| ConfigError::UnknownRole(s.into()))
    }
}

impl TryFrom<String> for ChainRole {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ChainRole> for String {
    fn from(role: ChainRole) -> Self {
        role.as_str().into_owned()
    }
}

// ---------------------------------------------------------------------------
// Side
// ---------------------------------------------------------------------------

/// Which skeleton of a retarget pair a bone belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Source,
    Target,
}

impl Side {
    /// The other side.
    #[must_use]
    pub const fn flip(self) -> Self {
        match self {
            Self::Source => Self::Target,
            Self::Target => Self::Source,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Source => f.write_str("source"),
            Self::Target => f.write_str("target"),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
