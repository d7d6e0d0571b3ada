//! TOML skeleton descriptions.
//!
//! ```toml
//! name = "mannequin"
//!
//! [[bones]]
//! name = "pelvis"
//! translation = [0.0, 0.0, 1.0]
//!
//! [[bones]]
//! name = "thigh_l"
//! parent = "pelvis"
//! translation = [0.1, 0.0, 0.0]
//! rotation = [0.0, 0.0, 0.0, 1.0]
//! ```

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use skelshift_core::{ConfigError, HierarchyError, SkelshiftError, Transform};

use crate::types::Skeleton;

const fn default_rotation() -> [f32; 4] {
    [0.0, 0.0, 0.0, 1.0]
}
const fn default_scale() -> [f32; 3] {
    [1.0, 1.0, 1.0]
}

/// One `[[bones]]` entry; transform fields are the reference local pose.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoneDesc {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    #[serde(default)]
    pub translation: [f32; 3],
    /// Quaternion `[x, y, z, w]`.
    #[serde(default = "default_rotation")]
    pub rotation: [f32; 4],
    #[serde(default = "default_scale")]
    pub scale: [f32; 3],
}

impl BoneDesc {
    pub fn new(name: impl Into<String>, parent: Option<&str>, translation: [f32; 3]) -> Self {
        Self {
            name: name.into(),
            parent: parent.map(str::to_owned),
            translation,
            rotation: default_rotation(),
            scale: default_scale(),
        }
    }

    fn transform(&self) -> Transform {
        Transform::from_arrays(self.translation, self.rotation, self.scale)
    }
}

/// Serializable skeleton description, parents referenced by name.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SkeletonDesc {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub bones: Vec<BoneDesc>,
}

impl SkeletonDesc {
    /// Parse a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Load from TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Describe an existing skeleton (reference pose).
    pub fn from_skeleton(name: impl Into<String>, skeleton: &Skeleton) -> Self {
        let bones = skeleton
            .bones()
            .iter()
            .map(|b| BoneDesc {
                name: b.name.clone(),
                parent: b.parent.map(|p| skeleton.name(p).to_owned()),
                translation: b.reference_local.translation_array(),
                rotation: b.reference_local.rotation_array(),
                scale: b.reference_local.scale_array(),
            })
            .collect();
        Self {
            name: name.into(),
            bones,
        }
    }

    /// Resolve parent names and build the skeleton.
    pub fn build(&self) -> Result<Skeleton, HierarchyError> {
        let index: HashMap<&str, usize> = self
            .bones
            .iter()
            .enumerate()
            .map(|(i, b)| (b.name.as_str(), i))
            .collect();
        let parents = self
            .bones
            .iter()
            .map(|b| match &b.parent {
                None => Ok(None),
                Some(parent) => index.get(parent.as_str()).copied().map(Some).ok_or_else(|| {
                    HierarchyError::UnknownParent {
                        bone: b.name.clone(),
                        parent: parent.clone(),
                    }
                }),
            })
            .collect::<Result<Vec<_>, _>>()?;
        Skeleton::build(
            self.bones.iter().map(|b| b.name.clone()).collect(),
            parents,
            self.bones.iter().map(BoneDesc::transform).collect(),
        )
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }
}

/// Load a skeleton description file and build it.
pub fn load_skeleton(path: impl AsRef<Path>) -> Result<Skeleton, SkelshiftError> {
    Ok(SkeletonDesc::from_file(path)?.build()?)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
