use thiserror::Error;

use crate::types::{ChainRole, Side};

/// Top-level error type for skelshift.
#[derive(Debug, Error)]
pub enum SkelshiftError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid hierarchy: {0}")]
    Hierarchy(#[from] HierarchyError),

    #[error("Mapping error: {0}")]
    Mapping(#[from] MappingError),

    #[error("Frame error: {0}")]
    Frame(#[from] FrameError),
}

/// Configuration and asset loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("Unknown chain role: {0}")]
    UnknownRole(String),
}

impl ConfigError {
    /// Shorthand for [`ConfigError::InvalidValue`].
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Structural problems found while building a skeleton.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HierarchyError {
    #[error("Input length mismatch: {names} names, {parents} parents, {transforms} transforms")]
    LengthMismatch {
        names: usize,
        parents: usize,
        transforms: usize,
    },

    #[error("Skeleton has no bones")]
    Empty,

    #[error("Bone at index {index} has an empty name")]
    EmptyName { index: usize },

    #[error("Duplicate bone name: {0}")]
    DuplicateName(String),

    #[error("Bone {bone} has out-of-range parent index {parent}")]
    ParentOutOfRange { bone: String, parent: usize },

    #[error("Bone {bone} references unknown parent {parent}")]
    UnknownParent { bone: String, parent: String },

    #[error("Cycle detected through bone {0}")]
    Cycle(String),

    #[error("Multiple root bones: {first} and {second}")]
    MultipleRoots { first: String, second: String },
}

/// Chain mapping validation errors. Fatal at configuration-build time.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MappingError {
    #[error("Unknown {side} bone '{name}' in chain {role}")]
    UnknownBone {
        role: ChainRole,
        side: Side,
        name: String,
    },

    #[error("Chain {role} is not parent-contiguous on the {side} side at bone '{bone}'")]
    ChainDiscontinuity {
        role: ChainRole,
        side: Side,
        bone: String,
    },

    #[error("{side} bone '{bone}' is claimed by both {first} and {second}")]
    ChainOverlap {
        side: Side,
        bone: String,
        first: ChainRole,
        second: ChainRole,
    },

    #[error("Chain {role} has no {side} bones")]
    EmptyChain { role: ChainRole, side: Side },

    #[error("Chain role {0} is mapped more than once")]
    DuplicateRole(ChainRole),

    #[error("{side} effector '{bone}' is not part of chain {role}")]
    EffectorOutsideChain {
        role: ChainRole,
        side: Side,
        bone: String,
    },

    #[error("Chain {role} needs three {side} bones ending at its effector for IK, got {bones}")]
    ChainTooShortForIk {
        role: ChainRole,
        side: Side,
        bones: usize,
    },
}

/// Per-frame errors.
///
/// Copy so they can also travel inside frame diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum FrameError {
    #[error("Time {time} is outside the animation range [0, {duration}]")]
    TimeOutOfRange { time: f32, duration: f32 },

    #[error("Chain role {0} has no policy in the retarget configuration")]
    UnmappedRoleAtRuntime(ChainRole),

    #[error(
        "IK goal for {role} is unreachable: distance {distance}, reach [{min_reach}, {max_reach}]"
    )]
    UnreachableGoal {
        role: ChainRole,
        distance: f32,
        min_reach: f32,
        max_reach: f32,
    },
}
