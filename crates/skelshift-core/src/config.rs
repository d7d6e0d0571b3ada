use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::types::ChainRole;

// ---------------------------------------------------------------------------
// Serde default functions
// ---------------------------------------------------------------------------

const fn default_sample_rate() -> f32 {
    30.0
}
const fn default_ik_weight() -> f32 {
    1.0
}

// ---------------------------------------------------------------------------
// Policies
// ---------------------------------------------------------------------------

/// What happens to target bones that belong to no chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnmappedPolicy {
    /// Keep the target reference local transform.
    #[default]
    Reference,
    /// Copy the source rotation delta for bones with identical names.
    PassThrough,
}

/// Behavior when a sample time falls outside `[0, duration]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Extrapolation {
    /// Clamp to the nearest boundary and report a diagnostic.
    #[default]
    Clamp,
    /// Wrap around (looping clips) and report a diagnostic.
    Wrap,
    /// Fail the frame with `TimeOutOfRange`.
    Reject,
}

/// How a chain is driven.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChainMode {
    /// Rotation deltas only.
    #[default]
    Fk,
    /// Rotation deltas, then a two-bone IK correction toward the source effector.
    Ik,
}

// ---------------------------------------------------------------------------
// BoneRange
// ---------------------------------------------------------------------------

/// A chain's bones on one skeleton.
///
/// In TOML either `{ start = "thigh_l", end = "foot_l" }` or an explicit
/// ordered list `["thigh_l", "calf_l", "foot_l"]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BoneRange {
    Span { start: String, end: String },
    List(Vec<String>),
}

impl BoneRange {
    /// Range from `start` down the hierarchy to `end` (inclusive).
    pub fn span(start: impl Into<String>, end: impl Into<String>) -> Self {
        Self::Span {
            start: start.into(),
            end: end.into(),
        }
    }

    /// Explicit ordered list of bone names, parent first.
    pub fn list<S: AsRef<str>>(names: &[S]) -> Self {
        Self::List(names.iter().map(|n| n.as_ref().to_owned()).collect())
    }

    /// Single-bone chain.
    pub fn single(name: impl Into<String>) -> Self {
        Self::List(vec![name.into()])
    }
}

// ---------------------------------------------------------------------------
// ChainConfig
// ---------------------------------------------------------------------------

/// One `[[chains]]` entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainConfig {
    pub role: ChainRole,
    pub source: BoneRange,
    pub target: BoneRange,

    #[serde(default)]
    pub mode: ChainMode,

    /// Blend weight of the IK correction in `[0, 1]` (default: 1.0).
    #[serde(default = "default_ik_weight")]
    pub ik_weight: f32,

    /// Transfer local translation. Unset means the role default (root only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preserve_translation: Option<bool>,

    /// Drive the target effector's world rotation toward the goal orientation.
    #[serde(default)]
    pub pin_effector_rotation: bool,

    /// Source end-effector. Defaults to the last bone of the source chain.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_effector: Option<String>,

    /// Target end-effector. Defaults to the last bone of the target chain.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_effector: Option<String>,
}

impl ChainConfig {
    /// Forward-kinematic chain with default settings.
    pub fn fk(role: ChainRole, source: BoneRange, target: BoneRange) -> Self {
        Self {
            role,
            source,
            target,
            mode: ChainMode::Fk,
            ik_weight: default_ik_weight(),
            preserve_translation: None,
            pin_effector_rotation: false,
            source_effector: None,
            target_effector: None,
        }
    }

    /// IK-preserved chain with full weight.
    pub fn ik(role: ChainRole, source: BoneRange, target: BoneRange) -> Self {
        Self {
            mode: ChainMode::Ik,
            ..Self::fk(role, source, target)
        }
    }

    /// Override the IK blend weight.
    #[must_use]
    pub const fn with_ik_weight(mut self, weight: f32) -> Self {
        self.ik_weight = weight;
        self
    }

    /// Override translation transfer.
    #[must_use]
    pub const fn with_preserve_translation(mut self, preserve: bool) -> Self {
        self.preserve_translation = Some(preserve);
        self
    }

    /// Enable effector rotation pinning.
    #[must_use]
    pub const fn with_pinned_effector_rotation(mut self) -> Self {
        self.pin_effector_rotation = true;
        self
    }

    /// Explicit end-effectors on both sides.
    #[must_use]
    pub fn with_effectors(mut self, source: impl Into<String>, target: impl Into<String>) -> Self {
        self.source_effector = Some(source.into());
        self.target_effector = Some(target.into());
        self
    }

    /// Effective translation transfer flag.
    pub fn preserves_translation(&self) -> bool {
        self.preserve_translation
            .unwrap_or_else(|| self.role.preserves_translation_by_default())
    }

    /// Validate value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.ik_weight) {
            return Err(ConfigError::invalid(
                format!("chains.{}.ik_weight", self.role),
                format!("{} is outside [0, 1]", self.ik_weight),
            ));
        }
        if let BoneRange::List(names) = &self.source {
            if names.is_empty() {
                return Err(ConfigError::MissingField(format!("chains.{}.source", self.role)));
            }
        }
        if let BoneRange::List(names) = &self.target {
            if names.is_empty() {
                return Err(ConfigError::MissingField(format!("chains.{}.target", self.role)));
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// TranslationScale
// ---------------------------------------------------------------------------

/// How translation and IK goal positions are scaled between skeletons.
///
/// Defaults to [`TranslationScale::Unscaled`] when `[translation_scale]` is
/// omitted. Root motion and IK goals are then copied at the source's scale,
/// so rigs of different sizes should set `uniform` or `reference_bones`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum TranslationScale {
    /// Ratio 1.
    #[default]
    #[serde(rename = "none")]
    Unscaled,
    /// Fixed ratio.
    Uniform { ratio: f32 },
    /// Target reference distance between two bones divided by the source's.
    ReferenceBones {
        source_root: String,
        source_effector: String,
        target_root: String,
        target_effector: String,
    },
}

impl TranslationScale {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Self::Uniform { ratio } = self {
            if !ratio.is_finite() || *ratio <= 0.0 {
                return Err(ConfigError::invalid(
                    "translation_scale.ratio",
                    format!("{ratio} (must be finite and > 0)"),
                ));
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// NameRule
// ---------------------------------------------------------------------------

/// Naming rule for batch outputs: optional search/replace, then prefix and suffix.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NameRule {
    #[serde(default)]
    pub prefix: String,
    #[serde(default)]
    pub suffix: String,
    #[serde(default)]
    pub search: String,
    #[serde(default)]
    pub replace: String,
}

impl NameRule {
    /// Apply the rule to a source clip name.
    pub fn apply(&self, name: &str) -> String {
        let base = if self.search.is_empty() {
            name.to_owned()
        } else {
            name.replace(&self.search, &self.replace)
        };
        format!("{}{base}{}", self.prefix, self.suffix)
    }
}

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// The `[settings]` table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetargetSettings {
    #[serde(default)]
    pub unmapped: UnmappedPolicy,

    #[serde(default)]
    pub extrapolation: Extrapolation,

    /// Output frames per second (default: 30).
    #[serde(default = "default_sample_rate")]
    pub sample_rate: f32,
}

impl Default for RetargetSettings {
    fn default() -> Self {
        Self {
            unmapped: UnmappedPolicy::default(),
            extrapolation: Extrapolation::default(),
            sample_rate: default_sample_rate(),
        }
    }
}

impl RetargetSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_sample_rate(self.sample_rate)
    }
}

/// Sample rates must be finite and strictly positive.
pub fn validate_sample_rate(rate: f32) -> Result<(), ConfigError> {
    if !rate.is_finite() || rate <= 0.0 {
        return Err(ConfigError::invalid(
            "sample_rate",
            format!("{rate} (must be finite and > 0)"),
        ));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// RetargetConfigFile
// ---------------------------------------------------------------------------

/// A complete retarget configuration document.
///
/// ```toml
/// [settings]
/// unmapped = "reference"
/// extrapolation = "clamp"
/// sample_rate = 30.0
///
/// [translation_scale]
/// mode = "uniform"
/// ratio = 1.2
///
/// [[chains]]
/// role = "left_leg"
/// source = { start = "thigh_l", end = "foot_l" }
/// target = ["upperleg_l", "lowerleg_l", "foot_l"]
/// mode = "ik"
///
/// [output]
/// prefix = "tgt_"
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RetargetConfigFile {
    #[serde(default)]
    pub settings: RetargetSettings,

    #[serde(default)]
    pub translation_scale: TranslationScale,

    #[serde(default)]
    pub chains: Vec<ChainConfig>,

    #[serde(default)]
    pub output: NameRule,
}

impl RetargetConfigFile {
    /// Start an empty configuration with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chain.
    #[must_use]
    pub fn with_chain(mut self, chain: ChainConfig) -> Self {
        self.chains.push(chain);
        self
    }

    #[must_use]
    pub fn with_translation_scale(mut self, scale: TranslationScale) -> Self {
        self.translation_scale = scale;
        self
    }

    #[must_use]
    pub const fn with_unmapped(mut self, policy: UnmappedPolicy) -> Self {
        self.settings.unmapped = policy;
        self
    }

    #[must_use]
    pub const fn with_extrapolation(mut self, policy: Extrapolation) -> Self {
        self.settings.extrapolation = policy;
        self
    }

    #[must_use]
    pub fn with_output(mut self, rule: NameRule) -> Self {
        self.output = rule;
        self
    }

    /// Validate configuration. Returns Err on invalid values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.settings.validate()?;
        self.translation_scale.validate()?;
        if self.chains.is_empty() {
            return Err(ConfigError::MissingField("chains".into()));
        }
        for chain in &self.chains {
            chain.validate()?;
        }
        Ok(())
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Serialize back to TOML.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
