//! Runtime retarget configuration: mapping, per-role policies and scaling.

use std::collections::HashMap;

use nalgebra::UnitQuaternion;
use skelshift_core::config::{
    ChainConfig, ChainMode, Extrapolation, NameRule, RetargetConfigFile, TranslationScale,
    UnmappedPolicy,
};
use skelshift_core::{ChainRole, ConfigError, MappingError, Side, SkelshiftError};
use skelshift_skeleton::Skeleton;

use crate::mapping::ChainMapping;

/// Reference distances below this cannot define a translation ratio.
const MIN_REFERENCE_DISTANCE: f32 = 1e-6;

// ---------------------------------------------------------------------------
// RolePolicy
// ---------------------------------------------------------------------------

/// How one chain role is retargeted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RolePolicy {
    pub mode: ChainMode,
    /// IK blend weight in `[0, 1]`.
    pub ik_weight: f32,
    pub preserve_translation: bool,
    pub pin_effector_rotation: bool,
}

impl RolePolicy {
    /// Rotation-only policy with the role's default translation behavior.
    pub const fn fk(role: ChainRole) -> Self {
        Self {
            mode: ChainMode::Fk,
            ik_weight: 1.0,
            preserve_translation: role.preserves_translation_by_default(),
            pin_effector_rotation: false,
        }
    }

    /// IK-preserved policy at full weight.
    pub const fn ik(role: ChainRole) -> Self {
        Self {
            mode: ChainMode::Ik,
            ..Self::fk(role)
        }
    }

    pub fn from_chain(chain: &ChainConfig) -> Self {
        Self {
            mode: chain.mode,
            ik_weight: chain.ik_weight,
            preserve_translation: chain.preserves_translation(),
            pin_effector_rotation: chain.pin_effector_rotation,
        }
    }

    pub fn is_ik(&self) -> bool {
        self.mode == ChainMode::Ik
    }
}

// ---------------------------------------------------------------------------
// RetargetConfig
// ---------------------------------------------------------------------------

/// Everything the solver needs besides the two skeletons and a pose.
///
/// Immutable once built and safe to share across worker threads.
#[derive(Debug, Clone)]
pub struct RetargetConfig {
    mapping: ChainMapping,
    policies: HashMap<ChainRole, RolePolicy>,
    translation_ratio: f32,
    unmapped: UnmappedPolicy,
    extrapolation: Extrapolation,
    sample_rate: f32,
    name_rule: NameRule,
    pass_through: Vec<(usize, usize)>,
    effector_offsets: HashMap<ChainRole, UnitQuaternion<f32>>,
}

impl RetargetConfig {
    /// Validate a configuration document and resolve it against both skeletons.
    pub fn build(
        source: &Skeleton,
        target: &Skeleton,
        file: &RetargetConfigFile,
    ) -> Result<Self, SkelshiftError> {
        file.validate()?;
        let mapping = ChainMapping::build(source, target, &file.chains)?;
        let policies = file
            .chains
            .iter()
            .map(|chain| (chain.role, RolePolicy::from_chain(chain)))
            .collect();
        let ratio = translation_ratio(&file.translation_scale, source, target)?;
        if file.translation_scale == TranslationScale::Unscaled {
            if let Some((src, tgt)) = unscaled_size_mismatch(source, target) {
                tracing::warn!(
                    source_extent = src,
                    target_extent = tgt,
                    "skeleton sizes differ but translation_scale is unset; root motion and IK goals are not rescaled"
                );
            }
        }

        tracing::info!(
            chains = mapping.len(),
            translation_ratio = ratio,
            unmapped = ?file.settings.unmapped,
            "retarget configuration ready"
        );

        Ok(Self::from_parts(source, target, mapping, policies, ratio)
            .with_unmapped(file.settings.unmapped)
            .with_extrapolation(file.settings.extrapolation)
            .with_sample_rate(file.settings.sample_rate)
            .with_name_rule(file.output.clone()))
    }

    /// Assemble from an already validated mapping. Other settings take their
    /// defaults and can be overridden with the `with_*` methods.
    pub fn from_parts(
        source: &Skeleton,
        target: &Skeleton,
        mapping: ChainMapping,
        policies: HashMap<ChainRole, RolePolicy>,
        translation_ratio: f32,
    ) -> Self {
        let pass_through = pass_through_pairs(source, target, &mapping);
        let effector_offsets = mapping
            .entries()
            .iter()
            .map(|e| {
                let src = source.global_reference_transform(e.source_effector).rotation;
                let tgt = target.global_reference_transform(e.target_effector).rotation;
                (e.role, src.inverse() * tgt)
            })
            .collect();
        Self {
            mapping,
            policies,
            translation_ratio,
            unmapped: UnmappedPolicy::default(),
            extrapolation: Extrapolation::default(),
            sample_rate: 30.0,
            name_rule: NameRule::default(),
            pass_through,
            effector_offsets,
        }
    }

    #[must_use]
    pub const fn with_unmapped(mut self, policy: UnmappedPolicy) -> Self {
        self.unmapped = policy;
        self
    }

    #[must_use]
    pub const fn with_extrapolation(mut self, policy: Extrapolation) -> Self {
        self.extrapolation = policy;
        self
    }

    #[must_use]
    pub const fn with_sample_rate(mut self, rate: f32) -> Self {
        self.sample_rate = rate;
        self
    }

    #[must_use]
    pub fn with_name_rule(mut self, rule: NameRule) -> Self {
        self.name_rule = rule;
        self
    }

    #[must_use]
    pub fn with_policy(mut self, role: ChainRole, policy: RolePolicy) -> Self {
        self.policies.insert(role, policy);
        self
    }

    #[must_use]
    pub fn without_policy(mut self, role: ChainRole) -> Self {
        self.policies.remove(&role);
        self
    }

    pub const fn mapping(&self) -> &ChainMapping {
        &self.mapping
    }

    pub fn policy(&self, role: ChainRole) -> Option<&RolePolicy> {
        self.policies.get(&role)
    }

    /// Target size ÷ source size, applied to transferred translation and
    /// IK goal positions.
    pub const fn translation_ratio(&self) -> f32 {
        self.translation_ratio
    }

    pub const fn unmapped(&self) -> UnmappedPolicy {
        self.unmapped
    }

    pub const fn extrapolation(&self) -> Extrapolation {
        self.extrapolation
    }

    /// Default output frame rate.
    pub const fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    pub const fn name_rule(&self) -> &NameRule {
        &self.name_rule
    }

    /// `(source, target)` bones with identical names that no chain claims.
    pub fn pass_through_pairs(&self) -> &[(usize, usize)] {
        &self.pass_through
    }

    /// Source → target reference-pose rotation offset at a chain's effectors.
    pub fn effector_offset(&self, role: ChainRole) -> UnitQuaternion<f32> {
        self.effector_offsets
            .get(&role)
            .copied()
            .unwrap_or_else(UnitQuaternion::identity)
    }

    /// Configuration for retargeting target → source with the same chains.
    ///
    /// `source` and `target` are the skeletons this configuration was built for.
    #[must_use]
    pub fn inverse(&self, source: &Skeleton, target: &Skeleton) -> Self {
        Self::from_parts(
            target,
            source,
            self.mapping.inverse(),
            self.policies.clone(),
            1.0 / self.translation_ratio,
        )
        .with_unmapped(self.unmapped)
        .with_extrapolation(self.extrapolation)
        .with_sample_rate(self.sample_rate)
        .with_name_rule(self.name_rule.clone())
    }
}

/// Relative size difference above which an unscaled configuration is reported.
const SIZE_MISMATCH_TOLERANCE: f32 = 0.05;

/// Largest reference-pose distance from the root to any bone.
fn reference_extent(skeleton: &Skeleton) -> f32 {
    (0..skeleton.len())
        .map(|i| skeleton.reference_distance(skeleton.root(), i))
        .fold(0.0, f32::max)
}

/// Both extents when the skeletons differ in size by more than
/// [`SIZE_MISMATCH_TOLERANCE`], so a ratio of 1 would slide feet.
pub fn unscaled_size_mismatch(source: &Skeleton, target: &Skeleton) -> Option<(f32, f32)> {
    let src = reference_extent(source);
    let tgt = reference_extent(target);
    let larger = src.max(tgt);
    (larger > MIN_REFERENCE_DISTANCE && (src - tgt).abs() > SIZE_MISMATCH_TOLERANCE * larger)
        .then_some((src, tgt))
}

/// Resolve the configured scale policy to a single ratio.
pub fn translation_ratio(
    scale: &TranslationScale,
    source: &Skeleton,
    target: &Skeleton,
) -> Result<f32, SkelshiftError> {
    match scale {
        TranslationScale::Unscaled => Ok(1.0),
        TranslationScale::Uniform { ratio } => Ok(*ratio),
        TranslationScale::ReferenceBones {
            source_root,
            source_effector,
            target_root,
            target_effector,
        } => {
            let find = |skeleton: &Skeleton, side: Side, name: &str| {
                skeleton
                    .find_by_name(name)
                    .ok_or_else(|| MappingError::UnknownBone {
                        role: ChainRole::Root,
                        side,
                        name: name.to_owned(),
                    })
            };
            let src = source.reference_distance(
                find(source, Side::Source, source_root)?,
                find(source, Side::Source, source_effector)?,
            );
            let tgt = target.reference_distance(
                find(target, Side::Target, target_root)?,
                find(target, Side::Target, target_effector)?,
            );
            if src < MIN_REFERENCE_DISTANCE || tgt < MIN_REFERENCE_DISTANCE {
                return Err(ConfigError::invalid(
                    "translation_scale",
                    format!("reference distances must be non-zero (source {src}, target {tgt})"),
                )
                .into());
            }
            Ok(tgt / src)
        }
    }
}

fn pass_through_pairs(
    source: &Skeleton,
    target: &Skeleton,
    mapping: &ChainMapping,
) -> Vec<(usize, usize)> {
    target
        .bones()
        .iter()
        .filter(|bone| !mapping.is_mapped(Side::Target, bone.index))
        .filter_map(|bone| {
            let src = source.find_by_name(&bone.name)?;
            (!mapping.is_mapped(Side::Source, src)).then_some((src, bone.index))
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
