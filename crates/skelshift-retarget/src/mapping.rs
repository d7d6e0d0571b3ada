//! Validated role → (source bones, target bones) chain mapping.

use std::collections::HashMap;

use skelshift_core::config::{BoneRange, ChainConfig, ChainMode};
use skelshift_core::{ChainRole, MappingError, Side};
use skelshift_skeleton::Skeleton;

// ---------------------------------------------------------------------------
// ChainMappingEntry
// ---------------------------------------------------------------------------

/// One mapped chain. Bone lists are parent-first and never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainMappingEntry {
    pub role: ChainRole,
    pub source: Vec<usize>,
    pub target: Vec<usize>,
    /// Member of `source` whose world transform drives IK goals.
    pub source_effector: usize,
    /// Member of `target` solved toward the goal.
    pub target_effector: usize,
}

impl ChainMappingEntry {
    pub fn bones(&self, side: Side) -> &[usize] {
        match side {
            Side::Source => &self.source,
            Side::Target => &self.target,
        }
    }

    pub const fn effector(&self, side: Side) -> usize {
        match side {
            Side::Source => self.source_effector,
            Side::Target => self.target_effector,
        }
    }

    fn swapped(&self) -> Self {
        Self {
            role: self.role,
            source: self.target.clone(),
            target: self.source.clone(),
            source_effector: self.target_effector,
            target_effector: self.source_effector,
        }
    }
}

// ---------------------------------------------------------------------------
// ChainMapping
// ---------------------------------------------------------------------------

/// The full set of chains between a source and a target skeleton.
///
/// No bone belongs to more than one chain on the same side.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChainMapping {
    entries: Vec<ChainMappingEntry>,
    source_owner: HashMap<usize, ChainRole>,
    target_owner: HashMap<usize, ChainRole>,
}

impl ChainMapping {
    /// Resolve and validate chain declarations against both skeletons.
    pub fn build(
        source: &Skeleton,
        target: &Skeleton,
        chains: &[ChainConfig],
    ) -> Result<Self, MappingError> {
        let mut mapping = Self::default();
        for chain in chains {
            if mapping.get(chain.role).is_some() {
                return Err(MappingError::DuplicateRole(chain.role));
            }
            let source_bones = resolve_range(source, chain.role, Side::Source, &chain.source)?;
            let target_bones = resolve_range(target, chain.role, Side::Target, &chain.target)?;
            let needs_limb = chain.mode == ChainMode::Ik;
            let source_effector = resolve_effector(
                source,
                chain.role,
                Side::Source,
                &source_bones,
                chain.source_effector.as_deref(),
                needs_limb,
            )?;
            let target_effector = resolve_effector(
                target,
                chain.role,
                Side::Target,
                &target_bones,
                chain.target_effector.as_deref(),
                needs_limb,
            )?;

            claim(&mut mapping.source_owner, source, Side::Source, chain.role, &source_bones)?;
            claim(&mut mapping.target_owner, target, Side::Target, chain.role, &target_bones)?;

            mapping.entries.push(ChainMappingEntry {
                role: chain.role,
                source: source_bones,
                target: target_bones,
                source_effector,
                target_effector,
            });
        }

        tracing::debug!(chains = mapping.entries.len(), "built chain mapping");
        Ok(mapping)
    }

    /// Entries in declaration order.
    pub fn entries(&self) -> &[ChainMappingEntry] {
        &self.entries
    }

    pub fn get(&self, role: ChainRole) -> Option<&ChainMappingEntry> {
        self.entries.iter().find(|e| e.role == role)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Role of the chain that claims `bone` on `side`, if any.
    pub fn role_of(&self, side: Side, bone: usize) -> Option<ChainRole> {
        match side {
            Side::Source => self.source_owner.get(&bone).copied(),
            Side::Target => self.target_owner.get(&bone).copied(),
        }
    }

    pub fn is_mapped(&self, side: Side, bone: usize) -> bool {
        self.role_of(side, bone).is_some()
    }

    /// The same chains with source and target swapped.
    #[must_use]
    pub fn inverse(&self) -> Self {
        Self {
            entries: self.entries.iter().map(ChainMappingEntry::swapped).collect(),
            source_owner: self.target_owner.clone(),
            target_owner: self.source_owner.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Resolution helpers
// ---------------------------------------------------------------------------

fn lookup(
    skeleton: &Skeleton,
    role: ChainRole,
    side: Side,
    name: &str,
) -> Result<usize, MappingError> {
    skeleton
        .find_by_name(name)
        .ok_or_else(|| MappingError::UnknownBone {
            role,
            side,
            name: name.to_owned(),
        })
}

fn resolve_range(
    skeleton: &Skeleton,
    role: ChainRole,
    side: Side,
    range: &BoneRange,
) -> Result<Vec<usize>, MappingError> {
    match range {
        BoneRange::Span { start, end } => {
            let first = lookup(skeleton, role, side, start)?;
            let last = lookup(skeleton, role, side, end)?;
            skeleton
                .path_between(first, last)
                .ok_or_else(|| MappingError::ChainDiscontinuity {
                    role,
                    side,
                    bone: end.clone(),
                })
        }
        BoneRange::List(names) => {
            if names.is_empty() {
                return Err(MappingError::EmptyChain { role, side });
            }
            let bones = names
                .iter()
                .map(|name| lookup(skeleton, role, side, name))
                .collect::<Result<Vec<_>, _>>()?;
            if let Some(pair) = bones
                .windows(2)
                .find(|pair| skeleton.parent(pair[1]) != Some(pair[0]))
            {
                return Err(MappingError::ChainDiscontinuity {
                    role,
                    side,
                    bone: skeleton.name(pair[1]).to_owned(),
                });
            }
            Ok(bones)
        }
    }
}

fn resolve_effector(
    skeleton: &Skeleton,
    role: ChainRole,
    side: Side,
    bones: &[usize],
    name: Option<&str>,
    needs_limb: bool,
) -> Result<usize, MappingError> {
    let position = match name {
        None => bones.len() - 1,
        Some(name) => {
            let bone = lookup(skeleton, role, side, name)?;
            bones.iter().position(|&b| b == bone).ok_or_else(|| {
                MappingError::EffectorOutsideChain {
                    role,
                    side,
                    bone: name.to_owned(),
                }
            })?
        }
    };
    if needs_limb && position < 2 {
        return Err(MappingError::ChainTooShortForIk {
            role,
            side,
            bones: position + 1,
        });
    }
    Ok(bones[position])
}

fn claim(
    owners: &mut HashMap<usize, ChainRole>,
    skeleton: &Skeleton,
    side: Side,
    role: ChainRole,
    bones: &[usize],
) -> Result<(), MappingError> {
    for &bone in bones {
        if let Some(&first) = owners.get(&bone) {
            return Err(MappingError::ChainOverlap {
                side,
                bone: skeleton.name(bone).to_owned(),
                first,
                second: role,
            });
        }
        owners.insert(bone, role);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
