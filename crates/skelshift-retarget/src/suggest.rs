//! Bone-pair suggestions between two rigs.
//!
//! Scores every (target, source) bone pair from normalized-name similarity
//! and the similarity of each bone's reference direction from its parent,
//! then assigns pairs greedily, best score first. Nothing here feeds the
//! solver; callers turn accepted suggestions into chain configuration.

use std::collections::BTreeSet;

use nalgebra::Vector3;
use skelshift_skeleton::Skeleton;

/// Pairs scoring below this are not suggested.
pub const SUGGESTION_THRESHOLD: f32 = 0.5;

const NAME_WEIGHT: f32 = 0.7;
const DIRECTION_WEIGHT: f32 = 0.3;

/// Tokens exporters prepend that carry no anatomical meaning.
const RIG_PREFIXES: &[&str] = &["mixamorig", "bip", "bip01", "bip001", "def", "rig", "jnt", "bn"];

/// One suggested mapping from a target bone to a source bone.
#[derive(Debug, Clone, PartialEq)]
pub struct BonePairSuggestion {
    pub target: usize,
    pub source: usize,
    /// Combined similarity in `[0, 1]`.
    pub score: f32,
}

/// Canonical form of a bone name: namespace stripped, camelCase and
/// separators split, lowercased, side words reduced to `l`/`r`, rig prefixes
/// and leading zeros dropped. Tokens are joined with `_`.
///
/// `"mixamorig:LeftUpLeg"` becomes `"l_up_leg"`.
pub fn normalize_bone_name(name: &str) -> String {
    tokens(name).join("_")
}

fn tokens(name: &str) -> Vec<String> {
    let name = name.rsplit(':').next().unwrap_or(name);
    let mut words = Vec::new();
    let mut current = String::new();
    let mut prev: Option<char> = None;

    for c in name.chars() {
        if !c.is_alphanumeric() {
            flush(&mut current, &mut words);
            prev = None;
            continue;
        }
        if let Some(p) = prev {
            let lower_to_upper = p.is_lowercase() && c.is_uppercase();
            let kind_change = p.is_ascii_digit() != c.is_ascii_digit();
            if lower_to_upper || kind_change {
                flush(&mut current, &mut words);
            }
        }
        current.extend(c.to_lowercase());
        prev = Some(c);
    }
    flush(&mut current, &mut words);

    let mut out = Vec::with_capacity(words.len());
    let mut after_prefix = false;
    for word in words {
        let numeric = word.chars().all(|c| c.is_ascii_digit());
        if RIG_PREFIXES.contains(&word.as_str()) {
            after_prefix = true;
            continue;
        }
        // "Bip01": the number belongs to the prefix
        if numeric && after_prefix {
            after_prefix = false;
            continue;
        }
        after_prefix = false;
        out.push(match word.as_str() {
            "left" | "lft" => "l".to_owned(),
            "right" | "rgt" => "r".to_owned(),
            _ if numeric => {
                let trimmed = word.trim_start_matches('0');
                if trimmed.is_empty() {
                    "0".to_owned()
                } else {
                    trimmed.to_owned()
                }
            }
            _ => word,
        });
    }
    out
}

fn flush(current: &mut String, words: &mut Vec<String>) {
    if !current.is_empty() {
        words.push(std::mem::take(current));
    }
}

/// Token-set Jaccard similarity of two names, `1.0` for identical canonical forms.
#[allow(clippy::cast_precision_loss)]
fn name_similarity(a: &[String], b: &[String]) -> f32 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    if a == b {
        return 1.0;
    }
    let a: BTreeSet<&str> = a.iter().map(String::as_str).collect();
    let b: BTreeSet<&str> = b.iter().map(String::as_str).collect();
    let shared = a.intersection(&b).count();
    let total = a.union(&b).count();
    shared as f32 / total as f32
}

/// Reference direction from a bone's parent, `None` for roots and zero-length bones.
fn direction_from_parent(skeleton: &Skeleton, bone: usize) -> Option<Vector3<f32>> {
    let parent = skeleton.parent(bone)?;
    let offset = skeleton.global_reference_transform(bone).translation
        - skeleton.global_reference_transform(parent).translation;
    offset.try_normalize(1e-6)
}

fn direction_similarity(a: Option<Vector3<f32>>, b: Option<Vector3<f32>>) -> f32 {
    match (a, b) {
        (Some(a), Some(b)) => 0.5 * (1.0 + a.dot(&b).clamp(-1.0, 1.0)),
        (None, None) => 1.0,
        _ => 0.0,
    }
}

/// Best unique source bone for each target bone, sorted by target index.
/// Target bones without a pair above [`SUGGESTION_THRESHOLD`] are omitted.
pub fn suggest_bone_pairs(source: &Skeleton, target: &Skeleton) -> Vec<BonePairSuggestion> {
    let describe = |skeleton: &Skeleton| -> Vec<(Vec<String>, Option<Vector3<f32>>)> {
        (0..skeleton.len())
            .map(|i| (tokens(skeleton.name(i)), direction_from_parent(skeleton, i)))
            .collect()
    };
    let source_desc = describe(source);
    let target_desc = describe(target);

    let mut candidates = Vec::new();
    for (t, (t_tokens, t_dir)) in target_desc.iter().enumerate() {
        for (s, (s_tokens, s_dir)) in source_desc.iter().enumerate() {
            let score = NAME_WEIGHT * name_similarity(t_tokens, s_tokens)
                + DIRECTION_WEIGHT * direction_similarity(*t_dir, *s_dir);
            if score >= SUGGESTION_THRESHOLD {
                candidates.push(BonePairSuggestion {
                    target: t,
                    source: s,
                    score,
                });
            }
        }
    }
    candidates.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then(a.target.cmp(&b.target))
            .then(a.source.cmp(&b.source))
    });

    let mut used_source = vec![false; source.len()];
    let mut used_target = vec![false; target.len()];
    let mut chosen = Vec::new();
    for candidate in candidates {
        if used_source[candidate.source] || used_target[candidate.target] {
            continue;
        }
        used_source[candidate.source] = true;
        used_target[candidate.target] = true;
        chosen.push(candidate);
    }
    chosen.sort_by_key(|c| c.target);

    tracing::debug!(
        suggested = chosen.len(),
        target_bones = target.len(),
        "bone pair suggestions"
    );
    chosen
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
