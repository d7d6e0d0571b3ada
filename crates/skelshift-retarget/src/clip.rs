//! Keyframe clip storage.
//!
//! [`KeyframeClip`] is the input-side store (sparse per-bone keys, loadable
//! from TOML). [`RetargetedClip`] is the output-side layout: one key per
//! frame for every target bone, as an output sink would persist it. Both
//! implement [`AnimationSource`], so retargeted output can be fed back in.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use skelshift_core::config::validate_sample_rate;
use skelshift_core::{ConfigError, Transform};
use skelshift_skeleton::{Pose, Skeleton};

use crate::sampler::AnimationSource;

const fn default_rotation() -> [f32; 4] {
    [0.0, 0.0, 0.0, 1.0]
}
const fn default_scale() -> [f32; 3] {
    [1.0, 1.0, 1.0]
}

/// Index pair and blend factor bracketing `time` in a sorted key sequence.
fn bracket(len: usize, time_at: impl Fn(usize) -> f32, time: f32) -> (usize, usize, f32) {
    if len <= 1 || time <= time_at(0) {
        return (0, 0, 0.0);
    }
    let last = len - 1;
    if time >= time_at(last) {
        return (last, last, 0.0);
    }
    // First key strictly after `time`; always in 1..=last here.
    let (mut lo, mut hi) = (0, last);
    while hi - lo > 1 {
        let mid = (lo + hi) / 2;
        if time_at(mid) <= time {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    let span = time_at(hi) - time_at(lo);
    let t = if span > 0.0 {
        (time - time_at(lo)) / span
    } else {
        0.0
    };
    (lo, hi, t)
}

// ---------------------------------------------------------------------------
// KeyframeClip
// ---------------------------------------------------------------------------

/// One key of a bone track.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransformKey {
    pub time: f32,
    #[serde(default)]
    pub translation: [f32; 3],
    /// Quaternion `[x, y, z, w]`.
    #[serde(default = "default_rotation")]
    pub rotation: [f32; 4],
    #[serde(default = "default_scale")]
    pub scale: [f32; 3],
}

impl TransformKey {
    pub fn new(time: f32, transform: &Transform) -> Self {
        Self {
            time,
            translation: transform.translation_array(),
            rotation: transform.rotation_array(),
            scale: transform.scale_array(),
        }
    }

    pub fn transform(&self) -> Transform {
        Transform::from_arrays(self.translation, self.rotation, self.scale)
    }
}

/// Sparse keyframe animation, tracks keyed by bone name.
///
/// Translation and scale interpolate linearly, rotation spherically. Times
/// before the first key or after the last hold the boundary key.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct KeyframeClip {
    #[serde(default)]
    pub name: String,
    pub duration: f32,
    #[serde(default)]
    pub tracks: BTreeMap<String, Vec<TransformKey>>,
}

impl KeyframeClip {
    pub fn new(name: impl Into<String>, duration: f32) -> Self {
        Self {
            name: name.into(),
            duration,
            tracks: BTreeMap::new(),
        }
    }

    /// Add or replace a bone track. Keys are sorted by time.
    #[must_use]
    pub fn with_track(mut self, bone: impl Into<String>, mut keys: Vec<TransformKey>) -> Self {
        keys.sort_by(|a, b| a.time.total_cmp(&b.time));
        self.tracks.insert(bone.into(), keys);
        self
    }

    /// Record a full pose as a key on every bone.
    pub fn push_pose(&mut self, skeleton: &Skeleton, time: f32, pose: &Pose) {
        for bone in skeleton.bones() {
            let keys = self.tracks.entry(bone.name.clone()).or_default();
            keys.push(TransformKey::new(time, pose.local(bone.index)));
        }
        self.duration = self.duration.max(time);
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.duration.is_finite() || self.duration < 0.0 {
            return Err(ConfigError::invalid(
                "duration",
                format!("{} (must be finite and >= 0)", self.duration),
            ));
        }
        for (bone, keys) in &self.tracks {
            if keys.is_empty() {
                return Err(ConfigError::MissingField(format!("tracks.{bone}")));
            }
            if keys.iter().any(|k| !k.time.is_finite()) {
                return Err(ConfigError::invalid(
                    format!("tracks.{bone}"),
                    "key times must be finite",
                ));
            }
            if keys.windows(2).any(|w| w[1].time < w[0].time) {
                return Err(ConfigError::invalid(
                    format!("tracks.{bone}"),
                    "key times must be ascending",
                ));
            }
        }
        Ok(())
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let clip: Self = toml::from_str(content)?;
        clip.validate()?;
        Ok(clip)
    }

    /// Load from TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }
}

impl AnimationSource for KeyframeClip {
    fn duration(&self) -> f32 {
        self.duration
    }

    fn sample_local_transform(&self, bone_name: &str, time: f32) -> Option<Transform> {
        let keys = self.tracks.get(bone_name)?;
        if keys.is_empty() {
            return None;
        }
        let (i0, i1, t) = bracket(keys.len(), |i| keys[i].time, time);
        Some(keys[i0].transform().interpolate(&keys[i1].transform(), t))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

// ---------------------------------------------------------------------------
// RetargetedClip
// ---------------------------------------------------------------------------

/// Dense per-frame keys of one target bone.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BoneTrack {
    pub bone: String,
    pub positions: Vec<[f32; 3]>,
    /// Quaternions `[x, y, z, w]`.
    pub rotations: Vec<[f32; 4]>,
    pub scales: Vec<[f32; 3]>,
}

impl BoneTrack {
    /// Number of complete keys (position, rotation and scale all present).
    pub fn key_count(&self) -> usize {
        self.positions
            .len()
            .min(self.rotations.len())
            .min(self.scales.len())
    }

    fn key(&self, frame: usize) -> Transform {
        Transform::from_arrays(self.positions[frame], self.rotations[frame], self.scales[frame])
    }
}

/// Retargeted animation: frame times plus one track per target bone in
/// skeleton index order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RetargetedClip {
    pub name: String,
    pub sample_rate: f32,
    pub duration: f32,
    pub times: Vec<f32>,
    pub tracks: Vec<BoneTrack>,
}

impl RetargetedClip {
    /// Empty clip with one (keyless) track per bone of `skeleton`.
    pub fn new(
        name: impl Into<String>,
        skeleton: &Skeleton,
        sample_rate: f32,
        duration: f32,
    ) -> Result<Self, ConfigError> {
        validate_sample_rate(sample_rate)?;
        Ok(Self {
            name: name.into(),
            sample_rate,
            duration,
            times: Vec::new(),
            tracks: skeleton
                .bones()
                .iter()
                .map(|b| BoneTrack {
                    bone: b.name.clone(),
                    ..BoneTrack::default()
                })
                .collect(),
        })
    }

    /// Append one frame. `pose` must belong to the skeleton the clip was created for.
    ///
    /// # Panics
    ///
    /// Panics if the pose has a different bone count than the clip has tracks.
    pub fn push_frame(&mut self, time: f32, pose: &Pose) {
        assert_eq!(pose.len(), self.tracks.len(), "pose does not match clip tracks");
        self.times.push(time);
        for (track, local) in self.tracks.iter_mut().zip(pose.locals()) {
            track.positions.push(local.translation_array());
            track.rotations.push(local.rotation_array());
            track.scales.push(local.scale_array());
        }
    }

    pub fn frame_count(&self) -> usize {
        self.times.len()
    }

    pub fn track(&self, bone: &str) -> Option<&BoneTrack> {
        self.tracks.iter().find(|t| t.bone == bone)
    }

    /// Local transform of `bone` at a stored frame.
    pub fn frame_transform(&self, bone: &str, frame: usize) -> Option<Transform> {
        let track = self.track(bone)?;
        (frame < track.key_count()).then(|| track.key(frame))
    }

    /// Check that every track has one key per frame time.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_sample_rate(self.sample_rate)?;
        let frames = self.times.len();
        for track in &self.tracks {
            let lengths = [track.positions.len(), track.rotations.len(), track.scales.len()];
            if lengths.iter().any(|&n| n != frames) {
                return Err(ConfigError::invalid(
                    format!("tracks.{}", track.bone),
                    format!("key counts {lengths:?} do not match {frames} frame times"),
                ));
            }
        }
        Ok(())
    }

    /// Parse and validate a JSON document written by [`RetargetedClip::to_json`].
    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        let clip: Self =
            serde_json::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        clip.validate()?;
        Ok(clip)
    }

    /// Serialize to pretty JSON.
    pub fn to_json(&self) -> Result<String, ConfigError> {
        serde_json::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }
}

impl AnimationSource for RetargetedClip {
    fn duration(&self) -> f32 {
        self.duration
    }

    fn sample_local_transform(&self, bone_name: &str, time: f32) -> Option<Transform> {
        let track = self.track(bone_name)?;
        let len = self.times.len().min(track.key_count());
        if len == 0 {
            return None;
        }
        let (i0, i1, t) = bracket(len, |i| self.times[i], time);
        Some(track.key(i0).interpolate(&track.key(i1), t))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
