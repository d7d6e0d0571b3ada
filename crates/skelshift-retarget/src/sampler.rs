//! Source animation contract and pose sampling.

use skelshift_core::config::Extrapolation;
use skelshift_core::{FrameError, Transform};
use skelshift_skeleton::{Pose, Skeleton};

use crate::diagnostics::FrameDiagnostic;

// ---------------------------------------------------------------------------
// AnimationSource
// ---------------------------------------------------------------------------

/// Anything that yields local bone transforms over time.
pub trait AnimationSource {
    /// Clip length in seconds.
    fn duration(&self) -> f32;

    /// Local transform of `bone_name` at `time` (already within
    /// `[0, duration]`), or `None` if the bone is not animated.
    fn sample_local_transform(&self, bone_name: &str, time: f32) -> Option<Transform>;

    /// Display name, used for batch output naming.
    fn name(&self) -> &str {
        "animation"
    }
}

impl<T: AnimationSource + ?Sized> AnimationSource for &T {
    fn duration(&self) -> f32 {
        (**self).duration()
    }

    fn sample_local_transform(&self, bone_name: &str, time: f32) -> Option<Transform> {
        (**self).sample_local_transform(bone_name, time)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

// ---------------------------------------------------------------------------
// PoseSampler
// ---------------------------------------------------------------------------

/// A sampled source pose plus how its time was resolved.
#[derive(Debug, Clone)]
pub struct SampledPose {
    pub pose: Pose,
    /// Time actually sampled, after extrapolation.
    pub time: f32,
    pub diagnostic: Option<FrameDiagnostic>,
}

/// Builds source-skeleton poses from an [`AnimationSource`].
#[derive(Debug, Clone, Copy)]
pub struct PoseSampler<'a> {
    skeleton: &'a Skeleton,
    extrapolation: Extrapolation,
}

impl<'a> PoseSampler<'a> {
    pub const fn new(skeleton: &'a Skeleton, extrapolation: Extrapolation) -> Self {
        Self {
            skeleton,
            extrapolation,
        }
    }

    /// Map `time` into `[0, duration]` according to the extrapolation policy.
    pub fn resolve_time(
        &self,
        time: f32,
        duration: f32,
    ) -> Result<(f32, Option<FrameDiagnostic>), FrameError> {
        let duration = duration.max(0.0);
        if !time.is_finite() {
            return Err(FrameError::TimeOutOfRange { time, duration });
        }
        if (0.0..=duration).contains(&time) {
            return Ok((time, None));
        }
        match self.extrapolation {
            Extrapolation::Reject => Err(FrameError::TimeOutOfRange { time, duration }),
            Extrapolation::Clamp => {
                let resolved = time.clamp(0.0, duration);
                Ok((
                    resolved,
                    Some(FrameDiagnostic::TimeClamped {
                        requested: time,
                        resolved,
                        duration,
                    }),
                ))
            }
            Extrapolation::Wrap => {
                let resolved = if duration > 0.0 {
                    time.rem_euclid(duration)
                } else {
                    0.0
                };
                Ok((
                    resolved,
                    Some(FrameDiagnostic::TimeWrapped {
                        requested: time,
                        resolved,
                        duration,
                    }),
                ))
            }
        }
    }

    /// Sample every bone of the skeleton at `time`.
    ///
    /// Bones the animation does not drive keep their reference local transform.
    pub fn sample<A: AnimationSource + ?Sized>(
        &self,
        animation: &A,
        time: f32,
    ) -> Result<SampledPose, FrameError> {
        let (time, diagnostic) = self.resolve_time(time, animation.duration())?;
        let local = self
            .skeleton
            .bones()
            .iter()
            .map(|bone| {
                animation
                    .sample_local_transform(&bone.name, time)
                    .unwrap_or(bone.reference_local)
            })
            .collect();
        Ok(SampledPose {
            pose: Pose::from_local(self.skeleton, local),
            time,
            diagnostic,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
