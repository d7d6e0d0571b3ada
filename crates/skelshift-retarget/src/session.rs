//! Retarget sessions: frame schedules, lazy iteration, parallel and batch runs.
//!
//! A session borrows both skeletons and a built [`RetargetConfig`]; it holds
//! no per-run state, so one session can drive any number of runs, including
//! concurrent ones.

use std::iter::FusedIterator;

use skelshift_core::config::validate_sample_rate;
use skelshift_core::{ConfigError, FrameError, SkelshiftError};
use skelshift_skeleton::{Pose, Skeleton};

use crate::clip::RetargetedClip;
use crate::config::RetargetConfig;
use crate::diagnostics::FrameDiagnostic;
use crate::goals::{AdjustedPose, apply_goals, extract_goals};
use crate::sampler::{AnimationSource, PoseSampler};
use crate::solver::retarget;

/// Products within this distance of a whole frame count as that frame.
const FRAME_EPSILON: f32 = 1e-4;

/// One produced target frame.
#[derive(Debug, Clone)]
pub struct RetargetFrame {
    pub index: usize,
    pub time: f32,
    pub pose: Pose,
    pub diagnostics: Vec<FrameDiagnostic>,
}

/// An eagerly collected clip and every soft condition hit while producing it.
#[derive(Debug, Clone)]
pub struct RetargetReport {
    pub clip: RetargetedClip,
    /// `(frame index, diagnostic)` in frame order.
    pub diagnostics: Vec<(usize, FrameDiagnostic)>,
}

// ---------------------------------------------------------------------------
// RetargetSession
// ---------------------------------------------------------------------------

/// Drives source animations through the retarget pipeline onto one target.
#[derive(Debug, Clone, Copy)]
pub struct RetargetSession<'a> {
    source: &'a Skeleton,
    target: &'a Skeleton,
    config: &'a RetargetConfig,
}

impl<'a> RetargetSession<'a> {
    pub const fn new(source: &'a Skeleton, target: &'a Skeleton, config: &'a RetargetConfig) -> Self {
        Self {
            source,
            target,
            config,
        }
    }

    pub const fn source(&self) -> &'a Skeleton {
        self.source
    }

    pub const fn target(&self) -> &'a Skeleton {
        self.target
    }

    pub const fn config(&self) -> &'a RetargetConfig {
        self.config
    }

    /// Frames needed to cover `[0, duration]` at `rate`: `ceil(duration · rate) + 1`.
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    pub fn frame_count(duration: f32, rate: f32) -> usize {
        if duration <= 0.0 || rate <= 0.0 {
            return 1;
        }
        (duration * rate - FRAME_EPSILON).ceil().max(0.0) as usize + 1
    }

    /// Time of frame `index`, clamped to `duration`.
    #[allow(clippy::cast_precision_loss)]
    pub fn frame_time(index: usize, duration: f32, rate: f32) -> f32 {
        (index as f32 / rate).min(duration.max(0.0))
    }

    /// Retarget a single instant of `animation`: sample, FK transfer, IK correction.
    pub fn evaluate<A: AnimationSource + ?Sized>(
        &self,
        animation: &A,
        time: f32,
    ) -> Result<AdjustedPose, FrameError> {
        let sampled =
            PoseSampler::new(self.source, self.config.extrapolation()).sample(animation, time)?;
        let fk = retarget(&sampled.pose, self.source, self.target, self.config)?;
        let goals = extract_goals(&sampled.pose, self.source, self.config)?;
        let mut adjusted = apply_goals(fk, self.target, &goals, self.config)?;
        if let Some(diagnostic) = sampled.diagnostic {
            adjusted.diagnostics.insert(0, diagnostic);
        }
        Ok(adjusted)
    }

    fn frame<A: AnimationSource + ?Sized>(
        &self,
        animation: &A,
        index: usize,
        rate: f32,
    ) -> Result<RetargetFrame, FrameError> {
        let time = Self::frame_time(index, animation.duration(), rate);
        let AdjustedPose { pose, diagnostics } = self.evaluate(animation, time)?;
        Ok(RetargetFrame {
            index,
            time,
            pose,
            diagnostics,
        })
    }

    /// Lazy, restartable iterator over every frame of `animation` at `rate`.
    ///
    /// Nothing is computed until the iterator is advanced; dropping it cancels
    /// the run.
    pub fn run<'s, A: AnimationSource + ?Sized>(
        &'s self,
        animation: &'s A,
        rate: f32,
    ) -> Result<Frames<'s, A>, ConfigError> {
        validate_sample_rate(rate)?;
        Ok(Frames {
            session: *self,
            animation,
            rate,
            next: 0,
            count: Self::frame_count(animation.duration(), rate),
        })
    }

    /// Run `animation` to completion and store it as a [`RetargetedClip`].
    pub fn collect_clip<A: AnimationSource + ?Sized>(
        &self,
        name: impl Into<String>,
        animation: &A,
        rate: f32,
    ) -> Result<RetargetReport, SkelshiftError> {
        let mut clip = RetargetedClip::new(name, self.target, rate, animation.duration().max(0.0))?;
        let mut diagnostics = Vec::new();
        for frame in self.run(animation, rate)? {
            let frame = frame?;
            clip.push_frame(frame.time, &frame.pose);
            diagnostics.extend(frame.diagnostics.into_iter().map(|d| (frame.index, d)));
        }
        tracing::info!(
            clip = %clip.name,
            frames = clip.frame_count(),
            diagnostics = diagnostics.len(),
            "retargeted clip"
        );
        Ok(RetargetReport { clip, diagnostics })
    }

    /// Compute every frame on `workers` scoped threads and return them in
    /// index order. Identical to collecting [`run`](Self::run).
    ///
    /// A panicking worker propagates its panic to the caller.
    pub fn run_parallel<A: AnimationSource + Sync + ?Sized>(
        &self,
        animation: &A,
        rate: f32,
        workers: usize,
    ) -> Result<Vec<RetargetFrame>, SkelshiftError> {
        validate_sample_rate(rate)?;
        let count = Self::frame_count(animation.duration(), rate);
        let workers = workers.clamp(1, count);
        tracing::debug!(frames = count, workers, "parallel retarget run");

        let mut results: Vec<Result<RetargetFrame, FrameError>> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..workers)
                .map(|worker| {
                    scope.spawn(move || {
                        (worker..count)
                            .step_by(workers)
                            .map(|index| self.frame(animation, index, rate))
                            .collect::<Vec<_>>()
                    })
                })
                .collect();
            handles
                .into_iter()
                .flat_map(|handle| match handle.join() {
                    Ok(frames) => frames,
                    Err(panic) => std::panic::resume_unwind(panic),
                })
                .collect()
        });

        results.sort_by_key(|r| match r {
            Ok(frame) => frame.index,
            Err(_) => usize::MAX,
        });
        results
            .into_iter()
            .collect::<Result<Vec<_>, _>>()
            .map_err(SkelshiftError::from)
    }

    /// Retarget many source animations with this session's configuration.
    /// Output clips are named by the configured [`NameRule`](skelshift_core::config::NameRule).
    pub fn run_batch(
        &self,
        animations: &[&dyn AnimationSource],
        rate: f32,
    ) -> Result<Vec<RetargetReport>, SkelshiftError> {
        animations
            .iter()
            .map(|animation| {
                let name = self.config.name_rule().apply(animation.name());
                self.collect_clip(name, *animation, rate)
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Frames
// ---------------------------------------------------------------------------

/// Iterator returned by [`RetargetSession::run`].
pub struct Frames<'s, A: ?Sized> {
    session: RetargetSession<'s>,
    animation: &'s A,
    rate: f32,
    next: usize,
    count: usize,
}

impl<A: ?Sized> Clone for Frames<'_, A> {
    fn clone(&self) -> Self {
        Self {
            session: self.session,
            animation: self.animation,
            rate: self.rate,
            next: self.next,
            count: self.count,
        }
    }
}

impl<A: ?Sized> Frames<'_, A> {
    /// Start over from frame 0.
    pub const fn restart(&mut self) {
        self.next = 0;
    }

    pub const fn rate(&self) -> f32 {
        self.rate
    }
}

impl<A: AnimationSource + ?Sized> Iterator for Frames<'_, A> {
    type Item = Result<RetargetFrame, FrameError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.count {
            return None;
        }
        let index = self.next;
        self.next += 1;
        Some(self.session.frame(self.animation, index, self.rate))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.count - self.next;
        (remaining, Some(remaining))
    }
}

impl<A: AnimationSource + ?Sized> ExactSizeIterator for Frames<'_, A> {}

impl<A: AnimationSource + ?Sized> FusedIterator for Frames<'_, A> {}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
