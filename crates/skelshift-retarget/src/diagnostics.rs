//! Soft per-frame conditions reported alongside produced frames.

use std::fmt;

use skelshift_core::{ChainRole, FrameError};

/// A recoverable condition hit while producing a frame. Never aborts a run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FrameDiagnostic {
    /// Sample time outside the clip, clamped to the nearest boundary.
    TimeClamped {
        requested: f32,
        resolved: f32,
        duration: f32,
    },
    /// Sample time outside the clip, wrapped into range.
    TimeWrapped {
        requested: f32,
        resolved: f32,
        duration: f32,
    },
    /// IK goal outside the limb's reach; the limb was clamped toward it.
    GoalClamped {
        role: ChainRole,
        distance: f32,
        min_reach: f32,
        max_reach: f32,
    },
}

impl FrameDiagnostic {
    /// The error this condition would have been under a strict policy.
    pub const fn as_error(&self) -> FrameError {
        match *self {
            Self::TimeClamped {
                requested,
                duration,
                ..
            }
            | Self::TimeWrapped {
                requested,
                duration,
                ..
            } => FrameError::TimeOutOfRange {
                time: requested,
                duration,
            },
            Self::GoalClamped {
                role,
                distance,
                min_reach,
                max_reach,
            } => FrameError::UnreachableGoal {
                role,
                distance,
                min_reach,
                max_reach,
            },
        }
    }
}

impl fmt::Display for FrameDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TimeClamped { resolved, .. } => {
                write!(f, "{} (clamped to {resolved})", self.as_error())
            }
            Self::TimeWrapped { resolved, .. } => {
                write!(f, "{} (wrapped to {resolved})", self.as_error())
            }
            Self::GoalClamped { .. } => write!(f, "{} (clamped)", self.as_error()),
        }
    }
}
