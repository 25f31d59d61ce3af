//! Pipeline phases and their interval state machine

use crate::error::{TelemetryError, TelemetryResult};
use crate::time::TimePoint;
use std::fmt;
use std::time::Duration;

/// A timed phase of one commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// The whole commit, end to end
    Commit,
    /// Computing the patch between the previous and the new tree
    Diff,
    /// Computing geometry for the new tree
    Layout,
    /// Applying the patch to the live view hierarchy
    Mount,
}

impl Phase {
    /// All phases, in the order a pipeline usually runs them.
    pub const ALL: [Phase; 4] = [Phase::Commit, Phase::Diff, Phase::Layout, Phase::Mount];

    /// Lowercase name, used in logs and error messages.
    pub fn name(self) -> &'static str {
        match self {
            Phase::Commit => "commit",
            Phase::Diff => "diff",
            Phase::Layout => "layout",
            Phase::Mount => "mount",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The timing state of one phase.
///
/// Progresses strictly `NotStarted -> Started -> Finished`. The transition
/// methods are the only way forward and there is no way back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PhaseInterval {
    /// Phase has not begun
    #[default]
    NotStarted,
    /// Phase is running
    Started {
        /// When the phase began
        start: TimePoint,
    },
    /// Phase has completed
    Finished {
        /// When the phase began
        start: TimePoint,
        /// When the phase ended, never earlier than `start`
        end: TimePoint,
    },
}

impl PhaseInterval {
    /// Move from `NotStarted` to `Started` at `at`.
    ///
    /// `at` must be defined. On error the interval is left unchanged.
    pub fn try_begin(&mut self, phase: Phase, at: TimePoint) -> TelemetryResult<()> {
        if !at.is_defined() {
            return Err(TelemetryError::UndefinedTimePoint(phase));
        }
        match *self {
            PhaseInterval::NotStarted => {
                *self = PhaseInterval::Started { start: at };
                Ok(())
            }
            PhaseInterval::Started { .. } => Err(TelemetryError::PhaseAlreadyStarted(phase)),
            PhaseInterval::Finished { .. } => Err(TelemetryError::PhaseAlreadyFinished(phase)),
        }
    }

    /// Move from `Started` to `Finished` at `at`.
    ///
    /// `at` must be defined; one earlier than the start is clamped to the
    /// start. On error the interval is left unchanged.
    pub fn try_finish(&mut self, phase: Phase, at: TimePoint) -> TelemetryResult<()> {
        if !at.is_defined() {
            return Err(TelemetryError::UndefinedTimePoint(phase));
        }
        match *self {
            PhaseInterval::Started { start } => {
                *self = PhaseInterval::Finished {
                    start,
                    end: at.max(start),
                };
                Ok(())
            }
            PhaseInterval::NotStarted => Err(TelemetryError::PhaseNotStarted(phase)),
            PhaseInterval::Finished { .. } => Err(TelemetryError::PhaseAlreadyFinished(phase)),
        }
    }

    /// Whether the phase has begun (running or finished).
    pub fn is_started(&self) -> bool {
        !matches!(self, PhaseInterval::NotStarted)
    }

    /// Whether the phase has ended.
    pub fn is_finished(&self) -> bool {
        matches!(self, PhaseInterval::Finished { .. })
    }

    /// Start time, if the phase has begun.
    pub fn start(&self) -> Option<TimePoint> {
        match *self {
            PhaseInterval::NotStarted => None,
            PhaseInterval::Started { start } | PhaseInterval::Finished { start, .. } => Some(start),
        }
    }

    /// End time, if the phase has finished.
    pub fn end(&self) -> Option<TimePoint> {
        match *self {
            PhaseInterval::Finished { end, .. } => Some(end),
            _ => None,
        }
    }

    /// Both timestamps of a finished phase.
    pub fn bounds(&self, phase: Phase) -> TelemetryResult<(TimePoint, TimePoint)> {
        match *self {
            PhaseInterval::Finished { start, end } => Ok((start, end)),
            _ => Err(TelemetryError::PhaseNotFinished(phase)),
        }
    }

    /// How long a finished phase took.
    pub fn duration(&self) -> Option<Duration> {
        match *self {
            PhaseInterval::Finished { start, end } => Some(end.saturating_duration_since(start)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(nanos: u64) -> TimePoint {
        TimePoint::from_nanos(nanos)
    }

    #[test]
    fn test_full_progression() {
        let mut interval = PhaseInterval::default();
        assert!(!interval.is_started());
        assert_eq!(interval.start(), None);

        interval.try_begin(Phase::Diff, at(100)).unwrap();
        assert!(interval.is_started());
        assert!(!interval.is_finished());
        assert_eq!(interval.start(), Some(at(100)));
        assert_eq!(interval.end(), None);
        assert_eq!(interval.duration(), None);

        interval.try_finish(Phase::Diff, at(350)).unwrap();
        assert!(interval.is_finished());
        assert_eq!(interval.bounds(Phase::Diff), Ok((at(100), at(350))));
        assert_eq!(interval.duration(), Some(Duration::from_nanos(250)));
    }

    #[test]
    fn test_finish_before_begin_is_rejected() {
        let mut interval = PhaseInterval::default();
        assert_eq!(
            interval.try_finish(Phase::Mount, at(1)),
            Err(TelemetryError::PhaseNotStarted(Phase::Mount))
        );
        assert_eq!(interval, PhaseInterval::NotStarted);
    }

    #[test]
    fn test_double_begin_is_rejected() {
        let mut interval = PhaseInterval::default();
        interval.try_begin(Phase::Layout, at(10)).unwrap();
        assert_eq!(
            interval.try_begin(Phase::Layout, at(20)),
            Err(TelemetryError::PhaseAlreadyStarted(Phase::Layout))
        );
        assert_eq!(interval.start(), Some(at(10)));
    }

    #[test]
    fn test_no_reentry_after_finish() {
        let mut interval = PhaseInterval::default();
        interval.try_begin(Phase::Commit, at(10)).unwrap();
        interval.try_finish(Phase::Commit, at(20)).unwrap();

        assert_eq!(
            interval.try_begin(Phase::Commit, at(30)),
            Err(TelemetryError::PhaseAlreadyFinished(Phase::Commit))
        );
        assert_eq!(
            interval.try_finish(Phase::Commit, at(40)),
            Err(TelemetryError::PhaseAlreadyFinished(Phase::Commit))
        );
        assert_eq!(interval.bounds(Phase::Commit), Ok((at(10), at(20))));
    }

    #[test]
    fn test_bounds_require_finish() {
        let mut interval = PhaseInterval::default();
        assert_eq!(
            interval.bounds(Phase::Diff),
            Err(TelemetryError::PhaseNotFinished(Phase::Diff))
        );
        interval.try_begin(Phase::Diff, at(5)).unwrap();
        assert_eq!(
            interval.bounds(Phase::Diff),
            Err(TelemetryError::PhaseNotFinished(Phase::Diff))
        );
    }

    #[test]
    fn test_end_clamped_to_start() {
        let mut interval = PhaseInterval::default();
        interval.try_begin(Phase::Layout, at(500)).unwrap();
        interval.try_finish(Phase::Layout, at(400)).unwrap();
        assert_eq!(interval.bounds(Phase::Layout), Ok((at(500), at(500))));
    }

    #[test]
    fn test_undefined_time_point_is_rejected() {
        let mut interval = PhaseInterval::default();
        assert_eq!(
            interval.try_begin(Phase::Diff, TimePoint::UNDEFINED),
            Err(TelemetryError::UndefinedTimePoint(Phase::Diff))
        );
        assert_eq!(
            interval.try_begin(Phase::Diff, TimePoint::from_nanos(u64::MAX)),
            Err(TelemetryError::UndefinedTimePoint(Phase::Diff))
        );
        assert_eq!(interval, PhaseInterval::NotStarted);

        interval.try_begin(Phase::Diff, at(10)).unwrap();
        assert_eq!(
            interval.try_finish(Phase::Diff, TimePoint::UNDEFINED),
            Err(TelemetryError::UndefinedTimePoint(Phase::Diff))
        );
        assert_eq!(interval, PhaseInterval::Started { start: at(10) });

        interval.try_finish(Phase::Diff, at(20)).unwrap();
        let (start, end) = interval.bounds(Phase::Diff).unwrap();
        assert!(start.is_defined() && end.is_defined());
    }

    #[test]
    fn test_phase_names() {
        let names: Vec<_> = Phase::ALL.iter().map(|p| p.to_string()).collect();
        assert_eq!(names, ["commit", "diff", "layout", "mount"]);
    }
}
