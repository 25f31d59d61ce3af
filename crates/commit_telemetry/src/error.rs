//! Error types for commit telemetry.

use crate::phase::Phase;
use thiserror::Error;

/// A misuse of the phase state machine.
///
/// Every variant is a programmer error: the pipeline driver called a phase
/// boundary out of order, or a reader asked for timestamps too early.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TelemetryError {
    /// `begin` called on a phase that is already running
    #[error("{0} phase already started")]
    PhaseAlreadyStarted(Phase),

    /// `begin` or `end` called on a phase that has already finished
    #[error("{0} phase already finished")]
    PhaseAlreadyFinished(Phase),

    /// `end` called before `begin`
    #[error("{0} phase ended before it started")]
    PhaseNotStarted(Phase),

    /// Timestamps read before the phase finished
    #[error("{0} phase timestamps read before the phase finished")]
    PhaseNotFinished(Phase),

    /// A transition was given the undefined time point
    #[error("{0} phase given an undefined time point")]
    UndefinedTimePoint(Phase),
}

impl TelemetryError {
    /// The phase the violation concerns.
    pub fn phase(&self) -> Phase {
        match *self {
            Self::PhaseAlreadyStarted(phase)
            | Self::PhaseAlreadyFinished(phase)
            | Self::PhaseNotStarted(phase)
            | Self::PhaseNotFinished(phase)
            | Self::UndefinedTimePoint(phase) => phase,
        }
    }
}

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TelemetryError::PhaseNotStarted(Phase::Layout);
        assert_eq!(err.to_string(), "layout phase ended before it started");

        let err = TelemetryError::PhaseNotFinished(Phase::Commit);
        assert_eq!(
            err.to_string(),
            "commit phase timestamps read before the phase finished"
        );
    }

    #[test]
    fn test_error_phase() {
        assert_eq!(TelemetryError::PhaseAlreadyStarted(Phase::Diff).phase(), Phase::Diff);
        assert_eq!(TelemetryError::PhaseAlreadyFinished(Phase::Mount).phase(), Phase::Mount);
        assert_eq!(TelemetryError::UndefinedTimePoint(Phase::Layout).phase(), Phase::Layout);
    }
}
