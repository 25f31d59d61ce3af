//! The per-commit telemetry record

use crate::error::{TelemetryError, TelemetryResult};
use crate::phase::{Phase, PhaseInterval};
use crate::time::TimePoint;
use std::cell::Cell;
use std::ops::Deref;
use std::rc::Rc;
use std::time::Duration;

/// Report a misuse of the phase state machine.
///
/// Fatal in debug builds and with `strict-contracts`; otherwise logged and
/// ignored, leaving the record unchanged.
#[track_caller]
fn contract_violation(err: TelemetryError) {
    tracing::error!(
        target: "commit_telemetry",
        phase = err.phase().name(),
        error = %err,
        "telemetry contract violation"
    );

    if cfg!(any(debug_assertions, feature = "strict-contracts")) {
        panic!("telemetry contract violation: {err}");
    }
}

/// Timing and counters for one commit attempt.
///
/// Each of the four [`Phase`]s is begun once and ended once, in that order.
/// Phases are independent of each other: layout may start before diff ends.
///
/// All methods take `&self` so deeply nested pipeline code can report through
/// a shared reference (see [`crate::registry`]). The record is `Send` but not
/// `Sync`: one thread writes it, and it may be handed to another thread once
/// the commit is done.
///
/// # Example
///
/// ```rust
/// use commit_telemetry::{CommitTelemetry, Phase};
///
/// let telemetry = CommitTelemetry::new().with_revision_number(3);
/// telemetry.begin_commit();
/// telemetry.begin_layout();
/// telemetry.record_text_measurement();
/// telemetry.end_layout();
/// telemetry.end_commit();
///
/// assert!(telemetry.commit_start() <= telemetry.commit_end());
/// assert_eq!(telemetry.text_measurement_count(), 1);
/// assert!(telemetry.duration(Phase::Diff).is_none());
/// ```
#[derive(Debug, Clone, Default)]
pub struct CommitTelemetry {
    revision_number: Cell<i64>,
    commit: Cell<PhaseInterval>,
    diff: Cell<PhaseInterval>,
    layout: Cell<PhaseInterval>,
    mount: Cell<PhaseInterval>,
    text_measurements: Cell<u64>,
}

impl CommitTelemetry {
    /// Create a record with every phase not started and no measurements.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the revision number while building.
    pub fn with_revision_number(self, revision_number: i64) -> Self {
        self.revision_number.set(revision_number);
        self
    }

    /// Wrap in an `Rc` so it can be associated with the current thread.
    pub fn into_shared(self) -> Rc<Self> {
        Rc::new(self)
    }

    fn slot(&self, phase: Phase) -> &Cell<PhaseInterval> {
        match phase {
            Phase::Commit => &self.commit,
            Phase::Diff => &self.diff,
            Phase::Layout => &self.layout,
            Phase::Mount => &self.mount,
        }
    }

    // =========================================================================
    // Phase boundaries
    // =========================================================================

    /// Begin `phase`, failing if it was already begun.
    pub fn try_begin(&self, phase: Phase) -> TelemetryResult<()> {
        let slot = self.slot(phase);
        let mut interval = slot.get();
        let now = TimePoint::now();
        interval.try_begin(phase, now)?;
        slot.set(interval);

        tracing::trace!(
            target: "commit_telemetry",
            phase = phase.name(),
            revision = self.revision_number(),
            at = %now,
            "phase started"
        );
        Ok(())
    }

    /// End `phase`, failing if it is not currently running.
    pub fn try_end(&self, phase: Phase) -> TelemetryResult<()> {
        let slot = self.slot(phase);
        let mut interval = slot.get();
        let now = TimePoint::now();
        interval.try_finish(phase, now)?;
        slot.set(interval);

        tracing::trace!(
            target: "commit_telemetry",
            phase = phase.name(),
            revision = self.revision_number(),
            at = %now,
            elapsed_us = interval.duration().unwrap_or_default().as_secs_f64() * 1_000_000.0,
            "phase finished"
        );
        Ok(())
    }

    /// Begin `phase`.
    ///
    /// # Panics
    ///
    /// In debug builds, if the phase was already begun or finished.
    #[track_caller]
    pub fn begin(&self, phase: Phase) {
        if let Err(err) = self.try_begin(phase) {
            contract_violation(err);
        }
    }

    /// End `phase`.
    ///
    /// # Panics
    ///
    /// In debug builds, if the phase was never begun or already ended.
    #[track_caller]
    pub fn end(&self, phase: Phase) {
        if let Err(err) = self.try_end(phase) {
            contract_violation(err);
        }
    }

    /// Begin `phase` now and end it when the returned scope drops.
    ///
    /// If the phase cannot begin, the scope does nothing on drop.
    #[track_caller]
    pub fn phase_scope(&self, phase: Phase) -> PhaseScope<'_> {
        let started = match self.try_begin(phase) {
            Ok(()) => true,
            Err(err) => {
                contract_violation(err);
                false
            }
        };
        PhaseScope {
            telemetry: self,
            phase,
            finished: !started,
        }
    }

    /// Begin the commit phase.
    #[track_caller]
    pub fn begin_commit(&self) {
        self.begin(Phase::Commit);
    }

    /// End the commit phase.
    #[track_caller]
    pub fn end_commit(&self) {
        self.end(Phase::Commit);
    }

    /// Begin the diff phase.
    #[track_caller]
    pub fn begin_diff(&self) {
        self.begin(Phase::Diff);
    }

    /// End the diff phase.
    #[track_caller]
    pub fn end_diff(&self) {
        self.end(Phase::Diff);
    }

    /// Begin the layout phase.
    #[track_caller]
    pub fn begin_layout(&self) {
        self.begin(Phase::Layout);
    }

    /// End the layout phase.
    #[track_caller]
    pub fn end_layout(&self) {
        self.end(Phase::Layout);
    }

    /// Begin the mount phase.
    #[track_caller]
    pub fn begin_mount(&self) {
        self.begin(Phase::Mount);
    }

    /// End the mount phase.
    #[track_caller]
    pub fn end_mount(&self) {
        self.end(Phase::Mount);
    }

    // =========================================================================
    // Counters
    // =========================================================================

    /// Count one text measurement. Usually called during layout, but any
    /// time is accepted.
    pub fn record_text_measurement(&self) {
        self.text_measurements
            .set(self.text_measurements.get().saturating_add(1));
    }

    /// Number of text measurements recorded so far.
    pub fn text_measurement_count(&self) -> u64 {
        self.text_measurements.get()
    }

    /// Overwrite the revision number.
    pub fn set_revision_number(&self, revision_number: i64) {
        self.revision_number.set(revision_number);
    }

    /// The revision this commit belongs to.
    pub fn revision_number(&self) -> i64 {
        self.revision_number.get()
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Current state of `phase`. Never fails.
    pub fn interval(&self, phase: Phase) -> PhaseInterval {
        self.slot(phase).get()
    }

    /// Start and end of a finished phase.
    pub fn try_bounds(&self, phase: Phase) -> TelemetryResult<(TimePoint, TimePoint)> {
        self.interval(phase).bounds(phase)
    }

    /// How long `phase` took, once it has finished.
    pub fn duration(&self, phase: Phase) -> Option<Duration> {
        self.interval(phase).duration()
    }

    /// Start of a finished phase.
    ///
    /// # Panics
    ///
    /// In debug builds, if the phase has not finished. Release builds
    /// return [`TimePoint::UNDEFINED`] instead.
    #[track_caller]
    pub fn start_time(&self, phase: Phase) -> TimePoint {
        match self.try_bounds(phase) {
            Ok((start, _)) => start,
            Err(err) => {
                contract_violation(err);
                TimePoint::UNDEFINED
            }
        }
    }

    /// End of a finished phase. Same contract as [`CommitTelemetry::start_time`].
    #[track_caller]
    pub fn end_time(&self, phase: Phase) -> TimePoint {
        match self.try_bounds(phase) {
            Ok((_, end)) => end,
            Err(err) => {
                contract_violation(err);
                TimePoint::UNDEFINED
            }
        }
    }

    /// Start of the finished commit phase.
    #[track_caller]
    pub fn commit_start(&self) -> TimePoint {
        self.start_time(Phase::Commit)
    }

    /// End of the finished commit phase.
    #[track_caller]
    pub fn commit_end(&self) -> TimePoint {
        self.end_time(Phase::Commit)
    }

    /// Start of the finished diff phase.
    #[track_caller]
    pub fn diff_start(&self) -> TimePoint {
        self.start_time(Phase::Diff)
    }

    /// End of the finished diff phase.
    #[track_caller]
    pub fn diff_end(&self) -> TimePoint {
        self.end_time(Phase::Diff)
    }

    /// Start of the finished layout phase.
    #[track_caller]
    pub fn layout_start(&self) -> TimePoint {
        self.start_time(Phase::Layout)
    }

    /// End of the finished layout phase.
    #[track_caller]
    pub fn layout_end(&self) -> TimePoint {
        self.end_time(Phase::Layout)
    }

    /// Start of the finished mount phase.
    #[track_caller]
    pub fn mount_start(&self) -> TimePoint {
        self.start_time(Phase::Mount)
    }

    /// End of the finished mount phase.
    #[track_caller]
    pub fn mount_end(&self) -> TimePoint {
        self.end_time(Phase::Mount)
    }
}

/// A running phase that ends when dropped.
///
/// Dereferences to the record, so counters can be updated while the phase
/// is open. A scope dropped during a panic leaves its phase started.
///
/// ```rust
/// use commit_telemetry::{CommitTelemetry, Phase};
///
/// let telemetry = CommitTelemetry::new();
/// {
///     let layout = telemetry.phase_scope(Phase::Layout);
///     layout.record_text_measurement();
/// }
/// assert!(telemetry.interval(Phase::Layout).is_finished());
/// ```
#[must_use = "the phase ends as soon as the scope is dropped"]
pub struct PhaseScope<'a> {
    telemetry: &'a CommitTelemetry,
    phase: Phase,
    finished: bool,
}

impl PhaseScope<'_> {
    /// The phase this scope is timing.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// End the phase now.
    #[track_caller]
    pub fn finish(mut self) {
        if !self.finished {
            self.finished = true;
            self.telemetry.end(self.phase);
        }
    }
}

impl Deref for PhaseScope<'_> {
    type Target = CommitTelemetry;

    fn deref(&self) -> &CommitTelemetry {
        self.telemetry
    }
}

impl Drop for PhaseScope<'_> {
    fn drop(&mut self) {
        if self.finished || std::thread::panicking() {
            return;
        }
        self.telemetry.end(self.phase);
    }
}
