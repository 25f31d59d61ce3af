//! Commit Telemetry
//!
//! Per-commit timing for the render pipeline. One [`CommitTelemetry`] record
//! follows one attempt to produce and apply a new tree revision:
//!
//! - Start and end timestamps for the commit as a whole and for its diff,
//!   layout and mount phases
//! - A count of text measurements performed (usually during layout)
//! - The revision number the commit belongs to
//!
//! Each phase is a small state machine (`NotStarted -> Started -> Finished`).
//! Ending a phase before beginning it, doing either twice, or reading
//! timestamps of an unfinished phase is a contract violation: fatal in debug
//! builds, logged and ignored in release builds unless the `strict-contracts`
//! feature is enabled. The `try_*` methods return a [`TelemetryError`]
//! instead.
//!
//! The [`registry`] module associates a record with the calling thread so
//! nested pipeline code can report without an explicit handle.
//!
//! # Feature Flags
//!
//! - `strict-contracts`: contract violations panic in release builds too
//!
//! # Example
//!
//! ```rust
//! use commit_telemetry::{registry, CommitTelemetry, Phase};
//!
//! let telemetry = CommitTelemetry::new().with_revision_number(12).into_shared();
//! let _current = registry::enter(&telemetry);
//!
//! telemetry.begin_commit();
//! {
//!     let _diff = telemetry.phase_scope(Phase::Diff);
//!     // ... diff trees ...
//! }
//! {
//!     let _layout = telemetry.phase_scope(Phase::Layout);
//!     registry::record_text_measurement();
//! }
//! telemetry.end_commit();
//!
//! assert!(telemetry.commit_start() <= telemetry.commit_end());
//! assert_eq!(telemetry.text_measurement_count(), 1);
//! ```
//!
//! # Modules
//!
//! - [`time`] - Monotonic time points
//! - [`phase`] - Phase identifiers and the interval state machine
//! - [`registry`] - Per-thread current record

mod error;
pub mod phase;
mod record;
pub mod registry;
pub mod time;

pub use error::{TelemetryError, TelemetryResult};
pub use phase::{Phase, PhaseInterval};
pub use record::{CommitTelemetry, PhaseScope};
pub use registry::CurrentTelemetryGuard;
pub use time::TimePoint;
