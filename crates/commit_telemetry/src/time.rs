//! Monotonic timestamps for telemetry

use std::fmt;
use std::sync::OnceLock;
use std::time::{Duration, Instant};

/// Process-local anchor all time points are measured from.
static ANCHOR: OnceLock<Instant> = OnceLock::new();

#[inline]
fn anchor() -> Instant {
    *ANCHOR.get_or_init(Instant::now)
}

/// An opaque monotonic timestamp.
///
/// Stored as nanoseconds since a process-local anchor, so time points are
/// `Copy`, totally ordered, and comparable across threads of one process.
/// [`TimePoint::UNDEFINED`] marks a timestamp that was never captured and is
/// never produced by [`TimePoint::now`].
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimePoint(u64);

impl TimePoint {
    /// Sentinel for "not captured".
    pub const UNDEFINED: TimePoint = TimePoint(u64::MAX);

    /// Read the monotonic clock.
    #[inline]
    pub fn now() -> Self {
        let nanos = anchor().elapsed().as_nanos();
        // Never yields the sentinel.
        Self(u64::try_from(nanos).unwrap_or(u64::MAX).min(u64::MAX - 1))
    }

    /// Build a time point from raw nanoseconds since the anchor.
    ///
    /// `u64::MAX` maps to [`TimePoint::UNDEFINED`].
    #[inline]
    pub const fn from_nanos(nanos: u64) -> Self {
        Self(nanos)
    }

    /// Whether this is a captured timestamp rather than the sentinel.
    #[inline]
    pub fn is_defined(self) -> bool {
        self != Self::UNDEFINED
    }

    /// Nanoseconds since the anchor.
    #[inline]
    pub fn as_nanos(self) -> u64 {
        self.0
    }

    /// Time elapsed from `earlier` to `self`, or zero if `earlier` is later
    /// or either side is undefined.
    pub fn saturating_duration_since(self, earlier: TimePoint) -> Duration {
        if !self.is_defined() || !earlier.is_defined() {
            return Duration::ZERO;
        }
        Duration::from_nanos(self.0.saturating_sub(earlier.0))
    }
}

impl Default for TimePoint {
    fn default() -> Self {
        Self::UNDEFINED
    }
}

impl fmt::Debug for TimePoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_defined() {
            f.debug_tuple("TimePoint").field(&self.0).finish()
        } else {
            f.write_str("TimePoint::UNDEFINED")
        }
    }
}

impl fmt::Display for TimePoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_defined() {
            write!(f, "{:.3}us", self.0 as f64 / 1_000.0)
        } else {
            f.write_str("undefined")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    #[test]
    fn test_now_is_defined() {
        assert!(TimePoint::now().is_defined());
        assert!(!TimePoint::UNDEFINED.is_defined());
        assert_eq!(TimePoint::default(), TimePoint::UNDEFINED);
    }

    #[test]
    fn test_now_is_monotonic() {
        let first = TimePoint::now();
        sleep(Duration::from_millis(2));
        let second = TimePoint::now();
        assert!(first <= second);
        assert!(second.saturating_duration_since(first) >= Duration::from_millis(1));
    }

    #[test]
    fn test_duration_since_saturates() {
        let early = TimePoint::from_nanos(1_000);
        let late = TimePoint::from_nanos(5_000);
        assert_eq!(late.saturating_duration_since(early), Duration::from_nanos(4_000));
        assert_eq!(early.saturating_duration_since(late), Duration::ZERO);
        assert_eq!(late.saturating_duration_since(TimePoint::UNDEFINED), Duration::ZERO);
    }

    #[test]
    fn test_display() {
        assert_eq!(TimePoint::from_nanos(1_500).to_string(), "1.500us");
        assert_eq!(TimePoint::UNDEFINED.to_string(), "undefined");
    }
}
