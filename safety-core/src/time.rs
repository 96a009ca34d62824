//! Monotonic millisecond clock primitives shared by every component.
//!
//! Targets expose a free-running millisecond counter that wraps once the
//! native `u32` range is exhausted (roughly 49.7 days). All comparisons in this
//! module are computed as wrapping differences so deadlines and elapsed
//! durations stay correct across the wrap, provided the two instants being
//! compared are less than half the range apart.

use core::fmt;
use core::ops::{Add, Sub};
use core::time::Duration;

/// Largest forward distance (in milliseconds) treated as "after" when
/// comparing two wrapping instants.
const HALF_RANGE_MS: u32 = u32::MAX / 2;

/// Point on the wrapping millisecond clock.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub struct Instant(u32);

impl Instant {
    /// Clock origin used by tests and freshly booted targets.
    pub const ZERO: Self = Self(0);

    /// Creates an instant from a raw millisecond tick count.
    #[must_use]
    pub const fn from_millis(millis: u32) -> Self {
        Self(millis)
    }

    /// Returns the raw millisecond tick count.
    #[must_use]
    pub const fn as_millis(self) -> u32 {
        self.0
    }

    /// Milliseconds elapsed from `earlier` to `self`, computed modulo 2^32.
    #[must_use]
    pub const fn millis_since(self, earlier: Self) -> u32 {
        self.0.wrapping_sub(earlier.0)
    }

    /// Elapsed time from `earlier` to `self`, computed modulo 2^32.
    #[must_use]
    pub fn duration_since(self, earlier: Self) -> Duration {
        Duration::from_millis(u64::from(self.millis_since(earlier)))
    }

    /// Returns `true` once at least `duration` has passed since `since`.
    #[must_use]
    pub fn has_elapsed(self, since: Self, duration: Duration) -> bool {
        u64::from(self.millis_since(since)) >= duration_millis(duration)
    }

    /// Returns `true` when strictly more than `duration` has passed since `since`.
    #[must_use]
    pub fn has_exceeded(self, since: Self, duration: Duration) -> bool {
        u64::from(self.millis_since(since)) > duration_millis(duration)
    }

    /// Returns `true` when `self` is at or past `deadline`.
    #[must_use]
    pub const fn has_reached(self, deadline: Self) -> bool {
        self.millis_since(deadline) <= HALF_RANGE_MS
    }

    /// Returns `true` when `self` lies strictly before `other` on the wrapping clock.
    #[must_use]
    pub const fn is_before(self, other: Self) -> bool {
        !self.has_reached(other)
    }
}

impl Add<Duration> for Instant {
    type Output = Self;

    fn add(self, rhs: Duration) -> Self::Output {
        Self(self.0.wrapping_add(clamp_millis(rhs)))
    }
}

impl Sub<Duration> for Instant {
    type Output = Self;

    fn sub(self, rhs: Duration) -> Self::Output {
        Self(self.0.wrapping_sub(clamp_millis(rhs)))
    }
}

impl fmt::Display for Instant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ms", self.0)
    }
}

fn duration_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Returns `true` when `duration` is short enough for wrapping comparisons
/// against an instant to stay meaningful.
#[must_use]
pub fn fits_clock_span(duration: Duration) -> bool {
    duration_millis(duration) <= u64::from(HALF_RANGE_MS)
}

/// Converts a [`Duration`] into clock ticks, saturating at the wrap range.
#[must_use]
pub fn clamp_millis(duration: Duration) -> u32 {
    u32::try_from(duration.as_millis()).unwrap_or(u32::MAX)
}
