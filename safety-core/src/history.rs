//! Fixed-capacity acceleration history owned by the fall detector.
//!
//! The ring keeps the most recent [`HISTORY_CAPACITY`] magnitudes and is used
//! to derive the smoothed acceleration that drives the detector state machine.
//! Capacity is a const generic, so the "count never exceeds capacity" invariant
//! is carried by the type rather than by convention.

use heapless::{HistoryBuf, OldestOrdered};

/// Number of acceleration magnitudes retained by the detector.
pub const HISTORY_CAPACITY: usize = 50;

/// Circular buffer of recent acceleration magnitudes (in g).
#[derive(Clone)]
pub struct AccelerationHistory<const CAPACITY: usize = HISTORY_CAPACITY> {
    ring: HistoryBuf<f32, CAPACITY>,
}

impl<const CAPACITY: usize> AccelerationHistory<CAPACITY> {
    /// Creates an empty history.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ring: HistoryBuf::new(),
        }
    }

    /// Appends a magnitude, overwriting the oldest entry once full.
    pub fn push(&mut self, magnitude: f32) {
        self.ring.write(magnitude);
    }

    /// Returns the number of stored magnitudes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    /// Returns `true` when no magnitudes are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// Returns the fixed capacity of the ring.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        CAPACITY
    }

    /// Returns the most recently stored magnitude.
    #[must_use]
    pub fn recent(&self) -> Option<f32> {
        self.ring.recent().copied()
    }

    /// Iterates the stored magnitudes from oldest to newest.
    pub fn oldest_first(&self) -> OldestOrdered<'_, f32> {
        self.ring.oldest_ordered()
    }

    /// Drops every stored magnitude.
    pub fn clear(&mut self) {
        self.ring.clear();
    }

    /// Averages the newest `window` magnitudes (fewer if the ring holds less).
    ///
    /// Returns `None` when the history is empty or `window` is zero.
    #[must_use]
    pub fn moving_average(&self, window: usize) -> Option<f32> {
        let len = self.ring.len();
        let count = window.min(len);
        if count == 0 {
            return None;
        }

        let sum: f32 = self.ring.oldest_ordered().skip(len - count).sum();
        Some(sum / count_as_f32(count))
    }

    /// Returns the smallest and largest stored magnitudes.
    #[must_use]
    pub fn extremes(&self) -> Option<(f32, f32)> {
        let mut values = self.ring.oldest_ordered().copied();
        let first = values.next()?;
        Some(values.fold((first, first), |(min, max), value| {
            (min.min(value), max.max(value))
        }))
    }
}

impl<const CAPACITY: usize> Default for AccelerationHistory<CAPACITY> {
    fn default() -> Self {
        Self::new()
    }
}

#[allow(clippy::cast_precision_loss)]
fn count_as_f32(count: usize) -> f32 {
    count as f32
}
