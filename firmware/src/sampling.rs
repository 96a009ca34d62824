//! Sample hand-off between the accelerometer task and the control task.
//!
//! The sensor side never waits on the controller: when the channel is full the
//! newest sample is dropped and counted instead.

use embassy_sync::channel::{Channel, Receiver, Sender, TrySendError};
use safety_core::fall::AccelerationSample;
use safety_core::time::Instant;

#[cfg(not(target_os = "none"))]
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
#[cfg(target_os = "none")]
use embassy_sync::blocking_mutex::raw::ThreadModeRawMutex;

/// Depth of the sample queue feeding the control task.
pub const SAMPLE_QUEUE_DEPTH: usize = 4;

/// Cadence of the alert tick driven by the control task.
pub const TICK_PERIOD_MS: u64 = 10;

/// Accelerometer polling period (50 Hz).
pub const SAMPLE_PERIOD_MS: u64 = 20;

#[cfg(target_os = "none")]
type SampleMutex = ThreadModeRawMutex;
#[cfg(not(target_os = "none"))]
type SampleMutex = NoopRawMutex;

/// Queue carrying raw samples to the controller, which validates them.
pub type SampleQueue = Channel<SampleMutex, AccelerationSample, SAMPLE_QUEUE_DEPTH>;

/// Receiving half owned by the control task.
pub type SampleReceiver<'a> = Receiver<'a, SampleMutex, AccelerationSample, SAMPLE_QUEUE_DEPTH>;

/// Sending half wrapper owned by the sensor task.
pub struct SampleSender<'a> {
    sender: Sender<'a, SampleMutex, AccelerationSample, SAMPLE_QUEUE_DEPTH>,
    dropped: u32,
}

impl<'a> SampleSender<'a> {
    #[must_use]
    pub fn new(sender: Sender<'a, SampleMutex, AccelerationSample, SAMPLE_QUEUE_DEPTH>) -> Self {
        Self { sender, dropped: 0 }
    }

    /// Offers one magnitude; returns `false` when the sample was dropped.
    pub fn offer(&mut self, magnitude: f32, timestamp: Instant) -> bool {
        match self
            .sender
            .try_send(AccelerationSample::new(magnitude, timestamp))
        {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                self.dropped = self.dropped.wrapping_add(1);
                false
            }
        }
    }

    /// Samples dropped because the control task fell behind.
    #[must_use]
    pub fn dropped(&self) -> u32 {
        self.dropped
    }
}

/// Truncates a 64-bit monotonic millisecond count onto the wrapping core clock.
#[must_use]
pub fn wrap_millis(millis: u64) -> Instant {
    let low = millis & u64::from(u32::MAX);
    Instant::from_millis(u32::try_from(low).unwrap_or(u32::MAX))
}

/// Current time on the core clock.
#[cfg(target_os = "none")]
#[must_use]
pub fn now() -> Instant {
    wrap_millis(embassy_time::Instant::now().as_millis())
}

/// Linear calibration for one analog accelerometer axis.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct AxisCalibration {
    /// ADC reading at 0 g.
    pub zero_counts: u16,
    /// ADC counts per 1 g.
    pub counts_per_g: u16,
}

impl AxisCalibration {
    /// Ratiometric 300 mV/g part on a 3.3 V, 12-bit converter.
    pub const DEFAULT: Self = Self {
        zero_counts: 2_048,
        counts_per_g: 372,
    };

    fn milli_g(self, counts: u16) -> i64 {
        let offset = i64::from(counts) - i64::from(self.zero_counts);
        offset * 1_000 / i64::from(self.counts_per_g.max(1))
    }
}

/// Converts raw three-axis readings into a vector magnitude in g.
#[must_use]
pub fn magnitude_from_counts(counts: [u16; 3], calibration: AxisCalibration) -> f32 {
    let squared: u64 = counts
        .iter()
        .map(|&axis| calibration.milli_g(axis).unsigned_abs().pow(2))
        .sum();
    let milli_g = u16::try_from(squared.isqrt()).unwrap_or(u16::MAX);
    f32::from(milli_g) / 1_000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_queue_drops_newest_sample() {
        let queue = SampleQueue::new();
        let mut sender = SampleSender::new(queue.sender());
        for millis in 0..4 {
            assert!(sender.offer(1.0, Instant::from_millis(millis)));
        }
        assert!(!sender.offer(1.0, Instant::from_millis(4)));
        assert_eq!(sender.dropped(), 1);

        let receiver = queue.receiver();
        let first = receiver.try_receive().expect("queued");
        assert_eq!(first.timestamp, Instant::from_millis(0));
    }

    #[test]
    fn monotonic_clock_wraps_onto_core_clock() {
        assert_eq!(wrap_millis(42), Instant::from_millis(42));
        let wrapped = u64::from(u32::MAX) + 11;
        assert_eq!(wrap_millis(wrapped), Instant::from_millis(10));
    }

    #[test]
    fn resting_device_reads_one_g() {
        let calibration = AxisCalibration::DEFAULT;
        let one_g = calibration.zero_counts + calibration.counts_per_g;
        let magnitude = magnitude_from_counts(
            [calibration.zero_counts, calibration.zero_counts, one_g],
            calibration,
        );
        assert!((magnitude - 1.0).abs() < 1e-3);
    }

    #[test]
    fn magnitude_combines_axes() {
        let calibration = AxisCalibration {
            zero_counts: 1_000,
            counts_per_g: 100,
        };
        // 0.3 g, 0.4 g and 0 g.
        let magnitude = magnitude_from_counts([1_030, 960, 1_000], calibration);
        assert!((magnitude - 0.5).abs() < 1e-3);
    }
}
