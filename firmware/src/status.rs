//! Shared status storage for the firmware target.
//!
//! The control task publishes into a [`StatusCache`] after every step so other
//! tasks can report detector and alert state without borrowing the controller.

use portable_atomic::{AtomicBool, AtomicU8, AtomicU32, AtomicU64, Ordering};
use safety_core::alert::{AlertOutput, BuzzerState};
use safety_core::controller::SafetyController;
use safety_core::fall::{FallDetectionState, FallEventSink};
use safety_core::time::Instant;

/// Marks "no fall yet" in the timestamp slot.
const NO_FALL: u64 = 0;

/// Copy of the controller state as last published.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct CachedStatus {
    pub detector: FallDetectionState,
    pub alert: BuzzerState,
    pub output_on: bool,
    pub queue_len: u8,
    pub fall_count: u32,
    pub last_fall: Option<Instant>,
    pub rejected_samples: u32,
    pub dropped_samples: u32,
}

/// Lock-free status slots shared between tasks.
pub struct StatusCache {
    detector: AtomicU8,
    alert: AtomicU8,
    output_on: AtomicBool,
    queue_len: AtomicU8,
    fall_count: AtomicU32,
    /// Impact timestamp in ms, plus one, widened so every `u32` tick encodes.
    last_fall: AtomicU64,
    rejected_samples: AtomicU32,
    dropped_samples: AtomicU32,
}

impl StatusCache {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            detector: AtomicU8::new(0),
            alert: AtomicU8::new(0),
            output_on: AtomicBool::new(false),
            queue_len: AtomicU8::new(0),
            fall_count: AtomicU32::new(0),
            last_fall: AtomicU64::new(NO_FALL),
            rejected_samples: AtomicU32::new(0),
            dropped_samples: AtomicU32::new(0),
        }
    }

    /// Stores the controller's current state.
    pub fn publish<O: AlertOutput, S: FallEventSink>(&self, controller: &SafetyController<O, S>) {
        let detector = controller.detector();
        let alerts = controller.alerts();
        self.detector
            .store(detector_code(detector.state()), Ordering::Relaxed);
        self.alert.store(alert_code(alerts.state()), Ordering::Relaxed);
        self.output_on
            .store(alerts.is_output_on(), Ordering::Relaxed);
        self.queue_len.store(
            u8::try_from(alerts.queue_len()).unwrap_or(u8::MAX),
            Ordering::Relaxed,
        );
        self.fall_count
            .store(detector.fall_count(), Ordering::Relaxed);
        let last_fall = detector
            .last_fall()
            .map_or(NO_FALL, |event| encode_instant(event.timestamp));
        self.last_fall.store(last_fall, Ordering::Relaxed);
    }

    /// Counts a sample the detector refused.
    pub fn record_rejected_sample(&self) {
        self.rejected_samples.fetch_add(1, Ordering::Relaxed);
    }

    /// Mirrors the sensor side's dropped-sample counter.
    pub fn record_dropped_samples(&self, dropped: u32) {
        self.dropped_samples.store(dropped, Ordering::Relaxed);
    }

    #[must_use]
    pub fn load(&self) -> CachedStatus {
        CachedStatus {
            detector: detector_from_code(self.detector.load(Ordering::Relaxed)),
            alert: alert_from_code(self.alert.load(Ordering::Relaxed)),
            output_on: self.output_on.load(Ordering::Relaxed),
            queue_len: self.queue_len.load(Ordering::Relaxed),
            fall_count: self.fall_count.load(Ordering::Relaxed),
            last_fall: decode_instant(self.last_fall.load(Ordering::Relaxed)),
            rejected_samples: self.rejected_samples.load(Ordering::Relaxed),
            dropped_samples: self.dropped_samples.load(Ordering::Relaxed),
        }
    }
}

impl Default for StatusCache {
    fn default() -> Self {
        Self::new()
    }
}

fn encode_instant(instant: Instant) -> u64 {
    u64::from(instant.as_millis()) + 1
}

fn decode_instant(raw: u64) -> Option<Instant> {
    raw.checked_sub(1)
        .and_then(|millis| u32::try_from(millis).ok())
        .map(Instant::from_millis)
}

const fn detector_code(state: FallDetectionState) -> u8 {
    match state {
        FallDetectionState::Normal => 0,
        FallDetectionState::LowG => 1,
        FallDetectionState::HighG => 2,
        FallDetectionState::Detected => 3,
        FallDetectionState::Cooldown => 4,
    }
}

const fn detector_from_code(code: u8) -> FallDetectionState {
    match code {
        1 => FallDetectionState::LowG,
        2 => FallDetectionState::HighG,
        3 => FallDetectionState::Detected,
        4 => FallDetectionState::Cooldown,
        _ => FallDetectionState::Normal,
    }
}

const fn alert_code(state: BuzzerState) -> u8 {
    match state {
        BuzzerState::Idle => 0,
        BuzzerState::Playing => 1,
        BuzzerState::Paused => 2,
        BuzzerState::Emergency => 3,
    }
}

const fn alert_from_code(code: u8) -> BuzzerState {
    match code {
        1 => BuzzerState::Playing,
        2 => BuzzerState::Paused,
        3 => BuzzerState::Emergency,
        _ => BuzzerState::Idle,
    }
}
