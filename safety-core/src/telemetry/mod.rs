//! Telemetry event catalog and in-memory ring shared by firmware and host targets.
//!
//! Event kinds serialize to compact `u16` codes so they can be mirrored over
//! diagnostics channels or the defmt log without carrying strings. Payloads are
//! integer-only (magnitudes in milli-g) which keeps records `Eq` and cheap to
//! copy. Nothing is persisted: the ring keeps the most recent
//! [`TELEMETRY_RING_CAPACITY`] records and overwrites the oldest.

use core::{fmt, time::Duration};

use heapless::{HistoryBuf, OldestOrdered};

use crate::alert::AlertPattern;
use crate::fall::{FallDetectionState, FallEvent, SampleError};
use crate::time::Instant;

/// Identifier assigned to each recorded event.
pub type EventId = u32;

/// Total number of telemetry entries retained in memory.
pub const TELEMETRY_RING_CAPACITY: usize = 64;

/// Discriminated telemetry events.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TelemetryEventKind {
    FallStateEntered(FallDetectionState),
    FallDetected,
    EmergencyRaised,
    SampleRejected,
    CalibrationCommitted,
    AlertQueued(AlertPattern),
    AlertStarted(AlertPattern),
    AlertCompleted(AlertPattern),
    AlertDropped(AlertPattern),
    Custom(u16),
}

impl fmt::Display for TelemetryEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TelemetryEventKind::FallStateEntered(state) => write!(f, "fall-state {state}"),
            TelemetryEventKind::FallDetected => f.write_str("fall-detected"),
            TelemetryEventKind::EmergencyRaised => f.write_str("emergency-raised"),
            TelemetryEventKind::SampleRejected => f.write_str("sample-rejected"),
            TelemetryEventKind::CalibrationCommitted => f.write_str("calibration-committed"),
            TelemetryEventKind::AlertQueued(pattern) => write!(f, "alert-queued {pattern}"),
            TelemetryEventKind::AlertStarted(pattern) => write!(f, "alert-started {pattern}"),
            TelemetryEventKind::AlertCompleted(pattern) => write!(f, "alert-completed {pattern}"),
            TelemetryEventKind::AlertDropped(pattern) => write!(f, "alert-dropped {pattern}"),
            TelemetryEventKind::Custom(code) => write!(f, "custom({code})"),
        }
    }
}

impl TelemetryEventKind {
    const FALL_STATE_BASE: u16 = 0x0000;
    const FALL_DETECTED_CODE: u16 = 0x0008;
    const EMERGENCY_CODE: u16 = 0x0009;
    const SAMPLE_REJECTED_CODE: u16 = 0x000A;
    const CALIBRATION_CODE: u16 = 0x000B;
    const ALERT_QUEUED_BASE: u16 = 0x0010;
    const ALERT_STARTED_BASE: u16 = 0x0020;
    const ALERT_COMPLETED_BASE: u16 = 0x0030;
    const ALERT_DROPPED_BASE: u16 = 0x0040;
    const ALERT_BLOCK_END: u16 = 0x0050;
    const ALERT_BLOCK_WIDTH: u16 = 0x0010;

    /// Encodes the event into a compact transport-friendly discriminant.
    #[must_use]
    pub const fn to_raw(self) -> u16 {
        match self {
            TelemetryEventKind::FallStateEntered(state) => {
                Self::FALL_STATE_BASE + state_index(state)
            }
            TelemetryEventKind::FallDetected => Self::FALL_DETECTED_CODE,
            TelemetryEventKind::EmergencyRaised => Self::EMERGENCY_CODE,
            TelemetryEventKind::SampleRejected => Self::SAMPLE_REJECTED_CODE,
            TelemetryEventKind::CalibrationCommitted => Self::CALIBRATION_CODE,
            TelemetryEventKind::AlertQueued(pattern) => {
                Self::ALERT_QUEUED_BASE + pattern_code(pattern)
            }
            TelemetryEventKind::AlertStarted(pattern) => {
                Self::ALERT_STARTED_BASE + pattern_code(pattern)
            }
            TelemetryEventKind::AlertCompleted(pattern) => {
                Self::ALERT_COMPLETED_BASE + pattern_code(pattern)
            }
            TelemetryEventKind::AlertDropped(pattern) => {
                Self::ALERT_DROPPED_BASE + pattern_code(pattern)
            }
            TelemetryEventKind::Custom(code) => code,
        }
    }

    /// Decodes a raw discriminant, falling back to [`TelemetryEventKind::Custom`].
    #[must_use]
    pub fn from_raw(code: u16) -> Self {
        match code {
            Self::FALL_DETECTED_CODE => TelemetryEventKind::FallDetected,
            Self::EMERGENCY_CODE => TelemetryEventKind::EmergencyRaised,
            Self::SAMPLE_REJECTED_CODE => TelemetryEventKind::SampleRejected,
            Self::CALIBRATION_CODE => TelemetryEventKind::CalibrationCommitted,
            value if value < Self::FALL_DETECTED_CODE => state_from_index(value)
                .map_or(TelemetryEventKind::Custom(value), |state| {
                    TelemetryEventKind::FallStateEntered(state)
                }),
            value if (Self::ALERT_QUEUED_BASE..Self::ALERT_BLOCK_END).contains(&value) => {
                let block = (value - Self::ALERT_QUEUED_BASE) / Self::ALERT_BLOCK_WIDTH;
                let offset = (value - Self::ALERT_QUEUED_BASE) % Self::ALERT_BLOCK_WIDTH;
                let Some(pattern) = pattern_from_code(offset) else {
                    return TelemetryEventKind::Custom(value);
                };
                match block {
                    0 => TelemetryEventKind::AlertQueued(pattern),
                    1 => TelemetryEventKind::AlertStarted(pattern),
                    2 => TelemetryEventKind::AlertCompleted(pattern),
                    _ => TelemetryEventKind::AlertDropped(pattern),
                }
            }
            other => TelemetryEventKind::Custom(other),
        }
    }
}

/// Payloads carried alongside telemetry events.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TelemetryPayload {
    None,
    State(StateTelemetry),
    Fall(FallTelemetry),
    Rejection(SampleError),
    Alert(AlertTelemetry),
}

/// Detector state transition payload.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct StateTelemetry {
    pub from: FallDetectionState,
    /// Time spent in `from`, when its entry was recorded.
    pub elapsed_in_previous: Option<Duration>,
}

/// Confirmed fall payload with magnitudes in milli-g.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct FallTelemetry {
    pub peak_mg: u16,
    pub trough_mg: u16,
    pub duration: Duration,
    pub is_emergency: bool,
    pub simulated: bool,
}

impl FallTelemetry {
    #[must_use]
    pub fn from_event(event: &FallEvent) -> Self {
        Self {
            peak_mg: to_milli_g(event.max_acceleration),
            trough_mg: to_milli_g(event.min_acceleration),
            duration: event.duration,
            is_emergency: event.is_emergency,
            simulated: event.simulated,
        }
    }
}

/// Alert queue payload.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct AlertTelemetry {
    pub queue_depth: u8,
}

/// Telemetry record stored in the ring buffer.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TelemetryRecord {
    pub id: EventId,
    pub timestamp: Instant,
    pub event: TelemetryEventKind,
    pub details: TelemetryPayload,
}

/// Records telemetry events into a fixed-size ring buffer.
pub struct TelemetryRecorder<const CAPACITY: usize = TELEMETRY_RING_CAPACITY> {
    ring: HistoryBuf<TelemetryRecord, CAPACITY>,
    state_entered_at: Option<Instant>,
    next_event_id: EventId,
}

impl<const CAPACITY: usize> TelemetryRecorder<CAPACITY> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ring: HistoryBuf::new(),
            state_entered_at: None,
            next_event_id: 0,
        }
    }

    /// Returns an iterator over the recorded telemetry in chronological order.
    pub fn oldest_first(&self) -> OldestOrdered<'_, TelemetryRecord> {
        self.ring.oldest_ordered()
    }

    #[must_use]
    pub fn latest(&self) -> Option<&TelemetryRecord> {
        self.ring.recent()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// Records entry into `to` along with how long the detector stayed in `from`.
    pub fn record_state_change(
        &mut self,
        from: FallDetectionState,
        to: FallDetectionState,
        timestamp: Instant,
    ) -> EventId {
        let elapsed = self
            .state_entered_at
            .map(|entered| timestamp.duration_since(entered));
        self.state_entered_at = Some(timestamp);

        let payload = TelemetryPayload::State(StateTelemetry {
            from,
            elapsed_in_previous: elapsed,
        });
        self.record(TelemetryEventKind::FallStateEntered(to), payload, timestamp)
    }

    /// Records a confirmed fall and, for emergencies, a second escalation record.
    pub fn record_fall(&mut self, event: &FallEvent) -> EventId {
        let payload = TelemetryPayload::Fall(FallTelemetry::from_event(event));
        let id = self.record(TelemetryEventKind::FallDetected, payload, event.timestamp);
        if event.is_emergency {
            self.record(TelemetryEventKind::EmergencyRaised, payload, event.timestamp);
        }
        id
    }

    pub fn record_sample_rejected(&mut self, error: SampleError, timestamp: Instant) -> EventId {
        self.record(
            TelemetryEventKind::SampleRejected,
            TelemetryPayload::Rejection(error),
            timestamp,
        )
    }

    /// Records an alert lifecycle event with the queue depth at that moment.
    pub fn record_alert(
        &mut self,
        event: TelemetryEventKind,
        queue_depth: usize,
        timestamp: Instant,
    ) -> EventId {
        let payload = TelemetryPayload::Alert(AlertTelemetry {
            queue_depth: truncate_depth(queue_depth),
        });
        self.record(event, payload, timestamp)
    }

    /// Records an arbitrary telemetry event with the supplied payload.
    pub fn record(
        &mut self,
        event: TelemetryEventKind,
        payload: TelemetryPayload,
        timestamp: Instant,
    ) -> EventId {
        let id = self.next_event_id;
        self.next_event_id = self.next_event_id.wrapping_add(1);

        self.ring.write(TelemetryRecord {
            id,
            timestamp,
            event,
            details: payload,
        });

        id
    }

    pub fn clear(&mut self) {
        self.ring.clear();
        self.state_entered_at = None;
    }
}

impl<const CAPACITY: usize> Default for TelemetryRecorder<CAPACITY> {
    fn default() -> Self {
        Self::new()
    }
}

fn truncate_depth(depth: usize) -> u8 {
    u8::try_from(depth).unwrap_or(u8::MAX)
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn to_milli_g(magnitude: f32) -> u16 {
    // Float-to-int `as` saturates; NaN maps to zero.
    (magnitude * 1_000.0) as u16
}

const fn state_index(state: FallDetectionState) -> u16 {
    match state {
        FallDetectionState::Normal => 0,
        FallDetectionState::LowG => 1,
        FallDetectionState::HighG => 2,
        FallDetectionState::Detected => 3,
        FallDetectionState::Cooldown => 4,
    }
}

fn state_from_index(index: u16) -> Option<FallDetectionState> {
    match index {
        0 => Some(FallDetectionState::Normal),
        1 => Some(FallDetectionState::LowG),
        2 => Some(FallDetectionState::HighG),
        3 => Some(FallDetectionState::Detected),
        4 => Some(FallDetectionState::Cooldown),
        _ => None,
    }
}

#[allow(clippy::cast_lossless)]
const fn pattern_code(pattern: AlertPattern) -> u16 {
    pattern.to_raw() as u16
}

fn pattern_from_code(code: u16) -> Option<AlertPattern> {
    u8::try_from(code).ok().and_then(AlertPattern::from_raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(millis: u32) -> Instant {
        Instant::from_millis(millis)
    }

    fn fall(max: f32, is_emergency: bool) -> FallEvent {
        FallEvent {
            timestamp: at(150),
            max_acceleration: max,
            min_acceleration: 0.2,
            duration: Duration::from_millis(100),
            is_emergency,
            simulated: false,
        }
    }

    #[test]
    fn raw_codes_round_trip_and_unknowns_fall_back() {
        let fixtures = [
            (TelemetryEventKind::FallStateEntered(FallDetectionState::Cooldown), 0x0004),
            (TelemetryEventKind::FallDetected, 0x0008),
            (TelemetryEventKind::AlertQueued(AlertPattern::Single), 0x0010),
            (TelemetryEventKind::AlertStarted(AlertPattern::Emergency), 0x0025),
            (TelemetryEventKind::AlertCompleted(AlertPattern::Custom), 0x0039),
            (TelemetryEventKind::AlertDropped(AlertPattern::Sos), 0x0044),
        ];

        for (event, code) in fixtures {
            assert_eq!(event.to_raw(), code);
            assert_eq!(TelemetryEventKind::from_raw(code), event);
        }

        assert_eq!(
            TelemetryEventKind::from_raw(0x0006),
            TelemetryEventKind::Custom(0x0006)
        );
        assert_eq!(
            TelemetryEventKind::from_raw(0x001F),
            TelemetryEventKind::Custom(0x001F)
        );
        assert_eq!(
            TelemetryEventKind::from_raw(0xBEEF),
            TelemetryEventKind::Custom(0xBEEF)
        );
    }

    #[test]
    fn records_elapsed_between_state_changes() {
        let mut recorder = TelemetryRecorder::<8>::new();

        let first = recorder.record_state_change(
            FallDetectionState::Normal,
            FallDetectionState::LowG,
            at(50),
        );
        let second = recorder.record_state_change(
            FallDetectionState::LowG,
            FallDetectionState::Cooldown,
            at(150),
        );
        assert_eq!((first, second), (0, 1));

        let record = recorder.latest().copied().expect("record");
        assert_eq!(
            record.event,
            TelemetryEventKind::FallStateEntered(FallDetectionState::Cooldown)
        );
        match record.details {
            TelemetryPayload::State(details) => {
                assert_eq!(details.from, FallDetectionState::LowG);
                assert_eq!(details.elapsed_in_previous, Some(Duration::from_millis(100)));
            }
            other => panic!("expected state payload, got {other:?}"),
        }
    }

    #[test]
    fn emergency_fall_adds_escalation_record() {
        let mut recorder = TelemetryRecorder::<8>::new();
        recorder.record_fall(&fall(3.0, false));
        recorder.record_fall(&fall(4.25, true));

        let kinds: heapless::Vec<TelemetryEventKind, 8> =
            recorder.oldest_first().map(|record| record.event).collect();
        assert_eq!(
            kinds.as_slice(),
            &[
                TelemetryEventKind::FallDetected,
                TelemetryEventKind::FallDetected,
                TelemetryEventKind::EmergencyRaised,
            ]
        );

        match recorder.latest().map(|record| record.details) {
            Some(TelemetryPayload::Fall(details)) => {
                assert_eq!(details.peak_mg, 4_250);
                assert_eq!(details.trough_mg, 200);
            }
            other => panic!("expected fall payload, got {other:?}"),
        }
    }

    #[test]
    fn ring_overwrites_oldest_and_keeps_ids_monotonic() {
        let mut recorder = TelemetryRecorder::<4>::new();
        for millis in 0..10 {
            recorder.record_alert(
                TelemetryEventKind::AlertQueued(AlertPattern::Double),
                300,
                at(millis),
            );
        }

        assert_eq!(recorder.len(), 4);
        let ids: heapless::Vec<EventId, 4> =
            recorder.oldest_first().map(|record| record.id).collect();
        assert_eq!(ids.as_slice(), &[6, 7, 8, 9]);
        match recorder.latest().map(|record| record.details) {
            Some(TelemetryPayload::Alert(details)) => assert_eq!(details.queue_depth, u8::MAX),
            other => panic!("expected alert payload, got {other:?}"),
        }
    }
}
