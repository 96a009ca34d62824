//! Integrator that couples the fall detector to the alert orchestrator.
//!
//! [`SafetyController`] owns both components plus the telemetry ring and is
//! the single object a control loop drives: [`SafetyController::on_sample`]
//! for every accelerometer reading and [`SafetyController::tick`] at the
//! polling cadence. Emergency falls raise the emergency pattern; every other
//! fall raises the warning pattern.

use crate::alert::{
    AlertError, AlertOrchestrator, AlertOutput, AlertPattern, AlertRequest, CustomPattern,
    NoopAlertOutput, TickEvent, TickEvents,
};
use crate::fall::{
    AccelerationSample, CalibrationError, CalibrationProposal, FallDetector, FallDetectorConfig,
    FallEvent, FallEventSink, FallUpdate, NoopFallSink, SampleError,
};
use crate::telemetry::{TelemetryEventKind, TelemetryPayload, TelemetryRecorder};
use crate::time::Instant;

/// Result of handing one sample to the controller.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SampleOutcome {
    pub update: FallUpdate,
    /// Alert raised for a confirmed fall, if any.
    pub alert: Option<Result<AlertRequest, AlertError>>,
}

/// Owns the detector, orchestrator and telemetry for one device.
pub struct SafetyController<O = NoopAlertOutput, S = NoopFallSink> {
    detector: FallDetector<S>,
    alerts: AlertOrchestrator<O>,
    telemetry: TelemetryRecorder,
}

impl SafetyController<NoopAlertOutput, NoopFallSink> {
    #[must_use]
    pub fn new(config: FallDetectorConfig) -> Self {
        Self::from_parts(FallDetector::new(config), AlertOrchestrator::new())
    }
}

impl Default for SafetyController<NoopAlertOutput, NoopFallSink> {
    fn default() -> Self {
        Self::new(FallDetectorConfig::DEFAULT)
    }
}

impl<O: AlertOutput, S: FallEventSink> SafetyController<O, S> {
    #[must_use]
    pub fn from_parts(detector: FallDetector<S>, alerts: AlertOrchestrator<O>) -> Self {
        Self {
            detector,
            alerts,
            telemetry: TelemetryRecorder::new(),
        }
    }

    pub fn detector(&self) -> &FallDetector<S> {
        &self.detector
    }

    pub fn detector_mut(&mut self) -> &mut FallDetector<S> {
        &mut self.detector
    }

    pub fn alerts(&self) -> &AlertOrchestrator<O> {
        &self.alerts
    }

    pub fn alerts_mut(&mut self) -> &mut AlertOrchestrator<O> {
        &mut self.alerts
    }

    pub fn telemetry(&self) -> &TelemetryRecorder {
        &self.telemetry
    }

    /// Feeds one sample and raises an alert for a confirmed fall.
    ///
    /// # Errors
    ///
    /// Propagates the [`SampleError`] for rejected samples after recording it.
    pub fn on_sample(&mut self, sample: AccelerationSample) -> Result<SampleOutcome, SampleError> {
        let update = match self.detector.update(sample) {
            Ok(update) => update,
            Err(error) => {
                self.telemetry.record_sample_rejected(error, sample.timestamp);
                return Err(error);
            }
        };

        if update.state_changed() {
            self.telemetry
                .record_state_change(update.from, update.to, sample.timestamp);
        }

        let alert = update
            .event
            .map(|event| self.raise_alert(&event, sample.timestamp));
        Ok(SampleOutcome { update, alert })
    }

    fn raise_alert(
        &mut self,
        event: &FallEvent,
        now: Instant,
    ) -> Result<AlertRequest, AlertError> {
        self.telemetry.record_fall(event);

        let pattern = if event.is_emergency {
            AlertPattern::Emergency
        } else {
            AlertPattern::Warning
        };
        let request = self.alerts.beep_pattern(pattern, now);
        self.record_request(pattern, request, now);
        request
    }

    /// Requests a pattern on behalf of an operator and records the outcome.
    ///
    /// # Errors
    ///
    /// See [`AlertOrchestrator::beep_pattern`].
    pub fn request_alert(
        &mut self,
        pattern: AlertPattern,
        now: Instant,
    ) -> Result<AlertRequest, AlertError> {
        let request = self.alerts.beep_pattern(pattern, now);
        self.record_request(pattern, request, now);
        request
    }

    /// Requests the sound check pair, `Single` then `Success`, or neither.
    ///
    /// # Errors
    ///
    /// Returns [`AlertError::QueueFull`] unless both requests fit.
    pub fn request_sound_check(&mut self, now: Instant) -> Result<(), AlertError> {
        if !self.alerts.has_room_for(2) {
            self.record_request(AlertPattern::Single, Err(AlertError::QueueFull), now);
            return Err(AlertError::QueueFull);
        }
        self.request_alert(AlertPattern::Single, now)?;
        self.request_alert(AlertPattern::Success, now)?;
        Ok(())
    }

    /// Installs and requests a custom pattern, recording the outcome.
    ///
    /// # Errors
    ///
    /// See [`AlertOrchestrator::play_custom`].
    pub fn request_custom(
        &mut self,
        custom: CustomPattern,
        now: Instant,
    ) -> Result<AlertRequest, AlertError> {
        let request = self.alerts.play_custom(custom, now);
        self.record_request(AlertPattern::Custom, request, now);
        request
    }

    fn record_request(
        &mut self,
        pattern: AlertPattern,
        request: Result<AlertRequest, AlertError>,
        now: Instant,
    ) {
        let kind = match request {
            Ok(AlertRequest::Started | AlertRequest::PreEmpted { .. }) => {
                TelemetryEventKind::AlertStarted(pattern)
            }
            Ok(AlertRequest::Queued { .. }) => TelemetryEventKind::AlertQueued(pattern),
            Err(_) => TelemetryEventKind::AlertDropped(pattern),
        };
        self.telemetry.record_alert(kind, self.alerts.queue_len(), now);
    }

    /// Drives alert playback to `now`.
    pub fn tick(&mut self, now: Instant) -> TickEvents {
        let events = self.alerts.update(now);
        let depth = self.alerts.queue_len();
        for event in &events {
            let kind = match *event {
                TickEvent::Started(pattern) => TelemetryEventKind::AlertStarted(pattern),
                TickEvent::Completed(pattern) => TelemetryEventKind::AlertCompleted(pattern),
                TickEvent::ScheduledFired(pattern) => {
                    if self.alerts.current_pattern() == Some(pattern) {
                        TelemetryEventKind::AlertStarted(pattern)
                    } else {
                        TelemetryEventKind::AlertQueued(pattern)
                    }
                }
                TickEvent::ScheduledDropped(pattern) => TelemetryEventKind::AlertDropped(pattern),
            };
            self.telemetry.record_alert(kind, depth, now);
        }
        events
    }

    /// Plays a synthetic fall through the live detector and alerts on it.
    pub fn simulate_fall(&mut self, now: Instant) -> Option<SampleOutcome> {
        let from = self.detector.state();
        let event = self.detector.simulate_fall(now)?;
        let to = self.detector.state();
        if from != to {
            self.telemetry.record_state_change(from, to, now);
        }

        let alert = Some(self.raise_alert(&event, now));
        Some(SampleOutcome {
            update: FallUpdate {
                from,
                to,
                filtered: event.max_acceleration,
                event: Some(event),
            },
            alert,
        })
    }

    /// Applies the pending calibration proposal.
    ///
    /// # Errors
    ///
    /// See [`FallDetector::commit_calibration`].
    pub fn commit_calibration(
        &mut self,
        now: Instant,
    ) -> Result<CalibrationProposal, CalibrationError> {
        let proposal = self.detector.commit_calibration()?;
        self.telemetry.record(
            TelemetryEventKind::CalibrationCommitted,
            TelemetryPayload::None,
            now,
        );
        Ok(proposal)
    }

    /// Resets the detector and silences all alerts; counters and telemetry survive.
    pub fn reset(&mut self) {
        self.detector.reset();
        self.alerts.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::BuzzerState;
    use crate::fall::FallDetectionState;

    fn sample(magnitude: f32, millis: u32) -> AccelerationSample {
        AccelerationSample::new(magnitude, Instant::from_millis(millis))
    }

    #[test]
    fn gentle_fall_raises_warning() {
        let mut controller = SafetyController::default();
        controller.on_sample(sample(1.0, 0)).expect("accepted");
        controller.on_sample(sample(0.2, 50)).expect("accepted");
        let outcome = controller.on_sample(sample(3.0, 150)).expect("accepted");

        assert!(outcome.update.fall_detected());
        assert_eq!(outcome.alert, Some(Ok(AlertRequest::Started)));
        assert_eq!(
            controller.alerts().current_pattern(),
            Some(AlertPattern::Warning)
        );
        assert_eq!(controller.alerts().state(), BuzzerState::Playing);
    }

    #[test]
    fn hard_fall_raises_emergency() {
        let mut controller = SafetyController::default();
        controller.on_sample(sample(0.1, 0)).expect("accepted");
        let outcome = controller.on_sample(sample(5.0, 80)).expect("accepted");

        assert!(matches!(
            outcome.alert,
            Some(Ok(AlertRequest::PreEmpted { interrupted: None }))
        ));
        assert_eq!(controller.alerts().state(), BuzzerState::Emergency);
        assert!(
            controller
                .telemetry()
                .oldest_first()
                .any(|record| record.event == TelemetryEventKind::EmergencyRaised)
        );
    }

    #[test]
    fn rejected_sample_is_recorded() {
        let mut controller = SafetyController::default();
        assert_eq!(
            controller.on_sample(sample(f32::NAN, 0)),
            Err(SampleError::NotFinite)
        );
        let record = controller.telemetry().latest().copied().expect("record");
        assert_eq!(record.event, TelemetryEventKind::SampleRejected);
        assert_eq!(
            record.details,
            TelemetryPayload::Rejection(SampleError::NotFinite)
        );
    }

    #[test]
    fn state_changes_are_recorded_in_order() {
        let mut controller = SafetyController::default();
        controller.on_sample(sample(0.1, 0)).expect("accepted");
        controller.on_sample(sample(3.0, 100)).expect("accepted");

        let entered: heapless::Vec<TelemetryEventKind, 8> = controller
            .telemetry()
            .oldest_first()
            .map(|record| record.event)
            .filter(|event| matches!(event, TelemetryEventKind::FallStateEntered(_)))
            .collect();
        assert_eq!(
            entered.as_slice(),
            &[
                TelemetryEventKind::FallStateEntered(FallDetectionState::LowG),
                TelemetryEventKind::FallStateEntered(FallDetectionState::Cooldown),
            ]
        );
    }

    #[test]
    fn tick_completes_warning_pattern() {
        let mut controller = SafetyController::default();
        controller
            .request_alert(AlertPattern::Warning, Instant::ZERO)
            .expect("started");

        let mut completed = false;
        for millis in (10..=1_300).step_by(10) {
            let events = controller.tick(Instant::from_millis(millis));
            completed |= events.contains(&TickEvent::Completed(AlertPattern::Warning));
        }
        assert!(completed);
        assert!(controller.alerts().is_idle());
    }

    #[test]
    fn simulated_fall_alerts_like_a_real_one() {
        let mut controller = SafetyController::default();
        let outcome = controller
            .simulate_fall(Instant::from_millis(2_000))
            .expect("simulated fall");

        let event = outcome.update.event.expect("event");
        assert!(event.simulated);
        assert!(outcome.alert.is_some());
        assert_eq!(controller.detector().fall_count(), 1);
    }
}
