//! One step of the control loop.
//!
//! The Embassy task only waits; everything it does when woken lives here so host
//! tests can drive it with a fake clock.

use safety_core::alert::{AlertOrchestrator, AlertOutput};
use safety_core::controller::SafetyController;
use safety_core::fall::{AccelerationSample, FallDetector, FallDetectorConfig, SelfTestReport};
use safety_core::time::Instant;

use crate::status::StatusCache;
use crate::telemetry::{self, LoggingSink};

/// Sole owner of the controller once the firmware is running.
pub struct ControlLoop<'a, O: AlertOutput> {
    controller: SafetyController<O, LoggingSink>,
    status: &'a StatusCache,
}

impl<'a, O: AlertOutput> ControlLoop<'a, O> {
    #[must_use]
    pub fn new(config: FallDetectorConfig, output: O, status: &'a StatusCache) -> Self {
        let controller = SafetyController::from_parts(
            FallDetector::with_sink(config, LoggingSink::new()),
            AlertOrchestrator::with_output(output),
        );
        status.publish(&controller);
        Self { controller, status }
    }

    #[must_use]
    pub fn controller(&self) -> &SafetyController<O, LoggingSink> {
        &self.controller
    }

    /// Exercises the detector on synthetic data and logs the verdict.
    pub fn self_test(&self) -> SelfTestReport {
        let report = self.controller.detector().run_self_test();
        telemetry::log_self_test(report);
        report
    }

    /// Advances alert playback.
    pub fn on_tick(&mut self, now: Instant) {
        for event in &self.controller.tick(now) {
            telemetry::log_tick_event(*event, now);
        }
        self.status.publish(&self.controller);
    }

    /// Feeds one sensor sample; rejected samples are logged and counted.
    pub fn on_sample(&mut self, sample: AccelerationSample) {
        match self.controller.on_sample(sample) {
            Ok(outcome) => {
                if let Some(Err(error)) = outcome.alert {
                    telemetry::log_alert_rejected(error, sample.timestamp);
                }
            }
            Err(error) => {
                self.status.record_rejected_sample();
                telemetry::log_sample_rejected(error, sample.timestamp);
            }
        }
        self.status.publish(&self.controller);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use safety_core::alert::BuzzerState;
    use safety_core::fall::FallDetectionState;

    #[derive(Default)]
    struct Pin {
        high: bool,
    }

    impl AlertOutput for Pin {
        fn set_active(&mut self, active: bool) {
            self.high = active;
        }
    }

    fn sample(magnitude: f32, millis: u32) -> AccelerationSample {
        AccelerationSample::new(magnitude, Instant::from_millis(millis))
    }

    #[test]
    fn boot_self_test_passes_with_defaults() {
        let status = StatusCache::new();
        let control = ControlLoop::new(FallDetectorConfig::DEFAULT, Pin::default(), &status);
        assert!(control.self_test().passed());
    }

    #[test]
    fn fall_drives_pin_and_status() {
        let status = StatusCache::new();
        let mut control = ControlLoop::new(FallDetectorConfig::DEFAULT, Pin::default(), &status);

        control.on_sample(sample(1.0, 0));
        control.on_sample(sample(0.2, 20));
        control.on_sample(sample(3.1, 120));

        let snapshot = status.load();
        assert_eq!(snapshot.detector, FallDetectionState::Cooldown);
        assert_eq!(snapshot.alert, BuzzerState::Playing);
        assert_eq!(snapshot.fall_count, 1);
        assert!(control.controller().alerts().output().is_some_and(|pin| pin.high));
        assert_eq!(control.controller().detector().sink().falls(), 1);

        let mut now = 120;
        while now < 3_000 {
            now += 10;
            control.on_tick(Instant::from_millis(now));
        }
        assert_eq!(status.load().alert, BuzzerState::Idle);
        assert!(control.controller().alerts().output().is_some_and(|pin| !pin.high));
    }

    #[test]
    fn rejected_samples_are_counted() {
        let status = StatusCache::new();
        let mut control = ControlLoop::new(FallDetectorConfig::DEFAULT, Pin::default(), &status);
        control.on_sample(sample(1.0, 100));
        control.on_sample(sample(1.0, 50));
        control.on_sample(sample(f32::NAN, 150));
        assert_eq!(status.load().rejected_samples, 2);
    }
}
