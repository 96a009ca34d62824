//! Self-test, simulated falls, and threshold calibration.

use core::fmt;
use core::time::Duration;

use crate::time::Instant;

use super::{
    AccelerationSample, DEFAULT_HIGH_G, DEFAULT_LOW_G, FallDetectionState, FallDetector,
    FallDetectorConfig, FallEvent, FallEventSink, MAX_PLAUSIBLE_G, Thresholds,
};

/// Samples a calibration run must collect before proposing thresholds.
pub const MIN_CALIBRATION_SAMPLES: u32 = 20;
/// Largest peak-to-peak variation accepted as "stationary".
const MAX_CALIBRATION_SPREAD_G: f32 = 0.5;
const MIN_BASELINE_G: f32 = 0.5;
const MAX_BASELINE_G: f32 = 1.5;

/// Spacing between synthetic samples.
const SCRIPT_STEP: Duration = Duration::from_millis(1);

/// Outcome of [`FallDetector::run_self_test`].
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct SelfTestReport {
    /// A free fall followed by an impact produced exactly one event.
    pub detection: bool,
    /// A free fall without an impact produced no event.
    pub false_alarm_rejected: bool,
    /// A second fall inside the cooldown was ignored.
    pub cooldown_enforced: bool,
}

impl SelfTestReport {
    #[must_use]
    pub const fn passed(&self) -> bool {
        self.detection && self.false_alarm_rejected && self.cooldown_enforced
    }
}

/// Synthetic free-fall / impact script scaled to a configuration.
struct SyntheticFall {
    baseline: f32,
    free_fall: f32,
    impact: f32,
    /// Samples per level; long enough to saturate the smoothing filter.
    run: usize,
}

impl SyntheticFall {
    fn for_config(config: &FallDetectorConfig) -> Self {
        let Thresholds { low_g, high_g } = config.thresholds;
        let baseline = if low_g < 1.0 && high_g > 1.0 {
            1.0
        } else {
            (low_g + high_g) / 2.0
        };

        Self {
            baseline,
            free_fall: low_g / 2.0,
            impact: Self::impact_for(config),
            run: config.smoothing_window.max(1),
        }
    }

    /// Impact level between `high_g` and the emergency peak, so a synthetic
    /// fall raises the ordinary warning unless the policy always escalates.
    fn impact_for(config: &FallDetectorConfig) -> f32 {
        let high_g = config.thresholds.high_g;
        let impact = match config.emergency.peak_limit(high_g) {
            Some(limit) if limit > high_g => high_g + (limit - high_g) / 2.0,
            _ => high_g * 1.25,
        };
        impact.min(MAX_PLAUSIBLE_G)
    }

    fn play<S: FallEventSink>(
        &self,
        detector: &mut FallDetector<S>,
        clock: &mut Instant,
    ) -> Option<FallEvent> {
        let settled = self.feed(detector, self.baseline, clock);
        let dipped = self.feed(detector, self.free_fall, clock);
        let impact = self.feed(detector, self.impact, clock);
        settled.or(dipped).or(impact)
    }

    fn feed<S: FallEventSink>(
        &self,
        detector: &mut FallDetector<S>,
        level: f32,
        clock: &mut Instant,
    ) -> Option<FallEvent> {
        let mut event = None;
        for _ in 0..self.run {
            if let Ok(update) = detector.update(AccelerationSample::new(level, *clock)) {
                event = event.or(update.event);
            }
            *clock = *clock + SCRIPT_STEP;
        }
        event
    }
}

impl<S: FallEventSink> FallDetector<S> {
    /// Runs canned sequences against a scratch detector using the live configuration.
    ///
    /// The live detector's state, history and counters are not touched.
    #[must_use]
    pub fn run_self_test(&self) -> SelfTestReport {
        let script = SyntheticFall::for_config(&self.config);
        let mut report = SelfTestReport::default();

        let mut scratch = FallDetector::new(self.config);
        let mut clock = Instant::ZERO;
        let first = script.play(&mut scratch, &mut clock);
        report.detection = first.is_some() && scratch.fall_count() == 1;

        // A second fall immediately after the first lands inside the cooldown.
        if report.detection && !self.config.timing.cooldown.is_zero() {
            let second = script.play(&mut scratch, &mut clock);
            report.cooldown_enforced = second.is_none() && scratch.fall_count() == 1;
        } else {
            report.cooldown_enforced = report.detection;
        }

        let mut scratch = FallDetector::new(self.config);
        let mut clock = Instant::ZERO;
        let dipped = script.feed(&mut scratch, script.free_fall, &mut clock);
        clock = clock + self.config.timing.window + SCRIPT_STEP;
        let recovered = script.feed(&mut scratch, script.baseline, &mut clock);
        report.false_alarm_rejected = dipped.is_none()
            && recovered.is_none()
            && scratch.state() != FallDetectionState::Cooldown;

        report
    }

    /// Resets the detector and plays a synthetic fall through it starting at `now`.
    ///
    /// The resulting event is flagged `simulated` and reaches the sink like a real fall.
    pub fn simulate_fall(&mut self, now: Instant) -> Option<FallEvent> {
        self.reset();
        self.simulating = true;
        let script = SyntheticFall::for_config(&self.config);
        let mut clock = now;
        let event = script.play(self, &mut clock);
        self.simulating = false;
        // Synthetic timestamps run slightly ahead of the sensor clock.
        self.last_sample_at = None;
        event
    }

    /// Starts collecting stationary samples for a calibration proposal.
    pub fn begin_calibration(&mut self) {
        self.calibration = Some(Calibrator::new());
    }

    #[must_use]
    pub fn is_calibrating(&self) -> bool {
        self.calibration.is_some()
    }

    /// Returns the proposal for the samples collected so far without applying it.
    ///
    /// # Errors
    ///
    /// Returns [`CalibrationError`] when no calibration is running or the
    /// collected samples are unsuitable.
    pub fn calibration_proposal(&self) -> Result<CalibrationProposal, CalibrationError> {
        self.calibration
            .as_ref()
            .ok_or(CalibrationError::NotCalibrating)?
            .proposal()
    }

    /// Applies the current proposal and ends the calibration run.
    ///
    /// # Errors
    ///
    /// See [`FallDetector::calibration_proposal`]; on error the calibration
    /// keeps running and the thresholds are unchanged.
    pub fn commit_calibration(&mut self) -> Result<CalibrationProposal, CalibrationError> {
        let proposal = self.calibration_proposal()?;
        self.config.thresholds = proposal.thresholds;
        self.calibration = None;
        Ok(proposal)
    }

    /// Abandons a running calibration without touching the thresholds.
    pub fn cancel_calibration(&mut self) -> bool {
        self.calibration.take().is_some()
    }
}

/// Why a calibration run cannot produce thresholds.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum CalibrationError {
    NotCalibrating,
    InsufficientSamples { collected: u32, required: u32 },
    NotStationary,
    BaselineOutOfRange,
}

impl fmt::Display for CalibrationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CalibrationError::NotCalibrating => f.write_str("no calibration in progress"),
            CalibrationError::InsufficientSamples {
                collected,
                required,
            } => write!(f, "collected {collected} of {required} samples"),
            CalibrationError::NotStationary => f.write_str("device moved during calibration"),
            CalibrationError::BaselineOutOfRange => {
                f.write_str("resting magnitude is far from 1 g")
            }
        }
    }
}

/// Thresholds derived from a stationary baseline.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct CalibrationProposal {
    pub baseline_g: f32,
    pub spread_g: f32,
    pub thresholds: Thresholds,
}

/// Running statistics over stationary samples.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Calibrator {
    count: u32,
    sum: f32,
    min: f32,
    max: f32,
}

impl Calibrator {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            count: 0,
            sum: 0.0,
            min: f32::INFINITY,
            max: f32::NEG_INFINITY,
        }
    }

    pub fn observe(&mut self, magnitude: f32) {
        self.count = self.count.saturating_add(1);
        self.sum += magnitude;
        self.min = self.min.min(magnitude);
        self.max = self.max.max(magnitude);
    }

    #[must_use]
    pub const fn sample_count(&self) -> u32 {
        self.count
    }

    /// Scales the default thresholds by the observed resting magnitude.
    ///
    /// # Errors
    ///
    /// Returns [`CalibrationError`] when too few samples were collected, the
    /// device was moving, or the baseline is implausible.
    pub fn proposal(&self) -> Result<CalibrationProposal, CalibrationError> {
        if self.count < MIN_CALIBRATION_SAMPLES {
            return Err(CalibrationError::InsufficientSamples {
                collected: self.count,
                required: MIN_CALIBRATION_SAMPLES,
            });
        }

        let spread = self.max - self.min;
        if spread > MAX_CALIBRATION_SPREAD_G {
            return Err(CalibrationError::NotStationary);
        }

        let baseline = self.sum / count_as_f32(self.count);
        if !(MIN_BASELINE_G..=MAX_BASELINE_G).contains(&baseline) {
            return Err(CalibrationError::BaselineOutOfRange);
        }

        let thresholds = Thresholds::new(DEFAULT_LOW_G * baseline, DEFAULT_HIGH_G * baseline)
            .map_err(|_| CalibrationError::BaselineOutOfRange)?;

        Ok(CalibrationProposal {
            baseline_g: baseline,
            spread_g: spread,
            thresholds,
        })
    }
}

impl Default for Calibrator {
    fn default() -> Self {
        Self::new()
    }
}

#[allow(clippy::cast_precision_loss)]
fn count_as_f32(count: u32) -> f32 {
    count as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fall::{DetectionTiming, EmergencyPolicy, FallDetectorConfig};

    fn close(actual: f32, expected: f32) -> bool {
        let delta = actual - expected;
        delta < 1e-4 && delta > -1e-4
    }

    #[test]
    fn self_test_passes_with_defaults_and_leaves_detector_untouched() {
        let detector = FallDetector::default();
        let report = detector.run_self_test();

        assert!(report.passed(), "report: {report:?}");
        assert_eq!(detector.fall_count(), 0);
        assert!(detector.history().is_empty());
    }

    #[test]
    fn self_test_handles_wide_smoothing_window() {
        let mut detector = FallDetector::default();
        detector.set_smoothing_window(8).expect("valid window");

        assert!(detector.run_self_test().passed());
    }

    #[test]
    fn self_test_flags_broken_window() {
        let config = FallDetectorConfig {
            smoothing_window: 40,
            timing: DetectionTiming::new(Duration::from_millis(5), Duration::from_millis(1_000))
                .expect("valid timing"),
            ..FallDetectorConfig::DEFAULT
        };
        let report = FallDetector::new(config).run_self_test();

        assert!(!report.detection);
        assert!(!report.passed());
    }

    #[test]
    fn simulated_fall_is_flagged_and_counted() {
        let mut detector = FallDetector::default();
        let event = detector
            .simulate_fall(Instant::from_millis(5_000))
            .expect("simulated fall");

        assert!(event.simulated);
        assert!(detector.is_in_cooldown());
        assert_eq!(detector.fall_count(), 1);

        // Real samples keep flowing right after the simulation.
        assert!(
            detector
                .update(AccelerationSample::new(1.0, Instant::from_millis(5_001)))
                .is_ok()
        );
    }

    #[test]
    fn simulated_impact_stays_below_the_emergency_peak() {
        let mut detector = FallDetector::default();
        let event = detector
            .simulate_fall(Instant::from_millis(1_000))
            .expect("simulated fall");
        assert!(!event.is_emergency);
        assert!(event.max_acceleration > DEFAULT_HIGH_G);

        let mut detector = FallDetector::default();
        detector.set_custom_sensitivity(2.0).expect("valid sensitivity");
        let event = detector
            .simulate_fall(Instant::from_millis(1_000))
            .expect("simulated fall");
        assert!(!event.is_emergency);

        let mut detector = FallDetector::default();
        detector
            .set_emergency_policy(EmergencyPolicy::Always)
            .expect("valid policy");
        let event = detector
            .simulate_fall(Instant::from_millis(1_000))
            .expect("simulated fall");
        assert!(event.is_emergency);
    }

    #[test]
    fn calibration_requires_commit() {
        let mut detector = FallDetector::default();
        assert_eq!(
            detector.calibration_proposal(),
            Err(CalibrationError::NotCalibrating)
        );

        detector.begin_calibration();
        for index in 0..MIN_CALIBRATION_SAMPLES {
            let magnitude = if index % 2 == 0 { 1.05 } else { 1.15 };
            detector
                .update(AccelerationSample::new(
                    magnitude,
                    Instant::from_millis(index * 10),
                ))
                .expect("sample accepted");
        }

        let proposal = detector.calibration_proposal().expect("proposal");
        assert!(close(proposal.baseline_g, 1.1));
        assert!(close(proposal.thresholds.low_g, 0.33));
        assert_eq!(detector.config().thresholds, Thresholds::DEFAULT);

        let committed = detector.commit_calibration().expect("commit");
        assert_eq!(detector.config().thresholds, committed.thresholds);
        assert!(!detector.is_calibrating());
    }

    #[test]
    fn calibration_rejects_motion_and_short_runs() {
        let mut calibrator = Calibrator::new();
        calibrator.observe(1.0);
        assert_eq!(
            calibrator.proposal(),
            Err(CalibrationError::InsufficientSamples {
                collected: 1,
                required: MIN_CALIBRATION_SAMPLES,
            })
        );

        for index in 0..MIN_CALIBRATION_SAMPLES {
            calibrator.observe(if index == 3 { 2.0 } else { 1.0 });
        }
        assert_eq!(calibrator.proposal(), Err(CalibrationError::NotStationary));

        let mut detector = FallDetector::default();
        detector.begin_calibration();
        assert!(detector.cancel_calibration());
        assert!(!detector.cancel_calibration());
    }
}
