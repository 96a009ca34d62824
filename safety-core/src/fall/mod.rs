//! Fall detection from a single acceleration-magnitude signal.
//!
//! A fall is recognised as a free-fall dip below `low_g` followed, within the
//! detection window, by an impact spike above `high_g`. Each confirmed fall is
//! followed by a cooldown during which further excursions are ignored.

use core::fmt;
use core::time::Duration;

use crate::history::AccelerationHistory;
use crate::time::{Instant, fits_clock_span};

mod diagnostics;
mod transition;

pub use diagnostics::{
    CalibrationError, CalibrationProposal, Calibrator, MIN_CALIBRATION_SAMPLES, SelfTestReport,
};
pub use transition::{Excursion, Phase, Transition, cooldown_remaining, transition};

/// Free-fall threshold in g.
pub const DEFAULT_LOW_G: f32 = 0.3;
/// Impact threshold in g.
pub const DEFAULT_HIGH_G: f32 = 2.8;
/// Maximum time between free-fall onset and impact.
pub const DEFAULT_WINDOW: Duration = Duration::from_millis(300);
/// Quiet period after a confirmed fall.
pub const DEFAULT_COOLDOWN: Duration = Duration::from_millis(1_000);
/// Number of history entries averaged into the filtered magnitude.
pub const DEFAULT_SMOOTHING_WINDOW: usize = 1;
/// Emergency escalation margin above `high_g` at unit sensitivity.
pub const DEFAULT_EMERGENCY_MARGIN_G: f32 = 0.7;
/// Peak impact at or above which a fall escalates to an emergency.
pub const DEFAULT_EMERGENCY_PEAK_G: f32 = DEFAULT_HIGH_G + DEFAULT_EMERGENCY_MARGIN_G;
/// Largest magnitude the sensor can physically report.
pub const MAX_PLAUSIBLE_G: f32 = 16.0;
/// Upper bound accepted by [`FallDetector::set_custom_sensitivity`].
pub const MAX_SENSITIVITY: f32 = 2.0;

/// Fall detector states.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum FallDetectionState {
    Normal,
    LowG,
    HighG,
    Detected,
    Cooldown,
}

impl FallDetectionState {
    /// Short lowercase label used by status output.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            FallDetectionState::Normal => "normal",
            FallDetectionState::LowG => "low-g",
            FallDetectionState::HighG => "high-g",
            FallDetectionState::Detected => "detected",
            FallDetectionState::Cooldown => "cooldown",
        }
    }
}

impl fmt::Display for FallDetectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Acceleration magnitude reading in g.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct AccelerationSample {
    pub magnitude: f32,
    pub timestamp: Instant,
}

impl AccelerationSample {
    #[must_use]
    pub const fn new(magnitude: f32, timestamp: Instant) -> Self {
        Self {
            magnitude,
            timestamp,
        }
    }

    /// Checks that the magnitude is physically plausible.
    ///
    /// # Errors
    ///
    /// Returns the [`SampleError`] describing the first violated bound.
    pub fn validate_magnitude(&self) -> Result<(), SampleError> {
        if !self.magnitude.is_finite() {
            Err(SampleError::NotFinite)
        } else if self.magnitude < 0.0 {
            Err(SampleError::Negative)
        } else if self.magnitude > MAX_PLAUSIBLE_G {
            Err(SampleError::OutOfRange)
        } else {
            Ok(())
        }
    }
}

/// Confirmed fall.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct FallEvent {
    /// Time of the impact sample.
    pub timestamp: Instant,
    pub max_acceleration: f32,
    pub min_acceleration: f32,
    /// Free-fall onset to impact.
    pub duration: Duration,
    pub is_emergency: bool,
    /// Produced by [`FallDetector::simulate_fall`] rather than the sensor.
    pub simulated: bool,
}

/// Reasons a sample is rejected before it reaches the state machine.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SampleError {
    NotFinite,
    Negative,
    OutOfRange,
    TimestampRegressed,
}

impl fmt::Display for SampleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SampleError::NotFinite => f.write_str("magnitude is not a finite number"),
            SampleError::Negative => f.write_str("magnitude is negative"),
            SampleError::OutOfRange => {
                write!(f, "magnitude exceeds the {MAX_PLAUSIBLE_G} g sensor range")
            }
            SampleError::TimestampRegressed => f.write_str("timestamp runs backwards"),
        }
    }
}

/// Rejected detector configuration.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ConfigError {
    InvalidThreshold,
    ThresholdOrder,
    InvalidWindow,
    /// Window or cooldown longer than the wrapping clock can time.
    TimingOutOfRange,
    InvalidSmoothingWindow,
    InvalidSensitivity,
    InvalidEmergencyPeak,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidThreshold => {
                f.write_str("thresholds must be finite and within the sensor range")
            }
            ConfigError::ThresholdOrder => f.write_str("low-g threshold must be below high-g"),
            ConfigError::InvalidWindow => f.write_str("detection window must be non-zero"),
            ConfigError::TimingOutOfRange => {
                f.write_str("window and cooldown must fit within half the clock range")
            }
            ConfigError::InvalidSmoothingWindow => {
                f.write_str("smoothing window must be between 1 and the history capacity")
            }
            ConfigError::InvalidSensitivity => f.write_str("sensitivity must be in (0, 2]"),
            ConfigError::InvalidEmergencyPeak => {
                f.write_str("emergency peak must be finite and positive")
            }
        }
    }
}

fn plausible_threshold(value: f32) -> bool {
    value.is_finite() && value > 0.0 && value <= MAX_PLAUSIBLE_G
}

/// Free-fall and impact thresholds in g.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Thresholds {
    pub low_g: f32,
    pub high_g: f32,
}

impl Thresholds {
    pub const DEFAULT: Self = Self {
        low_g: DEFAULT_LOW_G,
        high_g: DEFAULT_HIGH_G,
    };

    /// Validates and builds a threshold pair.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidThreshold`] for non-finite, non-positive or
    /// out-of-range values and [`ConfigError::ThresholdOrder`] when
    /// `low_g >= high_g`.
    pub fn new(low_g: f32, high_g: f32) -> Result<Self, ConfigError> {
        if !plausible_threshold(low_g) || !plausible_threshold(high_g) {
            return Err(ConfigError::InvalidThreshold);
        }
        if low_g >= high_g {
            return Err(ConfigError::ThresholdOrder);
        }
        Ok(Self { low_g, high_g })
    }
}

impl Default for Thresholds {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Detection window and cooldown durations.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct DetectionTiming {
    pub window: Duration,
    pub cooldown: Duration,
}

impl DetectionTiming {
    pub const DEFAULT: Self = Self {
        window: DEFAULT_WINDOW,
        cooldown: DEFAULT_COOLDOWN,
    };

    /// Validates and builds a timing pair.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidWindow`] when `window` is zero and
    /// [`ConfigError::TimingOutOfRange`] when either duration exceeds half the
    /// clock range.
    pub fn new(window: Duration, cooldown: Duration) -> Result<Self, ConfigError> {
        if window.is_zero() {
            return Err(ConfigError::InvalidWindow);
        }
        if !fits_clock_span(window) || !fits_clock_span(cooldown) {
            return Err(ConfigError::TimingOutOfRange);
        }
        Ok(Self { window, cooldown })
    }
}

impl Default for DetectionTiming {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Decides whether a confirmed fall escalates to an emergency.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum EmergencyPolicy {
    Always,
    Never,
    /// Escalate when the excursion peak reaches this magnitude.
    PeakAbove(f32),
    /// Escalate when the peak clears `high_g` by the default margin divided
    /// by this factor; follows later threshold changes.
    Sensitivity(f32),
}

impl EmergencyPolicy {
    /// Peak at or above which a fall escalates, given the impact threshold.
    #[must_use]
    pub fn peak_limit(self, high_g: f32) -> Option<f32> {
        match self {
            EmergencyPolicy::Always | EmergencyPolicy::Never => None,
            EmergencyPolicy::PeakAbove(limit) => Some(limit),
            EmergencyPolicy::Sensitivity(factor) => {
                Some(high_g + DEFAULT_EMERGENCY_MARGIN_G / factor)
            }
        }
    }

    #[must_use]
    pub fn is_emergency(self, peak: f32, high_g: f32) -> bool {
        match self {
            EmergencyPolicy::Always => true,
            EmergencyPolicy::Never => false,
            policy => policy.peak_limit(high_g).is_some_and(|limit| peak >= limit),
        }
    }
}

impl Default for EmergencyPolicy {
    fn default() -> Self {
        EmergencyPolicy::PeakAbove(DEFAULT_EMERGENCY_PEAK_G)
    }
}

/// Complete detector configuration.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct FallDetectorConfig {
    pub thresholds: Thresholds,
    pub timing: DetectionTiming,
    pub smoothing_window: usize,
    pub emergency: EmergencyPolicy,
}

impl FallDetectorConfig {
    pub const DEFAULT: Self = Self {
        thresholds: Thresholds::DEFAULT,
        timing: DetectionTiming::DEFAULT,
        smoothing_window: DEFAULT_SMOOTHING_WINDOW,
        emergency: EmergencyPolicy::PeakAbove(DEFAULT_EMERGENCY_PEAK_G),
    };
}

impl FallDetectorConfig {
    /// Applies the escalation policy against the current impact threshold.
    #[must_use]
    pub fn is_emergency(&self, peak: f32) -> bool {
        self.emergency.is_emergency(peak, self.thresholds.high_g)
    }
}

impl Default for FallDetectorConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Receives confirmed falls from the detector.
pub trait FallEventSink {
    /// Called once for every confirmed fall.
    fn on_fall(&mut self, event: &FallEvent);

    /// Called after [`FallEventSink::on_fall`] when the fall escalates.
    fn on_emergency(&mut self, event: &FallEvent) {
        let _ = event;
    }
}

impl<T: FallEventSink + ?Sized> FallEventSink for &mut T {
    fn on_fall(&mut self, event: &FallEvent) {
        (**self).on_fall(event);
    }

    fn on_emergency(&mut self, event: &FallEvent) {
        (**self).on_emergency(event);
    }
}

/// Sink that ignores every event.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoopFallSink;

impl FallEventSink for NoopFallSink {
    fn on_fall(&mut self, _event: &FallEvent) {}
}

/// Outcome of feeding one accepted sample.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct FallUpdate {
    pub from: FallDetectionState,
    pub to: FallDetectionState,
    pub filtered: f32,
    pub event: Option<FallEvent>,
}

impl FallUpdate {
    /// Returns `true` when this sample completed a fall.
    #[must_use]
    pub const fn fall_detected(&self) -> bool {
        self.event.is_some()
    }

    #[must_use]
    pub fn state_changed(&self) -> bool {
        self.from != self.to
    }
}

/// Free-fall / impact / cooldown detector.
pub struct FallDetector<S = NoopFallSink> {
    config: FallDetectorConfig,
    history: AccelerationHistory,
    phase: Phase,
    last_fall: Option<FallEvent>,
    fall_count: u32,
    last_sample_at: Option<Instant>,
    last_filtered: Option<f32>,
    calibration: Option<Calibrator>,
    simulating: bool,
    sink: S,
}

impl FallDetector<NoopFallSink> {
    #[must_use]
    pub const fn new(config: FallDetectorConfig) -> Self {
        Self::with_sink(config, NoopFallSink)
    }
}

impl Default for FallDetector<NoopFallSink> {
    fn default() -> Self {
        Self::new(FallDetectorConfig::DEFAULT)
    }
}

impl<S: FallEventSink> FallDetector<S> {
    /// Creates a detector that reports confirmed falls to `sink`.
    #[must_use]
    pub const fn with_sink(config: FallDetectorConfig, sink: S) -> Self {
        Self {
            config,
            history: AccelerationHistory::new(),
            phase: Phase::Normal,
            last_fall: None,
            fall_count: 0,
            last_sample_at: None,
            last_filtered: None,
            calibration: None,
            simulating: false,
            sink,
        }
    }

    /// Replaces the sink and returns the previous one.
    pub fn set_sink(&mut self, sink: S) -> S {
        core::mem::replace(&mut self.sink, sink)
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    /// Feeds one sample through the filter and state machine.
    ///
    /// Rejected samples leave history and state untouched.
    ///
    /// # Errors
    ///
    /// Returns [`SampleError`] for implausible magnitudes or a timestamp that
    /// precedes the previously accepted sample.
    pub fn update(&mut self, sample: AccelerationSample) -> Result<FallUpdate, SampleError> {
        sample.validate_magnitude()?;
        if let Some(previous) = self.last_sample_at
            && sample.timestamp.is_before(previous)
        {
            return Err(SampleError::TimestampRegressed);
        }

        self.last_sample_at = Some(sample.timestamp);
        self.history.push(sample.magnitude);
        if !self.simulating
            && let Some(calibrator) = self.calibration.as_mut()
        {
            calibrator.observe(sample.magnitude);
        }

        let filtered = self
            .history
            .moving_average(self.config.smoothing_window)
            .unwrap_or(sample.magnitude);
        self.last_filtered = Some(filtered);

        let from = self.phase.state();
        let mut event = None;
        let mut step = transition(self.phase, &self.config, filtered, sample.timestamp);
        loop {
            if let Some(emitted) = step.emitted {
                event = Some(self.record_fall(emitted));
            }
            if !step.next.is_transient() {
                break;
            }
            step = transition(step.next, &self.config, filtered, sample.timestamp);
        }
        self.phase = step.next;

        Ok(FallUpdate {
            from,
            to: self.phase.state(),
            filtered,
            event,
        })
    }

    fn record_fall(&mut self, mut event: FallEvent) -> FallEvent {
        event.simulated = self.simulating;
        self.last_fall = Some(event);
        self.fall_count = self.fall_count.saturating_add(1);
        self.sink.on_fall(&event);
        if event.is_emergency {
            self.sink.on_emergency(&event);
        }
        event
    }

    /// Replaces the free-fall and impact thresholds.
    ///
    /// # Errors
    ///
    /// See [`Thresholds::new`]; the previous thresholds stay in place on error.
    pub fn set_thresholds(&mut self, low_g: f32, high_g: f32) -> Result<(), ConfigError> {
        self.config.thresholds = Thresholds::new(low_g, high_g)?;
        Ok(())
    }

    /// Replaces the detection window and cooldown.
    ///
    /// # Errors
    ///
    /// See [`DetectionTiming::new`].
    pub fn set_timing(&mut self, window: Duration, cooldown: Duration) -> Result<(), ConfigError> {
        self.config.timing = DetectionTiming::new(window, cooldown)?;
        Ok(())
    }

    /// Sets how many recent samples the filter averages.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidSmoothingWindow`] outside `1..=capacity`.
    pub fn set_smoothing_window(&mut self, window: usize) -> Result<(), ConfigError> {
        if window == 0 || window > self.history.capacity() {
            return Err(ConfigError::InvalidSmoothingWindow);
        }
        self.config.smoothing_window = window;
        Ok(())
    }

    /// Replaces the escalation policy.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidEmergencyPeak`] for a non-finite or
    /// non-positive `PeakAbove` limit and [`ConfigError::InvalidSensitivity`]
    /// for a `Sensitivity` factor outside `(0, 2]`.
    pub fn set_emergency_policy(&mut self, policy: EmergencyPolicy) -> Result<(), ConfigError> {
        match policy {
            EmergencyPolicy::PeakAbove(limit) if !(limit.is_finite() && limit > 0.0) => {
                return Err(ConfigError::InvalidEmergencyPeak);
            }
            EmergencyPolicy::Sensitivity(factor)
                if !(factor.is_finite() && factor > 0.0 && factor <= MAX_SENSITIVITY) =>
            {
                return Err(ConfigError::InvalidSensitivity);
            }
            _ => {}
        }
        self.config.emergency = policy;
        Ok(())
    }

    /// Rescales the emergency peak: higher sensitivity escalates gentler impacts.
    ///
    /// The peak stays relative to `high_g`, so later threshold changes move it too.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidSensitivity`] unless `0 < sensitivity <= 2`.
    pub fn set_custom_sensitivity(&mut self, sensitivity: f32) -> Result<(), ConfigError> {
        self.set_emergency_policy(EmergencyPolicy::Sensitivity(sensitivity))
    }

    /// Returns `true` if a fall with this peak would escalate.
    #[must_use]
    pub fn should_trigger_emergency(&self, peak: f32) -> bool {
        self.config.is_emergency(peak)
    }

    /// Returns to `Normal` and clears history; the fall counter survives.
    pub fn reset(&mut self) {
        self.phase = Phase::Normal;
        self.history.clear();
        self.last_sample_at = None;
        self.last_filtered = None;
    }

    pub fn reset_fall_count(&mut self) {
        self.fall_count = 0;
    }

    #[must_use]
    pub fn state(&self) -> FallDetectionState {
        self.phase.state()
    }

    #[must_use]
    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    #[must_use]
    pub fn is_in_cooldown(&self) -> bool {
        matches!(self.phase, Phase::Cooldown { .. })
    }

    /// Cooldown left at `now`, if cooling down.
    #[must_use]
    pub fn cooldown_remaining(&self, now: Instant) -> Option<Duration> {
        cooldown_remaining(&self.phase, &self.config, now)
    }

    #[must_use]
    pub fn last_fall(&self) -> Option<&FallEvent> {
        self.last_fall.as_ref()
    }

    #[must_use]
    pub fn fall_count(&self) -> u32 {
        self.fall_count
    }

    #[must_use]
    pub fn time_since_last_fall(&self, now: Instant) -> Option<Duration> {
        self.last_fall.map(|event| now.duration_since(event.timestamp))
    }

    #[must_use]
    pub fn history(&self) -> &AccelerationHistory {
        &self.history
    }

    #[must_use]
    pub fn config(&self) -> &FallDetectorConfig {
        &self.config
    }

    /// Filtered magnitude computed for the most recent accepted sample.
    #[must_use]
    pub fn filtered_acceleration(&self) -> Option<f32> {
        self.last_filtered
    }
}
