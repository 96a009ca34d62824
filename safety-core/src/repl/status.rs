//! Shared status surface for the REPL.
//!
//! [`StatusSnapshot::capture`] copies the live detector and alert state out of
//! a [`SafetyController`] so front-ends can render it after the controller has
//! moved on. [`StatusFormatter`] keeps the textual rendering consistent across
//! the firmware and emulator.

use core::fmt;
use core::time::Duration;

use crate::alert::{AlertOutput, AlertPattern, BuzzerState, QUEUE_CAPACITY};
use crate::controller::SafetyController;
use crate::fall::{DetectionTiming, FallDetectionState, FallEvent, FallEventSink, Thresholds};
use crate::time::Instant;

/// Detector half of a [`StatusSnapshot`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DetectorStatus {
    pub state: FallDetectionState,
    pub filtered_g: Option<f32>,
    pub thresholds: Thresholds,
    pub timing: DetectionTiming,
    pub smoothing_window: usize,
    pub fall_count: u32,
    pub cooldown_remaining: Option<Duration>,
    pub calibrating: bool,
}

/// Alert half of a [`StatusSnapshot`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AlertStatus {
    pub state: BuzzerState,
    pub pattern: Option<AlertPattern>,
    pub queue_len: usize,
    pub emergency_mode: bool,
    pub output_on: bool,
    /// Time left until the scheduled beep fires.
    pub scheduled_in: Option<Duration>,
}

/// Most recent confirmed fall and how long ago it happened.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LastFall {
    pub event: FallEvent,
    pub age: Duration,
}

/// Snapshot of reusable status information surfaced by the REPL.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StatusSnapshot {
    pub detector: DetectorStatus,
    pub alert: AlertStatus,
    pub last_fall: Option<LastFall>,
}

impl StatusSnapshot {
    /// Captures the controller state as seen at `now`.
    #[must_use]
    pub fn capture<O: AlertOutput, S: FallEventSink>(
        controller: &SafetyController<O, S>,
        now: Instant,
    ) -> Self {
        let detector = controller.detector();
        let alerts = controller.alerts();
        let config = detector.config();

        Self {
            detector: DetectorStatus {
                state: detector.state(),
                filtered_g: detector.filtered_acceleration(),
                thresholds: config.thresholds,
                timing: config.timing,
                smoothing_window: config.smoothing_window,
                fall_count: detector.fall_count(),
                cooldown_remaining: detector
                    .cooldown_remaining(now)
                    .filter(|remaining| !remaining.is_zero()),
                calibrating: detector.is_calibrating(),
            },
            alert: AlertStatus {
                state: alerts.state(),
                pattern: alerts.current_pattern(),
                queue_len: alerts.queue_len(),
                emergency_mode: alerts.emergency_mode(),
                output_on: alerts.is_output_on(),
                scheduled_in: alerts.next_beep_time().map(|due| {
                    if now.has_reached(due) {
                        Duration::ZERO
                    } else {
                        due.duration_since(now)
                    }
                }),
            },
            last_fall: detector.last_fall().copied().map(|event| LastFall {
                event,
                age: detector
                    .time_since_last_fall(now)
                    .unwrap_or(Duration::ZERO),
            }),
        }
    }
}

/// Helper that renders a [`StatusSnapshot`] into human-readable lines.
#[derive(Clone, Copy, Debug)]
pub struct StatusFormatter<'a> {
    snapshot: &'a StatusSnapshot,
}

impl<'a> StatusFormatter<'a> {
    /// Creates a new formatter for the provided snapshot.
    #[must_use]
    pub const fn new(snapshot: &'a StatusSnapshot) -> Self {
        Self { snapshot }
    }

    /// Writes the detector line (e.g. `detector state=normal filtered=1.00g ...`).
    ///
    /// # Errors
    ///
    /// Propagates writer failures.
    pub fn write_detector_line<W: fmt::Write>(&self, writer: &mut W) -> fmt::Result {
        let detector = &self.snapshot.detector;
        write!(writer, "detector state={} filtered=", detector.state)?;
        match detector.filtered_g {
            Some(value) => write!(writer, "{value:.2}g")?,
            None => writer.write_str("n/a")?,
        }
        write!(
            writer,
            " low={:.2}g high={:.2}g window={}ms cooldown={}ms smoothing={} falls={}",
            detector.thresholds.low_g,
            detector.thresholds.high_g,
            detector.timing.window.as_millis(),
            detector.timing.cooldown.as_millis(),
            detector.smoothing_window,
            detector.fall_count,
        )?;
        if let Some(remaining) = detector.cooldown_remaining {
            writer.write_str(" cooldown-left=")?;
            write_duration(writer, Some(remaining))?;
        }
        if detector.calibrating {
            writer.write_str(" calibrating")?;
        }
        Ok(())
    }

    /// Writes the alert line (e.g. `alert state=playing pattern=warning queue=1/8 ...`).
    ///
    /// # Errors
    ///
    /// Propagates writer failures.
    pub fn write_alert_line<W: fmt::Write>(&self, writer: &mut W) -> fmt::Result {
        let alert = &self.snapshot.alert;
        write!(writer, "alert state={} pattern=", alert.state)?;
        match alert.pattern {
            Some(pattern) => write!(writer, "{pattern}")?,
            None => writer.write_str("none")?,
        }
        write!(
            writer,
            " queue={}/{QUEUE_CAPACITY} emergency-mode={} output={} scheduled=",
            alert.queue_len,
            on_off(alert.emergency_mode),
            on_off(alert.output_on),
        )?;
        write_duration(writer, alert.scheduled_in)
    }

    /// Writes the last-fall line (e.g. `last-fall age=+1.2s peak=3.00g ...`).
    ///
    /// # Errors
    ///
    /// Propagates writer failures.
    pub fn write_last_fall_line<W: fmt::Write>(&self, writer: &mut W) -> fmt::Result {
        let Some(last) = &self.snapshot.last_fall else {
            return writer.write_str("last-fall none");
        };

        writer.write_str("last-fall age=")?;
        write_duration(writer, Some(last.age))?;
        write!(
            writer,
            " peak={:.2}g trough={:.2}g duration={}ms emergency={} simulated={}",
            last.event.max_acceleration,
            last.event.min_acceleration,
            last.event.duration.as_millis(),
            last.event.is_emergency,
            last.event.simulated,
        )
    }
}

fn on_off(flag: bool) -> &'static str {
    if flag { "on" } else { "off" }
}

fn write_duration<W: fmt::Write>(writer: &mut W, duration: Option<Duration>) -> fmt::Result {
    match duration {
        None => writer.write_str("n/a"),
        Some(value) if value >= Duration::from_secs(1) => {
            let millis = value.as_millis();
            let seconds = millis / 1_000;
            let tenths = (millis % 1_000) / 100;
            write!(writer, "+{seconds}.{tenths}s")
        }
        Some(value) => write!(writer, "+{}ms", value.as_millis()),
    }
}
