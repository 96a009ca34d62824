//! Console logging for controller activity.
//!
//! Every event family has one `log_*` entry point and a matching `emit_*`
//! backend: defmt on the MCU, stdout on host builds so the same call sites run
//! under the test harness.

use safety_core::alert::{AlertError, TickEvent};
use safety_core::fall::{FallEvent, FallEventSink, SampleError, SelfTestReport};
use safety_core::time::Instant;

use crate::status::CachedStatus;

/// Fall sink that mirrors confirmed falls to the log.
#[derive(Debug, Default)]
pub struct LoggingSink {
    falls: u32,
    emergencies: u32,
}

impl LoggingSink {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            falls: 0,
            emergencies: 0,
        }
    }

    #[must_use]
    pub const fn falls(&self) -> u32 {
        self.falls
    }

    #[must_use]
    pub const fn emergencies(&self) -> u32 {
        self.emergencies
    }
}

impl FallEventSink for LoggingSink {
    fn on_fall(&mut self, event: &FallEvent) {
        self.falls = self.falls.wrapping_add(1);
        emit_fall(
            event.timestamp.as_millis(),
            event.max_acceleration,
            event.min_acceleration,
            millis(event.duration),
            event.simulated,
        );
    }

    fn on_emergency(&mut self, event: &FallEvent) {
        self.emergencies = self.emergencies.wrapping_add(1);
        emit_emergency(event.timestamp.as_millis(), event.max_acceleration);
    }
}

/// Logs one alert tick event.
pub fn log_tick_event(event: TickEvent, now: Instant) {
    let (action, pattern) = match event {
        TickEvent::Started(pattern) => ("start", pattern),
        TickEvent::Completed(pattern) => ("done", pattern),
        TickEvent::ScheduledFired(pattern) => ("scheduled", pattern),
        TickEvent::ScheduledDropped(pattern) => ("scheduled-dropped", pattern),
    };
    emit_alert(action, pattern.name(), now.as_millis());
}

/// Logs a sample the detector refused.
pub fn log_sample_rejected(error: SampleError, at: Instant) {
    let reason = match error {
        SampleError::NotFinite => "not-finite",
        SampleError::Negative => "negative",
        SampleError::OutOfRange => "out-of-range",
        SampleError::TimestampRegressed => "timestamp-regressed",
    };
    emit_rejected("sample", reason, at.as_millis());
}

/// Logs an alert request the orchestrator could not accept.
pub fn log_alert_rejected(error: AlertError, at: Instant) {
    let reason = match error {
        AlertError::QueueFull => "queue-full",
        AlertError::NotPlaying => "not-playing",
        AlertError::NotPaused => "not-paused",
        AlertError::InvalidTiming => "invalid-timing",
        AlertError::OutOfRange => "out-of-range",
    };
    emit_rejected("alert", reason, at.as_millis());
}

/// Logs the boot-time detector self-test.
pub fn log_self_test(report: SelfTestReport) {
    emit_self_test(
        report.passed(),
        report.detection,
        report.false_alarm_rejected,
        report.cooldown_enforced,
    );
}

/// Logs the periodic status line.
pub fn log_heartbeat(status: &CachedStatus) {
    emit_heartbeat(
        status.detector.label(),
        status.alert.label(),
        status.queue_len,
        status.fall_count,
        status.rejected_samples,
        status.dropped_samples,
    );
}

fn millis(duration: core::time::Duration) -> u32 {
    u32::try_from(duration.as_millis()).unwrap_or(u32::MAX)
}

#[cfg(target_os = "none")]
fn emit_fall(at_ms: u32, peak: f32, trough: f32, duration_ms: u32, simulated: bool) {
    defmt::warn!(
        "telemetry:fall t={}ms peak={}g trough={}g duration={}ms simulated={}",
        at_ms,
        peak,
        trough,
        duration_ms,
        simulated
    );
}

#[cfg(not(target_os = "none"))]
fn emit_fall(at_ms: u32, peak: f32, trough: f32, duration_ms: u32, simulated: bool) {
    println!(
        "telemetry:fall t={at_ms}ms peak={peak:.2}g trough={trough:.2}g \
         duration={duration_ms}ms simulated={simulated}"
    );
}

#[cfg(target_os = "none")]
fn emit_emergency(at_ms: u32, peak: f32) {
    defmt::error!("telemetry:emergency t={}ms peak={}g", at_ms, peak);
}

#[cfg(not(target_os = "none"))]
fn emit_emergency(at_ms: u32, peak: f32) {
    println!("telemetry:emergency t={at_ms}ms peak={peak:.2}g");
}

#[cfg(target_os = "none")]
fn emit_alert(action: &'static str, pattern: &'static str, at_ms: u32) {
    defmt::info!("telemetry:alert {} {} t={}ms", action, pattern, at_ms);
}

#[cfg(not(target_os = "none"))]
fn emit_alert(action: &'static str, pattern: &'static str, at_ms: u32) {
    println!("telemetry:alert {action} {pattern} t={at_ms}ms");
}

#[cfg(target_os = "none")]
fn emit_rejected(kind: &'static str, reason: &'static str, at_ms: u32) {
    defmt::warn!("telemetry:rejected {} {} t={}ms", kind, reason, at_ms);
}

#[cfg(not(target_os = "none"))]
fn emit_rejected(kind: &'static str, reason: &'static str, at_ms: u32) {
    println!("telemetry:rejected {kind} {reason} t={at_ms}ms");
}

#[cfg(target_os = "none")]
fn emit_self_test(passed: bool, detection: bool, false_alarm: bool, cooldown: bool) {
    if passed {
        defmt::info!("telemetry:selftest pass");
    } else {
        defmt::error!(
            "telemetry:selftest FAIL detection={} false-alarm={} cooldown={}",
            detection,
            false_alarm,
            cooldown
        );
    }
}

#[cfg(not(target_os = "none"))]
fn emit_self_test(passed: bool, detection: bool, false_alarm: bool, cooldown: bool) {
    if passed {
        println!("telemetry:selftest pass");
    } else {
        println!(
            "telemetry:selftest FAIL detection={detection} false-alarm={false_alarm} \
             cooldown={cooldown}"
        );
    }
}

#[cfg(target_os = "none")]
fn emit_heartbeat(
    detector: &'static str,
    alert: &'static str,
    queue_len: u8,
    falls: u32,
    rejected: u32,
    dropped: u32,
) {
    defmt::info!(
        "telemetry:status detector={} alert={} queue={} falls={} rejected={} dropped={}",
        detector,
        alert,
        queue_len,
        falls,
        rejected,
        dropped
    );
}

#[cfg(not(target_os = "none"))]
fn emit_heartbeat(
    detector: &'static str,
    alert: &'static str,
    queue_len: u8,
    falls: u32,
    rejected: u32,
    dropped: u32,
) {
    println!(
        "telemetry:status detector={detector} alert={alert} queue={queue_len} falls={falls} \
         rejected={rejected} dropped={dropped}"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::time::Duration;

    fn event(is_emergency: bool) -> FallEvent {
        FallEvent {
            timestamp: Instant::from_millis(150),
            max_acceleration: 3.0,
            min_acceleration: 0.2,
            duration: Duration::from_millis(100),
            is_emergency,
            simulated: false,
        }
    }

    #[test]
    fn sink_counts_falls_and_emergencies() {
        let mut sink = LoggingSink::new();
        sink.on_fall(&event(false));
        let hard = event(true);
        sink.on_fall(&hard);
        sink.on_emergency(&hard);
        assert_eq!(sink.falls(), 2);
        assert_eq!(sink.emergencies(), 1);
    }

    #[test]
    fn durations_saturate_when_logged() {
        assert_eq!(millis(Duration::from_millis(100)), 100);
        assert_eq!(millis(Duration::from_secs(u64::MAX)), u32::MAX);
    }
}
