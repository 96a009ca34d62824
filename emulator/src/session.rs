use std::fmt::Write as _;
use std::fs::{self, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::time::Duration;

use safety_core::alert::{AlertError, AlertOrchestrator, AlertOutput, AlertRequest, TickEvent};
use safety_core::controller::{SafetyController, SampleOutcome};
use safety_core::fall::{
    CalibrationProposal, FallDetector, FallDetectorConfig, FallEvent, FallEventSink,
    SelfTestReport,
};
use safety_core::repl::catalog::{COMMANDS, CommandSpec};
use safety_core::repl::{CommandExecutor, CommandOutcome, StatusFormatter, StatusSnapshot};
use safety_core::time::Instant;

/// Simulated tick cadence used while a `wait` advances the clock.
pub const TICK: Duration = Duration::from_millis(10);

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TranscriptProfile {
    Interactive,
    Fall,
    Alerts,
    Emergency,
}

impl TranscriptProfile {
    pub fn log_path(self) -> &'static str {
        match self {
            TranscriptProfile::Interactive => "evidence/emulator-interactive.log",
            TranscriptProfile::Fall => "evidence/emulator-fall.log",
            TranscriptProfile::Alerts => "evidence/emulator-alerts.log",
            TranscriptProfile::Emergency => "evidence/emulator-emergency.log",
        }
    }

    pub fn header(self) -> &'static str {
        match self {
            TranscriptProfile::Interactive => "Safety Controller Emulator interactive transcript",
            TranscriptProfile::Fall => "Safety Controller Emulator fall detection transcript",
            TranscriptProfile::Alerts => "Safety Controller Emulator alert playback transcript",
            TranscriptProfile::Emergency => "Safety Controller Emulator emergency transcript",
        }
    }

    pub fn from_tag(tag: &str) -> Result<Self, String> {
        [
            ("interactive", Self::Interactive),
            ("fall", Self::Fall),
            ("alerts", Self::Alerts),
            ("emergency", Self::Emergency),
        ]
        .into_iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(tag))
        .map(|(_, profile)| profile)
        .ok_or_else(|| format!("Unknown transcript profile `{tag}`"))
    }
}

/// Buzzer stand-in that remembers every level change until drained.
#[derive(Debug, Default)]
pub struct HostBuzzer {
    active: bool,
    pending: Vec<bool>,
}

impl HostBuzzer {
    fn drain(&mut self) -> Vec<bool> {
        std::mem::take(&mut self.pending)
    }
}

impl AlertOutput for HostBuzzer {
    fn set_active(&mut self, active: bool) {
        if self.active != active {
            self.active = active;
            self.pending.push(active);
        }
    }
}

/// Fall sink that records escalations for the transcript.
#[derive(Debug, Default)]
pub struct EscalationLog {
    emergencies: Vec<FallEvent>,
}

impl FallEventSink for EscalationLog {
    fn on_fall(&mut self, _event: &FallEvent) {}

    fn on_emergency(&mut self, event: &FallEvent) {
        self.emergencies.push(*event);
    }
}

#[cfg(test)]
type Controller = SafetyController<HostBuzzer, EscalationLog>;

pub struct Session {
    executor: CommandExecutor<HostBuzzer, EscalationLog>,
    transcript: TranscriptLogger,
    clock: Instant,
    elapsed: Duration,
}

impl Session {
    pub fn new(profile: TranscriptProfile) -> io::Result<Self> {
        let transcript = TranscriptLogger::create(profile)?;
        Ok(Self::with_transcript(transcript))
    }

    /// Session whose transcript is discarded.
    #[cfg(test)]
    pub fn detached() -> Self {
        Self::with_transcript(TranscriptLogger::discard())
    }

    fn with_transcript(transcript: TranscriptLogger) -> Self {
        let controller = SafetyController::from_parts(
            FallDetector::with_sink(FallDetectorConfig::DEFAULT, EscalationLog::default()),
            AlertOrchestrator::with_output(HostBuzzer::default()),
        );
        Self {
            executor: CommandExecutor::new(controller),
            transcript,
            clock: Instant::ZERO,
            elapsed: Duration::ZERO,
        }
    }

    #[cfg(test)]
    pub fn controller(&self) -> &Controller {
        self.executor.controller()
    }

    /// Simulated time since the session started.
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn handle_command(&mut self, line: &str) -> io::Result<Vec<String>> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Ok(Vec::new());
        }
        self.transcript
            .append_line(self.elapsed, TranscriptRole::Host, trimmed)?;

        let mut output = Vec::new();
        let mut lines = Vec::new();
        match self.executor.execute(trimmed, self.clock) {
            Ok(CommandOutcome::Wait(duration)) => {
                output = self.advance(duration)?;
                lines.push(format!("OK waited {}", format_duration_short(duration)));
            }
            Ok(outcome) => describe_outcome(&outcome, self.clock, &mut lines),
            Err(error) => lines.push(format!("ERR {error}")),
        }
        lines.extend(self.drain_device_lines());
        self.record_output(&lines)?;
        output.extend(lines);
        Ok(output)
    }

    /// Ticks the controller every [`TICK`] until `duration` has passed. Buzzer
    /// edges and playback events are logged with the tick they happened on.
    fn advance(&mut self, duration: Duration) -> io::Result<Vec<String>> {
        let deadline = self.elapsed + duration;
        let mut output = Vec::new();
        while self.elapsed < deadline {
            let step = TICK.min(deadline - self.elapsed);
            self.elapsed += step;
            self.clock = self.clock + step;

            let events = self.executor.controller_mut().tick(self.clock);
            let mut lines: Vec<String> =
                events.iter().copied().map(describe_tick_event).collect();
            lines.extend(self.drain_device_lines());
            for line in &mut lines {
                self.transcript
                    .append_line(self.elapsed, TranscriptRole::Emulator, line)?;
                line.insert_str(0, &format!("[+{}ms] ", self.elapsed.as_millis()));
            }
            output.append(&mut lines);
        }
        Ok(output)
    }

    fn drain_device_lines(&mut self) -> Vec<String> {
        let controller = self.executor.controller_mut();
        let mut lines: Vec<String> = controller
            .alerts_mut()
            .output_mut()
            .map(HostBuzzer::drain)
            .unwrap_or_default()
            .into_iter()
            .map(|on| format!("buzzer {}", if on { "ON" } else { "off" }))
            .collect();
        let escalations = std::mem::take(&mut controller.detector_mut().sink_mut().emergencies);
        lines.extend(escalations.iter().map(|event| {
            format!(
                "EMERGENCY raised peak={:.2}g at +{}ms",
                event.max_acceleration,
                event.timestamp.as_millis()
            )
        }));
        lines
    }

    fn record_output(&mut self, lines: &[String]) -> io::Result<()> {
        for line in lines {
            self.transcript
                .append_line(self.elapsed, TranscriptRole::Emulator, line)?;
        }
        Ok(())
    }
}

fn describe_outcome(outcome: &CommandOutcome, now: Instant, lines: &mut Vec<String>) {
    match outcome {
        CommandOutcome::Status(snapshot) => describe_status(snapshot, lines),
        CommandOutcome::Sample(sample) => describe_sample(sample, lines),
        CommandOutcome::Alert(request) => lines.push(format!("OK {}", describe_request(*request))),
        CommandOutcome::SoundCheck => lines.push("OK sound check requested".to_string()),
        CommandOutcome::Scheduled { due, replaced } => {
            let mut line = format!("OK scheduled in {}ms", due.millis_since(now));
            if let Some(pattern) = replaced {
                let _ = write!(line, " (replaced {pattern})");
            }
            lines.push(line);
        }
        CommandOutcome::ScheduleCancelled(true) => lines.push("OK schedule cancelled".to_string()),
        CommandOutcome::ScheduleCancelled(false) => lines.push("OK nothing scheduled".to_string()),
        CommandOutcome::Paused => lines.push("OK paused".to_string()),
        CommandOutcome::Resumed => lines.push("OK resumed".to_string()),
        CommandOutcome::Stopped(Some(pattern)) => lines.push(format!("OK stopped {pattern}")),
        CommandOutcome::Stopped(None) => lines.push("OK nothing playing".to_string()),
        CommandOutcome::StoppedAll => lines.push("OK silenced".to_string()),
        CommandOutcome::Cleared(count) => lines.push(format!("OK cleared {count} queued")),
        CommandOutcome::EmergencyMode(enabled) => lines.push(format!(
            "OK emergency-mode {}",
            if *enabled { "on" } else { "off" }
        )),
        CommandOutcome::FallReset => lines.push("OK detector reset".to_string()),
        CommandOutcome::Simulated(Some(sample)) => {
            lines.push("OK simulated fall".to_string());
            describe_sample(sample, lines);
        }
        CommandOutcome::Simulated(None) => {
            lines.push("ERR simulation produced no event".to_string());
        }
        CommandOutcome::SelfTest(report) => lines.push(describe_self_test(*report)),
        CommandOutcome::CalibrationStarted => {
            lines.push("OK calibrating; feed resting samples then `fall commit`".to_string());
        }
        CommandOutcome::Calibrated(proposal) => lines.push(describe_calibration(proposal)),
        CommandOutcome::CalibrationCancelled(true) => {
            lines.push("OK calibration cancelled".to_string());
        }
        CommandOutcome::CalibrationCancelled(false) => {
            lines.push("OK not calibrating".to_string());
        }
        CommandOutcome::Configured => lines.push("OK".to_string()),
        CommandOutcome::Help(topic) => describe_help(*topic, lines),
        CommandOutcome::Wait(duration) => {
            lines.push(format!("OK wait {}", format_duration_short(*duration)));
        }
    }
}

fn describe_status(snapshot: &StatusSnapshot, lines: &mut Vec<String>) {
    let formatter = StatusFormatter::new(snapshot);
    let mut detector = String::new();
    let mut alert = String::new();
    let mut last_fall = String::new();
    // Writing into a String cannot fail.
    let _ = formatter.write_detector_line(&mut detector);
    let _ = formatter.write_alert_line(&mut alert);
    let _ = formatter.write_last_fall_line(&mut last_fall);
    lines.extend([detector, alert, last_fall]);
}

fn describe_sample(sample: &SampleOutcome, lines: &mut Vec<String>) {
    let update = &sample.update;
    let mut line = format!("OK {} filtered={:.2}g", update.to, update.filtered);
    if update.from != update.to {
        let _ = write!(line, " (from {})", update.from);
    }
    lines.push(line);

    if let Some(event) = &update.event {
        lines.push(format!(
            "FALL peak={:.2}g trough={:.2}g duration={}ms emergency={}",
            event.max_acceleration,
            event.min_acceleration,
            event.duration.as_millis(),
            event.is_emergency,
        ));
    }
    match sample.alert {
        Some(Ok(request)) => lines.push(format!("alert {}", describe_request(request))),
        Some(Err(error)) => lines.push(format!("ERR alert {}", describe_alert_error(error))),
        None => {}
    }
}

fn describe_request(request: AlertRequest) -> String {
    match request {
        AlertRequest::Started => "started".to_string(),
        AlertRequest::Queued { position } => format!("queued at {position}"),
        AlertRequest::PreEmpted {
            interrupted: Some(pattern),
        } => format!("pre-empted {pattern}"),
        AlertRequest::PreEmpted { interrupted: None } => "started (emergency)".to_string(),
    }
}

fn describe_alert_error(error: AlertError) -> &'static str {
    match error {
        AlertError::QueueFull => "queue-full",
        AlertError::NotPlaying => "not-playing",
        AlertError::NotPaused => "not-paused",
        AlertError::InvalidTiming => "invalid-timing",
        AlertError::OutOfRange => "out-of-range",
    }
}

fn describe_tick_event(event: TickEvent) -> String {
    match event {
        TickEvent::Started(pattern) => format!("pattern {pattern} started"),
        TickEvent::Completed(pattern) => format!("pattern {pattern} complete"),
        TickEvent::ScheduledFired(pattern) => format!("scheduled {pattern} fired"),
        TickEvent::ScheduledDropped(pattern) => format!("scheduled {pattern} dropped (queue full)"),
    }
}

fn describe_self_test(report: SelfTestReport) -> String {
    if report.passed() {
        "OK selftest pass".to_string()
    } else {
        format!(
            "ERR selftest detection={} false-alarm-rejected={} cooldown={}",
            report.detection, report.false_alarm_rejected, report.cooldown_enforced
        )
    }
}

fn describe_calibration(proposal: &CalibrationProposal) -> String {
    format!(
        "OK calibrated baseline={:.2}g spread={:.3}g low={:.2}g high={:.2}g",
        proposal.baseline_g,
        proposal.spread_g,
        proposal.thresholds.low_g,
        proposal.thresholds.high_g
    )
}

fn describe_help(topic: Option<&'static CommandSpec>, lines: &mut Vec<String>) {
    match topic {
        Some(spec) => {
            lines.push(spec.usage.to_string());
            lines.push(format!("  {}", spec.summary));
        }
        None => {
            lines.push("Available commands:".to_string());
            let width = COMMANDS.iter().map(|spec| spec.name.len()).max().unwrap_or(0);
            for spec in &COMMANDS {
                lines.push(format!("  {:<width$}  {}", spec.name, spec.summary));
            }
            lines.push("Type `help <topic>` for usage.".to_string());
        }
    }
}

fn format_duration_short(duration: Duration) -> String {
    if duration.as_secs() == 0 {
        format!("{}ms", duration.as_millis())
    } else {
        format!("{:.3}s", duration.as_secs_f64())
    }
}

struct TranscriptLogger {
    writer: Box<dyn Write>,
}

impl TranscriptLogger {
    fn create(profile: TranscriptProfile) -> io::Result<Self> {
        let path = Path::new(profile.log_path());
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;

        let mut logger = Self {
            writer: Box::new(BufWriter::new(file)),
        };
        logger.write_header(profile)?;
        Ok(logger)
    }

    #[cfg(test)]
    fn discard() -> Self {
        Self {
            writer: Box::new(io::sink()),
        }
    }

    fn write_header(&mut self, profile: TranscriptProfile) -> io::Result<()> {
        writeln!(self.writer, "# {}", profile.header())?;
        writeln!(
            self.writer,
            "# Timestamps are simulated milliseconds since session start"
        )?;
        writeln!(self.writer)?;
        self.writer.flush()
    }

    fn append_line(
        &mut self,
        elapsed: Duration,
        role: TranscriptRole,
        line: &str,
    ) -> io::Result<()> {
        writeln!(
            self.writer,
            "[+{:>6} ms] {} {}",
            elapsed.as_millis(),
            role.prefix(),
            line
        )?;
        self.writer.flush()
    }
}

enum TranscriptRole {
    Host,
    Emulator,
}

impl TranscriptRole {
    fn prefix(&self) -> &'static str {
        match self {
            TranscriptRole::Host => "HOST>",
            TranscriptRole::Emulator => "EMU <",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(session: &mut Session, line: &str) -> Vec<String> {
        session.handle_command(line).expect("in-memory transcript")
    }

    #[test]
    fn wait_advances_the_simulated_clock_and_reports_edges() {
        let mut session = Session::detached();
        let started = run(&mut session, "beep");
        assert_eq!(started, vec!["OK started", "buzzer ON"]);

        let waited = run(&mut session, "wait 1s");
        assert_eq!(session.elapsed(), Duration::from_secs(1));
        assert_eq!(
            waited,
            vec![
                "[+300ms] pattern single complete",
                "[+300ms] buzzer off",
                "OK waited 1.000s",
            ]
        );
        assert!(session.controller().alerts().is_idle());
    }

    #[test]
    fn fall_is_narrated() {
        let mut session = Session::detached();
        run(&mut session, "sample 1g");
        run(&mut session, "wait 50ms");
        run(&mut session, "sample 0.2g");
        run(&mut session, "wait 100ms");
        let lines = run(&mut session, "sample 3g");
        assert_eq!(lines[0], "OK cooldown filtered=3.00g (from low-g)");
        assert!(lines[1].starts_with("FALL peak=3.00g trough=0.20g duration=100ms"));
        assert_eq!(lines[2], "alert started");
        assert_eq!(lines[3], "buzzer ON");
    }

    #[test]
    fn hard_fall_reports_emergency() {
        let mut session = Session::detached();
        run(&mut session, "sample 0.1g");
        run(&mut session, "wait 50ms");
        let lines = run(&mut session, "sample 4.5g");
        assert!(lines.iter().any(|line| line.starts_with("EMERGENCY raised")));
    }

    #[test]
    fn errors_and_help_render() {
        let mut session = Session::detached();
        let lines = run(&mut session, "pause");
        assert_eq!(lines, vec!["ERR no pattern is playing"]);

        let lines = run(&mut session, "help");
        assert_eq!(lines.len(), COMMANDS.len() + 2);

        let lines = run(&mut session, "help timing");
        assert_eq!(lines[0], "timing <window> <cooldown>");
    }

    #[test]
    fn profiles_parse_case_insensitively() {
        assert_eq!(
            TranscriptProfile::from_tag("FALL"),
            Ok(TranscriptProfile::Fall)
        );
        assert!(TranscriptProfile::from_tag("reboot").is_err());
    }
}
