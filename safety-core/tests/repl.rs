use core::fmt::Write as _;
use core::time::Duration;

use safety_core::alert::{AlertPattern, AlertRequest, BuzzerState, NoopAlertOutput};
use safety_core::controller::SafetyController;
use safety_core::fall::{FallDetectionState, FallDetectorConfig, NoopFallSink};
use safety_core::repl::catalog::COMMANDS;
use safety_core::repl::grammar;
use safety_core::repl::{CommandError, CommandExecutor, CommandOutcome, StatusFormatter};
use safety_core::time::Instant;

const TICK: Duration = Duration::from_millis(10);

/// Minimal front-end: owns the clock and turns `wait` into ticks.
struct Session {
    executor: CommandExecutor<NoopAlertOutput, NoopFallSink>,
    now: Instant,
}

impl Session {
    fn new() -> Self {
        Self {
            executor: CommandExecutor::new(SafetyController::new(FallDetectorConfig::DEFAULT)),
            now: Instant::ZERO,
        }
    }

    fn run<'a>(&mut self, line: &'a str) -> Result<CommandOutcome, CommandError<'a>> {
        let outcome = self.executor.execute(line, self.now)?;
        if let CommandOutcome::Wait(duration) = outcome {
            let deadline = self.now + duration;
            while !self.now.has_reached(deadline) {
                self.now = self.now + TICK;
                self.executor.controller_mut().tick(self.now);
            }
        }
        Ok(outcome)
    }

    fn status(&mut self) -> String {
        let Ok(CommandOutcome::Status(snapshot)) = self.run("status") else {
            panic!("status should succeed");
        };
        let formatter = StatusFormatter::new(&snapshot);
        let mut text = String::new();
        formatter.write_detector_line(&mut text).expect("format");
        text.push('\n');
        formatter.write_alert_line(&mut text).expect("format");
        text.push('\n');
        formatter.write_last_fall_line(&mut text).expect("format");
        text
    }
}

#[test]
fn scripted_fall_session() {
    let mut session = Session::new();
    session.run("sample 1.0g").expect("sample");
    session.run("wait 50ms").expect("wait");
    session.run("sample 0.2g").expect("sample");
    session.run("wait 100ms").expect("wait");
    match session.run("sample 3g") {
        Ok(CommandOutcome::Sample(outcome)) => {
            assert_eq!(outcome.alert, Some(Ok(AlertRequest::Started)));
        }
        other => panic!("unexpected outcome: {other:?}"),
    }

    session.run("wait 200ms").expect("wait");
    let status = session.status();
    assert!(status.contains("state=cooldown"), "{status}");
    assert!(status.contains("pattern=warning"), "{status}");
    assert!(status.contains("last-fall age=+200ms"), "{status}");

    session.run("wait 2s").expect("wait");
    assert!(session.executor.controller().alerts().is_idle());
    session.run("sample 1g").expect("sample");
    assert_eq!(
        session.executor.controller().detector().state(),
        FallDetectionState::Normal
    );
}

#[test]
fn operator_controls_playback() {
    let mut session = Session::new();
    session.run("beep long").expect("beep");
    session.run("beep triple").expect("queued");
    session.run("wait 300ms").expect("wait");
    session.run("pause").expect("pause");
    session.run("wait 1s").expect("wait");
    assert_eq!(
        session.executor.controller().alerts().state(),
        BuzzerState::Paused
    );
    session.run("resume").expect("resume");
    assert_eq!(session.run("clear"), Ok(CommandOutcome::Cleared(1)));
    assert_eq!(
        session.run("stop"),
        Ok(CommandOutcome::Stopped(Some(AlertPattern::Long)))
    );
    assert!(session.executor.controller().alerts().is_idle());
}

#[test]
fn scheduled_and_emergency_commands() {
    let mut session = Session::new();
    session.run("schedule 250ms success").expect("schedule");
    session.run("wait 240ms").expect("wait");
    assert!(session.executor.controller().alerts().is_idle());
    session.run("wait 10ms").expect("wait");
    assert_eq!(
        session.executor.controller().alerts().current_pattern(),
        Some(AlertPattern::Success)
    );

    session.run("alert sos").expect("pre-empts");
    assert_eq!(
        session.executor.controller().alerts().state(),
        BuzzerState::Emergency
    );
    session.run("stop all").expect("stop");
    assert!(session.executor.controller().alerts().is_idle());
}

#[test]
fn configuration_commands_reach_the_detector() {
    let mut session = Session::new();
    session.run("thresholds 0.4g 2.5g").expect("thresholds");
    session.run("timing 400ms 1500ms").expect("timing");
    session.run("smoothing 3").expect("smoothing");
    session.run("emergency-mode off").expect("mode");

    let status = session.status();
    assert!(
        status.starts_with(
            "detector state=normal filtered=n/a low=0.40g high=2.50g window=400ms \
             cooldown=1500ms smoothing=3 falls=0"
        ),
        "{status}"
    );
    assert!(status.contains("emergency-mode=off"), "{status}");

    assert!(matches!(
        session.run("smoothing 0"),
        Err(CommandError::Config(_))
    ));
}

#[test]
fn every_catalog_entry_parses_from_its_usage_example() {
    let examples = [
        "status",
        "sample 1g",
        "beep",
        "alert warning",
        "schedule 1s single",
        "pause",
        "resume",
        "stop all",
        "clear",
        "emergency-mode on",
        "fall selftest",
        "thresholds 0.3 2.8",
        "timing 300ms 1s",
        "smoothing 2",
        "test",
        "wait 10ms",
        "help",
    ];
    assert_eq!(examples.len(), COMMANDS.len());
    for (spec, example) in COMMANDS.iter().zip(examples) {
        assert!(example.starts_with(spec.name), "{example} vs {}", spec.name);
        assert!(grammar::parse(example).is_ok(), "{example} should parse");
    }
}

#[test]
fn errors_render_for_operators() {
    let mut session = Session::new();
    let mut text = String::new();
    let error = session.run("beep custom 0ms 10ms").expect_err("invalid timing");
    write!(text, "{error}").expect("format");
    assert!(!text.is_empty());

    let error = session.run("frobnicate").expect_err("unknown command");
    assert!(matches!(error, CommandError::Parse(_)));
}
