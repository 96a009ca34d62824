//! High-level REPL command dispatcher.
//!
//! This module glues parsed commands to a [`SafetyController`]. Commands that
//! need the front-end's cooperation (`wait`, `help`) are returned as outcomes
//! rather than executed here. It stays `no_std` friendly so the firmware and
//! emulator crates can share the same implementation.

use core::fmt;
use core::time::Duration;

use crate::alert::{AlertError, AlertOutput, AlertPattern, AlertRequest, CustomPattern};
use crate::controller::{SafetyController, SampleOutcome};
use crate::fall::{
    AccelerationSample, CalibrationError, CalibrationProposal, ConfigError, FallEventSink,
    SampleError, SelfTestReport,
};
use crate::time::Instant;

use super::catalog::{self, CommandSpec};
use super::grammar::{
    self, BeepCommand, Command, CustomBeep, FallCommand, ParseError, ScheduleCommand,
};
use super::status::StatusSnapshot;

/// Command execution successes.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum CommandOutcome {
    Status(StatusSnapshot),
    Sample(SampleOutcome),
    Alert(AlertRequest),
    /// Both halves of the sound check were accepted.
    SoundCheck,
    Scheduled {
        due: Instant,
        replaced: Option<AlertPattern>,
    },
    ScheduleCancelled(bool),
    Paused,
    Resumed,
    Stopped(Option<AlertPattern>),
    StoppedAll,
    Cleared(usize),
    EmergencyMode(bool),
    FallReset,
    Simulated(Option<SampleOutcome>),
    SelfTest(SelfTestReport),
    CalibrationStarted,
    Calibrated(CalibrationProposal),
    CalibrationCancelled(bool),
    Configured,
    /// The front-end should advance its clock by this much, ticking as it goes.
    Wait(Duration),
    /// `None` lists every command.
    Help(Option<&'static CommandSpec>),
}

/// Errors surfaced while executing a command.
#[derive(Clone, Debug, PartialEq)]
pub enum CommandError<'a> {
    Parse(ParseError<'a>),
    Sample(SampleError),
    Alert(AlertError),
    Config(ConfigError),
    Calibration(CalibrationError),
    UnknownTopic(&'a str),
}

impl fmt::Display for CommandError<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandError::Parse(err) => err.fmt(f),
            CommandError::Sample(err) => write!(f, "sample rejected: {err}"),
            CommandError::Alert(err) => err.fmt(f),
            CommandError::Config(err) => write!(f, "invalid configuration: {err}"),
            CommandError::Calibration(err) => write!(f, "calibration failed: {err}"),
            CommandError::UnknownTopic(topic) => write!(f, "no help for `{topic}`"),
        }
    }
}

impl<'a> From<ParseError<'a>> for CommandError<'a> {
    fn from(error: ParseError<'a>) -> Self {
        Self::Parse(error)
    }
}

impl From<SampleError> for CommandError<'_> {
    fn from(error: SampleError) -> Self {
        Self::Sample(error)
    }
}

impl From<AlertError> for CommandError<'_> {
    fn from(error: AlertError) -> Self {
        Self::Alert(error)
    }
}

impl From<ConfigError> for CommandError<'_> {
    fn from(error: ConfigError) -> Self {
        Self::Config(error)
    }
}

impl From<CalibrationError> for CommandError<'_> {
    fn from(error: CalibrationError) -> Self {
        Self::Calibration(error)
    }
}

type CommandResult<'a> = Result<CommandOutcome, CommandError<'a>>;

/// Dispatches REPL commands onto a controller.
pub struct CommandExecutor<O, S> {
    controller: SafetyController<O, S>,
}

impl<O, S> CommandExecutor<O, S> {
    /// Creates a new executor around the provided controller.
    pub const fn new(controller: SafetyController<O, S>) -> Self {
        Self { controller }
    }

    /// Returns an immutable reference to the underlying controller.
    pub fn controller(&self) -> &SafetyController<O, S> {
        &self.controller
    }

    /// Returns a mutable reference to the underlying controller.
    pub fn controller_mut(&mut self) -> &mut SafetyController<O, S> {
        &mut self.controller
    }

    /// Consumes the executor and yields the inner controller.
    pub fn into_inner(self) -> SafetyController<O, S> {
        self.controller
    }
}

impl<O: AlertOutput, S: FallEventSink> CommandExecutor<O, S> {
    /// Parses and executes a REPL command at `now`.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError`] for parse failures and for any rejection by
    /// the detector or orchestrator; rejected commands change nothing.
    pub fn execute<'a>(&mut self, line: &'a str, now: Instant) -> CommandResult<'a> {
        let command = grammar::parse(line)?;
        self.dispatch(command, now)
    }

    /// Executes an already parsed command.
    ///
    /// # Errors
    ///
    /// See [`CommandExecutor::execute`].
    pub fn dispatch<'a>(&mut self, command: Command<'a>, now: Instant) -> CommandResult<'a> {
        let controller = &mut self.controller;
        match command {
            Command::Status => Ok(CommandOutcome::Status(StatusSnapshot::capture(
                controller, now,
            ))),
            Command::Sample(magnitude) => {
                let outcome = controller.on_sample(AccelerationSample::new(magnitude, now))?;
                Ok(CommandOutcome::Sample(outcome))
            }
            Command::Beep(beep) => self.handle_beep(beep, now),
            Command::Alert(pattern) => Ok(CommandOutcome::Alert(
                controller.request_alert(pattern, now)?,
            )),
            Command::Test => {
                controller.request_sound_check(now)?;
                Ok(CommandOutcome::SoundCheck)
            }
            Command::Schedule(ScheduleCommand::After { delay, pattern }) => {
                let replaced = controller
                    .alerts_mut()
                    .schedule_beep(delay, pattern, now)?
                    .map(|previous| previous.pattern);
                Ok(CommandOutcome::Scheduled {
                    due: now + delay,
                    replaced,
                })
            }
            Command::Schedule(ScheduleCommand::Cancel) => Ok(CommandOutcome::ScheduleCancelled(
                controller.alerts_mut().cancel_scheduled_beep(),
            )),
            Command::Pause => {
                controller.alerts_mut().pause(now)?;
                Ok(CommandOutcome::Paused)
            }
            Command::Resume => {
                controller.alerts_mut().resume(now)?;
                Ok(CommandOutcome::Resumed)
            }
            Command::Stop { all: false } => Ok(CommandOutcome::Stopped(
                controller.alerts_mut().stop_pattern(),
            )),
            Command::Stop { all: true } => {
                controller.alerts_mut().stop();
                Ok(CommandOutcome::StoppedAll)
            }
            Command::Clear => Ok(CommandOutcome::Cleared(
                controller.alerts_mut().clear_queue(),
            )),
            Command::EmergencyMode(enabled) => {
                controller.alerts_mut().set_emergency_mode(enabled);
                Ok(CommandOutcome::EmergencyMode(enabled))
            }
            Command::Fall(action) => self.handle_fall(action, now),
            Command::Thresholds { low_g, high_g } => {
                controller.detector_mut().set_thresholds(low_g, high_g)?;
                Ok(CommandOutcome::Configured)
            }
            Command::Timing { window, cooldown } => {
                controller.detector_mut().set_timing(window, cooldown)?;
                Ok(CommandOutcome::Configured)
            }
            Command::Smoothing(window) => {
                controller
                    .detector_mut()
                    .set_smoothing_window(usize::from(window))?;
                Ok(CommandOutcome::Configured)
            }
            Command::Wait(duration) => Ok(CommandOutcome::Wait(duration)),
            Command::Help(help) => match help.topic {
                None => Ok(CommandOutcome::Help(None)),
                Some(topic) => catalog::find(topic)
                    .map(|spec| CommandOutcome::Help(Some(spec)))
                    .ok_or(CommandError::UnknownTopic(topic)),
            },
        }
    }

    fn handle_beep<'a>(&mut self, beep: BeepCommand, now: Instant) -> CommandResult<'a> {
        let request = match beep {
            BeepCommand::Pattern(pattern) => self.controller.request_alert(pattern, now)?,
            BeepCommand::For(on) => {
                let custom = CustomPattern::new(on, Duration::ZERO, 1, Duration::ZERO)?;
                self.controller.request_custom(custom, now)?
            }
            BeepCommand::Custom(CustomBeep {
                on,
                off,
                repeat,
                pause,
            }) => {
                let current = *self.controller.alerts().custom_pattern();
                let custom = CustomPattern::new(
                    on,
                    off,
                    repeat.unwrap_or(1),
                    pause.unwrap_or(current.pause()),
                )?;
                self.controller.request_custom(custom, now)?
            }
        };
        Ok(CommandOutcome::Alert(request))
    }

    fn handle_fall<'a>(&mut self, action: FallCommand, now: Instant) -> CommandResult<'a> {
        let controller = &mut self.controller;
        match action {
            FallCommand::Reset => {
                controller.detector_mut().reset();
                Ok(CommandOutcome::FallReset)
            }
            FallCommand::Simulate => Ok(CommandOutcome::Simulated(controller.simulate_fall(now))),
            FallCommand::SelfTest => Ok(CommandOutcome::SelfTest(
                controller.detector().run_self_test(),
            )),
            FallCommand::Calibrate => {
                controller.detector_mut().begin_calibration();
                Ok(CommandOutcome::CalibrationStarted)
            }
            FallCommand::Commit => Ok(CommandOutcome::Calibrated(
                controller.commit_calibration(now)?,
            )),
            FallCommand::Cancel => Ok(CommandOutcome::CalibrationCancelled(
                controller.detector_mut().cancel_calibration(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::{BuzzerState, QUEUE_CAPACITY};
    use crate::fall::{FallDetectionState, FallDetectorConfig};
    use crate::telemetry::TelemetryEventKind;

    fn executor() -> CommandExecutor<crate::alert::NoopAlertOutput, crate::fall::NoopFallSink> {
        CommandExecutor::new(SafetyController::new(FallDetectorConfig::DEFAULT))
    }

    fn at(millis: u32) -> Instant {
        Instant::from_millis(millis)
    }

    #[test]
    fn samples_drive_detection_and_alerting() {
        let mut executor = executor();
        executor.execute("sample 1g", at(0)).expect("accepted");
        executor.execute("sample 0.2g", at(50)).expect("accepted");
        let outcome = executor.execute("sample 3.0", at(150)).expect("accepted");

        match outcome {
            CommandOutcome::Sample(SampleOutcome { update, alert }) => {
                assert!(update.fall_detected());
                assert_eq!(alert, Some(Ok(AlertRequest::Started)));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(
            executor.controller().detector().state(),
            FallDetectionState::Cooldown
        );
    }

    #[test]
    fn out_of_order_sample_is_rejected() {
        let mut executor = executor();
        executor.execute("sample 1g", at(100)).expect("accepted");
        assert_eq!(
            executor.execute("sample 1g", at(50)),
            Err(CommandError::Sample(SampleError::TimestampRegressed))
        );
    }

    #[test]
    fn beep_requests_queue_behind_playback() {
        let mut executor = executor();
        assert_eq!(
            executor.execute("beep double", at(0)),
            Ok(CommandOutcome::Alert(AlertRequest::Started))
        );
        assert_eq!(
            executor.execute("beep custom 100ms 50ms repeat=2", at(10)),
            Ok(CommandOutcome::Alert(AlertRequest::Queued { position: 1 }))
        );
        let custom = executor.controller().alerts().custom_pattern();
        assert_eq!(custom.repeat(), 2);
        assert_eq!(custom.beat().on, Duration::from_millis(100));
    }

    #[test]
    fn invalid_custom_timing_is_reported() {
        let mut executor = executor();
        assert_eq!(
            executor.execute("beep custom 0ms 50ms", at(0)),
            Err(CommandError::Alert(AlertError::InvalidTiming))
        );
        assert!(executor.controller().alerts().is_idle());
    }

    #[test]
    fn pause_requires_playback() {
        let mut executor = executor();
        assert_eq!(
            executor.execute("pause", at(0)),
            Err(CommandError::Alert(AlertError::NotPlaying))
        );
        executor.execute("beep long", at(0)).expect("started");
        assert_eq!(executor.execute("pause", at(100)), Ok(CommandOutcome::Paused));
        assert_eq!(
            executor.controller().alerts().state(),
            BuzzerState::Paused
        );
        assert_eq!(executor.execute("resume", at(500)), Ok(CommandOutcome::Resumed));
    }

    #[test]
    fn emergency_mode_switch_stops_emergency_playback() {
        let mut executor = executor();
        executor.execute("alert emergency", at(0)).expect("pre-empts");
        assert_eq!(
            executor.controller().alerts().state(),
            BuzzerState::Emergency
        );
        executor
            .execute("emergency-mode off", at(100))
            .expect("applied");
        assert!(executor.controller().alerts().is_idle());
    }

    #[test]
    fn durations_beyond_the_clock_range_are_refused() {
        let mut executor = executor();
        assert_eq!(
            executor.execute("schedule 3000000s single", at(0)),
            Err(CommandError::Alert(AlertError::OutOfRange))
        );
        assert!(!executor.controller().alerts().has_scheduled_beep());

        assert_eq!(
            executor.execute("timing 300ms 5000000s", at(0)),
            Err(CommandError::Config(ConfigError::TimingOutOfRange))
        );
        assert_eq!(
            executor.controller().detector().config().timing,
            crate::fall::DetectionTiming::DEFAULT
        );
    }

    #[test]
    fn sound_check_is_refused_whole_when_the_queue_is_short() {
        let mut executor = executor();
        executor.execute("beep long", at(0)).expect("started");
        for _ in 0..QUEUE_CAPACITY - 1 {
            executor.execute("beep double", at(0)).expect("queued");
        }

        assert_eq!(
            executor.execute("test", at(10)),
            Err(CommandError::Alert(AlertError::QueueFull))
        );
        assert_eq!(executor.controller().alerts().queue_len(), QUEUE_CAPACITY - 1);

        executor.execute("stop all", at(20)).expect("stopped");
        assert_eq!(executor.execute("test", at(30)), Ok(CommandOutcome::SoundCheck));
        assert_eq!(executor.controller().alerts().queue_len(), 1);
    }

    #[test]
    fn schedule_reports_due_time_and_replacement() {
        let mut executor = executor();
        assert_eq!(
            executor.execute("schedule 2s single", at(100)),
            Ok(CommandOutcome::Scheduled {
                due: at(2_100),
                replaced: None,
            })
        );
        assert_eq!(
            executor.execute("schedule 500ms error", at(200)),
            Ok(CommandOutcome::Scheduled {
                due: at(700),
                replaced: Some(AlertPattern::Single),
            })
        );
        assert_eq!(
            executor.execute("schedule cancel", at(300)),
            Ok(CommandOutcome::ScheduleCancelled(true))
        );
    }

    #[test]
    fn invalid_thresholds_leave_configuration_untouched() {
        let mut executor = executor();
        assert!(matches!(
            executor.execute("thresholds 3g 1g", at(0)),
            Err(CommandError::Config(_))
        ));
        assert_eq!(
            executor.controller().detector().config().thresholds,
            FallDetectorConfig::DEFAULT.thresholds
        );
        assert_eq!(
            executor.execute("timing 200ms 2s", at(0)),
            Ok(CommandOutcome::Configured)
        );
        assert_eq!(
            executor.controller().detector().config().timing.cooldown,
            Duration::from_secs(2)
        );
    }

    #[test]
    fn calibration_round_trip_through_commands() {
        let mut executor = executor();
        assert_eq!(
            executor.execute("fall commit", at(0)),
            Err(CommandError::Calibration(CalibrationError::NotCalibrating))
        );
        executor.execute("fall calibrate", at(0)).expect("started");
        for step in 0..30 {
            executor
                .execute("sample 1.0g", at(step * 10))
                .expect("accepted");
        }
        match executor.execute("fall commit", at(400)) {
            Ok(CommandOutcome::Calibrated(proposal)) => {
                assert!((proposal.baseline_g - 1.0).abs() < 1e-3);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(
            executor
                .controller()
                .telemetry()
                .latest()
                .map(|record| record.event),
            Some(TelemetryEventKind::CalibrationCommitted)
        );
    }

    #[test]
    fn simulate_and_selftest() {
        let mut executor = executor();
        match executor.execute("fall selftest", at(0)) {
            Ok(CommandOutcome::SelfTest(report)) => assert!(report.passed()),
            other => panic!("unexpected outcome: {other:?}"),
        }
        match executor.execute("fall simulate", at(0)) {
            Ok(CommandOutcome::Simulated(Some(outcome))) => {
                assert!(outcome.update.event.is_some_and(|event| event.simulated));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(executor.controller().detector().fall_count(), 1);
    }

    #[test]
    fn help_resolves_topics() {
        let mut executor = executor();
        assert_eq!(
            executor.execute("help", at(0)),
            Ok(CommandOutcome::Help(None))
        );
        match executor.execute("help Timing", at(0)) {
            Ok(CommandOutcome::Help(Some(spec))) => assert_eq!(spec.name, "timing"),
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(
            executor.execute("help reboot", at(0)),
            Err(CommandError::UnknownTopic("reboot"))
        );
    }

    #[test]
    fn parse_error_is_returned() {
        let mut executor = executor();
        assert!(matches!(
            executor.execute("beep loudly", at(0)),
            Err(CommandError::Parse(_))
        ));
    }
}
