//! Alert orchestration for the audible output device.
//!
//! [`AlertOrchestrator`] plays one pattern at a time, queues further requests
//! in arrival order, lets emergency-class patterns pre-empt everything else,
//! and holds a single deferred ("scheduled") beep. It never blocks: callers
//! invoke [`AlertOrchestrator::update`] with the current time and the
//! orchestrator toggles the bound [`AlertOutput`] at phase boundaries.

use core::fmt;
use core::time::Duration;

use heapless::{Deque, Vec};

use crate::time::{Instant, fits_clock_span};

pub mod patterns;
mod playback;

pub use patterns::{
    AlertPattern, BEEP_DURATION, Beat, CustomPattern, EMERGENCY_BEEP_COUNT, PatternTiming,
    named_template, resolve,
};
pub use playback::{Position, Step};

use playback::Playback;

/// Pending requests held while another pattern plays.
pub const QUEUE_CAPACITY: usize = 8;
/// Upper bound on phase boundaries processed by a single `update`.
const MAX_PHASES_PER_UPDATE: usize = 32;
/// Upper bound on events reported by a single `update`.
pub const MAX_TICK_EVENTS: usize = 4;

/// Physical alert device.
pub trait AlertOutput {
    /// Switches the device on or off.
    fn set_active(&mut self, active: bool);

    fn set_frequency(&mut self, hz: u16) {
        let _ = hz;
    }

    fn set_volume(&mut self, level: u8) {
        let _ = level;
    }
}

impl<T: AlertOutput + ?Sized> AlertOutput for &mut T {
    fn set_active(&mut self, active: bool) {
        (**self).set_active(active);
    }

    fn set_frequency(&mut self, hz: u16) {
        (**self).set_frequency(hz);
    }

    fn set_volume(&mut self, level: u8) {
        (**self).set_volume(level);
    }
}

/// Output that discards every command.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoopAlertOutput;

impl AlertOutput for NoopAlertOutput {
    fn set_active(&mut self, _active: bool) {}
}

/// Orchestrator state.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum BuzzerState {
    Idle,
    Playing,
    Paused,
    Emergency,
}

impl BuzzerState {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            BuzzerState::Idle => "idle",
            BuzzerState::Playing => "playing",
            BuzzerState::Paused => "paused",
            BuzzerState::Emergency => "emergency",
        }
    }
}

impl fmt::Display for BuzzerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Errors returned by orchestrator requests.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum AlertError {
    QueueFull,
    NotPlaying,
    NotPaused,
    InvalidTiming,
    /// A duration is too long for the wrapping clock to time.
    OutOfRange,
}

impl fmt::Display for AlertError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertError::QueueFull => write!(f, "alert queue full ({QUEUE_CAPACITY} pending)"),
            AlertError::NotPlaying => f.write_str("no pattern is playing"),
            AlertError::NotPaused => f.write_str("playback is not paused"),
            AlertError::InvalidTiming => f.write_str("pattern needs a non-zero on time and repeat"),
            AlertError::OutOfRange => f.write_str("duration exceeds the clock range"),
        }
    }
}

/// How a request was accepted.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum AlertRequest {
    Started,
    Queued { position: usize },
    /// An emergency-class pattern replaced whatever was playing.
    PreEmpted { interrupted: Option<AlertPattern> },
}

/// Deferred request fired by [`AlertOrchestrator::update`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ScheduledBeep {
    pub due: Instant,
    pub pattern: AlertPattern,
}

/// Something observable that happened during an update.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TickEvent {
    Started(AlertPattern),
    Completed(AlertPattern),
    ScheduledFired(AlertPattern),
    /// The scheduled beep came due while the queue was full.
    ScheduledDropped(AlertPattern),
}

/// Events produced by one [`AlertOrchestrator::update`] call.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct TickEvents {
    events: Vec<TickEvent, MAX_TICK_EVENTS>,
}

impl TickEvents {
    #[must_use]
    pub const fn new() -> Self {
        Self { events: Vec::new() }
    }

    fn push(&mut self, event: TickEvent) {
        // Capacity covers the worst case of one fire, one completion and one start.
        let _ = self.events.push(event);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    #[must_use]
    pub fn contains(&self, event: &TickEvent) -> bool {
        self.events.contains(event)
    }

    pub fn iter(&self) -> core::slice::Iter<'_, TickEvent> {
        self.events.iter()
    }
}

impl<'a> IntoIterator for &'a TickEvents {
    type Item = &'a TickEvent;
    type IntoIter = core::slice::Iter<'a, TickEvent>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Pattern scheduler driving a binary alert output.
pub struct AlertOrchestrator<O = NoopAlertOutput> {
    state: BuzzerState,
    playback: Option<Playback>,
    /// Time left in the current phase while paused.
    paused_remaining: Duration,
    queue: Deque<AlertPattern, QUEUE_CAPACITY>,
    scheduled: Option<ScheduledBeep>,
    emergency_mode: bool,
    custom: CustomPattern,
    output: Option<O>,
    output_on: bool,
    frequency_hz: Option<u16>,
    volume: Option<u8>,
}

impl<O> Default for AlertOrchestrator<O> {
    fn default() -> Self {
        Self::new()
    }
}

impl<O> AlertOrchestrator<O> {
    /// Creates an idle orchestrator with emergency mode enabled and no output bound.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: BuzzerState::Idle,
            playback: None,
            paused_remaining: Duration::ZERO,
            queue: Deque::new(),
            scheduled: None,
            emergency_mode: true,
            custom: CustomPattern::DEFAULT,
            output: None,
            output_on: false,
            frequency_hz: None,
            volume: None,
        }
    }

    #[must_use]
    pub const fn state(&self) -> BuzzerState {
        self.state
    }

    #[must_use]
    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    #[must_use]
    pub fn is_queue_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Iterates pending patterns in the order they will play.
    pub fn queued(&self) -> impl Iterator<Item = AlertPattern> + '_ {
        self.queue.iter().copied()
    }

    #[must_use]
    pub const fn is_playing(&self) -> bool {
        matches!(self.state, BuzzerState::Playing | BuzzerState::Emergency)
    }

    #[must_use]
    pub const fn is_idle(&self) -> bool {
        matches!(self.state, BuzzerState::Idle)
    }

    /// Logical output level; independent of whether a device is bound.
    #[must_use]
    pub const fn is_output_on(&self) -> bool {
        self.output_on
    }

    #[must_use]
    pub fn current_pattern(&self) -> Option<AlertPattern> {
        self.playback.as_ref().map(Playback::pattern)
    }

    /// Current phase of the playing pattern.
    #[must_use]
    pub fn current_position(&self) -> Option<Position> {
        self.playback.as_ref().map(Playback::position)
    }

    /// Next phase boundary, if a pattern is actively playing.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        match self.state {
            BuzzerState::Playing | BuzzerState::Emergency => {
                self.playback.as_ref().map(Playback::deadline)
            }
            BuzzerState::Idle | BuzzerState::Paused => None,
        }
    }

    #[must_use]
    pub const fn emergency_mode(&self) -> bool {
        self.emergency_mode
    }

    #[must_use]
    pub const fn custom_pattern(&self) -> &CustomPattern {
        &self.custom
    }

    #[must_use]
    pub const fn has_scheduled_beep(&self) -> bool {
        self.scheduled.is_some()
    }

    #[must_use]
    pub fn scheduled_beep(&self) -> Option<ScheduledBeep> {
        self.scheduled
    }

    /// When the scheduled beep will fire.
    #[must_use]
    pub fn next_beep_time(&self) -> Option<Instant> {
        self.scheduled.map(|scheduled| scheduled.due)
    }

    pub fn output(&self) -> Option<&O> {
        self.output.as_ref()
    }

    pub fn output_mut(&mut self) -> Option<&mut O> {
        self.output.as_mut()
    }
}

impl<O: AlertOutput> AlertOrchestrator<O> {
    /// Creates an orchestrator already bound to `output`.
    #[must_use]
    pub fn with_output(output: O) -> Self {
        let mut orchestrator = Self::new();
        orchestrator.bind_output(output);
        orchestrator
    }

    /// Binds a device, syncing it to the current level and settings.
    ///
    /// Returns the previously bound device.
    pub fn bind_output(&mut self, mut output: O) -> Option<O> {
        if let Some(hz) = self.frequency_hz {
            output.set_frequency(hz);
        }
        if let Some(level) = self.volume {
            output.set_volume(level);
        }
        output.set_active(self.output_on);
        self.output.replace(output)
    }

    /// Detaches the device; playback continues without physical effect.
    pub fn unbind_output(&mut self) -> Option<O> {
        let mut output = self.output.take()?;
        output.set_active(false);
        Some(output)
    }

    pub fn set_frequency(&mut self, hz: u16) {
        self.frequency_hz = Some(hz);
        if let Some(output) = self.output.as_mut() {
            output.set_frequency(hz);
        }
    }

    pub fn set_volume(&mut self, level: u8) {
        self.volume = Some(level);
        if let Some(output) = self.output.as_mut() {
            output.set_volume(level);
        }
    }

    fn drive(&mut self, on: bool) {
        if self.output_on == on {
            return;
        }
        self.output_on = on;
        if let Some(output) = self.output.as_mut() {
            output.set_active(on);
        }
    }

    /// Requests `pattern`.
    ///
    /// Emergency-class patterns pre-empt playback while emergency mode is
    /// enabled. Anything else starts immediately only when idle with an empty
    /// queue and is queued otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`AlertError::QueueFull`] when the request would have to wait
    /// and the queue is full; nothing is changed in that case.
    pub fn beep_pattern(
        &mut self,
        pattern: AlertPattern,
        now: Instant,
    ) -> Result<AlertRequest, AlertError> {
        if self.emergency_mode && pattern.is_emergency_class() {
            let interrupted = self.current_pattern();
            self.start(pattern, true, now);
            return Ok(AlertRequest::PreEmpted { interrupted });
        }

        if self.state == BuzzerState::Idle && self.queue.is_empty() {
            self.start(pattern, false, now);
            return Ok(AlertRequest::Started);
        }

        self.queue
            .push_back(pattern)
            .map_err(|_| AlertError::QueueFull)?;
        Ok(AlertRequest::Queued {
            position: self.queue.len(),
        })
    }

    /// Adds `pattern` behind any pending requests without starting it.
    ///
    /// # Errors
    ///
    /// Returns [`AlertError::QueueFull`] when the queue is full.
    pub fn enqueue(&mut self, pattern: AlertPattern) -> Result<usize, AlertError> {
        self.queue
            .push_back(pattern)
            .map_err(|_| AlertError::QueueFull)?;
        Ok(self.queue.len())
    }

    /// Plays a single standard beep.
    ///
    /// # Errors
    ///
    /// See [`AlertOrchestrator::beep_pattern`].
    pub fn beep(&mut self, now: Instant) -> Result<AlertRequest, AlertError> {
        self.beep_pattern(AlertPattern::Single, now)
    }

    /// Plays one beep of the given length through the custom pattern slot.
    ///
    /// # Errors
    ///
    /// Returns [`AlertError::InvalidTiming`] for a zero duration, otherwise see
    /// [`AlertOrchestrator::beep_pattern`].
    pub fn beep_for(&mut self, on: Duration, now: Instant) -> Result<AlertRequest, AlertError> {
        self.beep_custom(on, Duration::ZERO, 1, now)
    }

    /// Replaces the custom pattern and requests it.
    ///
    /// # Errors
    ///
    /// Returns [`AlertError::InvalidTiming`] for a zero `on` or `repeat`,
    /// otherwise see [`AlertOrchestrator::beep_pattern`].
    pub fn beep_custom(
        &mut self,
        on: Duration,
        off: Duration,
        repeat: u8,
        now: Instant,
    ) -> Result<AlertRequest, AlertError> {
        let custom = CustomPattern::new(on, off, repeat, self.custom.pause())?;
        self.play_custom(custom, now)
    }

    /// Installs `custom` as the custom pattern and requests it.
    ///
    /// # Errors
    ///
    /// Returns [`AlertError::QueueFull`] when the request would have to wait
    /// and the queue is full; the previous custom timing is kept in that case.
    pub fn play_custom(
        &mut self,
        custom: CustomPattern,
        now: Instant,
    ) -> Result<AlertRequest, AlertError> {
        let starts_now = self.state == BuzzerState::Idle && self.queue.is_empty();
        if !starts_now && self.queue.is_full() {
            return Err(AlertError::QueueFull);
        }
        // A queued custom request plays whatever custom timing is set when it starts.
        self.custom = custom;
        self.beep_pattern(AlertPattern::Custom, now)
    }

    /// Replaces the timing used by [`AlertPattern::Custom`].
    ///
    /// A custom pattern already playing keeps the timing it started with.
    pub fn set_custom_pattern(&mut self, custom: CustomPattern) {
        self.custom = custom;
    }

    /// # Errors
    ///
    /// See [`AlertOrchestrator::beep_pattern`].
    pub fn emergency_alert(&mut self, now: Instant) -> Result<AlertRequest, AlertError> {
        self.beep_pattern(AlertPattern::Emergency, now)
    }

    /// # Errors
    ///
    /// See [`AlertOrchestrator::beep_pattern`].
    pub fn sos_alert(&mut self, now: Instant) -> Result<AlertRequest, AlertError> {
        self.beep_pattern(AlertPattern::Sos, now)
    }

    /// # Errors
    ///
    /// See [`AlertOrchestrator::beep_pattern`].
    pub fn warning_alert(&mut self, now: Instant) -> Result<AlertRequest, AlertError> {
        self.beep_pattern(AlertPattern::Warning, now)
    }

    /// # Errors
    ///
    /// See [`AlertOrchestrator::beep_pattern`].
    pub fn success_alert(&mut self, now: Instant) -> Result<AlertRequest, AlertError> {
        self.beep_pattern(AlertPattern::Success, now)
    }

    /// # Errors
    ///
    /// See [`AlertOrchestrator::beep_pattern`].
    pub fn error_alert(&mut self, now: Instant) -> Result<AlertRequest, AlertError> {
        self.beep_pattern(AlertPattern::Error, now)
    }

    /// Sound check: a single beep followed by the success chime.
    ///
    /// # Errors
    ///
    /// Returns [`AlertError::QueueFull`] unless both requests fit; nothing is
    /// requested in that case.
    pub fn test(&mut self, now: Instant) -> Result<(), AlertError> {
        if !self.has_room_for(2) {
            return Err(AlertError::QueueFull);
        }
        self.beep_pattern(AlertPattern::Single, now)?;
        self.beep_pattern(AlertPattern::Success, now)?;
        Ok(())
    }

    /// Returns `true` if `requests` normal-priority patterns would all be accepted.
    #[must_use]
    pub fn has_room_for(&self, requests: usize) -> bool {
        let starts_now = usize::from(self.state == BuzzerState::Idle && self.queue.is_empty());
        self.queue.len() + requests.saturating_sub(starts_now) <= QUEUE_CAPACITY
    }

    fn start(&mut self, pattern: AlertPattern, looping: bool, now: Instant) {
        match Playback::start(pattern, self.custom, looping, now) {
            Some(playback) => {
                let on = playback.output_on();
                self.playback = Some(playback);
                self.state = if looping {
                    BuzzerState::Emergency
                } else {
                    BuzzerState::Playing
                };
                self.drive(on);
            }
            None => self.finish(),
        }
    }

    fn finish(&mut self) {
        self.playback = None;
        self.state = BuzzerState::Idle;
        self.paused_remaining = Duration::ZERO;
        self.drive(false);
    }

    /// Advances playback to `now`.
    ///
    /// Fires the scheduled beep once due, steps through elapsed phases, and
    /// starts the next queued pattern once idle.
    pub fn update(&mut self, now: Instant) -> TickEvents {
        let mut events = TickEvents::new();

        if let Some(scheduled) = self.scheduled
            && now.has_reached(scheduled.due)
        {
            self.scheduled = None;
            match self.beep_pattern(scheduled.pattern, now) {
                Ok(_) => events.push(TickEvent::ScheduledFired(scheduled.pattern)),
                Err(_) => events.push(TickEvent::ScheduledDropped(scheduled.pattern)),
            }
        }

        if matches!(self.state, BuzzerState::Playing | BuzzerState::Emergency) {
            self.advance_playback(now, &mut events);
        }

        if self.state == BuzzerState::Idle
            && let Some(next) = self.queue.pop_front()
        {
            self.start(next, self.emergency_mode && next.is_emergency_class(), now);
            events.push(TickEvent::Started(next));
        }

        events
    }

    fn advance_playback(&mut self, now: Instant, events: &mut TickEvents) {
        for _ in 0..MAX_PHASES_PER_UPDATE {
            let Some(playback) = self.playback.as_mut() else {
                return;
            };
            if !now.has_reached(playback.deadline()) {
                return;
            }

            if playback.advance() {
                let on = playback.output_on();
                self.drive(on);
            } else {
                let pattern = playback.pattern();
                self.finish();
                events.push(TickEvent::Completed(pattern));
                return;
            }
        }
    }

    /// Freezes the current phase; the output goes silent.
    ///
    /// # Errors
    ///
    /// Returns [`AlertError::NotPlaying`] unless a normal pattern is playing.
    pub fn pause(&mut self, now: Instant) -> Result<(), AlertError> {
        if self.state != BuzzerState::Playing {
            return Err(AlertError::NotPlaying);
        }
        let Some(playback) = self.playback.as_ref() else {
            return Err(AlertError::NotPlaying);
        };
        self.paused_remaining = if now.has_reached(playback.deadline()) {
            Duration::ZERO
        } else {
            playback.deadline().duration_since(now)
        };
        self.state = BuzzerState::Paused;
        self.drive(false);
        Ok(())
    }

    /// Continues a paused pattern with the time that was left in its phase.
    ///
    /// # Errors
    ///
    /// Returns [`AlertError::NotPaused`] unless paused.
    pub fn resume(&mut self, now: Instant) -> Result<(), AlertError> {
        if self.state != BuzzerState::Paused {
            return Err(AlertError::NotPaused);
        }
        let Some(playback) = self.playback.as_mut() else {
            return Err(AlertError::NotPaused);
        };
        playback.reschedule(now + self.paused_remaining);
        let on = playback.output_on();
        self.paused_remaining = Duration::ZERO;
        self.state = BuzzerState::Playing;
        self.drive(on);
        Ok(())
    }

    /// Ends the current pattern; queued requests resume on the next update.
    pub fn stop_pattern(&mut self) -> Option<AlertPattern> {
        let stopped = self.current_pattern();
        self.finish();
        stopped
    }

    /// Silences everything: current pattern, queue and scheduled beep.
    pub fn stop(&mut self) {
        self.finish();
        self.queue.clear();
        self.scheduled = None;
    }

    /// Drops pending requests and returns how many were dropped.
    pub fn clear_queue(&mut self) -> usize {
        let dropped = self.queue.len();
        self.queue.clear();
        dropped
    }

    /// Enables or disables emergency pre-emption.
    ///
    /// Disabling while an emergency pattern loops returns to idle.
    pub fn set_emergency_mode(&mut self, enabled: bool) {
        self.emergency_mode = enabled;
        if !enabled && self.state == BuzzerState::Emergency {
            self.finish();
        }
    }

    /// Schedules `pattern` to be requested once `delay` has passed.
    ///
    /// Replaces and returns any previously scheduled beep.
    ///
    /// # Errors
    ///
    /// Returns [`AlertError::OutOfRange`] when `delay` exceeds half the clock
    /// range; any existing schedule is kept.
    pub fn schedule_beep(
        &mut self,
        delay: Duration,
        pattern: AlertPattern,
        now: Instant,
    ) -> Result<Option<ScheduledBeep>, AlertError> {
        if !fits_clock_span(delay) {
            return Err(AlertError::OutOfRange);
        }
        Ok(self.scheduled.replace(ScheduledBeep {
            due: now + delay,
            pattern,
        }))
    }

    /// Returns `true` if a scheduled beep was cancelled.
    pub fn cancel_scheduled_beep(&mut self) -> bool {
        self.scheduled.take().is_some()
    }
}
