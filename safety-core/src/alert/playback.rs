//! Cursor over the phases of one pattern.

use core::time::Duration;

use crate::time::Instant;

use super::patterns::{AlertPattern, CustomPattern, PatternTiming, resolve};

/// Phase kinds within a pattern repetition.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Step {
    On,
    Off,
    Pause,
}

/// Position of the cursor inside a pattern.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Position {
    pub repeat: u8,
    pub beat: usize,
    pub step: Step,
}

impl Position {
    const START: Self = Self {
        repeat: 0,
        beat: 0,
        step: Step::On,
    };
}

/// In-flight playback of a single pattern.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Playback {
    pattern: AlertPattern,
    /// Snapshot so later custom edits don't disturb a running pattern.
    custom: CustomPattern,
    looping: bool,
    position: Position,
    deadline: Instant,
}

impl Playback {
    /// Starts `pattern` at `now`, or returns `None` if it has no audible phase.
    pub fn start(
        pattern: AlertPattern,
        custom: CustomPattern,
        looping: bool,
        now: Instant,
    ) -> Option<Self> {
        let mut playback = Self {
            pattern,
            custom,
            looping,
            position: Position::START,
            deadline: now,
        };

        let first = if playback.phase_length(Position::START).is_zero() {
            playback.next_audible(Position::START)?
        } else {
            Position::START
        };
        playback.position = first;
        playback.deadline = now + playback.phase_length(first);
        Some(playback)
    }

    pub const fn pattern(&self) -> AlertPattern {
        self.pattern
    }

    pub const fn position(&self) -> Position {
        self.position
    }

    pub const fn deadline(&self) -> Instant {
        self.deadline
    }

    pub const fn is_looping(&self) -> bool {
        self.looping
    }

    /// Returns `true` while the current phase should sound.
    pub fn output_on(&self) -> bool {
        self.position.step == Step::On
    }

    /// Moves the current deadline, e.g. after a pause.
    pub fn reschedule(&mut self, deadline: Instant) {
        self.deadline = deadline;
    }

    /// Advances past the current deadline.
    ///
    /// The next deadline chains from the previous one rather than from the
    /// caller's clock. Returns `false` once the pattern has finished.
    pub fn advance(&mut self) -> bool {
        match self.next_audible(self.position) {
            Some(next) => {
                self.deadline = self.deadline + self.phase_length(next);
                self.position = next;
                true
            }
            None => false,
        }
    }

    fn timing(&self) -> PatternTiming<'_> {
        resolve(self.pattern, &self.custom)
    }

    fn phase_length(&self, position: Position) -> Duration {
        let timing = self.timing();
        match position.step {
            Step::Pause => timing.pause,
            Step::On => timing
                .beats
                .get(position.beat)
                .map_or(Duration::ZERO, |beat| beat.on),
            Step::Off => timing
                .beats
                .get(position.beat)
                .map_or(Duration::ZERO, |beat| beat.off),
        }
    }

    fn successor(&self, position: Position) -> Option<Position> {
        let timing = self.timing();
        let last_repeat = position.repeat.saturating_add(1) >= timing.repeat;
        match position.step {
            Step::On => Some(Position {
                step: Step::Off,
                ..position
            }),
            Step::Off if position.beat + 1 < timing.beats.len() => Some(Position {
                beat: position.beat + 1,
                step: Step::On,
                ..position
            }),
            Step::Off if !last_repeat || self.looping => Some(Position {
                step: Step::Pause,
                ..position
            }),
            Step::Off => None,
            Step::Pause => Some(Position {
                repeat: if last_repeat { 0 } else { position.repeat + 1 },
                ..Position::START
            }),
        }
    }

    /// First phase after `position` with a non-zero length.
    fn next_audible(&self, position: Position) -> Option<Position> {
        // Every repetition holds at least one sounding beat, so one full
        // repetition plus its pause bounds the search.
        let limit = self.timing().beats.len() * 2 + 2;
        let mut candidate = position;
        for _ in 0..limit {
            candidate = self.successor(candidate)?;
            if !self.phase_length(candidate).is_zero() {
                return Some(candidate);
            }
        }
        None
    }
}
