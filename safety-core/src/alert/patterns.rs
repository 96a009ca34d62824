//! Named alert patterns and their timing templates.
//!
//! Every named pattern resolves to a [`PatternTiming`]: a static list of
//! on/off beats, a repetition count, and a silent pause inserted between
//! repetitions. Only [`AlertPattern::Custom`] has mutable timing; it is held by
//! the orchestrator as a [`CustomPattern`].

use core::fmt;
use core::time::Duration;

use super::AlertError;
use crate::time::fits_clock_span;

/// Default on-time for a plain beep.
pub const BEEP_DURATION: Duration = Duration::from_millis(300);
/// Beats in one emergency burst.
pub const EMERGENCY_BEEP_COUNT: usize = 5;

/// Audible patterns the orchestrator can play.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum AlertPattern {
    Single,
    Double,
    Triple,
    Long,
    Sos,
    Emergency,
    Warning,
    Success,
    Error,
    Custom,
}

impl AlertPattern {
    pub const ALL: [AlertPattern; 10] = [
        AlertPattern::Single,
        AlertPattern::Double,
        AlertPattern::Triple,
        AlertPattern::Long,
        AlertPattern::Sos,
        AlertPattern::Emergency,
        AlertPattern::Warning,
        AlertPattern::Success,
        AlertPattern::Error,
        AlertPattern::Custom,
    ];

    /// Patterns that pre-empt playback and loop while emergency mode is enabled.
    #[must_use]
    pub const fn is_emergency_class(self) -> bool {
        matches!(self, AlertPattern::Emergency | AlertPattern::Sos)
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            AlertPattern::Single => "single",
            AlertPattern::Double => "double",
            AlertPattern::Triple => "triple",
            AlertPattern::Long => "long",
            AlertPattern::Sos => "sos",
            AlertPattern::Emergency => "emergency",
            AlertPattern::Warning => "warning",
            AlertPattern::Success => "success",
            AlertPattern::Error => "error",
            AlertPattern::Custom => "custom",
        }
    }

    /// Looks a pattern up by its [`AlertPattern::name`], ignoring ASCII case.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|pattern| pattern.name().eq_ignore_ascii_case(name))
    }

    /// Compact identifier used by telemetry and status encoding.
    #[must_use]
    pub const fn to_raw(self) -> u8 {
        match self {
            AlertPattern::Single => 0,
            AlertPattern::Double => 1,
            AlertPattern::Triple => 2,
            AlertPattern::Long => 3,
            AlertPattern::Sos => 4,
            AlertPattern::Emergency => 5,
            AlertPattern::Warning => 6,
            AlertPattern::Success => 7,
            AlertPattern::Error => 8,
            AlertPattern::Custom => 9,
        }
    }

    #[must_use]
    pub const fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(AlertPattern::Single),
            1 => Some(AlertPattern::Double),
            2 => Some(AlertPattern::Triple),
            3 => Some(AlertPattern::Long),
            4 => Some(AlertPattern::Sos),
            5 => Some(AlertPattern::Emergency),
            6 => Some(AlertPattern::Warning),
            7 => Some(AlertPattern::Success),
            8 => Some(AlertPattern::Error),
            9 => Some(AlertPattern::Custom),
            _ => None,
        }
    }
}

impl fmt::Display for AlertPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One sounding interval followed by a silent interval.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Beat {
    pub on: Duration,
    pub off: Duration,
}

impl Beat {
    #[must_use]
    pub const fn new(on_ms: u64, off_ms: u64) -> Self {
        Self {
            on: Duration::from_millis(on_ms),
            off: Duration::from_millis(off_ms),
        }
    }
}

/// Beats, repetition count and inter-repetition pause for one pattern.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct PatternTiming<'a> {
    pub beats: &'a [Beat],
    pub repeat: u8,
    pub pause: Duration,
}

impl PatternTiming<'_> {
    /// Total playing time of one non-looping run.
    #[must_use]
    pub fn total_duration(&self) -> Duration {
        let beats: Duration = self.beats.iter().map(|beat| beat.on + beat.off).sum();
        let repeat = u32::from(self.repeat);
        beats * repeat + self.pause * repeat.saturating_sub(1)
    }
}

const fn template(beats: &'static [Beat], repeat: u8, pause_ms: u64) -> PatternTiming<'static> {
    PatternTiming {
        beats,
        repeat,
        pause: Duration::from_millis(pause_ms),
    }
}

const SHORT: Beat = Beat::new(150, 150);
const LONG: Beat = Beat::new(450, 150);

const SINGLE_BEATS: [Beat; 1] = [Beat::new(300, 0)];
const DOUBLE_BEATS: [Beat; 2] = [Beat::new(200, 150), Beat::new(200, 0)];
const TRIPLE_BEATS: [Beat; 3] = [Beat::new(150, 100), Beat::new(150, 100), Beat::new(150, 0)];
const LONG_BEATS: [Beat; 1] = [Beat::new(1_000, 0)];
const SOS_BEATS: [Beat; 9] = [SHORT, SHORT, SHORT, LONG, LONG, LONG, SHORT, SHORT, SHORT];
const EMERGENCY_BEATS: [Beat; EMERGENCY_BEEP_COUNT] = [Beat::new(200, 100); EMERGENCY_BEEP_COUNT];
const WARNING_BEATS: [Beat; 1] = [Beat::new(400, 200)];
const SUCCESS_BEATS: [Beat; 2] = [Beat::new(100, 50), Beat::new(300, 0)];
const ERROR_BEATS: [Beat; 2] = [Beat::new(600, 200), Beat::new(600, 0)];

pub const SINGLE_TEMPLATE: PatternTiming<'static> = template(&SINGLE_BEATS, 1, 0);
pub const DOUBLE_TEMPLATE: PatternTiming<'static> = template(&DOUBLE_BEATS, 1, 0);
pub const TRIPLE_TEMPLATE: PatternTiming<'static> = template(&TRIPLE_BEATS, 1, 0);
pub const LONG_TEMPLATE: PatternTiming<'static> = template(&LONG_BEATS, 1, 0);
pub const SOS_TEMPLATE: PatternTiming<'static> = template(&SOS_BEATS, 1, 1_000);
pub const EMERGENCY_TEMPLATE: PatternTiming<'static> = template(&EMERGENCY_BEATS, 1, 500);
pub const WARNING_TEMPLATE: PatternTiming<'static> = template(&WARNING_BEATS, 2, 0);
pub const SUCCESS_TEMPLATE: PatternTiming<'static> = template(&SUCCESS_BEATS, 1, 0);
pub const ERROR_TEMPLATE: PatternTiming<'static> = template(&ERROR_BEATS, 1, 0);

/// Returns the fixed template for every pattern except [`AlertPattern::Custom`].
#[must_use]
pub const fn named_template(pattern: AlertPattern) -> Option<PatternTiming<'static>> {
    match pattern {
        AlertPattern::Single => Some(SINGLE_TEMPLATE),
        AlertPattern::Double => Some(DOUBLE_TEMPLATE),
        AlertPattern::Triple => Some(TRIPLE_TEMPLATE),
        AlertPattern::Long => Some(LONG_TEMPLATE),
        AlertPattern::Sos => Some(SOS_TEMPLATE),
        AlertPattern::Emergency => Some(EMERGENCY_TEMPLATE),
        AlertPattern::Warning => Some(WARNING_TEMPLATE),
        AlertPattern::Success => Some(SUCCESS_TEMPLATE),
        AlertPattern::Error => Some(ERROR_TEMPLATE),
        AlertPattern::Custom => None,
    }
}

/// User-adjustable timing for [`AlertPattern::Custom`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct CustomPattern {
    beat: [Beat; 1],
    repeat: u8,
    pause: Duration,
}

impl CustomPattern {
    pub const DEFAULT: Self = Self {
        beat: [Beat::new(200, 200)],
        repeat: 1,
        pause: Duration::ZERO,
    };

    /// Validates and builds a custom pattern.
    ///
    /// # Errors
    ///
    /// Returns [`AlertError::InvalidTiming`] when `on` or `repeat` is zero and
    /// [`AlertError::OutOfRange`] when a phase exceeds half the clock range.
    pub fn new(
        on: Duration,
        off: Duration,
        repeat: u8,
        pause: Duration,
    ) -> Result<Self, AlertError> {
        if on.is_zero() || repeat == 0 {
            return Err(AlertError::InvalidTiming);
        }
        if ![on, off, pause].into_iter().all(fits_clock_span) {
            return Err(AlertError::OutOfRange);
        }
        Ok(Self {
            beat: [Beat { on, off }],
            repeat,
            pause,
        })
    }

    #[must_use]
    pub const fn beat(&self) -> Beat {
        self.beat[0]
    }

    #[must_use]
    pub const fn repeat(&self) -> u8 {
        self.repeat
    }

    #[must_use]
    pub const fn pause(&self) -> Duration {
        self.pause
    }

    #[must_use]
    pub fn timing(&self) -> PatternTiming<'_> {
        PatternTiming {
            beats: &self.beat,
            repeat: self.repeat,
            pause: self.pause,
        }
    }
}

impl Default for CustomPattern {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Resolves the timing for `pattern`, reading `custom` for [`AlertPattern::Custom`].
#[must_use]
pub fn resolve(pattern: AlertPattern, custom: &CustomPattern) -> PatternTiming<'_> {
    named_template(pattern).unwrap_or_else(|| custom.timing())
}
