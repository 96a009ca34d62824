//! Pure fall-detection transition function.
//!
//! [`transition`] advances the hysteresis state machine by exactly one step.
//! It performs no I/O and keeps no hidden state, so every edge of the state
//! table can be exercised by supplying timestamps and filtered magnitudes
//! directly. [`super::FallDetector`] applies it once per resting state and
//! chains through the transient `HighG` and `Detected` states within the same
//! sample.

use core::time::Duration;

use crate::time::Instant;

use super::{FallDetectionState, FallDetectorConfig, FallEvent};

/// Running statistics for a free-fall excursion.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Excursion {
    pub started_at: Instant,
    pub min: f32,
    pub max: f32,
}

impl Excursion {
    /// Starts an excursion at `now` with the first low magnitude.
    #[must_use]
    pub const fn begin(started_at: Instant, magnitude: f32) -> Self {
        Self {
            started_at,
            min: magnitude,
            max: magnitude,
        }
    }

    /// Folds another filtered magnitude into the running extremes.
    pub fn observe(&mut self, magnitude: f32) {
        self.min = self.min.min(magnitude);
        self.max = self.max.max(magnitude);
    }
}

/// State plus the data each state carries.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Phase {
    Normal,
    LowG(Excursion),
    HighG {
        excursion: Excursion,
        impact_at: Instant,
    },
    Detected(FallEvent),
    Cooldown {
        since: Instant,
    },
}

impl Phase {
    /// Returns the public state tag.
    #[must_use]
    pub const fn state(&self) -> FallDetectionState {
        match self {
            Phase::Normal => FallDetectionState::Normal,
            Phase::LowG(_) => FallDetectionState::LowG,
            Phase::HighG { .. } => FallDetectionState::HighG,
            Phase::Detected(_) => FallDetectionState::Detected,
            Phase::Cooldown { .. } => FallDetectionState::Cooldown,
        }
    }

    /// Returns `true` for states that exit without waiting for another sample.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Phase::HighG { .. } | Phase::Detected(_))
    }
}

/// Result of a single transition step.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Transition {
    pub next: Phase,
    /// Event handed to the integrator; only set on `Detected -> Cooldown`.
    pub emitted: Option<FallEvent>,
}

impl Transition {
    const fn stay(phase: Phase) -> Self {
        Self {
            next: phase,
            emitted: None,
        }
    }

    const fn to(next: Phase) -> Self {
        Self {
            next,
            emitted: None,
        }
    }
}

/// Advances `phase` by one step given the filtered magnitude `a` observed at `now`.
#[must_use]
pub fn transition(phase: Phase, config: &FallDetectorConfig, a: f32, now: Instant) -> Transition {
    let thresholds = config.thresholds;
    let timing = config.timing;

    match phase {
        Phase::Normal => {
            if a < thresholds.low_g {
                Transition::to(Phase::LowG(Excursion::begin(now, a)))
            } else {
                Transition::stay(phase)
            }
        }
        Phase::LowG(mut excursion) => {
            if now.has_exceeded(excursion.started_at, timing.window) {
                // Free fall without an impact inside the window: false alarm.
                return Transition::to(Phase::Normal);
            }

            excursion.observe(a);
            if a > thresholds.high_g {
                Transition::to(Phase::HighG {
                    excursion,
                    impact_at: now,
                })
            } else {
                Transition::stay(Phase::LowG(excursion))
            }
        }
        Phase::HighG {
            excursion,
            impact_at,
        } => {
            let event = FallEvent {
                timestamp: impact_at,
                max_acceleration: excursion.max,
                min_acceleration: excursion.min,
                duration: impact_at.duration_since(excursion.started_at),
                is_emergency: config.is_emergency(excursion.max),
                simulated: false,
            };
            Transition::to(Phase::Detected(event))
        }
        Phase::Detected(event) => Transition {
            next: Phase::Cooldown {
                since: event.timestamp,
            },
            emitted: Some(event),
        },
        Phase::Cooldown { since } => {
            if now.has_exceeded(since, timing.cooldown) {
                Transition::to(Phase::Normal)
            } else {
                Transition::stay(phase)
            }
        }
    }
}

/// Remaining cooldown at `now`, if the phase is cooling down.
#[must_use]
pub fn cooldown_remaining(
    phase: &Phase,
    config: &FallDetectorConfig,
    now: Instant,
) -> Option<Duration> {
    match phase {
        Phase::Cooldown { since } => {
            let elapsed = now.duration_since(*since);
            Some(config.timing.cooldown.saturating_sub(elapsed))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(millis: u32) -> Instant {
        Instant::from_millis(millis)
    }

    #[test]
    fn normal_enters_low_g_below_threshold() {
        let config = FallDetectorConfig::default();
        let step = transition(Phase::Normal, &config, 0.2, at(50));

        assert_eq!(step.next, Phase::LowG(Excursion::begin(at(50), 0.2)));
        assert!(step.emitted.is_none());

        let idle = transition(Phase::Normal, &config, 0.9, at(60));
        assert_eq!(idle.next, Phase::Normal);
    }

    #[test]
    fn low_g_impact_inside_window_reaches_high_g() {
        let config = FallDetectorConfig::default();
        let phase = Phase::LowG(Excursion::begin(at(50), 0.2));
        let step = transition(phase, &config, 3.0, at(150));

        match step.next {
            Phase::HighG {
                excursion,
                impact_at,
            } => {
                assert_eq!(impact_at, at(150));
                assert_eq!(excursion.min, 0.2);
                assert_eq!(excursion.max, 3.0);
            }
            other => panic!("unexpected phase: {other:?}"),
        }
    }

    #[test]
    fn impact_exactly_at_window_edge_still_counts() {
        let config = FallDetectorConfig::default();
        let phase = Phase::LowG(Excursion::begin(at(0), 0.1));

        let edge = transition(phase, &config, 3.0, at(300));
        assert_eq!(edge.next.state(), FallDetectionState::HighG);

        let late = transition(phase, &config, 3.0, at(301));
        assert_eq!(late.next, Phase::Normal);
    }

    #[test]
    fn high_g_confirms_then_detected_emits_once() {
        let config = FallDetectorConfig::default();
        let mut excursion = Excursion::begin(at(50), 0.2);
        excursion.observe(3.0);
        let phase = Phase::HighG {
            excursion,
            impact_at: at(150),
        };

        let confirmed = transition(phase, &config, 0.0, at(150));
        assert!(confirmed.emitted.is_none());
        let Phase::Detected(event) = confirmed.next else {
            panic!("expected detected phase");
        };
        assert_eq!(event.duration, Duration::from_millis(100));
        assert_eq!(event.timestamp, at(150));

        let cooled = transition(confirmed.next, &config, 0.0, at(150));
        assert_eq!(cooled.next, Phase::Cooldown { since: at(150) });
        assert_eq!(cooled.emitted, Some(event));
    }

    #[test]
    fn cooldown_releases_strictly_after_duration() {
        let config = FallDetectorConfig::default();
        let phase = Phase::Cooldown { since: at(150) };

        assert_eq!(transition(phase, &config, 0.1, at(1_150)).next, phase);
        assert_eq!(transition(phase, &config, 0.9, at(1_151)).next, Phase::Normal);
        assert_eq!(
            cooldown_remaining(&phase, &config, at(650)),
            Some(Duration::from_millis(500))
        );
    }

    #[test]
    fn low_g_window_spans_clock_wrap() {
        let config = FallDetectorConfig::default();
        let start = at(u32::MAX - 99);
        let phase = Phase::LowG(Excursion::begin(start, 0.1));

        let step = transition(phase, &config, 3.2, at(100));
        assert_eq!(step.next.state(), FallDetectionState::HighG);
    }
}
