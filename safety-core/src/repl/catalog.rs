//! Command table shared by the parser and the `help` command.
//!
//! Keywords are matched case-insensitively. Each entry carries the usage line
//! and a one-line summary rendered by front-ends.

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommandTag {
    Status,
    Sample,
    Beep,
    Alert,
    Schedule,
    Pause,
    Resume,
    Stop,
    Clear,
    EmergencyMode,
    Fall,
    Thresholds,
    Timing,
    Smoothing,
    Test,
    Wait,
    Help,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CommandSpec {
    pub name: &'static str,
    pub tag: CommandTag,
    pub usage: &'static str,
    pub summary: &'static str,
}

const fn spec(
    name: &'static str,
    tag: CommandTag,
    usage: &'static str,
    summary: &'static str,
) -> CommandSpec {
    CommandSpec {
        name,
        tag,
        usage,
        summary,
    }
}

pub const COMMANDS: [CommandSpec; 17] = [
    spec(
        "status",
        CommandTag::Status,
        "status",
        "show detector, alert and last-fall state",
    ),
    spec(
        "sample",
        CommandTag::Sample,
        "sample <magnitude>",
        "feed one acceleration magnitude, e.g. `sample 0.2g`",
    ),
    spec(
        "beep",
        CommandTag::Beep,
        "beep [<pattern>|<duration>|custom <on> <off> [repeat=<n>] [pause=<d>]]",
        "request an alert pattern",
    ),
    spec(
        "alert",
        CommandTag::Alert,
        "alert <emergency|warning|success|error|sos>",
        "raise a named alert",
    ),
    spec(
        "schedule",
        CommandTag::Schedule,
        "schedule <delay> <pattern> | schedule cancel",
        "request a pattern once a delay has passed",
    ),
    spec("pause", CommandTag::Pause, "pause", "silence the running pattern"),
    spec(
        "resume",
        CommandTag::Resume,
        "resume",
        "continue a paused pattern",
    ),
    spec(
        "stop",
        CommandTag::Stop,
        "stop [all]",
        "stop the running pattern, or everything with `all`",
    ),
    spec("clear", CommandTag::Clear, "clear", "drop queued patterns"),
    spec(
        "emergency-mode",
        CommandTag::EmergencyMode,
        "emergency-mode <on|off>",
        "allow emergency patterns to pre-empt and loop",
    ),
    spec(
        "fall",
        CommandTag::Fall,
        "fall <reset|simulate|selftest|calibrate|commit|cancel>",
        "detector maintenance",
    ),
    spec(
        "thresholds",
        CommandTag::Thresholds,
        "thresholds <low> <high>",
        "set free-fall and impact thresholds in g",
    ),
    spec(
        "timing",
        CommandTag::Timing,
        "timing <window> <cooldown>",
        "set the detection window and cooldown",
    ),
    spec(
        "smoothing",
        CommandTag::Smoothing,
        "smoothing <n>",
        "set the moving-average window",
    ),
    spec(
        "test",
        CommandTag::Test,
        "test",
        "play a single beep then the success chime",
    ),
    spec(
        "wait",
        CommandTag::Wait,
        "wait <duration>",
        "advance the clock, ticking the controller",
    ),
    spec("help", CommandTag::Help, "help [topic]", "list commands"),
];

/// Looks a command up by keyword.
#[must_use]
pub fn find(name: &str) -> Option<&'static CommandSpec> {
    COMMANDS
        .iter()
        .find(|spec| spec.name.eq_ignore_ascii_case(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keywords_are_unique() {
        for (index, spec) in COMMANDS.iter().enumerate() {
            assert!(
                COMMANDS[index + 1..]
                    .iter()
                    .all(|other| !other.name.eq_ignore_ascii_case(spec.name)),
                "duplicate keyword {}",
                spec.name
            );
            assert!(spec.usage.starts_with(spec.name));
        }
    }

    #[test]
    fn lookup_ignores_case() {
        assert_eq!(
            find("Emergency-Mode").map(|spec| spec.tag),
            Some(CommandTag::EmergencyMode)
        );
        assert!(find("reboot").is_none());
    }
}
