//! Replays scripted sessions and writes one transcript per profile.

use std::io;

#[allow(dead_code)]
#[path = "../session.rs"]
mod session;

use session::{Session, TranscriptProfile};

const FALL_SCRIPT: &[&str] = &[
    "status",
    "sample 1g",
    "wait 50ms",
    "sample 0.2g",
    "wait 100ms",
    "sample 3g",
    "status",
    "wait 500ms",
    "sample 0.1g",
    "sample 4g",
    "wait 600ms",
    "sample 1g",
    "wait 200ms",
    "sample 0.25g",
    "wait 400ms",
    "sample 3g",
    "status",
];

const ALERT_SCRIPT: &[&str] = &[
    "beep double",
    "beep warning",
    "beep custom 150ms 50ms repeat=3",
    "status",
    "wait 700ms",
    "pause",
    "wait 1s",
    "resume",
    "wait 3s",
    "schedule 250ms success",
    "wait 1s",
    "test",
    "wait 2s",
    "status",
];

const EMERGENCY_SCRIPT: &[&str] = &[
    "beep long",
    "beep triple",
    "sample 0.1g",
    "wait 80ms",
    "sample 5g",
    "status",
    "wait 4s",
    "pause",
    "stop",
    "wait 1s",
    "emergency-mode off",
    "alert sos",
    "wait 4s",
    "fall selftest",
    "fall simulate",
    "stop all",
    "status",
];

fn main() -> io::Result<()> {
    record(TranscriptProfile::Fall, FALL_SCRIPT)?;
    record(TranscriptProfile::Alerts, ALERT_SCRIPT)?;
    record(TranscriptProfile::Emergency, EMERGENCY_SCRIPT)?;
    Ok(())
}

fn record(profile: TranscriptProfile, script: &[&str]) -> io::Result<()> {
    let mut session = Session::new(profile)?;
    for line in script {
        session.handle_command(line)?;
    }
    println!(
        "{} ({} commands, {} ms simulated)",
        profile.log_path(),
        script.len(),
        session.elapsed().as_millis()
    );
    Ok(())
}
