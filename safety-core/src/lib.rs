#![no_std]

// Shared logic for the mobility-aid safety controller.
//
// This crate stays portable across MCU firmware and host tooling by avoiding the
// Rust standard library. Both the fall detector and the alert orchestrator are
// driven cooperatively: callers hand in the current `time::Instant` and never
// block inside the crate.
pub mod alert;
pub mod controller;
pub mod fall;
pub mod history;
pub mod repl;
pub mod telemetry;
pub mod time;
