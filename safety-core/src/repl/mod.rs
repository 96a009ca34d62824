//! Diagnostics REPL shared between firmware and emulator targets.
//!
//! The grammar lives in [`grammar`] and is implemented with a token/parse
//! pipeline that stays compatible with `no_std`. [`commands`] executes parsed
//! commands against a [`crate::controller::SafetyController`].

pub mod catalog;
pub mod commands;
pub mod grammar;
pub mod status;

pub use commands::{CommandError, CommandExecutor, CommandOutcome};
pub use status::{StatusFormatter, StatusSnapshot};
