//! Flutter OpenHarmony tooling
//!
//! Command implementations for the `fohos` binary. The work itself lives in
//! the `fohos-core`, `fohos-daemon` and `fohos-app` crates.

pub mod commands;
pub mod machine;

pub use commands::{BuildKind, RunOptions};
pub use machine::MachineEvent;
