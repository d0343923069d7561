//! Test doubles for the two host seams.
//!
//! - [`MockFs`]: in-memory filesystem standing in for `/proc`, `/sys` and config files
//! - [`MockRunner`]: canned output for external tools, with a call log
//! - `scenarios`: pre-built fixtures describing a typical storage server

mod filesystem;
mod runner;
mod scenarios;

pub use filesystem::MockFs;
pub use runner::MockRunner;
