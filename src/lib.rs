//! xfer-harness - black-box test driver for a file-transfer CLI
//!
//! This library builds commands for the transfer tool under test, runs them
//! as child processes with bounded waits, extracts the final job summary
//! from their output and generates the synthetic files scenarios upload.

pub mod cli;
pub mod command;
pub mod commands;
pub mod common;
pub mod fixtures;
pub mod process;
pub mod session;
pub mod summary;
pub mod testing;
pub mod url;

// Re-export commonly used types for tests
pub use command::Command;
pub use common::{Error, Result};
