//! Process execution for the tool under test and its validator

mod executor;
mod pipe;

pub use executor::{ExecutionResult, ProcessExecutor};
pub use pipe::PipeMode;
