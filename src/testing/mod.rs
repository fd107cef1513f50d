//! Declarative scenarios
//!
//! Reads YAML test scenarios and drives them through the transfer tool and
//! validator of a bootstrapped [`TestContext`](crate::session::TestContext),
//! asserting on exit status, output and parsed job summaries.

mod config;
mod runner;

pub use config::*;
pub use runner::{
    build_command, compare_paths, expand, load_scenario, run_loaded, run_scenario, TestResult,
};
