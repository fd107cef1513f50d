//! Test scenario configuration types
//!
//! Defines the data structures for deserializing YAML test scenarios.

use serde::Deserialize;
use std::collections::BTreeMap;

use crate::fixtures::Pattern;

/// A complete test scenario loaded from a YAML file
#[derive(Deserialize, Debug)]
pub struct TestScenario {
    /// Name of the test scenario
    pub name: String,
    /// Optional description of what the test verifies
    pub description: Option<String>,
    /// The sequence of test steps to execute
    pub steps: Vec<TestStep>,
}

/// A single test step in the execution flow
///
/// Paths, arguments and flag values may contain placeholders: `{work}` for
/// the working directory, and `{container:NAME}`, `{share:NAME}`,
/// `{filesystem:NAME}` or `{premium:NAME}` for a resource on that remote.
#[derive(Deserialize, Debug)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum TestStep {
    /// Create a synthetic file, or a directory of files when `count` is set
    Generate {
        #[serde(default)]
        pattern: Pattern,
        path: String,
        size: u64,
        count: Option<usize>,
    },
    /// Run the transfer tool
    Transfer {
        #[serde(flatten)]
        invocation: Invocation,
        expect: Option<CommandExpectation>,
    },
    /// Run the validator
    Validate {
        #[serde(flatten)]
        invocation: Invocation,
        expect: Option<CommandExpectation>,
    },
    /// Run the transfer tool with a local file on one end of a pipe
    Pipe {
        #[serde(flatten)]
        invocation: Invocation,
        /// File streamed into the tool's stdin
        source: Option<String>,
        /// File receiving the tool's stdout
        destination: Option<String>,
        expect: Option<CommandExpectation>,
    },
    /// Check that two local files or directory trees are identical
    Compare { left: String, right: String },
}

/// Verb, positional arguments and flags of one command
#[derive(Deserialize, Debug)]
pub struct Invocation {
    pub verb: String,
    #[serde(default)]
    pub args: Vec<String>,
    /// Flag values may be written as plain YAML scalars
    #[serde(default)]
    pub flags: BTreeMap<String, serde_yaml::Value>,
    /// Override of the executor's default timeout
    pub timeout_secs: Option<u64>,
}

/// Expectations for a command result
#[derive(Deserialize, Debug, Default)]
pub struct CommandExpectation {
    /// Whether the command should succeed
    pub success: Option<bool>,
    /// Substring that should be in the output
    pub output_contains: Option<String>,
    /// Completed transfers reported in the final job summary
    pub transfers_completed: Option<u64>,
    /// Failed transfers reported in the final job summary
    pub transfers_failed: Option<u64>,
}

impl CommandExpectation {
    /// Whether the job summary has to be parsed to check this expectation
    pub fn needs_summary(&self) -> bool {
        self.transfers_completed.is_some() || self.transfers_failed.is_some()
    }

    pub fn expects_failure(&self) -> bool {
        self.success == Some(false)
    }
}
