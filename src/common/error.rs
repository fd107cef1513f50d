//! Error types for the transfer harness
//!
//! Each failure kind a scenario can hit has its own variant, so callers can
//! tell a timeout from a failed exit or a bad fixture request without
//! inspecting message text.

use std::io;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the harness
#[derive(Error, Debug)]
pub enum Error {
    // === Process Errors ===
    #[error("Failed to start '{program}': {source}")]
    ProcessSpawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("'{program}' exited with code {}: {output}", describe_code(.code))]
    ProcessFailed {
        program: String,
        code: Option<i32>,
        output: String,
    },

    #[error("'{program}' timed out after {secs} seconds")]
    Timeout {
        program: String,
        secs: u64,
        output: String,
    },

    #[error("Invalid pipe request: {0}")]
    InvalidPipe(String),

    // === Output Errors ===
    #[error("No complete JSON summary found in output ({0} bytes scanned)")]
    MalformedOutput(usize),

    // === Fixture Errors ===
    #[error("Refusing to generate {pattern} fixture of {size} bytes: {reason}")]
    FixturePrecondition {
        pattern: &'static str,
        size: u64,
        reason: String,
    },

    // === Session Errors ===
    #[error("Bootstrap failed: {0}")]
    Bootstrap(String),

    #[error("Remote '{0}' is not configured")]
    RemoteNotConfigured(&'static str),

    // === Configuration Errors ===
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration file: {0}")]
    ConfigParse(String),

    #[error("Invalid scenario file: {0}")]
    ScenarioParse(String),

    // === IO Errors ===
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to read file '{path}': {error}")]
    FileRead { path: String, error: String },

    // === Serialization Errors ===
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Test Errors ===
    #[error("Test assertion failed: {0}")]
    TestAssertion(String),

    // === Internal Errors ===
    #[error("Internal error: {0}")]
    Internal(String),
}

fn describe_code(code: &Option<i32>) -> String {
    match code {
        Some(code) => code.to_string(),
        None => "<signal>".to_string(),
    }
}

impl Error {
    /// Create a process failure error
    pub fn process_failed(program: &str, code: Option<i32>, output: String) -> Self {
        Self::ProcessFailed {
            program: program.to_string(),
            code,
            output,
        }
    }

    /// Create a fixture precondition error
    pub fn fixture_precondition(pattern: &'static str, size: u64, reason: impl Into<String>) -> Self {
        Self::FixturePrecondition {
            pattern,
            size,
            reason: reason.into(),
        }
    }

    /// Output captured from the child before it failed or timed out.
    ///
    /// Scenarios that expect a failing job still need to read its summary.
    pub fn captured_output(&self) -> Option<&str> {
        match self {
            Self::ProcessFailed { output, .. } | Self::Timeout { output, .. } => Some(output),
            _ => None,
        }
    }

    /// Whether the error came from the bounded wait expiring
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}
