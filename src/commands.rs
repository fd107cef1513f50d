//! CLI command definitions
//!
//! Defines the clap commands for the harness CLI.

use clap::Subcommand;
use std::path::PathBuf;

use crate::fixtures::Pattern;

#[derive(Subcommand)]
pub enum Commands {
    /// Recreate the test directory, stage the executables and clean every configured remote
    Bootstrap,

    /// Run YAML test scenarios
    Test {
        /// Paths to YAML test scenario files
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Verbose output
        #[arg(long, short)]
        verbose: bool,

        /// Reuse an earlier bootstrap instead of preparing a fresh run
        #[arg(long)]
        no_bootstrap: bool,
    },

    /// Extract the final job summary from captured tool output
    Summary {
        /// File holding the output (default: stdin)
        file: Option<PathBuf>,

        /// Use the line-oriented extractor for pretty-printed output
        #[arg(long)]
        legacy: bool,

        /// Print the extracted JSON text instead of the parsed counters
        #[arg(long)]
        raw: bool,
    },

    /// Generate a synthetic fixture file
    Generate {
        /// Content pattern: uniform, full-sparse or partial-sparse
        pattern: Pattern,

        /// Target file (or directory when --count is given)
        path: PathBuf,

        /// Size in bytes of each generated file
        #[arg(long)]
        size: u64,

        /// Create a directory of this many uniform files instead
        #[arg(long)]
        count: Option<usize>,
    },

    /// Address a resource inside a remote endpoint
    Url {
        /// Endpoint URL, optionally with an authorization query
        base: String,

        /// Resource name or path to splice in
        name: String,

        /// Drop the authorization query
        #[arg(long)]
        no_query: bool,
    },
}
