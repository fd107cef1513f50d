//! Logging and tracing configuration
//!
//! The CLI logs to stderr so that extracted summaries written to stdout can
//! be piped into other tools untouched.

use std::path::Path;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize tracing for the CLI (stderr logging)
///
/// Logs are controlled by the `RUST_LOG` environment variable.
/// Default level is INFO for this crate, WARN for dependencies; `debug`
/// raises this crate to DEBUG so every command line gets logged.
pub fn init_cli(debug: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter(debug));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .compact(),
        )
        .init();
}

/// Initialize tracing with an additional plain-text log file
///
/// Selected with `--log-file` for long scenario runs where the console
/// scrolls away. Falls back to stderr-only logging if the file cannot be
/// opened.
pub fn init_with_file(debug: bool, log_file: &Path) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter(debug));

    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file);

    match file {
        Ok(file) => {
            let file_layer = fmt::layer()
                .with_writer(file)
                .with_ansi(false)
                .with_target(true)
                .with_thread_ids(false)
                .with_file(true)
                .with_line_number(true);

            let stderr_layer = fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .compact();

            tracing_subscriber::registry()
                .with(filter)
                .with(file_layer)
                .with(stderr_layer)
                .init();
        }
        Err(e) => {
            eprintln!("Warning: Could not open log file: {}", e);
            init_cli(debug);
        }
    }
}

fn default_filter(debug: bool) -> EnvFilter {
    if debug {
        EnvFilter::new("harness=debug,info")
    } else {
        EnvFilter::new("harness=info,warn")
    }
}
