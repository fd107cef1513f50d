//! Piped invocations
//!
//! In source mode a producer streams a local file into the tool's stdin;
//! in destination mode the tool's stdout is written into a local file.
//! Both ends run concurrently and both must finish before the call returns.

use std::fmt;
use std::io::{self, PipeReader};
use std::path::{Path, PathBuf};
use std::process::ExitStatus;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::Child;

use crate::common::{Error, Result};

use super::executor::collect_merged;

/// Which end of the tool is connected to a local file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipeMode {
    /// Stream this file into the tool's stdin
    Source(PathBuf),
    /// Write the tool's stdout into this file
    Destination(PathBuf),
}

impl PipeMode {
    /// Build a mode from optional source/destination paths
    ///
    /// Exactly one of the two must be given.
    pub fn from_paths(source: Option<PathBuf>, destination: Option<PathBuf>) -> Result<Self> {
        match (source, destination) {
            (Some(source), None) => Ok(PipeMode::Source(source)),
            (None, Some(destination)) => Ok(PipeMode::Destination(destination)),
            (Some(_), Some(_)) => Err(Error::InvalidPipe(
                "source and destination piping cannot be combined".to_string(),
            )),
            (None, None) => Err(Error::InvalidPipe(
                "either a source or a destination file is required".to_string(),
            )),
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            PipeMode::Source(path) | PipeMode::Destination(path) => path,
        }
    }
}

impl fmt::Display for PipeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipeMode::Source(path) => write!(f, "{} | tool", path.display()),
            PipeMode::Destination(path) => write!(f, "tool > {}", path.display()),
        }
    }
}

fn missing(name: &str) -> io::Error {
    io::Error::new(io::ErrorKind::BrokenPipe, format!("child {} was not captured", name))
}

/// Run both ends of the pipe and wait for the child
///
/// In source mode `merged` carries the child's combined stdout and stderr.
/// A failure of the local end is only reported when the tool itself
/// succeeded; otherwise the tool's exit status is the more useful signal.
pub(crate) async fn drive(
    child: &mut Child,
    mode: &PipeMode,
    merged: Option<PipeReader>,
    captured: &mut Vec<u8>,
) -> io::Result<ExitStatus> {
    let local_end = match mode {
        PipeMode::Source(path) => {
            let output = merged.ok_or_else(|| missing("output"))?;
            let mut stdin = child.stdin.take().ok_or_else(|| missing("stdin"))?;
            let producer = async move {
                let mut file = tokio::fs::File::open(path).await?;
                tokio::io::copy(&mut file, &mut stdin).await?;
                stdin.shutdown().await?;
                Ok::<_, io::Error>(())
            };
            let (produced, collected) =
                tokio::join!(producer, collect_merged(output, captured));
            collected?;
            produced
        }
        PipeMode::Destination(path) => {
            let mut stdout = child.stdout.take().ok_or_else(|| missing("stdout"))?;
            let mut stderr = child.stderr.take().ok_or_else(|| missing("stderr"))?;
            let writer = async move {
                let mut file = tokio::fs::File::create(path).await?;
                tokio::io::copy(&mut stdout, &mut file).await?;
                file.flush().await?;
                Ok::<_, io::Error>(())
            };
            let reader = async move { stderr.read_to_end(captured).await };
            let (written, read) = tokio::join!(writer, reader);
            read?;
            written
        }
    };

    let status = child.wait().await?;
    if status.success() {
        local_end?;
    } else if let Err(e) = local_end {
        tracing::debug!(error = %e, "local end of pipe failed after tool error");
    }
    Ok(status)
}
