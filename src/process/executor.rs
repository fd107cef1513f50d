//! Child-process execution with a bounded wait
//!
//! stdout and stderr share one pipe, so the capture keeps the exact order
//! the child wrote in. A child that outlives its timeout is killed together
//! with its process group and reported as [`Error::Timeout`].

use std::fmt;
use std::io::{self, PipeReader, Read};
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};

use tokio::process::{Child, Command as TokioCommand};
use tokio::sync::mpsc;
use tokio::time::timeout;

use crate::command::Command;
use crate::common::{Error, Result};
use crate::url::redact_signature;

use super::pipe::{self, PipeMode};

/// How long to wait for a killed child to be reaped
const REAP_TIMEOUT: Duration = Duration::from_secs(5);

/// Read size for the merged output pipe
const READ_CHUNK: usize = 8192;

/// Outcome of one successful invocation
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    /// Combined stdout and stderr
    pub output: String,
    /// Exit code; `None` if the child was ended by a signal
    pub exit_code: Option<i32>,
    /// Wall-clock time from spawn to exit
    pub elapsed: Duration,
}

impl ExecutionResult {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Runs commands against one executable
#[derive(Clone)]
pub struct ProcessExecutor {
    program: PathBuf,
    default_timeout: Duration,
    working_dir: Option<PathBuf>,
    env: Vec<(String, String)>,
}

// Environment values may be credentials; only their names are printed
impl fmt::Debug for ProcessExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessExecutor")
            .field("program", &self.program)
            .field("default_timeout", &self.default_timeout)
            .field("working_dir", &self.working_dir)
            .field("env", &self.env.iter().map(|(k, _)| k).collect::<Vec<_>>())
            .finish()
    }
}

impl ProcessExecutor {
    pub fn new(program: impl Into<PathBuf>, default_timeout: Duration) -> Self {
        Self {
            program: program.into(),
            default_timeout,
            working_dir: None,
            env: Vec::new(),
        }
    }

    /// Run children from `dir` instead of the harness's own directory
    #[must_use]
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Variables set in every child's environment on top of the inherited ones
    #[must_use]
    pub fn with_env<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.env
            .extend(vars.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// Full command line as it would be typed, signatures redacted
    pub fn describe(&self, command: &Command) -> String {
        redact_signature(&format!(
            "{} {}",
            self.program.display(),
            command.to_command_line()
        ))
    }

    /// Run with the default timeout; success means exit status 0
    pub async fn run(&self, command: &Command) -> Result<ExecutionResult> {
        self.run_with_timeout(command, self.default_timeout).await
    }

    /// Run and return only the combined output
    pub async fn run_capturing(&self, command: &Command) -> Result<String> {
        self.run(command).await.map(|result| result.output)
    }

    /// Run with an explicit bound on the wait
    pub async fn run_with_timeout(
        &self,
        command: &Command,
        limit: Duration,
    ) -> Result<ExecutionResult> {
        tracing::debug!(command = %self.describe(command), timeout_secs = limit.as_secs(), "running");

        let started = Instant::now();
        let (reader, stdout, stderr) = merged_output()?;
        let mut child = self.spawn(command, Stdio::null(), stdout, stderr)?;

        let mut captured = Vec::new();
        let waited = timeout(limit, async {
            collect_merged(reader, &mut captured).await?;
            child.wait().await
        })
        .await;

        let output = String::from_utf8_lossy(&captured).into_owned();
        self.finish(command, &mut child, waited, output, started, limit)
            .await
    }

    /// Run with one end of the tool connected to a local file
    ///
    /// The producer (source mode) or writer (destination mode) runs
    /// alongside the tool and both must finish before success is reported.
    pub async fn run_piped(
        &self,
        command: &Command,
        mode: &PipeMode,
        limit: Duration,
    ) -> Result<ExecutionResult> {
        tracing::debug!(
            command = %self.describe(command),
            mode = %mode,
            timeout_secs = limit.as_secs(),
            "running piped"
        );

        let started = Instant::now();
        let (stdin, stdout, stderr, merged) = match mode {
            PipeMode::Source(_) => {
                let (reader, stdout, stderr) = merged_output()?;
                (Stdio::piped(), stdout, stderr, Some(reader))
            }
            PipeMode::Destination(_) => (Stdio::null(), Stdio::piped(), Stdio::piped(), None),
        };
        let mut child = self.spawn(command, stdin, stdout, stderr)?;

        let mut captured = Vec::new();
        let waited = timeout(limit, pipe::drive(&mut child, mode, merged, &mut captured)).await;

        let output = String::from_utf8_lossy(&captured).into_owned();
        self.finish(command, &mut child, waited, output, started, limit)
            .await
    }

    /// Spawn the child; `cmd` and with it the parent's copies of any pipe
    /// write ends are dropped on return, so readers see EOF once the child
    /// and its descendants exit
    fn spawn(&self, command: &Command, stdin: Stdio, stdout: Stdio, stderr: Stdio) -> Result<Child> {
        let mut cmd = TokioCommand::new(&self.program);
        cmd.args(command.argv())
            .envs(self.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(stdin)
            .stdout(stdout)
            .stderr(stderr)
            .kill_on_drop(true);

        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }

        // Own process group so a timeout can take down grandchildren too
        #[cfg(unix)]
        cmd.process_group(0);

        cmd.spawn().map_err(|e| Error::ProcessSpawn {
            program: self.program.display().to_string(),
            source: e,
        })
    }

    async fn finish(
        &self,
        command: &Command,
        child: &mut Child,
        waited: std::result::Result<std::io::Result<ExitStatus>, tokio::time::error::Elapsed>,
        output: String,
        started: Instant,
        limit: Duration,
    ) -> Result<ExecutionResult> {
        let program = self.program.display().to_string();
        let elapsed = started.elapsed();

        let status = match waited {
            Ok(status) => status.map_err(|e| {
                Error::Internal(format!("Failed to wait for '{}': {}", program, e))
            })?,
            Err(_) => {
                terminate(child).await;
                tracing::warn!(
                    command = %self.describe(command),
                    timeout_secs = limit.as_secs(),
                    output = %output,
                    "command timed out"
                );
                return Err(Error::Timeout {
                    program,
                    secs: limit.as_secs(),
                    output,
                });
            }
        };

        if !status.success() {
            tracing::warn!(
                command = %self.describe(command),
                code = ?status.code(),
                output = %output,
                "command failed"
            );
            return Err(Error::process_failed(&program, status.code(), output));
        }

        tracing::debug!(verb = command.verb(), elapsed_ms = elapsed.as_millis() as u64, "command succeeded");
        Ok(ExecutionResult {
            output,
            exit_code: status.code(),
            elapsed,
        })
    }
}

/// One pipe whose write end serves as both stdout and stderr
fn merged_output() -> Result<(PipeReader, Stdio, Stdio)> {
    let (reader, writer) = io::pipe()
        .map_err(|e| Error::Internal(format!("Failed to create output pipe: {}", e)))?;
    let stderr = writer
        .try_clone()
        .map_err(|e| Error::Internal(format!("Failed to share output pipe: {}", e)))?;
    Ok((reader, Stdio::from(writer), Stdio::from(stderr)))
}

/// Read the merged pipe to EOF
///
/// The blocking read runs on its own thread and hands chunks over as they
/// arrive, so whatever was read before a timeout is already in `captured`.
pub(crate) async fn collect_merged(reader: PipeReader, captured: &mut Vec<u8>) -> io::Result<()> {
    let (tx, mut rx) = mpsc::channel::<io::Result<Vec<u8>>>(16);

    std::thread::Builder::new()
        .name("output-reader".to_string())
        .spawn(move || {
            let mut reader = reader;
            let mut buf = [0u8; READ_CHUNK];
            loop {
                let chunk = match reader.read(&mut buf) {
                    Ok(0) => break,
                    Ok(n) => Ok(buf[..n].to_vec()),
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(e) => Err(e),
                };
                let failed = chunk.is_err();
                if tx.blocking_send(chunk).is_err() || failed {
                    break;
                }
            }
        })?;

    while let Some(chunk) = rx.recv().await {
        captured.extend_from_slice(&chunk?);
    }
    Ok(())
}

/// Kill the child and everything in its process group, then reap it
async fn terminate(child: &mut Child) {
    #[cfg(unix)]
    if let Some(pid) = child.id() {
        // SAFETY: killpg only sends a signal; the group was created at spawn
        // time with the child as leader, so it cannot name an unrelated group.
        unsafe {
            libc::killpg(pid as libc::pid_t, libc::SIGKILL);
        }
    }

    let _ = child.start_kill();
    if timeout(REAP_TIMEOUT, child.wait()).await.is_err() {
        tracing::warn!("child did not exit after kill");
    }
}
