//! Immutable state shared by every scenario of a run

use std::fmt;
use std::path::{Path, PathBuf};

use crate::command::Command;
use crate::common::config::{Config, Remotes, Switches, Timeouts};
use crate::common::paths::{executable_name, TEST_DATA_DIR};
use crate::common::{Error, Result};
use crate::process::ProcessExecutor;
use crate::summary::{parse_final_summary, JobSummary};
use crate::url::{compose_resource_url, compose_without_query, with_trailing_slash};

/// Variables exported to every child; Debug prints only their names
#[derive(Clone, Default)]
struct ChildEnv(Vec<(&'static str, String)>);

impl fmt::Debug for ChildEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.0.iter().map(|(key, _)| key))
            .finish()
    }
}

/// Everything a scenario needs to build and run commands
///
/// Built once by bootstrap and handed to scenarios by reference; cloning
/// is cheap enough to give each parallel worker its own copy.
#[derive(Debug, Clone)]
pub struct TestContext {
    work_dir: PathBuf,
    transfer_exe: PathBuf,
    validator_exe: PathBuf,
    remotes: Remotes,
    timeouts: Timeouts,
    switches: Switches,
    env: ChildEnv,
}

impl TestContext {
    pub fn new(
        work_dir: impl Into<PathBuf>,
        transfer_exe: impl Into<PathBuf>,
        validator_exe: impl Into<PathBuf>,
        config: &Config,
    ) -> Self {
        Self {
            work_dir: work_dir.into(),
            transfer_exe: transfer_exe.into(),
            validator_exe: validator_exe.into(),
            remotes: config.remotes.clone(),
            timeouts: config.timeouts.clone(),
            switches: config.switches.clone(),
            env: ChildEnv(config.child_env()),
        }
    }

    /// Context for an already bootstrapped test root
    ///
    /// Assumes the executables were staged into `<test_root>/test_data`
    /// by an earlier `bootstrap`.
    pub fn from_staged(config: &Config) -> Result<Self> {
        let work_dir = config.paths.test_root.join(TEST_DATA_DIR);
        let staged = |configured: &Option<PathBuf>, what: &str| -> Result<PathBuf> {
            let path = configured
                .as_deref()
                .ok_or_else(|| Error::Config(format!("{} executable is not configured", what)))?;
            let name = executable_name(path)
                .ok_or_else(|| Error::Config(format!("{} executable has no file name", what)))?;
            let candidate = work_dir.join(name);
            if !candidate.is_file() {
                return Err(Error::Config(format!(
                    "{} executable is not staged at {}; run bootstrap first",
                    what,
                    candidate.display()
                )));
            }
            Ok(candidate)
        };

        let transfer = staged(&config.executables.transfer, "transfer")?;
        let validator = staged(&config.executables.validator, "validator")?;
        Ok(Self::new(work_dir, transfer, validator, config))
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// Path of `name` inside the working directory
    pub fn path(&self, name: impl AsRef<Path>) -> PathBuf {
        self.work_dir.join(name)
    }

    pub fn remotes(&self) -> &Remotes {
        &self.remotes
    }

    pub fn switches(&self) -> &Switches {
        &self.switches
    }

    /// Executor for the tool under test
    pub fn transfer(&self) -> ProcessExecutor {
        self.executor(&self.transfer_exe, self.timeouts.transfer())
    }

    /// Executor for the validator
    pub fn validator(&self) -> ProcessExecutor {
        self.executor(&self.validator_exe, self.timeouts.validator())
    }

    fn executor(&self, program: &Path, limit: std::time::Duration) -> ProcessExecutor {
        ProcessExecutor::new(program, limit)
            .with_working_dir(&self.work_dir)
            .with_env(self.env.0.iter().map(|(key, value)| (*key, value.clone())))
    }

    /// Run a transfer with JSON output and parse its final job summary
    ///
    /// A failing exit still yields a summary when the tool printed one,
    /// since scenarios routinely assert on failed transfer counts.
    pub async fn transfer_summary(&self, command: &Command) -> Result<JobSummary> {
        let command = command.clone().flag("output-type", "json");
        let output = match self.transfer().run_capturing(&command).await {
            Ok(output) => output,
            Err(e) if e.is_timeout() => return Err(e),
            Err(e) => match e.captured_output() {
                Some(output) => {
                    tracing::debug!(error = %e, "parsing summary of failed transfer");
                    output.to_string()
                }
                None => return Err(e),
            },
        };
        parse_final_summary(&output)
    }

    pub fn container_resource(&self, name: &str) -> Result<String> {
        self.compose(&self.remotes.container_sas_url, "container", name)
    }

    pub fn share_resource(&self, name: &str) -> Result<String> {
        self.compose(&self.remotes.share_sas_url, "share", name)
    }

    pub fn filesystem_resource(&self, name: &str) -> Result<String> {
        self.compose(&self.remotes.filesystem_sas_url, "filesystem", name)
    }

    pub fn premium_resource(&self, name: &str) -> Result<String> {
        self.compose(&self.remotes.premium_container_sas_url, "premium container", name)
    }

    pub fn oauth_validate_resource(&self, name: &str) -> Result<String> {
        self.compose(
            &self.remotes.container_oauth_validate_sas_url,
            "oauth validate container",
            name,
        )
    }

    /// Bucket inside the GCP service; access goes through the exported
    /// Google credentials, so any query on the service URL is dropped
    pub fn gcp_bucket_resource(&self, name: &str) -> Result<String> {
        let base = self
            .remotes
            .s2s_src_gcp_service_url
            .as_deref()
            .ok_or(Error::RemoteNotConfigured("gcp service"))?;
        Ok(compose_without_query(base, name))
    }

    /// OAuth container URLs carry no query; the name is appended directly
    pub fn oauth_container_resource(&self, name: &str) -> Result<String> {
        let base = self
            .remotes
            .container_oauth_url
            .as_deref()
            .ok_or(Error::RemoteNotConfigured("oauth container"))?;
        Ok(format!("{}{}", with_trailing_slash(base), name))
    }

    fn compose(&self, base: &Option<String>, remote: &'static str, name: &str) -> Result<String> {
        let base = base
            .as_deref()
            .ok_or(Error::RemoteNotConfigured(remote))?;
        Ok(compose_resource_url(base, name))
    }
}
