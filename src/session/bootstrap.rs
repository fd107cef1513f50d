//! One-time preparation of a test run
//!
//! Recreates the working directory, stages both executables into it and
//! empties every configured remote through the validator's `clean` verb.

use std::path::{Path, PathBuf};

use crate::command::Command;
use crate::common::config::Config;
use crate::common::paths::{executable_name, remove_dir_if_exists, remove_log_files, TEST_DATA_DIR};
use crate::common::{Error, Result};
use crate::url::with_trailing_slash;

use super::context::TestContext;

/// Service kinds the validator knows how to clean
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceType {
    Blob,
    BlobFs,
    File,
    S3,
}

impl ServiceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceType::Blob => "Blob",
            ServiceType::BlobFs => "BlobFS",
            ServiceType::File => "File",
            ServiceType::S3 => "S3",
        }
    }
}

/// Whether a remote names one container/share or a whole account
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceType {
    Bucket,
    Account,
}

impl ResourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::Bucket => "Bucket",
            ResourceType::Account => "Account",
        }
    }
}

/// A remote to be emptied before the run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanTarget {
    pub name: &'static str,
    pub url: String,
    pub service: ServiceType,
    pub resource: ResourceType,
}

impl CleanTarget {
    pub fn command(&self) -> Command {
        Command::new("clean")
            .arg(&self.url)
            .flag("serviceType", self.service.as_str())
            .flag("resourceType", self.resource.as_str())
    }
}

/// Every configured remote with the service/resource kind it is cleaned as
///
/// The OAuth validation container is the same container as the OAuth one,
/// so only the latter is cleaned. S3 is skipped when S3 scenarios are off.
pub fn clean_targets(config: &Config) -> Vec<CleanTarget> {
    use ResourceType::{Account, Bucket};
    use ServiceType::{Blob, BlobFs, File, S3};

    let remotes = &config.remotes;
    let s3 = if config.switches.s3_tests_off {
        None
    } else {
        remotes.s2s_src_s3_service_url.clone()
    };

    let candidates = [
        ("filesystem", remotes.filesystem_url.clone(), BlobFs, Bucket),
        ("container", remotes.container_sas_url.clone(), Blob, Bucket),
        ("oauth container", remotes.container_oauth_url.as_deref().map(with_trailing_slash), Blob, Bucket),
        ("premium container", remotes.premium_container_sas_url.clone(), Blob, Bucket),
        ("s2s source blob account", remotes.s2s_src_blob_account_sas_url.clone(), Blob, Account),
        ("s2s source file account", remotes.s2s_src_file_account_sas_url.clone(), File, Account),
        ("s2s destination blob account", remotes.s2s_dst_blob_account_sas_url.clone(), Blob, Account),
        ("s2s source s3 service", s3, S3, Account),
        ("share", remotes.share_sas_url.clone(), File, Bucket),
    ];

    candidates
        .into_iter()
        .filter_map(|(name, url, service, resource)| {
            url.map(|url| CleanTarget {
                name,
                url,
                service,
                resource,
            })
        })
        .collect()
}

/// Prepare a run and return the context scenarios are driven with
///
/// Any failure aborts: a run against stale remotes or missing executables
/// would only produce misleading results.
pub async fn bootstrap(config: &Config) -> Result<TestContext> {
    cleanup_launch_dir_logs();

    let work_dir = config.paths.test_root.join(TEST_DATA_DIR);
    tracing::info!(path = %work_dir.display(), "preparing test directory");
    recreate_dir(&work_dir)?;

    let transfer = stage_executable(config.executables.transfer.as_deref(), "transfer", &work_dir)?;
    let validator = stage_executable(config.executables.validator.as_deref(), "validator", &work_dir)?;

    let ctx = TestContext::new(work_dir, transfer, validator, config);

    let validator = ctx.validator();
    for target in clean_targets(config) {
        tracing::info!(
            remote = target.name,
            service = target.service.as_str(),
            resource = target.resource.as_str(),
            "cleaning remote"
        );
        validator
            .run(&target.command())
            .await
            .map_err(|e| Error::Bootstrap(format!("failed to clean {}: {}", target.name, e)))?;
    }

    Ok(ctx)
}

/// Remove logs the tool left in the launch directory
pub fn teardown() {
    cleanup_launch_dir_logs();
}

fn cleanup_launch_dir_logs() {
    let Ok(dir) = std::env::current_dir() else {
        return;
    };
    match remove_log_files(&dir) {
        Ok(0) => {}
        Ok(count) => tracing::debug!(count, dir = %dir.display(), "removed log files"),
        Err(e) => tracing::warn!(error = %e, dir = %dir.display(), "could not clean log files"),
    }
}

fn recreate_dir(dir: &Path) -> Result<()> {
    remove_dir_if_exists(dir)
        .and_then(|()| std::fs::create_dir_all(dir))
        .map_err(|e| Error::Bootstrap(format!("cannot recreate {}: {}", dir.display(), e)))
}

/// Copy an executable into the work directory and return the staged path
///
/// Bare names are looked up on `PATH`.
fn stage_executable(configured: Option<&Path>, what: &str, work_dir: &Path) -> Result<PathBuf> {
    let configured = configured
        .ok_or_else(|| Error::Bootstrap(format!("{} executable is not configured", what)))?;

    let source = if configured.components().count() == 1 && !configured.exists() {
        which::which(configured).map_err(|e| {
            Error::Bootstrap(format!(
                "{} executable '{}' not found on PATH: {}",
                what,
                configured.display(),
                e
            ))
        })?
    } else {
        configured.to_path_buf()
    };

    if !source.is_file() {
        return Err(Error::Bootstrap(format!(
            "please verify the {} executable location: {}",
            what,
            source.display()
        )));
    }

    let name = executable_name(&source)
        .ok_or_else(|| Error::Bootstrap(format!("{} executable has no file name", what)))?;
    let staged = work_dir.join(name);
    std::fs::copy(&source, &staged).map_err(|e| {
        Error::Bootstrap(format!("cannot stage {}: {}", source.display(), e))
    })?;

    tracing::debug!(from = %source.display(), to = %staged.display(), "staged {what} executable");
    Ok(staged)
}
