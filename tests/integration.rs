//! End-to-end integration tests for the transfer harness
//!
//! These tests drive the `mock_transfer` binary, which plays both the
//! transfer tool and the validator against `file://` remotes, through
//! bootstrap, plain and capturing runs, piping and scenario files.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command as StdCommand;
use std::time::{Duration, Instant};

use harness::common::config::Config;
use harness::process::PipeMode;
use harness::session::{self, TestContext};
use harness::summary::final_summary_text;
use harness::{fixtures, testing, Command, Error};

/// Scratch directories and configuration for one test
struct TestEnv {
    /// Temporary directory for this test
    _temp: tempfile::TempDir,
    /// Directory standing in for the remote container
    remote: PathBuf,
    config: Config,
}

impl TestEnv {
    fn new() -> Self {
        let temp = tempfile::tempdir().expect("Failed to create temp dir");
        let remote = temp.path().join("remote");

        let mut config = Config::default();
        config.paths.test_root = temp.path().join("root");
        config.executables.transfer = Some(mock_transfer());
        config.executables.validator = Some(mock_transfer());
        config.remotes.container_sas_url =
            Some(format!("file://{}?sv=2020&sig=fake", remote.display()));
        config.timeouts.transfer_secs = 30;
        config.timeouts.validator_secs = 30;

        Self {
            _temp: temp,
            remote,
            config,
        }
    }

    async fn bootstrap(&self) -> TestContext {
        session::bootstrap(&self.config)
            .await
            .expect("bootstrap failed")
    }
}

fn mock_transfer() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_mock_transfer"))
}

fn harness_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_harness"))
}

fn upload(source: &Path, destination: &str) -> Command {
    Command::new("copy")
        .arg(source.display().to_string())
        .arg(destination)
        .flag("recursive", "true")
        .flag("log-level", "INFO")
}

#[tokio::test]
async fn test_bootstrap_prepares_directory_and_remote() {
    let env = TestEnv::new();
    let ctx = env.bootstrap().await;

    assert!(ctx.work_dir().ends_with("test_data"));
    assert!(ctx.path("mock_transfer").is_file() || ctx.path("mock_transfer.exe").is_file());
    // clean creates the remote when it does not exist yet
    assert!(env.remote.is_dir());
}

#[tokio::test]
async fn test_bootstrap_fails_for_missing_executable() {
    let mut env = TestEnv::new();
    env.config.executables.validator = Some(PathBuf::from("/nonexistent/testSuite"));

    let err = session::bootstrap(&env.config).await.unwrap_err();
    assert!(matches!(err, Error::Bootstrap(_)));
}

#[tokio::test]
async fn test_1kb_file_round_trip() {
    let env = TestEnv::new();
    let ctx = env.bootstrap().await;

    let file = fixtures::uniform(&ctx.path("test1KB.txt"), 1024).unwrap();
    let remote = ctx.container_resource("test1KB.txt").unwrap();

    let summary = ctx.transfer_summary(&upload(&file, &remote)).await.unwrap();
    assert_eq!(summary.transfers_completed, 1);
    assert_eq!(summary.transfers_failed, 0);
    assert_eq!(summary.total_bytes_transferred, 1024);

    let uploaded = env.remote.join("test1KB.txt");
    assert_eq!(fs::read(&uploaded).unwrap(), vec![b'0'; 1024]);

    ctx.validator()
        .run(&Command::new("testBlob").arg(file.display().to_string()).arg(&remote))
        .await
        .expect("validation failed");
}

#[tokio::test]
async fn test_ten_file_directory_round_trip() {
    let env = TestEnv::new();
    let ctx = env.bootstrap().await;

    let dir = fixtures::n_files(1024, 10, &ctx.path("dir_10_files")).unwrap();
    let summary = ctx
        .transfer_summary(&upload(&dir, &ctx.container_resource("").unwrap()))
        .await
        .unwrap();
    assert_eq!(summary.transfers_completed, 10);
    assert!(summary.all_succeeded(10));

    let remote_dir = ctx.container_resource("dir_10_files").unwrap();
    ctx.validator()
        .run(
            &Command::new("testBlob")
                .arg(dir.display().to_string())
                .arg(&remote_dir)
                .flag("is-object-dir", "true"),
        )
        .await
        .expect("directory validation failed");

    assert_eq!(fs::read_dir(env.remote.join("dir_10_files")).unwrap().count(), 10);
}

#[tokio::test]
async fn test_validator_reports_mismatch() {
    let env = TestEnv::new();
    let ctx = env.bootstrap().await;

    let local = fixtures::uniform(&ctx.path("local.txt"), 100).unwrap();
    fs::write(env.remote.join("local.txt"), b"different").unwrap();

    let err = ctx
        .validator()
        .run(
            &Command::new("testBlob")
                .arg(local.display().to_string())
                .arg(ctx.container_resource("local.txt").unwrap()),
        )
        .await
        .unwrap_err();

    match err {
        Error::ProcessFailed { code, output, .. } => {
            assert_eq!(code, Some(1));
            assert!(output.contains("validation failed"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_failed_job_still_yields_summary() {
    let env = TestEnv::new();
    let ctx = env.bootstrap().await;

    let summary = ctx
        .transfer_summary(&Command::new("fail").arg("3"))
        .await
        .unwrap();
    assert_eq!(summary.transfers_completed, 0);
    assert_eq!(summary.transfers_failed, 1);
    assert_eq!(summary.job_status.as_deref(), Some("Failed"));
}

#[tokio::test]
async fn test_failed_job_summary_survives_stderr_writes() {
    let env = TestEnv::new();
    let ctx = env.bootstrap().await;
    let command = Command::new("fail").arg("3").flag("output-type", "json");

    for attempt in 0..100 {
        let err = ctx.transfer().run(&command).await.unwrap_err();
        let output = err.captured_output().expect("failed run keeps its output");
        let text = final_summary_text(output)
            .unwrap_or_else(|e| panic!("attempt {attempt}: {e}\n{output}"));
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["MessageType"], "EndOfJob");
        assert!(
            output.trim_end().ends_with("failing with exit code 3"),
            "attempt {attempt}: stderr line out of order\n{output}"
        );
    }
}

#[tokio::test]
async fn test_timeout_does_not_hang() {
    let env = TestEnv::new();
    let ctx = env.bootstrap().await;

    let started = Instant::now();
    let err = ctx
        .transfer()
        .run_with_timeout(&Command::new("sleep").arg("30"), Duration::from_secs(1))
        .await
        .unwrap_err();

    assert!(err.is_timeout(), "unexpected error: {err}");
    assert!(started.elapsed() < Duration::from_secs(15));
    assert!(err.captured_output().unwrap().contains("sleeping"));
}

#[tokio::test]
async fn test_piped_upload_and_download() {
    let env = TestEnv::new();
    let ctx = env.bootstrap().await;

    let source = fixtures::file_with_contents(
        &ctx.path("piped.bin"),
        fixtures::random_bytes(256 * 1024, 42),
    )
    .unwrap();
    let remote = ctx.container_resource("piped.bin").unwrap();

    ctx.transfer()
        .run_piped(
            &Command::new("copy").arg(&remote).flag("from-to", "PipeBlob"),
            &PipeMode::Source(source.clone()),
            Duration::from_secs(30),
        )
        .await
        .expect("piped upload failed");
    assert_eq!(fs::read(env.remote.join("piped.bin")).unwrap(), fs::read(&source).unwrap());

    let downloaded = ctx.path("downloaded.bin");
    let result = ctx
        .transfer()
        .run_piped(
            &Command::new("copy").arg(&remote).flag("from-to", "BlobPipe"),
            &PipeMode::Destination(downloaded.clone()),
            Duration::from_secs(30),
        )
        .await
        .expect("piped download failed");

    testing::compare_paths(&source, &downloaded).unwrap();
    // only stderr is captured when stdout feeds the destination file
    assert!(result.output.contains("downloaded"));
    assert!(result.output.len() < 1024);
}

#[tokio::test]
async fn test_scenario_file_passes() {
    let env = TestEnv::new();
    let ctx = env.bootstrap().await;

    let scenario = ctx.path("upload.yaml");
    fs::write(
        &scenario,
        r#"
name: upload and download
description: round trip through the mock remote
steps:
  - action: generate
    path: "{work}/scenario.txt"
    size: 2048
  - action: transfer
    verb: copy
    args: ["{work}/scenario.txt", "{container:scenario.txt}"]
    expect:
      transfers_completed: 1
      transfers_failed: 0
  - action: validate
    verb: testBlob
    args: ["{work}/scenario.txt", "{container:scenario.txt}"]
    expect:
      output_contains: passed
  - action: pipe
    verb: copy
    args: ["{container:scenario.txt}"]
    flags: { from-to: BlobPipe }
    destination: "{work}/back.txt"
  - action: compare
    left: "{work}/scenario.txt"
    right: "{work}/back.txt"
  - action: transfer
    verb: copy
    args: ["{work}/missing.txt", "{container:missing.txt}"]
    expect:
      success: false
      transfers_failed: 1
"#,
    )
    .unwrap();

    let result = testing::run_scenario(&scenario, &ctx, false).await.unwrap();
    assert!(result.passed, "scenario failed: {:?}", result.error);
    assert_eq!(result.steps_run, 6);
}

#[test]
fn test_cli_url_composition() {
    let output = StdCommand::new(harness_bin())
        .args(["url", "https://acct.blob/container?sig=abc", "dir/file.txt"])
        .output()
        .expect("Failed to run harness");

    assert!(output.status.success());
    assert_eq!(
        String::from_utf8_lossy(&output.stdout).trim(),
        "https://acct.blob/container/dir/file.txt?sig=abc"
    );
}

#[test]
fn test_cli_summary_from_file() {
    let temp = tempfile::tempdir().unwrap();
    let log = temp.path().join("output.txt");
    fs::write(
        &log,
        concat!(
            "INFO: Scanning...\n",
            r#"{"MessageType":"Progress","MessageContent":"{\"TransfersCompleted\":\"1\",\"TransfersFailed\":\"0\"}"}"#,
            "\n",
            r#"{"MessageType":"EndOfJob","MessageContent":"{\"TransfersCompleted\":\"7\",\"TransfersFailed\":\"2\"}"}"#,
            "\nFinal Job Status: CompletedWithErrors\n",
        ),
    )
    .unwrap();

    let output = StdCommand::new(harness_bin())
        .arg("summary")
        .arg(&log)
        .output()
        .expect("Failed to run harness");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Completed:  7"));
    assert!(stdout.contains("Failed:     2"));
}

#[test]
fn test_cli_bootstrap_writes_log_file() {
    let env = TestEnv::new();
    let config_file = env.remote.with_file_name("config.toml");
    fs::write(
        &config_file,
        format!(
            "[executables]\ntransfer = {:?}\nvalidator = {:?}\n\n[paths]\ntest_root = {:?}\n\n[remotes]\ncontainer_sas_url = {:?}\n",
            mock_transfer().display().to_string(),
            mock_transfer().display().to_string(),
            env.config.paths.test_root.display().to_string(),
            env.config.remotes.container_sas_url.as_deref().unwrap(),
        ),
    )
    .unwrap();
    let log = env.remote.with_file_name("harness.log");

    let output = StdCommand::new(harness_bin())
        .arg("--config")
        .arg(&config_file)
        .arg("--log-file")
        .arg(&log)
        .arg("bootstrap")
        .env_remove("RUST_LOG")
        .env_remove("CONTAINER_SAS_URL")
        .env_remove("TEST_DIRECTORY_PATH")
        .env_remove("AZCOPY_EXECUTABLE_PATH")
        .env_remove("TEST_SUITE_EXECUTABLE_LOCATION")
        .output()
        .expect("Failed to run harness");

    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let logged = fs::read_to_string(&log).unwrap();
    assert!(logged.contains("preparing test directory"));
    assert!(logged.contains("sig=REDACTED"));
    assert!(!logged.contains("sig=fake"));
    assert!(env.remote.is_dir());
}

#[test]
fn test_cli_generate_refuses_bad_partial_sparse_size() {
    let temp = tempfile::tempdir().unwrap();
    let target = temp.path().join("sparse.bin");

    let output = StdCommand::new(harness_bin())
        .args(["generate", "partial-sparse"])
        .arg(&target)
        .args(["--size", "1000"])
        .output()
        .expect("Failed to run harness");

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Error:"));
    assert!(!target.exists());
}
