//! Test runner implementation
//!
//! Executes scenario steps against the tool and validator of a prepared
//! [`TestContext`], checking exit status, output and job summaries.

use std::fs::{self, File};
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use colored::Colorize;
use regex::{Captures, Regex};

use crate::command::Command;
use crate::common::{Error, Result};
use crate::fixtures::{self, WRITE_CHUNK};
use crate::process::{PipeMode, ProcessExecutor};
use crate::session::TestContext;
use crate::summary::parse_final_summary;
use crate::url::redact_signature;

use super::config::{CommandExpectation, Invocation, TestScenario, TestStep};

/// Result of a test run
#[derive(Debug)]
pub struct TestResult {
    pub name: String,
    pub passed: bool,
    pub steps_run: usize,
    pub steps_total: usize,
    pub error: Option<String>,
}

/// Load a scenario from a YAML file
pub fn load_scenario(path: &Path) -> Result<TestScenario> {
    let content = fs::read_to_string(path).map_err(|e| Error::FileRead {
        path: path.display().to_string(),
        error: e.to_string(),
    })?;

    serde_yaml::from_str(&content)
        .map_err(|e| Error::ScenarioParse(format!("{}: {}", path.display(), e)))
}

/// Run a test scenario from a YAML file
pub async fn run_scenario(path: &Path, ctx: &TestContext, verbose: bool) -> Result<TestResult> {
    let scenario = load_scenario(path)?;
    Ok(run_loaded(scenario, ctx, verbose).await)
}

/// Run an already parsed scenario
pub async fn run_loaded(scenario: TestScenario, ctx: &TestContext, verbose: bool) -> TestResult {
    let steps_total = scenario.steps.len();

    println!(
        "\n{} {}",
        "Running Test:".blue().bold(),
        scenario.name.white().bold()
    );

    if let Some(desc) = &scenario.description {
        println!("  {}", desc.dimmed());
    }

    println!("\n{}", "Steps:".cyan());

    for (i, step) in scenario.steps.iter().enumerate() {
        let step_num = i + 1;

        if let Err(e) = execute_step(ctx, step, step_num, verbose).await {
            println!("  {} Step {}: {}", "✗".red(), step_num, e);
            tracing::debug!(scenario = %scenario.name, step = step_num, error = %e, "step failed");

            return TestResult {
                name: scenario.name,
                passed: false,
                steps_run: step_num,
                steps_total,
                error: Some(e.to_string()),
            };
        }
    }

    println!(
        "\n{} {}\n",
        "✓".green().bold(),
        "Test Passed".green().bold()
    );

    TestResult {
        name: scenario.name,
        passed: true,
        steps_run: steps_total,
        steps_total,
        error: None,
    }
}

/// Execute a single test step
async fn execute_step(
    ctx: &TestContext,
    step: &TestStep,
    step_num: usize,
    verbose: bool,
) -> Result<()> {
    match step {
        TestStep::Generate {
            pattern,
            path,
            size,
            count,
        } => {
            let path = PathBuf::from(expand(path, ctx)?);
            match count {
                Some(count) => fixtures::n_files(*size, *count, &path)?,
                None => pattern.generate(&path, *size)?,
            };
            let label = match count {
                Some(count) => format!("generate {} x {} bytes in {}", count, size, path.display()),
                None => format!("generate {} {} bytes at {}", pattern.as_str(), size, path.display()),
            };
            println!("  {} Step {}: {}", "✓".green(), step_num, label.dimmed());
            Ok(())
        }
        TestStep::Transfer { invocation, expect } => {
            execute_command_step(ctx, ctx.transfer(), invocation, None, expect.as_ref(), step_num, verbose)
                .await
        }
        TestStep::Validate { invocation, expect } => {
            execute_command_step(ctx, ctx.validator(), invocation, None, expect.as_ref(), step_num, verbose)
                .await
        }
        TestStep::Pipe {
            invocation,
            source,
            destination,
            expect,
        } => {
            let expand_path = |path: &Option<String>| -> Result<Option<PathBuf>> {
                path.as_deref()
                    .map(|p| expand(p, ctx).map(PathBuf::from))
                    .transpose()
            };
            let mode = PipeMode::from_paths(expand_path(source)?, expand_path(destination)?)?;
            execute_command_step(
                ctx,
                ctx.transfer(),
                invocation,
                Some(&mode),
                expect.as_ref(),
                step_num,
                verbose,
            )
            .await
        }
        TestStep::Compare { left, right } => {
            let left = PathBuf::from(expand(left, ctx)?);
            let right = PathBuf::from(expand(right, ctx)?);
            compare_paths(&left, &right)?;
            println!(
                "  {} Step {}: {}",
                "✓".green(),
                step_num,
                format!("compare {} {}", left.display(), right.display()).dimmed()
            );
            Ok(())
        }
    }
}

/// Build the command for an invocation with placeholders resolved
pub fn build_command(invocation: &Invocation, ctx: &TestContext) -> Result<Command> {
    let mut command = Command::new(&invocation.verb);
    for arg in &invocation.args {
        command = command.arg(expand(arg, ctx)?);
    }
    for (name, value) in &invocation.flags {
        command = command.flag(name, expand(&flag_value(name, value)?, ctx)?);
    }
    Ok(command)
}

fn flag_value(name: &str, value: &serde_yaml::Value) -> Result<String> {
    match value {
        serde_yaml::Value::String(s) => Ok(s.clone()),
        serde_yaml::Value::Bool(b) => Ok(b.to_string()),
        serde_yaml::Value::Number(n) => Ok(n.to_string()),
        _ => Err(Error::ScenarioParse(format!(
            "flag '{}' must be a string, number or boolean",
            name
        ))),
    }
}

/// Execute a transfer, validate or pipe step
async fn execute_command_step(
    ctx: &TestContext,
    executor: ProcessExecutor,
    invocation: &Invocation,
    pipe: Option<&PipeMode>,
    expect: Option<&CommandExpectation>,
    step_num: usize,
    verbose: bool,
) -> Result<()> {
    let default_expect = CommandExpectation::default();
    let expect = expect.unwrap_or(&default_expect);

    let mut command = build_command(invocation, ctx)?;
    if expect.needs_summary() {
        command = command.flag("output-type", "json");
    }
    let label = redact_signature(&command.to_command_line());
    let limit = invocation
        .timeout_secs
        .map(Duration::from_secs)
        .unwrap_or_else(|| executor.default_timeout());

    let outcome = match pipe {
        Some(mode) => executor.run_piped(&command, mode, limit).await,
        None => executor.run_with_timeout(&command, limit).await,
    };

    // A timeout always fails the step; a failed exit may be what is expected
    let (failure, output) = match outcome {
        Ok(result) => (None, result.output),
        Err(e) if e.is_timeout() => return Err(e),
        Err(e) => match e.captured_output() {
            Some(output) => (Some(e.to_string()), output.to_string()),
            None => return Err(e),
        },
    };

    if verbose && !output.trim().is_empty() {
        for line in output.lines() {
            println!("      {}", line.dimmed());
        }
    }

    let should_succeed = !expect.expects_failure();
    match (&failure, should_succeed) {
        (Some(message), true) => return Err(Error::TestAssertion(message.clone())),
        (None, false) => {
            return Err(Error::TestAssertion(format!(
                "Command '{}' expected to fail, but it succeeded",
                label
            )))
        }
        _ => {}
    }

    if let Some(needle) = &expect.output_contains {
        if !output.contains(needle.as_str()) {
            return Err(Error::TestAssertion(format!(
                "Expected output of '{}' to contain '{}'",
                command.verb(),
                needle
            )));
        }
    }

    if expect.needs_summary() {
        let summary = parse_final_summary(&output)?;
        if let Some(completed) = expect.transfers_completed {
            if summary.transfers_completed != completed {
                return Err(Error::TestAssertion(format!(
                    "Expected {} completed transfers, got {}",
                    completed, summary.transfers_completed
                )));
            }
        }
        if let Some(failed) = expect.transfers_failed {
            if summary.transfers_failed != failed {
                return Err(Error::TestAssertion(format!(
                    "Expected {} failed transfers, got {}",
                    failed, summary.transfers_failed
                )));
            }
        }
    }

    let suffix = if failure.is_some() { " (expected failure)" } else { "" };
    println!(
        "  {} Step {}: {}{}",
        "✓".green(),
        step_num,
        label.dimmed(),
        suffix
    );
    Ok(())
}

fn placeholder_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\{(work|container|share|filesystem|premium|oauth|gcp)(?::([^}]*))?\}")
            .expect("placeholder pattern is valid")
    })
}

/// Replace `{work}` and `{remote:NAME}` placeholders in `text`
pub fn expand(text: &str, ctx: &TestContext) -> Result<String> {
    let mut failure = None;
    let expanded = placeholder_pattern().replace_all(text, |caps: &Captures| {
        let name = caps.get(2).map(|m| m.as_str()).unwrap_or("");
        let resolved = match &caps[1] {
            "work" => Ok(ctx.work_dir().display().to_string()),
            "container" => ctx.container_resource(name),
            "share" => ctx.share_resource(name),
            "filesystem" => ctx.filesystem_resource(name),
            "premium" => ctx.premium_resource(name),
            "oauth" => ctx.oauth_container_resource(name),
            _ => ctx.gcp_bucket_resource(name),
        };
        resolved.unwrap_or_else(|e| {
            failure.get_or_insert(e);
            String::new()
        })
    });

    match failure {
        Some(e) => Err(e),
        None => Ok(expanded.into_owned()),
    }
}

/// Require two files to be byte-identical, or two directory trees to hold
/// the same relative paths with identical contents
pub fn compare_paths(left: &Path, right: &Path) -> Result<()> {
    let metadata = |path: &Path| {
        fs::metadata(path).map_err(|e| Error::FileRead {
            path: path.display().to_string(),
            error: e.to_string(),
        })
    };
    let left_meta = metadata(left)?;
    let right_meta = metadata(right)?;

    if left_meta.is_dir() != right_meta.is_dir() {
        return Err(Error::TestAssertion(format!(
            "'{}' and '{}' are not both directories",
            left.display(),
            right.display()
        )));
    }

    if !left_meta.is_dir() {
        if !same_contents(left, right)? {
            return Err(Error::TestAssertion(format!(
                "'{}' and '{}' differ",
                left.display(),
                right.display()
            )));
        }
        return Ok(());
    }

    let left_entries = sorted_entries(left)?;
    let right_entries = sorted_entries(right)?;
    if left_entries != right_entries {
        return Err(Error::TestAssertion(format!(
            "'{}' has entries {:?}, '{}' has {:?}",
            left.display(),
            left_entries,
            right.display(),
            right_entries
        )));
    }
    for name in &left_entries {
        compare_paths(&left.join(name), &right.join(name))?;
    }
    Ok(())
}

fn sorted_entries(dir: &Path) -> io::Result<Vec<String>> {
    let mut names = fs::read_dir(dir)?
        .map(|entry| entry.map(|e| e.file_name().to_string_lossy().into_owned()))
        .collect::<io::Result<Vec<_>>>()?;
    names.sort();
    Ok(names)
}

fn same_contents(left: &Path, right: &Path) -> io::Result<bool> {
    if fs::metadata(left)?.len() != fs::metadata(right)?.len() {
        return Ok(false);
    }

    let mut a = BufReader::with_capacity(WRITE_CHUNK as usize, File::open(left)?);
    let mut b = BufReader::with_capacity(WRITE_CHUNK as usize, File::open(right)?);
    loop {
        let chunk_a = a.fill_buf()?;
        let chunk_b = b.fill_buf()?;
        if chunk_a.is_empty() || chunk_b.is_empty() {
            return Ok(chunk_a.is_empty() && chunk_b.is_empty());
        }
        let n = chunk_a.len().min(chunk_b.len());
        if chunk_a[..n] != chunk_b[..n] {
            return Ok(false);
        }
        a.consume(n);
        b.consume(n);
    }
}
