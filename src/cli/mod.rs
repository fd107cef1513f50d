//! CLI command handling
//!
//! Dispatches CLI commands and formats output.

use std::io::Read;
use std::path::Path;

use colored::Colorize;

use crate::commands::Commands;
use crate::common::config::Config;
use crate::common::{Error, Result};
use crate::fixtures;
use crate::session::{self, TestContext};
use crate::summary::{extract_final_object_by_lines, final_summary_text, JobSummary};
use crate::testing::{self, TestResult};
use crate::url::{compose_resource_url, compose_without_query};

/// Dispatch a CLI command
pub async fn dispatch(command: Commands, config: &Config) -> Result<()> {
    match command {
        Commands::Bootstrap => {
            config.log_effective();
            let ctx = session::bootstrap(config).await?;
            println!("Test directory ready: {}", ctx.work_dir().display());
            Ok(())
        }

        Commands::Test {
            paths,
            verbose,
            no_bootstrap,
        } => {
            config.log_effective();
            let ctx = if no_bootstrap {
                TestContext::from_staged(config)?
            } else {
                session::bootstrap(config).await?
            };

            let mut results = Vec::with_capacity(paths.len());
            for path in &paths {
                results.push(testing::run_scenario(path, &ctx, verbose).await?);
            }
            session::teardown();

            print_results(&results);
            let failed = results.iter().filter(|r| !r.passed).count();
            if failed > 0 {
                return Err(Error::TestAssertion(format!(
                    "{} of {} scenarios failed",
                    failed,
                    results.len()
                )));
            }
            Ok(())
        }

        Commands::Summary { file, legacy, raw } => {
            let output = read_input(file.as_deref())?;
            let text = if legacy {
                extract_final_object_by_lines(&output)
                    .ok_or(Error::MalformedOutput(output.len()))?
            } else {
                final_summary_text(&output)?
            };

            if raw {
                println!("{}", text);
                return Ok(());
            }

            let summary = JobSummary::parse(&text)?;
            if let Some(id) = &summary.job_id {
                println!("Job:        {}", id);
            }
            if let Some(status) = &summary.job_status {
                println!("Status:     {}", status);
            }
            println!("Completed:  {}", summary.transfers_completed);
            println!("Failed:     {}", summary.transfers_failed);
            println!("Skipped:    {}", summary.transfers_skipped);
            println!("Total:      {}", summary.total_transfers);
            println!("Bytes:      {}", summary.total_bytes_transferred);
            Ok(())
        }

        Commands::Generate {
            pattern,
            path,
            size,
            count,
        } => {
            let created = match count {
                Some(count) => fixtures::n_files(size, count, &path)?,
                None => pattern.generate(&path, size)?,
            };
            println!("{}", created.display());
            Ok(())
        }

        Commands::Url {
            base,
            name,
            no_query,
        } => {
            let url = if no_query {
                compose_without_query(&base, &name)
            } else {
                compose_resource_url(&base, &name)
            };
            println!("{}", url);
            Ok(())
        }
    }
}

fn read_input(file: Option<&Path>) -> Result<String> {
    match file {
        Some(path) => std::fs::read_to_string(path).map_err(|e| Error::FileRead {
            path: path.display().to_string(),
            error: e.to_string(),
        }),
        None => {
            let mut input = String::new();
            std::io::stdin().read_to_string(&mut input)?;
            Ok(input)
        }
    }
}

fn print_results(results: &[TestResult]) {
    let passed = results.iter().filter(|r| r.passed).count();
    println!("{}", "Results:".cyan());
    for result in results {
        if result.passed {
            println!("  {} {}", "✓".green(), result.name);
        } else {
            println!(
                "  {} {} (step {}/{}): {}",
                "✗".red(),
                result.name,
                result.steps_run,
                result.steps_total,
                result.error.as_deref().unwrap_or("unknown error")
            );
        }
    }
    let line = format!("{} passed, {} failed", passed, results.len() - passed);
    if passed == results.len() {
        println!("\n{}", line.green().bold());
    } else {
        println!("\n{}", line.red().bold());
    }
}
