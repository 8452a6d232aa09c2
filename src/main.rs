//! Stash-protected git-hook QA task runner.
//!
//! Executes the tasks configured in `hookrun.toml` against the files relevant
//! to the invocation. Pre-commit runs stash unstaged and untracked changes
//! first, so tasks only validate the content that is about to be committed.

use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use hookrun::core::context::{ContextKind, FileSet, RunContext};
use hookrun::core::result::{RunReport, TaskResult};
use hookrun::events::EventPipeline;
use hookrun::exit_codes;
use hookrun::io::config::load_config;
use hookrun::io::git::{Git, Repository};
use hookrun::io::stash::{StashGuard, StashPopError};
use hookrun::logging;
use hookrun::runner::{RunOptions, run_tasks, tasks_from_config};

#[derive(Parser)]
#[command(
    name = "hookrun",
    version,
    about = "Stash-protected git-hook QA task runner"
)]
struct Cli {
    /// Path to the configuration file.
    #[arg(long, global = true, default_value = "hookrun.toml")]
    config: PathBuf,

    /// Print the run report as JSON instead of plain text.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run tasks against staged content (invoked by the git pre-commit hook).
    PreCommit,
    /// Run tasks ad hoc against the given paths (default: all tracked files).
    Run { paths: Vec<PathBuf> },
    /// Run tasks in integration (CI) mode against all tracked files.
    Ci,
}

fn main() {
    logging::init();
    match run() {
        Ok(code) => process::exit(code),
        Err(err) => {
            if err.downcast_ref::<StashPopError>().is_some() {
                // Stranded-stash failures get their full recovery message.
                eprintln!("{err:#}");
            } else {
                eprintln!("hookrun: {err:#}");
            }
            process::exit(exit_codes::FATAL);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    let workdir = std::env::current_dir().context("resolve working directory")?;
    let cfg = load_config(&cli.config)?;
    let git = Git::new(&workdir);

    let ctx = build_context(&cli.command, &git)?;
    let tasks = tasks_from_config(&cfg, &workdir)?;

    let mut pipeline = EventPipeline::new();
    pipeline.subscribe(Box::new(StashGuard::new(
        cfg.stash.clone(),
        Git::new(&workdir),
    )));

    let report = run_tasks(
        &ctx,
        &tasks,
        &mut pipeline,
        &RunOptions {
            stop_on_failure: cfg.stop_on_failure,
        },
    )?;

    print_report(&report, cli.json)?;
    Ok(if report.has_failures() {
        exit_codes::TASK_FAILED
    } else {
        exit_codes::OK
    })
}

fn build_context(command: &Command, git: &Git) -> Result<RunContext> {
    match command {
        Command::PreCommit => Ok(RunContext::new(
            ContextKind::PreCommit,
            FileSet::new(git.staged_files()?),
        )),
        Command::Run { paths } if !paths.is_empty() => Ok(RunContext::new(
            ContextKind::AdHoc,
            FileSet::new(paths.iter().cloned()),
        )),
        Command::Run { .. } => Ok(RunContext::new(
            ContextKind::AdHoc,
            FileSet::new(git.tracked_files()?),
        )),
        Command::Ci => Ok(RunContext::new(
            ContextKind::Integration,
            FileSet::new(git.tracked_files()?),
        )),
    }
}

fn print_report(report: &RunReport, json: bool) -> Result<()> {
    if json {
        let payload = serde_json::to_string_pretty(report).context("serialize report")?;
        println!("{payload}");
        return Ok(());
    }
    for outcome in &report.outcomes {
        match &outcome.result {
            TaskResult::Passed => println!("PASS {}", outcome.task),
            TaskResult::Skipped => println!("SKIP {}", outcome.task),
            TaskResult::Failed { message } => {
                println!("FAIL {}", outcome.task);
                let message = message.trim_end();
                if !message.is_empty() {
                    println!("{message}");
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_pre_commit() {
        let cli = Cli::parse_from(["hookrun", "pre-commit"]);
        assert!(matches!(cli.command, Command::PreCommit));
        assert_eq!(cli.config, PathBuf::from("hookrun.toml"));
    }

    #[test]
    fn parse_run_with_paths() {
        let cli = Cli::parse_from(["hookrun", "run", "src/lib.rs", "src/main.rs"]);
        match cli.command {
            Command::Run { paths } => assert_eq!(paths.len(), 2),
            _ => panic!("expected run command"),
        }
    }

    #[test]
    fn parse_ci_with_global_flags() {
        let cli = Cli::parse_from(["hookrun", "ci", "--json", "--config", "custom.toml"]);
        assert!(matches!(cli.command, Command::Ci));
        assert!(cli.json);
        assert_eq!(cli.config, PathBuf::from("custom.toml"));
    }
}
