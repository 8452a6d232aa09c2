//! Git adapter for the task runner.
//!
//! The runner needs precise answers about working-tree state (pending diff,
//! untracked files, staged files), so we keep a small, explicit wrapper around
//! `git` subprocess calls. The [`Repository`] trait is the seam the stash
//! guard depends on; tests substitute an in-memory fake.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use anyhow::{Context, Result, anyhow};
use tracing::{debug, instrument};

/// Version-control operations the runner consumes.
pub trait Repository {
    /// Run a git subcommand, returning stdout. Fails on nonzero exit with the
    /// trimmed stderr in the error message.
    fn run(&self, subcommand: &str, args: &[&str]) -> Result<String>;

    /// Paths that differ between the working tree and the index.
    fn pending_diff(&self) -> Result<Vec<PathBuf>>;

    /// Paths present in the working tree but unknown to git.
    fn untracked_files(&self) -> Result<Vec<PathBuf>>;

    /// Paths staged for the next commit.
    fn staged_files(&self) -> Result<Vec<PathBuf>>;

    /// All paths registered in the index.
    fn tracked_files(&self) -> Result<Vec<PathBuf>>;
}

/// Wrapper for executing git commands in a working directory.
#[derive(Debug, Clone)]
pub struct Git {
    workdir: PathBuf,
}

impl Git {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
        }
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    fn run_capture(&self, args: &[&str]) -> Result<String> {
        let output = self.run_checked(args)?;
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    fn run_checked(&self, args: &[&str]) -> Result<Output> {
        let output = self.run_raw(args)?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("git {} failed: {}", args.join(" "), stderr.trim()));
        }
        Ok(output)
    }

    fn run_raw(&self, args: &[&str]) -> Result<Output> {
        Command::new("git")
            .args(args)
            .current_dir(&self.workdir)
            .output()
            .with_context(|| format!("spawn git {}", args.join(" ")))
    }
}

impl Repository for Git {
    #[instrument(skip_all, fields(subcommand))]
    fn run(&self, subcommand: &str, args: &[&str]) -> Result<String> {
        let mut full = vec![subcommand];
        full.extend_from_slice(args);
        debug!(args = ?args, "running git subcommand");
        self.run_capture(&full)
    }

    fn pending_diff(&self) -> Result<Vec<PathBuf>> {
        let out = self.run_capture(&["diff", "--name-only"])?;
        Ok(parse_path_lines(&out))
    }

    fn untracked_files(&self) -> Result<Vec<PathBuf>> {
        let out = self.run_capture(&["ls-files", "--others", "--exclude-standard"])?;
        Ok(parse_path_lines(&out))
    }

    fn staged_files(&self) -> Result<Vec<PathBuf>> {
        let out = self.run_capture(&["diff", "--cached", "--name-only", "--diff-filter=ACMR"])?;
        Ok(parse_path_lines(&out))
    }

    fn tracked_files(&self) -> Result<Vec<PathBuf>> {
        let out = self.run_capture(&["ls-files"])?;
        Ok(parse_path_lines(&out))
    }
}

fn parse_path_lines(out: &str) -> Vec<PathBuf> {
    out.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(PathBuf::from)
        .collect()
}
