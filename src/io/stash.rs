//! Working-tree isolation around task execution.
//!
//! In a pre-commit run, unstaged and untracked changes are stashed away before
//! any task starts, so tasks see exactly the content that is about to be
//! committed. The stash is popped on every exit path afterwards: normal
//! completion, task failure, or a runner error.
//!
//! The failure handling is deliberately asymmetric. A failed save means
//! nothing was touched, so the run proceeds without isolation and the failure
//! is only logged. A failed pop means the user's edits may be stranded in the
//! stash, so it is raised as a fatal [`StashPopError`].

use std::error::Error;
use std::fmt;

use anyhow::Result;
use tracing::{debug, info, instrument, warn};

use crate::core::context::{ContextKind, RunContext};
use crate::core::result::RunReport;
use crate::events::RunSubscriber;
use crate::io::config::StashConfig;
use crate::io::git::Repository;

/// Stash message, so a stranded stash is recognizable in `git stash list`.
const STASH_MESSAGE: &str = "hookrun";

/// Fatal error: a held stash could not be popped.
#[derive(Debug)]
pub struct StashPopError {
    details: String,
}

impl StashPopError {
    fn new(details: impl Into<String>) -> Self {
        Self {
            details: details.into(),
        }
    }
}

impl fmt::Display for StashPopError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "failed to restore stashed changes: {}\n\
             your unstaged changes are still in the git stash; \
             run `git stash pop` to recover them",
            self.details
        )
    }
}

impl Error for StashPopError {}

/// Guard that saves and restores the working tree's unstaged state.
///
/// State machine: `Idle -> Saved -> Idle`, one cycle per run. The held flag is
/// private and owned exclusively by the guard; it is set only after a
/// successful save and cleared unconditionally once a pop is attempted.
pub struct StashGuard<R: Repository> {
    config: StashConfig,
    repo: R,
    stash_held: bool,
}

impl<R: Repository> StashGuard<R> {
    pub fn new(config: StashConfig, repo: R) -> Self {
        Self {
            config,
            repo,
            stash_held: false,
        }
    }

    /// Stash unstaged and untracked changes ahead of task execution.
    ///
    /// Runs only when protection is enabled, the context is a pre-commit run,
    /// and there is something to stash. Save failures are swallowed: the run
    /// proceeds without working-tree isolation and no pop will be attempted.
    #[instrument(skip_all, fields(kind = ?ctx.kind()))]
    pub fn save_stash(&mut self, ctx: &RunContext) {
        if !self.can_stash(ctx.kind()) {
            return;
        }

        let pending = match self.repo.pending_diff() {
            Ok(paths) => paths,
            Err(err) => {
                warn!(err = %err, "could not read pending diff, skipping stash");
                return;
            }
        };
        let untracked = match self.repo.untracked_files() {
            Ok(paths) => paths,
            Err(err) => {
                warn!(err = %err, "could not list untracked files, skipping stash");
                return;
            }
        };
        if pending.is_empty() && untracked.is_empty() {
            debug!("working tree matches index, nothing to stash");
            return;
        }

        let mut args = vec!["save"];
        if !untracked.is_empty() {
            args.push("--include-untracked");
        }
        // Keep staged content in place; only unstaged edits are pulled away.
        args.push("--keep-index");
        args.push(STASH_MESSAGE);

        match self.repo.run("stash", &args) {
            Ok(_) => {
                info!(
                    pending = pending.len(),
                    untracked = untracked.len(),
                    "stashed unstaged changes"
                );
                self.stash_held = true;
            }
            Err(err) => {
                // Nothing was touched; prefer running unprotected over
                // aborting the whole hook.
                warn!(err = %err, "stash save failed, running without working-tree isolation");
            }
        }
    }

    /// Restore the stash saved by [`StashGuard::save_stash`].
    ///
    /// A pop is attempted at most once per save and never without a prior
    /// successful save. Unlike save failures, a failed pop is fatal.
    #[instrument(skip_all)]
    pub fn pop_stash(&mut self) -> Result<()> {
        if !self.config.enabled || !self.stash_held {
            return Ok(());
        }
        // Cleared before the attempt so a failed pop is never retried.
        self.stash_held = false;

        match self.repo.run("stash", &["pop"]) {
            Ok(_) => {
                info!("restored stashed changes");
                Ok(())
            }
            Err(err) => Err(StashPopError::new(format!("{err:#}")).into()),
        }
    }

    /// Error-path recovery: restore the stash even when the pipeline failed.
    pub fn handle_errors(&mut self) -> Result<()> {
        self.pop_stash()
    }

    fn can_stash(&self, kind: ContextKind) -> bool {
        if !self.config.enabled {
            debug!("stash protection disabled");
            return false;
        }
        // Generic ad-hoc/CI runs validate the tree as-is; only the commit
        // hook needs the index-exact view.
        kind == ContextKind::PreCommit
    }
}

impl<R: Repository> RunSubscriber for StashGuard<R> {
    fn before_run(&mut self, ctx: &RunContext) {
        self.save_stash(ctx);
    }

    fn after_run(&mut self, _ctx: &RunContext, _report: &RunReport) -> Result<()> {
        self.pop_stash()
    }

    fn on_error(&mut self, _ctx: &RunContext) -> Result<()> {
        self.handle_errors()
    }
}
