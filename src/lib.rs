//! Stash-protected git-hook task runner.
//!
//! This crate executes a configured list of quality-assurance tasks (linters,
//! test runners, mutation testers) as external processes against the files
//! relevant to a git invocation. In pre-commit runs it stashes unstaged and
//! untracked changes before any task starts and restores them on every exit
//! path, so tasks only ever inspect the exact content being committed. The
//! architecture enforces a strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (contexts, command composition,
//!   results). No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting operations (config, git, process execution,
//!   the stash guard). Isolated behind traits to enable fakes in tests.
//!
//! Orchestration modules ([`runner`], [`events`]) coordinate core logic with
//! I/O to implement the CLI commands.

pub mod core;
pub mod events;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod runner;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
