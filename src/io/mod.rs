//! Side-effecting adapters: configuration, git, processes, the stash guard.

pub mod config;
pub mod git;
pub mod process;
pub mod stash;
