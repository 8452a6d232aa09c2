//! Pure, deterministic logic for the task runner.
//!
//! Nothing in this module performs I/O; contexts, command specs and results
//! are plain values that can be exercised in isolation.

pub mod command;
pub mod context;
pub mod result;
