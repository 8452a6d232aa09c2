//! Stable exit codes for hookrun CLI commands.

/// Every eligible task passed or was skipped.
pub const OK: i32 = 0;
/// At least one task failed; diagnostics were printed.
pub const TASK_FAILED: i32 = 1;
/// Fatal runner error, including a failed stash pop.
pub const FATAL: i32 = 2;
