//! Development-time tracing for debugging the runner.
//!
//! Tracing is dev diagnostics only: task diagnostics go to stdout as part of
//! the run report, while tracing output goes to stderr and is controlled by
//! `RUST_LOG`. It is never part of the hook's product output.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing subscriber for development logging.
///
/// Reads `RUST_LOG` env var. Defaults to `warn` if unset.
/// Output: stderr, compact format.
///
/// # Example
/// ```bash
/// RUST_LOG=hookrun=debug hookrun pre-commit
/// ```
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
