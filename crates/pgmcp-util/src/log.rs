//! Logging setup using tracing.
//!
//! The gateway runs as a managed service or a stdio child process, so there
//! is never a TUI to redirect a log file into — this just wires stdout.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Directive set scoping every gateway crate (plus `tower_http` request
/// tracing) to `debug` when `verbose`, `info` otherwise.
fn default_directives(verbose: bool) -> &'static str {
    if verbose {
        "pgmcp=debug,pgmcp_core=debug,pgmcp_db=debug,pgmcp_server=debug,tower_http=debug"
    } else {
        "pgmcp=info,pgmcp_core=info,pgmcp_db=info,pgmcp_server=info"
    }
}

/// Initialize stdout logging for the gateway binary.
///
/// Honors `RUST_LOG` if set; otherwise falls back to a directive set scoped
/// to the gateway's own crates. Should be called once at startup, before any
/// other gateway code runs.
pub fn init(verbose: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives(verbose)));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter)
        .init();
}
