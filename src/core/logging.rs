//! Tracing subscriber setup for the binary
//!
//! The library only emits `tracing` events; installing a subscriber is the
//! embedder's call. The CLI writes human-readable events to stderr so stdout
//! stays machine-readable.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::core::config::ENV_LOG;

/// Default filter directive for the given verbosity flags
pub fn default_directive(verbose: bool, quiet: bool) -> &'static str {
    if quiet {
        "error"
    } else if verbose {
        "prewarm=debug,warn"
    } else {
        "warn"
    }
}

/// Install the global subscriber. `PREWARM_LOG` overrides the flags.
pub fn init(verbose: bool, quiet: bool) {
    let filter = EnvFilter::try_from_env(ENV_LOG)
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose, quiet)));

    // A second init (e.g. from tests) is harmless; keep the first subscriber.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(true))
        .try_init();
}
