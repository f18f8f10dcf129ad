//! Log setup for the CLI.
//!
//! Everything is written to stderr through `tracing-subscriber`; stdout is
//! reserved for command output.

use tracing_subscriber::EnvFilter;

/// Filter used when `--debug` is given and `RUST_LOG` is unset.
pub const DEBUG_FILTER: &str = "tikv_cli=debug,tikv_client=debug";

/// Build the log filter.
///
/// The client library is chatty at info level, so nothing is logged unless
/// `--debug` or `RUST_LOG` asks for it.
pub fn build_filter(debug: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if debug {
            EnvFilter::new(DEBUG_FILTER)
        } else {
            EnvFilter::new("off")
        }
    })
}

/// Install the global subscriber. Logs go to stderr so command output on
/// stdout stays clean. Calling this twice is harmless.
pub fn init_logging(debug: bool) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(build_filter(debug))
        .with_writer(std::io::stderr)
        .with_target(true)
        .compact()
        .try_init();
}
