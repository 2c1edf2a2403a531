//! Logging initialization shared by the binaries.

use tracing_subscriber::EnvFilter;

/// Filter directive for a `-v` count. `RUST_LOG`, when set, takes precedence.
pub fn log_level(verbose: u8) -> &'static str {
    match verbose {
        0 => "info",
        1 => "bigram=debug,info",
        2 => "bigram=trace,info",
        _ => "trace",
    }
}

/// Installs the global subscriber. Call once, at the top of `main`.
pub fn init_logging(verbose: u8) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level(verbose)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(verbose > 0)
        .init();
}
