//! Tracing subscriber setup.
//!
//! `RUST_LOG` overrides the filter handed in from the configuration, e.g.
//! `RUST_LOG=kcb=trace`.

use tracing_subscriber::{EnvFilter, fmt};

/// Installs the global subscriber. Does nothing if one is already set.
pub fn init(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_line_number(true)
        .try_init();
}

/// Verbose subscriber writing through the test harness.
pub fn init_test() {
    let _ = fmt()
        .with_env_filter(EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();
}
