// Logging initialization

use tracing_subscriber::EnvFilter;

/// Initialize tracing with `RUST_LOG` support, defaulting to `info`
///
/// Logs go to stderr so report output on stdout stays machine-consumable.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
