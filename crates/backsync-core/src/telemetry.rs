use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber.
///
/// The library only emits events; a binary embedding it calls this once at
/// startup. The filter comes from `RUST_LOG`, defaulting to `info`.
///
/// - Debug builds: human-readable output with targets
/// - Release builds: JSON output for log aggregation
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if cfg!(debug_assertions) {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    }
}
