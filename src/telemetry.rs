//! Structured logging setup for the embedding chat layer.

/// Initialise the `tracing` subscriber. Honours `RUST_LOG`, defaulting to
/// `bookie=info`; set `BOOKIE_LOG_JSON` for JSON output.
pub fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("bookie=info"));

    let json_logging = std::env::var("BOOKIE_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt().with_env_filter(env_filter).with_target(true).init();
    }
}
