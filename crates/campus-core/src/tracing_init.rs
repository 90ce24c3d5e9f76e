//! Tracing/logging initialization for Campus binaries.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Build the filter: `RUST_LOG` wins, otherwise `<targets>=<level>` for each
/// Campus crate.
pub fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("campus_core={level},campus_server={level}")))
}

/// Install the global subscriber, as JSON lines when `log_json` is set.
pub fn init_tracing(level: &str, log_json: bool) {
    let registry = tracing_subscriber::registry().with(env_filter(level));
    if log_json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}
