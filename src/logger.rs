//! Logging setup for binaries built on this crate.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the tracing subscriber with the given default log level.
///
/// The level applies to this crate and to the named binary; it can be
/// overridden with the `RUST_LOG` environment variable. Library code never
/// calls this — only binaries do, once, at startup.
pub fn setup_logger(binary_name: &str, default_log_level: &str) {
    let default_filter = format!(
        "{}={},{}={}",
        env!("CARGO_PKG_NAME").replace('-', "_"),
        default_log_level,
        binary_name.replace('-', "_"),
        default_log_level
    );

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
