//! Opt-in logging setup for binaries and tests

use tracing_subscriber::Layer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Initialize a stdout subscriber filtered by `RUST_LOG`.
///
/// Defaults to "info" level if `RUST_LOG` is not set. Does nothing when a
/// subscriber is already installed, so hosts that configure their own
/// logging are left alone.
pub fn init_logging() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stdout)
                .with_filter(env_filter),
        )
        .try_init();
}
