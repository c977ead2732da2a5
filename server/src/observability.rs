//! Logging initialisation.

use tracing_subscriber::EnvFilter;

/// Default filter when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "rtc_server=debug";

/// Install the global JSON subscriber.
///
/// `RUST_LOG` takes precedence over `default_filter`. Call once, before any
/// logging.
pub fn init_tracing(default_filter: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .json()
        .init();
}
