//! Tracing bootstrap for binaries and tests embedding the engine

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Installs a global `tracing` subscriber
///
/// `RUST_LOG` takes precedence; otherwise `default_directive` is used
/// (for example `"permweave_engine=debug"`). Calling this more than once is
/// harmless: later calls leave the first subscriber in place.
pub fn init_tracing(default_directive: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_directive));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}
