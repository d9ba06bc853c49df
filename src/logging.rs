//! Tracing installation for applications and tests.
//!
//! The runtime only emits `tracing` events: lifecycle transitions at `debug`,
//! contract warnings at `warn`, unhandled stream failures at `error`. Nothing is
//! printed until a subscriber is installed, either by the application or with
//! [`install_tracing`].

use std::sync::Once;

use tracing_subscriber::prelude::*;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

/// Filter used when `RUST_LOG` is unset or invalid.
pub const DEFAULT_LOG_FILTER: &str = "info";

static TRACING_INSTALLED: Once = Once::new();

/// Installs a console subscriber honoring `RUST_LOG` (idempotent).
pub fn install_tracing() {
    install_tracing_with(DEFAULT_LOG_FILTER);
}

/// Installs a console subscriber, falling back to `default_filter` when `RUST_LOG`
/// is unset or invalid (idempotent).
///
/// Installation fails quietly when another global subscriber is already set.
pub fn install_tracing_with(default_filter: &str) {
    TRACING_INSTALLED.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(default_filter))
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

        let console = fmt::layer()
            .with_target(true)
            .with_ansi(false)
            .with_filter(filter);

        if tracing_subscriber::registry().with(console).try_init().is_err() {
            tracing::debug!("a global tracing subscriber was already installed");
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn installation_is_idempotent() {
        install_tracing();
        install_tracing_with("debug");
        tracing::info!("still logging after repeated installation");
    }
}
