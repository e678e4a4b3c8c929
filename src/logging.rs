//! Logging setup
//!
//! The library only emits `tracing` events; installing a subscriber is left
//! to the host. [`init`] is the default used by the `pgsense` binary: a
//! compact fmt layer on stderr, filtered by `RUST_LOG` or, when that is
//! unset, by `log_level` from the settings file.

use crate::config::Settings;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt};

const FALLBACK_FILTER: &str = "warn";

/// Install the global subscriber. Fails if one is already installed.
pub fn init(settings: &Settings) -> Result<(), TryInitError> {
    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .compact();

    tracing_subscriber::registry()
        .with(filter(settings))
        .with(fmt_layer)
        .try_init()
}

/// `RUST_LOG` wins over the configured level; an invalid directive falls back to `warn`
pub fn filter(settings: &Settings) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.log_level))
        .unwrap_or_else(|_| EnvFilter::new(FALLBACK_FILTER))
}
