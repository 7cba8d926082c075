//! Log output setup.
//!
//! Libraries only emit `tracing` events; the host decides whether to call
//! [`init_tracing`] or install its own subscriber.

use parley_core::config::GeneralConfig;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{fmt, EnvFilter};

/// Filter used when neither `RUST_LOG` nor `general.log_level` parses.
pub const FALLBACK_FILTER: &str = "info";

/// Build the level filter: `RUST_LOG` first, then `general.log_level`.
#[must_use]
pub fn env_filter(config: &GeneralConfig) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.trim()))
        .unwrap_or_else(|_| EnvFilter::new(FALLBACK_FILTER))
}

/// Install the global subscriber: human-readable lines, or JSON when
/// `general.json_logs` is set.
///
/// # Errors
/// Fails if a global subscriber is already installed.
pub fn init_tracing(config: &GeneralConfig) -> Result<(), TryInitError> {
    let registry = tracing_subscriber::registry().with(env_filter(config));
    if config.json_logs {
        registry.with(fmt::layer().json().with_target(true)).try_init()
    } else {
        registry.with(fmt::layer().with_target(true)).try_init()
    }
}
