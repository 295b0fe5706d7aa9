//! Tracing subscriber set-up.

use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

/// Install a global fmt subscriber.
///
/// `RUST_LOG` takes precedence over `config.level`. Returns `false` if a
/// subscriber was already installed, which leaves the existing one in place.
pub fn init(config: &LoggingConfig) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.as_str()));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let installed = if config.json {
        builder.json().try_init().is_ok()
    } else {
        builder.try_init().is_ok()
    };

    if installed {
        tracing::debug!(level = %config.level, json = config.json, "Tracing initialized");
    }
    installed
}
