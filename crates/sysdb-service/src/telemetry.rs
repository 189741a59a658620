use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

/// Installs the global `tracing` subscriber.
///
/// `RUST_LOG` wins over the configured level when set. Calling this twice is
/// harmless; the second subscriber is simply not installed.
pub fn init_tracing(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.as_str()));

    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);
    let installed = if config.format == "json" {
        subscriber.json().try_init()
    } else {
        subscriber.try_init()
    };

    if let Err(err) = installed {
        tracing::debug!("tracing subscriber already installed: {err}");
    }
}
