//! Logging initialisation
//!
//! Installs a `tracing` fmt subscriber. The filter comes from `RUST_LOG`
//! when it is set, otherwise from the configured level.

use crate::config::LoggingConfig;
use tracing_subscriber::EnvFilter;

/// Install the global subscriber
///
/// Uses `try_init`, so a second call (or a subscriber installed by the host)
/// is left alone.
pub fn init_logging(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.as_str()));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(config.ansi)
        .with_target(true)
        .try_init();

    tracing::debug!(target: "bridge", level = %config.level, "Logging initialised");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging_twice() {
        let config = LoggingConfig::default();
        init_logging(&config);
        init_logging(&config);
    }
}
