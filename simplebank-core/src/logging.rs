//! Tracing/logging initialization

use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

/// Install the process-wide tracing subscriber.
///
/// `RUST_LOG` takes precedence over the configured filter. Logs go to stderr
/// so command output on stdout stays clean. Safe to call multiple times
/// (subsequent calls are no-ops).
pub fn init(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.filter))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    let _ = if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_twice_is_harmless() {
        let config = LoggingConfig {
            filter: "not a [valid filter".to_string(),
            json: true,
        };
        init(&config);
        init(&LoggingConfig::default());
        tracing::info!("still logging");
    }
}
