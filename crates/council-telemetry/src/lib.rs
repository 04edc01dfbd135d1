//! Logging setup for council
//!
//! Installs a `tracing-subscriber` registry with an `EnvFilter` and a text
//! or JSON fmt layer writing to stderr.

use council_config::{LogFormat, TelemetryConfig};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize logging
///
/// The filter comes from `RUST_LOG` when set, then from the `[telemetry]`
/// section, then from `default_filter`.
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed
pub fn init(config: &TelemetryConfig, default_filter: &str) -> anyhow::Result<()> {
    let directive = resolve_filter(config, default_filter);
    let filter = EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(filter);

    let result = match config.format {
        LogFormat::Text => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .try_init(),
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_current_span(false),
            )
            .try_init(),
    };

    result.map_err(|e| anyhow::anyhow!("failed to install log subscriber: {e}"))
}

fn resolve_filter(config: &TelemetryConfig, default_filter: &str) -> String {
    std::env::var(EnvFilter::DEFAULT_ENV)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .or_else(|| config.filter.clone())
        .unwrap_or_else(|| default_filter.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_precedence() {
        let configured = TelemetryConfig {
            filter: Some("warn,council_llm=debug".into()),
            ..TelemetryConfig::default()
        };

        temp_env::with_var("RUST_LOG", Some("trace"), || {
            assert_eq!(resolve_filter(&configured, "info"), "trace");
        });
        temp_env::with_var("RUST_LOG", None::<&str>, || {
            assert_eq!(resolve_filter(&configured, "info"), "warn,council_llm=debug");
            assert_eq!(resolve_filter(&TelemetryConfig::default(), "info"), "info");
        });
    }
}
