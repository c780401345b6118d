//! Logging/tracing initialization, driven by `TelemetryConfig` (spec's
//! ambient observability surface; Non-goals exclude metrics/tracing
//! export, not structured logging itself).

use crate::config::TelemetryConfig;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Installs a global `tracing` subscriber. Call once at process start,
/// before any other `tracing` calls.
///
/// The filter falls back to `config.filter` when `RUST_LOG` isn't set,
/// and output is either single-line JSON (for log aggregators) or the
/// human-readable default, per `config.json`.
pub fn init(config: &TelemetryConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.filter.clone()));

    if config.json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer())
            .init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_a_non_empty_filter() {
        let config = TelemetryConfig::default();
        assert!(!config.filter.is_empty());
    }
}
