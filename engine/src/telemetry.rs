//! Structured logging setup
//!
//! `RUST_LOG` wins over the configured level. Debug builds print
//! human-readable output; release builds emit one JSON object per line with
//! the current span attached. Logs go to stderr so `run --json` output stays clean.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Build the filter directive for a configured level.
///
/// Noisy dependencies are capped at `warn` unless the level asks for more.
pub fn filter_directive(log_level: &str) -> String {
    let deps = match log_level {
        "debug" | "trace" => log_level,
        _ => "warn",
    };
    format!(
        "{level},dreamteam_engine={level},dreamteam={level},sqlx={deps},hyper={deps},tower_http={level}",
        level = log_level,
        deps = deps
    )
}

/// Install the global subscriber. Safe to call more than once; later calls
/// are ignored.
pub fn init_telemetry_with_level(log_level: &str) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directive(log_level)));

    #[cfg(debug_assertions)]
    {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().pretty().with_target(false).with_writer(std::io::stderr))
            .try_init()
            .ok();
    }

    #[cfg(not(debug_assertions))]
    {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json().with_current_span(true).with_writer(std::io::stderr))
            .try_init()
            .ok();
    }
}
