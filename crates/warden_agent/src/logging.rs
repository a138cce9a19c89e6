//! Subscriber initialization.
//!
//! The agent runs inside a host program that may already have installed a
//! `tracing` subscriber. [`init`] only installs one if none is present, so
//! calling it again, or from a host that logs on its own, is harmless.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::{AgentConfig, LogFormat};

/// Installs the global subscriber described by `config`.
///
/// Returns whether this call installed it.
pub fn init(config: &AgentConfig) -> bool {
    let filter = env_filter(config);
    let span_events = span_events(config.span_events);

    // try_init fails if a subscriber is already set.
    let installed = match config.log_format {
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .pretty()
                    .with_span_events(span_events),
            )
            .try_init()
            .is_ok(),
        LogFormat::Compact => tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .compact()
                    .with_span_events(span_events),
            )
            .try_init()
            .is_ok(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_span_events(span_events),
            )
            .try_init()
            .is_ok(),
    };

    if installed {
        tracing::info!(
            level = %config.log_level,
            format = ?config.log_format,
            "logging initialized"
        );
    }
    installed
}

/// Builds the filter: `env_filter` directives when they parse, otherwise
/// everything up to `log_level`.
fn env_filter(config: &AgentConfig) -> EnvFilter {
    let fallback = || EnvFilter::new(config.log_level.as_str());
    match &config.env_filter {
        Some(directives) => EnvFilter::try_new(directives).unwrap_or_else(|error| {
            // No subscriber yet: this warning only reaches a host's own.
            tracing::warn!(%error, directives, "ignoring invalid log filter");
            fallback()
        }),
        None => fallback(),
    }
}

fn span_events(enabled: bool) -> FmtSpan {
    if enabled {
        FmtSpan::ENTER | FmtSpan::EXIT
    } else {
        FmtSpan::NONE
    }
}
