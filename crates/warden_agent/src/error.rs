//! Error types for the agent.

use thiserror::Error;
use warden_hook::{AttachError, InstrumentationError};

/// Errors raised while loading an [`AgentConfig`](crate::AgentConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The JSON document could not be parsed.
    #[error("malformed configuration: {0}")]
    Json(#[from] serde_json::Error),

    /// An environment variable holds an unusable value.
    #[error("invalid value `{value}` for {name}: expected {expected}")]
    InvalidValue {
        /// The variable's name.
        name: String,
        /// The rejected value.
        value: String,
        /// What the variable accepts.
        expected: &'static str,
    },

    /// A `WARDEN_` variable is not a configuration setting.
    #[error("unknown configuration variable {name}")]
    UnknownVariable {
        /// The variable's name.
        name: String,
    },
}

impl ConfigError {
    /// Creates an [`InvalidValue`](Self::InvalidValue).
    pub fn invalid_value(
        name: impl Into<String>,
        value: impl Into<String>,
        expected: &'static str,
    ) -> Self {
        Self::InvalidValue {
            name: name.into(),
            value: value.into(),
            expected,
        }
    }
}

/// Errors returned by the [`Agent`](crate::Agent).
#[derive(Debug, Error)]
pub enum AgentError {
    /// Configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The startup health check failed.
    ///
    /// Returned by `start` in strict mode, and by `protect` on an agent
    /// that started disabled.
    #[error("instrumentation unhealthy: {0}")]
    Unhealthy(#[source] InstrumentationError),

    /// The hook table is invalid.
    #[error(transparent)]
    Instrumentation(#[from] InstrumentationError),

    /// A callback could not be attached.
    #[error(transparent)]
    Attach(#[from] AttachError),

    /// The hook table has no entry for the symbol.
    #[error("no instrumented function `{symbol}`")]
    UnknownHook {
        /// The requested symbol.
        symbol: String,
    },
}
