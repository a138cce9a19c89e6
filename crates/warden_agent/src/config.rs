//! Agent configuration.
//!
//! Every field has a default, so an empty JSON object or an empty
//! environment yields a working lenient agent logging at `info`.
//!
//! # Environment Variables
//!
//! | Variable | Field | Example |
//! |----------|-------|---------|
//! | `WARDEN_LOG_LEVEL` | `log_level` | `debug` |
//! | `WARDEN_LOG_FORMAT` | `log_format` | `json` |
//! | `WARDEN_LOG_FILTER` | `env_filter` | `warden_hook=trace` |
//! | `WARDEN_SPAN_EVENTS` | `span_events` | `true` |
//! | `WARDEN_EXPECTED_VERSION` | `expected_version` | `0.0.1` |
//! | `WARDEN_STRICT` | `strict` | `1` |

use core::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::Level;

use crate::error::ConfigError;

/// Prefix shared by every configuration variable.
pub const ENV_PREFIX: &str = "WARDEN_";

// ─────────────────────────────────────────────────────────────────────────────
// LogFormat
// ─────────────────────────────────────────────────────────────────────────────

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable multi-line output (default).
    #[default]
    Pretty,
    /// Compact single-line output.
    Compact,
    /// JSON structured output for log aggregation.
    Json,
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "compact" => Ok(Self::Compact),
            "json" => Ok(Self::Json),
            _ => Err(ConfigError::invalid_value(
                "log_format",
                value,
                "`pretty`, `compact` or `json`",
            )),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// AgentConfig
// ─────────────────────────────────────────────────────────────────────────────

/// Configuration of an [`Agent`](crate::Agent).
///
/// # Example
///
/// ```
/// use tracing::Level;
/// use warden_agent::{AgentConfig, LogFormat};
///
/// let config = AgentConfig::from_json(r#"{ "log_level": "debug", "strict": true }"#).unwrap();
/// assert_eq!(config.log_level, Level::DEBUG);
/// assert!(config.strict);
///
/// let config = AgentConfig::new()
///     .with_format(LogFormat::Json)
///     .with_env_filter("warden_hook=trace");
/// assert_eq!(config.env_filter.as_deref(), Some("warden_hook=trace"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AgentConfig {
    /// Maximum log level, used when no filter is set.
    #[serde(with = "level")]
    pub log_level: Level,
    /// Output format.
    pub log_format: LogFormat,
    /// Per-target filter directives (e.g. `warden=debug,app=warn`).
    pub env_filter: Option<String>,
    /// Whether to log span enter/exit events.
    pub span_events: bool,
    /// Version the hook table must have been built for.
    pub expected_version: String,
    /// Whether an unhealthy hook table fails startup instead of disabling
    /// protection.
    pub strict: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            log_level: Level::INFO,
            log_format: LogFormat::Pretty,
            env_filter: None,
            span_events: false,
            expected_version: warden_hook::VERSION.to_owned(),
            strict: false,
        }
    }
}

impl AgentConfig {
    /// Creates a configuration with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a JSON document. Missing fields keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Json`] on malformed JSON, unknown fields or
    /// invalid values.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads `WARDEN_*` variables from the process environment.
    ///
    /// # Errors
    ///
    /// See [`from_vars`](Self::from_vars).
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(std::env::vars())
    }

    /// Builds a configuration from `(name, value)` pairs, ignoring names
    /// without the `WARDEN_` prefix. Unset variables keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] for a value that does not
    /// parse, and [`ConfigError::UnknownVariable`] for a misspelled
    /// `WARDEN_` variable.
    pub fn from_vars<I, K, V>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut config = Self::default();
        for (name, value) in vars {
            let (name, value) = (name.as_ref(), value.as_ref());
            let Some(field) = name.strip_prefix(ENV_PREFIX) else {
                continue;
            };
            match field {
                "LOG_LEVEL" => {
                    config.log_level = Level::from_str(value.trim()).map_err(|_| {
                        ConfigError::invalid_value(name, value, "a log level such as `info`")
                    })?;
                }
                "LOG_FORMAT" => {
                    config.log_format = value.parse().map_err(|_| {
                        ConfigError::invalid_value(name, value, "`pretty`, `compact` or `json`")
                    })?;
                }
                "LOG_FILTER" => config.env_filter = Some(value.to_owned()),
                "SPAN_EVENTS" => config.span_events = parse_flag(name, value)?,
                "EXPECTED_VERSION" => value.clone_into(&mut config.expected_version),
                "STRICT" => config.strict = parse_flag(name, value)?,
                _ => {
                    return Err(ConfigError::UnknownVariable {
                        name: name.to_owned(),
                    });
                }
            }
        }
        Ok(config)
    }

    /// Sets the maximum log level.
    #[must_use]
    pub fn with_level(mut self, level: Level) -> Self {
        self.log_level = level;
        self
    }

    /// Sets the output format.
    #[must_use]
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.log_format = format;
        self
    }

    /// Sets per-target filter directives.
    ///
    /// Format: `target=level,target=level,...`
    #[must_use]
    pub fn with_env_filter(mut self, filter: impl Into<String>) -> Self {
        self.env_filter = Some(filter.into());
        self
    }

    /// Enables span enter/exit events in output.
    #[must_use]
    pub fn with_span_events(mut self, enabled: bool) -> Self {
        self.span_events = enabled;
        self
    }

    /// Sets the hook table version to expect.
    #[must_use]
    pub fn with_expected_version(mut self, version: impl Into<String>) -> Self {
        self.expected_version = version.into();
        self
    }

    /// Makes an unhealthy hook table fail startup.
    #[must_use]
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }
}

fn parse_flag(name: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ConfigError::invalid_value(name, value, "a boolean such as `true` or `0`")),
    }
}

/// Serde adapter for [`Level`], spelled as in `RUST_LOG` (`info`, `DEBUG`).
mod level {
    use core::str::FromStr;

    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};
    use tracing::Level;

    pub(super) fn serialize<S: Serializer>(
        level: &Level,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&level.as_str().to_ascii_lowercase())
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Level, D::Error> {
        let value = String::deserialize(deserializer)?;
        Level::from_str(&value).map_err(D::Error::custom)
    }
}
