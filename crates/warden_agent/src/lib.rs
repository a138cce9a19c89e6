//! Agent facade for Warden.
//!
//! Ties the hook engine to a running process: loads an [`AgentConfig`],
//! installs logging, checks the hook table once and then protects
//! instrumented functions by symbol.
//!
//! # Example
//!
//! ```ignore
//! use warden_agent::{Agent, AgentConfig};
//! use warden_hook::prelude::*;
//!
//! warden_hook::install(&HOOK_TABLE)?;
//! let agent = Agent::start(AgentConfig::from_env()?, warden_hook::registry())?;
//!
//! agent.protect("database/sql.(*DB).Query", [sql_injection_guard()])?;
//! // ...
//! agent.shutdown();
//! ```

/// The protection agent.
pub mod agent;

/// Agent configuration.
pub mod config;

/// Error types.
pub mod error;

/// Subscriber initialization.
pub mod logging;

pub use agent::Agent;
pub use config::{AgentConfig, LogFormat};
pub use error::{AgentError, ConfigError};
