//! # Warden Internal Library
//!
//! Re-exports the core Warden crates for convenience.

/// Guarded calls and panic reporting.
pub use warden_safe;

/// The hook engine.
pub use warden_hook;

/// Agent facade: configuration, logging and protection bookkeeping.
pub use warden_agent;

/// Re-export all common types for easy access.
pub mod prelude {
    pub use warden_agent::{Agent, AgentConfig, AgentError, LogFormat};
    pub use warden_hook::prelude::*;
    pub use warden_safe::PanicError;
}
