//! Runtime application self-protection for Rust programs.
//!
//! Re-exports the Warden crates: the hook engine, guarded calls and the agent
//! facade.

pub use warden_internal::*;

/// Re-export all common types for easy access.
pub mod prelude {
    pub use warden_internal::prelude::*;
}
