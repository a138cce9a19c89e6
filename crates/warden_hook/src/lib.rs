//! Hook engine for Warden.
//!
//! A build-time instrumentation step rewrites the call sites of sensitive
//! functions (SQL execution, file access, outgoing requests, ...) so that
//! each one first consults a [`PrologSlot`]. It also emits a [`HookTable`]
//! describing every instrumented function. This crate is the runtime half:
//! it finds hooks by symbol, validates callbacks against their signature and
//! publishes them atomically to the call sites.
//!
//! # Core Concepts
//!
//! - [`HookRegistry`] - Lazy, memoized lookup of hooks by symbol
//! - [`Hook`] - One instrumented function: its callback type and slot
//! - [`Callback`] - Native, reflected or deferred protection callback
//! - [`CallbackType`] - The prolog type a hooked signature requires
//! - [`PrologSlot`] - The atomic cell an instrumented call site reads
//!
//! # Example
//!
//! ```
//! use warden_hook::prelude::*;
//!
//! fn open_file(path: String) -> bool {
//!     OPEN_FILE.call((path,), |(path,)| !path.is_empty())
//! }
//!
//! static OPEN_FILE: PrologSlot<(String,), bool> = PrologSlot::new();
//! static TABLE: HookTable = HookTable::new(
//!     "1.0.0",
//!     &[|| {
//!         HookDescriptor::new("os.open_file", open_file as fn(String) -> bool)
//!             .with_slot(&OPEN_FILE)
//!     }],
//! );
//!
//! let registry = HookRegistry::new(Some(&TABLE));
//! registry.health("1.0.0").unwrap();
//!
//! let hook = registry.find("os.open_file").unwrap().unwrap();
//! hook.attach([Callback::native::<(String,), bool, _>(|(path,)| {
//!     if path.starts_with("/etc/") {
//!         return Err(Interrupt::abort());
//!     }
//!     Ok(Epilog::noop())
//! })])
//! .unwrap();
//!
//! assert!(open_file("notes.txt".into()));
//! assert!(!open_file("/etc/shadow".into()));
//! ```

/// Native, reflected and deferred callbacks.
pub mod callback;

/// Fusion of several callbacks into one.
mod composite;

/// Error types.
pub mod error;

/// Hooks and attachment.
pub mod hook;

/// Symbol lookup over the hook table.
pub mod registry;

/// Calling-convention descriptors and compatibility checks.
pub mod signature;

/// Atomic prolog slots read by instrumented call sites.
pub mod slot;

/// Symbol normalization.
pub mod symbol;

/// The hook table emitted by the instrumentation step.
pub mod table;

pub use callback::{
    BoxError, Callback, CallbackGetter, Epilog, Interrupt, NativeCallback, Prolog, PrologError,
    PrologResult, ReflectedCallback, ReflectedEpilog, ReflectedResult,
};
pub use error::{AttachError, InstrumentationError};
pub use hook::Hook;
pub use registry::{HookRegistry, find, health, install, registry};
pub use signature::{CallbackType, HookTarget, Mismatch, Params, Receiver, TypeInfo};
pub use slot::{ErasedSlot, PrologSlot};
pub use table::{HookDescriptor, HookEntry, HookTable};

/// Version of the engine; hook tables are checked against it by
/// [`health`].
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Re-export all common types for easy access.
pub mod prelude {
    pub use crate::callback::{
        Callback, CallbackGetter, Epilog, Interrupt, NativeCallback, PrologError, PrologResult,
        ReflectedCallback, ReflectedEpilog, ReflectedResult,
    };
    pub use crate::error::{AttachError, InstrumentationError};
    pub use crate::hook::Hook;
    pub use crate::registry::HookRegistry;
    pub use crate::signature::{CallbackType, Receiver};
    pub use crate::slot::PrologSlot;
    pub use crate::table::{HookDescriptor, HookTable};
}
