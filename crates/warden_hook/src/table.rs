//! The hook table supplied by the instrumentation step.
//!
//! The build step that rewrites call sites also emits one [`HookTable`]: a
//! version string and one [`HookEntry`] per instrumented function, sorted by
//! [`symbol::key`](crate::symbol::key). Each entry is a factory returning a
//! [`HookDescriptor`] that names the function, its signature and its prolog
//! slot.
//!
//! ```
//! use warden_hook::slot::PrologSlot;
//! use warden_hook::table::{HookDescriptor, HookTable};
//!
//! fn lookup_user(id: u64) -> Option<String> {
//!     # let _ = id;
//!     None
//! }
//!
//! static LOOKUP_USER: PrologSlot<(u64,), Option<String>> = PrologSlot::new();
//!
//! static TABLE: HookTable = HookTable::new(
//!     "0.0.1",
//!     &[|| {
//!         HookDescriptor::new("app/users.lookup_user", lookup_user as fn(u64) -> Option<String>)
//!             .with_slot(&LOOKUP_USER)
//!     }],
//! );
//!
//! assert_eq!(TABLE.len(), 1);
//! ```

use core::fmt;

use crate::signature::{CallbackType, HookTarget};
use crate::slot::ErasedSlot;

/// Factory for one hook table entry.
pub type HookEntry = fn() -> HookDescriptor;

/// Version string and sorted entries produced by the instrumentation step.
#[derive(Debug, Clone, Copy)]
pub struct HookTable {
    version: &'static str,
    entries: &'static [HookEntry],
}

impl HookTable {
    /// Creates a table. `entries` must be sorted by symbol key.
    #[must_use]
    pub const fn new(version: &'static str, entries: &'static [HookEntry]) -> Self {
        Self { version, entries }
    }

    /// Returns the instrumentation version the table was built for.
    #[must_use]
    pub fn version(&self) -> &'static str {
        self.version
    }

    /// Returns the entry factories.
    #[must_use]
    pub fn entries(&self) -> &'static [HookEntry] {
        self.entries
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns whether the table has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// What a hook table entry resolves to.
#[derive(Clone, Copy)]
pub struct HookDescriptor {
    symbol: &'static str,
    target: usize,
    target_type: CallbackType,
    slot: Option<&'static dyn ErasedSlot>,
}

impl HookDescriptor {
    /// Describes the instrumented function `target`, known as `symbol`.
    pub fn new<F: HookTarget>(symbol: &'static str, target: F) -> Self {
        Self {
            symbol,
            target: target.address(),
            target_type: F::callback_type(),
            slot: None,
        }
    }

    /// Sets the prolog slot owned by the function's call site.
    #[must_use]
    pub fn with_slot(mut self, slot: &'static dyn ErasedSlot) -> Self {
        self.slot = Some(slot);
        self
    }

    /// Returns the function's symbol.
    #[must_use]
    pub fn symbol(&self) -> &'static str {
        self.symbol
    }

    /// Returns the function's address.
    #[must_use]
    pub fn target(&self) -> usize {
        self.target
    }

    /// Returns the prolog type derived from the function's signature.
    #[must_use]
    pub fn target_type(&self) -> &CallbackType {
        &self.target_type
    }

    /// Returns the prolog slot, if one was given.
    #[must_use]
    pub fn slot(&self) -> Option<&'static dyn ErasedSlot> {
        self.slot
    }
}

impl fmt::Debug for HookDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookDescriptor")
            .field("symbol", &self.symbol)
            .field("target", &format_args!("{:#x}", self.target))
            .field("target_type", &self.target_type)
            .field("slot", &self.slot.map(ErasedSlot::callback_type))
            .finish()
    }
}
