//! Error types for the hook engine.

use warden_safe::PanicError;

use crate::signature::Mismatch;

/// The hook table and this engine disagree.
///
/// These errors mean the instrumentation that produced the hook table cannot
/// be trusted. They are always returned to the caller, never downgraded.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InstrumentationError {
    /// No hook table, or an empty one.
    #[error("program not instrumented: no hook table installed")]
    NotInstrumented,

    /// The hook table was produced for another engine version.
    #[error("version skew: hook table built for `{actual}`, engine expects `{expected}`")]
    VersionSkew {
        /// Version the caller expects.
        expected: String,
        /// Version declared by the hook table.
        actual: String,
    },

    /// A table entry has an empty symbol.
    #[error("hook table entry {index} has an empty symbol")]
    MissingSymbol {
        /// Position of the entry in the table.
        index: usize,
    },

    /// A table entry has no prolog slot.
    #[error("hook `{symbol}` has no prolog slot")]
    MissingSlot {
        /// The entry's symbol.
        symbol: String,
    },

    /// The prolog slot's type does not match the target's signature.
    #[error("hook `{symbol}`: prolog slot holds `{slot}`, target requires `{expected}` ({reason})")]
    SlotTypeMismatch {
        /// The entry's symbol.
        symbol: String,
        /// Prolog type of the slot.
        slot: String,
        /// Prolog type derived from the target.
        expected: String,
        /// The first difference found.
        reason: Mismatch,
    },

    /// Resolving a table entry panicked.
    #[error("hook table entry {index} panicked while resolving")]
    Panicked {
        /// Position of the entry in the table.
        index: usize,
        /// The contained panic.
        #[source]
        source: PanicError,
    },

    /// Table entries are not in ascending key order.
    #[error("hook table is not sorted: entry {index} `{symbol}` is out of order")]
    Unsorted {
        /// Position of the first out-of-order entry.
        index: usize,
        /// Its symbol.
        symbol: String,
    },

    /// A hook table was already installed, or lookups started before it was.
    #[error("a hook table is already installed")]
    AlreadyInstalled,
}

/// A callback could not be attached.
///
/// Attaching is all-or-nothing: on error the hook keeps its previous
/// callback.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AttachError {
    /// A callback's type does not match the hook's.
    #[error("hook `{hook}`: unexpected callback type `{actual}`, expected `{expected}` ({reason})")]
    TypeMismatch {
        /// The hook's symbol.
        hook: String,
        /// Type of the offending callback.
        actual: String,
        /// Type the hook expects.
        expected: String,
        /// The first difference found.
        reason: Mismatch,
    },

    /// Getters returned getters beyond the nesting limit.
    #[error("hook `{hook}`: callback getters nested deeper than {limit}")]
    GetterTooDeep {
        /// The hook's symbol.
        hook: String,
        /// The nesting limit.
        limit: usize,
    },

    /// A getter panicked while producing its callback.
    #[error("hook `{hook}`: callback getter panicked")]
    GetterPanicked {
        /// The hook's symbol.
        hook: String,
        /// The contained panic.
        #[source]
        source: PanicError,
    },
}
