//! Symbol lookup over the hook table.
//!
//! [`HookRegistry::find`] answers from an in-memory index first. On a miss
//! it binary-searches the hook table by symbol key, resolving every entry it
//! probes and adding it to the index, so repeated lookups become map hits as
//! the table gets walked. [`HookRegistry::preload`] resolves the whole table
//! up front instead.
//!
//! # Process-wide registry
//!
//! Instrumented programs install their table once at startup with
//! [`install`]; [`find`] and [`health`] then serve lookups from it.

use core::cmp::Ordering;
use std::sync::{Arc, OnceLock};

use hashbrown::{HashMap, HashSet};
use parking_lot::RwLock;

use crate::error::InstrumentationError;
use crate::hook::Hook;
use crate::symbol;
use crate::table::HookTable;

/// Index of resolved hooks, backed by a [`HookTable`].
///
/// # Thread Safety
///
/// The index sits behind a [`RwLock`]. Concurrent lookups may resolve the
/// same entry twice; the first hook inserted for a symbol wins and every
/// caller gets that one.
#[derive(Default)]
pub struct HookRegistry {
    table: Option<&'static HookTable>,
    index: RwLock<HashMap<String, Arc<Hook>>>,
}

impl HookRegistry {
    /// Creates a registry over `table`. `None` means the program was not
    /// instrumented: every lookup finds nothing.
    #[must_use]
    pub fn new(table: Option<&'static HookTable>) -> Self {
        Self {
            table,
            index: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the hook table.
    #[must_use]
    pub fn table(&self) -> Option<&'static HookTable> {
        self.table
    }

    /// Returns the number of symbols in the index.
    #[must_use]
    pub fn len(&self) -> usize {
        self.index.read().len()
    }

    /// Returns whether nothing has been resolved yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index.read().is_empty()
    }

    /// Finds the hook of an instrumented function.
    ///
    /// Returns `Ok(None)` when the symbol is not in the table; that is not an
    /// error.
    ///
    /// # Errors
    ///
    /// Returns [`InstrumentationError`] if an entry probed during the search
    /// is invalid or panics. Entries resolved before it stay indexed.
    pub fn find(&self, symbol: &str) -> Result<Option<Arc<Hook>>, InstrumentationError> {
        if let Some(hook) = self.index.read().get(symbol) {
            return Ok(Some(Arc::clone(hook)));
        }

        let Some(table) = self.table else {
            return Ok(None);
        };

        let key = symbol::key(symbol);
        let (mut low, mut high) = (0, table.len());
        while low < high {
            let mid = low + (high - low) / 2;
            let hook = self.resolve(table, mid)?;
            match hook.key().cmp(&key) {
                Ordering::Less => low = mid + 1,
                Ordering::Greater => high = mid,
                Ordering::Equal => {
                    if hook.symbol() != symbol {
                        self.index
                            .write()
                            .entry(symbol.to_owned())
                            .or_insert_with(|| Arc::clone(&hook));
                    }
                    return Ok(Some(hook));
                }
            }
        }

        tracing::trace!(symbol, "symbol not instrumented");
        Ok(None)
    }

    /// Resolves every table entry, checking they are sorted.
    ///
    /// Returns the number of entries resolved.
    ///
    /// # Errors
    ///
    /// Returns the first [`InstrumentationError`] encountered, including
    /// [`Unsorted`](InstrumentationError::Unsorted) when an entry's key is
    /// not greater than the previous one.
    pub fn preload(&self) -> Result<usize, InstrumentationError> {
        let Some(table) = self.table else {
            return Ok(0);
        };

        let mut previous: Option<Arc<Hook>> = None;
        for index in 0..table.len() {
            let hook = self.resolve(table, index)?;
            if previous.as_ref().is_some_and(|prev| prev.key() >= hook.key()) {
                return Err(InstrumentationError::Unsorted {
                    index,
                    symbol: hook.symbol().to_owned(),
                });
            }
            previous = Some(hook);
        }

        tracing::debug!(hooks = table.len(), "hook table preloaded");
        Ok(table.len())
    }

    /// Checks the program is instrumented for `expected_version`.
    ///
    /// # Errors
    ///
    /// Returns [`NotInstrumented`](InstrumentationError::NotInstrumented)
    /// without a non-empty table, and
    /// [`VersionSkew`](InstrumentationError::VersionSkew) when the table's
    /// version differs.
    pub fn health(&self, expected_version: &str) -> Result<(), InstrumentationError> {
        let table = self
            .table
            .filter(|table| !table.is_empty())
            .ok_or(InstrumentationError::NotInstrumented)?;

        if table.version() != expected_version {
            return Err(InstrumentationError::VersionSkew {
                expected: expected_version.to_owned(),
                actual: table.version().to_owned(),
            });
        }
        Ok(())
    }

    /// Returns every hook resolved so far.
    #[must_use]
    pub fn hooks(&self) -> Vec<Arc<Hook>> {
        let mut seen = HashSet::new();
        let mut hooks: Vec<Arc<Hook>> = self
            .index
            .read()
            .values()
            .filter(|hook| seen.insert(hook.symbol()))
            .cloned()
            .collect();
        hooks.sort_by(|a, b| a.key().cmp(b.key()));
        hooks
    }

    fn resolve(&self, table: &HookTable, index: usize) -> Result<Arc<Hook>, InstrumentationError> {
        let entry = table.entries()[index];
        let descriptor = warden_safe::call(entry)
            .map_err(|source| InstrumentationError::Panicked { index, source })?;

        if let Some(hook) = self.index.read().get(descriptor.symbol()) {
            return Ok(Arc::clone(hook));
        }

        let hook = Arc::new(Hook::resolve(index, descriptor)?);
        let mut hooks = self.index.write();
        let hook = hooks
            .entry(hook.symbol().to_owned())
            .or_insert_with(|| {
                tracing::trace!(symbol = hook.symbol(), "hook resolved");
                Arc::clone(&hook)
            });
        Ok(Arc::clone(hook))
    }
}

static REGISTRY: OnceLock<HookRegistry> = OnceLock::new();

/// Installs the program's hook table as the process-wide registry.
///
/// # Errors
///
/// Returns [`AlreadyInstalled`](InstrumentationError::AlreadyInstalled) if a
/// table was installed before, or if [`registry`] was used first.
pub fn install(table: &'static HookTable) -> Result<(), InstrumentationError> {
    REGISTRY
        .set(HookRegistry::new(Some(table)))
        .map_err(|_| InstrumentationError::AlreadyInstalled)?;
    tracing::debug!(version = table.version(), hooks = table.len(), "hook table installed");
    Ok(())
}

/// Returns the process-wide registry.
///
/// Empty until [`install`] is called; calling this first freezes it empty.
pub fn registry() -> &'static HookRegistry {
    REGISTRY.get_or_init(HookRegistry::default)
}

/// Finds a hook in the process-wide registry.
///
/// # Errors
///
/// See [`HookRegistry::find`].
pub fn find(symbol: &str) -> Result<Option<Arc<Hook>>, InstrumentationError> {
    registry().find(symbol)
}

/// Checks the process-wide registry's instrumentation.
///
/// # Errors
///
/// See [`HookRegistry::health`].
pub fn health(expected_version: &str) -> Result<(), InstrumentationError> {
    registry().health(expected_version)
}
