//! Prolog slots: the atomic cells instrumented call sites read.
//!
//! Each instrumented function owns one `static` [`PrologSlot`]. The call
//! site loads it on every call; the engine replaces its content when
//! callbacks are attached or detached. Loads are lock-free and never
//! allocate, and a store publishes a value that was fully built beforehand,
//! so a reader sees either the previous callback or the next one.
//!
//! ```
//! use warden_hook::callback::{Epilog, PrologError};
//! use warden_hook::slot::PrologSlot;
//!
//! static CHECK_QUERY: PrologSlot<(String,), usize> = PrologSlot::new();
//!
//! fn run_query(query: String) -> usize {
//!     CHECK_QUERY.call((query,), |(query,)| query.len())
//! }
//!
//! assert_eq!(run_query("select 1".into()), 8);
//!
//! CHECK_QUERY.set(|(query,): &mut (String,)| {
//!     if query.contains("--") {
//!         return Err(PrologError::Abort.into());
//!     }
//!     Ok(Epilog::noop())
//! });
//! assert_eq!(run_query("select 1 --".into()), 0);
//! ```

use std::sync::Arc;

use arc_swap::{ArcSwapOption, Guard};

use crate::callback::{Epilog, Interrupt, NativeCallback, Prolog, PrologResult};
use crate::signature::{CallbackType, Mismatch, Params, check_compatible};

/// The engine's view of a prolog slot, independent of its argument types.
pub trait ErasedSlot: Send + Sync + 'static {
    /// Returns the prolog type the slot holds.
    fn callback_type(&self) -> CallbackType;

    /// Atomically replaces the slot's content. `None` disables the hook.
    ///
    /// # Errors
    ///
    /// Returns a [`Mismatch`] if the callback is not of the slot's type; the
    /// slot is left unchanged.
    fn publish(&self, callback: Option<&NativeCallback>) -> Result<(), Mismatch>;

    /// Returns whether a callback is currently attached.
    fn is_attached(&self) -> bool;

    /// Returns the currently attached callback.
    fn current(&self) -> Option<NativeCallback>;
}

/// Atomic cell holding the active prolog of one instrumented function.
pub struct PrologSlot<P, R> {
    cell: ArcSwapOption<Prolog<P, R>>,
}

impl<P, R> PrologSlot<P, R> {
    /// Creates an empty slot. Usable in `static` items.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            cell: ArcSwapOption::const_empty(),
        }
    }
}

impl<P, R> Default for PrologSlot<P, R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: Params, R: 'static> PrologSlot<P, R> {
    /// Loads the current prolog.
    ///
    /// The guard keeps the loaded prolog alive after it is replaced, and
    /// each thread only has a few fast guard slots, so it should not be held
    /// across the hooked function's body. [`call`](Self::call) drops it
    /// before running the body.
    pub fn load(&self) -> Guard<Option<Arc<Prolog<P, R>>>> {
        self.cell.load()
    }

    /// Returns an owned handle to the current prolog.
    #[must_use]
    pub fn get(&self) -> Option<Arc<Prolog<P, R>>> {
        self.cell.load_full()
    }

    /// Stores a typed prolog directly, bypassing hook validation.
    pub fn set<F>(&self, f: F)
    where
        F: Fn(&mut P) -> PrologResult<R> + Send + Sync + 'static,
    {
        self.cell.store(Some(Arc::new(Prolog::new(f))));
    }

    /// Empties the slot.
    pub fn clear(&self) {
        self.cell.store(None);
    }

    /// Runs `body` around the slot's prolog, the way generated call sites do.
    ///
    /// - No prolog: `body` runs alone.
    /// - The prolog aborts: `body` is skipped and `R::default()` is returned,
    ///   after the epilog (if any) had a chance to overwrite it.
    /// - The prolog fails otherwise or panics: the failure is logged and
    ///   `body` runs.
    ///
    /// The epilog runs on every exit path. If `body` unwinds, the epilog
    /// sees `R::default()`.
    pub fn call<F>(&self, args: P, body: F) -> R
    where
        F: FnOnce(P) -> R,
        R: Default,
    {
        let mut args = args;
        let outcome = {
            let guard = self.load();
            (*guard)
                .as_ref()
                .map(|prolog| warden_safe::call(|| prolog.call(&mut args)))
        };
        let Some(outcome) = outcome else {
            return body(args);
        };

        let (epilog, aborted) = match outcome {
            Ok(Ok(epilog)) => (epilog, false),
            Ok(Err(Interrupt { error, epilog })) => {
                let aborted = error.is_abort();
                if !aborted {
                    tracing::warn!(
                        error = %error,
                        "protection callback failed, running the original call"
                    );
                }
                (epilog, aborted)
            }
            Err(panic) => {
                warden_safe::report(&panic);
                (Epilog::noop(), false)
            }
        };

        let mut pending = PendingEpilog {
            epilog: Some(epilog),
        };
        let mut results = if aborted { R::default() } else { body(args) };
        pending.run(&mut results);
        results
    }
}

impl<P: Params, R: 'static> ErasedSlot for PrologSlot<P, R> {
    fn callback_type(&self) -> CallbackType {
        CallbackType::of::<P, R>()
    }

    fn publish(&self, callback: Option<&NativeCallback>) -> Result<(), Mismatch> {
        let Some(callback) = callback else {
            self.cell.store(None);
            return Ok(());
        };

        let expected = CallbackType::of::<P, R>();
        check_compatible(&expected, callback.callback_type())?;
        let prolog = callback
            .downcast::<P, R>()
            .ok_or_else(|| Mismatch::Prolog {
                expected: expected.prolog().name(),
                actual: callback.callback_type().prolog().name(),
            })?;
        self.cell.store(Some(prolog));
        Ok(())
    }

    fn is_attached(&self) -> bool {
        self.cell.load().is_some()
    }

    fn current(&self) -> Option<NativeCallback> {
        self.cell.load_full().map(NativeCallback::from_prolog)
    }
}

/// Epilog waiting for the hooked function's result.
///
/// Dropped without running (the body unwound), it runs against
/// `R::default()`.
struct PendingEpilog<R: Default> {
    epilog: Option<Epilog<R>>,
}

impl<R: Default> PendingEpilog<R> {
    fn run(&mut self, results: &mut R) {
        let Some(epilog) = self.epilog.take() else {
            return;
        };
        if epilog.is_noop() {
            return;
        }
        if let Err(panic) = warden_safe::call(|| epilog.run(results)) {
            warden_safe::report(&panic);
        }
    }
}

impl<R: Default> Drop for PendingEpilog<R> {
    fn drop(&mut self) {
        if self.epilog.is_some() {
            let mut results = R::default();
            self.run(&mut results);
        }
    }
}
