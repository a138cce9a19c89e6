//! Hooks: one per instrumented function.

use core::fmt;

use crate::callback::{Callback, NativeCallback};
use crate::error::{AttachError, InstrumentationError};
use crate::signature::{CallbackType, Mismatch, check_compatible};
use crate::slot::ErasedSlot;
use crate::symbol;
use crate::table::HookDescriptor;

/// How many getters may return getters before attaching gives up.
pub const MAX_GETTER_DEPTH: usize = 16;

/// An instrumented function's expected callback type and its prolog slot.
///
/// Obtained from [`HookRegistry::find`](crate::registry::HookRegistry::find).
/// Hooks live as long as the registry that resolved them and are identical
/// no matter how many times they are resolved.
pub struct Hook {
    symbol: &'static str,
    key: String,
    target: usize,
    callback_type: CallbackType,
    slot: &'static dyn ErasedSlot,
}

impl Hook {
    /// Validates a descriptor produced by hook table entry `index`.
    pub(crate) fn resolve(
        index: usize,
        descriptor: HookDescriptor,
    ) -> Result<Self, InstrumentationError> {
        let symbol = descriptor.symbol();
        if symbol.is_empty() {
            return Err(InstrumentationError::MissingSymbol { index });
        }

        let Some(slot) = descriptor.slot() else {
            return Err(InstrumentationError::MissingSlot {
                symbol: symbol.to_owned(),
            });
        };

        let callback_type = *descriptor.target_type();
        let slot_type = slot.callback_type();
        check_compatible(&callback_type, &slot_type).map_err(|reason| {
            InstrumentationError::SlotTypeMismatch {
                symbol: symbol.to_owned(),
                slot: slot_type.to_string(),
                expected: callback_type.to_string(),
                reason,
            }
        })?;

        Ok(Self {
            symbol,
            key: symbol::key(symbol),
            target: descriptor.target(),
            callback_type,
            slot,
        })
    }

    /// Returns the instrumented function's symbol.
    #[must_use]
    pub fn symbol(&self) -> &'static str {
        self.symbol
    }

    pub(crate) fn key(&self) -> &str {
        &self.key
    }

    /// Returns the instrumented function's address.
    #[must_use]
    pub fn target(&self) -> usize {
        self.target
    }

    /// Returns the prolog type callbacks must have.
    #[must_use]
    pub fn callback_type(&self) -> &CallbackType {
        &self.callback_type
    }

    /// Returns whether a callback is attached.
    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.slot.is_attached()
    }

    /// Returns the attached callback, composite or not.
    #[must_use]
    pub fn current(&self) -> Option<NativeCallback> {
        self.slot.current()
    }

    /// Replaces the hook's callbacks.
    ///
    /// Getters are resolved and reflected callbacks adapted to the hook's
    /// type; native callbacks must already have it. One callback is stored
    /// as is, several are fused into a composite running them in the given
    /// order. `None` entries are skipped, and attaching nothing disables the
    /// hook.
    ///
    /// The new value is built completely before a single atomic store makes
    /// it visible.
    ///
    /// # Errors
    ///
    /// Returns [`AttachError`] if any callback is invalid. Nothing is stored
    /// in that case and the previous callback stays attached.
    pub fn attach<I, C>(&self, callbacks: I) -> Result<(), AttachError>
    where
        I: IntoIterator<Item = C>,
        C: Into<Option<Callback>>,
    {
        let mut natives = callbacks
            .into_iter()
            .filter_map(Into::<Option<Callback>>::into)
            .map(|callback| self.resolve_callback(callback))
            .collect::<Result<Vec<_>, _>>()?;

        let count = natives.len();
        let callback = match count {
            0 => None,
            1 => natives.pop(),
            _ => {
                let composite = (self.callback_type.compose)(natives).ok_or_else(|| {
                    self.mismatch(
                        "composite member".to_owned(),
                        Mismatch::Prolog {
                            expected: self.callback_type.prolog().name(),
                            actual: "composite member",
                        },
                    )
                })?;
                Some(composite)
            }
        };

        if let Err(reason) = self.slot.publish(callback.as_ref()) {
            let actual = callback.map_or_else(String::new, |native| {
                native.callback_type().to_string()
            });
            return Err(self.mismatch(actual, reason));
        }

        if count == 0 {
            tracing::debug!(hook = self.symbol, "hook disabled");
        } else {
            tracing::debug!(hook = self.symbol, callbacks = count, "hook attached");
        }
        Ok(())
    }

    /// Disables the hook.
    ///
    /// Attached callbacks are dropped from the slot; releasing any resource
    /// they hold is up to their owner.
    pub fn detach(&self) {
        if self.slot.publish(None).is_ok() {
            tracing::debug!(hook = self.symbol, "hook disabled");
        }
    }

    fn resolve_callback(&self, callback: Callback) -> Result<NativeCallback, AttachError> {
        let mut callback = callback;
        let mut depth = 0;
        loop {
            match callback {
                Callback::Native(native) => {
                    check_compatible(&self.callback_type, native.callback_type()).map_err(
                        |reason| self.mismatch(native.callback_type().to_string(), reason),
                    )?;
                    return Ok(native);
                }
                Callback::Reflected(reflected) => {
                    return Ok((self.callback_type.synthesize)(reflected));
                }
                Callback::Getter(getter) => {
                    depth += 1;
                    if depth > MAX_GETTER_DEPTH {
                        return Err(AttachError::GetterTooDeep {
                            hook: self.symbol.to_owned(),
                            limit: MAX_GETTER_DEPTH,
                        });
                    }
                    callback = warden_safe::call(|| getter.callback()).map_err(|source| {
                        AttachError::GetterPanicked {
                            hook: self.symbol.to_owned(),
                            source,
                        }
                    })?;
                }
            }
        }
    }

    fn mismatch(&self, actual: String, reason: Mismatch) -> AttachError {
        AttachError::TypeMismatch {
            hook: self.symbol.to_owned(),
            actual,
            expected: self.callback_type.to_string(),
            reason,
        }
    }
}

impl fmt::Display for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.symbol, self.callback_type)
    }
}

impl fmt::Debug for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hook")
            .field("symbol", &self.symbol)
            .field("callback_type", &self.callback_type)
            .field("attached", &self.is_attached())
            .finish_non_exhaustive()
    }
}
