//! Panic containment for code running on a protected program's hot path.
//!
//! Callbacks attached to instrumented functions are written independently of
//! the program they protect. A panic inside one of them must never unwind
//! into the protected program, so every invocation the hook engine makes on
//! behalf of a callback goes through [`call`], which turns the panic into a
//! [`PanicError`] value.
//!
//! Contained panics are then handed to [`report`], which logs each distinct
//! failure once and counts the repeats, since a broken callback on a hot
//! path would otherwise flood the logs.
//!
//! # Example
//!
//! ```
//! let outcome = warden_safe::call(|| 40 + 2);
//! assert_eq!(outcome.unwrap(), 42);
//!
//! let outcome = warden_safe::call(|| -> u32 { panic!("bad rule") });
//! let error = outcome.unwrap_err();
//! assert_eq!(error.message(), "bad rule");
//! warden_safe::report(&error);
//! ```

mod report;

use core::any::Any;
use std::panic::{self, AssertUnwindSafe};

pub use report::{Reporter, report};

/// A panic caught by [`call`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("panic: {message}")]
pub struct PanicError {
    message: String,
}

impl PanicError {
    /// Creates a panic error from a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Builds the error from a payload returned by `catch_unwind`.
    ///
    /// `panic!` payloads are either `&'static str` or `String`; anything
    /// else came from `panic_any` and is described by a placeholder.
    #[must_use]
    pub fn from_payload(payload: &(dyn Any + Send)) -> Self {
        let message = if let Some(message) = payload.downcast_ref::<&'static str>() {
            (*message).to_owned()
        } else if let Some(message) = payload.downcast_ref::<String>() {
            message.clone()
        } else {
            "non-string panic payload".to_owned()
        };
        Self { message }
    }

    /// Returns the panic message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Runs `f`, converting a panic into a [`PanicError`].
///
/// The closure is asserted unwind-safe: callers only observe state the
/// closure touched through the returned value, and state left behind by a
/// panicking callback is the callback's own.
///
/// # Errors
///
/// Returns [`PanicError`] when `f` panics.
pub fn call<T>(f: impl FnOnce() -> T) -> Result<T, PanicError> {
    panic::catch_unwind(AssertUnwindSafe(f)).map_err(|payload| PanicError::from_payload(&*payload))
}

/// Runs a fallible `f`, folding a panic into its error type.
///
/// # Errors
///
/// Returns the closure's own error, or a [`PanicError`] converted into `E`
/// when it panics.
pub fn try_call<T, E>(f: impl FnOnce() -> Result<T, E>) -> Result<T, E>
where
    E: From<PanicError>,
{
    call(f).unwrap_or_else(|panic| Err(E::from(panic)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq, thiserror::Error)]
    enum TestError {
        #[error("failed")]
        Failed,
        #[error(transparent)]
        Panic(#[from] PanicError),
    }

    #[test]
    fn call_returns_value() {
        assert_eq!(call(|| "ok"), Ok("ok"));
    }

    #[test]
    fn call_catches_static_str_panic() {
        let error = call(|| -> u32 { panic!("boom") }).unwrap_err();
        assert_eq!(error.message(), "boom");
        assert_eq!(error.to_string(), "panic: boom");
    }

    #[test]
    fn call_catches_formatted_panic() {
        let index = 3;
        let error = call(|| -> u32 { panic!("index {index} out of range") }).unwrap_err();
        assert_eq!(error.message(), "index 3 out of range");
    }

    #[test]
    fn call_catches_non_string_payload() {
        let error = call(|| -> u32 { std::panic::panic_any(7_u8) }).unwrap_err();
        assert_eq!(error.message(), "non-string panic payload");
    }

    #[test]
    fn call_leaves_mutations_before_panic_visible() {
        let mut log = Vec::new();
        let result = call(|| -> u32 {
            log.push(1);
            panic!("after push");
        });
        assert!(result.is_err());
        assert_eq!(log, vec![1]);
    }

    #[test]
    fn try_call_keeps_closure_error() {
        let result: Result<(), TestError> = try_call(|| Err(TestError::Failed));
        assert_eq!(result, Err(TestError::Failed));
    }

    #[test]
    fn try_call_folds_panic() {
        let result: Result<(), TestError> = try_call(|| panic!("inner"));
        assert_eq!(result, Err(TestError::Panic(PanicError::new("inner"))));
    }
}
