//! Callback representations and the adapter between them.
//!
//! A hook accepts three kinds of [`Callback`]:
//!
//! - **Native**: a typed prolog, `Fn(&mut P) -> PrologResult<R>`, whose type
//!   must equal the hook's [`CallbackType`] exactly.
//! - **Reflected**: a generic prolog over type-erased arguments,
//!   `Fn(&mut [&mut dyn Any]) -> ReflectedResult`. At attach time it is
//!   wrapped into a native prolog of the hook's type.
//! - **Getter**: an object producing another callback on demand, resolved at
//!   attach time.
//!
//! Only native callbacks ever reach a prolog slot.
//!
//! # Prologs and epilogs
//!
//! A prolog runs before the hooked function's body with mutable access to
//! its arguments. It returns an [`Epilog`] to run after the body with
//! mutable access to the result, or an [`Interrupt`]. An interrupt carries a
//! [`PrologError`] and, possibly, an epilog handed back before the failure.
//! [`PrologError::Abort`] is the sentinel telling the call site to skip the
//! body.

use core::any::{Any, TypeId};
use core::error::Error;
use core::fmt;
use std::sync::Arc;

use crate::signature::{CallbackType, Params};

/// A boxed error returned by a failing callback.
pub type BoxError = Box<dyn Error + Send + Sync + 'static>;

/// The return type of a native prolog.
pub type PrologResult<R> = Result<Epilog<R>, Interrupt<Epilog<R>>>;

/// The return type of a reflected prolog.
pub type ReflectedResult = Result<ReflectedEpilog, Interrupt<ReflectedEpilog>>;

// ─────────────────────────────────────────────────────────────────────────────
// PrologError / Interrupt
// ─────────────────────────────────────────────────────────────────────────────

/// Why a prolog stopped.
#[derive(Debug, thiserror::Error)]
pub enum PrologError {
    /// Skip the hooked function's body and return immediately.
    #[error("call aborted by protection callback")]
    Abort,
    /// The callback itself failed.
    #[error(transparent)]
    Failed(BoxError),
}

impl PrologError {
    /// Creates a [`Failed`](Self::Failed) error.
    pub fn failed(error: impl Into<BoxError>) -> Self {
        Self::Failed(error.into())
    }

    /// Returns whether this is the abort sentinel.
    #[must_use]
    pub fn is_abort(&self) -> bool {
        matches!(self, Self::Abort)
    }
}

/// A prolog error together with the epilog returned alongside it.
///
/// Converting a bare [`PrologError`] yields an interrupt with a no-op
/// epilog, so prologs can use `?` on `Result<_, PrologError>`.
pub struct Interrupt<E> {
    /// The error.
    pub error: PrologError,
    /// The epilog to run despite the error.
    pub epilog: E,
}

impl<E> Interrupt<E> {
    /// Creates an interrupt that still carries an epilog.
    pub fn with_epilog(error: PrologError, epilog: E) -> Self {
        Self { error, epilog }
    }

    /// Returns whether the error is the abort sentinel.
    #[must_use]
    pub fn is_abort(&self) -> bool {
        self.error.is_abort()
    }
}

impl<E: Default> Interrupt<E> {
    /// Creates an interrupt without an epilog.
    pub fn new(error: PrologError) -> Self {
        Self {
            error,
            epilog: E::default(),
        }
    }

    /// Creates an abort interrupt without an epilog.
    #[must_use]
    pub fn abort() -> Self {
        Self::new(PrologError::Abort)
    }
}

impl<E: Default> From<PrologError> for Interrupt<E> {
    fn from(error: PrologError) -> Self {
        Self::new(error)
    }
}

impl<E> fmt::Debug for Interrupt<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interrupt")
            .field("error", &self.error)
            .finish_non_exhaustive()
    }
}

impl<E> fmt::Display for Interrupt<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.error, f)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Epilog
// ─────────────────────────────────────────────────────────────────────────────

/// Callback run after the hooked function's body, with its result.
///
/// The zero value, [`Epilog::noop`], does nothing. Call sites may run any
/// epilog unconditionally or skip it when [`is_noop`](Self::is_noop).
pub struct Epilog<R> {
    func: Option<Box<dyn FnOnce(&mut R)>>,
}

impl<R> Epilog<R> {
    /// Creates an epilog running `f`.
    pub fn new(f: impl FnOnce(&mut R) + 'static) -> Self {
        Self {
            func: Some(Box::new(f)),
        }
    }

    /// Returns the no-op epilog.
    #[must_use]
    pub fn noop() -> Self {
        Self { func: None }
    }

    /// Returns whether this is the no-op epilog.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.func.is_none()
    }

    /// Runs the epilog against the hooked function's result.
    pub fn run(self, results: &mut R) {
        if let Some(func) = self.func {
            func(results);
        }
    }
}

impl<R> Default for Epilog<R> {
    fn default() -> Self {
        Self::noop()
    }
}

impl<R> fmt::Debug for Epilog<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(if self.is_noop() { "Epilog(noop)" } else { "Epilog" })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Prolog / NativeCallback
// ─────────────────────────────────────────────────────────────────────────────

/// A native prolog for arguments `P` and result `R`.
///
/// This is the value stored in a hook's slot and invoked by call sites.
pub struct Prolog<P, R> {
    func: Box<dyn Fn(&mut P) -> PrologResult<R> + Send + Sync>,
}

impl<P, R> Prolog<P, R> {
    /// Wraps `f` as a prolog.
    pub fn new(f: impl Fn(&mut P) -> PrologResult<R> + Send + Sync + 'static) -> Self {
        Self { func: Box::new(f) }
    }

    /// Invokes the prolog.
    ///
    /// # Errors
    ///
    /// Returns the [`Interrupt`] produced by the callback.
    pub fn call(&self, args: &mut P) -> PrologResult<R> {
        (self.func)(args)
    }
}

/// A type-erased native prolog together with its [`CallbackType`].
#[derive(Clone)]
pub struct NativeCallback {
    callback_type: CallbackType,
    prolog: Arc<dyn Any + Send + Sync>,
}

impl NativeCallback {
    /// Creates a native callback from a typed prolog function.
    pub fn new<P, R, F>(f: F) -> Self
    where
        P: Params,
        R: 'static,
        F: Fn(&mut P) -> PrologResult<R> + Send + Sync + 'static,
    {
        Self::from_prolog(Arc::new(Prolog::new(f)))
    }

    /// Erases an existing prolog.
    pub fn from_prolog<P: Params, R: 'static>(prolog: Arc<Prolog<P, R>>) -> Self {
        Self {
            callback_type: CallbackType::of::<P, R>(),
            prolog,
        }
    }

    /// Returns the callback's prolog type.
    #[must_use]
    pub fn callback_type(&self) -> &CallbackType {
        &self.callback_type
    }

    /// Recovers the typed prolog, if `P` and `R` are the callback's types.
    #[must_use]
    pub fn downcast<P: Params, R: 'static>(&self) -> Option<Arc<Prolog<P, R>>> {
        Arc::clone(&self.prolog).downcast::<Prolog<P, R>>().ok()
    }

    /// Returns whether both handles refer to the same prolog.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.prolog, &other.prolog)
    }
}

impl fmt::Debug for NativeCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeCallback")
            .field("type", &self.callback_type)
            .finish_non_exhaustive()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Reflected callbacks
// ─────────────────────────────────────────────────────────────────────────────

/// Epilog of a reflected callback, over type-erased results.
///
/// The slice is empty when the hooked function returns `()` and holds the
/// single result value otherwise.
#[derive(Default)]
pub struct ReflectedEpilog {
    func: Option<Box<dyn FnOnce(&mut [&mut (dyn Any + 'static)])>>,
}

impl ReflectedEpilog {
    /// Creates an epilog running `f`.
    pub fn new(f: impl FnOnce(&mut [&mut (dyn Any + 'static)]) + 'static) -> Self {
        Self {
            func: Some(Box::new(f)),
        }
    }

    /// Returns the no-op epilog.
    #[must_use]
    pub fn noop() -> Self {
        Self::default()
    }

    /// Returns whether this is the no-op epilog.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.func.is_none()
    }

    /// Runs the epilog against type-erased results.
    pub fn run(self, results: &mut [&mut (dyn Any + 'static)]) {
        if let Some(func) = self.func {
            func(results);
        }
    }
}

impl fmt::Debug for ReflectedEpilog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(if self.is_noop() {
            "ReflectedEpilog(noop)"
        } else {
            "ReflectedEpilog"
        })
    }
}

/// A prolog over type-erased arguments, usable with any hook.
#[derive(Clone)]
pub struct ReflectedCallback {
    func: Arc<dyn Fn(&mut [&mut (dyn Any + 'static)]) -> ReflectedResult + Send + Sync>,
}

impl ReflectedCallback {
    /// Wraps `f` as a reflected prolog.
    pub fn new(
        f: impl Fn(&mut [&mut (dyn Any + 'static)]) -> ReflectedResult + Send + Sync + 'static,
    ) -> Self {
        Self { func: Arc::new(f) }
    }

    /// Invokes the prolog with type-erased arguments.
    ///
    /// # Errors
    ///
    /// Returns the [`Interrupt`] produced by the callback.
    pub fn call(&self, args: &mut [&mut (dyn Any + 'static)]) -> ReflectedResult {
        (self.func)(args)
    }
}

impl fmt::Debug for ReflectedCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReflectedCallback").finish_non_exhaustive()
    }
}

/// Borrows a hooked function's result as the slice a reflected epilog sees.
pub fn result_values<R: 'static>(results: &mut R) -> Vec<&mut (dyn Any + 'static)> {
    if TypeId::of::<R>() == TypeId::of::<()>() {
        Vec::new()
    } else {
        vec![results as &mut (dyn Any + 'static)]
    }
}

/// Builds a native prolog of type `Prolog<P, R>` forwarding to `reflected`.
pub(crate) fn synthesize<P: Params, R: 'static>(reflected: ReflectedCallback) -> NativeCallback {
    NativeCallback::new::<P, R, _>(move |args: &mut P| {
        let mut values = args.values_mut();
        match reflected.call(&mut values) {
            Ok(epilog) => Ok(adapt_epilog(epilog)),
            Err(Interrupt { error, epilog }) => {
                Err(Interrupt::with_epilog(error, adapt_epilog(epilog)))
            }
        }
    })
}

fn adapt_epilog<R: 'static>(epilog: ReflectedEpilog) -> Epilog<R> {
    if epilog.is_noop() {
        return Epilog::noop();
    }
    Epilog::new(move |results: &mut R| {
        let mut values = result_values(results);
        epilog.run(&mut values);
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Callback
// ─────────────────────────────────────────────────────────────────────────────

/// An object that yields the callback to attach.
///
/// Lets a callback's identity carry extra state, such as a resource its
/// owner must release. Detaching never calls back into the getter.
pub trait CallbackGetter: Send + Sync + 'static {
    /// Returns the callback to attach. It may itself be a getter.
    fn callback(&self) -> Callback;
}

/// A callback accepted by [`Hook::attach`](crate::hook::Hook::attach).
#[derive(Clone)]
pub enum Callback {
    /// A typed prolog.
    Native(NativeCallback),
    /// A type-erased prolog, adapted at attach time.
    Reflected(ReflectedCallback),
    /// A deferred callback, resolved at attach time.
    Getter(Arc<dyn CallbackGetter>),
}

impl Callback {
    /// Creates a native callback.
    pub fn native<P, R, F>(f: F) -> Self
    where
        P: Params,
        R: 'static,
        F: Fn(&mut P) -> PrologResult<R> + Send + Sync + 'static,
    {
        Self::Native(NativeCallback::new(f))
    }

    /// Creates a reflected callback.
    pub fn reflected(
        f: impl Fn(&mut [&mut (dyn Any + 'static)]) -> ReflectedResult + Send + Sync + 'static,
    ) -> Self {
        Self::Reflected(ReflectedCallback::new(f))
    }

    /// Creates a getter callback.
    pub fn getter(getter: impl CallbackGetter) -> Self {
        Self::Getter(Arc::new(getter))
    }
}

impl From<NativeCallback> for Callback {
    fn from(callback: NativeCallback) -> Self {
        Self::Native(callback)
    }
}

impl From<ReflectedCallback> for Callback {
    fn from(callback: ReflectedCallback) -> Self {
        Self::Reflected(callback)
    }
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Native(native) => f.debug_tuple("Native").field(native).finish(),
            Self::Reflected(reflected) => f.debug_tuple("Reflected").field(reflected).finish(),
            Self::Getter(_) => f.write_str("Getter"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::sync::atomic::{AtomicBool, Ordering};
    use std::collections::HashMap;

    type Args = (i32, String, bool, f64, HashMap<String, i32>);
    type Out = (HashMap<String, i32>, String);

    #[test]
    fn reflected_round_trip_sees_concrete_values() {
        let seen_args = Arc::new(parking_lot::Mutex::new(Vec::<String>::new()));
        let seen = Arc::clone(&seen_args);

        let reflected = ReflectedCallback::new(move |args| {
            let mut seen = seen.lock();
            seen.push(args.len().to_string());
            assert_eq!(args[0].downcast_ref::<i32>(), Some(&-4));
            assert_eq!(args[1].downcast_ref::<String>().map(String::as_str), Some("query"));
            assert_eq!(args[2].downcast_ref::<bool>(), Some(&true));
            assert_eq!(args[3].downcast_ref::<f64>(), Some(&1.5));
            assert_eq!(
                args[4].downcast_ref::<HashMap<String, i32>>(),
                Some(&HashMap::from([("k".to_owned(), 1)]))
            );
            seen.push("checked".to_owned());

            Ok(ReflectedEpilog::new(|results| {
                assert_eq!(results.len(), 1);
                let (map, text) = results[0].downcast_mut::<Out>().expect("result type");
                assert_eq!(map.get("r"), Some(&2));
                assert_eq!(text, "done");
                text.push('!');
            }))
        });

        let native = synthesize::<Args, Out>(reflected);
        assert_eq!(native.callback_type(), &CallbackType::of::<Args, Out>());

        let prolog = native.downcast::<Args, Out>().expect("synthesized type");
        let mut args: Args = (
            -4,
            "query".to_owned(),
            true,
            1.5,
            HashMap::from([("k".to_owned(), 1)]),
        );
        let epilog = prolog.call(&mut args).expect("prolog succeeds");
        assert!(!epilog.is_noop());

        let mut results: Out = (HashMap::from([("r".to_owned(), 2)]), "done".to_owned());
        epilog.run(&mut results);
        assert_eq!(results.1, "done!");
        assert_eq!(*seen_args.lock(), vec!["5".to_owned(), "checked".to_owned()]);
    }

    #[test]
    fn reflected_without_epilog_yields_noop() {
        let native =
            synthesize::<(u32,), ()>(ReflectedCallback::new(|_| Ok(ReflectedEpilog::noop())));
        let prolog = native.downcast::<(u32,), ()>().unwrap();
        let epilog = prolog.call(&mut (1,)).unwrap();
        assert!(epilog.is_noop());
        epilog.run(&mut ());
    }

    #[test]
    fn reflected_can_modify_arguments() {
        let native = synthesize::<(String,), ()>(ReflectedCallback::new(|args| {
            if let Some(text) = args[0].downcast_mut::<String>() {
                text.make_ascii_uppercase();
            }
            Ok(ReflectedEpilog::noop())
        }));
        let mut args = ("select".to_owned(),);
        native.downcast::<(String,), ()>().unwrap().call(&mut args).unwrap();
        assert_eq!(args.0, "SELECT");
    }

    #[test]
    fn reflected_error_passes_through_with_epilog() {
        let ran = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&ran);
        let native = synthesize::<(u32,), ()>(ReflectedCallback::new(move |_| {
            let flag = Arc::clone(&flag);
            Err(Interrupt::with_epilog(
                PrologError::Abort,
                ReflectedEpilog::new(move |results| {
                    assert!(results.is_empty());
                    flag.store(true, Ordering::SeqCst);
                }),
            ))
        }));

        let interrupt = native
            .downcast::<(u32,), ()>()
            .unwrap()
            .call(&mut (0,))
            .unwrap_err();
        assert!(interrupt.is_abort());
        assert!(!interrupt.epilog.is_noop());

        interrupt.epilog.run(&mut ());
        assert!(ran.load(Ordering::SeqCst));
    }

    #[test]
    fn reflected_failure_keeps_concrete_error() {
        #[derive(Debug, thiserror::Error)]
        #[error("denied by rule {0}")]
        struct Denied(u32);

        let native = synthesize::<(), u8>(ReflectedCallback::new(|_| {
            Err(PrologError::failed(Denied(12)).into())
        }));
        let interrupt = native.downcast::<(), u8>().unwrap().call(&mut ()).unwrap_err();
        let PrologError::Failed(error) = interrupt.error else {
            panic!("expected a failure");
        };
        assert_eq!(error.downcast_ref::<Denied>().map(|denied| denied.0), Some(12));
    }

    #[test]
    fn result_values_is_empty_for_unit() {
        assert!(result_values(&mut ()).is_empty());
        assert_eq!(result_values(&mut 3_u8).len(), 1);
    }

    #[test]
    fn downcast_to_wrong_type_fails() {
        let native = NativeCallback::new::<(u32,), (), _>(|_| Ok(Epilog::noop()));
        assert!(native.downcast::<(u64,), ()>().is_none());
        assert!(native.downcast::<(u32,), ()>().is_some());
    }

    #[test]
    fn interrupt_from_error_has_noop_epilog() {
        let interrupt: Interrupt<Epilog<()>> = PrologError::Abort.into();
        assert!(interrupt.is_abort());
        assert!(interrupt.epilog.is_noop());
        assert_eq!(interrupt.to_string(), "call aborted by protection callback");
    }
}
