//! Calling-convention descriptors.
//!
//! A hooked function `fn(P0, .., Pn) -> R` is described by the tuple of its
//! parameter types `P = (P0, .., Pn)` and its result type `R`. From those two
//! the engine derives the prolog type a callback must have
//! ([`Prolog<P, R>`](crate::callback::Prolog)) and records it, once, in a
//! [`CallbackType`].
//!
//! # Representing awkward parameters
//!
//! Every parameter type must be `'static`, because callback types are
//! compared by [`TypeId`]:
//!
//! - A method receiver is the first parameter. When its type cannot be
//!   named (a borrowed `&self`, a private type), the instrumentation passes
//!   a [`Receiver`] instead.
//! - A variadic tail is passed as one `Vec<T>` parameter.
//!
//! # Compatibility
//!
//! [`check_compatible`] is the single predicate deciding whether a callback
//! fits a hook. It is pure, so it is tested on its own, apart from slots and
//! atomics.

use core::any::{Any, TypeId};
use core::fmt;

use variadics_please::all_tuples;

use crate::callback::{NativeCallback, Prolog, ReflectedCallback};
use crate::composite;

// ─────────────────────────────────────────────────────────────────────────────
// TypeInfo
// ─────────────────────────────────────────────────────────────────────────────

/// A runtime type identity together with its name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeInfo {
    id: TypeId,
    name: &'static str,
}

impl TypeInfo {
    /// Describes `T`.
    #[must_use]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: core::any::type_name::<T>(),
        }
    }

    /// Returns the type's [`TypeId`].
    #[must_use]
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// Returns the type's name as reported by [`core::any::type_name`].
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl fmt::Display for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Receiver
// ─────────────────────────────────────────────────────────────────────────────

/// Stand-in for a method receiver whose type cannot appear in a hook
/// signature.
///
/// Only the receiver's address is kept. It identifies the object a call was
/// made on; it cannot be turned back into a reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Receiver(usize);

impl Receiver {
    /// Erases `receiver` down to its address.
    #[must_use]
    pub fn of<T: ?Sized>(receiver: &T) -> Self {
        Self(core::ptr::from_ref(receiver).cast::<()>().addr())
    }

    /// Returns the receiver's address.
    #[must_use]
    pub fn address(self) -> usize {
        self.0
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Params
// ─────────────────────────────────────────────────────────────────────────────

/// A tuple of call arguments.
///
/// Implemented for `()` and tuples of up to 12 `'static` types. This is the
/// marshaling boundary between typed call sites and reflected callbacks: a
/// reflected callback sees the arguments as a slice of [`Any`] references,
/// one per element, in declaration order.
pub trait Params: 'static {
    /// Describes each element type, in order.
    fn types() -> Vec<TypeInfo>;

    /// Borrows every element mutably as a type-erased value.
    fn values_mut(&mut self) -> Vec<&mut (dyn Any + 'static)>;
}

impl Params for () {
    fn types() -> Vec<TypeInfo> {
        Vec::new()
    }

    fn values_mut(&mut self) -> Vec<&mut (dyn Any + 'static)> {
        Vec::new()
    }
}

macro_rules! impl_params_tuple {
    ($($param:ident),*) => {
        impl<$($param: 'static),*> Params for ($($param,)*) {
            fn types() -> Vec<TypeInfo> {
                vec![$(TypeInfo::of::<$param>()),*]
            }

            #[expect(non_snake_case, reason = "bindings reuse the tuple's type parameter names")]
            fn values_mut(&mut self) -> Vec<&mut (dyn Any + 'static)> {
                let ($($param,)*) = self;
                vec![$($param as &mut (dyn Any + 'static)),*]
            }
        }
    };
}

all_tuples!(impl_params_tuple, 1, 12, P);

// ─────────────────────────────────────────────────────────────────────────────
// HookTarget
// ─────────────────────────────────────────────────────────────────────────────

/// A function pointer type that can be instrumented.
///
/// Implemented for `fn(P0, .., Pn) -> R` with up to 12 parameters. The
/// instrumentation names the target through this trait and the engine
/// derives the hook's [`CallbackType`] from it.
pub trait HookTarget: Copy + 'static {
    /// The parameter tuple.
    type Params: Params;
    /// The result type.
    type Output: 'static;

    /// Returns the function's address.
    fn address(self) -> usize;

    /// Returns the prolog type callbacks for this target must have.
    #[must_use]
    fn callback_type() -> CallbackType {
        CallbackType::of::<Self::Params, Self::Output>()
    }
}

macro_rules! impl_hook_target {
    ($($param:ident),*) => {
        impl<Out: 'static, $($param: 'static),*> HookTarget for fn($($param),*) -> Out {
            type Params = ($($param,)*);
            type Output = Out;

            fn address(self) -> usize {
                self as usize
            }
        }
    };
}

all_tuples!(impl_hook_target, 0, 12, P);

// ─────────────────────────────────────────────────────────────────────────────
// CallbackType
// ─────────────────────────────────────────────────────────────────────────────

/// The exact prolog type a hook expects.
///
/// Besides the type identity, a `CallbackType` carries the two trampolines
/// that only code monomorphized for the hook's `P` and `R` can provide:
/// turning a reflected callback into a native one, and fusing several native
/// callbacks into a composite.
#[derive(Clone, Copy)]
pub struct CallbackType {
    prolog: TypeInfo,
    params: fn() -> Vec<TypeInfo>,
    output: TypeInfo,
    pub(crate) synthesize: fn(ReflectedCallback) -> NativeCallback,
    pub(crate) compose: fn(Vec<NativeCallback>) -> Option<NativeCallback>,
}

impl CallbackType {
    /// Returns the callback type for parameters `P` and result `R`.
    #[must_use]
    pub fn of<P: Params, R: 'static>() -> Self {
        Self {
            prolog: TypeInfo::of::<Prolog<P, R>>(),
            params: P::types,
            output: TypeInfo::of::<R>(),
            synthesize: crate::callback::synthesize::<P, R>,
            compose: composite::compose::<P, R>,
        }
    }

    /// Returns the identity of the prolog type.
    #[must_use]
    pub fn prolog(&self) -> TypeInfo {
        self.prolog
    }

    /// Returns the parameter types, in order.
    #[must_use]
    pub fn params(&self) -> Vec<TypeInfo> {
        (self.params)()
    }

    /// Returns the result type.
    #[must_use]
    pub fn output(&self) -> TypeInfo {
        self.output
    }

    /// Returns whether a callback of type `other` can be attached where
    /// `self` is expected.
    #[must_use]
    pub fn is_compatible(&self, other: &CallbackType) -> bool {
        check_compatible(self, other).is_ok()
    }
}

impl PartialEq for CallbackType {
    fn eq(&self, other: &Self) -> bool {
        self.prolog.id == other.prolog.id
    }
}

impl Eq for CallbackType {}

impl fmt::Display for CallbackType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let params = self.params();
        f.write_str("fn(&mut (")?;
        for (index, param) in params.iter().enumerate() {
            if index > 0 {
                f.write_str(", ")?;
            }
            f.write_str(param.name)?;
        }
        if params.len() == 1 {
            f.write_str(",")?;
        }
        write!(f, ")) -> PrologResult<{}>", self.output.name)
    }
}

impl fmt::Debug for CallbackType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CallbackType")
            .field(&format_args!("{self}"))
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Compatibility
// ─────────────────────────────────────────────────────────────────────────────

/// Why a callback type does not fit a hook.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Mismatch {
    /// The parameter counts differ.
    #[error("expected {expected} parameters, found {actual}")]
    Arity {
        /// Parameters the hook passes.
        expected: usize,
        /// Parameters the callback takes.
        actual: usize,
    },
    /// A parameter has a different type.
    #[error("parameter {index} is `{actual}`, expected `{expected}`")]
    Parameter {
        /// Position of the first differing parameter.
        index: usize,
        /// Type the hook passes.
        expected: &'static str,
        /// Type the callback takes.
        actual: &'static str,
    },
    /// The epilog receives a different result type.
    #[error("epilog result is `{actual}`, expected `{expected}`")]
    Output {
        /// Result type of the hooked function.
        expected: &'static str,
        /// Result type the callback's epilog takes.
        actual: &'static str,
    },
    /// Same shape, different prolog identity.
    #[error("prolog `{actual}` is not `{expected}`")]
    Prolog {
        /// Prolog type the hook expects.
        expected: &'static str,
        /// Prolog type of the callback.
        actual: &'static str,
    },
}

/// Checks that a callback of type `actual` can be attached where `expected`
/// is required.
///
/// # Errors
///
/// Returns the first [`Mismatch`] found: arity, then parameters in order,
/// then the result type.
pub fn check_compatible(expected: &CallbackType, actual: &CallbackType) -> Result<(), Mismatch> {
    if expected.prolog.id == actual.prolog.id {
        return Ok(());
    }

    let expected_params = expected.params();
    let actual_params = actual.params();
    if expected_params.len() != actual_params.len() {
        return Err(Mismatch::Arity {
            expected: expected_params.len(),
            actual: actual_params.len(),
        });
    }

    if let Some((index, (want, got))) = expected_params
        .iter()
        .zip(&actual_params)
        .enumerate()
        .find(|(_, (want, got))| want.id != got.id)
    {
        return Err(Mismatch::Parameter {
            index,
            expected: want.name,
            actual: got.name,
        });
    }

    if expected.output.id != actual.output.id {
        return Err(Mismatch::Output {
            expected: expected.output.name,
            actual: actual.output.name,
        });
    }

    Err(Mismatch::Prolog {
        expected: expected.prolog.name,
        actual: actual.prolog.name,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn two_args(_: u32, _: String) -> bool {
        true
    }

    #[test]
    fn identical_types_are_compatible() {
        let expected = CallbackType::of::<(u32, String), bool>();
        let actual = CallbackType::of::<(u32, String), bool>();
        assert_eq!(check_compatible(&expected, &actual), Ok(()));
        assert!(expected.is_compatible(&actual));
        assert_eq!(expected, actual);
    }

    #[test]
    fn arity_mismatch() {
        let expected = CallbackType::of::<(u32, String), bool>();
        let actual = CallbackType::of::<(u32,), bool>();
        assert_eq!(
            check_compatible(&expected, &actual),
            Err(Mismatch::Arity {
                expected: 2,
                actual: 1
            })
        );
    }

    #[test]
    fn missing_indirection_is_a_parameter_mismatch() {
        let expected = CallbackType::of::<(Box<u32>,), ()>();
        let actual = CallbackType::of::<(u32,), ()>();
        let Err(Mismatch::Parameter { index, .. }) = check_compatible(&expected, &actual) else {
            panic!("expected a parameter mismatch");
        };
        assert_eq!(index, 0);
    }

    #[test]
    fn parameter_mismatch_reports_first_difference() {
        let expected = CallbackType::of::<(u32, String, bool), ()>();
        let actual = CallbackType::of::<(u32, &'static str, u8), ()>();
        assert_eq!(
            check_compatible(&expected, &actual),
            Err(Mismatch::Parameter {
                index: 1,
                expected: core::any::type_name::<String>(),
                actual: core::any::type_name::<&'static str>(),
            })
        );
    }

    #[test]
    fn epilog_result_mismatch() {
        let expected = CallbackType::of::<(u32,), (bool, String)>();
        let actual = CallbackType::of::<(u32,), bool>();
        assert!(matches!(
            check_compatible(&expected, &actual),
            Err(Mismatch::Output { .. })
        ));
    }

    #[test]
    fn hook_target_derives_callback_type() {
        let target = two_args as fn(u32, String) -> bool;
        assert_ne!(target.address(), 0);
        assert_eq!(
            <fn(u32, String) -> bool as HookTarget>::callback_type(),
            CallbackType::of::<(u32, String), bool>()
        );
    }

    #[test]
    fn zero_arity_target() {
        let callback_type = <fn() -> u8 as HookTarget>::callback_type();
        assert!(callback_type.params().is_empty());
        assert_eq!(callback_type.output(), TypeInfo::of::<u8>());
        assert_eq!(callback_type.to_string(), "fn(&mut ()) -> PrologResult<u8>");
    }

    #[test]
    fn display_lists_params() {
        let single = CallbackType::of::<(u32,), ()>();
        assert_eq!(single.to_string(), "fn(&mut (u32,)) -> PrologResult<()>");

        let pair = CallbackType::of::<(u32, bool), ()>();
        assert_eq!(pair.to_string(), "fn(&mut (u32, bool)) -> PrologResult<()>");
    }

    #[test]
    fn values_mut_exposes_each_argument() {
        let mut args = (7_u32, String::from("x"), HashMap::from([(1_u8, 2_u8)]));
        let mut values = args.values_mut();
        assert_eq!(values.len(), 3);
        assert_eq!(values[0].downcast_ref::<u32>(), Some(&7));
        assert_eq!(values[1].downcast_ref::<String>().map(String::as_str), Some("x"));

        *values[0].downcast_mut::<u32>().unwrap() = 9;
        drop(values);
        assert_eq!(args.0, 9);
    }

    #[test]
    fn receiver_keeps_address() {
        let value = 5_u64;
        let receiver = Receiver::of(&value);
        assert_eq!(receiver.address(), core::ptr::from_ref(&value).addr());
    }

    #[test]
    fn variadic_tail_is_a_vec_parameter() {
        let callback_type = <fn(String, Vec<u32>) as HookTarget>::callback_type();
        assert_eq!(callback_type.params()[1], TypeInfo::of::<Vec<u32>>());
    }
}
