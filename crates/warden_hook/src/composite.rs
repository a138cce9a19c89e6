//! Fusing several callbacks attached to one hook into a single prolog.
//!
//! Members run in attachment order with the same arguments. A member's
//! non-noop epilog is queued; an interrupt stops the remaining members and
//! becomes the composite's error. The composite epilog replays every queued
//! epilog in the order it was queued, whether or not the prolog phase
//! failed: an epilog handed back by a member always runs.
//!
//! The whole prolog phase runs under one guarded call. A panicking member
//! ends the phase early, the panic is reported, and the composite returns
//! normally with the epilogs queued so far.

use std::sync::Arc;

use crate::callback::{Epilog, Interrupt, NativeCallback, Prolog, PrologError, PrologResult};
use crate::signature::Params;

/// Builds a composite native callback of type `Prolog<P, R>`.
///
/// Returns `None` if a member is not of that type.
pub(crate) fn compose<P: Params, R: 'static>(
    members: Vec<NativeCallback>,
) -> Option<NativeCallback> {
    let members = members
        .iter()
        .map(NativeCallback::downcast::<P, R>)
        .collect::<Option<Vec<_>>>()?;

    Some(NativeCallback::new::<P, R, _>(move |args: &mut P| {
        run_members(&members, args)
    }))
}

fn run_members<P, R: 'static>(members: &[Arc<Prolog<P, R>>], args: &mut P) -> PrologResult<R> {
    let mut epilogs = Vec::new();

    let outcome = warden_safe::call(|| -> Option<PrologError> {
        for member in members {
            match member.call(args) {
                Ok(epilog) => queue(&mut epilogs, epilog),
                Err(Interrupt { error, epilog }) => {
                    queue(&mut epilogs, epilog);
                    return Some(error);
                }
            }
        }
        None
    });

    let error = outcome.unwrap_or_else(|panic| {
        warden_safe::report(&panic);
        None
    });

    let epilog = replay(epilogs);
    match error {
        Some(error) => Err(Interrupt::with_epilog(error, epilog)),
        None => Ok(epilog),
    }
}

fn queue<R>(epilogs: &mut Vec<Epilog<R>>, epilog: Epilog<R>) {
    if !epilog.is_noop() {
        epilogs.push(epilog);
    }
}

fn replay<R: 'static>(epilogs: Vec<Epilog<R>>) -> Epilog<R> {
    if epilogs.is_empty() {
        return Epilog::noop();
    }
    Epilog::new(move |results: &mut R| {
        for epilog in epilogs {
            if let Err(panic) = warden_safe::call(|| epilog.run(results)) {
                warden_safe::report(&panic);
            }
        }
    })
}
