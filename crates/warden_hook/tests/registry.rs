//! Lookup, validation and health of hook tables.


use std::sync::Arc;

use warden_hook::prelude::*;
use warden_hook::signature::Mismatch;

use test_utils::{SYMBOLS, TABLE, sha_sum};

fn remove(_: String) -> bool {
    true
}

static WRONG_SLOT: PrologSlot<(String,), u16> = PrologSlot::new();
static REMOVE_SLOT: PrologSlot<(String,), bool> = PrologSlot::new();
static SHA_SLOT: PrologSlot<(Vec<u8>,), u64> = PrologSlot::new();

static PANICKING: HookTable = HookTable::new(
    warden_hook::VERSION,
    &[
        || HookDescriptor::new("os.Remove", remove as fn(String) -> bool).with_slot(&REMOVE_SLOT),
        || panic!("corrupted entry"),
    ],
);

static MISSING_SLOT: HookTable = HookTable::new(
    warden_hook::VERSION,
    &[|| HookDescriptor::new("os.Remove", remove as fn(String) -> bool)],
);

static MISSING_SYMBOL: HookTable = HookTable::new(
    warden_hook::VERSION,
    &[|| HookDescriptor::new("", remove as fn(String) -> bool).with_slot(&REMOVE_SLOT)],
);

static WRONG_SLOT_TYPE: HookTable = HookTable::new(
    warden_hook::VERSION,
    &[|| HookDescriptor::new("os.Remove", remove as fn(String) -> bool).with_slot(&WRONG_SLOT)],
);

static UNSORTED: HookTable = HookTable::new(
    warden_hook::VERSION,
    &[
        || HookDescriptor::new("os.Remove", remove as fn(String) -> bool).with_slot(&REMOVE_SLOT),
        || {
            HookDescriptor::new("crypto/sha.sum", sha_sum as fn(Vec<u8>) -> u64)
                .with_slot(&SHA_SLOT)
        },
    ],
);

#[test]
fn every_entry_is_found() {
    let registry = HookRegistry::new(Some(&TABLE));
    for symbol in SYMBOLS {
        let hook = registry
            .find(symbol)
            .unwrap()
            .unwrap_or_else(|| panic!("{symbol} not found"));
        assert_eq!(hook.symbol(), symbol);
    }
    assert_eq!(registry.hooks().len(), SYMBOLS.len());
}

#[test]
fn lookups_in_reverse_order_agree() {
    let forward = HookRegistry::new(Some(&TABLE));
    let backward = HookRegistry::new(Some(&TABLE));
    for symbol in SYMBOLS.iter().rev() {
        let hook = backward.find(symbol).unwrap().unwrap();
        assert_eq!(hook.symbol(), *symbol);
    }
    for symbol in SYMBOLS {
        let a = forward.find(symbol).unwrap().unwrap();
        let b = backward.find(symbol).unwrap().unwrap();
        assert_eq!(a.target(), b.target());
        assert_eq!(a.callback_type(), b.callback_type());
    }
}

#[test]
fn repeated_lookups_return_the_same_hook() {
    let registry = HookRegistry::new(Some(&TABLE));
    let first = registry.find("net/http.Get").unwrap().unwrap();
    let second = registry.find("net/http.Get").unwrap().unwrap();
    assert!(Arc::ptr_eq(&first, &second));
}

#[test]
fn unknown_symbols_are_not_errors() {
    let registry = HookRegistry::new(Some(&TABLE));
    for symbol in ["", "os.Chmod", "a", "zzz", "net/http.Post"] {
        assert!(registry.find(symbol).unwrap().is_none(), "{symbol}");
    }
}

#[test]
fn vendored_and_spelled_out_symbols_resolve() {
    let registry = HookRegistry::new(Some(&TABLE));
    let canonical = registry.find("database/sql.(*DB).Query").unwrap().unwrap();

    let vendored = registry
        .find("github.com/acme/app/vendor/database/sql.(*DB).Query")
        .unwrap()
        .unwrap();
    assert!(Arc::ptr_eq(&canonical, &vendored));

    let plain = registry.find("database/sql.DB.Query").unwrap().unwrap();
    assert!(Arc::ptr_eq(&canonical, &plain));
}

#[test]
fn panicking_entry_is_reported() {
    let registry = HookRegistry::new(Some(&PANICKING));
    let error = registry.preload().unwrap_err();
    let InstrumentationError::Panicked { index, source } = error else {
        panic!("unexpected error: {error}");
    };
    assert_eq!(index, 1);
    assert_eq!(source.message(), "corrupted entry");
}

#[test]
fn entry_without_slot_is_rejected() {
    let registry = HookRegistry::new(Some(&MISSING_SLOT));
    assert_eq!(
        registry.find("os.Remove"),
        Err(InstrumentationError::MissingSlot {
            symbol: "os.Remove".to_owned()
        })
    );
}

#[test]
fn entry_without_symbol_is_rejected() {
    let registry = HookRegistry::new(Some(&MISSING_SYMBOL));
    assert_eq!(
        registry.preload(),
        Err(InstrumentationError::MissingSymbol { index: 0 })
    );
}

#[test]
fn slot_of_another_type_is_rejected() {
    let registry = HookRegistry::new(Some(&WRONG_SLOT_TYPE));
    let error = registry.find("os.Remove").unwrap_err();
    let InstrumentationError::SlotTypeMismatch { symbol, reason, .. } = error else {
        panic!("unexpected error: {error}");
    };
    assert_eq!(symbol, "os.Remove");
    assert_eq!(
        reason,
        Mismatch::Output {
            expected: "bool",
            actual: "u16"
        }
    );
}

#[test]
fn preload_detects_unsorted_tables() {
    let registry = HookRegistry::new(Some(&UNSORTED));
    let error = registry.preload().unwrap_err();
    assert!(
        matches!(error, InstrumentationError::Unsorted { index: 1, .. }),
        "{error}"
    );
}

#[test]
fn preload_then_find_hits_the_index() {
    let registry = HookRegistry::new(Some(&TABLE));
    assert_eq!(registry.preload(), Ok(SYMBOLS.len()));
    assert_eq!(registry.len(), SYMBOLS.len());
    assert!(registry.find("os.OpenFile").unwrap().is_some());
    assert_eq!(registry.len(), SYMBOLS.len());
}

#[test]
fn health_follows_table_and_version() {
    assert_eq!(
        HookRegistry::new(None).health(warden_hook::VERSION),
        Err(InstrumentationError::NotInstrumented)
    );
    assert_eq!(
        HookRegistry::new(Some(&TABLE)).health(warden_hook::VERSION),
        Ok(())
    );

    let error = HookRegistry::new(Some(&TABLE)).health("0.0.0-other").unwrap_err();
    assert_eq!(
        error,
        InstrumentationError::VersionSkew {
            expected: "0.0.0-other".to_owned(),
            actual: warden_hook::VERSION.to_owned(),
        }
    );
    assert!(error.to_string().contains("version skew"));
}

#[test]
fn process_registry_is_installed_once() {
    warden_hook::install(&TABLE).unwrap();
    assert_eq!(
        warden_hook::install(&TABLE),
        Err(InstrumentationError::AlreadyInstalled)
    );

    warden_hook::health(warden_hook::VERSION).unwrap();
    let hook = warden_hook::find("os.Remove").unwrap().unwrap();
    assert_eq!(hook.symbol(), "os.Remove");
    assert!(warden_hook::registry().table().is_some());
}
