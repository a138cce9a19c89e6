//! Concurrent protect and unprotect calls on one agent.
//!
//! Whatever the interleaving, the agent's bookkeeping must agree with the
//! slot: a symbol is listed as protected exactly when a callback is
//! attached.

use std::sync::Barrier;
use std::thread;

use warden_agent::{Agent, AgentConfig};
use warden_hook::prelude::*;

static UPLOAD: PrologSlot<(String,), bool> = PrologSlot::new();

fn upload(path: String) -> bool {
    UPLOAD.call((path,), |(path,)| !path.is_empty())
}

static TABLE: HookTable = HookTable::new(
    warden_hook::VERSION,
    &[|| HookDescriptor::new("net/ftp.upload", upload as fn(String) -> bool).with_slot(&UPLOAD)],
);

const SYMBOL: &str = "net/ftp.upload";

fn block_all() -> Callback {
    Callback::native::<(String,), bool, _>(|_| Err(Interrupt::abort()))
}

#[test]
fn bookkeeping_matches_slot_under_contention() {
    let registry: &'static HookRegistry = Box::leak(Box::new(HookRegistry::new(Some(&TABLE))));
    let agent = Agent::start(AgentConfig::default(), registry).unwrap();
    let hook = registry.find(SYMBOL).unwrap().unwrap();

    for round in 0..200 {
        let barrier = Barrier::new(3);
        thread::scope(|scope| {
            scope.spawn(|| {
                barrier.wait();
                agent.protect(SYMBOL, [block_all()]).unwrap();
            });
            scope.spawn(|| {
                barrier.wait();
                agent.unprotect(SYMBOL);
            });
            scope.spawn(|| {
                barrier.wait();
                if round % 4 == 0 {
                    agent.shutdown();
                }
            });
        });

        assert_eq!(
            agent.protected().contains(&SYMBOL),
            hook.is_attached(),
            "round {round}"
        );
        assert_eq!(upload("report.csv".into()), !hook.is_attached());
    }

    agent.shutdown();
    assert!(!hook.is_attached());
    assert!(upload("report.csv".into()));
}
