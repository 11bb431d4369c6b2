// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! End-to-end relay chains: a sender, k relays and a checker, each on its
//! own task. Every value must reach the checker exactly once and in order.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use csp_rt::{buffered, rendezvous, ExecutionMode, FnProcess, Parallel, Reader, Writer};

const COUNT: u32 = 1000;

fn relay(name: String, input: Reader<u32>, output: Writer<u32>) -> FnProcess<impl FnOnce() + Send> {
    FnProcess::new(name, move || {
        for _ in 0..COUNT {
            output.write(input.read());
        }
    })
}

/// Build and run a chain of `relays` relays over channels from `make`.
/// Returns how many values the checker saw.
fn run_chain<F>(relays: usize, mut make: F) -> u32
where
    F: FnMut() -> (Writer<u32>, Reader<u32>),
{
    let (first_tx, mut rx) = make();
    let mut net = Parallel::new().with(FnProcess::new("sender", move || {
        for v in 1..=COUNT {
            first_tx.write(v);
        }
    }));

    for i in 0..relays {
        let (tx, next_rx) = make();
        net = net.with(relay(format!("relay{i}"), rx, tx));
        rx = next_rx;
    }

    let seen = Arc::new(AtomicU32::new(0));
    let counter = seen.clone();
    net = net.with(FnProcess::new("checker", move || {
        for expected in 1..=COUNT {
            assert_eq!(rx.read(), expected);
            counter.fetch_add(1, Ordering::SeqCst);
        }
    }));

    assert_eq!(net.len(), relays + 2);
    net.run(ExecutionMode::Terminating).unwrap();
    seen.load(Ordering::SeqCst)
}

#[test]
fn rendezvous_chains_deliver_in_order() {
    for k in 1..=5 {
        assert_eq!(run_chain(k, rendezvous::<u32>), COUNT, "chain of {k} relays");
    }
}

#[test]
fn buffered_chains_deliver_in_order() {
    for k in 1..=5 {
        let got = run_chain(k, || buffered::<u32>(k).unwrap());
        assert_eq!(got, COUNT, "chain of {k} relays");
    }
}

#[test]
fn mixed_chain_delivers_in_order() {
    let mut flip = false;
    let got = run_chain(4, || {
        flip = !flip;
        if flip {
            rendezvous::<u32>()
        } else {
            buffered::<u32>(3).unwrap()
        }
    });
    assert_eq!(got, COUNT);
}
