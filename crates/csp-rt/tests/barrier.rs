// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Barrier phases across a launched network.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use csp_rt::{Barrier, ExecutionMode, FnProcess, Parallel};

const PARTIES: usize = 3;
const CYCLES: usize = 50;

#[test]
fn no_party_runs_ahead_of_a_phase() {
    let barrier = Arc::new(Barrier::new(PARTIES).unwrap());
    let arrived = Arc::new(AtomicUsize::new(0));

    let mut net = Parallel::new();
    for p in 0..PARTIES {
        let barrier = barrier.clone();
        let arrived = arrived.clone();
        net = net.with(FnProcess::new(format!("party{p}"), move || {
            for cycle in 0..CYCLES {
                arrived.fetch_add(1, Ordering::SeqCst);
                barrier.sync();
                // Everyone has arrived for this cycle, nobody for the next.
                assert_eq!(arrived.load(Ordering::SeqCst), PARTIES * (cycle + 1));
                barrier.sync();
            }
        }));
    }

    net.run(ExecutionMode::Terminating).unwrap();
    assert_eq!(arrived.load(Ordering::SeqCst), PARTIES * CYCLES);
}

#[test]
fn single_party_barrier_never_blocks() {
    let barrier = Barrier::new(1).unwrap();
    for _ in 0..10 {
        barrier.sync();
    }
    assert_eq!(barrier.parties(), 1);
}

#[test]
fn zero_parties_is_rejected() {
    assert!(matches!(Barrier::new(0), Err(csp_rt::CspError::ZeroParties)));
}
