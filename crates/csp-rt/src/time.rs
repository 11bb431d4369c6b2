// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Time helpers and the one-shot timer service.
//!
//! Timer guards do not own a thread each. A single daemon thread keeps a
//! deadline heap and signals the selector bit of every timer that expires.
//! Expiry is signalled while the service lock is held, so once `cancel`
//! returns the timer can no longer fire.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::sync::{Arc, OnceLock};
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::alt::AltRegistration;
use crate::error::{CspError, Result};

/// Current point on the monotonic clock.
pub fn now() -> Instant {
    Instant::now()
}

/// Suspend the calling task for `duration`.
pub fn sleep_for(duration: Duration) {
    thread::sleep(duration);
}

/// Suspend the calling task until `deadline`. Returns immediately if the
/// deadline has already passed.
pub fn sleep_until(deadline: Instant) {
    let now = Instant::now();
    if deadline > now {
        thread::sleep(deadline - now);
    }
}

/// Start the timer service ahead of time so that a failure surfaces before
/// the network runs rather than at the first timeout guard.
pub fn start_timer_service() -> Result<()> {
    TimerService::global().map(|_| ())
}

/// Handle to an armed timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct TimerId(u64);

#[derive(Default)]
struct TimerQueue {
    deadlines: BinaryHeap<Reverse<(Instant, u64)>>,
    armed: HashMap<u64, AltRegistration>,
    next_id: u64,
}

pub(crate) struct TimerService {
    queue: Mutex<TimerQueue>,
    cond: Condvar,
}

impl TimerService {
    /// Process-wide service, started on first use.
    pub(crate) fn global() -> Result<Arc<TimerService>> {
        static SERVICE: OnceLock<Option<Arc<TimerService>>> = OnceLock::new();
        SERVICE
            .get_or_init(TimerService::start)
            .clone()
            .ok_or(CspError::ResourceExhausted {
                resource: "timer service",
            })
    }

    fn start() -> Option<Arc<TimerService>> {
        let service = Arc::new(TimerService {
            queue: Mutex::new(TimerQueue::default()),
            cond: Condvar::new(),
        });
        let worker = service.clone();
        match thread::Builder::new()
            .name("csp-timer".to_string())
            .spawn(move || worker.run())
        {
            Ok(_) => {
                tracing::debug!("timer service started");
                Some(service)
            }
            Err(error) => {
                tracing::error!(%error, "failed to start timer service");
                None
            }
        }
    }

    /// Arm a one-shot timer that signals `target` after `delay`.
    ///
    /// A delay past the end of the clock's range never fires, but the timer
    /// is still armed and can be cancelled.
    pub(crate) fn arm(&self, delay: Duration, target: AltRegistration) -> TimerId {
        let mut queue = self.queue.lock();
        let id = queue.next_id;
        queue.next_id += 1;
        queue.armed.insert(id, target);
        match Instant::now().checked_add(delay) {
            Some(deadline) => {
                queue.deadlines.push(Reverse((deadline, id)));
                self.cond.notify_one();
            }
            None => tracing::trace!(timer = id, ?delay, "timer delay out of range, never fires"),
        }
        TimerId(id)
    }

    /// Disarm a timer. Returns `false` if it had already fired.
    pub(crate) fn cancel(&self, id: TimerId) -> bool {
        self.queue.lock().armed.remove(&id.0).is_some()
    }

    fn run(&self) {
        let mut queue = self.queue.lock();
        loop {
            let now = Instant::now();
            while let Some(&Reverse((deadline, id))) = queue.deadlines.peek() {
                if !queue.armed.contains_key(&id) {
                    // Cancelled.
                    queue.deadlines.pop();
                    continue;
                }
                if deadline > now {
                    break;
                }
                queue.deadlines.pop();
                if let Some(target) = queue.armed.remove(&id) {
                    tracing::trace!(timer = id, "timer expired");
                    target.signal();
                }
            }

            match queue.deadlines.peek() {
                Some(&Reverse((deadline, _))) => {
                    self.cond.wait_until(&mut queue, deadline);
                }
                None => self.cond.wait(&mut queue),
            }
        }
    }
}
