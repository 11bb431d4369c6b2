// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Wake-up primitives.
//!
//! `TaskNotify` is the per-task counting notification a blocked channel
//! call sleeps on. `EventGroup` is the private wait-set of a selector: one
//! bit per guard, set by whichever party makes that guard ready.

use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

/// Counting notification owned by one task.
///
/// `give` may be called from any context; only the owning task calls
/// `take`.
#[derive(Debug, Default)]
pub struct TaskNotify {
    count: Mutex<u32>,
    cond: Condvar,
}

thread_local! {
    static CURRENT: Arc<TaskNotify> = Arc::new(TaskNotify::default());
}

impl TaskNotify {
    /// Notification handle of the calling task.
    pub fn current() -> Arc<TaskNotify> {
        CURRENT.with(Arc::clone)
    }

    /// Post one notification and wake the owner if it is sleeping.
    pub fn give(&self) {
        let mut count = self.count.lock();
        *count = count.saturating_add(1);
        self.cond.notify_one();
    }

    /// Block until at least one notification is pending, then consume all
    /// of them.
    pub fn take(&self) -> u32 {
        let mut count = self.count.lock();
        while *count == 0 {
            self.cond.wait(&mut count);
        }
        std::mem::take(&mut *count)
    }

    /// Drop notifications left over from an earlier exchange.
    pub fn clear(&self) {
        *self.count.lock() = 0;
    }
}

/// Bitmask of guard events.
pub type EventBits = u32;

/// Selector wait-set.
#[derive(Debug, Default)]
pub struct EventGroup {
    bits: Mutex<EventBits>,
    cond: Condvar,
}

impl EventGroup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `bits` and wake the waiter. Never blocks beyond the short
    /// internal critical section.
    pub fn set(&self, bits: EventBits) {
        let mut current = self.bits.lock();
        *current |= bits;
        self.cond.notify_all();
    }

    pub fn clear(&self, mask: EventBits) {
        *self.bits.lock() &= !mask;
    }

    /// Snapshot of the currently set bits.
    pub fn bits(&self) -> EventBits {
        *self.bits.lock()
    }

    /// Block until any bit in `mask` is set; returns and clears the set
    /// subset of `mask`.
    pub fn wait_any(&self, mask: EventBits) -> EventBits {
        let mut current = self.bits.lock();
        loop {
            let fired = *current & mask;
            if fired != 0 {
                *current &= !mask;
                return fired;
            }
            self.cond.wait(&mut current);
        }
    }
}
