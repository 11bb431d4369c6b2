// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! ALT: wait on several guards and commit to exactly one.
//!
//! A select runs four phases over the guard array:
//!
//! 1. enable each guard, starting at the scan offset, until one reports it
//!    is already ready; the rest are never enabled;
//! 2. if none was ready, wait on the selector's wait-set;
//! 3. disable every guard, which withdraws registrations on resources that
//!    did not fire;
//! 4. activate the selected guard, which performs the actual transfer.
//!
//! When several bits fired, the lowest guard index wins. Priority select
//! always scans from index 0; fair select moves the scan offset by one on
//! every call.

pub mod guards;

use std::marker::PhantomData;
use std::sync::Arc;
use std::thread::{self, ThreadId};

use crate::error::{CspError, Result};
use crate::notify::{EventBits, EventGroup};

pub use guards::{ChanInGuard, ChanOutGuard, RelTimeout};

/// Most guards one `Alternative` can hold: one wait-set bit each.
pub const MAX_GUARDS: usize = 16;

/// Where a resource reports that a guard became ready: one bit in one
/// selector's wait-set.
#[derive(Debug, Clone)]
pub struct AltRegistration {
    events: Arc<EventGroup>,
    bit: EventBits,
}

impl AltRegistration {
    pub(crate) fn new(events: Arc<EventGroup>, bit: EventBits) -> Self {
        Self { events, bit }
    }

    pub fn bit(&self) -> EventBits {
        self.bit
    }

    /// Mark the guard ready. Non-blocking and safe from interrupt context.
    /// A signal that arrives after the select moved on is ignored.
    pub fn signal(&self) {
        self.events.set(self.bit);
    }
}

/// One candidate event of a select.
pub trait Guard {
    /// Return `true` if the event is ready now. Otherwise keep `alt` and
    /// signal it once the event becomes ready.
    fn enable(&mut self, alt: &AltRegistration) -> bool;

    /// Withdraw the registration made by `enable`. Returns whether the event
    /// was ready at that point. Afterwards the resource holds no reference
    /// to the selector.
    fn disable(&mut self) -> bool;

    /// Complete the event after this guard has been selected.
    fn activate(&mut self);
}

/// Box a guard for an [`Alternative`].
pub fn boxed<'a, G: Guard + 'a>(guard: G) -> Box<dyn Guard + 'a> {
    Box::new(guard)
}

/// Per-task event-wait context. Bound to the task that created it.
pub(crate) struct Selector {
    events: Arc<EventGroup>,
    owner: ThreadId,
    _task: PhantomData<*const ()>,
}

fn mask_for(count: usize) -> EventBits {
    if count >= EventBits::BITS as usize {
        EventBits::MAX
    } else {
        (1 << count) - 1
    }
}

impl Selector {
    pub(crate) fn new() -> Self {
        Self {
            events: Arc::new(EventGroup::new()),
            owner: thread::current().id(),
            _task: PhantomData,
        }
    }

    /// Run one select over `guards`, enabling from `offset`. Returns the
    /// index of the activated guard.
    pub(crate) fn select(&self, guards: &mut [Box<dyn Guard + '_>], offset: usize) -> usize {
        let count = guards.len();
        debug_assert!(count > 0 && count <= MAX_GUARDS);
        debug_assert_eq!(
            thread::current().id(),
            self.owner,
            "selector used outside the task that created it"
        );

        let mask = mask_for(count);
        self.events.clear(mask);

        let mut ready = None;
        for i in 0..count {
            let idx = (i + offset) % count;
            let alt = AltRegistration::new(self.events.clone(), 1 << idx);
            if guards[idx].enable(&alt) {
                ready = Some(idx);
                break;
            }
        }

        let fired = match ready {
            Some(idx) => 1 << idx,
            None => self.events.wait_any(mask),
        };
        let selected = fired.trailing_zeros() as usize;

        for guard in guards.iter_mut() {
            guard.disable();
        }
        guards[selected].activate();

        tracing::trace!(selected, offset, immediate = ready.is_some(), "select resolved");
        selected
    }
}

/// A set of guards plus the selector that waits on them.
///
/// Created and used by a single task; it is neither `Send` nor `Sync`.
pub struct Alternative<'a> {
    guards: Vec<Box<dyn Guard + 'a>>,
    selector: Selector,
    next_offset: usize,
}

impl<'a> Alternative<'a> {
    /// Build an alternative from 1 to [`MAX_GUARDS`] guards, in priority
    /// order.
    pub fn new<I>(guards: I) -> Result<Self>
    where
        I: IntoIterator<Item = Box<dyn Guard + 'a>>,
    {
        let guards: Vec<_> = guards.into_iter().collect();
        if guards.is_empty() {
            return Err(CspError::EmptyGuardSet);
        }
        if guards.len() > MAX_GUARDS {
            return Err(CspError::TooManyGuards {
                count: guards.len(),
                max: MAX_GUARDS,
            });
        }
        Ok(Self {
            guards,
            selector: Selector::new(),
            next_offset: 0,
        })
    }

    pub fn guard_count(&self) -> usize {
        self.guards.len()
    }

    /// Select with the earliest guard winning ties.
    pub fn pri_select(&mut self) -> usize {
        self.selector.select(&mut self.guards, 0)
    }

    /// Select with the enable scan starting one guard later than on the
    /// previous call.
    pub fn fair_select(&mut self) -> usize {
        let count = self.guards.len();
        if count <= 1 {
            return self.pri_select();
        }
        let offset = self.next_offset;
        self.next_offset = (offset + 1) % count;
        self.selector.select(&mut self.guards, offset)
    }
}

/// Build an [`Alternative`] from guard expressions.
///
/// ```ignore
/// let mut alt = alt![&samples | &sample, &commands | &command, RelTimeout::new(period)?]?;
/// match alt.fair_select() { 0 => ..., 1 => ..., _ => ... }
/// ```
#[macro_export]
macro_rules! alt {
    ($($guard:expr),+ $(,)?) => {
        $crate::alt::Alternative::new(::std::vec![$($crate::alt::boxed($guard)),+])
    };
}
