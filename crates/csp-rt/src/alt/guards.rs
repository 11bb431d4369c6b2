// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Guard kinds: channel input, channel output, relative timeout.
//!
//! Channel guards delegate every phase to the channel they were built
//! from. They are normally created with the binding syntax
//! `&reader | &slot` and `&writer | &slot`.

use std::fmt;
use std::ops::BitOr;
use std::sync::Arc;
use std::time::Duration;

use crate::channel::{AltChannel, Reader, Slot, Writer};
use crate::error::Result;
use crate::time::{TimerId, TimerService};

use super::{AltRegistration, Guard};

/// Ready when the channel can deliver a value; on activation the value is
/// stored in the bound slot.
pub struct ChanInGuard<'a, T> {
    chan: &'a dyn AltChannel<T>,
    dest: &'a Slot<T>,
}

impl<'a, T> ChanInGuard<'a, T> {
    pub(crate) fn new(chan: &'a dyn AltChannel<T>, dest: &'a Slot<T>) -> Self {
        Self { chan, dest }
    }
}

impl<T> Guard for ChanInGuard<'_, T> {
    fn enable(&mut self, alt: &AltRegistration) -> bool {
        self.chan.enable_input(alt)
    }

    fn disable(&mut self) -> bool {
        self.chan.disable_input()
    }

    fn activate(&mut self) {
        if let Some(value) = self.chan.activate_input() {
            self.dest.set(Some(value));
        }
    }
}

/// Ready when the channel can accept a value; on activation the value in
/// the bound slot is sent. An empty slot keeps the guard from ever firing.
pub struct ChanOutGuard<'a, T> {
    chan: &'a dyn AltChannel<T>,
    src: &'a Slot<T>,
}

impl<'a, T> ChanOutGuard<'a, T> {
    pub(crate) fn new(chan: &'a dyn AltChannel<T>, src: &'a Slot<T>) -> Self {
        Self { chan, src }
    }

    fn has_value(&self) -> bool {
        let value = self.src.take();
        let present = value.is_some();
        self.src.set(value);
        present
    }
}

impl<T> Guard for ChanOutGuard<'_, T> {
    fn enable(&mut self, alt: &AltRegistration) -> bool {
        if !self.has_value() {
            return false;
        }
        self.chan.enable_output(alt)
    }

    fn disable(&mut self) -> bool {
        self.chan.disable_output()
    }

    fn activate(&mut self) {
        if let Some(value) = self.src.take() {
            if let Err(value) = self.chan.activate_output(value) {
                self.src.set(Some(value));
            }
        }
    }
}

impl<'a, T: Send + 'static> BitOr<&'a Slot<T>> for &'a Reader<T> {
    type Output = ChanInGuard<'a, T>;

    fn bitor(self, dest: &'a Slot<T>) -> Self::Output {
        self.guard(dest)
    }
}

impl<'a, T: Send + 'static> BitOr<&'a Slot<T>> for &'a Writer<T> {
    type Output = ChanOutGuard<'a, T>;

    fn bitor(self, src: &'a Slot<T>) -> Self::Output {
        self.guard(src)
    }
}

/// One-shot relative timeout. Armed on enable, cancelled on disable; the
/// expiry itself is the event, so activation does nothing.
pub struct RelTimeout {
    delay: Duration,
    service: Arc<TimerService>,
    armed: Option<TimerId>,
}

impl RelTimeout {
    pub fn new(delay: Duration) -> Result<Self> {
        Ok(Self {
            delay,
            service: TimerService::global()?,
            armed: None,
        })
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }
}

impl fmt::Debug for RelTimeout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelTimeout")
            .field("delay", &self.delay)
            .field("armed", &self.armed.is_some())
            .finish()
    }
}

impl Guard for RelTimeout {
    fn enable(&mut self, alt: &AltRegistration) -> bool {
        self.armed = Some(self.service.arm(self.delay, alt.clone()));
        false
    }

    /// Returns `true` if the timer had already expired.
    fn disable(&mut self) -> bool {
        match self.armed.take() {
            Some(id) => !self.service.cancel(id),
            None => false,
        }
    }

    fn activate(&mut self) {}
}

impl Drop for RelTimeout {
    fn drop(&mut self) {
        if let Some(id) = self.armed.take() {
            self.service.cancel(id);
        }
    }
}
