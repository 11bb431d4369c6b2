// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Bounded FIFO channels.
//!
//! `Overflow::Block` is the classic bounded buffer: writers wait for space,
//! readers wait for items. `Overflow::DropOldest` never blocks the writer;
//! on a full buffer the oldest unread item is evicted to make room. Only the
//! writer side differs, the reader side is shared.

use std::collections::VecDeque;

use parking_lot::{Condvar, Mutex};

use crate::alt::AltRegistration;

use super::{AltChannel, ChannelKind};

/// What a task-context write does when the buffer is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Overflow {
    Block,
    DropOldest,
}

struct Ring<T> {
    items: VecDeque<T>,
    capacity: usize,
    alt_reader: Option<AltRegistration>,
    alt_writer: Option<AltRegistration>,
}

impl<T> Ring<T> {
    fn is_full(&self) -> bool {
        self.items.len() >= self.capacity
    }

    /// Push and wake whoever waits for data.
    fn push(&mut self, value: T, not_empty: &Condvar) {
        self.items.push_back(value);
        not_empty.notify_one();
        if let Some(alt) = &self.alt_reader {
            alt.signal();
        }
    }

    /// Pop and wake whoever waits for space.
    fn pop(&mut self, not_full: &Condvar) -> Option<T> {
        let value = self.items.pop_front()?;
        not_full.notify_one();
        if let Some(alt) = &self.alt_writer {
            alt.signal();
        }
        Some(value)
    }
}

pub(crate) struct BufferedChannel<T> {
    ring: Mutex<Ring<T>>,
    not_empty: Condvar,
    not_full: Condvar,
    overflow: Overflow,
}

impl<T> BufferedChannel<T> {
    /// Capacity must be non-zero; checked by the public constructors.
    pub(crate) fn new(capacity: usize, overflow: Overflow) -> Self {
        Self {
            ring: Mutex::new(Ring {
                items: VecDeque::with_capacity(capacity),
                capacity,
                alt_reader: None,
                alt_writer: None,
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            overflow,
        }
    }
}

impl<T: Send> AltChannel<T> for BufferedChannel<T> {
    fn kind(&self) -> ChannelKind {
        match self.overflow {
            Overflow::Block => ChannelKind::Buffered,
            Overflow::DropOldest => ChannelKind::Overwriting,
        }
    }

    fn input(&self) -> T {
        let mut ring = self.ring.lock();
        loop {
            if let Some(value) = ring.pop(&self.not_full) {
                return value;
            }
            self.not_empty.wait(&mut ring);
        }
    }

    fn output(&self, value: T) {
        let mut ring = self.ring.lock();
        match self.overflow {
            Overflow::Block => {
                while ring.is_full() {
                    self.not_full.wait(&mut ring);
                }
            }
            Overflow::DropOldest => {
                if ring.is_full() {
                    ring.items.pop_front();
                    tracing::trace!(capacity = ring.capacity, "overwriting channel evicted oldest item");
                }
            }
        }
        ring.push(value, &self.not_empty);
    }

    fn pending(&self) -> bool {
        !self.ring.lock().items.is_empty()
    }

    fn space_available(&self) -> bool {
        self.overflow == Overflow::DropOldest || !self.ring.lock().is_full()
    }

    fn put_from_isr(&self, value: T) -> bool {
        let mut ring = self.ring.lock();
        if ring.is_full() {
            return false;
        }
        ring.push(value, &self.not_empty);
        true
    }

    fn enable_input(&self, alt: &AltRegistration) -> bool {
        let mut ring = self.ring.lock();
        if !ring.items.is_empty() {
            return true;
        }
        ring.alt_reader = Some(alt.clone());
        false
    }

    fn disable_input(&self) -> bool {
        let mut ring = self.ring.lock();
        ring.alt_reader = None;
        !ring.items.is_empty()
    }

    fn activate_input(&self) -> Option<T> {
        self.ring.lock().pop(&self.not_full)
    }

    fn enable_output(&self, alt: &AltRegistration) -> bool {
        if self.overflow == Overflow::DropOldest {
            return true;
        }
        let mut ring = self.ring.lock();
        if !ring.is_full() {
            return true;
        }
        ring.alt_writer = Some(alt.clone());
        false
    }

    fn disable_output(&self) -> bool {
        let mut ring = self.ring.lock();
        ring.alt_writer = None;
        self.overflow == Overflow::DropOldest || !ring.is_full()
    }

    fn activate_output(&self, value: T) -> Result<(), T> {
        match self.overflow {
            Overflow::Block => {
                let mut ring = self.ring.lock();
                if ring.is_full() {
                    return Err(value);
                }
                ring.push(value, &self.not_empty);
                Ok(())
            }
            Overflow::DropOldest => {
                self.output(value);
                Ok(())
            }
        }
    }
}
