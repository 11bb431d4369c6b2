// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Rendezvous synchronization core.
//!
//! One lock guards two occupant slots, one per direction. A slot holds
//! nothing, a task blocked in a plain `read`/`write`, or a selector that
//! enabled a guard on this channel. For a given direction a blocked task
//! and a selector registration never coexist.
//!
//! Every blocking path follows the same order: register under the lock,
//! release the lock, sleep on the task notification, and let the partner
//! finish the hand-off under the lock before it notifies.
//!
//! A value accepted by an interrupt-context put is parked apart from the
//! writer occupant. It was accepted before any writer now waiting, so it is
//! always consumed first.

use std::mem;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::alt::AltRegistration;
use crate::notify::TaskNotify;

use super::{AltChannel, ChannelKind};

/// Occupant of the reader side.
enum ReaderSlot {
    Idle,
    Blocked(Arc<TaskNotify>),
    Alt(AltRegistration),
}

/// Occupant of the writer side. A blocked writer parks its value here.
enum WriterSlot<T> {
    Idle,
    Blocked(Arc<TaskNotify>, T),
    Alt(AltRegistration),
}

struct Slots<T> {
    reader: ReaderSlot,
    writer: WriterSlot<T>,
    /// Value left by an interrupt-context put for a selecting reader.
    deposit: Option<T>,
    /// Destination buffer of a blocked reader.
    delivered: Option<T>,
}

impl<T> Slots<T> {
    /// Whether a read would complete without waiting for a writer.
    fn has_value(&self) -> bool {
        self.deposit.is_some() || matches!(self.writer, WriterSlot::Blocked(..))
    }

    /// Take the next value for the reader: the deposit first, then a blocked
    /// writer's value. The blocked writer is released.
    fn take_value(&mut self) -> Option<(T, Option<Arc<TaskNotify>>)> {
        if let Some(value) = self.deposit.take() {
            return Some((value, None));
        }
        match mem::replace(&mut self.writer, WriterSlot::Idle) {
            WriterSlot::Blocked(writer, value) => Some((value, Some(writer))),
            other => {
                self.writer = other;
                None
            }
        }
    }
}

/// Zero-buffer channel: every transfer is a handshake between the writer
/// and the reader.
pub(crate) struct RendezvousChannel<T> {
    slots: Mutex<Slots<T>>,
}

impl<T> RendezvousChannel<T> {
    pub(crate) fn new() -> Self {
        Self {
            slots: Mutex::new(Slots {
                reader: ReaderSlot::Idle,
                writer: WriterSlot::Idle,
                deposit: None,
                delivered: None,
            }),
        }
    }

    /// Sleep until a partner has placed a value in the reader's buffer.
    fn await_delivery(&self, notify: &TaskNotify) -> T {
        loop {
            notify.take();
            if let Some(value) = self.slots.lock().delivered.take() {
                return value;
            }
        }
    }
}

impl<T: Send> AltChannel<T> for RendezvousChannel<T> {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Rendezvous
    }

    fn input(&self) -> T {
        let notify = TaskNotify::current();
        notify.clear();

        let mut slots = self.slots.lock();
        if let Some((value, writer)) = slots.take_value() {
            drop(slots);
            match writer {
                Some(writer) => {
                    tracing::trace!(path = "blocked writer", "rendezvous input");
                    writer.give();
                }
                None => tracing::trace!(path = "deposit", "rendezvous input"),
            }
            return value;
        }
        if let WriterSlot::Alt(alt) = &slots.writer {
            // The selecting writer completes the transfer from its output
            // guard's activate step.
            alt.signal();
        }
        slots.reader = ReaderSlot::Blocked(notify.clone());
        drop(slots);

        self.await_delivery(&notify)
    }

    fn output(&self, value: T) {
        let notify = TaskNotify::current();
        notify.clear();

        let mut slots = self.slots.lock();
        match mem::replace(&mut slots.reader, ReaderSlot::Idle) {
            ReaderSlot::Blocked(reader) => {
                slots.delivered = Some(value);
                drop(slots);
                tracing::trace!(path = "blocked reader", "rendezvous output");
                reader.give();
                return;
            }
            ReaderSlot::Alt(alt) => {
                // Wake the selecting reader, then wait for its activate step
                // to take the value: the writer may not return before the
                // value is consumed.
                tracing::trace!(path = "alt reader", bit = alt.bit(), "rendezvous output");
                alt.signal();
                slots.reader = ReaderSlot::Alt(alt);
            }
            ReaderSlot::Idle => {}
        }
        slots.writer = WriterSlot::Blocked(notify.clone(), value);
        drop(slots);

        notify.take();
    }

    fn pending(&self) -> bool {
        let slots = self.slots.lock();
        slots.deposit.is_some()
            || !matches!(slots.reader, ReaderSlot::Idle)
            || !matches!(slots.writer, WriterSlot::Idle)
    }

    fn space_available(&self) -> bool {
        matches!(self.slots.lock().reader, ReaderSlot::Blocked(_))
    }

    fn put_from_isr(&self, value: T) -> bool {
        let mut slots = self.slots.lock();
        match mem::replace(&mut slots.reader, ReaderSlot::Idle) {
            ReaderSlot::Blocked(reader) => {
                slots.delivered = Some(value);
                drop(slots);
                reader.give();
                true
            }
            ReaderSlot::Alt(alt) => {
                // A blocked writer got here first; one deposit at most.
                let accepted = !slots.has_value();
                if accepted {
                    slots.deposit = Some(value);
                    tracing::trace!(bit = alt.bit(), "rendezvous isr deposit");
                    alt.signal();
                }
                slots.reader = ReaderSlot::Alt(alt);
                accepted
            }
            ReaderSlot::Idle => false,
        }
    }

    fn enable_input(&self, alt: &AltRegistration) -> bool {
        let mut slots = self.slots.lock();
        if slots.has_value() {
            return true;
        }
        slots.reader = ReaderSlot::Alt(alt.clone());
        false
    }

    fn disable_input(&self) -> bool {
        let mut slots = self.slots.lock();
        if matches!(slots.reader, ReaderSlot::Alt(_)) {
            slots.reader = ReaderSlot::Idle;
        }
        slots.has_value()
    }

    fn activate_input(&self) -> Option<T> {
        let (value, writer) = self.slots.lock().take_value()?;
        if let Some(writer) = writer {
            writer.give();
        }
        Some(value)
    }

    fn enable_output(&self, alt: &AltRegistration) -> bool {
        let mut slots = self.slots.lock();
        if matches!(slots.reader, ReaderSlot::Blocked(_)) {
            return true;
        }
        slots.writer = WriterSlot::Alt(alt.clone());
        false
    }

    fn disable_output(&self) -> bool {
        let mut slots = self.slots.lock();
        if matches!(slots.writer, WriterSlot::Alt(_)) {
            slots.writer = WriterSlot::Idle;
        }
        matches!(slots.reader, ReaderSlot::Blocked(_))
    }

    fn activate_output(&self, value: T) -> Result<(), T> {
        let mut slots = self.slots.lock();
        match mem::replace(&mut slots.reader, ReaderSlot::Idle) {
            ReaderSlot::Blocked(reader) => {
                slots.delivered = Some(value);
                drop(slots);
                reader.give();
                Ok(())
            }
            other => {
                slots.reader = other;
                Err(value)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::EventGroup;
    use std::thread;
    use std::time::Duration;

    fn wait_until_pending<T: Send>(chan: &RendezvousChannel<T>) {
        while !chan.pending() {
            thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn writer_first_then_reader() {
        let chan = Arc::new(RendezvousChannel::new());
        let w = chan.clone();
        let h = thread::spawn(move || w.output(7u32));
        wait_until_pending(&chan);
        assert_eq!(chan.input(), 7);
        h.join().unwrap();
        assert!(!chan.pending());
    }

    #[test]
    fn reader_first_then_writer() {
        let chan = Arc::new(RendezvousChannel::new());
        let r = chan.clone();
        let h = thread::spawn(move || r.input());
        wait_until_pending(&chan);
        assert!(chan.space_available());
        chan.output(11u32);
        assert_eq!(h.join().unwrap(), 11);
    }

    #[test]
    fn isr_put_without_reader_fails() {
        let chan = RendezvousChannel::new();
        assert!(!chan.put_from_isr(1u8));
        assert!(!chan.pending());
    }

    #[test]
    fn isr_put_to_alt_reader_is_deposited() {
        let chan = RendezvousChannel::new();
        let events = Arc::new(EventGroup::new());
        let alt = AltRegistration::new(events.clone(), 0b1);

        assert!(!chan.enable_input(&alt));
        assert!(chan.put_from_isr(5u8));
        // Only one deposit fits.
        assert!(!chan.put_from_isr(6u8));
        assert_eq!(events.bits(), 0b1);

        assert!(chan.disable_input());
        assert_eq!(chan.activate_input(), Some(5));
        assert!(!chan.pending());
    }

    #[test]
    fn isr_deposit_is_read_before_later_writer() {
        let chan = Arc::new(RendezvousChannel::new());
        let events = Arc::new(EventGroup::new());
        let alt = AltRegistration::new(events.clone(), 0b1);

        assert!(!chan.enable_input(&alt));
        assert!(chan.put_from_isr(1u32));
        // The selecting reader picked another guard and left the deposit.
        assert!(chan.disable_input());

        let w = chan.clone();
        let h = thread::spawn(move || w.output(2));
        while !matches!(chan.slots.lock().writer, WriterSlot::Blocked(..)) {
            thread::sleep(Duration::from_millis(1));
        }

        assert_eq!(chan.input(), 1);
        assert_eq!(chan.input(), 2);
        h.join().unwrap();
        assert!(!chan.pending());
    }

    #[test]
    fn isr_put_refused_while_writer_waits() {
        let chan = Arc::new(RendezvousChannel::new());
        let events = Arc::new(EventGroup::new());
        assert!(!chan.enable_input(&AltRegistration::new(events.clone(), 0b1)));

        let w = chan.clone();
        let h = thread::spawn(move || w.output(7u32));
        while !matches!(chan.slots.lock().writer, WriterSlot::Blocked(..)) {
            thread::sleep(Duration::from_millis(1));
        }
        assert!(!chan.put_from_isr(8));

        assert!(chan.disable_input());
        assert_eq!(chan.activate_input(), Some(7));
        h.join().unwrap();
    }

    #[test]
    fn alt_writer_is_signalled_by_blocking_reader() {
        let chan = Arc::new(RendezvousChannel::new());
        let events = Arc::new(EventGroup::new());
        let alt = AltRegistration::new(events.clone(), 0b10);
        assert!(!chan.enable_output(&alt));

        let r = chan.clone();
        let h = thread::spawn(move || r.input());
        assert_eq!(events.wait_any(0b10), 0b10);

        assert!(chan.disable_output());
        assert!(chan.activate_output(42u64).is_ok());
        assert_eq!(h.join().unwrap(), 42);
    }

    #[test]
    fn activate_output_without_reader_returns_value() {
        let chan = RendezvousChannel::new();
        assert_eq!(chan.activate_output(3u8), Err(3));
    }
}
