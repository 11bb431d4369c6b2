// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Point-to-point channels.
//!
//! Three kinds share one interface: rendezvous (zero buffer), bounded
//! buffer, and overwriting buffer. Each constructor returns exactly one
//! `Writer` and one `Reader`. Neither end is `Clone` or `Sync`, so a channel
//! can never gain a second reader or writer.
//!
//! Interrupt-context producers get an `IsrWriter`, which can only make
//! non-blocking puts.

pub mod buffered;
pub mod sync;

use std::cell::Cell;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::alt::guards::{ChanInGuard, ChanOutGuard};
use crate::alt::AltRegistration;
use crate::error::{CspError, Result};

use buffered::{BufferedChannel, Overflow};
use sync::RendezvousChannel;

/// Binding cell for select: receives the value of an input guard, or holds
/// the value an output guard offers.
pub type Slot<T> = Cell<Option<T>>;

/// Which channel flavour backs a pair of ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    Rendezvous,
    Buffered,
    Overwriting,
}

/// Operations shared by every channel kind. The `enable`/`disable`/
/// `activate` triples are driven by channel guards during a select.
pub(crate) trait AltChannel<T>: Send + Sync {
    fn kind(&self) -> ChannelKind;

    /// Blocking receive.
    fn input(&self) -> T;
    /// Blocking send.
    fn output(&self, value: T);

    /// Whether a communication partner or item is waiting.
    fn pending(&self) -> bool;
    /// Whether a task-context write would complete without blocking.
    fn space_available(&self) -> bool;
    /// Non-blocking put, safe from interrupt context.
    fn put_from_isr(&self, value: T) -> bool;

    fn enable_input(&self, alt: &AltRegistration) -> bool;
    fn disable_input(&self) -> bool;
    fn activate_input(&self) -> Option<T>;

    fn enable_output(&self, alt: &AltRegistration) -> bool;
    fn disable_output(&self) -> bool;
    /// Hand `value` to the reader; gives it back if nobody can take it.
    fn activate_output(&self, value: T) -> std::result::Result<(), T>;
}

/// `PhantomData<Cell<()>>` keeps the ends `Send` but not `Sync`.
type NotSync = PhantomData<Cell<()>>;

/// Receiving end of a channel.
pub struct Reader<T> {
    chan: Arc<dyn AltChannel<T>>,
    _single: NotSync,
}

/// Sending end of a channel.
pub struct Writer<T> {
    chan: Arc<dyn AltChannel<T>>,
    _single: NotSync,
}

/// Interrupt-context capability: only non-blocking puts are reachable.
pub struct IsrWriter<T> {
    chan: Arc<dyn AltChannel<T>>,
    _single: NotSync,
}

impl<T: Send + 'static> Reader<T> {
    /// Blocking read.
    pub fn read(&self) -> T {
        self.chan.input()
    }

    /// Whether a value can be read right now (buffered) or a partner is
    /// waiting on the channel (rendezvous).
    pub fn pending(&self) -> bool {
        self.chan.pending()
    }

    pub fn kind(&self) -> ChannelKind {
        self.chan.kind()
    }

    /// Input guard that stores the received value in `dest` when selected.
    pub fn guard<'a>(&'a self, dest: &'a Slot<T>) -> ChanInGuard<'a, T> {
        ChanInGuard::new(self.chan.as_ref(), dest)
    }
}

impl<T: Send + 'static> Writer<T> {
    /// Blocking write. On a rendezvous channel this returns only after the
    /// reader has taken the value.
    pub fn write(&self, value: T) {
        self.chan.output(value)
    }

    /// Non-blocking put. Returns `false` if the value could not be handed
    /// over; the value is dropped in that case.
    pub fn put_from_isr(&self, value: T) -> bool {
        self.chan.put_from_isr(value)
    }

    pub fn pending(&self) -> bool {
        self.chan.pending()
    }

    /// Whether a `write` would complete without blocking.
    pub fn space_available(&self) -> bool {
        self.chan.space_available()
    }

    pub fn kind(&self) -> ChannelKind {
        self.chan.kind()
    }

    /// Output guard that sends the value held in `src` when selected.
    /// An empty slot makes the guard inert.
    pub fn guard<'a>(&'a self, src: &'a Slot<T>) -> ChanOutGuard<'a, T> {
        ChanOutGuard::new(self.chan.as_ref(), src)
    }

    /// Give up task-context writes and hand the channel to an interrupt
    /// handler.
    pub fn into_isr(self) -> IsrWriter<T> {
        IsrWriter {
            chan: self.chan,
            _single: PhantomData,
        }
    }
}

impl<T: Send + 'static> IsrWriter<T> {
    /// See [`Writer::put_from_isr`].
    pub fn put_from_isr(&self, value: T) -> bool {
        self.chan.put_from_isr(value)
    }
}

macro_rules! impl_debug {
    ($($end:ident),*) => {$(
        impl<T> fmt::Debug for $end<T> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_struct(stringify!($end))
                    .field("kind", &self.chan.kind())
                    .finish()
            }
        }
    )*};
}

impl_debug!(Reader, Writer, IsrWriter);

fn ends<T>(chan: Arc<dyn AltChannel<T>>) -> (Writer<T>, Reader<T>) {
    (
        Writer {
            chan: chan.clone(),
            _single: PhantomData,
        },
        Reader {
            chan,
            _single: PhantomData,
        },
    )
}

/// Create a zero-buffer channel.
pub fn rendezvous<T: Send + 'static>() -> (Writer<T>, Reader<T>) {
    ends(Arc::new(RendezvousChannel::new()))
}

/// Create a bounded FIFO channel holding up to `capacity` items.
pub fn buffered<T: Send + 'static>(capacity: usize) -> Result<(Writer<T>, Reader<T>)> {
    if capacity == 0 {
        return Err(CspError::ZeroCapacity);
    }
    Ok(ends(Arc::new(BufferedChannel::new(capacity, Overflow::Block))))
}

/// Create a bounded channel whose writer never blocks: when full, the
/// oldest unread item is discarded.
pub fn overwriting<T: Send + 'static>(capacity: usize) -> Result<(Writer<T>, Reader<T>)> {
    if capacity == 0 {
        return Err(CspError::ZeroCapacity);
    }
    Ok(ends(Arc::new(BufferedChannel::new(
        capacity,
        Overflow::DropOldest,
    ))))
}
