// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Reusable N-party barrier.

use parking_lot::{Condvar, Mutex};

use crate::error::{CspError, Result};

struct Arrivals {
    count: usize,
    /// Bumped by the last arrival of every cycle.
    cycle: u64,
}

/// Blocks each caller of [`Barrier::sync`] until `parties` tasks have
/// arrived, then releases all of them together.
///
/// The last arrival resets the counter before anyone is released, so the
/// barrier can be reused immediately for the next cycle.
pub struct Barrier {
    parties: usize,
    arrivals: Mutex<Arrivals>,
    released: Condvar,
}

impl Barrier {
    pub fn new(parties: usize) -> Result<Self> {
        if parties == 0 {
            return Err(CspError::ZeroParties);
        }
        Ok(Self {
            parties,
            arrivals: Mutex::new(Arrivals { count: 0, cycle: 0 }),
            released: Condvar::new(),
        })
    }

    pub fn parties(&self) -> usize {
        self.parties
    }

    /// Arrive and wait for the rest of this cycle.
    pub fn sync(&self) {
        let mut arrivals = self.arrivals.lock();
        arrivals.count += 1;
        if arrivals.count == self.parties {
            arrivals.count = 0;
            arrivals.cycle = arrivals.cycle.wrapping_add(1);
            tracing::trace!(parties = self.parties, cycle = arrivals.cycle, "barrier released");
            self.released.notify_all();
            return;
        }

        let cycle = arrivals.cycle;
        while arrivals.cycle == cycle {
            self.released.wait(&mut arrivals);
        }
    }
}

impl std::fmt::Debug for Barrier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Barrier")
            .field("parties", &self.parties)
            .field("arrived", &self.arrivals.lock().count)
            .finish()
    }
}
