// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! CSP process networks on native tasks.
//!
//! A network is a fixed set of sequential processes that share nothing and
//! talk only over point-to-point channels. Every process runs on its own
//! task.
//!
//! Components:
//! - channels: rendezvous, bounded buffer, overwriting buffer
//! - alt: priority and fair selection over channel and timer guards
//! - barrier: N-party synchronisation point
//! - launcher: run a network in terminating or detached mode
//! - isr writer: non-blocking put for interrupt-context producers

pub mod alt;
pub mod barrier;
pub mod channel;
pub mod config;
pub mod error;
pub mod launcher;
pub mod notify;
pub mod process;
pub mod spawn;
pub mod time;

pub use alt::{Alternative, Guard, RelTimeout, MAX_GUARDS};
pub use barrier::Barrier;
pub use channel::{buffered, overwriting, rendezvous, IsrWriter, Reader, Slot, Writer};
pub use config::LaunchConfig;
pub use error::{CspError, Result};
pub use launcher::{ExecutionMode, Parallel};
pub use process::{FnProcess, Process, ProcessState};
