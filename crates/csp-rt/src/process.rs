// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Processes: sequential units of work, one task each.

/// Name used when a process does not provide one.
pub const DEFAULT_PROCESS_NAME: &str = "csp_task";

/// A sequential process. It talks to the rest of the network only through
/// the channel ends it holds.
pub trait Process: Send {
    /// The process body. May loop forever or return.
    fn run(&mut self);

    /// Diagnostic label; also used as the task name.
    fn name(&self) -> &str {
        DEFAULT_PROCESS_NAME
    }

    /// Teardown hook, called exactly once after `run` ends.
    fn end_process(&mut self) {}
}

/// Lifecycle of a process inside a launched network.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    /// Declared but not started.
    Constructed = 0,
    /// `run` is executing.
    Running = 1,
    /// `run` has ended and `end_process` has been called.
    Terminated = 2,
}

impl ProcessState {
    pub(crate) fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::Constructed,
            1 => Self::Running,
            _ => Self::Terminated,
        }
    }
}

/// Boxed closure as a process. Handy for small networks and tests.
pub struct FnProcess<F> {
    name: String,
    body: Option<F>,
}

impl<F: FnOnce() + Send> FnProcess<F> {
    pub fn new(name: impl Into<String>, body: F) -> Self {
        Self {
            name: name.into(),
            body: Some(body),
        }
    }
}

impl<F: FnOnce() + Send> Process for FnProcess<F> {
    fn run(&mut self) {
        if let Some(body) = self.body.take() {
            body();
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}
