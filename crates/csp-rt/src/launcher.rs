// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Launching a static process network.
//!
//! The processes are declared up front, in order. The first one runs on
//! the calling task; every other one gets a task of its own. Spawned tasks
//! hold at a start gate until all of them exist. If any task cannot be
//! created the gate is aborted and the launch fails before any process body
//! runs, because a missing process would leave channels without their
//! reader or writer.

use std::sync::atomic::AtomicU8;
use std::sync::Arc;

use crate::config::LaunchConfig;
use crate::error::{CspError, Result};
use crate::process::{Process, ProcessState};
use crate::spawn::{self, StartGate, TaskHandle};

/// How `Parallel::run` treats the spawned processes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionMode {
    /// Wait until every process has terminated. For finite networks.
    #[default]
    Terminating,
    /// Return as soon as the inline process returns; the others keep
    /// running. For always-on networks.
    Detached,
}

/// An ordered, fixed set of processes to run in parallel.
#[derive(Default)]
pub struct Parallel {
    processes: Vec<Box<dyn Process>>,
    config: LaunchConfig,
}

impl Parallel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a process. The first one added runs inline.
    pub fn with(self, process: impl Process + 'static) -> Self {
        self.with_boxed(Box::new(process))
    }

    pub fn with_boxed(mut self, process: Box<dyn Process>) -> Self {
        self.processes.push(process);
        self
    }

    pub fn config(mut self, config: LaunchConfig) -> Self {
        self.config = config;
        self
    }

    pub fn len(&self) -> usize {
        self.processes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processes.is_empty()
    }

    /// Start the network.
    ///
    /// Returns the first failure: a task that could not be created, or a
    /// process that panicked. In `Detached` mode only the inline process is
    /// observed.
    pub fn run(self, mode: ExecutionMode) -> Result<()> {
        let Parallel { processes, config } = self;
        let mut processes = processes.into_iter();
        let Some(mut inline) = processes.next() else {
            return Ok(());
        };

        let gate = Arc::new(StartGate::new());
        let mut spawned: Vec<TaskHandle> = Vec::with_capacity(processes.len());
        for process in processes {
            match spawn::spawn_gated(process, &config, gate.clone()) {
                Ok(handle) => spawned.push(handle),
                Err(err) => {
                    tracing::error!(
                        error = %err,
                        created = spawned.len(),
                        "network launch aborted: process missing"
                    );
                    gate.abort();
                    // Held tasks exit without running; nothing to report.
                    for handle in spawned {
                        let _ = handle.join();
                    }
                    return Err(err);
                }
            }
        }
        gate.open();

        tracing::debug!(processes = spawned.len() + 1, ?mode, "network launched");

        let state = AtomicU8::new(ProcessState::Constructed as u8);
        let inline_result = spawn::run_process(inline.as_mut(), &state).map_err(|message| {
            CspError::ProcessPanicked {
                name: inline.name().to_string(),
                message,
            }
        });

        match mode {
            ExecutionMode::Terminating => {
                let mut first_error = inline_result.err();
                for handle in spawned {
                    if let Err(err) = handle.join() {
                        first_error.get_or_insert(err);
                    }
                }
                match first_error {
                    Some(err) => Err(err),
                    None => Ok(()),
                }
            }
            ExecutionMode::Detached => {
                for handle in spawned {
                    handle.detach();
                }
                inline_result
            }
        }
    }
}

impl std::fmt::Debug for Parallel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.processes.iter().map(|p| p.name()).collect();
        f.debug_struct("Parallel")
            .field("processes", &names)
            .field("config", &self.config)
            .finish()
    }
}

/// Build a [`Parallel`] from process expressions, first one inline.
#[macro_export]
macro_rules! in_parallel {
    ($($process:expr),+ $(,)?) => {
        $crate::launcher::Parallel::new()$(.with($process))+
    };
}
