// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Task spawning for processes.
//!
//! Each spawned process gets its own OS thread. The body runs under
//! `catch_unwind`, so a panicking process ends its own task only and the
//! panic is reported through the `TaskHandle`.
//!
//! Tasks spawned for one network wait on a shared `StartGate` before their
//! body runs, so nothing starts until every task of the network exists.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use parking_lot::{Condvar, Mutex};

use crate::config::LaunchConfig;
use crate::error::{CspError, Result};
use crate::process::{Process, ProcessState};

/// Affine handle to a spawned process task.
///
/// Must be consumed via `join()` or `detach()`.
pub struct TaskHandle {
    name: String,
    handle: Option<JoinHandle<std::result::Result<(), String>>>,
    state: Arc<AtomicU8>,
    consumed: bool,
}

impl TaskHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> ProcessState {
        ProcessState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Wait for the process to terminate.
    pub fn join(mut self) -> Result<()> {
        self.consumed = true;
        let name = std::mem::take(&mut self.name);
        let Some(handle) = self.handle.take() else {
            return Ok(());
        };

        match handle.join() {
            Ok(Ok(())) => Ok(()),
            Ok(Err(message)) => Err(CspError::ProcessPanicked { name, message }),
            Err(payload) => Err(CspError::ProcessPanicked {
                name,
                message: panic_message(payload.as_ref()),
            }),
        }
    }

    /// Let the process run on without anyone waiting for it.
    pub fn detach(mut self) {
        self.consumed = true;
        self.handle.take();
    }
}

impl std::fmt::Debug for TaskHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskHandle")
            .field("name", &self.name)
            .field("state", &self.state())
            .finish()
    }
}

impl Drop for TaskHandle {
    fn drop(&mut self) {
        if !self.consumed && !std::thread::panicking() {
            panic!(
                "TaskHandle for process `{}` dropped without being joined or detached",
                self.name
            );
        }
    }
}

/// Start latch shared by the tasks of one network launch.
pub(crate) struct StartGate {
    verdict: Mutex<Option<bool>>,
    released: Condvar,
}

impl StartGate {
    pub(crate) fn new() -> Self {
        Self {
            verdict: Mutex::new(None),
            released: Condvar::new(),
        }
    }

    fn opened() -> Self {
        Self {
            verdict: Mutex::new(Some(true)),
            released: Condvar::new(),
        }
    }

    /// Let every waiting task run its process.
    pub(crate) fn open(&self) {
        self.release(true);
    }

    /// Make every waiting task exit without running its process.
    pub(crate) fn abort(&self) {
        self.release(false);
    }

    fn release(&self, go: bool) {
        let mut verdict = self.verdict.lock();
        if verdict.is_none() {
            *verdict = Some(go);
        }
        self.released.notify_all();
    }

    /// Block until the gate is opened or aborted. Returns `true` if opened.
    fn wait(&self) -> bool {
        let mut verdict = self.verdict.lock();
        loop {
            if let Some(go) = *verdict {
                return go;
            }
            self.released.wait(&mut verdict);
        }
    }
}

/// Spawn `process` on a new task configured by `config`. It starts running
/// immediately.
pub fn spawn_process(process: Box<dyn Process>, config: &LaunchConfig) -> Result<TaskHandle> {
    spawn_gated(process, config, Arc::new(StartGate::opened()))
}

/// Spawn `process`, holding it back until `gate` is released.
pub(crate) fn spawn_gated(
    mut process: Box<dyn Process>,
    config: &LaunchConfig,
    gate: Arc<StartGate>,
) -> Result<TaskHandle> {
    let name = process.name().to_string();
    let state = Arc::new(AtomicU8::new(ProcessState::Constructed as u8));
    let task_state = state.clone();

    let handle = config
        .builder(&name)
        .and_then(|builder| {
            builder.spawn(move || {
                if !gate.wait() {
                    tracing::debug!(process = process.name(), "launch aborted, process not run");
                    return Ok(());
                }
                run_process(process.as_mut(), &task_state)
            })
        })
        .map_err(|source| {
            tracing::error!(process = %name, error = %source, "failed to spawn process task");
            CspError::TaskCreation {
                name: name.clone(),
                source,
            }
        })?;

    tracing::debug!(process = %name, "process spawned");
    Ok(TaskHandle {
        name,
        handle: Some(handle),
        state,
        consumed: false,
    })
}

/// Run a process body to completion on the calling task, then its
/// teardown hook. The hook runs even if the body panicked.
pub(crate) fn run_process(
    process: &mut dyn Process,
    state: &AtomicU8,
) -> std::result::Result<(), String> {
    state.store(ProcessState::Running as u8, Ordering::Release);
    tracing::debug!(process = process.name(), "process running");

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| process.run()));
    process.end_process();
    state.store(ProcessState::Terminated as u8, Ordering::Release);

    match outcome {
        Ok(()) => {
            tracing::debug!(process = process.name(), "process terminated");
            Ok(())
        }
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            tracing::error!(process = process.name(), %message, "process panicked");
            Err(message)
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::FnProcess;
    use std::time::Duration;

    #[test]
    fn spawn_and_join() {
        let h = spawn_process(Box::new(FnProcess::new("p", || {})), &LaunchConfig::new()).unwrap();
        assert_eq!(h.name(), "p");
        h.join().unwrap();
    }

    #[test]
    fn spawn_panic_returns_error() {
        let h = spawn_process(
            Box::new(FnProcess::new("boom", || panic!("boom"))),
            &LaunchConfig::new(),
        )
        .unwrap();
        match h.join() {
            Err(CspError::ProcessPanicked { name, message }) => {
                assert_eq!(name, "boom");
                assert!(message.contains("boom"));
            }
            other => panic!("expected ProcessPanicked, got {:?}", other),
        }
    }

    #[test]
    fn state_reaches_terminated() {
        let (tx, rx) = crate::channel::rendezvous::<()>();
        let h = spawn_process(
            Box::new(FnProcess::new("waiter", move || rx.read())),
            &LaunchConfig::new(),
        )
        .unwrap();

        while h.state() != ProcessState::Running {
            std::thread::sleep(Duration::from_millis(1));
        }
        tx.write(());
        while h.state() != ProcessState::Terminated {
            std::thread::sleep(Duration::from_millis(1));
        }
        h.join().unwrap();
    }

    #[test]
    fn aborted_gate_skips_the_body() {
        use std::sync::atomic::AtomicBool;

        let ran = Arc::new(AtomicBool::new(false));
        let flag = ran.clone();
        let gate = Arc::new(StartGate::new());
        let h = spawn_gated(
            Box::new(FnProcess::new("held", move || flag.store(true, Ordering::SeqCst))),
            &LaunchConfig::new(),
            gate.clone(),
        )
        .unwrap();

        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(h.state(), ProcessState::Constructed);
        gate.abort();
        // A later open does not override the abort.
        gate.open();
        h.join().unwrap();
        assert!(!ran.load(Ordering::SeqCst));
    }

    #[test]
    fn opened_gate_runs_the_body() {
        let gate = Arc::new(StartGate::new());
        let h = spawn_gated(Box::new(FnProcess::new("held", || {})), &LaunchConfig::new(), gate.clone())
            .unwrap();
        gate.open();
        h.join().unwrap();
    }

    #[test]
    fn nul_name_is_a_task_creation_error() {
        match spawn_process(Box::new(FnProcess::new("a\0b", || {})), &LaunchConfig::new()) {
            Err(CspError::TaskCreation { name, .. }) => assert_eq!(name, "a\0b"),
            other => panic!("expected TaskCreation, got {:?}", other),
        }
    }

    #[test]
    fn teardown_runs_after_panic() {
        use std::sync::atomic::AtomicBool;

        struct Faulty(Arc<AtomicBool>);
        impl Process for Faulty {
            fn run(&mut self) {
                panic!("fault");
            }
            fn end_process(&mut self) {
                self.0.store(true, Ordering::SeqCst);
            }
        }

        let ended = Arc::new(AtomicBool::new(false));
        let state = AtomicU8::new(ProcessState::Constructed as u8);
        let result = run_process(&mut Faulty(ended.clone()), &state);
        assert_eq!(result, Err("fault".to_string()));
        assert!(ended.load(Ordering::SeqCst));
        assert_eq!(ProcessState::from_u8(state.load(Ordering::SeqCst)), ProcessState::Terminated);
    }
}
