// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Launch configuration for process tasks.

use std::io;
use std::thread;

/// How the launcher creates the task behind each spawned process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LaunchConfig {
    /// Stack size in bytes; `None` uses the host default.
    pub stack_size: Option<usize>,
    /// Prepended to each process name to form the task name.
    pub name_prefix: Option<String>,
}

impl LaunchConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stack_size(mut self, bytes: usize) -> Self {
        self.stack_size = Some(bytes);
        self
    }

    pub fn name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.name_prefix = Some(prefix.into());
        self
    }

    pub(crate) fn task_name(&self, process: &str) -> String {
        match &self.name_prefix {
            Some(prefix) => format!("{prefix}{process}"),
            None => process.to_string(),
        }
    }

    /// Thread builder for `process`. Task names cannot carry a NUL byte.
    pub(crate) fn builder(&self, process: &str) -> io::Result<thread::Builder> {
        let name = self.task_name(process);
        if name.contains('\0') {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "task name contains a NUL byte",
            ));
        }
        let builder = thread::Builder::new().name(name);
        Ok(match self.stack_size {
            Some(bytes) => builder.stack_size(bytes),
            None => builder,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_name_uses_prefix() {
        assert_eq!(LaunchConfig::new().task_name("relay"), "relay");
        let cfg = LaunchConfig::new().name_prefix("net0/");
        assert_eq!(cfg.task_name("relay"), "net0/relay");
    }

    #[test]
    fn builder_names_thread() {
        let cfg = LaunchConfig::new().name_prefix("t-").stack_size(256 * 1024);
        let name = cfg
            .builder("worker")
            .unwrap()
            .spawn(|| thread::current().name().map(str::to_string))
            .unwrap()
            .join()
            .unwrap();
        assert_eq!(name.as_deref(), Some("t-worker"));
    }

    #[test]
    fn nul_in_name_is_rejected() {
        let err = LaunchConfig::new().builder("bad\0name").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
        let err = LaunchConfig::new().name_prefix("a\0").builder("ok").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }
}
