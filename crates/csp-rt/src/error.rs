// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Runtime errors.
//!
//! Blocking operations never fail: they complete or keep the caller
//! blocked. Everything here is raised while a network is being built or
//! launched. A failed interrupt-context put is a plain `false`, not an error.

use thiserror::Error;

/// Result alias used across the crate.
pub type Result<T, E = CspError> = std::result::Result<T, E>;

/// Errors raised while constructing or launching a process network.
#[derive(Debug, Error)]
pub enum CspError {
    /// A runtime primitive could not be created.
    #[error("failed to create {resource}")]
    ResourceExhausted { resource: &'static str },

    /// An `Alternative` was given more guards than the wait-set can hold.
    #[error("alternative has {count} guards, at most {max} are supported")]
    TooManyGuards { count: usize, max: usize },

    /// An `Alternative` was given no guards at all.
    #[error("alternative needs at least one guard")]
    EmptyGuardSet,

    /// A buffered channel was requested with no room for a single item.
    #[error("buffered channel capacity must be at least 1")]
    ZeroCapacity,

    /// A barrier was requested for zero parties.
    #[error("barrier needs at least one party")]
    ZeroParties,

    /// The launcher could not spawn the task backing a process.
    #[error("failed to spawn task for process `{name}`")]
    TaskCreation {
        name: String,
        #[source]
        source: std::io::Error,
    },

    /// A process body panicked.
    #[error("process `{name}` panicked: {message}")]
    ProcessPanicked { name: String, message: String },
}

impl CspError {
    /// Whether this error was caused by how the network was declared,
    /// as opposed to the host running out of resources at runtime.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            CspError::TooManyGuards { .. }
                | CspError::EmptyGuardSet
                | CspError::ZeroCapacity
                | CspError::ZeroParties
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configuration_errors_are_classified() {
        assert!(CspError::ZeroCapacity.is_configuration());
        assert!(CspError::TooManyGuards { count: 17, max: 16 }.is_configuration());
        assert!(!CspError::ResourceExhausted { resource: "timer service" }.is_configuration());
    }

    #[test]
    fn task_creation_keeps_source() {
        use std::error::Error;
        let err = CspError::TaskCreation {
            name: "relay".to_string(),
            source: std::io::Error::new(std::io::ErrorKind::OutOfMemory, "no stack"),
        };
        assert_eq!(err.to_string(), "failed to spawn task for process `relay`");
        assert!(err.source().is_some());
    }
}
