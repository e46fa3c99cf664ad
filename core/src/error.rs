//! Core error types.

use thiserror::Error;

/// Errors returned by a [`MemoryManager`](crate::memory::MemoryManager).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AllocationError {
    /// The device memory budget cannot satisfy the request.
    #[error("out of device memory: requested {requested} bytes, {available} available")]
    OutOfDeviceMemory { requested: usize, available: usize },
    /// Host memory supplied for a zero-copy allocation is too small.
    #[error("host memory of {available} bytes cannot back {requested} bytes")]
    HostMemoryTooSmall { requested: usize, available: usize },
    /// Zero-sized allocations are not supported.
    #[error("allocation size cannot be zero")]
    ZeroSize,
}

/// Errors returned while loading [`DebugSettings`](crate::settings::DebugSettings).
#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse settings: {0}")]
    Parse(#[from] toml::de::Error),
}
