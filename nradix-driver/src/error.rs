// SPDX-License-Identifier: MIT
// Copyright 2026 Tyler Zervas

//! Error types for nradix-driver.
//!
//! A single taxonomy is shared by the driver core and the ternary codec, so
//! callers can propagate either with `?` into the same [`Result`].

use thiserror::Error;

use crate::driver::DeviceAddr;

/// Result type alias for nradix-driver operations.
pub type Result<T> = std::result::Result<T, NradixError>;

/// Errors that can occur in the driver or the codec.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum NradixError {
    /// The operation requires an initialized session.
    #[error("device not ready: call init() first")]
    NotReady,

    /// `init()` was called while a session is live.
    #[error("device session already initialized")]
    AlreadyInitialized,

    /// Device discovery found no accelerator.
    #[error("no N-Radix device found: {0}")]
    NotFound(String),

    /// The allocator could not satisfy a request.
    #[error("out of device memory: requested {requested} bytes, largest free extent {largest_free}")]
    OutOfMemory {
        /// Requested size after alignment rounding.
        requested: u64,
        /// Largest contiguous free extent at the time of the request.
        largest_free: u64,
    },

    /// Address was never allocated, or was already freed.
    #[error("invalid device address {0}")]
    InvalidAddress(DeviceAddr),

    /// Address not aligned to the device's DMA alignment.
    #[error("device address {addr} is not aligned to {alignment} bytes")]
    Alignment {
        /// The offending address.
        addr: DeviceAddr,
        /// Required alignment in bytes.
        alignment: u64,
    },

    /// Zero, negative or mismatched size.
    #[error("invalid size: {0}")]
    InvalidSize(String),

    /// A supplied buffer is smaller than the computed requirement.
    #[error("buffer size mismatch: required {required}, got {actual}")]
    SizeMismatch {
        /// Required element or byte count.
        required: usize,
        /// Supplied element or byte count.
        actual: usize,
    },

    /// Semantically invalid command descriptor.
    #[error("invalid command: {0}")]
    InvalidCommand(String),

    /// The command queue has no room.
    #[error("command queue full (capacity {capacity})")]
    QueueFull {
        /// Queue capacity.
        capacity: usize,
    },

    /// `wait()` expired before the queue drained.
    #[error("timed out after {timeout_ms} ms waiting for the command queue to drain")]
    Timeout {
        /// The timeout that expired.
        timeout_ms: u64,
    },

    /// Arithmetic overflow reported by the device. Requires a reset.
    #[error("device reported arithmetic overflow; submit a reset")]
    Overflow,

    /// Device-reported failure. Requires a reset.
    #[error("device fault 0x{code:02x}; submit a reset")]
    Fault {
        /// Raw status code reported by the backend.
        code: u8,
    },

    /// Integer digit outside {-1, 0, +1}.
    #[error("invalid trit value: {0} (expected -1, 0, or +1)")]
    InvalidTrit(i32),

    /// Packed byte outside 0..=242.
    #[error("invalid packed trit byte: {0} (expected 0..=242)")]
    InvalidPackedByte(u8),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Invalid configuration file.
    #[error("invalid config file: {0}")]
    ConfigParse(#[from] serde_yaml::Error),

    /// IO error talking to a device node or reading configuration.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl NradixError {
    /// Create an invalid size error.
    pub fn invalid_size(msg: impl Into<String>) -> Self {
        Self::InvalidSize(msg.into())
    }

    /// Create an invalid command error.
    pub fn invalid_command(msg: impl Into<String>) -> Self {
        Self::InvalidCommand(msg.into())
    }

    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Whether this error leaves the device latched until a reset.
    #[must_use]
    pub fn requires_reset(&self) -> bool {
        matches!(self, Self::Overflow | Self::Fault { .. })
    }
}
