// SPDX-License-Identifier: MIT
// Copyright 2026 Tyler Zervas

//! Device status codes, latched faults and session state.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::NradixError;

/// Raw per-command completion status reported by a backend.
///
/// | Code | Meaning |
/// |------|---------|
/// | 0x00 | OK |
/// | 0x01 | BUSY |
/// | 0x10 | arithmetic overflow |
/// | 0x11 | misaligned address |
/// | 0x12 | invalid size |
/// | 0x20 | device-side timeout |
/// | other | device-specific fault |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceStatus {
    /// Command completed.
    Ok,
    /// Device not ready; the command should be retried.
    Busy,
    /// Arithmetic overflow in the processing elements.
    Overflow,
    /// Address not aligned for DMA.
    Alignment,
    /// Invalid size for the loaded configuration.
    Size,
    /// Device-side timeout.
    Timeout,
    /// Any other device-specific code.
    Other(u8),
}

impl DeviceStatus {
    /// Decode a raw status byte.
    #[must_use]
    pub const fn from_code(code: u8) -> Self {
        match code {
            0x00 => DeviceStatus::Ok,
            0x01 => DeviceStatus::Busy,
            0x10 => DeviceStatus::Overflow,
            0x11 => DeviceStatus::Alignment,
            0x12 => DeviceStatus::Size,
            0x20 => DeviceStatus::Timeout,
            other => DeviceStatus::Other(other),
        }
    }

    /// Raw status byte.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            DeviceStatus::Ok => 0x00,
            DeviceStatus::Busy => 0x01,
            DeviceStatus::Overflow => 0x10,
            DeviceStatus::Alignment => 0x11,
            DeviceStatus::Size => 0x12,
            DeviceStatus::Timeout => 0x20,
            DeviceStatus::Other(code) => code,
        }
    }

    /// The fault this status latches, if any.
    #[must_use]
    pub const fn fault(self) -> Option<FaultCode> {
        match self {
            DeviceStatus::Ok | DeviceStatus::Busy => None,
            DeviceStatus::Overflow => Some(FaultCode::Overflow),
            other => Some(FaultCode::Device(other.code())),
        }
    }
}

/// A latched device fault. Cleared only by a reset command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FaultCode {
    /// The device reported arithmetic overflow.
    Overflow,
    /// Any other device-reported failure, with its raw code.
    Device(u8),
}

impl FaultCode {
    /// Raw status code.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            FaultCode::Overflow => 0x10,
            FaultCode::Device(code) => code,
        }
    }

    /// The error reported to callers while this fault is latched.
    #[must_use]
    pub fn to_error(self) -> NradixError {
        match self {
            FaultCode::Overflow => NradixError::Overflow,
            FaultCode::Device(code) => NradixError::Fault { code },
        }
    }
}

impl fmt::Display for FaultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FaultCode::Overflow => write!(f, "overflow"),
            FaultCode::Device(code) => write!(f, "fault 0x{code:02x}"),
        }
    }
}

/// Non-blocking device status as seen by callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Status {
    /// No queued or in-flight work.
    Idle,
    /// Commands queued or executing.
    Busy,
    /// A command failed; submit a reset.
    Fault(FaultCode),
}

/// Lifecycle of a driver session.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionState {
    /// No session; only `init` is meaningful.
    #[default]
    Uninitialized,
    /// Session live.
    Ready,
    /// `shutdown` in progress.
    ShuttingDown,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes_roundtrip() {
        for code in 0..=u8::MAX {
            assert_eq!(DeviceStatus::from_code(code).code(), code);
        }
    }

    #[test]
    fn test_fault_mapping() {
        assert_eq!(DeviceStatus::Ok.fault(), None);
        assert_eq!(DeviceStatus::Busy.fault(), None);
        assert_eq!(DeviceStatus::Overflow.fault(), Some(FaultCode::Overflow));
        assert_eq!(DeviceStatus::Size.fault(), Some(FaultCode::Device(0x12)));
        assert_eq!(
            DeviceStatus::Other(0x31).fault(),
            Some(FaultCode::Device(0x31))
        );
    }

    #[test]
    fn test_fault_errors() {
        assert!(matches!(FaultCode::Overflow.to_error(), NradixError::Overflow));
        assert!(matches!(
            FaultCode::Device(0x20).to_error(),
            NradixError::Fault { code: 0x20 }
        ));
        assert_eq!(FaultCode::Device(0x30).to_string(), "fault 0x30");
    }
}
