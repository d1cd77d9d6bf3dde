// SPDX-License-Identifier: MIT
// Copyright 2026 Tyler Zervas

//! Device backends.
//!
//! The driver core never touches a device directly: it talks to a
//! [`DeviceBackend`], which is either the in-memory [`SimulatedBackend`] or a
//! [`HardwareBackend`] bound to a device node. [`open_backend`] picks one from
//! a [`BackendConfig`].
//!
//! Only the driver's worker thread and its synchronous transfer calls invoke a
//! backend, always behind the driver's backend mutex, so implementations need
//! `Send` but not `Sync`.

mod hardware;
mod sim;

pub use hardware::HardwareBackend;
pub use sim::SimulatedBackend;

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::BackendConfig;
use crate::driver::{CommandDescriptor, DeviceAddr, DeviceStatus};
use crate::error::Result;

/// Geometry reported by a backend at discovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// First usable device address. Never zero.
    pub base_addr: u64,
    /// Bytes of device memory.
    pub memory_size: u64,
    /// DMA alignment in bytes.
    pub alignment: u64,
    /// Array width in cells.
    pub array_width: u32,
    /// Array height in cells.
    pub array_height: u32,
}

impl DeviceInfo {
    /// Peak ternary operations per second, in GOPS, at `clock_mhz`.
    ///
    /// Every processing element performs a multiply and an add per cycle.
    #[must_use]
    pub fn theoretical_throughput_gops(&self, clock_mhz: f64) -> f64 {
        let pes = f64::from(self.array_width) * f64::from(self.array_height);
        pes * 2.0 * clock_mhz / 1000.0
    }
}

/// Capability interface over an N-Radix device.
pub trait DeviceBackend: Send {
    /// Human-readable backend name.
    fn name(&self) -> &'static str;

    /// Discover the device and report its geometry.
    ///
    /// # Errors
    ///
    /// Returns `NradixError::NotFound` when no device is present.
    fn init(&mut self) -> Result<DeviceInfo>;

    /// Reset the array, clearing loaded weights and device faults.
    ///
    /// # Errors
    ///
    /// Returns an error if the device cannot be reached.
    fn reset(&mut self) -> Result<()>;

    /// Execute one command and report its completion status.
    ///
    /// `payload` carries host data for a load-weights command with a null
    /// source address.
    ///
    /// # Errors
    ///
    /// Returns an error only when the device cannot be reached; command
    /// failures are reported through the returned [`DeviceStatus`].
    fn execute(
        &mut self,
        cmd: &CommandDescriptor,
        payload: Option<&[u8]>,
    ) -> Result<DeviceStatus>;

    /// Copy host bytes into device memory at `addr`.
    ///
    /// # Errors
    ///
    /// Returns `NradixError::InvalidAddress` if the range is outside device
    /// memory, or an IO error.
    fn write(&mut self, addr: DeviceAddr, data: &[u8]) -> Result<()>;

    /// Copy device memory at `addr` into `buf`.
    ///
    /// # Errors
    ///
    /// Returns `NradixError::InvalidAddress` if the range is outside device
    /// memory, or an IO error.
    fn read(&mut self, addr: DeviceAddr, buf: &mut [u8]) -> Result<()>;

    /// Release the device at the end of a session.
    ///
    /// # Errors
    ///
    /// Returns an error if the device could not be released cleanly.
    fn idle(&mut self) -> Result<()>;
}

/// Build the backend selected by `config`.
///
/// Nothing is opened until [`DeviceBackend::init`].
#[must_use]
pub fn open_backend(config: &BackendConfig) -> Box<dyn DeviceBackend> {
    match config {
        BackendConfig::Simulated {
            array_width,
            array_height,
            memory_size,
            alignment,
            base_addr,
            latency_us,
        } => {
            let info = DeviceInfo {
                base_addr: *base_addr,
                memory_size: *memory_size,
                alignment: *alignment,
                array_width: *array_width,
                array_height: *array_height,
            };
            Box::new(SimulatedBackend::new(info).with_latency(Duration::from_micros(*latency_us)))
        }
        BackendConfig::Hardware {
            device_path,
            array_width,
            array_height,
            memory_size,
            alignment,
            base_addr,
        } => {
            let info = DeviceInfo {
                base_addr: *base_addr,
                memory_size: *memory_size,
                alignment: *alignment,
                array_width: *array_width,
                array_height: *array_height,
            };
            Box::new(HardwareBackend::new(device_path.clone(), info))
        }
    }
}
