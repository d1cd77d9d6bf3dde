// SPDX-License-Identifier: MIT
// Copyright 2026 Tyler Zervas

//! Host-side driver and balanced ternary codec for the N-Radix optical
//! ternary accelerator.
//!
//! The accelerator is a square array of optical processing elements (27×27 by
//! default) that adds and multiplies balanced ternary values. This crate
//! manages a device session, allocates device memory, queues commands for
//! asynchronous execution, and converts floating point data to and from the
//! packed trit format the array consumes.
//!
//! # Features
//!
//! - **Driver**: [`Driver`] with `init`/`shutdown`, a first-fit device
//!   allocator, and a bounded FIFO command queue executed by a worker thread
//! - **Backends**: an in-memory [`SimulatedBackend`] and a [`HardwareBackend`]
//!   bound to a device node, behind the [`DeviceBackend`] trait
//! - **Codec**: float ⇄ balanced ternary ⇄ packed bytes, see [`codec`]
//! - **Config**: YAML-loadable [`DriverConfig`]
//!
//! # Quick Start
//!
//! ```rust
//! use nradix_driver::prelude::*;
//!
//! # fn main() -> nradix_driver::Result<()> {
//! let driver = Driver::new(DriverConfig::simulated())?;
//! driver.init()?;
//! assert_eq!(driver.get_array_size()?, (27, 27));
//!
//! let weights = driver.alloc(9)?;
//! let input = driver.alloc(9)?;
//! let output = driver.alloc(9)?;
//!
//! driver.load_weights(&codec::encode_cells(&[0.1; 9]), weights, 3, 3)?;
//! driver.write(input, &codec::encode_cells(&[0.2; 9]))?;
//! driver.compute(input, output, 3, 3, PeType::Add)?;
//! driver.wait(0)?;
//! assert_eq!(driver.get_status(), Status::Idle);
//!
//! let sums = codec::decode_cells(&driver.read(output, 9)?)?;
//! assert!(sums.iter().all(|s| (s - 0.3).abs() < 0.01));
//! # Ok(())
//! # }
//! ```
//!
//! # Balanced ternary
//!
//! A sequence of `n` trits `t[0..n]`, most significant first, represents
//! `Σ t[i] · 3^-(i+1)`; the largest magnitude is `(1 - 3^-n) / 2`. Five trits
//! pack into one byte as `Σ (t[i] + 1) · 3^i`, so valid bytes are `0..=242`.
//! The device stores one such byte per matrix cell.

#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_precision_loss)]

mod backend;
pub mod codec;
mod config;
mod driver;
mod error;
mod trit;

pub use backend::{open_backend, DeviceBackend, DeviceInfo, HardwareBackend, SimulatedBackend};
pub use codec::TernaryMatrix;
pub use config::{BackendConfig, DriverConfig};
pub use driver::{
    AllocatorStats, CommandDescriptor, CommandFlags, CommandKind, DeviceAddr, DeviceStatus,
    Driver, DriverStats, FaultCode, PeType, QueueStats, SessionState, Status, DESCRIPTOR_BYTES,
};
pub use error::{NradixError, Result};
pub use trit::Trit;

/// Prelude module for convenient imports.
///
/// # Example
///
/// ```rust
/// use nradix_driver::prelude::*;
/// ```
pub mod prelude {
    pub use crate::codec::{self, TernaryMatrix};
    pub use crate::config::{BackendConfig, DriverConfig};
    pub use crate::driver::{CommandDescriptor, DeviceAddr, Driver, PeType, Status};
    pub use crate::trit::Trit;
    pub use crate::{NradixError, Result};
}
