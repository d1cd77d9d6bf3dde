// SPDX-License-Identifier: MIT
// Copyright 2026 Tyler Zervas

//! Driver core: session lifecycle, device memory, command queue.
//!
//! ```text
//! submit ──validate──▶ CommandQueue ──worker──▶ DeviceBackend
//!   │                      │
//!   └── DeviceAllocator    └── wait / get_status
//! ```
//!
//! Lock order is lifecycle, then allocator, then queue. The backend lock is
//! never taken while the queue lock is held.

mod addr;
mod allocator;
mod command;
mod queue;
mod session;
mod status;

pub use addr::DeviceAddr;
pub use allocator::AllocatorStats;
pub use command::{CommandDescriptor, CommandFlags, CommandKind, PeType, DESCRIPTOR_BYTES};
pub use queue::QueueStats;
pub use session::{Driver, DriverStats};
pub use status::{DeviceStatus, FaultCode, SessionState, Status};
