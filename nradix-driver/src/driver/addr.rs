// SPDX-License-Identifier: MIT
// Copyright 2026 Tyler Zervas

//! Opaque device addresses.

use std::fmt;

/// An address in the accelerator's memory space.
///
/// Device addresses are not host pointers and cannot be built from integers
/// outside this crate: obtain one from [`Driver::alloc`](crate::Driver::alloc)
/// and derive interior addresses with [`DeviceAddr::checked_add`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceAddr(u64);

impl DeviceAddr {
    /// The null address. Never returned by the allocator.
    pub const NULL: DeviceAddr = DeviceAddr(0);

    pub(crate) const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw address value, for logging and for backends encoding descriptors.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }

    /// Whether this is [`DeviceAddr::NULL`].
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    /// Address `bytes` past this one, or `None` on overflow.
    ///
    /// The result is only meaningful inside the allocation `self` belongs to;
    /// the driver validates it on use.
    #[must_use]
    pub fn checked_add(self, bytes: u64) -> Option<Self> {
        self.0.checked_add(bytes).map(Self)
    }

    /// Whether the address is a multiple of `alignment`.
    #[must_use]
    pub const fn is_aligned(self, alignment: u64) -> bool {
        alignment == 0 || self.0 % alignment == 0
    }
}

impl fmt::Display for DeviceAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:010x}", self.0)
    }
}
