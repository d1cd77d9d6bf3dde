// SPDX-License-Identifier: MIT
// Copyright 2026 Tyler Zervas

//! First-fit device memory allocator.
//!
//! Free space is an offset-sorted list of `{offset, len}` extents. Every
//! request is rounded up to the DMA alignment, so all live allocations start
//! on an aligned boundary. Freed extents are merged with free neighbours.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::addr::DeviceAddr;
use crate::error::{NradixError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Extent {
    offset: u64,
    len: u64,
}

impl Extent {
    fn end(self) -> u64 {
        self.offset + self.len
    }
}

/// Allocator usage snapshot.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocatorStats {
    /// Size of the managed address space.
    pub capacity: u64,
    /// Bytes held by live allocations.
    pub bytes_in_use: u64,
    /// Number of live allocations.
    pub live_allocations: usize,
    /// Number of free extents.
    pub free_extents: usize,
    /// Largest contiguous free extent.
    pub largest_free: u64,
}

/// Allocator over one device address space.
#[derive(Debug)]
pub(crate) struct DeviceAllocator {
    base: u64,
    capacity: u64,
    alignment: u64,
    free: Vec<Extent>,
    /// Live allocations keyed by offset, value is the rounded length.
    live: BTreeMap<u64, u64>,
}

impl DeviceAllocator {
    /// Manage `capacity` bytes starting at device address `base`.
    ///
    /// `base` must be non-zero and both `base` and `capacity` multiples of
    /// `alignment`, which must be a power of two.
    pub(crate) fn new(base: u64, capacity: u64, alignment: u64) -> Result<Self> {
        if alignment == 0 || !alignment.is_power_of_two() {
            return Err(NradixError::config(format!(
                "DMA alignment {alignment} is not a power of two"
            )));
        }
        if base == 0 || base % alignment != 0 {
            return Err(NradixError::config(format!(
                "base address 0x{base:x} must be non-zero and {alignment}-byte aligned"
            )));
        }
        if capacity == 0 || capacity % alignment != 0 || base.checked_add(capacity).is_none() {
            return Err(NradixError::config(format!(
                "memory size {capacity} must be a non-zero multiple of {alignment}"
            )));
        }

        Ok(Self {
            base,
            capacity,
            alignment,
            free: vec![Extent {
                offset: 0,
                len: capacity,
            }],
            live: BTreeMap::new(),
        })
    }

    pub(crate) fn alignment(&self) -> u64 {
        self.alignment
    }

    /// Reserve at least `size` bytes.
    pub(crate) fn alloc(&mut self, size: usize) -> Result<DeviceAddr> {
        if size == 0 {
            return Err(NradixError::invalid_size("cannot allocate zero bytes"));
        }
        let rounded = (size as u64)
            .checked_next_multiple_of(self.alignment)
            .ok_or(NradixError::OutOfMemory {
                requested: u64::MAX,
                largest_free: self.largest_free(),
            })?;

        let Some(index) = self.free.iter().position(|e| e.len >= rounded) else {
            return Err(NradixError::OutOfMemory {
                requested: rounded,
                largest_free: self.largest_free(),
            });
        };

        let extent = self.free[index];
        if extent.len == rounded {
            self.free.remove(index);
        } else {
            self.free[index] = Extent {
                offset: extent.offset + rounded,
                len: extent.len - rounded,
            };
        }
        self.live.insert(extent.offset, rounded);

        Ok(DeviceAddr::from_raw(self.base + extent.offset))
    }

    /// Release an allocation returned by [`DeviceAllocator::alloc`].
    pub(crate) fn free(&mut self, addr: DeviceAddr) -> Result<u64> {
        let offset = addr
            .raw()
            .checked_sub(self.base)
            .ok_or(NradixError::InvalidAddress(addr))?;
        let len = self
            .live
            .remove(&offset)
            .ok_or(NradixError::InvalidAddress(addr))?;
        self.insert_free(Extent { offset, len });
        Ok(len)
    }

    fn insert_free(&mut self, extent: Extent) {
        let index = self.free.partition_point(|e| e.offset < extent.offset);
        self.free.insert(index, extent);

        // Merge with the successor, then with the predecessor.
        if index + 1 < self.free.len() && self.free[index].end() == self.free[index + 1].offset {
            self.free[index].len += self.free[index + 1].len;
            self.free.remove(index + 1);
        }
        if index > 0 && self.free[index - 1].end() == self.free[index].offset {
            self.free[index - 1].len += self.free[index].len;
            self.free.remove(index);
        }
    }

    /// Whether `[addr, addr + len)` lies entirely inside one live allocation.
    pub(crate) fn contains_span(&self, addr: DeviceAddr, len: u64) -> bool {
        let Some(offset) = addr.raw().checked_sub(self.base) else {
            return false;
        };
        let Some((&start, &size)) = self.live.range(..=offset).next_back() else {
            return false;
        };
        match offset.checked_add(len) {
            Some(end) => offset < start + size && end <= start + size,
            None => false,
        }
    }

    /// Drop every live allocation, returning how many there were.
    pub(crate) fn release_all(&mut self) -> usize {
        let count = self.live.len();
        self.live.clear();
        self.free = vec![Extent {
            offset: 0,
            len: self.capacity,
        }];
        count
    }

    fn largest_free(&self) -> u64 {
        self.free.iter().map(|e| e.len).max().unwrap_or(0)
    }

    pub(crate) fn stats(&self) -> AllocatorStats {
        AllocatorStats {
            capacity: self.capacity,
            bytes_in_use: self.live.values().sum(),
            live_allocations: self.live.len(),
            free_extents: self.free.len(),
            largest_free: self.largest_free(),
        }
    }
}
