// SPDX-License-Identifier: MIT
// Copyright 2026 Tyler Zervas

//! Character-device backend.
//!
//! The device node exposes a positional interface. Offset 0 is the control
//! window: a command is a 40-byte descriptor, followed by any host payload,
//! written there; the completion status is one byte read back from the same
//! offset. Device memory is addressed directly by device address, which is
//! never below the configured (non-zero) base.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use super::{DeviceBackend, DeviceInfo};
use crate::driver::{CommandDescriptor, DeviceAddr, DeviceStatus};
use crate::error::{NradixError, Result};

const CONTROL_OFFSET: u64 = 0;

/// Backend bound to an N-Radix device node such as `/dev/nradix0`.
#[derive(Debug)]
pub struct HardwareBackend {
    path: PathBuf,
    info: DeviceInfo,
    node: Option<File>,
}

impl HardwareBackend {
    /// Backend for the node at `path`, reporting `info` as its geometry.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, info: DeviceInfo) -> Self {
        Self {
            path: path.into(),
            info,
            node: None,
        }
    }

    /// Path of the device node.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn node(&mut self) -> Result<&mut File> {
        self.node.as_mut().ok_or(NradixError::NotReady)
    }

    fn check_range(&self, addr: DeviceAddr, len: usize) -> Result<()> {
        let end = self.info.base_addr.saturating_add(self.info.memory_size);
        let inside = addr.raw() >= self.info.base_addr
            && addr
                .raw()
                .checked_add(len as u64)
                .is_some_and(|last| last <= end);
        if inside {
            Ok(())
        } else {
            Err(NradixError::InvalidAddress(addr))
        }
    }
}

impl DeviceBackend for HardwareBackend {
    fn name(&self) -> &'static str {
        "hardware"
    }

    fn init(&mut self) -> Result<DeviceInfo> {
        let node = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&self.path)
            .map_err(|e| match e.kind() {
                io::ErrorKind::NotFound => NradixError::NotFound(self.path.display().to_string()),
                _ => NradixError::Io(e),
            })?;
        tracing::info!(path = %self.path.display(), "opened N-Radix device node");
        self.node = Some(node);
        Ok(self.info)
    }

    fn reset(&mut self) -> Result<()> {
        match self.execute(&CommandDescriptor::reset(), None)? {
            DeviceStatus::Ok => Ok(()),
            status => Err(status
                .fault()
                .map_or(NradixError::Fault { code: status.code() }, |f| f.to_error())),
        }
    }

    fn execute(
        &mut self,
        cmd: &CommandDescriptor,
        payload: Option<&[u8]>,
    ) -> Result<DeviceStatus> {
        let node = self.node()?;
        node.seek(SeekFrom::Start(CONTROL_OFFSET))?;
        node.write_all(&cmd.to_bytes())?;
        if let Some(data) = payload {
            node.write_all(data)?;
        }
        node.flush()?;

        let mut status = [0u8; 1];
        node.seek(SeekFrom::Start(CONTROL_OFFSET))?;
        node.read_exact(&mut status)?;
        Ok(DeviceStatus::from_code(status[0]))
    }

    fn write(&mut self, addr: DeviceAddr, data: &[u8]) -> Result<()> {
        self.check_range(addr, data.len())?;
        let node = self.node()?;
        node.seek(SeekFrom::Start(addr.raw()))?;
        node.write_all(data)?;
        node.flush()?;
        Ok(())
    }

    fn read(&mut self, addr: DeviceAddr, buf: &mut [u8]) -> Result<()> {
        self.check_range(addr, buf.len())?;
        let node = self.node()?;
        node.seek(SeekFrom::Start(addr.raw()))?;
        node.read_exact(buf)?;
        Ok(())
    }

    fn idle(&mut self) -> Result<()> {
        if self.node.take().is_some() {
            tracing::info!(path = %self.path.display(), "closed N-Radix device node");
        }
        Ok(())
    }
}
