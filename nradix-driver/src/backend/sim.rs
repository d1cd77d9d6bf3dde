// SPDX-License-Identifier: MIT
// Copyright 2026 Tyler Zervas

//! In-memory simulated N-Radix array.
//!
//! Device memory is a flat byte array over the configured address space, one
//! packed trit byte per cell. Arithmetic is done on decoded cell values in
//! `f64` and re-encoded into cells; results outside the five-trit range are
//! reported as overflow and nothing is written.

use std::ops::Range;
use std::thread;
use std::time::Duration;

use super::{DeviceBackend, DeviceInfo};
use crate::codec::{cell_limit, decode_cells, encode_cell};
use crate::driver::{CommandDescriptor, CommandKind, DeviceAddr, DeviceStatus, PeType};
use crate::error::{NradixError, Result};

/// Status code for a cell byte that does not decode (243..=255).
const FAULT_CORRUPT_CELL: u8 = 0x30;
/// Status code for a compute issued before any weights were loaded.
const FAULT_NO_WEIGHTS: u8 = 0x31;

#[derive(Debug)]
struct WeightTile {
    width: usize,
    height: usize,
    values: Vec<f64>,
}

impl WeightTile {
    fn at(&self, row: usize, col: usize) -> f64 {
        self.values[row * self.width + col]
    }
}

/// Deterministic software model of the optical array.
///
/// # Examples
///
/// ```
/// use nradix_driver::{DeviceBackend, DeviceInfo, SimulatedBackend};
///
/// let mut sim = SimulatedBackend::new(DeviceInfo {
///     base_addr: 0x1000_0000,
///     memory_size: 4096,
///     alignment: 64,
///     array_width: 9,
///     array_height: 9,
/// });
/// let info = sim.init().unwrap();
/// assert_eq!((info.array_width, info.array_height), (9, 9));
/// ```
#[derive(Debug)]
pub struct SimulatedBackend {
    info: DeviceInfo,
    latency: Duration,
    memory: Vec<u8>,
    tile: Option<WeightTile>,
    executed: u64,
}

impl SimulatedBackend {
    /// Create a simulator with the given geometry. Memory is allocated by
    /// [`DeviceBackend::init`].
    #[must_use]
    pub fn new(info: DeviceInfo) -> Self {
        Self {
            info,
            latency: Duration::ZERO,
            memory: Vec::new(),
            tile: None,
            executed: 0,
        }
    }

    /// Sleep for `latency` before executing each command.
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Commands executed since creation.
    #[must_use]
    pub fn commands_executed(&self) -> u64 {
        self.executed
    }

    /// Whether a weight tile is currently loaded.
    #[must_use]
    pub fn has_weights(&self) -> bool {
        self.tile.is_some()
    }

    fn ensure_live(&self) -> Result<()> {
        if self.memory.is_empty() {
            Err(NradixError::NotReady)
        } else {
            Ok(())
        }
    }

    /// Host range backing `[addr, addr + len)`, if it lies inside memory.
    fn range(&self, addr: DeviceAddr, len: u64) -> Option<Range<usize>> {
        let offset = addr.raw().checked_sub(self.info.base_addr)?;
        let end = offset.checked_add(len)?;
        let start = usize::try_from(offset).ok()?;
        let end = usize::try_from(end).ok()?;
        (end <= self.memory.len()).then_some(start..end)
    }

    fn span(&self, addr: DeviceAddr, len: Option<u64>) -> Option<Range<usize>> {
        self.range(addr, len.unwrap_or(0))
    }

    fn load_weights(&mut self, cmd: &CommandDescriptor, payload: Option<&[u8]>) -> DeviceStatus {
        let Some(dst) = self.span(cmd.dst, cmd.dst_span()) else {
            return DeviceStatus::Size;
        };
        let bytes = if cmd.src.is_null() {
            match payload {
                Some(data) if data.len() == dst.len() => data.to_vec(),
                _ => return DeviceStatus::Size,
            }
        } else {
            match self.span(cmd.src, cmd.src_span()) {
                Some(src) => self.memory[src].to_vec(),
                None => return DeviceStatus::Size,
            }
        };
        let Ok(values) = decode_cells(&bytes) else {
            return DeviceStatus::Other(FAULT_CORRUPT_CELL);
        };

        self.memory[dst].copy_from_slice(&bytes);
        self.tile = Some(WeightTile {
            width: cmd.width as usize,
            height: cmd.height as usize,
            values: values.into_iter().map(f64::from).collect(),
        });
        DeviceStatus::Ok
    }

    fn transfer(&mut self, cmd: &CommandDescriptor) -> DeviceStatus {
        match (
            self.span(cmd.src, cmd.src_span()),
            self.span(cmd.dst, cmd.dst_span()),
        ) {
            (Some(src), Some(dst)) if src.len() == dst.len() => {
                self.memory.copy_within(src, dst.start);
                DeviceStatus::Ok
            }
            _ => DeviceStatus::Size,
        }
    }

    fn compute(&mut self, cmd: &CommandDescriptor) -> DeviceStatus {
        let Some(tile) = &self.tile else {
            return DeviceStatus::Other(FAULT_NO_WEIGHTS);
        };
        let (width, height) = (cmd.width as usize, cmd.height as usize);
        if width > tile.width || height > tile.height {
            return DeviceStatus::Size;
        }
        let (Some(src), Some(dst)) = (
            self.span(cmd.src, cmd.src_span()),
            self.span(cmd.dst, cmd.dst_span()),
        ) else {
            return DeviceStatus::Size;
        };
        let Ok(input) = decode_cells(&self.memory[src]) else {
            return DeviceStatus::Other(FAULT_CORRUPT_CELL);
        };
        let x: Vec<f64> = input.into_iter().map(f64::from).collect();

        let y: Vec<f64> = match cmd.pe_type {
            PeType::Mul => (0..height)
                .map(|i| (0..width).map(|j| tile.at(i, j) * x[j]).sum())
                .collect(),
            PeType::Add => (0..height)
                .flat_map(|i| (0..width).map(move |j| (i, j)))
                .map(|(i, j)| tile.at(i, j) + x[i * width + j])
                .collect(),
        };

        let limit = cell_limit() + 1e-9;
        if y.iter().any(|v| v.abs() > limit) {
            return DeviceStatus::Overflow;
        }

        let cells: Vec<u8> = y.iter().map(|&v| encode_cell(v as f32)).collect();
        self.memory[dst].copy_from_slice(&cells);
        DeviceStatus::Ok
    }
}

impl DeviceBackend for SimulatedBackend {
    fn name(&self) -> &'static str {
        "simulated"
    }

    fn init(&mut self) -> Result<DeviceInfo> {
        let size = usize::try_from(self.info.memory_size).map_err(|_| {
            NradixError::config(format!(
                "simulated memory of {} bytes does not fit in host memory",
                self.info.memory_size
            ))
        })?;
        self.memory = vec![0; size];
        self.tile = None;
        tracing::debug!(
            memory_size = size,
            width = self.info.array_width,
            height = self.info.array_height,
            "simulated array initialized"
        );
        Ok(self.info)
    }

    fn reset(&mut self) -> Result<()> {
        self.ensure_live()?;
        self.tile = None;
        Ok(())
    }

    fn execute(
        &mut self,
        cmd: &CommandDescriptor,
        payload: Option<&[u8]>,
    ) -> Result<DeviceStatus> {
        self.ensure_live()?;
        if !self.latency.is_zero() {
            thread::sleep(self.latency);
        }
        self.executed += 1;

        let status = match cmd.kind {
            CommandKind::Reset => {
                self.tile = None;
                DeviceStatus::Ok
            }
            CommandKind::LoadWeights => self.load_weights(cmd, payload),
            CommandKind::StreamInput | CommandKind::ReadOutput => self.transfer(cmd),
            CommandKind::Compute => self.compute(cmd),
        };
        Ok(status)
    }

    fn write(&mut self, addr: DeviceAddr, data: &[u8]) -> Result<()> {
        self.ensure_live()?;
        let range = self
            .range(addr, data.len() as u64)
            .ok_or(NradixError::InvalidAddress(addr))?;
        self.memory[range].copy_from_slice(data);
        Ok(())
    }

    fn read(&mut self, addr: DeviceAddr, buf: &mut [u8]) -> Result<()> {
        self.ensure_live()?;
        let range = self
            .range(addr, buf.len() as u64)
            .ok_or(NradixError::InvalidAddress(addr))?;
        buf.copy_from_slice(&self.memory[range]);
        Ok(())
    }

    fn idle(&mut self) -> Result<()> {
        self.memory = Vec::new();
        self.tile = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{decode_cell, encode_cells};

    const BASE: u64 = 0x1000_0000;

    fn sim() -> SimulatedBackend {
        let mut sim = SimulatedBackend::new(DeviceInfo {
            base_addr: BASE,
            memory_size: 4096,
            alignment: 64,
            array_width: 4,
            array_height: 4,
        });
        sim.init().unwrap();
        sim
    }

    fn addr(offset: u64) -> DeviceAddr {
        DeviceAddr::from_raw(BASE + offset)
    }

    fn read_values(sim: &mut SimulatedBackend, at: DeviceAddr, len: usize) -> Vec<f32> {
        let mut buf = vec![0u8; len];
        sim.read(at, &mut buf).unwrap();
        buf.into_iter().map(|b| decode_cell(b).unwrap()).collect()
    }

    #[test]
    fn test_matrix_vector_multiply() {
        let mut sim = sim();
        let weights = encode_cells(&[1.0 / 3.0, 1.0 / 9.0, 0.0, -1.0 / 3.0]);
        let load = CommandDescriptor::load_weights(DeviceAddr::NULL, addr(0), 2, 2);
        assert_eq!(sim.execute(&load, Some(&weights)).unwrap(), DeviceStatus::Ok);

        sim.write(addr(64), &encode_cells(&[1.0 / 3.0, 1.0 / 3.0]))
            .unwrap();
        let compute = CommandDescriptor::compute(addr(64), addr(128), 2, 2, PeType::Mul);
        assert_eq!(sim.execute(&compute, None).unwrap(), DeviceStatus::Ok);

        let y = read_values(&mut sim, addr(128), 2);
        assert!((y[0] - 4.0 / 27.0).abs() < 1e-6);
        assert!((y[1] + 1.0 / 9.0).abs() < 1e-6);
    }

    #[test]
    fn test_elementwise_add_overflow_writes_nothing() {
        let mut sim = sim();
        let weights = encode_cells(&[0.4, 0.4]);
        let load = CommandDescriptor::load_weights(DeviceAddr::NULL, addr(0), 2, 1);
        sim.execute(&load, Some(&weights)).unwrap();

        sim.write(addr(64), &encode_cells(&[0.3, 0.0])).unwrap();
        let before = {
            let mut buf = [0u8; 2];
            sim.read(addr(128), &mut buf).unwrap();
            buf
        };
        let add = CommandDescriptor::compute(addr(64), addr(128), 2, 1, PeType::Add);
        assert_eq!(sim.execute(&add, None).unwrap(), DeviceStatus::Overflow);

        let mut after = [0u8; 2];
        sim.read(addr(128), &mut after).unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn test_elementwise_add() {
        let mut sim = sim();
        let weights = encode_cells(&[1.0 / 9.0, -1.0 / 9.0]);
        let load = CommandDescriptor::load_weights(DeviceAddr::NULL, addr(0), 2, 1);
        sim.execute(&load, Some(&weights)).unwrap();
        sim.write(addr(64), &encode_cells(&[1.0 / 27.0, 1.0 / 3.0]))
            .unwrap();

        let add = CommandDescriptor::compute(addr(64), addr(128), 2, 1, PeType::Add);
        assert_eq!(sim.execute(&add, None).unwrap(), DeviceStatus::Ok);
        let y = read_values(&mut sim, addr(128), 2);
        assert!((y[0] - 4.0 / 27.0).abs() < 1e-6);
        assert!((y[1] - 2.0 / 9.0).abs() < 1e-6);
    }

    #[test]
    fn test_compute_without_weights_faults() {
        let mut sim = sim();
        let compute = CommandDescriptor::compute(addr(0), addr(64), 1, 1, PeType::Add);
        assert_eq!(
            sim.execute(&compute, None).unwrap(),
            DeviceStatus::Other(FAULT_NO_WEIGHTS)
        );
    }

    #[test]
    fn test_compute_larger_than_tile() {
        let mut sim = sim();
        let load = CommandDescriptor::load_weights(DeviceAddr::NULL, addr(0), 1, 1);
        sim.execute(&load, Some(&[121])).unwrap();
        let compute = CommandDescriptor::compute(addr(64), addr(128), 2, 1, PeType::Mul);
        assert_eq!(sim.execute(&compute, None).unwrap(), DeviceStatus::Size);
    }

    #[test]
    fn test_corrupt_cells_fault() {
        let mut sim = sim();
        let load = CommandDescriptor::load_weights(DeviceAddr::NULL, addr(0), 2, 1);
        assert_eq!(
            sim.execute(&load, Some(&[121, 250])).unwrap(),
            DeviceStatus::Other(FAULT_CORRUPT_CELL)
        );
        assert!(!sim.has_weights());
    }

    #[test]
    fn test_payload_size_checked() {
        let mut sim = sim();
        let load = CommandDescriptor::load_weights(DeviceAddr::NULL, addr(0), 2, 2);
        assert_eq!(sim.execute(&load, Some(&[121; 3])).unwrap(), DeviceStatus::Size);
        assert_eq!(sim.execute(&load, None).unwrap(), DeviceStatus::Size);
    }

    #[test]
    fn test_stream_input_copies() {
        let mut sim = sim();
        sim.write(addr(0), &[1, 2, 3, 4]).unwrap();
        let stream = CommandDescriptor::stream_input(addr(0), addr(256), 2, 2);
        assert_eq!(sim.execute(&stream, None).unwrap(), DeviceStatus::Ok);
        let mut out = [0u8; 4];
        sim.read(addr(256), &mut out).unwrap();
        assert_eq!(out, [1, 2, 3, 4]);
        assert_eq!(sim.commands_executed(), 1);
    }

    #[test]
    fn test_reset_clears_weights() {
        let mut sim = sim();
        let load = CommandDescriptor::load_weights(DeviceAddr::NULL, addr(0), 1, 1);
        sim.execute(&load, Some(&[121])).unwrap();
        assert!(sim.has_weights());
        sim.reset().unwrap();
        assert!(!sim.has_weights());
    }

    #[test]
    fn test_transfers_outside_memory() {
        let mut sim = sim();
        assert!(matches!(
            sim.write(addr(4090), &[0; 8]),
            Err(NradixError::InvalidAddress(_))
        ));
        let mut buf = [0u8; 1];
        assert!(sim.read(DeviceAddr::from_raw(BASE - 1), &mut buf).is_err());
    }

    #[test]
    fn test_idle_releases_memory() {
        let mut sim = sim();
        sim.idle().unwrap();
        assert!(matches!(
            sim.execute(&CommandDescriptor::reset(), None),
            Err(NradixError::NotReady)
        ));
    }
}
