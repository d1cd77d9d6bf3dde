// SPDX-License-Identifier: MIT
// Copyright 2026 Tyler Zervas

//! The driver handle and its per-session state.

use std::fmt;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};

use super::addr::DeviceAddr;
use super::allocator::{AllocatorStats, DeviceAllocator};
use super::command::{CommandDescriptor, CommandKind, PeType};
use super::queue::{run_worker, CommandQueue, QueueStats, QueuedCommand};
use super::status::{SessionState, Status};
use crate::backend::{open_backend, DeviceBackend, DeviceInfo};
use crate::config::DriverConfig;
use crate::error::{NradixError, Result};

/// Snapshot of driver activity for the current session.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverStats {
    /// Lifecycle state.
    pub state: SessionState,
    /// Command counters.
    pub commands: QueueStats,
    /// Device memory usage.
    pub memory: AllocatorStats,
}

struct Session {
    info: DeviceInfo,
    allocator: Mutex<DeviceAllocator>,
    queue: Arc<CommandQueue>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

fn check_span(allocator: &DeviceAllocator, what: &str, addr: DeviceAddr, len: u64) -> Result<()> {
    if allocator.contains_span(addr, len) {
        Ok(())
    } else {
        Err(NradixError::invalid_command(format!(
            "{what} span of {len} bytes at {addr} is not inside a live allocation"
        )))
    }
}

impl Session {
    /// Validate a command against the array shape and live allocations.
    fn validate(&self, cmd: &CommandDescriptor, has_payload: bool) -> Result<()> {
        if cmd.kind == CommandKind::Reset {
            return Ok(());
        }

        let (max_w, max_h) = (self.info.array_width, self.info.array_height);
        if cmd.width == 0 || cmd.height == 0 {
            return Err(NradixError::invalid_command(format!(
                "{} has an empty {}x{} shape",
                cmd.kind, cmd.width, cmd.height
            )));
        }
        if cmd.width > max_w || cmd.height > max_h {
            return Err(NradixError::invalid_command(format!(
                "{}x{} exceeds the {max_w}x{max_h} array",
                cmd.width, cmd.height
            )));
        }
        if cmd.kind == CommandKind::LoadWeights && cmd.src.is_null() && !has_payload {
            return Err(NradixError::invalid_command(
                "load-weights with a null source needs a host payload",
            ));
        }

        // Alignment of every referenced address is checked before any span.
        let alignment = self.info.alignment;
        for (addr, span) in [(cmd.src, cmd.src_span()), (cmd.dst, cmd.dst_span())] {
            if span.is_some() && !addr.is_aligned(alignment) {
                return Err(NradixError::Alignment { addr, alignment });
            }
        }

        let allocator = self.allocator.lock();
        if let Some(len) = cmd.src_span() {
            check_span(&allocator, "source", cmd.src, len)?;
        }
        if let Some(len) = cmd.dst_span() {
            check_span(&allocator, "destination", cmd.dst, len)?;
        }
        Ok(())
    }

    /// Validate a synchronous host transfer.
    fn check_transfer(&self, addr: DeviceAddr, len: usize) -> Result<()> {
        if len == 0 {
            return Err(NradixError::invalid_size("transfer of zero bytes"));
        }
        let allocator = self.allocator.lock();
        if !addr.is_aligned(allocator.alignment()) {
            return Err(NradixError::Alignment {
                addr,
                alignment: allocator.alignment(),
            });
        }
        if allocator.contains_span(addr, len as u64) {
            Ok(())
        } else {
            Err(NradixError::InvalidAddress(addr))
        }
    }
}

#[derive(Default)]
struct Lifecycle {
    state: SessionState,
    session: Option<Arc<Session>>,
}

/// Host-side handle to one N-Radix device.
///
/// A `Driver` is `Send + Sync`; share it between threads with an `Arc`. It
/// owns at most one live session at a time: [`Driver::init`] opens one,
/// [`Driver::shutdown`] (or dropping the driver) closes it.
///
/// Commands are validated and copied into a bounded queue by
/// [`Driver::submit`], then executed in order by a dedicated worker thread.
/// [`Driver::wait`] blocks until the queue drains.
///
/// # Examples
///
/// ```
/// use nradix_driver::{codec, DeviceAddr, Driver, DriverConfig, PeType};
///
/// # fn main() -> nradix_driver::Result<()> {
/// let driver = Driver::new(DriverConfig::simulated())?;
/// driver.init()?;
///
/// let weights = driver.alloc(4)?;
/// let input = driver.alloc(2)?;
/// let output = driver.alloc(2)?;
///
/// driver.load_weights(&codec::encode_cells(&[0.25, 0.0, 0.0, 0.25]), weights, 2, 2)?;
/// driver.write(input, &codec::encode_cells(&[0.4, -0.4]))?;
/// driver.compute(input, output, 2, 2, PeType::Mul)?;
/// driver.wait(0)?;
///
/// let y = codec::decode_cells(&driver.read(output, 2)?)?;
/// assert!((y[0] - 0.1).abs() < 0.01);
/// assert!((y[1] + 0.1).abs() < 0.01);
///
/// driver.shutdown()?;
/// # Ok(())
/// # }
/// ```
pub struct Driver {
    config: DriverConfig,
    backend_name: &'static str,
    backend: Arc<Mutex<Box<dyn DeviceBackend>>>,
    lifecycle: Mutex<Lifecycle>,
    state_changed: Condvar,
}

impl fmt::Debug for Driver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Driver")
            .field("backend", &self.backend_name)
            .field("state", &self.state())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Driver {
    /// Create a driver for the backend selected by `config`.
    ///
    /// No device is touched until [`Driver::init`].
    ///
    /// # Errors
    ///
    /// Returns `NradixError::Config` if the configuration is invalid.
    pub fn new(config: DriverConfig) -> Result<Self> {
        let backend = open_backend(&config.backend);
        Self::with_backend(config, backend)
    }

    /// Create a driver over a caller-supplied backend. The backend section
    /// of `config` is ignored; the device geometry comes from the backend.
    ///
    /// # Errors
    ///
    /// Returns `NradixError::Config` if the configuration is invalid.
    pub fn with_backend(config: DriverConfig, backend: Box<dyn DeviceBackend>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            backend_name: backend.name(),
            backend: Arc::new(Mutex::new(backend)),
            lifecycle: Mutex::new(Lifecycle::default()),
            state_changed: Condvar::new(),
            config,
        })
    }

    /// Name of the backend in use.
    #[must_use]
    pub fn backend_name(&self) -> &'static str {
        self.backend_name
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.lifecycle.lock().state
    }

    fn session(&self) -> Result<Arc<Session>> {
        let lifecycle = self.lifecycle.lock();
        match (&lifecycle.state, &lifecycle.session) {
            (SessionState::Ready, Some(session)) => Ok(Arc::clone(session)),
            _ => Err(NradixError::NotReady),
        }
    }

    /// Discover the device, reset the array and start a session.
    ///
    /// # Errors
    ///
    /// Returns `NradixError::AlreadyInitialized` if a session is live or
    /// shutting down, `NradixError::NotFound` if the backend finds no device,
    /// or `NradixError::Config` if the device reports unusable geometry.
    pub fn init(&self) -> Result<()> {
        let mut lifecycle = self.lifecycle.lock();
        if lifecycle.state != SessionState::Uninitialized {
            return Err(NradixError::AlreadyInitialized);
        }

        let (info, allocator) = {
            let mut backend = self.backend.lock();
            let info = backend.init()?;
            let prepared = Self::prepare(&mut **backend, info);
            if prepared.is_err() {
                // Best effort; the original error is what the caller needs.
                let _ = backend.idle();
            }
            (info, prepared?)
        };

        let queue = Arc::new(CommandQueue::new(self.config.queue_capacity));
        let worker = {
            let queue = Arc::clone(&queue);
            let backend = Arc::clone(&self.backend);
            let busy_retry_limit = self.config.busy_retry_limit;
            thread::Builder::new()
                .name("nradix-worker".into())
                .spawn(move || run_worker(&queue, &backend, busy_retry_limit))
        };
        let worker = match worker {
            Ok(handle) => handle,
            Err(e) => {
                let _ = self.backend.lock().idle();
                return Err(e.into());
            }
        };

        tracing::info!(
            backend = self.backend_name,
            width = info.array_width,
            height = info.array_height,
            memory_size = info.memory_size,
            base = %DeviceAddr::from_raw(info.base_addr),
            "N-Radix session ready"
        );

        lifecycle.session = Some(Arc::new(Session {
            info,
            allocator: Mutex::new(allocator),
            queue,
            worker: Mutex::new(Some(worker)),
        }));
        lifecycle.state = SessionState::Ready;
        Ok(())
    }

    fn prepare(backend: &mut dyn DeviceBackend, info: DeviceInfo) -> Result<DeviceAllocator> {
        if info.array_width == 0 || info.array_height == 0 {
            return Err(NradixError::config(format!(
                "device reported an empty {}x{} array",
                info.array_width, info.array_height
            )));
        }
        backend.reset()?;
        DeviceAllocator::new(info.base_addr, info.memory_size, info.alignment)
    }

    /// End the session.
    ///
    /// Waits up to `shutdown_grace_ms` for queued work and discards whatever
    /// is still pending after that. A command already in flight gets one more
    /// grace period; if it is still running the worker is detached. Then every
    /// outstanding allocation is released and the backend idled.
    ///
    /// Calling it without a live session is a no-op. A call made while
    /// another thread is shutting down blocks until that shutdown finishes.
    ///
    /// # Errors
    ///
    /// Returns the backend's error if it fails to idle, or
    /// `NradixError::Timeout` if a stalled command still holds the backend.
    /// The driver is uninitialized either way.
    pub fn shutdown(&self) -> Result<()> {
        let session = {
            let mut lifecycle = self.lifecycle.lock();
            while lifecycle.state == SessionState::ShuttingDown {
                self.state_changed.wait(&mut lifecycle);
            }
            if lifecycle.state != SessionState::Ready {
                return Ok(());
            }
            lifecycle.state = SessionState::ShuttingDown;
            lifecycle.session.take()
        };
        let Some(session) = session else {
            self.lifecycle.lock().state = SessionState::Uninitialized;
            self.state_changed.notify_all();
            return Ok(());
        };

        let grace = Duration::from_millis(self.config.shutdown_grace_ms);
        let mut stalled = false;
        if session.queue.wait(Some(grace)).is_err() {
            let dropped = session.queue.discard_pending();
            tracing::warn!(
                dropped,
                grace_ms = self.config.shutdown_grace_ms,
                "shutdown grace period expired; discarded pending commands"
            );
            // The in-flight command gets one more grace period.
            stalled = session.queue.wait(Some(grace)).is_err();
        }

        session.queue.close();
        if let Some(worker) = session.worker.lock().take() {
            if stalled {
                tracing::error!(
                    grace_ms = self.config.shutdown_grace_ms,
                    "in-flight command did not finish; detaching command worker"
                );
            } else if worker.join().is_err() {
                tracing::error!("command worker panicked");
            }
        }

        let leaked = session.allocator.lock().release_all();
        if leaked > 0 {
            tracing::warn!(leaked, "releasing device allocations still live at shutdown");
        }

        let idled = if stalled {
            self.backend.try_lock_for(grace).map_or(
                Err(NradixError::Timeout {
                    timeout_ms: self.config.shutdown_grace_ms,
                }),
                |mut backend| backend.idle(),
            )
        } else {
            self.backend.lock().idle()
        };
        let mut lifecycle = self.lifecycle.lock();
        lifecycle.state = SessionState::Uninitialized;
        drop(lifecycle);
        self.state_changed.notify_all();
        tracing::info!(backend = self.backend_name, "N-Radix session closed");
        idled
    }

    /// Array `(width, height)` in cells.
    ///
    /// # Errors
    ///
    /// Returns `NradixError::NotReady` without a live session.
    pub fn get_array_size(&self) -> Result<(u32, u32)> {
        let session = self.session()?;
        Ok((session.info.array_width, session.info.array_height))
    }

    /// Geometry reported by the device at `init`.
    ///
    /// # Errors
    ///
    /// Returns `NradixError::NotReady` without a live session.
    pub fn device_info(&self) -> Result<DeviceInfo> {
        Ok(self.session()?.info)
    }

    /// Reserve `size` bytes of device memory, rounded up to the DMA
    /// alignment.
    ///
    /// # Errors
    ///
    /// Returns `NradixError::NotReady`, `NradixError::InvalidSize` for zero,
    /// or `NradixError::OutOfMemory`.
    pub fn alloc(&self, size: usize) -> Result<DeviceAddr> {
        let session = self.session()?;
        let addr = session.allocator.lock().alloc(size)?;
        tracing::debug!(size, %addr, "device memory allocated");
        Ok(addr)
    }

    /// Release an allocation.
    ///
    /// Commands still queued against the region are not tracked; `wait`
    /// before freeing memory they use.
    ///
    /// # Errors
    ///
    /// Returns `NradixError::NotReady`, or `NradixError::InvalidAddress` for
    /// an address that is not a live allocation.
    pub fn free(&self, addr: DeviceAddr) -> Result<()> {
        let session = self.session()?;
        let len = session.allocator.lock().free(addr)?;
        tracing::debug!(%addr, len, "device memory freed");
        Ok(())
    }

    /// Validate `cmd` and queue it for execution.
    ///
    /// On error nothing is queued and no state changes.
    ///
    /// # Errors
    ///
    /// In order of checking: `NradixError::NotReady`;
    /// `NradixError::InvalidCommand` for an empty or oversized shape;
    /// `NradixError::Alignment`; `NradixError::InvalidCommand` for a span
    /// outside live allocations; `NradixError::Overflow` or
    /// `NradixError::Fault` while a fault is latched (reset excepted);
    /// `NradixError::QueueFull`.
    pub fn submit(&self, cmd: &CommandDescriptor) -> Result<()> {
        self.enqueue(*cmd, None)
    }

    fn enqueue(&self, cmd: CommandDescriptor, payload: Option<Arc<[u8]>>) -> Result<()> {
        let session = self.session()?;
        session.validate(&cmd, payload.is_some())?;
        session.queue.push(QueuedCommand { cmd, payload })?;
        tracing::debug!(command = %cmd, "command queued");
        Ok(())
    }

    /// Block until every queued command has completed.
    ///
    /// `timeout_ms == 0` waits forever. A timeout does not cancel anything.
    /// Returns `Ok` once the queue drains even if a command faulted; check
    /// [`Driver::get_status`] afterwards.
    ///
    /// # Errors
    ///
    /// Returns `NradixError::NotReady` or `NradixError::Timeout`.
    pub fn wait(&self, timeout_ms: u64) -> Result<()> {
        let session = self.session()?;
        let timeout = (timeout_ms > 0).then(|| Duration::from_millis(timeout_ms));
        session.queue.wait(timeout)
    }

    /// Non-blocking device status. `Idle` without a live session.
    #[must_use]
    pub fn get_status(&self) -> Status {
        self.session()
            .map_or(Status::Idle, |session| session.queue.status())
    }

    /// Load a `width × height` weight tile from host memory into `dst`.
    ///
    /// `data` holds one packed cell per weight, see
    /// [`codec::encode_cells`](crate::codec::encode_cells).
    ///
    /// # Errors
    ///
    /// Returns `NradixError::InvalidSize` if `data.len() != width * height`,
    /// then any error of [`Driver::submit`].
    pub fn load_weights(&self, data: &[u8], dst: DeviceAddr, width: u32, height: u32) -> Result<()> {
        let cells = u64::from(width) * u64::from(height);
        if data.len() as u64 != cells {
            return Err(NradixError::invalid_size(format!(
                "weight tile {width}x{height} needs {cells} bytes, got {}",
                data.len()
            )));
        }
        let cmd = CommandDescriptor::load_weights(DeviceAddr::NULL, dst, width, height);
        self.enqueue(cmd, Some(Arc::from(data)))
    }

    /// Queue a compute over the input at `src`, writing results to `dst`.
    ///
    /// # Errors
    ///
    /// Any error of [`Driver::submit`].
    pub fn compute(
        &self,
        src: DeviceAddr,
        dst: DeviceAddr,
        width: u32,
        height: u32,
        pe_type: PeType,
    ) -> Result<()> {
        self.submit(&CommandDescriptor::compute(src, dst, width, height, pe_type))
    }

    /// Queue an input stream from `src` to `dst`.
    ///
    /// # Errors
    ///
    /// Any error of [`Driver::submit`].
    pub fn stream_input(&self, src: DeviceAddr, dst: DeviceAddr, width: u32, height: u32) -> Result<()> {
        self.submit(&CommandDescriptor::stream_input(src, dst, width, height))
    }

    /// Queue an output read from `src` to `dst`.
    ///
    /// # Errors
    ///
    /// Any error of [`Driver::submit`].
    pub fn read_output(&self, src: DeviceAddr, dst: DeviceAddr, width: u32, height: u32) -> Result<()> {
        self.submit(&CommandDescriptor::read_output(src, dst, width, height))
    }

    /// Queue a reset, which clears a latched fault once it executes.
    ///
    /// # Errors
    ///
    /// Returns `NradixError::NotReady` or `NradixError::QueueFull`.
    pub fn reset(&self) -> Result<()> {
        self.submit(&CommandDescriptor::reset())
    }

    /// Copy host bytes into device memory.
    ///
    /// Not ordered with respect to queued commands; `wait` first if any of
    /// them touch the same region.
    ///
    /// # Errors
    ///
    /// Returns `NradixError::NotReady`, `NradixError::InvalidSize` for empty
    /// data, `NradixError::Alignment`, `NradixError::InvalidAddress` when the
    /// range is not inside one live allocation, or a backend error.
    pub fn write(&self, dst: DeviceAddr, data: &[u8]) -> Result<()> {
        let session = self.session()?;
        session.check_transfer(dst, data.len())?;
        self.backend.lock().write(dst, data)
    }

    /// Copy `len` bytes of device memory to the host.
    ///
    /// # Errors
    ///
    /// Same as [`Driver::write`].
    pub fn read(&self, src: DeviceAddr, len: usize) -> Result<Vec<u8>> {
        let session = self.session()?;
        session.check_transfer(src, len)?;
        let mut buf = vec![0u8; len];
        self.backend.lock().read(src, &mut buf)?;
        Ok(buf)
    }

    /// Counters and memory usage for the current session.
    #[must_use]
    pub fn stats(&self) -> DriverStats {
        let state = self.state();
        match self.session() {
            Ok(session) => DriverStats {
                state,
                commands: session.queue.stats(),
                memory: session.allocator.lock().stats(),
            },
            Err(_) => DriverStats {
                state,
                ..DriverStats::default()
            },
        }
    }

    /// Peak throughput of the live device at the configured clock, in GOPS.
    ///
    /// # Errors
    ///
    /// Returns `NradixError::NotReady` without a live session.
    pub fn theoretical_throughput_gops(&self) -> Result<f64> {
        Ok(self
            .device_info()?
            .theoretical_throughput_gops(self.config.clock_mhz))
    }
}

impl Drop for Driver {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            tracing::warn!(error = %e, "error while shutting down N-Radix driver");
        }
    }
}
