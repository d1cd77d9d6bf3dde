// SPDX-License-Identifier: MIT
// Copyright 2026 Tyler Zervas

//! Bounded FIFO command queue and its single consumer.
//!
//! Producers push under the queue mutex and signal `work`; the worker pops
//! one command at a time, executes it against the backend with the queue lock
//! released, then records the outcome and signals `drained` once nothing is
//! pending or in flight. Waiters only ever block on `drained`, so they never
//! hold up `submit` or `get_status`.

use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};

use super::command::{CommandDescriptor, CommandKind};
use super::status::{DeviceStatus, FaultCode, Status};
use crate::backend::DeviceBackend;
use crate::error::{NradixError, Result};

/// A descriptor plus any host payload it carries.
#[derive(Debug, Clone)]
pub(crate) struct QueuedCommand {
    pub(crate) cmd: CommandDescriptor,
    pub(crate) payload: Option<Arc<[u8]>>,
}

/// Command counters for one session.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    /// Commands accepted by `submit`.
    pub submitted: u64,
    /// Commands that completed with an OK status.
    pub completed: u64,
    /// Commands that latched a fault.
    pub faulted: u64,
    /// Commands dropped because a fault was latched or shutdown timed out.
    pub skipped: u64,
    /// Commands currently queued, not counting one in flight.
    pub depth: usize,
}

#[derive(Debug, Default)]
struct QueueState {
    pending: VecDeque<QueuedCommand>,
    in_flight: bool,
    fault: Option<FaultCode>,
    closed: bool,
    stats: QueueStats,
}

impl QueueState {
    fn is_drained(&self) -> bool {
        self.pending.is_empty() && !self.in_flight
    }
}

#[derive(Debug)]
pub(crate) struct CommandQueue {
    state: Mutex<QueueState>,
    work: Condvar,
    drained: Condvar,
    capacity: usize,
}

impl CommandQueue {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            work: Condvar::new(),
            drained: Condvar::new(),
            capacity,
        }
    }

    /// Enqueue a validated command.
    pub(crate) fn push(&self, queued: QueuedCommand) -> Result<()> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(NradixError::NotReady);
        }
        if let Some(fault) = state.fault {
            if queued.cmd.kind != CommandKind::Reset {
                return Err(fault.to_error());
            }
        }
        if state.pending.len() >= self.capacity {
            return Err(NradixError::QueueFull {
                capacity: self.capacity,
            });
        }
        state.pending.push_back(queued);
        state.stats.submitted += 1;
        drop(state);
        self.work.notify_one();
        Ok(())
    }

    /// Block until every submitted command has finished.
    pub(crate) fn wait(&self, timeout: Option<Duration>) -> Result<()> {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut state = self.state.lock();
        while !state.is_drained() {
            match deadline {
                None => self.drained.wait(&mut state),
                Some(deadline) => {
                    if self.drained.wait_until(&mut state, deadline).timed_out()
                        && !state.is_drained()
                    {
                        let timeout_ms = timeout
                            .map_or(0, |t| u64::try_from(t.as_millis()).unwrap_or(u64::MAX));
                        return Err(NradixError::Timeout { timeout_ms });
                    }
                }
            }
        }
        Ok(())
    }

    pub(crate) fn status(&self) -> Status {
        let state = self.state.lock();
        if let Some(fault) = state.fault {
            Status::Fault(fault)
        } else if state.is_drained() {
            Status::Idle
        } else {
            Status::Busy
        }
    }

    pub(crate) fn stats(&self) -> QueueStats {
        let state = self.state.lock();
        QueueStats {
            depth: state.pending.len(),
            ..state.stats
        }
    }

    /// Drop everything still pending. Returns how many commands were dropped.
    pub(crate) fn discard_pending(&self) -> usize {
        let mut state = self.state.lock();
        let dropped = state.pending.len();
        state.pending.clear();
        state.stats.skipped += dropped as u64;
        let drained = state.is_drained();
        drop(state);
        if drained {
            self.drained.notify_all();
        }
        dropped
    }

    /// Stop accepting work and wake the worker so it can exit.
    pub(crate) fn close(&self) {
        self.state.lock().closed = true;
        self.work.notify_all();
        self.drained.notify_all();
    }

    /// Worker side: block for the next command, marking it in flight.
    /// Returns `None` once the queue is closed and empty.
    fn next(&self) -> Option<QueuedCommand> {
        let mut state = self.state.lock();
        loop {
            if let Some(queued) = state.pending.pop_front() {
                state.in_flight = true;
                return Some(queued);
            }
            if state.closed {
                return None;
            }
            self.work.wait(&mut state);
        }
    }

    /// Whether a non-reset command must be skipped because of a latched fault.
    fn is_faulted(&self) -> bool {
        self.state.lock().fault.is_some()
    }

    /// Worker side: record the outcome of the in-flight command.
    fn finish(&self, outcome: Outcome) {
        let mut state = self.state.lock();
        state.in_flight = false;
        match outcome {
            Outcome::Completed => state.stats.completed += 1,
            Outcome::Cleared => {
                state.fault = None;
                state.stats.completed += 1;
            }
            Outcome::Faulted(fault) => {
                state.fault = Some(fault);
                state.stats.faulted += 1;
            }
            Outcome::Skipped => state.stats.skipped += 1,
        }
        let drained = state.is_drained();
        drop(state);
        if drained {
            self.drained.notify_all();
        }
    }
}

/// Status recorded when the backend errors or panics instead of reporting.
const BACKEND_FAILURE: u8 = 0xFF;

enum Outcome {
    Completed,
    Cleared,
    Faulted(FaultCode),
    Skipped,
}

/// Run `f` against the locked backend, turning a panic into a fault so the
/// in-flight command is always finished.
fn with_backend<T>(
    backend: &Mutex<Box<dyn DeviceBackend>>,
    f: impl FnOnce(&mut dyn DeviceBackend) -> Result<T>,
) -> Result<T> {
    panic::catch_unwind(AssertUnwindSafe(|| f(&mut **backend.lock()))).unwrap_or_else(|_| {
        tracing::error!("device backend panicked");
        Err(NradixError::Fault {
            code: BACKEND_FAILURE,
        })
    })
}

/// Body of the per-session worker thread.
pub(crate) fn run_worker(
    queue: &CommandQueue,
    backend: &Mutex<Box<dyn DeviceBackend>>,
    busy_retry_limit: u32,
) {
    tracing::debug!("command worker started");
    while let Some(queued) = queue.next() {
        let cmd = queued.cmd;

        if cmd.kind != CommandKind::Reset && queue.is_faulted() {
            tracing::warn!(command = %cmd, "skipping command: device fault latched");
            queue.finish(Outcome::Skipped);
            continue;
        }

        let outcome = if cmd.kind == CommandKind::Reset {
            match with_backend(backend, |b| b.reset()) {
                Ok(()) => {
                    tracing::info!("array reset");
                    Outcome::Cleared
                }
                Err(e) => {
                    tracing::error!(error = %e, "array reset failed");
                    Outcome::Faulted(FaultCode::Device(BACKEND_FAILURE))
                }
            }
        } else {
            execute(backend, &queued, busy_retry_limit)
        };

        queue.finish(outcome);
    }
    tracing::debug!("command worker stopped");
}

fn execute(
    backend: &Mutex<Box<dyn DeviceBackend>>,
    queued: &QueuedCommand,
    busy_retry_limit: u32,
) -> Outcome {
    let cmd = &queued.cmd;
    let payload = queued.payload.as_deref();
    let mut attempts = 0u32;

    loop {
        let status = match with_backend(backend, |b| b.execute(cmd, payload)) {
            Ok(status) => status,
            Err(e) => {
                tracing::error!(command = %cmd, error = %e, "backend failed to execute command");
                DeviceStatus::Other(BACKEND_FAILURE)
            }
        };

        match status {
            DeviceStatus::Ok => {
                tracing::debug!(command = %cmd, "command complete");
                return Outcome::Completed;
            }
            DeviceStatus::Busy if attempts < busy_retry_limit => {
                attempts += 1;
                std::thread::sleep(Duration::from_micros(100));
            }
            DeviceStatus::Busy => {
                tracing::warn!(command = %cmd, attempts, "device stayed busy; latching timeout");
                return Outcome::Faulted(FaultCode::Device(DeviceStatus::Timeout.code()));
            }
            other => {
                let fault = other.fault().unwrap_or(FaultCode::Device(other.code()));
                tracing::warn!(command = %cmd, %fault, "command faulted");
                return Outcome::Faulted(fault);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::DeviceAddr;

    fn reset() -> QueuedCommand {
        QueuedCommand {
            cmd: CommandDescriptor::reset(),
            payload: None,
        }
    }

    fn compute() -> QueuedCommand {
        QueuedCommand {
            cmd: CommandDescriptor::compute(
                DeviceAddr::from_raw(64),
                DeviceAddr::from_raw(128),
                1,
                1,
                crate::PeType::Add,
            ),
            payload: None,
        }
    }

    #[test]
    fn test_capacity_enforced() {
        let queue = CommandQueue::new(2);
        queue.push(compute()).unwrap();
        queue.push(compute()).unwrap();
        assert!(matches!(
            queue.push(compute()),
            Err(NradixError::QueueFull { capacity: 2 })
        ));
        assert_eq!(queue.stats().depth, 2);
        assert_eq!(queue.status(), Status::Busy);
    }

    #[test]
    fn test_wait_on_empty_queue_returns_immediately() {
        let queue = CommandQueue::new(4);
        queue.wait(Some(Duration::from_millis(1))).unwrap();
        queue.wait(None).unwrap();
        assert_eq!(queue.status(), Status::Idle);
    }

    #[test]
    fn test_wait_times_out_without_dropping_work() {
        let queue = CommandQueue::new(4);
        queue.push(compute()).unwrap();
        let err = queue.wait(Some(Duration::from_millis(5))).unwrap_err();
        assert!(matches!(err, NradixError::Timeout { timeout_ms: 5 }));
        assert_eq!(queue.stats().depth, 1);
    }

    #[test]
    fn test_fault_blocks_all_but_reset() {
        let queue = CommandQueue::new(4);
        queue.push(compute()).unwrap();
        let _ = queue.next().unwrap();
        queue.finish(Outcome::Faulted(FaultCode::Overflow));

        assert_eq!(queue.status(), Status::Fault(FaultCode::Overflow));
        assert!(matches!(queue.push(compute()), Err(NradixError::Overflow)));
        queue.push(reset()).unwrap();

        let _ = queue.next().unwrap();
        queue.finish(Outcome::Cleared);
        assert_eq!(queue.status(), Status::Idle);
        assert_eq!(queue.stats().faulted, 1);
    }

    #[test]
    fn test_closed_queue_rejects_and_stops_worker() {
        let queue = CommandQueue::new(4);
        queue.close();
        assert!(matches!(queue.push(compute()), Err(NradixError::NotReady)));
        assert!(queue.next().is_none());
    }

    #[test]
    fn test_discard_pending() {
        let queue = CommandQueue::new(4);
        queue.push(compute()).unwrap();
        queue.push(compute()).unwrap();
        assert_eq!(queue.discard_pending(), 2);
        assert_eq!(queue.stats().skipped, 2);
        assert_eq!(queue.status(), Status::Idle);
    }
}
