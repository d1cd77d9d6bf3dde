// SPDX-License-Identifier: MIT
// Copyright 2026 Tyler Zervas

//! Driver configuration parsing and validation.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{NradixError, Result};

/// Top-level driver configuration.
///
/// # Example
///
/// ```rust
/// use nradix_driver::{BackendConfig, DriverConfig};
///
/// # fn main() -> nradix_driver::Result<()> {
/// let config = DriverConfig::from_yaml_str(
///     "queue_capacity: 16\nbackend:\n  kind: simulated\n  array_width: 9\n  array_height: 9\n",
/// )?;
/// config.validate()?;
/// assert_eq!(config.queue_capacity, 16);
/// assert_eq!(config.backend.array_size(), (9, 9));
///
/// let built = DriverConfig::default()
///     .with_backend(BackendConfig::simulated().with_array_size(9, 9))
///     .with_queue_capacity(16);
/// assert_eq!(built.backend.array_size(), config.backend.array_size());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriverConfig {
    /// Which device to drive.
    #[serde(default)]
    pub backend: BackendConfig,

    /// Maximum number of queued commands.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// How long `shutdown` waits for queued work before discarding it.
    #[serde(default = "default_shutdown_grace_ms")]
    pub shutdown_grace_ms: u64,

    /// How many times a BUSY status is retried before latching a timeout.
    #[serde(default = "default_busy_retry_limit")]
    pub busy_retry_limit: u32,

    /// Array clock, used for throughput estimates.
    #[serde(default = "default_clock_mhz")]
    pub clock_mhz: f64,
}

fn default_queue_capacity() -> usize {
    64
}
fn default_shutdown_grace_ms() -> u64 {
    5000
}
fn default_busy_retry_limit() -> u32 {
    1000
}
fn default_clock_mhz() -> f64 {
    617.0
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            backend: BackendConfig::default(),
            queue_capacity: default_queue_capacity(),
            shutdown_grace_ms: default_shutdown_grace_ms(),
            busy_retry_limit: default_busy_retry_limit(),
            clock_mhz: default_clock_mhz(),
        }
    }
}

impl DriverConfig {
    /// Default configuration with a simulated device.
    #[must_use]
    pub fn simulated() -> Self {
        Self::default()
    }

    /// Default configuration for the device node at `path`.
    #[must_use]
    pub fn hardware(path: impl Into<PathBuf>) -> Self {
        Self::default().with_backend(BackendConfig::hardware(path))
    }

    /// Load configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns `NradixError::Io` if the file cannot be read, or
    /// `NradixError::ConfigParse` if it is not valid YAML for this type.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns `NradixError::ConfigParse` on malformed input.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Serialize to YAML.
    ///
    /// # Errors
    ///
    /// Returns `NradixError::ConfigParse` if serialization fails.
    pub fn to_yaml_string(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Replace the backend configuration.
    #[must_use]
    pub fn with_backend(mut self, backend: BackendConfig) -> Self {
        self.backend = backend;
        self
    }

    /// Set the queue capacity.
    #[must_use]
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Set the shutdown grace period.
    #[must_use]
    pub fn with_shutdown_grace_ms(mut self, grace_ms: u64) -> Self {
        self.shutdown_grace_ms = grace_ms;
        self
    }

    /// Set the BUSY retry limit.
    #[must_use]
    pub fn with_busy_retry_limit(mut self, limit: u32) -> Self {
        self.busy_retry_limit = limit;
        self
    }

    /// Set the array clock.
    #[must_use]
    pub fn with_clock_mhz(mut self, clock_mhz: f64) -> Self {
        self.clock_mhz = clock_mhz;
        self
    }

    /// Validate configuration.
    ///
    /// # Errors
    ///
    /// Returns `NradixError::Config` naming the first invalid field.
    pub fn validate(&self) -> Result<()> {
        if self.queue_capacity == 0 {
            return Err(NradixError::config("queue_capacity must be > 0"));
        }
        if !(self.clock_mhz.is_finite() && self.clock_mhz > 0.0) {
            return Err(NradixError::config("clock_mhz must be a positive number"));
        }
        self.backend.validate()
    }
}

/// Device backend selection and geometry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum BackendConfig {
    /// In-memory simulated array.
    Simulated {
        /// Array width in cells.
        #[serde(default = "default_array_dim")]
        array_width: u32,
        /// Array height in cells.
        #[serde(default = "default_array_dim")]
        array_height: u32,
        /// Device memory in bytes.
        #[serde(default = "default_memory_size")]
        memory_size: u64,
        /// DMA alignment in bytes.
        #[serde(default = "default_alignment")]
        alignment: u64,
        /// First device address.
        #[serde(default = "default_base_addr")]
        base_addr: u64,
        /// Artificial delay per executed command.
        #[serde(default)]
        latency_us: u64,
    },
    /// Character device node.
    Hardware {
        /// Path of the device node.
        #[serde(default = "default_device_path")]
        device_path: PathBuf,
        /// Array width in cells.
        #[serde(default = "default_array_dim")]
        array_width: u32,
        /// Array height in cells.
        #[serde(default = "default_array_dim")]
        array_height: u32,
        /// Device memory in bytes.
        #[serde(default = "default_memory_size")]
        memory_size: u64,
        /// DMA alignment in bytes.
        #[serde(default = "default_alignment")]
        alignment: u64,
        /// First device address.
        #[serde(default = "default_base_addr")]
        base_addr: u64,
    },
}

fn default_array_dim() -> u32 {
    27
}
fn default_memory_size() -> u64 {
    1 << 20
}
fn default_alignment() -> u64 {
    64
}
fn default_base_addr() -> u64 {
    0x1000_0000
}
fn default_device_path() -> PathBuf {
    PathBuf::from("/dev/nradix0")
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self::simulated()
    }
}

impl BackendConfig {
    /// Simulated 27×27 array with 1 MiB of memory.
    #[must_use]
    pub fn simulated() -> Self {
        Self::Simulated {
            array_width: default_array_dim(),
            array_height: default_array_dim(),
            memory_size: default_memory_size(),
            alignment: default_alignment(),
            base_addr: default_base_addr(),
            latency_us: 0,
        }
    }

    /// Device node at `path` with default geometry.
    #[must_use]
    pub fn hardware(path: impl Into<PathBuf>) -> Self {
        Self::Hardware {
            device_path: path.into(),
            array_width: default_array_dim(),
            array_height: default_array_dim(),
            memory_size: default_memory_size(),
            alignment: default_alignment(),
            base_addr: default_base_addr(),
        }
    }

    /// Set the array geometry.
    #[must_use]
    pub fn with_array_size(mut self, width: u32, height: u32) -> Self {
        match &mut self {
            Self::Simulated {
                array_width,
                array_height,
                ..
            }
            | Self::Hardware {
                array_width,
                array_height,
                ..
            } => {
                *array_width = width;
                *array_height = height;
            }
        }
        self
    }

    /// Set the device memory size.
    #[must_use]
    pub fn with_memory_size(mut self, size: u64) -> Self {
        match &mut self {
            Self::Simulated { memory_size, .. } | Self::Hardware { memory_size, .. } => {
                *memory_size = size;
            }
        }
        self
    }

    /// Set the DMA alignment.
    #[must_use]
    pub fn with_alignment(mut self, bytes: u64) -> Self {
        match &mut self {
            Self::Simulated { alignment, .. } | Self::Hardware { alignment, .. } => {
                *alignment = bytes;
            }
        }
        self
    }

    /// Set the per-command latency. Only the simulated backend has one.
    #[must_use]
    pub fn with_latency_us(mut self, micros: u64) -> Self {
        if let Self::Simulated { latency_us, .. } = &mut self {
            *latency_us = micros;
        }
        self
    }

    /// `(width, height)` of the configured array.
    #[must_use]
    pub fn array_size(&self) -> (u32, u32) {
        match self {
            Self::Simulated {
                array_width,
                array_height,
                ..
            }
            | Self::Hardware {
                array_width,
                array_height,
                ..
            } => (*array_width, *array_height),
        }
    }

    /// Short name of the selected backend.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Simulated { .. } => "simulated",
            Self::Hardware { .. } => "hardware",
        }
    }

    /// Validate geometry and paths.
    ///
    /// # Errors
    ///
    /// Returns `NradixError::Config` naming the first invalid field.
    pub fn validate(&self) -> Result<()> {
        let (Self::Simulated {
            array_width,
            array_height,
            memory_size,
            alignment,
            base_addr,
            ..
        }
        | Self::Hardware {
            array_width,
            array_height,
            memory_size,
            alignment,
            base_addr,
            ..
        }) = self;

        if *array_width == 0 || *array_height == 0 {
            return Err(NradixError::config("array dimensions must be > 0"));
        }
        if !alignment.is_power_of_two() {
            return Err(NradixError::config(format!(
                "alignment {alignment} must be a power of two"
            )));
        }
        if *memory_size == 0 || memory_size % alignment != 0 {
            return Err(NradixError::config(format!(
                "memory_size {memory_size} must be a non-zero multiple of {alignment}"
            )));
        }
        if *base_addr == 0 || base_addr % alignment != 0 {
            return Err(NradixError::config(format!(
                "base_addr 0x{base_addr:x} must be non-zero and {alignment}-byte aligned"
            )));
        }
        if base_addr.checked_add(*memory_size).is_none() {
            return Err(NradixError::config("base_addr + memory_size overflows"));
        }
        if let Self::Hardware { device_path, .. } = self {
            if device_path.as_os_str().is_empty() {
                return Err(NradixError::config("device_path is required"));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = DriverConfig::default();
        assert_eq!(config.queue_capacity, 64);
        assert_eq!(config.shutdown_grace_ms, 5000);
        assert_eq!(config.busy_retry_limit, 1000);
        assert!((config.clock_mhz - 617.0).abs() < f64::EPSILON);
        assert_eq!(config.backend.array_size(), (27, 27));
        assert_eq!(config.backend.name(), "simulated");
        config.validate().unwrap();
    }

    #[test]
    fn test_empty_yaml_uses_defaults() {
        let config = DriverConfig::from_yaml_str("{}").unwrap();
        assert_eq!(config, DriverConfig::default());
    }

    #[test]
    fn test_hardware_yaml() {
        let yaml = r"
backend:
  kind: hardware
  device_path: /dev/nradix1
  array_width: 81
  array_height: 81
shutdown_grace_ms: 100
";
        let config = DriverConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.shutdown_grace_ms, 100);
        match &config.backend {
            BackendConfig::Hardware {
                device_path,
                memory_size,
                ..
            } => {
                assert_eq!(device_path, &PathBuf::from("/dev/nradix1"));
                assert_eq!(*memory_size, 1 << 20);
            }
            other => panic!("expected hardware backend, got {other:?}"),
        }
        assert_eq!(config.backend.array_size(), (81, 81));
    }

    #[test]
    fn test_unknown_backend_kind_rejected() {
        let err = DriverConfig::from_yaml_str("backend:\n  kind: fpga\n").unwrap_err();
        assert!(matches!(err, NradixError::ConfigParse(_)));
    }

    #[test]
    fn test_yaml_roundtrip_through_file() {
        let config = DriverConfig::simulated()
            .with_backend(BackendConfig::simulated().with_latency_us(250))
            .with_queue_capacity(8);

        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", config.to_yaml_string().unwrap()).unwrap();

        let loaded = DriverConfig::from_file(file.path()).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_validation_failures() {
        assert!(DriverConfig::default()
            .with_queue_capacity(0)
            .validate()
            .is_err());
        assert!(DriverConfig::default()
            .with_clock_mhz(f64::NAN)
            .validate()
            .is_err());
        assert!(BackendConfig::simulated()
            .with_array_size(0, 27)
            .validate()
            .is_err());
        assert!(BackendConfig::simulated()
            .with_alignment(48)
            .validate()
            .is_err());
        assert!(BackendConfig::simulated()
            .with_memory_size(100)
            .validate()
            .is_err());
        assert!(BackendConfig::hardware("").validate().is_err());
        BackendConfig::hardware("/dev/nradix0").validate().unwrap();
    }

    #[test]
    fn test_latency_ignored_for_hardware() {
        let hw = BackendConfig::hardware("/dev/nradix0");
        assert_eq!(hw.clone().with_latency_us(10), hw);
    }
}
