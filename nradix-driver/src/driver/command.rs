// SPDX-License-Identifier: MIT
// Copyright 2026 Tyler Zervas

//! Command descriptors.
//!
//! A descriptor is a plain `Copy` value; submitting one copies it into the
//! driver's queue, so the caller may reuse or drop its own copy immediately.

use std::fmt;

use bytemuck::{Pod, Zeroable};

use super::addr::DeviceAddr;

/// Command kinds understood by the optical array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    /// Load a weight tile into the array.
    LoadWeights,
    /// Stream an input tile into the array's staging memory.
    StreamInput,
    /// Run the processing elements over an input.
    Compute,
    /// Move output results out of the array.
    ReadOutput,
    /// Reset the array and clear any latched fault.
    Reset,
}

impl CommandKind {
    /// Wire code of the command.
    #[must_use]
    pub const fn code(self) -> u32 {
        match self {
            CommandKind::LoadWeights => 0x01,
            CommandKind::StreamInput => 0x02,
            CommandKind::Compute => 0x03,
            CommandKind::ReadOutput => 0x04,
            CommandKind::Reset => 0x0F,
        }
    }

    /// Inverse of [`CommandKind::code`].
    #[must_use]
    pub const fn from_code(code: u32) -> Option<Self> {
        match code {
            0x01 => Some(CommandKind::LoadWeights),
            0x02 => Some(CommandKind::StreamInput),
            0x03 => Some(CommandKind::Compute),
            0x04 => Some(CommandKind::ReadOutput),
            0x0F => Some(CommandKind::Reset),
            _ => None,
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CommandKind::LoadWeights => "load-weights",
            CommandKind::StreamInput => "stream-input",
            CommandKind::Compute => "compute",
            CommandKind::ReadOutput => "read-output",
            CommandKind::Reset => "reset",
        };
        f.write_str(name)
    }
}

/// Processing element used by a compute command.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PeType {
    /// Sum-frequency-generation adder.
    #[default]
    Add,
    /// Kerr-nonlinearity multiplier.
    Mul,
}

impl PeType {
    /// Wire code of the processing element.
    #[must_use]
    pub const fn code(self) -> u32 {
        match self {
            PeType::Add => 0,
            PeType::Mul => 1,
        }
    }
}

/// Kind-specific flag bits, passed through to the backend untouched.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CommandFlags(u32);

impl CommandFlags {
    /// No flags.
    pub const NONE: CommandFlags = CommandFlags(0);

    /// Wrap raw flag bits.
    #[must_use]
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// Raw flag bits.
    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Whether all bits of `other` are set.
    #[must_use]
    pub const fn contains(self, other: CommandFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

/// Size in bytes of an encoded descriptor.
pub const DESCRIPTOR_BYTES: usize = 40;

/// Firmware view of a descriptor. Fields hold little-endian values.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct RawDescriptor {
    command: u32,
    flags: u32,
    src: u64,
    dst: u64,
    width: u32,
    height: u32,
    pe_type: u32,
    _pad: u32,
}

const _DESCRIPTOR_SIZE_CHECK: () = assert!(
    std::mem::size_of::<RawDescriptor>() == DESCRIPTOR_BYTES,
    "RawDescriptor must match the firmware descriptor size"
);

/// A command for the optical array.
///
/// # Examples
///
/// ```
/// use nradix_driver::{CommandDescriptor, CommandKind};
///
/// let reset = CommandDescriptor::reset();
/// assert_eq!(reset.kind, CommandKind::Reset);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandDescriptor {
    /// What to do.
    pub kind: CommandKind,
    /// Kind-specific flags.
    pub flags: CommandFlags,
    /// Source address in device memory.
    pub src: DeviceAddr,
    /// Destination address in device memory.
    pub dst: DeviceAddr,
    /// Tile width (columns).
    pub width: u32,
    /// Tile height (rows).
    pub height: u32,
    /// Processing element, meaningful for compute only.
    pub pe_type: PeType,
}

impl CommandDescriptor {
    fn new(kind: CommandKind, src: DeviceAddr, dst: DeviceAddr, width: u32, height: u32) -> Self {
        Self {
            kind,
            flags: CommandFlags::NONE,
            src,
            dst,
            width,
            height,
            pe_type: PeType::Add,
        }
    }

    /// Load a `width × height` weight tile into `dst`.
    ///
    /// With a null `src` the tile comes from the host payload passed to
    /// [`Driver::load_weights`](crate::Driver::load_weights); otherwise it is
    /// copied from device memory at `src`.
    #[must_use]
    pub fn load_weights(src: DeviceAddr, dst: DeviceAddr, width: u32, height: u32) -> Self {
        Self::new(CommandKind::LoadWeights, src, dst, width, height)
    }

    /// Stream a `width × height` input tile from `src` to `dst`.
    #[must_use]
    pub fn stream_input(src: DeviceAddr, dst: DeviceAddr, width: u32, height: u32) -> Self {
        Self::new(CommandKind::StreamInput, src, dst, width, height)
    }

    /// Compute with the loaded weights on the input at `src`, writing `dst`.
    #[must_use]
    pub fn compute(src: DeviceAddr, dst: DeviceAddr, width: u32, height: u32, pe_type: PeType) -> Self {
        Self {
            pe_type,
            ..Self::new(CommandKind::Compute, src, dst, width, height)
        }
    }

    /// Move a `width × height` output tile from `src` to `dst`.
    #[must_use]
    pub fn read_output(src: DeviceAddr, dst: DeviceAddr, width: u32, height: u32) -> Self {
        Self::new(CommandKind::ReadOutput, src, dst, width, height)
    }

    /// Reset the array.
    #[must_use]
    pub fn reset() -> Self {
        Self::new(CommandKind::Reset, DeviceAddr::NULL, DeviceAddr::NULL, 0, 0)
    }

    /// Replace the flags.
    #[must_use]
    pub fn with_flags(mut self, flags: CommandFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Number of cells in the tile.
    #[must_use]
    pub fn cells(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    /// Bytes read from `src`, or `None` if the command does not read device
    /// memory at `src`.
    #[must_use]
    pub fn src_span(&self) -> Option<u64> {
        match self.kind {
            CommandKind::LoadWeights if self.src.is_null() => None,
            CommandKind::Reset => None,
            CommandKind::Compute if self.pe_type == PeType::Mul => Some(u64::from(self.width)),
            _ => Some(self.cells()),
        }
    }

    /// Bytes written at `dst`, or `None` if the command writes no device
    /// memory.
    #[must_use]
    pub fn dst_span(&self) -> Option<u64> {
        match self.kind {
            CommandKind::Reset => None,
            CommandKind::Compute if self.pe_type == PeType::Mul => Some(u64::from(self.height)),
            _ => Some(self.cells()),
        }
    }

    /// Encode in the firmware's little-endian descriptor layout:
    /// `command, flags: u32; src, dst: u64; width, height, pe_type: u32`
    /// followed by four bytes of padding.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; DESCRIPTOR_BYTES] {
        let raw = RawDescriptor {
            command: self.kind.code().to_le(),
            flags: self.flags.bits().to_le(),
            src: self.src.raw().to_le(),
            dst: self.dst.raw().to_le(),
            width: self.width.to_le(),
            height: self.height.to_le(),
            pe_type: self.pe_type.code().to_le(),
            _pad: 0,
        };
        let mut out = [0u8; DESCRIPTOR_BYTES];
        out.copy_from_slice(bytemuck::bytes_of(&raw));
        out
    }
}

impl fmt::Display for CommandDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            CommandKind::Reset => write!(f, "reset"),
            CommandKind::Compute => write!(
                f,
                "compute[{:?}] {}x{} {} -> {}",
                self.pe_type, self.width, self.height, self.src, self.dst
            ),
            kind => write!(
                f,
                "{kind} {}x{} {} -> {}",
                self.width, self.height, self.src, self.dst
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_codes_roundtrip() {
        for kind in [
            CommandKind::LoadWeights,
            CommandKind::StreamInput,
            CommandKind::Compute,
            CommandKind::ReadOutput,
            CommandKind::Reset,
        ] {
            assert_eq!(CommandKind::from_code(kind.code()), Some(kind));
        }
        assert_eq!(CommandKind::from_code(0x05), None);
    }

    #[test]
    fn test_spans() {
        let a = DeviceAddr::from_raw(0x1000);
        let b = DeviceAddr::from_raw(0x2000);

        let mul = CommandDescriptor::compute(a, b, 4, 3, PeType::Mul);
        assert_eq!(mul.src_span(), Some(4));
        assert_eq!(mul.dst_span(), Some(3));

        let add = CommandDescriptor::compute(a, b, 4, 3, PeType::Add);
        assert_eq!(add.src_span(), Some(12));
        assert_eq!(add.dst_span(), Some(12));

        let host_load = CommandDescriptor::load_weights(DeviceAddr::NULL, b, 2, 2);
        assert_eq!(host_load.src_span(), None);
        assert_eq!(host_load.dst_span(), Some(4));

        let reset = CommandDescriptor::reset();
        assert_eq!(reset.src_span(), None);
        assert_eq!(reset.dst_span(), None);
    }

    #[test]
    fn test_descriptor_layout() {
        let cmd = CommandDescriptor::compute(
            DeviceAddr::from_raw(0x1122_3344_5566_7788),
            DeviceAddr::from_raw(0x40),
            27,
            9,
            PeType::Mul,
        )
        .with_flags(CommandFlags::from_bits(0xA5));
        let bytes = cmd.to_bytes();
        assert_eq!(&bytes[0..4], &[0x03, 0, 0, 0]);
        assert_eq!(&bytes[4..8], &[0xA5, 0, 0, 0]);
        assert_eq!(&bytes[8..16], &0x1122_3344_5566_7788u64.to_le_bytes());
        assert_eq!(&bytes[16..24], &0x40u64.to_le_bytes());
        assert_eq!(&bytes[24..28], &27u32.to_le_bytes());
        assert_eq!(&bytes[28..32], &9u32.to_le_bytes());
        assert_eq!(&bytes[32..36], &1u32.to_le_bytes());
        assert_eq!(&bytes[36..40], &[0, 0, 0, 0]);
    }

    #[test]
    fn test_reset_descriptor_bytes() {
        let bytes = CommandDescriptor::reset().to_bytes();
        assert_eq!(bytes.len(), DESCRIPTOR_BYTES);
        assert_eq!(&bytes[0..4], &0x0Fu32.to_le_bytes());
        assert!(bytes[4..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_flags() {
        let f = CommandFlags::from_bits(0b1010);
        assert!(f.contains(CommandFlags::from_bits(0b1000)));
        assert!(!f.contains(CommandFlags::from_bits(0b0001)));
        assert!(f.contains(CommandFlags::NONE));
    }
}
