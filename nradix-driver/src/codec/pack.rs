// SPDX-License-Identifier: MIT
// Copyright 2026 Tyler Zervas

//! Dense packing of trits into bytes.
//!
//! Five trits fit in one byte because `3^5 = 243 <= 256`. Each trit is
//! shifted to a base-3 digit and the first trit is least significant:
//!
//! ```text
//! packed = (t0+1) + (t1+1)*3 + (t2+1)*9 + (t3+1)*27 + (t4+1)*81
//! ```
//!
//! giving 0..=242, about 1.58 bits per trit. Bytes 243..=255 never occur in
//! valid data and are rejected on unpack.

use crate::error::{NradixError, Result};
use crate::trit::Trit;

/// Number of trits stored in one packed byte.
pub const TRITS_PER_BYTE: usize = 5;

/// Largest valid packed byte (all five trits `P`).
pub const PACKED_MAX: u8 = 242;

const POWERS: [u8; TRITS_PER_BYTE] = [1, 3, 9, 27, 81];

/// Pack five trits into one byte.
///
/// # Examples
///
/// ```
/// use nradix_driver::{codec, Trit};
///
/// assert_eq!(codec::pack5([Trit::N; 5]), 0);
/// assert_eq!(codec::pack5([Trit::Z; 5]), 121);
/// assert_eq!(codec::pack5([Trit::P; 5]), 242);
/// ```
#[must_use]
pub fn pack5(trits: [Trit; TRITS_PER_BYTE]) -> u8 {
    trits
        .iter()
        .zip(POWERS)
        .map(|(t, p)| t.digit() * p)
        .sum()
}

/// Unpack one byte into five trits.
///
/// # Errors
///
/// Returns `NradixError::InvalidPackedByte` for bytes above [`PACKED_MAX`].
pub fn unpack5(byte: u8) -> Result<[Trit; TRITS_PER_BYTE]> {
    if byte > PACKED_MAX {
        return Err(NradixError::InvalidPackedByte(byte));
    }
    let mut rest = byte;
    let mut trits = [Trit::Z; TRITS_PER_BYTE];
    for slot in &mut trits {
        *slot = Trit::from_digit(rest % 3);
        rest /= 3;
    }
    Ok(trits)
}

/// Pack a trit stream, zero-padding the final partial group.
#[must_use]
pub fn pack_trits(trits: &[Trit]) -> Vec<u8> {
    trits
        .chunks(TRITS_PER_BYTE)
        .map(|chunk| {
            let mut group = [Trit::Z; TRITS_PER_BYTE];
            group[..chunk.len()].copy_from_slice(chunk);
            pack5(group)
        })
        .collect()
}

/// Unpack `count` trits from a packed stream.
///
/// # Errors
///
/// Returns `NradixError::SizeMismatch` if `bytes` holds fewer than `count`
/// trits, or `NradixError::InvalidPackedByte` on a corrupt byte.
pub fn unpack_trits(bytes: &[u8], count: usize) -> Result<Vec<Trit>> {
    let required = count.div_ceil(TRITS_PER_BYTE);
    if bytes.len() < required {
        return Err(NradixError::SizeMismatch {
            required,
            actual: bytes.len(),
        });
    }

    let mut trits = Vec::with_capacity(required * TRITS_PER_BYTE);
    for &byte in &bytes[..required] {
        trits.extend_from_slice(&unpack5(byte)?);
    }
    trits.truncate(count);
    Ok(trits)
}
