// SPDX-License-Identifier: MIT
// Copyright 2026 Tyler Zervas

//! Device cell encoding.
//!
//! The optical array stores one packed byte per matrix cell, i.e. every value
//! carries exactly five trits of precision. A `width × height` tile therefore
//! occupies `width * height` bytes of device memory.

use super::pack::{pack5, unpack5, TRITS_PER_BYTE};
use super::scalar::{decode, encode_digits, max_magnitude};
use crate::error::Result;
use crate::trit::Trit;

/// Digits of precision held by one device cell.
pub const CELL_TRITS: u32 = TRITS_PER_BYTE as u32;

/// Largest magnitude a device cell can hold, `121 / 243`.
#[must_use]
pub fn cell_limit() -> f64 {
    max_magnitude(CELL_TRITS)
}

/// Encode one value into a device cell.
#[must_use]
pub fn encode_cell(value: f32) -> u8 {
    let mut digits = [Trit::Z; TRITS_PER_BYTE];
    encode_digits(value, &mut digits);
    pack5(digits)
}

/// Decode one device cell.
///
/// # Errors
///
/// Returns `NradixError::InvalidPackedByte` for bytes above 242.
pub fn decode_cell(byte: u8) -> Result<f32> {
    Ok(decode(&unpack5(byte)?))
}

/// Encode a slice of values into device cells.
#[must_use]
pub fn encode_cells(values: &[f32]) -> Vec<u8> {
    values.iter().map(|&v| encode_cell(v)).collect()
}

/// Decode a slice of device cells.
///
/// # Errors
///
/// Returns `NradixError::InvalidPackedByte` on the first corrupt byte.
pub fn decode_cells(bytes: &[u8]) -> Result<Vec<f32>> {
    bytes.iter().map(|&b| decode_cell(b)).collect()
}
