// SPDX-License-Identifier: MIT
// Copyright 2026 Tyler Zervas

//! Whole-matrix conversion between row-major `f32` data and packed trits.
//!
//! Every element is encoded with the scalar codec into `trits_per_val`
//! digits; the digits of all elements form one stream that is packed five at
//! a time. The final partial group is padded with zero trits.

use serde::{Deserialize, Serialize};

use super::pack::{pack5, unpack5, TRITS_PER_BYTE};
use super::scalar::{decode, encode_into, max_magnitude};
use crate::error::{NradixError, Result};
use crate::trit::Trit;

/// Packed byte count for a `rows × cols` matrix: `ceil(rows·cols·t / 5)`.
///
/// # Examples
///
/// ```
/// use nradix_driver::codec::calculate_packed_size;
///
/// assert_eq!(calculate_packed_size(27, 27, 5), 729);
/// assert_eq!(calculate_packed_size(1, 3, 3), 2);
/// ```
#[must_use]
pub fn calculate_packed_size(rows: usize, cols: usize, trits_per_val: u32) -> usize {
    rows.saturating_mul(cols)
        .saturating_mul(trits_per_val as usize)
        .div_ceil(TRITS_PER_BYTE)
}

fn check_shape(rows: usize, cols: usize, trits_per_val: u32) -> Result<usize> {
    if rows == 0 || cols == 0 {
        return Err(NradixError::invalid_size(format!(
            "matrix shape {rows}x{cols} has a zero dimension"
        )));
    }
    if trits_per_val == 0 {
        return Err(NradixError::invalid_size("trits_per_val must be at least 1"));
    }
    rows.checked_mul(cols)
        .ok_or_else(|| NradixError::invalid_size(format!("matrix shape {rows}x{cols} overflows")))
}

/// Encode a row-major matrix into `packed`.
///
/// Returns the number of bytes written, which is always
/// [`calculate_packed_size`]. Bytes past that length are left untouched.
///
/// # Errors
///
/// - `NradixError::InvalidSize` for a zero dimension or digit count.
/// - `NradixError::SizeMismatch` if `matrix` has fewer than `rows * cols`
///   elements or `packed` is shorter than the required size.
pub fn float_matrix_to_ternary(
    matrix: &[f32],
    rows: usize,
    cols: usize,
    trits_per_val: u32,
    packed: &mut [u8],
) -> Result<usize> {
    let elements = check_shape(rows, cols, trits_per_val)?;
    if matrix.len() < elements {
        return Err(NradixError::SizeMismatch {
            required: elements,
            actual: matrix.len(),
        });
    }
    let required = calculate_packed_size(rows, cols, trits_per_val);
    if packed.len() < required {
        return Err(NradixError::SizeMismatch {
            required,
            actual: packed.len(),
        });
    }

    let mut digits = vec![Trit::Z; trits_per_val as usize];
    let mut group = [Trit::Z; TRITS_PER_BYTE];
    let mut filled = 0;
    let mut written = 0;

    for &value in &matrix[..elements] {
        encode_into(value, &mut digits)?;
        for &trit in &digits {
            group[filled] = trit;
            filled += 1;
            if filled == TRITS_PER_BYTE {
                packed[written] = pack5(group);
                written += 1;
                filled = 0;
            }
        }
    }

    if filled > 0 {
        group[filled..].fill(Trit::Z);
        packed[written] = pack5(group);
        written += 1;
    }

    debug_assert_eq!(written, required);
    Ok(written)
}

/// Decode a packed stream into a row-major matrix.
///
/// # Errors
///
/// - `NradixError::InvalidSize` for a zero dimension or digit count.
/// - `NradixError::SizeMismatch` if `packed` is shorter than the required
///   size or `matrix` has fewer than `rows * cols` elements.
/// - `NradixError::InvalidPackedByte` on a corrupt byte.
pub fn ternary_to_float_matrix(
    packed: &[u8],
    trits_per_val: u32,
    matrix: &mut [f32],
    rows: usize,
    cols: usize,
) -> Result<()> {
    let elements = check_shape(rows, cols, trits_per_val)?;
    let required = calculate_packed_size(rows, cols, trits_per_val);
    if packed.len() < required {
        return Err(NradixError::SizeMismatch {
            required,
            actual: packed.len(),
        });
    }
    if matrix.len() < elements {
        return Err(NradixError::SizeMismatch {
            required: elements,
            actual: matrix.len(),
        });
    }

    let mut digits = vec![Trit::Z; trits_per_val as usize];
    let mut group = [Trit::Z; TRITS_PER_BYTE];
    let mut cursor = TRITS_PER_BYTE;
    let mut next_byte = 0;

    for out in &mut matrix[..elements] {
        for slot in &mut digits {
            if cursor == TRITS_PER_BYTE {
                group = unpack5(packed[next_byte])?;
                next_byte += 1;
                cursor = 0;
            }
            *slot = group[cursor];
            cursor += 1;
        }
        *out = decode(&digits);
    }

    Ok(())
}

/// An owned packed ternary matrix.
///
/// `scale` multiplies every decoded element; it is `1.0` unless the matrix
/// was built with [`TernaryMatrix::quantize`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "PackedMatrix")]
pub struct TernaryMatrix {
    rows: usize,
    cols: usize,
    trits_per_val: u32,
    scale: f32,
    data: Vec<u8>,
}

/// Unchecked serialized form of [`TernaryMatrix`].
#[derive(Deserialize)]
struct PackedMatrix {
    rows: usize,
    cols: usize,
    trits_per_val: u32,
    scale: f32,
    data: Vec<u8>,
}

impl TryFrom<PackedMatrix> for TernaryMatrix {
    type Error = NradixError;

    fn try_from(raw: PackedMatrix) -> Result<Self> {
        if !raw.scale.is_finite() || raw.scale <= 0.0 {
            return Err(NradixError::invalid_size(format!(
                "matrix scale {} is not a positive finite number",
                raw.scale
            )));
        }
        let mut m = Self::from_packed(raw.data, raw.rows, raw.cols, raw.trits_per_val)?;
        m.scale = raw.scale;
        Ok(m)
    }
}

impl TernaryMatrix {
    /// Encode values as-is (clamping and saturating like the scalar codec).
    ///
    /// # Errors
    ///
    /// Same conditions as [`float_matrix_to_ternary`].
    pub fn from_floats(matrix: &[f32], rows: usize, cols: usize, trits_per_val: u32) -> Result<Self> {
        let elements = check_shape(rows, cols, trits_per_val)?;
        if matrix.len() != elements {
            return Err(NradixError::SizeMismatch {
                required: elements,
                actual: matrix.len(),
            });
        }
        let mut data = vec![0u8; calculate_packed_size(rows, cols, trits_per_val)];
        float_matrix_to_ternary(matrix, rows, cols, trits_per_val, &mut data)?;
        Ok(Self {
            rows,
            cols,
            trits_per_val,
            scale: 1.0,
            data,
        })
    }

    /// Normalize by the largest magnitude into the representable range, then
    /// encode. The normalization factor is kept so [`TernaryMatrix::to_floats`]
    /// restores the original scale.
    ///
    /// # Errors
    ///
    /// Same conditions as [`float_matrix_to_ternary`].
    ///
    /// # Examples
    ///
    /// ```
    /// use nradix_driver::codec::TernaryMatrix;
    ///
    /// let weights = [4.0, -2.0, 1.0, 0.5];
    /// let m = TernaryMatrix::quantize(&weights, 2, 2, 9).unwrap();
    /// let back = m.to_floats().unwrap();
    /// assert!((back[0] - 4.0).abs() < 1e-3);
    /// ```
    pub fn quantize(matrix: &[f32], rows: usize, cols: usize, trits_per_val: u32) -> Result<Self> {
        let max_abs = matrix
            .iter()
            .filter(|v| v.is_finite())
            .fold(0.0f32, |acc, v| acc.max(v.abs()));
        if max_abs == 0.0 {
            return Self::from_floats(matrix, rows, cols, trits_per_val);
        }

        let limit = max_magnitude(trits_per_val) as f32;
        let factor = limit / max_abs;
        let normalized: Vec<f32> = matrix.iter().map(|v| v * factor).collect();
        let mut m = Self::from_floats(&normalized, rows, cols, trits_per_val)?;
        m.scale = max_abs / limit;
        Ok(m)
    }

    /// Rebuild from raw packed bytes.
    ///
    /// # Errors
    ///
    /// Returns `NradixError::SizeMismatch` if `data` is not exactly the
    /// packed size of the shape.
    pub fn from_packed(data: Vec<u8>, rows: usize, cols: usize, trits_per_val: u32) -> Result<Self> {
        check_shape(rows, cols, trits_per_val)?;
        let required = calculate_packed_size(rows, cols, trits_per_val);
        if data.len() != required {
            return Err(NradixError::SizeMismatch {
                required,
                actual: data.len(),
            });
        }
        Ok(Self {
            rows,
            cols,
            trits_per_val,
            scale: 1.0,
            data,
        })
    }

    /// Decode to a row-major `Vec<f32>`, applying the stored scale.
    ///
    /// # Errors
    ///
    /// Returns `NradixError::InvalidPackedByte` if the bytes are corrupt.
    pub fn to_floats(&self) -> Result<Vec<f32>> {
        let elements = check_shape(self.rows, self.cols, self.trits_per_val)?;
        let mut out = vec![0.0f32; elements];
        ternary_to_float_matrix(&self.data, self.trits_per_val, &mut out, self.rows, self.cols)?;
        if (self.scale - 1.0).abs() > f32::EPSILON {
            for v in &mut out {
                *v *= self.scale;
            }
        }
        Ok(out)
    }

    /// Number of rows.
    #[must_use]
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of columns.
    #[must_use]
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Digits per element.
    #[must_use]
    pub fn trits_per_val(&self) -> u32 {
        self.trits_per_val
    }

    /// Multiplier applied on decode.
    #[must_use]
    pub fn scale(&self) -> f32 {
        self.scale
    }

    /// Packed bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Consume into packed bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }
}
