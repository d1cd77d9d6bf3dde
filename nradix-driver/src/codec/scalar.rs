// SPDX-License-Identifier: MIT
// Copyright 2026 Tyler Zervas

//! Scalar conversion between bounded floats and balanced ternary fractions.
//!
//! A sequence of `n` trits, most significant first, denotes
//!
//! ```text
//! value = Σ trit[i] · 3^-(i+1)      for i in 0..n
//! ```
//!
//! so the representable magnitudes are bounded by `(1 - 3^-n) / 2`. Inputs
//! are clamped to `[-1, 1]` and anything beyond the representable range
//! saturates to the all-`P` (or all-`N`) sequence. The codec never errors on
//! range, only on a zero digit count.

use crate::error::{NradixError, Result};
use crate::trit::Trit;

/// Largest magnitude representable with `num_trits` trits: `(1 - 3^-n) / 2`.
///
/// # Examples
///
/// ```
/// use nradix_driver::codec::max_magnitude;
///
/// assert!((max_magnitude(1) - 1.0 / 3.0).abs() < 1e-12);
/// assert!(max_magnitude(20) < 0.5);
/// ```
#[must_use]
pub fn max_magnitude(num_trits: u32) -> f64 {
    let n = i32::try_from(num_trits).unwrap_or(i32::MAX);
    (1.0 - 3f64.powi(-n)) / 2.0
}

/// Encode `value` as `num_trits` balanced ternary digits.
///
/// The value is clamped to `[-1, 1]` (NaN encodes as zero), then digits are
/// extracted greedily: multiply the residual by 3, round to the nearest trit,
/// subtract.
///
/// # Errors
///
/// Returns `NradixError::InvalidSize` if `num_trits` is zero.
///
/// # Examples
///
/// ```
/// use nradix_driver::{codec, Trit};
///
/// let trits = codec::encode(1.0 / 3.0, 3).unwrap();
/// assert_eq!(trits, vec![Trit::P, Trit::Z, Trit::Z]);
/// ```
pub fn encode(value: f32, num_trits: u32) -> Result<Vec<Trit>> {
    if num_trits == 0 {
        return Err(NradixError::invalid_size("num_trits must be at least 1"));
    }
    let mut trits = vec![Trit::Z; num_trits as usize];
    encode_into(value, &mut trits)?;
    Ok(trits)
}

/// Encode `value` into a caller-provided digit buffer.
///
/// # Errors
///
/// Returns `NradixError::InvalidSize` if `out` is empty.
pub fn encode_into(value: f32, out: &mut [Trit]) -> Result<()> {
    if out.is_empty() {
        return Err(NradixError::invalid_size("num_trits must be at least 1"));
    }
    encode_digits(value, out);
    Ok(())
}

/// Greedy digit loop shared by the scalar and cell encoders. An empty `out`
/// is left untouched.
pub(crate) fn encode_digits(value: f32, out: &mut [Trit]) {
    let mut residual = if value.is_nan() {
        0.0
    } else {
        f64::from(value).clamp(-1.0, 1.0)
    };

    for slot in out.iter_mut() {
        let scaled = residual * 3.0;
        let trit = Trit::nearest(scaled);
        *slot = trit;
        // Once |residual| passes 1/2 every later digit saturates anyway;
        // clamping keeps the chosen digits identical and the residual bounded.
        residual = (scaled - f64::from(trit.value())).clamp(-0.5, 0.5);
    }
}

/// Decode balanced ternary digits (most significant first) to a float.
///
/// An empty slice decodes to `0.0`.
///
/// # Examples
///
/// ```
/// use nradix_driver::{codec, Trit};
///
/// let v = codec::decode(&[Trit::P, Trit::Z, Trit::Z]);
/// assert!((v - 1.0 / 3.0).abs() < 1e-7);
/// ```
#[must_use]
pub fn decode(trits: &[Trit]) -> f32 {
    decode_f64(trits) as f32
}

/// Full-precision variant of [`decode`].
#[must_use]
pub fn decode_f64(trits: &[Trit]) -> f64 {
    let mut weight = 1.0 / 3.0;
    let mut value = 0.0;
    for &trit in trits {
        value += f64::from(trit.value()) * weight;
        weight /= 3.0;
    }
    value
}

/// Decode raw integer digits.
///
/// Digits outside {-1, 0, +1} are rejected rather than silently summed.
///
/// # Errors
///
/// Returns `NradixError::InvalidTrit` on the first out-of-range digit.
pub fn decode_i8(digits: &[i8]) -> Result<f32> {
    let trits = digits
        .iter()
        .map(|&d| Trit::try_from(d))
        .collect::<Result<Vec<_>>>()?;
    Ok(decode(&trits))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_encodes_to_zeros() {
        assert_eq!(encode(0.0, 4).unwrap(), vec![Trit::Z; 4]);
    }

    #[test]
    fn test_one_third() {
        assert_eq!(encode(1.0 / 3.0, 3).unwrap(), vec![Trit::P, Trit::Z, Trit::Z]);
        assert_eq!(encode(-1.0 / 3.0, 3).unwrap(), vec![Trit::N, Trit::Z, Trit::Z]);
        assert!((decode(&[Trit::P, Trit::Z, Trit::Z]) - 1.0 / 3.0).abs() < 1e-7);
    }

    #[test]
    fn test_zero_trits_rejected() {
        assert!(matches!(encode(0.2, 0), Err(NradixError::InvalidSize(_))));
        assert!(encode_into(0.2, &mut []).is_err());
    }

    #[test]
    fn test_roundtrip_error_bound() {
        for n in 1..=12u32 {
            let bound = 3f64.powi(-(n as i32));
            let limit = max_magnitude(n);
            let steps = 400;
            for k in 0..=steps {
                let v = (-limit + 2.0 * limit * f64::from(k) / f64::from(steps)) as f32;
                let back = decode(&encode(v, n).unwrap());
                let err = (f64::from(back) - f64::from(v)).abs();
                assert!(err <= bound, "n={n} v={v} back={back} err={err}");
            }
        }
    }

    #[test]
    fn test_saturation_beyond_range() {
        for n in [1u32, 3, 9] {
            assert_eq!(encode(1.0, n).unwrap(), vec![Trit::P; n as usize]);
            assert_eq!(encode(-0.75, n).unwrap(), vec![Trit::N; n as usize]);
            // Inputs past [-1, 1] are clamped first.
            assert_eq!(encode(42.0, n).unwrap(), encode(1.0, n).unwrap());
        }
        let top = decode_f64(&encode(1.0, 6).unwrap());
        assert!((top - max_magnitude(6)).abs() < 1e-12);
    }

    #[test]
    fn test_nan_encodes_as_zero() {
        assert_eq!(encode(f32::NAN, 5).unwrap(), vec![Trit::Z; 5]);
    }

    #[test]
    fn test_large_digit_counts_stay_finite() {
        let trits = encode(1.0, 200).unwrap();
        assert!(trits.iter().all(|&t| t == Trit::P));
        assert!(decode(&trits).is_finite());
    }

    #[test]
    fn test_decode_i8() {
        assert!((decode_i8(&[1, 0, 0]).unwrap() - 1.0 / 3.0).abs() < 1e-7);
        assert!(matches!(decode_i8(&[1, 2]), Err(NradixError::InvalidTrit(2))));
        assert_eq!(decode(&[]), 0.0);
    }

    #[test]
    fn test_encoding_is_deterministic() {
        let a = encode(0.123_456, 9).unwrap();
        let b = encode(0.123_456, 9).unwrap();
        assert_eq!(a, b);
    }
}
