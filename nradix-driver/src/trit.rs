// SPDX-License-Identifier: MIT
// Copyright 2026 Tyler Zervas

//! Core trit type representing balanced ternary digits {-1, 0, +1}.
//!
//! On the optical array the three states map to the three wavelengths of a
//! collision-free triplet; on the host they are the digits of the codec.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{NradixError, Result};

/// A balanced ternary digit (trit) with values {-1, 0, +1}.
///
/// | Variant | Symbol | Value | Packed digit |
/// |---------|--------|-------|--------------|
/// | `N`     | `-`    | -1    | 0            |
/// | `Z`     | `0`    |  0    | 1            |
/// | `P`     | `+`    | +1    | 2            |
///
/// # Examples
///
/// ```
/// use nradix_driver::Trit;
///
/// assert_eq!(Trit::N.value(), -1);
/// assert_eq!(Trit::Z.value(), 0);
/// assert_eq!(Trit::P.value(), 1);
/// ```
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i8)]
pub enum Trit {
    /// Negative trit (-1).
    N = -1,
    /// Zero trit (0).
    #[default]
    Z = 0,
    /// Positive trit (+1).
    P = 1,
}

impl Trit {
    /// All trits in ascending order.
    pub const ALL: [Trit; 3] = [Trit::N, Trit::Z, Trit::P];

    /// Create a trit from an integer value.
    ///
    /// # Errors
    ///
    /// Returns `NradixError::InvalidTrit` if value is not -1, 0, or +1.
    ///
    /// # Examples
    ///
    /// ```
    /// use nradix_driver::Trit;
    ///
    /// assert_eq!(Trit::from_value(1).unwrap(), Trit::P);
    /// assert!(Trit::from_value(2).is_err());
    /// ```
    pub const fn from_value(value: i32) -> Result<Self> {
        match value {
            -1 => Ok(Trit::N),
            0 => Ok(Trit::Z),
            1 => Ok(Trit::P),
            _ => Err(NradixError::InvalidTrit(value)),
        }
    }

    /// Get the integer value of the trit.
    #[must_use]
    pub const fn value(self) -> i8 {
        self as i8
    }

    /// Unsigned base-3 digit (`value + 1`) used by the packed byte format.
    #[must_use]
    pub const fn digit(self) -> u8 {
        (self.value() + 1) as u8
    }

    /// Inverse of [`Trit::digit`]. Only the low base-3 digit is used.
    #[must_use]
    pub const fn from_digit(digit: u8) -> Self {
        match digit % 3 {
            0 => Trit::N,
            1 => Trit::Z,
            _ => Trit::P,
        }
    }

    /// Round a real number to the nearest trit, saturating at ±1.
    ///
    /// Ties round away from zero.
    #[must_use]
    pub fn nearest(x: f64) -> Self {
        let r = x.round();
        if r >= 1.0 {
            Trit::P
        } else if r <= -1.0 {
            Trit::N
        } else {
            Trit::Z
        }
    }
}

impl fmt::Display for Trit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trit::N => write!(f, "-"),
            Trit::Z => write!(f, "0"),
            Trit::P => write!(f, "+"),
        }
    }
}

impl TryFrom<i32> for Trit {
    type Error = NradixError;

    fn try_from(value: i32) -> Result<Self> {
        Trit::from_value(value)
    }
}

impl TryFrom<i8> for Trit {
    type Error = NradixError;

    fn try_from(value: i8) -> Result<Self> {
        Trit::from_value(i32::from(value))
    }
}

impl From<Trit> for i8 {
    fn from(trit: Trit) -> Self {
        trit.value()
    }
}

impl From<Trit> for i32 {
    fn from(trit: Trit) -> Self {
        trit.value() as i32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trit_values() {
        assert_eq!(Trit::N.value(), -1);
        assert_eq!(Trit::Z.value(), 0);
        assert_eq!(Trit::P.value(), 1);
    }

    #[test]
    fn test_trit_from_value() {
        assert_eq!(Trit::from_value(-1).unwrap(), Trit::N);
        assert_eq!(Trit::from_value(0).unwrap(), Trit::Z);
        assert_eq!(Trit::from_value(1).unwrap(), Trit::P);
        assert!(matches!(
            Trit::from_value(2),
            Err(NradixError::InvalidTrit(2))
        ));
        assert!(Trit::try_from(-2i8).is_err());
    }

    #[test]
    fn test_digit_roundtrip() {
        for trit in Trit::ALL {
            assert_eq!(Trit::from_digit(trit.digit()), trit);
        }
        assert_eq!(Trit::N.digit(), 0);
        assert_eq!(Trit::P.digit(), 2);
    }

    #[test]
    fn test_nearest() {
        assert_eq!(Trit::nearest(0.49), Trit::Z);
        assert_eq!(Trit::nearest(0.5), Trit::P);
        assert_eq!(Trit::nearest(-0.5), Trit::N);
        assert_eq!(Trit::nearest(7.0), Trit::P);
        assert_eq!(Trit::nearest(-3.2), Trit::N);
    }

    #[test]
    fn test_trit_display() {
        let s: String = Trit::ALL.iter().map(ToString::to_string).collect();
        assert_eq!(s, "-0+");
    }
}
