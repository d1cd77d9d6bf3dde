// SPDX-License-Identifier: MIT
// Copyright 2026 Tyler Zervas

//! Ternary codec: floats ⇄ balanced ternary ⇄ packed bytes.
//!
//! Every function here is pure and thread-safe.
//!
//! ```text
//! f32 ──encode──▶ [Trit; n] ──pack5──▶ u8 (0..=242)
//!     ◀─decode──            ◀unpack5─
//! ```
//!
//! # Example
//!
//! ```rust
//! use nradix_driver::codec;
//!
//! let weights = [0.25f32, -0.125, 0.4, 0.0];
//! let size = codec::calculate_packed_size(2, 2, 9);
//! let mut packed = vec![0u8; size];
//! codec::float_matrix_to_ternary(&weights, 2, 2, 9, &mut packed).unwrap();
//!
//! let mut back = [0f32; 4];
//! codec::ternary_to_float_matrix(&packed, 9, &mut back, 2, 2).unwrap();
//! assert!((back[0] - 0.25).abs() < 1e-4);
//! ```

mod cell;
mod matrix;
mod pack;
mod scalar;

pub use cell::{cell_limit, decode_cell, decode_cells, encode_cell, encode_cells, CELL_TRITS};
pub use matrix::{
    calculate_packed_size, float_matrix_to_ternary, ternary_to_float_matrix, TernaryMatrix,
};
pub use pack::{pack5, pack_trits, unpack5, unpack_trits, PACKED_MAX, TRITS_PER_BYTE};
pub use scalar::{decode, decode_f64, decode_i8, encode, encode_into, max_magnitude};
