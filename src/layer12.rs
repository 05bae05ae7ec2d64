// mpa-fixed
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Tables shared between the Layer I and Layer II decoders: the 63-entry
//! scalefactor table and the 14-entry linear dequantization factor table.
//!
//! The reference implementation includes these from external `.dat` files
//! (`sf_table.dat`) that are not part of the retrieved source; both tables
//! follow directly from their documented generating formulas (ISO/IEC
//! 11172-3 subclause 3), so they are computed once at process start rather
//! than embedded as literals, following the same lazy-table pattern used
//! for the requantization power table and other generated coefficients.

use lazy_static::lazy_static;

use crate::fixed::Fixed;

lazy_static! {
    /// `sf_table[i] = 2^(1 - i/3)` for `i` in `0..63`, the standard Layer
    /// I/II scalefactor table (index 63 is reserved and never looked up).
    pub static ref SCALEFACTORS: [Fixed; 63] = {
        let mut table = [Fixed::ZERO; 63];
        for (i, entry) in table.iter_mut().enumerate() {
            let value = 2f64.powf(1.0 - (i as f64) / 3.0);
            *entry = Fixed::from_f64(value);
        }
        table
    };

    /// `LINEAR_FACTOR[nb]` for `nb` in `2..=15` (indexed directly by `nb`,
    /// so entries `0` and `1` are unused), giving the combined
    /// multiply-and-add-one dequantization factor from spec.md §4.6:
    /// `factor = [2^nb / (2^nb - 1)] * 2^(-nb + 1)`, so that
    /// `dequantized = factor * (signed_raw + 1)`.
    pub static ref LINEAR_FACTOR: [Fixed; 16] = {
        let mut table = [Fixed::ZERO; 16];
        for (nb, entry) in table.iter_mut().enumerate().skip(2) {
            let a = (1u32 << nb) as f64;
            let b = (1u32 << (nb - 1)) as f64;
            let factor = (a / (a - 1.0)) * (1.0 / b);
            *entry = Fixed::from_f64(factor);
        }
        table
    };
}

/// Sign-extends the `bits`-bit raw sample `raw` after inverting its most
/// significant bit (the MPEG audio convention for representing signed
/// quantization levels), returning the result as a plain `i32`.
#[inline]
pub fn invert_and_sign_extend(raw: u32, bits: u32) -> i32 {
    let inv = raw ^ (1 << (bits - 1));
    let shift = 32 - bits;
    ((inv << shift) as i32) >> shift
}

/// Dequantizes one `bits`-bit raw sample using [`LINEAR_FACTOR`], per
/// spec.md §4.6 "Per sample: ... requantize by `s'' = (2^nb/(2^nb-1)) *
/// (s''' + 2^(-nb+1))`". The `+2^(-nb+1)` term is folded into the `+1`
/// multiplicand since `LINEAR_FACTOR` already carries the `2^(-nb+1)`
/// scale.
pub fn dequantize(bits: u32, raw: u32) -> Fixed {
    let signed = invert_and_sign_extend(raw, bits);
    let factor = LINEAR_FACTOR[bits as usize];
    let product = (signed as i64 + 1) * factor.raw() as i64;
    Fixed::from_raw(product as i32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalefactor_zero_is_two() {
        assert!((SCALEFACTORS[0].to_f64() - 2.0).abs() < 1e-6);
    }

    #[test]
    fn scalefactor_three_is_one() {
        assert!((SCALEFACTORS[3].to_f64() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn dequantize_midrange_is_near_zero() {
        // A 4-bit raw value with MSB set and low bits zero inverts to all-zero
        // signed value -> dequantized value near the smallest nonzero step.
        let d = dequantize(4, 0b1000);
        assert!(d.to_f64().abs() < 1.0);
    }
}
