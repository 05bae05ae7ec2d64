// mpa-fixed
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Layer III requantization: `v^(4/3)` lookup, exponent computation and
//! split, saturating shift, and the final `root_table` multiply.

use lazy_static::lazy_static;

use crate::fixed::{shl_saturate, Fixed};
use crate::layer3::tables::{PRETAB, ROOT_TABLE};

lazy_static! {
    /// `POW43[i] = i^(4/3)` for the full range of Huffman-decoded
    /// magnitudes (0..=8206, per spec the escape-extended maximum), stored
    /// as a normalized `(mantissa, exponent)` pair per spec.md §4.7's
    /// "8207-entry table of (27-bit mantissa, 5-bit exponent)": `i^(4/3)`
    /// exceeds `Fixed`'s `[-8, +8)` range for every `i >= 5`, so the real
    /// value is factored into `mantissa * 2^exponent` with `mantissa` in
    /// `[0.5, 1)` and the exponent folded back in by `requantize` alongside
    /// the scalefactor exponent, instead of being baked into the table.
    static ref POW43: [(Fixed, i32); 8207] = {
        let mut table = [(Fixed::ZERO, 0i32); 8207];
        for (i, entry) in table.iter_mut().enumerate().skip(1) {
            let val = (i as f64).powf(4.0 / 3.0);
            let exp = val.log2().floor() as i32 + 1;
            let mantissa = val / 2f64.powi(exp);
            *entry = (Fixed::from_f64(mantissa), exp);
        }
        table
    };
}

/// Computes the combined exponent for one scalefactor-band line, per
/// spec.md §4.7's formula: `global_gain - 210 - scf*(scalefac_scale?4:2) -
/// [8*subblock_gain for short blocks]`.
#[allow(clippy::too_many_arguments)]
pub fn requantize_exponent(
    global_gain: u8,
    scalefac: u8,
    preflag_add: u8,
    scalefac_scale: bool,
    subblock_gain: Option<u8>,
) -> i32 {
    let scf = i32::from(scalefac) + i32::from(preflag_add);
    let scale_step = if scalefac_scale { 4 } else { 2 };
    let mut exp = i32::from(global_gain) - 210 - scf * scale_step;
    if let Some(gain) = subblock_gain {
        exp -= 8 * i32::from(gain);
    }
    exp
}

/// Requantizes one decoded Huffman magnitude `v` (sign applied by the
/// caller) at the given combined `exponent`, returning the dequantized
/// fixed-point sample magnitude.
///
/// `exponent` is split into `(q, r)` with `exponent = 4*q + r`; `v^(4/3)`
/// is looked up, shifted by `q` (saturating on overflow, zeroing on
/// underflow), then scaled by `root_table[r]`.
pub fn requantize(v: u32, exponent: i32) -> Fixed {
    let (mantissa, table_exp) = POW43[v.min(8206) as usize];
    if mantissa == Fixed::ZERO {
        return Fixed::ZERO;
    }

    // Fold the table's own `2^table_exp` normalization into the
    // scalefactor exponent before splitting into `(q, r)`, so the shift
    // below applies both at once instead of discarding `table_exp` by
    // baking it into the (saturating) fixed-point magnitude up front.
    let total_exp = exponent + table_exp;

    // `total_exp = 4*q + r`, `r` in `0..4` (Euclidean remainder, always
    // non-negative); apply `2^q` via a saturating shift and the
    // fractional `2^(r/4)` step via `ROOT_TABLE`.
    let q = total_exp.div_euclid(4);
    let r = total_exp.rem_euclid(4);

    let shifted = if q >= 0 {
        if q > 30 {
            return Fixed::MAX;
        }
        Fixed::from_raw(shl_saturate(i64::from(mantissa.raw()), q as u32))
    }
    else {
        let shift = (-q).min(31) as u32;
        Fixed::from_raw((i64::from(mantissa.raw()) >> shift) as i32)
    };

    shifted * ROOT_TABLE[r as usize]
}

/// Returns the preemphasis table entry for long-block scalefactor band
/// `sfb` when `preflag` is set (`0` otherwise).
pub fn preemphasis(sfb: usize, preflag: bool) -> u8 {
    if preflag { PRETAB[sfb.min(PRETAB.len() - 1)] } else { 0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pow43_matches_definition() {
        let (mantissa, exp) = POW43[8];
        let reconstructed = mantissa.to_f64() * 2f64.powi(exp);
        assert!((reconstructed - 8f64.powf(4.0 / 3.0)).abs() < 1e-3);
    }

    #[test]
    fn requantize_zero_magnitude_is_zero() {
        assert_eq!(requantize(0, 0).raw(), 0);
    }

    #[test]
    fn requantize_large_magnitude_matches_float_reference() {
        // Regression: v^(4/3) for v >= 5 exceeds Fixed's [-8, +8) range, so
        // storing it directly in POW43 used to saturate the mantissa before
        // the exponent shift ever ran.
        let v = 100u32;
        let exponent = -20;
        let result = requantize(v, exponent).to_f64();
        let expected = (v as f64).powf(4.0 / 3.0) * 2f64.powf(f64::from(exponent) / 4.0);
        assert!((result - expected).abs() / expected < 1e-2);
    }

    #[test]
    fn requantize_exponent_matches_formula() {
        let exp = requantize_exponent(150, 10, 2, true, None);
        assert_eq!(exp, 150 - 210 - 12 * 4);
    }

    #[test]
    fn preemphasis_disabled_is_zero() {
        assert_eq!(preemphasis(10, false), 0);
        assert_eq!(preemphasis(10, true), PRETAB[10]);
    }
}
