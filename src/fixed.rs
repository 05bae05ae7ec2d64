// mpa-fixed
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Q4.28 signed fixed-point arithmetic.
//!
//! A [`Fixed`] wraps a 32-bit two's complement integer representing 1 sign
//! bit, 3 integer bits, and 28 fractional bits. The representable range is
//! `[-8.0, +8.0)`. Addition and subtraction are native `i32` operations;
//! multiplication widens to a 64-bit intermediate product and scales back
//! down, with the scaling behavior selectable via [`MulMode`] to match the
//! reference implementation's platform-specific multiply macros
//! (`FPM_APPROX`, `FPM_64BIT`, and round-to-nearest variants).

/// Number of fractional bits.
pub const FRACBITS: u32 = 28;

/// Smallest representable value (`-8.0`).
pub const MIN: i32 = i32::MIN; // -0x8000_0000
/// Largest representable value (just under `+8.0`).
pub const MAX: i32 = i32::MAX; // 0x7fff_ffff

/// `1.0` in Q4.28.
pub const ONE: i32 = 1 << FRACBITS;

/// Selects the accuracy/performance tradeoff of [`mul_with_mode`].
///
/// Mirrors spec.md §4.1 and §9 "Conditional compilation of arithmetic": the
/// reference decoder picks one of several platform-specific 32x32->64
/// multiply strategies at build time. Here the choice is a runtime value so
/// a single binary can expose it as an option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MulMode {
    /// Truncate to the high 32 bits of a 16x16->32 partial product,
    /// matching `FPM_APPROX`'s reduced-precision fast path. Accurate to
    /// within `2^-14` of the ideal product.
    Approx,
    /// Full 64-bit product, right-shifted by [`FRACBITS`] with truncation
    /// (round toward negative infinity), matching `FPM_64BIT`.
    #[default]
    Full,
    /// Full 64-bit product, right-shifted by [`FRACBITS`] with
    /// round-to-nearest (ties away from zero via adding the half-ULP before
    /// shifting), matching the `-DFPM_64BIT` "round" build variant.
    FullRound,
}

/// A single Q4.28 fixed-point sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, PartialOrd, Ord)]
pub struct Fixed(pub i32);

impl Fixed {
    pub const ZERO: Fixed = Fixed(0);
    pub const ONE: Fixed = Fixed(ONE);
    pub const MIN: Fixed = Fixed(MIN);
    pub const MAX: Fixed = Fixed(MAX);

    /// Constructs a `Fixed` from a raw Q4.28 bit pattern.
    #[inline(always)]
    pub const fn from_raw(raw: i32) -> Self {
        Fixed(raw)
    }

    /// Constructs a `Fixed` from an integer value (exact, per spec.md §4.1).
    #[inline(always)]
    pub fn from_int(n: i32) -> Self {
        Fixed(n << FRACBITS)
    }

    /// Constructs a `Fixed` from a real value, rounding to the nearest
    /// representable Q4.28 value. Used only to materialize constant tables
    /// at startup (e.g. `costab`, window coefficients) — never on the
    /// decode hot path.
    pub fn from_f64(v: f64) -> Self {
        let scaled = v * (1i64 << FRACBITS) as f64;
        let rounded = scaled.round();
        Fixed(rounded as i32)
    }

    #[inline(always)]
    pub fn raw(self) -> i32 {
        self.0
    }

    #[inline(always)]
    pub fn to_f64(self) -> f64 {
        self.0 as f64 / (1i64 << FRACBITS) as f64
    }

    /// Exact absolute value. Saturates at `MIN` (there is no positive
    /// counterpart to `i32::MIN` in two's complement).
    #[inline(always)]
    pub fn abs(self) -> Fixed {
        if self.0 == MIN {
            Fixed(MAX)
        }
        else {
            Fixed(self.0.abs())
        }
    }

    /// Exact integer part (truncated toward negative infinity), per
    /// spec.md §4.1.
    #[inline(always)]
    pub fn int_part(self) -> i32 {
        self.0 >> FRACBITS
    }

    /// Exact fractional part, the low [`FRACBITS`] bits.
    #[inline(always)]
    pub fn frac_part(self) -> u32 {
        (self.0 as u32) & ((1u32 << FRACBITS) - 1)
    }

    /// Saturating add.
    #[inline(always)]
    pub fn add(self, other: Fixed) -> Fixed {
        Fixed(self.0.wrapping_add(other.0))
    }

    /// Saturating sub.
    #[inline(always)]
    pub fn sub(self, other: Fixed) -> Fixed {
        Fixed(self.0.wrapping_sub(other.0))
    }

    /// Multiplies two Q4.28 values using the default [`MulMode::Full`]
    /// behavior.
    #[inline(always)]
    pub fn mul(self, other: Fixed) -> Fixed {
        self.mul_with_mode(other, MulMode::Full)
    }

    /// Multiplies two Q4.28 values using the given [`MulMode`]. This is the
    /// one true multiply primitive; all higher layers must produce
    /// bit-identical PCM under a fixed `MulMode` selection (spec.md §4.1).
    pub fn mul_with_mode(self, other: Fixed, mode: MulMode) -> Fixed {
        match mode {
            MulMode::Approx => {
                // Reduced-precision fast path: truncate each operand to its
                // high 16 bits (an "E" fixed-point format internal to the
                // multiply), multiply as 16x16->32, matching `FPM_APPROX`.
                let a = (self.0 >> 12) as i64;
                let b = (other.0 >> 12) as i64;
                Fixed(((a * b) >> 4) as i32)
            }
            MulMode::Full => {
                let product = (self.0 as i64) * (other.0 as i64);
                Fixed((product >> FRACBITS) as i32)
            }
            MulMode::FullRound => {
                let product = (self.0 as i64) * (other.0 as i64);
                let rounded = product + (1i64 << (FRACBITS - 1));
                Fixed((rounded >> FRACBITS) as i32)
            }
        }
    }

    /// Scales a full 64-bit accumulated product down to Q4.28 once, per the
    /// multiply-accumulate contract in spec.md §4.1: callers accumulate
    /// full-precision products across a chain and call this only at the
    /// end, preserving precision across the chain (used by the synthesis
    /// filter's 8-tap sums).
    #[inline(always)]
    pub fn scale64(product: i64, mode: MulMode) -> Fixed {
        match mode {
            MulMode::FullRound => Fixed(((product + (1i64 << (FRACBITS - 1))) >> FRACBITS) as i32),
            _ => Fixed((product >> FRACBITS) as i32),
        }
    }
}

impl std::ops::Add for Fixed {
    type Output = Fixed;
    #[inline(always)]
    fn add(self, rhs: Fixed) -> Fixed {
        Fixed::add(self, rhs)
    }
}

impl std::ops::Sub for Fixed {
    type Output = Fixed;
    #[inline(always)]
    fn sub(self, rhs: Fixed) -> Fixed {
        Fixed::sub(self, rhs)
    }
}

impl std::ops::Neg for Fixed {
    type Output = Fixed;
    #[inline(always)]
    fn neg(self) -> Fixed {
        Fixed(self.0.wrapping_neg())
    }
}

impl std::ops::Mul for Fixed {
    type Output = Fixed;
    #[inline(always)]
    fn mul(self, rhs: Fixed) -> Fixed {
        Fixed::mul(self, rhs)
    }
}

/// Computes `value << shift` saturating to [`MIN`]/[`MAX`] on overflow,
/// rather than wrapping. Used by Layer III requantization (spec.md §4.7),
/// the only place that calls for saturation.
pub fn shl_saturate(value: i64, shift: u32) -> i32 {
    if shift >= 63 {
        return if value < 0 { MIN } else { MAX };
    }
    let shifted = value << shift;
    if shifted > MAX as i64 {
        MAX
    }
    else if shifted < MIN as i64 {
        MIN
    }
    else {
        shifted as i32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_int_roundtrip() {
        assert_eq!(Fixed::from_int(3).int_part(), 3);
        assert_eq!(Fixed::from_int(-2).int_part(), -2);
    }

    #[test]
    fn add_sub_are_exact() {
        let a = Fixed::from_f64(1.5);
        let b = Fixed::from_f64(0.25);
        assert_eq!(a.add(b).to_f64(), 1.75);
        assert_eq!(a.sub(b).to_f64(), 1.25);
    }

    #[test]
    fn full_multiply_matches_ideal_within_one_ulp() {
        let a = Fixed::from_f64(0.5);
        let b = Fixed::from_f64(0.5);
        let result = a.mul_with_mode(b, MulMode::Full);
        assert_eq!(result.to_f64(), 0.25);
    }

    #[test]
    fn approx_multiply_within_bound() {
        let a = Fixed::from_f64(1.23456);
        let b = Fixed::from_f64(-0.98765);
        let ideal = 1.23456 * -0.98765;
        let approx = a.mul_with_mode(b, MulMode::Approx).to_f64();
        assert!((approx - ideal).abs() <= 2f64.powi(-14) + 1e-6);
    }

    #[test]
    fn full_round_rounds_to_nearest() {
        // 0.5 * (1/2^28) should round up to a nonzero LSB rather than truncate to zero.
        let half_ulp = Fixed::from_raw(1 << (FRACBITS - 1));
        let one = Fixed::ONE;
        let rounded = half_ulp.mul_with_mode(one, MulMode::FullRound);
        assert_eq!(rounded.raw(), half_ulp.raw());
    }

    #[test]
    fn abs_saturates_at_min() {
        assert_eq!(Fixed(MIN).abs().raw(), MAX);
    }

    #[test]
    fn shl_saturate_clamps() {
        assert_eq!(shl_saturate(i64::from(MAX) * 4, 4), MAX);
        assert_eq!(shl_saturate(i64::from(MIN) * 4, 4), MIN);
    }
}
