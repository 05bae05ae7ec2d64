// mpa-fixed
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The polyphase synthesis filterbank: reconstructs 32 subband samples per
//! row into 32 PCM samples, using a 32-point DCT plus a 16-slot rotating
//! history (the Konstantinides fast-subband-filtering technique) against
//! the 512-tap prototype window of ISO/IEC 11172-3 Table B.3.
//!
//! The `SYNTHESIS_D` table, the `v_vec`/`v_front` FIFO state and its
//! quadrant-mapped DCT-output copy, and the per-output-sample 16-term
//! accumulation follow ISO/IEC 11172-3's reference synthesis algorithm,
//! with every coefficient in [`Fixed`] rather than floating point. The one
//! structural deviation from the standard's presentation is the DCT-32
//! itself: rather than a fully-unrolled recursive butterfly network, it is
//! computed here as a direct `cos` coefficient matrix (the same
//! substitution `layer3::tables` already makes for the IMDCT, for the same
//! implementation-confidence reason — see DESIGN.md). The two are
//! mathematically the same transform; only the factorization differs.

use lazy_static::lazy_static;

use crate::fixed::{Fixed, MulMode};

/// Synthesis window `D[i]`, ISO/IEC 11172-3 Table B.3.
#[allow(clippy::unreadable_literal)]
#[rustfmt::skip]
const SYNTHESIS_D_F64: [f64; 512] = [
     0.000000000, -0.000015259, -0.000015259, -0.000015259,
    -0.000015259, -0.000015259, -0.000015259, -0.000030518,
    -0.000030518, -0.000030518, -0.000030518, -0.000045776,
    -0.000045776, -0.000061035, -0.000061035, -0.000076294,
    -0.000076294, -0.000091553, -0.000106812, -0.000106812,
    -0.000122070, -0.000137329, -0.000152588, -0.000167847,
    -0.000198364, -0.000213623, -0.000244141, -0.000259399,
    -0.000289917, -0.000320435, -0.000366211, -0.000396729,
    -0.000442505, -0.000473022, -0.000534058, -0.000579834,
    -0.000625610, -0.000686646, -0.000747681, -0.000808716,
    -0.000885010, -0.000961304, -0.001037598, -0.001113892,
    -0.001205444, -0.001296997, -0.001388550, -0.001480103,
    -0.001586914, -0.001693726, -0.001785278, -0.001907349,
    -0.002014160, -0.002120972, -0.002243042, -0.002349854,
    -0.002456665, -0.002578735, -0.002685547, -0.002792358,
    -0.002899170, -0.002990723, -0.003082275, -0.003173828,
     0.003250122,  0.003326416,  0.003387451,  0.003433228,
     0.003463745,  0.003479004,  0.003479004,  0.003463745,
     0.003417969,  0.003372192,  0.003280640,  0.003173828,
     0.003051758,  0.002883911,  0.002700806,  0.002487183,
     0.002227783,  0.001937866,  0.001617432,  0.001266479,
     0.000869751,  0.000442505, -0.000030518, -0.000549316,
    -0.001098633, -0.001693726, -0.002334595, -0.003005981,
    -0.003723145, -0.004486084, -0.005294800, -0.006118774,
    -0.007003784, -0.007919312, -0.008865356, -0.009841919,
    -0.010848999, -0.011886597, -0.012939453, -0.014022827,
    -0.015121460, -0.016235352, -0.017349243, -0.018463135,
    -0.019577026, -0.020690918, -0.021789551, -0.022857666,
    -0.023910522, -0.024932861, -0.025909424, -0.026840210,
    -0.027725220, -0.028533936, -0.029281616, -0.029937744,
    -0.030532837, -0.031005859, -0.031387329, -0.031661987,
    -0.031814575, -0.031845093, -0.031738281, -0.031478882,
     0.031082153,  0.030517578,  0.029785156,  0.028884888,
     0.027801514,  0.026535034,  0.025085449,  0.023422241,
     0.021575928,  0.019531250,  0.017257690,  0.014801025,
     0.012115479,  0.009231567,  0.006134033,  0.002822876,
    -0.000686646, -0.004394531, -0.008316040, -0.012420654,
    -0.016708374, -0.021179199, -0.025817871, -0.030609131,
    -0.035552979, -0.040634155, -0.045837402, -0.051132202,
    -0.056533813, -0.061996460, -0.067520142, -0.073059082,
    -0.078628540, -0.084182739, -0.089706421, -0.095169067,
    -0.100540161, -0.105819702, -0.110946655, -0.115921021,
    -0.120697021, -0.125259399, -0.129562378, -0.133590698,
    -0.137298584, -0.140670776, -0.143676758, -0.146255493,
    -0.148422241, -0.150115967, -0.151306152, -0.151962280,
    -0.152069092, -0.151596069, -0.150497437, -0.148773193,
    -0.146362305, -0.143264771, -0.139450073, -0.134887695,
    -0.129577637, -0.123474121, -0.116577148, -0.108856201,
     0.100311279,  0.090927124,  0.080688477,  0.069595337,
     0.057617187,  0.044784546,  0.031082153,  0.016510010,
     0.001068115, -0.015228271, -0.032379150, -0.050354004,
    -0.069168091, -0.088775635, -0.109161377, -0.130310059,
    -0.152206421, -0.174789429, -0.198059082, -0.221984863,
    -0.246505737, -0.271591187, -0.297210693, -0.323318481,
    -0.349868774, -0.376800537, -0.404083252, -0.431655884,
    -0.459472656, -0.487472534, -0.515609741, -0.543823242,
    -0.572036743, -0.600219727, -0.628295898, -0.656219482,
    -0.683914185, -0.711318970, -0.738372803, -0.765029907,
    -0.791213989, -0.816864014, -0.841949463, -0.866363525,
    -0.890090942, -0.913055420, -0.935195923, -0.956481934,
    -0.976852417, -0.996246338, -1.014617920, -1.031936646,
    -1.048156738, -1.063217163, -1.077117920, -1.089782715,
    -1.101211548, -1.111373901, -1.120223999, -1.127746582,
    -1.133926392, -1.138763428, -1.142211914, -1.144287109,
     1.144989014,  1.144287109,  1.142211914,  1.138763428,
     1.133926392,  1.127746582,  1.120223999,  1.111373901,
     1.101211548,  1.089782715,  1.077117920,  1.063217163,
     1.048156738,  1.031936646,  1.014617920,  0.996246338,
     0.976852417,  0.956481934,  0.935195923,  0.913055420,
     0.890090942,  0.866363525,  0.841949463,  0.816864014,
     0.791213989,  0.765029907,  0.738372803,  0.711318970,
     0.683914185,  0.656219482,  0.628295898,  0.600219727,
     0.572036743,  0.543823242,  0.515609741,  0.487472534,
     0.459472656,  0.431655884,  0.404083252,  0.376800537,
     0.349868774,  0.323318481,  0.297210693,  0.271591187,
     0.246505737,  0.221984863,  0.198059082,  0.174789429,
     0.152206421,  0.130310059,  0.109161377,  0.088775635,
     0.069168091,  0.050354004,  0.032379150,  0.015228271,
    -0.001068115, -0.016510010, -0.031082153, -0.044784546,
    -0.057617187, -0.069595337, -0.080688477, -0.090927124,
     0.100311279,  0.108856201,  0.116577148,  0.123474121,
     0.129577637,  0.134887695,  0.139450073,  0.143264771,
     0.146362305,  0.148773193,  0.150497437,  0.151596069,
     0.152069092,  0.151962280,  0.151306152,  0.150115967,
     0.148422241,  0.146255493,  0.143676758,  0.140670776,
     0.137298584,  0.133590698,  0.129562378,  0.125259399,
     0.120697021,  0.115921021,  0.110946655,  0.105819702,
     0.100540161,  0.095169067,  0.089706421,  0.084182739,
     0.078628540,  0.073059082,  0.067520142,  0.061996460,
     0.056533813,  0.051132202,  0.045837402,  0.040634155,
     0.035552979,  0.030609131,  0.025817871,  0.021179199,
     0.016708374,  0.012420654,  0.008316040,  0.004394531,
     0.000686646, -0.002822876, -0.006134033, -0.009231567,
    -0.012115479, -0.014801025, -0.017257690, -0.019531250,
    -0.021575928, -0.023422241, -0.025085449, -0.026535034,
    -0.027801514, -0.028884888, -0.029785156, -0.030517578,
     0.031082153,  0.031478882,  0.031738281,  0.031845093,
     0.031814575,  0.031661987,  0.031387329,  0.031005859,
     0.030532837,  0.029937744,  0.029281616,  0.028533936,
     0.027725220,  0.026840210,  0.025909424,  0.024932861,
     0.023910522,  0.022857666,  0.021789551,  0.020690918,
     0.019577026,  0.018463135,  0.017349243,  0.016235352,
     0.015121460,  0.014022827,  0.012939453,  0.011886597,
     0.010848999,  0.009841919,  0.008865356,  0.007919312,
     0.007003784,  0.006118774,  0.005294800,  0.004486084,
     0.003723145,  0.003005981,  0.002334595,  0.001693726,
     0.001098633,  0.000549316,  0.000030518, -0.000442505,
    -0.000869751, -0.001266479, -0.001617432, -0.001937866,
    -0.002227783, -0.002487183, -0.002700806, -0.002883911,
    -0.003051758, -0.003173828, -0.003280640, -0.003372192,
    -0.003417969, -0.003463745, -0.003479004, -0.003479004,
    -0.003463745, -0.003433228, -0.003387451, -0.003326416,
     0.003250122,  0.003173828,  0.003082275,  0.002990723,
     0.002899170,  0.002792358,  0.002685547,  0.002578735,
     0.002456665,  0.002349854,  0.002243042,  0.002120972,
     0.002014160,  0.001907349,  0.001785278,  0.001693726,
     0.001586914,  0.001480103,  0.001388550,  0.001296997,
     0.001205444,  0.001113892,  0.001037598,  0.000961304,
     0.000885010,  0.000808716,  0.000747681,  0.000686646,
     0.000625610,  0.000579834,  0.000534058,  0.000473022,
     0.000442505,  0.000396729,  0.000366211,  0.000320435,
     0.000289917,  0.000259399,  0.000244141,  0.000213623,
     0.000198364,  0.000167847,  0.000152588,  0.000137329,
     0.000122070,  0.000106812,  0.000106812,  0.000091553,
     0.000076294,  0.000076294,  0.000061035,  0.000061035,
     0.000045776,  0.000045776,  0.000030518,  0.000030518,
     0.000030518,  0.000030518,  0.000015259,  0.000015259,
     0.000015259,  0.000015259,  0.000015259,  0.000015259,
];

lazy_static! {
    static ref SYNTHESIS_D: [Fixed; 512] = {
        let mut table = [Fixed::ZERO; 512];
        for (i, entry) in table.iter_mut().enumerate() {
            *entry = Fixed::from_f64(SYNTHESIS_D_F64[i]);
        }
        table
    };

    /// Direct 32-point DCT-II coefficient matrix, `DCT32[i][k] = cos(pi/32 *
    /// (k + 0.5) * i)`, computing the same transform as a fully-unrolled
    /// Lee recursion would (see module doc comment).
    static ref DCT32: [[Fixed; 32]; 32] = {
        let mut m = [[Fixed::ZERO; 32]; 32];
        for i in 0..32 {
            for k in 0..32 {
                let angle = std::f64::consts::PI / 32.0 * (k as f64 + 0.5) * (i as f64);
                m[i][k] = Fixed::from_f64(angle.cos());
            }
        }
        m
    };
}

/// Selects the synthesis filter's internal accumulation precision, spec.md
/// §4.8 "SSO (Subband Synthesis Optimization)": the reference decoder can
/// trade the full 64-bit multiply-accumulate for a cheaper shift-based
/// approximation when built with `-DSSO`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SynthAccuracy {
    /// Accumulate all 16 terms as full 64-bit products, scaling to Q4.28
    /// only once at the end (spec.md §4.1's multiply-accumulate contract).
    #[default]
    Full,
    /// Scale each term immediately via [`MulMode::Approx`] and accumulate in
    /// Q4.28, trading precision for three fewer shifts per output sample.
    Sso,
}

/// Per-channel persistent state of the polyphase synthesis filter: a
/// 16-slot, 64-sample-wide rotating history (FIFO), indexed through
/// `v_front`.
pub struct SynthesisState {
    v_vec: [[Fixed; 64]; 16],
    v_front: usize,
}

impl Default for SynthesisState {
    fn default() -> Self {
        SynthesisState { v_vec: [[Fixed::ZERO; 64]; 16], v_front: 0 }
    }
}

impl SynthesisState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Zeroes all filter history, per spec.md §7's muting concealment
    /// policy (muting a channel must not leak stale history into the next
    /// good frame's overlap-add).
    pub fn mute(&mut self) {
        *self = Self::default();
    }
}

/// Computes the 32-point DCT-II of `x`, accumulating each output term as a
/// full 64-bit product sum and scaling once per [`Fixed::scale64`].
fn dct32(x: &[Fixed; 32], mode: MulMode) -> [Fixed; 32] {
    let mut y = [Fixed::ZERO; 32];
    for (i, out) in y.iter_mut().enumerate() {
        let mut acc: i64 = 0;
        for k in 0..32 {
            acc += i64::from(x[k].raw()) * i64::from(DCT32[i][k].raw());
        }
        *out = Fixed::scale64(acc, mode);
    }
    y
}

/// Transforms `rows.len()` rows of 32 subband samples each into
/// `32 * rows.len()` PCM samples, written to `out`.
///
/// `mode` controls the DCT-32's own multiply-accumulate scaling; `accuracy`
/// controls the final 16-term windowed sum.
pub fn synthesize(
    state: &mut SynthesisState,
    rows: &[[Fixed; 32]],
    out: &mut [Fixed],
    mode: MulMode,
    accuracy: SynthAccuracy,
) {
    assert_eq!(out.len(), 32 * rows.len());

    for (b, row) in rows.iter().enumerate() {
        let d_vec = dct32(row, mode);

        let v_vec = &mut state.v_vec[state.v_front];

        for (d, s) in v_vec[48 - 15..48].iter_mut().rev().zip(&d_vec[1..16]) {
            *d = -*s;
        }
        for (d, s) in v_vec[48 + 1..48 + 16].iter_mut().zip(&d_vec[1..16]) {
            *d = -*s;
        }
        for (d, s) in v_vec[16 + 1..16 + 16].iter_mut().rev().zip(&d_vec[17..32]) {
            *d = -*s;
        }
        for (d, s) in v_vec[1..16].iter_mut().zip(&d_vec[17..32]) {
            *d = *s;
        }

        v_vec[0] = d_vec[16];
        v_vec[32] = -d_vec[16];
        v_vec[48] = -d_vec[0];
        v_vec[16] = Fixed::ZERO;

        let mut o_vec = [Fixed::ZERO; 32];

        match accuracy {
            SynthAccuracy::Full => {
                let mut acc = [0i64; 32];
                for j in 0..8 {
                    let v_start = state.v_front + (j << 1);
                    let v0 = &state.v_vec[(v_start) & 0xf][0..32];
                    let v1 = &state.v_vec[(v_start + 1) & 0xf][32..64];
                    let k = j << 6;

                    for i in 0..32 {
                        acc[i] += i64::from(v0[i].raw()) * i64::from(SYNTHESIS_D[k + i].raw());
                        acc[i] += i64::from(v1[i].raw()) * i64::from(SYNTHESIS_D[k + i + 32].raw());
                    }
                }
                for i in 0..32 {
                    o_vec[i] = Fixed::scale64(acc[i], mode);
                }
            }
            SynthAccuracy::Sso => {
                for j in 0..8 {
                    let v_start = state.v_front + (j << 1);
                    let v0 = &state.v_vec[(v_start) & 0xf][0..32];
                    let v1 = &state.v_vec[(v_start + 1) & 0xf][32..64];
                    let k = j << 6;

                    for i in 0..32 {
                        o_vec[i] = o_vec[i] + v0[i].mul_with_mode(SYNTHESIS_D[k + i], MulMode::Approx);
                        o_vec[i] =
                            o_vec[i] + v1[i].mul_with_mode(SYNTHESIS_D[k + i + 32], MulMode::Approx);
                    }
                }
            }
        }

        let offset = b << 5;
        for (o, s) in out[offset..offset + 32].iter_mut().zip(&o_vec) {
            *o = (*s).max(Fixed::from_raw(-(1 << crate::fixed::FRACBITS))).min(Fixed::ONE);
        }

        state.v_front = (state.v_front + 15) & 0xf;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dct32_of_impulse_is_constant_cosine_column() {
        let mut x = [Fixed::ZERO; 32];
        x[0] = Fixed::ONE;
        let y = dct32(&x, MulMode::Full);
        // DCT-II of a unit impulse at k=0 is cos(0) = 1 for every output row.
        for v in y.iter() {
            assert!((v.to_f64() - 1.0).abs() < 1e-3);
        }
    }

    #[test]
    fn synthesize_zero_input_yields_zero_output_and_does_not_panic() {
        let mut state = SynthesisState::new();
        let rows = [[Fixed::ZERO; 32]; 18];
        let mut out = [Fixed::ZERO; 32 * 18];
        synthesize(&mut state, &rows, &mut out, MulMode::Full, SynthAccuracy::Full);
        assert!(out.iter().all(|s| *s == Fixed::ZERO));
    }

    #[test]
    fn mute_resets_history() {
        let mut state = SynthesisState::new();
        state.v_vec[3][10] = Fixed::ONE;
        state.v_front = 5;
        state.mute();
        assert_eq!(state.v_front, 0);
        assert!(state.v_vec.iter().all(|slot| slot.iter().all(|s| *s == Fixed::ZERO)));
    }
}
