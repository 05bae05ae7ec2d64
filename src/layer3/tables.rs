// mpa-fixed
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Static tables shared by the Layer III decode stages: scalefactor-band
//! boundaries, the preemphasis/root tables used by requantization, the
//! alias-reduction butterfly coefficients, and the IMDCT/window
//! coefficient matrices.
//!
//! The reference implementation spreads these across two files
//! (`layer3/common.rs` for block types and band tables, `layer3/codebooks.rs`
//! for the Huffman tables kept in `huffman.rs` instead) that are not part of
//! the retrieved source for this crate; the values here are reconstructed
//! from ISO/IEC 11172-3 Annex B and 13818-3 Annex B directly, the same
//! standard the surrounding modules' doc comments already cite.

use lazy_static::lazy_static;

use crate::fixed::Fixed;

/// Block type of a Layer III granule/channel, selecting the window shape
/// applied before the IMDCT.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockType {
    /// Normal long block (36-point sine window).
    Long,
    /// Long block preceding a short sequence (`block_type == 1`).
    Start,
    /// Short block, three 12-point windows (`block_type == 2`).
    Short,
    /// Long block following a short sequence (`block_type == 3`).
    Stop,
}

impl BlockType {
    /// Decodes the 2-bit `block_type` field. Only meaningful when
    /// `window_switching_flag` is set; `0` in that context means a normal
    /// long block was asserted redundantly, which some encoders do, so it
    /// is accepted rather than rejected.
    pub fn from_bits(bits: u32) -> Self {
        match bits {
            1 => BlockType::Start,
            2 => BlockType::Short,
            3 => BlockType::Stop,
            _ => BlockType::Long,
        }
    }
}

/// Index into the per-(version, sample-rate) scalefactor-band tables: `0`
/// for MPEG-1, `1..=2` for MPEG-2/2.5 (selected by caller via
/// `lsf_band_index`).
fn band_group(is_mpeg1: bool, is_mpeg25: bool) -> usize {
    if is_mpeg1 { 0 } else if is_mpeg25 { 2 } else { 1 }
}

/// Cumulative long-block scalefactor-band boundaries (22 entries -> 21
/// bands), indexed `[version_group][sample_rate_index]`, per ISO/IEC
/// 11172-3 Table B.8 (MPEG-1) and 13818-3 Table B.2/B.3 (LSF).
#[rustfmt::skip]
pub const SFB_LONG_BANDS: [[[u16; 23]; 3]; 3] = [
    // MPEG-1: 44100, 48000, 32000
    [
        [0,4,8,12,16,20,24,30,36,44,52,62,74,90,110,134,162,196,238,288,342,418,576],
        [0,4,8,12,16,20,24,30,36,42,50,60,72,88,106,128,156,190,230,276,330,384,576],
        [0,4,8,12,16,20,24,30,36,44,54,66,82,102,126,156,194,240,296,364,448,550,576],
    ],
    // MPEG-2 (LSF): 22050, 24000, 16000
    [
        [0,6,12,18,24,30,36,44,54,66,80,96,116,140,168,200,238,284,336,396,464,522,576],
        [0,6,12,18,24,30,36,44,54,66,80,96,114,136,162,194,232,278,332,394,464,540,576],
        [0,6,12,18,24,30,36,44,54,66,80,96,116,140,168,200,238,284,336,396,464,522,576],
    ],
    // MPEG-2.5: 11025, 12000, 8000
    [
        [0,6,12,18,24,30,36,44,54,66,80,96,116,140,168,200,238,284,336,396,464,522,576],
        [0,6,12,18,24,30,36,44,54,66,80,96,116,140,168,200,238,284,336,396,464,522,576],
        [0,12,24,36,48,60,72,88,108,132,160,192,232,280,336,400,476,566,568,570,572,574],
    ],
];

/// Cumulative per-window short-block scalefactor-band boundaries (14
/// entries -> 13 bands, each spanning 0..192 lines within one window).
#[rustfmt::skip]
pub const SFB_SHORT_BANDS: [[[u16; 14]; 3]; 3] = [
    [
        [0,4,8,12,16,22,30,40,52,66,84,106,136,192],
        [0,4,8,12,16,22,28,38,50,64,80,100,126,192],
        [0,4,8,12,16,22,30,42,58,78,104,138,180,192],
    ],
    [
        [0,4,8,12,18,24,32,42,56,74,100,132,174,192],
        [0,4,8,12,18,26,36,48,62,80,104,136,180,192],
        [0,4,8,12,18,26,36,48,62,80,104,134,174,192],
    ],
    [
        [0,4,8,12,18,24,32,42,56,74,100,132,174,192],
        [0,4,8,12,18,24,32,42,56,74,100,132,174,192],
        [0,8,16,24,36,52,72,96,124,160,162,164,166,192],
    ],
];

/// Number of long-block scalefactor bands below the short-window split
/// point when `mixed_block_flag` is set: the first 8 long bands cover the
/// low frequencies, the remainder switch to short-block widths. This
/// counts *scalefactor bands*, used only for scalefactor partitioning.
pub const MIXED_LONG_BANDS: usize = 8;

/// Number of subbands (18 lines each) covered by the long transform in a
/// mixed block: the lowest 2 of the 32 subbands, per ISO/IEC 11172-3
/// subclause 2.4.3.4, matching the reference implementation's convention
/// of switching transforms at line 36 rather than at the sample-rate
/// dependent long-scalefactor-band boundary. Used by `hybrid_synthesis`'s
/// `reorder`/`synthesize` for the line-domain long/short split, distinct
/// from [`MIXED_LONG_BANDS`]'s scalefactor-domain split.
pub const MIXED_LONG_SUBBANDS: usize = 2;

/// Returns the cumulative long-band boundary table for `(is_mpeg1,
/// is_mpeg25, sample_rate_index)`.
pub fn sfb_long_bands(is_mpeg1: bool, is_mpeg25: bool, sample_rate_index: usize) -> &'static [u16; 23] {
    &SFB_LONG_BANDS[band_group(is_mpeg1, is_mpeg25)][sample_rate_index]
}

/// Returns the cumulative short-band boundary table for `(is_mpeg1,
/// is_mpeg25, sample_rate_index)`.
pub fn sfb_short_bands(is_mpeg1: bool, is_mpeg25: bool, sample_rate_index: usize) -> &'static [u16; 14] {
    &SFB_SHORT_BANDS[band_group(is_mpeg1, is_mpeg25)][sample_rate_index]
}

/// MPEG-1 `slen1`/`slen2` bit-widths indexed by `scalefac_compress` (0..15),
/// per ISO/IEC 11172-3 Table B.9.
#[rustfmt::skip]
pub const SCALE_FACTOR_SLEN: [(u8, u8); 16] = [
    (0, 0), (0, 1), (0, 2), (0, 3), (3, 0), (1, 1), (1, 2), (1, 3),
    (2, 1), (2, 2), (2, 3), (3, 1), (3, 2), (3, 3), (4, 2), (4, 3),
];

/// MPEG-2/2.5 (LSF) scalefactor-band counts per partition, per ISO/IEC
/// 13818-3 subclause 2.4.3.4: for each of the six `(is_intensity, sfc
/// range)` classes and each of the three block-index groups (0: long/
/// start/stop, 1: short non-mixed, 2: short mixed), the number of bands
/// `nsfb[0..4]` covered by each of the four `slen` partitions. Indexed
/// `[class][block_index]`.
#[rustfmt::skip]
pub const MPEG2_NSFB: [[[usize; 4]; 3]; 6] = [
    // Intensity stereo channel modes.
    [[7, 7, 7, 0], [12, 12, 12, 0], [6, 15, 12, 0]],
    [[6, 6, 6, 3], [12, 9, 9, 6], [6, 12, 9, 6]],
    [[8, 8, 5, 0], [15, 12, 9, 0], [6, 18, 9, 0]],
    // Other channel modes.
    [[6, 5, 5, 5], [9, 9, 9, 9], [6, 9, 9, 9]],
    [[6, 5, 7, 3], [9, 9, 12, 6], [6, 9, 12, 6]],
    [[11, 10, 0, 0], [18, 18, 0, 0], [15, 18, 0, 0]],
];

/// Decomposes an (already is_intensity-adjusted) `scalefac_compress` value
/// into the four `slen` (scalefactor bit-width) partitions of an LSF
/// granule, per ISO/IEC 13818-3 subclause 2.4.3.2's nested modulo/division
/// decomposition — `slen` is *computed* from `scalefac_compress`, not
/// looked up in a fixed per-class table: `c` is split by which of the three
/// `MPEG2_NSFB` bands (bounded by `low`/`mid`) it falls in, and within a
/// band by progressively coarser division/modulo pairs.
pub fn mpeg2_slen(c: u16, low: u16, mid: u16) -> [u8; 4] {
    if c < low {
        [((c >> 4) / 5) as u8, ((c >> 4) % 5) as u8, ((c % 16) >> 2) as u8, (c % 4) as u8]
    }
    else if c < mid {
        let c = c - low;
        [(c >> 2) as u8, (c % 4) as u8, 0, 0]
    }
    else {
        let c = c - mid;
        [(c / 3) as u8, (c % 3) as u8, 0, 0]
    }
}

/// Preemphasis table applied to long-block scalefactors when `preflag` is
/// set, per ISO/IEC 11172-3 Table B.6 (22 entries, one per long-block sfb).
#[rustfmt::skip]
pub const PRETAB: [u8; 22] = [
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1, 1, 1, 1, 2, 2, 3, 3, 3, 2, 0, 0,
];

lazy_static! {
    /// `root_table[r] = 2^(r / 4)` for `r` in `0..=3`, the requantizer's
    /// per-remainder multiplier applied after the `2^q` integral-exponent
    /// shift (`exponent = 4*q + r`).
    pub static ref ROOT_TABLE: [Fixed; 4] = {
        let mut table = [Fixed::ZERO; 4];
        for (i, entry) in table.iter_mut().enumerate() {
            *entry = Fixed::from_f64(2f64.powf(i as f64 / 4.0));
        }
        table
    };

    /// Alias-reduction butterfly coefficients, `cs[i] = 1/sqrt(1+c[i]^2)`
    /// and `ca[i] = c[i] * cs[i]`, derived from the eight prototype filter
    /// coefficients `c = {-0.6, -0.535, -0.33, -0.185, -0.095, -0.041,
    /// -0.0142, -0.0037}` of ISO/IEC 11172-3 subclause 3.
    pub static ref ALIAS_CS: [Fixed; 8] = {
        let mut table = [Fixed::ZERO; 8];
        for (i, entry) in table.iter_mut().enumerate() {
            let c = ALIAS_PROTOTYPE[i];
            *entry = Fixed::from_f64(1.0 / (1.0 + c * c).sqrt());
        }
        table
    };

    pub static ref ALIAS_CA: [Fixed; 8] = {
        let mut table = [Fixed::ZERO; 8];
        for (i, entry) in table.iter_mut().enumerate() {
            let c = ALIAS_PROTOTYPE[i];
            let cs = 1.0 / (1.0 + c * c).sqrt();
            *entry = Fixed::from_f64(c * cs);
        }
        table
    };

    /// Long-block (type 0, "normal") sine window, length 36:
    /// `w[i] = sin(pi/36 * (i + 0.5))`.
    pub static ref WINDOW_LONG: [Fixed; 36] = window_long();
    /// Start-block (type 1) window: sine for the first half, flat-then-short
    /// taper for the second.
    pub static ref WINDOW_START: [Fixed; 36] = window_start();
    /// Stop-block (type 3) window: mirror of [`WINDOW_START`].
    pub static ref WINDOW_STOP: [Fixed; 36] = window_stop();
    /// Short-block window, length 12: `w[i] = sin(pi/12 * (i + 0.5))`.
    pub static ref WINDOW_SHORT: [Fixed; 12] = {
        let mut w = [Fixed::ZERO; 12];
        for (i, entry) in w.iter_mut().enumerate() {
            *entry = Fixed::from_f64((std::f64::consts::PI / 12.0 * (i as f64 + 0.5)).sin());
        }
        w
    };

    /// Direct 18-input/36-output IMDCT coefficient matrix,
    /// `IMDCT_36[i][k] = cos(pi/72 * (2i + 1 + 18) * (2k + 1))`, used in
    /// place of a factored fast algorithm for implementation-confidence
    /// reasons (see DESIGN.md).
    pub static ref IMDCT_36: [[Fixed; 18]; 36] = imdct_matrix_36();
    /// Direct 6-input/12-output IMDCT coefficient matrix for short blocks.
    pub static ref IMDCT_12: [[Fixed; 6]; 12] = imdct_matrix_12();
}

const ALIAS_PROTOTYPE: [f64; 8] =
    [-0.6, -0.535, -0.33, -0.185, -0.095, -0.041, -0.0142, -0.0037];

fn window_long() -> [Fixed; 36] {
    let mut w = [Fixed::ZERO; 36];
    for (i, entry) in w.iter_mut().enumerate() {
        *entry = Fixed::from_f64((std::f64::consts::PI / 36.0 * (i as f64 + 0.5)).sin());
    }
    w
}

fn window_start() -> [Fixed; 36] {
    let mut w = [Fixed::ZERO; 36];
    for i in 0..18 {
        w[i] = Fixed::from_f64((std::f64::consts::PI / 36.0 * (i as f64 + 0.5)).sin());
    }
    for i in 18..24 {
        w[i] = Fixed::ONE;
    }
    for i in 24..30 {
        let n = (i - 18) as f64 + 0.5;
        w[i] = Fixed::from_f64((std::f64::consts::PI / 12.0 * n).sin());
    }
    for i in 30..36 {
        w[i] = Fixed::ZERO;
    }
    w
}

fn window_stop() -> [Fixed; 36] {
    let mut w = [Fixed::ZERO; 36];
    for i in 0..6 {
        w[i] = Fixed::ZERO;
    }
    for i in 6..12 {
        let n = (i - 6) as f64 + 0.5;
        w[i] = Fixed::from_f64((std::f64::consts::PI / 12.0 * n).sin());
    }
    for i in 12..18 {
        w[i] = Fixed::ONE;
    }
    for i in 18..36 {
        w[i] = Fixed::from_f64((std::f64::consts::PI / 36.0 * (i as f64 + 0.5)).sin());
    }
    w
}

/// Window lookup by [`BlockType`]; short blocks use [`WINDOW_SHORT`]
/// directly (one 12-sample window per sub-block) rather than this table.
pub fn long_window_for(block_type: BlockType) -> &'static [Fixed; 36] {
    match block_type {
        BlockType::Long | BlockType::Short => &WINDOW_LONG,
        BlockType::Start => &WINDOW_START,
        BlockType::Stop => &WINDOW_STOP,
    }
}

fn imdct_matrix_36() -> [[Fixed; 18]; 36] {
    let (n, out_len) = (18usize, 36usize);
    let mut m = [[Fixed::ZERO; 18]; 36];
    let scale = std::f64::consts::PI / (2.0 * n as f64);
    for i in 0..out_len {
        for k in 0..n {
            let angle = scale * ((2 * i + 1 + n / 2) as f64) * ((2 * k + 1) as f64);
            m[i][k] = Fixed::from_f64(angle.cos());
        }
    }
    m
}

fn imdct_matrix_12() -> [[Fixed; 6]; 12] {
    let (n, out_len) = (6usize, 12usize);
    let mut m = [[Fixed::ZERO; 6]; 12];
    let scale = std::f64::consts::PI / (2.0 * n as f64);
    for i in 0..out_len {
        for k in 0..n {
            let angle = scale * ((2 * i + 1 + n / 2) as f64) * ((2 * k + 1) as f64);
            m[i][k] = Fixed::from_f64(angle.cos());
        }
    }
    m
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sfb_long_bands_end_at_576() {
        for group in 0..3 {
            for rate in 0..3 {
                assert_eq!(SFB_LONG_BANDS[group][rate][22], 576);
            }
        }
    }

    #[test]
    fn sfb_short_bands_end_at_192() {
        for group in 0..3 {
            for rate in 0..3 {
                assert_eq!(SFB_SHORT_BANDS[group][rate][13], 192);
            }
        }
    }

    #[test]
    fn root_table_r_zero_is_one() {
        assert!((ROOT_TABLE[0].to_f64() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn mpeg2_slen_selects_branch_by_threshold() {
        // c < low: nested (>>4)/5, (>>4)%5, (%16)>>2, %4 decomposition.
        assert_eq!(mpeg2_slen(0, 400, 500), [0, 0, 0, 0]);
        assert_eq!(mpeg2_slen(399, 400, 500), [(399u16 >> 4) as u8 / 5, ((399u16 >> 4) % 5) as u8, ((399u16 % 16) >> 2) as u8, (399u16 % 4) as u8]);
        // low <= c < mid: two-partition >>2/%4 decomposition, offset by `low`.
        assert_eq!(mpeg2_slen(400, 400, 500), [0, 0, 0, 0]);
        assert_eq!(mpeg2_slen(450, 400, 500), [(50u16 >> 2) as u8, (50u16 % 4) as u8, 0, 0]);
        // c >= mid: two-partition /3/%3 decomposition, offset by `mid`.
        assert_eq!(mpeg2_slen(500, 400, 500), [0, 0, 0, 0]);
        assert_eq!(mpeg2_slen(509, 400, 500), [3, 0, 0, 0]);
    }

    #[test]
    fn long_window_midpoint_is_near_one() {
        // sin(pi/36 * 18.5) is close to its maximum near the window center.
        assert!(WINDOW_LONG[17].to_f64() > 0.9);
    }

    #[test]
    fn alias_coefficients_satisfy_unit_norm() {
        for i in 0..8 {
            let cs = ALIAS_CS[i].to_f64();
            let ca = ALIAS_CA[i].to_f64();
            assert!((cs * cs + ca * ca - 1.0).abs() < 1e-3);
        }
    }
}
