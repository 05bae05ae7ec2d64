// mpa-fixed
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Layer III hybrid synthesis: short-block reorder, alias reduction, the
//! IMDCT with its window and overlap-add, and frequency inversion, applied
//! to one granule/channel's 576 requantized spectral lines before the
//! polyphase synthesis filter.

use crate::fixed::Fixed;
use crate::layer3::tables::{
    long_window_for, BlockType, ALIAS_CA, ALIAS_CS, IMDCT_12, IMDCT_36, MIXED_LONG_SUBBANDS,
    WINDOW_SHORT,
};

/// De-interleaves the three short windows of each short-block scalefactor
/// band back into per-window contiguous order. Only the short-windowed
/// portion of the spectrum is touched; for a mixed block that is lines
/// `[3 * short_band_start(mixed) .. 576)`, for a pure short block the
/// entire `[0..576)` range.
///
/// `short_band_starts` gives, in ascending order, the line index (within
/// the reordered short region) at which each 3-window group begins,
/// terminated by `576`.
pub fn reorder(xr: &mut [Fixed; 576], block_type: BlockType, is_mixed: bool, short_band_starts: &[u16]) {
    if block_type != BlockType::Short {
        return;
    }

    let region_start = if is_mixed { 18 * MIXED_LONG_SUBBANDS as u16 } else { 0 };

    let mut reordered = [Fixed::ZERO; 576];
    let mut i = region_start as usize;

    for w in short_band_starts.windows(2) {
        let (s0, s1) = (w[0] as usize, w[1] as usize);
        if s1 <= s0 || s1 > 192 {
            continue;
        }
        let width = s1 - s0;
        for k in 0..width {
            reordered[i] = xr[s0 + k];
            reordered[i + width] = xr[s0 + k + 192];
            reordered[i + 2 * width] = xr[s0 + k + 384];
            i += 1;
        }
        i += 2 * width;
    }

    xr[region_start as usize..i].copy_from_slice(&reordered[region_start as usize..i]);
}

/// Applies the 8-tap alias-reduction butterfly at each boundary between
/// adjacent subbands, skipping subbands carrying short-block data (which
/// are never alias-reduced).
pub fn antialias(xr: &mut [Fixed; 576], block_type: BlockType, is_mixed: bool) {
    let sb_end = match (block_type, is_mixed) {
        (BlockType::Short, false) => return,
        (BlockType::Short, true) => 2 * 18,
        _ => 32 * 18,
    };

    for sb in (18..sb_end).step_by(18) {
        for i in 0..8 {
            let li = sb - 1 - i;
            let ui = sb + i;
            let lower = xr[li];
            let upper = xr[ui];
            xr[li] = lower * ALIAS_CS[i] - upper * ALIAS_CA[i];
            xr[ui] = upper * ALIAS_CS[i] + lower * ALIAS_CA[i];
        }
    }
}

/// Performs the IMDCT, windowing, and overlap-add for one granule/channel,
/// writing this granule's 18 subband-sample rows (`out[row][sb]`) and
/// updating the carried-forward `overlap[sb][0..18]` state that feeds into
/// the next granule (or next frame)'s overlap-add.
pub fn synthesize(
    xr: &[Fixed; 576],
    block_type: BlockType,
    is_mixed: bool,
    overlap: &mut [[Fixed; 18]; 32],
    out: &mut [[Fixed; 32]; 18],
) {
    let n_long_bands = match (block_type, is_mixed) {
        (BlockType::Short, false) => 0,
        (BlockType::Short, true) => MIXED_LONG_SUBBANDS,
        _ => 32,
    };

    if n_long_bands > 0 {
        let window = long_window_for(block_type);
        for sb in 0..n_long_bands {
            let x: &[Fixed; 18] = xr[18 * sb..18 * sb + 18].try_into().unwrap();
            let mut y = [Fixed::ZERO; 36];
            for (i, row) in IMDCT_36.iter().enumerate() {
                let mut acc = Fixed::ZERO;
                for (k, coeff) in row.iter().enumerate() {
                    acc = acc + x[k] * *coeff;
                }
                y[i] = acc * window[i];
            }
            for i in 0..18 {
                out[i][sb] = y[i] + overlap[sb][i];
                overlap[sb][i] = y[18 + i];
            }
        }
    }

    if n_long_bands < 32 {
        for sb in n_long_bands..32 {
            let x: &[Fixed; 18] = xr[18 * sb..18 * sb + 18].try_into().unwrap();
            let mut tmp = [Fixed::ZERO; 36];

            for w in 0..3 {
                let xw = [x[w], x[3 + w], x[6 + w], x[9 + w], x[12 + w], x[15 + w]];
                let mut y = [Fixed::ZERO; 12];
                for (i, row) in IMDCT_12.iter().enumerate() {
                    let mut acc = Fixed::ZERO;
                    for (k, coeff) in row.iter().enumerate() {
                        acc = acc + xw[k] * *coeff;
                    }
                    y[i] = acc * WINDOW_SHORT[i];
                }
                for i in 0..12 {
                    tmp[6 + 6 * w + i] = tmp[6 + 6 * w + i] + y[i];
                }
            }

            for i in 0..18 {
                out[i][sb] = tmp[i] + overlap[sb][i];
                overlap[sb][i] = tmp[18 + i];
            }
        }
    }
}

/// Negates every odd-indexed time sample of every odd subband within one
/// granule's 18 rows, compensating for the synthesis filter's own
/// frequency mirroring.
pub fn frequency_inversion(out: &mut [[Fixed; 32]; 18]) {
    for row in (1..18).step_by(2) {
        for sb in (1..32).step_by(2) {
            out[row][sb] = -out[row][sb];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reorder_is_noop_for_long_blocks() {
        let mut xr = [Fixed::from_f64(1.0); 576];
        let before = xr;
        reorder(&mut xr, BlockType::Long, false, &[]);
        assert_eq!(xr, before);
    }

    #[test]
    fn antialias_noop_on_pure_short_block() {
        let mut xr = [Fixed::from_f64(1.0); 576];
        let before = xr;
        antialias(&mut xr, BlockType::Short, false);
        assert_eq!(xr, before);
    }

    #[test]
    fn synthesize_long_block_produces_nonpanicking_output() {
        let xr = [Fixed::ZERO; 576];
        let mut overlap = [[Fixed::ZERO; 18]; 32];
        let mut out = [[Fixed::ZERO; 32]; 18];
        synthesize(&xr, BlockType::Long, false, &mut overlap, &mut out);
        assert_eq!(out[0][0], Fixed::ZERO);
    }

    #[test]
    fn frequency_inversion_flips_odd_row_odd_subband() {
        let mut out = [[Fixed::from_f64(1.0); 32]; 18];
        frequency_inversion(&mut out);
        assert_eq!(out[1][1].to_f64(), -1.0);
        assert_eq!(out[1][0].to_f64(), 1.0);
        assert_eq!(out[0][1].to_f64(), 1.0);
    }
}
