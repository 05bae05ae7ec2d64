// mpa-fixed
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Layer II decoding: 12 groups of 3 sample rows x 32 subbands, a
//! bit-allocation table selected by (bitrate-per-channel, sample-rate), and
//! scalefactor-selection-information (scfsi) sharing across row groups
//! (spec.md §4.6).
//!
//! Grounded on the reference implementation's `mad_layer_II` and its
//! `bitalloc_table`/`qc_table` (`layer12.c`). `qc_table`'s C/D constants are
//! not present in the retrieved corpus (sourced from an external
//! `qc_table.dat` in the original); they are reconstructed here from the
//! ISO/IEC 11172-3 quantizer formula `s'' = (2*idx - (nlevels-1)) /
//! (nlevels-1)`, the same symmetric scheme Layer I's `LINEAR_FACTOR` and
//! `dequantize` already implement for the power-of-two-minus-one case.

use lazy_static::lazy_static;

use crate::bit::{crc16, BitPtr};
use crate::common::{ChannelMode, Layer, ModeExtension};
use crate::error::{decode_error, MadError, Result};
use crate::fixed::Fixed;
use crate::frame::Frame;
use crate::header::FrameHeader;
use crate::layer12::{dequantize, SCALEFACTORS};

/// `(nbal, classes[1..=2^nbal-1])`. `classes[0]` is unused padding; code
/// `1` indexes `classes[1]`, etc. (code `0` always means "unallocated" and
/// is handled by the caller before this table is consulted).
type AllocRow = (u8, [u8; 16]);

#[rustfmt::skip]
const BITALLOC_TABLES: [[AllocRow; 32]; 4] = [
    // Table 0: used at 56/64/80 kbps/channel (any rate, 48kHz default), sblimit = 27.
    [
        (4, [0,0,2,4,5,6,7,8,9,10,11,12,13,14,15,16]),
        (4, [0,0,2,4,5,6,7,8,9,10,11,12,13,14,15,16]),
        (4, [0,0,2,4,5,6,7,8,9,10,11,12,13,14,15,16]),
        (4, [0,0,1,2,3,4,5,6,7,8,9,10,11,12,13,16]),
        (4, [0,0,1,2,3,4,5,6,7,8,9,10,11,12,13,16]),
        (4, [0,0,1,2,3,4,5,6,7,8,9,10,11,12,13,16]),
        (4, [0,0,1,2,3,4,5,6,7,8,9,10,11,12,13,16]),
        (4, [0,0,1,2,3,4,5,6,7,8,9,10,11,12,13,16]),
        (4, [0,0,1,2,3,4,5,6,7,8,9,10,11,12,13,16]),
        (4, [0,0,1,2,3,4,5,6,7,8,9,10,11,12,13,16]),
        (4, [0,0,1,2,3,4,5,6,7,8,9,10,11,12,13,16]),
        (3, [0,0,1,2,3,4,5,16,0,0,0,0,0,0,0,0]),
        (3, [0,0,1,2,3,4,5,16,0,0,0,0,0,0,0,0]),
        (3, [0,0,1,2,3,4,5,16,0,0,0,0,0,0,0,0]),
        (3, [0,0,1,2,3,4,5,16,0,0,0,0,0,0,0,0]),
        (3, [0,0,1,2,3,4,5,16,0,0,0,0,0,0,0,0]),
        (3, [0,0,1,2,3,4,5,16,0,0,0,0,0,0,0,0]),
        (3, [0,0,1,2,3,4,5,16,0,0,0,0,0,0,0,0]),
        (3, [0,0,1,2,3,4,5,16,0,0,0,0,0,0,0,0]),
        (3, [0,0,1,2,3,4,5,16,0,0,0,0,0,0,0,0]),
        (3, [0,0,1,2,3,4,5,16,0,0,0,0,0,0,0,0]),
        (3, [0,0,1,2,3,4,5,16,0,0,0,0,0,0,0,0]),
        (3, [0,0,1,2,3,4,5,16,0,0,0,0,0,0,0,0]),
        (2, [0,0,1,16,0,0,0,0,0,0,0,0,0,0,0,0]),
        (2, [0,0,1,16,0,0,0,0,0,0,0,0,0,0,0,0]),
        (2, [0,0,1,16,0,0,0,0,0,0,0,0,0,0,0,0]),
        (2, [0,0,1,16,0,0,0,0,0,0,0,0,0,0,0,0]),
        (0, [0;16]), (0, [0;16]), (0, [0;16]), (0, [0;16]), (0, [0;16]),
    ],
    // Table 1: used at 32/48 kbps/channel (32/44.1/48kHz), sblimit = 30.
    [
        (4, [0,0,2,4,5,6,7,8,9,10,11,12,13,14,15,16]),
        (4, [0,0,2,4,5,6,7,8,9,10,11,12,13,14,15,16]),
        (4, [0,0,2,4,5,6,7,8,9,10,11,12,13,14,15,16]),
        (4, [0,0,1,2,3,4,5,6,7,8,9,10,11,12,13,16]),
        (4, [0,0,1,2,3,4,5,6,7,8,9,10,11,12,13,16]),
        (4, [0,0,1,2,3,4,5,6,7,8,9,10,11,12,13,16]),
        (4, [0,0,1,2,3,4,5,6,7,8,9,10,11,12,13,16]),
        (4, [0,0,1,2,3,4,5,6,7,8,9,10,11,12,13,16]),
        (4, [0,0,1,2,3,4,5,6,7,8,9,10,11,12,13,16]),
        (4, [0,0,1,2,3,4,5,6,7,8,9,10,11,12,13,16]),
        (4, [0,0,1,2,3,4,5,6,7,8,9,10,11,12,13,16]),
        (3, [0,0,1,2,3,4,5,16,0,0,0,0,0,0,0,0]),
        (3, [0,0,1,2,3,4,5,16,0,0,0,0,0,0,0,0]),
        (3, [0,0,1,2,3,4,5,16,0,0,0,0,0,0,0,0]),
        (3, [0,0,1,2,3,4,5,16,0,0,0,0,0,0,0,0]),
        (3, [0,0,1,2,3,4,5,16,0,0,0,0,0,0,0,0]),
        (3, [0,0,1,2,3,4,5,16,0,0,0,0,0,0,0,0]),
        (3, [0,0,1,2,3,4,5,16,0,0,0,0,0,0,0,0]),
        (3, [0,0,1,2,3,4,5,16,0,0,0,0,0,0,0,0]),
        (3, [0,0,1,2,3,4,5,16,0,0,0,0,0,0,0,0]),
        (3, [0,0,1,2,3,4,5,16,0,0,0,0,0,0,0,0]),
        (3, [0,0,1,2,3,4,5,16,0,0,0,0,0,0,0,0]),
        (3, [0,0,1,2,3,4,5,16,0,0,0,0,0,0,0,0]),
        (2, [0,0,1,16,0,0,0,0,0,0,0,0,0,0,0,0]),
        (2, [0,0,1,16,0,0,0,0,0,0,0,0,0,0,0,0]),
        (2, [0,0,1,16,0,0,0,0,0,0,0,0,0,0,0,0]),
        (2, [0,0,1,16,0,0,0,0,0,0,0,0,0,0,0,0]),
        (2, [0,0,1,16,0,0,0,0,0,0,0,0,0,0,0,0]),
        (2, [0,0,1,16,0,0,0,0,0,0,0,0,0,0,0,0]),
        (2, [0,0,1,16,0,0,0,0,0,0,0,0,0,0,0,0]),
        (0, [0;16]), (0, [0;16]),
    ],
    // Table 2: 32/48/56/64/80 kbps/channel at 32kHz or 16/24/8/12kHz LSF, sblimit=8.
    [
        (4, [0,0,1,3,4,5,6,7,8,9,10,11,12,13,14,15]),
        (4, [0,0,1,3,4,5,6,7,8,9,10,11,12,13,14,15]),
        (3, [0,0,1,3,4,5,6,7,0,0,0,0,0,0,0,0]),
        (3, [0,0,1,3,4,5,6,7,0,0,0,0,0,0,0,0]),
        (3, [0,0,1,3,4,5,6,7,0,0,0,0,0,0,0,0]),
        (3, [0,0,1,3,4,5,6,7,0,0,0,0,0,0,0,0]),
        (3, [0,0,1,3,4,5,6,7,0,0,0,0,0,0,0,0]),
        (3, [0,0,1,3,4,5,6,7,0,0,0,0,0,0,0,0]),
        (0, [0;16]), (0, [0;16]), (0, [0;16]), (0, [0;16]), (0, [0;16]),
        (0, [0;16]), (0, [0;16]), (0, [0;16]), (0, [0;16]), (0, [0;16]),
        (0, [0;16]), (0, [0;16]), (0, [0;16]), (0, [0;16]), (0, [0;16]),
        (0, [0;16]), (0, [0;16]), (0, [0;16]), (0, [0;16]), (0, [0;16]),
    ],
    // Table 3: 96/112/128/160/192 kbps/channel at 32kHz or higher-rate LSF, sblimit=12.
    [
        (4, [0,0,1,3,4,5,6,7,8,9,10,11,12,13,14,15]),
        (4, [0,0,1,3,4,5,6,7,8,9,10,11,12,13,14,15]),
        (3, [0,0,1,3,4,5,6,7,0,0,0,0,0,0,0,0]),
        (3, [0,0,1,3,4,5,6,7,0,0,0,0,0,0,0,0]),
        (3, [0,0,1,3,4,5,6,7,0,0,0,0,0,0,0,0]),
        (3, [0,0,1,3,4,5,6,7,0,0,0,0,0,0,0,0]),
        (3, [0,0,1,3,4,5,6,7,0,0,0,0,0,0,0,0]),
        (3, [0,0,1,3,4,5,6,7,0,0,0,0,0,0,0,0]),
        (3, [0,0,1,3,4,5,6,7,0,0,0,0,0,0,0,0]),
        (3, [0,0,1,3,4,5,6,7,0,0,0,0,0,0,0,0]),
        (3, [0,0,1,3,4,5,6,7,0,0,0,0,0,0,0,0]),
        (3, [0,0,1,3,4,5,6,7,0,0,0,0,0,0,0,0]),
        (0, [0;16]), (0, [0;16]), (0, [0;16]), (0, [0;16]), (0, [0;16]),
        (0, [0;16]), (0, [0;16]), (0, [0;16]), (0, [0;16]), (0, [0;16]),
        (0, [0;16]), (0, [0;16]), (0, [0;16]), (0, [0;16]), (0, [0;16]),
        (0, [0;16]), (0, [0;16]), (0, [0;16]), (0, [0;16]), (0, [0;16]),
    ],
];

/// Sublimit (number of coded subbands) for each of the four tables above,
/// matching the `sblimit` values embedded in the reference switch
/// statement.
const SBLIMIT: [usize; 4] = [27, 30, 8, 12];

/// One quantization class: `nlevels` distinct quantized values, whether
/// they are packed 3-at-a-time into one codeword (`group`), and the raw
/// bit width of the codeword (`bits`).
#[derive(Clone, Copy)]
struct QuantClass {
    nlevels: u32,
    group: bool,
    bits: u32,
}

/// The 17-entry quantization class table, ISO/IEC 11172-3 Table 3-B.1
/// (values indexed exactly as the reference `bitalloc_table` entries
/// select them).
const QC_TABLE: [QuantClass; 17] = [
    QuantClass { nlevels: 3, group: true, bits: 5 },
    QuantClass { nlevels: 5, group: true, bits: 7 },
    QuantClass { nlevels: 7, group: false, bits: 3 },
    QuantClass { nlevels: 9, group: true, bits: 10 },
    QuantClass { nlevels: 15, group: false, bits: 4 },
    QuantClass { nlevels: 31, group: false, bits: 5 },
    QuantClass { nlevels: 63, group: false, bits: 6 },
    QuantClass { nlevels: 127, group: false, bits: 7 },
    QuantClass { nlevels: 255, group: false, bits: 8 },
    QuantClass { nlevels: 511, group: false, bits: 9 },
    QuantClass { nlevels: 1023, group: false, bits: 10 },
    QuantClass { nlevels: 2047, group: false, bits: 11 },
    QuantClass { nlevels: 4095, group: false, bits: 12 },
    QuantClass { nlevels: 8191, group: false, bits: 13 },
    QuantClass { nlevels: 16383, group: false, bits: 14 },
    QuantClass { nlevels: 32767, group: false, bits: 15 },
    QuantClass { nlevels: 65535, group: false, bits: 16 },
];

lazy_static! {
    /// Per-digit dequantization tables for the three *grouped* classes
    /// (`nlevels` 3, 5, 9), where `digit` in `0..nlevels` maps to
    /// `(2*digit - (nlevels-1)) / (nlevels-1)`, the symmetric ISO
    /// quantizer formula.
    static ref GROUPED_LEVELS: [Vec<Fixed>; 17] = {
        let mut tables: [Vec<Fixed>; 17] = Default::default();
        for (class_idx, class) in QC_TABLE.iter().enumerate() {
            if class.group {
                let nlevels = class.nlevels;
                let mut levels = Vec::with_capacity(nlevels as usize);
                for digit in 0..nlevels {
                    let value = (2.0 * digit as f64 - (nlevels - 1) as f64) / (nlevels - 1) as f64;
                    levels.push(Fixed::from_f64(value));
                }
                tables[class_idx] = levels;
            }
        }
        tables
    };
}

fn decode_samples(bits: &mut BitPtr<'_>, class_idx: usize, out: &mut [Fixed; 3]) {
    let class = QC_TABLE[class_idx];

    if class.group {
        let mut code = bits.read(class.bits);
        let levels = &GROUPED_LEVELS[class_idx];
        for slot in out.iter_mut() {
            let digit = code % class.nlevels;
            code /= class.nlevels;
            *slot = levels[digit as usize];
        }
    }
    else {
        for slot in out.iter_mut() {
            let raw = bits.read(class.bits);
            *slot = dequantize(class.bits, raw);
        }
    }
}

/// Layer II, like Layer I, carries no state across frames of its own.
#[derive(Default)]
pub struct Layer2;

impl Layer2 {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Layer for Layer2 {
    fn decode(
        &mut self,
        bits: &mut BitPtr<'_>,
        header: &FrameHeader,
        frame: &mut Frame,
    ) -> Result<()> {
        let num_channels = header.n_channels();

        let channel_bitrate_kbps = if num_channels == 2 {
            header.bitrate / 2000
        }
        else {
            header.bitrate / 1000
        };

        let (table_idx, sblimit) = select_table(channel_bitrate_kbps, header.sample_rate);

        let bound = match header.channel_mode {
            ChannelMode::JointStereo(ModeExtension::Intensity { bound }) => bound as usize,
            _ => 32,
        }
        .min(sblimit);

        let table = &BITALLOC_TABLES[table_idx];

        let mut allocation = [[0u8; 32]; 2];
        let mut scfsi = [[0u8; 32]; 2];
        let mut scalefactor = [[[Fixed::ZERO; 3]; 32]; 2];

        // CRC covers allocations + scfsi (spec.md §4.6).
        let crc_start = *bits;

        for sb in 0..bound {
            let nbal = table[sb].0;
            for ch in 0..num_channels {
                allocation[ch][sb] = bits.read(u32::from(nbal)) as u8;
            }
        }
        for sb in bound..sblimit {
            let nbal = table[sb].0;
            let code = bits.read(u32::from(nbal)) as u8;
            allocation[0][sb] = code;
            allocation[1][sb] = code;
        }

        for sb in 0..sblimit {
            for ch in 0..num_channels {
                if allocation[ch][sb] != 0 {
                    scfsi[ch][sb] = bits.read(2) as u8;
                }
            }
        }

        let crc_ok = match header.crc_target {
            Some(target) => {
                let len = crc_start.distance_bits(bits) as u32;
                crc16(crc_start, len, 0xffff) == target
            }
            None => true,
        };

        for sb in 0..sblimit {
            for ch in 0..num_channels {
                if allocation[ch][sb] == 0 {
                    continue;
                }

                let sf0 = bits.read(6) as usize;
                let (sf0v, sf1v, sf2v) = match scfsi[ch][sb] {
                    2 => (sf0, sf0, sf0),
                    0 => {
                        let sf1 = bits.read(6) as usize;
                        let sf2 = bits.read(6) as usize;
                        (sf0, sf1, sf2)
                    }
                    1 => {
                        let sf2 = bits.read(6) as usize;
                        (sf0, sf0, sf2)
                    }
                    3 => {
                        let sf2 = bits.read(6) as usize;
                        (sf0, sf2, sf2)
                    }
                    _ => unreachable!(),
                };

                if sf0v == 63 || sf1v == 63 || sf2v == 63 {
                    return decode_error(MadError::BadScalefactor);
                }

                scalefactor[ch][sb] = [SCALEFACTORS[sf0v], SCALEFACTORS[sf1v], SCALEFACTORS[sf2v]];
            }
        }

        for gr in 0..12 {
            for sb in 0..bound {
                for ch in 0..num_channels {
                    let code = allocation[ch][sb];
                    if code == 0 {
                        for s in 0..3 {
                            frame.sbsample[ch][3 * gr + s][sb] = Fixed::ZERO;
                        }
                        continue;
                    }
                    let class_idx = table[sb].1[code as usize] as usize;
                    let mut samples = [Fixed::ZERO; 3];
                    decode_samples(bits, class_idx, &mut samples);

                    let sf_slot = gr / 4;
                    for s in 0..3 {
                        frame.sbsample[ch][3 * gr + s][sb] =
                            samples[s] * scalefactor[ch][sb][sf_slot];
                    }
                }
            }

            for sb in bound..sblimit {
                let code = allocation[0][sb];
                if code == 0 {
                    for s in 0..3 {
                        for ch in 0..num_channels {
                            frame.sbsample[ch][3 * gr + s][sb] = Fixed::ZERO;
                        }
                    }
                    continue;
                }
                let class_idx = table[sb].1[code as usize] as usize;
                let mut samples = [Fixed::ZERO; 3];
                decode_samples(bits, class_idx, &mut samples);

                let sf_slot = gr / 4;
                for s in 0..3 {
                    for ch in 0..num_channels {
                        frame.sbsample[ch][3 * gr + s][sb] = samples[s] * scalefactor[ch][sb][sf_slot];
                    }
                }
            }

            for sb in sblimit..32 {
                for s in 0..3 {
                    for ch in 0..num_channels {
                        frame.sbsample[ch][3 * gr + s][sb] = Fixed::ZERO;
                    }
                }
            }
        }

        if !crc_ok {
            return decode_error(MadError::BadCrc);
        }

        Ok(())
    }
}

/// Selects the (bit-allocation table, sblimit) pair for a given per-channel
/// bitrate (kbps) and sample rate, per the reference `mad_layer_II` switch.
fn select_table(channel_bitrate_kbps: u32, sample_rate: u32) -> (usize, usize) {
    let idx = match channel_bitrate_kbps {
        32 | 48 => {
            if sample_rate == 32000 { 3 } else { 2 }
        }
        56 | 64 | 80 => 0,
        _ => {
            if sample_rate == 48000 { 0 } else { 1 }
        }
    };
    (idx, SBLIMIT[idx])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grouped_levels_are_symmetric_about_zero() {
        let levels = &GROUPED_LEVELS[0]; // nlevels = 3
        assert_eq!(levels.len(), 3);
        assert!((levels[0].to_f64() + levels[2].to_f64()).abs() < 1e-6);
        assert!(levels[1].to_f64().abs() < 1e-6);
    }

    #[test]
    fn select_table_32khz_96kbps_stereo_uses_table3() {
        // 96kbps stereo -> 48kbps/channel, 32kHz -> table index 3.
        let (idx, sblimit) = select_table(48, 32000);
        assert_eq!(idx, 3);
        assert_eq!(sblimit, 12);
    }
}
