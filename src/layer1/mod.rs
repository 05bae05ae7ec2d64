// mpa-fixed
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Layer I decoding: 32 subbands x 12 sample rows, one bit-allocation and
//! one scalefactor per active subband (spec.md §4.6).

use crate::bit::{crc16, BitPtr};
use crate::common::{ChannelMode, Layer, ModeExtension};
use crate::error::{decode_error, MadError, Result};
use crate::frame::Frame;
use crate::header::FrameHeader;
use crate::layer12::{dequantize, SCALEFACTORS};

/// Layer I has no decoder-owned state between frames; bit allocations and
/// scalefactors are entirely re-read each frame. The polyphase synthesis
/// filter (which *does* carry state across frames) is owned and invoked by
/// the decoder driver uniformly for all three layers (spec.md §4.9).
#[derive(Default)]
pub struct Layer1;

impl Layer1 {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Layer for Layer1 {
    fn decode(
        &mut self,
        bits: &mut BitPtr<'_>,
        header: &FrameHeader,
        frame: &mut Frame,
    ) -> Result<()> {
        let num_channels = header.n_channels();

        let bound = match header.channel_mode {
            ChannelMode::JointStereo(ModeExtension::Intensity { bound }) => bound as usize,
            _ => 32,
        };

        let mut alloc = [[0u8; 32]; 2];
        let mut scalefacs = [[crate::fixed::Fixed::ZERO; 32]; 2];

        // CRC covers only the bit-allocation field (spec.md §4.6).
        let alloc_start = *bits;

        for sb in 0..bound {
            for ch in 0..num_channels {
                let bits_alloc = bits.read(4);
                if bits_alloc > 0xe {
                    return decode_error(MadError::BadBitAlloc);
                }
                alloc[ch][sb] = if bits_alloc != 0 { bits_alloc as u8 + 1 } else { 0 };
            }
        }

        for sb in bound..32 {
            let bits_alloc = bits.read(4);
            if bits_alloc > 0xe {
                return decode_error(MadError::BadBitAlloc);
            }
            let ba = if bits_alloc != 0 { bits_alloc as u8 + 1 } else { 0 };
            alloc[0][sb] = ba;
            alloc[1][sb] = ba;
        }

        let crc_ok = match header.crc_target {
            Some(target) => {
                let len = alloc_start.distance_bits(bits) as u32;
                crc16(alloc_start, len, 0xffff) == target
            }
            None => true,
        };

        for sb in 0..32 {
            for ch in 0..num_channels {
                if alloc[ch][sb] != 0 {
                    let index = bits.read(6) as usize;
                    if index == 63 {
                        return decode_error(MadError::BadScalefactor);
                    }
                    scalefacs[ch][sb] = SCALEFACTORS[index];
                }
            }
        }

        for s in 0..12 {
            for sb in 0..bound {
                for ch in 0..num_channels {
                    let nb = alloc[ch][sb];
                    frame.sbsample[ch][s][sb] = if nb != 0 {
                        let raw = bits.read(u32::from(nb));
                        let sample = dequantize(u32::from(nb), raw);
                        scalefacs[ch][sb] * sample
                    }
                    else {
                        // spec.md §4.6: zero the unused subband so the
                        // frame doesn't leak the previous frame's samples.
                        crate::fixed::Fixed::ZERO
                    };
                }
            }

            for sb in bound..32 {
                let nb = alloc[0][sb];
                let sample = if nb != 0 {
                    let raw = bits.read(u32::from(nb));
                    Some(dequantize(u32::from(nb), raw))
                }
                else {
                    None
                };
                for ch in 0..num_channels {
                    frame.sbsample[ch][s][sb] =
                        sample.map_or(crate::fixed::Fixed::ZERO, |sample| scalefacs[ch][sb] * sample);
                }
            }
        }

        if !crc_ok {
            return decode_error(MadError::BadCrc);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{Emphasis, FrameFlags, MpegLayer, MpegVersion};
    use crate::header::FrameHeader;

    fn mono_header() -> FrameHeader {
        FrameHeader {
            version: MpegVersion::Mpeg1,
            layer: MpegLayer::Layer1,
            flags: FrameFlags::empty(),
            channel_mode: ChannelMode::SingleChannel,
            emphasis: Emphasis::None,
            bitrate_index: 9,
            sample_rate_index: 0,
            bitrate: 384_000,
            sample_rate: 44100,
            frame_size: 104,
            crc_target: None,
            private_bit: false,
        }
    }

    fn encode_bits(fields: &[(u32, u32)]) -> Vec<u8> {
        let mut out_bits = Vec::new();
        for &(n, v) in fields {
            for i in (0..n).rev() {
                out_bits.push((v >> i) & 1 != 0);
            }
        }
        let mut bytes = vec![0u8; (out_bits.len() + 7) / 8];
        for (i, &bit) in out_bits.iter().enumerate() {
            if bit {
                bytes[i / 8] |= 1 << (7 - (i % 8));
            }
        }
        bytes
    }

    #[test]
    fn unallocated_subband_is_zeroed_not_left_stale() {
        // Only subband 1 gets an allocation; every other subband (0, and
        // 2..32) reads `bits_alloc == 0` and must come out as silence
        // rather than whatever the previous frame left in `sbsample`.
        let mut fields = Vec::new();
        for sb in 0..32u32 {
            fields.push((4, if sb == 1 { 1 } else { 0 }));
        }
        fields.push((6, 0)); // scalefactor index for subband 1
        for _ in 0..12 {
            fields.push((2, 0b10)); // subband 1 sample, each of 12 rows
        }
        let bytes = encode_bits(&fields);
        let mut bits = BitPtr::new(&bytes);

        let header = mono_header();
        let mut frame = Frame::new();
        // Poison subband 0 with stale data from a hypothetical prior frame.
        for s in 0..12 {
            frame.sbsample[0][s][0] = crate::fixed::Fixed::from_int(3);
        }

        Layer1::new().decode(&mut bits, &header, &mut frame).unwrap();

        for s in 0..12 {
            assert_eq!(frame.sbsample[0][s][0], crate::fixed::Fixed::ZERO);
            assert_ne!(frame.sbsample[0][s][1], crate::fixed::Fixed::ZERO);
        }
    }
}
