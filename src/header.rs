// mpa-fixed
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! MPEG audio frame header: bit-field layout, bitrate/sample-rate tables,
//! payload length computation, and free-bitrate discovery.
//!
//! Grounded on the reference implementation's `decode_header()` and
//! `free_bitrate()` (`frame.c`) for the algorithms, with table layout and
//! enum-based field style matching the rest of this crate.

use crate::bit::BitPtr;
use crate::common::{ChannelMode, Emphasis, FrameFlags, ModeExtension, MpegLayer, MpegVersion};
use crate::error::{decode_error, MadError, Result};
use crate::timer::Timer;

/// 12-bit sync word (11 bits for the MPEG-2.5 `0xFFE` variant, but the
/// leading 11 bits `0x7ff` are common to both; this is the full 12-bit
/// pattern used once the MPEG version bit has also matched).
pub const SYNC_WORD: u32 = 0x0fff;

/// Bitrate tables in kbps, indexed by `bitrate_index` (0 = free, 15 =
/// reserved are handled by the caller). Row 0 = MPEG-1 Layer I, row 1 =
/// MPEG-1 Layer II, row 2 = MPEG-1 Layer III, row 3 = MPEG-2/2.5 Layer I,
/// row 4 = MPEG-2/2.5 Layer II/III. Values match ISO/IEC 11172-3 Table 3-B.2
/// and 13818-3 Table B.1 (libmad's `bitrate_table`).
#[rustfmt::skip]
const BITRATE_TABLE: [[u32; 15]; 5] = [
    // MPEG-1 Layer I
    [32, 64, 96, 128, 160, 192, 224, 256, 288, 320, 352, 384, 416, 448, 0],
    // MPEG-1 Layer II
    [32, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320, 384, 0],
    // MPEG-1 Layer III
    [32, 40, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320, 0],
    // MPEG-2/2.5 Layer I
    [32, 48, 56, 64, 80, 96, 112, 128, 144, 160, 176, 192, 224, 256, 0],
    // MPEG-2/2.5 Layer II & III
    [8, 16, 24, 32, 40, 48, 56, 64, 80, 96, 112, 128, 144, 160, 0],
];

/// Sample rate tables in Hz, indexed by `sample_rate_index`. Row 0 =
/// MPEG-1, row 1 = MPEG-2, row 2 = MPEG-2.5.
const SAMPLE_RATE_TABLE: [[u32; 3]; 3] =
    [[44100, 48000, 32000], [22050, 24000, 16000], [11025, 12000, 8000]];

/// Resolves the bitrate table row for a given (version, layer).
fn bitrate_row(version: MpegVersion, layer: MpegLayer) -> usize {
    match (version, layer) {
        (MpegVersion::Mpeg1, MpegLayer::Layer1) => 0,
        (MpegVersion::Mpeg1, MpegLayer::Layer2) => 1,
        (MpegVersion::Mpeg1, MpegLayer::Layer3) => 2,
        (_, MpegLayer::Layer1) => 3,
        (_, _) => 4,
    }
}

/// Number of "slots" (bytes for Layer I, 4-byte groups otherwise handled
/// separately) per frame used in the payload-length formula, spec.md §4.4.
fn slots_per_frame(version: MpegVersion, layer: MpegLayer) -> u32 {
    match layer {
        MpegLayer::Layer1 => 4, // Layer I counts in 4-byte (32-bit) slots.
        MpegLayer::Layer3 if version.is_lsf() => 72,
        _ => 144,
    }
}

/// A fully parsed MPEG audio frame header.
#[derive(Debug, Clone)]
pub struct FrameHeader {
    pub version: MpegVersion,
    pub layer: MpegLayer,
    pub flags: FrameFlags,
    pub channel_mode: ChannelMode,
    pub emphasis: Emphasis,
    pub bitrate_index: u8,
    pub sample_rate_index: u8,
    /// Bitrate in bits per second. For bitrate_index == 0 ("free format")
    /// this is 0 until [`crate::stream::Stream`] discovers `freerate` and
    /// patches it in.
    pub bitrate: u32,
    pub sample_rate: u32,
    /// Size of this frame's payload in bytes, not counting the 4-byte
    /// header word itself.
    pub frame_size: u32,
    /// Target CRC checksum read from the protection word, if present.
    pub crc_target: Option<u16>,
    pub private_bit: bool,
}

impl FrameHeader {
    pub fn is_mpeg1(&self) -> bool {
        matches!(self.version, MpegVersion::Mpeg1)
    }

    pub fn is_lsf(&self) -> bool {
        self.version.is_lsf()
    }

    pub fn n_channels(&self) -> usize {
        self.channel_mode.num_channels()
    }

    /// Number of granules per channel for Layer III (2 for MPEG-1, 1 for
    /// LSF). Meaningless for Layer I/II.
    pub fn n_granules(&self) -> usize {
        if self.is_lsf() { 1 } else { 2 }
    }

    /// Side info length in bytes for Layer III, per spec.md §4.7.
    pub fn side_info_len(&self) -> usize {
        match (self.is_lsf(), self.n_channels()) {
            (false, 1) => 17,
            (false, _) => 32,
            (true, 1) => 9,
            (true, _) => 17,
        }
    }

    /// `NSBSAMPLES`: number of subband-sample rows this frame type yields
    /// (spec.md §3, §8).
    pub fn nsbsamples(&self) -> u32 {
        match self.layer {
            MpegLayer::Layer1 => 12,
            MpegLayer::Layer3 if self.is_lsf() => 18,
            _ => 36,
        }
    }

    /// Total PCM samples per channel this frame produces.
    pub fn samples_per_frame(&self) -> u32 {
        32 * self.nsbsamples()
    }

    /// Exact playback duration of this frame.
    pub fn duration(&self) -> Timer {
        Timer::frame_duration(self.nsbsamples(), self.sample_rate)
    }

    /// Patches in a discovered free-format bitrate (spec.md "Free bitrate
    /// discovery") and recomputes `frame_size` accordingly.
    pub fn apply_free_bitrate(&mut self, bitrate_bps: u32) {
        self.bitrate = bitrate_bps;
        self.frame_size = compute_frame_size(
            self.version,
            self.layer,
            bitrate_bps,
            self.sample_rate,
            self.flags.contains(FrameFlags::PADDING),
        );
    }
}

/// Computes the payload byte length `N`, spec.md §4.4:
/// Layer I: `((12*bitrate/sfreq) + pad) * 4`.
/// Otherwise: `(slots_per_frame*bitrate/sfreq) + pad`.
fn compute_frame_size(
    version: MpegVersion,
    layer: MpegLayer,
    bitrate_bps: u32,
    sample_rate: u32,
    padding: bool,
) -> u32 {
    let pad = u32::from(padding);
    if sample_rate == 0 {
        return 0;
    }
    match layer {
        MpegLayer::Layer1 => (12 * bitrate_bps / 1000 * 1000 / sample_rate + pad) * 4,
        _ => {
            let slots = slots_per_frame(version, layer);
            (slots * (bitrate_bps / 1000) * 1000 / sample_rate) + pad
        }
    }
}

/// Checks whether the 16 bits at the front of `word` form a valid sync
/// pattern: 11 bits of `1` followed by either `1` (MPEG-1/2) or `0`
/// (MPEG-2.5), i.e. the top 12 bits are `0xffe` or `0xfff`.
pub fn is_sync_word(word: u32) -> bool {
    (word & 0xffe0_0000) == 0xffe0_0000
}

/// Scans forward from `bits` for the next occurrence of the 12-bit sync
/// pattern, consuming bits one at a time (byte-oriented scanning is left to
/// [`crate::stream::Stream`], which knows the buffer's byte alignment).
/// Returns `true` and leaves the cursor positioned at the start of the
/// matched sync word, or `false` if it runs out of bits first.
pub fn find_sync(bits: &mut BitPtr<'_>) -> bool {
    while bits.has_bits(12) {
        let probe = {
            let mut peek = *bits;
            peek.read(12)
        };
        if probe == SYNC_WORD || (probe & 0xffe) == 0xffe {
            return true;
        }
        bits.skip(8);
    }
    false
}

/// Parses one 32-bit header word (already confirmed to start with a valid
/// sync pattern) plus the following protection word if present. Leaves the
/// cursor positioned just after the CRC word (or immediately after the
/// header word if `protection_bit == 1`).
pub fn parse_frame_header(bits: &mut BitPtr<'_>) -> Result<FrameHeader> {
    let sync = bits.read(12);
    if (sync & 0xffe) != 0xffe {
        return decode_error(MadError::LostSync);
    }

    let id_bit = bits.read(1);
    let layer_bits = bits.read(2);
    let protection_bit = bits.read(1) != 0;
    let bitrate_index = bits.read(4) as u8;
    let sample_rate_index = bits.read(2) as u8;
    let padding_bit = bits.read(1) != 0;
    let private_bit = bits.read(1) != 0;
    let mode_bits = bits.read(2);
    let mode_ext_bits = bits.read(2) as u8;
    let copyright = bits.read(1) != 0;
    let original = bits.read(1) != 0;
    let emphasis_bits = bits.read(2);

    let version = if sync == 0xfff {
        if id_bit == 1 { MpegVersion::Mpeg1 } else { MpegVersion::Mpeg2 }
    }
    else {
        // 0xffe sync: MPEG-2.5 unofficial extension.
        MpegVersion::Mpeg25
    };

    let layer = match layer_bits {
        0b11 => MpegLayer::Layer1,
        0b10 => MpegLayer::Layer2,
        0b01 => MpegLayer::Layer3,
        _ => return decode_error(MadError::BadLayer),
    };

    if bitrate_index == 15 {
        return decode_error(MadError::BadBitrate);
    }
    if sample_rate_index == 3 {
        return decode_error(MadError::BadSampleFreq);
    }

    let sample_rate = {
        let row = match version {
            MpegVersion::Mpeg1 => 0,
            MpegVersion::Mpeg2 => 1,
            MpegVersion::Mpeg25 => 2,
        };
        SAMPLE_RATE_TABLE[row][sample_rate_index as usize]
    };

    let bitrate =
        BITRATE_TABLE[bitrate_row(version, layer)][bitrate_index as usize] * 1000;

    let channel_mode = match mode_bits {
        0b00 => ChannelMode::Stereo,
        0b01 => {
            let ext = match layer {
                MpegLayer::Layer3 => ModeExtension::Layer3 {
                    intensity: (mode_ext_bits & 0b01) != 0,
                    ms: (mode_ext_bits & 0b10) != 0,
                },
                _ => ModeExtension::Intensity { bound: 4 * (mode_ext_bits + 1) },
            };
            ChannelMode::JointStereo(ext)
        }
        0b10 => ChannelMode::DualChannel,
        0b11 => ChannelMode::SingleChannel,
        _ => unreachable!(),
    };

    let emphasis = match emphasis_bits {
        0b00 => Emphasis::None,
        0b01 => Emphasis::Fifty15Microseconds,
        0b10 => return decode_error(MadError::BadEmphasis),
        0b11 => Emphasis::CcittJ17,
        _ => unreachable!(),
    };

    let mut flags = FrameFlags::empty();
    flags.set(FrameFlags::PROTECTION, !protection_bit);
    flags.set(FrameFlags::COPYRIGHT, copyright);
    flags.set(FrameFlags::ORIGINAL, original);
    flags.set(FrameFlags::PADDING, padding_bit);
    flags.set(FrameFlags::LSF_EXT, version != MpegVersion::Mpeg1);
    flags.set(FrameFlags::MC_EXT, version == MpegVersion::Mpeg25);
    if let ChannelMode::JointStereo(ModeExtension::Layer3 { intensity, ms }) = channel_mode {
        flags.set(FrameFlags::I_STEREO, intensity);
        flags.set(FrameFlags::MS_STEREO, ms);
    }

    let crc_target = if !protection_bit { Some(bits.read(16) as u16) } else { None };

    let frame_size = compute_frame_size(version, layer, bitrate, sample_rate, padding_bit);

    Ok(FrameHeader {
        version,
        layer,
        flags,
        channel_mode,
        emphasis,
        bitrate_index,
        sample_rate_index,
        bitrate,
        sample_rate,
        frame_size,
        crc_target,
        private_bit,
    })
}

/// Free-bitrate discovery, spec.md "Free bitrate discovery": given the
/// byte distance `n` to the next valid header with the same layer and
/// sample rate, computes the implied constant bitrate in bits/second.
/// Returns `None` if the computed rate is below the 8 kbps floor (rejected
/// per spec.md) or if rate computation would divide by zero.
pub fn free_bitrate(
    version: MpegVersion,
    layer: MpegLayer,
    sample_rate: u32,
    n_bytes: u32,
    padding: bool,
) -> Option<u32> {
    if sample_rate == 0 {
        return None;
    }
    let pad = u32::from(padding);

    let rate_kbps = match layer {
        MpegLayer::Layer1 => {
            // rate = sfreq*(N - 4*pad + 4)/48/1000
            let numer = sample_rate as i64 * (n_bytes as i64 - 4 * pad as i64 + 4);
            numer / 48 / 1000
        }
        _ => {
            let slots = slots_per_frame(version, layer) as i64;
            let numer = sample_rate as i64 * (n_bytes as i64 - pad as i64 + 1);
            numer / slots / 1000
        }
    };

    if rate_kbps < 8 { None } else { Some(rate_kbps as u32 * 1000) }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_header(bits: &[(u32, u32)]) -> Vec<u8> {
        let mut out_bits = Vec::new();
        for &(n, v) in bits {
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
    fn parses_mpeg1_layer3_stereo_128kbps_44100() {
        // sync=0xfff, id=1 (mpeg1), layer=01 (III), protection=1 (no crc),
        // bitrate_index=0b1001 (128kbps in Layer III row), sample_rate=00 (44100),
        // pad=0, priv=0, mode=00 (stereo), mode_ext=00, copy=0, orig=0, emph=00
        let bytes = encode_header(&[
            (12, 0xfff),
            (1, 1),
            (2, 0b01),
            (1, 1),
            (4, 0b1001),
            (2, 0b00),
            (1, 0),
            (1, 0),
            (2, 0b00),
            (2, 0b00),
            (1, 0),
            (1, 0),
            (2, 0b00),
        ]);
        let mut bits = BitPtr::new(&bytes);
        let header = parse_frame_header(&mut bits).unwrap();
        assert_eq!(header.layer, MpegLayer::Layer3);
        assert_eq!(header.sample_rate, 44100);
        assert_eq!(header.bitrate, 128_000);
        assert_eq!(header.channel_mode, ChannelMode::Stereo);
        assert_eq!(header.samples_per_frame(), 1152);
    }

    #[test]
    fn rejects_bad_layer() {
        let bytes = encode_header(&[
            (12, 0xfff),
            (1, 1),
            (2, 0b00),
            (1, 1),
            (4, 1),
            (2, 0),
            (1, 0),
            (1, 0),
            (2, 0),
            (2, 0),
            (1, 0),
            (1, 0),
            (2, 0),
        ]);
        let mut bits = BitPtr::new(&bytes);
        assert!(matches!(parse_frame_header(&mut bits), Err(MadError::BadLayer)));
    }

    #[test]
    fn layer2_joint_stereo_mode_ext_1_gives_bound_8() {
        let bytes = encode_header(&[
            (12, 0xfff),
            (1, 1),
            (2, 0b10),
            (1, 1),
            (4, 0b1001),
            (2, 0b10), // 32kHz
            (1, 0),
            (1, 0),
            (2, 0b01), // joint stereo
            (2, 0b01), // mode_ext = 1 -> bound = 8
            (1, 0),
            (1, 0),
            (2, 0b00),
        ]);
        let mut bits = BitPtr::new(&bytes);
        let header = parse_frame_header(&mut bits).unwrap();
        match header.channel_mode {
            ChannelMode::JointStereo(ModeExtension::Intensity { bound }) => assert_eq!(bound, 8),
            other => panic!("unexpected channel mode {:?}", other),
        }
    }

    #[test]
    fn free_bitrate_rejects_below_8kbps() {
        assert_eq!(free_bitrate(MpegVersion::Mpeg1, MpegLayer::Layer3, 44100, 1, false), None);
    }
}
