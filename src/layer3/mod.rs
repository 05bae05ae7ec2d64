// mpa-fixed
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Layer III orchestration: side info, scalefactor decode (MPEG-1 and LSF),
//! the main-data Huffman decode loop, requantization, stereo recombination,
//! and hybrid synthesis, tied together per granule/channel.
//!
//! Unlike Layer I/II, Layer III cannot implement [`crate::common::Layer`]
//! directly: its main data is back-referenced into prior frames through the
//! `main_data_begin` reservoir pointer (spec.md §4.7 step 5, §9
//! "Back-reference reservoir"), so the decoder driver must splice the
//! reservoir tail and the current frame's own main-data bytes into one
//! owned buffer *before* this module can decode a single bit of it. Side
//! info, by contrast, always lives in the current frame and is read
//! directly from the bits the driver already has. [`read_side_info`] and
//! [`decode_main_data`] are exposed as two separate entry points for this
//! reason; see DESIGN.md for how the driver splices the reservoir.

pub mod tables;
mod huffman;
mod requantize;
pub mod stereo;
mod hybrid_synthesis;

use crate::bit::BitPtr;
use crate::common::{ChannelMode, MpegVersion, ModeExtension};
use crate::error::{decode_error, MadError, Result};
use crate::fixed::Fixed;
use crate::frame::Frame;
use crate::header::FrameHeader;

pub use stereo::StereoOptions;
use tables::BlockType;

/// Side info and scalefactors for one granule/channel, spec.md §4.7.
#[derive(Debug, Clone)]
pub struct GranuleChannel {
    pub part2_3_length: u16,
    pub big_values: u16,
    pub global_gain: u8,
    pub scalefac_compress: u16,
    pub block_type: BlockType,
    pub is_mixed: bool,
    pub subblock_gain: [u8; 3],
    pub table_select: [u8; 3],
    pub region1_start: usize,
    pub region2_start: usize,
    pub preflag: bool,
    pub scalefac_scale: bool,
    pub count1table_select: u8,
    /// Decoded scalefactors. Long/normal blocks use indices `0..21`
    /// (direct scalefactor-band index); short blocks (pure or the
    /// short-windowed tail of a mixed block) use `sfb * 3 + window`
    /// (`0..39`), a simplified uniform layout adopted for both MPEG-1 and
    /// LSF streams rather than the ISO reference's version-specific
    /// partition counts (see DESIGN.md).
    pub scalefacs: [u8; 39],
    /// One past the last non-implicit-zero spectral line this
    /// channel/granule decoded, spec.md glossary "rzero".
    pub rzero: usize,
}

impl Default for GranuleChannel {
    fn default() -> Self {
        GranuleChannel {
            part2_3_length: 0,
            big_values: 0,
            global_gain: 0,
            scalefac_compress: 0,
            block_type: BlockType::Long,
            is_mixed: false,
            subblock_gain: [0; 3],
            table_select: [0; 3],
            region1_start: 0,
            region2_start: 0,
            preflag: false,
            scalefac_scale: false,
            count1table_select: 0,
            scalefacs: [0; 39],
            rzero: 0,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Granule {
    pub channels: [GranuleChannel; 2],
}

/// Side info for one frame: the main-data back-reference pointer, MPEG-1's
/// scfsi inheritance flags, and per-granule/channel fields.
#[derive(Debug, Clone)]
pub struct FrameData {
    pub main_data_begin: u16,
    pub scfsi: [[bool; 4]; 2],
    pub granules: [Granule; 2],
}

/// Reads one granule/channel's side info, spec.md §4.7 step 1.
fn read_granule_channel_side_info(bits: &mut BitPtr<'_>, header: &FrameHeader) -> Result<GranuleChannel> {
    let part2_3_length = bits.read(12) as u16;
    let big_values = bits.read(9) as u16;
    if big_values > 288 {
        return decode_error(MadError::BadBigValues);
    }
    let global_gain = bits.read(8) as u8;
    let scalefac_compress = if header.is_mpeg1() { bits.read(4) as u16 } else { bits.read(9) as u16 };
    let window_switching = bits.read_bool();

    let mut block_type = BlockType::Long;
    let mut is_mixed = false;
    let mut subblock_gain = [0u8; 3];
    let mut table_select = [0u8; 3];
    let region1_start;
    let region2_start;

    let is_mpeg25 = matches!(header.version, MpegVersion::Mpeg25);
    let sri = header.sample_rate_index as usize;

    if window_switching {
        let block_type_bits = bits.read(2);
        if block_type_bits == 0 {
            return decode_error(MadError::BadBlockType);
        }
        block_type = BlockType::from_bits(block_type_bits);
        is_mixed = bits.read_bool();

        for slot in table_select.iter_mut().take(2) {
            *slot = bits.read(5) as u8;
        }
        for slot in subblock_gain.iter_mut() {
            *slot = bits.read(3) as u8;
        }

        if is_mpeg25 {
            let region0_count =
                if block_type == BlockType::Short && !is_mixed { 5 + 1 } else { 7 + 1 };
            region1_start = tables::sfb_long_bands(false, true, sri)[region0_count] as usize;
        }
        else if header.is_mpeg1() || block_type == BlockType::Short {
            region1_start = 36;
        }
        else {
            region1_start = 54;
        }
        region2_start = 576;
    }
    else {
        for slot in table_select.iter_mut() {
            *slot = bits.read(5) as u8;
        }
        let region0_count = bits.read(4) as usize + 1;
        let region0_1_count = bits.read(3) as usize + region0_count + 1;
        let bands = tables::sfb_long_bands(header.is_mpeg1(), is_mpeg25, sri);
        region1_start = bands[region0_count.min(22)] as usize;
        region2_start = if region0_1_count <= 22 { bands[region0_1_count] as usize } else { 576 };
    }

    let preflag = if header.is_mpeg1() { bits.read_bool() } else { false };
    let scalefac_scale = bits.read_bool();
    let count1table_select = bits.read(1) as u8;

    Ok(GranuleChannel {
        part2_3_length,
        big_values,
        global_gain,
        scalefac_compress,
        block_type,
        is_mixed,
        subblock_gain,
        table_select,
        region1_start,
        region2_start,
        preflag,
        scalefac_scale,
        count1table_select,
        scalefacs: [0; 39],
        rzero: 0,
    })
}

/// Reads the Layer III side info following the frame header (and CRC word,
/// if present), spec.md §4.7 step 1. `bits` must be positioned at the first
/// bit of side info within the current frame; side info is never
/// back-referenced into the reservoir.
pub fn read_side_info(bits: &mut BitPtr<'_>, header: &FrameHeader) -> Result<FrameData> {
    let n_channels = header.n_channels();
    let n_granules = header.n_granules();

    let main_data_begin = if header.is_mpeg1() { bits.read(9) as u16 } else { bits.read(8) as u16 };

    let mut scfsi = [[false; 4]; 2];

    if header.is_mpeg1() {
        bits.skip(if n_channels == 1 { 5 } else { 3 });
        for ch_scfsi in scfsi.iter_mut().take(n_channels) {
            for flag in ch_scfsi.iter_mut() {
                *flag = bits.read_bool();
            }
        }
    }
    else {
        bits.skip(if n_channels == 1 { 1 } else { 2 });
    }

    let mut granules: [Granule; 2] = Default::default();

    for granule in granules.iter_mut().take(n_granules) {
        for ch in granule.channels.iter_mut().take(n_channels) {
            *ch = read_granule_channel_side_info(bits, header)?;
        }
    }

    Ok(FrameData { main_data_begin, scfsi, granules })
}

/// Reads MPEG-1 scalefactors for one granule/channel, including scfsi
/// inheritance from granule 0, spec.md §4.7 step 2. Returns the number of
/// bits consumed ("part2" length).
fn read_scale_factors_mpeg1(
    bits: &mut BitPtr<'_>,
    scfsi: &[[bool; 4]; 2],
    gr: usize,
    ch: usize,
    granules: &mut [Granule; 2],
) -> u32 {
    let before = bits.bits_remaining();
    let compress = granules[gr].channels[ch].scalefac_compress as usize;
    let (slen1, slen2) = tables::SCALE_FACTOR_SLEN[compress.min(15)];

    if granules[gr].channels[ch].block_type == BlockType::Short {
        if slen1 > 0 {
            for idx in 0..18 {
                granules[gr].channels[ch].scalefacs[idx] = bits.read(slen1 as u32) as u8;
            }
        }
        if slen2 > 0 {
            for idx in 18..39 {
                granules[gr].channels[ch].scalefacs[idx] = bits.read(slen2 as u32) as u8;
            }
        }
    }
    else {
        const BANDS: [(usize, usize); 4] = [(0, 6), (6, 11), (11, 16), (16, 21)];
        for (i, &(start, end)) in BANDS.iter().enumerate() {
            let slen = if i < 2 { slen1 } else { slen2 };
            if gr > 0 && scfsi[ch][i] {
                let (earlier, later) = granules.split_at_mut(gr);
                later[0].channels[ch].scalefacs[start..end]
                    .copy_from_slice(&earlier[0].channels[ch].scalefacs[start..end]);
            }
            else if slen > 0 {
                for k in start..end {
                    granules[gr].channels[ch].scalefacs[k] = bits.read(slen as u32) as u8;
                }
            }
        }
    }

    (before - bits.bits_remaining()) as u32
}

/// Reads LSF (MPEG-2/2.5) scalefactors for one granule/channel, spec.md
/// §4.7 step 2 "LSF scalefac_compress decomposition". Returns bits
/// consumed.
fn read_scale_factors_mpeg2(bits: &mut BitPtr<'_>, is_intensity_channel: bool, channel: &mut GranuleChannel) -> u32 {
    let before = bits.bits_remaining();

    let block_index = match (channel.block_type, channel.is_mixed) {
        (BlockType::Short, true) => 2,
        (BlockType::Short, false) => 1,
        _ => 0,
    };

    let (class, slen) = if is_intensity_channel {
        let sfc = channel.scalefac_compress >> 1;
        let class = if sfc < 180 {
            0
        }
        else if sfc < 244 {
            1
        }
        else {
            2
        };
        (class, tables::mpeg2_slen(sfc, 180, 244))
    }
    else {
        let sfc = channel.scalefac_compress;
        channel.preflag = sfc >= 500;
        let class = if sfc < 400 {
            3
        }
        else if sfc < 500 {
            4
        }
        else {
            5
        };
        (class, tables::mpeg2_slen(sfc, 400, 500))
    };

    let nsfb = tables::MPEG2_NSFB[class][block_index];

    if block_index == 0 {
        // Long/start/stop: nsfb partitions are direct scalefactor-band
        // counts, written sequentially into scalefacs[0..21].
        let mut start = 0usize;
        for part in 0..4 {
            let n = nsfb[part];
            let width = slen[part];
            if width > 0 {
                for k in 0..n {
                    channel.scalefacs[start + k] = bits.read(width as u32) as u8;
                }
            }
            start += n;
        }
    }
    else {
        // Short (pure or mixed tail): reuse the same sfb*3+window layout
        // `read_scale_factors_mpeg1` uses, split at the class's own
        // partition boundaries instead of the fixed slen1/slen2 split
        // (see `scalefacs` field doc comment for the layout rationale).
        let mut idx = 0usize;
        for part in 0..4 {
            let n = nsfb[part];
            let width = slen[part];
            for _ in 0..n {
                if idx >= 39 {
                    break;
                }
                if width > 0 {
                    channel.scalefacs[idx] = bits.read(width as u32) as u8;
                }
                idx += 1;
            }
        }
    }

    (before - bits.bits_remaining()) as u32
}

/// Decodes one channel's big_values/count1 Huffman-coded region into `raw`
/// signed magnitudes (pre-requantization), spec.md §4.7 step 3. Returns
/// `rzero`, the count of non-implicit-zero lines.
fn read_huffman_samples(
    bits: &mut BitPtr<'_>,
    channel: &GranuleChannel,
    part3_bits: u32,
    raw: &mut [i32; 576],
) -> Result<usize> {
    raw.fill(0);

    if part3_bits == 0 {
        return Ok(0);
    }

    let big_values_len = (2 * channel.big_values as usize).min(576);
    let regions =
        [channel.region1_start.min(big_values_len), channel.region2_start.min(big_values_len), big_values_len];

    let mut i = 0usize;
    let mut bits_read = 0u32;
    let mut region_idx = 0usize;

    while i < big_values_len && bits_read < part3_bits {
        while region_idx < 2 && i >= regions[region_idx] {
            region_idx += 1;
        }

        let table = match huffman::pair_table(channel.table_select[region_idx]) {
            Some(t) => t,
            None => {
                i += 2;
                continue;
            }
        };

        let before = bits.bits_remaining();
        let (x, y) = table.decode(bits).ok_or(MadError::BadHuffData)?;

        let mut xv = x as i32;
        if x == 15 && table.linbits > 0 {
            xv += bits.read(table.linbits) as i32;
        }
        if x > 0 && bits.read_bool() {
            xv = -xv;
        }

        let mut yv = y as i32;
        if y == 15 && table.linbits > 0 {
            yv += bits.read(table.linbits) as i32;
        }
        if y > 0 && bits.read_bool() {
            yv = -yv;
        }

        raw[i] = xv;
        raw[i + 1] = yv;
        i += 2;

        bits_read += (before - bits.bits_remaining()) as u32;
    }

    while i + 4 <= 576 && bits_read < part3_bits {
        let before = bits.bits_remaining();
        let quad = huffman::decode_quad(bits, channel.count1table_select).ok_or(MadError::BadHuffData)?;
        let mut consumed = (before - bits.bits_remaining()) as u32;

        let mut values = [0i32; 4];
        for (slot, &bit) in values.iter_mut().zip([quad.0, quad.1, quad.2, quad.3].iter()) {
            if bit != 0 {
                let negative = bits.read_bool();
                consumed += 1;
                *slot = if negative { -1 } else { 1 };
            }
        }

        if bits_read + consumed > part3_bits {
            break;
        }
        bits_read += consumed;

        raw[i..i + 4].copy_from_slice(&values);
        i += 4;
    }

    Ok(i)
}

/// Requantizes one granule/channel's `raw` Huffman magnitudes into `xr`,
/// spec.md §4.7 step 4, dispatching on block type.
fn requantize_channel(header: &FrameHeader, channel: &GranuleChannel, raw: &[i32; 576], xr: &mut [Fixed; 576]) {
    let sri = header.sample_rate_index as usize;
    let is_mpeg1 = header.is_mpeg1();
    let is_mpeg25 = matches!(header.version, MpegVersion::Mpeg25);

    match channel.block_type {
        BlockType::Short if !channel.is_mixed => {
            requantize_short_region(channel, raw, xr, 0, 192, is_mpeg1, is_mpeg25, sri);
        }
        BlockType::Short => {
            requantize_long_region(channel, raw, xr, 0, 36, is_mpeg1, is_mpeg25, sri, tables::MIXED_LONG_BANDS);
            requantize_short_region(channel, raw, xr, 36, 180, is_mpeg1, is_mpeg25, sri);
        }
        _ => {
            requantize_long_region(channel, raw, xr, 0, 576, is_mpeg1, is_mpeg25, sri, 21);
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn requantize_long_region(
    channel: &GranuleChannel,
    raw: &[i32; 576],
    xr: &mut [Fixed; 576],
    start: usize,
    end: usize,
    is_mpeg1: bool,
    is_mpeg25: bool,
    sri: usize,
    max_sfb: usize,
) {
    let bands = tables::sfb_long_bands(is_mpeg1, is_mpeg25, sri);
    for sfb in 0..max_sfb.min(21) {
        let band_start = (bands[sfb] as usize).max(start);
        let band_end = (bands[sfb + 1] as usize).min(end);
        if band_start >= band_end {
            continue;
        }
        let preflag_add = requantize::preemphasis(sfb, channel.preflag);
        let exponent = requantize::requantize_exponent(
            channel.global_gain,
            channel.scalefacs[sfb],
            preflag_add,
            channel.scalefac_scale,
            None,
        );
        for i in band_start..band_end.min(channel.rzero) {
            let v = raw[i];
            let mag = requantize::requantize(v.unsigned_abs(), exponent);
            xr[i] = if v < 0 { -mag } else { mag };
        }
    }
}

/// Requantizes a short-windowed region spanning `plane_len` lines per
/// window, starting at `region_start` within the 576-line spectrum (`0` for
/// a pure short block, `36` for the short tail of a mixed block).
#[allow(clippy::too_many_arguments)]
fn requantize_short_region(
    channel: &GranuleChannel,
    raw: &[i32; 576],
    xr: &mut [Fixed; 576],
    region_start: usize,
    plane_len: usize,
    is_mpeg1: bool,
    is_mpeg25: bool,
    sri: usize,
) {
    let bands = tables::sfb_short_bands(is_mpeg1, is_mpeg25, sri);
    for (w, &gain) in channel.subblock_gain.iter().enumerate() {
        let plane_base = region_start + w * plane_len;
        for sfb in 0..13 {
            let band_start = bands[sfb] as usize;
            if band_start >= plane_len {
                break;
            }
            let band_end = (bands[sfb + 1] as usize).min(plane_len);

            let sf_index = sfb * 3 + w;
            let scalefac = channel.scalefacs.get(sf_index).copied().unwrap_or(0);
            let exponent = requantize::requantize_exponent(
                channel.global_gain,
                scalefac,
                0,
                channel.scalefac_scale,
                Some(gain),
            );

            for k in band_start..band_end {
                let i = plane_base + k;
                if i >= 576 || i >= channel.rzero {
                    continue;
                }
                let v = raw[i];
                let mag = requantize::requantize(v.unsigned_abs(), exponent);
                xr[i] = if v < 0 { -mag } else { mag };
            }
        }
    }
}

/// Maps a spectral line index to its scalefactor band, for the intensity
/// stereo `is_pos` lookup. Mixed blocks are treated as long for lines
/// `< 36` and short thereafter; see `GranuleChannel::scalefacs`' doc
/// comment for the indexing convention this assumes.
fn sfb_of_line(
    i: usize,
    block_type: BlockType,
    is_mixed: bool,
    is_mpeg1: bool,
    is_mpeg25: bool,
    sri: usize,
) -> Option<usize> {
    if block_type == BlockType::Short {
        let bands = tables::sfb_short_bands(is_mpeg1, is_mpeg25, sri);
        let region_start = if is_mixed { 36 } else { 0 };
        if i < region_start {
            let long_bands = tables::sfb_long_bands(is_mpeg1, is_mpeg25, sri);
            return (0..21).find(|&sfb| i < long_bands[sfb + 1] as usize);
        }
        let plane_len = if is_mixed { 180 } else { 192 };
        let rel = i - region_start;
        let plane = rel / plane_len;
        let within = rel % plane_len;
        (0..13).find(|&sfb| within < bands[sfb + 1] as usize).map(|sfb| sfb * 3 + plane)
    }
    else {
        let bands = tables::sfb_long_bands(is_mpeg1, is_mpeg25, sri);
        (0..21).find(|&sfb| i < bands[sfb + 1] as usize)
    }
}

/// Decodes one frame's main data (both granules' scalefactors, Huffman
/// samples, requantization, stereo, and hybrid synthesis), spec.md §4.7
/// steps 2-6, writing PCM-ready subband samples into `frame.sbsample` and
/// carrying the IMDCT overlap state in `frame.overlap_mut()`.
///
/// `main_data` is the already-spliced byte buffer (reservoir tail followed
/// by this frame's own main-data bytes) the driver assembled using
/// `main_data_begin` from [`read_side_info`]'s result.
pub fn decode_main_data(
    header: &FrameHeader,
    frame_data: &mut FrameData,
    main_data: &[u8],
    stereo_opts: StereoOptions,
    frame: &mut Frame,
) -> Result<()> {
    let mut bits = BitPtr::new(main_data);
    let n_channels = header.n_channels();
    let n_granules = header.n_granules();
    let is_mpeg1 = header.is_mpeg1();
    let is_mpeg25 = matches!(header.version, MpegVersion::Mpeg25);
    let sri = header.sample_rate_index as usize;

    let (is_intensity, is_ms) = match header.channel_mode {
        ChannelMode::JointStereo(ModeExtension::Layer3 { intensity, ms }) => (intensity, ms),
        _ => (false, false),
    };

    for gr in 0..n_granules {
        let mut raw = [[0i32; 576]; 2];

        for ch in 0..n_channels {
            let part2_bits = if is_mpeg1 {
                read_scale_factors_mpeg1(&mut bits, &frame_data.scfsi, gr, ch, &mut frame_data.granules)
            }
            else {
                let is_intensity_channel = is_intensity && ch == 1 && n_channels == 2;
                read_scale_factors_mpeg2(&mut bits, is_intensity_channel, &mut frame_data.granules[gr].channels[ch])
            };

            let channel = &frame_data.granules[gr].channels[ch];
            if part2_bits as u16 > channel.part2_3_length {
                return decode_error(MadError::BadPart3Len);
            }
            let part3_bits = channel.part2_3_length as u32 - part2_bits;

            let rzero = read_huffman_samples(&mut bits, channel, part3_bits, &mut raw[ch])?;
            frame_data.granules[gr].channels[ch].rzero = rzero;
        }

        let mut xr = [[Fixed::ZERO; 576]; 2];
        for ch in 0..n_channels {
            requantize_channel(header, &frame_data.granules[gr].channels[ch], &raw[ch], &mut xr[ch]);
        }

        if n_channels == 2 && (is_intensity || is_ms) {
            let left_bt = frame_data.granules[gr].channels[0].block_type;
            let right_bt = frame_data.granules[gr].channels[1].block_type;
            let right_mixed = frame_data.granules[gr].channels[1].is_mixed;
            let scalefac_compress = frame_data.granules[gr].channels[1].scalefac_compress;
            let scalefacs = frame_data.granules[gr].channels[1].scalefacs;

            let (xr0, xr1) = xr.split_at_mut(1);
            let left = &mut xr0[0];
            let right = &mut xr1[0];

            let bound = if is_intensity { stereo::intensity_bound(right) } else { right.len() };

            if is_ms {
                stereo::apply_ms(left, right, bound);
            }

            if is_intensity {
                let is_pos = |i: usize| {
                    sfb_of_line(i, right_bt, right_mixed, is_mpeg1, is_mpeg25, sri)
                        .map(|sfb| scalefacs[sfb])
                        .unwrap_or(0)
                };

                if is_mpeg1 {
                    stereo::apply_intensity_mpeg1(left, right, bound, is_pos, left_bt, right_bt, stereo_opts)?;
                }
                else {
                    stereo::apply_intensity_lsf(left, right, bound, is_pos, scalefac_compress as u8);
                }
            }
        }

        for ch in 0..n_channels {
            let channel = frame_data.granules[gr].channels[ch].clone();
            let short_bands = tables::sfb_short_bands(is_mpeg1, is_mpeg25, sri);
            hybrid_synthesis::reorder(&mut xr[ch], channel.block_type, channel.is_mixed, short_bands);
            hybrid_synthesis::antialias(&mut xr[ch], channel.block_type, channel.is_mixed);

            let mut out_rows = [[Fixed::ZERO; 32]; 18];
            {
                let overlap = frame.overlap_mut();
                hybrid_synthesis::synthesize(
                    &xr[ch],
                    channel.block_type,
                    channel.is_mixed,
                    &mut overlap[ch],
                    &mut out_rows,
                );
            }
            hybrid_synthesis::frequency_inversion(&mut out_rows);

            let row_base = if is_mpeg1 { gr * 18 } else { 0 };
            for (row, samples) in out_rows.iter().enumerate() {
                frame.sbsample[ch][row_base + row] = *samples;
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{ChannelMode, Emphasis, FrameFlags, MpegLayer};

    fn mono_header() -> FrameHeader {
        FrameHeader {
            version: MpegVersion::Mpeg1,
            layer: MpegLayer::Layer3,
            flags: FrameFlags::empty(),
            channel_mode: ChannelMode::SingleChannel,
            emphasis: Emphasis::None,
            bitrate_index: 9,
            sample_rate_index: 0,
            bitrate: 128_000,
            sample_rate: 44100,
            frame_size: 417,
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
    fn side_info_round_trip_mono_normal_block() {
        let header = mono_header();

        // main_data_begin=0, private(5)=0, scfsi[0..4]=0 for granule0, then
        // two granules of channel-side-info, all normal (non-window-switched)
        // long blocks.
        let granule_fields: &[(u32, u32)] = &[
            (12, 100), // part2_3_length
            (9, 10),   // big_values
            (8, 150),  // global_gain
            (4, 0),    // scalefac_compress
            (1, 0),    // window_switching = false
            (5, 0), (5, 0), (5, 0), // table_select x3
            (4, 0), // region0_count - 1
            (3, 0), // region0_1_count - region0_count - 1
            (1, 0), // preflag
            (1, 0), // scalefac_scale
            (1, 0), // count1table_select
        ];

        let mut fields = vec![(9u32, 0u32), (5, 0), (1, 0), (1, 0), (1, 0), (1, 0)];
        fields.extend_from_slice(granule_fields);
        fields.extend_from_slice(granule_fields);

        let bytes = encode_bits(&fields);
        let mut bits = BitPtr::new(&bytes);
        let frame_data = read_side_info(&mut bits, &header).unwrap();

        assert_eq!(frame_data.main_data_begin, 0);
        assert_eq!(frame_data.granules[0].channels[0].part2_3_length, 100);
        assert_eq!(frame_data.granules[0].channels[0].big_values, 10);
        assert_eq!(frame_data.granules[0].channels[0].global_gain, 150);
        assert_eq!(frame_data.granules[0].channels[0].block_type, BlockType::Long);
    }

    #[test]
    fn zero_part3_bits_yields_all_zero_and_rzero_zero() {
        let channel = GranuleChannel::default();
        let mut raw = [1i32; 576];
        let bytes = [0u8; 4];
        let mut bits = BitPtr::new(&bytes);
        let rzero = read_huffman_samples(&mut bits, &channel, 0, &mut raw).unwrap();
        assert_eq!(rzero, 0);
        assert!(raw.iter().all(|&v| v == 0));
    }

    #[test]
    fn requantize_long_region_zero_raw_is_zero() {
        let header = mono_header();
        let mut channel = GranuleChannel::default();
        channel.rzero = 576;
        channel.global_gain = 150;
        let raw = [0i32; 576];
        let mut xr = [Fixed::ZERO; 576];
        requantize_channel(&header, &channel, &raw, &mut xr);
        assert!(xr.iter().all(|&v| v == Fixed::ZERO));
    }

    #[test]
    fn sfb_of_line_long_block_is_monotonic() {
        assert_eq!(sfb_of_line(0, BlockType::Long, false, true, false, 0), Some(0));
        let last = sfb_of_line(575, BlockType::Long, false, true, false, 0);
        assert_eq!(last, Some(20));
    }
}
