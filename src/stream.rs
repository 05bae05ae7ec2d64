// mpa-fixed
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Stream state: the input buffer window, sync search, frame boundaries,
//! the Layer III main-data reservoir, and the last error code.
//!
//! Grounded on the reference implementation's `struct mad_stream`
//! (`stream.h`), `mad_stream_buffer`/`mad_stream_skip` (`stream.c`), and the
//! two-frame confirmation sync state machine in `mad_frame_header`
//! (`frame.c`).

use log::{debug, trace, warn};

use crate::bit::BitPtr;
use crate::common::{FrameFlags, MpegLayer};
use crate::error::{decode_error, MadError, Result};
use crate::header::{self, FrameHeader};

/// Size of the Layer III main-data back-reference reservoir, spec.md §3.
pub const MAIN_DATA_RESERVOIR_SIZE: usize = 1935;

/// Number of trailing bytes of the current frame body preserved into the
/// reservoir after each frame, so the *next* frame's `main_data_begin` can
/// resolve (spec.md §4.7 step 5). `main_data_begin` is at most 9 bits wide
/// (511 max for MPEG-1), hence 511.
const RESERVOIR_CARRY: usize = 511;

/// Synchronization state machine states, spec.md §4.4.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SyncState {
    Unlocked,
    Locked,
}

/// The circular back-reference buffer for Layer III `main_data`.
#[derive(Default)]
pub struct MainDataReservoir {
    data: Vec<u8>,
}

impl MainDataReservoir {
    pub fn new() -> Self {
        MainDataReservoir { data: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn clear(&mut self) {
        self.data.clear();
    }

    /// Returns the last `main_data_begin` bytes as the start of the
    /// back-referenced region, for concatenation with the current frame's
    /// body bytes.
    pub fn tail(&self, main_data_begin: usize) -> &[u8] {
        let start = self.data.len().saturating_sub(main_data_begin);
        &self.data[start..]
    }

    /// Appends `extra` bytes (the unconsumed tail of the current frame
    /// body) and trims to at most [`RESERVOIR_CARRY`] bytes, per spec.md
    /// §4.7 step 5.
    pub fn refill(&mut self, extra: &[u8]) {
        self.data.extend_from_slice(extra);
        if self.data.len() > RESERVOIR_CARRY {
            let excess = self.data.len() - RESERVOIR_CARRY;
            self.data.drain(0..excess);
        }
    }
}

/// Input buffer window, sync state, and per-run bookkeeping.
pub struct Stream<'a> {
    buffer: &'a [u8],
    /// Bytes to skip before the next sync attempt (from `skip()`).
    skiplen: usize,
    sync_state: SyncState,
    /// Discovered free-format bitrate, once known.
    pub freerate: Option<u32>,
    /// Byte offset of the frame currently being decoded.
    pub this_frame: usize,
    /// Byte offset just past the current frame (start of the next one).
    pub next_frame: usize,
    pub main_data: MainDataReservoir,
    pub error: Option<MadError>,
    /// Whether the previous frame failed CRC, used by the default
    /// concealment policy (spec.md §7).
    pub last_frame_bad_crc: bool,
    /// Ancillary-bit span left over after the Layer I/II payload is
    /// decoded, up to `next_frame` (spec.md §3). Always `None`/`0` for
    /// Layer III, per spec.md §9 Open Question (i).
    pub anc_ptr: Option<BitPtr<'a>>,
    pub anc_bitlen: usize,
}

impl<'a> Stream<'a> {
    /// Lifecycle: initializes an empty stream with no buffer.
    pub fn init() -> Stream<'static> {
        Stream {
            buffer: &[],
            skiplen: 0,
            sync_state: SyncState::Unlocked,
            freerate: None,
            this_frame: 0,
            next_frame: 0,
            main_data: MainDataReservoir::new(),
            error: None,
            last_frame_bad_crc: false,
            anc_ptr: None,
            anc_bitlen: 0,
        }
    }

    /// Records the ancillary-bit span left over after a Layer I/II decode,
    /// spec.md §3. Layer III leaves this at zero length (spec.md §9 Open
    /// Question (i)).
    pub fn set_ancillary(&mut self, ptr: Option<BitPtr<'a>>, bitlen: usize) {
        self.anc_ptr = ptr;
        self.anc_bitlen = bitlen;
    }

    /// Lifecycle: releases any owned resources. The reservoir and window
    /// are dropped with the `Stream` itself; this exists to mirror the
    /// reference API's explicit `finish()` step.
    pub fn finish(self) {}

    /// Replaces the input window with `buf` and clears sync lock, per
    /// spec.md §4.3.
    pub fn buffer(&mut self, buf: &'a [u8]) {
        self.buffer = buf;
        self.this_frame = 0;
        self.next_frame = 0;
        self.sync_state = SyncState::Unlocked;
    }

    /// Requests that `n` bytes be skipped before the next sync attempt
    /// (e.g. to step over a detected junk/tag region).
    pub fn skip(&mut self, n: usize) {
        self.skiplen += n;
    }

    pub fn bufend(&self) -> usize {
        self.buffer.len()
    }

    fn remaining(&self) -> &'a [u8] {
        &self.buffer[self.next_frame.min(self.buffer.len())..]
    }

    /// Scans forward from the current bit position for the 12-bit sync
    /// word (`0xFFE`/`0xFFF`), per spec.md §4.3. Fails with `BufLen` if
    /// none is found before the end of the window.
    pub fn sync(&mut self) -> Result<()> {
        if self.skiplen > 0 {
            self.next_frame += self.skiplen;
            self.skiplen = 0;
        }

        let window = self.remaining();
        let mut bits = BitPtr::new(window);
        if header::find_sync(&mut bits) {
            let advanced = window.len() - bits.remaining_bytes().len();
            self.next_frame += advanced;
            Ok(())
        }
        else {
            self.error = Some(MadError::BufLen);
            decode_error(MadError::BufLen)
        }
    }

    /// Attempts to locate, parse, and validate the next frame header,
    /// running the two-state sync confirmation machine from spec.md §4.4.
    /// On success, `this_frame`/`next_frame` bound the frame and the
    /// returned `BitPtr` is positioned immediately after the header (and
    /// CRC word, if present).
    pub fn next_header(&mut self) -> Result<(FrameHeader, BitPtr<'a>)> {
        loop {
            match self.sync_state {
                SyncState::Unlocked => {
                    self.sync()?;

                    let candidate_start = self.next_frame;
                    let window = &self.buffer[candidate_start..];
                    let mut bits = BitPtr::new(window);

                    let header = match header::parse_frame_header(&mut bits) {
                        Ok(h) => h,
                        Err(_) => {
                            self.next_frame = candidate_start + 1;
                            continue;
                        }
                    };

                    // Two-frame confirmation: the next candidate frame (at
                    // this_frame + N) must also begin with a sync word.
                    let frame_len = header.frame_size as usize;
                    let next_candidate = candidate_start + frame_len;
                    if frame_len == 0 || next_candidate + 2 > self.buffer.len() {
                        // Not enough data yet to confirm; ask for more.
                        self.error = Some(MadError::BufLen);
                        return decode_error(MadError::BufLen);
                    }

                    let probe = u32::from(self.buffer[next_candidate]) << 8
                        | u32::from(self.buffer[next_candidate + 1]);
                    if (probe & 0xffe0) != 0xffe0 {
                        self.next_frame = candidate_start + 1;
                        continue;
                    }

                    debug!("sync locked at byte {}", candidate_start);
                    self.sync_state = SyncState::Locked;
                    self.this_frame = candidate_start;
                    self.next_frame = next_candidate;
                    return self.finish_header(header, candidate_start);
                }
                SyncState::Locked => {
                    let candidate_start = self.next_frame;
                    if candidate_start + 2 > self.buffer.len() {
                        self.error = Some(MadError::BufLen);
                        return decode_error(MadError::BufLen);
                    }

                    let window = &self.buffer[candidate_start..];
                    let mut bits = BitPtr::new(window);

                    match header::parse_frame_header(&mut bits) {
                        Ok(header) => {
                            self.this_frame = candidate_start;
                            self.next_frame = candidate_start + header.frame_size as usize;
                            return self.finish_header(header, candidate_start);
                        }
                        Err(_) => {
                            warn!("lost sync at byte {}", candidate_start);
                            self.sync_state = SyncState::Unlocked;
                            self.error = Some(MadError::LostSync);
                            return decode_error(MadError::LostSync);
                        }
                    }
                }
            }
        }
    }

    fn finish_header(
        &mut self,
        mut header: FrameHeader,
        candidate_start: usize,
    ) -> Result<(FrameHeader, BitPtr<'a>)> {
        // Free-format bitrate discovery: bitrate_index == 0.
        if header.bitrate_index == 0 {
            if let Some(rate) = self.freerate {
                header.apply_free_bitrate(rate);
            }
            else {
                match self.discover_free_bitrate(&header, candidate_start) {
                    Some(rate) => {
                        self.freerate = Some(rate);
                        header.apply_free_bitrate(rate);
                    }
                    None => {
                        self.error = Some(MadError::LostSync);
                        return decode_error(MadError::LostSync);
                    }
                }
            }
        }

        // Bound check: if the computed frame doesn't fit in the window,
        // rewind and ask for more data (spec.md §4.4).
        let frame_end = candidate_start + header.frame_size as usize;
        if frame_end > self.buffer.len() {
            self.next_frame = candidate_start;
            self.error = Some(MadError::BufLen);
            return decode_error(MadError::BufLen);
        }

        let header_bits_consumed = if header.crc_target.is_some() { 48 } else { 32 };
        let body = &self.buffer[candidate_start..frame_end];
        let bits = BitPtr::at_bit_offset(body, header_bits_consumed);

        trace!(
            "frame @ {}: layer={:?} bitrate={} sfreq={}",
            candidate_start,
            header.layer,
            header.bitrate,
            header.sample_rate
        );

        self.error = None;
        Ok((header, bits))
    }

    fn discover_free_bitrate(&self, header: &FrameHeader, start: usize) -> Option<u32> {
        // Scan forward for the next header with identical layer and sample rate.
        let mut probe_start = start + 1;
        while probe_start + 4 <= self.buffer.len() {
            let window = &self.buffer[probe_start..];
            let mut bits = BitPtr::new(window);
            if let Ok(candidate) = header::parse_frame_header(&mut bits) {
                if candidate.layer == header.layer && candidate.sample_rate == header.sample_rate {
                    let n = (probe_start - start) as u32;
                    return header::free_bitrate(
                        header.version,
                        header.layer,
                        header.sample_rate,
                        n,
                        header.flags.contains(FrameFlags::PADDING),
                    );
                }
            }
            probe_start += 1;
        }
        None
    }

    /// Raw bytes of the current frame body, used by Layer III's main-data
    /// reservoir bookkeeping.
    pub fn current_frame_body(&self) -> &'a [u8] {
        &self.buffer[self.this_frame..self.next_frame.min(self.buffer.len())]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_mp3_frame(bitrate_index: u8, sample_rate_index: u8, padding: bool) -> Vec<u8> {
        // sync, id=1 (mpeg1), layer=01 (III), protection=1 (no crc)
        let mut bytes = vec![0u8; 4];
        bytes[0] = 0xff;
        bytes[1] = 0xfa; // 1111_1010: id=1, layer=01, protection=1(no crc) wait recompute
        // Build precisely via bit writer to avoid mistakes.
        bytes = Vec::new();
        let fields: &[(u32, u32)] = &[
            (12, 0xfff),
            (1, 1),
            (2, 0b01),
            (1, 1),
            (4, bitrate_index as u32),
            (2, sample_rate_index as u32),
            (1, u32::from(padding)),
            (1, 0),
            (2, 0b00),
            (2, 0b00),
            (1, 0),
            (1, 0),
            (2, 0b00),
        ];
        let mut bits = Vec::new();
        for &(n, v) in fields {
            for i in (0..n).rev() {
                bits.push((v >> i) & 1 != 0);
            }
        }
        let mut out = vec![0u8; (bits.len() + 7) / 8];
        for (i, &b) in bits.iter().enumerate() {
            if b {
                out[i / 8] |= 1 << (7 - (i % 8));
            }
        }
        bytes.extend_from_slice(&out);
        bytes
    }

    #[test]
    fn sync_finds_header_after_junk_prefix() {
        let mut data = vec![0u8; 8];
        let frame = make_mp3_frame(9, 0, false); // 128kbps, 44100
        data.extend_from_slice(&frame);
        // Pad to cover one full frame length plus a following sync probe.
        let frame_len = {
            let mut bits = BitPtr::new(&frame);
            header::parse_frame_header(&mut bits).unwrap().frame_size as usize
        };
        data.resize(8 + frame_len + 4, 0);
        data[8 + frame_len] = 0xff;
        data[8 + frame_len + 1] = 0xfb;

        let mut stream = Stream::init();
        stream.buffer(&data);
        let result = stream.next_header();
        assert!(result.is_ok());
        let (header, _) = result.unwrap();
        assert_eq!(header.bitrate, 128_000);
    }

    #[test]
    fn reservoir_tail_and_refill() {
        let mut res = MainDataReservoir::new();
        res.refill(&[1, 2, 3, 4, 5]);
        assert_eq!(res.tail(3), &[3, 4, 5]);
        assert_eq!(res.len(), 5);
    }
}
