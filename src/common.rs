// mpa-fixed
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Header-level enumerations shared across all three layers, plus the
//! [`Layer`] decode trait each layer implements.

use bitflags::bitflags;

use crate::bit::BitPtr;
use crate::error::Result;
use crate::frame::Frame;
use crate::header::FrameHeader;

bitflags! {
    /// Per-frame boolean attributes, mirroring the reference
    /// implementation's `MAD_FLAG_*` bitmask (`frame.h`) rather than a
    /// struct of loose `bool` fields, since these are naturally a small
    /// closed set of independent header bits.
    pub struct FrameFlags: u16 {
        /// CRC protection word is present (`protection_bit == 0`).
        const PROTECTION   = 0x0001;
        const COPYRIGHT    = 0x0002;
        const ORIGINAL     = 0x0004;
        const PADDING      = 0x0008;
        /// Joint stereo intensity coding is in use (mode_ext bit 0, layer I/II).
        const I_STEREO     = 0x0010;
        /// Joint stereo MS coding is in use (mode_ext bit 1, layer I/II; always implied for layer III joint stereo).
        const MS_STEREO    = 0x0020;
        /// MPEG-2 LSF extension (`id == 0`).
        const LSF_EXT      = 0x0100;
        /// MPEG-2.5 extension.
        const MC_EXT       = 0x0200;
        /// This frame could not be fully decoded (e.g. BUFLEN mid-frame).
        const INCOMPLETE   = 0x0400;
    }
}

/// MPEG version as signalled by the header `ID` bit and the MPEG-2.5
/// unofficial extension (`sync == 0xFFE` with `id == 0`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MpegVersion {
    Mpeg1,
    Mpeg2,
    Mpeg25,
}

impl MpegVersion {
    pub fn is_lsf(self) -> bool {
        !matches!(self, MpegVersion::Mpeg1)
    }
}

/// Which of the three standardized layers this frame carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MpegLayer {
    Layer1,
    Layer2,
    Layer3,
}

/// Joint-stereo mode extension meaning, which differs between Layer I/II
/// (subband bound table) and Layer III (independent intensity/MS flags).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeExtension {
    /// Layer I/II: subbands `[bound, 32)` are intensity-coded, where
    /// `bound = 4 * (mode_ext + 1)`.
    Intensity { bound: u8 },
    /// Layer III: `mode_ext` bit 0 selects intensity stereo, bit 1 selects
    /// MS stereo; both may be active simultaneously.
    Layer3 { intensity: bool, ms: bool },
}

/// Channel mode (the header's 2-bit `mode` field).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelMode {
    Stereo,
    JointStereo(ModeExtension),
    DualChannel,
    SingleChannel,
}

impl ChannelMode {
    pub fn num_channels(self) -> usize {
        match self {
            ChannelMode::SingleChannel => 1,
            _ => 2,
        }
    }
}

/// De-emphasis curve applied during encoding (informational only; this
/// decoder does not reverse it, matching the reference implementation,
/// which leaves de-emphasis to the player).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Emphasis {
    None,
    Fifty15Microseconds,
    CcittJ17,
}

/// Decode trait implemented by each of the three layer decoders, operating
/// on the fixed-point [`Frame`]'s `sbsample` matrix.
pub trait Layer {
    fn decode(&mut self, bits: &mut BitPtr<'_>, header: &FrameHeader, frame: &mut Frame)
    -> Result<()>;
}
