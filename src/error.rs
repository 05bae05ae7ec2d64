// mpa-fixed
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error codes for the decoder, numbered exactly as the reference fixed-point
//! implementation's `mad_error` enumeration so that the high byte carries
//! recoverability: `code & 0xff00 != 0` means the driver may continue with
//! the next frame.

use std::fmt;

/// A decoding error. The discriminants match the reference implementation's
/// numeric `mad_error` codes bit-for-bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum MadError {
    /// Input buffer too small; caller must supply more data.
    BufLen = 0x0001,
    /// Invalid (null) buffer pointer.
    BufPtr = 0x0002,
    /// Not enough memory.
    NoMem = 0x0031,
    /// Lost synchronization.
    LostSync = 0x0101,
    /// Reserved header layer value.
    BadLayer = 0x0102,
    /// Forbidden bitrate value.
    BadBitrate = 0x0103,
    /// Reserved sample frequency value.
    BadSampleFreq = 0x0104,
    /// Reserved emphasis value.
    BadEmphasis = 0x0105,
    /// CRC check failed.
    BadCrc = 0x0201,
    /// Forbidden bit allocation value.
    BadBitAlloc = 0x0211,
    /// Bad scalefactor index.
    BadScalefactor = 0x0221,
    /// Bad frame length.
    BadFrameLen = 0x0231,
    /// Bad big_values count.
    BadBigValues = 0x0232,
    /// Reserved block_type.
    BadBlockType = 0x0233,
    /// Bad main_data_begin pointer.
    BadDataPtr = 0x0234,
    /// Bad main_data length.
    BadDataLen = 0x0235,
    /// Bad audio data length (part2_3_length).
    BadPart3Len = 0x0236,
    /// Bad Huffman table select.
    BadHuffTable = 0x0237,
    /// Huffman data overrun / malformed bitstream.
    BadHuffData = 0x0238,
    /// Incompatible block_type for MS stereo.
    BadStereo = 0x0239,
}

impl MadError {
    /// Returns the numeric error code.
    pub fn code(self) -> u16 {
        self as u16
    }

    /// True when the high byte of the error code is nonzero, i.e. the
    /// decoder may safely continue with the next frame rather than aborting
    /// the run. Mirrors `MAD_RECOVERABLE(error) = (error) & 0xff00`.
    pub fn is_recoverable(self) -> bool {
        recoverable(self)
    }
}

/// Free-function form of [`MadError::is_recoverable`], kept alongside the
/// method so call sites can write `recoverable(err)` the way the reference
/// implementation's `MAD_RECOVERABLE` macro reads.
pub fn recoverable(error: MadError) -> bool {
    (error.code() & 0xff00) != 0
}

impl fmt::Display for MadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            MadError::BufLen => "input buffer too small",
            MadError::BufPtr => "invalid buffer pointer",
            MadError::NoMem => "not enough memory",
            MadError::LostSync => "lost synchronization",
            MadError::BadLayer => "reserved header layer value",
            MadError::BadBitrate => "forbidden bitrate value",
            MadError::BadSampleFreq => "reserved sample frequency value",
            MadError::BadEmphasis => "reserved emphasis value",
            MadError::BadCrc => "CRC check failed",
            MadError::BadBitAlloc => "forbidden bit allocation value",
            MadError::BadScalefactor => "bad scalefactor index",
            MadError::BadFrameLen => "bad frame length",
            MadError::BadBigValues => "bad big_values count",
            MadError::BadBlockType => "reserved block_type",
            MadError::BadDataPtr => "bad main_data_begin pointer",
            MadError::BadDataLen => "bad main_data length",
            MadError::BadPart3Len => "bad audio data length",
            MadError::BadHuffTable => "bad Huffman table select",
            MadError::BadHuffData => "Huffman data overrun",
            MadError::BadStereo => "incompatible block_type for MS stereo",
        };
        write!(f, "{} (0x{:04x})", msg, self.code())
    }
}

impl std::error::Error for MadError {}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, MadError>;

/// Constructs an `Err` directly from a [`MadError`], so call sites read
/// `return decode_error(MadError::BadCrc);` instead of `Err(...)`.
pub fn decode_error<T>(error: MadError) -> Result<T> {
    Err(error)
}
