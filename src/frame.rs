// mpa-fixed
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The per-frame decode target: header plus the subband-sample matrix and
//! (Layer III only) the IMDCT overlap buffer, per spec.md §3 "Header/Frame
//! record".

use crate::fixed::Fixed;
use crate::header::FrameHeader;

/// Maximum subband-sample rows any frame type produces (MPEG-1 Layer II/III: 36).
pub const MAX_NSBSAMPLES: usize = 36;

/// One decoded frame: header plus `sbsample[ch][row][subband]`, and the
/// lazily-allocated Layer III overlap buffer the frame exclusively owns
/// (spec.md "Ownership").
pub struct Frame {
    pub header: Option<FrameHeader>,
    pub sbsample: [[[Fixed; 32]; MAX_NSBSAMPLES]; 2],
    /// `overlap[ch][sb][0..18]`, allocated on first Layer III frame.
    overlap: Option<Box<[[[Fixed; 18]; 32]; 2]>>,
}

impl Default for Frame {
    fn default() -> Self {
        Frame { header: None, sbsample: [[[Fixed::ZERO; 32]; MAX_NSBSAMPLES]; 2], overlap: None }
    }
}

impl Frame {
    pub fn new() -> Self {
        Self::default()
    }

    /// Zeroes all subband samples, for the "mute" concealment policy applied
    /// after an unrecoverable mid-frame error (spec.md §7).
    pub fn mute(&mut self) {
        for ch in self.sbsample.iter_mut() {
            for row in ch.iter_mut() {
                for sample in row.iter_mut() {
                    *sample = Fixed::ZERO;
                }
            }
        }
        if let Some(overlap) = self.overlap.as_mut() {
            for ch in overlap.iter_mut() {
                for sb in ch.iter_mut() {
                    for sample in sb.iter_mut() {
                        *sample = Fixed::ZERO;
                    }
                }
            }
        }
    }

    /// Returns the Layer III overlap buffer, allocating it on first use.
    pub fn overlap_mut(&mut self) -> &mut [[[Fixed; 18]; 32]; 2] {
        if self.overlap.is_none() {
            self.overlap = Some(Box::new([[[Fixed::ZERO; 18]; 32]; 2]));
        }
        self.overlap.as_mut().unwrap()
    }

    pub fn has_overlap(&self) -> bool {
        self.overlap.is_some()
    }
}
