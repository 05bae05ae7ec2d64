// mpa-fixed
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The decoder driver: the pull loop tying together stream sync, header
//! parsing, per-layer payload decode, and polyphase synthesis behind a
//! small user-callback surface, spec.md §4.9 and §6.
//!
//! Grounded on libmad's `mad_decoder_run` (`decoder.c`): a cooperative,
//! single-threaded loop where all I/O happens inside user callbacks and the
//! only control-flow primitive is the four-valued flow code
//! (`MAD_FLOW_CONTINUE`/`STOP`/`BREAK`/`IGNORE`). Re-expressed here as a
//! Rust trait of callback methods (`DecoderCallbacks`) rather than a struct
//! of C function pointers plus a `void *data`, the same preference for
//! trait objects over callback tables this crate uses elsewhere (e.g.
//! `common::Layer`).

use log::{trace, warn};

use crate::common::MpegLayer;
use crate::error::{decode_error, MadError, Result};
use crate::fixed::{Fixed, MulMode};
use crate::frame::{Frame, MAX_NSBSAMPLES};
use crate::header::FrameHeader;
use crate::layer1::Layer1;
use crate::layer2::Layer2;
use crate::layer3::{self, StereoOptions};
use crate::stream::Stream;
use crate::synthesis::{self, SynthAccuracy, SynthesisState};

use crate::common::Layer as LayerTrait;

/// Return value from a user callback, directing the driver's next action,
/// spec.md §4.9/§6.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowCode {
    /// Proceed normally (the default).
    Continue,
    /// Terminate the run normally.
    Stop,
    /// Terminate the run with an abnormal/error exit.
    Break,
    /// Skip the remainder of the current step and retry it.
    Ignore,
}

/// Selects how the driver conceals a recoverable mid-frame decode error,
/// spec.md §7 and §4.9: "On a decoding error where the last frame had CRC
/// failure, the default error handler mutes the new frame; otherwise it
/// preserves prior subband samples to conceal the gap."
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConcealmentPolicy {
    /// The reference default described above.
    Default,
    /// Always mute on any recoverable decode error, ignoring history.
    AlwaysMute,
}

impl Default for ConcealmentPolicy {
    fn default() -> Self {
        ConcealmentPolicy::Default
    }
}

/// Runtime-selectable knobs, spec.md §9 "Conditional compilation of
/// arithmetic" and "Intensity-stereo MS kludge".
#[derive(Debug, Clone, Copy)]
pub struct DecoderOptions {
    /// Accuracy mode for the one true Q4.28 multiply primitive, spec.md §4.1.
    pub mul_mode: MulMode,
    /// Synthesis filter accumulation precision, spec.md §4.8 "SSO".
    pub synth_accuracy: SynthAccuracy,
    /// Layer III stereo recombination switches, spec.md §4.7/§9.
    pub stereo: StereoOptions,
    /// Concealment policy for recoverable mid-frame errors, spec.md §7.
    pub concealment: ConcealmentPolicy,
}

impl Default for DecoderOptions {
    fn default() -> Self {
        DecoderOptions {
            mul_mode: MulMode::default(),
            synth_accuracy: SynthAccuracy::default(),
            stereo: StereoOptions::default(),
            concealment: ConcealmentPolicy::default(),
        }
    }
}

/// One frame's reconstructed PCM output, spec.md §3 "PCM output": up to
/// 1152 samples per channel, with `length` giving the actual count (384 for
/// Layer I, 576 for LSF Layer III, 1152 otherwise).
pub struct Pcm {
    pub samples: [[Fixed; 1152]; 2],
    pub length: usize,
    pub nchannels: usize,
    pub sample_rate: u32,
}

impl Pcm {
    fn empty() -> Self {
        Pcm { samples: [[Fixed::ZERO; 1152]; 2], length: 0, nchannels: 0, sample_rate: 0 }
    }
}

/// User callback surface, spec.md §4.9/§6. Only `input` and `output` must
/// do anything meaningful; the rest default to `Continue`.
///
/// Unlike libmad's `void *data` parameter threaded through every callback,
/// implementors hold their own state directly (as fields on the type that
/// implements this trait), which is the idiomatic Rust equivalent.
pub trait DecoderCallbacks<'a> {
    /// Supplies or extends the input window. Typical implementations call
    /// [`Stream::buffer`] with a slice that outlives the decoder run
    /// (spec.md "Ownership": the caller owns the input buffer; the stream
    /// only ever borrows it).
    fn input(&mut self, stream: &mut Stream<'a>) -> FlowCode;

    /// Called once a frame header parses successfully, before payload
    /// decode.
    fn header(&mut self, _header: &FrameHeader) -> FlowCode {
        FlowCode::Continue
    }

    /// Called after the layer decoder has filled `frame.sbsample`, before
    /// synthesis runs. A caller may mutate `frame` here (e.g. to apply a
    /// custom concealment override).
    fn filter(&mut self, _frame: &mut Frame) -> FlowCode {
        FlowCode::Continue
    }

    /// Called with the finished PCM for one frame.
    fn output(&mut self, header: &FrameHeader, pcm: &Pcm) -> FlowCode;

    /// Called whenever a decode error occurs, before the default
    /// concealment policy runs.
    fn error(&mut self, _error: MadError, _stream: &Stream<'a>, _frame: &Frame) -> FlowCode {
        FlowCode::Continue
    }
}

/// Owns the stream/frame/synth triple for the lifetime of one `run`,
/// spec.md §3 "Ownership" and §4.9.
pub struct Decoder<'a> {
    options: DecoderOptions,
    stream: Stream<'a>,
    frame: Frame,
    synth: [SynthesisState; 2],
}

impl<'a> Decoder<'a> {
    /// Lifecycle: initializes an empty stream/frame/synth triple with the
    /// given options. Call [`Decoder::stream_mut`] (typically from the
    /// `input` callback) to supply the first buffer.
    pub fn init(options: DecoderOptions) -> Decoder<'a> {
        Decoder {
            options,
            stream: Stream::init(),
            frame: Frame::new(),
            synth: [SynthesisState::new(), SynthesisState::new()],
        }
    }

    /// Replaces the active option set (e.g. to flip `MulMode` or
    /// `SynthAccuracy` between runs).
    pub fn options(&mut self, options: DecoderOptions) {
        self.options = options;
    }

    pub fn stream_mut(&mut self) -> &mut Stream<'a> {
        &mut self.stream
    }

    /// Lifecycle: releases owned resources. Mirrors the reference API's
    /// explicit `finish()` step; the fields are dropped with `self` anyway.
    pub fn finish(self) {}

    /// Runs the pull loop of spec.md §4.9 to completion, or until a
    /// callback requests early exit. Returns `Ok(())` on normal `STOP`
    /// (including a caller-issued `STOP`/`BREAK` from any callback) and
    /// `Err(())` only on an unrecoverable decode error with no callback
    /// override.
    pub fn run<C>(&mut self, callbacks: &mut C) -> std::result::Result<(), ()>
    where
        C: DecoderCallbacks<'a>,
    {
        loop {
            match callbacks.input(&mut self.stream) {
                FlowCode::Stop => return Ok(()),
                FlowCode::Break => return Err(()),
                FlowCode::Ignore => continue,
                FlowCode::Continue => {}
            }

            match self.run_until_more_input_needed(callbacks) {
                LoopExit::NeedMoreInput => continue,
                LoopExit::Stop => return Ok(()),
                LoopExit::Break => return Err(()),
            }
        }
    }

    fn run_until_more_input_needed<C>(&mut self, callbacks: &mut C) -> LoopExit
    where
        C: DecoderCallbacks<'a>,
    {
        loop {
            match self.decode_one_frame() {
                Ok(header) => {
                    match callbacks.header(&header) {
                        FlowCode::Stop => return LoopExit::Stop,
                        FlowCode::Break => return LoopExit::Break,
                        FlowCode::Ignore => continue,
                        FlowCode::Continue => {}
                    }

                    match callbacks.filter(&mut self.frame) {
                        FlowCode::Stop => return LoopExit::Stop,
                        FlowCode::Break => return LoopExit::Break,
                        FlowCode::Ignore => continue,
                        FlowCode::Continue => {}
                    }

                    let pcm = self.synthesize_frame(&header);

                    match callbacks.output(&header, &pcm) {
                        FlowCode::Stop => return LoopExit::Stop,
                        FlowCode::Break => return LoopExit::Break,
                        FlowCode::Ignore | FlowCode::Continue => {}
                    }
                }
                Err(error) => {
                    self.stream.error = Some(error);
                    match callbacks.error(error, &self.stream, &self.frame) {
                        FlowCode::Stop => return LoopExit::Stop,
                        FlowCode::Break => return LoopExit::Break,
                        FlowCode::Ignore | FlowCode::Continue => {}
                    }

                    // BUFLEN/BUFPTR are "soft": go back to the input
                    // callback for more data rather than treating this as
                    // an abnormal exit (spec.md §7 "I/O truncation").
                    if matches!(error, MadError::BufLen | MadError::BufPtr) {
                        return LoopExit::NeedMoreInput;
                    }

                    if !error.is_recoverable() {
                        warn!("unrecoverable decode error: {}", error);
                        return LoopExit::Break;
                    }
                }
            }
        }
    }

    /// Parses and decodes the next frame's payload, applying the
    /// concealment policy on a recoverable mid-frame error. Returns the
    /// frame's header on success.
    fn decode_one_frame(&mut self) -> Result<FrameHeader> {
        let (header, mut bits) = self.stream.next_header()?;

        let backup = self.frame.sbsample;

        let result = match header.layer {
            MpegLayer::Layer1 => {
                let mut layer = Layer1::new();
                let r = layer.decode(&mut bits, &header, &mut self.frame);
                self.stream.set_ancillary(Some(bits), bits.bits_remaining());
                r
            }
            MpegLayer::Layer2 => {
                let mut layer = Layer2::new();
                let r = layer.decode(&mut bits, &header, &mut self.frame);
                self.stream.set_ancillary(Some(bits), bits.bits_remaining());
                r
            }
            MpegLayer::Layer3 => {
                self.stream.set_ancillary(None, 0);
                self.decode_layer3(&header, &mut bits)
            }
        };

        match result {
            Ok(()) => {
                self.stream.last_frame_bad_crc = false;
                self.frame.header = Some(header.clone());
                self.stream.error = None;
                Ok(header)
            }
            Err(error) => {
                self.conceal(error, backup);
                Err(error)
            }
        }
    }

    /// Layer III's entry point differs from Layer I/II's (spec.md §4.7):
    /// side info is read directly from the current frame's bits, but the
    /// main data it describes may begin up to 511 bytes *before* this
    /// frame's own body, inside the reservoir the driver maintains
    /// (spec.md §9 "Back-reference reservoir").
    fn decode_layer3(&mut self, header: &FrameHeader, bits: &mut crate::bit::BitPtr<'a>) -> Result<()> {
        let mut frame_data = layer3::read_side_info(bits, header)?;

        let body = self.stream.current_frame_body();
        let side_info_end = match bits.byte_aligned_offset() {
            Some(offset) => offset,
            None => return decode_error(MadError::BadFrameLen),
        };

        let main_data_begin = frame_data.main_data_begin as usize;

        let mut assembled: Vec<u8> = Vec::with_capacity(main_data_begin + body.len() - side_info_end);

        if main_data_begin > 0 {
            if main_data_begin > self.stream.main_data.len() {
                // spec.md §9 Open Question (ii): always mute on this path.
                return decode_error(MadError::BadDataPtr);
            }
            assembled.extend_from_slice(self.stream.main_data.tail(main_data_begin));
        }

        assembled.extend_from_slice(&body[side_info_end..]);

        trace!("layer3 main_data_begin={} assembled={}", main_data_begin, assembled.len());

        let result =
            layer3::decode_main_data(header, &mut frame_data, &assembled, self.options.stereo, &mut self.frame);

        self.stream.main_data.refill(&body[side_info_end..]);

        result
    }

    /// Applies spec.md §7/§4.9's default concealment policy: mute if the
    /// error is a `main_data_begin` back-reference fault (spec.md §9 Open
    /// Question (ii)) or if the previous frame also failed CRC; otherwise
    /// restore the pre-decode subband samples so a single glitch freezes
    /// rather than corrupts the output.
    fn conceal(&mut self, error: MadError, backup: [[[Fixed; 32]; MAX_NSBSAMPLES]; 2]) {
        let should_mute = error == MadError::BadDataPtr
            || self.stream.last_frame_bad_crc
            || self.options.concealment == ConcealmentPolicy::AlwaysMute;

        if should_mute {
            self.frame.mute();
            // Muting a frame must not leak stale synthesis history into the
            // next good frame's overlap-add (synthesis.rs's `mute()` doc).
            self.synth[0].mute();
            self.synth[1].mute();
        }
        else {
            self.frame.sbsample = backup;
        }
        self.stream.last_frame_bad_crc = error == MadError::BadCrc;
    }

    /// Runs the 32-band polyphase synthesis filter over this frame's
    /// subband samples for every channel, spec.md §4.8.
    fn synthesize_frame(&mut self, header: &FrameHeader) -> Pcm {
        let nrows = header.nsbsamples() as usize;
        let nchannels = header.n_channels();

        let mut pcm = Pcm::empty();
        pcm.nchannels = nchannels;
        pcm.sample_rate = header.sample_rate;
        pcm.length = 32 * nrows;

        for ch in 0..nchannels {
            let rows = &self.frame.sbsample[ch][0..nrows];
            synthesis::synthesize(
                &mut self.synth[ch],
                rows,
                &mut pcm.samples[ch][0..32 * nrows],
                self.options.mul_mode,
                self.options.synth_accuracy,
            );
        }

        pcm
    }
}

enum LoopExit {
    NeedMoreInput,
    Stop,
    Break,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{ChannelMode, Emphasis, FrameFlags, MpegLayer, MpegVersion};

    struct CountingCallbacks {
        inputs: u32,
        outputs: u32,
        buf: &'static [u8],
        fed: bool,
    }

    impl<'a> DecoderCallbacks<'a> for CountingCallbacks {
        fn input(&mut self, stream: &mut Stream<'a>) -> FlowCode {
            self.inputs += 1;
            if self.fed {
                return FlowCode::Stop;
            }
            self.fed = true;
            stream.buffer(self.buf);
            FlowCode::Continue
        }

        fn output(&mut self, _header: &FrameHeader, pcm: &Pcm) -> FlowCode {
            self.outputs += 1;
            assert!(pcm.length > 0);
            FlowCode::Continue
        }
    }

    fn mono_header_bytes(frame_size: u32) -> Vec<u8> {
        // Not used directly; kept for documentation of intent.
        let _ = frame_size;
        Vec::new()
    }

    #[test]
    fn empty_buffer_requests_input_then_stops() {
        let _ = mono_header_bytes(0);
        let mut decoder = Decoder::init(DecoderOptions::default());
        let mut cb = CountingCallbacks { inputs: 0, outputs: 0, buf: &[], fed: false };
        let result = decoder.run(&mut cb);
        assert!(result.is_ok());
        assert!(cb.inputs >= 1);
        assert_eq!(cb.outputs, 0);
    }

    #[test]
    fn concealment_mutes_after_repeated_bad_crc() {
        let mut decoder = Decoder::init(DecoderOptions::default());
        decoder.frame.sbsample[0][0][0] = Fixed::ONE;
        decoder.stream.last_frame_bad_crc = true;
        let backup = decoder.frame.sbsample;
        decoder.conceal(MadError::BadCrc, backup);
        assert!(decoder.frame.sbsample[0][0][0] == Fixed::ZERO);
    }

    #[test]
    fn concealment_preserves_prior_when_not_repeated() {
        let mut decoder = Decoder::init(DecoderOptions::default());
        decoder.stream.last_frame_bad_crc = false;
        let mut backup = decoder.frame.sbsample;
        backup[0][0][0] = Fixed::ONE;
        decoder.conceal(MadError::BadHuffData, backup);
        assert_eq!(decoder.frame.sbsample[0][0][0], Fixed::ONE);
        // A subsequent bad-CRC frame now sees last_frame_bad_crc == false
        // (only BadCrc itself sets the flag).
        assert!(!decoder.stream.last_frame_bad_crc);
    }

    #[test]
    fn bad_data_ptr_always_mutes_regardless_of_history() {
        let mut decoder = Decoder::init(DecoderOptions::default());
        decoder.stream.last_frame_bad_crc = false;
        let mut backup = decoder.frame.sbsample;
        backup[1][2][3] = Fixed::ONE;
        decoder.conceal(MadError::BadDataPtr, backup);
        assert_eq!(decoder.frame.sbsample[1][2][3], Fixed::ZERO);
    }

    fn stub_header() -> FrameHeader {
        FrameHeader {
            version: MpegVersion::Mpeg1,
            layer: MpegLayer::Layer3,
            flags: FrameFlags::empty(),
            channel_mode: ChannelMode::Stereo,
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

    #[test]
    fn synthesize_frame_reports_correct_length_and_channels() {
        let mut decoder = Decoder::init(DecoderOptions::default());
        let header = stub_header();
        let pcm = decoder.synthesize_frame(&header);
        assert_eq!(pcm.length, 1152);
        assert_eq!(pcm.nchannels, 2);
        assert_eq!(pcm.sample_rate, 44100);
    }
}
