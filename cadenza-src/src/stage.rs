// Cadenza
// Copyright (c) 2026 The Project Cadenza Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `stage` module runs one polyphase stage: ingest a block of frames into the FIR delay
//! line, run every subfilter, and drain the reordered results from the output delay line.
//!
//! Both delay lines are circular. The FIR delay line is written downward from the top and
//! its size is a multiple of the channel count, so a wrap can never split a frame and the
//! kernel's read window stays frame-aligned. External buffers are consumed and filled in
//! chunks bounded by both the ring-wrap and the delay-wrap distance.

use cadenza_core::util::clamp::clamp_i16;

use crate::coefs::{CoefSlice, SrcStage};
use crate::fir::{fir_filter, CoefFormat, Q15, Q23};

/// A PCM container the stage can stream directly.
pub trait StageSample: Copy {
    /// Widens a sample to Q1.31 on ingest. `shift` is the format data shift (8 for
    /// 24-in-32) and must be 0 for 16-bit samples.
    fn to_q31(self, shift: u32) -> i32;

    /// Narrows a Q1.31 sample for egress, inverting `to_q31`.
    fn from_q31(v: i32, shift: u32) -> Self;
}

impl StageSample for i32 {
    #[inline(always)]
    fn to_q31(self, shift: u32) -> i32 {
        // Sign-extends 24-in-32 samples; garbage above bit 23 is shifted out.
        self.wrapping_shl(shift)
    }

    #[inline(always)]
    fn from_q31(v: i32, shift: u32) -> i32 {
        v >> shift
    }
}

impl StageSample for i16 {
    #[inline(always)]
    fn to_q31(self, _shift: u32) -> i32 {
        i32::from(self) << 16
    }

    #[inline(always)]
    fn from_q31(v: i32, _shift: u32) -> i16 {
        // Round half a Q1.15 LSB and saturate; full-scale inputs can round one step past
        // i16::MAX otherwise.
        clamp_i16(((v >> 15) + 1) >> 1)
    }
}

/// Mutable state of one polyphase stage.
#[derive(Debug, Default)]
pub struct SrcState {
    pub fir_delay: Vec<i32>,
    pub out_delay: Vec<i32>,
    /// Next FIR delay write index; moves downward.
    pub fir_wi: usize,
    /// Next output delay read index; moves upward.
    pub out_ri: usize,
}

impl SrcState {
    /// Sizes the delay lines, dropping or keeping existing allocations of matching size,
    /// and rewinds the state to silence.
    pub fn resize(&mut self, fir_size: usize, out_size: usize) {
        if self.fir_delay.len() != fir_size {
            self.fir_delay = vec![0; fir_size];
        }
        if self.out_delay.len() != out_size {
            self.out_delay = vec![0; out_size];
        }
        self.reset();
    }

    /// Clears delay history. Starting the write index at the top guarantees that a circular
    /// wrap cannot happen mid-frame since the sizes are multiples of the channel count.
    pub fn reset(&mut self) {
        self.fir_delay.fill(0);
        self.out_delay.fill(0);
        self.fir_wi = self.fir_delay.len().saturating_sub(1);
        self.out_ri = 0;
    }

    pub fn release(&mut self) {
        self.fir_delay = Vec::new();
        self.out_delay = Vec::new();
        self.fir_wi = 0;
        self.out_ri = 0;
    }
}

/// One stage pass over external circular buffers.
pub struct StageIo<'a, S> {
    /// Source ring storage.
    pub x: &'a [S],
    /// Read position within `x`.
    pub x_pos: usize,
    /// Sink ring storage.
    pub y: &'a mut [S],
    /// Write position within `y`.
    pub y_pos: usize,
    /// How many blocks to process.
    pub times: usize,
    pub nch: usize,
    /// Data shift for 32-bit containers: 8 for 24-in-32, 0 otherwise.
    pub shift: u32,
}

/// Runs `io.times` blocks of `cfg` against `state`, returning the advanced source and sink
/// positions.
///
/// The caller must guarantee that `io.x` holds `times * blk_in` frames at `x_pos` and that
/// `io.y` has room for `times * num_of_subfilters` frames at `y_pos`, modulo wrap.
pub fn src_polyphase_stage_cir<S: StageSample>(
    state: &mut SrcState,
    cfg: &'static SrcStage,
    io: &mut StageIo<'_, S>,
) -> (usize, usize) {
    match cfg.coefs {
        CoefSlice::Q15(coefs) => run::<S, Q15>(state, cfg, io, coefs),
        CoefSlice::Q23(coefs) => run::<S, Q23>(state, cfg, io, coefs),
    }
}

fn run<S: StageSample, F: CoefFormat>(
    state: &mut SrcState,
    cfg: &'static SrcStage,
    io: &mut StageIo<'_, S>,
    coefs: &[F::Coef],
) -> (usize, usize) {
    let nch = io.nch;
    let fir_len = state.fir_delay.len();
    let out_len = state.out_delay.len();
    let blk_in_samples = nch * cfg.blk_in;
    let blk_out_samples = nch * cfg.num_of_subfilters;
    let nch_x_idm = nch * cfg.idm;
    let nch_x_odm = nch * cfg.odm;
    // Read start of the oldest subfilter window, relative to the write index.
    let rewind = nch * (cfg.blk_in + (cfg.num_of_subfilters - 1) * cfg.idm) - nch;
    let mut x_pos = io.x_pos;
    let mut y_pos = io.y_pos;

    debug_assert_eq!(fir_len % nch, 0);
    debug_assert_eq!(out_len % nch, 0);

    for _ in 0..io.times {
        // Ingest one input block.
        let mut m = blk_in_samples;
        while m > 0 {
            let n_wrap_buf = io.x.len() - x_pos;
            let n_wrap_fir = state.fir_wi + 1;
            let n_min = m.min(n_wrap_buf).min(n_wrap_fir);
            let base = state.fir_wi;
            for k in 0..n_min {
                state.fir_delay[base - k] = io.x[x_pos].to_q31(io.shift);
                x_pos += 1;
            }
            state.fir_wi = if n_min > base { fir_len - 1 } else { base - n_min };
            if x_pos == io.x.len() {
                x_pos = 0;
            }
            m -= n_min;
        }

        // Run all subfilters against the new history. The write base of the output delay is
        // its current read position so drained samples come out in time order.
        let mut rp = (state.fir_wi + rewind) % fir_len;
        let mut wp = state.out_ri;
        let mut ci = 0;
        for _ in 0..cfg.num_of_subfilters {
            fir_filter::<F>(
                &state.fir_delay,
                rp,
                &coefs[ci..ci + cfg.subfilter_length],
                &mut state.out_delay,
                wp,
                cfg.shift,
                nch,
            );
            ci += cfg.subfilter_length;
            wp += nch_x_odm;
            if wp >= out_len {
                wp -= out_len;
            }
            rp = if rp >= nch_x_idm { rp - nch_x_idm } else { rp + fir_len - nch_x_idm };
        }

        // Drain one output block.
        let mut m = blk_out_samples;
        while m > 0 {
            let n_wrap_out = out_len - state.out_ri;
            let n_wrap_buf = io.y.len() - y_pos;
            let n_min = m.min(n_wrap_out).min(n_wrap_buf);
            for _ in 0..n_min {
                io.y[y_pos] = S::from_q31(state.out_delay[state.out_ri], io.shift);
                y_pos += 1;
                state.out_ri += 1;
            }
            if state.out_ri == out_len {
                state.out_ri = 0;
            }
            if y_pos == io.y.len() {
                y_pos = 0;
            }
            m -= n_min;
        }
    }

    io.x_pos = x_pos;
    io.y_pos = y_pos;
    (x_pos, y_pos)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coefs::{SRC_TABLE1, SRC_TABLE2};
    use crate::rates::find_fs;

    fn stage_for(fs_in: u32, fs_out: u32, second: bool) -> &'static SrcStage {
        let i = find_fs(&crate::rates::SRC_IN_FS, fs_in).unwrap();
        let o = find_fs(&crate::rates::SRC_OUT_FS, fs_out).unwrap();
        if second {
            SRC_TABLE2[o][i]
        }
        else {
            SRC_TABLE1[o][i]
        }
    }

    fn run_blocks(
        cfg: &'static SrcStage,
        nch: usize,
        input: &[i32],
        blocks: usize,
    ) -> Vec<i32> {
        let mut state = SrcState::default();
        state.resize(nch * cfg.fir_delay_length(), nch * cfg.out_delay_length());

        let x: Vec<i32> = input.to_vec();
        assert!(x.len() >= blocks * cfg.blk_in * nch);
        let mut y = vec![0i32; blocks * cfg.num_of_subfilters * nch];
        let mut io =
            StageIo { x: &x, x_pos: 0, y: &mut y, y_pos: 0, times: blocks, nch, shift: 0 };
        let (x_end, y_end) = src_polyphase_stage_cir::<i32>(&mut state, cfg, &mut io);
        assert_eq!(x_end, blocks * cfg.blk_in * nch);
        assert_eq!(y_end % (cfg.num_of_subfilters * nch), 0);
        y
    }

    #[test]
    fn verify_silence_passes_through() {
        let cfg = stage_for(32000, 48000, false);
        let input = vec![0i32; 8 * cfg.blk_in];
        let out = run_blocks(cfg, 1, &input, 8);
        assert!(out.iter().all(|&v| v == 0));
    }

    #[test]
    fn verify_chunking_is_transparent() {
        // Processing n blocks in one call must equal n calls of one block, including the
        // external ring wrap handling.
        let cfg = stage_for(44100, 48000, false);
        let nch = 2;
        let blocks = 6;
        let n_in = blocks * cfg.blk_in * nch;
        let input: Vec<i32> = (0..n_in as i32).map(|k| (k * 2_654_435) ^ 0x55AA).collect();

        let batched = run_blocks(cfg, nch, &input, blocks);

        let mut state = SrcState::default();
        state.resize(nch * cfg.fir_delay_length(), nch * cfg.out_delay_length());
        // Ring sized at one block so every call straddles a different offset.
        let mut ring = vec![0i32; cfg.blk_in * nch + 2];
        let mut stepped = vec![0i32; blocks * cfg.num_of_subfilters * nch + 2];
        let mut x_pos = 0;
        let mut y_pos = 0;
        let mut fed = 0;
        for _ in 0..blocks {
            let mut w = x_pos;
            for _ in 0..cfg.blk_in * nch {
                ring[w] = input[fed];
                fed += 1;
                w = (w + 1) % ring.len();
            }
            let mut io = StageIo {
                x: &ring,
                x_pos,
                y: &mut stepped,
                y_pos,
                times: 1,
                nch,
                shift: 0,
            };
            let (nx, ny) = src_polyphase_stage_cir::<i32>(&mut state, cfg, &mut io);
            x_pos = nx;
            y_pos = ny;
        }

        // Unwind the stepped output ring into a linear sequence.
        let total = blocks * cfg.num_of_subfilters * nch;
        let linear: Vec<i32> = (0..total).map(|k| stepped[k % stepped.len()]).collect();
        assert_eq!(linear, batched);
    }

    #[test]
    fn verify_s24_shift_round_trip() {
        // 24-in-32: ingest sign-extends by 8, egress shifts back down. A stage fed s24
        // values must produce the same samples as the s32 run of the same data pre-shifted.
        let cfg = stage_for(96000, 48000, false);
        let blocks = 4;
        let n_in = blocks * cfg.blk_in;
        let s24: Vec<i32> = (0..n_in as i32).map(|k| (k * 131_071) % (1 << 23) - (1 << 22)).collect();
        let s32: Vec<i32> = s24.iter().map(|&v| v << 8).collect();

        let mut state = SrcState::default();
        state.resize(cfg.fir_delay_length(), cfg.out_delay_length());
        let mut out24 = vec![0i32; blocks * cfg.num_of_subfilters];
        let mut io = StageIo {
            x: &s24,
            x_pos: 0,
            y: &mut out24,
            y_pos: 0,
            times: blocks,
            nch: 1,
            shift: 8,
        };
        src_polyphase_stage_cir::<i32>(&mut state, cfg, &mut io);

        let out32 = run_blocks(cfg, 1, &s32, blocks);
        let shifted: Vec<i32> = out32.iter().map(|&v| v >> 8).collect();
        assert_eq!(out24, shifted);
    }

    #[test]
    fn verify_s16_egress_saturates() {
        // Full-scale 16-bit input must stay clamped to the 16-bit range through the
        // Q1.31 -> Q1.15 rounding on egress.
        let cfg = stage_for(16000, 48000, false);
        // Enough blocks for the step response to settle over the full analysis window.
        let blocks = 60;
        let x = vec![i16::MAX; blocks * cfg.blk_in];
        let mut y = vec![0i16; blocks * cfg.num_of_subfilters];
        let mut state = SrcState::default();
        state.resize(cfg.fir_delay_length(), cfg.out_delay_length());
        let mut io =
            StageIo { x: &x, x_pos: 0, y: &mut y, y_pos: 0, times: blocks, nch: 1, shift: 0 };
        src_polyphase_stage_cir::<i16>(&mut state, cfg, &mut io);
        // The passband settles near full scale after the group delay.
        let tail = &y[y.len() / 2..];
        assert!(tail.iter().all(|&v| v >= 0x7000));
    }
}
