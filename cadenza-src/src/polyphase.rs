// Cadenza
// Copyright (c) 2026 The Project Cadenza Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `polyphase` module owns the conversion state and drives one or two cascaded stages,
//! or a verbatim copy path when the rates are equal.

use std::fmt;

use cadenza_core::audio::ring::RingBuffer;
use cadenza_core::audio::MAX_CHANNELS;
use cadenza_core::errors::{CadenzaError, Result};
use cadenza_core::sample::Sample;

use crate::coefs::{SrcStage, MAX_FIR_DELAY_SIZE, MAX_OUT_DELAY_SIZE, SRC_TABLE1, SRC_TABLE2};
use crate::planner::SrcParams;
use crate::stage::{src_polyphase_stage_cir, SrcState, StageIo, StageSample};

/// The inter-stage sample ring between stage 1 and stage 2.
#[derive(Debug, Default)]
struct Sbuf {
    buf: Vec<i32>,
    w: usize,
    r: usize,
    avail: usize,
}

impl Sbuf {
    fn resize(&mut self, len: usize) {
        if self.buf.len() != len {
            self.buf = vec![0; len];
        }
        self.reset();
    }

    fn reset(&mut self) {
        self.buf.fill(0);
        self.w = 0;
        self.r = 0;
        self.avail = 0;
    }

    fn release(&mut self) {
        self.buf = Vec::new();
        self.w = 0;
        self.r = 0;
        self.avail = 0;
    }

    fn free(&self) -> usize {
        self.buf.len() - self.avail
    }
}

/// A bound polyphase conversion: up to two stages and their delay lines.
#[derive(Default)]
pub struct PolyphaseSrc {
    number_of_stages: usize,
    blk_in: usize,
    blk_out: usize,
    stage1: Option<&'static SrcStage>,
    stage2: Option<&'static SrcStage>,
    state1: SrcState,
    state2: SrcState,
    sbuf: Sbuf,
}

impl PolyphaseSrc {
    pub fn new() -> Self {
        PolyphaseSrc::default()
    }

    /// The effective number of stages: 0 for the copy path, else 1 or 2.
    pub fn number_of_stages(&self) -> usize {
        self.number_of_stages
    }

    /// Frames consumed from the source per driver call.
    pub fn blk_in(&self) -> usize {
        self.blk_in
    }

    /// Frames produced to the sink per driver call.
    pub fn blk_out(&self) -> usize {
        self.blk_out
    }

    /// Binds the stage parameters selected by `p` and sizes the delay lines, reusing
    /// matching allocations. Returns the effective number of stages.
    ///
    /// A conversion whose second-stage entry is a passthrough runs one stage; equal rate
    /// indices run zero stages and should use [`src_copy`]. Deleted modes, misaligned
    /// subfilters, and delay lines beyond the platform caps are rejected.
    pub fn init(&mut self, p: &SrcParams) -> Result<usize> {
        let stage1 = SRC_TABLE1[p.idx_out][p.idx_in];
        let stage2 = SRC_TABLE2[p.idx_out][p.idx_in];

        // A deleted in/out combination must not be computed.
        if stage1.is_deleted() {
            return Err(CadenzaError::DeletedMode);
        }

        // The optimized kernel requires subfilter lengths in multiples of 4.
        if stage1.filter_length > 1 && stage1.subfilter_length % 4 != 0 {
            return Err(CadenzaError::SubfilterAlignment);
        }
        if stage2.filter_length > 1 && stage2.subfilter_length % 4 != 0 {
            return Err(CadenzaError::SubfilterAlignment);
        }

        if p.fir_s1 > MAX_FIR_DELAY_SIZE * MAX_CHANNELS
            || p.out_s1 > MAX_OUT_DELAY_SIZE * MAX_CHANNELS
            || p.fir_s2 > MAX_FIR_DELAY_SIZE * MAX_CHANNELS
            || p.out_s2 > MAX_OUT_DELAY_SIZE * MAX_CHANNELS
        {
            return Err(CadenzaError::DelaySizeExceeded);
        }

        if p.total == 0 {
            return Err(CadenzaError::AllocationFailed);
        }

        self.stage1 = Some(stage1);
        self.stage2 = Some(stage2);
        self.blk_in = p.blk_in;
        self.blk_out = p.blk_out;
        self.state1.resize(p.fir_s1, p.out_s1);

        let two_stages = !stage2.is_passthrough();
        if two_stages {
            self.state2.resize(p.fir_s2, p.out_s2);
            self.sbuf.resize(p.sbuf_length);
        }
        else {
            self.state2.release();
            self.sbuf.release();
        }

        self.number_of_stages = if p.idx_in == p.idx_out {
            0
        }
        else if two_stages {
            2
        }
        else {
            1
        };

        Ok(self.number_of_stages)
    }

    /// Unbinds the stages and drops all delay history.
    pub fn reset(&mut self) {
        self.number_of_stages = 0;
        self.blk_in = 0;
        self.blk_out = 0;
        self.stage1 = None;
        self.stage2 = None;
        self.state1.release();
        self.state2.release();
        self.sbuf.release();
    }

    /// The delay-line and inter-stage storage as bytes, for host cache maintenance.
    pub fn delay_regions(&self) -> [&[u8]; 5] {
        [
            bytemuck::cast_slice(&self.state1.fir_delay),
            bytemuck::cast_slice(&self.state1.out_delay),
            bytemuck::cast_slice(&self.state2.fir_delay),
            bytemuck::cast_slice(&self.state2.out_delay),
            bytemuck::cast_slice(&self.sbuf.buf),
        ]
    }

    /// Runs the single-stage conversion for one tick.
    ///
    /// The caller has verified that `source` holds `blk_in` frames and `sink` has room for
    /// `blk_out` frames; consumed and produced counts are reported back for the caller to
    /// commit.
    pub fn src_1s<S: Sample + StageSample>(
        &mut self,
        p: &SrcParams,
        source: &RingBuffer<S>,
        sink: &mut RingBuffer<S>,
        shift: u32,
    ) -> (usize, usize) {
        let stage1 = self.stage1.expect("stage not bound");
        let x_pos = source.read_pos();
        let y_pos = sink.write_pos();
        let mut io = StageIo {
            x: source.samples(),
            x_pos,
            y: sink.samples_mut(),
            y_pos,
            times: p.stage1_times,
            nch: p.nch,
            shift,
        };
        src_polyphase_stage_cir::<S>(&mut self.state1, stage1, &mut io);

        (p.blk_in, p.blk_out)
    }

    /// Runs the two-stage conversion for one tick.
    ///
    /// Each stage first attempts one pass at its default iteration count, then catches up
    /// one block at a time within its `times_max` bound while input data and output space
    /// allow. This keeps throughput high when both sides are well provisioned but still
    /// makes progress when either side is nearly empty or full.
    pub fn src_2s<S: Sample + StageSample>(
        &mut self,
        p: &SrcParams,
        source: &RingBuffer<S>,
        sink: &mut RingBuffer<S>,
        shift: u32,
    ) -> (usize, usize) {
        let stage1 = self.stage1.expect("stage not bound");
        let stage2 = self.stage2.expect("stage not bound");
        let nch = p.nch;

        let mut n_read = 0;
        let mut n_written = 0;
        let mut avail = source.avail();
        let mut free = sink.free();
        let mut sbuf_w = self.sbuf.w;
        let mut sbuf_r = self.sbuf.r;
        let mut sbuf_avail = self.sbuf.avail;
        let mut sbuf_free = self.sbuf.buf.len() - sbuf_avail;
        let mut x_pos = source.read_pos();
        let mut y_pos = sink.write_pos();

        // Try the first stage with the default block count, then one block at a time.
        let mut times = p.stage1_times;
        let mut n1 = 0;
        while times > 0 {
            let s1_in = times * stage1.blk_in * nch;
            let s1_out = times * stage1.blk_out * nch;
            if avail >= s1_in && sbuf_free >= s1_out {
                let mut io = StageIo {
                    x: source.samples(),
                    x_pos,
                    // The inter-stage ring carries the stream's sample width; its i32
                    // backing region is reinterpreted for 16-bit streams.
                    y: bytemuck::cast_slice_mut(&mut self.sbuf.buf),
                    y_pos: sbuf_w,
                    times,
                    nch,
                    shift,
                };
                src_polyphase_stage_cir::<S>(&mut self.state1, stage1, &mut io);
                x_pos = io.x_pos;
                sbuf_w = io.y_pos;
                sbuf_avail += s1_out;
                sbuf_free -= s1_out;
                avail -= s1_in;
                n_read += times * stage1.blk_in;
                n1 += times;
            }
            else if times == 1 {
                break;
            }
            times = if n1 < p.stage1_times_max { 1 } else { 0 };
            if n1 >= p.stage1_times_max {
                break;
            }
        }

        // Then the second stage the same way.
        let mut times = p.stage2_times;
        let mut n2 = 0;
        while times > 0 {
            let s2_in = times * stage2.blk_in * nch;
            let s2_out = times * stage2.blk_out * nch;
            if sbuf_avail >= s2_in && free >= s2_out {
                let mut io = StageIo {
                    x: bytemuck::cast_slice(&self.sbuf.buf),
                    x_pos: sbuf_r,
                    y: sink.samples_mut(),
                    y_pos,
                    times,
                    nch,
                    shift,
                };
                src_polyphase_stage_cir::<S>(&mut self.state2, stage2, &mut io);
                sbuf_r = io.x_pos;
                y_pos = io.y_pos;
                sbuf_avail -= s2_in;
                free -= s2_out;
                n_written += times * stage2.blk_out;
                n2 += times;
            }
            else if times == 1 {
                break;
            }
            times = if n2 < p.stage2_times_max { 1 } else { 0 };
            if n2 >= p.stage2_times_max {
                break;
            }
        }

        self.sbuf.w = sbuf_w;
        self.sbuf.r = sbuf_r;
        self.sbuf.avail = sbuf_avail;

        (n_read, n_written)
    }
}

impl fmt::Debug for PolyphaseSrc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let geometry = |s: Option<&'static SrcStage>| match s {
            Some(s) => (s.num_of_subfilters, s.subfilter_length, s.blk_in, s.blk_out),
            None => (0, 0, 0, 0),
        };
        f.debug_struct("PolyphaseSrc")
            .field("number_of_stages", &self.number_of_stages)
            .field("stage1 (subfilters, taps, blk_in, blk_out)", &geometry(self.stage1))
            .field("stage2 (subfilters, taps, blk_in, blk_out)", &geometry(self.stage2))
            .field("fir_delay1", &self.state1.fir_delay.len())
            .field("out_delay1", &self.state1.out_delay.len())
            .field("fir_delay2", &self.state2.fir_delay.len())
            .field("out_delay2", &self.state2.out_delay.len())
            .field("sbuf", &self.sbuf.buf.len())
            .finish()
    }
}

/// The fast path for equal input and output rates: a bit-exact, wrap-safe block copy.
///
/// Samples are not re-normalized, so 24-in-32 streams pass through with their container
/// bits preserved.
pub fn src_copy<S: Sample>(
    p: &SrcParams,
    source: &RingBuffer<S>,
    sink: &mut RingBuffer<S>,
) -> (usize, usize) {
    let frames = p.blk_in;
    let mut n = frames * p.nch;
    let mut sp = source.read_pos();
    let mut dp = sink.write_pos();

    while n > 0 {
        let n_wrap_src = source.capacity() - sp;
        let n_wrap_snk = sink.capacity() - dp;
        let n_copy = n.min(n_wrap_src).min(n_wrap_snk);

        sink.samples_mut()[dp..dp + n_copy]
            .copy_from_slice(&source.samples()[sp..sp + n_copy]);

        sp = (sp + n_copy) % source.capacity();
        dp = (dp + n_copy) % sink.capacity();
        n -= n_copy;
    }

    (frames, frames)
}
