// Cadenza
// Copyright (c) 2026 The Project Cadenza Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `component` module wraps the polyphase engine as a streaming pipeline node.
//!
//! The node owns the conversion plan and delay lines, negotiates the free side of the rate
//! pair during `params`, validates ring capacities during `prepare`, and pumps the source
//! and sink rings on every `copy` tick with xrun detection. A node whose conversion could
//! not be bound falls back to muting: copies report no progress but do not fail, keeping
//! the pipeline alive.

use cadenza_core::audio::ring::RingBuffer;
use cadenza_core::audio::StreamParams;
use cadenza_core::errors::{
    invalid_state_error, unsupported_error, xrun_error, CadenzaError, Result,
};
use cadenza_core::pipeline::{next_state, CacheOp, CacheOps, Node, NodeState, Trigger};
use cadenza_core::sample::{Sample, SampleFormat};
use cadenza_core::util::ceil_divide;

use crate::planner::{src_buffer_lengths, SrcParams};
use crate::polyphase::{src_copy, PolyphaseSrc};
use crate::stage::StageSample;

/// Configuration of a converter node.
///
/// Exactly one of `source_rate` and `sink_rate` must be nonzero; the zero side is taken
/// from the pipeline stream parameters when they arrive.
#[derive(Copy, Clone, Debug)]
pub struct SrcConfig {
    /// The fixed source rate in Hz, or 0 to take it from the stream parameters.
    pub source_rate: u32,
    /// The fixed sink rate in Hz, or 0 to take it from the stream parameters.
    pub sink_rate: u32,
    /// The number of interleaved channels.
    pub channels: usize,
    /// The pipeline period in frames.
    pub frames: usize,
}

/// The driver variant bound to the node, replacing per-call function-pointer dispatch.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum SrcProc {
    /// Verbatim copy for equal rates.
    Copy,
    OneStage,
    TwoStage,
    /// No valid conversion is bound; copies mute by reporting no progress.
    Fallback,
}

/// A sample-rate converter pipeline node.
pub struct SrcComponent {
    config: SrcConfig,
    state: NodeState,
    src: PolyphaseSrc,
    plan: Option<SrcParams>,
    proc: SrcProc,
    source_rate: u32,
    sink_rate: u32,
    format: Option<SampleFormat>,
    /// Q1.31 alignment shift for 32-bit containers: 8 for 24-in-32, 0 otherwise.
    data_shift: u32,
    frame_bytes: usize,
    /// One-shot sink pre-fill in bytes, armed by `prepare`.
    prefill: usize,
}

impl SrcComponent {
    /// Creates a converter node from its configuration.
    pub fn new(config: SrcConfig) -> Result<Self> {
        if (config.source_rate == 0) == (config.sink_rate == 0) {
            log::error!("src_new, exactly one of source and sink rate must be set");
            return unsupported_error("exactly one of source and sink rate must be set");
        }
        if config.frames == 0 {
            return unsupported_error("zero period length");
        }

        Ok(SrcComponent {
            config,
            state: NodeState::Ready,
            src: PolyphaseSrc::new(),
            plan: None,
            proc: SrcProc::Fallback,
            source_rate: 0,
            sink_rate: 0,
            format: None,
            data_shift: 0,
            frame_bytes: 0,
            prefill: 0,
        })
    }

    /// The negotiated source rate in Hz. Zero before `params`.
    pub fn source_rate(&self) -> u32 {
        self.source_rate
    }

    /// The negotiated sink rate in Hz. Zero before `params`.
    pub fn sink_rate(&self) -> u32 {
        self.sink_rate
    }

    /// The bound conversion plan, if `params` succeeded.
    pub fn plan(&self) -> Option<&SrcParams> {
        self.plan.as_ref()
    }

    /// Accepts the pipeline stream parameters, resolves the conversion, and allocates the
    /// delay lines.
    ///
    /// One rate of the pair is preconfigured; the other is read from `stream`, and
    /// `stream.rate` is rewritten with the opposing rate so the next pipeline element sees
    /// the post-conversion rate.
    pub fn params(&mut self, stream: &mut StreamParams) -> Result<()> {
        if self.state != NodeState::Ready && self.state != NodeState::Prepared {
            return invalid_state_error();
        }
        if stream.channels != self.config.channels {
            return unsupported_error("stream channel count does not match configuration");
        }

        let frames_is_for_source;
        if self.config.source_rate == 0 {
            // The stream rate is the source rate; the period refers to the sink.
            self.source_rate = stream.rate;
            self.sink_rate = self.config.sink_rate;
            stream.rate = self.sink_rate;
            frames_is_for_source = false;
        }
        else {
            // The stream rate is the sink rate; the period refers to the source.
            self.source_rate = self.config.source_rate;
            self.sink_rate = stream.rate;
            stream.rate = self.source_rate;
            frames_is_for_source = true;
        }

        log::debug!(
            "src_params, source_rate = {}, sink_rate = {}, channels = {}, frames = {}",
            self.source_rate,
            self.sink_rate,
            stream.channels,
            self.config.frames
        );

        let plan = src_buffer_lengths(
            self.source_rate,
            self.sink_rate,
            stream.channels,
            self.config.frames,
            frames_is_for_source,
        )?;

        log::debug!("src_params, blk_in = {}, blk_out = {}", plan.blk_in, plan.blk_out);

        self.proc = match self.src.init(&plan) {
            Ok(0) => SrcProc::Copy,
            Ok(1) => SrcProc::OneStage,
            Ok(_) => SrcProc::TwoStage,
            Err(err) => {
                // Likely missing coefficients for the requested rate combination. Sink
                // audio will be muted if copy is run.
                log::error!("src_params, initialization failed: {}", err);
                self.proc = SrcProc::Fallback;
                return Err(err);
            }
        };

        self.format = Some(stream.format);
        self.frame_bytes = stream.frame_bytes();
        self.plan = Some(plan);

        Ok(())
    }

    /// Validates ring capacities against the bound plan and transitions to `Prepared`.
    ///
    /// The sink must hold the largest output block plus one period, rounded up to whole
    /// periods; the source must hold one input block. If the conversion's minimum output
    /// block is shorter than the period, a one-shot silence pre-fill is armed to protect
    /// the downstream element from an underrun on the first tick.
    pub fn prepare(&mut self, source_capacity: usize, sink_capacity: usize) -> Result<()> {
        let plan = match self.plan.as_ref() {
            Some(plan) => plan,
            None => return invalid_state_error(),
        };
        let format = self.format.expect("format bound with plan");

        self.data_shift = format.data_shift();

        let q = ceil_divide(plan.blk_out, self.config.frames) + 1;
        if sink_capacity < q * self.config.frames * self.frame_bytes {
            log::error!(
                "src_prepare, sink capacity {} below {} periods of {} bytes",
                sink_capacity,
                q,
                self.config.frames * self.frame_bytes
            );
            return unsupported_error("sink buffer capacity");
        }
        if source_capacity < plan.blk_in * self.frame_bytes {
            log::error!(
                "src_prepare, source capacity {} below blk_in of {} frames",
                source_capacity,
                plan.blk_in
            );
            return unsupported_error("source buffer capacity");
        }

        self.prefill = if self.config.frames > plan.blk_out {
            (self.config.frames - plan.blk_out) * self.frame_bytes
        }
        else {
            0
        };

        self.state = next_state(self.state, Trigger::Prepare)?;
        Ok(())
    }

    /// Runs one conversion tick between `source` and `sink`.
    ///
    /// The copy needs `blk_in` frames available and `blk_out` frames free; anything less is
    /// an xrun and leaves both rings untouched for the pipeline to recover. On success the
    /// consumed and produced frame counts are committed to the rings and the produced count
    /// is returned. The copy may consume or produce slightly more than one period where the
    /// rate ratio makes block sizes uneven; the rings absorb the jitter.
    pub fn copy<S: Sample + StageSample>(
        &mut self,
        source: &mut RingBuffer<S>,
        sink: &mut RingBuffer<S>,
    ) -> Result<usize> {
        if self.state != NodeState::Active {
            return invalid_state_error();
        }

        // A node whose conversion could not be bound mutes instead of failing.
        if self.proc == SrcProc::Fallback {
            return Ok(0);
        }

        let format = self.format.expect("format bound with plan");
        if std::mem::size_of::<S>() != format.container_bytes() {
            return unsupported_error("sample container does not match the prepared format");
        }
        let plan = self.plan.as_ref().expect("plan bound in Active state");

        // Some conversions must pre-fill the sink with silence once so the first short
        // output block cannot underrun the downstream element. Later blocks jitter around
        // the nominal period and the margin persists.
        if self.prefill > 0 && sink.free_bytes() >= self.prefill {
            log::trace!("src_copy, pre-filling sink with {} bytes", self.prefill);
            sink.produce_silence(self.prefill / std::mem::size_of::<S>());
            self.prefill = 0;
        }

        let need_source = plan.blk_in * self.frame_bytes;
        let need_sink = plan.blk_out * self.frame_bytes;
        if source.avail_bytes() < need_source {
            log::error!("src_copy, source has not enough data available");
            return xrun_error();
        }
        if sink.free_bytes() < need_sink {
            log::error!("src_copy, sink has not enough free space");
            return xrun_error();
        }

        let (consumed, produced) = match self.proc {
            SrcProc::Copy => src_copy(plan, source, sink),
            SrcProc::OneStage => self.src.src_1s(plan, source, sink, self.data_shift),
            SrcProc::TwoStage => self.src.src_2s(plan, source, sink, self.data_shift),
            SrcProc::Fallback => (0, 0),
        };

        log::trace!("src_copy, consumed = {}, produced = {}", consumed, produced);

        if consumed > 0 {
            source.consume(consumed * plan.nch);
        }
        if produced > 0 {
            sink.produce(produced * plan.nch);
        }

        Ok(produced)
    }

    /// Rejects runtime control values; the converter has none.
    pub fn cmd(&mut self, _value: u32) -> Result<()> {
        log::error!("src_cmd, no runtime controls");
        unsupported_error("src component has no runtime controls")
    }

    /// Applies a host cache maintenance request to the node's working memory.
    pub fn cache(&self, op: CacheOp, host: &mut dyn CacheOps) {
        for region in self.src.delay_regions() {
            match op {
                CacheOp::WritebackInvalidate => host.writeback_invalidate(region),
                CacheOp::Invalidate => host.invalidate(region),
            }
        }
    }
}

impl Node for SrcComponent {
    fn state(&self) -> NodeState {
        self.state
    }

    fn trigger(&mut self, trigger: Trigger) -> Result<NodeState> {
        match trigger {
            // Prepare carries buffer validation and must go through prepare().
            Trigger::Prepare => Err(CadenzaError::InvalidState),
            Trigger::Reset => {
                self.reset();
                Ok(self.state)
            }
            _ => {
                self.state = next_state(self.state, trigger)?;
                Ok(self.state)
            }
        }
    }

    fn reset(&mut self) {
        log::debug!("src_reset");
        self.proc = SrcProc::Fallback;
        self.src.reset();
        self.plan = None;
        self.format = None;
        self.data_shift = 0;
        self.frame_bytes = 0;
        self.prefill = 0;
        self.state = NodeState::Ready;
    }
}
