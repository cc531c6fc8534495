// Cadenza
// Copyright (c) 2026 The Project Cadenza Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `audio` module provides the stream description and buffering primitives shared by
//! pipeline nodes.

pub mod ring;

use crate::sample::SampleFormat;

/// The maximum number of channels a pipeline stream may carry.
pub const MAX_CHANNELS: usize = 8;

/// `StreamParams` describes the PCM stream negotiated along a pipeline: rate, interleaved
/// channel count, and sample format.
///
/// A rate-converting node rewrites `rate` during parameter negotiation so that the next
/// element downstream sees the post-conversion rate.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct StreamParams {
    /// The sample rate in Hz.
    pub rate: u32,
    /// The number of interleaved channels.
    pub channels: usize,
    /// The sample format.
    pub format: SampleFormat,
}

impl StreamParams {
    pub fn new(rate: u32, channels: usize, format: SampleFormat) -> Self {
        StreamParams { rate, channels, format }
    }

    /// The size of one interleaved frame in bytes.
    pub fn frame_bytes(&self) -> usize {
        self.channels * self.format.container_bytes()
    }
}
