// Cadenza
// Copyright (c) 2026 The Project Cadenza Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `planner` module resolves a rate pair into a two-stage decomposition and computes the
//! delay-line, intermediate-buffer, and per-tick iteration geometry for it.

use cadenza_core::audio::MAX_CHANNELS;
use cadenza_core::errors::{CadenzaError, Result};
use cadenza_core::util::ceil_divide;

use crate::coefs::{SRC_TABLE1, SRC_TABLE2};
use crate::rates::{find_fs, SRC_IN_FS, SRC_OUT_FS};

/// The resolved conversion plan for one (rate pair, channel count, period) combination.
///
/// All delay and buffer sizes are in samples and already include the channel factor. The
/// `stage*_times` fields are the default per-tick iteration counts; `stage*_times_max` bound
/// the additional one-block iterations the driver may run to catch up.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SrcParams {
    pub idx_in: usize,
    pub idx_out: usize,
    pub nch: usize,
    pub stage1_times: usize,
    pub stage1_times_max: usize,
    pub stage2_times: usize,
    pub stage2_times_max: usize,
    /// Frames consumed from the source per driver call.
    pub blk_in: usize,
    /// Frames produced to the sink per driver call.
    pub blk_out: usize,
    pub fir_s1: usize,
    pub out_s1: usize,
    pub fir_s2: usize,
    pub out_s2: usize,
    /// Inter-stage ring length in samples; zero for single-stage conversions.
    pub sbuf_length: usize,
    /// Total working memory in samples.
    pub total: usize,
}

/// Resolves the conversion geometry for `fs_in` to `fs_out` with `nch` channels.
///
/// `frames` is the pipeline period; `frames_is_for_source` selects whether it refers to the
/// source or the sink side of the conversion. Rates absent from the tables and deleted
/// combinations are rejected, as are unsupported channel counts. Delay-size and alignment
/// limits are enforced later, at [`crate::polyphase::PolyphaseSrc::init`].
pub fn src_buffer_lengths(
    fs_in: u32,
    fs_out: u32,
    nch: usize,
    frames: usize,
    frames_is_for_source: bool,
) -> Result<SrcParams> {
    if nch == 0 || nch > MAX_CHANNELS {
        log::error!("src_buffer_lengths, nch = {} out of range", nch);
        return Err(CadenzaError::ChannelLimit);
    }
    if frames == 0 {
        return Err(CadenzaError::Unsupported("zero period length"));
    }

    let mut a = SrcParams { nch, ..Default::default() };

    let (idx_in, idx_out) = match (find_fs(&SRC_IN_FS, fs_in), find_fs(&SRC_OUT_FS, fs_out)) {
        (Some(i), Some(o)) => (i, o),
        _ => {
            log::error!(
                "src_buffer_lengths, rates not supported, fs_in: {}, fs_out: {}",
                fs_in,
                fs_out
            );
            return Err(CadenzaError::UnsupportedRate);
        }
    };
    a.idx_in = idx_in;
    a.idx_out = idx_out;

    let stage1 = SRC_TABLE1[idx_out][idx_in];
    let stage2 = SRC_TABLE2[idx_out][idx_in];

    // A deleted in/out combination is marked by a zero-length first stage.
    if stage1.filter_length < 1 {
        log::error!(
            "src_buffer_lengths, deleted mode, fs_in: {}, fs_out: {}",
            fs_in,
            fs_out
        );
        return Err(CadenzaError::DeletedMode);
    }

    a.fir_s1 = nch * stage1.fir_delay_length();
    a.out_s1 = nch * stage1.out_delay_length();

    // Find how many times each stage runs per tick so that the block size reaches the period
    // length or just under it, and the maximum count that may ever be needed.
    if frames_is_for_source {
        a.stage1_times_max = ceil_divide(frames, stage1.blk_in);
        a.stage1_times = (frames / stage1.blk_in).max(1);
        a.blk_in = a.stage1_times * stage1.blk_in;

        let den = stage2.blk_in * stage1.blk_in;
        let num = frames * stage2.blk_out * stage1.blk_out;
        let frames2 = ceil_divide(num, den);
        a.stage2_times_max = ceil_divide(frames2, stage2.blk_out);
        a.stage2_times = (frames2 / stage2.blk_out).max(1);
        a.blk_out = a.stage2_times * stage2.blk_out;
    }
    else {
        a.stage2_times_max = ceil_divide(frames, stage2.blk_out);
        a.stage2_times = (frames / stage2.blk_out).max(1);
        a.blk_out = a.stage2_times * stage2.blk_out;

        let num = frames * stage2.blk_in * stage1.blk_in;
        let den = stage2.blk_out * stage1.blk_out;
        let frames2 = ceil_divide(num, den);
        a.stage1_times_max = ceil_divide(frames2, stage1.blk_in);
        a.stage1_times = (frames2 / stage1.blk_in).max(1);
        a.blk_in = a.stage1_times * stage1.blk_in;
    }

    if stage2.is_passthrough() {
        a.fir_s2 = 0;
        a.out_s2 = 0;
        a.stage2_times = 0;
        a.stage2_times_max = 0;
        a.sbuf_length = 0;
    }
    else {
        a.fir_s2 = nch * stage2.fir_delay_length();
        a.out_s2 = nch * stage2.out_delay_length();
        // 2x is an empirically tested length. The sink's capability to receive samples
        // varies, so a shorter stage 2 output block creates a peak in internal buffer usage.
        a.sbuf_length = 2 * nch * stage1.blk_out * a.stage1_times_max;
    }

    a.total = a.sbuf_length + a.fir_s1 + a.fir_s2 + a.out_s1 + a.out_s2;

    Ok(a)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coefs::{SRC_TABLE1, SRC_TABLE2};
    use crate::rates::{SRC_IN_FS, SRC_OUT_FS};

    #[test]
    fn verify_parameter_validation() {
        assert_eq!(
            src_buffer_lengths(48000, 44100, 0, 48, true),
            Err(CadenzaError::ChannelLimit)
        );
        assert_eq!(
            src_buffer_lengths(48000, 44100, 9, 48, true),
            Err(CadenzaError::ChannelLimit)
        );
        assert_eq!(
            src_buffer_lengths(48000, 11025, 2, 48, true),
            Err(CadenzaError::UnsupportedRate)
        );
        assert_eq!(
            src_buffer_lengths(12345, 48000, 2, 48, true),
            Err(CadenzaError::UnsupportedRate)
        );
        // In the tables but deleted from the matrix.
        assert_eq!(
            src_buffer_lengths(8000, 96000, 2, 48, true),
            Err(CadenzaError::DeletedMode)
        );
    }

    #[test]
    fn verify_delay_line_sizing() {
        let p = src_buffer_lengths(44100, 48000, 2, 441, true).unwrap();
        let s1 = SRC_TABLE1[p.idx_out][p.idx_in];
        let s2 = SRC_TABLE2[p.idx_out][p.idx_in];

        let fir1 = s1.subfilter_length + (s1.num_of_subfilters - 1) * s1.idm + s1.blk_in;
        let out1 = 1 + (s1.num_of_subfilters - 1) * s1.odm;
        assert_eq!(p.fir_s1, 2 * fir1);
        assert_eq!(p.out_s1, 2 * out1);

        let fir2 = s2.subfilter_length + (s2.num_of_subfilters - 1) * s2.idm + s2.blk_in;
        let out2 = 1 + (s2.num_of_subfilters - 1) * s2.odm;
        assert_eq!(p.fir_s2, 2 * fir2);
        assert_eq!(p.out_s2, 2 * out2);

        assert_eq!(p.sbuf_length, 2 * 2 * s1.blk_out * p.stage1_times_max);
        assert_eq!(p.total, p.sbuf_length + p.fir_s1 + p.fir_s2 + p.out_s1 + p.out_s2);
    }

    #[test]
    fn verify_single_stage_collapses_stage2() {
        // 96000 -> 48000 uses one halfband stage; stage 2 must contribute nothing.
        let p = src_buffer_lengths(96000, 48000, 2, 96, true).unwrap();
        assert_eq!(p.fir_s2, 0);
        assert_eq!(p.out_s2, 0);
        assert_eq!(p.stage2_times, 0);
        assert_eq!(p.stage2_times_max, 0);
        assert_eq!(p.sbuf_length, 0);
        assert_eq!(p.blk_in, 96);
        assert_eq!(p.blk_out, 48);
    }

    #[test]
    fn verify_sample_conservation() {
        // For every supported pair and both directions the resolved blocks must conserve the
        // rate ratio within one rounding step.
        for (o, _) in SRC_OUT_FS.iter().enumerate() {
            for (i, _) in SRC_IN_FS.iter().enumerate() {
                let s1 = SRC_TABLE1[o][i];
                let s2 = SRC_TABLE2[o][i];
                if s1.is_deleted() {
                    continue;
                }
                for frames in [47, 48, 96, 441, 480] {
                    for dir in [true, false] {
                        let p =
                            src_buffer_lengths(SRC_IN_FS[i], SRC_OUT_FS[o], 2, frames, dir)
                                .unwrap();
                        let lhs = p.blk_in * s1.blk_out * s2.blk_out;
                        let rhs = p.blk_out * s1.blk_in * s2.blk_in;
                        // blk_out is rounded up to whole stage-2 blocks.
                        let step = s2.blk_out * s1.blk_in * s2.blk_in;
                        assert!(rhs + step > lhs, "under {}->{}", SRC_IN_FS[i], SRC_OUT_FS[o]);
                        let step_in = s1.blk_in * s1.blk_out * s2.blk_out;
                        assert!(lhs + step_in + step > rhs);
                    }
                }
            }
        }
    }

    #[test]
    fn verify_anchoring_directions() {
        // Source-anchored: blk_in covers the period exactly when divisible.
        let p = src_buffer_lengths(48000, 44100, 2, 480, true).unwrap();
        assert_eq!(p.blk_in, 480);
        assert_eq!(p.blk_out, 441);

        // Sink-anchored: blk_out covers the period.
        let p = src_buffer_lengths(48000, 44100, 2, 441, false).unwrap();
        assert_eq!(p.blk_out, 441);
        assert_eq!(p.blk_in, 480);
    }
}
