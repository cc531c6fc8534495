// Cadenza
// Copyright (c) 2026 The Project Cadenza Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `coefs` module holds the precomputed polyphase stage parameters and filter
//! coefficients for every supported rate pair.
//!
//! Coefficients were designed offline (`scripts/gen_coefs.py`) as Kaiser windowed-sinc
//! lowpass prototypes and are stored in Q1.31; the kernel consumes the top 24 bits as Q1.23.
//! Each stage's prototype may be pre-scaled by a power of two to use the full coefficient
//! range, with `shift` restoring unity gain after accumulation.

mod generated;

pub use generated::{SRC_DELETED, SRC_PASSTHROUGH, SRC_TABLE1, SRC_TABLE2};

/// The largest per-channel FIR delay line any table entry may require.
pub const MAX_FIR_DELAY_SIZE: usize = 512;

/// The largest per-channel output delay line any table entry may require.
pub const MAX_OUT_DELAY_SIZE: usize = 512;

/// A borrowed coefficient table in one of the two supported fixed-point widths.
#[derive(Copy, Clone, Debug)]
pub enum CoefSlice {
    /// Q1.15 coefficients.
    Q15(&'static [i16]),
    /// Q1.23 coefficients stored in Q1.31 slots; the kernel shifts each value right by 8.
    Q23(&'static [i32]),
}

/// Immutable parameters of one polyphase stage.
///
/// A stage consumes `blk_in` frames and produces `num_of_subfilters` frames per pass by
/// running one `subfilter_length`-tap FIR per subfilter. `idm` is the input-delay stride
/// between consecutive subfilter read positions and `odm` the output-delay stride that
/// reorders subfilter outputs into time order.
///
/// Two marker values encode matrix structure: `filter_length == 1` marks a passthrough
/// (the conversion needs only the other stage), and `filter_length == 0` marks a rate
/// combination deleted from the matrix.
#[derive(Debug)]
pub struct SrcStage {
    pub idm: usize,
    pub odm: usize,
    pub num_of_subfilters: usize,
    pub subfilter_length: usize,
    pub filter_length: usize,
    pub blk_in: usize,
    pub blk_out: usize,
    pub halfband: bool,
    pub shift: i32,
    pub coefs: CoefSlice,
}

impl SrcStage {
    /// The per-channel FIR delay line length this stage requires.
    pub fn fir_delay_length(&self) -> usize {
        self.subfilter_length + (self.num_of_subfilters - 1) * self.idm + self.blk_in
    }

    /// The per-channel output delay line length this stage requires.
    pub fn out_delay_length(&self) -> usize {
        1 + (self.num_of_subfilters - 1) * self.odm
    }

    /// True if this entry marks a conversion needing only the other stage.
    pub fn is_passthrough(&self) -> bool {
        self.filter_length == 1
    }

    /// True if this entry marks a deleted rate combination.
    pub fn is_deleted(&self) -> bool {
        self.filter_length == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rates::{SRC_IN_FS, SRC_OUT_FS};

    fn active_stages() -> impl Iterator<Item = &'static SrcStage> {
        (0..SRC_OUT_FS.len())
            .flat_map(|o| (0..SRC_IN_FS.len()).map(move |i| (o, i)))
            .flat_map(|(o, i)| [SRC_TABLE1[o][i], SRC_TABLE2[o][i]])
            .filter(|s| !s.is_deleted() && !s.is_passthrough())
    }

    #[test]
    fn verify_stage_geometry() {
        for s in active_stages() {
            assert_eq!(s.filter_length, s.num_of_subfilters * s.subfilter_length);
            assert_eq!(s.subfilter_length % 4, 0);
            assert_eq!(s.num_of_subfilters, s.blk_out);
            assert!(s.blk_in >= 2);
            assert!(s.fir_delay_length() <= MAX_FIR_DELAY_SIZE);
            assert!(s.out_delay_length() <= MAX_OUT_DELAY_SIZE);

            let n = match s.coefs {
                CoefSlice::Q15(c) => c.len(),
                CoefSlice::Q23(c) => c.len(),
            };
            assert_eq!(n, s.filter_length);
        }
    }

    #[test]
    fn verify_subfilter_strides() {
        // The output reorder stride must step through the whole output delay line and the
        // input stride must follow it: odm * blk_in == idm * blk_out + 1.
        for s in active_stages() {
            if s.num_of_subfilters > 1 {
                assert_eq!(s.odm * s.blk_in, s.idm * s.blk_out + 1);
            }
        }
    }

    #[test]
    fn verify_markers() {
        assert!(SRC_PASSTHROUGH.is_passthrough());
        assert!(SRC_DELETED.is_deleted());

        // Equal rates resolve to passthrough stages on the diagonal.
        for i in 0..SRC_IN_FS.len() {
            assert!(SRC_TABLE1[i][i].is_passthrough());
            assert!(SRC_TABLE2[i][i].is_passthrough());
        }

        // A deleted pair is deleted in both tables.
        for o in 0..SRC_OUT_FS.len() {
            for i in 0..SRC_IN_FS.len() {
                assert_eq!(SRC_TABLE1[o][i].is_deleted(), SRC_TABLE2[o][i].is_deleted());
            }
        }
    }
}
