// Cadenza
// Copyright (c) 2026 The Project Cadenza Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `rates` module enumerates the supported input and output sample rates and maps them
//! onto the canonical pipeline rate list.

use bitflags::bitflags;

/// Input rates with at least one conversion in the stage tables, ascending.
pub const SRC_IN_FS: [u32; 8] = [8000, 16000, 24000, 32000, 44100, 48000, 96000, 192000];

/// Output rates with at least one conversion in the stage tables, ascending.
pub const SRC_OUT_FS: [u32; 8] = [8000, 16000, 24000, 32000, 44100, 48000, 96000, 192000];

/// The canonical pipeline rate list. Bit `n` of a [`RateMask`] refers to entry `n` here.
pub const CANONICAL_RATES: [u32; 15] = [
    8000, 11025, 12000, 16000, 18900, 22050, 24000, 32000, 44100, 48000, 64000, 88200, 96000,
    176400, 192000,
];

bitflags! {
    /// A bit mask over [`CANONICAL_RATES`] reporting rate support on one side of the
    /// converter.
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    pub struct RateMask: u32 {
        const HZ_8000 = 1 << 0;
        const HZ_11025 = 1 << 1;
        const HZ_12000 = 1 << 2;
        const HZ_16000 = 1 << 3;
        const HZ_18900 = 1 << 4;
        const HZ_22050 = 1 << 5;
        const HZ_24000 = 1 << 6;
        const HZ_32000 = 1 << 7;
        const HZ_44100 = 1 << 8;
        const HZ_48000 = 1 << 9;
        const HZ_64000 = 1 << 10;
        const HZ_88200 = 1 << 11;
        const HZ_96000 = 1 << 12;
        const HZ_176400 = 1 << 13;
        const HZ_192000 = 1 << 14;
    }
}

/// Returns the index of a matching sample rate in `list`.
pub fn find_fs(list: &[u32], fs: u32) -> Option<usize> {
    list.iter().position(|&r| r == fs)
}

fn rate_mask(list: &[u32]) -> RateMask {
    let mut mask = RateMask::empty();
    for (n, &rate) in CANONICAL_RATES.iter().enumerate() {
        if find_fs(list, rate).is_some() {
            mask |= RateMask::from_bits_retain(1 << n);
        }
    }
    mask
}

/// The canonical rates supported on the converter input.
pub fn src_input_rates() -> RateMask {
    rate_mask(&SRC_IN_FS)
}

/// The canonical rates supported on the converter output.
pub fn src_output_rates() -> RateMask {
    rate_mask(&SRC_OUT_FS)
}
