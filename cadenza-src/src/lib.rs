// Cadenza
// Copyright (c) 2026 The Project Cadenza Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A fixed-point, multi-rate, two-stage polyphase FIR sample-rate converter.
//!
//! The converter streams PCM between a curated matrix of rates. A conversion is decomposed
//! into up to two cascaded polyphase FIR stages selected from precomputed tables; equal rates
//! take a verbatim copy path. The [`component::SrcComponent`] wraps the engine as a pipeline
//! node that negotiates rates, owns the delay lines, and pumps source and sink rings with
//! xrun detection.

pub mod coefs;
pub mod component;
pub mod planner;
pub mod polyphase;
pub mod rates;
pub mod stage;

mod fir;

pub use component::{SrcComponent, SrcConfig};
pub use planner::{src_buffer_lengths, SrcParams};
pub use polyphase::PolyphaseSrc;
