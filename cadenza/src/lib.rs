// Cadenza
// Copyright (c) 2026 The Project Cadenza Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! # Project Cadenza
//!
//! Cadenza is a 100% pure Rust, fixed-point audio sample-rate conversion framework.
//!
//! The converter is a two-stage polyphase FIR engine operating on Q1.31 delay lines with
//! precomputed Q1.23 (or Q1.15) coefficient tables for a curated matrix of rates. The
//! [`src::SrcComponent`] wraps the engine as a streaming pipeline node: it negotiates one
//! free side of the rate pair, owns its delay lines, and pumps interleaved PCM between
//! source and sink rings with xrun detection.
//!
//! # Usage
//!
//! 1.  Build a [`src::SrcConfig`] with exactly one of the source or sink rate fixed, then a
//!     [`src::SrcComponent`].
//! 2.  Deliver the pipeline stream description with
//!     [`params`][src::SrcComponent::params]; the free rate is taken from it and the
//!     stream rate is rewritten for the next element.
//! 3.  Validate ring capacities with [`prepare`][src::SrcComponent::prepare] and start the
//!     node with [`Trigger::Start`][core::pipeline::Trigger].
//! 4.  Call [`copy`][src::SrcComponent::copy] once per pipeline tick.
//!
//! Supported rates on either side are exported as bit masks by
//! [`src::rates::src_input_rates`] and [`src::rates::src_output_rates`].

pub use cadenza_core as core;

#[cfg(feature = "src")]
pub use cadenza_src as src;
