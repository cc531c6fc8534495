// Cadenza
// Copyright (c) 2026 The Project Cadenza Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `errors` module defines the common error type.

use std::error::Error as StdError;
use std::fmt;
use std::result;

/// `CadenzaError` provides an enumeration of all possible errors reported by Cadenza.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CadenzaError {
    /// The input or output sample rate is not present in the supported rate tables.
    UnsupportedRate,
    /// The rate combination exists in the tables but is marked unavailable.
    DeletedMode,
    /// The channel count is zero or exceeds the platform maximum.
    ChannelLimit,
    /// A computed delay line exceeds the platform maximum size.
    DelaySizeExceeded,
    /// A subfilter length is incompatible with the optimized kernel (design-time data error).
    SubfilterAlignment,
    /// Delay-line memory could not be obtained.
    AllocationFailed,
    /// The source ring has too little data, or the sink ring too little free
    /// space, to run one conversion block.
    Xrun,
    /// The operation is not permitted in the node's current state.
    InvalidState,
    /// An unsupported parameter or feature was encountered.
    Unsupported(&'static str),
}

impl fmt::Display for CadenzaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            CadenzaError::UnsupportedRate => {
                write!(f, "sample rate is not supported")
            }
            CadenzaError::DeletedMode => {
                write!(f, "rate combination is deleted from the conversion matrix")
            }
            CadenzaError::ChannelLimit => {
                write!(f, "channel count exceeds the platform limit")
            }
            CadenzaError::DelaySizeExceeded => {
                write!(f, "delay line exceeds the platform maximum size")
            }
            CadenzaError::SubfilterAlignment => {
                write!(f, "subfilter length is misaligned for the kernel")
            }
            CadenzaError::AllocationFailed => {
                write!(f, "delay line memory could not be obtained")
            }
            CadenzaError::Xrun => {
                write!(f, "source underrun or sink overrun")
            }
            CadenzaError::InvalidState => {
                write!(f, "operation not permitted in the current state")
            }
            CadenzaError::Unsupported(feature) => {
                write!(f, "unsupported feature: {}", feature)
            }
        }
    }
}

impl StdError for CadenzaError {}

pub type Result<T> = result::Result<T, CadenzaError>;

/// Convenience function to create an unsupported rate error.
pub fn unsupported_rate_error<T>() -> Result<T> {
    Err(CadenzaError::UnsupportedRate)
}

/// Convenience function to create an xrun error.
pub fn xrun_error<T>() -> Result<T> {
    Err(CadenzaError::Xrun)
}

/// Convenience function to create an unsupported feature error.
pub fn unsupported_error<T>(feature: &'static str) -> Result<T> {
    Err(CadenzaError::Unsupported(feature))
}

/// Convenience function to create an invalid state error.
pub fn invalid_state_error<T>() -> Result<T> {
    Err(CadenzaError::InvalidState)
}
