// Cadenza
// Copyright (c) 2026 The Project Cadenza Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `pipeline` module defines the contract between a processing node and the pipeline
//! that schedules it.
//!
//! Scheduling is single-threaded and cooperative: a node's processing entry points run to
//! completion within one pipeline tick and use no internal synchronization. The pipeline may
//! migrate a node across cores between ticks after synchronizing its working memory through
//! [`CacheOps`].

use crate::errors::{invalid_state_error, Result};

/// The lifecycle state of a pipeline node.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum NodeState {
    /// Constructed and idle. Parameters may be set.
    Ready,
    /// Parameters accepted and buffers validated.
    Prepared,
    /// Processing. Only this state permits stream copies.
    Active,
    /// Processing suspended, state retained.
    Paused,
}

/// A trigger command delivered to a node by the pipeline.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Trigger {
    Prepare,
    Start,
    Pause,
    Release,
    Stop,
    Reset,
}

/// Computes the state a node transitions to for a trigger, or an error if the trigger is not
/// legal in the current state.
pub fn next_state(current: NodeState, trigger: Trigger) -> Result<NodeState> {
    match (current, trigger) {
        (NodeState::Ready, Trigger::Prepare) | (NodeState::Prepared, Trigger::Prepare) => {
            Ok(NodeState::Prepared)
        }
        (NodeState::Prepared, Trigger::Start) => Ok(NodeState::Active),
        (NodeState::Active, Trigger::Pause) => Ok(NodeState::Paused),
        (NodeState::Paused, Trigger::Release) => Ok(NodeState::Active),
        (NodeState::Active, Trigger::Stop) | (NodeState::Paused, Trigger::Stop) => {
            Ok(NodeState::Prepared)
        }
        (_, Trigger::Reset) => Ok(NodeState::Ready),
        _ => invalid_state_error(),
    }
}

/// The state-machine face of a pipeline node.
pub trait Node {
    /// The node's current lifecycle state.
    fn state(&self) -> NodeState;

    /// Applies a pipeline trigger command, returning the new state.
    fn trigger(&mut self, trigger: Trigger) -> Result<NodeState>;

    /// Returns the node to `Ready`, dropping stream state but keeping configuration.
    fn reset(&mut self);
}

/// A cache maintenance request delivered to a node between ticks.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CacheOp {
    WritebackInvalidate,
    Invalidate,
}

/// Host-provided cache maintenance operations.
///
/// A node exposes its working memory to these callbacks between ticks when the pipeline
/// requests a core migration. The default implementations are no-ops for hosts with coherent
/// caches.
pub trait CacheOps {
    /// Write back and invalidate the given region.
    fn writeback_invalidate(&mut self, _region: &[u8]) {}

    /// Invalidate the given region.
    fn invalidate(&mut self, _region: &[u8]) {}
}

/// A `CacheOps` implementation for cache-coherent hosts.
#[derive(Default)]
pub struct CoherentHost;

impl CacheOps for CoherentHost {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_legal_transitions() {
        let s = next_state(NodeState::Ready, Trigger::Prepare).unwrap();
        assert_eq!(s, NodeState::Prepared);
        let s = next_state(s, Trigger::Start).unwrap();
        assert_eq!(s, NodeState::Active);
        let s = next_state(s, Trigger::Pause).unwrap();
        assert_eq!(s, NodeState::Paused);
        let s = next_state(s, Trigger::Release).unwrap();
        assert_eq!(s, NodeState::Active);
        let s = next_state(s, Trigger::Stop).unwrap();
        assert_eq!(s, NodeState::Prepared);
        let s = next_state(s, Trigger::Reset).unwrap();
        assert_eq!(s, NodeState::Ready);
    }

    #[test]
    fn verify_illegal_transitions() {
        assert!(next_state(NodeState::Ready, Trigger::Start).is_err());
        assert!(next_state(NodeState::Prepared, Trigger::Pause).is_err());
        assert!(next_state(NodeState::Paused, Trigger::Prepare).is_err());
    }
}
