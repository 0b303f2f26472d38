//! Enter/leave transition collaborator.
//!
//! The core never animates anything itself. It derives a "may animate"
//! boolean from the part flags and hands intent to a [`Transition`], which
//! owns playback, cancellation, and the deferred completion a leave may
//! produce.

use crate::part::DeferredCompletion;
use crate::tree::NodeId;

pub trait Transition {
    /// Nodes entered the tree; `animate` reflects the flag-derived
    /// eligibility.
    fn enter(&mut self, nodes: &[NodeId], animate: bool);

    /// Nodes are about to leave the tree. Returning a completion defers
    /// detachment until it resolves.
    fn leave(&mut self, nodes: &[NodeId], animate: bool) -> Option<DeferredCompletion>;

    /// Aborts any in-flight animation on `nodes`; the caller proceeds with
    /// immediate detachment.
    fn cancel(&mut self, nodes: &[NodeId]);
}

/// Transition that never animates; every leave completes synchronously.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoTransition;

impl Transition for NoTransition {
    fn enter(&mut self, _nodes: &[NodeId], _animate: bool) {}

    fn leave(&mut self, _nodes: &[NodeId], _animate: bool) -> Option<DeferredCompletion> {
        None
    }

    fn cancel(&mut self, _nodes: &[NodeId]) {}
}
