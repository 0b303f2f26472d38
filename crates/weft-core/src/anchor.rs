//! Incremental position tracking.
//!
//! An [`Anchor`] describes where nodes go without querying the tree: either
//! immediately before a specific sibling, or appended at the end of a
//! container. [`PositionMap`] keeps book of which instance each anchor
//! belongs to, and which anchor follows each instance, so that inserting or
//! removing an instance at an anchor transparently repoints its neighbours.
//! The map acts as a doubly linked list threaded through anchors. For an
//! instance with no nodes of its own, the recorded anchor doubles as its
//! position in the tree.

use crate::collections::map::HashMap;
use crate::tree::{NodeId, TreeBackend, TreeError};
use crate::InstanceId;

/// A position in the tree that stays valid as siblings come and go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Anchor {
    /// Immediately before this node.
    Before(NodeId),
    /// Appended at the end of this container.
    EndOf(NodeId),
}

impl Anchor {
    /// Places `node` at this position.
    pub fn insert_node<B>(self, tree: &mut B, node: NodeId) -> Result<(), TreeError>
    where
        B: TreeBackend + ?Sized,
    {
        match self {
            Anchor::Before(reference) => tree.insert_before(node, reference),
            Anchor::EndOf(container) => tree.append(container, node),
        }
    }
}

/// Bidirectional association between live instances and the anchor that
/// follows each of them.
///
/// One map per controller; entries never leak across lists. Apart from the
/// transient window inside [`insert`](Self::insert) and
/// [`remove`](Self::remove), no anchor has two owners and every registered
/// instance has exactly one recorded anchor. Several instances may record
/// the same anchor when instances without nodes share a tree position; the
/// owner is the one repointed by the next insertion there.
#[derive(Default)]
pub struct PositionMap {
    anchor_of: HashMap<InstanceId, Anchor>,
    owner_of: HashMap<Anchor, InstanceId>,
}

impl PositionMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `instance` as occupying `anchor`, where `start` is the
    /// instance's own start position.
    ///
    /// If `anchor` was owned by another instance, that instance now ends
    /// where the new one begins, so it is repointed to `start`.
    pub fn insert(&mut self, instance: InstanceId, start: Anchor, anchor: Anchor) {
        if let Some(previous) = self.owner_of.remove(&anchor) {
            self.anchor_of.insert(previous, start);
            self.owner_of.insert(start, previous);
        }
        self.anchor_of.insert(instance, anchor);
        self.owner_of.insert(anchor, instance);
    }

    /// Registers `instance` at `anchor` in front of the anchor's current
    /// owner.
    ///
    /// Used when new content lands at the position of an instance that has
    /// no nodes of its own: that instance comes after the new one, so its
    /// recorded anchor still names the same tree position and must not be
    /// repointed. Ownership moves to the newcomer, which is the one a later
    /// insertion at `anchor` has to repoint.
    pub fn insert_before_owner(&mut self, instance: InstanceId, anchor: Anchor) {
        self.anchor_of.insert(instance, anchor);
        self.owner_of.insert(anchor, instance);
    }

    /// Changes `instance`'s recorded anchor without claiming ownership of
    /// the new one.
    ///
    /// Used when an instance ends up following another at the same tree
    /// position; ownership of the old anchor is released if held.
    pub fn repoint(&mut self, instance: InstanceId, anchor: Anchor) {
        if let Some(old) = self.anchor_of.insert(instance, anchor) {
            if self.owner_of.get(&old) == Some(&instance) {
                self.owner_of.remove(&old);
            }
        }
    }

    /// Unregisters `instance`, where `start` is the instance's own start
    /// position.
    ///
    /// If another instance was anchored at `start` (it ended where this one
    /// began), it inherits the anchor this instance occupied, keeping the
    /// chain unbroken.
    pub fn remove(&mut self, instance: InstanceId, start: Anchor) {
        let anchor = match self.anchor_of.remove(&instance) {
            Some(anchor) => anchor,
            None => return,
        };
        if self.owner_of.get(&anchor) == Some(&instance) {
            self.owner_of.remove(&anchor);
        }
        if let Some(follower) = self.owner_of.remove(&start) {
            self.anchor_of.insert(follower, anchor);
            self.owner_of.insert(anchor, follower);
        }
    }

    pub fn anchor_of(&self, instance: InstanceId) -> Option<Anchor> {
        self.anchor_of.get(&instance).copied()
    }

    pub fn owner_of(&self, anchor: Anchor) -> Option<InstanceId> {
        self.owner_of.get(&anchor).copied()
    }

    pub fn len(&self) -> usize {
        self.anchor_of.len()
    }

    pub fn is_empty(&self) -> bool {
        self.anchor_of.is_empty()
    }

    #[cfg(test)]
    pub(crate) fn check_consistent(&self) {
        assert!(self.owner_of.len() <= self.anchor_of.len());
        for (anchor, &instance) in &self.owner_of {
            assert_eq!(self.anchor_of.get(&instance), Some(anchor));
        }
    }
}
