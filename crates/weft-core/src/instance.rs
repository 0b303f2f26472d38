//! Live content instances.
//!
//! A [`ContentInstance`] owns the fragment produced by one render result:
//! its top-level nodes, its lifecycle parts, and the values last patched
//! in. It knows how to attach and detach itself relative to an [`Anchor`],
//! whether a fresh render result can be patched into it in place, and how
//! to broadcast connect/disconnect through its part subtree.

use crate::anchor::Anchor;
use crate::part::{DeferredCompletion, PartFlags, PartLifecycle, PartState};
use crate::transition::Transition;
use crate::tree::{Fragment, NodeId, ShapeKey, TreeBackend, TreeError};
use crate::InstanceId;

/// What a render function hands back for one item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderResult<V> {
    pub shape: ShapeKey,
    pub values: V,
}

impl<V> RenderResult<V> {
    pub fn new(shape: ShapeKey, values: V) -> Self {
        Self { shape, values }
    }
}

pub struct ContentInstance<V> {
    id: InstanceId,
    shape: ShapeKey,
    values: V,
    fragment: Fragment,
    lifecycle: PartLifecycle,
}

impl<V> ContentInstance<V> {
    pub fn new(id: InstanceId, shape: ShapeKey, values: V, fragment: Fragment) -> Self {
        Self {
            id,
            shape,
            values,
            fragment,
            lifecycle: PartLifecycle::new(),
        }
    }

    pub fn id(&self) -> InstanceId {
        self.id
    }

    pub fn shape(&self) -> ShapeKey {
        self.shape
    }

    pub fn values(&self) -> &V {
        &self.values
    }

    pub fn nodes(&self) -> &[NodeId] {
        &self.fragment.nodes
    }

    pub fn state(&self) -> PartState {
        self.lifecycle.state()
    }

    /// Whether a render result with `shape` can be patched in place.
    pub fn is_compatible(&self, shape: ShapeKey) -> bool {
        self.shape == shape
    }

    /// The position of this instance's first node; `fallback` for an empty
    /// fragment.
    pub fn start_anchor(&self, fallback: Anchor) -> Anchor {
        self.fragment
            .nodes
            .first()
            .map(|&node| Anchor::Before(node))
            .unwrap_or(fallback)
    }

    /// Attaches the fragment's nodes at `anchor`, in order.
    pub fn mount<B>(&mut self, tree: &mut B, anchor: Anchor) -> Result<(), TreeError>
    where
        B: TreeBackend<Values = V> + ?Sized,
    {
        for &node in &self.fragment.nodes {
            anchor.insert_node(tree, node)?;
        }
        Ok(())
    }

    /// Removes the fragment's nodes from the tree.
    pub fn detach<B>(&mut self, tree: &mut B) -> Result<(), TreeError>
    where
        B: TreeBackend<Values = V> + ?Sized,
    {
        for &node in &self.fragment.nodes {
            tree.detach(node)?;
        }
        Ok(())
    }

    /// Writes fresh values into the existing fragment.
    pub fn patch<B>(&mut self, tree: &mut B, values: V) -> Result<(), TreeError>
    where
        B: TreeBackend<Values = V> + ?Sized,
    {
        tree.patch(&self.fragment, &values)?;
        self.values = values;
        Ok(())
    }

    /// Moves the fragment to `anchor` without replaying enter/leave.
    ///
    /// The part subtree sees a disconnect immediately followed by a
    /// reconnect, both carrying `MOVE_IMMEDIATELY`, so resources that care
    /// about tree membership get told while animations stay silent.
    pub fn relocate<B>(
        &mut self,
        tree: &mut B,
        anchor: Anchor,
        transition: &mut dyn Transition,
    ) -> Result<(), TreeError>
    where
        B: TreeBackend<Values = V> + ?Sized,
    {
        let flags = PartFlags::FROM_OWN_STATE_CHANGE
            | PartFlags::AS_DIRECT_NODE
            | PartFlags::MOVE_IMMEDIATELY;
        // nothing may defer under MOVE_IMMEDIATELY; the relocation does not
        // wait for a part that does anyway
        if let Some(completion) = self.disconnect(flags, transition) {
            if !completion.is_resolved() {
                log::warn!(
                    "instance {}: deferred completion ignored during immediate move",
                    self.id
                );
            }
        }
        self.lifecycle.finish_disconnect();
        // a move to the instance's own start changes logical order only;
        // the nodes are already where they belong
        let stationary =
            self.fragment.nodes.first().map(|&node| Anchor::Before(node)) == Some(anchor);
        if !stationary {
            for &node in &self.fragment.nodes {
                tree.detach(node)?;
            }
            for &node in &self.fragment.nodes {
                anchor.insert_node(tree, node)?;
            }
        }
        self.connect(flags, transition);
        Ok(())
    }

    /// Broadcasts connect through the part subtree and plays the enter
    /// transition when the flags allow it.
    pub fn connect(&mut self, flags: PartFlags, transition: &mut dyn Transition) {
        if !self.lifecycle.begin_connect() {
            return;
        }
        for entry in &mut self.fragment.parts {
            let forwarded = if entry.direct {
                flags
            } else {
                flags.for_nested()
            };
            entry.part.on_connect(forwarded);
        }
        transition.enter(&self.fragment.nodes, flags.should_animate());
        self.lifecycle.finish_connect();
    }

    /// Broadcasts disconnect through the part subtree, starts the leave
    /// transition when the flags allow it, and combines every deferred
    /// completion into one.
    ///
    /// On `Some`, the caller keeps the instance alive until the completion
    /// resolves, then calls [`finish_disconnect`](Self::finish_disconnect)
    /// and [`detach`](Self::detach).
    pub fn disconnect(
        &mut self,
        flags: PartFlags,
        transition: &mut dyn Transition,
    ) -> Option<DeferredCompletion> {
        if !self.lifecycle.begin_disconnect() {
            return None;
        }
        let mut pending = Vec::new();
        for entry in &mut self.fragment.parts {
            let forwarded = if entry.direct {
                flags
            } else {
                flags.for_nested()
            };
            if let Some(completion) = entry.part.on_disconnect(forwarded) {
                pending.push(completion);
            }
        }
        if let Some(completion) = transition.leave(&self.fragment.nodes, flags.should_animate()) {
            pending.push(completion);
        }
        let combined = DeferredCompletion::join(pending);
        if combined.is_none() {
            self.lifecycle.finish_disconnect();
        }
        combined
    }

    /// Completes a disconnect whose deferred completion has resolved or
    /// been cancelled.
    pub fn finish_disconnect(&mut self) {
        self.lifecycle.finish_disconnect();
    }
}
