//! Reconciled keyed lists.
//!
//! [`KeyedList`] owns the live instances for one region of the tree and
//! replays edit scripts from [`crate::edit::plan`] against them. Each
//! update runs synchronously to completion: values are patched in place
//! where an item survived, fragments are relocated where it moved, and
//! instances are created or torn down at the edges. Anchors come from the
//! per-list [`PositionMap`], so nothing ever searches the tree.

use std::mem;

use crate::anchor::{Anchor, PositionMap};
use crate::edit::{self, EditOp};
use crate::instance::{ContentInstance, RenderResult};
use crate::part::{DeferredCompletion, PartFlags};
use crate::transition::Transition;
use crate::tree::{TreeBackend, TreeError};
use crate::InstanceId;

type RenderFn<T, V> = Box<dyn FnMut(&T, usize) -> RenderResult<V>>;

struct PendingTeardown<V> {
    instance: ContentInstance<V>,
    completion: DeferredCompletion,
}

/// Controller keeping an ordered run of content instances in sync with a
/// keyed data sequence.
///
/// Concurrent updates must be serialized by the caller; the surrounding
/// scheduler guarantees at most one in-flight update per controller.
pub struct KeyedList<T, B: TreeBackend> {
    render: RenderFn<T, B::Values>,
    data: Vec<T>,
    instances: Vec<ContentInstance<B::Values>>,
    positions: PositionMap,
    /// Anchor closing this list's region; the last instance ends here.
    end: Anchor,
    next_instance_id: InstanceId,
    detaching: Vec<PendingTeardown<B::Values>>,
}

impl<T, B> KeyedList<T, B>
where
    T: Eq + std::hash::Hash,
    B: TreeBackend,
{
    pub fn new(end: Anchor, render: impl FnMut(&T, usize) -> RenderResult<B::Values> + 'static) -> Self {
        Self {
            render: Box::new(render),
            data: Vec::new(),
            instances: Vec::new(),
            positions: PositionMap::new(),
            end,
            next_instance_id: 0,
            detaching: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    pub fn data(&self) -> &[T] {
        &self.data
    }

    pub fn instances(&self) -> &[ContentInstance<B::Values>] {
        &self.instances
    }

    /// Number of teardowns still waiting on a leave animation.
    pub fn detaching_len(&self) -> usize {
        self.detaching.len()
    }

    /// Reconciles the live instances against `new_data`.
    ///
    /// Runs synchronously; leave animations never block it. Teardowns
    /// still animating from a previous update are cancelled and detached
    /// first, per the at-most-one-in-flight rule.
    pub fn update(
        &mut self,
        tree: &mut B,
        transition: &mut dyn Transition,
        new_data: Vec<T>,
    ) -> Result<(), TreeError> {
        self.cancel_pending(tree, transition)
            .and_then(|_| self.apply(tree, transition, new_data))
            .map_err(|err| {
                log::error!("keyed list update failed: {err}");
                err
            })
    }

    /// Detaches every teardown whose leave animation has finished.
    ///
    /// Hosts call this from their flush hook; nothing here is time
    /// sensitive.
    pub fn reap(&mut self, tree: &mut B) -> Result<(), TreeError> {
        let pending = mem::take(&mut self.detaching);
        for mut teardown in pending {
            if teardown.completion.is_resolved() {
                teardown.instance.finish_disconnect();
                teardown.instance.detach(tree)?;
            } else {
                self.detaching.push(teardown);
            }
        }
        Ok(())
    }

    fn apply(
        &mut self,
        tree: &mut B,
        transition: &mut dyn Transition,
        new_data: Vec<T>,
    ) -> Result<(), TreeError> {
        let script = edit::plan(&self.data, &new_data, true);
        log::trace!(
            "keyed list update: {} old, {} new, {} ops",
            self.data.len(),
            new_data.len(),
            script.len()
        );

        let mut old: Vec<Option<ContentInstance<B::Values>>> =
            mem::take(&mut self.instances).into_iter().map(Some).collect();
        let mut next: Vec<Option<ContentInstance<B::Values>>> =
            (0..new_data.len()).map(|_| None).collect();

        for op in script {
            match op {
                EditOp::Leave { from, to } => {
                    let mut instance = take_slot(&mut old, from);
                    let result = (self.render)(&new_data[to], to);
                    instance.patch(tree, result.values)?;
                    next[to] = Some(instance);
                }
                EditOp::Move {
                    from,
                    to,
                    insert_before,
                }
                | EditOp::MoveModify {
                    from,
                    to,
                    insert_before,
                } => {
                    let mut instance = take_slot(&mut old, from);
                    let result = (self.render)(&new_data[to], to);
                    let (anchor, boundary) = self.boundary_at(insert_before, &old);
                    // a node-less boundary sitting right behind this
                    // instance resolves to the instance's own start; only
                    // their logical order changes
                    let stationary = anchor == self.start_of(&instance);
                    if instance.is_compatible(result.shape) {
                        if stationary {
                            instance.relocate(tree, anchor, transition)?;
                            instance.patch(tree, result.values)?;
                            if let Some(owner) = boundary.filter(|&id| {
                                self.positions.owner_of(anchor) == Some(id)
                            }) {
                                if let Some(after) = self.positions.anchor_of(instance.id()) {
                                    self.positions.repoint(owner, after);
                                    if instance.nodes().is_empty() {
                                        // both node-less at one position;
                                        // the first of them takes ownership
                                        self.positions
                                            .insert_before_owner(instance.id(), after);
                                    }
                                }
                            }
                        } else {
                            let start = self.start_of(&instance);
                            self.positions.remove(instance.id(), start);
                            instance.relocate(tree, anchor, transition)?;
                            instance.patch(tree, result.values)?;
                            self.register(&instance, anchor, boundary);
                        }
                        next[to] = Some(instance);
                    } else {
                        // recycled instance renders a different shape:
                        // discard it and build fresh at the same anchor,
                        // never on a node the teardown is about to detach
                        let anchor = if stationary {
                            self.positions.anchor_of(instance.id()).unwrap_or(self.end)
                        } else {
                            anchor
                        };
                        self.destroy(tree, transition, instance)?;
                        next[to] =
                            Some(self.create(tree, transition, result, anchor, boundary)?);
                    }
                }
                EditOp::Insert { to, insert_before } => {
                    let result = (self.render)(&new_data[to], to);
                    let (anchor, boundary) = self.boundary_at(insert_before, &old);
                    next[to] = Some(self.create(tree, transition, result, anchor, boundary)?);
                }
                EditOp::Delete { from } => {
                    let instance = take_slot(&mut old, from);
                    self.destroy(tree, transition, instance)?;
                }
            }
        }

        self.instances = next
            .into_iter()
            .map(|slot| slot.expect("edit script fills every new index"))
            .collect();
        self.data = new_data;
        Ok(())
    }

    /// Resolves an old-index-space insertion boundary to an anchor, plus
    /// the boundary instance's id when there is one.
    ///
    /// Boundaries always name stable instances, which stay in their slots
    /// until their own Leave op runs, after every operation anchored on
    /// them. A boundary instance without nodes is located through the
    /// position map, which records exactly this.
    fn boundary_at(
        &self,
        insert_before: usize,
        old: &[Option<ContentInstance<B::Values>>],
    ) -> (Anchor, Option<InstanceId>) {
        match old.get(insert_before).and_then(|slot| slot.as_ref()) {
            Some(instance) => (self.start_of(instance), Some(instance.id())),
            None => (self.end, None),
        }
    }

    /// The position of an instance's first node, or, for an instance with
    /// no nodes, its recorded position.
    fn start_of(&self, instance: &ContentInstance<B::Values>) -> Anchor {
        instance
            .nodes()
            .first()
            .map(|&node| Anchor::Before(node))
            .or_else(|| self.positions.anchor_of(instance.id()))
            .unwrap_or(self.end)
    }

    /// Records a freshly placed instance in the position map.
    ///
    /// When the anchor came from a node-less boundary instance that still
    /// owns it, that instance follows the new one and keeps its anchor;
    /// otherwise the regular repointing applies.
    fn register(
        &mut self,
        instance: &ContentInstance<B::Values>,
        anchor: Anchor,
        boundary: Option<InstanceId>,
    ) {
        if boundary.is_some() && self.positions.owner_of(anchor) == boundary {
            self.positions.insert_before_owner(instance.id(), anchor);
        } else {
            self.positions
                .insert(instance.id(), instance.start_anchor(anchor), anchor);
        }
    }

    fn create(
        &mut self,
        tree: &mut B,
        transition: &mut dyn Transition,
        result: RenderResult<B::Values>,
        anchor: Anchor,
        boundary: Option<InstanceId>,
    ) -> Result<ContentInstance<B::Values>, TreeError> {
        let fragment = tree.instantiate(result.shape, &result.values)?;
        let id = self.next_instance_id;
        self.next_instance_id += 1;
        let mut instance = ContentInstance::new(id, result.shape, result.values, fragment);
        instance.mount(tree, anchor)?;
        self.register(&instance, anchor, boundary);
        instance.connect(
            PartFlags::FROM_OWN_STATE_CHANGE | PartFlags::AS_DIRECT_NODE,
            transition,
        );
        Ok(instance)
    }

    fn destroy(
        &mut self,
        tree: &mut B,
        transition: &mut dyn Transition,
        mut instance: ContentInstance<B::Values>,
    ) -> Result<(), TreeError> {
        let start = self.start_of(&instance);
        self.positions.remove(instance.id(), start);
        let flags = PartFlags::FROM_OWN_STATE_CHANGE | PartFlags::AS_DIRECT_NODE;
        match instance.disconnect(flags, transition) {
            Some(completion) => {
                // leave animation in flight; nodes stay attached until it
                // resolves or the next update cancels it
                self.detaching.push(PendingTeardown {
                    instance,
                    completion,
                });
            }
            None => instance.detach(tree)?,
        }
        Ok(())
    }

    fn cancel_pending(
        &mut self,
        tree: &mut B,
        transition: &mut dyn Transition,
    ) -> Result<(), TreeError> {
        for mut teardown in mem::take(&mut self.detaching) {
            if !teardown.completion.is_resolved() {
                transition.cancel(teardown.instance.nodes());
            }
            teardown.instance.finish_disconnect();
            teardown.instance.detach(tree)?;
        }
        Ok(())
    }
}

fn take_slot<V>(old: &mut [Option<ContentInstance<V>>], from: usize) -> ContentInstance<V> {
    old[from]
        .take()
        .expect("edit script consumes each old index once")
}
