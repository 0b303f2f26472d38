//! The connect/disconnect broadcast protocol.
//!
//! Every lifecycle participant, from a content instance's bindings down to
//! a nested component, is a [`Part`]. Connect and
//! disconnect calls carry a [`PartFlags`] bitmask that tells the part *why*
//! it is being called: because its own containing structure changed, or
//! because an ancestor moved it. Getting this distinction right is what
//! makes enter/leave animations and resource teardown fire exactly once,
//! in the right place.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

bitflags::bitflags! {
    /// Reason bits carried on every connect/disconnect call.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PartFlags: u8 {
        /// The part's own containing structure changed (a list operation),
        /// rather than a cascading ancestor move.
        const FROM_OWN_STATE_CHANGE = 1 << 0;
        /// The underlying node is being inserted or removed directly as a
        /// top-level child of its template. Only parts carrying this bit
        /// may play enter/leave animation by default.
        const AS_DIRECT_NODE = 1 << 1;
        /// Internal marker: a component's root element is itself the direct
        /// node. Converted back to `AS_DIRECT_NODE` when the call reaches
        /// the component's designated context anchor.
        const AS_DIRECT_CONTEXT_NODE_INTERNAL = 1 << 2;
        /// Suppresses all animation; set for forced teardown and for
        /// relocation of a reused instance.
        const MOVE_IMMEDIATELY = 1 << 3;
    }
}

impl PartFlags {
    /// Flags forwarded to parts nested below a fragment's top level.
    ///
    /// Nested nodes are carried along with their ancestor rather than being
    /// inserted themselves, so the direct-node bits are stripped.
    #[inline]
    pub fn for_nested(self) -> Self {
        self - (Self::AS_DIRECT_NODE | Self::AS_DIRECT_CONTEXT_NODE_INTERNAL)
    }

    /// Flags forwarded across the boundary of a component whose root
    /// element is itself the direct node.
    #[inline]
    pub fn into_component(self) -> Self {
        if self.contains(Self::AS_DIRECT_NODE) {
            (self - Self::AS_DIRECT_NODE) | Self::AS_DIRECT_CONTEXT_NODE_INTERNAL
        } else {
            self
        }
    }

    /// Flags applied on entering a component's own render tree.
    ///
    /// The internal bit is promoted back to `AS_DIRECT_NODE` only when the
    /// target position is the component's context anchor; anywhere else it
    /// is dropped.
    #[inline]
    pub fn at_context_anchor(self, is_context_anchor: bool) -> Self {
        if !self.contains(Self::AS_DIRECT_CONTEXT_NODE_INTERNAL) {
            return self;
        }
        let stripped = self - Self::AS_DIRECT_CONTEXT_NODE_INTERNAL;
        if is_context_anchor {
            stripped | Self::AS_DIRECT_NODE
        } else {
            stripped
        }
    }

    /// Whether a transition may play for a call carrying these flags.
    #[inline]
    pub fn should_animate(self) -> bool {
        self.contains(Self::AS_DIRECT_NODE) && !self.contains(Self::MOVE_IMMEDIATELY)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartState {
    Disconnected,
    Connecting,
    Connected,
    Disconnecting,
}

/// Guard enforcing the part state machine.
///
/// Re-entrant connects while connected (or disconnects while disconnected)
/// are no-ops; `begin_*` returns whether the transition actually started.
/// A connect is also allowed out of `Disconnecting`, which is how a
/// cancelled teardown comes back.
#[derive(Debug, Default, Clone)]
pub struct PartLifecycle {
    state: Cell<PartState>,
}

impl Default for PartState {
    fn default() -> Self {
        PartState::Disconnected
    }
}

impl PartLifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> PartState {
        self.state.get()
    }

    pub fn is_connected(&self) -> bool {
        self.state.get() == PartState::Connected
    }

    pub fn begin_connect(&self) -> bool {
        match self.state.get() {
            PartState::Disconnected | PartState::Disconnecting => {
                self.state.set(PartState::Connecting);
                true
            }
            PartState::Connecting | PartState::Connected => false,
        }
    }

    pub fn finish_connect(&self) {
        if self.state.get() == PartState::Connecting {
            self.state.set(PartState::Connected);
        }
    }

    pub fn begin_disconnect(&self) -> bool {
        match self.state.get() {
            PartState::Connected | PartState::Connecting => {
                self.state.set(PartState::Disconnecting);
                true
            }
            PartState::Disconnected | PartState::Disconnecting => false,
        }
    }

    pub fn finish_disconnect(&self) {
        if self.state.get() == PartState::Disconnecting {
            self.state.set(PartState::Disconnected);
        }
    }
}

/// A connect/disconnect-aware participant in the lifecycle broadcast tree.
///
/// Parts are referenced top-down only; no back-references are required.
pub trait Part {
    fn on_connect(&mut self, flags: PartFlags);

    /// Tears the part down; may return a deferred completion to await (for
    /// example, a leave animation). Composite parts combine all children's
    /// completions via [`DeferredCompletion::join`].
    fn on_disconnect(&mut self, flags: PartFlags) -> Option<DeferredCompletion>;
}

#[derive(Default)]
struct CompletionInner {
    resolved: Cell<bool>,
    callbacks: RefCell<Vec<Box<dyn FnOnce()>>>,
}

impl CompletionInner {
    fn resolve(&self) {
        if self.resolved.replace(true) {
            return;
        }
        let callbacks = std::mem::take(&mut *self.callbacks.borrow_mut());
        for callback in callbacks {
            callback();
        }
    }
}

/// An asynchronous completion handed back from [`Part::on_disconnect`].
#[derive(Clone, Default)]
pub struct DeferredCompletion {
    inner: Rc<CompletionInner>,
}

/// Resolver side of a [`DeferredCompletion`].
#[derive(Clone)]
pub struct CompletionHandle {
    inner: Rc<CompletionInner>,
}

impl CompletionHandle {
    pub fn resolve(&self) {
        self.inner.resolve();
    }

    pub fn is_resolved(&self) -> bool {
        self.inner.resolved.get()
    }
}

impl DeferredCompletion {
    /// A completion that has not happened yet, plus its resolver.
    pub fn pending() -> (Self, CompletionHandle) {
        let inner = Rc::new(CompletionInner::default());
        (
            Self {
                inner: Rc::clone(&inner),
            },
            CompletionHandle { inner },
        )
    }

    /// An already-resolved completion.
    pub fn resolved() -> Self {
        let completion = Self::default();
        completion.inner.resolved.set(true);
        completion
    }

    pub fn is_resolved(&self) -> bool {
        self.inner.resolved.get()
    }

    /// Runs `callback` once resolved; immediately if already resolved.
    pub fn on_resolved(&self, callback: impl FnOnce() + 'static) {
        if self.is_resolved() {
            callback();
        } else {
            self.inner.callbacks.borrow_mut().push(Box::new(callback));
        }
    }

    /// Combines completions with await-all semantics.
    ///
    /// Returns `None` when nothing is left pending, so callers can treat
    /// the whole teardown as synchronous.
    pub fn join(completions: Vec<DeferredCompletion>) -> Option<DeferredCompletion> {
        let pending: Vec<DeferredCompletion> = completions
            .into_iter()
            .filter(|completion| !completion.is_resolved())
            .collect();
        if pending.is_empty() {
            return None;
        }
        let (combined, handle) = DeferredCompletion::pending();
        let remaining = Rc::new(Cell::new(pending.len()));
        for completion in &pending {
            let remaining = Rc::clone(&remaining);
            let handle = handle.clone();
            completion.on_resolved(move || {
                remaining.set(remaining.get() - 1);
                if remaining.get() == 0 {
                    handle.resolve();
                }
            });
        }
        Some(combined)
    }
}

/// Lifecycle boundary of a nested sub-component.
///
/// When the component's root element is the direct node of its host
/// template, the direct bit travels across the boundary as the internal
/// context marker and is promoted back only for the child sitting at the
/// component's context anchor.
pub struct ComponentPart {
    lifecycle: PartLifecycle,
    at_context_anchor: bool,
    children: Vec<Box<dyn Part>>,
}

impl ComponentPart {
    pub fn new(at_context_anchor: bool, children: Vec<Box<dyn Part>>) -> Self {
        Self {
            lifecycle: PartLifecycle::new(),
            at_context_anchor,
            children,
        }
    }

    pub fn state(&self) -> PartState {
        self.lifecycle.state()
    }

    fn inner_flags(&self, flags: PartFlags) -> PartFlags {
        flags
            .into_component()
            .at_context_anchor(self.at_context_anchor)
    }
}

impl Part for ComponentPart {
    fn on_connect(&mut self, flags: PartFlags) {
        if !self.lifecycle.begin_connect() {
            return;
        }
        let inner = self.inner_flags(flags);
        for child in &mut self.children {
            child.on_connect(inner);
        }
        self.lifecycle.finish_connect();
    }

    fn on_disconnect(&mut self, flags: PartFlags) -> Option<DeferredCompletion> {
        if !self.lifecycle.begin_disconnect() {
            return None;
        }
        let inner = self.inner_flags(flags);
        let mut pending = Vec::new();
        for child in &mut self.children {
            if let Some(completion) = child.on_disconnect(inner) {
                pending.push(completion);
            }
        }
        let combined = DeferredCompletion::join(pending);
        if combined.is_none() {
            self.lifecycle.finish_disconnect();
        }
        combined
    }
}
