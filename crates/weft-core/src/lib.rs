//! Keyed-list reconciliation runtime for retained node trees.
//!
//! Given an old and a new ordered data set, the planner in [`edit`]
//! computes a minimal edit script, and [`list::KeyedList`] applies it to
//! live content instances: patching values in place where the item
//! survived, relocating fragments where it moved, and creating or tearing
//! down instances at the edges. Positions are tracked incrementally
//! through [`anchor::PositionMap`] so no tree queries are needed to find
//! an insertion point, and every structural change is broadcast through
//! the connect/disconnect protocol in [`part`].

pub mod anchor;
pub mod edit;
pub mod hash;
pub mod instance;
pub mod list;
pub mod part;
pub mod scheduler;
pub mod transition;
pub mod tree;

pub(crate) mod collections;

pub use anchor::{Anchor, PositionMap};
pub use edit::{plan, EditOp};
pub use hash::shape_key_of;
pub use instance::{ContentInstance, RenderResult};
pub use list::KeyedList;
pub use part::{
    CompletionHandle, ComponentPart, DeferredCompletion, Part, PartFlags, PartLifecycle, PartState,
};
pub use scheduler::{ControllerId, FlushScheduler, NoopScheduler, UpdateQueue};
pub use transition::{NoTransition, Transition};
pub use tree::{Fragment, FragmentPart, MemoryTree, NodeId, ShapeKey, TreeBackend, TreeError};

/// Identity of one live content instance within a controller.
pub type InstanceId = usize;
