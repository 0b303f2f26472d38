//! Test doubles for the reconciliation runtime: recording parts and
//! transitions, a deterministic RNG, and an edit-script simulator that
//! mirrors the controller's anchor semantics on a plain vector.

use std::cell::RefCell;
use std::rc::Rc;

use weft_core::edit::EditOp;
use weft_core::part::{CompletionHandle, DeferredCompletion, Part, PartFlags};
use weft_core::transition::Transition;
use weft_core::tree::NodeId;

/// One lifecycle call observed by a [`RecordingPart`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartEvent {
    Connect { label: &'static str, flags: PartFlags },
    Disconnect { label: &'static str, flags: PartFlags },
}

/// Shared log for recording doubles.
pub type EventLog<E> = Rc<RefCell<Vec<E>>>;

pub fn event_log<E>() -> EventLog<E> {
    Rc::new(RefCell::new(Vec::new()))
}

/// [`Part`] that records every call it receives.
///
/// With `defer_disconnects` set, each disconnect hands back a pending
/// completion whose handle lands in `handles` for the test to resolve.
pub struct RecordingPart {
    label: &'static str,
    log: EventLog<PartEvent>,
    defer_disconnects: bool,
    handles: Rc<RefCell<Vec<CompletionHandle>>>,
}

impl RecordingPart {
    pub fn new(label: &'static str, log: EventLog<PartEvent>) -> Self {
        Self {
            label,
            log,
            defer_disconnects: false,
            handles: Rc::new(RefCell::new(Vec::new())),
        }
    }

    pub fn deferring(
        label: &'static str,
        log: EventLog<PartEvent>,
        handles: Rc<RefCell<Vec<CompletionHandle>>>,
    ) -> Self {
        Self {
            label,
            log,
            defer_disconnects: true,
            handles,
        }
    }
}

impl Part for RecordingPart {
    fn on_connect(&mut self, flags: PartFlags) {
        self.log.borrow_mut().push(PartEvent::Connect {
            label: self.label,
            flags,
        });
    }

    fn on_disconnect(&mut self, flags: PartFlags) -> Option<DeferredCompletion> {
        self.log.borrow_mut().push(PartEvent::Disconnect {
            label: self.label,
            flags,
        });
        if self.defer_disconnects && flags.should_animate() {
            let (completion, handle) = DeferredCompletion::pending();
            self.handles.borrow_mut().push(handle);
            Some(completion)
        } else {
            None
        }
    }
}

/// One call observed by a [`RecordingTransition`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionEvent {
    Enter { nodes: Vec<NodeId>, animate: bool },
    Leave { nodes: Vec<NodeId>, animate: bool },
    Cancel { nodes: Vec<NodeId> },
}

/// [`Transition`] double that records intent and, when `defer_leaves` is
/// set, keeps animated leaves pending until the test resolves them.
pub struct RecordingTransition {
    pub log: EventLog<TransitionEvent>,
    pub defer_leaves: bool,
    pub leave_handles: Rc<RefCell<Vec<CompletionHandle>>>,
}

impl RecordingTransition {
    pub fn new() -> Self {
        Self {
            log: event_log(),
            defer_leaves: false,
            leave_handles: Rc::new(RefCell::new(Vec::new())),
        }
    }

    pub fn deferring() -> Self {
        Self {
            defer_leaves: true,
            ..Self::new()
        }
    }

    pub fn events(&self) -> Vec<TransitionEvent> {
        self.log.borrow().clone()
    }

    /// Resolves every outstanding leave completion.
    pub fn finish_leaves(&self) {
        for handle in self.leave_handles.borrow_mut().drain(..) {
            handle.resolve();
        }
    }
}

impl Default for RecordingTransition {
    fn default() -> Self {
        Self::new()
    }
}

impl Transition for RecordingTransition {
    fn enter(&mut self, nodes: &[NodeId], animate: bool) {
        self.log.borrow_mut().push(TransitionEvent::Enter {
            nodes: nodes.to_vec(),
            animate,
        });
    }

    fn leave(&mut self, nodes: &[NodeId], animate: bool) -> Option<DeferredCompletion> {
        self.log.borrow_mut().push(TransitionEvent::Leave {
            nodes: nodes.to_vec(),
            animate,
        });
        if self.defer_leaves && animate {
            let (completion, handle) = DeferredCompletion::pending();
            self.leave_handles.borrow_mut().push(handle);
            Some(completion)
        } else {
            None
        }
    }

    fn cancel(&mut self, nodes: &[NodeId]) {
        self.log.borrow_mut().push(TransitionEvent::Cancel {
            nodes: nodes.to_vec(),
        });
    }
}

/// SplitMix64: small deterministic RNG for fuzz-style tests.
pub struct SplitMix64 {
    state: u64,
}

impl SplitMix64 {
    pub fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    pub fn next_u64(&mut self) -> u64 {
        self.state = self.state.wrapping_add(0x9E37_79B9_7F4A_7C15);
        let mut z = self.state;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^ (z >> 31)
    }

    /// Uniform-enough value in `0..bound`; `bound` must be non-zero.
    pub fn below(&mut self, bound: u64) -> u64 {
        self.next_u64() % bound
    }
}

/// Applies an edit script to a plain vector, mirroring the controller's
/// anchor semantics: operations land immediately in front of the old item
/// named by `insert_before`, or at the end when it is out of range.
///
/// Returns the resulting sequence; planner tests compare it against the
/// intended new data.
pub fn apply_script<T: Clone>(old: &[T], new: &[T], script: &[EditOp]) -> Vec<T> {
    // tag survivors by old index so boundaries stay resolvable as
    // neighbours shift
    #[derive(Clone, Copy, PartialEq, Eq)]
    enum Tag {
        Old(usize),
        Fresh,
    }

    let mut current: Vec<(Tag, T)> = old
        .iter()
        .cloned()
        .enumerate()
        .map(|(index, item)| (Tag::Old(index), item))
        .collect();

    let position_of = |current: &[(Tag, T)], from: usize| {
        current
            .iter()
            .position(|(tag, _)| *tag == Tag::Old(from))
            .expect("script references a live old index")
    };
    let boundary_of = |current: &[(Tag, T)], insert_before: usize| {
        current
            .iter()
            .position(|(tag, _)| *tag == Tag::Old(insert_before))
            .unwrap_or(current.len())
    };

    for op in script {
        match *op {
            EditOp::Leave { from, to } => {
                let index = position_of(&current, from);
                current[index].1 = new[to].clone();
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
                let index = position_of(&current, from);
                let (tag, _) = current.remove(index);
                let target = boundary_of(&current, insert_before);
                current.insert(target, (tag, new[to].clone()));
            }
            EditOp::Insert { to, insert_before } => {
                let target = boundary_of(&current, insert_before);
                current.insert(target, (Tag::Fresh, new[to].clone()));
            }
            EditOp::Delete { from } => {
                let index = position_of(&current, from);
                current.remove(index);
            }
        }
    }

    current.into_iter().map(|(_, item)| item).collect()
}
