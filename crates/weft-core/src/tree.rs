//! Tree primitives consumed by the reconciler.
//!
//! The runtime never talks to a concrete node tree directly. Everything it
//! needs (instantiating a render shape into a fragment, patching values,
//! inserting before a reference node, appending, detaching) goes through
//! [`TreeBackend`]. [`MemoryTree`] is the in-memory implementation used by
//! tests and examples.

use std::fmt;
use std::rc::Rc;

use crate::collections::map::HashMap;
use crate::part::Part;

pub type NodeId = usize;

/// Identity token of the template a render result came from.
///
/// Two render results with equal shape keys can be patched into the same
/// fragment; unequal keys force the fragment to be replaced.
pub type ShapeKey = u64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeError {
    Missing { id: NodeId },
    Detached { id: NodeId },
    UnknownShape { shape: ShapeKey },
}

impl fmt::Display for TreeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TreeError::Missing { id } => write!(f, "node {id} missing"),
            TreeError::Detached { id } => write!(f, "node {id} is not attached"),
            TreeError::UnknownShape { shape } => write!(f, "shape {shape:#x} not registered"),
        }
    }
}

impl std::error::Error for TreeError {}

/// One lifecycle participant produced alongside a fragment.
///
/// `direct` marks parts whose underlying node sits at the fragment's top
/// level; only those receive the unstripped flag set during broadcast.
pub struct FragmentPart {
    pub part: Box<dyn Part>,
    pub direct: bool,
}

impl FragmentPart {
    pub fn direct(part: Box<dyn Part>) -> Self {
        Self { part, direct: true }
    }

    pub fn nested(part: Box<dyn Part>) -> Self {
        Self {
            part,
            direct: false,
        }
    }
}

/// The nodes and lifecycle participants produced by instantiating a shape.
///
/// `nodes` holds the fragment's top-level nodes in sibling order; nested
/// nodes are reachable only through the backend and are moved implicitly
/// with their top-level ancestor.
#[derive(Default)]
pub struct Fragment {
    pub nodes: Vec<NodeId>,
    pub parts: Vec<FragmentPart>,
}

impl Fragment {
    pub fn new(nodes: Vec<NodeId>) -> Self {
        Self {
            nodes,
            parts: Vec::new(),
        }
    }

    pub fn with_parts(nodes: Vec<NodeId>, parts: Vec<FragmentPart>) -> Self {
        Self { nodes, parts }
    }
}

impl fmt::Debug for Fragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fragment")
            .field("nodes", &self.nodes)
            .field("parts", &self.parts.len())
            .finish()
    }
}

/// The narrow contract between the reconciler and an underlying node tree.
///
/// Errors from these operations are programmer-error conditions (detaching
/// an already-detached node, instantiating an unregistered shape) and are
/// propagated as fatal rather than recovered from.
pub trait TreeBackend {
    /// Opaque value bundle carried from a render result into a fragment.
    type Values;

    /// Materializes the nodes and parts for `shape`.
    ///
    /// The returned fragment is detached; the caller decides where it goes.
    fn instantiate(&mut self, shape: ShapeKey, values: &Self::Values)
        -> Result<Fragment, TreeError>;

    /// Writes `values` into an existing fragment in place.
    fn patch(&mut self, fragment: &Fragment, values: &Self::Values) -> Result<(), TreeError>;

    /// Inserts `node` immediately before `reference` under the same parent.
    fn insert_before(&mut self, node: NodeId, reference: NodeId) -> Result<(), TreeError>;

    /// Appends `node` as the last child of `container`.
    fn append(&mut self, container: NodeId, node: NodeId) -> Result<(), TreeError>;

    /// Removes `node` from its parent, keeping the node itself alive.
    fn detach(&mut self, node: NodeId) -> Result<(), TreeError>;

    /// Whether `node` is somewhere beneath `container`.
    fn contains(&self, container: NodeId, node: NodeId) -> bool;
}

type PartFactory = Rc<dyn Fn() -> Vec<FragmentPart>>;

struct ShapeSpec {
    node_count: usize,
    parts: Option<PartFactory>,
}

struct MemoryNode {
    shape: Option<ShapeKey>,
    values: Vec<String>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// In-memory [`TreeBackend`] with arena-style node storage.
#[derive(Default)]
pub struct MemoryTree {
    nodes: Vec<MemoryNode>,
    shapes: HashMap<ShapeKey, ShapeSpec>,
}

impl MemoryTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a detached container node that can host reconciled children.
    pub fn new_container(&mut self) -> NodeId {
        self.push_node(None, Vec::new())
    }

    /// Registers a shape producing `node_count` sibling nodes per fragment.
    pub fn register_shape(&mut self, shape: ShapeKey, node_count: usize) {
        self.shapes.insert(
            shape,
            ShapeSpec {
                node_count,
                parts: None,
            },
        );
    }

    /// Registers a shape whose fragments also carry lifecycle parts.
    pub fn register_shape_with_parts(
        &mut self,
        shape: ShapeKey,
        node_count: usize,
        parts: impl Fn() -> Vec<FragmentPart> + 'static,
    ) {
        self.shapes.insert(
            shape,
            ShapeSpec {
                node_count,
                parts: Some(Rc::new(parts)),
            },
        );
    }

    /// Child ids of `container` in sibling order.
    pub fn children(&self, container: NodeId) -> &[NodeId] {
        self.nodes
            .get(container)
            .map(|node| node.children.as_slice())
            .unwrap_or(&[])
    }

    /// Current values of `node`.
    pub fn values(&self, node: NodeId) -> &[String] {
        self.nodes
            .get(node)
            .map(|node| node.values.as_slice())
            .unwrap_or(&[])
    }

    pub fn shape(&self, node: NodeId) -> Option<ShapeKey> {
        self.nodes.get(node).and_then(|node| node.shape)
    }

    fn push_node(&mut self, shape: Option<ShapeKey>, values: Vec<String>) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(MemoryNode {
            shape,
            values,
            parent: None,
            children: Vec::new(),
        });
        id
    }

    fn node(&self, id: NodeId) -> Result<&MemoryNode, TreeError> {
        self.nodes.get(id).ok_or(TreeError::Missing { id })
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut MemoryNode, TreeError> {
        self.nodes.get_mut(id).ok_or(TreeError::Missing { id })
    }
}

impl TreeBackend for MemoryTree {
    type Values = Vec<String>;

    fn instantiate(
        &mut self,
        shape: ShapeKey,
        values: &Self::Values,
    ) -> Result<Fragment, TreeError> {
        let (node_count, parts) = {
            let spec = self
                .shapes
                .get(&shape)
                .ok_or(TreeError::UnknownShape { shape })?;
            (spec.node_count, spec.parts.clone())
        };
        let nodes = (0..node_count)
            .map(|_| self.push_node(Some(shape), values.clone()))
            .collect();
        let parts = parts.map(|factory| factory()).unwrap_or_default();
        Ok(Fragment::with_parts(nodes, parts))
    }

    fn patch(&mut self, fragment: &Fragment, values: &Self::Values) -> Result<(), TreeError> {
        for &id in &fragment.nodes {
            self.node_mut(id)?.values = values.clone();
        }
        Ok(())
    }

    fn insert_before(&mut self, node: NodeId, reference: NodeId) -> Result<(), TreeError> {
        let parent = self
            .node(reference)?
            .parent
            .ok_or(TreeError::Detached { id: reference })?;
        self.node_mut(node)?.parent = Some(parent);
        let siblings = &mut self.node_mut(parent)?.children;
        let index = siblings
            .iter()
            .position(|&child| child == reference)
            .ok_or(TreeError::Missing { id: reference })?;
        siblings.insert(index, node);
        Ok(())
    }

    fn append(&mut self, container: NodeId, node: NodeId) -> Result<(), TreeError> {
        self.node(container)?;
        self.node_mut(node)?.parent = Some(container);
        self.node_mut(container)?.children.push(node);
        Ok(())
    }

    fn detach(&mut self, node: NodeId) -> Result<(), TreeError> {
        let parent = self
            .node(node)?
            .parent
            .ok_or(TreeError::Detached { id: node })?;
        let siblings = &mut self.node_mut(parent)?.children;
        if let Some(index) = siblings.iter().position(|&child| child == node) {
            siblings.remove(index);
        }
        self.node_mut(node)?.parent = None;
        Ok(())
    }

    fn contains(&self, container: NodeId, node: NodeId) -> bool {
        let mut current = self.nodes.get(node).and_then(|entry| entry.parent);
        while let Some(parent) = current {
            if parent == container {
                return true;
            }
            current = self.nodes.get(parent).and_then(|entry| entry.parent);
        }
        false
    }
}
