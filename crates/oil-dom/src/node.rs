//! Node handles and node payloads.

use core::fmt;

use smallvec::SmallVec;

/// Generational handle to a node in a [`Document`](crate::Document).
///
/// Handles are `Copy` and never retain the node they point at, so maps keyed
/// by `NodeId` behave like weak associations: after the node is destroyed the
/// handle simply stops resolving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    index: u32,
    generation: u32,
}

impl NodeId {
    pub(crate) const fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Slot index inside the arena.
    #[inline]
    pub const fn index(self) -> u32 {
        self.index
    }

    /// Generation of the slot when this handle was issued.
    #[inline]
    pub const fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}v{}", self.index, self.generation)
    }
}

/// Attribute storage. Most elements carry only a handful of attributes.
pub(crate) type Attributes = SmallVec<[(String, String); 4]>;

/// Payload of a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// An element with a tag name and ordered attributes.
    Element {
        tag: String,
        attributes: Attributes,
    },
    /// A text node. Never carries attributes and never has children.
    Text(String),
}

impl NodeKind {
    /// Whether this is an element (`nodeType == 1`).
    #[inline]
    pub fn is_element(&self) -> bool {
        matches!(self, Self::Element { .. })
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Node {
    pub(crate) kind: NodeKind,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
}

impl Node {
    pub(crate) fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            parent: None,
            children: Vec::new(),
        }
    }
}
