//! Errors raised by tree operations.

use crate::node::NodeId;

/// Errors from [`Document`](crate::Document) mutations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomError {
    /// The handle does not resolve to a live node.
    #[error("node {0} does not exist")]
    NotFound(NodeId),
    /// The operation needs an element but the node is a text node.
    #[error("node {0} is not an element")]
    NotAnElement(NodeId),
    /// Inserting the node would create a cycle or give the document element a parent.
    #[error("cannot insert {child} into {parent}")]
    HierarchyRequest { parent: NodeId, child: NodeId },
    /// The reference node passed to `insert_before` is not a child of the parent.
    #[error("{reference} is not a child of {parent}")]
    NotAChild { parent: NodeId, reference: NodeId },
    /// Only detached subtrees can be destroyed.
    #[error("node {0} is still attached")]
    StillAttached(NodeId),
    /// The observer handle is not registered.
    #[error("observer {0} is not registered")]
    UnknownObserver(u32),
}
