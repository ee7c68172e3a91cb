#![forbid(unsafe_code)]

//! Host element tree for oil-rig.
//!
//! The controller engine in `oil-core` never owns the tree it reconciles. It
//! reads element structure and attributes, and it consumes mutation records,
//! through the primitives in this crate:
//!
//! - [`Document`]: an arena of element and text nodes addressed by
//!   [`NodeId`] handles.
//! - [`MutationRecord`] / [`ObserveOptions`]: a mutation-observer queue that
//!   reports child-list and attribute changes under an observed root.
//! - [`fixture`]: declarative builders for test trees.
//!
//! # Invariants
//!
//! 1. A [`NodeId`] never keeps a node alive. Once a node is destroyed its
//!    slot generation advances and every old handle stops resolving.
//! 2. A node has at most one parent and the tree never contains a cycle.
//! 3. Records are queued in mutation order, per observer.
//! 4. Building a detached subtree never emits records; only mutations under an
//!    observed root do.

pub mod document;
pub mod error;
pub mod fixture;
pub mod mutation;
pub mod node;

pub use document::Document;
pub use error::DomError;
pub use fixture::{NodeSpec, element, text};
pub use mutation::{MutationRecord, ObserveFlags, ObserveOptions, ObserverId};
pub use node::{NodeId, NodeKind};
