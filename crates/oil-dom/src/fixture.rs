//! Declarative tree builders.
//!
//! ```
//! use oil_dom::{Document, element};
//!
//! let mut doc = Document::new();
//! let spec = element("div")
//!     .attr("data-oil-controller", "example")
//!     .child(element("div").attr("data-oil-target", "example.item"));
//! let node = doc.build(&spec);
//! assert_eq!(doc.descendant_elements(node).len(), 1);
//! ```

use crate::document::Document;
use crate::node::NodeId;

/// Description of a node to build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeSpec {
    Element {
        tag: String,
        attributes: Vec<(String, String)>,
        children: Vec<NodeSpec>,
    },
    Text(String),
}

/// Start an element spec.
#[must_use]
pub fn element(tag: impl Into<String>) -> NodeSpec {
    NodeSpec::Element {
        tag: tag.into(),
        attributes: Vec::new(),
        children: Vec::new(),
    }
}

/// A text node spec.
#[must_use]
pub fn text(content: impl Into<String>) -> NodeSpec {
    NodeSpec::Text(content.into())
}

impl NodeSpec {
    /// Add an attribute. Ignored on text specs.
    #[must_use]
    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        if let Self::Element { attributes, .. } = &mut self {
            attributes.push((name.into(), value.into()));
        }
        self
    }

    /// Append a child. Ignored on text specs.
    #[must_use]
    pub fn child(mut self, child: NodeSpec) -> Self {
        if let Self::Element { children, .. } = &mut self {
            children.push(child);
        }
        self
    }

    /// Append several children.
    #[must_use]
    pub fn children(self, children: impl IntoIterator<Item = NodeSpec>) -> Self {
        children.into_iter().fold(self, Self::child)
    }
}

impl Document {
    /// Materialise `spec` as a detached subtree and return its root.
    ///
    /// Nothing is attached, so no mutation records are produced until the
    /// caller inserts the result.
    pub fn build(&mut self, spec: &NodeSpec) -> NodeId {
        match spec {
            NodeSpec::Text(content) => self.create_text(content.clone()),
            NodeSpec::Element {
                tag,
                attributes,
                children,
            } => {
                let id = self.create_element(tag.clone());
                for (name, value) in attributes {
                    // Freshly created element: cannot fail.
                    let _ = self.set_attribute(id, name, value.clone());
                }
                for child in children {
                    let child_id = self.build(child);
                    let _ = self.append_child(id, child_id);
                }
                id
            }
        }
    }
}
