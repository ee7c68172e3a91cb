//! Arena-backed element tree with mutation observation.

use smallvec::SmallVec;

use crate::error::DomError;
use crate::mutation::{MutationRecord, ObserveFlags, ObserveOptions, Observer, ObserverId};
use crate::node::{Node, NodeId, NodeKind};

#[derive(Debug)]
struct Slot {
    generation: u32,
    node: Option<Node>,
}

/// An element tree plus the observers watching it.
///
/// The document element (`<html>`) is created with the document and can never
/// be re-parented or destroyed.
#[derive(Debug)]
pub struct Document {
    slots: Vec<Slot>,
    free: Vec<u32>,
    document_element: NodeId,
    observers: Vec<Observer>,
    next_observer: u32,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Create a document containing only its document element.
    #[must_use]
    pub fn new() -> Self {
        let mut doc = Self {
            slots: Vec::new(),
            free: Vec::new(),
            document_element: NodeId::new(0, 0),
            observers: Vec::new(),
            next_observer: 1,
        };
        doc.document_element = doc.alloc(NodeKind::Element {
            tag: "html".into(),
            attributes: SmallVec::new(),
        });
        doc
    }

    /// The root element of the document.
    #[inline]
    pub fn document_element(&self) -> NodeId {
        self.document_element
    }

    // --- Node lifecycle ---

    fn alloc(&mut self, kind: NodeKind) -> NodeId {
        let node = Node::new(kind);
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.node = Some(node);
            NodeId::new(index, slot.generation)
        } else {
            let index = u32::try_from(self.slots.len()).unwrap_or(u32::MAX);
            self.slots.push(Slot {
                generation: 0,
                node: Some(node),
            });
            NodeId::new(index, 0)
        }
    }

    /// Create a detached element.
    pub fn create_element(&mut self, tag: impl Into<String>) -> NodeId {
        self.alloc(NodeKind::Element {
            tag: tag.into(),
            attributes: SmallVec::new(),
        })
    }

    /// Create a detached text node.
    pub fn create_text(&mut self, text: impl Into<String>) -> NodeId {
        self.alloc(NodeKind::Text(text.into()))
    }

    /// Permanently free a detached subtree.
    ///
    /// Returns the number of nodes freed. Every handle into the subtree stops
    /// resolving afterwards.
    ///
    /// # Errors
    ///
    /// - [`DomError::NotFound`] if `node` is not live.
    /// - [`DomError::StillAttached`] if `node` has a parent or is the document element.
    pub fn destroy(&mut self, node: NodeId) -> Result<usize, DomError> {
        let entry = self.node(node).ok_or(DomError::NotFound(node))?;
        if entry.parent.is_some() || node == self.document_element {
            return Err(DomError::StillAttached(node));
        }
        let mut stack = vec![node];
        let mut freed = 0;
        while let Some(id) = stack.pop() {
            let slot = &mut self.slots[id.index() as usize];
            if let Some(taken) = slot.node.take() {
                stack.extend(taken.children);
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(id.index());
                freed += 1;
            }
        }
        Ok(freed)
    }

    fn node(&self, id: NodeId) -> Option<&Node> {
        let slot = self.slots.get(id.index() as usize)?;
        if slot.generation != id.generation() {
            return None;
        }
        slot.node.as_ref()
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        let slot = self.slots.get_mut(id.index() as usize)?;
        if slot.generation != id.generation() {
            return None;
        }
        slot.node.as_mut()
    }

    /// Whether the handle resolves to a live node.
    #[inline]
    pub fn exists(&self, id: NodeId) -> bool {
        self.node(id).is_some()
    }

    /// Number of live nodes.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.node.is_some()).count()
    }

    // --- Queries ---

    /// The node payload.
    pub fn kind(&self, id: NodeId) -> Option<&NodeKind> {
        self.node(id).map(|n| &n.kind)
    }

    /// Whether `id` is a live element.
    pub fn is_element(&self, id: NodeId) -> bool {
        self.kind(id).is_some_and(NodeKind::is_element)
    }

    /// Tag name of an element.
    pub fn tag(&self, id: NodeId) -> Option<&str> {
        match self.kind(id)? {
            NodeKind::Element { tag, .. } => Some(tag),
            NodeKind::Text(_) => None,
        }
    }

    /// Parent node. Only elements have children, so this is also the parent element.
    pub fn parent_element(&self, id: NodeId) -> Option<NodeId> {
        self.node(id)?.parent
    }

    /// Child nodes in order. Empty for unknown nodes.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.node(id).map_or(&[], |n| n.children.as_slice())
    }

    /// Child elements in order, skipping text.
    pub fn element_children(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.children(id)
            .iter()
            .copied()
            .filter(|&child| self.is_element(child))
    }

    /// Whether `node` is `ancestor` or one of its descendants.
    pub fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        if !self.exists(ancestor) {
            return false;
        }
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.node(id).and_then(|n| n.parent);
        }
        false
    }

    /// Whether `node` is attached under the document element.
    pub fn is_connected(&self, node: NodeId) -> bool {
        self.contains(self.document_element, node)
    }

    /// `node` (if an element) followed by every descendant element, in tree order.
    pub fn inclusive_descendant_elements(&self, node: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        if !self.is_element(node) {
            return out;
        }
        let mut stack = vec![node];
        while let Some(id) = stack.pop() {
            out.push(id);
            for &child in self.children(id).iter().rev() {
                if self.is_element(child) {
                    stack.push(child);
                }
            }
        }
        out
    }

    /// Every descendant element of `node`, in tree order, excluding `node`.
    pub fn descendant_elements(&self, node: NodeId) -> Vec<NodeId> {
        let mut all = self.inclusive_descendant_elements(node);
        if !all.is_empty() {
            all.remove(0);
        }
        all
    }

    /// Value of attribute `name` on an element.
    pub fn attribute(&self, id: NodeId, name: &str) -> Option<&str> {
        match self.kind(id)? {
            NodeKind::Element { attributes, .. } => attributes
                .iter()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.as_str()),
            NodeKind::Text(_) => None,
        }
    }

    /// Whether the element carries attribute `name`.
    pub fn has_attribute(&self, id: NodeId, name: &str) -> bool {
        self.attribute(id, name).is_some()
    }

    /// All attributes of an element, in insertion order.
    pub fn attributes(&self, id: NodeId) -> impl Iterator<Item = (&str, &str)> + '_ {
        let attrs = match self.kind(id) {
            Some(NodeKind::Element { attributes, .. }) => attributes.as_slice(),
            _ => &[],
        };
        attrs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    // --- Mutations ---

    fn attributes_mut(&mut self, id: NodeId) -> Result<&mut SmallVec<[(String, String); 4]>, DomError> {
        match self.node_mut(id) {
            None => Err(DomError::NotFound(id)),
            Some(Node {
                kind: NodeKind::Element { attributes, .. },
                ..
            }) => Ok(attributes),
            Some(_) => Err(DomError::NotAnElement(id)),
        }
    }

    /// Set attribute `name` to `value`.
    ///
    /// A record is queued even when the value does not change, matching host
    /// behavior.
    ///
    /// # Errors
    ///
    /// [`DomError::NotFound`] or [`DomError::NotAnElement`].
    pub fn set_attribute(
        &mut self,
        id: NodeId,
        name: &str,
        value: impl Into<String>,
    ) -> Result<(), DomError> {
        let value = value.into();
        let attributes = self.attributes_mut(id)?;
        let old_value = match attributes.iter_mut().find(|(key, _)| key == name) {
            Some((_, existing)) => Some(std::mem::replace(existing, value)),
            None => {
                attributes.push((name.to_owned(), value));
                None
            }
        };
        self.queue_record(MutationRecord::Attributes {
            target: id,
            name: name.to_owned(),
            old_value,
        });
        Ok(())
    }

    /// Remove attribute `name`. Returns whether it was present.
    ///
    /// # Errors
    ///
    /// [`DomError::NotFound`] or [`DomError::NotAnElement`].
    pub fn remove_attribute(&mut self, id: NodeId, name: &str) -> Result<bool, DomError> {
        let attributes = self.attributes_mut(id)?;
        let Some(pos) = attributes.iter().position(|(key, _)| key == name) else {
            return Ok(false);
        };
        let (_, old) = attributes.remove(pos);
        self.queue_record(MutationRecord::Attributes {
            target: id,
            name: name.to_owned(),
            old_value: Some(old),
        });
        Ok(true)
    }

    /// Append `child` as the last child of `parent`, detaching it first if needed.
    ///
    /// # Errors
    ///
    /// See [`insert_before`](Self::insert_before).
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
        self.insert_before(parent, child, None)
    }

    /// Insert `child` into `parent` before `reference`, or last when `reference` is `None`.
    ///
    /// # Errors
    ///
    /// - [`DomError::NotFound`] if any handle is dead.
    /// - [`DomError::NotAnElement`] if `parent` is a text node.
    /// - [`DomError::HierarchyRequest`] if `child` is the document element or an
    ///   inclusive ancestor of `parent`.
    /// - [`DomError::NotAChild`] if `reference` is not a child of `parent`.
    pub fn insert_before(
        &mut self,
        parent: NodeId,
        child: NodeId,
        reference: Option<NodeId>,
    ) -> Result<(), DomError> {
        if !self.exists(parent) {
            return Err(DomError::NotFound(parent));
        }
        if !self.exists(child) {
            return Err(DomError::NotFound(child));
        }
        if !self.is_element(parent) {
            return Err(DomError::NotAnElement(parent));
        }
        if child == self.document_element || self.contains(child, parent) {
            return Err(DomError::HierarchyRequest { parent, child });
        }
        let mut reference = reference;
        if let Some(r) = reference {
            if self.parent_element(r) != Some(parent) {
                return Err(DomError::NotAChild {
                    parent,
                    reference: r,
                });
            }
            if r == child {
                reference = self.next_sibling(child);
            }
        }

        self.detach(child);

        let node = self.node_mut(parent).ok_or(DomError::NotFound(parent))?;
        let position = reference
            .and_then(|r| node.children.iter().position(|&c| c == r))
            .unwrap_or(node.children.len());
        node.children.insert(position, child);
        if let Some(child_node) = self.node_mut(child) {
            child_node.parent = Some(parent);
        }

        #[cfg(feature = "tracing")]
        tracing::trace!(%parent, %child, "insert node");

        self.queue_record(MutationRecord::ChildList {
            target: parent,
            added: vec![child],
            removed: Vec::new(),
        });
        Ok(())
    }

    /// Detach `node` from its parent. A node without a parent is left alone.
    ///
    /// # Errors
    ///
    /// [`DomError::NotFound`] if `node` is dead, [`DomError::HierarchyRequest`]
    /// for the document element.
    pub fn remove(&mut self, node: NodeId) -> Result<(), DomError> {
        if !self.exists(node) {
            return Err(DomError::NotFound(node));
        }
        if node == self.document_element {
            return Err(DomError::HierarchyRequest {
                parent: node,
                child: node,
            });
        }
        self.detach(node);
        Ok(())
    }

    fn next_sibling(&self, node: NodeId) -> Option<NodeId> {
        let parent = self.parent_element(node)?;
        let siblings = self.children(parent);
        let pos = siblings.iter().position(|&c| c == node)?;
        siblings.get(pos + 1).copied()
    }

    fn detach(&mut self, node: NodeId) {
        let Some(parent) = self.parent_element(node) else {
            return;
        };
        if let Some(parent_node) = self.node_mut(parent) {
            parent_node.children.retain(|&c| c != node);
        }
        if let Some(n) = self.node_mut(node) {
            n.parent = None;
        }

        #[cfg(feature = "tracing")]
        tracing::trace!(%parent, %node, "remove node");

        self.queue_record(MutationRecord::ChildList {
            target: parent,
            added: Vec::new(),
            removed: vec![node],
        });
    }

    // --- Observation ---

    /// Start observing `root` with `options`.
    ///
    /// # Errors
    ///
    /// [`DomError::NotFound`] if `root` is dead.
    pub fn observe(
        &mut self,
        root: NodeId,
        options: ObserveOptions,
    ) -> Result<ObserverId, DomError> {
        if !self.exists(root) {
            return Err(DomError::NotFound(root));
        }
        let id = ObserverId(self.next_observer);
        self.next_observer += 1;
        self.observers.push(Observer {
            id,
            root,
            options,
            queue: Vec::new(),
        });
        Ok(id)
    }

    /// Drain the records queued for `observer`.
    pub fn take_records(&mut self, observer: ObserverId) -> Vec<MutationRecord> {
        self.observers
            .iter_mut()
            .find(|o| o.id == observer)
            .map(|o| std::mem::take(&mut o.queue))
            .unwrap_or_default()
    }

    /// Whether `observer` has undelivered records.
    pub fn has_pending_records(&self, observer: ObserverId) -> bool {
        self.observers
            .iter()
            .any(|o| o.id == observer && !o.queue.is_empty())
    }

    /// Stop observing. Undelivered records are dropped; take them first.
    ///
    /// # Errors
    ///
    /// [`DomError::UnknownObserver`] if the handle is not registered.
    pub fn disconnect(&mut self, observer: ObserverId) -> Result<(), DomError> {
        let before = self.observers.len();
        self.observers.retain(|o| o.id != observer);
        if self.observers.len() == before {
            return Err(DomError::UnknownObserver(observer.id()));
        }
        Ok(())
    }

    fn observes(&self, observer: &Observer, record: &MutationRecord) -> bool {
        let kind_wanted = match record {
            MutationRecord::ChildList { .. } => {
                observer.options.flags.contains(ObserveFlags::CHILD_LIST)
            }
            MutationRecord::Attributes { name, .. } => observer.options.wants_attribute(name),
        };
        if !kind_wanted {
            return false;
        }
        let target = record.target();
        target == observer.root
            || (observer.options.flags.contains(ObserveFlags::SUBTREE)
                && self.contains(observer.root, target))
    }

    fn queue_record(&mut self, record: MutationRecord) {
        let interested: SmallVec<[usize; 2]> = self
            .observers
            .iter()
            .enumerate()
            .filter(|(_, o)| self.observes(o, &record))
            .map(|(i, _)| i)
            .collect();
        for index in interested {
            let observer = &mut self.observers[index];
            let mut delivered = record.clone();
            if let MutationRecord::Attributes { old_value, .. } = &mut delivered
                && !observer
                    .options
                    .flags
                    .contains(ObserveFlags::ATTRIBUTE_OLD_VALUE)
            {
                *old_value = None;
            }
            observer.queue.push(delivered);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn observed(doc: &mut Document) -> ObserverId {
        let root = doc.document_element();
        doc.observe(
            root,
            ObserveOptions::new(ObserveFlags::all()),
        )
        .unwrap()
    }

    #[test]
    fn new_document_has_only_the_document_element() {
        let doc = Document::new();
        assert_eq!(doc.node_count(), 1);
        assert_eq!(doc.tag(doc.document_element()), Some("html"));
        assert!(doc.is_connected(doc.document_element()));
    }

    #[test]
    fn append_and_query() {
        let mut doc = Document::new();
        let root = doc.document_element();
        let a = doc.create_element("div");
        let b = doc.create_element("span");
        let t = doc.create_text("hi");
        doc.append_child(root, a).unwrap();
        doc.append_child(a, t).unwrap();
        doc.append_child(a, b).unwrap();

        assert_eq!(doc.children(a), &[t, b]);
        assert_eq!(doc.element_children(a).collect::<Vec<_>>(), vec![b]);
        assert_eq!(doc.parent_element(b), Some(a));
        assert!(doc.contains(root, b));
        assert!(doc.is_connected(b));
        assert_eq!(doc.inclusive_descendant_elements(root), vec![root, a, b]);
        assert_eq!(doc.descendant_elements(a), vec![b]);
    }

    #[test]
    fn cycles_are_rejected() {
        let mut doc = Document::new();
        let a = doc.create_element("div");
        let b = doc.create_element("div");
        doc.append_child(a, b).unwrap();
        assert_eq!(
            doc.append_child(b, a),
            Err(DomError::HierarchyRequest { parent: b, child: a })
        );
        assert!(doc.append_child(a, a).is_err());
    }

    #[test]
    fn text_nodes_cannot_hold_children_or_attributes() {
        let mut doc = Document::new();
        let t = doc.create_text("x");
        let e = doc.create_element("p");
        assert_eq!(doc.append_child(t, e), Err(DomError::NotAnElement(t)));
        assert_eq!(doc.set_attribute(t, "a", "b"), Err(DomError::NotAnElement(t)));
    }

    #[test]
    fn insert_before_orders_children() {
        let mut doc = Document::new();
        let p = doc.create_element("ul");
        let a = doc.create_element("li");
        let b = doc.create_element("li");
        let c = doc.create_element("li");
        doc.append_child(p, a).unwrap();
        doc.append_child(p, c).unwrap();
        doc.insert_before(p, b, Some(c)).unwrap();
        assert_eq!(doc.children(p), &[a, b, c]);
    }

    #[test]
    fn reparenting_emits_remove_then_add() {
        let mut doc = Document::new();
        let root = doc.document_element();
        let a = doc.create_element("div");
        let b = doc.create_element("div");
        let x = doc.create_element("div");
        doc.append_child(root, a).unwrap();
        doc.append_child(root, b).unwrap();
        doc.append_child(a, x).unwrap();
        let obs = observed(&mut doc);

        doc.append_child(b, x).unwrap();
        let records = doc.take_records(obs);
        assert_eq!(
            records,
            vec![
                MutationRecord::ChildList {
                    target: a,
                    added: vec![],
                    removed: vec![x],
                },
                MutationRecord::ChildList {
                    target: b,
                    added: vec![x],
                    removed: vec![],
                },
            ]
        );
        assert!(!doc.has_pending_records(obs));
    }

    #[test]
    fn detached_mutations_are_not_observed() {
        let mut doc = Document::new();
        let obs = observed(&mut doc);
        let a = doc.create_element("div");
        let b = doc.create_element("div");
        doc.append_child(a, b).unwrap();
        doc.set_attribute(b, "data-x", "1").unwrap();
        assert!(doc.take_records(obs).is_empty());
    }

    #[test]
    fn attribute_records_capture_old_value_when_asked() {
        let mut doc = Document::new();
        let root = doc.document_element();
        let a = doc.create_element("div");
        doc.append_child(root, a).unwrap();
        let with_old = observed(&mut doc);
        let without_old = doc
            .observe(
                root,
                ObserveOptions::new(ObserveFlags::ATTRIBUTES | ObserveFlags::SUBTREE),
            )
            .unwrap();

        doc.set_attribute(a, "k", "1").unwrap();
        doc.set_attribute(a, "k", "2").unwrap();
        assert!(doc.remove_attribute(a, "k").unwrap());
        assert!(!doc.remove_attribute(a, "k").unwrap());

        let olds: Vec<_> = doc
            .take_records(with_old)
            .into_iter()
            .map(|r| match r {
                MutationRecord::Attributes { old_value, .. } => old_value,
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert_eq!(olds, vec![None, Some("1".into()), Some("2".into())]);

        assert!(doc.take_records(without_old).iter().all(|r| matches!(
            r,
            MutationRecord::Attributes {
                old_value: None,
                ..
            }
        )));
    }

    #[test]
    fn attribute_filter_applies() {
        let mut doc = Document::new();
        let root = doc.document_element();
        let obs = doc
            .observe(
                root,
                ObserveOptions::new(ObserveFlags::ATTRIBUTES).with_attribute_filter(["keep"]),
            )
            .unwrap();
        doc.set_attribute(root, "keep", "1").unwrap();
        doc.set_attribute(root, "drop", "1").unwrap();
        assert_eq!(doc.take_records(obs).len(), 1);
    }

    #[test]
    fn non_subtree_observer_sees_only_root() {
        let mut doc = Document::new();
        let root = doc.document_element();
        let a = doc.create_element("div");
        doc.append_child(root, a).unwrap();
        let obs = doc
            .observe(root, ObserveOptions::new(ObserveFlags::ATTRIBUTES))
            .unwrap();
        doc.set_attribute(a, "x", "1").unwrap();
        doc.set_attribute(root, "x", "1").unwrap();
        let records = doc.take_records(obs);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].target(), root);
    }

    #[test]
    fn destroy_frees_detached_subtree() {
        let mut doc = Document::new();
        let root = doc.document_element();
        let a = doc.create_element("div");
        let b = doc.create_element("div");
        doc.append_child(a, b).unwrap();
        doc.append_child(root, a).unwrap();

        assert_eq!(doc.destroy(a), Err(DomError::StillAttached(a)));
        doc.remove(a).unwrap();
        assert_eq!(doc.destroy(a), Ok(2));
        assert!(!doc.exists(a));
        assert!(!doc.exists(b));

        // Slot reuse never resurrects old handles.
        let c = doc.create_element("div");
        assert!(doc.exists(c));
        assert!(!doc.exists(a));
        assert!(!doc.exists(b));
    }

    #[test]
    fn disconnect_unknown_observer_errors() {
        let mut doc = Document::new();
        let obs = observed(&mut doc);
        assert!(doc.disconnect(obs).is_ok());
        assert_eq!(doc.disconnect(obs), Err(DomError::UnknownObserver(obs.id())));
        assert!(doc.take_records(obs).is_empty());
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn random_moves_keep_links_consistent(
                moves in prop::collection::vec((0..12_usize, 0..13_usize), 0..48),
            ) {
                let mut doc = Document::new();
                let root = doc.document_element();
                let nodes: Vec<NodeId> = (0..12).map(|_| doc.create_element("div")).collect();
                for (child, parent) in moves {
                    let parent = if parent == 12 { root } else { nodes[parent] };
                    let child = nodes[child];
                    let cyclic = doc.contains(child, parent);
                    let result = doc.append_child(parent, child);
                    prop_assert_eq!(result.is_err(), cyclic);
                }

                for &node in &nodes {
                    match doc.parent_element(node) {
                        Some(parent) => {
                            prop_assert!(doc.children(parent).contains(&node));
                            prop_assert!(!doc.contains(node, parent));
                        }
                        None => prop_assert!(!doc.is_connected(node)),
                    }
                    for &child in doc.children(node) {
                        prop_assert_eq!(doc.parent_element(child), Some(node));
                    }
                }
                let connected = nodes.iter().filter(|&&n| doc.is_connected(n)).count();
                prop_assert_eq!(doc.descendant_elements(root).len(), connected);
            }
        }
    }
}
