//! Ownership of targets by controller elements.
//!
//! A target element belongs to the nearest element, starting at its parent,
//! whose controller attribute declares the controller name. Starting at the
//! parent keeps an element that is both a controller and a target from owning
//! itself, and makes an inner controller of the same name capture every
//! target beneath it.
//!
//! Nothing here is cached: re-parenting and attribute edits change answers, so
//! every question is asked against the current tree.

use oil_dom::{Document, NodeId};

use crate::codec;
use crate::config::ApplicationConfig;

/// The element owning `candidate` for `controller_name`, if any.
#[must_use]
pub fn owner_of(
    doc: &Document,
    candidate: NodeId,
    controller_name: &str,
    controller_attribute: &str,
) -> Option<NodeId> {
    let mut current = doc.parent_element(candidate);
    while let Some(element) = current {
        if doc
            .attribute(element, controller_attribute)
            .is_some_and(|value| codec::declares_controller(value, controller_name))
        {
            return Some(element);
        }
        current = doc.parent_element(element);
    }
    None
}

/// Whether `target` is in scope as `(controller, target_name)` for the
/// controller on `owner`, given the target attribute value `declared`.
///
/// `declared` is passed explicitly so attribute records can be reconciled
/// against the value they carried rather than the live one.
#[must_use]
#[allow(clippy::too_many_arguments)]
pub fn in_scope(
    doc: &Document,
    config: &ApplicationConfig,
    root: NodeId,
    target: NodeId,
    owner: NodeId,
    controller: &str,
    target_name: &str,
    declared: Option<&str>,
) -> bool {
    doc.contains(root, target)
        && declared.is_some_and(|value| codec::declares_target(value, controller, target_name))
        && owner_of(doc, target, controller, &config.controller_attribute) == Some(owner)
}

/// [`in_scope`] against the live target attribute.
#[must_use]
pub fn in_scope_now(
    doc: &Document,
    config: &ApplicationConfig,
    root: NodeId,
    target: NodeId,
    owner: NodeId,
    controller: &str,
    target_name: &str,
) -> bool {
    let declared = doc.attribute(target, &config.target_attribute);
    in_scope(doc, config, root, target, owner, controller, target_name, declared)
}
