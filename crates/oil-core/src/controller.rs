//! The controller contract and the context handed to its callbacks.
//!
//! # Callback order
//!
//! For one instance, across its whole life:
//!
//! 1. factory (once, no element attached)
//! 2. `initialize` (once, before the first connect)
//! 3. `connected`
//! 4. `target_connected` per scoped target, on the next deferred turn
//! 5. `target_disconnected` per connected target, then `disconnected`
//!
//! Steps 3-5 repeat every time the element re-enters scope. A callback that
//! returns an error or panics is recorded and skipped; the rest of the batch
//! still runs.

use std::any::Any;

use oil_dom::{Document, NodeId};

use crate::config::ApplicationConfig;
use crate::error::CallbackResult;
use crate::registry::ControllerType;
use crate::schema::{AccessorKind, TargetSchema};
use crate::store::DisconnectReason;
use crate::targets::TargetBinding;

/// Behavior attached to elements declaring a controller name.
///
/// Every hook defaults to a no-op.
#[allow(unused_variables)]
pub trait Controller: Any {
    /// Called once, before the first [`connected`](Self::connected).
    fn initialize(&mut self, cx: &mut Context<'_>) -> CallbackResult {
        Ok(())
    }

    /// The element entered scope.
    fn connected(&mut self, cx: &mut Context<'_>) -> CallbackResult {
        Ok(())
    }

    /// The element left scope. All targets have already been released.
    fn disconnected(&mut self, cx: &mut Context<'_>) -> CallbackResult {
        Ok(())
    }

    /// `element` became a scoped target named `target`.
    fn target_connected(
        &mut self,
        target: &str,
        element: NodeId,
        cx: &mut Context<'_>,
    ) -> CallbackResult {
        Ok(())
    }

    /// `element` stopped being a scoped target named `target`.
    fn target_disconnected(
        &mut self,
        target: &str,
        element: NodeId,
        cx: &mut Context<'_>,
    ) -> CallbackResult {
        Ok(())
    }
}

/// What a callback can see and touch.
///
/// Mutations made through [`document_mut`](Self::document_mut) are not
/// reconciled inline; they are observed and handled as a later batch.
pub struct Context<'a> {
    pub(crate) element: NodeId,
    pub(crate) controller_type: &'a ControllerType,
    pub(crate) bindings: &'a [TargetBinding],
    pub(crate) document: &'a mut Document,
    pub(crate) config: &'a ApplicationConfig,
    pub(crate) reason: Option<DisconnectReason>,
}

impl Context<'_> {
    /// The controller's element.
    #[must_use]
    pub fn element(&self) -> NodeId {
        self.element
    }

    /// The name this controller was registered under.
    #[must_use]
    pub fn controller_name(&self) -> &str {
        self.controller_type.name()
    }

    #[must_use]
    pub fn document(&self) -> &Document {
        self.document
    }

    pub fn document_mut(&mut self) -> &mut Document {
        self.document
    }

    /// Currently connected targets.
    #[must_use]
    pub fn targets(&self) -> TargetView<'_> {
        TargetView {
            schema: self.controller_type.schema(),
            bindings: self.bindings,
        }
    }

    /// The controller's value attribute (`data-oil-<name>-value` by default).
    #[must_use]
    pub fn value(&self) -> Option<&str> {
        let name = self.config.value_attribute(self.controller_name());
        self.document.attribute(self.element, &name)
    }

    /// Why the controller is being disconnected. `None` outside disconnect paths.
    #[must_use]
    pub fn disconnect_reason(&self) -> Option<DisconnectReason> {
        self.reason
    }
}

/// Result of a table-resolved accessor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessorValue {
    Element(Option<NodeId>),
    Elements(Vec<NodeId>),
    Presence(bool),
}

/// Read-only view of an instance's connected targets.
#[derive(Clone, Copy)]
pub struct TargetView<'a> {
    pub(crate) schema: &'a TargetSchema,
    pub(crate) bindings: &'a [TargetBinding],
}

impl TargetView<'_> {
    fn connected<'s>(&'s self, target: &'s str) -> impl Iterator<Item = NodeId> + 's {
        self.bindings
            .iter()
            .filter(move |b| b.connected && b.target == target)
            .map(|b| b.element)
    }

    /// Every connected element for `target`, in binding order.
    #[must_use]
    pub fn targets(&self, target: &str) -> Vec<NodeId> {
        self.connected(target).collect()
    }

    /// The first connected element for `target`.
    #[must_use]
    pub fn target(&self, target: &str) -> Option<NodeId> {
        self.connected(target).next()
    }

    /// Whether any element is connected for `target`.
    #[must_use]
    pub fn has_target(&self, target: &str) -> bool {
        self.target(target).is_some()
    }

    /// Connected bindings across all target names.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bindings.iter().filter(|b| b.connected).count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Resolve a generated accessor name (`itemTarget`, `itemTargets`,
    /// `hasItemTarget`). Unknown names yield `None`.
    #[must_use]
    pub fn read(&self, accessor: &str) -> Option<AccessorValue> {
        let (descriptor, kind) = self.schema.resolve(accessor)?;
        let matches = self
            .bindings
            .iter()
            .filter(|b| b.connected && b.target == descriptor.name)
            .map(|b| b.element);
        Some(match kind {
            AccessorKind::First => AccessorValue::Element(matches.take(1).next()),
            AccessorKind::All => AccessorValue::Elements(matches.collect()),
            AccessorKind::Presence => AccessorValue::Presence(matches.take(1).count() > 0),
        })
    }
}

impl core::fmt::Debug for TargetView<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TargetView")
            .field("targets", &self.schema.targets().len())
            .field("bindings", &self.bindings.len())
            .finish()
    }
}
