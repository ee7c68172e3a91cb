//! Mutation batch reconciliation.
//!
//! The reconciler consumes mutation records in order and drives the instance
//! store and the target tracker to the state the tree now describes.
//!
//! | Record | Handling |
//! |--------|----------|
//! | child list, removed | Release out-of-scope bindings on every removed element, then disconnect controllers that left the root |
//! | child list, added | Connect every declared controller, queue discovery on the owners of every declared target |
//! | controller attribute | Disconnect dropped names, connect current names |
//! | target attribute | Release pairs no longer in scope, bind pairs that are |
//! | child list, moved within one batch | Nothing fires; a per-record replay of the DOM observer would fire a disconnect then a connect |
//! | end of batch | Release and disconnect whatever is still connected outside the root |
//!
//! Records are reconciled against the live tree, so a subtree removed and
//! re-added within one batch ends up where it started with no callbacks, and
//! an attribute that changed and changed back produces nothing under
//! [`RoundTripPolicy::Suppress`].
//!
//! # Failure Modes
//!
//! | Failure | Cause | Behavior |
//! |---------|-------|----------|
//! | Unknown controller name | Attribute precedes registration | Traced, skipped; [`Application::register`](crate::Application::register) upgrades later |
//! | Target without owner | No enclosing controller of that name | Traced, skipped |
//! | Callback error or panic | Controller code | Recorded, batch continues |
//! | Freed element in a record | Host destroyed it before delivery | Skipped; pruned after the batch |

use std::rc::Rc;

use oil_dom::{MutationRecord, NodeId};

use crate::codec;
use crate::config::RoundTripPolicy;
use crate::lifecycle::LifecycleEnv;
use crate::registry::Registry;
use crate::scheduler::DeferredTask;
use crate::scope;
use crate::store::{ControllerInstance, DisconnectReason, InstanceId, InstanceStore};
use crate::targets::{Declared, TargetTracker};

/// Observation state of an [`Application`](crate::Application).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReconcilerState {
    #[default]
    Stopped,
    Observing {
        root: NodeId,
        observer: oil_dom::ObserverId,
    },
}

/// Borrowed view of the application state for one drive step.
pub(crate) struct Reconciler<'a> {
    pub(crate) registry: &'a Registry,
    pub(crate) store: &'a mut InstanceStore,
    pub(crate) tracker: &'a mut TargetTracker,
    pub(crate) env: LifecycleEnv<'a>,
}

impl Reconciler<'_> {
    /// Reconcile one batch of records, in order.
    pub(crate) fn handle_batch(&mut self, records: &[MutationRecord]) {
        let config = self.env.config;
        for (index, record) in records.iter().enumerate() {
            match record {
                MutationRecord::ChildList { removed, added, .. } => {
                    for &node in removed {
                        self.downgrade_subtree(node);
                    }
                    for &node in added {
                        self.upgrade_subtree(node);
                    }
                }
                MutationRecord::Attributes {
                    target,
                    name,
                    old_value,
                } => {
                    let settled = self.settled_value(&records[index + 1..], *target, name);
                    if *name == config.controller_attribute {
                        self.controller_attribute_changed(
                            *target,
                            old_value.as_deref(),
                            settled.as_deref(),
                        );
                    } else if *name == config.target_attribute {
                        self.target_attribute_changed(
                            *target,
                            old_value.as_deref(),
                            settled.as_deref(),
                        );
                    }
                }
            }
        }
        self.release_detached();
    }

    /// Release bindings and disconnect controllers still connected outside
    /// the root. Nodes removed from a subtree that had already left the root
    /// produce no records, so only this sweep reaches them. Freed elements
    /// are left to [`prune`](Self::prune).
    fn release_detached(&mut self) {
        for element in self
            .tracker
            .detached_elements(self.env.document, self.env.root)
        {
            self.tracker
                .release_stale(self.store, element, Declared::Live, &mut self.env);
        }

        let mut ids: Vec<InstanceId> = self
            .store
            .iter()
            .filter(|instance| {
                instance.is_connected()
                    && self.env.document.exists(instance.element())
                    && !self.within_root(instance.element())
            })
            .map(ControllerInstance::id)
            .collect();
        ids.sort_unstable();
        for id in ids {
            self.disconnect_controller(id, DisconnectReason::Detached);
        }
    }

    /// The value an attribute record is reconciled against.
    ///
    /// `Suppress` reads the live attribute. `Fire` replays intermediate
    /// values: the next record for the same attribute carries the value this
    /// record changed it to.
    fn settled_value(
        &self,
        later: &[MutationRecord],
        target: NodeId,
        name: &str,
    ) -> Option<String> {
        let live = || {
            self.env
                .document
                .attribute(target, name)
                .map(str::to_owned)
        };
        match self.env.config.round_trip {
            RoundTripPolicy::Suppress => live(),
            RoundTripPolicy::Fire => later
                .iter()
                .find_map(|record| match record {
                    MutationRecord::Attributes {
                        target: other,
                        name: other_name,
                        old_value,
                    } if *other == target && other_name == name => Some(old_value.clone()),
                    _ => None,
                })
                .unwrap_or_else(live),
        }
    }

    fn within_root(&self, node: NodeId) -> bool {
        self.env.document.contains(self.env.root, node)
    }

    /// Connect every controller and queue discovery for every target in the
    /// subtree rooted at `node`.
    pub(crate) fn upgrade_subtree(&mut self, node: NodeId) {
        if !self.within_root(node) {
            return;
        }
        let config = self.env.config;
        for element in self.env.document.inclusive_descendant_elements(node) {
            let value = self
                .env
                .document
                .attribute(element, &config.controller_attribute)
                .map(str::to_owned)
                .unwrap_or_default();
            let names = codec::controllers_from_attribute(&value);
            // Edits made while the element was detached were never recorded.
            self.disconnect_undeclared(element, &names);
            for &name in &names {
                self.connect_controller(element, name);
            }
            if let Some(value) = self
                .env
                .document
                .attribute(element, &config.target_attribute)
                .map(str::to_owned)
            {
                for (controller, _) in codec::target_pairs(&value) {
                    self.schedule_owner_discovery(element, controller);
                }
            }
        }
    }

    /// Release targets and disconnect controllers in the subtree rooted at
    /// `node`, parents first.
    pub(crate) fn downgrade_subtree(&mut self, node: NodeId) {
        for element in self.env.document.inclusive_descendant_elements(node) {
            self.tracker
                .release_stale(self.store, element, Declared::Live, &mut self.env);
            if self.within_root(element) {
                continue;
            }
            for id in self.store.instances_on(element) {
                self.disconnect_controller(id, DisconnectReason::Detached);
            }
        }
    }

    /// Connect every element under the root declaring `name`.
    pub(crate) fn upgrade_controller(&mut self, name: &str) {
        let config = self.env.config;
        for element in self.env.document.inclusive_descendant_elements(self.env.root) {
            let declares = self
                .env
                .document
                .attribute(element, &config.controller_attribute)
                .is_some_and(|value| codec::declares_controller(value, name));
            if declares {
                self.connect_controller(element, name);
            }
        }
    }

    /// Bring existing instances in line with a tree that changed while no
    /// observer was installed.
    pub(crate) fn resync(&mut self) {
        let config = self.env.config;
        let mut ids: Vec<InstanceId> = self
            .store
            .iter()
            .filter(|instance| instance.is_connected())
            .map(ControllerInstance::id)
            .collect();
        ids.sort_unstable();
        for id in ids {
            let Some(instance) = self.store.get(id) else {
                continue;
            };
            let element = instance.element();
            let reason = if !self.within_root(element) {
                Some(DisconnectReason::Detached)
            } else if !self
                .env
                .document
                .attribute(element, &config.controller_attribute)
                .is_some_and(|value| codec::declares_controller(value, instance.name()))
            {
                Some(DisconnectReason::AttributeRemoved)
            } else {
                None
            };
            match reason {
                Some(reason) => self.disconnect_controller(id, reason),
                None => {
                    self.tracker.revalidate(self.store, id, &mut self.env);
                    self.env.scheduler.schedule(DeferredTask::DiscoverTargets(id));
                }
            }
        }
    }

    fn connect_controller(&mut self, element: NodeId, name: &str) {
        if !self.within_root(element) {
            return;
        }
        let Some(id) =
            self.store
                .get_or_create(self.registry, element, name, self.env.diagnostics)
        else {
            return;
        };
        if self
            .store
            .get(id)
            .is_none_or(ControllerInstance::is_connected)
        {
            return;
        }
        // Targets between this element and the nearest same-named ancestor
        // now belong to this element.
        if let Some(owner) = scope::owner_of(
            self.env.document,
            element,
            name,
            &self.env.config.controller_attribute,
        ) && let Some(outer) = self.store.find(owner, name)
        {
            self.tracker.revalidate(self.store, outer, &mut self.env);
        }
        self.store.connect(id, &mut self.env);
    }

    fn disconnect_controller(&mut self, id: InstanceId, reason: DisconnectReason) {
        let Some(instance) = self.store.get(id) else {
            return;
        };
        let element = instance.element();
        let controller_type = Rc::clone(&instance.controller_type);
        if !self.store.disconnect(id, &mut self.env, reason) || reason == DisconnectReason::Detached
        {
            return;
        }
        // Targets this element captured fall back to the nearest same-named
        // ancestor.
        if let Some(owner) = scope::owner_of(
            self.env.document,
            element,
            controller_type.name(),
            &self.env.config.controller_attribute,
        ) {
            self.schedule_discovery(owner, controller_type.name());
        }
    }

    fn schedule_owner_discovery(&mut self, target: NodeId, controller: &str) {
        match scope::owner_of(
            self.env.document,
            target,
            controller,
            &self.env.config.controller_attribute,
        ) {
            Some(owner) => self.schedule_discovery(owner, controller),
            None => tracing::trace!(%target, controller, "target has no owner"),
        }
    }

    fn schedule_discovery(&mut self, owner: NodeId, controller: &str) {
        if let Some(id) = self.store.find(owner, controller)
            && self.store.get(id).is_some_and(ControllerInstance::is_connected)
        {
            self.env.scheduler.schedule(DeferredTask::DiscoverTargets(id));
        }
    }

    fn controller_attribute_changed(
        &mut self,
        element: NodeId,
        old: Option<&str>,
        new: Option<&str>,
    ) {
        if !self.within_root(element) {
            tracing::trace!(%element, "controller attribute changed outside root");
            return;
        }
        tracing::trace!(%element, ?old, ?new, "controller attribute changed");
        let old_names = old.map(codec::controllers_from_attribute).unwrap_or_default();
        let new_names = new.map(codec::controllers_from_attribute).unwrap_or_default();

        for &name in &old_names {
            if new_names.contains(&name) {
                continue;
            }
            if let Some(id) = self.store.find(element, name) {
                self.disconnect_controller(id, DisconnectReason::AttributeRemoved);
            }
        }
        // Instances connected through a path the old value does not show.
        self.disconnect_undeclared(element, &new_names);
        for &name in &new_names {
            self.connect_controller(element, name);
        }
    }

    /// Disconnect instances on `element` whose name is not in `names`.
    fn disconnect_undeclared(&mut self, element: NodeId, names: &[&str]) {
        for id in self.store.instances_on(element) {
            let stale = self.store.get(id).is_some_and(|instance| {
                instance.is_connected() && !names.contains(&instance.name())
            });
            if stale {
                self.disconnect_controller(id, DisconnectReason::AttributeRemoved);
            }
        }
    }

    fn target_attribute_changed(&mut self, element: NodeId, old: Option<&str>, new: Option<&str>) {
        if !self.within_root(element) {
            tracing::trace!(%element, "target attribute changed outside root");
            return;
        }
        tracing::trace!(%element, ?old, ?new, "target attribute changed");
        let config = self.env.config;
        let new_pairs = new.map(codec::target_pairs).unwrap_or_default();
        for (controller, target) in old.map(codec::target_pairs).unwrap_or_default() {
            if new_pairs.contains(&(controller, target)) {
                continue;
            }
            if let Some(owner) = scope::owner_of(
                self.env.document,
                element,
                controller,
                &config.controller_attribute,
            ) && let Some(id) = self.store.find(owner, controller)
            {
                self.tracker
                    .release(self.store, id, element, target, &mut self.env);
            }
        }
        // Anything else that fell out of scope, whoever holds it.
        self.tracker
            .release_stale(self.store, element, Declared::Value(new), &mut self.env);

        let Some(value) = new else {
            return;
        };
        for (controller, target) in codec::target_pairs(value) {
            let Some(owner) = scope::owner_of(
                self.env.document,
                element,
                controller,
                &config.controller_attribute,
            ) else {
                tracing::trace!(%element, controller, "target has no owner");
                continue;
            };
            let Some(id) = self.store.find(owner, controller) else {
                continue;
            };
            if scope::in_scope(
                self.env.document,
                config,
                self.env.root,
                element,
                owner,
                controller,
                target,
                Some(value),
            ) {
                self.tracker
                    .bind(self.store, id, element, target, &mut self.env);
            }
        }
    }

    /// Run one turn of deferred tasks. Returns how many ran.
    pub(crate) fn run_deferred(&mut self, tasks: Vec<DeferredTask>) -> usize {
        let count = tasks.len();
        for task in tasks {
            match task {
                DeferredTask::DiscoverTargets(id) => {
                    self.tracker.discover(self.store, id, &mut self.env);
                }
            }
        }
        count
    }

    /// Drop state held for elements the host has freed. Returns the number of
    /// instances dropped.
    pub(crate) fn prune(&mut self) -> usize {
        for element in self.tracker.dead_elements(self.env.document) {
            self.tracker
                .forget_element(self.store, element, &mut self.env);
        }

        let mut dead: Vec<NodeId> = self
            .store
            .elements()
            .into_iter()
            .filter(|&element| !self.env.document.exists(element))
            .collect();
        dead.sort_unstable();

        let mut dropped = 0;
        for element in dead {
            for id in self.store.instances_on(element) {
                self.store
                    .disconnect(id, &mut self.env, DisconnectReason::Collected);
                self.env.scheduler.cancel(id);
                if let Some(instance) = self.store.remove(id) {
                    self.tracker.drop_instance(id, &instance.bindings);
                    tracing::debug!(
                        controller = instance.name(),
                        %element,
                        "controller collected"
                    );
                    dropped += 1;
                }
            }
        }
        dropped
    }
}
