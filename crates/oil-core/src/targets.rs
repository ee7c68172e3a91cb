//! Target bindings and the tracker that keeps them in step with scope.
//!
//! A [`TargetBinding`] ties one instance to one element under one target name.
//! Bindings live on their instance in the order they were first made; the
//! tracker keeps a reverse index from target element to the instances holding
//! a binding on it, so removals and attribute edits only visit the instances
//! that can be affected.
//!
//! # Invariants
//!
//! 1. At most one binding per (instance, element, target name).
//! 2. `target_connected` runs only on a false -> true flip and
//!    `target_disconnected` only on a true -> false flip.
//! 3. A connected binding is in scope as of the last reconciliation that
//!    touched its element or its owner.

use std::rc::Rc;

use ahash::AHashMap;
use oil_dom::{Document, NodeId};
use smallvec::SmallVec;

use crate::error::CallbackKind;
use crate::lifecycle::{LifecycleEnv, invoke};
use crate::scope;
use crate::store::{ControllerInstance, DisconnectReason, InstanceId, InstanceStore};

/// One (instance, element, target name) relation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetBinding {
    pub(crate) element: NodeId,
    pub(crate) target: String,
    pub(crate) connected: bool,
}

impl TargetBinding {
    #[must_use]
    pub fn element(&self) -> NodeId {
        self.element
    }

    #[must_use]
    pub fn target(&self) -> &str {
        &self.target
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connected
    }
}

/// Flip binding `index` on and run its connect hook.
pub(crate) fn connect_binding(
    instance: &mut ControllerInstance,
    index: usize,
    env: &mut LifecycleEnv<'_>,
) -> bool {
    let binding = &mut instance.bindings[index];
    if binding.connected {
        return false;
    }
    binding.connected = true;
    let element = binding.element;
    let target = binding.target.clone();
    tracing::debug!(
        controller = instance.controller_type.name(),
        owner = %instance.element,
        %element,
        target = %target,
        "target connected"
    );
    invoke(
        env,
        instance,
        CallbackKind::TargetConnected(target.clone()),
        None,
        |c, cx| c.target_connected(&target, element, cx),
    );
    true
}

/// Flip binding `index` off and run its disconnect hook.
pub(crate) fn release_binding(
    instance: &mut ControllerInstance,
    index: usize,
    env: &mut LifecycleEnv<'_>,
    reason: Option<DisconnectReason>,
) -> bool {
    let binding = &mut instance.bindings[index];
    if !binding.connected {
        return false;
    }
    binding.connected = false;
    let element = binding.element;
    let target = binding.target.clone();
    tracing::debug!(
        controller = instance.controller_type.name(),
        owner = %instance.element,
        %element,
        target = %target,
        "target disconnected"
    );
    invoke(
        env,
        instance,
        CallbackKind::TargetDisconnected(target.clone()),
        reason,
        |c, cx| c.target_disconnected(&target, element, cx),
    );
    true
}

/// Which target attribute value a scope check reads.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Declared<'v> {
    /// Whatever the element carries now.
    Live,
    /// An explicit value, e.g. the one a mutation record settled on.
    Value(Option<&'v str>),
}

/// Reverse index from target elements to the instances bound to them.
#[derive(Debug, Default)]
pub struct TargetTracker {
    holders: AHashMap<NodeId, SmallVec<[InstanceId; 2]>>,
}

impl TargetTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Instances holding a binding (connected or not) on `element`.
    #[must_use]
    pub fn holders_of(&self, element: NodeId) -> SmallVec<[InstanceId; 2]> {
        self.holders.get(&element).cloned().unwrap_or_default()
    }

    /// Number of elements with at least one binding.
    #[must_use]
    pub fn len(&self) -> usize {
        self.holders.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.holders.is_empty()
    }

    /// Bind `element` as `target` on `id` and fire its connect hook.
    ///
    /// No-op (returns `false`) if the instance is disconnected, does not
    /// declare `target`, or the binding is already connected. Scope is the
    /// caller's responsibility.
    pub(crate) fn bind(
        &mut self,
        store: &mut InstanceStore,
        id: InstanceId,
        element: NodeId,
        target: &str,
        env: &mut LifecycleEnv<'_>,
    ) -> bool {
        let Some(instance) = store.get_mut(id) else {
            return false;
        };
        if !instance.connected || !instance.controller_type.schema().declares(target) {
            return false;
        }
        let index = match instance
            .bindings
            .iter()
            .position(|b| b.element == element && b.target == target)
        {
            Some(index) => index,
            None => {
                instance.bindings.push(TargetBinding {
                    element,
                    target: target.to_owned(),
                    connected: false,
                });
                let holders = self.holders.entry(element).or_default();
                if !holders.contains(&id) {
                    holders.push(id);
                }
                instance.bindings.len() - 1
            }
        };
        connect_binding(instance, index, env)
    }

    /// Release the connected binding of `element` as `target` on `id`, if any.
    pub(crate) fn release(
        &mut self,
        store: &mut InstanceStore,
        id: InstanceId,
        element: NodeId,
        target: &str,
        env: &mut LifecycleEnv<'_>,
    ) -> bool {
        let Some(instance) = store.get_mut(id) else {
            return false;
        };
        let Some(index) = instance
            .bindings
            .iter()
            .position(|b| b.connected && b.element == element && b.target == target)
        else {
            return false;
        };
        release_binding(instance, index, env, None)
    }

    /// Bind every scoped target under `id`'s element, per declared target
    /// name in declaration order, then in document order.
    pub(crate) fn discover(
        &mut self,
        store: &mut InstanceStore,
        id: InstanceId,
        env: &mut LifecycleEnv<'_>,
    ) -> usize {
        let Some(instance) = store.get(id) else {
            return 0;
        };
        if !instance.connected || !env.document.contains(env.root, instance.element) {
            return 0;
        }
        let owner = instance.element;
        let controller_type = Rc::clone(&instance.controller_type);
        let candidates = env.document.descendant_elements(owner);

        let mut bound = 0;
        for descriptor in controller_type.schema().targets() {
            for &candidate in &candidates {
                // Earlier callbacks may have edited the tree; ask again each time.
                if scope::in_scope_now(
                    env.document,
                    env.config,
                    env.root,
                    candidate,
                    owner,
                    controller_type.name(),
                    &descriptor.name,
                ) && self.bind(store, id, candidate, &descriptor.name, env)
                {
                    bound += 1;
                }
            }
        }
        tracing::trace!(controller = controller_type.name(), %owner, bound, "targets discovered");
        bound
    }

    /// Release every connected binding of `id` that is out of scope.
    pub(crate) fn revalidate(
        &mut self,
        store: &mut InstanceStore,
        id: InstanceId,
        env: &mut LifecycleEnv<'_>,
    ) -> usize {
        Self::sweep(store, id, None, Declared::Live, env)
    }

    /// Release out-of-scope bindings on `element` across all holders.
    pub(crate) fn release_stale(
        &mut self,
        store: &mut InstanceStore,
        element: NodeId,
        declared: Declared<'_>,
        env: &mut LifecycleEnv<'_>,
    ) -> usize {
        self.holders_of(element)
            .into_iter()
            .map(|id| Self::sweep(store, id, Some(element), declared, env))
            .sum()
    }

    fn sweep(
        store: &mut InstanceStore,
        id: InstanceId,
        only: Option<NodeId>,
        declared: Declared<'_>,
        env: &mut LifecycleEnv<'_>,
    ) -> usize {
        let Some(instance) = store.get_mut(id) else {
            return 0;
        };
        let owner = instance.element;
        let controller_type = Rc::clone(&instance.controller_type);
        let mut released = 0;
        for index in 0..instance.bindings.len() {
            let binding = &instance.bindings[index];
            if !binding.connected || only.is_some_and(|element| element != binding.element) {
                continue;
            }
            let value = match declared {
                Declared::Live => env
                    .document
                    .attribute(binding.element, &env.config.target_attribute),
                Declared::Value(value) => value,
            };
            let keep = instance.connected
                && scope::in_scope(
                    env.document,
                    env.config,
                    env.root,
                    binding.element,
                    owner,
                    controller_type.name(),
                    &binding.target,
                    value,
                );
            if !keep && release_binding(instance, index, env, None) {
                released += 1;
            }
        }
        released
    }

    /// Drop every binding on a freed `element`, firing disconnect hooks for
    /// the connected ones.
    pub(crate) fn forget_element(
        &mut self,
        store: &mut InstanceStore,
        element: NodeId,
        env: &mut LifecycleEnv<'_>,
    ) {
        let Some(ids) = self.holders.remove(&element) else {
            return;
        };
        for id in ids {
            let Some(instance) = store.get_mut(id) else {
                continue;
            };
            for index in 0..instance.bindings.len() {
                if instance.bindings[index].element == element {
                    release_binding(instance, index, env, Some(DisconnectReason::Collected));
                }
            }
            instance.bindings.retain(|b| b.element != element);
        }
    }

    /// Remove `id` from the index once its instance is gone.
    pub(crate) fn drop_instance(&mut self, id: InstanceId, bindings: &[TargetBinding]) {
        for binding in bindings {
            if let Some(holders) = self.holders.get_mut(&binding.element) {
                holders.retain(|other| *other != id);
                if holders.is_empty() {
                    self.holders.remove(&binding.element);
                }
            }
        }
    }

    /// Live target elements outside `root` that still have a holder, in
    /// handle order.
    #[must_use]
    pub(crate) fn detached_elements(&self, document: &Document, root: NodeId) -> Vec<NodeId> {
        let mut detached: Vec<NodeId> = self
            .holders
            .keys()
            .copied()
            .filter(|&element| document.exists(element) && !document.contains(root, element))
            .collect();
        detached.sort_unstable();
        detached
    }

    /// Target elements the host has freed, in handle order.
    #[must_use]
    pub(crate) fn dead_elements(&self, document: &Document) -> Vec<NodeId> {
        let mut dead: Vec<NodeId> = self
            .holders
            .keys()
            .copied()
            .filter(|&element| !document.exists(element))
            .collect();
        dead.sort_unstable();
        dead
    }
}
