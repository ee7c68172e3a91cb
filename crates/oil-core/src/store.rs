//! Controller instances, one per (element, controller name).
//!
//! The store owns every [`ControllerInstance`]. Elements are referenced by
//! [`NodeId`] only, so holding an instance never keeps an element alive;
//! instances for elements the host has freed are dropped by
//! [`Application::process_pending`](crate::Application::process_pending).
//!
//! # Invariants
//!
//! 1. At most one instance per (element, name).
//! 2. Disconnecting never removes an instance; a later connect reuses it.
//! 3. `initialize` runs at most once per instance, before its first connect.
//! 4. A connected flag flips only through [`InstanceStore::connect`] and
//!    [`InstanceStore::disconnect`], and each flip runs its hook exactly once.

use core::fmt;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;

use ahash::AHashMap;
use oil_dom::NodeId;
use smallvec::SmallVec;

use crate::controller::{Controller, TargetView};
use crate::error::{CallbackError, CallbackFailure, CallbackKind, Diagnostics};
use crate::lifecycle::{LifecycleEnv, invoke};
use crate::registry::{ControllerType, Registry};
use crate::scheduler::DeferredTask;
use crate::targets::{self, TargetBinding};

/// Stable handle to a stored instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId {
    index: u32,
    generation: u32,
}

impl InstanceId {
    pub(crate) const fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}v{}", self.index, self.generation)
    }
}

/// Why a controller left scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    /// Its element was removed from under the root.
    Detached,
    /// Its name was removed from the controller attribute.
    AttributeRemoved,
    /// Its element was freed by the host, or the application stopped.
    Collected,
}

/// One bound occurrence of a controller type.
pub struct ControllerInstance {
    pub(crate) id: InstanceId,
    pub(crate) element: NodeId,
    pub(crate) controller_type: Rc<ControllerType>,
    pub(crate) controller: Box<dyn Controller>,
    pub(crate) connected: bool,
    pub(crate) initialized: bool,
    pub(crate) bindings: Vec<TargetBinding>,
}

impl fmt::Debug for ControllerInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControllerInstance")
            .field("id", &self.id)
            .field("element", &self.element)
            .field("name", &self.controller_type.name())
            .field("connected", &self.connected)
            .field("bindings", &self.bindings)
            .finish_non_exhaustive()
    }
}

impl ControllerInstance {
    #[must_use]
    pub fn id(&self) -> InstanceId {
        self.id
    }

    #[must_use]
    pub fn element(&self) -> NodeId {
        self.element
    }

    #[must_use]
    pub fn name(&self) -> &str {
        self.controller_type.name()
    }

    #[must_use]
    pub fn controller_type(&self) -> &ControllerType {
        &self.controller_type
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Connected targets, through the registration-time accessor table.
    #[must_use]
    pub fn targets(&self) -> TargetView<'_> {
        TargetView {
            schema: self.controller_type.schema(),
            bindings: &self.bindings,
        }
    }

    /// Every binding this instance has made, connected or not.
    #[must_use]
    pub fn bindings(&self) -> &[TargetBinding] {
        &self.bindings
    }

    #[must_use]
    pub fn controller(&self) -> &dyn Controller {
        self.controller.as_ref()
    }

    /// Downcast to the concrete controller type.
    #[must_use]
    pub fn controller_as<T: Controller>(&self) -> Option<&T> {
        let any: &dyn Any = self.controller.as_ref();
        any.downcast_ref::<T>()
    }

    pub fn controller_as_mut<T: Controller>(&mut self) -> Option<&mut T> {
        let any: &mut dyn Any = self.controller.as_mut();
        any.downcast_mut::<T>()
    }
}

#[derive(Debug, Default)]
struct Slot {
    generation: u32,
    instance: Option<ControllerInstance>,
}

/// Owner of every controller instance.
#[derive(Debug, Default)]
pub struct InstanceStore {
    slots: Vec<Slot>,
    free: Vec<u32>,
    by_element: AHashMap<NodeId, SmallVec<[InstanceId; 2]>>,
}

impl InstanceStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The instance for `(element, name)`, if one was ever created.
    #[must_use]
    pub fn find(&self, element: NodeId, name: &str) -> Option<InstanceId> {
        self.by_element.get(&element)?.iter().copied().find(|&id| {
            self.get(id)
                .is_some_and(|instance| instance.name() == name)
        })
    }

    #[must_use]
    pub fn get(&self, id: InstanceId) -> Option<&ControllerInstance> {
        let slot = self.slots.get(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.instance.as_ref()
    }

    pub fn get_mut(&mut self, id: InstanceId) -> Option<&mut ControllerInstance> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.instance.as_mut()
    }

    /// Instances on `element`, in creation order.
    #[must_use]
    pub fn instances_on(&self, element: NodeId) -> SmallVec<[InstanceId; 2]> {
        self.by_element.get(&element).cloned().unwrap_or_default()
    }

    /// Every element that has at least one instance.
    #[must_use]
    pub fn elements(&self) -> Vec<NodeId> {
        self.by_element.keys().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ControllerInstance> {
        self.slots.iter().filter_map(|slot| slot.instance.as_ref())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.by_element.values().map(SmallVec::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_element.is_empty()
    }

    /// Return the cached instance for `(element, name)` or build one.
    ///
    /// Returns `None` without side effects when `name` is not registered, and
    /// `None` with a recorded failure when the factory panics.
    pub(crate) fn get_or_create(
        &mut self,
        registry: &Registry,
        element: NodeId,
        name: &str,
        diagnostics: &mut Diagnostics,
    ) -> Option<InstanceId> {
        if let Some(id) = self.find(element, name) {
            return Some(id);
        }
        let Some(controller_type) = registry.lookup(name) else {
            tracing::trace!(controller = name, %element, "no controller registered");
            return None;
        };
        let controller = match panic::catch_unwind(AssertUnwindSafe(|| {
            controller_type.instantiate()
        })) {
            Ok(controller) => controller,
            Err(payload) => {
                diagnostics.record(CallbackFailure {
                    controller: name.to_owned(),
                    element,
                    callback: CallbackKind::Construct,
                    error: CallbackError::from_panic(payload),
                });
                return None;
            }
        };

        let id = match self.free.pop() {
            Some(index) => InstanceId::new(index, self.slots[index as usize].generation),
            None => {
                self.slots.push(Slot::default());
                InstanceId::new((self.slots.len() - 1) as u32, 0)
            }
        };
        self.slots[id.index as usize].instance = Some(ControllerInstance {
            id,
            element,
            controller_type: Rc::clone(controller_type),
            controller,
            connected: false,
            initialized: false,
            bindings: Vec::new(),
        });
        self.by_element.entry(element).or_default().push(id);
        tracing::debug!(controller = name, %element, instance = %id, "controller created");
        Some(id)
    }

    /// Drop an instance. Callers disconnect it first.
    pub(crate) fn remove(&mut self, id: InstanceId) -> Option<ControllerInstance> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        let instance = slot.instance.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        if let Some(ids) = self.by_element.get_mut(&instance.element) {
            ids.retain(|other| *other != id);
            if ids.is_empty() {
                self.by_element.remove(&instance.element);
            }
        }
        Some(instance)
    }

    /// Connect `id`: `initialize` on first use, then `connected`, then queue
    /// target discovery for the next turn. Returns `false` if already
    /// connected.
    pub(crate) fn connect(&mut self, id: InstanceId, env: &mut LifecycleEnv<'_>) -> bool {
        let Some(instance) = self.get_mut(id) else {
            return false;
        };
        if instance.connected {
            return false;
        }
        if !instance.initialized {
            instance.initialized = true;
            invoke(env, instance, CallbackKind::Initialize, None, |c, cx| {
                c.initialize(cx)
            });
        }
        instance.connected = true;
        tracing::debug!(
            controller = instance.name(),
            element = %instance.element,
            "controller connected"
        );
        invoke(env, instance, CallbackKind::Connect, None, |c, cx| c.connected(cx));
        env.scheduler.schedule(DeferredTask::DiscoverTargets(id));
        true
    }

    /// Disconnect `id`: cancel pending discovery, release its connected
    /// targets in declaration order, then run `disconnected`. Returns `false`
    /// if it was not connected.
    pub(crate) fn disconnect(
        &mut self,
        id: InstanceId,
        env: &mut LifecycleEnv<'_>,
        reason: DisconnectReason,
    ) -> bool {
        let Some(instance) = self.get_mut(id) else {
            return false;
        };
        if !instance.connected {
            return false;
        }
        env.scheduler.cancel(id);

        let controller_type = Rc::clone(&instance.controller_type);
        for descriptor in controller_type.schema().targets() {
            for index in 0..instance.bindings.len() {
                let binding = &instance.bindings[index];
                if binding.connected && binding.target == descriptor.name {
                    targets::release_binding(instance, index, env, Some(reason));
                }
            }
        }

        instance.connected = false;
        tracing::debug!(
            controller = instance.name(),
            element = %instance.element,
            ?reason,
            "controller disconnected"
        );
        invoke(env, instance, CallbackKind::Disconnect, Some(reason), |c, cx| {
            c.disconnected(cx)
        });
        true
    }
}
