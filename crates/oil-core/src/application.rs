//! The application: registry, observation and the host-driven loop.
//!
//! There is no ambient event loop, so the host drives reconciliation:
//!
//! ```text
//! mutate document ──► process_pending ──► run_deferred ──► ...
//!                     (record batches)    (target discovery)
//! ```
//!
//! [`Application::settle`] alternates the two until nothing is left.
//!
//! # Example
//!
//! ```
//! use oil_core::{Application, ApplicationConfig, Controller, ControllerDefinition};
//! use oil_dom::{Document, element};
//!
//! struct Hello;
//! impl Controller for Hello {}
//!
//! let mut doc = Document::new();
//! let mut app = Application::launch(ApplicationConfig::default(), &mut doc).unwrap();
//! app.register(&mut doc, ControllerDefinition::new("hello", || Hello)).unwrap();
//!
//! let root = doc.document_element();
//! let node = doc.build(&element("div").attr("data-oil-controller", "hello"));
//! doc.append_child(root, node).unwrap();
//! app.settle(&mut doc);
//!
//! assert!(app.controller(node, "hello").is_some());
//! ```

use oil_dom::{Document, NodeId, ObserveFlags, ObserveOptions};

use crate::config::ApplicationConfig;
use crate::controller::Controller;
use crate::error::{CallbackFailure, ConfigError, Diagnostics};
use crate::lifecycle::LifecycleEnv;
use crate::reconciler::{Reconciler, ReconcilerState};
use crate::registry::{ControllerDefinition, Registry};
use crate::scheduler::Scheduler;
use crate::store::{ControllerInstance, InstanceStore};
use crate::targets::TargetTracker;

/// Controller registry plus the reconciliation engine for one root.
#[derive(Debug, Default)]
pub struct Application {
    config: ApplicationConfig,
    registry: Registry,
    store: InstanceStore,
    tracker: TargetTracker,
    scheduler: Scheduler,
    diagnostics: Diagnostics,
    state: ReconcilerState,
    root: Option<NodeId>,
}

impl Application {
    /// A stopped application.
    #[must_use]
    pub fn new(config: ApplicationConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Create and [`start`](Self::start) in one step.
    ///
    /// # Errors
    ///
    /// Whatever [`start`](Self::start) reports.
    pub fn launch(config: ApplicationConfig, document: &mut Document) -> Result<Self, ConfigError> {
        let mut app = Self::new(config);
        app.start(document)?;
        Ok(app)
    }

    #[must_use]
    pub fn config(&self) -> &ApplicationConfig {
        &self.config
    }

    /// Replace the configuration. Only allowed while stopped.
    ///
    /// # Errors
    ///
    /// [`ConfigError::AlreadyStarted`] while observing, or a validation error.
    pub fn configure(&mut self, config: ApplicationConfig) -> Result<(), ConfigError> {
        if self.is_started() {
            return Err(ConfigError::AlreadyStarted);
        }
        config.validate()?;
        self.config = config;
        Ok(())
    }

    #[must_use]
    pub fn state(&self) -> ReconcilerState {
        self.state
    }

    #[must_use]
    pub fn is_started(&self) -> bool {
        matches!(self.state, ReconcilerState::Observing { .. })
    }

    /// The observed root, or the last one observed.
    #[must_use]
    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    fn reconciler<'a>(&'a mut self, document: &'a mut Document, root: NodeId) -> Reconciler<'a> {
        Reconciler {
            registry: &self.registry,
            store: &mut self.store,
            tracker: &mut self.tracker,
            env: LifecycleEnv {
                document,
                config: &self.config,
                root,
                scheduler: &mut self.scheduler,
                diagnostics: &mut self.diagnostics,
            },
        }
    }

    // --- Observation ---

    /// Install the observer and upgrade every registered controller already
    /// in the tree.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::AlreadyStarted`] if already observing.
    /// - [`ConfigError::InvalidRoot`] if the root is not a live element.
    /// - Any configuration validation error.
    pub fn start(&mut self, document: &mut Document) -> Result<(), ConfigError> {
        let result = self.try_start(document);
        if let Err(error) = &result {
            tracing::warn!(%error, "application start rejected");
        }
        result
    }

    fn try_start(&mut self, document: &mut Document) -> Result<(), ConfigError> {
        if self.is_started() {
            return Err(ConfigError::AlreadyStarted);
        }
        self.config.validate()?;
        let root = self
            .config
            .root
            .unwrap_or_else(|| document.document_element());
        if !document.is_element(root) {
            return Err(ConfigError::InvalidRoot(root));
        }

        let options = ObserveOptions::new(
            ObserveFlags::CHILD_LIST
                | ObserveFlags::ATTRIBUTES
                | ObserveFlags::SUBTREE
                | ObserveFlags::ATTRIBUTE_OLD_VALUE,
        )
        .with_attribute_filter([
            self.config.controller_attribute.clone(),
            self.config.target_attribute.clone(),
        ]);
        let observer = document
            .observe(root, options)
            .map_err(|_| ConfigError::InvalidRoot(root))?;
        self.state = ReconcilerState::Observing { root, observer };
        self.root = Some(root);

        let _span = tracing::debug_span!("application_start", %root).entered();
        let mut reconciler = self.reconciler(document, root);
        reconciler.resync();
        reconciler.upgrade_subtree(root);
        Ok(())
    }

    /// Deliver every queued record, then detach the observer.
    ///
    /// If the batch limit cuts the drain short, the remaining records are
    /// not replayed; instead every instance is resynced against the live
    /// tree, as [`start`](Self::start) does.
    ///
    /// Returns `false` if the application was not started.
    pub fn stop(&mut self, document: &mut Document) -> bool {
        let ReconcilerState::Observing { root, observer } = self.state else {
            return false;
        };
        let _span = tracing::debug_span!("application_stop", %root).entered();

        let max = self.config.max_batches_per_flush.max(1);
        let mut batches = 0;
        while batches < max {
            let records = document.take_records(observer);
            if records.is_empty() {
                break;
            }
            self.reconciler(document, root).handle_batch(&records);
            batches += 1;
        }
        if document.has_pending_records(observer) {
            tracing::warn!(batches, "batch limit reached while stopping; resyncing instead");
            let mut reconciler = self.reconciler(document, root);
            reconciler.resync();
            reconciler.upgrade_subtree(root);
        }
        if let Err(error) = document.disconnect(observer) {
            tracing::warn!(%error, "observer already gone");
        }
        self.state = ReconcilerState::Stopped;
        self.reconciler(document, root).prune();
        true
    }

    // --- Registration ---

    /// Register a named definition and upgrade matching elements.
    ///
    /// While stopped the definition is only stored; [`start`](Self::start)
    /// upgrades it.
    ///
    /// # Errors
    ///
    /// [`ConfigError::MissingControllerName`], [`ConfigError::InvalidName`] or
    /// [`ConfigError::DuplicateRegistration`]. Nothing changes on error.
    pub fn register(
        &mut self,
        document: &mut Document,
        definition: ControllerDefinition,
    ) -> Result<(), ConfigError> {
        self.register_inner(document, definition, None)
    }

    /// Register under `name` unless the definition names itself.
    ///
    /// # Errors
    ///
    /// As [`register`](Self::register).
    pub fn register_as(
        &mut self,
        document: &mut Document,
        name: &str,
        definition: ControllerDefinition,
    ) -> Result<(), ConfigError> {
        self.register_inner(document, definition, Some(name))
    }

    fn register_inner(
        &mut self,
        document: &mut Document,
        definition: ControllerDefinition,
        name: Option<&str>,
    ) -> Result<(), ConfigError> {
        let controller_type = match self.registry.register(definition, name) {
            Ok(controller_type) => controller_type,
            Err(error) => {
                tracing::warn!(%error, "controller registration rejected");
                return Err(error);
            }
        };
        tracing::debug!(controller = controller_type.name(), "controller registered");
        if let ReconcilerState::Observing { root, .. } = self.state {
            let _span =
                tracing::debug_span!("upgrade_controller", controller = controller_type.name())
                    .entered();
            self.reconciler(document, root)
                .upgrade_controller(controller_type.name());
        }
        Ok(())
    }

    // --- Lookup ---

    /// The connected instance for `(element, name)`.
    #[must_use]
    pub fn controller(&self, element: NodeId, name: &str) -> Option<&ControllerInstance> {
        self.instance(element, name)
            .filter(|instance| instance.is_connected())
    }

    /// The instance for `(element, name)`, connected or not.
    #[must_use]
    pub fn instance(&self, element: NodeId, name: &str) -> Option<&ControllerInstance> {
        self.store.get(self.store.find(element, name)?)
    }

    /// The connected controller for `(element, name)` as its concrete type.
    #[must_use]
    pub fn controller_as<T: Controller>(&self, element: NodeId, name: &str) -> Option<&T> {
        self.controller(element, name)?.controller_as::<T>()
    }

    /// Mutable access to a connected controller as its concrete type.
    pub fn controller_as_mut<T: Controller>(
        &mut self,
        element: NodeId,
        name: &str,
    ) -> Option<&mut T> {
        let id = self.store.find(element, name)?;
        let instance = self.store.get_mut(id)?;
        if !instance.is_connected() {
            return None;
        }
        instance.controller_as_mut::<T>()
    }

    /// Connected instances on `element`, in creation order.
    #[must_use]
    pub fn controllers_on(&self, element: NodeId) -> Vec<&ControllerInstance> {
        self.store
            .instances_on(element)
            .into_iter()
            .filter_map(|id| self.store.get(id))
            .filter(|instance| instance.is_connected())
            .collect()
    }

    /// Every live instance.
    pub fn instances(&self) -> impl Iterator<Item = &ControllerInstance> {
        self.store.iter()
    }

    // --- Driving ---

    /// Deliver queued mutation records as batches until none are left or the
    /// batch limit is hit, then prune state for freed elements. Returns the
    /// number of batches handled.
    pub fn process_pending(&mut self, document: &mut Document) -> usize {
        let ReconcilerState::Observing { root, observer } = self.state else {
            return 0;
        };
        let max = self.config.max_batches_per_flush.max(1);
        let mut batches = 0;
        while batches < max {
            let records = document.take_records(observer);
            if records.is_empty() {
                break;
            }
            batches += 1;
            let _span =
                tracing::debug_span!("reconcile_batch", batch = batches, records = records.len())
                    .entered();
            self.reconciler(document, root).handle_batch(&records);
        }
        if batches == max && document.has_pending_records(observer) {
            tracing::warn!(max, "batch limit reached; remaining records stay queued");
        }
        self.reconciler(document, root).prune();
        batches
    }

    /// Run one turn of deferred tasks. Tasks queued during the turn run on
    /// the next one. Returns the number of tasks run.
    pub fn run_deferred(&mut self, document: &mut Document) -> usize {
        if self.scheduler.is_idle() {
            return 0;
        }
        let Some(root) = self.root else {
            return 0;
        };
        let tasks = self.scheduler.take_turn();
        let _span = tracing::debug_span!("deferred_turn", tasks = tasks.len()).entered();
        self.reconciler(document, root).run_deferred(tasks)
    }

    /// Alternate [`process_pending`](Self::process_pending) and
    /// [`run_deferred`](Self::run_deferred) until both are idle, for at most
    /// `max_batches_per_flush` rounds. Returns the number of rounds that did
    /// work.
    pub fn settle(&mut self, document: &mut Document) -> usize {
        let max = self.config.max_batches_per_flush.max(1);
        let mut rounds = 0;
        while rounds < max {
            let batches = self.process_pending(document);
            let tasks = self.run_deferred(document);
            if batches == 0 && tasks == 0 {
                return rounds;
            }
            rounds += 1;
        }
        tracing::warn!(rounds, "settle gave up with work still pending");
        rounds
    }

    /// Whether records or deferred tasks are waiting.
    #[must_use]
    pub fn has_pending_work(&self, document: &Document) -> bool {
        let records = match self.state {
            ReconcilerState::Observing { observer, .. } => document.has_pending_records(observer),
            ReconcilerState::Stopped => false,
        };
        records || !self.scheduler.is_idle()
    }

    /// Callback failures recorded since the last call.
    pub fn take_failures(&mut self) -> Vec<CallbackFailure> {
        self.diagnostics.take()
    }

    /// Number of callback failures waiting in [`take_failures`](Self::take_failures).
    #[must_use]
    pub fn failure_count(&self) -> usize {
        self.diagnostics.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oil_dom::element;

    struct Noop;
    impl Controller for Noop {}

    const CTRL: &str = "data-oil-controller";

    #[test]
    fn start_twice_is_rejected() {
        let mut doc = Document::new();
        let mut app = Application::launch(ApplicationConfig::default(), &mut doc).unwrap();
        assert!(matches!(app.start(&mut doc), Err(ConfigError::AlreadyStarted)));
        assert!(app.is_started());
    }

    #[test]
    fn invalid_root_leaves_app_stopped() {
        let mut doc = Document::new();
        let text = doc.create_text("x");
        let mut app = Application::new(ApplicationConfig::default().with_root(text));
        assert!(matches!(app.start(&mut doc), Err(ConfigError::InvalidRoot(_))));
        assert!(!app.is_started());
        assert_eq!(app.state(), ReconcilerState::Stopped);
    }

    #[test]
    fn configure_only_while_stopped() {
        let mut doc = Document::new();
        let mut app = Application::new(ApplicationConfig::default());
        app.configure(ApplicationConfig::default().with_controller_attribute("x-ctrl"))
            .unwrap();
        assert_eq!(app.config().controller_attribute, "x-ctrl");
        app.start(&mut doc).unwrap();
        assert!(matches!(
            app.configure(ApplicationConfig::default()),
            Err(ConfigError::AlreadyStarted)
        ));
    }

    #[test]
    fn registration_while_stopped_upgrades_on_start() {
        let mut doc = Document::new();
        let root = doc.document_element();
        let node = doc.build(&element("div").attr(CTRL, "noop"));
        doc.append_child(root, node).unwrap();

        let mut app = Application::new(ApplicationConfig::default());
        app.register(&mut doc, ControllerDefinition::new("noop", || Noop))
            .unwrap();
        assert!(app.controller(node, "noop").is_none());

        app.start(&mut doc).unwrap();
        assert!(app.controller(node, "noop").is_some());
    }

    #[test]
    fn stop_is_a_noop_when_stopped() {
        let mut doc = Document::new();
        let mut app = Application::new(ApplicationConfig::default());
        assert!(!app.stop(&mut doc));
        assert_eq!(app.process_pending(&mut doc), 0);
        assert_eq!(app.settle(&mut doc), 0);
    }

    #[test]
    fn pending_work_tracks_queue_and_scheduler() {
        let mut doc = Document::new();
        let root = doc.document_element();
        let mut app = Application::launch(ApplicationConfig::default(), &mut doc).unwrap();
        app.register(&mut doc, ControllerDefinition::new("noop", || Noop))
            .unwrap();
        assert!(!app.has_pending_work(&doc));

        let node = doc.build(&element("div").attr(CTRL, "noop"));
        doc.append_child(root, node).unwrap();
        assert!(app.has_pending_work(&doc));

        assert_eq!(app.process_pending(&mut doc), 1);
        // Discovery for the new controller is queued for the next turn.
        assert!(app.has_pending_work(&doc));
        assert_eq!(app.run_deferred(&mut doc), 1);
        assert!(!app.has_pending_work(&doc));
    }
}
