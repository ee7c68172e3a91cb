#![forbid(unsafe_code)]

//! Test harness for oil-rig.
//!
//! - [`CallLog`] / [`Event`]: a shared, ordered record of every controller
//!   hook that ran.
//! - [`recorder`], [`faulty`], [`scripted`]: controller definitions that log
//!   into a [`CallLog`], fail on demand, or run a closure on connect.
//! - [`Harness`]: a started [`Application`] over a fresh [`Document`], with
//!   shortcuts for mounting fixtures and driving the loop.
//!
//! ```
//! use oil_dom::element;
//! use oil_harness::{CONTROLLER, Event, Harness, TARGET};
//!
//! let mut h = Harness::new();
//! h.register_recorder("example", &["item"]);
//! let outer = h.mount(
//!     &element("div")
//!         .attr(CONTROLLER, "example")
//!         .child(element("div").attr(TARGET, "example.item")),
//! );
//! h.settle();
//!
//! let inner = h.child(outer, 0);
//! assert_eq!(
//!     h.log.lifecycle(),
//!     vec![
//!         Event::connected("example", outer),
//!         Event::target_connected("example", "item", inner),
//!     ]
//! );
//! ```

use std::cell::RefCell;
use std::rc::Rc;

use oil_core::config::{DEFAULT_CONTROLLER_ATTRIBUTE, DEFAULT_TARGET_ATTRIBUTE};
use oil_core::{
    Application, ApplicationConfig, CallbackError, CallbackResult, ConfigError, Context,
    Controller, ControllerDefinition, DisconnectReason,
};
use oil_dom::{Document, NodeId, NodeSpec};
use serde_json::{Value, json};

pub use proptest;

/// Default controller attribute.
pub const CONTROLLER: &str = DEFAULT_CONTROLLER_ATTRIBUTE;
/// Default target attribute.
pub const TARGET: &str = DEFAULT_TARGET_ATTRIBUTE;

/// Install a `tracing` subscriber writing through the test harness.
///
/// Filtered by `RUST_LOG`; safe to call from every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// ============================================================================
// Call log
// ============================================================================

/// One hook invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Constructed {
        controller: String,
    },
    Initialized {
        controller: String,
        element: NodeId,
    },
    Connected {
        controller: String,
        element: NodeId,
    },
    Disconnected {
        controller: String,
        element: NodeId,
        reason: Option<DisconnectReason>,
    },
    TargetConnected {
        controller: String,
        target: String,
        element: NodeId,
    },
    TargetDisconnected {
        controller: String,
        target: String,
        element: NodeId,
    },
}

impl Event {
    #[must_use]
    pub fn connected(controller: &str, element: NodeId) -> Self {
        Self::Connected {
            controller: controller.to_owned(),
            element,
        }
    }

    /// A disconnect, whatever the reason.
    #[must_use]
    pub fn disconnected(controller: &str, element: NodeId) -> Self {
        Self::Disconnected {
            controller: controller.to_owned(),
            element,
            reason: None,
        }
    }

    #[must_use]
    pub fn target_connected(controller: &str, target: &str, element: NodeId) -> Self {
        Self::TargetConnected {
            controller: controller.to_owned(),
            target: target.to_owned(),
            element,
        }
    }

    #[must_use]
    pub fn target_disconnected(controller: &str, target: &str, element: NodeId) -> Self {
        Self::TargetDisconnected {
            controller: controller.to_owned(),
            target: target.to_owned(),
            element,
        }
    }

    /// Controller name the event belongs to.
    #[must_use]
    pub fn controller(&self) -> &str {
        match self {
            Self::Constructed { controller }
            | Self::Initialized { controller, .. }
            | Self::Connected { controller, .. }
            | Self::Disconnected { controller, .. }
            | Self::TargetConnected { controller, .. }
            | Self::TargetDisconnected { controller, .. } => controller,
        }
    }

    /// The event with its disconnect reason erased, for comparisons built
    /// with [`Event::disconnected`].
    #[must_use]
    fn without_reason(&self) -> Self {
        match self {
            Self::Disconnected {
                controller,
                element,
                ..
            } => Self::disconnected(controller, *element),
            other => other.clone(),
        }
    }

    fn to_json(&self) -> Value {
        match self {
            Self::Constructed { controller } => json!({ "event": "constructed", "controller": controller }),
            Self::Initialized {
                controller,
                element,
            } => json!({ "event": "initialize", "controller": controller, "element": element.to_string() }),
            Self::Connected {
                controller,
                element,
            } => json!({ "event": "connected", "controller": controller, "element": element.to_string() }),
            Self::Disconnected {
                controller,
                element,
                reason,
            } => json!({
                "event": "disconnected",
                "controller": controller,
                "element": element.to_string(),
                "reason": reason.map(|r| format!("{r:?}")),
            }),
            Self::TargetConnected {
                controller,
                target,
                element,
            } => json!({
                "event": format!("{target}TargetConnected"),
                "controller": controller,
                "element": element.to_string(),
            }),
            Self::TargetDisconnected {
                controller,
                target,
                element,
            } => json!({
                "event": format!("{target}TargetDisconnected"),
                "controller": controller,
                "element": element.to_string(),
            }),
        }
    }
}

/// Shared, ordered hook log.
#[derive(Debug, Clone, Default)]
pub struct CallLog(Rc<RefCell<Vec<Event>>>);

impl CallLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `event`, echoing it at `trace` so failing tests can be rerun
    /// with `RUST_LOG=oil_harness=trace`.
    pub fn push(&self, event: Event) {
        tracing::trace!(controller = event.controller(), ?event, "hook recorded");
        self.0.borrow_mut().push(event);
    }

    /// Everything logged so far.
    #[must_use]
    pub fn events(&self) -> Vec<Event> {
        self.0.borrow().clone()
    }

    /// Connect, disconnect and target events only, with disconnect reasons
    /// erased.
    #[must_use]
    pub fn lifecycle(&self) -> Vec<Event> {
        self.0
            .borrow()
            .iter()
            .filter(|e| !matches!(e, Event::Constructed { .. } | Event::Initialized { .. }))
            .map(Event::without_reason)
            .collect()
    }

    /// Drain the log.
    pub fn take(&self) -> Vec<Event> {
        std::mem::take(&mut *self.0.borrow_mut())
    }

    pub fn clear(&self) {
        self.0.borrow_mut().clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    /// Number of events matching `pred`.
    pub fn count(&self, pred: impl Fn(&Event) -> bool) -> usize {
        self.0.borrow().iter().filter(|e| pred(e)).count()
    }

    #[must_use]
    pub fn constructs(&self, controller: &str) -> usize {
        self.count(|e| matches!(e, Event::Constructed { controller: c } if c == controller))
    }

    #[must_use]
    pub fn initializes(&self, controller: &str) -> usize {
        self.count(|e| matches!(e, Event::Initialized { controller: c, .. } if c == controller))
    }

    #[must_use]
    pub fn connects(&self, controller: &str) -> usize {
        self.count(|e| matches!(e, Event::Connected { controller: c, .. } if c == controller))
    }

    #[must_use]
    pub fn disconnects(&self, controller: &str) -> usize {
        self.count(|e| matches!(e, Event::Disconnected { controller: c, .. } if c == controller))
    }

    /// The log as JSON, for readable failure output.
    #[must_use]
    pub fn to_json(&self) -> Value {
        Value::Array(self.0.borrow().iter().map(Event::to_json).collect())
    }
}

// ============================================================================
// Controllers
// ============================================================================

/// Logs every hook.
#[derive(Debug)]
pub struct Recorder {
    log: CallLog,
    /// Targets visible through the accessor table when `connected` ran.
    pub targets_at_connect: usize,
    /// The value attribute as read during `initialize`.
    pub initial_value: Option<String>,
}

impl Controller for Recorder {
    fn initialize(&mut self, cx: &mut Context<'_>) -> CallbackResult {
        self.initial_value = cx.value().map(str::to_owned);
        self.log.push(Event::Initialized {
            controller: cx.controller_name().to_owned(),
            element: cx.element(),
        });
        Ok(())
    }

    fn connected(&mut self, cx: &mut Context<'_>) -> CallbackResult {
        self.targets_at_connect = cx.targets().len();
        self.log.push(Event::connected(cx.controller_name(), cx.element()));
        Ok(())
    }

    fn disconnected(&mut self, cx: &mut Context<'_>) -> CallbackResult {
        self.log.push(Event::Disconnected {
            controller: cx.controller_name().to_owned(),
            element: cx.element(),
            reason: cx.disconnect_reason(),
        });
        Ok(())
    }

    fn target_connected(
        &mut self,
        target: &str,
        element: NodeId,
        cx: &mut Context<'_>,
    ) -> CallbackResult {
        self.log
            .push(Event::target_connected(cx.controller_name(), target, element));
        Ok(())
    }

    fn target_disconnected(
        &mut self,
        target: &str,
        element: NodeId,
        cx: &mut Context<'_>,
    ) -> CallbackResult {
        self.log
            .push(Event::target_disconnected(cx.controller_name(), target, element));
        Ok(())
    }
}

/// A [`Recorder`] definition named `name` declaring `targets`.
pub fn recorder(name: &str, targets: &[&str], log: &CallLog) -> ControllerDefinition {
    let log = log.clone();
    let owned = name.to_owned();
    ControllerDefinition::new(name, move || {
        log.push(Event::Constructed {
            controller: owned.clone(),
        });
        Recorder {
            log: log.clone(),
            targets_at_connect: 0,
            initial_value: None,
        }
    })
    .with_targets(targets.iter().copied())
}

/// Which hook a [`Faulty`] controller breaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hook {
    Initialize,
    Connected,
    Disconnected,
    TargetConnected,
    TargetDisconnected,
}

/// How a [`Faulty`] controller breaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    Error,
    Panic,
}

/// A [`Recorder`] that fails in one hook. The failing hook logs nothing.
#[derive(Debug)]
pub struct Faulty {
    inner: Recorder,
    hook: Hook,
    fault: Fault,
}

impl Faulty {
    fn trip(&self, hook: Hook) -> Option<CallbackResult> {
        if hook != self.hook {
            return None;
        }
        match self.fault {
            Fault::Error => Some(Err(CallbackError::msg(format!("{hook:?} failed")))),
            Fault::Panic => panic!("{hook:?} panicked"),
        }
    }
}

impl Controller for Faulty {
    fn initialize(&mut self, cx: &mut Context<'_>) -> CallbackResult {
        self.trip(Hook::Initialize)
            .unwrap_or_else(|| self.inner.initialize(cx))
    }

    fn connected(&mut self, cx: &mut Context<'_>) -> CallbackResult {
        self.trip(Hook::Connected)
            .unwrap_or_else(|| self.inner.connected(cx))
    }

    fn disconnected(&mut self, cx: &mut Context<'_>) -> CallbackResult {
        self.trip(Hook::Disconnected)
            .unwrap_or_else(|| self.inner.disconnected(cx))
    }

    fn target_connected(
        &mut self,
        target: &str,
        element: NodeId,
        cx: &mut Context<'_>,
    ) -> CallbackResult {
        self.trip(Hook::TargetConnected)
            .unwrap_or_else(|| self.inner.target_connected(target, element, cx))
    }

    fn target_disconnected(
        &mut self,
        target: &str,
        element: NodeId,
        cx: &mut Context<'_>,
    ) -> CallbackResult {
        self.trip(Hook::TargetDisconnected)
            .unwrap_or_else(|| self.inner.target_disconnected(target, element, cx))
    }
}

/// A [`Faulty`] definition.
pub fn faulty(
    name: &str,
    targets: &[&str],
    hook: Hook,
    fault: Fault,
    log: &CallLog,
) -> ControllerDefinition {
    let log = log.clone();
    ControllerDefinition::new(name, move || Faulty {
        inner: Recorder {
            log: log.clone(),
            targets_at_connect: 0,
            initial_value: None,
        },
        hook,
        fault,
    })
    .with_targets(targets.iter().copied())
}

type ConnectScript = Rc<dyn Fn(&mut Context<'_>) -> CallbackResult>;

/// A [`Recorder`] that also runs a closure after logging `connected`.
pub struct Scripted {
    inner: Recorder,
    on_connect: ConnectScript,
}

impl std::fmt::Debug for Scripted {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scripted")
            .field("inner", &self.inner)
            .finish_non_exhaustive()
    }
}

impl Controller for Scripted {
    fn connected(&mut self, cx: &mut Context<'_>) -> CallbackResult {
        self.inner.connected(cx)?;
        (self.on_connect)(cx)
    }

    fn disconnected(&mut self, cx: &mut Context<'_>) -> CallbackResult {
        self.inner.disconnected(cx)
    }

    fn target_connected(
        &mut self,
        target: &str,
        element: NodeId,
        cx: &mut Context<'_>,
    ) -> CallbackResult {
        self.inner.target_connected(target, element, cx)
    }

    fn target_disconnected(
        &mut self,
        target: &str,
        element: NodeId,
        cx: &mut Context<'_>,
    ) -> CallbackResult {
        self.inner.target_disconnected(target, element, cx)
    }
}

/// A [`Scripted`] definition.
pub fn scripted<F>(name: &str, targets: &[&str], log: &CallLog, on_connect: F) -> ControllerDefinition
where
    F: Fn(&mut Context<'_>) -> CallbackResult + 'static,
{
    let log = log.clone();
    let on_connect: ConnectScript = Rc::new(on_connect);
    ControllerDefinition::new(name, move || Scripted {
        inner: Recorder {
            log: log.clone(),
            targets_at_connect: 0,
            initial_value: None,
        },
        on_connect: Rc::clone(&on_connect),
    })
    .with_targets(targets.iter().copied())
}

// ============================================================================
// Harness
// ============================================================================

/// A started application over its own document.
#[derive(Debug)]
pub struct Harness {
    pub doc: Document,
    pub app: Application,
    pub log: CallLog,
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}

impl Harness {
    /// Started with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(ApplicationConfig::default())
    }

    /// Started with `config`.
    ///
    /// # Panics
    ///
    /// If the application refuses to start.
    #[must_use]
    pub fn with_config(config: ApplicationConfig) -> Self {
        let mut doc = Document::new();
        let app = Application::launch(config, &mut doc).expect("harness application starts");
        Self {
            doc,
            app,
            log: CallLog::new(),
        }
    }

    /// Not started; call [`Harness::start`] later.
    #[must_use]
    pub fn stopped(config: ApplicationConfig) -> Self {
        Self {
            doc: Document::new(),
            app: Application::new(config),
            log: CallLog::new(),
        }
    }

    /// # Errors
    ///
    /// As [`Application::start`].
    pub fn start(&mut self) -> Result<(), ConfigError> {
        self.app.start(&mut self.doc)
    }

    pub fn stop(&mut self) -> bool {
        self.app.stop(&mut self.doc)
    }

    /// # Errors
    ///
    /// As [`Application::register`].
    pub fn register(&mut self, definition: ControllerDefinition) -> Result<(), ConfigError> {
        self.app.register(&mut self.doc, definition)
    }

    /// Register a [`Recorder`] logging into this harness's log.
    ///
    /// # Panics
    ///
    /// If the name is already registered.
    pub fn register_recorder(&mut self, name: &str, targets: &[&str]) {
        let definition = recorder(name, targets, &self.log);
        self.register(definition).expect("recorder registers");
    }

    #[must_use]
    pub fn root(&self) -> NodeId {
        self.doc.document_element()
    }

    /// Build `spec` and append it to the document element. Does not drive
    /// the loop.
    ///
    /// # Panics
    ///
    /// Never for a freshly built node.
    pub fn mount(&mut self, spec: &NodeSpec) -> NodeId {
        let root = self.root();
        let node = self.doc.build(spec);
        self.doc.append_child(root, node).expect("append to root");
        node
    }

    /// The `index`-th element child of `parent`.
    ///
    /// # Panics
    ///
    /// If there is no such child.
    #[must_use]
    pub fn child(&self, parent: NodeId, index: usize) -> NodeId {
        self.doc
            .element_children(parent)
            .nth(index)
            .expect("element child exists")
    }

    /// Follow `path` of element-child indices from `node`.
    #[must_use]
    pub fn at(&self, node: NodeId, path: &[usize]) -> NodeId {
        path.iter().fold(node, |current, &index| self.child(current, index))
    }

    /// # Panics
    ///
    /// If `element` is not a live element.
    pub fn set(&mut self, element: NodeId, name: &str, value: &str) {
        self.doc
            .set_attribute(element, name, value)
            .expect("set attribute");
    }

    /// # Panics
    ///
    /// If `element` is not a live element.
    pub fn unset(&mut self, element: NodeId, name: &str) {
        self.doc
            .remove_attribute(element, name)
            .expect("remove attribute");
    }

    /// # Panics
    ///
    /// If `node` is not live.
    pub fn detach(&mut self, node: NodeId) {
        self.doc.remove(node).expect("remove node");
    }

    /// # Panics
    ///
    /// If either node is not live or the move would create a cycle.
    pub fn append(&mut self, parent: NodeId, node: NodeId) {
        self.doc.append_child(parent, node).expect("append node");
    }

    /// Deliver queued records only.
    pub fn flush(&mut self) -> usize {
        self.app.process_pending(&mut self.doc)
    }

    /// Run one deferred turn only.
    pub fn turn(&mut self) -> usize {
        self.app.run_deferred(&mut self.doc)
    }

    /// Drive until idle.
    pub fn settle(&mut self) -> usize {
        self.app.settle(&mut self.doc)
    }

    /// Whether `(element, name)` has a connected controller.
    #[must_use]
    pub fn is_connected(&self, element: NodeId, name: &str) -> bool {
        self.app.controller(element, name).is_some()
    }

    /// Connected targets of the controller on `(element, name)`.
    #[must_use]
    pub fn targets(&self, element: NodeId, name: &str, target: &str) -> Vec<NodeId> {
        self.app
            .controller(element, name)
            .map(|instance| instance.targets().targets(target))
            .unwrap_or_default()
    }
}
