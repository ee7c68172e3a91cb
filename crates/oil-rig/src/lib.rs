#![forbid(unsafe_code)]

//! oil-rig public facade.
//!
//! Re-exports the host tree ([`dom`]) and the controller runtime ([`engine`])
//! under one crate, plus a [`prelude`] for applications.
//!
//! ```
//! use oil_rig::prelude::*;
//!
//! let mut doc = Document::new();
//! let mut app = Application::launch(ApplicationConfig::default(), &mut doc)?;
//! app.settle(&mut doc);
//! assert!(app.is_started());
//! # Ok::<(), ConfigError>(())
//! ```

pub use oil_core as engine;
pub use oil_dom as dom;

pub use oil_core::{
    AccessorKind, AccessorValue, Application, ApplicationConfig, CallbackError, CallbackFailure,
    CallbackKind, CallbackResult, ConfigError, Context, Controller, ControllerDefinition,
    ControllerInstance, ControllerType, DisconnectReason, InstanceId, ReconcilerState, Registry,
    RoundTripPolicy, TargetBinding, TargetDescriptor, TargetSchema, TargetView,
};
pub use oil_dom::{Document, DomError, NodeId};

/// Everything an application needs to define controllers and drive them.
pub mod prelude {
    pub use oil_core::{
        AccessorValue, Application, ApplicationConfig, CallbackError, CallbackResult,
        ConfigError, Context, Controller, ControllerDefinition, DisconnectReason, RoundTripPolicy,
        TargetView,
    };
    pub use oil_dom::{Document, NodeId, NodeSpec, element, text};
}
