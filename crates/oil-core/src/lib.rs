#![forbid(unsafe_code)]

//! Attribute-driven controller lifecycle for oil-rig.
//!
//! Elements declare controllers with `data-oil-controller="name other"` and
//! targets with `data-oil-target="name.item"`. An [`Application`] observes a
//! root element and keeps one [`ControllerInstance`] per (element, name) in
//! step with those attributes, and each instance's target bindings in step
//! with scope, as the tree mutates.
//!
//! # Layers
//!
//! | Module | Role |
//! |--------|------|
//! | [`codec`] | Parse attribute values into names and (controller, target) pairs |
//! | [`scope`] | Find the controller element owning a target |
//! | [`registry`], [`schema`] | Controller definitions and their accessor tables |
//! | [`store`] | One instance per (element, name); connect and disconnect |
//! | [`targets`] | Per-instance target bindings |
//! | [`scheduler`] | Next-turn target discovery |
//! | `reconciler` | Mutation batches in, callbacks out |
//! | [`application`] | Registration, observation and the drive loop |
//!
//! # Invariants
//!
//! 1. At most one instance per (element, name), reused across reconnects.
//! 2. At most one binding per (instance, element, target name).
//! 3. Every connect hook is paired with at most one disconnect hook before
//!    the next connect, and vice versa.
//! 4. An instance's targets are released before its own `disconnected` runs.
//! 5. A target binds only to the nearest enclosing controller of its name.
//! 6. Callback failures never abort a batch.

pub mod application;
pub mod codec;
pub mod config;
pub mod controller;
pub mod error;
mod lifecycle;
mod reconciler;
pub mod registry;
pub mod schema;
pub mod scheduler;
pub mod scope;
pub mod store;
pub mod targets;

pub use application::Application;
pub use config::{ApplicationConfig, RoundTripPolicy};
pub use controller::{AccessorValue, Context, Controller, TargetView};
pub use error::{CallbackError, CallbackFailure, CallbackKind, CallbackResult, ConfigError};
pub use reconciler::ReconcilerState;
pub use registry::{ControllerDefinition, ControllerType, Registry};
pub use schema::{AccessorKind, TargetDescriptor, TargetSchema};
pub use store::{ControllerInstance, DisconnectReason, InstanceId};
pub use targets::TargetBinding;
