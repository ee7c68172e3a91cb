//! Isolated callback invocation.
//!
//! Every controller hook runs through [`invoke`]. A hook that returns an error
//! or panics is turned into a [`CallbackFailure`] and recorded; the caller
//! carries on with the rest of the batch.

use std::panic::{self, AssertUnwindSafe};

use oil_dom::{Document, NodeId};

use crate::config::ApplicationConfig;
use crate::controller::{Context, Controller};
use crate::error::{CallbackError, CallbackFailure, CallbackKind, CallbackResult, Diagnostics};
use crate::scheduler::Scheduler;
use crate::store::{ControllerInstance, DisconnectReason};

/// Everything reconciliation touches besides the instance and binding state.
pub(crate) struct LifecycleEnv<'a> {
    pub(crate) document: &'a mut Document,
    pub(crate) config: &'a ApplicationConfig,
    pub(crate) root: NodeId,
    pub(crate) scheduler: &'a mut Scheduler,
    pub(crate) diagnostics: &'a mut Diagnostics,
}

/// Run one hook of `instance`. Returns `false` if it failed.
pub(crate) fn invoke<F>(
    env: &mut LifecycleEnv<'_>,
    instance: &mut ControllerInstance,
    kind: CallbackKind,
    reason: Option<DisconnectReason>,
    call: F,
) -> bool
where
    F: FnOnce(&mut dyn Controller, &mut Context<'_>) -> CallbackResult,
{
    let ControllerInstance {
        element,
        controller_type,
        controller,
        bindings,
        ..
    } = instance;
    let mut cx = Context {
        element: *element,
        controller_type: controller_type.as_ref(),
        bindings: bindings.as_slice(),
        document: &mut *env.document,
        config: env.config,
        reason,
    };
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| call(controller.as_mut(), &mut cx)));
    let error = match outcome {
        Ok(Ok(())) => return true,
        Ok(Err(error)) => error,
        Err(payload) => CallbackError::from_panic(payload),
    };
    env.diagnostics.record(CallbackFailure {
        controller: controller_type.name().to_owned(),
        element: *element,
        callback: kind,
        error,
    });
    false
}
