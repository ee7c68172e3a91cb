//! Error taxonomy.
//!
//! | Class | Type | Behavior |
//! |-------|------|----------|
//! | Configuration | [`ConfigError`] | Returned and logged; the operation is a no-op |
//! | Lookup miss | none | Ignored (traced); attributes may precede registration |
//! | Callback failure | [`CallbackError`] | Isolated per callback, logged, kept in [`CallbackFailure`]s |

use core::fmt;
use std::any::Any;

use oil_dom::NodeId;

/// Operator-facing configuration mistakes.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configured root is not a live element of the document.
    #[error("root {0} is not an element of the document")]
    InvalidRoot(NodeId),
    /// A controller with this name is already registered.
    #[error("controller `{0}` is already registered")]
    DuplicateRegistration(String),
    /// Neither the definition nor the registration call supplied a name.
    #[error("controller definition has no name")]
    MissingControllerName,
    /// A controller name or attribute name is empty or contains whitespace.
    #[error("invalid name `{0}`")]
    InvalidName(String),
    /// The controller and target attributes must be different attributes.
    #[error("controller and target attributes are both `{0}`")]
    ConflictingAttributes(String),
    /// `start` was called while already observing.
    #[error("application is already started")]
    AlreadyStarted,
    /// The configuration file could not be parsed.
    #[cfg(feature = "config-file")]
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Failure reported by a controller callback.
#[derive(Debug, thiserror::Error)]
pub enum CallbackError {
    /// The callback reported a failure.
    #[error("{0}")]
    Failed(String),
    /// The callback panicked; the panic was contained.
    #[error("callback panicked: {0}")]
    Panicked(String),
    /// The callback returned an arbitrary error.
    #[error(transparent)]
    Other(Box<dyn std::error::Error + 'static>),
}

impl CallbackError {
    /// Build a [`CallbackError::Failed`] from a message.
    pub fn msg(message: impl fmt::Display) -> Self {
        Self::Failed(message.to_string())
    }

    pub(crate) fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| (*s).to_owned())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string panic payload".to_owned());
        Self::Panicked(message)
    }
}

impl From<oil_dom::DomError> for CallbackError {
    fn from(error: oil_dom::DomError) -> Self {
        Self::Other(Box::new(error))
    }
}

/// Result type of every controller callback.
pub type CallbackResult = Result<(), CallbackError>;

/// Which callback failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackKind {
    /// The definition's factory.
    Construct,
    Initialize,
    Connect,
    Disconnect,
    TargetConnected(String),
    TargetDisconnected(String),
}

impl fmt::Display for CallbackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Construct => f.write_str("constructor"),
            Self::Initialize => f.write_str("initialize"),
            Self::Connect => f.write_str("connected"),
            Self::Disconnect => f.write_str("disconnected"),
            Self::TargetConnected(t) => write!(f, "{t}TargetConnected"),
            Self::TargetDisconnected(t) => write!(f, "{t}TargetDisconnected"),
        }
    }
}

/// A contained callback failure, kept for the operator.
#[derive(Debug)]
pub struct CallbackFailure {
    pub controller: String,
    pub element: NodeId,
    pub callback: CallbackKind,
    pub error: CallbackError,
}

impl fmt::Display for CallbackFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}#{} on {}: {}",
            self.controller, self.callback, self.element, self.error
        )
    }
}

/// Collected callback failures.
#[derive(Debug, Default)]
pub(crate) struct Diagnostics {
    failures: Vec<CallbackFailure>,
}

impl Diagnostics {
    pub(crate) fn record(&mut self, failure: CallbackFailure) {
        tracing::error!(
            controller = %failure.controller,
            element = %failure.element,
            callback = %failure.callback,
            error = %failure.error,
            "controller callback failed"
        );
        self.failures.push(failure);
    }

    pub(crate) fn take(&mut self) -> Vec<CallbackFailure> {
        std::mem::take(&mut self.failures)
    }

    pub(crate) fn len(&self) -> usize {
        self.failures.len()
    }
}
