//! Application configuration.
//!
//! ```
//! use oil_core::ApplicationConfig;
//!
//! let config = ApplicationConfig::default()
//!     .with_controller_attribute("data-controller")
//!     .with_target_attribute("data-target");
//! assert!(config.validate().is_ok());
//! assert_eq!(config.value_attribute("gallery"), "data-oil-gallery-value");
//! ```
//!
//! With the `config-file` feature the attribute settings can be loaded from
//! TOML; the root is always supplied in code since node handles are not
//! serialisable.

use oil_dom::NodeId;

use crate::error::ConfigError;

/// Default controller attribute.
pub const DEFAULT_CONTROLLER_ATTRIBUTE: &str = "data-oil-controller";
/// Default target attribute.
pub const DEFAULT_TARGET_ATTRIBUTE: &str = "data-oil-target";
/// Default prefix for per-controller value attributes.
pub const DEFAULT_VALUE_ATTRIBUTE_PREFIX: &str = "data-oil-";
/// Default bound on batches delivered by a single flush.
pub const DEFAULT_MAX_BATCHES_PER_FLUSH: usize = 1024;

/// How attribute records whose value changed and changed back inside one
/// batch are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "config-file", derive(serde::Deserialize))]
#[cfg_attr(feature = "config-file", serde(rename_all = "kebab-case"))]
pub enum RoundTripPolicy {
    /// Reconcile every record against the settled attribute value. A value
    /// that ends where it started produces no callbacks.
    #[default]
    Suppress,
    /// Replay every intermediate value, so `a -> b -> a` disconnects and
    /// reconnects `a`.
    Fire,
}

/// Settings supplied at start.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "config-file", derive(serde::Deserialize))]
#[cfg_attr(feature = "config-file", serde(default, rename_all = "kebab-case"))]
pub struct ApplicationConfig {
    /// Observed root. `None` means the document element.
    #[cfg_attr(feature = "config-file", serde(skip))]
    pub root: Option<NodeId>,
    pub controller_attribute: String,
    pub target_attribute: String,
    pub value_attribute_prefix: String,
    pub round_trip: RoundTripPolicy,
    pub max_batches_per_flush: usize,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            root: None,
            controller_attribute: DEFAULT_CONTROLLER_ATTRIBUTE.to_owned(),
            target_attribute: DEFAULT_TARGET_ATTRIBUTE.to_owned(),
            value_attribute_prefix: DEFAULT_VALUE_ATTRIBUTE_PREFIX.to_owned(),
            round_trip: RoundTripPolicy::default(),
            max_batches_per_flush: DEFAULT_MAX_BATCHES_PER_FLUSH,
        }
    }
}

impl ApplicationConfig {
    #[must_use]
    pub fn with_root(mut self, root: NodeId) -> Self {
        self.root = Some(root);
        self
    }

    #[must_use]
    pub fn with_controller_attribute(mut self, name: impl Into<String>) -> Self {
        self.controller_attribute = name.into();
        self
    }

    #[must_use]
    pub fn with_target_attribute(mut self, name: impl Into<String>) -> Self {
        self.target_attribute = name.into();
        self
    }

    #[must_use]
    pub fn with_value_attribute_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.value_attribute_prefix = prefix.into();
        self
    }

    #[must_use]
    pub fn with_round_trip(mut self, policy: RoundTripPolicy) -> Self {
        self.round_trip = policy;
        self
    }

    #[must_use]
    pub fn with_max_batches_per_flush(mut self, max: usize) -> Self {
        self.max_batches_per_flush = max.max(1);
        self
    }

    /// Name of the value attribute read by controller `controller_name`.
    #[must_use]
    pub fn value_attribute(&self, controller_name: &str) -> String {
        format!("{}{controller_name}-value", self.value_attribute_prefix)
    }

    /// Check attribute names.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::InvalidName`] for an empty or whitespace-bearing name.
    /// - [`ConfigError::ConflictingAttributes`] when both attributes are equal.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for name in [&self.controller_attribute, &self.target_attribute] {
            validate_name(name)?;
        }
        if self.controller_attribute == self.target_attribute {
            return Err(ConfigError::ConflictingAttributes(
                self.controller_attribute.clone(),
            ));
        }
        Ok(())
    }

    /// Parse a TOML document. Missing keys keep their defaults.
    ///
    /// ```toml
    /// controller-attribute = "data-controller"
    /// target-attribute = "data-target"
    /// round-trip = "fire"
    /// ```
    ///
    /// # Errors
    ///
    /// [`ConfigError::Parse`] on malformed TOML, or any [`validate`](Self::validate) error.
    #[cfg(feature = "config-file")]
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }
}

pub(crate) fn validate_name(name: &str) -> Result<(), ConfigError> {
    if name.is_empty() || name.chars().any(char::is_whitespace) {
        return Err(ConfigError::InvalidName(name.to_owned()));
    }
    Ok(())
}
