//! Controller definitions and the name -> type registry.
//!
//! A [`ControllerDefinition`] is a plain record: a name, the target names it
//! declares, and a factory. Registration turns it into a [`ControllerType`],
//! building the [`TargetSchema`] once, and stores it under its name.
//!
//! # Failure Modes
//!
//! | Failure | Cause | Behavior |
//! |---------|-------|----------|
//! | No name | Definition and call both unnamed | [`ConfigError::MissingControllerName`] |
//! | Bad name | Whitespace in name | [`ConfigError::InvalidName`] |
//! | Duplicate | Name already registered | [`ConfigError::DuplicateRegistration`]; first wins |

use core::fmt;
use std::rc::Rc;

use ahash::AHashMap;

use crate::config::validate_name;
use crate::controller::Controller;
use crate::error::ConfigError;
use crate::schema::TargetSchema;

/// Builds a fresh controller. Called with no element; the element is only
/// visible to callbacks through their context.
pub type ControllerFactory = Rc<dyn Fn() -> Box<dyn Controller>>;

/// Description of a controller type, before registration.
#[derive(Clone)]
pub struct ControllerDefinition {
    name: Option<String>,
    targets: Vec<String>,
    factory: ControllerFactory,
}

impl fmt::Debug for ControllerDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControllerDefinition")
            .field("name", &self.name)
            .field("targets", &self.targets)
            .finish_non_exhaustive()
    }
}

impl ControllerDefinition {
    /// A named definition.
    pub fn new<C, F>(name: impl Into<String>, factory: F) -> Self
    where
        C: Controller,
        F: Fn() -> C + 'static,
    {
        let mut definition = Self::unnamed(factory);
        definition.name = Some(name.into());
        definition
    }

    /// A definition whose name is supplied at registration.
    pub fn unnamed<C, F>(factory: F) -> Self
    where
        C: Controller,
        F: Fn() -> C + 'static,
    {
        Self {
            name: None,
            targets: Vec::new(),
            factory: Rc::new(move || Box::new(factory()) as Box<dyn Controller>),
        }
    }

    /// Declare target names, in order.
    #[must_use]
    pub fn with_targets<I, S>(mut self, targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.targets = targets.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    #[must_use]
    pub fn targets(&self) -> &[String] {
        &self.targets
    }
}

/// A registered controller type.
pub struct ControllerType {
    name: Rc<str>,
    schema: TargetSchema,
    factory: ControllerFactory,
}

impl fmt::Debug for ControllerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControllerType")
            .field("name", &self.name)
            .field("schema", &self.schema)
            .finish_non_exhaustive()
    }
}

impl ControllerType {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn schema(&self) -> &TargetSchema {
        &self.schema
    }

    pub(crate) fn instantiate(&self) -> Box<dyn Controller> {
        (self.factory)()
    }
}

/// Name -> controller type mapping.
#[derive(Debug, Default)]
pub struct Registry {
    types: AHashMap<Rc<str>, Rc<ControllerType>>,
    order: Vec<Rc<str>>,
}

impl Registry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `definition`.
    ///
    /// The definition's own name wins over `name_override`.
    ///
    /// # Errors
    ///
    /// See the module-level failure table. Nothing is stored on error.
    pub fn register(
        &mut self,
        definition: ControllerDefinition,
        name_override: Option<&str>,
    ) -> Result<Rc<ControllerType>, ConfigError> {
        let name = definition
            .name
            .as_deref()
            .filter(|n| !n.is_empty())
            .or(name_override.filter(|n| !n.is_empty()))
            .ok_or(ConfigError::MissingControllerName)?;
        validate_name(name)?;
        if self.types.contains_key(name) {
            return Err(ConfigError::DuplicateRegistration(name.to_owned()));
        }

        let name: Rc<str> = Rc::from(name);
        let controller_type = Rc::new(ControllerType {
            name: Rc::clone(&name),
            schema: TargetSchema::new(definition.targets.iter().map(String::as_str)),
            factory: definition.factory,
        });
        self.types.insert(Rc::clone(&name), Rc::clone(&controller_type));
        self.order.push(name);
        Ok(controller_type)
    }

    /// The type registered under `name`.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<&Rc<ControllerType>> {
        self.types.get(name)
    }

    /// Whether `name` is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    /// Registered names in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(|n| &**n)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
