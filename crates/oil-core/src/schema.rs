//! Target accessor tables.
//!
//! Every declared target name `item` exposes three read accessors and two
//! callback names:
//!
//! | Accessor | Kind | Value |
//! |----------|------|-------|
//! | `itemTarget` | [`AccessorKind::First`] | first connected target, if any |
//! | `itemTargets` | [`AccessorKind::All`] | every connected target |
//! | `hasItemTarget` | [`AccessorKind::Presence`] | whether any target is connected |
//! | `itemTargetConnected` | callback | fired on bind |
//! | `itemTargetDisconnected` | callback | fired on release |
//!
//! The table is built once per controller type at registration. Instances
//! resolve accessors by lookup, never by generating anything per instance.

use ahash::AHashMap;

/// What an accessor returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessorKind {
    First,
    All,
    Presence,
}

/// Derived names for one declared target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetDescriptor {
    pub name: String,
    pub first_accessor: String,
    pub all_accessor: String,
    pub presence_accessor: String,
    pub connected_callback: String,
    pub disconnected_callback: String,
}

impl TargetDescriptor {
    fn new(name: &str) -> Self {
        let capitalized = capitalize(name);
        Self {
            name: name.to_owned(),
            first_accessor: format!("{name}Target"),
            all_accessor: format!("{name}Targets"),
            presence_accessor: format!("has{capitalized}Target"),
            connected_callback: format!("{name}TargetConnected"),
            disconnected_callback: format!("{name}TargetDisconnected"),
        }
    }
}

/// Per-controller-type accessor table.
#[derive(Debug, Clone, Default)]
pub struct TargetSchema {
    targets: Vec<TargetDescriptor>,
    accessors: AHashMap<String, (usize, AccessorKind)>,
}

impl TargetSchema {
    /// Build the table for `names`. Duplicates and empty names are dropped;
    /// declaration order is kept.
    pub fn new<'a>(names: impl IntoIterator<Item = &'a str>) -> Self {
        let mut schema = Self::default();
        for name in names {
            if name.is_empty() || schema.position(name).is_some() {
                continue;
            }
            let index = schema.targets.len();
            let descriptor = TargetDescriptor::new(name);
            schema
                .accessors
                .insert(descriptor.first_accessor.clone(), (index, AccessorKind::First));
            schema
                .accessors
                .insert(descriptor.all_accessor.clone(), (index, AccessorKind::All));
            schema.accessors.insert(
                descriptor.presence_accessor.clone(),
                (index, AccessorKind::Presence),
            );
            schema.targets.push(descriptor);
        }
        schema
    }

    /// Declared targets in declaration order.
    #[must_use]
    pub fn targets(&self) -> &[TargetDescriptor] {
        &self.targets
    }

    /// Declaration index of target `name`.
    #[must_use]
    pub fn position(&self, name: &str) -> Option<usize> {
        self.targets.iter().position(|t| t.name == name)
    }

    /// Whether target `name` is declared.
    #[must_use]
    pub fn declares(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Descriptor for target `name`.
    #[must_use]
    pub fn descriptor(&self, name: &str) -> Option<&TargetDescriptor> {
        self.targets.iter().find(|t| t.name == name)
    }

    /// Resolve an accessor name such as `hasItemTarget`.
    #[must_use]
    pub fn resolve(&self, accessor: &str) -> Option<(&TargetDescriptor, AccessorKind)> {
        let &(index, kind) = self.accessors.get(accessor)?;
        Some((&self.targets[index], kind))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
