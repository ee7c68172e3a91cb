//! Mutation-observer records and registration options.
//!
//! Observation follows the host semantics the controller engine was designed
//! against: an observer watches one root, optionally its whole subtree, and
//! receives records in mutation order when it asks for them.
//!
//! # Failure Modes
//!
//! | Failure | Cause | Behavior |
//! |---------|-------|----------|
//! | Unknown observer | Handle already disconnected | `take_records` returns empty |
//! | Filtered attribute | Name not in `attribute_filter` | No record queued |
//! | Detached target | Mutation outside the observed subtree | No record queued |

use bitflags::bitflags;

use crate::node::NodeId;

bitflags! {
    /// Which kinds of mutations an observer receives.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ObserveFlags: u8 {
        /// Child insertions and removals.
        const CHILD_LIST = 0b0001;
        /// Attribute changes.
        const ATTRIBUTES = 0b0010;
        /// Watch every descendant of the root, not just the root itself.
        const SUBTREE = 0b0100;
        /// Capture the previous attribute value in attribute records.
        const ATTRIBUTE_OLD_VALUE = 0b1000;
    }
}

/// Options passed to [`Document::observe`](crate::Document::observe).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObserveOptions {
    pub flags: ObserveFlags,
    /// When set, only these attribute names produce records.
    pub attribute_filter: Option<Vec<String>>,
}

impl ObserveOptions {
    /// Options with the given flags and no attribute filter.
    #[must_use]
    pub fn new(flags: ObserveFlags) -> Self {
        Self {
            flags,
            attribute_filter: None,
        }
    }

    /// Restrict attribute records to `names`.
    #[must_use]
    pub fn with_attribute_filter<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attribute_filter = Some(names.into_iter().map(Into::into).collect());
        self
    }

    pub(crate) fn wants_attribute(&self, name: &str) -> bool {
        self.flags.contains(ObserveFlags::ATTRIBUTES)
            && self
                .attribute_filter
                .as_ref()
                .is_none_or(|filter| filter.iter().any(|n| n == name))
    }
}

/// Handle to a registered observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(pub(crate) u32);

impl ObserverId {
    /// Raw id value.
    #[inline]
    pub const fn id(self) -> u32 {
        self.0
    }
}

/// A single observed change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationRecord {
    /// Children were inserted into or removed from `target`.
    ChildList {
        target: NodeId,
        added: Vec<NodeId>,
        removed: Vec<NodeId>,
    },
    /// Attribute `name` on `target` changed. `old_value` is only captured when
    /// the observer asked for [`ObserveFlags::ATTRIBUTE_OLD_VALUE`].
    Attributes {
        target: NodeId,
        name: String,
        old_value: Option<String>,
    },
}

impl MutationRecord {
    /// The node the mutation happened on.
    #[must_use]
    pub fn target(&self) -> NodeId {
        match self {
            Self::ChildList { target, .. } | Self::Attributes { target, .. } => *target,
        }
    }
}

#[derive(Debug)]
pub(crate) struct Observer {
    pub(crate) id: ObserverId,
    pub(crate) root: NodeId,
    pub(crate) options: ObserveOptions,
    pub(crate) queue: Vec<MutationRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_restricts_attribute_names() {
        let opts = ObserveOptions::new(ObserveFlags::ATTRIBUTES)
            .with_attribute_filter(["data-oil-controller"]);
        assert!(opts.wants_attribute("data-oil-controller"));
        assert!(!opts.wants_attribute("class"));
    }

    #[test]
    fn no_filter_accepts_everything() {
        let opts = ObserveOptions::new(ObserveFlags::ATTRIBUTES);
        assert!(opts.wants_attribute("class"));
    }

    #[test]
    fn attributes_flag_required() {
        let opts = ObserveOptions::new(ObserveFlags::CHILD_LIST);
        assert!(!opts.wants_attribute("class"));
    }
}
