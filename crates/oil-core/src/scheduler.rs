//! One-shot deferred tasks run on the next cooperative turn.
//!
//! Target discovery for a freshly connected controller is not run inside the
//! batch that connected it. It is queued here and runs when the host calls
//! [`Application::run_deferred`](crate::Application::run_deferred), so connect
//! callbacks see their element before any target callback fires and discovery
//! sees a tree without same-turn edits still queued.
//!
//! # Invariants
//!
//! 1. At most one pending task per instance.
//! 2. Tasks scheduled during a turn run on the following turn.
//! 3. Disconnecting an instance cancels its pending task.

use std::collections::VecDeque;

use crate::store::InstanceId;

/// Work deferred to the next turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeferredTask {
    /// Bind every scoped target of the instance.
    DiscoverTargets(InstanceId),
}

impl DeferredTask {
    fn instance(self) -> InstanceId {
        match self {
            Self::DiscoverTargets(id) => id,
        }
    }
}

/// FIFO of deferred tasks.
#[derive(Debug, Default)]
pub struct Scheduler {
    queue: VecDeque<DeferredTask>,
}

impl Scheduler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `task`. Returns `false` if an identical task is already pending.
    pub fn schedule(&mut self, task: DeferredTask) -> bool {
        if self.queue.contains(&task) {
            return false;
        }
        self.queue.push_back(task);
        true
    }

    /// Drop every pending task for `instance`. Returns how many were dropped.
    pub fn cancel(&mut self, instance: InstanceId) -> usize {
        let before = self.queue.len();
        self.queue.retain(|task| task.instance() != instance);
        before - self.queue.len()
    }

    /// Take everything pending for this turn.
    pub fn take_turn(&mut self) -> Vec<DeferredTask> {
        self.queue.drain(..).collect()
    }

    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.queue.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(index: u32) -> InstanceId {
        InstanceId::new(index, 0)
    }

    #[test]
    fn dedupes_per_instance() {
        let mut s = Scheduler::new();
        assert!(s.schedule(DeferredTask::DiscoverTargets(id(1))));
        assert!(!s.schedule(DeferredTask::DiscoverTargets(id(1))));
        assert!(s.schedule(DeferredTask::DiscoverTargets(id(2))));
        assert_eq!(s.len(), 2);
    }

    #[test]
    fn cancel_removes_only_that_instance() {
        let mut s = Scheduler::new();
        s.schedule(DeferredTask::DiscoverTargets(id(1)));
        s.schedule(DeferredTask::DiscoverTargets(id(2)));
        assert_eq!(s.cancel(id(1)), 1);
        assert_eq!(s.cancel(id(1)), 0);
        assert_eq!(s.take_turn(), vec![DeferredTask::DiscoverTargets(id(2))]);
        assert!(s.is_idle());
    }

    #[test]
    fn turn_preserves_fifo_order() {
        let mut s = Scheduler::new();
        for i in [3, 1, 2] {
            s.schedule(DeferredTask::DiscoverTargets(id(i)));
        }
        let order: Vec<_> = s.take_turn().into_iter().map(DeferredTask::instance).collect();
        assert_eq!(order, vec![id(3), id(1), id(2)]);
    }
}
