//! Cancellable deferred work keyed on simulation time.
//!
//! Tasks run in the pre-tick phase of the first step whose clock reaches
//! their due time, in `(due, submission)` order. Cancelling a handle that
//! already ran or was cancelled is a no-op.

use std::collections::BTreeMap;

use crate::fixed::Millis;
use crate::id::TaskId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeferredTask {
    /// Start the next order.
    GenerateOrder,
}

#[derive(Debug, Default)]
pub struct Scheduler {
    queue: BTreeMap<(Millis, TaskId), DeferredTask>,
    next_id: u64,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, due: Millis, task: DeferredTask) -> TaskId {
        let id = TaskId(self.next_id);
        self.next_id += 1;
        self.queue.insert((due, id), task);
        id
    }

    /// Returns whether a pending task was removed.
    pub fn cancel(&mut self, id: TaskId) -> bool {
        let before = self.queue.len();
        self.queue.retain(|(_, task_id), _| *task_id != id);
        self.queue.len() != before
    }

    pub fn cancel_all(&mut self) -> usize {
        let n = self.queue.len();
        self.queue.clear();
        n
    }

    /// Remove and return every task due at or before `now`.
    pub fn take_due(&mut self, now: Millis) -> Vec<(TaskId, DeferredTask)> {
        let mut due = Vec::new();
        while let Some(entry) = self.queue.first_entry() {
            if entry.key().0 > now {
                break;
            }
            let ((_, id), task) = entry.remove_entry();
            due.push((id, task));
        }
        due
    }

    pub fn is_pending(&self, id: TaskId) -> bool {
        self.queue.keys().any(|(_, task_id)| *task_id == id)
    }

    pub fn next_due(&self) -> Option<Millis> {
        self.queue.keys().next().map(|(due, _)| *due)
    }

    pub fn pending_count(&self) -> usize {
        self.queue.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tasks_run_in_due_order() {
        let mut s = Scheduler::new();
        let late = s.schedule(2000, DeferredTask::GenerateOrder);
        let early = s.schedule(1500, DeferredTask::GenerateOrder);
        assert_eq!(s.next_due(), Some(1500));
        assert!(s.take_due(1499).is_empty());
        let due = s.take_due(5000);
        let ids: Vec<TaskId> = due.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec![early, late]);
        assert_eq!(s.pending_count(), 0);
    }

    #[test]
    fn same_due_time_keeps_submission_order() {
        let mut s = Scheduler::new();
        let a = s.schedule(100, DeferredTask::GenerateOrder);
        let b = s.schedule(100, DeferredTask::GenerateOrder);
        let ids: Vec<TaskId> = s.take_due(100).into_iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec![a, b]);
    }

    #[test]
    fn cancelled_task_never_runs() {
        let mut s = Scheduler::new();
        let id = s.schedule(100, DeferredTask::GenerateOrder);
        assert!(s.is_pending(id));
        assert!(s.cancel(id));
        assert!(!s.cancel(id));
        assert!(s.take_due(1000).is_empty());
    }

    #[test]
    fn cancel_all_empties_queue() {
        let mut s = Scheduler::new();
        s.schedule(1, DeferredTask::GenerateOrder);
        s.schedule(2, DeferredTask::GenerateOrder);
        assert_eq!(s.cancel_all(), 2);
        assert_eq!(s.next_due(), None);
    }
}
