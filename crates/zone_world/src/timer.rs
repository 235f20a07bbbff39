//! Ordered task queue driving all time-based subsystem work.
//!
//! Tasks are keyed by `(due, TaskId)` in a `BTreeMap`, so popping due work is
//! a prefix scan and cancellation is a map-entry removal. Repeating tasks
//! keep their [`TaskId`] across re-enqueues, so a handle stored at schedule
//! time stays valid for cancellation no matter how often the task has fired.

use std::collections::{BTreeMap, HashMap};

/// Stable handle to a scheduled task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId(u64);

#[derive(Debug)]
struct Entry<K> {
    kind: K,
    period: Option<u64>,
}

/// Generic timer queue. `K` is the task-kind payload handed back on expiry.
#[derive(Debug)]
pub struct Scheduler<K> {
    queue: BTreeMap<(u64, TaskId), Entry<K>>,
    due_by_task: HashMap<TaskId, u64>,
    next_id: u64,
}

impl<K> Scheduler<K> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            queue: BTreeMap::new(),
            due_by_task: HashMap::new(),
            next_id: 1,
        }
    }

    fn alloc_id(&mut self) -> TaskId {
        let id = TaskId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Schedule a one-shot task at the given absolute time.
    pub fn schedule(&mut self, kind: K, due: u64) -> TaskId {
        let id = self.alloc_id();
        self.queue.insert((due, id), Entry { kind, period: None });
        self.due_by_task.insert(id, due);
        id
    }

    /// Schedule a task that re-fires every `period` after its first due time.
    pub fn schedule_repeating(&mut self, kind: K, first_due: u64, period: u64) -> TaskId {
        let id = self.alloc_id();
        self.queue.insert(
            (first_due, id),
            Entry {
                kind,
                period: Some(period),
            },
        );
        self.due_by_task.insert(id, first_due);
        id
    }

    /// Cancel a task. Returns whether it was still pending.
    pub fn cancel(&mut self, task: TaskId) -> bool {
        match self.due_by_task.remove(&task) {
            Some(due) => self.queue.remove(&(due, task)).is_some(),
            None => false,
        }
    }

    /// Number of pending tasks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

impl<K: Clone> Scheduler<K> {
    /// Pop every task due at or before `now`, in due order. Repeating tasks
    /// are re-enqueued at `now + period` before being returned.
    pub fn pop_due(&mut self, now: u64) -> Vec<(TaskId, K)> {
        let mut fired = Vec::new();
        loop {
            let key = match self.queue.keys().next() {
                Some(&(due, id)) if due <= now => (due, id),
                _ => break,
            };
            let entry = self.queue.remove(&key).expect("key observed above");
            let (_, id) = key;
            self.due_by_task.remove(&id);
            if let Some(period) = entry.period {
                let next = now + period;
                self.queue.insert(
                    (next, id),
                    Entry {
                        kind: entry.kind.clone(),
                        period: Some(period),
                    },
                );
                self.due_by_task.insert(id, next);
            }
            fired.push((id, entry.kind));
        }
        fired
    }
}

impl<K> Default for Scheduler<K> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pop_due_in_order() {
        let mut s = Scheduler::new();
        s.schedule("late", 200);
        s.schedule("early", 100);
        let fired: Vec<_> = s.pop_due(150).into_iter().map(|(_, k)| k).collect();
        assert_eq!(fired, vec!["early"]);
        let fired: Vec<_> = s.pop_due(250).into_iter().map(|(_, k)| k).collect();
        assert_eq!(fired, vec!["late"]);
        assert!(s.is_empty());
    }

    #[test]
    fn test_cancel_pending() {
        let mut s = Scheduler::new();
        let id = s.schedule("task", 100);
        assert!(s.cancel(id));
        assert!(!s.cancel(id));
        assert!(s.pop_due(1000).is_empty());
    }

    #[test]
    fn test_repeating_keeps_task_id() {
        let mut s = Scheduler::new();
        let id = s.schedule_repeating("pulse", 100, 50);
        let fired = s.pop_due(100);
        assert_eq!(fired, vec![(id, "pulse")]);
        // Still pending under the same id, so a stored handle can cancel it.
        assert!(s.cancel(id));
        assert!(s.pop_due(10_000).is_empty());
    }

    #[test]
    fn test_repeating_reschedules_from_pop_time() {
        let mut s = Scheduler::new();
        s.schedule_repeating("pulse", 100, 50);
        assert_eq!(s.pop_due(120).len(), 1);
        // Next due is 170, not 150.
        assert!(s.pop_due(160).is_empty());
        assert_eq!(s.pop_due(170).len(), 1);
    }
}
