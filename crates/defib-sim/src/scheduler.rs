//! Cancellable timer tasks on the virtual clock.
//!
//! Every delayed or periodic side effect (charge ramp, button pulses,
//! synchronized shock, scenario timeouts, delayed patches) goes through a
//! [`Scheduler`]. Each schedule call hands back a [`TaskHandle`]; the owner
//! keeps it and cancels it on teardown.
//!
//! Tasks are plain values, not closures. The owner pops due tasks and
//! dispatches them itself, so a task body always runs with full access to the
//! owner's state and can re-check its guards.

use std::collections::{BTreeMap, HashMap};

/// Identifies one scheduled task (periodic tasks keep their handle across
/// firings).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskHandle(u64);

impl TaskHandle {
    /// Raw handle value
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }
}

/// A task popped from the queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fired<T> {
    /// Handle the task was scheduled under
    pub handle: TaskHandle,
    /// Virtual time the task was due
    pub due_ms: u64,
    /// Task payload
    pub task: T,
}

#[derive(Debug, Clone)]
struct Entry<T> {
    handle: TaskHandle,
    task: T,
    every_ms: Option<u64>,
}

/// Queue key: due time, then scheduling order.
type Slot = (u64, u64);

/// Deterministic timer queue.
#[derive(Debug)]
pub struct Scheduler<T> {
    queue: BTreeMap<Slot, Entry<T>>,
    index: HashMap<TaskHandle, Slot>,
    next_seq: u64,
    next_handle: u64,
}

impl<T> Default for Scheduler<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Scheduler<T> {
    /// Create an empty scheduler
    #[must_use]
    pub fn new() -> Self {
        Self {
            queue: BTreeMap::new(),
            index: HashMap::new(),
            next_seq: 0,
            next_handle: 1,
        }
    }

    /// Run `task` once, `delay_ms` after `now_ms`.
    pub fn schedule_after(&mut self, now_ms: u64, delay_ms: u64, task: T) -> TaskHandle {
        let handle = self.allocate_handle();
        self.insert(
            now_ms.saturating_add(delay_ms),
            Entry {
                handle,
                task,
                every_ms: None,
            },
        );
        handle
    }

    /// Run `task` every `interval_ms`, first firing one interval from now.
    ///
    /// A zero interval is treated as 1 ms so the queue always makes progress.
    pub fn schedule_every(&mut self, now_ms: u64, interval_ms: u64, task: T) -> TaskHandle {
        let interval = interval_ms.max(1);
        let handle = self.allocate_handle();
        self.insert(
            now_ms.saturating_add(interval),
            Entry {
                handle,
                task,
                every_ms: Some(interval),
            },
        );
        handle
    }

    /// Cancel a task. Returns false if it already fired or was cancelled.
    pub fn cancel(&mut self, handle: TaskHandle) -> bool {
        match self.index.remove(&handle) {
            Some(slot) => self.queue.remove(&slot).is_some(),
            None => false,
        }
    }

    /// Cancel `handle` if present and clear the slot holding it.
    pub fn cancel_slot(&mut self, slot: &mut Option<TaskHandle>) -> bool {
        slot.take().is_some_and(|handle| self.cancel(handle))
    }

    /// Whether a task is still waiting to fire
    #[must_use]
    pub fn is_pending(&self, handle: TaskHandle) -> bool {
        self.index.contains_key(&handle)
    }

    /// Drop every pending task. Returns how many were cancelled.
    pub fn clear(&mut self) -> usize {
        let count = self.queue.len();
        self.queue.clear();
        self.index.clear();
        count
    }

    /// Number of pending tasks
    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Whether nothing is pending
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Due time of the earliest pending task
    #[must_use]
    pub fn next_due(&self) -> Option<u64> {
        self.queue.keys().next().map(|&(due, _)| due)
    }

    fn allocate_handle(&mut self) -> TaskHandle {
        let handle = TaskHandle(self.next_handle);
        self.next_handle += 1;
        handle
    }

    fn insert(&mut self, due_ms: u64, entry: Entry<T>) {
        let slot = (due_ms, self.next_seq);
        self.next_seq += 1;
        self.index.insert(entry.handle, slot);
        self.queue.insert(slot, entry);
    }
}

impl<T: Clone> Scheduler<T> {
    /// Pop the earliest task due at or before `now_ms`.
    ///
    /// Periodic tasks are re-armed before being returned, so the caller may
    /// cancel them from inside the task body.
    pub fn pop_due(&mut self, now_ms: u64) -> Option<Fired<T>> {
        let slot = *self.queue.keys().next()?;
        if slot.0 > now_ms {
            return None;
        }
        let entry = self.queue.remove(&slot)?;
        self.index.remove(&entry.handle);
        let (due_ms, _) = slot;

        if let Some(every) = entry.every_ms {
            self.insert(
                due_ms.saturating_add(every),
                Entry {
                    handle: entry.handle,
                    task: entry.task.clone(),
                    every_ms: Some(every),
                },
            );
        }

        Some(Fired {
            handle: entry.handle,
            due_ms,
            task: entry.task,
        })
    }
}
