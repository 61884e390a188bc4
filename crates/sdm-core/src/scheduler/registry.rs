//! Bookkeeping behind the scheduler lock: known tasks, FIFO queue, runs in flight.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use crate::key::FileKey;
use crate::task::{DownloadTask, TaskState};

#[derive(Default)]
pub(super) struct Registry {
    tasks: HashMap<FileKey, Arc<DownloadTask>>,
    /// Keys in the order they were first enqueued.
    order: Vec<FileKey>,
    /// Tasks waiting for a slot, at most one entry per task. A task
    /// discarded while queued may linger; promotion skips it.
    queue: VecDeque<Arc<DownloadTask>>,
    /// Deploys spawned and not yet settled.
    in_flight: usize,
}

impl Registry {
    pub(super) fn get(&self, key: &FileKey) -> Option<&Arc<DownloadTask>> {
        self.tasks.get(key)
    }

    /// Register a new task for its key, replacing a finished or discarded one.
    pub(super) fn insert(&mut self, task: Arc<DownloadTask>) {
        let key = task.key().clone();
        if self.tasks.insert(key.clone(), Arc::clone(&task)).is_none() {
            self.order.push(key);
        }
        self.queue.push_back(task);
    }

    /// Forget `task` unless its key already belongs to a newer task.
    pub(super) fn remove(&mut self, task: &Arc<DownloadTask>) {
        let key = task.key();
        if self.tasks.get(key).is_some_and(|t| Arc::ptr_eq(t, task)) {
            self.tasks.remove(key);
            self.order.retain(|k| k != key);
        }
        self.dequeue(task);
    }

    /// Append `task` behind everything already waiting, dropping any older entry.
    pub(super) fn push_queue(&mut self, task: Arc<DownloadTask>) {
        self.dequeue(&task);
        self.queue.push_back(task);
    }

    pub(super) fn dequeue(&mut self, task: &Arc<DownloadTask>) {
        self.queue.retain(|t| !Arc::ptr_eq(t, task));
    }

    pub(super) fn downloading_count(&self) -> usize {
        self.tasks
            .values()
            .filter(|t| t.state() == TaskState::Downloading)
            .count()
    }

    /// Promote queued tasks in FIFO order until `ceiling` tasks are downloading.
    /// Returned tasks are already `Downloading` and counted as in flight.
    pub(super) fn take_promotable(&mut self, ceiling: usize) -> Vec<Arc<DownloadTask>> {
        let mut running = self.downloading_count();
        let mut promoted = Vec::new();
        while running < ceiling {
            let Some(task) = self.queue.pop_front() else {
                break;
            };
            if task.promote() {
                running += 1;
                self.in_flight += 1;
                promoted.push(task);
            }
        }
        promoted
    }

    pub(super) fn run_settled(&mut self) {
        self.in_flight = self.in_flight.saturating_sub(1);
    }

    /// Queued and downloading tasks, oldest key first.
    pub(super) fn active(&self) -> Vec<Arc<DownloadTask>> {
        self.order
            .iter()
            .filter_map(|k| self.tasks.get(k))
            .filter(|t| t.state().is_active())
            .cloned()
            .collect()
    }

    /// No task waits for or holds a slot and no run is still winding down.
    pub(super) fn is_idle(&self) -> bool {
        self.in_flight == 0 && self.tasks.values().all(|t| !t.state().is_active())
    }
}
