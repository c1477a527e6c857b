#![forbid(unsafe_code)]

//! Bounded-concurrency task admission for quiver.
//!
//! [`TaskScheduler`] keeps an unbounded FIFO queue of submitted [`LoadTask`]s
//! and admits at most a configured number of them at a time. Admission is
//! greedy: whenever capacity frees up, the first pending task in submission
//! order starts. A task's completion removes it from the queue and re-pumps
//! the scheduler, so concurrency stays at the cap as long as pending work
//! exists.
//!
//! There is no priority or fairness scheme beyond FIFO order, and no
//! mid-flight cancellation: [`TaskScheduler::clear`] only prevents
//! not-yet-started tasks from starting.

use std::{future::Future, sync::Arc};

use futures::future::BoxFuture;
use parking_lot::Mutex;
use tracing::trace;

/// Lifecycle of a [`LoadTask`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Pending,
    Loading,
    Completed,
}

/// A unit of work submitted to the scheduler.
///
/// Identity is `Arc` pointer identity: no two tasks are considered equal
/// unless they are the same instance.
pub struct LoadTask {
    status: Mutex<TaskStatus>,
    work: Mutex<Option<BoxFuture<'static, ()>>>,
}

impl LoadTask {
    /// Wrap a future as a schedulable task.
    pub fn new<F>(work: F) -> Arc<Self>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        Arc::new(Self {
            status: Mutex::new(TaskStatus::Pending),
            work: Mutex::new(Some(Box::pin(work))),
        })
    }

    pub fn status(&self) -> TaskStatus {
        *self.status.lock()
    }
}

impl std::fmt::Debug for LoadTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadTask")
            .field("status", &self.status())
            .finish()
    }
}

/// FIFO admission controller with a fixed concurrency cap.
pub struct TaskScheduler {
    limit: usize,
    queue: Mutex<Vec<Arc<LoadTask>>>,
}

impl TaskScheduler {
    /// Create a scheduler admitting at most `limit` simultaneous tasks.
    ///
    /// A limit of zero is treated as one.
    pub fn new(limit: usize) -> Arc<Self> {
        Arc::new(Self {
            limit: limit.max(1),
            queue: Mutex::new(Vec::new()),
        })
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Append a task to the queue.
    ///
    /// Tasks already present (by identity) or past the pending state are
    /// ignored. Submission does not start work; call [`pump`](Self::pump).
    pub fn submit(self: &Arc<Self>, task: Arc<LoadTask>) {
        let mut queue = self.queue.lock();
        if task.status() != TaskStatus::Pending {
            trace!("scheduler: ignoring non-pending submission");
            return;
        }
        if queue.iter().any(|t| Arc::ptr_eq(t, &task)) {
            return;
        }
        queue.push(task);
        trace!(queued = queue.len(), "scheduler: task submitted");
    }

    /// Admit pending tasks in submission order until the cap is reached.
    pub fn pump(self: &Arc<Self>) {
        loop {
            let admitted = {
                let queue = self.queue.lock();
                let loading = queue
                    .iter()
                    .filter(|t| t.status() == TaskStatus::Loading)
                    .count();
                if loading >= self.limit {
                    None
                } else {
                    // Claim under the queue lock so concurrent pumps cannot
                    // admit the same task twice.
                    queue
                        .iter()
                        .find(|t| t.status() == TaskStatus::Pending)
                        .map(|t| {
                            *t.status.lock() = TaskStatus::Loading;
                            Arc::clone(t)
                        })
                }
            };

            let Some(task) = admitted else { return };

            let work = task.work.lock().take();
            let scheduler = Arc::clone(self);
            tokio::spawn(async move {
                if let Some(work) = work {
                    work.await;
                }
                *task.status.lock() = TaskStatus::Completed;
                scheduler.complete(&task);
            });
        }
    }

    /// Number of tasks currently tracked (pending and in flight).
    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }

    /// Drop all queued bookkeeping.
    ///
    /// In-flight tasks are not cancelled; they run to completion but no new
    /// tasks are admitted from the cleared queue.
    pub fn clear(&self) {
        let mut queue = self.queue.lock();
        trace!(dropped = queue.len(), "scheduler: queue cleared");
        queue.clear();
    }

    fn complete(self: &Arc<Self>, task: &Arc<LoadTask>) {
        {
            let mut queue = self.queue.lock();
            queue.retain(|t| !Arc::ptr_eq(t, task));
        }
        trace!("scheduler: task completed");
        self.pump();
    }
}

impl std::fmt::Debug for TaskScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskScheduler")
            .field("limit", &self.limit)
            .field("queued", &self.len())
            .finish()
    }
}
