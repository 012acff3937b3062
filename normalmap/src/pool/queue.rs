//! Pending-task queue for the worker pool.
//!
//! The removal order is an explicit [`QueueOrder`] rather than a side effect
//! of the container:
//!
//! 1. `Fifo` (default) hands tasks out in submission order, which keeps
//!    single-worker runs reproducible.
//! 2. `Lifo` hands out the most recently submitted task first.
//!
//! # Example
//!
//! ```
//! use normalmap::pool::{QueueOrder, QueuedTask, TaskQueue};
//!
//! let mut queue = TaskQueue::new(QueueOrder::Fifo);
//! queue.push(QueuedTask::new("first", || {}));
//! queue.push(QueuedTask::new("second", || {}));
//!
//! assert_eq!(queue.pop().unwrap().name(), "first");
//! ```

use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;
use std::time::Instant;

// =============================================================================
// Queue Order
// =============================================================================

/// Order in which idle workers take pending tasks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum QueueOrder {
    /// Oldest task first.
    #[default]
    Fifo,
    /// Newest task first.
    Lifo,
}

impl QueueOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueOrder::Fifo => "fifo",
            QueueOrder::Lifo => "lifo",
        }
    }
}

impl fmt::Display for QueueOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QueueOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fifo" => Ok(QueueOrder::Fifo),
            "lifo" => Ok(QueueOrder::Lifo),
            other => Err(format!("unknown queue order '{}' (expected fifo or lifo)", other)),
        }
    }
}

// =============================================================================
// Queued Task
// =============================================================================

/// Deferred unit of work run by a pool worker.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// A task waiting to be executed.
pub struct QueuedTask {
    name: String,
    job: Job,
    /// When the task was enqueued (for wait time logging).
    enqueued_at: Instant,
}

impl QueuedTask {
    /// Creates a named task from a closure.
    pub fn new<F>(name: impl Into<String>, job: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            name: name.into(),
            job: Box::new(job),
            enqueued_at: Instant::now(),
        }
    }

    /// Returns the task name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns how long this task has been waiting in the queue.
    pub fn wait_time(&self) -> std::time::Duration {
        self.enqueued_at.elapsed()
    }

    /// Runs the task, consuming it.
    pub fn run(self) {
        (self.job)()
    }
}

impl fmt::Debug for QueuedTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueuedTask")
            .field("name", &self.name)
            .field("enqueued_at", &self.enqueued_at)
            .finish()
    }
}

// =============================================================================
// Task Queue
// =============================================================================

/// Queue of pending tasks with a fixed removal order.
///
/// The queue is not thread-safe; the pool wraps it in a mutex.
pub struct TaskQueue {
    tasks: VecDeque<QueuedTask>,
    order: QueueOrder,
}

impl TaskQueue {
    /// Creates a new empty queue.
    pub fn new(order: QueueOrder) -> Self {
        Self {
            tasks: VecDeque::new(),
            order,
        }
    }

    /// Returns the removal order.
    pub fn order(&self) -> QueueOrder {
        self.order
    }

    /// Adds a task to the queue.
    pub fn push(&mut self, task: QueuedTask) {
        self.tasks.push_back(task);
    }

    /// Removes the next task according to the queue order.
    ///
    /// Returns `None` if the queue is empty.
    pub fn pop(&mut self) -> Option<QueuedTask> {
        match self.order {
            QueueOrder::Fifo => self.tasks.pop_front(),
            QueueOrder::Lifo => self.tasks.pop_back(),
        }
    }

    /// Returns the number of tasks in the queue.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Returns true if the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

impl Default for TaskQueue {
    fn default() -> Self {
        Self::new(QueueOrder::default())
    }
}

impl fmt::Debug for TaskQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskQueue")
            .field("len", &self.tasks.len())
            .field("order", &self.order)
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
