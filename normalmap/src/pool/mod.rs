//! Fixed-size worker thread pool.
//!
//! The [`WorkerPool`] spawns its OS threads up front. Each worker loops:
//! wait until a task is queued or shutdown is requested, take one task
//! according to the pool's [`QueueOrder`], run it to completion, repeat.
//!
//! # Architecture
//!
//! ```text
//!  add(task) ──► ┌──────────────────────────────┐
//!                │ Mutex<PoolState>             │
//!                │   queue: TaskQueue           │◄── notify_one on add
//!                │   shutdown: bool             │◄── notify_all on join
//!                └──────────────┬───────────────┘
//!                               │ Condvar
//!              ┌────────────────┼────────────────┐
//!              ▼                ▼                ▼
//!          worker-0         worker-1   ...   worker-N-1
//! ```
//!
//! # Shutdown
//!
//! [`WorkerPool::join`] sets the shutdown flag and wakes every worker.
//! Workers keep draining whatever is still queued and only exit once the
//! queue is empty, so every task added before `join` runs exactly once.
//! Dropping a pool without calling `join` performs the same shutdown.
//!
//! # Example
//!
//! ```
//! use normalmap::pool::WorkerPool;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//!
//! let counter = Arc::new(AtomicUsize::new(0));
//! let pool = WorkerPool::new(4).unwrap();
//!
//! for _ in 0..16 {
//!     let counter = Arc::clone(&counter);
//!     pool.add(move || {
//!         counter.fetch_add(1, Ordering::SeqCst);
//!     });
//! }
//!
//! let stats = pool.join();
//! assert_eq!(counter.load(Ordering::SeqCst), 16);
//! assert_eq!(stats.completed, 16);
//! ```

mod queue;

pub use queue::{Job, QueueOrder, QueuedTask, TaskQueue};

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::{Condvar, Mutex};
use thiserror::Error;
use tracing::{debug, trace, warn};

/// Name given to tasks added without one.
const ANONYMOUS_TASK: &str = "task";

/// Errors that can occur when building a worker pool.
#[derive(Debug, Error)]
pub enum PoolError {
    /// A pool needs at least one worker.
    #[error("Worker pool requires at least one worker")]
    NoWorkers,

    /// The OS refused to spawn a worker thread.
    #[error("Failed to spawn worker thread")]
    Spawn(#[from] std::io::Error),
}

/// Counters reported when the pool shuts down.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Tasks that ran to completion.
    pub completed: usize,
    /// Tasks that panicked (the worker survived).
    pub panicked: usize,
}

struct PoolState {
    queue: TaskQueue,
    shutdown: bool,
}

struct Shared {
    state: Mutex<PoolState>,
    available: Condvar,
    completed: AtomicUsize,
    panicked: AtomicUsize,
}

/// A fixed set of worker threads consuming a shared task queue.
pub struct WorkerPool {
    shared: Arc<Shared>,
    workers: Vec<JoinHandle<()>>,
    order: QueueOrder,
}

impl WorkerPool {
    /// Creates a FIFO pool with `size` workers.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::NoWorkers`] if `size` is zero and
    /// [`PoolError::Spawn`] if a thread cannot be started.
    pub fn new(size: usize) -> Result<Self, PoolError> {
        Self::with_order(size, QueueOrder::default())
    }

    /// Creates a pool with `size` workers taking tasks in `order`.
    pub fn with_order(size: usize, order: QueueOrder) -> Result<Self, PoolError> {
        if size == 0 {
            return Err(PoolError::NoWorkers);
        }

        let shared = Arc::new(Shared {
            state: Mutex::new(PoolState {
                queue: TaskQueue::new(order),
                shutdown: false,
            }),
            available: Condvar::new(),
            completed: AtomicUsize::new(0),
            panicked: AtomicUsize::new(0),
        });

        let mut pool = Self {
            shared,
            workers: Vec::with_capacity(size),
            order,
        };

        for index in 0..size {
            let shared = Arc::clone(&pool.shared);
            // On error the partially built pool is dropped, which shuts
            // down the workers spawned so far.
            let handle = thread::Builder::new()
                .name(format!("normalmap-worker-{}", index))
                .spawn(move || worker_loop(shared, index))?;
            pool.workers.push(handle);
        }

        debug!(workers = size, order = %order, "Worker pool started");
        Ok(pool)
    }

    /// Number of worker threads.
    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Order in which queued tasks are taken.
    pub fn order(&self) -> QueueOrder {
        self.order
    }

    /// Number of tasks queued but not yet picked up by a worker.
    pub fn pending(&self) -> usize {
        self.shared.state.lock().queue.len()
    }

    /// Queues an anonymous task and wakes one idle worker.
    pub fn add<F>(&self, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.add_named(ANONYMOUS_TASK, task);
    }

    /// Queues a named task and wakes one idle worker.
    ///
    /// The name shows up in logs if the task panics.
    pub fn add_named<F>(&self, name: impl Into<String>, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.shared
            .state
            .lock()
            .queue
            .push(QueuedTask::new(name, task));
        self.shared.available.notify_one();
    }

    /// Requests shutdown, drains the queue and waits for every worker to
    /// exit.
    pub fn join(mut self) -> PoolStats {
        self.shutdown_and_wait();
        self.stats()
    }

    fn stats(&self) -> PoolStats {
        PoolStats {
            completed: self.shared.completed.load(Ordering::Acquire),
            panicked: self.shared.panicked.load(Ordering::Acquire),
        }
    }

    fn shutdown_and_wait(&mut self) {
        if self.workers.is_empty() {
            return;
        }

        self.shared.state.lock().shutdown = true;
        self.shared.available.notify_all();

        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                warn!("Worker thread terminated abnormally");
            }
        }
        debug!("Worker pool stopped");
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown_and_wait();
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("size", &self.workers.len())
            .field("order", &self.order)
            .field("pending", &self.pending())
            .finish()
    }
}

fn worker_loop(shared: Arc<Shared>, index: usize) {
    loop {
        let task = {
            let mut state = shared.state.lock();
            loop {
                // Pop before checking shutdown so queued work drains.
                if let Some(task) = state.queue.pop() {
                    break task;
                }
                if state.shutdown {
                    trace!(worker = index, "Worker exiting");
                    return;
                }
                shared.available.wait(&mut state);
            }
        };

        let name = task.name().to_string();
        trace!(worker = index, task = %name, waited_ms = task.wait_time().as_millis() as u64, "Running task");

        match panic::catch_unwind(AssertUnwindSafe(move || task.run())) {
            Ok(()) => {
                shared.completed.fetch_add(1, Ordering::AcqRel);
            }
            Err(_) => {
                shared.panicked.fetch_add(1, Ordering::AcqRel);
                warn!(worker = index, task = %name, "Task panicked");
            }
        }
    }
}
