//! # Task Pool
//!
//! A fixed set of worker threads executing fire-and-forget `Task`s pulled from one shared
//! FIFO queue.
//!
//! ## Architecture Overview
//! - `TaskPool`: owns the workers and the submission side of the queue
//! - `Task`: a unit of work, consumed when it runs
//! - `SharedQueue`: the queue, its condition variable, the stop flag and the counters,
//!   shared between the pool handle and every worker
//!
//! ## Task Lifecycle
//! 1. `TaskPool::submit()` pushes the task and wakes one idle worker
//! 2. The worker pops the oldest task, releases the lock and runs it
//! 3. Idle workers block on the condition variable; they never spin
//! 4. `TaskPool::shutdown()` (or dropping the pool) raises the stop flag and wakes everyone;
//!    tasks already dequeued finish, tasks still queued are dropped
//!
//! ## Ordering
//! Tasks are dequeued in submission order, but with more than one worker they complete in
//! any order. Consumers of task output must not assume ordering.

pub mod task;

use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use log::{debug, error, info, warn};

use crate::error::{StreamError, StreamResult};
pub use task::Task;

/// State shared between the pool handle and its workers.
struct SharedQueue {
    tasks: Mutex<VecDeque<Box<dyn Task>>>,
    available: Condvar,
    stop: AtomicBool,
    active: AtomicUsize,
}

impl SharedQueue {
    /// Blocks until a task is available or the pool is stopping.
    ///
    /// Returns `None` once the stop flag is raised, even if tasks remain queued.
    fn next_task(&self) -> Option<Box<dyn Task>> {
        let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            if self.stop.load(Ordering::Acquire) {
                return None;
            }
            if let Some(task) = tasks.pop_front() {
                self.active.fetch_add(1, Ordering::AcqRel);
                return Some(task);
            }
            tasks = self
                .available
                .wait(tasks)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }
}

/// Manages a pool of worker threads executing submitted tasks.
///
/// The pool is created once at startup and lives for the whole process. It is safe to
/// submit from any thread, though in this server only the network thread does.
///
/// # Implementation Notes
/// - Drop-safe: dropping the pool performs `shutdown()`
/// - No backpressure: the queue is unbounded
pub struct TaskPool {
    shared: Arc<SharedQueue>,
    workers: Vec<JoinHandle<()>>,
}

impl TaskPool {
    /// Creates a new `TaskPool` with the specified number of worker threads.
    ///
    /// # Arguments
    /// * `num_workers` - Number of worker threads to create. Zero is clamped to one.
    ///
    /// # Returns
    /// The running pool, or `StreamError::WorkerSpawn` if the OS refused to create a thread.
    /// Workers started before the failure are stopped and joined.
    pub fn new(num_workers: usize) -> StreamResult<Self> {
        let num_workers = num_workers.max(1);
        let shared = Arc::new(SharedQueue {
            tasks: Mutex::new(VecDeque::new()),
            available: Condvar::new(),
            stop: AtomicBool::new(false),
            active: AtomicUsize::new(0),
        });

        let mut pool = TaskPool {
            shared,
            workers: Vec::with_capacity(num_workers),
        };

        for index in 0..num_workers {
            let shared = Arc::clone(&pool.shared);
            let worker = thread::Builder::new()
                .name(format!("chunk-worker-{index}"))
                .spawn(move || worker_loop(&shared))
                .map_err(|source| StreamError::WorkerSpawn { index, source })?;
            pool.workers.push(worker);
        }

        info!(
            "[TaskPool] Started {} workers (available parallelism: {:?})",
            num_workers,
            thread::available_parallelism()
        );
        Ok(pool)
    }

    /// Number of worker threads in the pool.
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Enqueues a task and returns immediately.
    ///
    /// Tasks submitted after `shutdown()` are dropped without running.
    ///
    /// # Arguments
    /// * `task` - The task to execute
    pub fn submit(&self, task: Box<dyn Task>) {
        if self.shared.stop.load(Ordering::Acquire) {
            debug!("[TaskPool] Dropping {} submitted after shutdown", task.name());
            return;
        }
        self.shared
            .tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(task);
        self.shared.available.notify_one();
    }

    /// Number of tasks waiting for a worker.
    pub fn queued(&self) -> usize {
        self.shared
            .tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Number of tasks currently executing.
    pub fn active(&self) -> usize {
        self.shared.active.load(Ordering::Acquire)
    }

    /// Stops all workers and waits for them to exit.
    ///
    /// Tasks already running finish; queued tasks are dropped. Calling this twice is a no-op.
    pub fn shutdown(&mut self) {
        if self.workers.is_empty() {
            return;
        }
        self.shared.stop.store(true, Ordering::Release);
        let dropped = {
            let mut tasks = self
                .shared
                .tasks
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            let dropped = tasks.len();
            tasks.clear();
            dropped
        };
        self.shared.available.notify_all();

        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                warn!("[TaskPool] A worker thread panicked");
            }
        }
        info!("[TaskPool] Shut down, {dropped} queued tasks dropped");
    }
}

impl Drop for TaskPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Marks the dequeued task finished even if it unwinds.
struct ActiveGuard<'a>(&'a AtomicUsize);

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

fn worker_loop(shared: &SharedQueue) {
    while let Some(task) = shared.next_task() {
        let _active = ActiveGuard(&shared.active);
        let name = task.name();
        // A panicking task is a defect, but it must not cost the pool a worker.
        if panic::catch_unwind(AssertUnwindSafe(move || task.process())).is_err() {
            error!("[TaskPool] Task '{}' panicked; worker continues", name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc::channel;
    use std::time::Duration;

    #[test]
    fn zero_workers_is_clamped_to_one() {
        let pool = TaskPool::new(0).unwrap();
        assert_eq!(pool.worker_count(), 1);
    }

    #[test]
    fn runs_every_submitted_task() {
        let pool = TaskPool::new(3).unwrap();
        let (tx, rx) = channel();
        for i in 0..50 {
            let tx = tx.clone();
            pool.submit(Box::new(move || tx.send(i).unwrap()));
        }
        let mut seen: Vec<i32> = (0..50)
            .map(|_| rx.recv_timeout(Duration::from_secs(5)).unwrap())
            .collect();
        seen.sort();
        assert_eq!(seen, (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn single_worker_preserves_submission_order() {
        let pool = TaskPool::new(1).unwrap();
        let (tx, rx) = channel();
        for i in 0..20 {
            let tx = tx.clone();
            pool.submit(Box::new(move || tx.send(i).unwrap()));
        }
        let seen: Vec<i32> = (0..20)
            .map(|_| rx.recv_timeout(Duration::from_secs(5)).unwrap())
            .collect();
        assert_eq!(seen, (0..20).collect::<Vec<_>>());
    }

    #[test]
    fn shutdown_drops_queued_work_and_finishes_running_work() {
        let mut pool = TaskPool::new(1).unwrap();
        let (started_tx, started_rx) = channel();
        let (release_tx, release_rx) = channel::<()>();
        let (done_tx, done_rx) = channel();

        let done = done_tx.clone();
        pool.submit(Box::new(move || {
            started_tx.send(()).unwrap();
            release_rx.recv().unwrap();
            done.send("running").unwrap();
        }));
        started_rx.recv_timeout(Duration::from_secs(5)).unwrap();

        // Queued behind the blocked task; must never run.
        pool.submit(Box::new(move || done_tx.send("queued").unwrap()));
        assert_eq!(pool.queued(), 1);
        assert_eq!(pool.active(), 1);

        // Release the running task only after shutdown has cleared the queue.
        let releaser = thread::spawn(move || {
            thread::sleep(Duration::from_millis(100));
            release_tx.send(()).unwrap();
        });
        pool.shutdown();
        releaser.join().unwrap();

        let finished: Vec<_> = done_rx.try_iter().collect();
        assert_eq!(finished, vec!["running"]);
    }

    #[test]
    fn panicking_task_keeps_the_worker() {
        let pool = TaskPool::new(1).unwrap();
        let (tx, rx) = channel();
        pool.submit(Box::new(|| panic!("chunk generation failed")));
        pool.submit(Box::new(move || tx.send("after").unwrap()));

        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), "after");
        assert_eq!(pool.worker_count(), 1);
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while pool.active() != 0 {
            assert!(std::time::Instant::now() < deadline, "active count leaked");
            thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(pool.queued(), 0);
    }

    #[test]
    fn submit_after_shutdown_is_ignored() {
        let mut pool = TaskPool::new(1).unwrap();
        pool.shutdown();
        let (tx, rx) = channel::<()>();
        pool.submit(Box::new(move || tx.send(()).unwrap()));
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
    }
}
