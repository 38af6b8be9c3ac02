//! # Task System Core Trait
//!
//! A `Task` is one fire-and-forget unit of work executed on a pool worker thread.
//!
//! ## Task Lifecycle
//! 1. A `Task` is created on the network thread and submitted via `TaskPool::submit()`
//! 2. The task waits in the shared FIFO queue until a worker dequeues it
//! 3. The task's `process()` method runs on that worker and consumes the task
//! 4. Whatever the task produces leaves through a channel the task itself owns
//!    (for chunk generation, the ready queue); nothing is returned to the pool
//!
//! ## Thread Safety
//! - `Task` must be `Send + 'static` to be transferred to a worker
//! - A task owns plain values and `Arc` handles only; it never borrows network-thread state
//! - A task that can fail must handle the failure itself (log and skip), because there is
//!   no channel back to the submitter

/// A unit of work that can be executed on a worker thread.
///
/// Closures implement this trait automatically, so simple work can be submitted without
/// defining a type:
///
/// ```
/// use voxel_stream_server::server_state::task_management::TaskPool;
///
/// let pool = TaskPool::new(1).unwrap();
/// pool.submit(Box::new(|| log::debug!("ran on a worker")));
/// ```
pub trait Task: Send + 'static {
    /// Executes the task, consuming it.
    ///
    /// # Implementation Notes
    /// - Runs on a worker thread; must not touch thread-local or network-thread state
    /// - Must not panic for expected conditions; a panic here is treated as a defect
    fn process(self: Box<Self>);

    /// Short label used in diagnostics.
    fn name(&self) -> &'static str {
        "task"
    }
}

impl<F> Task for F
where
    F: FnOnce() + Send + 'static,
{
    fn process(self: Box<Self>) {
        (*self)()
    }

    fn name(&self) -> &'static str {
        "closure"
    }
}
