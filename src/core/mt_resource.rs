use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// A thread-safe, reference-counted resource container with exclusive locking.
///
/// `MtResource` provides synchronized access to a value of type `T` that can be shared
/// across threads. It uses an `Arc<Mutex<T>>` internally. Every access is exclusive,
/// which is what the streaming pipeline needs: the chunk cache performs lookup-then-insert
/// and the ready queue performs push (many workers) and swap (one consumer), and both of
/// those must not interleave with another writer.
///
/// # Type Parameters
/// - `T`: The type of the contained resource, must be `Send`
///
/// # Examples
///
/// ## Sharing Between Threads
/// ```
/// # use std::thread;
/// use voxel_stream_server::core::MtResource;
///
/// let counter = MtResource::new(0);
/// let counter_clone = counter.clone();
///
/// let handle = thread::spawn(move || {
///     *counter_clone.lock() += 1;
/// });
///
/// handle.join().unwrap();
/// assert_eq!(*counter.lock(), 1);
/// ```
///
/// # Poisoning
/// A panic while the lock is held poisons the mutex. The guarded values in this crate are
/// always whole, self-consistent collections (a map insert or a vector push either happened
/// or did not), so `lock()` recovers the inner value instead of propagating the poison.
pub struct MtResource<T: Send> {
    resource: Arc<Mutex<T>>,
}

impl<T: Send> MtResource<T> {
    /// Creates a new `MtResource` containing the given value.
    ///
    /// # Arguments
    /// * `resource` - The value to be stored in the resource
    ///
    /// # Returns
    /// A new `MtResource` containing the provided value
    pub fn new(resource: T) -> Self {
        Self {
            resource: Arc::new(Mutex::new(resource)),
        }
    }

    /// Acquires exclusive access to the contained value.
    ///
    /// Blocks until the lock is available. Keep the returned guard alive only for the
    /// duration of the lookup or mutation; never across expensive work.
    ///
    /// # Returns
    /// A guard that provides mutable access to the contained value
    pub fn lock(&self) -> MutexGuard<'_, T> {
        self.resource.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: Send + Default> Default for MtResource<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: Send> Clone for MtResource<T> {
    fn clone(&self) -> Self {
        Self {
            resource: self.resource.clone(),
        }
    }
}
