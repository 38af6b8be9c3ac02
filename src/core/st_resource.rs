use std::{
    cell::{Ref, RefCell, RefMut},
    rc::Rc,
};

/// A single-threaded, reference-counted resource with interior mutability.
///
/// `StResource` provides interior mutability for a value of type `T` in a single-threaded
/// context. It uses `Rc<RefCell<T>>` internally, which makes it neither `Send` nor `Sync`:
/// the compiler refuses to move it (or anything containing it) into another thread. That is
/// the point. Resources that must only ever be touched by the network thread, such as the
/// transport, are wrapped in it so that the single-writer rule is checked at compile time
/// instead of by convention.
///
/// # Type Parameters
/// - `T`: The type of the contained resource, may be unsized (e.g. `dyn Transport`)
///
/// # Examples
///
/// ## Cloning and Shared Ownership
/// ```
/// use voxel_stream_server::core::StResource;
///
/// let resource = StResource::new(vec![1, 2, 3]);
/// let clone = resource.clone();
///
/// // All clones share the same underlying data
/// clone.get_mut().push(4);
/// assert_eq!(*resource.get(), vec![1, 2, 3, 4]);
/// ```
///
/// ## Not Shareable Across Threads
/// ```compile_fail
/// use voxel_stream_server::core::StResource;
///
/// let resource = StResource::new(0u32);
/// std::thread::spawn(move || {
///     *resource.get_mut() += 1;
/// });
/// ```
pub struct StResource<T: ?Sized> {
    resource: Rc<RefCell<T>>,
}

impl<T> StResource<T> {
    /// Creates a new `StResource` containing the given value.
    ///
    /// # Arguments
    /// * `resource` - The value to be stored in the resource
    ///
    /// # Returns
    /// A new `StResource` containing the provided value
    pub fn new(resource: T) -> Self {
        Self {
            resource: Rc::new(RefCell::new(resource)),
        }
    }
}

impl<T: ?Sized> StResource<T> {
    /// Wraps an already shared cell. Used to build `StResource<dyn Trait>` from a concrete
    /// value through unsized coercion of the `Rc`.
    pub fn from_rc(resource: Rc<RefCell<T>>) -> Self {
        Self { resource }
    }

    /// Returns a read-only borrow of the contained value.
    ///
    /// # Panics
    /// Panics if the value is currently mutably borrowed.
    pub fn get(&self) -> Ref<'_, T> {
        self.resource.borrow()
    }

    /// Returns a mutable borrow of the contained value.
    ///
    /// # Panics
    /// Panics if the value is currently borrowed.
    pub fn get_mut(&self) -> RefMut<'_, T> {
        self.resource.borrow_mut()
    }
}

impl<T: ?Sized> Clone for StResource<T> {
    fn clone(&self) -> Self {
        Self {
            resource: self.resource.clone(),
        }
    }
}
