//! A [`GraphArray`] behind a re-entrant lock.

use std::{cell::RefCell, fmt};

use parking_lot::ReentrantMutex;

use crate::ids::ElementId;

use super::GraphArray;

/// A [`GraphArray`] whose accessors synchronise through a re-entrant mutex.
///
/// Every accessor takes the lock for its own duration, so a thread may call
/// back into the array while already holding it through
/// [`LockedGraphArray::with`]. Mutable access from inside a `with` closure on
/// the same thread panics, as does any nested access from inside
/// [`LockedGraphArray::with_mut`].
///
/// # Examples
/// ```
/// use std::{sync::Arc, thread};
///
/// use cohort_core::{ElementId, IdSpace, GraphArray, NodeId};
///
/// let space = IdSpace::<NodeId>::shared();
/// space.resize(3);
/// let visits = Arc::new(GraphArray::<NodeId, u32>::new(&space).into_locked());
///
/// let handles: Vec<_> = (0..3)
///     .map(|index| {
///         let visits = Arc::clone(&visits);
///         thread::spawn(move || visits.with_mut(|array| array[NodeId::from_index(index)] += 1))
///     })
///     .collect();
/// for handle in handles {
///     handle.join().expect("worker thread panicked");
/// }
/// assert_eq!(visits.with(|array| array.iter().sum::<u32>()), 3);
/// ```
pub struct LockedGraphArray<I: ElementId, E: Clone> {
    inner: ReentrantMutex<RefCell<GraphArray<I, E>>>,
}

impl<I: ElementId, E: Clone> LockedGraphArray<I, E> {
    pub(super) fn new(array: GraphArray<I, E>) -> Self {
        Self {
            inner: ReentrantMutex::new(RefCell::new(array)),
        }
    }

    /// Runs `f` with shared access to the array while holding the lock.
    pub fn with<R>(&self, f: impl FnOnce(&GraphArray<I, E>) -> R) -> R {
        let guard = self.inner.lock();
        let array = guard.borrow();
        f(&array)
    }

    /// Runs `f` with exclusive access to the array while holding the lock.
    ///
    /// # Panics
    /// Panics when called re-entrantly from inside [`Self::with`] or
    /// [`Self::with_mut`] on the same thread.
    pub fn with_mut<R>(&self, f: impl FnOnce(&mut GraphArray<I, E>) -> R) -> R {
        let guard = self.inner.lock();
        let mut array = guard.borrow_mut();
        f(&mut array)
    }

    /// Returns a copy of the value at `id`, or `None` when out of range.
    #[must_use]
    pub fn get(&self, id: I) -> Option<E> {
        self.with(|array| array.get(id).cloned())
    }

    /// Stores `value` at `id`.
    ///
    /// # Panics
    /// Panics when `id` is null or out of range.
    pub fn set(&self, id: I, value: E) {
        self.with_mut(|array| array.set(id, value));
    }

    /// Overwrites every slot with `value`.
    pub fn fill(&self, value: E) {
        self.with_mut(|array| array.fill(value));
    }

    /// Overwrites every slot with the default value.
    pub fn reset(&self) {
        self.with_mut(GraphArray::reset);
    }

    /// Grows the array to at least `len` slots.
    pub fn resize(&self, len: usize) {
        self.with_mut(|array| array.resize(len));
    }

    /// Current length of the wrapped array.
    #[must_use]
    pub fn len(&self) -> usize {
        self.with(GraphArray::len)
    }

    /// Returns `true` when the wrapped array has no slots.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.with(GraphArray::is_empty)
    }

    /// Returns `false` once the owning id space has been torn down.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.with(GraphArray::is_valid)
    }

    /// Releases the lock wrapper and returns the array.
    #[must_use]
    pub fn into_inner(self) -> GraphArray<I, E> {
        self.inner.into_inner().into_inner()
    }
}

impl<I: ElementId, E: Clone> Clone for LockedGraphArray<I, E> {
    fn clone(&self) -> Self {
        Self::new(self.with(GraphArray::clone))
    }
}

impl<I: ElementId, E: Clone + fmt::Debug> fmt::Debug for LockedGraphArray<I, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.with(|array| f.debug_tuple("LockedGraphArray").field(array).finish())
    }
}
