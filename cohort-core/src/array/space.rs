//! Id spaces: watermarks plus the registry of arrays that track them.

use std::{
    collections::BTreeMap,
    fmt,
    marker::PhantomData,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
    },
};

use parking_lot::Mutex;

use crate::ids::ElementId;

/// Size bookkeeping shared between one array and the id space tracking it.
///
/// `target` is the length the array must present. Slots at or beyond
/// `floor` were dropped by a shrinking resize that the array has not applied
/// yet, so they must read as the default value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct PendingSize {
    pub(crate) target: usize,
    pub(crate) floor: usize,
}

#[derive(Debug)]
pub(crate) struct ArrayTracker {
    dirty: AtomicBool,
    valid: AtomicBool,
    size: Mutex<PendingSize>,
}

impl ArrayTracker {
    fn new(len: usize, valid: bool) -> Self {
        Self {
            dirty: AtomicBool::new(false),
            valid: AtomicBool::new(valid),
            size: Mutex::new(PendingSize {
                target: len,
                floor: len,
            }),
        }
    }

    /// Returns the unapplied size, if a resize arrived since the last sync.
    pub(crate) fn pending(&self) -> Option<PendingSize> {
        if self.dirty.load(Ordering::Acquire) {
            Some(*self.size.lock())
        } else {
            None
        }
    }

    /// Hands the unapplied size to `apply` and marks it applied.
    pub(crate) fn sync(&self, apply: impl FnOnce(PendingSize)) {
        if !self.dirty.load(Ordering::Acquire) {
            return;
        }
        let mut size = self.size.lock();
        apply(*size);
        size.floor = size.target;
        self.dirty.store(false, Ordering::Release);
    }

    /// Records a length set by the array owner itself. Call after syncing.
    pub(crate) fn set_local_len(&self, len: usize) {
        let mut size = self.size.lock();
        size.target = len;
        size.floor = len;
    }

    fn broadcast(&self, len: usize) {
        let mut size = self.size.lock();
        size.target = len;
        size.floor = size.floor.min(len);
        self.dirty.store(true, Ordering::Release);
    }

    pub(crate) fn is_valid(&self) -> bool {
        self.valid.load(Ordering::Acquire)
    }

    fn invalidate(&self) {
        self.valid.store(false, Ordering::Release);
    }
}

/// Watermark and tracked-array registry for one kind of element id.
///
/// Graphs own one space for nodes and one for edges; a component manager
/// owns one for components. Every [`GraphArray`](crate::GraphArray) built on
/// a space registers here and is resized whenever the owner moves the
/// watermark. Arrays keep only a weak reference back to the space and
/// deregister themselves when dropped.
///
/// # Examples
/// ```
/// use cohort_core::{GraphArray, IdSpace, NodeId};
///
/// let space = IdSpace::<NodeId>::shared();
/// space.resize(4);
///
/// let weights: GraphArray<NodeId, f32> = GraphArray::with_default(&space, 1.0);
/// assert_eq!(weights.len(), 4);
/// assert_eq!(space.tracked_arrays(), 1);
///
/// space.resize(6);
/// assert_eq!(weights.len(), 6);
///
/// drop(weights);
/// assert_eq!(space.tracked_arrays(), 0);
/// ```
pub struct IdSpace<I> {
    watermark: AtomicUsize,
    next_key: AtomicU64,
    valid: AtomicBool,
    trackers: Mutex<BTreeMap<u64, Arc<ArrayTracker>>>,
    _kind: PhantomData<fn() -> I>,
}

impl<I: ElementId> IdSpace<I> {
    /// Creates an empty id space with a zero watermark.
    #[must_use]
    pub fn new() -> Self {
        Self {
            watermark: AtomicUsize::new(0),
            next_key: AtomicU64::new(0),
            valid: AtomicBool::new(true),
            trackers: Mutex::new(BTreeMap::new()),
            _kind: PhantomData,
        }
    }

    /// Creates an empty id space behind an [`Arc`], ready to share with
    /// arrays.
    #[must_use]
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// The number of slots every tracking array presents.
    #[must_use]
    pub fn watermark(&self) -> usize {
        self.watermark.load(Ordering::Acquire)
    }

    /// Moves the watermark to `len` and broadcasts it to every tracked array.
    ///
    /// Shrinking is allowed; slots beyond the new watermark are discarded.
    pub fn resize(&self, len: usize) {
        let trackers = self.trackers.lock();
        self.watermark.store(len, Ordering::Release);
        for tracker in trackers.values() {
            tracker.broadcast(len);
        }
    }

    /// Orphans every tracked array and empties the registry.
    ///
    /// Called by the owner when it is destroyed. Orphaned arrays keep their
    /// contents but no longer follow any watermark.
    pub fn invalidate(&self) {
        let mut trackers = self.trackers.lock();
        self.valid.store(false, Ordering::Release);
        for tracker in trackers.values() {
            tracker.invalidate();
        }
        trackers.clear();
    }

    /// Returns `false` once the owner has invalidated the space.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.valid.load(Ordering::Acquire)
    }

    /// Number of arrays currently registered.
    #[must_use]
    pub fn tracked_arrays(&self) -> usize {
        self.trackers.lock().len()
    }

    pub(crate) fn register(&self) -> (u64, Arc<ArrayTracker>) {
        let mut trackers = self.trackers.lock();
        let key = self.next_key.fetch_add(1, Ordering::Relaxed);
        let tracker = Arc::new(ArrayTracker::new(self.watermark(), self.is_valid()));
        if self.is_valid() {
            trackers.insert(key, Arc::clone(&tracker));
        }
        (key, tracker)
    }

    pub(crate) fn deregister(&self, key: u64) {
        self.trackers.lock().remove(&key);
    }
}

impl<I: ElementId> Default for IdSpace<I> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I: ElementId> fmt::Debug for IdSpace<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdSpace")
            .field("kind", &I::KIND)
            .field("watermark", &self.watermark())
            .field("tracked_arrays", &self.tracked_arrays())
            .field("valid", &self.is_valid())
            .finish()
    }
}

/// Anything that owns an [`IdSpace`] arrays can be built against.
///
/// Implemented by [`MutableGraph`](crate::MutableGraph) for nodes and edges,
/// and by [`ComponentManager`](crate::ComponentManager) and
/// [`ComponentReader`](crate::ComponentReader) for components.
pub trait ArraySource<I: ElementId> {
    /// Returns the id space arrays built against this source should track.
    fn id_space(&self) -> &Arc<IdSpace<I>>;
}

impl<I: ElementId> ArraySource<I> for Arc<IdSpace<I>> {
    fn id_space(&self) -> &Arc<IdSpace<I>> {
        self
    }
}
