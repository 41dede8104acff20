//! Per-element arrays that follow the id space of their owner.
//!
//! A [`GraphArray`] stores one value per possible id of a given kind. It
//! registers with the [`IdSpace`] of the graph or component manager it was
//! built against, and its length tracks that space's watermark for as long as
//! both are alive. Resizes broadcast by the owner are recorded in a small
//! shared tracker and folded into the array's storage on the next mutable
//! access; until then, read accessors present the broadcast length with
//! default-valued new slots.

mod locked;
mod space;

use std::{
    fmt,
    ops::{Index, IndexMut},
    sync::{Arc, Weak},
};

use crate::ids::{ComponentId, EdgeId, ElementId, NodeId};

pub use self::{
    locked::LockedGraphArray,
    space::{ArraySource, IdSpace},
};
use self::space::{ArrayTracker, PendingSize};

/// Per-node values tracking a graph's node id space.
pub type NodeArray<E> = GraphArray<NodeId, E>;
/// Per-edge values tracking a graph's edge id space.
pub type EdgeArray<E> = GraphArray<EdgeId, E>;
/// Per-component values tracking a component manager's id space.
pub type ComponentArray<E> = GraphArray<ComponentId, E>;

/// A dense array indexed by element id.
///
/// Indexing beyond the current length panics. Resizes requested by the owner
/// of the id space never lose values below the new length; values beyond a
/// shrink are discarded.
///
/// # Examples
/// ```
/// use cohort_core::{ElementId, MutableGraph, NodeArray};
///
/// let mut graph = MutableGraph::new();
/// let a = graph.add_node();
///
/// let mut labels: NodeArray<&str> = NodeArray::new(&graph);
/// labels.set(a, "a");
///
/// let b = graph.add_node();
/// assert_eq!(labels.len(), 2);
/// assert_eq!(labels[a], "a");
/// assert_eq!(labels[b], "");
/// ```
pub struct GraphArray<I: ElementId, E: Clone> {
    values: Vec<E>,
    default: E,
    key: u64,
    tracker: Arc<ArrayTracker>,
    space: Weak<IdSpace<I>>,
}

impl<I: ElementId, E: Clone> GraphArray<I, E> {
    /// Creates an array on `source`'s id space filled with `E::default()`.
    #[must_use]
    pub fn new<S>(source: &S) -> Self
    where
        S: ArraySource<I> + ?Sized,
        E: Default,
    {
        Self::with_default(source, E::default())
    }

    /// Creates an array on `source`'s id space whose slots, including those
    /// added by later resizes, start as `default`.
    #[must_use]
    pub fn with_default<S>(source: &S, default: E) -> Self
    where
        S: ArraySource<I> + ?Sized,
    {
        Self::on_space(source.id_space(), default)
    }

    fn on_space(space: &Arc<IdSpace<I>>, default: E) -> Self {
        let (key, tracker) = space.register();
        let len = space.watermark();
        Self {
            values: vec![default.clone(); len],
            default,
            key,
            tracker,
            space: Arc::downgrade(space),
        }
    }

    /// Current length: the last watermark seen, or a larger local resize.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tracker
            .pending()
            .map_or(self.values.len(), |pending| pending.target)
    }

    /// Returns `true` when the array has no slots.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The value new slots start with.
    #[rustfmt::skip]
    #[must_use]
    pub fn default_value(&self) -> &E { &self.default }

    /// Returns `false` once the owning id space has been torn down. Orphaned
    /// arrays keep their contents and stop following resizes.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.tracker.is_valid()
    }

    /// Returns the value at `id`, or `None` when `id` is null or out of
    /// range.
    #[must_use]
    pub fn get(&self, id: I) -> Option<&E> {
        if id.is_null() {
            return None;
        }
        let index = id.index();
        match self.tracker.pending() {
            None => self.values.get(index),
            Some(PendingSize { target, floor }) => {
                if index >= target {
                    None
                } else if index < floor.min(self.values.len()) {
                    Some(&self.values[index])
                } else {
                    Some(&self.default)
                }
            }
        }
    }

    /// Returns a mutable reference to the value at `id`.
    ///
    /// # Panics
    /// Panics when `id` is null or out of range.
    pub fn get_mut(&mut self, id: I) -> &mut E {
        self.sync();
        let len = self.values.len();
        match self.values.get_mut(id.index()) {
            Some(value) if !id.is_null() => value,
            _ => out_of_bounds::<I>(id, len),
        }
    }

    /// Stores `value` at `id`.
    ///
    /// # Panics
    /// Panics when `id` is null or out of range.
    pub fn set(&mut self, id: I, value: E) {
        *self.get_mut(id) = value;
    }

    /// Overwrites every slot with `value`.
    pub fn fill(&mut self, value: E) {
        self.sync();
        self.values.fill(value);
    }

    /// Overwrites every slot with the default value.
    pub fn reset(&mut self) {
        let default = self.default.clone();
        self.fill(default);
    }

    /// Grows the array to at least `len` slots.
    ///
    /// A local resize never shrinks; the array keeps the larger length until
    /// the owner broadcasts its next watermark.
    pub fn resize(&mut self, len: usize) {
        self.sync();
        if len > self.values.len() {
            self.values.resize(len, self.default.clone());
            self.tracker.set_local_len(len);
        }
    }

    /// Iterates the values in id order.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = &E> + '_ {
        let pending = self.tracker.pending();
        let (len, visible) = match pending {
            None => (self.values.len(), self.values.len()),
            Some(PendingSize { target, floor }) => (target, floor.min(self.values.len())),
        };
        (0..len).map(move |index| {
            if index < visible {
                &self.values[index]
            } else {
                &self.default
            }
        })
    }

    /// Iterates `(id, value)` pairs in id order.
    pub fn iter_ids(&self) -> impl Iterator<Item = (I, &E)> + '_ {
        self.iter()
            .enumerate()
            .map(|(index, value)| (I::from_index(index), value))
    }

    /// Wraps the array for use from several threads.
    #[must_use]
    pub fn into_locked(self) -> LockedGraphArray<I, E> {
        LockedGraphArray::new(self)
    }

    fn sync(&mut self) {
        let Self {
            values,
            default,
            tracker,
            ..
        } = self;
        tracker.sync(|PendingSize { target, floor }| {
            values.truncate(floor);
            values.resize(target, default.clone());
        });
    }
}

#[cold]
#[track_caller]
fn out_of_bounds<I: ElementId>(id: I, len: usize) -> ! {
    panic!("{} {id} is out of bounds for an array of length {len}", I::KIND)
}

impl<I: ElementId, E: Clone> Index<I> for GraphArray<I, E> {
    type Output = E;

    #[track_caller]
    fn index(&self, id: I) -> &E {
        match self.get(id) {
            Some(value) => value,
            None => out_of_bounds::<I>(id, self.len()),
        }
    }
}

impl<I: ElementId, E: Clone> IndexMut<I> for GraphArray<I, E> {
    #[track_caller]
    fn index_mut(&mut self, id: I) -> &mut E {
        self.get_mut(id)
    }
}

impl<I: ElementId, E: Clone> Clone for GraphArray<I, E> {
    /// Copies the contents into a new array registered on the same id space.
    fn clone(&self) -> Self {
        let values: Vec<E> = self.iter().cloned().collect();
        let (key, tracker) = match self.space.upgrade() {
            Some(space) => space.register(),
            None => IdSpace::<I>::new().orphan(),
        };
        tracker.set_local_len(values.len());
        Self {
            values,
            default: self.default.clone(),
            key,
            tracker,
            space: self.space.clone(),
        }
    }
}

impl<I: ElementId> IdSpace<I> {
    fn orphan(self) -> (u64, Arc<ArrayTracker>) {
        self.invalidate();
        self.register()
    }
}

impl<I: ElementId, E: Clone> Drop for GraphArray<I, E> {
    fn drop(&mut self) {
        if let Some(space) = self.space.upgrade() {
            space.deregister(self.key);
        }
    }
}

impl<I: ElementId, E: Clone + fmt::Debug> fmt::Debug for GraphArray<I, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphArray")
            .field("kind", &I::KIND)
            .field("len", &self.len())
            .field("valid", &self.is_valid())
            .field("values", &self.iter().collect::<Vec<_>>())
            .finish()
    }
}
