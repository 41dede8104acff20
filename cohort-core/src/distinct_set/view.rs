//! Read-only views over groups of a [`DistinctSetCollection`].

use std::{cell::OnceCell, fmt, iter::FusedIterator};

use smallvec::SmallVec;

use crate::ids::ElementId;

use super::DistinctSetCollection;

/// Number of views a [`DistinctSets`] keeps inline before spilling to the
/// heap.
const INLINE_SETS: usize = 8;

/// A lazily iterated group of a [`DistinctSetCollection`], anchored at its
/// head.
///
/// The size is computed on first use and cached for the lifetime of the
/// view. The view borrows the collection, so the collection cannot change
/// underneath a cached size.
#[derive(Clone)]
pub struct DistinctSet<'a, T> {
    head: T,
    collection: &'a DistinctSetCollection<T>,
    len: OnceCell<usize>,
}

impl<'a, T: ElementId> DistinctSet<'a, T> {
    pub(super) fn new(head: T, collection: &'a DistinctSetCollection<T>) -> Self {
        let len = OnceCell::new();
        if head.is_null() {
            let _ = len.set(0);
        }
        Self {
            head,
            collection,
            len,
        }
    }

    /// The head the view is anchored at; null for an empty view.
    #[must_use]
    pub fn head(&self) -> T {
        self.head
    }

    /// Iterates the members, head first.
    #[must_use]
    pub fn iter(&self) -> DistinctSetIter<'a, T> {
        DistinctSetIter {
            current: self.head,
            collection: self.collection,
        }
    }

    /// Number of members, counted once and then cached.
    #[must_use]
    pub fn len(&self) -> usize {
        *self.len.get_or_init(|| self.iter().count())
    }

    /// Returns `true` when the view has no members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.head.is_null()
    }

    /// Copies the members into a vector, head first.
    #[must_use]
    pub fn to_vec(&self) -> Vec<T> {
        let mut members = Vec::with_capacity(self.len.get().copied().unwrap_or_default());
        members.extend(self.iter());
        members
    }
}

impl<'a, T: ElementId> IntoIterator for &DistinctSet<'a, T> {
    type Item = T;
    type IntoIter = DistinctSetIter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<T: ElementId> fmt::Debug for DistinctSet<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

/// Iterator over one group, following `next` links until the tail.
#[derive(Clone)]
pub struct DistinctSetIter<'a, T> {
    current: T,
    collection: &'a DistinctSetCollection<T>,
}

impl<T: ElementId> Iterator for DistinctSetIter<'_, T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        if self.current.is_null() {
            return None;
        }
        let item = self.current;
        self.current = self.collection.next_after(item);
        Some(item)
    }
}

impl<T: ElementId> FusedIterator for DistinctSetIter<'_, T> {}

/// The concatenation of several [`DistinctSet`] views.
///
/// Used to present the members of many groups as one sequence, for example
/// the incident edges of every node folded into a merged node.
///
/// # Examples
/// ```
/// use cohort_core::{DistinctSetCollection, DistinctSets, EdgeId, ElementId};
///
/// let mut edges = DistinctSetCollection::<EdgeId>::new();
/// let first = edges.add(EdgeId::NULL, EdgeId::from_index(0));
/// let first = edges.add(first, EdgeId::from_index(3));
/// let second = edges.add(EdgeId::NULL, EdgeId::from_index(1));
///
/// let mut union = DistinctSets::new();
/// union.push(edges.set(first));
/// union.push(edges.set(second));
/// assert_eq!(union.len(), 3);
/// assert_eq!(
///     union.iter().map(|id| id.index()).collect::<Vec<_>>(),
///     vec![0, 3, 1]
/// );
/// ```
#[derive(Clone)]
pub struct DistinctSets<'a, T> {
    sets: SmallVec<[DistinctSet<'a, T>; INLINE_SETS]>,
    len: OnceCell<usize>,
}

impl<T: ElementId> Default for DistinctSets<'_, T> {
    fn default() -> Self {
        Self {
            sets: SmallVec::new(),
            len: OnceCell::new(),
        }
    }
}

impl<'a, T: ElementId> DistinctSets<'a, T> {
    /// Creates an empty union.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a view to the union.
    pub fn push(&mut self, set: DistinctSet<'a, T>) {
        self.len.take();
        self.sets.push(set);
    }

    /// Number of unioned views, including empty ones.
    #[must_use]
    pub fn set_count(&self) -> usize {
        self.sets.len()
    }

    /// Iterates the members of every view in push order.
    #[must_use]
    pub fn iter(&self) -> DistinctSetsIter<'_, 'a, T> {
        DistinctSetsIter {
            sets: self.sets.iter(),
            current: None,
        }
    }

    /// Total number of members, cached after the first call.
    #[must_use]
    pub fn len(&self) -> usize {
        *self
            .len
            .get_or_init(|| self.sets.iter().map(DistinctSet::len).sum())
    }

    /// Returns `true` when every unioned view is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sets.iter().all(DistinctSet::is_empty)
    }

    /// Copies all members into a vector.
    #[must_use]
    pub fn to_vec(&self) -> Vec<T> {
        let mut members = Vec::with_capacity(self.len());
        members.extend(self.iter());
        members
    }

    /// Returns `true` when the views are stored on the heap.
    #[must_use]
    pub fn spilled(&self) -> bool {
        self.sets.spilled()
    }
}

impl<'a, T: ElementId> Extend<DistinctSet<'a, T>> for DistinctSets<'a, T> {
    fn extend<I: IntoIterator<Item = DistinctSet<'a, T>>>(&mut self, iter: I) {
        self.len.take();
        self.sets.extend(iter);
    }
}

impl<'a, T: ElementId> FromIterator<DistinctSet<'a, T>> for DistinctSets<'a, T> {
    fn from_iter<I: IntoIterator<Item = DistinctSet<'a, T>>>(iter: I) -> Self {
        let mut sets = Self::new();
        sets.extend(iter);
        sets
    }
}

impl<'s, 'a, T: ElementId> IntoIterator for &'s DistinctSets<'a, T> {
    type Item = T;
    type IntoIter = DistinctSetsIter<'s, 'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a, T: ElementId> IntoIterator for DistinctSets<'a, T> {
    type Item = T;
    type IntoIter = DistinctSetsIntoIter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        DistinctSetsIntoIter {
            sets: self.sets.into_iter(),
            current: None,
        }
    }
}

impl<T: ElementId> fmt::Debug for DistinctSets<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

/// Flattening iterator over a [`DistinctSets`].
pub struct DistinctSetsIter<'s, 'a, T> {
    sets: std::slice::Iter<'s, DistinctSet<'a, T>>,
    current: Option<DistinctSetIter<'a, T>>,
}

impl<T: ElementId> Iterator for DistinctSetsIter<'_, '_, T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        loop {
            if let Some(item) = self.current.as_mut().and_then(Iterator::next) {
                return Some(item);
            }
            self.current = Some(self.sets.next()?.iter());
        }
    }
}

impl<T: ElementId> FusedIterator for DistinctSetsIter<'_, '_, T> {}

/// Owning counterpart of [`DistinctSetsIter`]; still borrows the collection.
pub struct DistinctSetsIntoIter<'a, T> {
    sets: smallvec::IntoIter<[DistinctSet<'a, T>; INLINE_SETS]>,
    current: Option<DistinctSetIter<'a, T>>,
}

impl<T: ElementId> Iterator for DistinctSetsIntoIter<'_, T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        loop {
            if let Some(item) = self.current.as_mut().and_then(Iterator::next) {
                return Some(item);
            }
            self.current = Some(self.sets.next()?.iter());
        }
    }
}

impl<T: ElementId> FusedIterator for DistinctSetsIntoIter<'_, T> {}
