//! Distinct-set collections: compact multi-element grouping.
//!
//! Every element owns one [`ListNode`] slot in a single backing vector. A
//! group is a doubly-linked list threaded through those slots by index, with
//! the head and the tail pointing at each other through `opposite`:
//!
//! - ungrouped: `prev`, `next` and `opposite` are null
//! - singleton: `prev`, `next` and `opposite` are the element itself
//! - head: `prev` is null and `opposite` names the tail
//! - middle: `prev` and `next` are set, `opposite` is null
//! - tail: `next` is the element itself and `opposite` names the head
//!
//! Insertions and removals touch at most four slots regardless of the group
//! size. Callers own the set identifier (the current head) and thread it
//! through [`DistinctSetCollection::add`] and
//! [`DistinctSetCollection::remove`].

mod view;

use crate::ids::{ElementId, MultiElementType};

pub use self::view::{
    DistinctSet, DistinctSetIter, DistinctSets, DistinctSetsIntoIter, DistinctSetsIter,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct ListNode<T> {
    prev: T,
    next: T,
    opposite: T,
}

impl<T: ElementId> Default for ListNode<T> {
    fn default() -> Self {
        Self {
            prev: T::NULL,
            next: T::NULL,
            opposite: T::NULL,
        }
    }
}

impl<T: ElementId> ListNode<T> {
    fn is_null(&self) -> bool {
        self.next.is_null()
    }

    fn is_tail(&self, id: T) -> bool {
        !self.is_null() && self.next == id
    }

    fn is_head(&self, id: T) -> bool {
        !self.is_null() && !self.opposite.is_null() && (!self.is_tail(id) || self.opposite == id)
    }

    fn is_singleton(&self, id: T) -> bool {
        self.is_head(id) && self.is_tail(id)
    }

    fn has_next(&self, id: T) -> bool {
        !self.next.is_null() && !self.is_tail(id)
    }

    fn set_to_null(&mut self) {
        *self = Self::default();
    }

    fn set_to_singleton(&mut self, id: T) {
        self.prev = id;
        self.next = id;
        self.opposite = id;
    }
}

/// Partitions a growable universe of element ids into multi-element groups.
///
/// # Examples
/// ```
/// use cohort_core::{DistinctSetCollection, ElementId, MultiElementType, NodeId};
///
/// let mut merged = DistinctSetCollection::<NodeId>::new();
/// let a = NodeId::from_index(4);
/// let b = NodeId::from_index(2);
///
/// let head = merged.add(NodeId::NULL, a);
/// let head = merged.add(head, b);
/// assert_eq!(head, b);
/// assert_eq!(merged.type_of(b), MultiElementType::Head);
/// assert_eq!(merged.type_of(a), MultiElementType::Tail);
/// assert_eq!(merged.set(head).to_vec(), vec![b, a]);
///
/// let head = merged.remove(head, b);
/// assert_eq!(head, a);
/// assert_eq!(merged.type_of(a), MultiElementType::Not);
/// ```
#[derive(Clone, Debug, Default)]
pub struct DistinctSetCollection<T> {
    list: Vec<ListNode<T>>,
}

impl<T: ElementId> DistinctSetCollection<T> {
    /// Creates an empty collection.
    #[must_use]
    pub fn new() -> Self {
        Self { list: Vec::new() }
    }

    /// Creates a collection with `capacity` ungrouped slots.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let mut collection = Self::new();
        collection.resize(capacity);
        collection
    }

    /// Number of element slots currently backed by storage.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.list.len()
    }

    /// Grows the backing storage to at least `size` slots. New slots are
    /// ungrouped; the collection never shrinks.
    pub fn resize(&mut self, size: usize) {
        if size > self.list.len() {
            self.list.resize(size, ListNode::default());
        }
    }

    /// Forgets every group.
    pub fn clear(&mut self) {
        self.list.clear();
    }

    fn node(&self, id: T) -> ListNode<T> {
        self.list.get(id.index()).copied().unwrap_or_default()
    }

    /// Applies `update` to the slot of `id`. Callers size the collection
    /// first, so every id they touch is backed by storage.
    fn update_node(&mut self, id: T, update: impl FnOnce(&mut ListNode<T>)) {
        if let Some(node) = self.list.get_mut(id.index()) {
            update(node);
        }
    }

    /// Adds `element_id` to the set whose head is `set_id`, or starts a new
    /// singleton set when `set_id` is null.
    ///
    /// Returns the identifier of the resulting set, which is the lower of the
    /// two ids involved. Adding an element to the group it already belongs to
    /// changes nothing and returns that group's head.
    ///
    /// `element_id` must not already belong to a different group of two or
    /// more elements; the structural checks for that are debug assertions.
    ///
    /// # Panics
    /// Panics when `element_id` is null.
    pub fn add(&mut self, set_id: T, element_id: T) -> T {
        assert!(
            !element_id.is_null(),
            "cannot add a null {} to a distinct set",
            T::KIND
        );

        let set_id = if set_id.is_null() {
            debug_assert!({
                let node = self.node(element_id);
                node.is_null() || node.is_singleton(element_id)
            });
            element_id
        } else {
            set_id
        };

        if self.type_of(element_id) != MultiElementType::Not {
            let head = self.head_of(element_id);
            if head == self.head_of(set_id) {
                return head;
            }
        }

        let (low, high) = if set_id <= element_id {
            (set_id, element_id)
        } else {
            (element_id, set_id)
        };
        self.resize(high.index() + 1);

        if self.node(low).is_singleton(low) {
            self.update_node(low, ListNode::set_to_null);
        }
        if self.node(high).is_singleton(high) {
            self.update_node(high, ListNode::set_to_null);
        }

        let low_node = self.node(low);
        let high_node = self.node(high);

        if low_node.is_null() && high_node.is_null() {
            // Neither is grouped yet; when low == high this forms a singleton.
            self.update_node(low, |node| {
                node.next = high;
                node.opposite = high;
            });
            self.update_node(high, |node| {
                node.prev = low;
                node.next = high;
                node.opposite = low;
            });
        } else if low != high {
            if low_node.is_head(low) && high_node.is_head(high) {
                self.merge_groups(low, low_node, high, high_node);
            } else if high_node.is_head(high) {
                debug_assert!(low_node.is_null());
                self.prepend(low, high, high_node);
            } else if low_node.is_tail(low) {
                debug_assert!(high_node.is_null());
                self.append(low, low_node, high);
            } else if !low_node.is_null() {
                debug_assert!(high_node.is_null());
                self.splice_after(low, low_node, high);
            } else {
                debug_assert!(!high_node.prev.is_null());
                self.splice_before(low, high, high_node);
            }
        }

        low
    }

    fn merge_groups(&mut self, low: T, low_node: ListNode<T>, high: T, high_node: ListNode<T>) {
        let first_tail = low_node.opposite;
        let second_tail = high_node.opposite;

        self.update_node(first_tail, |node| {
            node.opposite = T::NULL;
            node.next = high;
        });
        self.update_node(second_tail, |node| node.opposite = low);
        self.update_node(high, |node| {
            node.prev = first_tail;
            node.opposite = T::NULL;
        });
        self.update_node(low, |node| node.opposite = second_tail);
    }

    fn prepend(&mut self, low: T, high: T, high_node: ListNode<T>) {
        let tail = high_node.opposite;
        self.update_node(tail, |node| node.opposite = low);
        self.update_node(low, |node| {
            node.next = high;
            node.opposite = tail;
        });
        self.update_node(high, |node| {
            node.prev = low;
            node.opposite = T::NULL;
        });
    }

    fn append(&mut self, low: T, low_node: ListNode<T>, high: T) {
        let head = low_node.opposite;
        self.update_node(head, |node| node.opposite = high);
        self.update_node(high, |node| {
            node.prev = low;
            node.next = high;
            node.opposite = head;
        });
        self.update_node(low, |node| {
            node.next = high;
            node.opposite = T::NULL;
        });
    }

    fn splice_after(&mut self, low: T, low_node: ListNode<T>, high: T) {
        let next = low_node.next;
        self.update_node(high, |node| {
            node.prev = low;
            node.next = next;
        });
        self.update_node(low, |node| node.next = high);
        self.update_node(next, |node| node.prev = high);
    }

    fn splice_before(&mut self, low: T, high: T, high_node: ListNode<T>) {
        let prev = high_node.prev;
        self.update_node(low, |node| {
            node.prev = prev;
            node.next = high;
        });
        self.update_node(high, |node| node.prev = low);
        self.update_node(prev, |node| node.next = low);
    }

    /// Detaches `element_id` from the set whose head is `set_id`.
    ///
    /// Returns the identifier of what remains of the set, which is null when
    /// the set became empty. Removing an element that is not grouped is a
    /// no-op returning null.
    ///
    /// # Panics
    /// Panics when `element_id` is null.
    pub fn remove(&mut self, set_id: T, element_id: T) -> T {
        assert!(
            !element_id.is_null(),
            "cannot remove a null {} from a distinct set",
            T::KIND
        );

        let node = self.node(element_id);
        if node.is_null() {
            return T::NULL;
        }

        let mut set_id = set_id;

        if node.is_singleton(element_id) {
            set_id = T::NULL;
        } else if node.next == node.opposite {
            // Only the tail remains.
            let tail = node.next;
            self.update_node(tail, |slot| slot.set_to_singleton(tail));
            set_id = tail;
        } else if node.prev == node.opposite {
            // Only the head remains.
            let head = node.prev;
            self.update_node(head, |slot| slot.set_to_singleton(head));
            set_id = head;
        } else if node.is_head(element_id) {
            let new_head = node.next;
            let tail = node.opposite;
            self.update_node(new_head, |slot| {
                slot.opposite = tail;
                slot.prev = T::NULL;
            });
            self.update_node(tail, |slot| slot.opposite = new_head);
            set_id = new_head;
        } else if node.is_tail(element_id) {
            let head = node.opposite;
            let new_tail = node.prev;
            self.update_node(head, |slot| slot.opposite = new_tail);
            self.update_node(new_tail, |slot| {
                slot.next = new_tail;
                slot.opposite = head;
            });
            set_id = head;
        } else {
            debug_assert!(self.node(set_id).is_head(set_id));
            self.update_node(node.prev, |slot| slot.next = node.next);
            self.update_node(node.next, |slot| slot.prev = node.prev);
        }

        self.update_node(element_id, ListNode::set_to_null);

        debug_assert!(set_id.is_null() || {
            let head = self.node(set_id);
            head.is_null() || head.is_head(set_id)
        });

        set_id
    }

    /// Classifies `element_id` relative to its group.
    ///
    /// Singleton groups and ungrouped elements both report
    /// [`MultiElementType::Not`].
    #[must_use]
    pub fn type_of(&self, element_id: T) -> MultiElementType {
        if element_id.is_null() {
            return MultiElementType::Not;
        }

        let node = self.node(element_id);
        if node.is_null() || node.is_singleton(element_id) {
            MultiElementType::Not
        } else if node.is_head(element_id) {
            MultiElementType::Head
        } else {
            MultiElementType::Tail
        }
    }

    /// Returns the head of the group containing `element_id`, or
    /// `element_id` itself when it is not grouped.
    ///
    /// Tails resolve in constant time; middle members walk towards the head.
    #[must_use]
    pub fn head_of(&self, element_id: T) -> T {
        let mut current = element_id;
        loop {
            let node = self.node(current);
            if node.is_null() || node.is_head(current) {
                return current;
            }
            if node.is_tail(current) {
                return node.opposite;
            }
            current = node.prev;
        }
    }

    /// Returns a view over the group whose head is `head`.
    ///
    /// Ungrouped elements yield a view containing only themselves; a null
    /// head yields an empty view.
    ///
    /// # Panics
    /// Debug builds assert that `head` is not a non-head member.
    #[must_use]
    pub fn set(&self, head: T) -> DistinctSet<'_, T> {
        debug_assert!(
            head.is_null() || self.type_of(head) != MultiElementType::Tail,
            "distinct set views must be anchored at a head"
        );
        DistinctSet::new(head, self)
    }

    /// Returns an empty view bound to this collection.
    #[must_use]
    pub fn empty_set(&self) -> DistinctSet<'_, T> {
        DistinctSet::new(T::NULL, self)
    }

    fn next_after(&self, id: T) -> T {
        let node = self.node(id);
        if node.has_next(id) {
            node.next
        } else {
            T::NULL
        }
    }
}
