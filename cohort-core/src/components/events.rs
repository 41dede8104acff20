//! Component lifecycle events.

use std::{collections::BTreeSet, fmt};

use crate::ids::{ComponentId, EdgeId, NodeId};

/// Components that are about to be folded into one survivor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ComponentMergeSet {
    merged: BTreeSet<ComponentId>,
    new_id: ComponentId,
}

impl ComponentMergeSet {
    pub(super) fn new(merged: BTreeSet<ComponentId>, new_id: ComponentId) -> Self {
        debug_assert!(merged.contains(&new_id));
        Self { merged, new_id }
    }

    /// Every id taking part in the merge, the survivor included.
    #[rustfmt::skip]
    #[must_use]
    pub fn merged(&self) -> &BTreeSet<ComponentId> { &self.merged }

    /// The id the merged components continue under. When a split fragment
    /// reaches other components, this is the fragment's fresh id.
    #[rustfmt::skip]
    #[must_use]
    pub fn new_id(&self) -> ComponentId { self.new_id }
}

/// A component that split into several.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ComponentSplitSet {
    old_id: ComponentId,
    split_ids: BTreeSet<ComponentId>,
}

impl ComponentSplitSet {
    pub(super) fn new(old_id: ComponentId, split_ids: BTreeSet<ComponentId>) -> Self {
        debug_assert!(split_ids.contains(&old_id));
        Self { old_id, split_ids }
    }

    /// The id of the component before the split; one fragment keeps it.
    #[rustfmt::skip]
    #[must_use]
    pub fn old_id(&self) -> ComponentId { self.old_id }

    /// The ids of every fragment, the old id included.
    #[rustfmt::skip]
    #[must_use]
    pub fn split_ids(&self) -> &BTreeSet<ComponentId> { &self.split_ids }
}

/// One change produced by a component update.
///
/// Within a batch, events appear in this order: merges, removals,
/// additions, splits, then node additions, edge additions, node removals and
/// edge removals. Element-level events are omitted for components that were
/// wholly added (other than by a split) or wholly removed (other than by a
/// merge).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ComponentEvent {
    /// Several components are being merged into one.
    WillMerge(ComponentMergeSet),
    /// A component is going away, either absorbed by a merge or because its
    /// last element left.
    WillBeRemoved {
        /// The vacated id.
        component: ComponentId,
        /// `true` when the component was absorbed by a merge.
        merged: bool,
    },
    /// A new component appeared.
    Added {
        /// The new id.
        component: ComponentId,
        /// `true` when the component is a fragment of a split.
        split: bool,
    },
    /// A component split into fragments.
    Split(ComponentSplitSet),
    /// A node joined a component.
    NodeAdded {
        /// The node that joined.
        node: NodeId,
        /// The component it joined.
        component: ComponentId,
    },
    /// An edge joined a component.
    EdgeAdded {
        /// The edge that joined.
        edge: EdgeId,
        /// The component it joined.
        component: ComponentId,
    },
    /// A node left a component.
    NodeRemoved {
        /// The node that left.
        node: NodeId,
        /// The component it left.
        component: ComponentId,
    },
    /// An edge left a component.
    EdgeRemoved {
        /// The edge that left.
        edge: EdgeId,
        /// The component it left.
        component: ComponentId,
    },
}

impl fmt::Display for ComponentEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WillMerge(set) => write!(f, "components {:?} will merge into {}", set.merged, set.new_id),
            Self::WillBeRemoved { component, merged } => {
                write!(f, "component {component} will be removed (merged: {merged})")
            }
            Self::Added { component, split } => write!(f, "component {component} added (split: {split})"),
            Self::Split(set) => write!(f, "component {} split into {:?}", set.old_id, set.split_ids),
            Self::NodeAdded { node, component } => write!(f, "node {node} added to component {component}"),
            Self::EdgeAdded { edge, component } => write!(f, "edge {edge} added to component {component}"),
            Self::NodeRemoved { node, component } => {
                write!(f, "node {node} removed from component {component}")
            }
            Self::EdgeRemoved { edge, component } => {
                write!(f, "edge {edge} removed from component {component}")
            }
        }
    }
}

/// The ordered batch of events produced by one update.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ComponentChanges {
    events: Vec<ComponentEvent>,
}

impl ComponentChanges {
    pub(super) fn push(&mut self, event: ComponentEvent) {
        self.events.push(event);
    }

    /// Every event, in emission order.
    #[rustfmt::skip]
    #[must_use]
    pub fn events(&self) -> &[ComponentEvent] { &self.events }

    /// Number of events in the batch.
    #[rustfmt::skip]
    #[must_use]
    pub fn len(&self) -> usize { self.events.len() }

    /// Returns `true` when the update changed nothing.
    #[rustfmt::skip]
    #[must_use]
    pub fn is_empty(&self) -> bool { self.events.is_empty() }

    /// Iterates the events in emission order.
    pub fn iter(&self) -> std::slice::Iter<'_, ComponentEvent> {
        self.events.iter()
    }

    /// The merges announced in this batch.
    pub fn merges(&self) -> impl Iterator<Item = &ComponentMergeSet> + '_ {
        self.events.iter().filter_map(|event| match event {
            ComponentEvent::WillMerge(set) => Some(set),
            _ => None,
        })
    }

    /// The splits announced in this batch.
    pub fn splits(&self) -> impl Iterator<Item = &ComponentSplitSet> + '_ {
        self.events.iter().filter_map(|event| match event {
            ComponentEvent::Split(set) => Some(set),
            _ => None,
        })
    }

    /// Ids of the components added in this batch, with their split flag.
    pub fn added(&self) -> impl Iterator<Item = (ComponentId, bool)> + '_ {
        self.events.iter().filter_map(|event| match *event {
            ComponentEvent::Added { component, split } => Some((component, split)),
            _ => None,
        })
    }

    /// Ids of the components removed in this batch, with their merged flag.
    pub fn removed(&self) -> impl Iterator<Item = (ComponentId, bool)> + '_ {
        self.events.iter().filter_map(|event| match *event {
            ComponentEvent::WillBeRemoved { component, merged } => Some((component, merged)),
            _ => None,
        })
    }
}

impl<'a> IntoIterator for &'a ComponentChanges {
    type Item = &'a ComponentEvent;
    type IntoIter = std::slice::Iter<'a, ComponentEvent>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.iter()
    }
}

impl IntoIterator for ComponentChanges {
    type Item = ComponentEvent;
    type IntoIter = std::vec::IntoIter<ComponentEvent>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.into_iter()
    }
}

/// Receives component events after an update has been committed.
///
/// Listeners run on the updating thread once the manager's lock has been
/// released, so they may query the manager freely. Closures taking a
/// `&ComponentEvent` implement this trait.
pub trait ComponentListener: Send + Sync {
    /// Called once per event, in batch order.
    fn on_event(&self, event: &ComponentEvent);
}

impl<F> ComponentListener for F
where
    F: Fn(&ComponentEvent) + Send + Sync,
{
    fn on_event(&self, event: &ComponentEvent) {
        self(event);
    }
}
